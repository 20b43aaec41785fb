use crate::errors::ToolError;
use serde_json::{Map, Value, json};

#[derive(Clone, Debug, PartialEq)]
pub enum ParamKind {
    String,
    Integer,
    Number,
    Boolean,
    StringArray,
    Object(Vec<ParamSpec>),
}

impl ParamKind {
    fn base_type(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::StringArray => "array",
            Self::Object(_) => "object",
        }
    }

    fn display(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::StringArray => "array of strings",
            Self::Object(_) => "object",
        }
    }
}

/// One parameter of a registered tool. Names are the camelCase wire names
/// the model sees. A required, non-nullable parameter lands in the schema's
/// `required` list; a nullable one gets a `[T, "null"]` type union.
#[derive(Clone, Debug, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub description: String,
    pub kind: ParamKind,
    pub required: bool,
    pub nullable: bool,
    pub min_items: Option<usize>,
    pub min_length: Option<usize>,
    pub enum_values: Vec<&'static str>,
}

impl ParamSpec {
    fn new(name: &'static str, description: &str, kind: ParamKind) -> Self {
        Self {
            name,
            description: description.to_string(),
            kind,
            required: false,
            nullable: false,
            min_items: None,
            min_length: None,
            enum_values: Vec::new(),
        }
    }

    pub fn required_string(name: &'static str, description: &str) -> Self {
        Self {
            required: true,
            ..Self::new(name, description, ParamKind::String)
        }
    }

    pub fn optional_string(name: &'static str, description: &str) -> Self {
        Self {
            nullable: true,
            ..Self::new(name, description, ParamKind::String)
        }
    }

    pub fn optional_integer(name: &'static str, description: &str) -> Self {
        Self {
            nullable: true,
            ..Self::new(name, description, ParamKind::Integer)
        }
    }

    pub fn optional_number(name: &'static str, description: &str) -> Self {
        Self {
            nullable: true,
            ..Self::new(name, description, ParamKind::Number)
        }
    }

    pub fn optional_boolean(name: &'static str, description: &str) -> Self {
        Self {
            nullable: true,
            ..Self::new(name, description, ParamKind::Boolean)
        }
    }

    pub fn string_array(name: &'static str, description: &str, min_items: usize) -> Self {
        Self {
            required: true,
            min_items: Some(min_items),
            ..Self::new(name, description, ParamKind::StringArray)
        }
    }

    pub fn with_enum(mut self, values: &[&'static str]) -> Self {
        self.enum_values = values.to_vec();
        self
    }
}

/// JSON Schema for a tool's parameter list.
pub fn schema_for(params: &[ParamSpec]) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();

    for param in params {
        properties.insert(param.name.to_string(), property_schema(param));
        if param.required && !param.nullable {
            required.push(Value::String(param.name.to_string()));
        }
    }

    let mut root = json!({
        "type": "object",
        "properties": Value::Object(properties),
    });
    if !required.is_empty() {
        root["required"] = Value::Array(required);
    }
    root
}

fn property_schema(param: &ParamSpec) -> Value {
    let base = param.kind.base_type();
    let mut schema = Map::new();

    if param.nullable {
        schema.insert("type".to_string(), json!([base, "null"]));
    } else {
        schema.insert("type".to_string(), json!(base));
    }
    if !param.description.is_empty() {
        schema.insert("description".to_string(), json!(param.description));
    }
    if !param.enum_values.is_empty() {
        let values: Vec<String> = param
            .enum_values
            .iter()
            .map(|v| v.to_ascii_lowercase())
            .collect();
        schema.insert("enum".to_string(), json!(values));
    }
    if let Some(min_items) = param.min_items {
        schema.insert("minItems".to_string(), json!(min_items));
    }
    if let Some(min_length) = param.min_length {
        schema.insert("minLength".to_string(), json!(min_length));
    }
    match &param.kind {
        ParamKind::StringArray => {
            schema.insert("items".to_string(), json!({"type": "string"}));
        }
        ParamKind::Object(children) => {
            let nested = schema_for(children);
            if let Value::Object(nested) = nested {
                for (key, value) in nested {
                    if key != "type" {
                        schema.insert(key, value);
                    }
                }
            }
        }
        _ => {}
    }

    Value::Object(schema)
}

/// Validates parsed arguments against the parameter table. Unknown
/// properties are deliberately ignored; models sometimes add extras and the
/// extras are harmless.
pub fn validate_arguments(
    params: &[ParamSpec],
    args: &Map<String, Value>,
) -> Result<(), ToolError> {
    for param in params {
        let value = match args.get(param.name) {
            None | Some(Value::Null) => {
                if param.required && !param.nullable {
                    return Err(ToolError::Validation(format!(
                        "Missing required parameter: {}",
                        param.name
                    )));
                }
                continue;
            }
            Some(value) => value,
        };

        let type_ok = match &param.kind {
            ParamKind::String => value.is_string(),
            ParamKind::Integer => value.is_i64() || value.is_u64(),
            ParamKind::Number => value.is_number(),
            ParamKind::Boolean => value.is_boolean(),
            ParamKind::StringArray => value
                .as_array()
                .is_some_and(|items| items.iter().all(Value::is_string)),
            ParamKind::Object(_) => value.is_object(),
        };
        if !type_ok {
            return Err(ToolError::Validation(format!(
                "Parameter '{}' must be a {}",
                param.name,
                param.kind.display()
            )));
        }

        if let Some(text) = value.as_str() {
            if param.required && text.trim().is_empty() {
                return Err(ToolError::Validation(format!(
                    "Parameter '{}' cannot be empty",
                    param.name
                )));
            }
            if let Some(min_length) = param.min_length {
                if text.len() < min_length {
                    return Err(ToolError::Validation(format!(
                        "Parameter '{}' must have at least {} characters",
                        param.name, min_length
                    )));
                }
            }
            if !param.enum_values.is_empty() {
                let lowered = text.trim().to_ascii_lowercase();
                if !param
                    .enum_values
                    .iter()
                    .any(|v| v.to_ascii_lowercase() == lowered)
                {
                    let allowed = param.enum_values.join(", ");
                    return Err(ToolError::Validation(format!(
                        "Parameter '{}' must be one of: {}",
                        param.name, allowed
                    )));
                }
            }
        }

        if let Some(items) = value.as_array() {
            if let Some(min_items) = param.min_items {
                if items.len() < min_items {
                    return Err(ToolError::Validation(format!(
                        "Parameter '{}' must have at least {} items",
                        param.name, min_items
                    )));
                }
            }
        }

        if let (ParamKind::Object(children), Some(nested)) = (&param.kind, value.as_object()) {
            validate_arguments(children, nested)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> Vec<ParamSpec> {
        vec![
            ParamSpec::required_string("sessionId", "Session to use."),
            ParamSpec::optional_string("networkMode", "Network mode.")
                .with_enum(&["none", "bridge", "host"]),
            ParamSpec::optional_integer("timeoutSeconds", "Timeout."),
            ParamSpec::string_array("patterns", "Wildcard patterns.", 1),
        ]
    }

    fn args(json: &str) -> Map<String, Value> {
        serde_json::from_str::<Value>(json)
            .unwrap()
            .as_object()
            .unwrap()
            .clone()
    }

    #[test]
    fn schema_marks_required_and_nullable_params() {
        let schema = schema_for(&params());
        let required: Vec<&str> = schema["required"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect();
        assert_eq!(required, vec!["sessionId", "patterns"]);
        assert_eq!(
            schema["properties"]["networkMode"]["type"],
            json!(["string", "null"])
        );
        assert_eq!(schema["properties"]["sessionId"]["type"], json!("string"));
    }

    #[test]
    fn schema_lists_enum_values_and_min_items() {
        let schema = schema_for(&params());
        assert_eq!(
            schema["properties"]["networkMode"]["enum"],
            json!(["none", "bridge", "host"])
        );
        assert_eq!(schema["properties"]["patterns"]["minItems"], json!(1));
        assert_eq!(
            schema["properties"]["patterns"]["items"],
            json!({"type": "string"})
        );
    }

    #[test]
    fn missing_required_parameter_is_named() {
        let err = validate_arguments(&params(), &args(r#"{"patterns": ["*"]}"#)).unwrap_err();
        assert_eq!(err.to_string(), "Missing required parameter: sessionId");
    }

    #[test]
    fn blank_required_string_cannot_be_empty() {
        let err =
            validate_arguments(&params(), &args(r#"{"sessionId": "  ", "patterns": ["*"]}"#))
                .unwrap_err();
        assert_eq!(err.to_string(), "Parameter 'sessionId' cannot be empty");
    }

    #[test]
    fn enum_mismatch_lists_allowed_values() {
        let err = validate_arguments(
            &params(),
            &args(r#"{"sessionId": "s", "patterns": ["*"], "networkMode": "vpn"}"#),
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Parameter 'networkMode' must be one of: none, bridge, host"
        );
    }

    #[test]
    fn enum_match_is_case_insensitive() {
        let result = validate_arguments(
            &params(),
            &args(r#"{"sessionId": "s", "patterns": ["*"], "networkMode": "Bridge"}"#),
        );
        assert!(result.is_ok());
    }

    #[test]
    fn short_array_reports_min_items() {
        let err =
            validate_arguments(&params(), &args(r#"{"sessionId": "s", "patterns": []}"#))
                .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Parameter 'patterns' must have at least 1 items"
        );
    }

    #[test]
    fn wrong_type_is_reported() {
        let err = validate_arguments(
            &params(),
            &args(r#"{"sessionId": 42, "patterns": ["*"]}"#),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "Parameter 'sessionId' must be a string");
    }

    #[test]
    fn null_optional_parameter_is_fine() {
        let result = validate_arguments(
            &params(),
            &args(r#"{"sessionId": "s", "patterns": ["*"], "timeoutSeconds": null}"#),
        );
        assert!(result.is_ok());
    }

    fn options_param() -> ParamSpec {
        ParamSpec {
            required: true,
            kind: ParamKind::Object(vec![
                ParamSpec {
                    min_length: Some(3),
                    ..ParamSpec::required_string("fileName", "Name of the file.")
                },
                ParamSpec::optional_integer("maxBytes", "Byte cap."),
            ]),
            ..ParamSpec::new("options", "Extra options.", ParamKind::String)
        }
    }

    #[test]
    fn object_schema_nests_properties_and_required() {
        let schema = schema_for(std::slice::from_ref(&options_param()));
        let options = &schema["properties"]["options"];
        assert_eq!(options["type"], json!("object"));
        assert_eq!(options["properties"]["fileName"]["type"], json!("string"));
        assert_eq!(options["properties"]["fileName"]["minLength"], json!(3));
        assert_eq!(
            options["properties"]["maxBytes"]["type"],
            json!(["integer", "null"])
        );
        assert_eq!(options["required"], json!(["fileName"]));
    }

    #[test]
    fn object_arguments_validate_recursively() {
        let params = vec![options_param()];
        let err = validate_arguments(&params, &args(r#"{"options": {"maxBytes": 5}}"#))
            .unwrap_err();
        assert_eq!(err.to_string(), "Missing required parameter: fileName");

        let err = validate_arguments(&params, &args(r#"{"options": 7}"#)).unwrap_err();
        assert_eq!(err.to_string(), "Parameter 'options' must be a object");

        let ok = validate_arguments(&params, &args(r#"{"options": {"fileName": "a.csv"}}"#));
        assert!(ok.is_ok());
    }

    #[test]
    fn short_string_reports_min_length() {
        let params = vec![options_param()];
        let err = validate_arguments(&params, &args(r#"{"options": {"fileName": "ab"}}"#))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Parameter 'fileName' must have at least 3 characters"
        );
    }

    #[test]
    fn unknown_properties_are_ignored() {
        let result = validate_arguments(
            &params(),
            &args(r#"{"sessionId": "s", "patterns": ["*"], "bogus": true}"#),
        );
        assert!(result.is_ok());
    }
}
