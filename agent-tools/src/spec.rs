//! Tool specifications and their parameter contracts.

use std::collections::HashSet;

use agent_primitives::ModuleId;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{ArgumentError, RecordLocation, RegistrationError, RegistrationResult};

const FIELD_NAME: &str = "name";
const FIELD_DESCRIPTION: &str = "description";
const FIELD_REQUIRED: &str = "required_parameters";
const FIELD_OPTIONAL: &str = "optional_parameters";

/// One declared parameter of a tool.
///
/// Catalog records may declare a parameter as a bare name or as an object with
/// a `name` plus descriptive `type`, `description` and `default` entries. Only
/// the name takes part in the call contract.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Parameter {
    name: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    default: Option<Value>,
}

impl Parameter {
    /// Parameter name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared type hint, if any.
    #[must_use]
    pub fn kind(&self) -> Option<&str> {
        self.kind.as_deref()
    }

    /// Human-readable description, if any.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Default value advertised for optional parameters.
    #[must_use]
    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    fn named(name: String) -> Self {
        Self {
            name,
            kind: None,
            description: None,
            default: None,
        }
    }
}

/// A named capability with its parameter contract.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ToolSpec {
    name: String,
    #[serde(skip)]
    module: ModuleId,
    description: String,
    required_parameters: Vec<Parameter>,
    optional_parameters: Vec<Parameter>,
}

impl ToolSpec {
    /// Validates one catalog record.
    pub(crate) fn from_record(
        module: &ModuleId,
        index: usize,
        record: &Value,
    ) -> RegistrationResult<Self> {
        let location = RecordLocation::new(module.as_str(), index);
        let Value::Object(fields) = record else {
            return Err(RegistrationError::NotAnObject { location });
        };

        let name = match fields.get(FIELD_NAME) {
            Some(Value::String(name)) if !name.trim().is_empty() => name.clone(),
            _ => return Err(RegistrationError::MissingName { location }),
        };
        let location = location.named(&name);

        let description = match fields.get(FIELD_DESCRIPTION) {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(description)) => description.clone(),
            Some(_) => {
                return Err(RegistrationError::InvalidField {
                    location,
                    field: FIELD_DESCRIPTION,
                    reason: "must be a string".into(),
                });
            }
        };

        let required_parameters = parse_parameters(&location, FIELD_REQUIRED, fields)?;
        let optional_parameters = parse_parameters(&location, FIELD_OPTIONAL, fields)?;

        let required: HashSet<&str> = required_parameters.iter().map(Parameter::name).collect();
        if let Some(overlap) = optional_parameters
            .iter()
            .find(|parameter| required.contains(parameter.name()))
        {
            return Err(RegistrationError::OverlappingParameter {
                location,
                parameter: overlap.name.clone(),
            });
        }

        Ok(Self {
            name,
            module: module.clone(),
            description,
            required_parameters,
            optional_parameters,
        })
    }

    /// Unique tool name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Module that owns the tool.
    #[must_use]
    pub fn module(&self) -> &ModuleId {
        &self.module
    }

    /// Human-readable description; empty when the record had none.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Parameters that must be supplied, in declaration order.
    #[must_use]
    pub fn required_parameters(&self) -> &[Parameter] {
        &self.required_parameters
    }

    /// Parameters that may be omitted, in declaration order.
    #[must_use]
    pub fn optional_parameters(&self) -> &[Parameter] {
        &self.optional_parameters
    }

    /// Finds a declared parameter by name.
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.required_parameters
            .iter()
            .chain(&self.optional_parameters)
            .find(|parameter| parameter.name == name)
    }

    /// Returns `true` when `name` is a required parameter.
    #[must_use]
    pub fn is_required(&self, name: &str) -> bool {
        self.required_parameters
            .iter()
            .any(|parameter| parameter.name == name)
    }

    /// Checks call arguments against the contract. `null` counts as no arguments.
    ///
    /// # Errors
    ///
    /// Returns [`ArgumentError::NotAnObject`] for non-object arguments,
    /// [`ArgumentError::MissingRequired`] for the first absent required
    /// parameter, or [`ArgumentError::Unknown`] for the first undeclared one.
    pub fn validate_arguments(&self, arguments: &Value) -> Result<(), ArgumentError> {
        let empty = Map::new();
        let arguments = match arguments {
            Value::Null => &empty,
            Value::Object(map) => map,
            _ => {
                return Err(ArgumentError::NotAnObject {
                    tool: self.name.clone(),
                });
            }
        };

        if let Some(missing) = self
            .required_parameters
            .iter()
            .find(|parameter| !arguments.contains_key(&parameter.name))
        {
            return Err(ArgumentError::MissingRequired {
                tool: self.name.clone(),
                parameter: missing.name.clone(),
            });
        }

        if let Some(unknown) = arguments.keys().find(|key| self.parameter(key).is_none()) {
            return Err(ArgumentError::Unknown {
                tool: self.name.clone(),
                parameter: unknown.clone(),
            });
        }

        Ok(())
    }

    /// Re-emits the spec as a catalog record.
    #[must_use]
    pub fn to_record(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

fn parse_parameters(
    location: &RecordLocation,
    field: &'static str,
    fields: &Map<String, Value>,
) -> RegistrationResult<Vec<Parameter>> {
    let invalid = |reason: String| RegistrationError::InvalidField {
        location: location.clone(),
        field,
        reason,
    };

    let items = match fields.get(field) {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(_) => return Err(invalid("must be a sequence of parameter names".into())),
    };

    let mut seen = HashSet::new();
    let mut parameters = Vec::with_capacity(items.len());
    for (position, item) in items.iter().enumerate() {
        let parameter = parse_parameter(item)
            .ok_or_else(|| invalid(format!("entry #{position} is not a parameter name")))?;
        if !seen.insert(parameter.name.clone()) {
            return Err(invalid(format!(
                "declares parameter `{}` more than once",
                parameter.name
            )));
        }
        parameters.push(parameter);
    }
    Ok(parameters)
}

fn parse_parameter(item: &Value) -> Option<Parameter> {
    match item {
        Value::String(name) if !name.trim().is_empty() => Some(Parameter::named(name.clone())),
        Value::Object(fields) => {
            let name = fields
                .get(FIELD_NAME)
                .and_then(Value::as_str)
                .filter(|name| !name.trim().is_empty())?;
            let text = |key: &str| match fields.get(key) {
                None | Some(Value::Null) => Some(None),
                Some(Value::String(value)) => Some(Some(value.clone())),
                Some(_) => None,
            };
            Some(Parameter {
                name: name.to_owned(),
                kind: text("type")?,
                description: text(FIELD_DESCRIPTION)?,
                default: fields.get("default").filter(|v| !v.is_null()).cloned(),
            })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn module() -> ModuleId {
        ModuleId::new("test_module").unwrap()
    }

    fn spec(record: &Value) -> RegistrationResult<ToolSpec> {
        ToolSpec::from_record(&module(), 0, record)
    }

    #[test]
    fn parses_plain_record() {
        let spec = spec(&json!({
            "name": "test_function",
            "description": "A test function",
            "required_parameters": ["param1"],
            "optional_parameters": ["param2"]
        }))
        .unwrap();

        assert_eq!(spec.name(), "test_function");
        assert_eq!(spec.module().as_str(), "test_module");
        assert_eq!(spec.description(), "A test function");
        assert_eq!(spec.required_parameters()[0].name(), "param1");
        assert_eq!(spec.optional_parameters()[0].name(), "param2");
        assert!(spec.is_required("param1"));
        assert!(!spec.is_required("param2"));
    }

    #[test]
    fn parameter_lists_default_to_empty() {
        let spec = spec(&json!({ "name": "bare", "optional_parameters": null })).unwrap();
        assert!(spec.required_parameters().is_empty());
        assert!(spec.optional_parameters().is_empty());
        assert_eq!(spec.description(), "");
    }

    #[test]
    fn parses_parameter_objects() {
        let spec = spec(&json!({
            "name": "align_sequences",
            "required_parameters": [
                { "name": "sequences", "type": "List[str]", "description": "Input sequences" }
            ],
            "optional_parameters": [
                { "name": "gap_penalty", "type": "float", "default": -1.5 }
            ]
        }))
        .unwrap();

        let gap = spec.parameter("gap_penalty").unwrap();
        assert_eq!(gap.kind(), Some("float"));
        assert_eq!(gap.default_value(), Some(&json!(-1.5)));
        assert_eq!(
            spec.parameter("sequences").and_then(Parameter::description),
            Some("Input sequences")
        );
    }

    #[test]
    fn rejects_malformed_records() {
        assert!(matches!(
            spec(&json!("name")),
            Err(RegistrationError::NotAnObject { .. })
        ));
        assert!(matches!(
            spec(&json!({ "description": "no name" })),
            Err(RegistrationError::MissingName { .. })
        ));
        assert!(matches!(
            spec(&json!({ "name": "" })),
            Err(RegistrationError::MissingName { .. })
        ));
        assert!(matches!(
            spec(&json!({ "name": "t", "description": 4 })),
            Err(RegistrationError::InvalidField { field: "description", .. })
        ));
        assert!(matches!(
            spec(&json!({ "name": "t", "required_parameters": "param1" })),
            Err(RegistrationError::InvalidField { field: "required_parameters", .. })
        ));
        assert!(matches!(
            spec(&json!({ "name": "t", "optional_parameters": [1] })),
            Err(RegistrationError::InvalidField { field: "optional_parameters", .. })
        ));
        assert!(matches!(
            spec(&json!({ "name": "t", "required_parameters": ["a", "a"] })),
            Err(RegistrationError::InvalidField { .. })
        ));
    }

    #[test]
    fn errors_name_the_record() {
        let err = ToolSpec::from_record(
            &module(),
            3,
            &json!({ "name": "t", "required_parameters": [{ "type": "int" }] }),
        )
        .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("test_module"), "{message}");
        assert!(message.contains("#3"), "{message}");
        assert!(message.contains("`t`"), "{message}");
    }

    #[test]
    fn rejects_overlapping_parameters() {
        let err = spec(&json!({
            "name": "t",
            "required_parameters": ["x"],
            "optional_parameters": ["y", "x"]
        }))
        .unwrap_err();

        assert!(matches!(
            err,
            RegistrationError::OverlappingParameter { ref parameter, .. } if parameter == "x"
        ));
    }

    #[test]
    fn validates_arguments() {
        let spec = spec(&json!({
            "name": "test_function",
            "required_parameters": ["param1"],
            "optional_parameters": ["param2"]
        }))
        .unwrap();

        spec.validate_arguments(&json!({ "param1": 1 })).unwrap();
        spec.validate_arguments(&json!({ "param1": 1, "param2": "x" }))
            .unwrap();

        assert_eq!(
            spec.validate_arguments(&json!({ "param2": 2 })),
            Err(ArgumentError::MissingRequired {
                tool: "test_function".into(),
                parameter: "param1".into(),
            })
        );
        assert_eq!(
            spec.validate_arguments(&json!({ "param1": 1, "param3": 3 })),
            Err(ArgumentError::Unknown {
                tool: "test_function".into(),
                parameter: "param3".into(),
            })
        );
        assert!(matches!(
            spec.validate_arguments(&json!([1])),
            Err(ArgumentError::NotAnObject { .. })
        ));
        assert!(matches!(
            spec.validate_arguments(&Value::Null),
            Err(ArgumentError::MissingRequired { .. })
        ));
    }

    #[test]
    fn record_round_trips() {
        let record = json!({
            "name": "t",
            "description": "d",
            "required_parameters": [{ "name": "a", "type": "int" }],
            "optional_parameters": [{ "name": "b" }]
        });
        let parsed = spec(&record).unwrap();
        assert_eq!(parsed.to_record(), record);
        assert_eq!(spec(&parsed.to_record()).unwrap(), parsed);
    }
}
