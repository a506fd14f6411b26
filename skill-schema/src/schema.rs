//! Generated tool schemas.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::declared::{DeclaredType, TypeTag};
use crate::error::{SchemaError, SchemaResult};
use crate::signature::Signature;

/// One parameter of a generated schema.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaParam {
    name: String,
    #[serde(rename = "type")]
    tag: TypeTag,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    items: Option<TypeTag>,
    required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
}

impl SchemaParam {
    /// Parameter name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// JSON type tag.
    #[must_use]
    pub const fn tag(&self) -> TypeTag {
        self.tag
    }

    /// Element tag for array parameters, when known.
    #[must_use]
    pub const fn items(&self) -> Option<TypeTag> {
        self.items
    }

    /// Whether callers must supply the parameter.
    #[must_use]
    pub const fn required(&self) -> bool {
        self.required
    }

    fn property(&self) -> Value {
        let mut property = Map::new();
        property.insert("type".into(), Value::from(self.tag.as_str()));
        match self.tag {
            TypeTag::Array => {
                let items = self.items.unwrap_or(TypeTag::String);
                property.insert("items".into(), json!({ "type": items.as_str() }));
            }
            TypeTag::Object => {
                property.insert("additionalProperties".into(), Value::Bool(false));
            }
            _ => {}
        }
        if let Some(description) = &self.description {
            property.insert("description".into(), Value::from(description.as_str()));
        }
        Value::Object(property)
    }
}

/// Immutable call schema of a tool.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSchema {
    name: String,
    description: String,
    parameters: Vec<SchemaParam>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    returns: Option<TypeTag>,
}

impl ToolSchema {
    /// Tool name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Human-readable description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Ordered parameters.
    #[must_use]
    pub fn parameters(&self) -> &[SchemaParam] {
        &self.parameters
    }

    /// Names of the required parameters, in declaration order.
    pub fn required(&self) -> impl Iterator<Item = &str> {
        self.parameters
            .iter()
            .filter(|param| param.required)
            .map(|param| param.name.as_str())
    }

    /// Return type tag, if declared and resolvable.
    #[must_use]
    pub const fn returns(&self) -> Option<TypeTag> {
        self.returns
    }

    /// Returns a copy of the schema under a different tool name.
    #[must_use]
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }

    /// Renders the function-calling JSON shape understood by LLM providers.
    #[must_use]
    pub fn to_function_json(&self) -> Value {
        let properties: Map<String, Value> = self
            .parameters
            .iter()
            .map(|param| (param.name.clone(), param.property()))
            .collect();
        let required: Vec<&str> = self.required().collect();

        json!({
            "type": "function",
            "name": self.name,
            "description": self.description,
            "parameters": {
                "type": "object",
                "properties": properties,
                "required": required,
                "additionalProperties": false,
            },
        })
    }
}

/// Generates the call schema for a declared signature.
///
/// Parameters with a declared default are optional; all others are required.
///
/// # Errors
///
/// Returns [`SchemaError::UnresolvableParameter`] naming the first parameter
/// whose type has no JSON tag. Union types never fail: they collapse to the
/// highest-priority member (string, integer, number, boolean, array, object).
/// Empty or duplicated names are rejected as well.
pub fn generate_schema(signature: &Signature) -> SchemaResult<ToolSchema> {
    if signature.name().trim().is_empty() {
        return Err(SchemaError::InvalidName("tool name cannot be empty"));
    }

    let mut seen = HashSet::new();
    let mut parameters = Vec::with_capacity(signature.params().len());
    for param in signature.params() {
        if param.name().trim().is_empty() {
            return Err(SchemaError::InvalidName("parameter name cannot be empty"));
        }
        if !seen.insert(param.name()) {
            return Err(SchemaError::DuplicateParameter {
                function: signature.name().to_owned(),
                parameter: param.name().to_owned(),
            });
        }

        let resolved = param.declared_type().resolve().map_err(|type_name| {
            SchemaError::UnresolvableParameter {
                function: signature.name().to_owned(),
                parameter: param.name().to_owned(),
                type_name,
            }
        })?;

        parameters.push(SchemaParam {
            name: param.name().to_owned(),
            tag: resolved.tag,
            items: resolved.items,
            required: !param.has_default(),
            description: param.description().map(str::to_owned),
        });
    }

    let returns = signature.return_type().and_then(|ty| match ty {
        DeclaredType::Null => None,
        other => other.tag(),
    });

    Ok(ToolSchema {
        name: signature.name().to_owned(),
        description: signature.description().to_owned(),
        parameters,
        returns,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ParamSpec;

    fn add_signature() -> Signature {
        Signature::new("add")
            .with_description("Add two numbers together")
            .param_of::<i64>("a")
            .param_of::<i64>("b")
            .returns_of::<i64>()
    }

    #[test]
    fn required_set_matches_parameters_without_defaults() {
        let signature = Signature::new("search")
            .param_of::<String>("query")
            .param(ParamSpec::of::<u32>("limit").with_default())
            .param_of::<Option<bool>>("exact")
            .param_of::<Vec<String>>("tags");

        let schema = generate_schema(&signature).unwrap();
        let required: Vec<&str> = schema.required().collect();
        assert_eq!(required, vec!["query", "tags"]);
        assert_eq!(schema.parameters()[1].tag(), TypeTag::Integer);
        assert_eq!(schema.parameters()[2].tag(), TypeTag::Boolean);
        assert_eq!(schema.parameters()[3].items(), Some(TypeTag::String));
    }

    #[test]
    fn add_schema_has_two_required_integers() {
        let schema = generate_schema(&add_signature()).unwrap();
        assert_eq!(schema.name(), "add");
        assert_eq!(schema.parameters().len(), 2);
        assert!(
            schema
                .parameters()
                .iter()
                .all(|p| p.required() && p.tag() == TypeTag::Integer)
        );
        assert_eq!(schema.returns(), Some(TypeTag::Integer));
    }

    #[test]
    fn unknown_parameter_type_names_the_parameter() {
        let signature = Signature::new("render")
            .param_of::<String>("title")
            .param(ParamSpec::new("widget", DeclaredType::Unknown("Widget".into())));

        let err = generate_schema(&signature).expect_err("should fail");
        assert_eq!(
            err,
            SchemaError::UnresolvableParameter {
                function: "render".into(),
                parameter: "widget".into(),
                type_name: "Widget".into(),
            }
        );
    }

    #[test]
    fn union_parameter_never_fails() {
        let signature = Signature::new("lookup").param(ParamSpec::new(
            "key",
            DeclaredType::Union(vec![DeclaredType::Integer, DeclaredType::Unknown("Id".into())]),
        ));
        let schema = generate_schema(&signature).unwrap();
        assert_eq!(schema.parameters()[0].tag(), TypeTag::Integer);
    }

    #[test]
    fn unresolvable_return_type_is_dropped() {
        let signature = Signature::new("f").returns(DeclaredType::Unknown("Report".into()));
        assert_eq!(generate_schema(&signature).unwrap().returns(), None);

        let signature = Signature::new("g").returns(DeclaredType::Null);
        assert_eq!(generate_schema(&signature).unwrap().returns(), None);
    }

    #[test]
    fn duplicate_parameters_rejected() {
        let signature = Signature::new("f").param_of::<i32>("x").param_of::<i32>("x");
        assert!(matches!(
            generate_schema(&signature),
            Err(SchemaError::DuplicateParameter { .. })
        ));
    }

    #[test]
    fn renders_function_json() {
        let signature = add_signature().param_of::<Vec<f64>>("weights").param(
            ParamSpec::of::<serde_json::Value>("options")
                .with_default()
                .with_description("Extra options"),
        );
        let rendered = generate_schema(&signature).unwrap().to_function_json();

        assert_eq!(rendered["type"], "function");
        assert_eq!(rendered["name"], "add");
        assert_eq!(rendered["parameters"]["required"], json!(["a", "b", "weights"]));
        assert_eq!(
            rendered["parameters"]["properties"]["weights"],
            json!({ "type": "array", "items": { "type": "number" } })
        );
        assert_eq!(
            rendered["parameters"]["properties"]["options"],
            json!({
                "type": "object",
                "additionalProperties": false,
                "description": "Extra options"
            })
        );
        assert_eq!(rendered["parameters"]["additionalProperties"], false);
    }
}
