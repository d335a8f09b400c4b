//! Profile-type schema model used to discover secure option names.

use indexmap::IndexMap;
use serde::Deserialize;

/// A named option contributed by a profile property.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionDefinition {
    /// Primary option name.
    pub name: String,
    /// Alternate names for the same option.
    #[serde(default)]
    pub aliases: Vec<String>,
}

/// One property of a profile schema.
///
/// A property may carry a single option definition, a list of them, or none
/// at all; [`ProfileProperty::resolved_options`] normalizes the three shapes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProfileProperty {
    /// Whether the property holds a secret.
    #[serde(default)]
    pub secure: bool,
    /// Single option contributed by this property.
    #[serde(default)]
    pub option_definition: Option<OptionDefinition>,
    /// Multiple options contributed by this property.
    #[serde(default)]
    pub option_definitions: Option<Vec<OptionDefinition>>,
}

impl ProfileProperty {
    /// Option names and aliases for this property.
    ///
    /// Falls back to the bare property key when the property declares no
    /// option definitions.
    pub fn resolved_options(&self, property_key: &str) -> Vec<OptionDefinition> {
        if let Some(definition) = &self.option_definition {
            return vec![definition.clone()];
        }
        if let Some(definitions) = &self.option_definitions {
            if !definitions.is_empty() {
                return definitions.clone();
            }
        }
        vec![OptionDefinition {
            name: property_key.to_string(),
            aliases: Vec::new(),
        }]
    }
}

/// The properties block of a profile type.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
pub struct ProfileSchema {
    /// Properties keyed by name, in declaration order.
    #[serde(default)]
    pub properties: IndexMap<String, ProfileProperty>,
}

/// A profile type and its schema.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileTypeSchema {
    /// Profile type name, for example `zosmf`.
    #[serde(rename = "type")]
    pub type_name: String,
    /// The schema describing the profile's properties.
    #[serde(default)]
    pub schema: ProfileSchema,
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::check;

    #[test]
    fn test_resolved_options_prefers_single_definition() {
        let property: ProfileProperty = serde_json::from_value(serde_json::json!({
            "secure": true,
            "optionDefinition": {"name": "password", "aliases": ["pw"]}
        }))
        .unwrap();

        let options = property.resolved_options("password");
        check!(options.len() == 1);
        check!(options[0].name == "password");
        check!(options[0].aliases == vec!["pw".to_string()]);
    }

    #[test]
    fn test_resolved_options_uses_definition_list() {
        let property: ProfileProperty = serde_json::from_value(serde_json::json!({
            "secure": true,
            "optionDefinitions": [
                {"name": "keyPassphrase"},
                {"name": "certKeyPassphrase", "aliases": ["ckp"]}
            ]
        }))
        .unwrap();

        let options = property.resolved_options("passphrase");
        check!(options.len() == 2);
        check!(options[1].aliases == vec!["ckp".to_string()]);
    }

    #[test]
    fn test_resolved_options_falls_back_to_property_key() {
        let property = ProfileProperty {
            secure: true,
            ..Default::default()
        };
        let options = property.resolved_options("secretValue");
        check!(options.len() == 1);
        check!(options[0].name == "secretValue");
        check!(options[0].aliases.is_empty());
    }

    #[test]
    fn test_schema_deserializes_from_json() {
        let schema: ProfileTypeSchema = serde_json::from_value(serde_json::json!({
            "type": "base",
            "schema": {
                "properties": {
                    "host": {"secure": false},
                    "password": {"secure": true, "optionDefinition": {"name": "password"}}
                }
            }
        }))
        .unwrap();

        check!(schema.type_name == "base");
        check!(schema.schema.properties.len() == 2);
        check!(schema.schema.properties["password"].secure);
    }
}
