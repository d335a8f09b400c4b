//! Credential censorship for logs, console output and diagnostics.
//!
//! A [`Censor`] owns a registry of censored option names and knows how to
//! scrub command-line arguments, parsed argument maps, arbitrary JSON values
//! and raw log text. Construct one per application context and pass it by
//! reference (or `Arc`) to the call sites that log or serialize; mutation is
//! not synchronized, so sharing across tasks requires external serialization
//! and the last writer wins.

use std::collections::BTreeSet;
use std::sync::Arc;

use cruet::Inflector;
use indexmap::IndexMap;
use regex::RegexBuilder;
use serde_json::Value;
use tracing::debug;

use crate::env::EnvSettings;
use crate::session::Session;

mod config;
mod schema;

pub use self::config::ConfigSource;
pub use self::schema::{OptionDefinition, ProfileProperty, ProfileSchema, ProfileTypeSchema};

/// Replacement written over every censored value.
pub const CENSOR_RESPONSE: &str = "****";

/// Option names censored in every context.
pub const MAIN_CENSORED_OPTIONS: &[&str] = &[
    "auth",
    "pw",
    "pass",
    "password",
    "passphrase",
    "credentials",
    "authentication",
    "basicAuth",
    "tv",
    "tokenValue",
    "certFilePassphrase",
];

/// Header names censored in every context.
pub const MAIN_CENSORED_HEADERS: &[&str] = &[
    "authorization",
    "proxy-authorization",
    "cookie",
    "set-cookie",
    "x-api-key",
];

/// Property names whose values are prompted for securely.
pub const MAIN_SECURE_PROMPT_OPTIONS: &[&str] =
    &["user", "password", "tokenValue", "passphrase", "keyPassphrase"];

/// Session keys masked by [`Censor::censor_session`].
const SESSION_SENSITIVE_KEYS: &[&str] =
    &["user", "password", "base64EncodedAuth", "tokenValue", "passphrase"];

/// Inputs for [`Censor::set_censored_options`].
#[derive(Default, derive_more::Debug)]
pub struct CensorOptions {
    /// Profile-type schemas to scan for secure properties.
    pub schemas: Vec<ProfileTypeSchema>,
    /// Profile types the current command uses; `None` scans every schema.
    pub profile_types: Option<Vec<String>>,
    /// Active team configuration, when one is loaded.
    #[debug(ignore)]
    pub config: Option<Arc<dyn ConfigSource>>,
    /// Parsed arguments of the current command.
    pub command_arguments: Option<IndexMap<String, Value>>,
    /// Environment prefix controlling the mask-output switch.
    pub env_prefix: Option<String>,
}

/// Registry of censored names plus the scrubbing operations built on it.
#[derive(Default, derive_more::Debug)]
pub struct Censor {
    censored: BTreeSet<String>,
    schemas: Vec<ProfileTypeSchema>,
    #[debug(ignore)]
    config: Option<Arc<dyn ConfigSource>>,
    env_prefix: Option<String>,
}

impl Censor {
    /// Creates a censor seeded with the default censored options and headers.
    pub fn new() -> Self {
        let mut censor = Self::default();
        censor.reset_to_defaults();
        censor
    }

    /// Names currently censored, in sorted order.
    pub fn censored_options(&self) -> impl Iterator<Item = &str> {
        self.censored.iter().map(String::as_str)
    }

    /// Whether the given name is censored.
    pub fn is_censored(&self, name: &str) -> bool {
        self.censored.contains(name)
    }

    /// Registers a censored option under its literal, camelCase and
    /// kebab-case spellings.
    pub fn add_censored_option(&mut self, name: &str) {
        if name.is_empty() {
            return;
        }
        self.censored.insert(name.to_string());
        self.censored.insert(name.to_camel_case());
        self.censored.insert(name.to_kebab_case());
    }

    fn reset_to_defaults(&mut self) {
        self.censored.clear();
        for option in MAIN_CENSORED_OPTIONS {
            self.add_censored_option(option);
        }
        for header in MAIN_CENSORED_HEADERS {
            self.add_censored_option(header);
        }
    }

    /// Rebuilds the censored-name registry.
    ///
    /// The registry is reset to the defaults, then secure properties from the
    /// supplied schemas (filtered to the command's profile types when given)
    /// contribute their option names and aliases, and finally the active
    /// configuration contributes the secure properties of the profiles the
    /// command addresses. Calling with `None` re-scans the cached schemas
    /// only. Idempotent for identical inputs.
    pub fn set_censored_options(&mut self, options: Option<CensorOptions>) {
        self.reset_to_defaults();

        let (profile_types, command_arguments) = match options {
            Some(options) => {
                self.schemas = options.schemas;
                if options.config.is_some() {
                    self.config = options.config;
                }
                if options.env_prefix.is_some() {
                    self.env_prefix = options.env_prefix;
                }
                (options.profile_types, options.command_arguments)
            }
            None => (None, None),
        };

        let schemas: Vec<ProfileTypeSchema> = self
            .schemas
            .iter()
            .filter(|schema| {
                profile_types
                    .as_ref()
                    .is_none_or(|types| types.contains(&schema.type_name))
            })
            .cloned()
            .collect();
        for schema in &schemas {
            for (key, property) in &schema.schema.properties {
                if !property.secure {
                    continue;
                }
                for option in property.resolved_options(key) {
                    self.add_censored_option(&option.name);
                    for alias in &option.aliases {
                        self.add_censored_option(alias);
                    }
                }
            }
        }

        let Some(config) = self.config.clone() else {
            return;
        };
        if !config.exists() {
            return;
        }
        match (&command_arguments, &profile_types) {
            (Some(arguments), Some(types)) => {
                for profile_type in types {
                    let profile_name = arguments
                        .get(&format!("{profile_type}-profile"))
                        .and_then(Value::as_str)
                        .map(ToString::to_string)
                        .or_else(|| config.default_profile(profile_type));
                    let Some(profile_name) = profile_name else {
                        continue;
                    };
                    if !config.profile_exists(&profile_name) {
                        continue;
                    }
                    for property in config.secure_props_for_profile(&profile_name) {
                        self.add_censored_option(&property);
                    }
                }
            }
            _ => {
                // no command context: censor every secure path's property name
                for path in config.find_secure() {
                    if let Some(segment) = path.rsplit('.').next() {
                        self.add_censored_option(segment);
                    }
                }
            }
        }
        debug!(count = self.censored.len(), "censored-option registry rebuilt");
    }

    /// Masks censored option values in a raw command line.
    ///
    /// Only the space-separated form (`--option value`) is recognized; an
    /// `--option=value` argument passes through unchanged.
    pub fn censor_cli_args(&self, args: &[String]) -> Vec<String> {
        let mut censored_args: Vec<String> = args.to_vec();
        for name in &self.censored {
            let dash_form = if name.chars().count() == 1 {
                format!("-{name}")
            } else {
                format!("--{name}")
            };
            for index in 0..censored_args.len() {
                if args[index] == dash_form && index + 1 < censored_args.len() {
                    censored_args[index + 1] = CENSOR_RESPONSE.to_string();
                }
            }
        }
        censored_args
    }

    /// Masks censored keys in a parsed-argument map.
    ///
    /// A value that equals the value of a censored key is masked under every
    /// key holding it, so unrecognized aliases cannot leak the secret.
    pub fn censor_parsed_args(&self, args: &IndexMap<String, Value>) -> IndexMap<String, Value> {
        let secret_values: Vec<&Value> = args
            .iter()
            .filter(|(key, value)| self.censored.contains(*key) && !value.is_null())
            .map(|(_, value)| value)
            .collect();

        args.iter()
            .map(|(key, value)| {
                let masked = self.censored.contains(key)
                    || secret_values.iter().any(|secret| *secret == value);
                if masked {
                    (key.clone(), Value::String(CENSOR_RESPONSE.to_string()))
                } else {
                    (key.clone(), value.clone())
                }
            })
            .collect()
    }

    /// Masks secure configuration values inside raw log or console text.
    ///
    /// Text is returned unchanged when no configuration is loaded, or when
    /// output masking was switched off via `<PREFIX>_APP_MASK_OUTPUT=FALSE`
    /// and the data is bound for the console or JSON output.
    pub fn censor_raw_data(&self, data: &str, category: &str) -> String {
        let Some(config) = &self.config else {
            return data.to_string();
        };
        if !config.exists() {
            return data.to_string();
        }
        if matches!(category, "console" | "json") && !self.mask_output_enabled() {
            return data.to_string();
        }

        let mut censored = data.to_string();
        for value in self.secure_values(config.as_ref()) {
            let Ok(pattern) = RegexBuilder::new(&regex::escape(&value))
                .case_insensitive(true)
                .build()
            else {
                continue;
            };
            censored = pattern.replace_all(&censored, CENSOR_RESPONSE).into_owned();
        }
        censored
    }

    /// Deep-copies a JSON value, masking censored keys and known secure
    /// values at every level.
    pub fn censor_object(&self, value: &Value) -> Value {
        let secure_values: Vec<String> = self
            .config
            .as_ref()
            .filter(|config| config.exists())
            .map(|config| self.secure_values(config.as_ref()))
            .unwrap_or_default();
        self.censor_value(value, &secure_values)
    }

    fn censor_value(&self, value: &Value, secure_values: &[String]) -> Value {
        match value {
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(key, value)| {
                        if self.censored.contains(key) {
                            (key.clone(), Value::String(CENSOR_RESPONSE.to_string()))
                        } else {
                            (key.clone(), self.censor_value(value, secure_values))
                        }
                    })
                    .collect(),
            ),
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.censor_value(item, secure_values))
                    .collect(),
            ),
            Value::String(text) if secure_values.iter().any(|secret| secret == text) => {
                Value::String(CENSOR_RESPONSE.to_string())
            }
            other => other.clone(),
        }
    }

    /// Whether a secure path holds a value the raw-text pass must not touch.
    ///
    /// Covers the prompt-only properties (user names and the like, which are
    /// flagged secure in configuration but are not secrets) and every option
    /// a profile schema marks secure, whose values are already masked where
    /// they are written.
    pub fn is_special_value(&self, path: &str) -> bool {
        let Some(segment) = path.rsplit('.').next() else {
            return false;
        };
        let mut special: Vec<String> = MAIN_SECURE_PROMPT_OPTIONS
            .iter()
            .map(ToString::to_string)
            .collect();
        for schema in &self.schemas {
            for (key, property) in &schema.schema.properties {
                if !property.secure {
                    continue;
                }
                for option in property.resolved_options(key) {
                    special.push(option.name.clone());
                    special.extend(option.aliases.iter().cloned());
                }
            }
        }
        special.iter().any(|name| name == segment)
    }

    /// Serializes a session with its sensitive fields masked.
    ///
    /// Never fails: a missing session yields a sentinel string and a
    /// serialization failure yields a descriptive message.
    pub fn censor_session(&self, session: Option<&Session>) -> String {
        let Some(session) = session else {
            return "<no session provided>".to_string();
        };
        let value = match serde_json::to_value(session) {
            Ok(value) => value,
            Err(err) => return format!("<session could not be serialized: {err}>"),
        };
        let masked = mask_session_keys(&value);
        serde_json::to_string(&masked)
            .unwrap_or_else(|err| format!("<session could not be serialized: {err}>"))
    }

    fn mask_output_enabled(&self) -> bool {
        match &self.env_prefix {
            Some(prefix) => EnvSettings::read(prefix).mask_output,
            None => true,
        }
    }

    fn secure_values(&self, config: &dyn ConfigSource) -> Vec<String> {
        config
            .find_secure()
            .iter()
            .filter(|path| !self.is_special_value(path))
            .filter_map(|path| config.value_at(path))
            .filter_map(|value| match value {
                Value::String(text) if !text.is_empty() => Some(text),
                Value::Number(number) => Some(number.to_string()),
                _ => None,
            })
            .collect()
    }
}

fn mask_session_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, value)| {
                    if SESSION_SENSITIVE_KEYS.contains(&key.as_str()) {
                        (key.clone(), Value::String(CENSOR_RESPONSE.to_string()))
                    } else {
                        (key.clone(), mask_session_keys(value))
                    }
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(mask_session_keys).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::check;
    use serde_json::json;

    use crate::session::AuthType;

    struct FakeConfig {
        secure_paths: Vec<(String, Value)>,
        profiles: Vec<(String, Vec<String>)>,
        defaults: Vec<(String, String)>,
    }

    impl ConfigSource for FakeConfig {
        fn exists(&self) -> bool {
            true
        }

        fn find_secure(&self) -> Vec<String> {
            self.secure_paths.iter().map(|(path, _)| path.clone()).collect()
        }

        fn secure_props_for_profile(&self, profile_name: &str) -> Vec<String> {
            self.profiles
                .iter()
                .find(|(name, _)| name == profile_name)
                .map(|(_, props)| props.clone())
                .unwrap_or_default()
        }

        fn profile_exists(&self, profile_name: &str) -> bool {
            self.profiles.iter().any(|(name, _)| name == profile_name)
        }

        fn default_profile(&self, profile_type: &str) -> Option<String> {
            self.defaults
                .iter()
                .find(|(kind, _)| kind == profile_type)
                .map(|(_, name)| name.clone())
        }

        fn value_at(&self, path: &str) -> Option<Value> {
            self.secure_paths
                .iter()
                .find(|(candidate, _)| candidate == path)
                .map(|(_, value)| value.clone())
        }
    }

    fn schema_with_secure_token() -> ProfileTypeSchema {
        serde_json::from_value(json!({
            "type": "base",
            "schema": {
                "properties": {
                    "host": {"secure": false},
                    "tokenValue": {
                        "secure": true,
                        "optionDefinition": {"name": "tokenValue", "aliases": ["tv"]}
                    },
                    "apiSecret": {"secure": true}
                }
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_defaults_include_camel_and_kebab_forms() {
        let censor = Censor::new();
        check!(censor.is_censored("tokenValue"));
        check!(censor.is_censored("token-value"));
        check!(censor.is_censored("certFilePassphrase"));
        check!(censor.is_censored("cert-file-passphrase"));
        check!(censor.is_censored("authorization"));
        check!(!censor.is_censored("hostname"));
    }

    #[test]
    fn test_set_censored_options_scans_schemas() {
        let mut censor = Censor::new();
        censor.set_censored_options(Some(CensorOptions {
            schemas: vec![schema_with_secure_token()],
            ..Default::default()
        }));

        check!(censor.is_censored("tv"));
        // property without an option definition falls back to its key
        check!(censor.is_censored("apiSecret"));
        check!(censor.is_censored("api-secret"));
        check!(!censor.is_censored("host"));
    }

    #[test]
    fn test_set_censored_options_is_idempotent() {
        let mut censor = Censor::new();
        let build = |censor: &mut Censor| {
            censor.set_censored_options(Some(CensorOptions {
                schemas: vec![schema_with_secure_token()],
                ..Default::default()
            }));
            censor.censored_options().map(ToString::to_string).collect::<Vec<_>>()
        };
        let first = build(&mut censor);
        censor.set_censored_options(None);
        let second = censor
            .censored_options()
            .map(ToString::to_string)
            .collect::<Vec<_>>();
        check!(first == second);
    }

    #[test]
    fn test_profile_type_filter_limits_schema_scan() {
        let mut censor = Censor::new();
        censor.set_censored_options(Some(CensorOptions {
            schemas: vec![schema_with_secure_token()],
            profile_types: Some(vec!["other".to_string()]),
            ..Default::default()
        }));
        check!(!censor.is_censored("apiSecret"));
    }

    #[test]
    fn test_config_pass_uses_profile_from_arguments() {
        let config = Arc::new(FakeConfig {
            secure_paths: vec![],
            profiles: vec![("lpar1".to_string(), vec!["dbPassword".to_string()])],
            defaults: vec![],
        });
        let mut arguments = IndexMap::new();
        arguments.insert("base-profile".to_string(), json!("lpar1"));

        let mut censor = Censor::new();
        censor.set_censored_options(Some(CensorOptions {
            schemas: vec![],
            profile_types: Some(vec!["base".to_string()]),
            config: Some(config),
            command_arguments: Some(arguments),
            ..Default::default()
        }));

        check!(censor.is_censored("dbPassword"));
        check!(censor.is_censored("db-password"));
    }

    #[test]
    fn test_config_pass_without_command_uses_secure_paths() {
        let config = Arc::new(FakeConfig {
            secure_paths: vec![(
                "profiles.lpar1.properties.apiKey".to_string(),
                json!("s3cr3t"),
            )],
            profiles: vec![],
            defaults: vec![],
        });

        let mut censor = Censor::new();
        censor.set_censored_options(Some(CensorOptions {
            schemas: vec![],
            config: Some(config),
            ..Default::default()
        }));
        check!(censor.is_censored("apiKey"));
    }

    #[test]
    fn test_censor_cli_args_masks_space_separated_values() {
        let censor = Censor::new();
        let args: Vec<String> = ["login", "--password", "secret", "--host", "example.com"]
            .iter()
            .map(ToString::to_string)
            .collect();

        let censored = censor.censor_cli_args(&args);
        check!(censored[2] == CENSOR_RESPONSE);
        check!(censored[4] == "example.com");
    }

    #[test]
    fn test_censor_cli_args_snapshot() {
        let censor = Censor::new();
        let args: Vec<String> = ["login", "--user", "jdoe", "--password", "secret", "--tv", "tok"]
            .iter()
            .map(ToString::to_string)
            .collect();
        insta::assert_snapshot!(
            censor.censor_cli_args(&args).join(" "),
            @"login --user jdoe --password **** --tv ****"
        );
    }

    #[test]
    fn test_censor_cli_args_leaves_equals_form_untouched() {
        let censor = Censor::new();
        let args = vec!["--password=secret".to_string()];
        check!(censor.censor_cli_args(&args) == args);
    }

    #[test]
    fn test_censor_cli_args_kebab_form_is_recognized() {
        let censor = Censor::new();
        let args: Vec<String> = ["--token-value", "abc123"]
            .iter()
            .map(ToString::to_string)
            .collect();
        let censored = censor.censor_cli_args(&args);
        check!(censored[1] == CENSOR_RESPONSE);
    }

    #[test]
    fn test_censor_parsed_args_masks_keys_and_duplicated_values() {
        let censor = Censor::new();
        let mut args = IndexMap::new();
        args.insert("host".to_string(), json!("example.com"));
        args.insert("password".to_string(), json!("hunter2"));
        args.insert("unknown-alias".to_string(), json!("hunter2"));

        let censored = censor.censor_parsed_args(&args);
        check!(censored["host"] == json!("example.com"));
        check!(censored["password"] == json!(CENSOR_RESPONSE));
        check!(censored["unknown-alias"] == json!(CENSOR_RESPONSE));
    }

    #[test]
    fn test_censor_raw_data_without_config_is_identity() {
        let censor = Censor::new();
        let text = "the password is hunter2";
        check!(censor.censor_raw_data(text, "console") == text);
    }

    #[test]
    fn test_censor_raw_data_replaces_secure_values_case_insensitively() {
        let config = Arc::new(FakeConfig {
            secure_paths: vec![(
                "profiles.lpar1.properties.apiKey".to_string(),
                json!("Hunter2"),
            )],
            profiles: vec![],
            defaults: vec![],
        });
        let mut censor = Censor::new();
        censor.set_censored_options(Some(CensorOptions {
            schemas: vec![],
            config: Some(config),
            ..Default::default()
        }));

        let censored = censor.censor_raw_data("value=HUNTER2 and hunter2", "log");
        check!(censored == format!("value={CENSOR_RESPONSE} and {CENSOR_RESPONSE}"));
    }

    #[test]
    fn test_censor_raw_data_skips_special_values() {
        // "user" is flagged secure in config but is a prompt-only property
        let config = Arc::new(FakeConfig {
            secure_paths: vec![(
                "profiles.lpar1.properties.user".to_string(),
                json!("jdoe"),
            )],
            profiles: vec![],
            defaults: vec![],
        });
        let mut censor = Censor::new();
        censor.set_censored_options(Some(CensorOptions {
            schemas: vec![],
            config: Some(config),
            ..Default::default()
        }));

        check!(censor.censor_raw_data("user jdoe logged in", "log") == "user jdoe logged in");
    }

    #[test]
    fn test_censor_object_masks_nested_keys() {
        let censor = Censor::new();
        let value = json!({
            "request": {
                "password": "hunter2",
                "headers": [{"cookie": "LtpaToken2=abc"}]
            },
            "host": "example.com"
        });

        let censored = censor.censor_object(&value);
        check!(censored["request"]["password"] == json!(CENSOR_RESPONSE));
        check!(censored["request"]["headers"][0]["cookie"] == json!(CENSOR_RESPONSE));
        check!(censored["host"] == json!("example.com"));
    }

    #[test]
    fn test_is_special_value_matches_trailing_segment() {
        let censor = Censor::new();
        check!(censor.is_special_value("profiles.lpar1.properties.user"));
        check!(censor.is_special_value("password"));
        check!(!censor.is_special_value("profiles.lpar1.properties.apiKey"));
    }

    #[test]
    fn test_is_special_value_covers_secure_schema_properties() {
        let mut censor = Censor::new();
        censor.set_censored_options(Some(CensorOptions {
            schemas: vec![schema_with_secure_token()],
            ..Default::default()
        }));

        // "apiSecret" is not a prompt option but the schema marks it secure
        check!(censor.is_special_value("profiles.lpar1.properties.apiSecret"));
        check!(censor.is_special_value("profiles.lpar1.properties.tokenValue"));
        check!(censor.is_special_value("tv"));
        check!(!censor.is_special_value("profiles.lpar1.properties.host"));
    }

    #[test]
    fn test_censor_raw_data_skips_secure_schema_property_values() {
        let config = Arc::new(FakeConfig {
            secure_paths: vec![(
                "profiles.lpar1.properties.apiSecret".to_string(),
                json!("s3cr3t-value"),
            )],
            profiles: vec![],
            defaults: vec![],
        });
        let mut censor = Censor::new();
        censor.set_censored_options(Some(CensorOptions {
            schemas: vec![schema_with_secure_token()],
            config: Some(config),
            ..Default::default()
        }));

        // already masked where it is written, so the raw-text pass leaves it
        let text = "uploaded with s3cr3t-value";
        check!(censor.censor_raw_data(text, "log") == text);
    }

    #[test]
    fn test_censor_session_masks_credentials_and_handles_none() {
        let censor = Censor::new();
        check!(censor.censor_session(None) == "<no session provided>");

        let session = Session::builder()
            .hostname("example.com")
            .auth_type(AuthType::Basic)
            .user("user")
            .password("hunter2")
            .build()
            .unwrap();

        let censored = censor.censor_session(Some(&session));
        let value: Value = serde_json::from_str(&censored).unwrap();
        check!(value["user"] == json!(CENSOR_RESPONSE));
        check!(value["password"] == json!(CENSOR_RESPONSE));
        check!(value["base64EncodedAuth"] == json!(CENSOR_RESPONSE));
        check!(value["hostname"] == json!("example.com"));
    }
}
