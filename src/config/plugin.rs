//! Plugin declarations from the repeatable `--plugin` flag.
//!
//! # Format
//! ```text
//! --plugin <type>:<name>[:<json>]
//! ```
//! Splitting stops after the second `:`, so the JSON parameters may
//! contain colons of their own.
//!
//! # Design Decisions
//! - Declaration order is preserved; plugins may form ordered chains
//! - Duplicates are kept, uniqueness is the consumer's call
//! - A rejected occurrence leaves the collection untouched

use std::fmt;
use std::str::FromStr;

use clap::{ArgMatches, Args, Command, FromArgMatches};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::config::flags::{self, FlagValue, ValueType};

/// Name of the repeatable plugin flag.
pub const PLUGIN_FLAG: &str = "plugin";

/// Errors produced while parsing one `--plugin` occurrence.
#[derive(Debug, Error)]
pub enum PluginSpecError {
    #[error("missing type in plugin spec {raw:?}")]
    MissingType { raw: String },

    #[error("missing name in plugin spec {raw:?}")]
    MissingName { raw: String },

    #[error("invalid JSON parameters in plugin spec {raw:?}: {source}")]
    InvalidParameters {
        raw: String,
        #[source]
        source: serde_json::Error,
    },
}

/// One declared plugin instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginSpec {
    /// Plugin implementation to instantiate.
    #[serde(rename = "type")]
    pub plugin_type: String,

    /// Name of this instance.
    pub name: String,

    /// Free-form parameters handed to the plugin factory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
}

impl FromStr for PluginSpec {
    type Err = PluginSpecError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let mut parts = raw.splitn(3, ':');

        let plugin_type = parts.next().map(str::trim).unwrap_or_default();
        if plugin_type.is_empty() {
            return Err(PluginSpecError::MissingType { raw: raw.to_string() });
        }

        let name = parts.next().map(str::trim).unwrap_or_default();
        if name.is_empty() {
            return Err(PluginSpecError::MissingName { raw: raw.to_string() });
        }

        let parameters = match parts.next() {
            Some(json) if !json.trim().is_empty() => Some(
                serde_json::from_str(json).map_err(|source| {
                    PluginSpecError::InvalidParameters {
                        raw: raw.to_string(),
                        source,
                    }
                })?,
            ),
            _ => None,
        };

        Ok(Self {
            plugin_type: plugin_type.to_string(),
            name: name.to_string(),
            parameters,
        })
    }
}

impl fmt::Display for PluginSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.plugin_type, self.name)?;
        if let Some(parameters) = &self.parameters {
            write!(f, ":{parameters}")?;
        }
        Ok(())
    }
}

/// Ordered plugin declarations, one per `--plugin` occurrence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PluginSpecs(Vec<PluginSpec>);

impl PluginSpecs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PluginSpec> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[PluginSpec] {
        &self.0
    }
}

impl FlagValue for PluginSpecs {
    type Err = PluginSpecError;

    fn set(&mut self, raw: &str) -> Result<(), PluginSpecError> {
        let spec = raw.parse()?;
        self.0.push(spec);
        Ok(())
    }

    fn value_type(&self) -> ValueType {
        ValueType::Repeated("TYPE:NAME[:JSON]")
    }
}

impl fmt::Display for PluginSpecs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, spec) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{spec}")?;
        }
        f.write_str("]")
    }
}

impl<'a> IntoIterator for &'a PluginSpecs {
    type Item = &'a PluginSpec;
    type IntoIter = std::slice::Iter<'a, PluginSpec>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl IntoIterator for PluginSpecs {
    type Item = PluginSpec;
    type IntoIter = std::vec::IntoIter<PluginSpec>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl Args for PluginSpecs {
    fn augment_args(cmd: Command) -> Command {
        cmd.arg(flags::value_arg(
            &Self::default(),
            PLUGIN_FLAG,
            "Repeatable. --plugin <type>:<name>[:<json>]",
        ))
    }

    fn augment_args_for_update(cmd: Command) -> Command {
        Self::augment_args(cmd)
    }
}

impl FromArgMatches for PluginSpecs {
    fn from_arg_matches(matches: &ArgMatches) -> Result<Self, clap::Error> {
        let mut specs = Self::default();
        specs.update_from_arg_matches(matches)?;
        Ok(specs)
    }

    fn update_from_arg_matches(&mut self, matches: &ArgMatches) -> Result<(), clap::Error> {
        flags::apply_value(self, matches, PLUGIN_FLAG)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_type_and_name() {
        let spec: PluginSpec = "body-field:model".parse().unwrap();
        assert_eq!(spec.plugin_type, "body-field");
        assert_eq!(spec.name, "model");
        assert_eq!(spec.parameters, None);
    }

    #[test]
    fn test_parse_with_parameters() {
        let spec: PluginSpec = r#"header:route:{"header":"x-model","max":3}"#.parse().unwrap();
        assert_eq!(spec.plugin_type, "header");
        assert_eq!(spec.name, "route");
        assert_eq!(spec.parameters, Some(json!({"header": "x-model", "max": 3})));
    }

    #[test]
    fn test_colons_inside_json_are_kept() {
        let spec: PluginSpec = r#"plugin:inst:{"a":"x:y"}"#.parse().unwrap();
        assert_eq!(spec.name, "inst");
        assert_eq!(spec.parameters, Some(json!({"a": "x:y"})));
    }

    #[test]
    fn test_empty_parameters_segment_is_absent() {
        let spec: PluginSpec = "a:b:".parse().unwrap();
        assert_eq!(spec.parameters, None);
    }

    #[test]
    fn test_missing_type() {
        for raw in ["", ":name", " :name:{}"] {
            let err = raw.parse::<PluginSpec>().unwrap_err();
            assert!(matches!(err, PluginSpecError::MissingType { .. }), "{raw:?}");
        }
    }

    #[test]
    fn test_missing_name() {
        for raw in ["type", "type:", "type::{}"] {
            let err = raw.parse::<PluginSpec>().unwrap_err();
            assert!(matches!(err, PluginSpecError::MissingName { .. }), "{raw:?}");
        }
    }

    #[test]
    fn test_invalid_json() {
        let err = "a:b:{not json".parse::<PluginSpec>().unwrap_err();
        assert!(matches!(err, PluginSpecError::InvalidParameters { .. }));
        assert!(err.to_string().contains("\"a:b:{not json\""));
    }

    #[test]
    fn test_set_appends_in_order() {
        let mut specs = PluginSpecs::new();
        specs.set("a:b").unwrap();
        specs.set("c:d").unwrap();
        specs.set("a:b").unwrap();

        let names: Vec<_> = specs
            .iter()
            .map(|s| (s.plugin_type.as_str(), s.name.as_str()))
            .collect();
        assert_eq!(names, vec![("a", "b"), ("c", "d"), ("a", "b")]);
    }

    #[test]
    fn test_failed_set_leaves_collection_unchanged() {
        let mut specs = PluginSpecs::new();
        specs.set("a:b").unwrap();
        assert!(specs.set("c").is_err());
        assert!(specs.set("c:d:[").is_err());
        assert_eq!(specs.len(), 1);
    }

    #[test]
    fn test_display_and_type_tag() {
        let mut specs = PluginSpecs::new();
        assert_eq!(specs.to_string(), "[]");

        specs.set("a:b").unwrap();
        specs.set(r#"c:d:{"k":1}"#).unwrap();
        assert_eq!(specs.to_string(), r#"[a:b, c:d:{"k":1}]"#);
        assert!(specs.value_type().is_repeated());
    }

    #[test]
    fn test_serializes_with_type_key() {
        let spec: PluginSpec = "a:b".parse().unwrap();
        let value = serde_json::to_value(&spec).unwrap();
        assert_eq!(value, json!({"type": "a", "name": "b"}));
    }
}
