//! Plan TOML parser with validation.
//!
//! Parses a plan definition string into a [`PlanToml`] and validates:
//! - The plan name is a machine name (`[a-z0-9_-]+`).
//! - Endpoint names are non-empty and unique.
//! - Plugin sections name a plugin when they carry config.

use std::collections::HashSet;

use thiserror::Error;

use super::toml_format::{PlanToml, PluginSection};

/// Errors that can occur during plan parsing and validation.
#[derive(Debug, Error)]
pub enum PlanParseError {
    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("invalid plan name {0:?} (expected lowercase letters, digits, '_' or '-')")]
    InvalidName(String),

    #[error("endpoint names must not be empty")]
    EmptyEndpoint,

    #[error("duplicate endpoint: {0:?}")]
    DuplicateEndpoint(String),

    #[error("[{section}] has a config table but no plugin")]
    ConfigWithoutPlugin { section: &'static str },
}

/// Parse and validate a plan definition.
pub fn parse_plan_toml(content: &str) -> Result<PlanToml, PlanParseError> {
    let plan: PlanToml = toml::from_str(content)?;
    validate(&plan)?;
    Ok(plan)
}

/// Whether `name` can be used as a plan's machine name.
pub fn is_machine_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_' || b == b'-')
}

fn validate(plan: &PlanToml) -> Result<(), PlanParseError> {
    if !is_machine_name(&plan.plan.name) {
        return Err(PlanParseError::InvalidName(plan.plan.name.clone()));
    }

    let mut seen = HashSet::new();
    for endpoint in &plan.plan.endpoints {
        if endpoint.trim().is_empty() {
            return Err(PlanParseError::EmptyEndpoint);
        }
        if !seen.insert(endpoint.as_str()) {
            return Err(PlanParseError::DuplicateEndpoint(endpoint.clone()));
        }
    }

    check_section("aggregator", plan.aggregator.as_ref())?;
    check_section("processor", plan.processor.as_ref())?;
    Ok(())
}

fn check_section(
    section: &'static str,
    plugin: Option<&PluginSection>,
) -> Result<(), PlanParseError> {
    match plugin {
        Some(p) if p.plugin.trim().is_empty() && !p.config.is_empty() => {
            Err(PlanParseError::ConfigWithoutPlugin { section })
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_valid_plan() {
        let toml_str = r#"
[plan]
name = "site-sync"
endpoints = ["staging", "prod"]

[processor]
plugin = "dry_run"
"#;
        let plan = parse_plan_toml(toml_str).expect("should parse");
        assert_eq!(plan.plan.name, "site-sync");
        assert_eq!(plan.processor.unwrap().plugin, "dry_run");
    }

    #[test]
    fn reject_invalid_toml() {
        let err = parse_plan_toml("this is not valid toml {{{").unwrap_err();
        assert!(matches!(err, PlanParseError::TomlError(_)));
    }

    #[test]
    fn reject_missing_plan_table() {
        let err = parse_plan_toml("[processor]\nplugin = \"dry_run\"\n").unwrap_err();
        assert!(matches!(err, PlanParseError::TomlError(_)));
    }

    #[test]
    fn reject_non_machine_name() {
        for name in ["Site Sync", "", "site.sync", "SITE"] {
            let toml_str = format!("[plan]\nname = {name:?}\n");
            let err = parse_plan_toml(&toml_str).unwrap_err();
            assert!(
                matches!(err, PlanParseError::InvalidName(ref n) if n == name),
                "{name:?}: {err}"
            );
        }
    }

    #[test]
    fn reject_duplicate_endpoint() {
        let toml_str = r#"
[plan]
name = "dup"
endpoints = ["staging", "prod", "staging"]
"#;
        let err = parse_plan_toml(toml_str).unwrap_err();
        assert_eq!(err.to_string(), "duplicate endpoint: \"staging\"");
    }

    #[test]
    fn reject_empty_endpoint() {
        let toml_str = r#"
[plan]
name = "blank"
endpoints = ["staging", ""]
"#;
        let err = parse_plan_toml(toml_str).unwrap_err();
        assert!(matches!(err, PlanParseError::EmptyEndpoint));
    }

    #[test]
    fn reject_config_without_plugin() {
        let toml_str = r#"
[plan]
name = "loose"

[aggregator]
plugin = ""

[aggregator.config]
entities = {}
"#;
        let err = parse_plan_toml(toml_str).unwrap_err();
        assert_eq!(err.to_string(), "[aggregator] has a config table but no plugin");
    }

    #[test]
    fn empty_plugin_without_config_is_allowed() {
        let toml_str = r#"
[plan]
name = "gather"

[processor]
plugin = ""
"#;
        assert!(parse_plan_toml(toml_str).is_ok());
    }

    #[test]
    fn machine_names() {
        assert!(is_machine_name("site_sync-2"));
        assert!(!is_machine_name("site sync"));
        assert!(!is_machine_name(""));
    }
}
