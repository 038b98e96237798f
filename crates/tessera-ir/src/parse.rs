use std::collections::HashSet;

use crate::types::{ModeConfig, VariantsConfig};

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(#[from] ConfigError),
}

/// Structural problems that make a configuration unusable.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("duplicate argument name '{0}'")]
    DuplicateArg(String),

    #[error("argument name must not be empty")]
    EmptyArgName,

    #[error("random mode at position {0} has neither a test nor a time budget")]
    UnboundedRandomMode(usize),
}

pub fn parse_config(json: &str) -> Result<VariantsConfig, ParseError> {
    let config: VariantsConfig = serde_json::from_str(json)?;
    validate_modes(&config.modes)?;
    validate_arg_names(config.args.iter().map(|a| a.name.as_str()))?;
    Ok(config)
}

/// Reject random modes that could never end.
pub fn validate_modes(modes: &[ModeConfig]) -> Result<(), ConfigError> {
    for (i, mode) in modes.iter().enumerate() {
        if matches!(mode, ModeConfig::Random(_)) && mode.budget().is_unbounded() {
            return Err(ConfigError::UnboundedRandomMode(i));
        }
    }
    Ok(())
}

pub fn validate_arg_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for name in names {
        if name.is_empty() {
            return Err(ConfigError::EmptyArgName);
        }
        if !seen.insert(name) {
            return Err(ConfigError::DuplicateArg(name.to_string()));
        }
    }
    Ok(())
}
