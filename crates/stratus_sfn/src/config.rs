//! State machine configuration.

use crate::error::{BuildError, BuildResult};
use crate::validate::Validator;
use serde::{Deserialize, Serialize};
use stratus_core::Duration;

/// Kind of state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MachineType {
    /// Long-running, exactly-once executions
    #[default]
    Standard,
    /// Short, high-volume executions
    Express,
}

impl MachineType {
    /// Get the type name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "STANDARD",
            Self::Express => "EXPRESS",
        }
    }
}

impl std::fmt::Display for MachineType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options applied when compiling a workflow into a definition
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MachineConfig {
    /// Kind of machine
    pub machine_type: MachineType,
    /// Top-level comment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Maximum execution time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,
    /// Maximum states in the composed graph (0 = no limit)
    pub max_states: usize,
}

impl MachineConfig {
    /// Create a default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load and check a configuration from JSON
    ///
    /// # Errors
    ///
    /// Returns error if the text is not valid JSON, has unknown keys, or
    /// fails [`MachineConfig::check`]
    pub fn from_json_str(input: &str) -> BuildResult<Self> {
        let config: Self = serde_json::from_str(input)?;
        config.check()?;
        Ok(config)
    }

    /// Check values serde cannot
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Config`] for a zero timeout
    pub fn check(&self) -> BuildResult<()> {
        if self.timeout.is_some_and(|t| t.is_zero()) {
            return Err(BuildError::Config(
                "timeout must be at least 1 second".to_string(),
            ));
        }
        Ok(())
    }

    /// Validator enforcing this configuration
    #[must_use]
    pub fn validator(&self) -> Validator {
        Validator::new()
            .with_max_states(self.max_states)
            .with_machine_type(self.machine_type)
    }

    /// Set machine type
    #[must_use]
    pub fn with_machine_type(mut self, machine_type: MachineType) -> Self {
        self.machine_type = machine_type;
        self
    }

    /// Set comment
    #[must_use]
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Set timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set maximum state count
    #[must_use]
    pub fn with_max_states(mut self, max: usize) -> Self {
        self.max_states = max;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MachineConfig::default();
        assert_eq!(config.machine_type, MachineType::Standard);
        assert_eq!(config.max_states, 0);
        assert!(config.comment.is_none());
        assert!(config.check().is_ok());
    }

    #[test]
    fn test_from_json_str() {
        let config = MachineConfig::from_json_str(
            r#"{"machine_type": "EXPRESS", "timeout": "5 minutes", "max_states": 50}"#,
        )
        .unwrap();
        assert_eq!(config.machine_type, MachineType::Express);
        assert_eq!(config.timeout, Some(Duration::from_mins(5)));
        assert_eq!(config.max_states, 50);

        let validator = config.validator();
        assert_eq!(validator.max_states, 50);
        assert_eq!(validator.machine_type, MachineType::Express);
    }

    #[test]
    fn test_from_json_str_rejects_unknown_keys() {
        let result = MachineConfig::from_json_str(r#"{"machine": "EXPRESS"}"#);
        assert!(matches!(result, Err(BuildError::Core(_))));
    }

    #[test]
    fn test_from_json_str_rejects_bad_duration() {
        assert!(MachineConfig::from_json_str(r#"{"timeout": "soon"}"#).is_err());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let result = MachineConfig::from_json_str(r#"{"timeout": "0 seconds"}"#);
        assert_eq!(
            result,
            Err(BuildError::Config(
                "timeout must be at least 1 second".to_string()
            ))
        );
    }

    #[test]
    fn test_builders() {
        let config = MachineConfig::new()
            .with_comment("orders")
            .with_timeout(Duration::from_hours(1))
            .with_machine_type(MachineType::Express)
            .with_max_states(10);
        assert_eq!(config.comment.as_deref(), Some("orders"));
        assert_eq!(config.timeout.map(|t| t.as_secs()), Some(3600));
        assert_eq!(config.machine_type.to_string(), "EXPRESS");
    }
}
