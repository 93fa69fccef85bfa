//! Gate configuration

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// How the scope gate and the classifier gate combine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopePolicy {
    /// An open suppression scope AND a non-production verdict are required
    #[default]
    Required,
    /// An allowed-context verdict alone permits mutation; production still blocks
    ImplicitInAllowedContext,
}

/// Access gate configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Scope policy
    pub scope_policy: ScopePolicy,
    /// Log every permitted mutation at `warn` instead of `debug`
    pub warn_on_bypass: bool,
}

impl GateConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse configuration from a TOML document; missing keys keep defaults
    ///
    /// # Errors
    /// `ConfigError::Toml` if the document is malformed or names an unknown policy
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    /// With scope policy
    #[inline]
    #[must_use]
    pub fn with_scope_policy(mut self, policy: ScopePolicy) -> Self {
        self.scope_policy = policy;
        self
    }

    /// With bypass warnings
    #[inline]
    #[must_use]
    pub fn with_warn_on_bypass(mut self, enabled: bool) -> Self {
        self.warn_on_bypass = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_requires_scope() {
        let config = GateConfig::default();
        assert_eq!(config.scope_policy, ScopePolicy::Required);
        assert!(!config.warn_on_bypass);
    }

    #[test]
    fn from_toml() {
        let config = GateConfig::from_toml_str(
            r#"
            scope_policy = "implicit_in_allowed_context"
            warn_on_bypass = true
            "#,
        )
        .unwrap();

        assert_eq!(
            config,
            GateConfig::new()
                .with_scope_policy(ScopePolicy::ImplicitInAllowedContext)
                .with_warn_on_bypass(true)
        );
    }

    #[test]
    fn from_toml_rejects_unknown_policy() {
        assert!(GateConfig::from_toml_str(r#"scope_policy = "never""#).is_err());
    }

    #[test]
    fn empty_document_is_default() {
        assert_eq!(GateConfig::from_toml_str("").unwrap(), GateConfig::default());
    }
}
