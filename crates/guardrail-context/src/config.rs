//! Classifier configuration
//!
//! Every indicator the built-in signals look for lives here, so a host can
//! tighten or widen the heuristics without replacing signals.

use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};

/// Compile-time build profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildProfile {
    /// Non-release build (`debug_assertions` on)
    Debug,
    /// Release build
    Release,
}

impl BuildProfile {
    /// Profile this crate was compiled with
    #[inline]
    #[must_use]
    pub const fn current() -> Self {
        if cfg!(debug_assertions) {
            Self::Debug
        } else {
            Self::Release
        }
    }

    /// Check if this is a non-release profile
    #[inline]
    #[must_use]
    pub const fn is_debug(self) -> bool {
        matches!(self, Self::Debug)
    }
}

impl Default for BuildProfile {
    fn default() -> Self {
        Self::current()
    }
}

/// Classifier configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Build profile; `Debug` short-circuits to an allowed verdict
    pub build_profile: BuildProfile,
    /// Environment variables naming the deployment environment
    pub environment_variables: Vec<String>,
    /// Values of those variables that mark a development environment
    pub development_values: Vec<String>,
    /// Values of those variables that mark production
    pub production_values: Vec<String>,
    /// Substrings of entry-module names and arguments that indicate a migration
    pub migration_patterns: Vec<String>,
    /// Process names of known migration tools (whole-name match)
    pub migration_tools: Vec<String>,
    /// Multi-word command lines that run migrations
    pub migration_commands: Vec<String>,
    /// Substrings of frame function / declaring names that indicate a migration
    pub migration_frame_patterns: Vec<String>,
    /// Frame function names that indicate a migration only as a whole segment
    pub migration_frame_names: Vec<String>,
    /// Substrings of loaded module names that belong to test frameworks
    pub test_framework_indicators: Vec<String>,
    /// Substrings of process names that belong to test runners
    pub test_runner_patterns: Vec<String>,
    /// Environment variables set by test harnesses
    pub test_harness_variables: Vec<String>,
    /// Treat cargo test harness binaries (`target/*/deps/name-<hash>`) as test runners
    pub detect_cargo_test_binaries: bool,
    /// Environment variables whose presence marks a hosting platform
    pub hosting_markers: Vec<String>,
    /// Substrings of process / module names typical for production services
    pub production_name_patterns: Vec<String>,
    /// Substrings that veto a production name match
    pub development_name_patterns: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            build_profile: BuildProfile::current(),
            environment_variables: strings(&[
                "ASPNETCORE_ENVIRONMENT",
                "DOTNET_ENVIRONMENT",
                "ENVIRONMENT",
            ]),
            development_values: strings(&["Development", "Local", "Dev"]),
            production_values: strings(&["Production"]),
            migration_patterns: strings(&["migration", "migrate"]),
            migration_tools: strings(&[
                "dotnet-ef",
                "ef",
                "diesel",
                "sqlx",
                "refinery",
                "sea-orm-cli",
                "flyway",
                "liquibase",
            ]),
            migration_commands: strings(&["database update", "db migrate"]),
            migration_frame_patterns: strings(&[
                "migration",
                "migrate",
                "dbcontext",
                "modelbuilder",
            ]),
            migration_frame_names: strings(&["up", "down"]),
            test_framework_indicators: strings(&[
                "xunit", "nunit", "mstest", "unittest", "testhost", "libtest",
            ]),
            test_runner_patterns: strings(&["testhost", "vstest", "nextest", "xunit", "nunit"]),
            test_harness_variables: strings(&["NEXTEST", "NEXTEST_RUN_ID", "RUST_TEST_THREADS"]),
            detect_cargo_test_binaries: true,
            hosting_markers: strings(&[
                "KUBERNETES_SERVICE_HOST",
                "AWS_LAMBDA_FUNCTION_NAME",
                "AWS_EXECUTION_ENV",
                "FUNCTIONS_WORKER_RUNTIME",
                "WEBSITE_SITE_NAME",
                "K_SERVICE",
                "ECS_CONTAINER_METADATA_URI_V4",
                "DYNO",
            ]),
            production_name_patterns: strings(&[
                "web",
                "api",
                "service",
                "server",
                "host",
                "production",
                "prod",
            ]),
            development_name_patterns: strings(&[
                "test",
                "integration",
                "migration",
                "dev",
                "debug",
                "local",
            ]),
        }
    }
}

impl ClassifierConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse configuration from a TOML document; missing keys keep defaults
    ///
    /// # Errors
    /// - `ConfigError::Toml` if the document is malformed
    /// - `ConfigError::EmptyPattern` if a pattern list holds an empty entry
    pub fn from_toml_str(source: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject pattern lists that would match everything
    ///
    /// # Errors
    /// `ConfigError::EmptyPattern` naming the first offending field
    pub fn validate(&self) -> ConfigResult<()> {
        let lists: [(&'static str, &Vec<String>); 14] = [
            ("environment_variables", &self.environment_variables),
            ("development_values", &self.development_values),
            ("production_values", &self.production_values),
            ("migration_patterns", &self.migration_patterns),
            ("migration_tools", &self.migration_tools),
            ("migration_commands", &self.migration_commands),
            ("migration_frame_patterns", &self.migration_frame_patterns),
            ("migration_frame_names", &self.migration_frame_names),
            ("test_framework_indicators", &self.test_framework_indicators),
            ("test_runner_patterns", &self.test_runner_patterns),
            ("test_harness_variables", &self.test_harness_variables),
            ("hosting_markers", &self.hosting_markers),
            ("production_name_patterns", &self.production_name_patterns),
            ("development_name_patterns", &self.development_name_patterns),
        ];
        for (field, list) in lists {
            if list.iter().any(|p| p.trim().is_empty()) {
                return Err(ConfigError::empty_pattern(field));
            }
        }
        Ok(())
    }

    /// With build profile
    #[inline]
    #[must_use]
    pub fn with_build_profile(mut self, profile: BuildProfile) -> Self {
        self.build_profile = profile;
        self
    }

    /// With an extra test framework indicator
    #[inline]
    #[must_use]
    pub fn with_test_framework(mut self, indicator: impl Into<String>) -> Self {
        self.test_framework_indicators.push(indicator.into());
        self
    }

    /// With an extra hosting platform marker
    #[inline]
    #[must_use]
    pub fn with_hosting_marker(mut self, variable: impl Into<String>) -> Self {
        self.hosting_markers.push(variable.into());
        self
    }

    /// With an extra migration tool name
    #[inline]
    #[must_use]
    pub fn with_migration_tool(mut self, tool: impl Into<String>) -> Self {
        self.migration_tools.push(tool.into());
        self
    }

    /// Enable or disable cargo test binary detection
    #[inline]
    #[must_use]
    pub fn with_cargo_test_detection(mut self, enabled: bool) -> Self {
        self.detect_cargo_test_binaries = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_profile_follows_compilation() {
        assert_eq!(
            ClassifierConfig::default().build_profile.is_debug(),
            cfg!(debug_assertions)
        );
    }

    #[test]
    fn toml_overrides_keep_remaining_defaults() {
        let config = ClassifierConfig::from_toml_str(
            r#"
            build_profile = "release"
            production_values = ["Production", "Live"]
            "#,
        )
        .unwrap();

        assert_eq!(config.build_profile, BuildProfile::Release);
        assert_eq!(config.production_values, vec!["Production", "Live"]);
        assert_eq!(
            config.environment_variables,
            ClassifierConfig::default().environment_variables
        );
    }

    #[test]
    fn toml_rejects_empty_pattern() {
        let err = ClassifierConfig::from_toml_str(r#"migration_patterns = ["migrate", ""]"#)
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::EmptyPattern {
                field: "migration_patterns"
            }
        ));
    }

    #[test]
    fn toml_rejects_malformed_document() {
        let err = ClassifierConfig::from_toml_str("build_profile = ").unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }

    #[test]
    fn builder_methods_append() {
        let config = ClassifierConfig::new()
            .with_build_profile(BuildProfile::Release)
            .with_test_framework("criterion")
            .with_hosting_marker("FLY_APP_NAME")
            .with_migration_tool("atlas");

        assert!(config.test_framework_indicators.contains(&"criterion".to_string()));
        assert!(config.hosting_markers.contains(&"FLY_APP_NAME".to_string()));
        assert!(config.migration_tools.contains(&"atlas".to_string()));
        assert!(config.validate().is_ok());
    }
}
