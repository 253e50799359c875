#![forbid(unsafe_code)]

//! Engine policy.
//!
//! [`EngineConfig`] decides which builtins a new
//! [`BindingEngine`](crate::BindingEngine) installs and names the member
//! that marks "the current view-model" in host chains. With the
//! `policy-config` feature it can be loaded from TOML; missing keys keep
//! their defaults.
//!
//! ```toml
//! view_model_member = "DataContext"
//! warn_on_unobservable = false
//! install_default_hooks = true
//! ```

/// Policy knobs for a binding engine.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "policy-config", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "policy-config", serde(default, deny_unknown_fields))]
pub struct EngineConfig {
    /// Member name that marks the current view-model in a host chain.
    /// Chains passing through it do not replay values onto a new host
    /// unless the new host's property is at its default.
    pub view_model_member: String,
    /// Log a warning the first time a property without change
    /// notifications is observed.
    pub warn_on_unobservable: bool,
    /// Register the builtin identity/display/parse/widening converters.
    pub install_default_converters: bool,
    /// Register the builtin null-target hook.
    pub install_default_hooks: bool,
    /// Register the builtin notifying and static observation adapters.
    pub install_default_observers: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            view_model_member: "ViewModel".to_owned(),
            warn_on_unobservable: true,
            install_default_converters: true,
            install_default_hooks: true,
            install_default_observers: true,
        }
    }
}

impl EngineConfig {
    /// A config with no builtins installed; handy for tests that register
    /// exactly what they need.
    #[must_use]
    pub fn bare() -> Self {
        Self {
            install_default_converters: false,
            install_default_hooks: false,
            install_default_observers: false,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_view_model_member(mut self, name: impl Into<String>) -> Self {
        self.view_model_member = name.into();
        self
    }
}

/// Failure to load an [`EngineConfig`].
#[cfg(feature = "policy-config")]
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file `{}`: {source}", .path.display())]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[cfg(feature = "policy-config")]
impl EngineConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file.
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.view_model_member.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "view_model_member must not be empty".to_owned(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_install_everything() {
        let config = EngineConfig::default();
        assert_eq!(config.view_model_member, "ViewModel");
        assert!(config.warn_on_unobservable);
        assert!(config.install_default_converters);
        assert!(config.install_default_hooks);
        assert!(config.install_default_observers);
    }

    #[test]
    fn bare_installs_nothing() {
        let config = EngineConfig::bare().with_view_model_member("DataContext");
        assert!(!config.install_default_converters);
        assert!(!config.install_default_hooks);
        assert!(!config.install_default_observers);
        assert_eq!(config.view_model_member, "DataContext");
    }
}
