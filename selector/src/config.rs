//! Configuration: which ORM instance selectors run against, and where its
//! state lives in the host state tree.
//!
//! Selectors resolve their configuration every time they are invoked, through
//! a [`ConfigSource`]. Two sources ship with the crate:
//!
//! - [`OrmConfig`], passed explicitly to a factory;
//! - [`GlobalConfig`], a per-thread default slot that is filled once during
//!   application setup and read by [`select_data`](crate::select_data).

use orm_engine::Orm;
use std::cell::RefCell;
use std::env;
use std::rc::Rc;

/// State-tree key holding the ORM state unless configured otherwise.
pub const DEFAULT_STATE_KEY: &str = "data";

/// Environment variable overriding the state key.
pub const STATE_KEY_ENV: &str = "ORM_SELECTOR_STATE_KEY";

/// Environment variable switching to [`MissingSlice::Fail`].
pub const STRICT_SLICES_ENV: &str = "ORM_SELECTOR_STRICT_SLICES";

/// What to do when the state tree has nothing under the state key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingSlice {
    /// Read from the engine's empty state.
    #[default]
    UseEmpty,
    /// Fail with [`ConfigError::MissingDbState`].
    Fail,
}

/// Selector configuration.
#[derive(Debug, Clone, Default)]
pub struct OrmConfig {
    /// ORM instance to open sessions with
    pub instance: Option<Rc<Orm>>,
    /// State-tree key holding the ORM state
    pub state_key: Option<String>,
    /// Policy for a missing state slice
    pub missing_slice: MissingSlice,
}

impl OrmConfig {
    /// Configuration for `orm` with the default state key.
    pub fn new(orm: impl Into<Rc<Orm>>) -> Self {
        Self {
            instance: Some(orm.into()),
            state_key: Some(DEFAULT_STATE_KEY.to_string()),
            missing_slice: MissingSlice::default(),
        }
    }

    pub fn with_state_key(mut self, key: impl Into<String>) -> Self {
        self.state_key = Some(key.into());
        self
    }

    pub fn with_missing_slice(mut self, policy: MissingSlice) -> Self {
        self.missing_slice = policy;
        self
    }

    /// Load overrides from environment variables.
    pub fn from_env(orm: impl Into<Rc<Orm>>) -> Result<Self, ConfigError> {
        Self::from_lookup(orm, |name| env::var(name).ok())
    }

    /// Load overrides from any variable lookup.
    pub fn from_lookup<F>(orm: impl Into<Rc<Orm>>, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::new(orm);

        if let Some(key) = lookup(STATE_KEY_ENV) {
            config.state_key = Some(key);
        }

        if let Some(value) = lookup(STRICT_SLICES_ENV) {
            config.missing_slice = match value.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => MissingSlice::Fail,
                "0" | "false" | "no" | "" => MissingSlice::UseEmpty,
                _ => {
                    return Err(ConfigError::InvalidFlag {
                        name: STRICT_SLICES_ENV.to_string(),
                        value,
                    })
                }
            };
        }

        Ok(config)
    }
}

/// A configuration with every required part present.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub orm: Rc<Orm>,
    pub state_key: String,
    pub missing_slice: MissingSlice,
}

/// Supplies the configuration a selector runs with.
///
/// Called on every selector invocation, so changes to the underlying source
/// are picked up by selectors built earlier.
pub trait ConfigSource {
    fn resolve(&self) -> Result<ResolvedConfig, ConfigError>;
}

impl ConfigSource for OrmConfig {
    fn resolve(&self) -> Result<ResolvedConfig, ConfigError> {
        let orm = self.instance.clone().ok_or(ConfigError::MissingInstance)?;
        let state_key = self
            .state_key
            .clone()
            .filter(|key| !key.is_empty())
            .ok_or(ConfigError::MissingStateKey)?;

        Ok(ResolvedConfig {
            orm,
            state_key,
            missing_slice: self.missing_slice,
        })
    }
}

impl ConfigSource for Rc<Orm> {
    fn resolve(&self) -> Result<ResolvedConfig, ConfigError> {
        Ok(ResolvedConfig {
            orm: Rc::clone(self),
            state_key: DEFAULT_STATE_KEY.to_string(),
            missing_slice: MissingSlice::default(),
        })
    }
}

thread_local! {
    static GLOBAL_CONFIG: RefCell<Option<OrmConfig>> = const { RefCell::new(None) };
}

/// Install the default configuration for this thread, returning the old one.
pub fn set_global_config(config: OrmConfig) -> Option<OrmConfig> {
    GLOBAL_CONFIG.with(|slot| slot.borrow_mut().replace(config))
}

/// Remove the default configuration for this thread.
pub fn clear_global_config() -> Option<OrmConfig> {
    GLOBAL_CONFIG.with(|slot| slot.borrow_mut().take())
}

/// Edit the default configuration in place. Returns `None` if none is set.
pub fn update_global_config<R>(f: impl FnOnce(&mut OrmConfig) -> R) -> Option<R> {
    GLOBAL_CONFIG.with(|slot| slot.borrow_mut().as_mut().map(f))
}

/// The per-thread default configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobalConfig;

impl ConfigSource for GlobalConfig {
    fn resolve(&self) -> Result<ResolvedConfig, ConfigError> {
        GLOBAL_CONFIG.with(|slot| {
            slot.borrow()
                .as_ref()
                .ok_or(ConfigError::MissingConfig)?
                .resolve()
        })
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("the global ORM config should be set before using `select_data`")]
    MissingConfig,

    #[error("impossible to find the ORM instance to use; make sure the config's instance is set to the ORM instance you want to use with `select_data`")]
    MissingInstance,

    #[error("impossible to find the state key from the config; make sure the config's state key is set to a non-empty value")]
    MissingStateKey,

    #[error("impossible to find the DB state under '{key}'; make sure the state key is configured and that a reducer is running your ORM")]
    MissingDbState { key: String },

    #[error("the DB state under '{key}' could not be read: {reason}")]
    InvalidDbState { key: String, reason: String },

    #[error("invalid {name} value: {value}")]
    InvalidFlag { name: String, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn orm() -> Rc<Orm> {
        Rc::new(Orm::default())
    }

    #[test]
    fn explicit_config_defaults() {
        let resolved = OrmConfig::new(orm()).resolve().unwrap();
        assert_eq!(resolved.state_key, DEFAULT_STATE_KEY);
        assert_eq!(resolved.missing_slice, MissingSlice::UseEmpty);
    }

    #[test]
    fn explicit_config_missing_parts() {
        let config = OrmConfig {
            instance: None,
            ..OrmConfig::new(orm())
        };
        assert_eq!(config.resolve().unwrap_err(), ConfigError::MissingInstance);

        let config = OrmConfig {
            state_key: None,
            ..OrmConfig::new(orm())
        };
        assert_eq!(config.resolve().unwrap_err(), ConfigError::MissingStateKey);

        let config = OrmConfig::new(orm()).with_state_key("");
        assert_eq!(config.resolve().unwrap_err(), ConfigError::MissingStateKey);
    }

    #[test]
    fn bare_instance_is_a_source() {
        let resolved = orm().resolve().unwrap();
        assert_eq!(resolved.state_key, DEFAULT_STATE_KEY);
    }

    #[test]
    fn config_from_lookup() {
        let vars: HashMap<&str, &str> =
            HashMap::from([(STATE_KEY_ENV, "orm"), (STRICT_SLICES_ENV, "true")]);
        let config =
            OrmConfig::from_lookup(orm(), |name| vars.get(name).map(|v| v.to_string())).unwrap();

        assert_eq!(config.state_key.as_deref(), Some("orm"));
        assert_eq!(config.missing_slice, MissingSlice::Fail);
    }

    #[test]
    fn config_from_empty_lookup() {
        let config = OrmConfig::from_lookup(orm(), |_| None).unwrap();
        assert_eq!(config.state_key.as_deref(), Some(DEFAULT_STATE_KEY));
        assert_eq!(config.missing_slice, MissingSlice::UseEmpty);
    }

    #[test]
    fn config_rejects_bad_flag() {
        let result = OrmConfig::from_lookup(orm(), |name| {
            (name == STRICT_SLICES_ENV).then(|| "maybe".to_string())
        });
        assert!(matches!(result, Err(ConfigError::InvalidFlag { value, .. }) if value == "maybe"));
    }

    #[test]
    fn global_config_lifecycle() {
        clear_global_config();
        assert_eq!(
            GlobalConfig.resolve().unwrap_err(),
            ConfigError::MissingConfig
        );

        set_global_config(OrmConfig::new(orm()));
        assert!(GlobalConfig.resolve().is_ok());

        update_global_config(|config| config.state_key = None);
        assert_eq!(
            GlobalConfig.resolve().unwrap_err(),
            ConfigError::MissingStateKey
        );

        assert!(clear_global_config().is_some());
        assert_eq!(update_global_config(|_| ()), None);
    }
}
