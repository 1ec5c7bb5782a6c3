//! On/off switch for the pass.
//!
//! Build tools hand configuration over in whatever shape their users wrote
//! it: a bare `false`, an object such as `{"removeInlinedClasses": false}`,
//! or something else entirely. Only an explicit `false` turns the pass off;
//! every other shape means "enabled, defaults".

use crate::error::InlineCullError;
use serde_json::Value;

/// Object key holding the switch.
pub const REMOVE_INLINED_CLASSES_KEY: &str = "removeInlinedClasses";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    pub remove_inlined_classes: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            remove_inlined_classes: true,
        }
    }
}

impl Config {
    pub fn disabled() -> Self {
        Config {
            remove_inlined_classes: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.remove_inlined_classes
    }

    /// Strict variant of [`Config::from_value`]: shapes that are neither a
    /// boolean nor an object are reported instead of defaulted.
    pub fn try_from_value(value: &Value) -> Result<Config, InlineCullError> {
        match value {
            Value::Bool(enabled) => Ok(Config {
                remove_inlined_classes: *enabled,
            }),
            Value::Object(map) => Ok(Config {
                remove_inlined_classes: map.get(REMOVE_INLINED_CLASSES_KEY)
                    != Some(&Value::Bool(false)),
            }),
            Value::Null => Ok(Config::default()),
            other => Err(InlineCullError::Config(format!(
                "expected a boolean or an object, got `{}`",
                other
            ))),
        }
    }

    pub fn from_value(value: &Value) -> Config {
        Config::try_from_value(value).unwrap_or_else(|err| {
            log::warn!("{}; falling back to defaults", err);
            Config::default()
        })
    }

    pub fn from_json(text: &str) -> Config {
        match serde_json::from_str::<Value>(text) {
            Ok(value) => Config::from_value(&value),
            Err(err) => {
                log::warn!(
                    "{}; falling back to defaults",
                    InlineCullError::Config(err.to_string())
                );
                Config::default()
            }
        }
    }
}

impl From<bool> for Config {
    fn from(enabled: bool) -> Self {
        Config {
            remove_inlined_classes: enabled,
        }
    }
}

impl From<&Value> for Config {
    fn from(value: &Value) -> Self {
        Config::from_value(value)
    }
}
