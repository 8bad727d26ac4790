//! Per-column marshal hooks
//!
//! A hook converts a field on its way to the database (marshal), converts
//! the column text on its way back (unmarshal), and may carry a default
//! used when a NOT NULL column would otherwise receive NULL.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::traits::ToValue;
use crate::value::Value;

pub type MarshalFn = Arc<dyn Fn(Value) -> Result<Value> + Send + Sync>;
pub type UnmarshalFn = Arc<dyn Fn(&str) -> Result<Value> + Send + Sync>;

/// Hooks of one table, keyed by column name.
pub type Hooks = HashMap<String, Hook>;

#[derive(Clone, Default)]
pub struct Hook {
    marshal: Option<MarshalFn>,
    unmarshal: Option<UnmarshalFn>,
    default: Option<Value>,
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hook")
            .field("marshal", &self.marshal.is_some())
            .field("unmarshal", &self.unmarshal.is_some())
            .field("default", &self.default)
            .finish()
    }
}

impl Hook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn marshal<F>(mut self, f: F) -> Self
    where
        F: Fn(Value) -> Result<Value> + Send + Sync + 'static,
    {
        self.marshal = Some(Arc::new(f));
        self
    }

    pub fn unmarshal<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> Result<Value> + Send + Sync + 'static,
    {
        self.unmarshal = Some(Arc::new(f));
        self
    }

    /// Value written when the field is NULL and the column is NOT NULL.
    pub fn default_value(mut self, value: impl ToValue) -> Self {
        self.default = Some(value.to_value());
        self
    }

    /// Store structured values as JSON text and parse them back.
    pub fn json() -> Self {
        Self::new()
            .marshal(|value| {
                Ok(match value {
                    Value::Json(v) => Value::String(v.to_string()),
                    other => other,
                })
            })
            .unmarshal(|text| {
                serde_json::from_str(text)
                    .map(Value::Json)
                    .map_err(Error::custom)
            })
    }

    pub fn has_marshal(&self) -> bool {
        self.marshal.is_some()
    }

    pub fn has_unmarshal(&self) -> bool {
        self.unmarshal.is_some()
    }

    pub fn fallback(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    /// Run the marshal callback, if any.
    pub(crate) fn apply_marshal(&self, column: &str, value: Value) -> Result<Value> {
        match &self.marshal {
            Some(f) => f(value).map_err(|e| hook_error(column, e)),
            None => Ok(value),
        }
    }

    /// Run the unmarshal callback, if any.
    pub(crate) fn apply_unmarshal(&self, column: &str, text: &str) -> Result<Value> {
        match &self.unmarshal {
            Some(f) => f(text).map_err(|e| hook_error(column, e)),
            None => Ok(Value::String(text.to_string())),
        }
    }
}

fn hook_error(column: &str, err: Error) -> Error {
    Error::Hook {
        column: column.to_string(),
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_hook() {
        let hook = Hook::json();
        let text = hook
            .apply_marshal("meta", Value::Json(serde_json::json!({"a": 1})))
            .unwrap();
        assert_eq!(text, Value::from(r#"{"a":1}"#));

        let back = hook.apply_unmarshal("meta", r#"{"a":1}"#).unwrap();
        assert_eq!(back, Value::Json(serde_json::json!({"a": 1})));

        let err = hook.apply_unmarshal("meta", "{").unwrap_err();
        assert!(matches!(err, Error::Hook { ref column, .. } if column == "meta"));
    }

    #[test]
    fn test_default_and_passthrough() {
        let hook = Hook::new().default_value("n/a");
        assert_eq!(hook.fallback(), Some(&Value::from("n/a")));
        assert!(!hook.has_marshal());
        assert_eq!(hook.apply_marshal("c", Value::I32(1)).unwrap(), Value::I32(1));
    }
}
