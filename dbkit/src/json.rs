//! JSON-embedded field values

use std::ops::{Deref, DerefMut};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::traits::{FromValue, ToValue};
use crate::value::Value;

/// A field stored as JSON text in a single column.
///
/// ```ignore
/// #[derive(Default, Record)]
/// pub struct Order {
///     #[dbkit(json = "items")]
///     pub items: Json<Vec<Item>>,
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Json<T>(pub T);

impl<T> Json<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> Deref for Json<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T> DerefMut for Json<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.0
    }
}

impl<T: Serialize> ToValue for Json<T> {
    fn to_value(&self) -> Value {
        serde_json::to_value(&self.0).map_or(Value::Null, Value::Json)
    }
}

impl<T: DeserializeOwned> FromValue for Json<T> {
    fn from_value(value: Value) -> Result<Self> {
        let parsed = match value {
            Value::Json(v) => serde_json::from_value(v),
            Value::String(s) => serde_json::from_str(&s),
            Value::Bytes(b) => serde_json::from_slice(&b),
            Value::Null => return Err(Error::UnexpectedNull("json")),
            other => {
                return Err(Error::UnsupportedScan {
                    from: other.type_name(),
                    to: "json",
                })
            }
        };
        parsed.map(Json).map_err(|e| Error::Conversion {
            from: "json",
            to: std::any::type_name::<T>(),
            reason: e.to_string(),
        })
    }
}
