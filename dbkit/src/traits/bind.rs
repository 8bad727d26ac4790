//! Bind trait: destinations the row binder can populate

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;

use crate::error::Result;
use crate::fields::FieldMap;
use crate::traits::{coerce, FromValue};
use crate::value::Value;

/// How a destination takes its columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// Columns map to record fields by tag
    Struct,
    /// Every column becomes a key
    Map,
    /// The single column is the value
    Scalar,
}

/// Where one column lands inside a destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot {
    /// Record field by index
    Field(usize),
    /// Map entry
    Key(String),
    /// The destination itself
    Whole,
}

/// A destination for one result row.
///
/// Implemented by `#[derive(Record)]` types, by `HashMap`/`BTreeMap` keyed
/// by `String`, and by scalar types. Collections of rows are plain `Vec`s.
pub trait Bind: Default + Send + 'static {
    const SHAPE: Shape;

    /// Column mapping for struct destinations.
    fn field_map(_tag: &str) -> Option<Arc<FieldMap>> {
        None
    }

    /// Whether every column must be read as text first.
    fn force_text() -> bool {
        false
    }

    /// Coerce `value` into `slot`.
    fn assign(&mut self, slot: &Slot, value: Value) -> Result<()>;

    /// Reset `slot` to its zero value.
    fn reset(&mut self, slot: &Slot);
}

macro_rules! impl_map {
    ($($map:ident),+) => {
        $(impl<V> Bind for $map<String, V>
        where
            V: FromValue + Default + Send + 'static,
        {
            const SHAPE: Shape = Shape::Map;

            fn force_text() -> bool {
                V::OPEN
            }

            fn assign(&mut self, slot: &Slot, value: Value) -> Result<()> {
                if let Slot::Key(key) = slot {
                    self.insert(key.clone(), V::from_value(value)?);
                }
                Ok(())
            }

            fn reset(&mut self, slot: &Slot) {
                if let Slot::Key(key) = slot {
                    self.insert(key.clone(), V::default());
                }
            }
        })+
    };
}

impl_map!(HashMap, BTreeMap);

macro_rules! impl_scalar {
    ($($ty:ty),+ $(,)?) => {
        $(impl Bind for $ty {
            const SHAPE: Shape = Shape::Scalar;

            fn assign(&mut self, _slot: &Slot, value: Value) -> Result<()> {
                coerce(self, value)
            }

            fn reset(&mut self, _slot: &Slot) {
                *self = <$ty>::default();
            }
        })+
    };
}

impl_scalar!(
    bool,
    i8,
    i16,
    i32,
    i64,
    u8,
    u16,
    u32,
    u64,
    isize,
    usize,
    f32,
    f64,
    String,
    Vec<u8>,
    NaiveDate,
    NaiveDateTime,
    NaiveTime,
    Decimal,
    serde_json::Value,
    Value,
);

impl<T> Bind for Option<T>
where
    T: FromValue + Send + 'static,
{
    const SHAPE: Shape = Shape::Scalar;

    fn assign(&mut self, _slot: &Slot, value: Value) -> Result<()> {
        coerce(self, value)
    }

    fn reset(&mut self, _slot: &Slot) {
        *self = None;
    }
}

/// One destination of a multi-column scan, see `Table::query_row_scan`.
pub trait ScanTarget: Send {
    /// Coerce `value` into the destination.
    fn scan(&mut self, value: Value) -> Result<()>;

    /// Reset the destination to its zero value.
    fn reset(&mut self);
}

impl<T> ScanTarget for T
where
    T: FromValue + Default + Send,
{
    fn scan(&mut self, value: Value) -> Result<()> {
        coerce(self, value)
    }

    fn reset(&mut self) {
        *self = T::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_assign_and_reset() {
        let mut row: HashMap<String, i64> = HashMap::new();
        row.assign(&Slot::Key("n".into()), Value::from("42")).unwrap();
        assert_eq!(row["n"], 42);
        row.reset(&Slot::Key("n".into()));
        assert_eq!(row["n"], 0);
        assert!(!<HashMap<String, i64>>::force_text());
        assert!(<BTreeMap<String, Value>>::force_text());
    }

    #[test]
    fn test_scalar_and_option() {
        let mut n = 0u32;
        n.assign(&Slot::Whole, Value::I64(7)).unwrap();
        assert_eq!(n, 7);
        assert!(n.assign(&Slot::Whole, Value::I64(-1)).is_err());

        let mut name: Option<String> = Some("x".into());
        name.assign(&Slot::Whole, Value::Null).unwrap();
        assert_eq!(name, None);
    }

    #[test]
    fn test_scan_target_object_safe() {
        let mut id = 0i64;
        let mut name = String::new();
        {
            let mut targets: Vec<&mut dyn ScanTarget> = vec![&mut id, &mut name];
            targets[0].scan(Value::from("9")).unwrap();
            targets[1].scan(Value::Bytes(b"bo".to_vec())).unwrap();
        }
        assert_eq!((id, name.as_str()), (9, "bo"));
    }
}
