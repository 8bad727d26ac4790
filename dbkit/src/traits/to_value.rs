//! ToValue trait for converting Rust types to database values

use crate::value::Value;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;

/// Trait for types that can be converted to a database value.
///
/// Placeholder arguments and record fields are read through this trait.
/// It is implemented for the common scalar types, for sequences of them
/// (expanded as comma-separated lists) and can be implemented for custom
/// types such as enums.
pub trait ToValue {
    /// Convert this value to a database value.
    fn to_value(&self) -> Value;
}

macro_rules! impl_copy {
    ($($ty:ty => $variant:ident),+ $(,)?) => {
        $(impl ToValue for $ty {
            fn to_value(&self) -> Value {
                Value::$variant(*self)
            }
        })+
    };
}

impl_copy!(
    bool => Bool,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    NaiveDate => Date,
    NaiveDateTime => DateTime,
    NaiveTime => Time,
    Decimal => Decimal,
);

impl ToValue for isize {
    fn to_value(&self) -> Value {
        Value::I64(*self as i64)
    }
}

impl ToValue for usize {
    fn to_value(&self) -> Value {
        Value::U64(*self as u64)
    }
}

impl ToValue for String {
    fn to_value(&self) -> Value {
        Value::String(self.clone())
    }
}

impl ToValue for str {
    fn to_value(&self) -> Value {
        Value::String(self.to_string())
    }
}

impl ToValue for Vec<u8> {
    fn to_value(&self) -> Value {
        Value::Bytes(self.clone())
    }
}

impl ToValue for [u8] {
    fn to_value(&self) -> Value {
        Value::Bytes(self.to_vec())
    }
}

impl ToValue for serde_json::Value {
    fn to_value(&self) -> Value {
        Value::Json(self.clone())
    }
}

impl ToValue for Value {
    fn to_value(&self) -> Value {
        self.clone()
    }
}

// Sequences expand element by element. `Vec<u8>` stays a byte string.
macro_rules! impl_list {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl ToValue for [$ty] {
                fn to_value(&self) -> Value {
                    Value::List(self.iter().map(ToValue::to_value).collect())
                }
            }

            impl ToValue for Vec<$ty> {
                fn to_value(&self) -> Value {
                    self.as_slice().to_value()
                }
            }

            impl<const N: usize> ToValue for [$ty; N] {
                fn to_value(&self) -> Value {
                    self.as_slice().to_value()
                }
            }
        )+
    };
}

impl_list!(
    bool, i8, i16, i32, i64, u16, u32, u64, f32, f64, String, &str, Decimal, NaiveDate,
    NaiveDateTime, Value,
);

impl<T: ToValue> ToValue for Option<T> {
    fn to_value(&self) -> Value {
        match self {
            Some(v) => v.to_value(),
            None => Value::Null,
        }
    }
}

impl<T: ToValue + ?Sized> ToValue for &T {
    fn to_value(&self) -> Value {
        (**self).to_value()
    }
}
