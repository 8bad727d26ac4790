//! FromValue trait: the coercer that moves driver values into Rust types

use crate::error::{Error, Result};
use crate::value::Value;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use std::fmt::Display;
use std::str::FromStr;

/// Trait for types that can be constructed from a database value.
///
/// Numeric targets accept any integer variant that fits, and textual
/// sources are parsed, so a text-protocol driver that hands back every
/// column as a string still lands in typed fields. Overflow is reported as
/// [`Error::Conversion`] naming the target kind.
pub trait FromValue: Sized {
    /// Whether this type accepts any value unchanged (the open type).
    const OPEN: bool = false;

    /// Convert a database value to this type.
    fn from_value(value: Value) -> Result<Self>;
}

/// Coerce `src` into `dst`, replacing its previous value.
pub fn coerce<T: FromValue>(dst: &mut T, src: Value) -> Result<()> {
    *dst = T::from_value(src)?;
    Ok(())
}

/// Copy the raw bytes of `src` into `dst`, reusing its allocation.
///
/// NULL leaves `dst` empty.
pub fn coerce_bytes(dst: &mut Vec<u8>, src: &Value) -> Result<()> {
    dst.clear();
    match src {
        Value::Null => {}
        Value::Bytes(v) => dst.extend_from_slice(v),
        Value::String(v) => dst.extend_from_slice(v.as_bytes()),
        other => {
            let text = other.to_text().ok_or_else(|| unsupported(other, "bytes"))?;
            dst.extend_from_slice(text.as_bytes());
        }
    }
    Ok(())
}

fn unsupported(value: &Value, to: &'static str) -> Error {
    Error::UnsupportedScan {
        from: value.type_name(),
        to,
    }
}

fn cast<S, D>(v: S, from: &'static str, to: &'static str) -> Result<D>
where
    S: Copy + Display,
    D: TryFrom<S>,
{
    D::try_from(v).map_err(|_| Error::Conversion {
        from,
        to,
        reason: format!("value {} out of range", v),
    })
}

/// Parse through the textual form of the value.
fn parse_text<T>(value: &Value, to: &'static str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    let text = value.to_text().ok_or_else(|| unsupported(value, to))?;
    text.trim().parse::<T>().map_err(|e| Error::Conversion {
        from: value.type_name(),
        to,
        reason: format!("parsing {:?}: {}", text, e),
    })
}

macro_rules! impl_int {
    ($($ty:ident),+ $(,)?) => {
        $(impl FromValue for $ty {
            fn from_value(value: Value) -> Result<Self> {
                let to = stringify!($ty);
                let from = value.type_name();
                match value {
                    Value::I8(v) => cast(v, from, to),
                    Value::I16(v) => cast(v, from, to),
                    Value::I32(v) => cast(v, from, to),
                    Value::I64(v) => cast(v, from, to),
                    Value::U8(v) => cast(v, from, to),
                    Value::U16(v) => cast(v, from, to),
                    Value::U32(v) => cast(v, from, to),
                    Value::U64(v) => cast(v, from, to),
                    Value::Bool(v) => Ok(v as $ty),
                    Value::Null => Err(Error::UnexpectedNull(to)),
                    Value::String(_)
                    | Value::Bytes(_)
                    | Value::F32(_)
                    | Value::F64(_)
                    | Value::Decimal(_) => parse_text(&value, to),
                    _ => Err(unsupported(&value, to)),
                }
            }
        })+
    };
}

impl_int!(i8, i16, i32, i64, u8, u16, u32, u64, isize, usize);

macro_rules! impl_float {
    ($($ty:ident),+ $(,)?) => {
        $(impl FromValue for $ty {
            fn from_value(value: Value) -> Result<Self> {
                let to = stringify!($ty);
                match value {
                    Value::F32(v) => Ok(v as $ty),
                    Value::F64(v) => Ok(v as $ty),
                    Value::I8(v) => Ok(v as $ty),
                    Value::I16(v) => Ok(v as $ty),
                    Value::I32(v) => Ok(v as $ty),
                    Value::I64(v) => Ok(v as $ty),
                    Value::U8(v) => Ok(v as $ty),
                    Value::U16(v) => Ok(v as $ty),
                    Value::U32(v) => Ok(v as $ty),
                    Value::U64(v) => Ok(v as $ty),
                    Value::Bool(v) => Ok(if v { 1.0 } else { 0.0 }),
                    Value::Null => Err(Error::UnexpectedNull(to)),
                    Value::String(_) | Value::Bytes(_) | Value::Decimal(_) => parse_text(&value, to),
                    _ => Err(unsupported(&value, to)),
                }
            }
        })+
    };
}

impl_float!(f32, f64);

/// Driver-level truth test.
fn parse_bool(text: &str) -> Option<bool> {
    match text.trim() {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Bool(v) => Ok(v),
            Value::I8(v) => Ok(v != 0),
            Value::I16(v) => Ok(v != 0),
            Value::I32(v) => Ok(v != 0),
            Value::I64(v) => Ok(v != 0),
            Value::U8(v) => Ok(v != 0),
            Value::U16(v) => Ok(v != 0),
            Value::U32(v) => Ok(v != 0),
            Value::U64(v) => Ok(v != 0),
            Value::String(ref s) => parse_bool(s).ok_or_else(|| Error::Conversion {
                from: "string",
                to: "bool",
                reason: format!("{:?} is not a truth value", s),
            }),
            Value::Bytes(ref b) => {
                parse_bool(&String::from_utf8_lossy(b)).ok_or_else(|| Error::Conversion {
                    from: "bytes",
                    to: "bool",
                    reason: "not a truth value".to_string(),
                })
            }
            Value::Null => Err(Error::UnexpectedNull("bool")),
            _ => Err(unsupported(&value, "bool")),
        }
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::String(v) => Ok(v),
            Value::Bytes(v) => String::from_utf8(v).map_err(|e| Error::Conversion {
                from: "bytes",
                to: "string",
                reason: format!("invalid utf8: {}", e),
            }),
            Value::Null => Err(Error::UnexpectedNull("string")),
            other => other.to_text().ok_or_else(|| unsupported(&other, "string")),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Bytes(v) => Ok(v),
            Value::String(v) => Ok(v.into_bytes()),
            Value::Null => Err(Error::UnexpectedNull("bytes")),
            other => other
                .to_text()
                .map(String::into_bytes)
                .ok_or_else(|| unsupported(&other, "bytes")),
        }
    }
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|dt| dt.naive_utc())
        })
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn time_error(value: &Value, to: &'static str) -> Error {
    Error::Conversion {
        from: value.type_name(),
        to,
        reason: format!("unrecognised {} {:?}", to, value.to_text().unwrap_or_default()),
    }
}

impl FromValue for NaiveDate {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Date(v) => Ok(v),
            Value::DateTime(v) => Ok(v.date()),
            Value::String(_) | Value::Bytes(_) => value
                .to_text()
                .and_then(|t| {
                    NaiveDate::parse_from_str(t.trim(), "%Y-%m-%d")
                        .ok()
                        .or_else(|| parse_datetime(&t).map(|dt| dt.date()))
                })
                .ok_or_else(|| time_error(&value, "date")),
            Value::Null => Err(Error::UnexpectedNull("date")),
            _ => Err(unsupported(&value, "date")),
        }
    }
}

impl FromValue for NaiveDateTime {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::DateTime(v) => Ok(v),
            Value::Date(v) => v
                .and_hms_opt(0, 0, 0)
                .ok_or_else(|| time_error(&value, "datetime")),
            Value::String(_) | Value::Bytes(_) => value
                .to_text()
                .and_then(|t| parse_datetime(&t))
                .ok_or_else(|| time_error(&value, "datetime")),
            Value::Null => Err(Error::UnexpectedNull("datetime")),
            _ => Err(unsupported(&value, "datetime")),
        }
    }
}

impl FromValue for NaiveTime {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Time(v) => Ok(v),
            Value::DateTime(v) => Ok(v.time()),
            Value::String(_) | Value::Bytes(_) => value
                .to_text()
                .and_then(|t| NaiveTime::parse_from_str(t.trim(), "%H:%M:%S%.f").ok())
                .ok_or_else(|| time_error(&value, "time")),
            Value::Null => Err(Error::UnexpectedNull("time")),
            _ => Err(unsupported(&value, "time")),
        }
    }
}

impl FromValue for Decimal {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Decimal(v) => Ok(v),
            Value::I8(v) => Ok(Decimal::from(v)),
            Value::I16(v) => Ok(Decimal::from(v)),
            Value::I32(v) => Ok(Decimal::from(v)),
            Value::I64(v) => Ok(Decimal::from(v)),
            Value::U8(v) => Ok(Decimal::from(v)),
            Value::U16(v) => Ok(Decimal::from(v)),
            Value::U32(v) => Ok(Decimal::from(v)),
            Value::U64(v) => Ok(Decimal::from(v)),
            Value::String(_) | Value::Bytes(_) | Value::F32(_) | Value::F64(_) => {
                parse_text(&value, "decimal")
            }
            Value::Null => Err(Error::UnexpectedNull("decimal")),
            _ => Err(unsupported(&value, "decimal")),
        }
    }
}

impl FromValue for serde_json::Value {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Json(v) => Ok(v),
            Value::String(_) | Value::Bytes(_) => {
                let text = value.to_text().unwrap_or_default();
                serde_json::from_str(&text).map_err(|e| Error::Conversion {
                    from: value.type_name(),
                    to: "json",
                    reason: format!("invalid json: {}", e),
                })
            }
            Value::Bool(v) => Ok(v.into()),
            Value::I64(v) => Ok(v.into()),
            Value::U64(v) => Ok(v.into()),
            Value::F64(v) => Ok(v.into()),
            Value::Null => Err(Error::UnexpectedNull("json")),
            _ => Err(unsupported(&value, "json")),
        }
    }
}

impl FromValue for Value {
    const OPEN: bool = true;

    fn from_value(value: Value) -> Result<Self> {
        Ok(value)
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            _ => Ok(Some(T::from_value(value)?)),
        }
    }
}
