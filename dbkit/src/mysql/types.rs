//! Type conversion utilities for MySQL

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use mysql_async::consts::{ColumnFlags, ColumnType};
use mysql_async::prelude::Queryable;
use mysql_async::{Column, Row as MySqlAsyncRow, Value as MySqlValue};

use crate::error::{Error, Result};
use crate::traits::{ColumnInfo, Rows, ScanKind};
use crate::value::Value;

fn conversion(to: &'static str, actual: String) -> Error {
    Error::Conversion {
        from: "mysql value",
        to,
        reason: format!("out of range: {actual}"),
    }
}

fn date(year: u16, month: u8, day: u8) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(year.into(), month.into(), day.into())
        .ok_or_else(|| conversion("date", format!("{year}-{month}-{day}")))
}

/// Convert mysql_async Value to a dbkit Value
pub fn from_mysql_value(value: MySqlValue) -> Result<Value> {
    match value {
        MySqlValue::NULL => Ok(Value::Null),
        // The text protocol sends everything as bytes
        MySqlValue::Bytes(v) => match String::from_utf8(v) {
            Ok(s) => Ok(Value::String(s)),
            Err(e) => Ok(Value::Bytes(e.into_bytes())),
        },
        MySqlValue::Int(v) => Ok(Value::I64(v)),
        MySqlValue::UInt(v) => Ok(Value::U64(v)),
        MySqlValue::Float(v) => Ok(Value::F32(v)),
        MySqlValue::Double(v) => Ok(Value::F64(v)),
        MySqlValue::Date(year, month, day, 0, 0, 0, 0) => Ok(Value::Date(date(year, month, day)?)),
        MySqlValue::Date(year, month, day, hour, min, sec, micro) => {
            let time = NaiveTime::from_hms_micro_opt(hour.into(), min.into(), sec.into(), micro)
                .ok_or_else(|| conversion("time", format!("{hour}:{min}:{sec}.{micro}")))?;
            Ok(Value::DateTime(NaiveDateTime::new(
                date(year, month, day)?,
                time,
            )))
        }
        MySqlValue::Time(is_neg, days, hours, mins, secs, micro) => {
            // NaiveTime only covers 00:00:00 to 23:59:59
            if is_neg || days > 0 || hours >= 24 {
                return Err(conversion(
                    "time (00:00:00 to 23:59:59)",
                    format!(
                        "{}{}:{:02}:{:02}",
                        if is_neg { "-" } else { "" },
                        days * 24 + u32::from(hours),
                        mins,
                        secs
                    ),
                ));
            }
            NaiveTime::from_hms_micro_opt(hours.into(), mins.into(), secs.into(), micro)
                .map(Value::Time)
                .ok_or_else(|| conversion("time", format!("{hours}:{mins}:{secs}.{micro}")))
        }
    }
}

/// Column metadata for the binder.
///
/// Unsigned BIGINT scans as text so values above `i64::MAX` survive; the
/// nullable hint is only set when the server flags the column NOT NULL.
pub(crate) fn column_info(column: &Column) -> ColumnInfo {
    let flags = column.flags();
    let unsigned = flags.contains(ColumnFlags::UNSIGNED_FLAG);
    let kind = match column.column_type() {
        ColumnType::MYSQL_TYPE_TINY
        | ColumnType::MYSQL_TYPE_SHORT
        | ColumnType::MYSQL_TYPE_INT24
        | ColumnType::MYSQL_TYPE_LONG
        | ColumnType::MYSQL_TYPE_YEAR => ScanKind::Int,
        ColumnType::MYSQL_TYPE_LONGLONG if !unsigned => ScanKind::Int,
        ColumnType::MYSQL_TYPE_FLOAT | ColumnType::MYSQL_TYPE_DOUBLE => ScanKind::Float,
        _ => ScanKind::Text,
    };
    let info = ColumnInfo::new(column.name_str()).scan_kind(kind);
    if flags.contains(ColumnFlags::NOT_NULL_FLAG) {
        info.nullable(false)
    } else {
        info
    }
}

/// Run `sql` over the text protocol and buffer its first result set.
pub(crate) async fn fetch<Q>(conn: &mut Q, sql: &str) -> Result<Rows>
where
    Q: Queryable + Send,
{
    let result = conn.query_iter(sql).await?;
    let columns: Vec<ColumnInfo> = result.columns_ref().iter().map(column_info).collect();
    let raw: Vec<MySqlAsyncRow> = result.collect_and_drop().await?;

    let mut rows = Vec::with_capacity(raw.len());
    for row in raw {
        let values = row
            .unwrap()
            .into_iter()
            .map(from_mysql_value)
            .collect::<Result<Vec<_>>>()?;
        rows.push(values);
    }
    Ok(Rows::new(columns, rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_protocol_bytes() {
        assert_eq!(
            from_mysql_value(MySqlValue::Bytes(b"abc".to_vec())).unwrap(),
            Value::String("abc".into())
        );
        assert_eq!(
            from_mysql_value(MySqlValue::Bytes(vec![0xff, 0x00])).unwrap(),
            Value::Bytes(vec![0xff, 0x00])
        );
        assert_eq!(from_mysql_value(MySqlValue::NULL).unwrap(), Value::Null);
    }

    #[test]
    fn test_dates() {
        assert_eq!(
            from_mysql_value(MySqlValue::Date(2024, 2, 29, 0, 0, 0, 0)).unwrap(),
            Value::Date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap())
        );
        assert!(matches!(
            from_mysql_value(MySqlValue::Date(2024, 2, 29, 10, 30, 0, 5)).unwrap(),
            Value::DateTime(_)
        ));
        assert!(from_mysql_value(MySqlValue::Date(2023, 2, 29, 0, 0, 0, 0)).is_err());
        assert!(from_mysql_value(MySqlValue::Time(false, 1, 2, 0, 0, 0)).is_err());
    }
}
