//! Row binder
//!
//! Turns a fetched [`Rows`] into user destinations. A plan is built once per
//! result set: each column gets a slot in the destination and a target that
//! says how its values travel there. Nullable columns go through a
//! [`Sentinel`] first, so a NULL becomes the zero value of the destination
//! instead of an error.

use crate::error::{Error, Result};
use crate::hook::{Hook, Hooks};
use crate::meta::Columns;
use crate::traits::{coerce_bytes, Bind, ColumnInfo, FromValue, Rows, ScanKind, ScanTarget, Shape, Slot};
use crate::value::Value;

/// What the binder needs besides the rows.
pub(crate) struct BindContext<'a> {
    /// Tag naming record columns
    pub tag: &'a str,
    /// Table catalog; empty when unknown
    pub catalog: &'a Columns,
    pub hooks: &'a Hooks,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    /// Value assigned as is
    Direct,
    /// Read through a sentinel of the given kind
    Sentinel(ScanKind),
    /// Read as text and handed to an unmarshal hook
    Unmarshal,
}

#[derive(Debug)]
struct ColumnPlan<'h> {
    name: String,
    slot: Slot,
    target: Target,
    hook: Option<&'h Hook>,
}

/// A nullable scan target.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Sentinel {
    Null,
    Int(i64),
    Float(f64),
    Text(Vec<u8>),
}

/// Free list of text buffers for sentinels.
#[derive(Debug, Default)]
pub(crate) struct SentinelPool {
    text: Vec<Vec<u8>>,
}

impl SentinelPool {
    const MAX: usize = 32;

    /// Load `value` into a sentinel of `kind`.
    pub(crate) fn load(&mut self, kind: ScanKind, value: Value) -> Result<Sentinel> {
        if value.is_null() {
            return Ok(Sentinel::Null);
        }
        Ok(match kind {
            ScanKind::Int => Sentinel::Int(i64::from_value(value)?),
            ScanKind::Float => Sentinel::Float(f64::from_value(value)?),
            ScanKind::Text => {
                let mut buf = self.text.pop().unwrap_or_default();
                coerce_bytes(&mut buf, &value)?;
                Sentinel::Text(buf)
            }
        })
    }

    /// Take the inner value out of `sentinel` and recycle its buffer.
    pub(crate) fn release(&mut self, sentinel: Sentinel) -> Option<Value> {
        match sentinel {
            Sentinel::Null => None,
            Sentinel::Int(v) => Some(Value::I64(v)),
            Sentinel::Float(v) => Some(Value::F64(v)),
            Sentinel::Text(mut buf) => {
                let value = match std::str::from_utf8(&buf) {
                    Ok(text) => Value::String(text.to_string()),
                    Err(_) => Value::Bytes(buf.clone()),
                };
                if self.text.len() < Self::MAX {
                    buf.clear();
                    self.text.push(buf);
                }
                Some(value)
            }
        }
    }
}

fn is_nullable(column: &ColumnInfo, catalog: &Columns) -> bool {
    if column.nullable == Some(false) {
        return false;
    }
    catalog.get(&column.name).map_or(true, |c| !c.not_null)
}

fn plan<'h, B: Bind>(columns: &[ColumnInfo], ctx: &BindContext<'h>) -> Result<Vec<ColumnPlan<'h>>> {
    let field_map = match B::SHAPE {
        Shape::Struct => Some(B::field_map(ctx.tag).ok_or_else(|| {
            Error::DestType(format!(
                "{} does not expose its fields",
                std::any::type_name::<B>()
            ))
        })?),
        Shape::Scalar if columns.len() != 1 => {
            return Err(Error::DestType(format!(
                "{} takes exactly one column, the result has {}",
                std::any::type_name::<B>(),
                columns.len()
            )));
        }
        _ => None,
    };

    let mut plans = Vec::with_capacity(columns.len());
    let mut missed = Vec::new();
    for column in columns {
        let slot = match (&field_map, B::SHAPE) {
            (Some(map), _) => match map.get(&column.name) {
                Some(field) => Slot::Field(field.index),
                None => {
                    missed.push(column.name.clone());
                    continue;
                }
            },
            (None, Shape::Map) => Slot::Key(column.name.clone()),
            (None, _) => Slot::Whole,
        };

        let hook = ctx
            .hooks
            .get(&column.name)
            .filter(|h| h.has_unmarshal() && B::SHAPE == Shape::Struct);
        let target = if hook.is_some() {
            Target::Unmarshal
        } else if B::force_text() {
            Target::Sentinel(ScanKind::Text)
        } else if is_nullable(column, ctx.catalog) {
            Target::Sentinel(column.scan_kind)
        } else {
            Target::Direct
        };

        plans.push(ColumnPlan {
            name: column.name.clone(),
            slot,
            target,
            hook,
        });
    }

    if !missed.is_empty() {
        return Err(Error::FieldMismatch { missed });
    }
    Ok(plans)
}

fn bind_row<B: Bind>(
    dst: &mut B,
    row: Vec<Value>,
    plans: &[ColumnPlan<'_>],
    pool: &mut SentinelPool,
) -> Result<()> {
    for (value, plan) in row.into_iter().zip(plans) {
        match plan.target {
            Target::Direct => {
                if value.is_null() {
                    dst.reset(&plan.slot);
                } else {
                    dst.assign(&plan.slot, value)?;
                }
            }
            Target::Sentinel(kind) => {
                let sentinel = pool.load(kind, value)?;
                match pool.release(sentinel) {
                    Some(inner) => dst.assign(&plan.slot, inner)?,
                    None => dst.reset(&plan.slot),
                }
            }
            Target::Unmarshal => {
                let sentinel = pool.load(ScanKind::Text, value)?;
                let text = match pool.release(sentinel) {
                    Some(Value::String(s)) => s,
                    Some(Value::Bytes(b)) => String::from_utf8_lossy(&b).into_owned(),
                    _ => String::new(),
                };
                if text.is_empty() {
                    dst.reset(&plan.slot);
                } else if let Some(hook) = plan.hook {
                    let parsed = hook.apply_unmarshal(&plan.name, &text)?;
                    dst.assign(&plan.slot, parsed)?;
                }
            }
        }
    }
    Ok(())
}

/// Bind the first row. Fails with [`Error::NullRow`] when there is none.
pub(crate) fn collect_one<B, F>(mut rows: Rows, ctx: &BindContext<'_>, mut callback: F) -> Result<B>
where
    B: Bind,
    F: FnMut(&mut B) -> Result<()>,
{
    let plans = plan::<B>(rows.columns(), ctx)?;
    let row = rows.next_row().ok_or(Error::NullRow)?;
    let mut pool = SentinelPool::default();
    let mut dst = B::default();
    bind_row(&mut dst, row, &plans, &mut pool)?;
    callback(&mut dst)?;
    Ok(dst)
}

/// Bind every row. No rows is an empty vector.
pub(crate) fn collect_all<B, F>(
    mut rows: Rows,
    ctx: &BindContext<'_>,
    mut callback: F,
) -> Result<Vec<B>>
where
    B: Bind,
    F: FnMut(&mut B) -> Result<()>,
{
    let plans = plan::<B>(rows.columns(), ctx)?;
    let mut pool = SentinelPool::default();
    let mut out = Vec::with_capacity(rows.len());
    while let Some(row) = rows.next_row() {
        let mut dst = B::default();
        bind_row(&mut dst, row, &plans, &mut pool)?;
        callback(&mut dst)?;
        out.push(dst);
    }
    Ok(out)
}

/// Bind each row and hand it to `callback` without keeping it.
pub(crate) fn for_each<B, F>(mut rows: Rows, ctx: &BindContext<'_>, mut callback: F) -> Result<()>
where
    B: Bind,
    F: FnMut(B) -> Result<()>,
{
    let plans = plan::<B>(rows.columns(), ctx)?;
    let mut pool = SentinelPool::default();
    while let Some(row) = rows.next_row() {
        let mut dst = B::default();
        bind_row(&mut dst, row, &plans, &mut pool)?;
        callback(dst)?;
    }
    Ok(())
}

/// Scan the first row into one target per column.
pub(crate) fn scan_into(mut rows: Rows, targets: &mut [&mut dyn ScanTarget]) -> Result<()> {
    if rows.columns().len() != targets.len() {
        return Err(Error::DestType(format!(
            "{} destinations for {} columns",
            targets.len(),
            rows.columns().len()
        )));
    }
    let row = rows.next_row().ok_or(Error::NullRow)?;
    for (value, target) in row.into_iter().zip(targets.iter_mut()) {
        if value.is_null() {
            target.reset();
        } else {
            target.scan(value)?;
        }
    }
    Ok(())
}
