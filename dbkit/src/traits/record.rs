//! Record trait: field-level access to a user struct
//!
//! Implemented by `#[derive(Record)]`. The binder and the write path only
//! ever touch a record through field indexes resolved once per type and
//! tag (see [`crate::fields`]).

use crate::error::Result;
use crate::value::Value;

/// Static description of one struct field.
#[derive(Debug, Clone, Copy)]
pub struct FieldDef {
    /// Rust field name
    pub ident: &'static str,
    /// Field type as written in the struct
    pub ty: &'static str,
    /// `(tag name, tag value)` pairs, e.g. `("json", "addr,omitempty")`
    pub tags: &'static [(&'static str, &'static str)],
    /// Whether the field is `pub`; private fields are never mapped
    pub exported: bool,
}

impl FieldDef {
    /// Raw value of tag `name`, options included.
    pub fn tag(&self, name: &str) -> Option<&'static str> {
        self.tags
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| *value)
    }

    /// Column named by tag `name`: the tag value up to the first comma.
    ///
    /// `None` when the field is private, untagged or tagged empty.
    pub fn column(&self, name: &str) -> Option<&'static str> {
        if !self.exported {
            return None;
        }
        let raw = self.tag(name)?;
        let column = raw.split(',').next().unwrap_or_default().trim();
        (!column.is_empty()).then_some(column)
    }
}

/// A struct whose fields can be read and written by index.
///
/// Field types must implement [`ToValue`](crate::ToValue),
/// [`FromValue`](crate::FromValue) and `Default`.
pub trait Record: Default + Send + Sync + 'static {
    /// Every named field, in declaration order.
    fn fields() -> &'static [FieldDef];

    /// Read field `index`. Out-of-range indexes read as NULL.
    fn field_value(&self, index: usize) -> Value;

    /// Coerce `value` into field `index`.
    fn set_field(&mut self, index: usize, value: Value) -> Result<()>;

    /// Reset field `index` to its zero value.
    fn reset_field(&mut self, index: usize);

    /// Type name used in error messages.
    fn record_name() -> &'static str {
        std::any::type_name::<Self>()
    }
}
