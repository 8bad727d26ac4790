//! Field introspection for records
//!
//! Maps column names to record fields for a given tag name. Results are
//! cached per `(type, tag)` in a bounded process-wide LRU.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use crate::cache::LruCache;
use crate::error::Result;
use crate::traits::{Record, Slot};
use crate::value::Value;

/// One mapped field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInfo {
    /// Index into [`Record::fields`]
    pub index: usize,
    /// Column name taken from the tag
    pub column: String,
    /// Rust field name
    pub ident: &'static str,
    /// Declared field type
    pub ty: &'static str,
}

/// Column to field mapping, keeping declaration order.
#[derive(Debug, Clone, Default)]
pub struct FieldMap {
    by_column: HashMap<String, FieldInfo>,
    keys: Vec<String>,
}

impl FieldMap {
    /// Build the mapping of `R` for tag `tag`.
    ///
    /// The first field claiming a column wins.
    pub fn build<R: Record>(tag: &str) -> Self {
        let mut map = FieldMap::default();
        for (index, def) in R::fields().iter().enumerate() {
            let Some(column) = def.column(tag) else {
                continue;
            };
            if map.by_column.contains_key(column) {
                continue;
            }
            map.keys.push(column.to_string());
            map.by_column.insert(
                column.to_string(),
                FieldInfo {
                    index,
                    column: column.to_string(),
                    ident: def.ident,
                    ty: def.ty,
                },
            );
        }
        map
    }

    pub fn get(&self, column: &str) -> Option<&FieldInfo> {
        self.by_column.get(column)
    }

    /// Column names in field declaration order.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Fields in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &FieldInfo> {
        self.keys.iter().filter_map(|k| self.by_column.get(k))
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

type FieldCache = LruCache<(TypeId, String), Arc<FieldMap>>;

fn cache() -> &'static FieldCache {
    static CACHE: OnceLock<FieldCache> = OnceLock::new();
    CACHE.get_or_init(|| LruCache::new(crate::settings::get().field_cache_size))
}

/// Cached [`FieldMap::build`].
pub fn field_map<R: Record>(tag: &str) -> Arc<FieldMap> {
    let key = (TypeId::of::<R>(), tag.to_string());
    if let Some(map) = cache().get(&key) {
        return map;
    }
    cache().insert_if_absent(key, Arc::new(FieldMap::build::<R>(tag)))
}

/// Write `value` into the field a slot points at. Used by derived
/// [`Bind`](crate::Bind) impls.
pub fn assign_record<R: Record>(record: &mut R, slot: &Slot, value: Value) -> Result<()> {
    match slot {
        Slot::Field(index) => record.set_field(*index, value),
        _ => Ok(()),
    }
}

/// Reset the field a slot points at. Used by derived [`Bind`](crate::Bind)
/// impls.
pub fn reset_record<R: Record>(record: &mut R, slot: &Slot) {
    if let Slot::Field(index) = slot {
        record.reset_field(*index);
    }
}
