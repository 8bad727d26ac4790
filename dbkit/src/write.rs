//! Statement assembly for the table facade
//!
//! Column lists are the record's tagged fields that also appear in the
//! table catalog (an empty catalog filters nothing), minus excluded
//! columns. A primary key holding its zero value is left out of INSERT
//! and DELETE column lists and never appears in an UPDATE SET list.

use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::fields::{field_map, FieldInfo, FieldMap};
use crate::hook::Hooks;
use crate::meta::{Column, Columns, TableMeta};
use crate::query::{Kind, Query};
use crate::traits::{Bind, Record, Shape};
use crate::value::Value;

/// Everything statement assembly needs to know about the table.
pub(crate) struct Layout<'a> {
    pub meta: &'a dyn TableMeta,
    /// Quoted table name
    pub table: String,
    pub tag: &'a str,
    pub catalog: &'a Columns,
    pub hooks: &'a Hooks,
    pub excluded: &'a HashSet<String>,
}

struct WriteColumn<'a> {
    field: &'a FieldInfo,
    entry: Option<&'a Column>,
    quoted: String,
}

impl WriteColumn<'_> {
    fn name(&self) -> &str {
        &self.field.column
    }

    fn is_primary(&self) -> bool {
        self.entry.is_some_and(Column::is_primary)
    }
}

/// A value slot in a written row.
#[derive(Debug, PartialEq)]
enum Cell {
    Value(Value),
    /// The column's server-side default
    Default,
}

impl Layout<'_> {
    fn columns<'m>(&'m self, map: &'m FieldMap) -> Vec<WriteColumn<'m>> {
        map.iter()
            .filter(|f| !self.excluded.contains(&f.column))
            .filter_map(|field| {
                let entry = self.catalog.get(&field.column);
                if entry.is_none() && !self.catalog.is_empty() {
                    return None;
                }
                Some(WriteColumn {
                    field,
                    entry,
                    quoted: self.meta.quote_path(&field.column),
                })
            })
            .collect()
    }

    fn read<R: Record>(&self, record: &R, col: &WriteColumn<'_>) -> Result<Value> {
        let value = record.field_value(col.field.index);
        match self.hooks.get(col.name()) {
            Some(hook) if hook.has_marshal() => hook.apply_marshal(col.name(), value),
            _ => Ok(value),
        }
    }

    fn cell<R: Record>(&self, record: &R, col: &WriteColumn<'_>) -> Result<Cell> {
        let value = self.read(record, col)?;
        let Some(entry) = col.entry.filter(|e| e.not_null && value.is_null()) else {
            return Ok(Cell::Value(value));
        };
        if let Some(fallback) = self.hooks.get(col.name()).and_then(|h| h.fallback()) {
            return Ok(Cell::Value(fallback.clone()));
        }
        if entry.has_default() {
            return Ok(Cell::Default);
        }
        Err(Error::NotNullViolation(col.name().to_string()))
    }

    fn no_columns<R: Record>(&self) -> Error {
        Error::StructTag {
            record: R::record_name(),
            tag: self.tag.to_string(),
        }
    }

    /// Columns written for `first`, with zero primary keys dropped.
    fn insert_columns<'m, R: Record>(&'m self, map: &'m FieldMap, first: &R) -> Vec<WriteColumn<'m>> {
        self.columns(map)
            .into_iter()
            .filter(|c| !(c.is_primary() && first.field_value(c.field.index).is_zero()))
            .collect()
    }

    /// `INSERT INTO t (...) VALUES (...), (...)`, optionally with an
    /// upsert tail for the adapter's dialect.
    pub(crate) fn insert<R: Record>(&self, q: &mut Query, records: &[R], upsert: bool) -> Result<()> {
        let first = records
            .first()
            .ok_or_else(|| Error::DestType("insert needs at least one record".to_string()))?;
        let map = field_map::<R>(self.tag);
        let columns = self.insert_columns(&map, first);
        if columns.is_empty() {
            return Err(self.no_columns::<R>());
        }

        let names: Vec<&str> = columns.iter().map(|c| c.quoted.as_str()).collect();
        q.reset_generated(
            Kind::Insert,
            &format!("INSERT INTO {} ({})", self.table, names.join(", ")),
        );

        for record in records {
            let mut template = String::with_capacity(columns.len() * 3);
            let mut args = Vec::with_capacity(columns.len());
            for (n, col) in columns.iter().enumerate() {
                if n > 0 {
                    template.push_str(", ");
                }
                match self.cell(record, col)? {
                    Cell::Value(v) => {
                        template.push('?');
                        args.push(v);
                    }
                    Cell::Default => template.push_str("DEFAULT"),
                }
            }
            q.set_insert_values_args(&template, &args);
        }

        if upsert {
            self.upsert_tail(q, &columns);
        }
        Ok(())
    }

    fn upsert_tail(&self, q: &mut Query, columns: &[WriteColumn<'_>]) {
        let (keys, rest): (Vec<&WriteColumn<'_>>, Vec<&WriteColumn<'_>>) =
            columns.iter().partition(|c| c.is_primary());
        let keys: Vec<&str> = keys.iter().map(|c| c.quoted.as_str()).collect();
        let rest: Vec<&str> = rest.iter().map(|c| c.quoted.as_str()).collect();

        if self.meta.name() == "postgres" {
            let keys: Vec<String> = if keys.is_empty() {
                self.catalog
                    .values()
                    .filter(|c| c.is_primary())
                    .map(|c| self.meta.quote_path(&c.field))
                    .collect()
            } else {
                keys.iter().map(|k| k.to_string()).collect()
            };
            if keys.is_empty() || rest.is_empty() {
                q.append("ON CONFLICT DO NOTHING", &[]);
                return;
            }
            let sets: Vec<String> = rest.iter().map(|c| format!("{c} = EXCLUDED.{c}")).collect();
            q.append(
                &format!("ON CONFLICT ({}) DO UPDATE SET {}", keys.join(", "), sets.join(", ")),
                &[],
            );
            return;
        }

        let targets = if rest.is_empty() { &keys } else { &rest };
        let sets: Vec<String> = targets
            .iter()
            .map(|c| format!("{c} = VALUES({c})"))
            .collect();
        if !sets.is_empty() {
            q.set_on_duplicate_key_update(&sets.join(", "), &[]);
        }
    }

    /// `UPDATE t SET ...`, filtered by the pending WHERE clause or else by
    /// the record's primary key.
    pub(crate) fn update<R: Record>(&self, q: &mut Query, record: &R) -> Result<()> {
        let map = field_map::<R>(self.tag);
        let columns = self.columns(&map);
        let (keys, sets): (Vec<_>, Vec<_>) = columns.iter().partition(|c| c.is_primary());
        if sets.is_empty() {
            return Err(self.no_columns::<R>());
        }

        q.reset_generated(Kind::Update, &format!("UPDATE {} SET", self.table));
        for col in sets {
            match self.cell(record, col)? {
                Cell::Value(v) => q.set_update_value(&col.quoted, v),
                Cell::Default => q.set_update_value_args(&format!("{} = DEFAULT", col.quoted), &[]),
            };
        }

        if !q.has_predicate() {
            for col in keys {
                let value = self.read(record, col)?;
                if !value.is_zero() {
                    q.set_where(&col.quoted, value);
                }
            }
        }
        if !q.has_predicate() {
            return Err(Error::UnboundedWrite("UPDATE"));
        }
        Ok(())
    }

    /// `DELETE FROM t WHERE ...` matching every mapped column of the record.
    pub(crate) fn delete<R: Record>(&self, q: &mut Query, record: &R) -> Result<()> {
        let map = field_map::<R>(self.tag);
        let columns = self.insert_columns(&map, record);
        if columns.is_empty() {
            return Err(self.no_columns::<R>());
        }

        q.reset_generated(Kind::Delete, &format!("DELETE FROM {}", self.table));
        for col in &columns {
            let value = self.read(record, col)?;
            q.set_where(&col.quoted, value);
        }
        if !q.has_predicate() {
            return Err(Error::UnboundedWrite("DELETE"));
        }
        Ok(())
    }

    /// `DELETE FROM t` with the pending WHERE clause, which must exist.
    pub(crate) fn delete_where(&self, q: &mut Query) -> Result<()> {
        if !q.has_predicate() {
            return Err(Error::UnboundedWrite("DELETE"));
        }
        q.reset_generated(Kind::Delete, &format!("DELETE FROM {}", self.table));
        Ok(())
    }

    /// `SELECT <projection> FROM t`.
    ///
    /// Records select their mapped columns unless a projection is given;
    /// other destinations select `*`.
    pub(crate) fn select<B: Bind>(&self, q: &mut Query, projection: Option<&str>) -> Result<()> {
        let columns = match (projection, B::field_map(self.tag)) {
            (Some(p), _) => p.to_string(),
            (None, Some(map)) if B::SHAPE == Shape::Struct => {
                let names: Vec<String> = self.columns(&map).into_iter().map(|c| c.quoted).collect();
                if names.is_empty() {
                    return Err(Error::StructTag {
                        record: std::any::type_name::<B>(),
                        tag: self.tag.to_string(),
                    });
                }
                names.join(", ")
            }
            _ => "*".to_string(),
        };
        q.reset_generated(Kind::Select, &format!("SELECT {} FROM {}", columns, self.table));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hook::Hook;
    use crate::meta::{CommonMeta, KeyRole, MySqlMeta, PostgresMeta};
    use crate::Record;

    #[derive(Debug, Default, Record)]
    struct User {
        #[dbkit(json = "id")]
        pub id: i64,
        #[dbkit(json = "name")]
        pub name: String,
        #[dbkit(json = "age")]
        pub age: Option<i32>,
        #[dbkit(json = "note")]
        pub note: Option<String>,
        #[dbkit(json = "tags")]
        pub tags: serde_json::Value,
    }

    fn col(field: &str, not_null: bool, key: KeyRole, default: Option<&str>) -> (String, Column) {
        (
            field.to_string(),
            Column {
                field: field.to_string(),
                sql_type: "varchar(10)".to_string(),
                not_null,
                key,
                default: default.map(str::to_string),
                extra: String::new(),
            },
        )
    }

    fn catalog() -> Columns {
        [
            col("id", true, KeyRole::Primary, None),
            col("name", true, KeyRole::None, None),
            col("age", true, KeyRole::None, Some("18")),
            col("note", false, KeyRole::None, None),
        ]
        .into_iter()
        .collect()
    }

    fn query() -> Query {
        let mut q = Query::new("", &[]);
        q.set_quote(b'"');
        q
    }

    fn layout<'a>(
        meta: &'a dyn TableMeta,
        catalog: &'a Columns,
        hooks: &'a Hooks,
        excluded: &'a HashSet<String>,
    ) -> Layout<'a> {
        Layout {
            meta,
            table: meta.quote_path("users"),
            tag: "json",
            catalog,
            hooks,
            excluded,
        }
    }

    #[test]
    fn test_insert_drops_zero_key_and_uses_defaults() {
        let (meta, catalog, hooks, excluded) =
            (MySqlMeta::new(), catalog(), Hooks::new(), HashSet::new());
        let users = [
            User {
                name: "a".into(),
                ..Default::default()
            },
            User {
                name: "b".into(),
                age: Some(30),
                note: Some("x".into()),
                ..Default::default()
            },
        ];
        let mut q = query();
        layout(&meta, &catalog, &hooks, &excluded)
            .insert(&mut q, &users, false)
            .unwrap();
        assert_eq!(
            q.fmt_sql(),
            r#"INSERT INTO `users` (`name`, `age`, `note`) VALUES ("a", DEFAULT, NULL), ("b", 30, "x")"#
        );
    }

    #[test]
    fn test_not_null_violation_and_hook_default() {
        let mut catalog = catalog();
        if let Some(age) = catalog.get_mut("age") {
            age.default = None;
        }
        let (meta, excluded) = (MySqlMeta::new(), HashSet::new());
        let user = User::default();

        let hooks = Hooks::new();
        let err = layout(&meta, &catalog, &hooks, &excluded)
            .insert(&mut query(), std::slice::from_ref(&user), false)
            .unwrap_err();
        assert!(matches!(err, Error::NotNullViolation(ref c) if c == "age"));

        let mut hooks = Hooks::new();
        hooks.insert("age".into(), Hook::new().default_value(1));
        let mut q = query();
        layout(&meta, &catalog, &hooks, &excluded)
            .insert(&mut q, std::slice::from_ref(&user), false)
            .unwrap();
        assert!(q.fmt_sql().ends_with(r#"VALUES ("", 1, NULL)"#));
    }

    #[test]
    fn test_upsert_tails() {
        let (catalog, hooks, excluded) = (catalog(), Hooks::new(), HashSet::new());
        let user = User {
            id: 7,
            name: "n".into(),
            age: Some(1),
            ..Default::default()
        };

        let meta = MySqlMeta::new();
        let mut q = query();
        layout(&meta, &catalog, &hooks, &excluded)
            .insert(&mut q, std::slice::from_ref(&user), true)
            .unwrap();
        assert!(q.fmt_sql().ends_with(
            "ON DUPLICATE KEY UPDATE `name` = VALUES(`name`), `age` = VALUES(`age`), \
             `note` = VALUES(`note`)"
        ));

        let meta = PostgresMeta::new("public");
        let mut q = query();
        layout(&meta, &catalog, &hooks, &excluded)
            .insert(&mut q, std::slice::from_ref(&user), true)
            .unwrap();
        assert!(q.fmt_sql().ends_with(
            r#"ON CONFLICT ("id") DO UPDATE SET "name" = EXCLUDED."name", "age" = EXCLUDED."age", "note" = EXCLUDED."note""#
        ));
    }

    #[test]
    fn test_update_by_key_or_pending_where() {
        let (meta, catalog, hooks) = (MySqlMeta::new(), catalog(), Hooks::new());
        let mut excluded = HashSet::new();
        excluded.insert("note".to_string());
        let user = User {
            id: 3,
            name: "z".into(),
            age: Some(5),
            ..Default::default()
        };

        let mut q = query();
        layout(&meta, &catalog, &hooks, &excluded)
            .update(&mut q, &user)
            .unwrap();
        assert_eq!(
            q.fmt_sql(),
            r#"UPDATE `users` SET `name` = "z", `age` = 5 WHERE `id` = 3"#
        );

        let mut q = query();
        q.set_where("name", "old");
        layout(&meta, &catalog, &hooks, &excluded)
            .update(&mut q, &user)
            .unwrap();
        assert!(q.fmt_sql().ends_with(r#"WHERE name = "old""#));

        let err = layout(&meta, &catalog, &hooks, &excluded)
            .update(&mut query(), &User::default())
            .unwrap_err();
        assert!(matches!(err, Error::UnboundedWrite("UPDATE")));
    }

    #[test]
    fn test_delete_matches_columns() {
        let (meta, catalog, hooks, excluded) =
            (MySqlMeta::new(), catalog(), Hooks::new(), HashSet::new());
        let user = User {
            name: "q".into(),
            ..Default::default()
        };
        let mut q = query();
        layout(&meta, &catalog, &hooks, &excluded)
            .delete(&mut q, &user)
            .unwrap();
        assert_eq!(
            q.fmt_sql(),
            r#"DELETE FROM `users` WHERE `name` = "q" AND `age` IS NULL AND `note` IS NULL"#
        );

        let err = layout(&meta, &catalog, &hooks, &excluded)
            .delete_where(&mut query())
            .unwrap_err();
        assert!(matches!(err, Error::UnboundedWrite("DELETE")));
    }

    #[test]
    fn test_marshal_hook_on_write() {
        let (meta, catalog, excluded) = (MySqlMeta::new(), Columns::new(), HashSet::new());
        let mut hooks = Hooks::new();
        hooks.insert("tags".into(), Hook::json());
        let user = User {
            id: 1,
            tags: serde_json::json!(["a"]),
            ..Default::default()
        };
        let mut q = query();
        layout(&meta, &catalog, &hooks, &excluded)
            .insert(&mut q, std::slice::from_ref(&user), false)
            .unwrap();
        assert_eq!(
            q.fmt_sql(),
            r#"INSERT INTO `users` (`id`, `name`, `age`, `note`, `tags`) VALUES (1, "", NULL, NULL, "[\"a\"]")"#
        );
    }

    #[test]
    fn test_select_projection() {
        let (meta, catalog, hooks, excluded) =
            (MySqlMeta::new(), catalog(), Hooks::new(), HashSet::new());
        let l = layout(&meta, &catalog, &hooks, &excluded);

        let mut q = query();
        l.select::<User>(&mut q, None).unwrap();
        assert_eq!(q.fmt_sql(), "SELECT `id`, `name`, `age`, `note` FROM `users`");

        let mut q = query();
        l.select::<i64>(&mut q, Some("MAX(id)")).unwrap();
        assert_eq!(q.fmt_sql(), "SELECT MAX(id) FROM `users`");

        let mut q = query();
        l.select::<std::collections::HashMap<String, String>>(&mut q, None)
            .unwrap();
        assert_eq!(q.fmt_sql(), "SELECT * FROM `users`");
    }

    #[derive(Debug, Default, Record)]
    struct Setting {
        #[dbkit(json = "id")]
        pub id: i64,
        #[dbkit(json = "value")]
        pub value: String,
        #[dbkit(json = "set")]
        pub set: i32,
    }

    #[test]
    fn test_keyword_named_columns() {
        let (catalog, hooks, excluded) = (Columns::new(), Hooks::new(), HashSet::new());
        let setting = Setting {
            id: 1,
            value: "x".into(),
            set: 2,
        };

        let mysql = MySqlMeta::new();
        let mut q = query();
        layout(&mysql, &catalog, &hooks, &excluded)
            .insert(&mut q, std::slice::from_ref(&setting), false)
            .unwrap();
        assert_eq!(
            q.fmt_sql(),
            r#"INSERT INTO `users` (`id`, `value`, `set`) VALUES (1, "x", 2)"#
        );

        let common = CommonMeta::new();
        let l = layout(&common, &catalog, &hooks, &excluded);
        let mut q = query();
        l.insert(&mut q, std::slice::from_ref(&setting), false).unwrap();
        assert_eq!(
            q.fmt_sql(),
            r#"INSERT INTO users (id, value, set) VALUES (1, "x", 2)"#
        );

        let mut q = query();
        q.set_where("id", 1);
        l.update(&mut q, &setting).unwrap();
        assert_eq!(
            q.fmt_sql(),
            r#"UPDATE users SET id = 1, value = "x", set = 2 WHERE id = 1"#
        );
    }
}
