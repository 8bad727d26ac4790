//! Statement composer
//!
//! A [`Query`] starts from a template with placeholders and accumulates
//! clauses in separate buffers. The final statement is merged in canonical
//! order: header, `SET`/`VALUES`, `WHERE`, `GROUP BY`, `HAVING`,
//! `ORDER BY`, `LIMIT`, then the extension text.
//!
//! ```ignore
//! use dbkit::{params, Query};
//!
//! let mut q = Query::new("SELECT u_name FROM sys_user WHERE name = ?", params!["t"]);
//! q.set_where_args("age IN (?)", params![vec![80, 100]]);
//! assert_eq!(
//!     q.sql_str(),
//!     r#"SELECT u_name FROM sys_user WHERE name = "t" AND age IN (80,100);"#
//! );
//! ```

mod expand;

use std::panic::Location;
use std::sync::{Arc, Mutex, PoisonError};

pub use expand::{Mode, Style};
pub(crate) use expand::{expand, expand_to_string, render};

use crate::error::{Error, Result};
use crate::escape::is_valid_quote;
use crate::log::Logger;
use crate::traits::ToValue;
use crate::value::Value;

/// Statement kind, taken from the first six characters of the template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Insert,
    Delete,
    Select,
    Update,
    None,
}

impl Kind {
    /// Detect the kind of `template`. `REPLACE` counts as an insert.
    pub fn detect(template: &str) -> Kind {
        let head = template.trim_start().as_bytes();
        let Some(head) = head.get(..6) else {
            return Kind::None;
        };
        const KINDS: [(&[u8; 6], Kind); 5] = [
            (b"INSERT", Kind::Insert),
            (b"REPLAC", Kind::Insert),
            (b"DELETE", Kind::Delete),
            (b"SELECT", Kind::Select),
            (b"UPDATE", Kind::Update),
        ];
        KINDS
            .iter()
            .find(|(word, _)| head.eq_ignore_ascii_case(*word))
            .map_or(Kind::None, |(_, kind)| *kind)
    }
}

/// Where the `%` wildcards go in a LIKE pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeKind {
    /// `%value%`
    All,
    /// `%value`
    Left,
    /// `value%`
    Right,
}

impl LikeKind {
    fn pattern(self, value: &str) -> String {
        match self {
            LikeKind::All => format!("%{value}%"),
            LikeKind::Left => format!("%{value}"),
            LikeKind::Right => format!("{value}%"),
        }
    }
}

/// Join flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
}

impl JoinKind {
    fn keyword(self) -> &'static str {
        match self {
            JoinKind::Inner => " JOIN ",
            JoinKind::Left => " LEFT JOIN ",
            JoinKind::Right => " RIGHT JOIN ",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Conj {
    And,
    Or,
}

#[derive(Debug, Default, Clone)]
struct Buffers {
    main: String,
    values: String,
    where_: String,
    group_by: String,
    having: String,
    order_by: String,
    limit: String,
    ext: String,
}

impl Buffers {
    fn clear(&mut self) {
        self.main.clear();
        self.values.clear();
        self.where_.clear();
        self.group_by.clear();
        self.having.clear();
        self.order_by.clear();
        self.limit.clear();
        self.ext.clear();
    }
}

const FREE_LIST_MAX: usize = 64;

static FREE_LIST: Mutex<Vec<Buffers>> = Mutex::new(Vec::new());

fn acquire() -> Buffers {
    FREE_LIST
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .pop()
        .unwrap_or_default()
}

fn release(mut bufs: Buffers) {
    bufs.clear();
    let mut list = FREE_LIST.lock().unwrap_or_else(PoisonError::into_inner);
    if list.len() < FREE_LIST_MAX {
        list.push(bufs);
    }
}

/// A stateful SQL text builder.
///
/// Not safe for concurrent use; each caller owns its own instance. A
/// pooled instance (see [`Query::pooled`]) hands its buffers back to a
/// process-wide free list exactly once, when it is finished or dropped.
pub struct Query {
    kind: Kind,
    has_where: bool,
    has_set: bool,
    has_values: bool,
    style: Style,
    print_log: bool,
    origin: &'static Location<'static>,
    logger: Option<Arc<dyn Logger>>,
    bufs: Buffers,
    pooled: bool,
}

impl std::fmt::Debug for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Query")
            .field("kind", &self.kind)
            .field("main", &self.bufs.main)
            .field("pooled", &self.pooled)
            .finish_non_exhaustive()
    }
}

impl Query {
    /// Create a composer from `template`, expanding its placeholders
    /// against `args`.
    #[track_caller]
    pub fn new(template: &str, args: &[Value]) -> Self {
        Self::build(template, args, Style::default(), Buffers::default(), false, Location::caller())
    }

    /// Like [`Query::new`], with buffers taken from the free list.
    ///
    /// A pooled composer cannot be cloned.
    #[track_caller]
    pub fn pooled(template: &str, args: &[Value]) -> Self {
        Self::build(template, args, Style::default(), acquire(), true, Location::caller())
    }

    /// A pooled composer using the given literal style from the start.
    pub(crate) fn pooled_styled(
        template: &str,
        args: &[Value],
        style: Style,
        origin: &'static Location<'static>,
    ) -> Self {
        Self::build(template, args, style, acquire(), true, origin)
    }

    fn build(
        template: &str,
        args: &[Value],
        style: Style,
        mut bufs: Buffers,
        pooled: bool,
        origin: &'static Location<'static>,
    ) -> Self {
        bufs.clear();
        let mut q = Self {
            kind: Kind::None,
            has_where: false,
            has_set: false,
            has_values: false,
            style,
            print_log: crate::settings::get().print_sql,
            origin,
            logger: None,
            bufs,
            pooled,
        };
        q.reset_main(template, args);
        q
    }

    /// Replace the header and rescan it for kind and keywords.
    pub(crate) fn reset_main(&mut self, template: &str, args: &[Value]) {
        self.kind = Kind::detect(template);
        self.has_where = find_keyword(template, "WHERE", 0).is_some();
        self.has_set = find_keyword(template, "SET", 0).is_some();
        // VALUE also covers VALUES
        self.has_values = find_keyword(template, "VALUE", 0).is_some()
            || find_keyword(template, "VALUES", 0).is_some();
        self.bufs.main.clear();
        expand(&mut self.bufs.main, template, args, &self.style);
    }

    /// Replace the header with generated text whose keywords are already
    /// known, so column names inside it are never mistaken for them.
    pub(crate) fn reset_generated(&mut self, kind: Kind, header: &str) {
        self.kind = kind;
        self.has_where = false;
        self.has_set = kind == Kind::Update;
        self.has_values = false;
        self.bufs.main.clear();
        self.bufs.main.push_str(header);
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn is_pooled(&self) -> bool {
        self.pooled
    }

    /// Whether a header has been set.
    pub fn has_header(&self) -> bool {
        !self.bufs.main.trim().is_empty()
    }

    /// Whether any WHERE predicate exists, in the template or added later.
    pub fn has_predicate(&self) -> bool {
        self.has_where || !self.bufs.where_.is_empty()
    }

    /// Whether a LIMIT exists, in the template or added later.
    pub fn has_limit(&self) -> bool {
        !self.bufs.limit.is_empty() || find_keyword(&self.bufs.main, "LIMIT", 0).is_some()
    }

    pub fn style(&self) -> Style {
        self.style
    }

    /// Set the string-literal quote. Anything but `"` or `'` is ignored.
    pub fn set_quote(&mut self, quote: u8) -> &mut Self {
        if is_valid_quote(quote) {
            self.style.quote = quote;
        }
        self
    }

    /// Prefix written before each quoted literal, e.g. `E`.
    pub fn set_escape_prefix(&mut self, prefix: &'static str) -> &mut Self {
        self.style.prefix = prefix;
        self
    }

    pub fn set_ident_quote(&mut self, quote: Option<u8>) -> &mut Self {
        self.style.ident_quote = quote;
        self
    }

    /// Adopt a whole literal style, e.g. an adapter's. An invalid quote
    /// keeps the current one.
    pub fn set_style(&mut self, style: Style) -> &mut Self {
        let quote = self.style.quote;
        self.style = style;
        self.style.quote = quote;
        self.set_quote(style.quote)
    }

    pub fn set_print_log(&mut self, print: bool) -> &mut Self {
        self.print_log = print;
        self
    }

    /// Override the source location reported in log lines.
    pub fn set_origin(&mut self, origin: &'static Location<'static>) -> &mut Self {
        self.origin = origin;
        self
    }

    /// Use `logger` instead of the process-wide one.
    pub fn set_logger(&mut self, logger: Arc<dyn Logger>) -> &mut Self {
        self.logger = Some(logger);
        self
    }

    fn literal(&self, value: &Value) -> String {
        let mut out = String::new();
        render(&mut out, value, Mode::Quoted, &self.style);
        out
    }

    fn where_connective(&mut self, conj: Conj) {
        let w = &mut self.bufs.where_;
        if w.is_empty() {
            if !self.has_where {
                w.push_str(" WHERE ");
                return;
            }
            // The template may end right after its own WHERE keyword.
            if ends_with_keyword(&self.bufs.main, "WHERE") {
                w.push(' ');
                return;
            }
        }
        w.push_str(match conj {
            Conj::And => " AND ",
            Conj::Or => " OR ",
        });
    }

    fn push_predicate(&mut self, conj: Conj, predicate: &str) {
        self.where_connective(conj);
        self.bufs.where_.push_str(predicate);
    }

    fn condition(&self, field: &str, op: &str, value: &Value) -> String {
        let op = op.trim().to_ascii_uppercase();
        if value.is_null() {
            return match op.as_str() {
                "=" | "IS" => format!("{field} IS NULL"),
                "!=" | "<>" | "IS NOT" => format!("{field} IS NOT NULL"),
                _ => format!("{field} {op} NULL"),
            };
        }
        if op == "IN" || op == "NOT IN" {
            if let Value::String(s) = value {
                if starts_with_keyword(s, "SELECT") {
                    return format!("{field} {op} ({})", s.trim());
                }
            }
            let mut out = format!("{field} {op} (");
            render(&mut out, value, Mode::Quoted, &self.style);
            out.push(')');
            return out;
        }
        format!("{field} {op} {}", self.literal(value))
    }

    /// `AND field = value`
    pub fn set_where(&mut self, field: &str, value: impl ToValue) -> &mut Self {
        self.set_where_op(field, "=", value)
    }

    /// `AND field <op> value`.
    ///
    /// `IN` takes a sequence or a `SELECT ...` subquery string; a NULL value
    /// with `=` or `!=` becomes `IS NULL` / `IS NOT NULL`.
    pub fn set_where_op(&mut self, field: &str, op: &str, value: impl ToValue) -> &mut Self {
        let predicate = self.condition(field, op, &value.to_value());
        self.push_predicate(Conj::And, &predicate);
        self
    }

    /// `OR field = value`
    pub fn set_or_where(&mut self, field: &str, value: impl ToValue) -> &mut Self {
        self.set_or_where_op(field, "=", value)
    }

    pub fn set_or_where_op(&mut self, field: &str, op: &str, value: impl ToValue) -> &mut Self {
        let predicate = self.condition(field, op, &value.to_value());
        self.push_predicate(Conj::Or, &predicate);
        self
    }

    /// Free-form predicate joined with `AND`.
    pub fn set_where_args(&mut self, template: &str, args: &[Value]) -> &mut Self {
        let predicate = expand_to_string(template.trim(), args, &self.style);
        self.push_predicate(Conj::And, &predicate);
        self
    }

    /// Free-form predicate joined with `OR`.
    pub fn set_or_where_args(&mut self, template: &str, args: &[Value]) -> &mut Self {
        let predicate = expand_to_string(template.trim(), args, &self.style);
        self.push_predicate(Conj::Or, &predicate);
        self
    }

    pub fn set_where_in(&mut self, field: &str, values: impl ToValue) -> &mut Self {
        self.set_where_op(field, "IN", values)
    }

    pub fn set_like(&mut self, field: &str, kind: LikeKind, value: &str) -> &mut Self {
        self.set_where_op(field, "LIKE", kind.pattern(value))
    }

    pub fn set_or_like(&mut self, field: &str, kind: LikeKind, value: &str) -> &mut Self {
        self.set_or_where_op(field, "LIKE", kind.pattern(value))
    }

    fn between(&self, field: &str, low: &Value, high: &Value) -> String {
        format!(
            "({field} BETWEEN {} AND {})",
            self.literal(low),
            self.literal(high)
        )
    }

    /// `AND (field BETWEEN low AND high)`
    pub fn set_between(&mut self, field: &str, low: impl ToValue, high: impl ToValue) -> &mut Self {
        let predicate = self.between(field, &low.to_value(), &high.to_value());
        self.push_predicate(Conj::And, &predicate);
        self
    }

    pub fn set_or_between(
        &mut self,
        field: &str,
        low: impl ToValue,
        high: impl ToValue,
    ) -> &mut Self {
        let predicate = self.between(field, &low.to_value(), &high.to_value());
        self.push_predicate(Conj::Or, &predicate);
        self
    }

    fn set_separator(&mut self) {
        if !self.bufs.values.is_empty() {
            self.bufs.values.push_str(", ");
        } else if !self.has_set {
            self.bufs.values.push_str(" SET ");
        } else if ends_with_keyword(&self.bufs.main, "SET") {
            self.bufs.values.push(' ');
        } else {
            self.bufs.values.push_str(", ");
        }
    }

    fn values_separator(&mut self) {
        if !self.bufs.values.is_empty() {
            self.bufs.values.push_str(", ");
        } else if !self.has_values {
            self.bufs.values.push_str(" VALUES ");
        } else if ends_with_keyword(&self.bufs.main, "VALUES")
            || ends_with_keyword(&self.bufs.main, "VALUE")
        {
            self.bufs.values.push(' ');
        } else {
            self.bufs.values.push_str(", ");
        }
    }

    fn warn_kind(&self, call: &str, wanted: Kind) {
        crate::log::resolve(self.logger.as_ref()).warning(format_args!(
            "({}:{}) {call} ignored on a {:?} statement, expected {:?}",
            self.origin.file(),
            self.origin.line(),
            self.kind,
            wanted
        ));
    }

    /// `SET field = value` on an UPDATE.
    pub fn set_update_value(&mut self, field: &str, value: impl ToValue) -> &mut Self {
        if self.kind != Kind::Update {
            self.warn_kind("set_update_value", Kind::Update);
            return self;
        }
        let literal = self.literal(&value.to_value());
        self.set_separator();
        self.bufs.values.push_str(field);
        self.bufs.values.push_str(" = ");
        self.bufs.values.push_str(&literal);
        self
    }

    /// Free-form assignment on an UPDATE, e.g. `age=?`.
    pub fn set_update_value_args(&mut self, template: &str, args: &[Value]) -> &mut Self {
        if self.kind != Kind::Update {
            self.warn_kind("set_update_value_args", Kind::Update);
            return self;
        }
        let assignment = expand_to_string(template.trim(), args, &self.style);
        self.set_separator();
        self.bufs.values.push_str(&assignment);
        self
    }

    /// Append one `(v1, v2, ...)` tuple to an INSERT.
    pub fn set_insert_values(&mut self, values: &[Value]) -> &mut Self {
        if self.kind != Kind::Insert {
            self.warn_kind("set_insert_values", Kind::Insert);
            return self;
        }
        let mut tuple = String::from("(");
        for (n, value) in values.iter().enumerate() {
            if n > 0 {
                tuple.push_str(", ");
            }
            render(&mut tuple, value, Mode::Quoted, &self.style);
        }
        tuple.push(')');
        self.values_separator();
        self.bufs.values.push_str(&tuple);
        self
    }

    /// Append a tuple built from a template.
    ///
    /// The expansion is wrapped in parentheses unless it already starts
    /// with one; the decision is made for each call on its own.
    pub fn set_insert_values_args(&mut self, template: &str, args: &[Value]) -> &mut Self {
        if self.kind != Kind::Insert {
            self.warn_kind("set_insert_values_args", Kind::Insert);
            return self;
        }
        let expanded = expand_to_string(template.trim(), args, &self.style);
        self.values_separator();
        if expanded.starts_with('(') {
            self.bufs.values.push_str(&expanded);
        } else {
            self.bufs.values.push('(');
            self.bufs.values.push_str(&expanded);
            self.bufs.values.push(')');
        }
        self
    }

    /// Append `[LEFT|RIGHT] JOIN table ON condition` to the header.
    pub fn join(&mut self, kind: JoinKind, table: &str, on: &str) -> &mut Self {
        let main = &mut self.bufs.main;
        main.truncate(main.trim_end().len());
        main.push_str(kind.keyword());
        main.push_str(table.trim());
        main.push_str(" ON ");
        main.push_str(on.trim());
        self
    }

    pub fn left_join(&mut self, table: &str, on: &str) -> &mut Self {
        self.join(JoinKind::Left, table, on)
    }

    pub fn right_join(&mut self, table: &str, on: &str) -> &mut Self {
        self.join(JoinKind::Right, table, on)
    }

    pub fn set_group_by(&mut self, columns: &str) -> &mut Self {
        self.bufs.group_by = format!(" GROUP BY {}", columns.trim());
        self
    }

    pub fn set_having(&mut self, template: &str, args: &[Value]) -> &mut Self {
        self.bufs.having = format!(
            " HAVING {}",
            expand_to_string(template.trim(), args, &self.style)
        );
        self
    }

    pub fn set_order_by(&mut self, order: &str) -> &mut Self {
        self.bufs.order_by = format!(" ORDER BY {}", order.trim());
        self
    }

    /// `LIMIT size OFFSET (page-1)*size`, with page and size clamped to at
    /// least one. A zero size falls back to the default page size.
    pub fn set_limit(&mut self, page: u64, size: u64) -> &mut Self {
        let page = page.max(1);
        let size = if size == 0 {
            crate::settings::get().page_size.max(1)
        } else {
            size
        };
        let offset = (page - 1).saturating_mul(size);
        self.bufs.limit = format!(" LIMIT {size} OFFSET {offset}");
        self
    }

    /// Append free text to the extension block.
    ///
    /// The expansion is trimmed and joined to what precedes it by exactly
    /// one space; blank text is dropped.
    pub fn append(&mut self, template: &str, args: &[Value]) -> &mut Self {
        let expanded = expand_to_string(template, args, &self.style);
        let fragment = expanded.trim();
        if !fragment.is_empty() {
            self.bufs.ext.push(' ');
            self.bufs.ext.push_str(fragment);
        }
        self
    }

    /// `ON DUPLICATE KEY UPDATE <assignments>` on an INSERT.
    pub fn set_on_duplicate_key_update(&mut self, template: &str, args: &[Value]) -> &mut Self {
        if self.kind != Kind::Insert {
            self.warn_kind("set_on_duplicate_key_update", Kind::Insert);
            return self;
        }
        let assignments = expand_to_string(template.trim(), args, &self.style);
        self.append("ON DUPLICATE KEY UPDATE ?v", &[Value::String(assignments)])
    }

    fn merge(&self, header: &str, full: bool) -> String {
        let b = &self.bufs;
        let mut sql = String::with_capacity(
            header.len()
                + b.values.len()
                + b.where_.len()
                + b.group_by.len()
                + b.having.len()
                + b.order_by.len()
                + b.limit.len()
                + b.ext.len()
                + 1,
        );
        sql.push_str(header.trim_end());
        sql.push_str(&b.values);
        sql.push_str(&b.where_);
        sql.push_str(&b.group_by);
        sql.push_str(&b.having);
        if full {
            sql.push_str(&b.order_by);
            sql.push_str(&b.limit);
            sql.push_str(&b.ext);
        }
        sql
    }

    fn log(&self, sql: &str) {
        if self.print_log {
            crate::log::resolve(self.logger.as_ref()).info(format_args!(
                "({}:{}) {sql}",
                self.origin.file(),
                self.origin.line()
            ));
        }
    }

    fn retire(&mut self) {
        if self.pooled {
            self.pooled = false;
            release(std::mem::take(&mut self.bufs));
        }
    }

    fn finish(mut self, terminated: bool) -> String {
        self.take(terminated)
    }

    fn take(&mut self, terminated: bool) -> String {
        let mut sql = self.merge(&self.bufs.main, true);
        if terminated {
            sql.push(';');
        }
        self.log(&sql);
        self.retire();
        sql
    }

    /// Like [`Query::sql_str`], leaving an emptied composer behind.
    pub(crate) fn take_sql(&mut self) -> String {
        self.take(true)
    }

    /// The final statement, terminated with `;`. Retires the composer.
    pub fn sql_str(self) -> String {
        self.finish(true)
    }

    /// The final statement without the trailing `;`. Retires the composer.
    pub fn fmt_sql(self) -> String {
        self.finish(false)
    }

    /// Count form of a SELECT: the projection becomes `COUNT(*)`, and
    /// ORDER BY, LIMIT and the extension block are left out.
    ///
    /// Returns an empty string for other statement kinds. The composer
    /// stays usable.
    pub fn total_sql_str(&self) -> String {
        if self.kind != Kind::Select {
            return String::new();
        }
        let main = self.bufs.main.trim_start();
        let Some(from) = find_keyword(main, "FROM", 6) else {
            return String::new();
        };
        let header = format!("{} COUNT(*) {}", &main[..6], &main[from..]);
        let mut sql = self.merge(&header, false);
        sql.push(';');
        self.log(&sql);
        sql
    }

    /// Duplicate a composer created with [`Query::new`].
    pub fn try_clone(&self) -> Result<Self> {
        if self.pooled {
            return Err(Error::PooledClone);
        }
        Ok(Self {
            kind: self.kind,
            has_where: self.has_where,
            has_set: self.has_set,
            has_values: self.has_values,
            style: self.style,
            print_log: self.print_log,
            origin: self.origin,
            logger: self.logger.clone(),
            bufs: self.bufs.clone(),
            pooled: false,
        })
    }
}

impl Drop for Query {
    fn drop(&mut self) {
        self.retire();
    }
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Position of `keyword` as a whole word in `hay`, at or after `from`,
/// ignoring ASCII case. Text inside quotes or backticks never matches.
pub(crate) fn find_keyword(hay: &str, keyword: &str, from: usize) -> Option<usize> {
    let bytes = hay.as_bytes();
    let kw = keyword.as_bytes();
    if kw.is_empty() {
        return None;
    }
    let mut quote: Option<u8> = None;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if let Some(q) = quote {
            if b == b'\\' && q != b'`' {
                i += 2;
                continue;
            }
            if b == q {
                quote = None;
            }
            i += 1;
            continue;
        }
        if matches!(b, b'\'' | b'"' | b'`') {
            quote = Some(b);
        } else if i >= from
            && bytes.len() - i >= kw.len()
            && bytes[i..i + kw.len()].eq_ignore_ascii_case(kw)
            && (i == 0 || !is_word_byte(bytes[i - 1]))
            && bytes.get(i + kw.len()).map_or(true, |&c| !is_word_byte(c))
        {
            return Some(i);
        }
        i += 1;
    }
    None
}

fn starts_with_keyword(s: &str, keyword: &str) -> bool {
    find_keyword(s.trim_start(), keyword, 0) == Some(0)
}

fn ends_with_keyword(s: &str, keyword: &str) -> bool {
    let s = s.trim_end();
    s.len() >= keyword.len()
        && find_keyword(s, keyword, s.len() - keyword.len()) == Some(s.len() - keyword.len())
}
