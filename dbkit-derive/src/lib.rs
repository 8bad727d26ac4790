//! Derive macro for dbkit record bindings
//!
//! `#[derive(Record)]` is re-exported from the `dbkit` crate, so users
//! typically don't need to depend on this crate directly.

use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

mod record;

/// Derive field-level access for binding rows and building writes.
///
/// Generates implementations of `dbkit::traits::Record` and
/// `dbkit::traits::Bind`. Every field type must implement `ToValue`,
/// `FromValue` and `Default`, and so must the struct itself (`Default`).
///
/// # Attributes
///
/// - `#[dbkit(json = "column")]` - Column name under tag `json`; any tag name
///   may be used and a field may carry several. Text after the first comma
///   is treated as options and ignored.
/// - `#[dbkit(skip)]` - Leave the field out entirely
///
/// Fields that are not `pub`, untagged, or tagged with an empty column are
/// never mapped.
///
/// # Example
///
/// ```ignore
/// use dbkit::Record;
///
/// #[derive(Debug, Default, Record)]
/// pub struct User {
///     #[dbkit(json = "id", db = "user_id")]
///     pub id: i64,
///     #[dbkit(json = "name,omitempty")]
///     pub name: String,
///     #[dbkit(skip)]
///     pub cache: Vec<u8>,
/// }
/// ```
#[proc_macro_derive(Record, attributes(dbkit))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    record::derive_record_impl(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
