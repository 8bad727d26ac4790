//! Process-wide settings
//!
//! Defaults cover most uses. An application that wants different ones
//! installs them once at startup, before the first statement is built:
//!
//! ```ignore
//! dbkit::settings::install(dbkit::Settings {
//!     tag: "db".into(),
//!     ..Default::default()
//! });
//! ```

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

mod defaults {
    pub fn tag() -> String {
        "json".to_string()
    }

    pub fn quote() -> char {
        '"'
    }

    pub fn field_cache_size() -> usize {
        1024
    }

    pub fn table_cache_size() -> usize {
        1024
    }

    pub fn page_size() -> u64 {
        10
    }
}

/// Library-wide defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Attribute key naming record columns, e.g. `json` in
    /// `#[dbkit(json = "name")]`
    pub tag: String,

    /// Default string-literal quote, `"` or `'`
    pub quote: char,

    /// Capacity of the record field-map cache
    pub field_cache_size: usize,

    /// Capacity of the table catalog cache
    pub table_cache_size: usize,

    /// Whether composed SQL is logged by default
    pub print_sql: bool,

    /// Page size used when a LIMIT has no size
    pub page_size: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tag: defaults::tag(),
            quote: defaults::quote(),
            field_cache_size: defaults::field_cache_size(),
            table_cache_size: defaults::table_cache_size(),
            print_sql: false,
            page_size: defaults::page_size(),
        }
    }
}

impl Settings {
    /// The literal quote as a byte, falling back to `"` when the configured
    /// one is not a valid quote.
    pub fn quote_byte(&self) -> u8 {
        match u8::try_from(self.quote) {
            Ok(q) if crate::escape::is_valid_quote(q) => q,
            _ => b'"',
        }
    }
}

static SETTINGS: OnceLock<Settings> = OnceLock::new();

/// Install the process-wide settings. Only the first call takes effect;
/// returns `false` if settings were already installed or already read.
pub fn install(settings: Settings) -> bool {
    SETTINGS.set(settings).is_ok()
}

/// The active settings.
pub fn get() -> &'static Settings {
    SETTINGS.get_or_init(Settings::default)
}
