//! Table contracts shared by the reannotation stages: which columns are
//! force-new or retainable, where columns sit in a header, and how a row is
//! keyed back to its variant.

pub mod columns;
pub mod header;
pub mod record;

pub use columns::{
    COMMENT_PREFIX, ColumnClass, ColumnRegistry, DEFAULT_RETAIN_COLUMNS, FORCE_NEW_COLUMNS,
    HEADER_LEADERS, RegisteredColumn, is_comment_bytes, is_comment_line, is_header_bytes,
    is_header_line, parse_column_list,
};
pub use header::HeaderIndex;
pub use record::{KEY_COLUMNS, VariantKey, VariantRecord, missing_key_columns};

/// Marker written as the first line of every assembled output table.
pub const VERSION_MARKER: &str = "#version 2.4";
