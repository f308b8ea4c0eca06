//! stm-core: Core library for merging specimen tables
//!
//! This library provides functionality to:
//! - Load tab, comma or semicolon delimited tables
//! - Concatenate them with column-union semantics
//! - Group rows on a unifying field, exactly or with fuzzy normalization
//! - Collapse each group into one row, keeping conflicting groups unmerged
//!   with an explanatory remark
//! - Run batches of merges described in JSON

pub mod batch;
pub mod error;
pub mod format;
pub mod key;
pub mod merger;
pub mod report;
pub mod scanner;
pub mod table;

pub use batch::{BatchFile, MergeJob};
pub use error::{Error, ErrorKind, Result};
pub use format::{Delimiter, DelimitedFormat, LineEnding, TableFormat};
pub use key::{fuzzy_normalize, group_key};
pub use merger::{
    conflict_remark, group_rows, load_inputs, merge, merge_table, merge_to_writer, unify_group,
    Group, MergeConfig, MergedTable, Unified, REMARKS_COLUMN,
};
pub use report::{ConflictRecord, MergeReport, Warning};
pub use scanner::expand_inputs;
pub use table::{concat_tables, CellValue, Column, Row, Table};
