//! # `gridlink_core`
//!
//! This is the `gridlink_core` library!
//! It contains the shared wire data model for the Gridlink clients.
//!
//! There are three ways a Gridlink widget reaches its document right now:
//! 1. Embedded in the host platform's iframe (via the injected plugin API)
//! 2. Standalone against a REST proxy (`gridlink_proxy`)
//! 3. A local developer mock
//!
//! All three exchange the same shapes: columnar table snapshots, tagged
//! list cells, column descriptors, and user-action tuples. This crate
//! defines those shapes and their codecs; it performs no I/O.

#![warn(missing_docs)]

/// User-action tuples and per-action results
pub mod action;

/// Column descriptors and widget options
pub mod column;

/// Error type shared by all Gridlink crates
pub mod error;

/// Columnar table snapshots and row records
pub mod table;

/// Cell values and the tagged list-cell codec
pub mod value;

pub use action::{ActionResult, UserAction};
pub use column::{sort_by_col_id, ColType, ColumnDescriptor, WidgetOptions, PROTECTED_COL_IDS};
pub use error::{GridlinkError, Result};
pub use table::{Record, TableSnapshot};
pub use value::{decode_list_cell, encode_list_cell, CellValue};
