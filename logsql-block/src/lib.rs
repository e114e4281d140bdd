//! In-memory block model for the LogsQL engine: typed dictionary-compressed
//! columns, per-block headers with value bounds, the working bitmap used by
//! filter evaluation, and the canonical string codecs for every value type.
//!
//! Modules:
//! - bitmap: fixed-length packed bitset plus a thread-local pool.
//! - pool:   thread-local byte/string buffer pools with RAII guards.
//! - value:  `ValueType` and per-type decode/render/parse routines.
//! - block:  `Block`, `ColumnHeader`, the block encoder and `BlockResult`.

#![forbid(unsafe_code)]

pub mod bitmap;
pub mod block;
pub mod pool;
pub mod value;

pub use bitmap::{get_bitmap, Bitmap, PooledBitmap};
pub use block::{Block, BlockResult, Column, ColumnHeader, ConstColumn, Field, ResultColumn, TenantId};
pub use value::ValueType;
