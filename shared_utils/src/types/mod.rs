//! Type-Safe Wrappers Module
//!
//! - `file_size`: byte counts with saturating arithmetic and unit display

pub mod file_size;

pub use file_size::FileSize;
