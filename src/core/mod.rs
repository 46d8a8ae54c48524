/// Core Module for QuickDB
///
/// This module contains the connection wrapper, its SQL helpers and the
/// shared error type.

pub mod db;
pub mod error;

// Re-export commonly used types for convenience
pub use error::{DbError, ErrorKind, Result};
