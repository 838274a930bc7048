//! # Local File-System Provider
//!
//! Implements the `FileApiDriver` contract over a directory on the local
//! disk. Paths map one-to-one onto the directory tree under the root.

pub mod driver;
pub mod error;

pub use driver::{LocalFileDriver, BACKEND_NAME};
pub use error::{LocalError, Result};
