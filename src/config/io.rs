// src/config/io.rs
use std::fs;
use std::path::Path;

use crate::error::{QtraceError, Result};

/// Reads a config or rule file, keeping the path in the error.
///
/// # Errors
/// Returns `Io` if the file cannot be read.
pub fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| QtraceError::io(e, path))
}
