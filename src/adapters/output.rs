//! File output shared by the chart renderers.

use std::fs;
use std::path::Path;

use crate::domain::error::ChartError;

pub(crate) fn output_error(path: &Path, e: impl std::fmt::Display) -> ChartError {
    ChartError::Output {
        path: path.display().to_string(),
        reason: e.to_string(),
    }
}

/// Writes `contents` to `path`, creating missing parent directories.
pub fn write_output(path: &Path, contents: &str) -> Result<(), ChartError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| output_error(path, e))?;
    }
    fs::write(path, contents).map_err(|e| output_error(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn creates_parent_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("charts").join("2024").join("out.json");
        write_output(&path, "{}").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "{}");
    }

    #[test]
    fn unwritable_target_is_output_error() {
        let dir = tempdir().unwrap();
        let err = write_output(dir.path(), "x").unwrap_err();
        assert!(matches!(err, ChartError::Output { .. }));
    }
}
