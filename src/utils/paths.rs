use std::borrow::Cow;
use std::fs::File;
use std::path::Path;

use crate::error::FormatError;

/// Maximum accepted export size: 512MB. Bulk exports of several years of
/// history routinely exceed 100MB, so this is far above the JSONL limits used
/// for per-session files.
pub const MAX_EXPORT_BYTES: u64 = 512 * 1024 * 1024;

/// Validates that a file's size is within acceptable limits
///
/// Takes an open file handle to avoid TOCTOU (time-of-check-time-of-use)
/// race conditions where the file could be swapped between the size check
/// and the read.
///
/// # Errors
///
/// Returns [`FormatError::Io`] if the metadata cannot be read and
/// [`FormatError::TooLarge`] if the file exceeds `max_bytes`.
pub fn validate_file_size(file: &File, path: &Path, max_bytes: u64) -> Result<(), FormatError> {
    let metadata =
        file.metadata().map_err(|source| FormatError::Io { path: path.to_path_buf(), source })?;

    let size = metadata.len();
    if size > max_bytes {
        return Err(FormatError::TooLarge { path: path.to_path_buf(), size, max: max_bytes });
    }

    Ok(())
}

/// Formats a path with ~ substitution for the home directory
pub fn format_path_with_tilde(path: &Path) -> String {
    let home = dirs::home_dir();
    format_path_with_tilde_internal(path, home.as_deref())
}

pub(crate) fn format_path_with_tilde_internal(path: &Path, home: Option<&Path>) -> String {
    if let Some(home) = home
        && let Ok(rest) = path.strip_prefix(home)
    {
        if rest.as_os_str().is_empty() {
            return "~".to_string();
        }
        return format!("~/{}", rest.display());
    }

    match path.to_string_lossy() {
        Cow::Borrowed(s) => s.to_string(),
        Cow::Owned(s) => s,
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::path::PathBuf;

    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn test_validate_file_size_within_limit() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"[]").unwrap();
        let handle = File::open(file.path()).unwrap();
        assert!(validate_file_size(&handle, file.path(), 16).is_ok());
    }

    #[test]
    fn test_validate_file_size_over_limit() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&[b' '; 64]).unwrap();
        let handle = File::open(file.path()).unwrap();
        let err = validate_file_size(&handle, file.path(), 16).unwrap_err();
        assert!(matches!(err, FormatError::TooLarge { size: 64, max: 16, .. }));
        assert!(err.to_string().contains("File too large"));
    }

    #[test]
    fn test_format_path_with_tilde() {
        let home = PathBuf::from("/home/tester");

        let inside = PathBuf::from("/home/tester/.local/share/chat-atlas");
        assert_eq!(
            format_path_with_tilde_internal(&inside, Some(&home)),
            "~/.local/share/chat-atlas"
        );

        assert_eq!(format_path_with_tilde_internal(&home, Some(&home)), "~");

        let outside = PathBuf::from("/opt/data");
        assert_eq!(format_path_with_tilde_internal(&outside, Some(&home)), "/opt/data");

        // Prefix match must respect path components
        let sibling = PathBuf::from("/home/tester2/data");
        assert_eq!(format_path_with_tilde_internal(&sibling, Some(&home)), "/home/tester2/data");
    }
}
