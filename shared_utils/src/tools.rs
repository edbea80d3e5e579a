//! External tool discovery.

use std::path::{Path, PathBuf};

/// Resolves a tool: an explicit path must exist, otherwise the name is looked
/// up on `PATH`.
pub fn locate_tool(name: &str, explicit: Option<&Path>) -> Option<PathBuf> {
    match explicit {
        Some(path) if path.is_file() => Some(path.to_path_buf()),
        Some(path) => which::which(path).ok(),
        None => which::which(name).ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locate_missing_tool() {
        assert!(locate_tool("definitely_not_a_tool_xyz", None).is_none());
    }

    #[test]
    fn test_locate_explicit_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert_eq!(
            locate_tool("ffmpeg", Some(file.path())),
            Some(file.path().to_path_buf())
        );
    }

    #[test]
    fn test_locate_explicit_missing_path() {
        assert!(locate_tool("ffmpeg", Some(Path::new("/no/such/dir/ffmpeg_xyz"))).is_none());
    }
}
