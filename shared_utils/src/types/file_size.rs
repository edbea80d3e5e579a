//! FileSize Type-Safe Wrapper
//!
//! Byte counts for input media and predicted/produced GIFs, with
//! saturating arithmetic and unit display.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Type-safe file size in bytes.
///
/// # Examples
/// ```
/// use shared_utils::types::file_size::FileSize;
///
/// let size = FileSize::from_mb(15);
/// assert_eq!(size.bytes(), 15 * 1024 * 1024);
/// assert_eq!(size.display(), "15.00 MB");
///
/// let smaller = FileSize::new(500);
/// assert_eq!(smaller.saturating_sub(size).bytes(), 0);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileSize(u64);

impl FileSize {
    pub const ZERO: FileSize = FileSize(0);

    pub const KB: u64 = 1024;
    pub const MB: u64 = 1024 * 1024;
    pub const GB: u64 = 1024 * 1024 * 1024;

    #[inline]
    pub const fn new(bytes: u64) -> Self {
        Self(bytes)
    }

    #[inline]
    pub const fn from_mb(mb: u64) -> Self {
        Self(mb * Self::MB)
    }

    #[inline]
    pub const fn bytes(&self) -> u64 {
        self.0
    }

    /// Size in binary megabytes, fractional.
    #[inline]
    pub fn as_mb_f64(&self) -> f64 {
        self.0 as f64 / Self::MB as f64
    }

    /// Saturating subtraction; `other > self` yields zero.
    #[inline]
    pub fn saturating_sub(&self, other: FileSize) -> FileSize {
        FileSize(self.0.saturating_sub(other.0))
    }

    /// Signed percentage change relative to `original`; negative means smaller.
    pub fn size_change_percent(&self, original: FileSize) -> Option<f64> {
        if original.0 == 0 {
            None
        } else {
            Some((self.0 as f64 - original.0 as f64) / original.0 as f64 * 100.0)
        }
    }

    pub fn display(&self) -> String {
        crate::progress::format_bytes(self.0)
    }
}

impl fmt::Debug for FileSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileSize({} = {})", self.0, self.display())
    }
}

impl fmt::Display for FileSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display())
    }
}

impl Default for FileSize {
    fn default() -> Self {
        Self::ZERO
    }
}

impl From<u64> for FileSize {
    fn from(bytes: u64) -> Self {
        Self::new(bytes)
    }
}

impl From<FileSize> for u64 {
    fn from(size: FileSize) -> Self {
        size.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_size_creation() {
        assert_eq!(FileSize::new(1024).bytes(), 1024);
        assert_eq!(FileSize::from_mb(1).bytes(), 1024 * 1024);
    }

    #[test]
    fn test_as_mb_f64() {
        assert_eq!(FileSize::from_mb(8).as_mb_f64(), 8.0);
        assert!(FileSize::new(8 * 1024 * 1024 + 1).as_mb_f64() > 8.0);
        assert_eq!(FileSize::ZERO.as_mb_f64(), 0.0);
    }

    #[test]
    fn test_saturating_sub() {
        let a = FileSize::new(100);
        let b = FileSize::new(30);
        assert_eq!(a.saturating_sub(b).bytes(), 70);
        assert_eq!(b.saturating_sub(a).bytes(), 0);
        assert_eq!(a.saturating_sub(a).bytes(), 0);
    }

    #[test]
    fn test_display() {
        assert_eq!(FileSize::new(500).display(), "500 B");
        assert_eq!(FileSize::new(1024).display(), "1.00 KB");
        assert_eq!(FileSize::new(1024 * 1024).display(), "1.00 MB");
        assert_eq!(FileSize::new(1024 * 1024 * 1024).display(), "1.00 GB");
    }

    #[test]
    fn test_size_change_percent() {
        let input = FileSize::new(1000);
        assert_eq!(FileSize::new(800).size_change_percent(input), Some(-20.0));
        assert_eq!(FileSize::new(1200).size_change_percent(input), Some(20.0));
    }
}
