//! Content digests used to detect changed rows without field comparison.
//!
//! The digest covers the raw values joined with a comma. Values that contain
//! the delimiter can therefore collide with a different split of the same
//! text; rows with such collisions are reported as unchanged.

use std::fmt;

use sha2::{Digest, Sha256};

const DELIMITER: &[u8] = b",";

/// SHA-256 digest of one row's raw values in header order.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Digest `values` joined by the row delimiter.
    #[must_use]
    pub fn of_row<S: AsRef<str>>(values: &[S]) -> Self {
        let mut hasher = Sha256::new();
        for (idx, value) in values.iter().enumerate() {
            if idx > 0 {
                hasher.update(DELIMITER);
            }
            hasher.update(value.as_ref().as_bytes());
        }
        Self(hasher.finalize().into())
    }

    /// Raw digest bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn identical_values_hash_identically() {
        let a = ContentHash::of_row(&["S1", "Main St", "51.5"]);
        let b = ContentHash::of_row(&["S1".to_owned(), "Main St".to_owned(), "51.5".to_owned()]);
        assert_eq!(a, b);
    }

    #[rstest]
    fn changed_value_changes_hash() {
        let a = ContentHash::of_row(&["S2", "B"]);
        let b = ContentHash::of_row(&["S2", "B-modified"]);
        assert_ne!(a, b);
    }

    #[rstest]
    fn delimiter_inside_value_collides() {
        let split = ContentHash::of_row(&["a", "b"]);
        let joined = ContentHash::of_row(&["a,b"]);
        assert_eq!(split, joined);
    }

    #[rstest]
    fn renders_lowercase_hex() {
        let hash = ContentHash::of_row::<&str>(&[]);
        assert_eq!(
            hash.to_string(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
