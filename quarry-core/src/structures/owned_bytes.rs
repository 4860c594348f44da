//! Cheaply cloneable views into shared immutable bytes

use std::ops::Range;
use std::sync::Arc;

/// Shared byte buffer plus the window this handle can see.
///
/// A decoded block is loaded once and every value handed out of it is a
/// slice of the same allocation.
#[derive(Debug, Clone)]
pub struct OwnedBytes {
    data: Arc<Vec<u8>>,
    range: Range<usize>,
}

impl OwnedBytes {
    pub fn new(data: Vec<u8>) -> Self {
        let len = data.len();
        Self {
            data: Arc::new(data),
            range: 0..len,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }

    /// Sub-slice relative to this view. Panics like slice indexing when out of bounds.
    pub fn slice(&self, range: Range<usize>) -> Self {
        assert!(
            range.start <= range.end && range.end <= self.len(),
            "slice {:?} out of bounds for length {}",
            range,
            self.len()
        );
        let start = self.range.start + range.start;
        let end = self.range.start + range.end;
        Self {
            data: Arc::clone(&self.data),
            range: start..end,
        }
    }

    /// Checked variant of [`slice`](Self::slice)
    pub fn get(&self, range: Range<usize>) -> Option<Self> {
        (range.start <= range.end && range.end <= self.len()).then(|| self.slice(range))
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data[self.range.clone()]
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.as_slice().to_vec()
    }
}

impl Default for OwnedBytes {
    fn default() -> Self {
        Self::empty()
    }
}

impl AsRef<[u8]> for OwnedBytes {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl std::ops::Deref for OwnedBytes {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.as_slice()
    }
}

impl PartialEq for OwnedBytes {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl Eq for OwnedBytes {}
