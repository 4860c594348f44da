//! Extents: spans of token positions inside one document

use crate::DocId;

/// A `[begin, end)` span of positions in `document`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Extent {
    pub document: DocId,
    pub begin: u32,
    pub end: u32,
}

impl Extent {
    pub fn contains(&self, other: &Extent) -> bool {
        self.begin <= other.begin && other.end <= self.end
    }
}

/// Extents of a single document, sorted by `begin`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtentArray {
    document: DocId,
    begins: Vec<u32>,
    ends: Vec<u32>,
}

impl ExtentArray {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all extents and start collecting for `document`
    pub fn reset(&mut self, document: DocId) {
        self.document = document;
        self.begins.clear();
        self.ends.clear();
    }

    pub fn push(&mut self, begin: u32, end: u32) {
        self.begins.push(begin);
        self.ends.push(end);
    }

    pub fn document(&self) -> DocId {
        self.document
    }

    pub fn len(&self) -> usize {
        self.begins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.begins.is_empty()
    }

    pub fn begin(&self, index: usize) -> u32 {
        self.begins[index]
    }

    pub fn end(&self, index: usize) -> u32 {
        self.ends[index]
    }

    pub fn get(&self, index: usize) -> Extent {
        Extent {
            document: self.document,
            begin: self.begins[index],
            end: self.ends[index],
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = Extent> + '_ {
        (0..self.len()).map(move |i| self.get(i))
    }

    /// Replace the contents with `extents`, sorted by (begin, end) with
    /// exact duplicates removed
    pub fn set_sorted_union(&mut self, document: DocId, extents: &mut Vec<(u32, u32)>) {
        extents.sort_unstable();
        extents.dedup();
        self.reset(document);
        for &(begin, end) in extents.iter() {
            self.push(begin, end);
        }
    }
}
