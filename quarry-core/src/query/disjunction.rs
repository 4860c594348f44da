//! Extent disjunction (`#syn`)

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use super::traits::{CountIterator, DocIterator, ExtentIterator, ScoringContext};
use crate::structures::{ExtentArray, TERMINATED};
use crate::{DocId, Result};

/// Union of extent children.
///
/// Children are kept in a min-heap keyed on their current candidate; the
/// heap head is the disjunction's candidate. Extents at a document are the
/// sorted union of the extents of every child sitting on it.
pub struct ExtentDisjunction {
    children: Vec<Box<dyn ExtentIterator>>,
    heap: BinaryHeap<Reverse<(DocId, usize)>>,
    extents: ExtentArray,
    loaded: Option<DocId>,
    raw: Vec<(u32, u32)>,
}

impl ExtentDisjunction {
    pub fn new(children: Vec<Box<dyn ExtentIterator>>) -> Self {
        let mut disjunction = Self {
            heap: BinaryHeap::with_capacity(children.len()),
            children,
            extents: ExtentArray::new(),
            loaded: None,
            raw: Vec::new(),
        };
        disjunction.rebuild_heap();
        disjunction
    }

    fn rebuild_heap(&mut self) {
        self.heap.clear();
        for (i, child) in self.children.iter().enumerate() {
            if !child.is_done() {
                self.heap.push(Reverse((child.current_candidate(), i)));
            }
        }
    }

    fn load_extents(&mut self, document: DocId) -> Result<()> {
        if self.loaded == Some(document) {
            return Ok(());
        }
        self.raw.clear();
        let ctx = ScoringContext::new(document, 0);
        for child in self.children.iter_mut() {
            if child.has_match(document) {
                self.raw
                    .extend(child.extents(&ctx)?.iter().map(|e| (e.begin, e.end)));
            }
        }
        self.extents.set_sorted_union(document, &mut self.raw);
        self.loaded = Some(document);
        Ok(())
    }
}

impl DocIterator for ExtentDisjunction {
    fn current_candidate(&self) -> DocId {
        self.heap.peek().map_or(TERMINATED, |Reverse((doc, _))| *doc)
    }

    fn move_to(&mut self, document: DocId) -> Result<()> {
        while let Some(&Reverse((candidate, i))) = self.heap.peek() {
            if candidate >= document {
                break;
            }
            self.heap.pop();
            let child = &mut self.children[i];
            child.move_to(document)?;
            if !child.is_done() {
                self.heap.push(Reverse((child.current_candidate(), i)));
            }
        }
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        for child in self.children.iter_mut() {
            child.reset()?;
        }
        self.loaded = None;
        self.rebuild_heap();
        Ok(())
    }

    fn total_entries(&self) -> u64 {
        self.children.iter().map(|c| c.total_entries()).sum()
    }
}

impl CountIterator for ExtentDisjunction {
    fn count(&mut self, ctx: &ScoringContext) -> Result<u32> {
        if !self.has_match(ctx.document) {
            return Ok(0);
        }
        self.load_extents(ctx.document)?;
        Ok(self.extents.len() as u32)
    }

    fn max_count(&self) -> u64 {
        self.children.iter().map(|c| c.max_count()).sum()
    }
}

impl ExtentIterator for ExtentDisjunction {
    fn extents(&mut self, ctx: &ScoringContext) -> Result<&ExtentArray> {
        if self.has_match(ctx.document) {
            self.load_extents(ctx.document)?;
        } else {
            self.extents.reset(ctx.document);
            self.loaded = None;
        }
        Ok(&self.extents)
    }
}
