//! Boolean indicators: `#all` and `#any`

use super::node::Node;
use super::traits::{DocIterator, IndicatorIterator, ScoringContext, align, min_candidate};
use crate::structures::TERMINATED;
use crate::{DocId, Result};

/// True where every child matches
pub struct AllIterator {
    children: Vec<Node>,
    document: DocId,
}

impl AllIterator {
    pub fn new(children: Vec<Node>) -> Result<Self> {
        let mut all = Self {
            children,
            document: 0,
        };
        all.document = align(&mut all.children, 0)?;
        Ok(all)
    }
}

impl DocIterator for AllIterator {
    fn current_candidate(&self) -> DocId {
        self.document
    }

    fn move_to(&mut self, document: DocId) -> Result<()> {
        if self.document != TERMINATED && document > self.document {
            self.document = align(&mut self.children, document)?;
        }
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        for child in self.children.iter_mut() {
            child.reset()?;
        }
        self.document = align(&mut self.children, 0)?;
        Ok(())
    }

    fn total_entries(&self) -> u64 {
        self.children
            .iter()
            .map(|c| c.total_entries())
            .min()
            .unwrap_or(0)
    }
}

impl IndicatorIterator for AllIterator {
    fn indicator(&mut self, ctx: &ScoringContext) -> Result<bool> {
        Ok(self.children.iter().all(|c| c.has_match(ctx.document)))
    }
}

/// True where at least one child matches
pub struct AnyIterator {
    children: Vec<Node>,
}

impl AnyIterator {
    pub fn new(children: Vec<Node>) -> Self {
        Self { children }
    }
}

impl DocIterator for AnyIterator {
    fn current_candidate(&self) -> DocId {
        min_candidate(&self.children)
    }

    fn move_to(&mut self, document: DocId) -> Result<()> {
        for child in self.children.iter_mut() {
            child.move_to(document)?;
        }
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        for child in self.children.iter_mut() {
            child.reset()?;
        }
        Ok(())
    }

    fn total_entries(&self) -> u64 {
        self.children.iter().map(|c| c.total_entries()).sum()
    }
}

impl IndicatorIterator for AnyIterator {
    fn indicator(&mut self, ctx: &ScoringContext) -> Result<bool> {
        Ok(self.children.iter().any(|c| c.has_match(ctx.document)))
    }
}
