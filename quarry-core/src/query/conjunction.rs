//! Extent conjunctions: ordered window, unordered window, containment
//!
//! All three share one skeleton. Children are aligned on a common
//! document, their extents are merged by a [`ExtentMerge`] policy, and a
//! document whose merge comes out empty is rejected before the next
//! common candidate is tried.

use super::traits::{CountIterator, DocIterator, ExtentIterator, ScoringContext, align};
use crate::structures::{ExtentArray, TERMINATED};
use crate::{DocId, Result};

/// Combines the children's extents at one document
pub trait ExtentMerge {
    fn merge(&self, document: DocId, inputs: &[ExtentArray], out: &mut ExtentArray);
}

/// `#od`: each child's extent starts at or after the previous one ends,
/// with fewer than `width` positions in between
#[derive(Debug, Clone, Copy)]
pub struct OrderedWindow {
    pub width: u32,
}

impl ExtentMerge for OrderedWindow {
    fn merge(&self, document: DocId, inputs: &[ExtentArray], out: &mut ExtentArray) {
        out.reset(document);
        let Some((first, rest)) = inputs.split_first() else {
            return;
        };
        let mut cursors = vec![0usize; rest.len()];
        'start: for i in 0..first.len() {
            let begin = first.begin(i);
            let mut end = first.end(i);
            for (next, cursor) in rest.iter().zip(cursors.iter_mut()) {
                while *cursor < next.len() && next.begin(*cursor) < end {
                    *cursor += 1;
                }
                if *cursor == next.len() {
                    break 'start;
                }
                if next.begin(*cursor) - end >= self.width {
                    continue 'start;
                }
                end = next.end(*cursor);
            }
            out.push(begin, end);
        }
    }
}

/// `#uw`: one extent from every child, all inside a span of `width`
#[derive(Debug, Clone, Copy)]
pub struct UnorderedWindow {
    pub width: u32,
}

impl ExtentMerge for UnorderedWindow {
    fn merge(&self, document: DocId, inputs: &[ExtentArray], out: &mut ExtentArray) {
        out.reset(document);
        if inputs.is_empty() {
            return;
        }
        let mut cursors = vec![0usize; inputs.len()];
        loop {
            let mut min_begin = u32::MAX;
            let mut max_end = 0;
            let mut lowest = 0;
            for (i, (input, &cursor)) in inputs.iter().zip(&cursors).enumerate() {
                if cursor >= input.len() {
                    return;
                }
                let begin = input.begin(cursor);
                if begin < min_begin {
                    min_begin = begin;
                    lowest = i;
                }
                max_end = max_end.max(input.end(cursor));
            }
            if max_end - min_begin <= self.width {
                out.push(min_begin, max_end);
            }
            cursors[lowest] += 1;
        }
    }
}

/// `#inside`: extents of the first child contained in an extent of the
/// second
#[derive(Debug, Clone, Copy, Default)]
pub struct Inside;

impl ExtentMerge for Inside {
    fn merge(&self, document: DocId, inputs: &[ExtentArray], out: &mut ExtentArray) {
        out.reset(document);
        let [inner, outer] = inputs else {
            return;
        };
        let (mut i, mut o) = (0, 0);
        while i < inner.len() && o < outer.len() {
            let candidate = inner.get(i);
            let container = outer.get(o);
            if container.contains(&candidate) {
                out.push(candidate.begin, candidate.end);
                i += 1;
            } else if container.end <= candidate.begin {
                o += 1;
            } else {
                i += 1;
            }
        }
    }
}

/// Conjunction of extent children under a merge policy
pub struct ExtentConjunction<P: ExtentMerge> {
    children: Vec<Box<dyn ExtentIterator>>,
    policy: P,
    inputs: Vec<ExtentArray>,
    extents: ExtentArray,
    empty: ExtentArray,
    document: DocId,
}

impl<P: ExtentMerge> ExtentConjunction<P> {
    /// Build and position on the first matching document
    pub fn new(children: Vec<Box<dyn ExtentIterator>>, policy: P) -> Result<Self> {
        let inputs = vec![ExtentArray::new(); children.len()];
        let mut conjunction = Self {
            children,
            policy,
            inputs,
            extents: ExtentArray::new(),
            empty: ExtentArray::new(),
            document: 0,
        };
        conjunction.find_match(0)?;
        Ok(conjunction)
    }

    fn find_match(&mut self, target: DocId) -> Result<()> {
        let mut target = target;
        loop {
            let candidate = align(&mut self.children, target)?;
            if candidate == TERMINATED {
                self.document = TERMINATED;
                self.extents.reset(TERMINATED);
                return Ok(());
            }
            let ctx = ScoringContext::new(candidate, 0);
            for (child, input) in self.children.iter_mut().zip(self.inputs.iter_mut()) {
                input.clone_from(child.extents(&ctx)?);
            }
            self.policy.merge(candidate, &self.inputs, &mut self.extents);
            if !self.extents.is_empty() {
                self.document = candidate;
                return Ok(());
            }
            target = candidate + 1;
        }
    }
}

impl<P: ExtentMerge> DocIterator for ExtentConjunction<P> {
    fn current_candidate(&self) -> DocId {
        self.document
    }

    fn move_to(&mut self, document: DocId) -> Result<()> {
        if self.document != TERMINATED && document > self.document {
            self.find_match(document)?;
        }
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        for child in self.children.iter_mut() {
            child.reset()?;
        }
        self.find_match(0)
    }

    fn total_entries(&self) -> u64 {
        self.children
            .iter()
            .map(|c| c.total_entries())
            .min()
            .unwrap_or(0)
    }
}

impl<P: ExtentMerge> CountIterator for ExtentConjunction<P> {
    fn count(&mut self, ctx: &ScoringContext) -> Result<u32> {
        Ok(if self.has_match(ctx.document) {
            self.extents.len() as u32
        } else {
            0
        })
    }

    fn max_count(&self) -> u64 {
        self.children.iter().map(|c| c.max_count()).min().unwrap_or(0)
    }
}

impl<P: ExtentMerge> ExtentIterator for ExtentConjunction<P> {
    fn extents(&mut self, ctx: &ScoringContext) -> Result<&ExtentArray> {
        if self.has_match(ctx.document) {
            Ok(&self.extents)
        } else {
            self.empty.reset(ctx.document);
            Ok(&self.empty)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_util::{ListIterator, candidates};
    use super::*;

    fn spans(array: &ExtentArray) -> Vec<(u32, u32)> {
        array.iter().map(|e| (e.begin, e.end)).collect()
    }

    fn array(document: DocId, spans: &[(u32, u32)]) -> ExtentArray {
        let mut array = ExtentArray::new();
        array.reset(document);
        for &(b, e) in spans {
            array.push(b, e);
        }
        array
    }

    #[test]
    fn test_conjunction_is_intersection() {
        let a = ListIterator::documents(&[1, 3, 5, 7, 9, 11]).boxed();
        let b = ListIterator::documents(&[2, 3, 4, 7, 11, 12]).boxed();
        let c = ListIterator::documents(&[3, 7, 8, 11]).boxed();
        // every child has position 0 at each document, so a window of any width matches
        let mut conjunction =
            ExtentConjunction::new(vec![a, b, c], UnorderedWindow { width: 1 }).unwrap();
        assert_eq!(candidates(&mut conjunction), vec![3, 7, 11]);

        conjunction.reset().unwrap();
        assert_eq!(conjunction.current_candidate(), 3);
    }

    #[test]
    fn test_ordered_window_rejects_misplaced_document() {
        // doc 1: "a b" adjacent; doc 2: "b a"; doc 3: "a x b"
        let a = ListIterator::new(vec![(1, vec![0]), (2, vec![1]), (3, vec![0])]).boxed();
        let b = ListIterator::new(vec![(1, vec![1]), (2, vec![0]), (3, vec![2])]).boxed();
        let mut phrase = ExtentConjunction::new(vec![a, b], OrderedWindow { width: 1 }).unwrap();
        assert_eq!(phrase.current_candidate(), 1);
        let ctx = ScoringContext::new(1, 0);
        assert_eq!(spans(phrase.extents(&ctx).unwrap()), vec![(0, 2)]);
        assert_eq!(phrase.count(&ctx).unwrap(), 1);

        phrase.move_past(1).unwrap();
        assert!(phrase.is_done());
    }

    #[test]
    fn test_ordered_window_width() {
        let a = array(1, &[(0, 1), (10, 11)]);
        let b = array(1, &[(3, 4), (11, 12)]);
        let mut out = ExtentArray::new();
        OrderedWindow { width: 1 }.merge(1, &[a.clone(), b.clone()], &mut out);
        assert_eq!(spans(&out), vec![(10, 12)]);
        OrderedWindow { width: 3 }.merge(1, &[a, b], &mut out);
        assert_eq!(spans(&out), vec![(0, 4), (10, 12)]);
    }

    #[test]
    fn test_unordered_window() {
        let a = array(1, &[(5, 6), (20, 21)]);
        let b = array(1, &[(3, 4), (30, 31)]);
        let mut out = ExtentArray::new();
        UnorderedWindow { width: 4 }.merge(1, &[a.clone(), b.clone()], &mut out);
        assert_eq!(spans(&out), vec![(3, 6)]);
        UnorderedWindow { width: 11 }.merge(1, &[a, b], &mut out);
        assert_eq!(spans(&out), vec![(3, 6), (20, 31)]);
    }

    #[test]
    fn test_inside() {
        let inner = array(1, &[(2, 3), (8, 9), (15, 16)]);
        let outer = array(1, &[(0, 5), (10, 20)]);
        let mut out = ExtentArray::new();
        Inside.merge(1, &[inner, outer], &mut out);
        assert_eq!(spans(&out), vec![(2, 3), (15, 16)]);
    }

    #[test]
    fn test_inside_skips_documents_without_containment() {
        let inner = ListIterator::new(vec![(1, vec![7]), (2, vec![1])]).boxed();
        let outer = ListIterator::new(vec![(1, vec![0]), (2, vec![1])]).boxed();
        let mut inside = ExtentConjunction::new(vec![inner, outer], Inside).unwrap();
        assert_eq!(candidates(&mut inside), vec![2]);
    }
}
