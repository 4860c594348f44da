//! Query trees and evaluation nodes
//!
//! [`QueryNode`] is the parsed query shape handed in by a caller: an
//! operator name, its parameters and its children. Parsing query syntax is
//! out of scope; trees usually arrive as JSON.
//!
//! [`Node`] is what a query node becomes once built against an index: one
//! of a closed set of iterator families.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::maxscore::MaxScoreCombination;
use super::traits::{
    CountIterator, DocIterator, ExtentIterator, IndicatorIterator, ScoreIterator, ScoringContext,
};
use crate::structures::ExtentArray;
use crate::{DocId, Error, Result};

/// Key holding a term's text
pub const DEFAULT_PARAMETER: &str = "default";

/// Operator parameters as a JSON object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeParameters(Map<String, Value>);

impl NodeParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn get_str(&self, key: &str) -> Result<Option<&str>> {
        match self.0.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(other) => Err(Error::Query(format!(
                "parameter '{}' should be a string, got {}",
                key, other
            ))),
        }
    }

    pub fn get_f64(&self, key: &str) -> Result<Option<f64>> {
        match self.0.get(key) {
            None => Ok(None),
            Some(value) => value.as_f64().map(Some).ok_or_else(|| {
                Error::Query(format!("parameter '{}' should be a number, got {}", key, value))
            }),
        }
    }

    pub fn get_u64(&self, key: &str) -> Result<Option<u64>> {
        match self.0.get(key) {
            None => Ok(None),
            Some(value) => value.as_u64().map(Some).ok_or_else(|| {
                Error::Query(format!(
                    "parameter '{}' should be a non-negative integer, got {}",
                    key, value
                ))
            }),
        }
    }

    /// Term text of a leaf
    pub fn term(&self) -> Result<Option<&str>> {
        self.get_str(DEFAULT_PARAMETER)
    }

    /// Weight of child `index`, stored under its position; 1.0 when absent
    pub fn weight(&self, index: usize) -> Result<f64> {
        Ok(self.get_f64(&index.to_string())?.unwrap_or(1.0))
    }
}

/// One operator of a parsed query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryNode {
    pub operator: String,
    #[serde(default)]
    pub parameters: NodeParameters,
    #[serde(default)]
    pub children: Vec<QueryNode>,
}

impl QueryNode {
    pub fn new(operator: impl Into<String>) -> Self {
        Self {
            operator: operator.into(),
            parameters: NodeParameters::new(),
            children: Vec::new(),
        }
    }

    /// Leaf reading `term` through `operator` (`extents` or `counts`)
    pub fn leaf(operator: impl Into<String>, term: &str) -> Self {
        Self::new(operator).with_param(DEFAULT_PARAMETER, term)
    }

    pub fn term(term: &str) -> Self {
        Self::leaf("extents", term)
    }

    pub fn with_child(mut self, child: QueryNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = QueryNode>) -> Self {
        self.children.extend(children);
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.set(key, value);
        self
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// `#op:key=value(children)`, or the bare term for `extents` leaves
impl fmt::Display for QueryNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.operator == "extents" && self.children.is_empty() {
            if let Ok(Some(term)) = self.parameters.term() {
                return write!(f, "{}", term);
            }
        }
        write!(f, "#{}", self.operator)?;
        for (key, value) in self.parameters.iter() {
            match value {
                Value::String(s) => write!(f, ":{}={}", key, s)?,
                other => write!(f, ":{}={}", key, other)?,
            }
        }
        write!(f, "(")?;
        for (i, child) in self.children.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}", child)?;
        }
        write!(f, ")")
    }
}

/// Iterator family of a built node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    Extent,
    Count,
    Score,
    Indicator,
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Family::Extent => "extents",
            Family::Count => "counts",
            Family::Score => "scores",
            Family::Indicator => "indicator",
        };
        f.write_str(name)
    }
}

/// Built evaluation node
pub enum Node {
    Extent(Box<dyn ExtentIterator>),
    Count(Box<dyn CountIterator>),
    Score(Box<dyn ScoreIterator>),
    /// Kept apart from `Score` so a root can run top-k evaluation
    MaxScore(Box<MaxScoreCombination>),
    Indicator(Box<dyn IndicatorIterator>),
}

macro_rules! dispatch {
    ($node:expr, $it:ident => $body:expr) => {
        match $node {
            Node::Extent($it) => $body,
            Node::Count($it) => $body,
            Node::Score($it) => $body,
            Node::MaxScore($it) => $body,
            Node::Indicator($it) => $body,
        }
    };
}

impl Node {
    pub fn family(&self) -> Family {
        match self {
            Node::Extent(_) => Family::Extent,
            Node::Count(_) => Family::Count,
            Node::Score(_) | Node::MaxScore(_) => Family::Score,
            Node::Indicator(_) => Family::Indicator,
        }
    }

    fn mismatch(&self, wanted: Family) -> Error {
        Error::Query(format!("expected {}, got {}", wanted, self.family()))
    }

    pub fn into_score(self) -> Result<Box<dyn ScoreIterator>> {
        match self {
            Node::Score(score) => Ok(score),
            Node::MaxScore(maxscore) => Ok(maxscore),
            other => Err(other.mismatch(Family::Score)),
        }
    }

    pub fn into_extents(self) -> Result<Box<dyn ExtentIterator>> {
        match self {
            Node::Extent(extents) => Ok(extents),
            other => Err(other.mismatch(Family::Extent)),
        }
    }

    /// Extent nodes count their extents
    pub fn into_counts(self) -> Result<Box<dyn CountIterator>> {
        match self {
            Node::Extent(extents) => Ok(Box::new(extents)),
            Node::Count(counts) => Ok(counts),
            other => Err(other.mismatch(Family::Count)),
        }
    }

    pub fn count(&mut self, ctx: &ScoringContext) -> Result<u32> {
        match self {
            Node::Extent(extents) => extents.count(ctx),
            Node::Count(counts) => counts.count(ctx),
            other => Err(other.mismatch(Family::Count)),
        }
    }

    pub fn extents(&mut self, ctx: &ScoringContext) -> Result<&ExtentArray> {
        match self {
            Node::Extent(extents) => extents.extents(ctx),
            other => Err(other.mismatch(Family::Extent)),
        }
    }

    /// Indicator nodes answer themselves; any other node is true where it
    /// matches
    pub fn indicator(&mut self, ctx: &ScoringContext) -> Result<bool> {
        match self {
            Node::Indicator(indicator) => indicator.indicator(ctx),
            other => Ok(other.has_match(ctx.document)),
        }
    }
}

impl DocIterator for Node {
    fn current_candidate(&self) -> DocId {
        dispatch!(self, it => it.current_candidate())
    }

    fn move_to(&mut self, document: DocId) -> Result<()> {
        dispatch!(self, it => it.move_to(document))
    }

    fn move_past(&mut self, document: DocId) -> Result<()> {
        dispatch!(self, it => it.move_past(document))
    }

    fn reset(&mut self) -> Result<()> {
        dispatch!(self, it => it.reset())
    }

    fn total_entries(&self) -> u64 {
        dispatch!(self, it => it.total_entries())
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("family", &self.family())
            .field("candidate", &self.current_candidate())
            .finish()
    }
}
