//! Operator registry
//!
//! Maps operator names to a check function and a build function. A check
//! function looks at the node's parameters and the families its children
//! will have, and returns the family the node will have. A build function
//! receives the node's parameters and its already built children, and
//! returns the node's iterator.
//!
//! The whole query tree is checked before anything is built: unknown
//! operators, arity, parameter types and values, and child families all
//! fail before any posting list is opened.

use rustc_hash::FxHashMap;

use super::combination::{ScoreCombination, total_weight};
use super::conjunction::{ExtentConjunction, Inside, OrderedWindow, UnorderedWindow};
use super::disjunction::ExtentDisjunction;
use super::indicator::{AllIterator, AnyIterator};
use super::maxscore::{MaxScoreCombination, SortPolicy};
use super::node::{Family, Node, NodeParameters, QueryNode};
use super::scoring::{
    Bm25Scorer, DirichletScorer, RetrievalConfig, ScorerKind, ScoringFunction,
    ScoringFunctionIterator,
};
use super::term::{NullIterator, TermCountIterator, TermExtentIterator};
use super::traits::{CountIterator, DocIterator, ExtentIterator, ScoreIterator, ScoringContext};
use crate::index::{Index, TermStatistics};
use crate::{Error, Result};

/// Width of `#od` when none is given
pub const DEFAULT_ORDERED_WIDTH: u64 = 1;
/// Width of `#uw` when none is given
pub const DEFAULT_UNORDERED_WIDTH: u64 = 8;

/// Number of children an operator takes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exactly(usize),
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(&self, children: usize) -> bool {
        match *self {
            Arity::Exactly(n) => children == n,
            Arity::AtLeast(n) => children >= n,
        }
    }

    pub fn describe(&self) -> String {
        match *self {
            Arity::Exactly(n) => format!("exactly {}", n),
            Arity::AtLeast(n) => format!("at least {}", n),
        }
    }
}

/// What the checks know about the index a tree will be built against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexFeatures {
    pub positions: bool,
}

impl IndexFeatures {
    /// No index at hand: assume every feature is present
    pub const ANY: IndexFeatures = IndexFeatures { positions: true };

    pub fn of(index: &Index) -> Self {
        Self {
            positions: index
                .postings_manifest()
                .get_bool("hasPositions")
                .unwrap_or(false),
        }
    }
}

pub type CheckFn = fn(&NodeParameters, &[Family], IndexFeatures) -> Result<Family>;
pub type BuildFn = fn(&NodeParameters, Vec<Node>, &mut BuildContext<'_>) -> Result<Node>;

#[derive(Clone, Copy)]
pub struct OperatorSpec {
    pub arity: Arity,
    pub check: CheckFn,
    pub build: BuildFn,
}

/// State shared by the build functions of one query
pub struct BuildContext<'a> {
    pub index: &'a mut Index,
    pub config: &'a RetrievalConfig,
    /// Results the caller asked for
    pub requested: usize,
}

impl BuildContext<'_> {
    /// Scoring function for a term, honouring `scorer`, `k1`, `b` and `mu`
    /// overrides in `params`
    pub fn scoring_function(
        &self,
        term: &TermStatistics,
        params: &NodeParameters,
    ) -> Result<Box<dyn ScoringFunction>> {
        let collection = self.index.collection_statistics();
        Ok(match scorer_kind(params, self.config.scorer)? {
            ScorerKind::Bm25 => Box::new(Bm25Scorer::new(
                params.get_f64("k1")?.unwrap_or(self.config.bm25_k1),
                params.get_f64("b")?.unwrap_or(self.config.bm25_b),
                term,
                &collection,
            )),
            ScorerKind::Dirichlet => Box::new(DirichletScorer::new(
                params.get_f64("mu")?.unwrap_or(self.config.mu),
                term,
                &collection,
            )),
        })
    }

    /// Score iterator over `node`, wrapping extent and count nodes in a
    /// scoring function
    pub fn score_node(
        &mut self,
        node: Node,
        params: &NodeParameters,
    ) -> Result<Box<dyn ScoreIterator>> {
        match node.family() {
            Family::Score => node.into_score(),
            Family::Extent | Family::Count => {
                let mut counts = node.into_counts()?;
                let statistics = match counts.statistics() {
                    Some(statistics) => statistics,
                    None => scan_statistics(counts.as_mut())?,
                };
                let term = counts.term().map(|t| t.to_vec());
                let function = self.scoring_function(&statistics, params)?;
                let mut iterator = ScoringFunctionIterator::new(counts, function);
                if let Some(term) = term {
                    if let Some(top) = self.index.top_documents(&term)? {
                        iterator = iterator.with_top_documents(top);
                    }
                }
                Ok(Box::new(iterator))
            }
            Family::Indicator => Err(Error::Query(
                "an indicator cannot be scored".to_string(),
            )),
        }
    }
}

/// Term statistics of a compound count node, by walking it once
fn scan_statistics(counts: &mut dyn CountIterator) -> Result<TermStatistics> {
    let mut statistics = TermStatistics::default();
    while !counts.is_done() {
        let document = counts.current_candidate();
        let count = counts.count(&ScoringContext::new(document, 0))? as u64;
        if count > 0 {
            statistics.document_frequency += 1;
            statistics.collection_frequency += count;
            statistics.max_count = statistics.max_count.max(count);
        }
        counts.move_past(document)?;
    }
    counts.reset()?;
    Ok(statistics)
}

pub struct IteratorFactory {
    operators: FxHashMap<String, OperatorSpec>,
    config: RetrievalConfig,
}

impl Default for IteratorFactory {
    fn default() -> Self {
        Self::new(RetrievalConfig::default())
    }
}

impl IteratorFactory {
    /// Factory with every built-in operator
    pub fn new(config: RetrievalConfig) -> Self {
        let mut factory = Self {
            operators: FxHashMap::default(),
            config,
        };
        factory.register("extents", Arity::Exactly(0), check_extents, build_extents);
        factory.register("counts", Arity::Exactly(0), check_counts, build_counts);
        factory.register("od", Arity::AtLeast(1), check_ordered, build_ordered);
        factory.register("uw", Arity::AtLeast(1), check_unordered, build_unordered);
        factory.register("inside", Arity::Exactly(2), check_extent_operator, build_inside);
        factory.register("syn", Arity::AtLeast(1), check_extent_operator, build_synonym);
        factory.register("feature", Arity::Exactly(1), check_feature, build_feature);
        factory.register("combine", Arity::AtLeast(1), check_combination, build_combine);
        factory.register("and", Arity::AtLeast(1), check_combination, build_and);
        factory.register("maxscore", Arity::AtLeast(1), check_maxscore, build_maxscore);
        factory.register("all", Arity::AtLeast(1), check_indicator, build_all);
        factory.register("any", Arity::AtLeast(1), check_indicator, build_any);
        factory
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Add or replace an operator
    pub fn register(
        &mut self,
        operator: impl Into<String>,
        arity: Arity,
        check: CheckFn,
        build: BuildFn,
    ) {
        self.operators
            .insert(operator.into(), OperatorSpec { arity, check, build });
    }

    pub fn operators(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.operators.keys().map(|k| k.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Check `query` without an index and return the family of its root
    pub fn validate(&self, query: &QueryNode) -> Result<Family> {
        self.check(query, IndexFeatures::ANY)
    }

    /// Check operators, child counts, parameters and child families in
    /// `query` and return the family of its root
    pub fn check(&self, query: &QueryNode, features: IndexFeatures) -> Result<Family> {
        let spec = self.spec(&query.operator)?;
        if !spec.arity.accepts(query.children.len()) {
            return Err(Error::Arity {
                operator: query.operator.clone(),
                expected: spec.arity.describe(),
                got: query.children.len(),
            });
        }
        let children = query
            .children
            .iter()
            .map(|child| self.check(child, features))
            .collect::<Result<Vec<_>>>()?;
        (spec.check)(&query.parameters, &children, features).map_err(|e| match e {
            Error::Query(message) => Error::Query(format!("#{}: {}", query.operator, message)),
            other => other,
        })
    }

    /// Check and build `query` against `index`
    pub fn build(&self, index: &mut Index, query: &QueryNode, requested: usize) -> Result<Node> {
        self.check(query, IndexFeatures::of(index))?;
        let mut ctx = BuildContext {
            index,
            config: &self.config,
            requested,
        };
        let node = self.build_node(query, &mut ctx)?;
        log::debug!("built {} as {}", query, node.family());
        Ok(node)
    }

    fn spec(&self, operator: &str) -> Result<&OperatorSpec> {
        self.operators
            .get(operator)
            .ok_or_else(|| Error::UnknownOperator(operator.to_string()))
    }

    fn build_node(&self, query: &QueryNode, ctx: &mut BuildContext<'_>) -> Result<Node> {
        let spec = *self.spec(&query.operator)?;
        let children = query
            .children
            .iter()
            .map(|child| self.build_node(child, ctx))
            .collect::<Result<Vec<_>>>()?;
        (spec.build)(&query.parameters, children, ctx)
    }
}

fn required_term(params: &NodeParameters) -> Result<&str> {
    params
        .term()?
        .ok_or_else(|| Error::Query("term leaf without a 'default' parameter".to_string()))
}

fn scorer_kind(params: &NodeParameters, default: ScorerKind) -> Result<ScorerKind> {
    match params.get_str("scorer")? {
        Some(name) => {
            ScorerKind::parse(name).ok_or_else(|| Error::Query(format!("unknown scorer '{}'", name)))
        }
        None => Ok(default),
    }
}

fn sort_policy(params: &NodeParameters, default: SortPolicy) -> Result<SortPolicy> {
    match params.get_str("sort")? {
        Some(name) => SortPolicy::parse(name)
            .ok_or_else(|| Error::Query(format!("unknown sort policy '{}'", name))),
        None => Ok(default),
    }
}

fn requested_results(params: &NodeParameters, default: usize) -> Result<usize> {
    match params.get_u64("requested")? {
        Some(requested) => usize::try_from(requested)
            .map_err(|_| Error::Query(format!("requested {} too large", requested))),
        None => Ok(default),
    }
}

fn check_extents(params: &NodeParameters, _: &[Family], features: IndexFeatures) -> Result<Family> {
    let term = required_term(params)?;
    if !features.positions {
        return Err(Error::Contract(format!(
            "extents of '{}' requested from an index without positions",
            term
        )));
    }
    Ok(Family::Extent)
}

fn check_counts(params: &NodeParameters, _: &[Family], _: IndexFeatures) -> Result<Family> {
    required_term(params)?;
    Ok(Family::Count)
}

fn check_extent_operator(_: &NodeParameters, children: &[Family], _: IndexFeatures) -> Result<Family> {
    match children.iter().find(|&&family| family != Family::Extent) {
        Some(family) => Err(Error::Query(format!("expected extents, got {}", family))),
        None => Ok(Family::Extent),
    }
}

fn check_ordered(params: &NodeParameters, children: &[Family], features: IndexFeatures) -> Result<Family> {
    width(params, DEFAULT_ORDERED_WIDTH)?;
    check_extent_operator(params, children, features)
}

fn check_unordered(params: &NodeParameters, children: &[Family], features: IndexFeatures) -> Result<Family> {
    width(params, DEFAULT_UNORDERED_WIDTH)?;
    check_extent_operator(params, children, features)
}

/// Parameters and children of anything that wraps its children in scores
fn check_scored(params: &NodeParameters, children: &[Family]) -> Result<()> {
    scorer_kind(params, ScorerKind::default())?;
    for key in ["k1", "b", "mu"] {
        params.get_f64(key)?;
    }
    if children.contains(&Family::Indicator) {
        return Err(Error::Query("an indicator cannot be scored".to_string()));
    }
    Ok(())
}

fn check_feature(params: &NodeParameters, children: &[Family], _: IndexFeatures) -> Result<Family> {
    check_scored(params, children)?;
    Ok(Family::Score)
}

fn check_combination(params: &NodeParameters, children: &[Family], _: IndexFeatures) -> Result<Family> {
    check_scored(params, children)?;
    total_weight(&weights(params, children.len())?, children.len())?;
    Ok(Family::Score)
}

fn check_maxscore(params: &NodeParameters, children: &[Family], features: IndexFeatures) -> Result<Family> {
    requested_results(params, 0)?;
    sort_policy(params, SortPolicy::default())?;
    check_combination(params, children, features)
}

fn check_indicator(_: &NodeParameters, _: &[Family], _: IndexFeatures) -> Result<Family> {
    Ok(Family::Indicator)
}

fn build_extents(params: &NodeParameters, _: Vec<Node>, ctx: &mut BuildContext<'_>) -> Result<Node> {
    let term = required_term(params)?;
    let iterator: Box<dyn ExtentIterator> = match ctx.index.extent_iterator(term.as_bytes())? {
        Some(postings) => Box::new(TermExtentIterator::new(postings)),
        None => {
            log::debug!("term '{}' not in index", term);
            Box::new(NullIterator::new(term))
        }
    };
    Ok(Node::Extent(iterator))
}

fn build_counts(params: &NodeParameters, _: Vec<Node>, ctx: &mut BuildContext<'_>) -> Result<Node> {
    let term = required_term(params)?;
    let iterator: Box<dyn CountIterator> = match ctx.index.count_iterator(term.as_bytes())? {
        Some(postings) => Box::new(TermCountIterator::new(postings)),
        None => {
            log::debug!("term '{}' not in index", term);
            Box::new(NullIterator::new(term))
        }
    };
    Ok(Node::Count(iterator))
}

fn extent_children(children: Vec<Node>) -> Result<Vec<Box<dyn ExtentIterator>>> {
    children.into_iter().map(Node::into_extents).collect()
}

fn width(params: &NodeParameters, default: u64) -> Result<u32> {
    let width = params.get_u64("width")?.unwrap_or(default);
    u32::try_from(width).map_err(|_| Error::Query(format!("window width {} too large", width)))
}

fn build_ordered(params: &NodeParameters, children: Vec<Node>, _: &mut BuildContext<'_>) -> Result<Node> {
    let policy = OrderedWindow {
        width: width(params, DEFAULT_ORDERED_WIDTH)?,
    };
    let conjunction = ExtentConjunction::new(extent_children(children)?, policy)?;
    Ok(Node::Extent(Box::new(conjunction)))
}

fn build_unordered(
    params: &NodeParameters,
    children: Vec<Node>,
    _: &mut BuildContext<'_>,
) -> Result<Node> {
    let policy = UnorderedWindow {
        width: width(params, DEFAULT_UNORDERED_WIDTH)?,
    };
    let conjunction = ExtentConjunction::new(extent_children(children)?, policy)?;
    Ok(Node::Extent(Box::new(conjunction)))
}

fn build_inside(_: &NodeParameters, children: Vec<Node>, _: &mut BuildContext<'_>) -> Result<Node> {
    let conjunction = ExtentConjunction::new(extent_children(children)?, Inside)?;
    Ok(Node::Extent(Box::new(conjunction)))
}

fn build_synonym(_: &NodeParameters, children: Vec<Node>, _: &mut BuildContext<'_>) -> Result<Node> {
    Ok(Node::Extent(Box::new(ExtentDisjunction::new(extent_children(children)?))))
}

fn build_feature(params: &NodeParameters, children: Vec<Node>, ctx: &mut BuildContext<'_>) -> Result<Node> {
    let mut scores = score_children(params, children, ctx)?;
    match scores.pop() {
        Some(score) => Ok(Node::Score(score)),
        None => Err(Error::Query("#feature needs a child".to_string())),
    }
}

fn score_children(
    params: &NodeParameters,
    children: Vec<Node>,
    ctx: &mut BuildContext<'_>,
) -> Result<Vec<Box<dyn ScoreIterator>>> {
    children
        .into_iter()
        .map(|child| ctx.score_node(child, params))
        .collect()
}

fn weights(params: &NodeParameters, children: usize) -> Result<Vec<f64>> {
    (0..children).map(|i| params.weight(i)).collect()
}

fn build_combine(params: &NodeParameters, children: Vec<Node>, ctx: &mut BuildContext<'_>) -> Result<Node> {
    let weights = weights(params, children.len())?;
    let children = score_children(params, children, ctx)?;
    Ok(Node::Score(Box::new(ScoreCombination::unfiltered(children, weights)?)))
}

fn build_and(params: &NodeParameters, children: Vec<Node>, ctx: &mut BuildContext<'_>) -> Result<Node> {
    let weights = weights(params, children.len())?;
    let children = score_children(params, children, ctx)?;
    Ok(Node::Score(Box::new(ScoreCombination::filtered(children, weights)?)))
}

fn build_maxscore(params: &NodeParameters, children: Vec<Node>, ctx: &mut BuildContext<'_>) -> Result<Node> {
    let weights = weights(params, children.len())?;
    let requested = requested_results(params, ctx.requested)?;
    let sort = sort_policy(params, ctx.config.max_score_sort)?;
    let children = score_children(params, children, ctx)?;
    let maxscore = MaxScoreCombination::new(children, weights, requested, sort)?;
    Ok(Node::MaxScore(Box::new(maxscore)))
}

fn build_all(_: &NodeParameters, children: Vec<Node>, _: &mut BuildContext<'_>) -> Result<Node> {
    Ok(Node::Indicator(Box::new(AllIterator::new(children)?)))
}

fn build_any(_: &NodeParameters, children: Vec<Node>, _: &mut BuildContext<'_>) -> Result<Node> {
    Ok(Node::Indicator(Box::new(AnyIterator::new(children))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arity() {
        assert!(Arity::Exactly(2).accepts(2));
        assert!(!Arity::Exactly(2).accepts(3));
        assert!(Arity::AtLeast(1).accepts(4));
        assert!(!Arity::AtLeast(1).accepts(0));
        assert_eq!(Arity::AtLeast(1).describe(), "at least 1");
    }

    #[test]
    fn test_validate_reports_operator_and_arity() {
        let factory = IteratorFactory::default();
        let query = QueryNode::new("combine").with_child(QueryNode::new("fuzzy"));
        match factory.validate(&query) {
            Err(Error::UnknownOperator(op)) => assert_eq!(op, "fuzzy"),
            other => panic!("unexpected {:?}", other),
        }

        let query = QueryNode::new("inside").with_child(QueryNode::term("a"));
        match factory.validate(&query) {
            Err(Error::Arity {
                operator,
                expected,
                got,
            }) => {
                assert_eq!(operator, "inside");
                assert_eq!(expected, "exactly 2");
                assert_eq!(got, 1);
            }
            other => panic!("unexpected {:?}", other),
        }

        let query = QueryNode::new("combine")
            .with_child(QueryNode::term("a"))
            .with_child(QueryNode::leaf("counts", "b"));
        assert_eq!(factory.validate(&query).unwrap(), Family::Score);
    }

    #[test]
    fn test_validate_checks_parameters_and_families() {
        let factory = IteratorFactory::default();
        let terms = || [QueryNode::term("a"), QueryNode::term("b")];
        let rejected = [
            (QueryNode::new("uw").with_param("width", "wide"), "#uw"),
            (QueryNode::new("od").with_param("width", 1u64 << 40), "#od"),
            (QueryNode::new("feature").with_param("scorer", "bogus"), "#feature"),
            (QueryNode::new("combine").with_param("mu", "large"), "#combine"),
            (QueryNode::new("combine").with_param("1", -2.0), "#combine"),
            (QueryNode::new("maxscore").with_param("sort", "random"), "#maxscore"),
            (QueryNode::new("maxscore").with_param("requested", -1), "#maxscore"),
        ];
        for (query, operator) in rejected {
            let query = if query.operator == "feature" {
                query.with_child(QueryNode::new("syn").with_children(terms()))
            } else {
                query.with_children(terms())
            };
            match factory.validate(&query) {
                Err(Error::Query(message)) => assert!(message.starts_with(operator), "{}", message),
                other => panic!("{}: unexpected {:?}", query, other),
            }
        }

        // extent operators take extents only; scores never take indicators
        let query = QueryNode::new("od")
            .with_child(QueryNode::term("a"))
            .with_child(QueryNode::leaf("counts", "b"));
        assert!(matches!(factory.validate(&query), Err(Error::Query(_))));
        let query = QueryNode::new("syn").with_child(QueryNode::new("combine").with_children(terms()));
        assert!(matches!(factory.validate(&query), Err(Error::Query(_))));
        let query = QueryNode::new("combine").with_child(QueryNode::new("all").with_children(terms()));
        assert!(matches!(factory.validate(&query), Err(Error::Query(_))));
        let query = QueryNode::new("any").with_child(QueryNode::new("combine").with_children(terms()));
        assert_eq!(factory.validate(&query).unwrap(), Family::Indicator);
    }

    #[test]
    fn test_extents_need_positions() {
        let factory = IteratorFactory::default();
        let counts_only = IndexFeatures { positions: false };
        let query = QueryNode::new("combine").with_children([QueryNode::term("a")]);
        assert!(matches!(factory.check(&query, counts_only), Err(Error::Contract(_))));
        let query = QueryNode::new("combine").with_children([QueryNode::leaf("counts", "a")]);
        assert_eq!(factory.check(&query, counts_only).unwrap(), Family::Score);
        assert!(factory.check(&QueryNode::term("a"), IndexFeatures::ANY).is_ok());
    }

    #[test]
    fn test_register_replaces() {
        let mut factory = IteratorFactory::default();
        assert!(factory.operators().contains(&"maxscore"));
        factory.register("combine", Arity::Exactly(1), check_feature, build_feature);
        let query = QueryNode::new("combine")
            .with_child(QueryNode::term("a"))
            .with_child(QueryNode::term("b"));
        assert!(matches!(factory.validate(&query), Err(Error::Arity { .. })));
    }
}
