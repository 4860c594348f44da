//! Query evaluation: iterator algebra, scoring and top-k search

mod collector;
mod combination;
mod conjunction;
mod disjunction;
mod factory;
mod indicator;
mod maxscore;
mod node;
mod scoring;
#[cfg(test)]
mod scoring_tests;
mod search;
mod term;
#[cfg(test)]
mod test_util;
mod traits;

pub use collector::*;
pub use combination::ScoreCombination;
pub use conjunction::*;
pub use disjunction::*;
pub use factory::*;
pub use indicator::*;
pub use maxscore::*;
pub use node::*;
pub use scoring::*;
pub use search::{evaluate, search};
pub use term::*;
pub use traits::{
    CountIterator, DocIterator, ExtentIterator, IndicatorIterator, ScoreIterator, ScoringContext,
};
