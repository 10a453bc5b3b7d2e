//! Pairwise ranking of two prediction runs by forecast `cy`.
//!
//! The first half of each run is warm-up.  For every index in the second
//! half the label whose step has the larger `cy` gets a vote; equal `cy`
//! gives no vote.  Runs that did not collect the full horizon are
//! not ranked at all.

use crate::forecaster::PredictionRun;
use log::{info, warn};
use std::str::FromStr;

/// Two labels whose forecasts are compared.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RankingGroup {
    pub first: String,
    pub second: String,
}

impl RankingGroup {
    pub fn new(first: impl Into<String>, second: impl Into<String>) -> Self {
        Self { first: first.into(), second: second.into() }
    }

    pub fn labels(&self) -> [&str; 2] {
        [&self.first, &self.second]
    }
}

/// Parses `"Tc,Td"`.
impl FromStr for RankingGroup {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split(',').map(str::trim).collect::<Vec<_>>().as_slice() {
            [first, second] if !first.is_empty() && !second.is_empty() => Ok(Self::new(*first, *second)),
            _ => Err(format!("expected two comma-separated labels, got {s:?}")),
        }
    }
}

/// One scored comparison.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Comparison {
    pub iteration: usize,
    pub cy_first: f32,
    pub cy_second: f32,
}

/// `(label, votes)` pairs plus the comparisons that produced them.
#[derive(Debug, Clone, PartialEq)]
pub struct Standings {
    pub order: Vec<(String, usize)>,
    pub comparisons: Vec<Comparison>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RankingOutcome {
    /// Sorted by votes, most first.
    Ranked(Standings),
    /// Equal votes; order is the group's input order.
    Tie(Standings),
    /// Runs were incomplete, nothing was ranked.
    NoResult { collected: usize, expected: usize },
}

impl RankingOutcome {
    pub fn standings(&self) -> Option<&Standings> {
        match self {
            RankingOutcome::Ranked(s) | RankingOutcome::Tie(s) => Some(s),
            RankingOutcome::NoResult { .. } => None,
        }
    }

    /// Label with the most votes, if there is a single one.
    pub fn winner(&self) -> Option<&str> {
        match self {
            RankingOutcome::Ranked(s) => s.order.first().map(|(label, _)| label.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Ranker {
    horizon: usize,
}

impl Ranker {
    pub fn new(horizon: usize) -> Self {
        Self { horizon }
    }

    /// First index of the scored half.
    pub fn warm_up(&self) -> usize {
        self.horizon / 2
    }

    pub fn rank(&self, group: &RankingGroup, first: &PredictionRun, second: &PredictionRun) -> RankingOutcome {
        let collected = first.len() + second.len();
        let expected = 2 * self.horizon;
        if first.len() != self.horizon || second.len() != self.horizon {
            warn!(
                "{} / {}: collected {collected} of {expected} forecast steps, no result",
                group.first, group.second
            );
            return RankingOutcome::NoResult { collected, expected };
        }

        let mut votes = [0usize; 2];
        let comparisons: Vec<Comparison> = (self.warm_up()..self.horizon)
            .map(|i| Comparison {
                iteration: i,
                cy_first: first.steps[i].center().cy,
                cy_second: second.steps[i].center().cy,
            })
            .collect();
        for c in &comparisons {
            if c.cy_first > c.cy_second {
                votes[0] += 1;
            } else if c.cy_second > c.cy_first {
                votes[1] += 1;
            }
        }

        let mut order = vec![(group.first.clone(), votes[0]), (group.second.clone(), votes[1])];
        let tie = votes[0] == votes[1];
        // stable: equal counts keep input order
        order.sort_by(|a, b| b.1.cmp(&a.1));
        info!("{} / {} ranked {:?}", group.first, group.second, order);

        let standings = Standings { order, comparisons };
        if tie {
            RankingOutcome::Tie(standings)
        } else {
            RankingOutcome::Ranked(standings)
        }
    }
}
