//! Cross-agent consistency scoring.
//!
//! Every registered agent contributes the latest [`StateSnapshot`] published
//! by its own tick; the subsystem never touches an agent directly. A
//! recompute
//!
//! 1. filters each snapshot down to the literals that take part,
//! 2. computes the pairwise metric matrix in parallel,
//! 3. row-normalises it into a transition matrix with `epsilon` self-loops,
//! 4. iterates to its stationary distribution, and
//! 5. inverts and L1-normalises that distribution.
//!
//! An agent far from the others collects stationary mass and so ends up with
//! a low consistency. When every pair agrees the matrix is zero and every
//! agent gets `1/n`. A single agent scores 1.0.
//!
//! [`Consistency::refresh`] skips the work when no snapshot fingerprint
//! changed since the last recompute.

/// Snapshot filters.
pub mod filter;
/// Pairwise metrics.
pub mod metric;
mod scorer;
/// Running descriptive statistics.
pub mod statistics;

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::agent::{AgentId, SnapshotHandle, StateSnapshot};
use crate::error::{ConsistencyError, ValidationError};
use crate::term::Literal;

pub use filter::{Filter, FilterKind};
pub use metric::{Compression, CompressionDistance, Metric, SymmetricDifference, WeightedDifference};
pub use scorer::ConsistencyBiasedScorer;
pub use statistics::DescriptiveStatistics;

/// How the stationary distribution is found.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Algorithm {
    /// A fixed number of power iterations.
    FixPoint { iterations: usize },
    /// Iterate until the L1 change drops below `tolerance`.
    Converge { tolerance: f64, max_iterations: usize },
}

impl Default for Algorithm {
    fn default() -> Self {
        Self::FixPoint { iterations: 8 }
    }
}

#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsistencyConfig {
    pub algorithm: Algorithm,
    /// Self-loop weight on the transition matrix diagonal.
    pub epsilon: f64,
}

impl Default for ConsistencyConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::default(),
            epsilon: 0.001,
        }
    }
}

impl ConsistencyConfig {
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidConfig` for a non-positive epsilon,
    /// zero iterations or a non-positive tolerance.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let invalid = |reason: &str| {
            Err(ValidationError::InvalidConfig {
                reason: reason.to_string(),
            })
        };
        if !(self.epsilon > 0.0 && self.epsilon < 1.0) {
            return invalid("epsilon must lie in (0, 1)");
        }
        match self.algorithm {
            Algorithm::FixPoint { iterations: 0 } | Algorithm::Converge { max_iterations: 0, .. } => {
                invalid("iteration count must be positive")
            }
            Algorithm::Converge { tolerance, .. } if tolerance <= 0.0 => invalid("tolerance must be positive"),
            _ => Ok(()),
        }
    }
}

/// The last computed consistency of one agent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AgentScore {
    pub value: f64,
    /// Set when the last recompute could not score this agent; `value` is
    /// then the previous score, or 0 if there never was one.
    pub stale: bool,
    pub computed_at: Option<DateTime<Utc>>,
}

impl AgentScore {
    const fn pending() -> Self {
        Self {
            value: 0.0,
            stale: true,
            computed_at: None,
        }
    }
}

/// Result of one recompute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsSnapshot {
    /// Recomputes so far, this one included.
    pub round: u64,
    /// Over the fresh scores of this round.
    pub statistics: DescriptiveStatistics,
    /// Fresh scores in registration order.
    pub scores: Vec<(AgentId, f64)>,
    pub stale: Vec<AgentId>,
    pub computed_at: DateTime<Utc>,
}

type ScoreTable = Arc<RwLock<HashMap<AgentId, AgentScore>>>;

/// Read-only view of the published scores, shareable across threads.
#[derive(Debug, Clone, Default)]
pub struct ScoreReader {
    scores: ScoreTable,
}

impl ScoreReader {
    #[must_use]
    pub fn get(&self, agent: AgentId) -> Option<AgentScore> {
        let scores = self.scores.read().unwrap_or_else(PoisonError::into_inner);
        scores.get(&agent).copied()
    }
}

/// The consistency subsystem for one agent population.
pub struct Consistency {
    config: ConsistencyConfig,
    filter: Box<dyn Filter>,
    metric: Box<dyn Metric>,
    agents: Vec<(AgentId, SnapshotHandle)>,
    scores: ScoreTable,
    statistics: DescriptiveStatistics,
    round: u64,
    /// Snapshot fingerprints used by the last recompute.
    seen: HashMap<AgentId, String>,
    /// Set when the population changed since the last recompute.
    dirty: bool,
    last: Option<StatisticsSnapshot>,
}

impl std::fmt::Debug for Consistency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Consistency")
            .field("config", &self.config)
            .field("metric", &self.metric.name())
            .field("agents", &self.agents.len())
            .field("round", &self.round)
            .finish_non_exhaustive()
    }
}

impl Consistency {
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidConfig` if the config is out of range.
    pub fn new(
        config: ConsistencyConfig,
        filter: impl Filter + 'static,
        metric: impl Metric + 'static,
    ) -> Result<Self, ValidationError> {
        config.validate()?;
        Ok(Self {
            config,
            filter: Box::new(filter),
            metric: Box::new(metric),
            agents: Vec::new(),
            scores: ScoreTable::default(),
            statistics: DescriptiveStatistics::new(),
            round: 0,
            seen: HashMap::new(),
            dirty: true,
            last: None,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &ConsistencyConfig {
        &self.config
    }

    /// Registers an agent. Returns false if it was already registered.
    pub fn add(&mut self, agent: AgentId, snapshot: SnapshotHandle) -> bool {
        if self.contains(agent) {
            return false;
        }
        tracing::debug!(agent = %agent, population = self.agents.len() + 1, "agent added to consistency");
        self.agents.push((agent, snapshot));
        self.write_scores().insert(agent, AgentScore::pending());
        self.dirty = true;
        true
    }

    /// Unregisters an agent and forgets its score.
    pub fn remove(&mut self, agent: AgentId) -> bool {
        let before = self.agents.len();
        self.agents.retain(|(id, _)| *id != agent);
        self.write_scores().remove(&agent);
        self.seen.remove(&agent);
        let removed = before != self.agents.len();
        self.dirty |= removed;
        removed
    }

    #[must_use]
    pub fn contains(&self, agent: AgentId) -> bool {
        self.agents.iter().any(|(id, _)| *id == agent)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// The last computed score of an agent.
    ///
    /// # Errors
    ///
    /// Returns `ConsistencyError::UnknownAgent` for unregistered agents.
    pub fn get(&self, agent: AgentId) -> Result<AgentScore, ConsistencyError> {
        self.reader().get(agent).ok_or(ConsistencyError::UnknownAgent { id: agent })
    }

    /// Statistics of the last recompute.
    #[must_use]
    pub const fn statistics(&self) -> &DescriptiveStatistics {
        &self.statistics
    }

    #[must_use]
    pub fn reader(&self) -> ScoreReader {
        ScoreReader {
            scores: Arc::clone(&self.scores),
        }
    }

    /// True if an agent joined or left, or published a snapshot with a
    /// different fingerprint, since the last recompute.
    #[must_use]
    pub fn changed(&self) -> bool {
        self.dirty
            || self
                .agents
                .iter()
                .any(|(id, handle)| self.seen.get(id) != Some(&handle.load().fingerprint))
    }

    /// Recomputes if [`changed`](Self::changed), otherwise returns the
    /// previous result unchanged.
    pub fn refresh(&mut self) -> StatisticsSnapshot {
        if !self.changed() {
            if let Some(last) = &self.last {
                tracing::trace!(round = self.round, "consistency unchanged, recompute skipped");
                return last.clone();
            }
        }
        self.recompute()
    }

    /// Scores the population from the latest snapshots.
    ///
    /// Each snapshot is read once under its own short lock, so agents keep
    /// ticking meanwhile. When the metric fails on some pairs, the agents
    /// involved in the most failures are marked stale and left out of this
    /// round until every remaining pair has a distance.
    pub fn recompute(&mut self) -> StatisticsSnapshot {
        let started = Instant::now();
        let mut seen = HashMap::with_capacity(self.agents.len());
        let states: Vec<(AgentId, Vec<Literal>)> = self
            .agents
            .iter()
            .map(|(id, handle)| {
                let snapshot: Arc<StateSnapshot> = handle.load();
                seen.insert(*id, snapshot.fingerprint.clone());
                (*id, self.filter.filter(&snapshot))
            })
            .collect();
        let n = states.len();

        let pairs: Vec<(usize, usize)> = (0..n).flat_map(|i| (i + 1..n).map(move |j| (i, j))).collect();
        let metric = self.metric.as_ref();
        let distances: Vec<(usize, usize, Result<f64, ConsistencyError>)> = pairs
            .par_iter()
            .map(|&(i, j)| (i, j, metric.distance(&states[i].1, &states[j].1)))
            .collect();

        let mut failed = Vec::new();
        let mut matrix = vec![vec![0.0; n]; n];
        for (i, j, distance) in distances {
            let distance = distance.and_then(|d| {
                if d.is_finite() {
                    Ok(d.max(0.0))
                } else {
                    Err(ConsistencyError::MetricFailed {
                        metric: metric.name().to_string(),
                        reason: format!("non-finite distance {d}"),
                    })
                }
            });
            match distance {
                Ok(d) => {
                    matrix[i][j] = d;
                    matrix[j][i] = d;
                }
                Err(error) => {
                    tracing::warn!(
                        left = %states[i].0,
                        right = %states[j].0,
                        error = %error,
                        "consistency metric failed"
                    );
                    failed.push((i, j));
                }
            }
        }
        let stale = blame(n, failed);

        let fresh: Vec<usize> = (0..n).filter(|&i| !stale[i]).collect();
        let reduced: Vec<Vec<f64>> = fresh
            .iter()
            .map(|&i| fresh.iter().map(|&j| matrix[i][j]).collect())
            .collect();
        let values = consistency_vector(reduced, &self.config);

        let computed_at = Utc::now();
        let scores: Vec<(AgentId, f64)> = fresh.iter().map(|&i| states[i].0).zip(values).collect();
        let stale: Vec<AgentId> = (0..n).filter(|&i| stale[i]).map(|i| states[i].0).collect();
        {
            let mut table = self.write_scores();
            for (agent, value) in &scores {
                table.insert(
                    *agent,
                    AgentScore {
                        value: *value,
                        stale: false,
                        computed_at: Some(computed_at),
                    },
                );
            }
            for agent in &stale {
                table.entry(*agent).or_insert_with(AgentScore::pending).stale = true;
            }
        }

        self.statistics = scores.iter().map(|(_, v)| *v).collect();
        self.round += 1;
        self.seen = seen;
        self.dirty = false;
        tracing::info!(
            round = self.round,
            agents = n,
            stale = stale.len(),
            mean = self.statistics.mean(),
            variance = self.statistics.variance(),
            elapsed_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX),
            "consistency recomputed"
        );

        let snapshot = StatisticsSnapshot {
            round: self.round,
            statistics: self.statistics,
            scores,
            stale,
            computed_at,
        };
        self.last = Some(snapshot.clone());
        snapshot
    }

    fn write_scores(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<AgentId, AgentScore>> {
        self.scores.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Picks the agents to leave out for the failed pairs.
///
/// The agents with the most failures among the remaining pairs go first, so
/// one malformed snapshot does not take its healthy peers with it. A pair
/// whose two agents fail equally often loses both.
fn blame(n: usize, mut failed: Vec<(usize, usize)>) -> Vec<bool> {
    let mut stale = vec![false; n];
    while !failed.is_empty() {
        let mut counts = vec![0usize; n];
        for &(i, j) in &failed {
            counts[i] += 1;
            counts[j] += 1;
        }
        let worst = counts.iter().copied().max().unwrap_or(0);
        for (i, count) in counts.into_iter().enumerate() {
            if count == worst {
                stale[i] = true;
            }
        }
        failed.retain(|&(i, j)| !stale[i] && !stale[j]);
    }
    stale
}

/// Per-agent consistency from a symmetric distance matrix.
fn consistency_vector(mut matrix: Vec<Vec<f64>>, config: &ConsistencyConfig) -> Vec<f64> {
    let n = matrix.len();
    match n {
        0 => return Vec::new(),
        1 => return vec![1.0],
        _ => {}
    }

    let agreeing = matrix
        .iter()
        .enumerate()
        .all(|(i, row)| row.iter().enumerate().all(|(j, d)| i == j || *d == 0.0));
    let stationary = if agreeing {
        vec![0.0; n]
    } else {
        for (i, row) in matrix.iter_mut().enumerate() {
            row[i] = 0.0;
            normalize(row);
            row[i] = config.epsilon;
        }
        stationary_distribution(&matrix, config.algorithm)
    };

    let mut inverted: Vec<f64> = stationary.iter().map(|p| 1.0 - p).collect();
    normalize(&mut inverted);
    inverted
}

fn stationary_distribution(matrix: &[Vec<f64>], algorithm: Algorithm) -> Vec<f64> {
    let n = matrix.len();
    #[allow(clippy::cast_precision_loss)]
    let mut current = vec![1.0 / n as f64; n];
    let (max_iterations, tolerance) = match algorithm {
        Algorithm::FixPoint { iterations } => (iterations, None),
        Algorithm::Converge {
            tolerance,
            max_iterations,
        } => (max_iterations, Some(tolerance)),
    };

    for _ in 0..max_iterations {
        let mut next = vec![0.0; n];
        for (weight, row) in current.iter().zip(matrix) {
            for (target, p) in next.iter_mut().zip(row) {
                *target += weight * p;
            }
        }
        normalize(&mut next);
        let change: f64 = next.iter().zip(&current).map(|(a, b)| (a - b).abs()).sum();
        current = next;
        if tolerance.is_some_and(|t| change < t) {
            break;
        }
    }
    current
}

/// Scales to unit L1 norm; an all-zero vector becomes uniform.
fn normalize(values: &mut [f64]) {
    let sum: f64 = values.iter().map(|v| v.abs()).sum();
    if sum > 0.0 {
        values.iter_mut().for_each(|v| *v /= sum);
    } else if !values.is_empty() {
        #[allow(clippy::cast_precision_loss)]
        let uniform = 1.0 / values.len() as f64;
        values.iter_mut().for_each(|v| *v = uniform);
    }
}
