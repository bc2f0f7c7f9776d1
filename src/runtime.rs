//! Multi-agent scheduling runtime.
//!
//! Agents are ticked by a small pool of named worker threads fed through a
//! bounded queue. A round submits one tick per registered agent and waits for
//! all of them, so ticks of different agents run in parallel while each agent
//! is still ticked by exactly one thread at a time. Removing an agent between
//! rounds therefore never interrupts an in-flight tick.

use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use serde::{Deserialize, Serialize};

use crate::agent::{Agent, AgentId, TickOutcome};
use crate::consistency::{Consistency, StatisticsSnapshot};
use crate::error::{EngineError, EngineResult, RuntimeError};

const POOL: &str = "tick";

/// Runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Number of tick workers.
    pub workers: usize,
    /// Maximum queued ticks.
    pub queue_capacity: usize,
    /// Refresh consistency scores after every round. The matrix is only
    /// recomputed when some agent's observed state changed.
    pub recompute_each_round: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 1024,
            recompute_each_round: true,
        }
    }
}

type SharedAgent = Arc<Mutex<Agent>>;

struct Job {
    slot: usize,
    agent: SharedAgent,
    reply: Sender<(usize, AgentId, TickOutcome)>,
}

fn tick(agent: &SharedAgent) -> (AgentId, TickOutcome) {
    let mut agent = agent.lock().unwrap_or_else(PoisonError::into_inner);
    let outcome = agent.tick();
    (agent.id(), outcome)
}

struct WorkerPool {
    tx: Sender<Job>,
    workers: Vec<JoinHandle<()>>,
    queue_capacity: usize,
}

impl WorkerPool {
    fn start(workers: usize, queue_capacity: usize) -> EngineResult<Self> {
        let workers = workers.max(1);
        let queue_capacity = queue_capacity.max(1);
        let (tx, rx) = bounded::<Job>(queue_capacity);

        let mut handles = Vec::with_capacity(workers);
        for idx in 0..workers {
            let rx: Receiver<Job> = rx.clone();
            let handle = thread::Builder::new()
                .name(format!("bdi-{POOL}-{idx}"))
                .spawn(move || {
                    while let Ok(job) = rx.recv() {
                        let (id, outcome) = tick(&job.agent);
                        let _ = job.reply.send((job.slot, id, outcome));
                    }
                })
                .map_err(|e| EngineError::internal(format!("failed to spawn tick worker: {e}")))?;
            handles.push(handle);
        }

        Ok(Self {
            tx,
            workers: handles,
            queue_capacity,
        })
    }

    fn try_submit(&self, job: Job) -> Result<(), RuntimeError> {
        match self.tx.try_send(job) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(RuntimeError::QueueFull {
                pool: POOL.to_string(),
                capacity: self.queue_capacity,
            }),
            Err(TrySendError::Disconnected(_)) => Err(RuntimeError::Disconnected {
                pool: POOL.to_string(),
            }),
        }
    }

    /// Blocks while the queue is full.
    fn submit(&self, job: Job) -> Result<(), RuntimeError> {
        self.tx.send(job).map_err(|_| RuntimeError::Disconnected {
            pool: POOL.to_string(),
        })
    }

    fn shutdown(self) {
        // closing the channel lets workers drain queued ticks, then exit
        drop(self.tx);
        for handle in self.workers {
            let _ = handle.join();
        }
    }
}

/// Handle to a single submitted tick.
pub struct TickHandle {
    agent: AgentId,
    rx: Receiver<(usize, AgentId, TickOutcome)>,
}

impl TickHandle {
    #[must_use]
    pub const fn agent(&self) -> AgentId {
        self.agent
    }

    /// Waits for the tick to finish.
    ///
    /// # Errors
    ///
    /// Returns `RuntimeError::Disconnected` if the worker went away.
    pub fn join(self) -> Result<TickOutcome, RuntimeError> {
        self.rx.recv().map(|(_, _, outcome)| outcome).map_err(|_| RuntimeError::Disconnected {
            pool: POOL.to_string(),
        })
    }

    /// Waits for the tick with a timeout.
    ///
    /// # Errors
    ///
    /// Returns `RuntimeError::Timeout` or `RuntimeError::Disconnected`.
    pub fn join_timeout(self, timeout: Duration) -> Result<TickOutcome, RuntimeError> {
        self.rx
            .recv_timeout(timeout)
            .map(|(_, _, outcome)| outcome)
            .map_err(|err| match err {
                RecvTimeoutError::Timeout => RuntimeError::Timeout {
                    duration_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                },
                RecvTimeoutError::Disconnected => RuntimeError::Disconnected {
                    pool: POOL.to_string(),
                },
            })
    }
}

/// Outcome of one scheduling round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundReport {
    pub round: u64,
    /// Tick outcomes in registration order.
    pub outcomes: Vec<(AgentId, TickOutcome)>,
    /// Latest consistency result when scoring runs each round.
    pub consistency: Option<StatisticsSnapshot>,
}

impl RoundReport {
    /// True if no agent made progress.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.outcomes.iter().all(|(_, o)| *o != TickOutcome::Progressed)
    }
}

/// Ticks a population of agents on a worker pool.
pub struct Runtime {
    config: RuntimeConfig,
    pool: Option<WorkerPool>,
    agents: Vec<(AgentId, SharedAgent)>,
    consistency: Option<Consistency>,
    round: u64,
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.config)
            .field("agents", &self.agents.len())
            .field("round", &self.round)
            .finish_non_exhaustive()
    }
}

impl Runtime {
    /// Starts the worker threads.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Internal` if a worker thread cannot be spawned.
    pub fn new(config: RuntimeConfig) -> EngineResult<Self> {
        let pool = WorkerPool::start(config.workers, config.queue_capacity)?;
        tracing::info!(workers = config.workers.max(1), queue = config.queue_capacity, "runtime started");
        Ok(Self {
            config,
            pool: Some(pool),
            agents: Vec::new(),
            consistency: None,
            round: 0,
        })
    }

    /// Attaches a consistency subsystem; already registered agents join it.
    #[must_use]
    pub fn with_consistency(mut self, mut consistency: Consistency) -> Self {
        for (id, agent) in &self.agents {
            let handle = agent.lock().unwrap_or_else(PoisonError::into_inner).snapshot_handle();
            consistency.add(*id, handle);
        }
        self.consistency = Some(consistency);
        self
    }

    #[must_use]
    pub const fn consistency(&self) -> Option<&Consistency> {
        self.consistency.as_ref()
    }

    /// Registers an agent for scheduling.
    pub fn add(&mut self, agent: Agent) -> AgentId {
        let id = agent.id();
        if let Some(consistency) = self.consistency.as_mut() {
            consistency.add(id, agent.snapshot_handle());
        }
        self.agents.push((id, Arc::new(Mutex::new(agent))));
        tracing::debug!(agent = %id, population = self.agents.len(), "agent scheduled");
        id
    }

    /// Stops scheduling an agent and hands it back.
    pub fn remove(&mut self, id: AgentId) -> Option<SharedAgent> {
        let index = self.agents.iter().position(|(a, _)| *a == id)?;
        let (_, agent) = self.agents.remove(index);
        if let Some(consistency) = self.consistency.as_mut() {
            consistency.remove(id);
        }
        tracing::debug!(agent = %id, "agent unscheduled");
        Some(agent)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    #[must_use]
    pub fn agent_ids(&self) -> Vec<AgentId> {
        self.agents.iter().map(|(id, _)| *id).collect()
    }

    /// Runs `f` on an agent under its lock.
    pub fn with_agent<R>(&self, id: AgentId, f: impl FnOnce(&mut Agent) -> R) -> Option<R> {
        let (_, agent) = self.agents.iter().find(|(a, _)| *a == id)?;
        let mut guard = agent.lock().unwrap_or_else(PoisonError::into_inner);
        Some(f(&mut guard))
    }

    fn pool(&self) -> Result<&WorkerPool, RuntimeError> {
        self.pool.as_ref().ok_or_else(|| RuntimeError::Disconnected {
            pool: POOL.to_string(),
        })
    }

    /// Queues a single tick without waiting for it.
    ///
    /// # Errors
    ///
    /// Returns `RuntimeError::QueueFull` if the queue is at capacity and
    /// `ConsistencyError::UnknownAgent` for unregistered agents.
    pub fn submit(&self, id: AgentId) -> EngineResult<TickHandle> {
        let (_, agent) = self
            .agents
            .iter()
            .find(|(a, _)| *a == id)
            .ok_or(crate::error::ConsistencyError::UnknownAgent { id })?;
        let (reply, rx) = bounded(1);
        self.pool()?.try_submit(Job {
            slot: 0,
            agent: Arc::clone(agent),
            reply,
        })?;
        Ok(TickHandle { agent: id, rx })
    }

    /// Ticks every registered agent once and waits for all ticks.
    ///
    /// # Errors
    ///
    /// Returns `RuntimeError::Disconnected` if the worker pool is gone.
    pub fn run_round(&mut self) -> EngineResult<RoundReport> {
        let n = self.agents.len();
        let (reply, rx) = bounded(n.max(1));
        {
            let pool = self.pool()?;
            for (slot, (_, agent)) in self.agents.iter().enumerate() {
                pool.submit(Job {
                    slot,
                    agent: Arc::clone(agent),
                    reply: reply.clone(),
                })?;
            }
        }
        drop(reply);

        let mut outcomes: Vec<Option<(AgentId, TickOutcome)>> = vec![None; n];
        for _ in 0..n {
            let (slot, id, outcome) = rx.recv().map_err(|_| RuntimeError::Disconnected {
                pool: POOL.to_string(),
            })?;
            outcomes[slot] = Some((id, outcome));
        }
        self.round += 1;

        let consistency = match self.consistency.as_mut() {
            Some(c) if self.config.recompute_each_round => Some(c.refresh()),
            _ => None,
        };
        let outcomes: Vec<(AgentId, TickOutcome)> = outcomes.into_iter().flatten().collect();
        tracing::debug!(
            round = self.round,
            agents = n,
            progressed = outcomes.iter().filter(|(_, o)| *o == TickOutcome::Progressed).count(),
            "round finished"
        );
        Ok(RoundReport {
            round: self.round,
            outcomes,
            consistency,
        })
    }

    /// Runs rounds until one makes no progress or `max_rounds` is reached.
    /// Returns the number of rounds run.
    ///
    /// # Errors
    ///
    /// See [`run_round`](Self::run_round).
    pub fn run_until_idle(&mut self, max_rounds: usize) -> EngineResult<usize> {
        for executed in 1..=max_rounds {
            if self.run_round()?.is_idle() {
                return Ok(executed);
            }
        }
        Ok(max_rounds)
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.take() {
            pool.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consistency::{ConsistencyConfig, FilterKind, SymmetricDifference};
    use crate::plan::PlanLibrary;
    use crate::term::Literal;

    fn agent(belief: &str) -> Agent {
        Agent::builder(Arc::new(PlanLibrary::new()))
            .belief(Literal::atom(belief))
            .build()
            .unwrap()
    }

    #[test]
    fn test_round_ticks_every_agent_in_order() {
        let mut runtime = Runtime::new(RuntimeConfig {
            workers: 2,
            queue_capacity: 1,
            recompute_each_round: false,
        })
        .unwrap();
        let ids: Vec<AgentId> = (0..5).map(|i| runtime.add(agent(&format!("b{i}")))).collect();

        let report = runtime.run_round().unwrap();
        assert_eq!(report.round, 1);
        let order: Vec<AgentId> = report.outcomes.iter().map(|(id, _)| *id).collect();
        assert_eq!(order, ids);
        // each agent handles its belief-add event
        assert!(report.outcomes.iter().all(|(_, o)| *o == TickOutcome::Progressed));
        assert!(runtime.run_round().unwrap().is_idle());
        for id in ids {
            assert_eq!(runtime.with_agent(id, |a| a.cycle()), Some(2));
        }
    }

    #[test]
    fn test_removed_agent_is_not_ticked() {
        let mut runtime = Runtime::new(RuntimeConfig::default()).unwrap();
        let kept = runtime.add(agent("a"));
        let removed = runtime.add(agent("b"));
        runtime.run_round().unwrap();
        let handle = runtime.remove(removed).unwrap();
        runtime.run_round().unwrap();
        assert_eq!(handle.lock().unwrap().cycle(), 1);
        assert_eq!(runtime.with_agent(kept, |a| a.cycle()), Some(2));
        assert!(runtime.with_agent(removed, |a| a.cycle()).is_none());
    }

    #[test]
    fn test_consistency_recomputed_each_round() {
        let consistency =
            Consistency::new(ConsistencyConfig::default(), FilterKind::All, SymmetricDifference).unwrap();
        let mut runtime = Runtime::new(RuntimeConfig::default()).unwrap().with_consistency(consistency);
        let ids: Vec<AgentId> = (0..3).map(|_| runtime.add(agent("same"))).collect();
        let report = runtime.run_round().unwrap();
        let stats = report.consistency.unwrap();
        assert_eq!(stats.statistics.count(), 3);
        assert!(stats.statistics.variance().abs() < 1e-15);
        let consistency = runtime.consistency().unwrap();
        for id in ids {
            assert!((consistency.get(id).unwrap().value - 1.0 / 3.0).abs() < 1e-12);
        }

        // idle round, same beliefs: the previous result is reused
        let again = runtime.run_round().unwrap();
        assert!(again.is_idle());
        assert_eq!(again.consistency.unwrap().round, stats.round);
    }

    #[test]
    fn test_submit_single_tick() {
        let mut runtime = Runtime::new(RuntimeConfig::default()).unwrap();
        let id = runtime.add(agent("a"));
        let handle = runtime.submit(id).unwrap();
        assert_eq!(handle.agent(), id);
        assert_eq!(handle.join_timeout(Duration::from_secs(5)).unwrap(), TickOutcome::Progressed);
        assert!(runtime.submit(AgentId::new()).is_err());
    }

    #[test]
    fn test_join_reports_disconnected_when_reply_dropped() {
        let (tx, rx) = bounded::<(usize, AgentId, TickOutcome)>(1);
        drop(tx);
        let handle = TickHandle {
            agent: AgentId::new(),
            rx,
        };
        let err = handle.join_timeout(Duration::from_millis(10)).unwrap_err();
        assert!(matches!(err, RuntimeError::Disconnected { ref pool } if pool == "tick"));
    }
}
