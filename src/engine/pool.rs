//! Persistent worker pool for parallel population evaluation.
//!
//! Workers are OS threads created once per run, each holding its own
//! policy network built from the shared topology; per generation only the
//! variable weight buffers travel. Workers talk exclusively to the manager
//! (star topology) over channels, so the core needs no locks.

use std::io;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, unbounded};
use log::warn;
use rand::{RngCore, SeedableRng, rngs::StdRng};

use crate::schema::{EnvConfig, Genome, ScoredGenome, TopologyDescriptor};

use super::evaluate::Evaluator;
use super::policy::PolicyNetwork;

/// Hard cap on worker threads regardless of hardware parallelism.
pub const MAX_WORKERS: usize = 16;

/// Resolve a requested worker count: `0` means auto-detect; the result is
/// always within `[1, MAX_WORKERS]`.
pub fn resolve_worker_count(requested: usize) -> usize {
    let count = if requested == 0 {
        thread::available_parallelism().map_or(1, |n| n.get())
    } else {
        requested
    };
    count.clamp(1, MAX_WORKERS)
}

/// Contiguous batch length for splitting `population` slots across
/// `workers` (ceil division; the last batch may be shorter).
pub(crate) fn batch_chunk_len(population: usize, workers: usize) -> usize {
    population.div_ceil(workers.max(1))
}

/// Messages accepted by a worker context.
#[derive(Debug, Clone)]
pub enum WorkerCommand {
    /// Build the policy network once at pool start.
    LoadTopology(TopologyDescriptor),
    /// Evaluate a batch of genomes sequentially and reply with the full
    /// result list as one message.
    RunBatch {
        /// Position of this batch in the dispatch order.
        batch_index: usize,
        /// Genomes to evaluate, in population order.
        genomes: Vec<Genome>,
        /// Environment to evaluate against.
        env: EnvConfig,
        /// Episodes per evaluation.
        episodes: u32,
        /// Score threshold for carrying weight buffers back.
        return_threshold: f32,
    },
}

#[derive(Debug)]
struct BatchReply {
    batch_index: usize,
    outcome: Result<Vec<ScoredGenome>, String>,
}

/// Worker pool failures. Any of these fails the whole generation; there is
/// no partial-result consumption.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] io::Error),
    #[error("worker {0} is no longer reachable")]
    Disconnected(usize),
    #[error("no batch reply within {0:?}, worker unresponsive")]
    Unresponsive(Duration),
    #[error("worker failure: {0}")]
    Worker(String),
}

struct WorkerHandle {
    tx: Sender<WorkerCommand>,
    join: JoinHandle<()>,
}

/// Fixed set of persistent evaluation contexts.
pub struct WorkerPool {
    topology: TopologyDescriptor,
    batch_timeout: Duration,
    seed_rng: StdRng,
    workers: Vec<WorkerHandle>,
    reply_tx: Sender<BatchReply>,
    reply_rx: Receiver<BatchReply>,
}

impl WorkerPool {
    /// Spawn `count` workers and load the topology into each.
    pub fn start(
        topology: TopologyDescriptor,
        count: usize,
        base_seed: u64,
        batch_timeout: Duration,
    ) -> Result<Self, PoolError> {
        let (reply_tx, reply_rx) = unbounded();
        let mut pool = Self {
            topology,
            batch_timeout,
            seed_rng: StdRng::seed_from_u64(base_seed),
            workers: Vec::with_capacity(count),
            reply_tx,
            reply_rx,
        };
        pool.spawn_workers(count)?;
        Ok(pool)
    }

    /// Number of worker contexts.
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    fn spawn_workers(&mut self, count: usize) -> Result<(), PoolError> {
        for index in 0..count.max(1) {
            let (tx, rx) = unbounded();
            let reply_tx = self.reply_tx.clone();
            let seed = self.seed_rng.next_u64();
            let join = thread::Builder::new()
                .name(format!("evo-worker-{index}"))
                .spawn(move || worker_loop(seed, rx, reply_tx))?;

            tx.send(WorkerCommand::LoadTopology(self.topology.clone()))
                .map_err(|_| PoolError::Disconnected(index))?;
            self.workers.push(WorkerHandle { tx, join });
        }
        Ok(())
    }

    /// Tear down all workers and spawn a fresh set (the manager's recovery
    /// path after a failed generation).
    pub fn restart(&mut self) -> Result<(), PoolError> {
        let count = self.workers.len();
        self.shutdown_workers();
        // Drain replies left over from the failed generation so they are
        // not paired with the next dispatch.
        while self.reply_rx.try_recv().is_ok() {}
        self.spawn_workers(count)
    }

    /// Evaluate a population: fan batches out, wait for every batch to
    /// come back (barrier), and return results concatenated in population
    /// order. Fails as a whole if any worker fails.
    pub fn evaluate_population(
        &self,
        population: &[Genome],
        env: EnvConfig,
        episodes: u32,
        return_threshold: f32,
    ) -> Result<Vec<ScoredGenome>, PoolError> {
        if population.is_empty() {
            return Ok(Vec::new());
        }

        let chunk = batch_chunk_len(population.len(), self.workers.len());
        let batches: Vec<&[Genome]> = population.chunks(chunk).collect();

        for (index, (batch, worker)) in batches.iter().zip(&self.workers).enumerate() {
            worker
                .tx
                .send(WorkerCommand::RunBatch {
                    batch_index: index,
                    genomes: batch.to_vec(),
                    env,
                    episodes,
                    return_threshold,
                })
                .map_err(|_| PoolError::Disconnected(index))?;
        }

        // Join barrier: buffer replies by tag until the full set is
        // present. Arrival order across workers is unspecified.
        let mut slots: Vec<Option<Vec<ScoredGenome>>> = vec![None; batches.len()];
        let deadline = Instant::now() + self.batch_timeout;
        for _ in 0..batches.len() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let reply = self
                .reply_rx
                .recv_timeout(remaining)
                .map_err(|_| PoolError::Unresponsive(self.batch_timeout))?;
            let results = reply.outcome.map_err(PoolError::Worker)?;
            slots[reply.batch_index] = Some(results);
        }

        let mut gathered = Vec::with_capacity(population.len());
        for slot in slots {
            gathered.extend(slot.unwrap_or_default());
        }
        Ok(gathered)
    }

    fn shutdown_workers(&mut self) {
        for worker in self.workers.drain(..) {
            drop(worker.tx);
            if worker.join.join().is_err() {
                warn!("worker thread panicked during shutdown");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown_workers();
    }
}

/// Worker context body: exhaustive handling of the command protocol.
fn worker_loop(seed: u64, rx: Receiver<WorkerCommand>, tx: Sender<BatchReply>) {
    let mut policy: Option<PolicyNetwork> = None;
    let mut rng = StdRng::seed_from_u64(seed);

    while let Ok(command) = rx.recv() {
        match command {
            WorkerCommand::LoadTopology(topology) => {
                // Topology construction is the expensive part; it happens
                // once here, weight swaps happen per evaluation.
                policy = Some(PolicyNetwork::new(&topology));
            }
            WorkerCommand::RunBatch {
                batch_index,
                genomes,
                env,
                episodes,
                return_threshold,
            } => {
                let outcome = match policy.as_mut() {
                    None => Err("batch dispatched before topology was loaded".to_string()),
                    Some(policy) => Ok(run_batch(
                        policy,
                        &genomes,
                        env,
                        episodes,
                        return_threshold,
                        rng.next_u64(),
                    )),
                };
                if tx.send(BatchReply {
                    batch_index,
                    outcome,
                })
                .is_err()
                {
                    break;
                }
            }
        }
    }
}

/// Evaluate one batch sequentially. A genome that fails the topology check
/// is dropped from the batch with a warning; the batch continues.
fn run_batch(
    policy: &mut PolicyNetwork,
    genomes: &[Genome],
    env: EnvConfig,
    episodes: u32,
    return_threshold: f32,
    seed: u64,
) -> Vec<ScoredGenome> {
    let mut evaluator = Evaluator::new(env, episodes, seed);
    let mut results = Vec::with_capacity(genomes.len());

    for genome in genomes {
        match evaluator.evaluate(policy, genome) {
            Ok(result) => {
                let carry = result.victory || result.score >= return_threshold;
                results.push(ScoredGenome {
                    genome: carry.then_some(result.genome),
                    score: result.score,
                    victory: result.victory,
                    episodes_played: result.episodes_played,
                });
            }
            Err(err) => warn!("dropping genome from batch: {err}"),
        }
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::operators::GenomeRng;
    use crate::schema::Genome;

    #[test]
    fn chunk_len_partitions_ceil_with_short_tail() {
        assert_eq!(batch_chunk_len(10, 3), 4);
        let population: Vec<usize> = (0..10).collect();
        let sizes: Vec<usize> = population
            .chunks(batch_chunk_len(10, 3))
            .map(|c| c.len())
            .collect();
        assert_eq!(sizes, vec![4, 4, 2]);

        let rejoined: Vec<usize> = population
            .chunks(batch_chunk_len(10, 3))
            .flatten()
            .copied()
            .collect();
        assert_eq!(rejoined, population);
    }

    #[test]
    fn worker_count_resolution_is_bounded() {
        assert_eq!(resolve_worker_count(1), 1);
        assert_eq!(resolve_worker_count(MAX_WORKERS + 10), MAX_WORKERS);
        let auto = resolve_worker_count(0);
        assert!((1..=MAX_WORKERS).contains(&auto));
    }

    #[test]
    fn pool_preserves_population_order() {
        let topology = TopologyDescriptor {
            rows: 2,
            cols: 2,
            hidden: vec![4],
        };
        let env = EnvConfig {
            rows: 2,
            cols: 2,
            mines: 0,
        };

        // Tag each genome through its first output bias so the returned
        // buffers identify their slot.
        let population: Vec<Genome> = (0..5)
            .map(|i| {
                let mut genome = Genome::zeros(&topology);
                let bias = genome.layers.last_mut().expect("output bias");
                bias.data[0] = i as f32 + 1.0;
                genome
            })
            .collect();

        let pool = WorkerPool::start(topology, 3, 7, Duration::from_secs(60)).expect("pool starts");
        let results = pool
            .evaluate_population(&population, env, 1, f32::NEG_INFINITY)
            .expect("evaluation succeeds");

        assert_eq!(results.len(), population.len());
        for (i, result) in results.iter().enumerate() {
            // Mine-free boards always end in victory, so every result
            // carries its genome back.
            assert!(result.victory);
            let genome = result.genome.as_ref().expect("carried genome");
            let bias = genome.layers.last().expect("output bias");
            assert_eq!(bias.data[0], i as f32 + 1.0);
        }
    }

    #[test]
    fn threshold_strips_unpromising_genomes() {
        let topology = TopologyDescriptor {
            rows: 2,
            cols: 2,
            hidden: vec![4],
        };
        // Mines everywhere but one cell: most evaluations lose with a
        // deeply negative score.
        let env = EnvConfig {
            rows: 2,
            cols: 2,
            mines: 3,
        };
        let mut rng = GenomeRng::new(3);
        let population: Vec<Genome> = (0..4).map(|_| rng.random_genome(&topology)).collect();

        let pool =
            WorkerPool::start(topology, 2, 11, Duration::from_secs(60)).expect("pool starts");
        let results = pool
            .evaluate_population(&population, env, 1, f32::INFINITY)
            .expect("evaluation succeeds");

        assert_eq!(results.len(), population.len());
        for result in results {
            // Infinite threshold: only victories may carry weights.
            assert_eq!(result.genome.is_some(), result.victory);
        }
    }

    #[test]
    fn mismatched_genomes_are_dropped_not_fatal() {
        let topology = TopologyDescriptor {
            rows: 2,
            cols: 2,
            hidden: vec![4],
        };
        let env = EnvConfig {
            rows: 2,
            cols: 2,
            mines: 0,
        };
        let good = Genome::zeros(&topology);
        let bad = Genome::zeros(&TopologyDescriptor {
            rows: 3,
            cols: 3,
            hidden: vec![4],
        });
        let population = vec![good.clone(), bad, good];

        let pool = WorkerPool::start(topology, 1, 5, Duration::from_secs(60)).expect("pool starts");
        let results = pool
            .evaluate_population(&population, env, 1, f32::NEG_INFINITY)
            .expect("batch survives the bad genome");
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.victory));
    }

    #[test]
    fn restart_yields_a_working_pool() {
        let topology = TopologyDescriptor {
            rows: 2,
            cols: 2,
            hidden: vec![4],
        };
        let env = EnvConfig {
            rows: 2,
            cols: 2,
            mines: 0,
        };
        let mut pool =
            WorkerPool::start(topology.clone(), 2, 13, Duration::from_secs(60)).expect("start");
        pool.restart().expect("restart");

        let population = vec![Genome::zeros(&topology); 3];
        let results = pool
            .evaluate_population(&population, env, 1, f32::NEG_INFINITY)
            .expect("evaluation after restart");
        assert_eq!(results.len(), 3);
    }
}
