//! Evolution manager: owns the archive, the worker pool, and the
//! generation loop.
//!
//! Per generation: build the population from the archive (Dispatching),
//! fan it out and wait for every batch (Awaiting), merge results into the
//! archive and refresh the champion (Merging), then emit statistics and
//! advance the counter (Reporting). A stop request is honored only between
//! generations; dispatched work always runs to completion.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::schema::{
    ConfigError, GenerationReport, Genome, GenomeError, RunConfig, RunHistory, RunSummary,
    ScoredGenome, StopReason, TopologyDescriptor,
};

use super::archive::{EliteArchive, EliteEntry};
use super::operators::GenomeRng;
use super::pool::{PoolError, WorkerPool, resolve_worker_count};

/// Run-level failures.
#[derive(Debug, thiserror::Error)]
pub enum EvolutionError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Genome(#[from] GenomeError),
    #[error("worker pool failed to start: {0}")]
    Pool(#[from] PoolError),
    #[error("generation {generation} failed after retry: {source}")]
    Generation {
        generation: usize,
        #[source]
        source: PoolError,
    },
    #[error("evolution thread panicked")]
    Panicked,
}

/// Orchestrates generations of parallel evaluation and selection.
pub struct EvolutionManager {
    config: RunConfig,
    topology: TopologyDescriptor,
    rng: GenomeRng,
    pool: WorkerPool,
    archive: EliteArchive,
    initial: Genome,
    generation: usize,
    history: RunHistory,
    total_evaluations: u64,
    best_score: f32,
    stagnation: usize,
    stop: Arc<AtomicBool>,
    champion: Arc<RwLock<Option<Genome>>>,
    latest: Arc<RwLock<Option<GenerationReport>>>,
}

impl EvolutionManager {
    /// Validate the configuration, spawn the worker pool, and seed the
    /// initial genome from the run RNG.
    pub fn new(config: RunConfig) -> Result<Self, EvolutionError> {
        config.validate()?;

        let seed = config.random_seed.unwrap_or_else(rand::random);
        let mut rng = GenomeRng::new(seed);
        let topology = config.topology();
        let initial = rng.random_genome(&topology);

        let workers = resolve_worker_count(config.worker_count);
        let pool = WorkerPool::start(
            topology.clone(),
            workers,
            rng.next_seed(),
            Duration::from_secs(config.batch_timeout_secs),
        )?;
        info!(
            "evolution run: {} workers, population {}, elite capacity {}, seed {}",
            workers, config.population_size, config.elite_size, seed
        );

        let archive = EliteArchive::new(config.elite_size);
        Ok(Self {
            archive,
            topology,
            rng,
            pool,
            initial,
            generation: 0,
            history: RunHistory::default(),
            total_evaluations: 0,
            best_score: f32::NEG_INFINITY,
            stagnation: 0,
            stop: Arc::new(AtomicBool::new(false)),
            champion: Arc::new(RwLock::new(None)),
            latest: Arc::new(RwLock::new(None)),
            config,
        })
    }

    /// Replace the bootstrap genome (e.g. a champion carried over from a
    /// previous curriculum level).
    pub fn with_initial_genome(mut self, genome: Genome) -> Result<Self, EvolutionError> {
        if !genome.matches(&self.topology) {
            return Err(GenomeError::TopologyMismatch.into());
        }
        self.initial = genome;
        Ok(self)
    }

    /// Topology shared by every genome in this run.
    pub fn topology(&self) -> &TopologyDescriptor {
        &self.topology
    }

    /// Handle for requesting a stop; polled at the top of each generation.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Shared snapshot of the current champion, written once per
    /// generation.
    pub fn champion_handle(&self) -> Arc<RwLock<Option<Genome>>> {
        Arc::clone(&self.champion)
    }

    /// Shared snapshot of the latest generation report.
    pub fn report_handle(&self) -> Arc<RwLock<Option<GenerationReport>>> {
        Arc::clone(&self.latest)
    }

    /// Run to completion (blocking).
    pub fn run(&mut self) -> Result<RunSummary, EvolutionError> {
        self.run_with_callback(|_| {})
    }

    /// Run to completion, invoking the callback after each generation's
    /// report.
    pub fn run_with_callback<F>(&mut self, mut callback: F) -> Result<RunSummary, EvolutionError>
    where
        F: FnMut(&GenerationReport),
    {
        let start = Instant::now();

        let stop_reason = loop {
            if let Some(reason) = self.should_stop() {
                break reason;
            }

            // Dispatching + Awaiting.
            let population = self.compose_population()?;
            let results = self.evaluate_generation(&population)?;

            // Merging.
            self.merge_results(&results);

            // Reporting: the counter advances exactly once per completed
            // generation.
            let report = self.report(&results);
            callback(&report);
            self.history.push(&report);
            *write_lock(&self.latest) = Some(report);
            self.generation += 1;

            self.maybe_checkpoint();

            // Keep the host responsive between generations.
            thread::yield_now();
        };

        if let Some(path) = self.config.checkpoint_path.clone() {
            self.write_checkpoint(&path);
        }

        Ok(RunSummary {
            generations: self.generation,
            best_score: self.archive.top_score().unwrap_or(f32::NEG_INFINITY),
            total_evaluations: self.total_evaluations,
            stop_reason,
            champion: read_lock(&self.champion).clone(),
            history: self.history.clone(),
            elapsed_seconds: start.elapsed().as_secs_f64(),
        })
    }

    /// Move the manager onto its own thread and return the caller-facing
    /// handle.
    pub fn spawn(mut self) -> Result<RunHandle, EvolutionError> {
        let stop = self.stop_handle();
        let champion = self.champion_handle();
        let latest = self.report_handle();
        let join = thread::Builder::new()
            .name("evolution-manager".to_string())
            .spawn(move || self.run())
            .map_err(|e| EvolutionError::Pool(PoolError::Spawn(e)))?;
        Ok(RunHandle {
            stop,
            champion,
            latest,
            join,
        })
    }

    fn should_stop(&self) -> Option<StopReason> {
        if self.stop.load(Ordering::Relaxed) {
            return Some(StopReason::Cancelled);
        }
        if let Some(limit) = self.config.max_generations {
            if self.generation >= limit {
                return Some(StopReason::MaxGenerations);
            }
        }
        if let (Some(target), Some(top)) = (self.config.target_score, self.archive.top_score()) {
            if top >= target {
                return Some(StopReason::TargetReached);
            }
        }
        if let Some(limit) = self.config.stagnation_limit {
            if self.stagnation >= limit {
                return Some(StopReason::Stagnation);
            }
        }
        None
    }

    /// Build the next population from the archive.
    ///
    /// Slots are filled in four bands, from exploitation to exploration:
    /// pure elite replays, light elite mutants, crossover children with
    /// moderate mutation, then heavy mutants seeded from the archive's
    /// better half. An empty archive (first generation) bootstraps from
    /// the initial genome instead: slot 0 verbatim, the rest lightly
    /// mutated.
    fn compose_population(&mut self) -> Result<Vec<Genome>, GenomeError> {
        let size = self.config.population_size;
        let capacity = self.config.elite_size;
        let bands = self.config.bands.clone();
        let mut population = Vec::with_capacity(size);

        if self.archive.is_empty() {
            population.push(self.initial.clone());
            while population.len() < size {
                population.push(
                    self.rng
                        .mutate(&self.initial, bands.light_rate, bands.light_amount),
                );
            }
            return Ok(population);
        }

        // Band 1: replay elites unmodified; verifies archived scores stay
        // reproducible and shields the champion from evaluation noise.
        for entry in self.archive.entries().iter().take(size) {
            population.push(entry.genome.clone());
        }

        // Band 2: light mutants of elites, cycling the archive.
        let mut cursor = 0usize;
        for _ in 0..capacity {
            if population.len() == size {
                break;
            }
            let entry = &self.archive.entries()[cursor % self.archive.len()];
            cursor += 1;
            population.push(
                self.rng
                    .mutate(&entry.genome, bands.light_rate, bands.light_amount),
            );
        }

        // Band 3: crossover of two random elites plus moderate mutation;
        // with a single archived entry this degenerates to band 2.
        for _ in 0..2 * capacity {
            if population.len() == size {
                break;
            }
            if self.archive.len() < 2 {
                let entry = &self.archive.entries()[cursor % self.archive.len()];
                cursor += 1;
                population.push(
                    self.rng
                        .mutate(&entry.genome, bands.light_rate, bands.light_amount),
                );
                continue;
            }
            let a = &self.archive.entries()[self.rng.index(self.archive.len())];
            let b = &self.archive.entries()[self.rng.index(self.archive.len())];
            let child = self.rng.crossover(&a.genome, &b.genome)?;
            population.push(self.rng.mutate(&child, bands.cross_rate, bands.cross_amount));
        }

        // Band 4: heavy exploration seeded from the better half.
        let half = self.archive.better_half().len();
        while population.len() < size {
            let entry = &self.archive.entries()[self.rng.index(half)];
            let rate = self.rng.uniform(bands.heavy_rate_range);
            population.push(self.rng.mutate(&entry.genome, rate, bands.heavy_amount));
        }

        Ok(population)
    }

    /// Dispatch one generation and wait for the full result set, retrying
    /// once on a fresh pool. The archive is never touched on failure.
    fn evaluate_generation(
        &mut self,
        population: &[Genome],
    ) -> Result<Vec<ScoredGenome>, EvolutionError> {
        let env = self.config.env;
        let episodes = self.config.episodes;
        let threshold = self.config.return_threshold;
        let dispatch =
            |pool: &WorkerPool| pool.evaluate_population(population, env, episodes, threshold);

        match dispatch(&self.pool) {
            Ok(results) => Ok(results),
            Err(first) => {
                warn!(
                    "generation {} evaluation failed ({first}); restarting workers for one retry",
                    self.generation
                );
                self.pool.restart().map_err(|source| {
                    EvolutionError::Generation {
                        generation: self.generation,
                        source,
                    }
                })?;
                dispatch(&self.pool).map_err(|source| EvolutionError::Generation {
                    generation: self.generation,
                    source,
                })
            }
        }
    }

    fn merge_results(&mut self, results: &[ScoredGenome]) {
        let candidates: Vec<EliteEntry> = results
            .iter()
            .filter_map(|result| {
                result.genome.as_ref().map(|genome| EliteEntry {
                    genome: genome.clone(),
                    score: result.score,
                    victory: result.victory,
                    born_at_generation: self.generation,
                })
            })
            .collect();
        debug!(
            "generation {}: merging {} candidates into archive of {}",
            self.generation,
            candidates.len(),
            self.archive.len()
        );
        self.archive.merge_and_trim(candidates);

        *write_lock(&self.champion) = self.archive.champion().map(|e| e.genome.clone());
    }

    fn report(&mut self, results: &[ScoredGenome]) -> GenerationReport {
        let evaluated = results.len();
        self.total_evaluations += evaluated as u64;

        let best_score = results
            .iter()
            .map(|r| r.score)
            .fold(f32::NEG_INFINITY, f32::max);
        let mean_score = if evaluated == 0 {
            0.0
        } else {
            results.iter().map(|r| r.score).sum::<f32>() / evaluated as f32
        };
        let victories = results.iter().filter(|r| r.victory).count();
        let archive_top_score = self.archive.top_score().unwrap_or(f32::NEG_INFINITY);

        if archive_top_score > self.best_score {
            self.best_score = archive_top_score;
            self.stagnation = 0;
        } else {
            self.stagnation += 1;
        }

        GenerationReport {
            generation: self.generation,
            best_score,
            archive_top_score,
            mean_score,
            victories,
            evaluated,
        }
    }

    fn maybe_checkpoint(&self) {
        let Some(path) = self.config.checkpoint_path.as_deref() else {
            return;
        };
        let interval = self.config.checkpoint_interval;
        if interval > 0 && self.generation % interval == 0 {
            self.write_checkpoint(path);
        }
    }

    fn write_checkpoint(&self, path: &str) {
        if let Err(err) = self.archive.checkpoint(self.generation).save(path) {
            warn!("checkpoint write to {path} failed: {err}");
        }
    }
}

/// Caller-facing handle for a spawned run.
pub struct RunHandle {
    stop: Arc<AtomicBool>,
    champion: Arc<RwLock<Option<Genome>>>,
    latest: Arc<RwLock<Option<GenerationReport>>>,
    join: JoinHandle<Result<RunSummary, EvolutionError>>,
}

impl RunHandle {
    /// Ask the run to stop at the next generation boundary. In-flight
    /// evaluation work still runs to completion.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    /// Snapshot of the current champion genome.
    pub fn champion(&self) -> Option<Genome> {
        read_lock(&self.champion).clone()
    }

    /// Latest completed generation's report.
    pub fn latest_report(&self) -> Option<GenerationReport> {
        read_lock(&self.latest).clone()
    }

    /// Wait for the run to finish.
    pub fn join(self) -> Result<RunSummary, EvolutionError> {
        match self.join.join() {
            Ok(result) => result,
            Err(_) => Err(EvolutionError::Panicked),
        }
    }
}

fn read_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}
