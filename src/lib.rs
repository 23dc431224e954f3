//! sweeper-evo - Evolutionary search over neural minesweeper policies.
//!
//! This crate evolves the flat weight buffers of a fixed-topology decision
//! network through black-box search: a population of genomes is scored
//! against headless minesweeper episodes by a persistent worker pool, the
//! best candidates are kept in a bounded elite archive, and each new
//! generation is composed from that archive through replay, mutation, and
//! crossover.
//!
//! # Architecture
//!
//! The crate is split into two main modules:
//!
//! - `schema`: configuration, genome, and result types (all serde-backed)
//! - `engine`: the simulation, evaluation, and evolution machinery
//!
//! # Example
//!
//! ```rust,no_run
//! use sweeper_evo::engine::EvolutionManager;
//! use sweeper_evo::schema::{EnvConfig, RunConfig};
//!
//! let config = RunConfig {
//!     env: EnvConfig::easy(),
//!     max_generations: Some(100),
//!     ..Default::default()
//! };
//!
//! let manager = EvolutionManager::new(config).expect("valid config");
//! let handle = manager.spawn().expect("spawn");
//!
//! // The run advances on its own thread; the handle exposes snapshots.
//! if let Some(report) = handle.latest_report() {
//!     println!("archive top score: {:.1}", report.archive_top_score);
//! }
//!
//! let summary = handle.join().expect("run");
//! println!("champion found: {}", summary.champion.is_some());
//! ```

pub mod engine;
pub mod schema;

// Re-export commonly used types
pub use engine::{EliteArchive, EvolutionManager, GenomeRng, PolicyNetwork, RunHandle, WorkerPool};
pub use schema::{EnvConfig, Genome, RunConfig, TopologyDescriptor};
