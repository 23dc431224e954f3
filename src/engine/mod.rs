//! Engine module - the evolutionary optimization core.
//!
//! The pieces, leaves first:
//!
//! - **Board** (`board`): headless minesweeper simulation
//! - **Policy** (`policy`): fixed-topology decision network with weight swapping
//! - **Evaluator** (`evaluate`): genome -> fitness over simulated episodes
//! - **Operators** (`operators`): random init, crossover, mutation
//! - **Elite Archive** (`archive`): bounded best-of-run selection
//! - **Worker Pool** (`pool`): persistent parallel evaluation contexts
//! - **Manager** (`manager`): the generation loop tying it all together
//! - **Analysis** (`analysis`): weight statistics for exported champions
//!
//! # Example
//!
//! ```rust,no_run
//! use sweeper_evo::engine::EvolutionManager;
//! use sweeper_evo::schema::RunConfig;
//!
//! let config = RunConfig {
//!     max_generations: Some(10),
//!     ..Default::default()
//! };
//! let mut manager = EvolutionManager::new(config).expect("valid config");
//! let summary = manager
//!     .run_with_callback(|report| {
//!         println!(
//!             "generation {}: best {:.1}, archive top {:.1}",
//!             report.generation, report.best_score, report.archive_top_score
//!         );
//!     })
//!     .expect("run");
//! println!("stopped after {} generations", summary.generations);
//! ```

mod analysis;
mod archive;
mod board;
mod evaluate;
mod manager;
mod operators;
mod policy;
mod pool;

pub use analysis::WeightStats;
pub use archive::{Checkpoint, EliteArchive, EliteEntry};
pub use board::{Board, StepOutcome};
pub use evaluate::{EvaluationResult, Evaluator, STEP_BUDGET_FACTOR, VICTORY_BONUS_SCALE};
pub use manager::{EvolutionError, EvolutionManager, RunHandle};
pub use operators::GenomeRng;
pub use policy::PolicyNetwork;
pub use pool::{MAX_WORKERS, PoolError, WorkerCommand, WorkerPool, resolve_worker_count};
