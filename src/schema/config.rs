//! Run and environment configuration types.

use serde::{Deserialize, Serialize};

use super::TopologyDescriptor;

/// Board sizing for the simulated minesweeper environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvConfig {
    /// Board rows.
    pub rows: usize,
    /// Board columns.
    pub cols: usize,
    /// Mines planted per episode.
    pub mines: usize,
}

impl EnvConfig {
    /// Classic beginner board: 9x9 with 10 mines.
    pub fn easy() -> Self {
        Self {
            rows: 9,
            cols: 9,
            mines: 10,
        }
    }

    /// Intermediate board: 16x16 with 40 mines.
    pub fn medium() -> Self {
        Self {
            rows: 16,
            cols: 16,
            mines: 40,
        }
    }

    /// Expert board: 16x30 with 99 mines.
    pub fn hard() -> Self {
        Self {
            rows: 16,
            cols: 30,
            mines: 99,
        }
    }

    /// Total cells on the board.
    pub fn cells(&self) -> usize {
        self.rows * self.cols
    }

    /// Check board dimensions and mine count.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rows == 0 || self.cols == 0 {
            return Err(ConfigError::InvalidDimensions);
        }
        if self.mines >= self.cells() {
            return Err(ConfigError::TooManyMines {
                mines: self.mines,
                cells: self.cells(),
            });
        }
        Ok(())
    }
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self::easy()
    }
}

/// Mutation parameters for the population composition bands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BandConfig {
    /// Per-element mutation probability for light elite mutants.
    #[serde(default = "default_light_rate")]
    pub light_rate: f32,
    /// Perturbation magnitude for light elite mutants.
    #[serde(default = "default_light_amount")]
    pub light_amount: f32,
    /// Per-element mutation probability applied after crossover.
    #[serde(default = "default_cross_rate")]
    pub cross_rate: f32,
    /// Perturbation magnitude applied after crossover.
    #[serde(default = "default_cross_amount")]
    pub cross_amount: f32,
    /// Mutation probability range for the heavy exploration band.
    #[serde(default = "default_heavy_rate_range")]
    pub heavy_rate_range: (f32, f32),
    /// Perturbation magnitude for the heavy exploration band.
    #[serde(default = "default_heavy_amount")]
    pub heavy_amount: f32,
}

impl Default for BandConfig {
    fn default() -> Self {
        Self {
            light_rate: default_light_rate(),
            light_amount: default_light_amount(),
            cross_rate: default_cross_rate(),
            cross_amount: default_cross_amount(),
            heavy_rate_range: default_heavy_rate_range(),
            heavy_amount: default_heavy_amount(),
        }
    }
}

fn default_light_rate() -> f32 {
    0.05
}
fn default_light_amount() -> f32 {
    0.1
}
fn default_cross_rate() -> f32 {
    0.10
}
fn default_cross_amount() -> f32 {
    0.15
}
fn default_heavy_rate_range() -> (f32, f32) {
    (0.15, 0.30)
}
fn default_heavy_amount() -> f32 {
    0.3
}

/// Top-level configuration for one evolution run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Environment the population is evaluated against.
    #[serde(default)]
    pub env: EnvConfig,
    /// Board the policy network is sized for. Defaults to the environment
    /// board; set larger when a smaller curriculum board should be played
    /// with input padding so weights transfer across levels.
    #[serde(default)]
    pub policy_board: Option<(usize, usize)>,
    /// Evaluation slots per generation.
    #[serde(default = "default_population_size")]
    pub population_size: usize,
    /// Elite archive capacity.
    #[serde(default = "default_elite_size")]
    pub elite_size: usize,
    /// Worker threads. `0` resolves from hardware parallelism.
    #[serde(default)]
    pub worker_count: usize,
    /// Episodes played per evaluation (stops early on the first victory).
    #[serde(default = "default_episodes")]
    pub episodes: u32,
    /// Minimum score for a non-winning result to carry its weight buffer
    /// back to the manager.
    #[serde(default = "default_return_threshold")]
    pub return_threshold: f32,
    /// Seconds to wait for a dispatched batch before declaring the worker
    /// unresponsive.
    #[serde(default = "default_batch_timeout_secs")]
    pub batch_timeout_secs: u64,
    /// Composition band parameters.
    #[serde(default)]
    pub bands: BandConfig,
    /// Stop after this many generations.
    #[serde(default)]
    pub max_generations: Option<usize>,
    /// Stop once the archive top score reaches this value.
    #[serde(default)]
    pub target_score: Option<f32>,
    /// Stop after this many generations without improvement.
    #[serde(default)]
    pub stagnation_limit: Option<usize>,
    /// Write an archive checkpoint to this path on the checkpoint interval.
    #[serde(default)]
    pub checkpoint_path: Option<String>,
    /// Generations between checkpoint writes.
    #[serde(default = "default_checkpoint_interval")]
    pub checkpoint_interval: usize,
    /// Seed for all run randomness. `None` draws one from entropy.
    #[serde(default)]
    pub random_seed: Option<u64>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            env: EnvConfig::default(),
            policy_board: None,
            population_size: default_population_size(),
            elite_size: default_elite_size(),
            worker_count: 0,
            episodes: default_episodes(),
            return_threshold: default_return_threshold(),
            batch_timeout_secs: default_batch_timeout_secs(),
            bands: BandConfig::default(),
            max_generations: None,
            target_score: None,
            stagnation_limit: None,
            checkpoint_path: None,
            checkpoint_interval: default_checkpoint_interval(),
            random_seed: None,
        }
    }
}

fn default_population_size() -> usize {
    200
}
fn default_elite_size() -> usize {
    10
}
fn default_episodes() -> u32 {
    3
}
fn default_return_threshold() -> f32 {
    500.0
}
fn default_batch_timeout_secs() -> u64 {
    300
}
fn default_checkpoint_interval() -> usize {
    5
}

impl RunConfig {
    /// Topology for this run: the policy board when set, else the
    /// environment board.
    pub fn topology(&self) -> TopologyDescriptor {
        let (rows, cols) = self.policy_board.unwrap_or((self.env.rows, self.env.cols));
        TopologyDescriptor::for_board(rows, cols)
    }

    /// Validate the full run configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.env.validate()?;
        if self.population_size == 0 {
            return Err(ConfigError::EmptyPopulation);
        }
        if self.elite_size == 0 {
            return Err(ConfigError::EmptyArchive);
        }
        if let Some((rows, cols)) = self.policy_board {
            if rows < self.env.rows || cols < self.env.cols {
                return Err(ConfigError::BoardExceedsPolicy {
                    env: (self.env.rows, self.env.cols),
                    policy: (rows, cols),
                });
            }
        }
        if self.episodes == 0 {
            return Err(ConfigError::NoEpisodes);
        }
        let check_rate = |rate: f32, name: &str| {
            if (0.0..=1.0).contains(&rate) {
                Ok(())
            } else {
                Err(ConfigError::InvalidRate {
                    name: name.to_string(),
                    rate,
                })
            }
        };
        check_rate(self.bands.light_rate, "light_rate")?;
        check_rate(self.bands.cross_rate, "cross_rate")?;
        check_rate(self.bands.heavy_rate_range.0, "heavy_rate_range.min")?;
        check_rate(self.bands.heavy_rate_range.1, "heavy_rate_range.max")?;
        if self.bands.heavy_rate_range.0 > self.bands.heavy_rate_range.1 {
            return Err(ConfigError::InvalidRateRange {
                min: self.bands.heavy_rate_range.0,
                max: self.bands.heavy_rate_range.1,
            });
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("board dimensions must be non-zero")]
    InvalidDimensions,
    #[error("{mines} mines do not fit a board of {cells} cells")]
    TooManyMines { mines: usize, cells: usize },
    #[error("population size must be non-zero")]
    EmptyPopulation,
    #[error("elite archive capacity must be non-zero")]
    EmptyArchive,
    #[error("environment board {env:?} exceeds the policy board {policy:?}")]
    BoardExceedsPolicy {
        env: (usize, usize),
        policy: (usize, usize),
    },
    #[error("episodes per evaluation must be non-zero")]
    NoEpisodes,
    #[error("{name} must be within [0, 1], got {rate}")]
    InvalidRate { name: String, rate: f32 },
    #[error("heavy mutation rate range min ({min}) > max ({max})")]
    InvalidRateRange { min: f32, max: f32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_valid() {
        assert!(RunConfig::default().validate().is_ok());
    }

    #[test]
    fn presets_are_valid() {
        for env in [EnvConfig::easy(), EnvConfig::medium(), EnvConfig::hard()] {
            assert!(env.validate().is_ok());
        }
    }

    #[test]
    fn mine_count_bounded_by_cells() {
        let env = EnvConfig {
            rows: 3,
            cols: 3,
            mines: 9,
        };
        assert!(env.validate().is_err());
    }

    #[test]
    fn policy_board_must_cover_env() {
        let config = RunConfig {
            env: EnvConfig::easy(),
            policy_board: Some((4, 4)),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn serde_roundtrip_with_defaults() {
        let parsed: RunConfig = serde_json::from_str("{}").expect("defaults parse");
        assert_eq!(parsed.population_size, 200);
        assert_eq!(parsed.elite_size, 10);
        assert_eq!(parsed.bands.heavy_rate_range, (0.15, 0.30));

        let json = serde_json::to_string(&RunConfig::default()).expect("serialize");
        let back: RunConfig = serde_json::from_str(&json).expect("roundtrip");
        assert_eq!(back.return_threshold, 500.0);
    }
}
