//! Environment adapter: runs one genome through simulated episodes and
//! produces its fitness result.

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::schema::{EnvConfig, Genome, GenomeError, OBS_CHANNELS};

use super::board::Board;
use super::policy::PolicyNetwork;

/// Step budget per episode, as a multiple of the board's cell count.
pub const STEP_BUDGET_FACTOR: usize = 2;

/// Scale of the victory efficiency bonus (`cells / steps` taken).
pub const VICTORY_BONUS_SCALE: f32 = 100.0;

/// Fitness outcome of evaluating one genome.
#[derive(Debug, Clone)]
pub struct EvaluationResult {
    /// The genome that was evaluated.
    pub genome: Genome,
    /// Mean episode reward over the episodes played.
    pub score: f32,
    /// Whether any episode ended in victory.
    pub victory: bool,
    /// Episodes actually played.
    pub episodes_played: u32,
}

/// Evaluates genomes against a fixed environment configuration.
///
/// The environment board may be smaller than the policy board (curriculum
/// levels); observations are zero-padded into the policy's input space and
/// out-of-board actions are masked illegal, so one set of weights carries
/// across board sizes.
#[derive(Debug)]
pub struct Evaluator {
    env: EnvConfig,
    episodes: u32,
    rng: StdRng,
}

impl Evaluator {
    /// Adapter over `env`, playing up to `episodes` episodes per genome.
    pub fn new(env: EnvConfig, episodes: u32, seed: u64) -> Self {
        Self {
            env,
            episodes: episodes.max(1),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Environment this adapter evaluates against.
    pub fn env(&self) -> &EnvConfig {
        &self.env
    }

    /// Load the genome and play episodes until the budget or the first
    /// victory. A lost episode is a scoreable outcome, never an error.
    pub fn evaluate(
        &mut self,
        policy: &mut PolicyNetwork,
        genome: &Genome,
    ) -> Result<EvaluationResult, GenomeError> {
        policy.load(genome)?;

        let mut total = 0.0;
        let mut victory = false;
        let mut episodes_played = 0u32;

        for _ in 0..self.episodes {
            let (score, won) = self.play_episode(policy);
            total += score;
            episodes_played += 1;
            if won {
                victory = true;
                break;
            }
        }

        Ok(EvaluationResult {
            genome: genome.clone(),
            score: total / episodes_played as f32,
            victory,
            episodes_played,
        })
    }

    fn play_episode(&mut self, policy: &mut PolicyNetwork) -> (f32, bool) {
        let mut board = Board::new(&self.env, &mut self.rng);
        let topology = policy.topology().clone();
        let budget = self.env.cells() * STEP_BUDGET_FACTOR;

        let mut observation = vec![0.0f32; topology.inputs()];
        let mut legal = vec![false; topology.outputs()];
        let mut score = 0.0;
        let mut steps = 0usize;

        while !board.is_terminal() && steps < budget {
            self.fill_observation(&board, topology.cols, &mut observation);
            self.fill_mask(&board, topology.rows, topology.cols, &mut legal);

            let Some(action) = policy.decide(&observation, &legal) else {
                break;
            };

            let cells = topology.rows * topology.cols;
            let flag = action >= cells;
            let idx = action % cells;
            let (row, col) = (idx / topology.cols, idx % topology.cols);

            let outcome = board.step(row, col, flag);
            score += outcome.reward;
            steps += 1;
        }

        if board.victory() {
            // Efficiency bonus: solving in fewer steps pays more.
            score += VICTORY_BONUS_SCALE * self.env.cells() as f32 / steps.max(1) as f32;
        }

        (score, board.victory())
    }

    /// Scatter the environment observation into the (possibly larger)
    /// policy input space; cells outside the board stay zero.
    fn fill_observation(&self, board: &Board, policy_cols: usize, out: &mut [f32]) {
        out.fill(0.0);
        let env_obs = board.observe();
        for r in 0..board.rows() {
            for c in 0..board.cols() {
                let src = (r * board.cols() + c) * OBS_CHANNELS;
                let dst = (r * policy_cols + c) * OBS_CHANNELS;
                out[dst..dst + OBS_CHANNELS].copy_from_slice(&env_obs[src..src + OBS_CHANNELS]);
            }
        }
    }

    /// Legal actions: both planes of any unrevealed in-board cell.
    fn fill_mask(&self, board: &Board, policy_rows: usize, policy_cols: usize, out: &mut [bool]) {
        out.fill(false);
        let cells = policy_rows * policy_cols;
        for r in 0..board.rows() {
            for c in 0..board.cols() {
                if !board.is_revealed(r, c) {
                    let idx = r * policy_cols + c;
                    out[idx] = true;
                    out[idx + cells] = true;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::operators::GenomeRng;
    use crate::schema::TopologyDescriptor;

    #[test]
    fn first_step_victory_plays_one_episode() {
        // A mine-free board terminates with victory on the first reveal.
        let env = EnvConfig {
            rows: 3,
            cols: 3,
            mines: 0,
        };
        let topology = TopologyDescriptor::for_board(3, 3);
        let mut policy = PolicyNetwork::new(&topology);
        let genome = Genome::zeros(&topology);

        let mut evaluator = Evaluator::new(env, 5, 42);
        let result = evaluator
            .evaluate(&mut policy, &genome)
            .expect("topology matches");

        assert!(result.victory);
        assert_eq!(result.episodes_played, 1);
        assert!(result.score > 0.0);
    }

    #[test]
    fn loss_is_a_scoreable_outcome() {
        // Dense mines: losing quickly is expected, and must not error.
        let env = EnvConfig {
            rows: 3,
            cols: 3,
            mines: 8,
        };
        let topology = TopologyDescriptor::for_board(3, 3);
        let mut policy = PolicyNetwork::new(&topology);
        let mut rng = GenomeRng::new(9);
        let genome = rng.random_genome(&topology);

        let mut evaluator = Evaluator::new(env, 2, 42);
        let result = evaluator
            .evaluate(&mut policy, &genome)
            .expect("losses must not error");
        if result.victory {
            assert!(result.episodes_played <= 2);
        } else {
            assert_eq!(result.episodes_played, 2);
        }
    }

    #[test]
    fn mismatched_genome_is_an_error() {
        let env = EnvConfig {
            rows: 3,
            cols: 3,
            mines: 1,
        };
        let mut policy = PolicyNetwork::new(&TopologyDescriptor::for_board(3, 3));
        let genome = Genome::zeros(&TopologyDescriptor::for_board(4, 4));
        let mut evaluator = Evaluator::new(env, 1, 0);
        assert!(evaluator.evaluate(&mut policy, &genome).is_err());
    }

    #[test]
    fn smaller_board_plays_through_padded_policy() {
        // 3x3 curriculum level against a 9x9 master policy.
        let env = EnvConfig {
            rows: 3,
            cols: 3,
            mines: 0,
        };
        let topology = TopologyDescriptor::for_board(9, 9);
        let mut policy = PolicyNetwork::new(&topology);
        let genome = Genome::zeros(&topology);

        let mut evaluator = Evaluator::new(env, 1, 17);
        let result = evaluator
            .evaluate(&mut policy, &genome)
            .expect("topology matches");
        // Zero weights pick the first legal action, which is always an
        // in-board reveal; the mine-free board then cascades to victory.
        assert!(result.victory);
    }
}
