//! Progressive difficulty ladder: start on tiny boards and promote the
//! population to larger ones as victories accumulate.

use serde::{Deserialize, Serialize};

use super::EnvConfig;

/// One rung of the difficulty ladder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurriculumLevel {
    /// Display name.
    pub name: String,
    /// Board for this level.
    pub env: EnvConfig,
    /// Victories required to advance past this level.
    pub wins_needed: u32,
}

/// Ordered difficulty levels with promotion tracking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Curriculum {
    levels: Vec<CurriculumLevel>,
    current: usize,
    level_wins: u32,
}

impl Curriculum {
    /// Build a curriculum from an explicit ladder. Empty ladders fall back
    /// to the default.
    pub fn new(levels: Vec<CurriculumLevel>) -> Self {
        if levels.is_empty() {
            return Self::default();
        }
        Self {
            levels,
            current: 0,
            level_wins: 0,
        }
    }

    /// Current level.
    pub fn level(&self) -> &CurriculumLevel {
        &self.levels[self.current]
    }

    /// Final (hardest) level; the policy board is sized for this one so
    /// weights transfer across the whole ladder.
    pub fn final_level(&self) -> &CurriculumLevel {
        &self.levels[self.levels.len() - 1]
    }

    /// Victories recorded on the current level.
    pub fn level_wins(&self) -> u32 {
        self.level_wins
    }

    /// True once the ladder is on its last level.
    pub fn is_final(&self) -> bool {
        self.current + 1 == self.levels.len()
    }

    /// Record one victory. Returns `true` when it triggered promotion to
    /// the next level.
    pub fn record_win(&mut self) -> bool {
        self.level_wins += 1;
        if self.level_wins >= self.level().wins_needed && !self.is_final() {
            self.current += 1;
            self.level_wins = 0;
            return true;
        }
        false
    }

    /// Human-readable progress line for the current level.
    pub fn progress(&self) -> String {
        let level = self.level();
        let pct = 100.0 * self.level_wins as f32 / level.wins_needed.max(1) as f32;
        format!(
            "{} ({}/{} - {:.1}%)",
            level.name, self.level_wins, level.wins_needed, pct
        )
    }

    /// Restart from the first level.
    pub fn reset(&mut self) {
        self.current = 0;
        self.level_wins = 0;
    }
}

impl Default for Curriculum {
    fn default() -> Self {
        let level = |name: &str, rows, cols, mines, wins_needed| CurriculumLevel {
            name: name.to_string(),
            env: EnvConfig { rows, cols, mines },
            wins_needed,
        };
        Self {
            levels: vec![
                level("Baby", 3, 3, 1, 10),
                level("Child", 4, 4, 2, 20),
                level("Youth", 5, 5, 4, 30),
                level("Adult", 6, 6, 6, 40),
                level("Expert", 7, 7, 8, 50),
                level("Master", 9, 9, 10, 100),
            ],
            current: 0,
            level_wins: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn promotion_after_enough_wins() {
        let mut curriculum = Curriculum::default();
        assert_eq!(curriculum.level().name, "Baby");

        for _ in 0..9 {
            assert!(!curriculum.record_win());
        }
        assert!(curriculum.record_win());
        assert_eq!(curriculum.level().name, "Child");
        assert_eq!(curriculum.level_wins(), 0);
    }

    #[test]
    fn final_level_never_promotes() {
        let mut curriculum = Curriculum::new(vec![CurriculumLevel {
            name: "Only".to_string(),
            env: EnvConfig {
                rows: 3,
                cols: 3,
                mines: 1,
            },
            wins_needed: 2,
        }]);
        assert!(curriculum.is_final());
        for _ in 0..10 {
            assert!(!curriculum.record_win());
        }
        assert_eq!(curriculum.level().name, "Only");
    }

    #[test]
    fn default_ladder_ends_at_master_board() {
        let curriculum = Curriculum::default();
        let last = curriculum.final_level();
        assert_eq!((last.env.rows, last.env.cols, last.env.mines), (9, 9, 10));
    }
}
