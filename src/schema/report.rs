//! Result and statistics types produced by an evolution run.

use serde::{Deserialize, Serialize};

use super::Genome;

/// One evaluation outcome as it travels back from a worker.
///
/// Every result carries score and victory; the weight buffer is only
/// attached when the candidate showed genuine promise (victory, or score at
/// or above the run's return threshold). Stripped results can never reach
/// the elite archive, which only admits carried genomes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredGenome {
    /// The evaluated genome, present only above the promotion threshold.
    pub genome: Option<Genome>,
    /// Mean episode reward.
    pub score: f32,
    /// Whether any episode ended in victory.
    pub victory: bool,
    /// Episodes actually played (early-stops on the first victory).
    pub episodes_played: u32,
}

/// Statistics emitted once per completed generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationReport {
    /// Generation number this report describes (0-based).
    pub generation: usize,
    /// Best score among this generation's results.
    pub best_score: f32,
    /// Archive top-1 score after the merge.
    pub archive_top_score: f32,
    /// Mean score across this generation's results.
    pub mean_score: f32,
    /// Victorious evaluations this generation.
    pub victories: usize,
    /// Results gathered this generation.
    pub evaluated: usize,
}

/// Per-generation statistic traces for the whole run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunHistory {
    /// Best score per generation.
    pub best_score: Vec<f32>,
    /// Archive top score per generation.
    pub archive_top_score: Vec<f32>,
    /// Mean score per generation.
    pub mean_score: Vec<f32>,
    /// Victory count per generation.
    pub victories: Vec<usize>,
}

impl RunHistory {
    /// Append one generation's report to the traces.
    pub fn push(&mut self, report: &GenerationReport) {
        self.best_score.push(report.best_score);
        self.archive_top_score.push(report.archive_top_score);
        self.mean_score.push(report.mean_score);
        self.victories.push(report.victories);
    }
}

/// Why a run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// Reached the configured generation limit.
    MaxGenerations,
    /// Archive top score reached the target.
    TargetReached,
    /// No improvement for the configured number of generations.
    Stagnation,
    /// Stop was requested through the handle.
    Cancelled,
}

/// Final summary of an evolution run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Completed generations.
    pub generations: usize,
    /// Best archive score at the end of the run.
    pub best_score: f32,
    /// Total evaluation results gathered.
    pub total_evaluations: u64,
    /// Why the run stopped.
    pub stop_reason: StopReason,
    /// Champion genome, if any generation completed.
    pub champion: Option<Genome>,
    /// Full statistic traces.
    pub history: RunHistory,
    /// Wall-clock duration in seconds.
    pub elapsed_seconds: f64,
}
