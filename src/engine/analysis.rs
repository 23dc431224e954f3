//! Summary statistics over a genome's weight buffers.
//!
//! Used to sanity-check exported champions: a near-zero standard deviation
//! means the weights collapsed to identical values and search has stalled.

use crate::schema::Genome;

/// Stagnation verdict threshold on the weight standard deviation.
const STAGNATION_STD_DEV: f32 = 1e-8;

/// Aggregate statistics over every weight value in a genome.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightStats {
    /// Total weight values inspected.
    pub count: usize,
    /// Mean weight value.
    pub mean: f32,
    /// Population standard deviation.
    pub std_dev: f32,
    /// Smallest weight value.
    pub min: f32,
    /// Largest weight value.
    pub max: f32,
}

impl WeightStats {
    /// Compute statistics over all layers of a genome.
    pub fn from_genome(genome: &Genome) -> Self {
        let count = genome.parameter_count();
        if count == 0 {
            return Self {
                count: 0,
                mean: 0.0,
                std_dev: 0.0,
                min: 0.0,
                max: 0.0,
            };
        }

        let mut sum = 0.0f64;
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        for layer in &genome.layers {
            for &v in &layer.data {
                sum += v as f64;
                min = min.min(v);
                max = max.max(v);
            }
        }
        let mean = (sum / count as f64) as f32;

        let mut sq_sum = 0.0f64;
        for layer in &genome.layers {
            for &v in &layer.data {
                sq_sum += (v as f64 - mean as f64).powi(2);
            }
        }
        let std_dev = (sq_sum / count as f64).sqrt() as f32;

        Self {
            count,
            mean,
            std_dev,
            min,
            max,
        }
    }

    /// True when the weights are effectively identical.
    pub fn is_stagnant(&self) -> bool {
        self.std_dev < STAGNATION_STD_DEV
    }
}
