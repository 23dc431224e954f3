//! Genetic operators over flat weight-buffer genomes.
//!
//! Provides random initialization, crossover, and mutation. All operators
//! are pure: they allocate new genomes and never touch their inputs.

use rand::prelude::*;

use crate::schema::{Genome, GenomeError, LayerWeights, TopologyDescriptor};

/// Random number generator wrapper for genome operations.
pub struct GenomeRng {
    rng: StdRng,
}

enum CrossoverScheme {
    Uniform,
    OnePoint,
}

impl GenomeRng {
    /// Create from seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Create with random seed.
    pub fn random() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Generate next u64 for seeding child RNGs.
    pub fn next_seed(&mut self) -> u64 {
        self.rng.next_u64()
    }

    /// Uniform random in bounds (inclusive).
    pub fn uniform(&mut self, bounds: (f32, f32)) -> f32 {
        self.rng.gen_range(bounds.0..=bounds.1)
    }

    /// Uniform random index below `len`.
    pub fn index(&mut self, len: usize) -> usize {
        self.rng.gen_range(0..len)
    }

    /// Random genome for a topology: scaled normal kernels, zero biases.
    pub fn random_genome(&mut self, topology: &TopologyDescriptor) -> Genome {
        let layers = topology
            .layer_shapes()
            .into_iter()
            .map(|shape| {
                if shape.len() == 2 {
                    // Kernel: scale by fan-in so deep stacks stay well
                    // conditioned at initialization.
                    let std_dev = (2.0 / shape[0] as f32).sqrt();
                    let len = shape.iter().product();
                    let data = (0..len)
                        .map(|_| {
                            let noise: f32 = self.rng.sample(rand_distr::StandardNormal);
                            noise * std_dev
                        })
                        .collect();
                    LayerWeights { shape, data }
                } else {
                    LayerWeights::zeros(shape)
                }
            })
            .collect();
        Genome { layers }
    }

    /// Perform crossover between two genomes of identical topology.
    ///
    /// The scheme is picked per call by an unbiased coin flip: either
    /// per-element uniform inheritance, or one-point inheritance with the
    /// cut drawn uniformly per layer. Mixing both schemes yields more
    /// structural diversity than either alone.
    pub fn crossover(&mut self, parent_a: &Genome, parent_b: &Genome) -> Result<Genome, GenomeError> {
        if !parent_a.same_shapes(parent_b) {
            return Err(GenomeError::TopologyMismatch);
        }

        let scheme = if self.rng.gen_bool(0.5) {
            CrossoverScheme::Uniform
        } else {
            CrossoverScheme::OnePoint
        };

        let layers = parent_a
            .layers
            .iter()
            .zip(&parent_b.layers)
            .map(|(a, b)| {
                let data = match scheme {
                    CrossoverScheme::Uniform => a
                        .data
                        .iter()
                        .zip(&b.data)
                        .map(|(&x, &y)| if self.rng.gen_bool(0.5) { x } else { y })
                        .collect(),
                    CrossoverScheme::OnePoint => {
                        let cut = if a.data.is_empty() {
                            0
                        } else {
                            self.rng.gen_range(0..a.data.len())
                        };
                        let mut data = Vec::with_capacity(a.data.len());
                        data.extend_from_slice(&a.data[..cut]);
                        data.extend_from_slice(&b.data[cut..]);
                        data
                    }
                };
                LayerWeights {
                    shape: a.shape.clone(),
                    data,
                }
            })
            .collect();

        Ok(Genome { layers })
    }

    /// Mutate a genome: each element is perturbed with probability `rate`
    /// by symmetric uniform noise in `[-amount, +amount]`. Resulting weight
    /// magnitudes are not clamped. `rate = 0` returns a value-identical
    /// fresh copy.
    pub fn mutate(&mut self, genome: &Genome, rate: f32, amount: f32) -> Genome {
        let layers = genome
            .layers
            .iter()
            .map(|layer| {
                let mut data = layer.data.clone();
                if rate > 0.0 {
                    for value in &mut data {
                        if self.rng.gen_range(0.0..1.0f32) < rate {
                            *value += self.rng.gen_range(-amount..=amount);
                        }
                    }
                }
                LayerWeights {
                    shape: layer.shape.clone(),
                    data,
                }
            })
            .collect();
        Genome { layers }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topology() -> TopologyDescriptor {
        TopologyDescriptor {
            rows: 2,
            cols: 3,
            hidden: vec![5],
        }
    }

    #[test]
    fn random_genome_matches_topology() {
        let mut rng = GenomeRng::new(42);
        let genome = rng.random_genome(&topology());
        assert!(genome.matches(&topology()));
        // Biases start at zero, kernels do not (with overwhelming odds).
        assert!(genome.layers[1].data.iter().all(|&v| v == 0.0));
        assert!(genome.layers[0].data.iter().any(|&v| v != 0.0));
    }

    #[test]
    fn crossover_preserves_shapes_and_parents() {
        let mut rng = GenomeRng::new(42);
        let a = rng.random_genome(&topology());
        let b = rng.random_genome(&topology());
        let a_copy = a.clone();
        let b_copy = b.clone();

        for _ in 0..8 {
            let child = rng.crossover(&a, &b).expect("same topology");
            assert!(child.same_shapes(&a));
            // Every element comes from one of the parents.
            for (layer, (la, lb)) in child.layers.iter().zip(a.layers.iter().zip(&b.layers)) {
                for (i, &v) in layer.data.iter().enumerate() {
                    assert!(v == la.data[i] || v == lb.data[i]);
                }
            }
        }

        assert_eq!(a, a_copy);
        assert_eq!(b, b_copy);
    }

    #[test]
    fn crossover_rejects_mismatched_topologies() {
        let mut rng = GenomeRng::new(1);
        let a = rng.random_genome(&topology());
        let b = rng.random_genome(&TopologyDescriptor::for_board(4, 4));
        assert!(rng.crossover(&a, &b).is_err());
    }

    #[test]
    fn zero_rate_mutation_is_identity_copy() {
        let mut rng = GenomeRng::new(42);
        let genome = rng.random_genome(&topology());
        let copy = rng.mutate(&genome, 0.0, 0.5);
        assert_eq!(genome, copy);
        // Fresh allocation, not an alias.
        assert!(!std::ptr::eq(
            genome.layers[0].data.as_ptr(),
            copy.layers[0].data.as_ptr()
        ));
    }

    #[test]
    fn zero_amount_mutation_is_a_noop_perturbation() {
        let mut rng = GenomeRng::new(42);
        let genome = rng.random_genome(&topology());
        let copy = rng.mutate(&genome, 1.0, 0.0);
        assert_eq!(genome, copy);
    }

    #[test]
    fn full_rate_mutation_changes_values() {
        let mut rng = GenomeRng::new(42);
        let genome = rng.random_genome(&topology());
        let mutant = rng.mutate(&genome, 1.0, 0.5);
        let changed = genome
            .layers
            .iter()
            .zip(&mutant.layers)
            .flat_map(|(a, b)| a.data.iter().zip(&b.data))
            .filter(|(a, b)| a != b)
            .count();
        assert!(changed > genome.parameter_count() / 2);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn crossover_child_shapes_equal_parents(
                rows in 1usize..4,
                cols in 1usize..4,
                seed in any::<u64>(),
            ) {
                let topology = TopologyDescriptor { rows, cols, hidden: vec![6, 3] };
                let mut rng = GenomeRng::new(seed);
                let a = rng.random_genome(&topology);
                let b = rng.random_genome(&topology);
                let child = rng.crossover(&a, &b).expect("same topology");
                for (layer, shape) in child.layers.iter().zip(topology.layer_shapes()) {
                    prop_assert_eq!(&layer.shape, &shape);
                    prop_assert_eq!(layer.data.len(), shape.iter().product::<usize>());
                }
            }

            #[test]
            fn mutation_preserves_shapes(
                seed in any::<u64>(),
                rate in 0.0f32..=1.0,
                amount in 0.0f32..=1.0,
            ) {
                let topology = TopologyDescriptor { rows: 2, cols: 2, hidden: vec![4] };
                let mut rng = GenomeRng::new(seed);
                let genome = rng.random_genome(&topology);
                let mutant = rng.mutate(&genome, rate, amount);
                prop_assert!(mutant.same_shapes(&genome));
            }
        }
    }
}
