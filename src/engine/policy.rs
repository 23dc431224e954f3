//! Fixed-topology decision network.
//!
//! The expensive part of a policy is its structure: buffers are allocated
//! once from the topology descriptor and reused for the life of a worker.
//! Per evaluation only the flat weight buffers are swapped in, never the
//! structure.

use crate::schema::{Genome, GenomeError, TopologyDescriptor};

#[derive(Debug, Clone)]
struct DenseLayer {
    inputs: usize,
    outputs: usize,
    /// Row-major `[inputs, outputs]` kernel.
    kernel: Vec<f32>,
    bias: Vec<f32>,
}

/// Dense ReLU stack with a linear output layer, argmax action selection
/// restricted to legal actions.
#[derive(Debug, Clone)]
pub struct PolicyNetwork {
    topology: TopologyDescriptor,
    layers: Vec<DenseLayer>,
    scratch_a: Vec<f32>,
    scratch_b: Vec<f32>,
}

impl PolicyNetwork {
    /// Allocate a network for the given topology with zeroed weights.
    pub fn new(topology: &TopologyDescriptor) -> Self {
        let mut layers = Vec::with_capacity(topology.hidden.len() + 1);
        let mut width = topology.inputs();
        let mut max_width = width;
        for &h in topology.hidden.iter().chain([topology.outputs()].iter()) {
            layers.push(DenseLayer {
                inputs: width,
                outputs: h,
                kernel: vec![0.0; width * h],
                bias: vec![0.0; h],
            });
            width = h;
            max_width = max_width.max(h);
        }

        Self {
            topology: topology.clone(),
            layers,
            scratch_a: vec![0.0; max_width],
            scratch_b: vec![0.0; max_width],
        }
    }

    /// Topology this network was built for.
    pub fn topology(&self) -> &TopologyDescriptor {
        &self.topology
    }

    /// Swap a genome's weights into the preallocated buffers.
    ///
    /// The genome must match the network topology exactly; a mismatched
    /// genome leaves the current weights untouched.
    pub fn load(&mut self, genome: &Genome) -> Result<(), GenomeError> {
        if !genome.matches(&self.topology) {
            return Err(GenomeError::TopologyMismatch);
        }
        for (layer, pair) in self.layers.iter_mut().zip(genome.layers.chunks(2)) {
            layer.kernel.copy_from_slice(&pair[0].data);
            layer.bias.copy_from_slice(&pair[1].data);
        }
        Ok(())
    }

    /// Forward pass over the currently loaded weights. Returns one score
    /// per action (reveal plane then flag plane).
    pub fn forward(&mut self, input: &[f32]) -> &[f32] {
        debug_assert_eq!(input.len(), self.topology.inputs());

        self.scratch_a[..input.len()].copy_from_slice(input);
        let mut width = input.len();
        let last = self.layers.len() - 1;

        for (i, layer) in self.layers.iter().enumerate() {
            debug_assert_eq!(width, layer.inputs);
            for out in 0..layer.outputs {
                let mut acc = layer.bias[out];
                for (inp, &x) in self.scratch_a[..width].iter().enumerate() {
                    acc += x * layer.kernel[inp * layer.outputs + out];
                }
                // Hidden layers are ReLU; the output layer stays linear.
                self.scratch_b[out] = if i < last { acc.max(0.0) } else { acc };
            }
            width = layer.outputs;
            std::mem::swap(&mut self.scratch_a, &mut self.scratch_b);
        }

        &self.scratch_a[..width]
    }

    /// Choose the highest-scoring legal action for an observation, or
    /// `None` when no action is legal. `legal` must cover the full action
    /// space; illegal actions are masked before selection so the policy is
    /// never consulted about them.
    pub fn decide(&mut self, observation: &[f32], legal: &[bool]) -> Option<usize> {
        debug_assert_eq!(legal.len(), self.topology.outputs());
        let scores = self.forward(observation);

        let mut best: Option<(usize, f32)> = None;
        for (action, (&score, &ok)) in scores.iter().zip(legal).enumerate() {
            if !ok {
                continue;
            }
            match best {
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((action, score)),
            }
        }
        best.map(|(action, _)| action)
    }
}
