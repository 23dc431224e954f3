//! Genome representation: flat per-layer weight buffers plus the fixed
//! network topology they must conform to.

use serde::{Deserialize, Serialize};

/// Observation channels per board cell (value, hidden, flagged).
pub const OBS_CHANNELS: usize = 3;

/// Action planes per board cell (reveal, flag).
pub const ACTION_PLANES: usize = 2;

/// Default hidden layer widths for the policy network.
pub const DEFAULT_HIDDEN: [usize; 2] = [128, 64];

/// One trainable layer's weights: a shape and a flat row-major buffer.
///
/// Invariant: `data.len() == shape.iter().product()`. Construct through
/// [`LayerWeights::new`] to keep it that way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerWeights {
    /// Ordered dimensions of the buffer (e.g. `[inputs, outputs]` for a
    /// dense kernel, `[outputs]` for a bias).
    pub shape: Vec<usize>,
    /// Flat weight values, length equal to the product of `shape`.
    pub data: Vec<f32>,
}

impl LayerWeights {
    /// Create a layer, checking the shape/data-length invariant.
    pub fn new(shape: Vec<usize>, data: Vec<f32>) -> Result<Self, GenomeError> {
        let expected: usize = shape.iter().product();
        if data.len() != expected {
            return Err(GenomeError::LengthMismatch {
                len: data.len(),
                expected,
            });
        }
        Ok(Self { shape, data })
    }

    /// Zero-filled layer of the given shape.
    pub fn zeros(shape: Vec<usize>) -> Self {
        let len = shape.iter().product();
        Self {
            shape,
            data: vec![0.0; len],
        }
    }

    /// Number of weight values in this layer.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True when the layer holds no values.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// An ordered set of layer weight buffers representing one candidate policy.
///
/// Genomes are value types: genetic operators always produce new genomes and
/// never mutate their inputs, so concurrent readers never observe partial
/// writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Genome {
    /// One entry per trainable layer, in network order.
    pub layers: Vec<LayerWeights>,
}

impl Genome {
    /// Zero-filled genome for the given topology.
    pub fn zeros(topology: &TopologyDescriptor) -> Self {
        Self {
            layers: topology
                .layer_shapes()
                .into_iter()
                .map(LayerWeights::zeros)
                .collect(),
        }
    }

    /// True when this genome's layer shapes equal the topology's.
    pub fn matches(&self, topology: &TopologyDescriptor) -> bool {
        let shapes = topology.layer_shapes();
        self.layers.len() == shapes.len()
            && self
                .layers
                .iter()
                .zip(&shapes)
                .all(|(layer, shape)| layer.shape == *shape)
    }

    /// True when two genomes share the same ordered layer shapes.
    pub fn same_shapes(&self, other: &Genome) -> bool {
        self.layers.len() == other.layers.len()
            && self
                .layers
                .iter()
                .zip(&other.layers)
                .all(|(a, b)| a.shape == b.shape)
    }

    /// Total number of weight values across all layers.
    pub fn parameter_count(&self) -> usize {
        self.layers.iter().map(LayerWeights::len).sum()
    }
}

/// The fixed structural description shared by every genome in a run: the
/// board the policy is sized for plus its hidden layer widths.
///
/// The network is a dense stack: `cells * OBS_CHANNELS` inputs, the hidden
/// widths in order (ReLU), and `cells * ACTION_PLANES` linear outputs (a
/// reveal plane followed by a flag plane).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyDescriptor {
    /// Board rows the policy observes.
    pub rows: usize,
    /// Board columns the policy observes.
    pub cols: usize,
    /// Hidden layer widths.
    pub hidden: Vec<usize>,
}

impl TopologyDescriptor {
    /// Topology sized for a `rows x cols` board with the default hidden stack.
    pub fn for_board(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            hidden: DEFAULT_HIDDEN.to_vec(),
        }
    }

    /// Cells on the board this topology observes.
    pub fn cells(&self) -> usize {
        self.rows * self.cols
    }

    /// Width of the input layer.
    pub fn inputs(&self) -> usize {
        self.cells() * OBS_CHANNELS
    }

    /// Width of the output layer.
    pub fn outputs(&self) -> usize {
        self.cells() * ACTION_PLANES
    }

    /// Ordered layer shapes: a `[in, out]` kernel and `[out]` bias per dense
    /// layer. This sequence is immutable for the lifetime of a run.
    pub fn layer_shapes(&self) -> Vec<Vec<usize>> {
        let mut shapes = Vec::with_capacity((self.hidden.len() + 1) * 2);
        let mut width = self.inputs();
        for &h in &self.hidden {
            shapes.push(vec![width, h]);
            shapes.push(vec![h]);
            width = h;
        }
        shapes.push(vec![width, self.outputs()]);
        shapes.push(vec![self.outputs()]);
        shapes
    }

    /// Total number of trainable parameters.
    pub fn parameter_count(&self) -> usize {
        self.layer_shapes()
            .iter()
            .map(|s| s.iter().product::<usize>())
            .sum()
    }
}

/// Genome construction and validation errors.
#[derive(Debug, thiserror::Error)]
pub enum GenomeError {
    #[error("layer data length {len} does not match shape product {expected}")]
    LengthMismatch { len: usize, expected: usize },
    #[error("genome layer shapes do not match the run topology")]
    TopologyMismatch,
}
