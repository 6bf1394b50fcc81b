//! Reference evaluator.
//!
//! Computes ground truth for the two-layer sigmoid network:
//!
//! - `hidden = sigmoid(w1 · inputs + b1)`
//! - `output = sigmoid(w2 · hidden + b2)`
//! - `loss = sum((output - label)^2)`
//!
//! The gradients of `loss` w.r.t. `w1`, `b1`, `w2` and `b2` come from a reverse
//! sweep over a [`Tape`], independently of any hand-derived backprop formula.
//!
//! Fixtures are drawn from a single `StdRng` seeded explicitly by the caller.
//! Equal `(shape, seed)` always yields bit-identical tensors.

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::{Error, NetworkShape, Result, Tape, Tensor};

/// The four trainable tensors of the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Param {
    W1,
    B1,
    W2,
    B2,
}

impl Param {
    /// Gradient order: layer by layer, weights before biases.
    pub const ALL: [Param; 4] = [Param::W1, Param::B1, Param::W2, Param::B2];

    /// Field name on the network, e.g. `w1`.
    pub fn name(self) -> &'static str {
        match self {
            Param::W1 => "w1",
            Param::B1 => "b1",
            Param::W2 => "w2",
            Param::B2 => "b2",
        }
    }

    pub fn shape(self, shape: &NetworkShape) -> Vec<usize> {
        match self {
            Param::W1 => shape.w1().to_vec(),
            Param::B1 => shape.b1().to_vec(),
            Param::W2 => shape.w2().to_vec(),
            Param::B2 => shape.b2().to_vec(),
        }
    }

    pub fn is_weight(self) -> bool {
        matches!(self, Param::W1 | Param::W2)
    }

    /// Zero-based layer index (`w1`/`b1` -> 0).
    pub fn layer(self) -> usize {
        match self {
            Param::W1 | Param::B1 => 0,
            Param::W2 | Param::B2 => 1,
        }
    }
}

/// Everything the evaluator consumes: fixture inputs and network parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Fixtures {
    pub inputs: Tensor,
    pub label: Tensor,
    pub w1: Tensor,
    pub b1: Tensor,
    pub w2: Tensor,
    pub b2: Tensor,
}

impl Fixtures {
    /// Draw every fixture uniformly from `[0, 1)`.
    ///
    /// Draw order is `inputs, label, w1, w2, b1, b2`; changing it changes the
    /// generated golden values.
    pub fn random(shape: NetworkShape, seed: u64) -> Result<Self> {
        shape.validate()?;
        let mut rng = StdRng::seed_from_u64(seed);

        let inputs = Tensor::random("inputs", &shape.inputs(), &mut rng)?;
        let label = Tensor::random("label", &shape.label(), &mut rng)?;
        let w1 = Tensor::random("w1", &shape.w1(), &mut rng)?;
        let w2 = Tensor::random("w2", &shape.w2(), &mut rng)?;
        let b1 = Tensor::random("b1", &shape.b1(), &mut rng)?;
        let b2 = Tensor::random("b2", &shape.b2(), &mut rng)?;

        Ok(Self {
            inputs,
            label,
            w1,
            b1,
            w2,
            b2,
        })
    }

    pub fn param(&self, param: Param) -> &Tensor {
        match param {
            Param::W1 => &self.w1,
            Param::B1 => &self.b1,
            Param::W2 => &self.w2,
            Param::B2 => &self.b2,
        }
    }

    /// Copy with one parameter element replaced.
    pub fn with_param_value(&self, param: Param, offset: usize, value: f64) -> Result<Self> {
        let old = self.param(param);
        if offset >= old.numel() {
            return Err(Error::InvalidShape(format!(
                "{}: offset {offset} out of range for {} elements",
                old.name(),
                old.numel()
            )));
        }
        let mut data = old.data().to_vec();
        data[offset] = value;
        let new = Tensor::from_flat(old.name(), old.shape(), data)?;

        let mut out = self.clone();
        match param {
            Param::W1 => out.w1 = new,
            Param::B1 => out.b1 = new,
            Param::W2 => out.w2 = new,
            Param::B2 => out.b2 = new,
        }
        Ok(out)
    }

    /// Infer `(s0, s1, s2)` from the weights and check every tensor against it.
    pub fn network_shape(&self) -> Result<NetworkShape> {
        let [s1, s0] = matrix_dims(&self.w1)?;
        let [s2, _] = matrix_dims(&self.w2)?;
        let shape = NetworkShape::new(s0, s1, s2)?;

        self.inputs.expect_shape(&shape.inputs())?;
        self.label.expect_shape(&shape.label())?;
        for param in Param::ALL {
            self.param(param).expect_shape(&param.shape(&shape))?;
        }
        Ok(shape)
    }
}

fn matrix_dims(t: &Tensor) -> Result<[usize; 2]> {
    match *t.shape() {
        [rows, cols] => Ok([rows, cols]),
        _ => Err(Error::InvalidShape(format!(
            "{}: expected a matrix, got shape {:?}",
            t.name(),
            t.shape()
        ))),
    }
}

/// Ground-truth values and gradients for one fixture set.
#[derive(Debug, Clone, PartialEq)]
pub struct Oracle {
    shape: NetworkShape,
    fixtures: Fixtures,
    hidden: Tensor,
    output: Tensor,
    loss: f64,
    nabla_w1: Tensor,
    nabla_b1: Tensor,
    nabla_w2: Tensor,
    nabla_b2: Tensor,
}

impl Oracle {
    /// Draw fixtures from `seed` and evaluate them.
    pub fn evaluate(shape: NetworkShape, seed: u64) -> Result<Self> {
        let oracle = Self::from_fixtures(Fixtures::random(shape, seed)?)?;
        tracing::debug!(
            s0 = shape.s0,
            s1 = shape.s1,
            s2 = shape.s2,
            seed,
            loss = oracle.loss,
            "oracle evaluated"
        );
        Ok(oracle)
    }

    /// Evaluate an explicit fixture set.
    pub fn from_fixtures(fixtures: Fixtures) -> Result<Self> {
        let shape = fixtures.network_shape()?;
        let NetworkShape { s0, s1, s2 } = shape;

        let mut tape = Tape::new();
        let x = tape.leaf(fixtures.inputs.data());
        let t = tape.leaf(fixtures.label.data());
        let w1 = tape.leaf(fixtures.w1.data());
        let b1 = tape.leaf(fixtures.b1.data());
        let w2 = tape.leaf(fixtures.w2.data());
        let b2 = tape.leaf(fixtures.b2.data());

        let z1 = tape.matvec(w1, s1, s0, x);
        let a1 = tape.add(z1, b1);
        let hidden = tape.sigmoid(a1);
        let z2 = tape.matvec(w2, s2, s1, hidden);
        let a2 = tape.add(z2, b2);
        let output = tape.sigmoid(a2);
        let loss = tape.squared_error_sum(output, t);

        let mut grads = tape.backward(loss);

        let oracle = Self {
            shape,
            hidden: Tensor::from_flat("hidden", &[s1], tape.value(hidden).to_vec())?,
            output: Tensor::from_flat("output", &[s2], tape.value(output).to_vec())?,
            loss: tape.value(loss)[0],
            nabla_w1: Tensor::from_flat("nabla_w1", &shape.w1(), grads.take(w1))?,
            nabla_b1: Tensor::from_flat("nabla_b1", &shape.b1(), grads.take(b1))?,
            nabla_w2: Tensor::from_flat("nabla_w2", &shape.w2(), grads.take(w2))?,
            nabla_b2: Tensor::from_flat("nabla_b2", &shape.b2(), grads.take(b2))?,
            fixtures,
        };
        Ok(oracle)
    }

    #[inline]
    pub fn shape(&self) -> NetworkShape {
        self.shape
    }

    #[inline]
    pub fn fixtures(&self) -> &Fixtures {
        &self.fixtures
    }

    #[inline]
    pub fn inputs(&self) -> &Tensor {
        &self.fixtures.inputs
    }

    #[inline]
    pub fn label(&self) -> &Tensor {
        &self.fixtures.label
    }

    #[inline]
    pub fn param(&self, param: Param) -> &Tensor {
        self.fixtures.param(param)
    }

    #[inline]
    pub fn hidden(&self) -> &Tensor {
        &self.hidden
    }

    #[inline]
    pub fn output(&self) -> &Tensor {
        &self.output
    }

    #[inline]
    pub fn loss(&self) -> f64 {
        self.loss
    }

    /// `dloss/dparam`, same shape as the parameter.
    pub fn gradient(&self, param: Param) -> &Tensor {
        match param {
            Param::W1 => &self.nabla_w1,
            Param::B1 => &self.nabla_b1,
            Param::W2 => &self.nabla_w2,
            Param::B2 => &self.nabla_b2,
        }
    }
}
