//! Differential test-oracle generator for a hand-written two-layer sigmoid network.
//!
//! `backprop-oracle` computes what a correct implementation of
//!
//! ```text
//! hidden = sigmoid(w1 · inputs + b1)
//! output = sigmoid(w2 · hidden + b2)
//! loss   = sum((output - label)^2)
//! ```
//!
//! must return: the loss and the gradients w.r.t. `w1`, `b1`, `w2`, `b2`. It then
//! emits a C test routine that loads those exact values into the implementation
//! under test, calls its `back_propagation`, and asserts the results.
//!
//! # Pipeline
//!
//! - [`Oracle`]: seeded fixtures + reverse-mode evaluation on a [`Tape`]
//! - [`serializer`]: one `name[i0 * st0 + ... ] = literal;` line per element
//! - [`emitter`]: the full routine, with every `malloc` paired to a `free`
//!
//! # Panics vs `Result`
//!
//! - Low-level kernels ([`Tape`] nodes, [`Tensor::offset`]) panic via `assert!` on
//!   shape misuse. That is a programmer error.
//! - Everything reachable from [`generate`] validates and returns [`Result`].
//!
//! # Determinism
//!
//! The seed is an explicit parameter. Equal [`GeneratorConfig`]s produce
//! byte-identical output. Values are printed with the shortest literal that parses
//! back to the same `f64` bits.
//!
//! # Quick start
//!
//! ```rust
//! use backprop_oracle::{GeneratorConfig, generate};
//!
//! # fn main() -> backprop_oracle::Result<()> {
//! let c_source = generate(&GeneratorConfig::default())?;
//! assert!(c_source.contains("back_propagation(network, inputs, label, nabla_w, nabla_b)"));
//! # Ok(())
//! # }
//! ```

pub mod activation;
pub mod collaborator;
pub mod config;
pub mod emitter;
pub mod error;
pub mod gradcheck;
pub mod loss;
pub(crate) mod matmul;
pub mod oracle;
pub mod serializer;
pub mod shape;
pub mod tape;
pub mod tensor;

#[cfg(feature = "serde")]
pub mod snapshot;

pub use config::GeneratorConfig;
pub use emitter::{BufferLedger, Fixture, emit};
pub use error::{Error, Result};
pub use gradcheck::{GradCheckConfig, GradCheckReport, check_oracle, verify_oracle};
pub use oracle::{Fixtures, Oracle, Param};
pub use shape::NetworkShape;
pub use tape::Tape;
pub use tensor::Tensor;

#[cfg(feature = "serde")]
pub use snapshot::OracleSnapshot;

/// Evaluate the oracle for `config` and emit the C test routine.
pub fn generate(config: &GeneratorConfig) -> Result<String> {
    config.validate()?;
    let oracle = Oracle::evaluate(config.shape, config.seed)?;
    Ok(emit(&oracle, config)?.into_string())
}
