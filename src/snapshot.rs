//! Oracle snapshots (feature: `serde`).
//!
//! A snapshot is a versioned JSON record of everything one generator run computed:
//! the config, every fixture tensor, the activations, the loss and the gradients.
//! Committing it next to the generated C file makes drift visible. `replay`
//! re-evaluates the stored config and fails if any value changed bit-for-bit,
//! for example after an RNG or toolchain upgrade.
//!
//! Design notes:
//! - The on-disk format is decoupled from `Oracle`/`Tensor` so internals can move.
//! - Loading validates the version, the tensor list against the network shape,
//!   and finiteness.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::collaborator::expected_gradient_buffer;
use crate::{Error, GeneratorConfig, NetworkShape, Oracle, Param, Result, Tensor};

pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleSnapshot {
    pub format_version: u32,
    pub config: GeneratorConfig,
    pub loss: f64,
    pub tensors: Vec<SerializedTensor>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedTensor {
    pub name: String,
    pub shape: Vec<usize>,
    /// Row-major.
    pub data: Vec<f64>,
}

impl From<&Tensor> for SerializedTensor {
    fn from(t: &Tensor) -> Self {
        Self {
            name: t.name().to_owned(),
            shape: t.shape().to_vec(),
            data: t.data().to_vec(),
        }
    }
}

/// Every tensor a snapshot stores, in file order.
fn oracle_tensors(oracle: &Oracle) -> Vec<&Tensor> {
    let mut out = vec![oracle.inputs(), oracle.label()];
    out.extend(Param::ALL.map(|p| oracle.param(p)));
    out.push(oracle.hidden());
    out.push(oracle.output());
    out.extend(Param::ALL.map(|p| oracle.gradient(p)));
    out
}

/// `(name, shape)` of every stored tensor for a network of `shape`, in file order.
fn expected_layout(shape: &NetworkShape) -> Vec<(String, Vec<usize>)> {
    let mut out = vec![
        ("inputs".to_owned(), shape.inputs().to_vec()),
        ("label".to_owned(), shape.label().to_vec()),
    ];
    out.extend(Param::ALL.map(|p| (p.name().to_owned(), p.shape(shape))));
    out.push(("hidden".to_owned(), vec![shape.s1]));
    out.push(("output".to_owned(), vec![shape.s2]));
    out.extend(Param::ALL.map(|p| (expected_gradient_buffer(p), p.shape(shape))));
    out
}

impl OracleSnapshot {
    pub fn new(oracle: &Oracle, config: &GeneratorConfig) -> Self {
        Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            config: config.clone(),
            loss: oracle.loss(),
            tensors: oracle_tensors(oracle)
                .into_iter()
                .map(SerializedTensor::from)
                .collect(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(Error::Snapshot(format!(
                "unsupported format_version {}; expected {}",
                self.format_version, SNAPSHOT_FORMAT_VERSION
            )));
        }
        self.config.validate()?;

        if !self.loss.is_finite() {
            return Err(Error::Snapshot(format!("loss is not finite: {}", self.loss)));
        }
        let layout = expected_layout(&self.config.shape);
        if self.tensors.len() != layout.len() {
            return Err(Error::Snapshot(format!(
                "snapshot has {} tensors, expected {}",
                self.tensors.len(),
                layout.len()
            )));
        }
        for (t, (name, shape)) in self.tensors.iter().zip(&layout) {
            if t.name != *name || t.shape != *shape {
                return Err(Error::Snapshot(format!(
                    "tensor {} {:?} does not match expected {name} {shape:?}",
                    t.name, t.shape
                )));
            }
            Tensor::from_flat(t.name.as_str(), &t.shape, t.data.clone())
                .map_err(|e| Error::Snapshot(format!("tensor {}: {e}", t.name)))?;
            if let Some(i) = t.data.iter().position(|v| !v.is_finite()) {
                return Err(Error::Snapshot(format!(
                    "tensor {} has a non-finite value at {i}",
                    t.name
                )));
            }
        }
        Ok(())
    }

    /// Look up a stored tensor by name.
    pub fn tensor(&self, name: &str) -> Option<&SerializedTensor> {
        self.tensors.iter().find(|t| t.name == name)
    }

    /// Re-evaluate the stored config and check every value is bit-identical.
    pub fn replay(&self) -> Result<Oracle> {
        self.validate()?;
        let oracle = Oracle::evaluate(self.config.shape, self.config.seed)?;

        if oracle.loss().to_bits() != self.loss.to_bits() {
            return Err(Error::Snapshot(format!(
                "loss drifted: stored {:?}, recomputed {:?}",
                self.loss,
                oracle.loss()
            )));
        }

        for t in oracle_tensors(&oracle) {
            let stored = self
                .tensor(t.name())
                .ok_or_else(|| Error::Snapshot(format!("tensor {} is missing", t.name())))?;
            let same_bits = stored
                .data
                .iter()
                .zip(t.data())
                .all(|(a, b)| a.to_bits() == b.to_bits());
            if !same_bits {
                return Err(Error::Snapshot(format!("tensor {} drifted", stored.name)));
            }
        }

        Ok(oracle)
    }

    /// Serialize to a pretty-printed JSON string.
    pub fn to_json_string_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| Error::Snapshot(format!("failed to serialize snapshot: {e}")))
    }

    /// Parse and validate a snapshot.
    pub fn from_json_str(s: &str) -> Result<Self> {
        let snapshot: Self = serde_json::from_str(s)
            .map_err(|e| Error::Snapshot(format!("failed to parse snapshot json: {e}")))?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let s = self.to_json_string_pretty()?;
        let p = path.as_ref();
        std::fs::write(p, s)
            .map_err(|e| Error::Snapshot(format!("failed to write {}: {e}", p.display())))?;
        Ok(())
    }

    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let p = path.as_ref();
        let s = std::fs::read_to_string(p)
            .map_err(|e| Error::Snapshot(format!("failed to read {}: {e}", p.display())))?;
        Self::from_json_str(&s)
    }
}
