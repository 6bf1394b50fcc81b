//! Stride serializer.
//!
//! Turns a tensor into one C assignment per element:
//!
//! ```text
//! network.w1[1 * 2 + 0 * 1] = 0.5488135039273248;
//! ```
//!
//! The index expression spells out the row-major offset term by term
//! (`i0 * stride0 + ... + ik * 1`). Zero coordinates are kept so every line has
//! the same structure and the arithmetic can be checked by eye.
//!
//! Value literals use the shortest decimal text that parses back to the same
//! `f64` bits, so the generated constants are exactly the values the oracle
//! computed.

use std::fmt;

use crate::{Error, Result, Tensor};

/// Row-major strides for `shape`: `(d1*...*dk, d2*...*dk, ..., 1)`.
///
/// A rank-0 shape has no strides.
pub fn strides(shape: &[usize]) -> Vec<usize> {
    let mut strides = vec![1; shape.len()];
    for axis in (0..shape.len().saturating_sub(1)).rev() {
        strides[axis] = strides[axis + 1] * shape[axis + 1];
    }
    strides
}

/// Render the symbolic offset of `index`, e.g. `1 * 3 + 2 * 1`.
///
/// An empty index (rank-0 tensor) renders as `0`.
pub fn index_expression(index: &[usize], strides: &[usize]) -> String {
    assert_eq!(
        index.len(),
        strides.len(),
        "index rank {} does not match stride rank {}",
        index.len(),
        strides.len()
    );
    if index.is_empty() {
        return "0".to_owned();
    }
    index
        .iter()
        .zip(strides)
        .map(|(i, s)| format!("{i} * {s}"))
        .collect::<Vec<_>>()
        .join(" + ")
}

/// Shortest round-tripping C double literal for `value`.
///
/// Integral values keep a fractional part (`1.0`); very small or large magnitudes
/// use exponent form (`1e-20`). Both are valid C floating constants.
pub fn float_literal(value: f64) -> Option<String> {
    if !value.is_finite() {
        return None;
    }
    Some(format!("{value:?}"))
}

/// One element assignment: `target[index-expression] = literal;`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub target: String,
    pub index: Vec<usize>,
    pub offset: usize,
    pub expression: String,
    pub literal: String,
}

impl fmt::Display for Assignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}] = {};", self.target, self.expression, self.literal)
    }
}

/// All element assignments for `tensor` into the C array `target`, in row-major
/// order over the multi-index.
pub fn assignments(target: &str, tensor: &Tensor) -> Result<Vec<Assignment>> {
    let strides = tensor.strides();
    let mut out = Vec::with_capacity(tensor.numel());

    for index in tensor.indices() {
        let offset = tensor.offset(&index);
        let value = tensor.data()[offset];
        let literal = float_literal(value).ok_or_else(|| Error::NonFinite {
            name: target.to_owned(),
            index: offset,
            value,
        })?;
        let expression = index_expression(&index, strides);
        out.push(Assignment {
            target: target.to_owned(),
            index,
            offset,
            expression,
            literal,
        });
    }

    debug_assert_eq!(out.len(), tensor.numel());
    Ok(out)
}

/// Rendered assignment statements for `tensor` into `target`.
pub fn fill_statements(target: &str, tensor: &Tensor) -> Result<Vec<String>> {
    Ok(assignments(target, tensor)?
        .iter()
        .map(ToString::to_string)
        .collect())
}

/// `double *<name> = malloc(<numel> * sizeof(double));`
pub fn alloc_statement(name: &str, tensor: &Tensor) -> String {
    format!(
        "double *{name} = malloc({} * sizeof(double));",
        tensor.numel()
    )
}
