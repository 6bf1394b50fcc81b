//! Reverse-mode tape.
//!
//! The forward pass records each operation into a linear tape in the order it ran.
//! `backward` then walks the tape in reverse and applies each node's vector-Jacobian
//! rule.
//!
//! Only the four node kinds the two-layer sigmoid network needs exist:
//!
//! | node              | forward                     | backward                              |
//! |-------------------|-----------------------------|---------------------------------------|
//! | `MatVec`          | `y = W x`                   | `dW += dy x^T`, `dx += W^T dy`        |
//! | `Add`             | `y = a + b`                 | `da += dy`, `db += dy`                |
//! | `Sigmoid`         | `y = sigmoid(x)`            | `dx += dy * y (1 - y)`                |
//! | `SquaredErrorSum` | `y = sum((p - t)^2)`        | `dp += dy * 2 (p - t)`, `dt -= ...`   |
//!
//! Every value is stored once in the arena and never recomputed.

use crate::activation::{sigmoid, sigmoid_grad_from_output};
use crate::loss::sse_backward;
use crate::matmul::{matvec, matvec_transposed_acc, outer_acc};

/// Arena index of a recorded value.
pub type VarId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Node {
    /// Input or parameter; no backward rule.
    Leaf,
    /// `out = W x` with `W` row-major `(rows, cols)`.
    MatVec {
        w: VarId,
        x: VarId,
        rows: usize,
        cols: usize,
    },
    Add {
        a: VarId,
        b: VarId,
    },
    Sigmoid {
        input: VarId,
    },
    /// Scalar `sum((pred - target)^2)`.
    SquaredErrorSum {
        pred: VarId,
        target: VarId,
    },
}

#[derive(Debug, Clone, Default)]
pub struct Tape {
    nodes: Vec<Node>,
    values: Vec<Vec<f64>>,
}

/// Gradients of one scalar output w.r.t. every tape value.
#[derive(Debug, Clone)]
pub struct Grads {
    grads: Vec<Vec<f64>>,
}

impl Tape {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn value(&self, id: VarId) -> &[f64] {
        &self.values[id]
    }

    fn push(&mut self, node: Node, value: Vec<f64>) -> VarId {
        let id = self.nodes.len();
        self.nodes.push(node);
        self.values.push(value);
        id
    }

    pub fn leaf(&mut self, data: &[f64]) -> VarId {
        self.push(Node::Leaf, data.to_vec())
    }

    pub fn matvec(&mut self, w: VarId, rows: usize, cols: usize, x: VarId) -> VarId {
        let mut out = vec![0.0; rows];
        matvec(&self.values[w], rows, cols, &self.values[x], &mut out);
        self.push(Node::MatVec { w, x, rows, cols }, out)
    }

    pub fn add(&mut self, a: VarId, b: VarId) -> VarId {
        let (va, vb) = (&self.values[a], &self.values[b]);
        assert_eq!(
            va.len(),
            vb.len(),
            "add operands have len {} and {}",
            va.len(),
            vb.len()
        );
        let out = va.iter().zip(vb).map(|(x, y)| x + y).collect();
        self.push(Node::Add { a, b }, out)
    }

    pub fn sigmoid(&mut self, input: VarId) -> VarId {
        let out = self.values[input].iter().map(|&x| sigmoid(x)).collect();
        self.push(Node::Sigmoid { input }, out)
    }

    pub fn squared_error_sum(&mut self, pred: VarId, target: VarId) -> VarId {
        let loss = crate::loss::sse(&self.values[pred], &self.values[target]);
        self.push(Node::SquaredErrorSum { pred, target }, vec![loss])
    }

    /// Reverse sweep from the scalar `output`, seeded with `d output = 1`.
    ///
    /// Panics if `output` is not a scalar.
    pub fn backward(&self, output: VarId) -> Grads {
        assert_eq!(
            self.values[output].len(),
            1,
            "backward needs a scalar output, value {output} has len {}",
            self.values[output].len()
        );

        let mut grads: Vec<Vec<f64>> = self.values.iter().map(|v| vec![0.0; v.len()]).collect();
        grads[output][0] = 1.0;

        for id in (0..=output).rev() {
            // Nodes only read earlier ids, so the upstream gradient is final here.
            let (before, rest) = grads.split_at_mut(id);
            let d_out = &rest[0];

            match self.nodes[id] {
                Node::Leaf => {}
                Node::MatVec { w, x, rows, cols } => {
                    outer_acc(d_out, &self.values[x], &mut before[w]);
                    matvec_transposed_acc(&self.values[w], rows, cols, d_out, &mut before[x]);
                }
                Node::Add { a, b } => {
                    for (g, &d) in before[a].iter_mut().zip(d_out) {
                        *g += d;
                    }
                    for (g, &d) in before[b].iter_mut().zip(d_out) {
                        *g += d;
                    }
                }
                Node::Sigmoid { input } => {
                    let y = &self.values[id];
                    for ((g, &d), &yi) in before[input].iter_mut().zip(d_out).zip(y) {
                        *g += d * sigmoid_grad_from_output(yi);
                    }
                }
                Node::SquaredErrorSum { pred, target } => {
                    let mut d_pred = vec![0.0; self.values[pred].len()];
                    sse_backward(
                        &self.values[pred],
                        &self.values[target],
                        d_out[0],
                        &mut d_pred,
                    );
                    for (g, d) in before[pred].iter_mut().zip(&d_pred) {
                        *g += d;
                    }
                    for (g, d) in before[target].iter_mut().zip(&d_pred) {
                        *g -= d;
                    }
                }
            }
        }

        Grads { grads }
    }
}

impl Grads {
    /// Gradient w.r.t. the value recorded as `id`.
    #[inline]
    pub fn wrt(&self, id: VarId) -> &[f64] {
        &self.grads[id]
    }

    pub fn take(&mut self, id: VarId) -> Vec<f64> {
        std::mem::take(&mut self.grads[id])
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn add_then_sum_gradient_is_two_diff() {
        let mut tape = Tape::new();
        let a = tape.leaf(&[1.0, 2.0]);
        let b = tape.leaf(&[0.5, 0.5]);
        let t = tape.leaf(&[1.0, 1.0]);
        let s = tape.add(a, b);
        let loss = tape.squared_error_sum(s, t);

        // s = [1.5, 2.5]; loss = 0.25 + 2.25
        assert_abs_diff_eq!(tape.value(loss)[0], 2.5);

        let grads = tape.backward(loss);
        assert_eq!(grads.wrt(a), &[1.0, 3.0]);
        assert_eq!(grads.wrt(b), &[1.0, 3.0]);
        assert_eq!(grads.wrt(t), &[-1.0, -3.0]);
    }

    #[test]
    fn matvec_gradients() {
        let mut tape = Tape::new();
        // W = [[1, 2], [3, 4], [5, 6]]
        let w = tape.leaf(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let x = tape.leaf(&[1.0, -1.0]);
        let zero = tape.leaf(&[0.0, 0.0, 0.0]);
        let y = tape.matvec(w, 3, 2, x);
        assert_eq!(tape.value(y), &[-1.0, -1.0, -1.0]);

        let loss = tape.squared_error_sum(y, zero);
        let grads = tape.backward(loss);

        // dL/dy = 2y = [-2, -2, -2]
        assert_eq!(grads.wrt(w), &[-2.0, 2.0, -2.0, 2.0, -2.0, 2.0]);
        // W^T dy = [-18, -24]
        assert_eq!(grads.wrt(x), &[-18.0, -24.0]);
    }

    #[test]
    fn sigmoid_gradient_uses_cached_output() {
        let mut tape = Tape::new();
        let x = tape.leaf(&[0.0]);
        let t = tape.leaf(&[0.0]);
        let y = tape.sigmoid(x);
        let loss = tape.squared_error_sum(y, t);
        let grads = tape.backward(loss);

        // dL/dy = 2 * 0.5, dy/dx = 0.25
        assert_abs_diff_eq!(grads.wrt(x)[0], 0.25);
    }

    #[test]
    fn shared_value_accumulates_from_both_uses() {
        let mut tape = Tape::new();
        let a = tape.leaf(&[2.0]);
        let t = tape.leaf(&[0.0]);
        let s = tape.add(a, a);
        let loss = tape.squared_error_sum(s, t);
        let grads = tape.backward(loss);

        // loss = (2a)^2, dloss/da = 8a
        assert_abs_diff_eq!(grads.wrt(a)[0], 16.0);
    }

    #[test]
    #[should_panic]
    fn backward_rejects_non_scalar() {
        let mut tape = Tape::new();
        let a = tape.leaf(&[1.0, 2.0]);
        tape.backward(a);
    }
}
