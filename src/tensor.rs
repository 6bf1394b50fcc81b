//! Immutable named tensors.
//!
//! Every array the generator produces (fixtures, parameters, activations and
//! gradients) is a `Tensor`: a flat `f64` buffer with an explicit row-major shape.
//! Strides are computed once at construction and reused for every element lookup.

use rand::Rng;

use crate::serializer::strides;
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    name: String,
    shape: Vec<usize>,
    strides: Vec<usize>,
    data: Vec<f64>,
}

/// Product of `shape`, or `None` if it does not fit in `usize`.
pub fn checked_numel(shape: &[usize]) -> Option<usize> {
    shape.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
}

impl Tensor {
    /// Build a tensor from a flat row-major buffer.
    ///
    /// Every dimension must be > 0 and `data.len()` must equal the product of `shape`.
    /// An empty `shape` is a rank-0 tensor holding exactly one value.
    pub fn from_flat(name: impl Into<String>, shape: &[usize], data: Vec<f64>) -> Result<Self> {
        let name = name.into();
        if let Some(axis) = shape.iter().position(|&d| d == 0) {
            return Err(Error::InvalidShape(format!(
                "{name}: dimension {axis} of shape {shape:?} is zero"
            )));
        }

        let numel = checked_numel(shape).ok_or_else(|| {
            Error::InvalidShape(format!("{name}: element count of shape {shape:?} overflows"))
        })?;
        if data.len() != numel {
            return Err(Error::InvalidShape(format!(
                "{name}: shape {shape:?} needs {numel} values, got {}",
                data.len()
            )));
        }

        Ok(Self {
            name,
            shape: shape.to_vec(),
            strides: strides(shape),
            data,
        })
    }

    /// Fill a tensor with values drawn uniformly from `[0, 1)`.
    pub fn random<R: Rng + ?Sized>(
        name: impl Into<String>,
        shape: &[usize],
        rng: &mut R,
    ) -> Result<Self> {
        let name = name.into();
        let numel = checked_numel(shape).ok_or_else(|| {
            Error::InvalidShape(format!("{name}: element count of shape {shape:?} overflows"))
        })?;
        let data = (0..numel).map(|_| rng.gen_range(0.0..1.0)).collect();
        Self::from_flat(name, shape, data)
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    #[inline]
    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    #[inline]
    pub fn numel(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// Flat offset of a multi-index.
    ///
    /// Panics if the index rank or any coordinate is out of range.
    pub fn offset(&self, index: &[usize]) -> usize {
        assert_eq!(
            index.len(),
            self.rank(),
            "{}: index rank {} does not match tensor rank {}",
            self.name,
            index.len(),
            self.rank()
        );
        let mut offset = 0;
        for (axis, (&i, &stride)) in index.iter().zip(&self.strides).enumerate() {
            assert!(
                i < self.shape[axis],
                "{}: index {i} out of range for axis {axis} (len {})",
                self.name,
                self.shape[axis]
            );
            offset += i * stride;
        }
        offset
    }

    #[inline]
    pub fn get(&self, index: &[usize]) -> f64 {
        self.data[self.offset(index)]
    }

    /// Check that this tensor has the expected shape.
    pub fn expect_shape(&self, expected: &[usize]) -> Result<()> {
        if self.shape != expected {
            return Err(Error::InvalidShape(format!(
                "{}: expected shape {expected:?}, got {:?}",
                self.name, self.shape
            )));
        }
        Ok(())
    }

    /// Every multi-index of this tensor in row-major order (last axis fastest).
    pub fn indices(&self) -> MultiIndices<'_> {
        MultiIndices::new(&self.shape)
    }
}

/// Row-major walk over the cartesian product `range(d0) x range(d1) x ...`.
///
/// A rank-0 shape yields a single empty index.
#[derive(Debug, Clone)]
pub struct MultiIndices<'a> {
    shape: &'a [usize],
    next: Option<Vec<usize>>,
}

impl<'a> MultiIndices<'a> {
    pub fn new(shape: &'a [usize]) -> Self {
        let next = if shape.contains(&0) {
            None
        } else {
            Some(vec![0; shape.len()])
        };
        Self { shape, next }
    }
}

impl Iterator for MultiIndices<'_> {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.take()?;

        let mut successor = current.clone();
        for axis in (0..self.shape.len()).rev() {
            successor[axis] += 1;
            if successor[axis] < self.shape[axis] {
                self.next = Some(successor);
                break;
            }
            successor[axis] = 0;
        }

        Some(current)
    }
}
