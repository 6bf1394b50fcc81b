//! Network shape.
//!
//! The network under test has exactly two dense layers, so its whole structure is
//! the triple `(s0, s1, s2)`: input, hidden and output sizes. Every tensor shape in
//! the fixture follows from it:
//!
//! - `w1`: `(s1, s0)`, `b1`: `(s1,)`
//! - `w2`: `(s2, s1)`, `b2`: `(s2,)`
//! - `inputs`: `(s0,)`, `label`: `(s2,)`

use crate::{Error, Result};

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NetworkShape {
    pub s0: usize,
    pub s1: usize,
    pub s2: usize,
}

impl NetworkShape {
    /// Build a shape from `(input_size, hidden_size, output_size)`.
    pub fn new(s0: usize, s1: usize, s2: usize) -> Result<Self> {
        let shape = Self { s0, s1, s2 };
        shape.validate()?;
        Ok(shape)
    }

    /// All three sizes must be > 0 and the parameter count must fit in `usize`.
    pub fn validate(&self) -> Result<()> {
        for (name, dim) in [("s0", self.s0), ("s1", self.s1), ("s2", self.s2)] {
            if dim == 0 {
                return Err(Error::InvalidConfig(format!("{name} must be > 0")));
            }
        }
        if self.checked_num_params().is_none() {
            return Err(Error::InvalidConfig(format!(
                "parameter count of {self:?} overflows usize"
            )));
        }
        Ok(())
    }

    #[inline]
    pub fn inputs(&self) -> [usize; 1] {
        [self.s0]
    }

    #[inline]
    pub fn label(&self) -> [usize; 1] {
        [self.s2]
    }

    /// Row-major `(out_dim, in_dim)`.
    #[inline]
    pub fn w1(&self) -> [usize; 2] {
        [self.s1, self.s0]
    }

    #[inline]
    pub fn b1(&self) -> [usize; 1] {
        [self.s1]
    }

    /// Row-major `(out_dim, in_dim)`.
    #[inline]
    pub fn w2(&self) -> [usize; 2] {
        [self.s2, self.s1]
    }

    #[inline]
    pub fn b2(&self) -> [usize; 1] {
        [self.s2]
    }

    /// Total number of trainable scalars.
    ///
    /// Saturates at `usize::MAX`; [`NetworkShape::validate`] rejects shapes where
    /// that would happen.
    pub fn num_params(&self) -> usize {
        self.checked_num_params().unwrap_or(usize::MAX)
    }

    fn checked_num_params(&self) -> Option<usize> {
        let w1 = self.s1.checked_mul(self.s0)?;
        let w2 = self.s2.checked_mul(self.s1)?;
        w1.checked_add(self.s1)?
            .checked_add(w2)?
            .checked_add(self.s2)
    }
}

impl Default for NetworkShape {
    fn default() -> Self {
        Self {
            s0: 2,
            s1: 3,
            s2: 4,
        }
    }
}
