//! Per-pixel validity masks

use crate::error::{Error, Result};
use ndarray::Array2;

/// Boolean validity mask: `true` keeps a pixel, `false` drops it.
#[derive(Debug, Clone, PartialEq)]
pub struct Mask {
    data: Array2<bool>,
}

impl Mask {
    pub fn filled(rows: usize, cols: usize, keep: bool) -> Self {
        Self {
            data: Array2::from_elem((rows, cols), keep),
        }
    }

    pub fn from_array(data: Array2<bool>) -> Self {
        Self { data }
    }

    pub fn from_vec(data: Vec<bool>, rows: usize, cols: usize) -> Result<Self> {
        let data = Array2::from_shape_vec((rows, cols), data).map_err(|_| {
            Error::InvalidDimensions {
                width: cols,
                height: rows,
            }
        })?;
        Ok(Self { data })
    }

    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn data(&self) -> &Array2<bool> {
        &self.data
    }

    pub fn get(&self, row: usize, col: usize) -> Option<bool> {
        self.data.get((row, col)).copied()
    }

    /// Number of kept pixels
    pub fn count_valid(&self) -> usize {
        self.data.iter().filter(|&&keep| keep).count()
    }

    /// Pixels kept by both masks
    pub fn and(&self, other: &Mask) -> Result<Mask> {
        self.zip_with(other, |a, b| a && b)
    }

    /// Pixels kept by either mask
    pub fn or(&self, other: &Mask) -> Result<Mask> {
        self.zip_with(other, |a, b| a || b)
    }

    pub fn not(&self) -> Mask {
        Mask::from_array(self.data.mapv(|keep| !keep))
    }

    pub(crate) fn check_shape(&self, rows: usize, cols: usize) -> Result<()> {
        let (mr, mc) = self.shape();
        if (mr, mc) != (rows, cols) {
            return Err(Error::SizeMismatch {
                er: rows,
                ec: cols,
                ar: mr,
                ac: mc,
            });
        }
        Ok(())
    }

    fn zip_with(&self, other: &Mask, f: impl Fn(bool, bool) -> bool) -> Result<Mask> {
        let (rows, cols) = self.shape();
        other.check_shape(rows, cols)?;
        let mut out = self.data.clone();
        ndarray::Zip::from(&mut out)
            .and(&other.data)
            .for_each(|a, &b| *a = f(*a, b));
        Ok(Mask::from_array(out))
    }
}
