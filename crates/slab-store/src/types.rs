//! Slab ranges and typed element buffers.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SlabStoreError};

/// A rectangular sub-range of an array: per-axis start and extent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlabRange {
    pub start: Vec<u64>,
    pub shape: Vec<u64>,
}

impl SlabRange {
    pub fn new(start: Vec<u64>, shape: Vec<u64>) -> Self {
        Self { start, shape }
    }

    /// The range covering an entire array of the given shape.
    pub fn full(shape: &[u64]) -> Self {
        Self {
            start: vec![0; shape.len()],
            shape: shape.to_vec(),
        }
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    pub fn num_elements(&self) -> u64 {
        self.shape.iter().product()
    }

    /// Exclusive end index per axis.
    pub fn end(&self) -> Vec<u64> {
        self.start
            .iter()
            .zip(&self.shape)
            .map(|(s, n)| s + n)
            .collect()
    }

    /// Check that the range has the array's rank and lies inside it.
    pub fn check_within(&self, path: &str, array_shape: &[u64]) -> Result<()> {
        if self.start.len() != self.shape.len() || self.shape.len() != array_shape.len() {
            return Err(SlabStoreError::invalid_range(
                path,
                format!(
                    "range of rank {} does not match array rank {}",
                    self.shape.len(),
                    array_shape.len()
                ),
            ));
        }
        for (axis, (end, extent)) in self.end().iter().zip(array_shape).enumerate() {
            if end > extent {
                return Err(SlabStoreError::invalid_range(
                    path,
                    format!("axis {} ends at {} beyond extent {}", axis, end, extent),
                ));
            }
        }
        Ok(())
    }
}

/// Element buffer of a slab, tagged with its element type.
#[derive(Debug, Clone, PartialEq)]
pub enum SlabValues {
    I8(Vec<i8>),
    I16(Vec<i16>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    U64(Vec<u64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

/// Apply the same expression to whichever vector a `SlabValues` holds.
macro_rules! map_values {
    ($values:expr, $v:ident => $body:expr) => {
        match $values {
            SlabValues::I8($v) => SlabValues::I8($body),
            SlabValues::I16($v) => SlabValues::I16($body),
            SlabValues::I32($v) => SlabValues::I32($body),
            SlabValues::I64($v) => SlabValues::I64($body),
            SlabValues::U8($v) => SlabValues::U8($body),
            SlabValues::U16($v) => SlabValues::U16($body),
            SlabValues::U32($v) => SlabValues::U32($body),
            SlabValues::U64($v) => SlabValues::U64($body),
            SlabValues::F32($v) => SlabValues::F32($body),
            SlabValues::F64($v) => SlabValues::F64($body),
        }
    };
}

macro_rules! with_values {
    ($values:expr, $v:ident => $body:expr) => {
        match $values {
            SlabValues::I8($v) => $body,
            SlabValues::I16($v) => $body,
            SlabValues::I32($v) => $body,
            SlabValues::I64($v) => $body,
            SlabValues::U8($v) => $body,
            SlabValues::U16($v) => $body,
            SlabValues::U32($v) => $body,
            SlabValues::U64($v) => $body,
            SlabValues::F32($v) => $body,
            SlabValues::F64($v) => $body,
        }
    };
}

impl SlabValues {
    pub fn len(&self) -> usize {
        with_values!(self, v => v.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Zarr data type name of the elements.
    pub fn dtype(&self) -> &'static str {
        match self {
            Self::I8(_) => "int8",
            Self::I16(_) => "int16",
            Self::I32(_) => "int32",
            Self::I64(_) => "int64",
            Self::U8(_) => "uint8",
            Self::U16(_) => "uint16",
            Self::U32(_) => "uint32",
            Self::U64(_) => "uint64",
            Self::F32(_) => "float32",
            Self::F64(_) => "float64",
        }
    }

    /// Size of one element in bytes.
    pub fn element_size(&self) -> usize {
        match self {
            Self::I8(_) | Self::U8(_) => 1,
            Self::I16(_) | Self::U16(_) => 2,
            Self::I32(_) | Self::U32(_) | Self::F32(_) => 4,
            Self::I64(_) | Self::U64(_) | Self::F64(_) => 8,
        }
    }

    /// Widen every element to f64 (used for coordinate comparisons).
    pub fn to_f64(&self) -> Vec<f64> {
        with_values!(self, v => v.iter().map(|x| *x as f64).collect())
    }

    /// Pick elements by flat index, in order.
    pub fn gather(&self, indices: &[usize]) -> SlabValues {
        map_values!(self, v => indices.iter().map(|&i| v[i]).collect())
    }
}

/// A slab of array data in row-major (C) order.
#[derive(Debug, Clone, PartialEq)]
pub struct Slab {
    pub shape: Vec<u64>,
    pub values: SlabValues,
}

impl Slab {
    pub fn new(shape: Vec<u64>, values: SlabValues) -> Result<Self> {
        let expected: u64 = shape.iter().product();
        if expected != values.len() as u64 {
            return Err(SlabStoreError::invalid_range(
                "<slab>",
                format!("shape {:?} needs {} elements, got {}", shape, expected, values.len()),
            ));
        }
        Ok(Self { shape, values })
    }

    pub fn num_elements(&self) -> usize {
        self.values.len()
    }

    /// Extract a sub-range of this in-memory slab.
    ///
    /// The range is relative to this slab's own origin.
    pub fn subslab(&self, range: &SlabRange) -> Result<Slab> {
        range.check_within("<slab>", &self.shape)?;

        let indices = flat_indices(&self.shape, range);
        Ok(Slab {
            shape: range.shape.clone(),
            values: self.values.gather(&indices),
        })
    }
}

/// Row-major flat indices of every element of `range` inside `shape`.
fn flat_indices(shape: &[u64], range: &SlabRange) -> Vec<usize> {
    let rank = shape.len();
    let total = range.num_elements() as usize;
    if total == 0 {
        return Vec::new();
    }

    let mut strides = vec![1usize; rank];
    for axis in (0..rank.saturating_sub(1)).rev() {
        strides[axis] = strides[axis + 1] * shape[axis + 1] as usize;
    }

    let mut out = Vec::with_capacity(total);
    let mut index = vec![0u64; rank];
    loop {
        let flat: usize = (0..rank)
            .map(|a| (range.start[a] + index[a]) as usize * strides[a])
            .sum();
        out.push(flat);

        // Odometer increment, last axis fastest.
        let mut axis = rank;
        loop {
            if axis == 0 {
                return out;
            }
            axis -= 1;
            index[axis] += 1;
            if index[axis] < range.shape[axis] {
                break;
            }
            index[axis] = 0;
        }
    }
}
