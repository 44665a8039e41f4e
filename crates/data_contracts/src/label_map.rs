use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("shape mismatch: expected {expected:?} (height, width), got {actual:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },
    #[error("class value {value} at (row {row}, col {col}) is outside [0, {classes})")]
    OutOfRangeClass {
        value: u32,
        classes: usize,
        row: usize,
        col: usize,
    },
    #[error("buffer length {actual} does not match expected {expected}")]
    BufferLength { expected: usize, actual: usize },
    #[error("class count mismatch: expected {expected}, got {actual}")]
    ClassCountMismatch { expected: usize, actual: usize },
    #[error("class count must be at least 1")]
    ZeroClasses,
    #[error("class catalog is empty")]
    EmptyCatalog,
    #[error("class catalog contains duplicate name {0:?}")]
    DuplicateClass(String),
    #[error("class catalog entry {0} is blank")]
    BlankClassName(usize),
}

/// Per-pixel class indices in row-major order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelMap {
    height: usize,
    width: usize,
    data: Vec<u32>,
}

impl LabelMap {
    pub fn new(height: usize, width: usize, data: Vec<u32>) -> Result<Self, ValidationError> {
        if data.len() != height * width {
            return Err(ValidationError::BufferLength {
                expected: height * width,
                actual: data.len(),
            });
        }
        Ok(Self {
            height,
            width,
            data,
        })
    }

    /// Build from nested rows; every row must have the same length.
    pub fn from_rows<R: AsRef<[u32]>>(rows: &[R]) -> Result<Self, ValidationError> {
        let height = rows.len();
        let width = rows.first().map(|r| r.as_ref().len()).unwrap_or(0);
        let mut data = Vec::with_capacity(height * width);
        for row in rows {
            let row = row.as_ref();
            if row.len() != width {
                return Err(ValidationError::BufferLength {
                    expected: width,
                    actual: row.len(),
                });
            }
            data.extend_from_slice(row);
        }
        Self::new(height, width, data)
    }

    /// Build by evaluating `f` at every row-major pixel index.
    pub fn from_fn(height: usize, width: usize, f: impl FnMut(usize) -> u32) -> Self {
        Self {
            height,
            width,
            data: (0..height * width).map(f).collect(),
        }
    }

    pub fn filled(height: usize, width: usize, class: u32) -> Self {
        Self {
            height,
            width,
            data: vec![class; height * width],
        }
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn dims(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [u32] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<u32> {
        self.data
    }

    pub fn get(&self, row: usize, col: usize) -> Option<u32> {
        if row >= self.height || col >= self.width {
            return None;
        }
        self.data.get(row * self.width + col).copied()
    }

    pub fn ensure_same_shape(&self, other: &LabelMap) -> Result<(), ValidationError> {
        if self.dims() != other.dims() {
            return Err(ValidationError::ShapeMismatch {
                expected: self.dims(),
                actual: other.dims(),
            });
        }
        Ok(())
    }

    /// Reports the first out-of-range value in row-major order.
    pub fn validate_classes(&self, classes: usize) -> Result<(), ValidationError> {
        if classes == 0 {
            return Err(ValidationError::ZeroClasses);
        }
        match self
            .data
            .iter()
            .position(|&v| v as usize >= classes)
        {
            None => Ok(()),
            Some(idx) => Err(ValidationError::OutOfRangeClass {
                value: self.data[idx],
                classes,
                row: idx / self.width.max(1),
                col: idx % self.width.max(1),
            }),
        }
    }

    /// Number of pixels holding each class index in `[0, classes)`; out-of-range values are ignored.
    pub fn class_histogram(&self, classes: usize) -> Vec<u64> {
        let mut counts = vec![0u64; classes];
        for &v in &self.data {
            if let Some(slot) = counts.get_mut(v as usize) {
                *slot += 1;
            }
        }
        counts
    }
}

/// Dense `height x width x classes` grid (channel-last), used for one-hot targets and
/// model probabilities alike.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassTensor {
    height: usize,
    width: usize,
    classes: usize,
    data: Vec<f32>,
}

impl ClassTensor {
    pub fn new(
        height: usize,
        width: usize,
        classes: usize,
        data: Vec<f32>,
    ) -> Result<Self, ValidationError> {
        if classes == 0 {
            return Err(ValidationError::ZeroClasses);
        }
        let expected = height * width * classes;
        if data.len() != expected {
            return Err(ValidationError::BufferLength {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            height,
            width,
            classes,
            data,
        })
    }

    pub fn zeros(height: usize, width: usize, classes: usize) -> Result<Self, ValidationError> {
        Self::new(height, width, classes, vec![0.0; height * width * classes])
    }

    /// Build from a channel-first (`classes x height x width`) buffer, as produced by
    /// burn tensors for a single image.
    pub fn from_chw(
        height: usize,
        width: usize,
        classes: usize,
        chw: &[f32],
    ) -> Result<Self, ValidationError> {
        if classes == 0 {
            return Err(ValidationError::ZeroClasses);
        }
        let plane = height * width;
        if chw.len() != plane * classes {
            return Err(ValidationError::BufferLength {
                expected: plane * classes,
                actual: chw.len(),
            });
        }
        let mut data = vec![0.0f32; chw.len()];
        for c in 0..classes {
            for p in 0..plane {
                data[p * classes + c] = chw[c * plane + p];
            }
        }
        Self::new(height, width, classes, data)
    }

    /// Channel-first copy of the data.
    pub fn to_chw(&self) -> Vec<f32> {
        let plane = self.height * self.width;
        let mut out = vec![0.0f32; self.data.len()];
        for p in 0..plane {
            for c in 0..self.classes {
                out[c * plane + p] = self.data[p * self.classes + c];
            }
        }
        out
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn classes(&self) -> usize {
        self.classes
    }

    pub fn dims(&self) -> (usize, usize, usize) {
        (self.height, self.width, self.classes)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn pixel(&self, row: usize, col: usize) -> Option<&[f32]> {
        if row >= self.height || col >= self.width {
            return None;
        }
        let start = (row * self.width + col) * self.classes;
        self.data.get(start..start + self.classes)
    }

    /// Per-pixel class vectors in row-major order.
    pub fn pixels(&self) -> std::slice::ChunksExact<'_, f32> {
        self.data.chunks_exact(self.classes)
    }
}
