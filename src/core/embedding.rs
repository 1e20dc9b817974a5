use crate::error::GroupingError;

/// Added to the L2 norm so all-zero vectors normalize to zero instead of NaN.
pub const NORM_EPSILON: f64 = 1e-12;

/// A vector dotted with its own normalized copy can land a few ulps under 1.0.
/// Thresholds above `1.0 - SIMILARITY_TOLERANCE` are capped there so exact
/// duplicates still match at a threshold of 1.0.
pub const SIMILARITY_TOLERANCE: f32 = 1e-6;

#[inline]
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Scale `values` in place to unit L2 norm.
///
/// The norm is accumulated in `f64`: squares of large finite `f32` components
/// overflow `f32` long before they overflow `f64`.
pub fn normalize(values: &mut [f32]) {
    let norm = values
        .iter()
        .map(|&x| f64::from(x) * f64::from(x))
        .sum::<f64>()
        .sqrt()
        + NORM_EPSILON;
    for x in values.iter_mut() {
        *x = (f64::from(*x) / norm) as f32;
    }
}

#[inline]
pub fn meets_threshold(similarity: f32, threshold: f32) -> bool {
    similarity >= threshold.min(1.0 - SIMILARITY_TOLERANCE)
}

/// Call-scoped, row-major copy of the input with every row L2-normalized.
#[derive(Debug, Clone)]
pub struct NormalizedBatch {
    data: Vec<f32>,
    dim: usize,
    len: usize,
}

impl NormalizedBatch {
    /// Validate shape and values, then copy and normalize every embedding.
    ///
    /// Fails on an empty batch, on rows whose length differs from the first
    /// row's, on zero-length rows, and on NaN or infinite components.
    pub fn from_embeddings<E: AsRef<[f32]>>(embeddings: &[E]) -> Result<Self, GroupingError> {
        let first = embeddings.first().ok_or(GroupingError::EmptyInput)?;
        let dim = first.as_ref().len();
        if dim == 0 {
            return Err(crate::error::ConfigError::ZeroDimension.into());
        }
        if u32::try_from(embeddings.len()).is_err() {
            return Err(GroupingError::TooManyItems {
                count: embeddings.len(),
            });
        }

        for (index, embedding) in embeddings.iter().enumerate() {
            let values = embedding.as_ref();
            if values.len() != dim {
                return Err(GroupingError::DimensionMismatch {
                    index,
                    expected: dim,
                    found: values.len(),
                });
            }
            if let Some(position) = values.iter().position(|x| !x.is_finite()) {
                return Err(GroupingError::NonFiniteValue { index, position });
            }
        }

        let mut data = Vec::with_capacity(embeddings.len() * dim);
        for embedding in embeddings {
            data.extend_from_slice(embedding.as_ref());
        }
        for row in data.chunks_mut(dim) {
            normalize(row);
        }

        Ok(Self {
            data,
            dim,
            len: embeddings.len(),
        })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn row(&self, index: usize) -> &[f32] {
        &self.data[index * self.dim..(index + 1) * self.dim]
    }

    /// Cosine similarity of items `a` and `b`.
    #[inline]
    pub fn similarity(&self, a: usize, b: usize) -> f32 {
        dot(self.row(a), self.row(b))
    }
}
