//! Flat L2 index resident on an accelerator.
//!
//! Stored vectors live in a single `(count, dimension)` tensor on the device
//! and distances are computed there; only the distance column is copied back
//! to rank neighbors. Available with the `candle` feature (enabled by `cuda`
//! and `metal`).

use super::index::{IndexError, Result, SimilarityIndex};
use crate::detection::Device;

/// Builds the accelerated index for `device`.
///
/// Fails when the crate was built without accelerator support, when `device`
/// is the CPU, or when the device cannot be opened.
#[cfg(feature = "candle")]
pub(crate) fn try_create(dimension: usize, device: Device) -> Result<Box<dyn SimilarityIndex>> {
    Ok(Box::new(imp::TensorFlatL2Index::new(dimension, device)?))
}

#[cfg(not(feature = "candle"))]
pub(crate) fn try_create(_dimension: usize, device: Device) -> Result<Box<dyn SimilarityIndex>> {
    Err(IndexError::Unavailable(format!(
        "built without accelerator support, cannot place index on {}",
        device
    )))
}

#[cfg(feature = "candle")]
mod imp {
    use super::super::index::{check_dimensions, top_k, Neighbors};
    use super::*;
    use candle_core::{DType, Tensor};

    fn backend_err(e: candle_core::Error) -> IndexError {
        IndexError::Backend(e.to_string())
    }

    pub(crate) struct TensorFlatL2Index {
        device: candle_core::Device,
        dimension: usize,
        /// `None` until the first add and after a reset.
        vectors: Option<Tensor>,
        count: usize,
    }

    impl TensorFlatL2Index {
        pub(crate) fn new(dimension: usize, device: Device) -> Result<Self> {
            if dimension == 0 {
                return Err(IndexError::Unavailable(
                    "cannot build an index over zero-dimensional vectors".to_string(),
                ));
            }

            let device = match device {
                Device::Cuda { ordinal } => candle_core::Device::new_cuda(ordinal),
                Device::Metal => candle_core::Device::new_metal(0),
                Device::Cpu => {
                    return Err(IndexError::Unavailable(
                        "no accelerator selected".to_string(),
                    ))
                }
            }
            .map_err(|e| IndexError::Unavailable(e.to_string()))?;

            // Allocation probe: a device that opens but cannot hold a row is unusable.
            Tensor::zeros((1, dimension), DType::F32, &device)
                .map_err(|e| IndexError::Unavailable(e.to_string()))?;

            Ok(Self {
                device,
                dimension,
                vectors: None,
                count: 0,
            })
        }
    }

    impl SimilarityIndex for TensorFlatL2Index {
        fn name(&self) -> &'static str {
            "tensor_flat_l2"
        }

        fn dimension(&self) -> usize {
            self.dimension
        }

        fn count(&self) -> usize {
            self.count
        }

        fn add(&mut self, vectors: &[Vec<f32>]) -> Result<()> {
            check_dimensions(self.dimension, vectors)?;
            if vectors.is_empty() {
                return Ok(());
            }

            let flat: Vec<f32> = vectors.iter().flatten().copied().collect();
            let batch = Tensor::from_vec(flat, (vectors.len(), self.dimension), &self.device)
                .map_err(backend_err)?;

            let combined = match &self.vectors {
                Some(existing) => Tensor::cat(&[existing, &batch], 0).map_err(backend_err)?,
                None => batch,
            };

            self.vectors = Some(combined);
            self.count += vectors.len();
            Ok(())
        }

        fn search(&self, query: &[f32], k: usize) -> Result<Neighbors> {
            if query.len() != self.dimension {
                return Err(IndexError::Dimension {
                    expected: self.dimension,
                    actual: query.len(),
                });
            }

            let vectors = match &self.vectors {
                Some(vectors) => vectors,
                None => return Ok(top_k(Vec::new(), k)),
            };

            let query = Tensor::from_slice(query, (1, self.dimension), &self.device)
                .map_err(backend_err)?;
            let distances = vectors
                .broadcast_sub(&query)
                .and_then(|diff| diff.sqr())
                .and_then(|squared| squared.sum(1))
                .and_then(|column| column.to_vec1::<f32>())
                .map_err(backend_err)?;

            Ok(top_k(distances, k))
        }

        fn reset(&mut self) {
            self.vectors = None;
            self.count = 0;
        }
    }
}
