//! Similarity index abstraction and factory.
//!
//! Every session's vector store owns one [`SimilarityIndex`]. Which
//! implementation it gets is decided at runtime by [`create_index`]: an
//! accelerator-resident flat index when the device supports one, the CPU
//! [`FlatL2Index`] otherwise, or no index at all when the backend is disabled.

use super::accelerated;
use crate::config::IndexBackend;
use crate::detection::Device;
use std::cmp::Ordering;
use thiserror::Error;
use tracing::{debug, warn};

/// Position reported for neighbor slots that could not be filled.
pub const MISSING: i64 = -1;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Vector has dimension {actual}, index expects {expected}")]
    Dimension { expected: usize, actual: usize },

    #[error("Index backend unavailable: {0}")]
    Unavailable(String),

    #[error("Index backend error: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, IndexError>;

/// Nearest neighbors of one query, best first.
///
/// `ids[i]` is the insertion position of the i-th neighbor, or [`MISSING`]
/// when fewer than `k` vectors were stored. `distances[i]` is its squared L2
/// distance to the query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Neighbors {
    pub ids: Vec<i64>,
    pub distances: Vec<f32>,
}

/// Exact nearest-neighbor index over fixed-length vectors.
///
/// Positions are assigned in insertion order starting at zero and are never
/// reused until [`reset`](Self::reset).
pub trait SimilarityIndex: Send + Sync {
    /// Short backend name, used in logs.
    fn name(&self) -> &'static str;

    fn dimension(&self) -> usize;

    /// Number of stored vectors.
    fn count(&self) -> usize;

    /// Appends vectors in order. Either every vector is added or none is.
    fn add(&mut self, vectors: &[Vec<f32>]) -> Result<()>;

    /// Returns the `k` stored vectors closest to `query`.
    ///
    /// The result is always `k` long, so callers bound `k` by
    /// [`count`](Self::count).
    fn search(&self, query: &[f32], k: usize) -> Result<Neighbors>;

    /// Removes every stored vector.
    fn reset(&mut self);
}

/// Brute-force L2 index on the CPU.
///
/// Vectors are kept in one contiguous row-major buffer.
#[derive(Debug, Clone)]
pub struct FlatL2Index {
    dimension: usize,
    data: Vec<f32>,
}

impl FlatL2Index {
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(IndexError::Unavailable(
                "cannot build an index over zero-dimensional vectors".to_string(),
            ));
        }

        Ok(Self {
            dimension,
            data: Vec::new(),
        })
    }
}

impl SimilarityIndex for FlatL2Index {
    fn name(&self) -> &'static str {
        "flat_l2"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn count(&self) -> usize {
        self.data.len() / self.dimension
    }

    fn add(&mut self, vectors: &[Vec<f32>]) -> Result<()> {
        check_dimensions(self.dimension, vectors)?;

        self.data.reserve(vectors.len() * self.dimension);
        for vector in vectors {
            self.data.extend_from_slice(vector);
        }
        Ok(())
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Neighbors> {
        if query.len() != self.dimension {
            return Err(IndexError::Dimension {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let distances = self
            .data
            .chunks_exact(self.dimension)
            .map(|row| squared_l2(query, row))
            .collect();

        Ok(top_k(distances, k))
    }

    fn reset(&mut self) {
        self.data.clear();
    }
}

pub(crate) fn check_dimensions(dimension: usize, vectors: &[Vec<f32>]) -> Result<()> {
    match vectors.iter().find(|v| v.len() != dimension) {
        Some(bad) => Err(IndexError::Dimension {
            expected: dimension,
            actual: bad.len(),
        }),
        None => Ok(()),
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// Picks the `k` smallest distances, ties broken by position, padding with
/// [`MISSING`] when fewer than `k` candidates exist.
pub(crate) fn top_k(distances: Vec<f32>, k: usize) -> Neighbors {
    let mut ranked: Vec<(usize, f32)> = distances.into_iter().enumerate().collect();
    ranked.sort_by(|a, b| match a.1.total_cmp(&b.1) {
        Ordering::Equal => a.0.cmp(&b.0),
        other => other,
    });
    ranked.truncate(k);

    let mut neighbors = Neighbors {
        ids: ranked.iter().map(|(id, _)| *id as i64).collect(),
        distances: ranked.iter().map(|(_, distance)| *distance).collect(),
    };
    while neighbors.ids.len() < k {
        neighbors.ids.push(MISSING);
        neighbors.distances.push(f32::INFINITY);
    }
    neighbors
}

/// Creates the index for a new vector store.
///
/// With [`IndexBackend::Auto`] on an accelerator device the accelerated flat
/// index is probed first; any failure there is logged and the CPU index is
/// used instead. Returns `None` when no index can be provided at all, which
/// puts the store in degraded mode.
pub fn create_index(
    backend: IndexBackend,
    dimension: usize,
    device: Device,
) -> Option<Box<dyn SimilarityIndex>> {
    create_index_with(backend, dimension, device, accelerated::try_create)
}

pub(crate) fn create_index_with<F>(
    backend: IndexBackend,
    dimension: usize,
    device: Device,
    accelerated: F,
) -> Option<Box<dyn SimilarityIndex>>
where
    F: FnOnce(usize, Device) -> Result<Box<dyn SimilarityIndex>>,
{
    match backend {
        IndexBackend::Disabled => {
            warn!("Similarity index disabled, session will not return results");
            None
        }
        IndexBackend::Flat => flat_index(dimension),
        IndexBackend::Auto => {
            if device.is_accelerator() {
                match accelerated(dimension, device) {
                    Ok(index) => {
                        debug!(backend = index.name(), %device, dimension, "Created similarity index");
                        return Some(index);
                    }
                    Err(e) => {
                        warn!(%device, error = %e, "Accelerated index unavailable, falling back to CPU");
                    }
                }
            }
            flat_index(dimension)
        }
    }
}

fn flat_index(dimension: usize) -> Option<Box<dyn SimilarityIndex>> {
    match FlatL2Index::new(dimension) {
        Ok(index) => {
            debug!(backend = index.name(), dimension, "Created similarity index");
            Some(Box::new(index))
        }
        Err(e) => {
            warn!(error = %e, "No similarity index available, running degraded");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index_with(vectors: &[Vec<f32>]) -> FlatL2Index {
        let mut index = FlatL2Index::new(2).unwrap();
        index.add(vectors).unwrap();
        index
    }

    #[test]
    fn test_search_orders_by_distance() {
        let index = index_with(&[vec![10.0, 0.0], vec![1.0, 0.0], vec![3.0, 0.0]]);

        let neighbors = index.search(&[0.0, 0.0], 3).unwrap();
        assert_eq!(neighbors.ids, vec![1, 2, 0]);
        assert_eq!(neighbors.distances, vec![1.0, 9.0, 100.0]);
    }

    #[test]
    fn test_search_pads_missing() {
        let index = index_with(&[vec![1.0, 1.0]]);

        let neighbors = index.search(&[1.0, 1.0], 3).unwrap();
        assert_eq!(neighbors.ids, vec![0, MISSING, MISSING]);
        assert_eq!(neighbors.distances[0], 0.0);
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let index = index_with(&[vec![1.0, 0.0], vec![0.0, 1.0]]);

        let neighbors = index.search(&[0.0, 0.0], 2).unwrap();
        assert_eq!(neighbors.ids, vec![0, 1]);
    }

    #[test]
    fn test_add_is_all_or_nothing() {
        let mut index = index_with(&[vec![1.0, 0.0]]);

        let err = index.add(&[vec![1.0, 1.0], vec![1.0]]).unwrap_err();
        assert!(matches!(err, IndexError::Dimension { expected: 2, actual: 1 }));
        assert_eq!(index.count(), 1);
    }

    #[test]
    fn test_reset() {
        let mut index = index_with(&[vec![1.0, 0.0], vec![0.0, 1.0]]);
        index.reset();
        assert_eq!(index.count(), 0);
        assert_eq!(index.search(&[0.0, 0.0], 1).unwrap().ids, vec![MISSING]);
    }

    #[test]
    fn test_zero_dimension_is_unavailable() {
        assert!(FlatL2Index::new(0).is_err());
    }

    #[test]
    fn test_factory_falls_back_when_accelerator_fails() {
        let index = create_index_with(IndexBackend::Auto, 4, Device::Cuda { ordinal: 0 }, |_, _| {
            Err(IndexError::Unavailable("no driver".to_string()))
        })
        .unwrap();

        assert_eq!(index.name(), "flat_l2");
        assert_eq!(index.dimension(), 4);
    }

    #[test]
    fn test_factory_prefers_accelerator() {
        let index = create_index_with(IndexBackend::Auto, 4, Device::Metal, |dimension, _| {
            let index: Box<dyn SimilarityIndex> = Box::new(FakeAccelerated(FlatL2Index::new(dimension)?));
            Ok(index)
        })
        .unwrap();

        assert_eq!(index.name(), "fake_accelerated");
    }

    #[test]
    fn test_factory_skips_probe_on_cpu() {
        let index = create_index_with(IndexBackend::Auto, 4, Device::Cpu, |_, _| {
            panic!("accelerated index must not be probed on cpu")
        })
        .unwrap();

        assert_eq!(index.name(), "flat_l2");
    }

    #[test]
    fn test_factory_disabled_and_zero_dimension() {
        assert!(create_index(IndexBackend::Disabled, 4, Device::Cpu).is_none());
        assert!(create_index(IndexBackend::Flat, 0, Device::Cpu).is_none());
    }

    struct FakeAccelerated(FlatL2Index);

    impl SimilarityIndex for FakeAccelerated {
        fn name(&self) -> &'static str {
            "fake_accelerated"
        }
        fn dimension(&self) -> usize {
            self.0.dimension()
        }
        fn count(&self) -> usize {
            self.0.count()
        }
        fn add(&mut self, vectors: &[Vec<f32>]) -> Result<()> {
            self.0.add(vectors)
        }
        fn search(&self, query: &[f32], k: usize) -> Result<Neighbors> {
            self.0.search(query, k)
        }
        fn reset(&mut self) {
            self.0.reset()
        }
    }
}
