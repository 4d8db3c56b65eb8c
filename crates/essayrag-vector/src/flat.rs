use essayrag_core::error::{Error, Result};
use essayrag_core::traits::VectorIndex;
use essayrag_core::types::Neighbor;

/// Exact in-memory index: brute-force Euclidean distance over every stored
/// vector. Deterministic, so repeated searches over the same vectors agree
/// bit for bit.
#[derive(Debug, Clone)]
pub struct FlatL2Index {
    dim: usize,
    vectors: Vec<Vec<f32>>,
}

impl FlatL2Index {
    pub fn new(dim: usize) -> Self {
        Self { dim, vectors: Vec::new() }
    }

    /// Builds an index holding `vectors`, in order.
    pub fn from_vectors(dim: usize, vectors: &[Vec<f32>]) -> Result<Self> {
        let mut index = Self::new(dim);
        index.add(vectors)?;
        Ok(index)
    }
}

pub fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum::<f32>().sqrt()
}

pub(crate) fn check_dim(expected: usize, vector: &[f32]) -> Result<()> {
    if vector.len() != expected {
        return Err(Error::DimensionMismatch { expected, actual: vector.len() });
    }
    Ok(())
}

/// Stable ascending sort on distance, so equal distances keep insertion order.
pub(crate) fn sort_neighbors(neighbors: &mut [Neighbor]) {
    neighbors.sort_by(|a, b| a.distance.total_cmp(&b.distance).then(a.position.cmp(&b.position)));
}

impl VectorIndex for FlatL2Index {
    fn dim(&self) -> usize {
        self.dim
    }

    fn len(&self) -> usize {
        self.vectors.len()
    }

    fn add(&mut self, vectors: &[Vec<f32>]) -> Result<()> {
        for v in vectors {
            check_dim(self.dim, v)?;
        }
        self.vectors.extend(vectors.iter().cloned());
        Ok(())
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if self.vectors.is_empty() {
            return Err(Error::IndexNotBuilt("flat index holds no vectors".into()));
        }
        check_dim(self.dim, query)?;
        let mut neighbors: Vec<Neighbor> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(position, v)| Neighbor { position, distance: l2_distance(query, v) })
            .collect();
        sort_neighbors(&mut neighbors);
        neighbors.truncate(k);
        Ok(neighbors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ties_keep_insertion_order() {
        let index = FlatL2Index::from_vectors(2, &[vec![1.0, 0.0], vec![0.0, 1.0], vec![-1.0, 0.0]]).unwrap();
        let hits = index.search(&[0.0, 0.0], 3).unwrap();
        assert_eq!(hits.iter().map(|n| n.position).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert!(hits.iter().all(|n| (n.distance - 1.0).abs() < 1e-6));
    }

    #[test]
    fn distance_is_euclidean() {
        assert!((l2_distance(&[0.0, 0.0], &[3.0, 4.0]) - 5.0).abs() < 1e-6);
    }
}
