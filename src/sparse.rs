//! Sparse feature vectors shared by the vectorizers and the linear models.

/// Sparse vector of `(column, value)` pairs sorted by column, without
/// duplicate columns or explicit zeros.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SparseVector {
    entries: Vec<(u32, f64)>,
}

impl SparseVector {
    /// Build from unsorted pairs; duplicate columns are summed and zeros dropped.
    pub fn from_pairs(mut pairs: Vec<(u32, f64)>) -> Self {
        pairs.sort_by_key(|(col, _)| *col);
        let mut entries: Vec<(u32, f64)> = Vec::with_capacity(pairs.len());
        for (col, value) in pairs {
            match entries.last_mut() {
                Some((last, acc)) if *last == col => *acc += value,
                _ => entries.push((col, value)),
            }
        }
        entries.retain(|(_, value)| *value != 0.0);
        Self { entries }
    }

    /// Stored entries in column order.
    pub fn entries(&self) -> &[(u32, f64)] {
        &self.entries
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.entries.len()
    }

    /// Whether no entry is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Value at `col` (zero when absent).
    pub fn get(&self, col: u32) -> f64 {
        self.entries
            .binary_search_by_key(&col, |(c, _)| *c)
            .map(|pos| self.entries[pos].1)
            .unwrap_or(0.0)
    }

    /// Euclidean norm.
    pub fn l2_norm(&self) -> f64 {
        self.entries.iter().map(|(_, v)| v * v).sum::<f64>().sqrt()
    }

    /// Scale every value so the vector has unit L2 norm (no-op for zero vectors).
    pub fn l2_normalized(mut self) -> Self {
        let norm = self.l2_norm();
        if norm > 0.0 {
            for (_, value) in &mut self.entries {
                *value /= norm;
            }
        }
        self
    }

    /// Shift every column by `offset` (used when concatenating channels).
    pub fn offset(mut self, offset: u32) -> Self {
        for (col, _) in &mut self.entries {
            *col += offset;
        }
        self
    }

    /// Concatenate vectors whose column ranges are already disjoint and ordered.
    pub fn concat(parts: Vec<SparseVector>) -> Self {
        let mut entries = Vec::with_capacity(parts.iter().map(SparseVector::nnz).sum());
        for part in parts {
            entries.extend(part.entries);
        }
        Self::from_pairs(entries)
    }

    /// Dot product with a dense row of weights; columns past the row are ignored.
    pub fn dot(&self, dense: &[f64]) -> f64 {
        self.entries
            .iter()
            .filter_map(|(col, value)| dense.get(*col as usize).map(|w| w * value))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_pairs_sorts_and_merges() {
        let v = SparseVector::from_pairs(vec![(3, 1.0), (1, 2.0), (3, 0.5), (2, 0.0)]);
        assert_eq!(v.entries(), &[(1, 2.0), (3, 1.5)]);
        assert_eq!(v.get(3), 1.5);
        assert_eq!(v.get(2), 0.0);
    }

    #[test]
    fn l2_normalized_has_unit_norm() {
        let v = SparseVector::from_pairs(vec![(0, 3.0), (4, 4.0)]).l2_normalized();
        assert!((v.l2_norm() - 1.0).abs() < 1e-12);
        assert!(SparseVector::default().l2_normalized().is_empty());
    }

    #[test]
    fn concat_and_dot() {
        let a = SparseVector::from_pairs(vec![(0, 1.0)]);
        let b = SparseVector::from_pairs(vec![(0, 2.0)]).offset(2);
        let joined = SparseVector::concat(vec![a, b]);
        assert_eq!(joined.entries(), &[(0, 1.0), (2, 2.0)]);
        assert_eq!(joined.dot(&[0.5, 9.0, 1.0]), 2.5);
    }
}
