use std::collections::BTreeMap;

use tracing::debug;

use crate::annotation::FormAnnotation;
use crate::constants::evaluation::MIN_N_FOLDS;
use crate::errors::FormError;
use crate::hash::stable_hash_str;
use crate::types::SiteDomain;

/// Train/test item indices of one cross-validation fold.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fold {
    /// Fold number, `0..n_splits`.
    pub index: usize,
    /// Items used for fitting.
    pub train: Vec<usize>,
    /// Held-out items.
    pub test: Vec<usize>,
}

/// K-fold splitter that never separates items sharing a group key.
///
/// Groups are placed largest first onto the currently lightest fold, so
/// folds hold roughly equal numbers of items. Equal-sized groups are
/// ordered by a seeded stable hash of the key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GroupKFold {
    n_splits: usize,
    seed: u64,
}

impl GroupKFold {
    /// Splitter with `n_splits` folds; at least two are required.
    pub fn new(n_splits: usize, seed: u64) -> Result<Self, FormError> {
        if n_splits < MIN_N_FOLDS {
            return Err(FormError::Configuration(format!(
                "need at least {MIN_N_FOLDS} folds, got {n_splits}"
            )));
        }
        Ok(Self { n_splits, seed })
    }

    /// Number of folds.
    pub fn n_splits(&self) -> usize {
        self.n_splits
    }

    /// Fold number of every item, given each item's group key.
    pub fn assign<S: AsRef<str>>(&self, groups: &[S]) -> Result<Vec<usize>, FormError> {
        let mut sizes: BTreeMap<&str, usize> = BTreeMap::new();
        for group in groups {
            *sizes.entry(group.as_ref()).or_default() += 1;
        }
        if sizes.len() < self.n_splits {
            return Err(FormError::Configuration(format!(
                "cannot split {} groups into {} folds",
                sizes.len(),
                self.n_splits
            )));
        }

        let mut ordered: Vec<(&str, usize)> = sizes.into_iter().collect();
        ordered.sort_by(|(a, a_size), (b, b_size)| {
            b_size
                .cmp(a_size)
                .then_with(|| stable_hash_str(self.seed, a).cmp(&stable_hash_str(self.seed, b)))
                .then_with(|| a.cmp(b))
        });

        let mut load = vec![0usize; self.n_splits];
        let mut fold_of: BTreeMap<&str, usize> = BTreeMap::new();
        for (group, size) in ordered {
            let lightest = (0..self.n_splits)
                .min_by_key(|&fold| (load[fold], fold))
                .unwrap_or(0);
            load[lightest] += size;
            fold_of.insert(group, lightest);
        }
        debug!(folds = self.n_splits, ?load, "assigned groups to folds");
        Ok(groups
            .iter()
            .map(|group| fold_of.get(group.as_ref()).copied().unwrap_or(0))
            .collect())
    }

    /// Train/test indices for every fold.
    pub fn split<S: AsRef<str>>(&self, groups: &[S]) -> Result<Vec<Fold>, FormError> {
        let assignment = self.assign(groups)?;
        Ok((0..self.n_splits)
            .map(|index| {
                let (test, train): (Vec<usize>, Vec<usize>) =
                    (0..assignment.len()).partition(|&item| assignment[item] == index);
                Fold { index, train, test }
            })
            .collect())
    }
}

/// Site domain of every annotation, in order.
pub fn annotation_groups(annotations: &[FormAnnotation]) -> Vec<SiteDomain> {
    annotations.iter().map(FormAnnotation::site_domain).collect()
}

/// Domain-grouped folds over `annotations`.
pub fn annotation_folds(annotations: &[FormAnnotation], n_splits: usize, seed: u64) -> Result<Vec<Fold>, FormError> {
    GroupKFold::new(n_splits, seed)?.split(&annotation_groups(annotations))
}
