mod common;

use std::collections::BTreeMap;

use proptest::prelude::*;

use formsift::splits::annotation_folds;
use formsift::{AnnotationFilter, FormError, GroupKFold};

use common::build_corpus;

proptest! {
    #[test]
    fn items_sharing_a_group_share_a_fold(
        groups in prop::collection::vec(0u8..12, 1..80),
        n_splits in 2usize..6,
        seed in any::<u64>(),
    ) {
        let keys: Vec<String> = groups.iter().map(|g| format!("site{g}")).collect();
        let splitter = GroupKFold::new(n_splits, seed).unwrap();
        let distinct = keys.iter().collect::<std::collections::BTreeSet<_>>().len();
        match splitter.assign(&keys) {
            Ok(assignment) => {
                prop_assert!(distinct >= n_splits);
                let mut fold_of: BTreeMap<&str, usize> = BTreeMap::new();
                for (key, fold) in keys.iter().zip(&assignment) {
                    prop_assert!(*fold < n_splits);
                    let first = *fold_of.entry(key.as_str()).or_insert(*fold);
                    prop_assert_eq!(first, *fold);
                }
                prop_assert_eq!(splitter.assign(&keys).unwrap(), assignment);
            }
            Err(err) => {
                prop_assert!(distinct < n_splits);
                prop_assert!(matches!(err, FormError::Configuration(_)));
            }
        }
    }
}

#[test]
fn corpus_folds_keep_domains_together() {
    let (_dir, storage) = build_corpus(7);
    let annotations = storage.annotations(&AnnotationFilter::default()).unwrap();
    let folds = annotation_folds(&annotations, 3, 0).unwrap();
    assert_eq!(folds.len(), 3);
    for fold in &folds {
        for &test in &fold.test {
            for &train in &fold.train {
                assert_ne!(annotations[test].site_domain(), annotations[train].site_domain());
            }
        }
    }
    let sizes: Vec<usize> = folds.iter().map(|f| f.test.len()).collect();
    assert_eq!(sizes.iter().sum::<usize>(), annotations.len());
    assert!(sizes.iter().all(|&size| size >= 8));
}
