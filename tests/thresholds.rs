use indexmap::IndexMap;
use proptest::prelude::*;

use formsift::{number_pattern, thresholded};

#[test]
fn number_patterns() {
    assert_eq!(number_pattern("foo", 0.3), "");
    assert_eq!(number_pattern("123-234re2", 0.3), "XXX-XXXCCX");
    assert_eq!(number_pattern("123-234re2", 0.9), "");
}

proptest! {
    #[test]
    fn thresholding_is_monotonic(
        probs in prop::collection::vec(0.0f64..=1.0, 0..12),
        t1 in 0.0f64..=1.0,
        delta in 0.0f64..=1.0,
    ) {
        let map: IndexMap<String, f64> = probs
            .iter()
            .enumerate()
            .map(|(i, p)| (format!("class{i}"), *p))
            .collect();
        let t2 = t1 + delta;
        let loose = thresholded(&map, t1);
        let strict = thresholded(&map, t2);
        for (label, prob) in &strict {
            prop_assert!(*prob >= t2);
            prop_assert_eq!(loose.get(label), Some(prob));
        }
    }
}
