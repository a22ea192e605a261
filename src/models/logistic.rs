use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::errors::FormError;
use crate::sparse::SparseVector;

/// SGD settings of [`SoftmaxRegression`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SgdParams {
    /// Inverse L2 strength; the per-sample penalty is `1 / (c * n)`.
    pub c: f64,
    /// Passes over the data.
    pub epochs: usize,
    /// Initial learning rate.
    pub learning_rate: f64,
    /// Shuffle seed.
    pub seed: u64,
}

/// L2-regularized multinomial logistic regression over sparse vectors.
///
/// Classes are the sorted distinct training labels; the intercept is not
/// regularized.
#[derive(Clone, Debug, PartialEq, bitcode::Encode, bitcode::Decode)]
pub struct SoftmaxRegression {
    classes: Vec<String>,
    n_features: u32,
    weights: Vec<f64>,
    bias: Vec<f64>,
}

impl SoftmaxRegression {
    /// Fit on `xs` with labels `ys`; columns at or past `n_features` are ignored.
    pub fn fit(xs: &[SparseVector], ys: &[String], n_features: u32, params: &SgdParams) -> Result<Self, FormError> {
        if xs.is_empty() {
            return Err(FormError::Configuration(
                "cannot fit a classifier on zero examples".to_string(),
            ));
        }
        if xs.len() != ys.len() {
            return Err(FormError::Configuration(format!(
                "{} examples but {} labels",
                xs.len(),
                ys.len()
            )));
        }
        let mut classes: Vec<String> = ys.to_vec();
        classes.sort();
        classes.dedup();
        let targets: Vec<usize> = ys
            .iter()
            .filter_map(|y| classes.binary_search(y).ok())
            .collect();

        let n_classes = classes.len();
        let width = n_features as usize;
        let mut model = Self {
            classes,
            n_features,
            weights: vec![0.0; n_classes * width],
            bias: vec![0.0; n_classes],
        };
        if n_classes < 2 {
            return Ok(model);
        }

        let lambda = 1.0 / (params.c.max(f64::MIN_POSITIVE) * xs.len() as f64);
        let mut order: Vec<usize> = (0..xs.len()).collect();
        let mut rng = StdRng::seed_from_u64(params.seed);
        let mut step = 0usize;
        for _ in 0..params.epochs {
            order.shuffle(&mut rng);
            for &idx in &order {
                step += 1;
                let eta = params.learning_rate / (1.0 + params.learning_rate * lambda * step as f64);
                let probs = model.probabilities(&xs[idx]);
                for (class, prob) in probs.iter().enumerate() {
                    let target = if class == targets[idx] { 1.0 } else { 0.0 };
                    let error = prob - target;
                    let row = class * width;
                    for &(col, value) in xs[idx].entries() {
                        let col = col as usize;
                        if col >= width {
                            continue;
                        }
                        let w = &mut model.weights[row + col];
                        *w -= eta * (error * value + lambda * *w);
                    }
                    model.bias[class] -= eta * error;
                }
            }
        }
        Ok(model)
    }

    /// Known classes in column order of [`SoftmaxRegression::predict_proba`].
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Number of input columns.
    pub fn n_features(&self) -> u32 {
        self.n_features
    }

    fn probabilities(&self, x: &SparseVector) -> Vec<f64> {
        let width = self.n_features as usize;
        let scores: Vec<f64> = (0..self.classes.len())
            .map(|class| {
                let row = &self.weights[class * width..(class + 1) * width];
                x.dot(row) + self.bias[class]
            })
            .collect();
        softmax(&scores)
    }

    /// Class probabilities (summing to one) in [`SoftmaxRegression::classes`] order.
    pub fn predict_proba(&self, x: &SparseVector) -> Vec<f64> {
        self.probabilities(x)
    }

    /// Most probable class; ties go to the earlier class.
    pub fn predict(&self, x: &SparseVector) -> &str {
        let probs = self.probabilities(x);
        let best = argmax(&probs);
        &self.classes[best]
    }
}

/// Index of the largest value; the first one wins ties.
pub(crate) fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (idx, value) in values.iter().enumerate() {
        if *value > values[best] {
            best = idx;
        }
    }
    best
}

/// Numerically stable softmax.
pub(crate) fn softmax(scores: &[f64]) -> Vec<f64> {
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = scores.iter().map(|s| (s - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> SgdParams {
        SgdParams {
            c: 5.0,
            epochs: 30,
            learning_rate: 0.5,
            seed: 7,
        }
    }

    fn data() -> (Vec<SparseVector>, Vec<String>) {
        let mut xs = Vec::new();
        let mut ys = Vec::new();
        for i in 0..10 {
            let noise = (i % 3) as f64 * 0.1;
            xs.push(SparseVector::from_pairs(vec![(0, 1.0), (2, noise)]));
            ys.push("login".to_string());
            xs.push(SparseVector::from_pairs(vec![(1, 1.0), (2, noise)]));
            ys.push("search".to_string());
        }
        (xs, ys)
    }

    #[test]
    fn separable_data_is_learned() {
        let (xs, ys) = data();
        let model = SoftmaxRegression::fit(&xs, &ys, 3, &params()).unwrap();
        assert_eq!(model.classes(), &["login".to_string(), "search".to_string()]);
        assert_eq!(model.predict(&SparseVector::from_pairs(vec![(0, 1.0)])), "login");
        assert_eq!(model.predict(&SparseVector::from_pairs(vec![(1, 1.0)])), "search");
        let probs = model.predict_proba(&SparseVector::from_pairs(vec![(0, 1.0)]));
        assert!((probs.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!(probs[0] > 0.5);
    }

    #[test]
    fn training_is_deterministic_for_a_seed() {
        let (xs, ys) = data();
        let a = SoftmaxRegression::fit(&xs, &ys, 3, &params()).unwrap();
        let b = SoftmaxRegression::fit(&xs, &ys, 3, &params()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn single_class_predicts_that_class() {
        let xs = vec![SparseVector::from_pairs(vec![(0, 1.0)])];
        let ys = vec!["search".to_string()];
        let model = SoftmaxRegression::fit(&xs, &ys, 1, &params()).unwrap();
        assert_eq!(model.predict_proba(&xs[0]), vec![1.0]);
        assert!(SoftmaxRegression::fit(&[], &[], 1, &params()).is_err());
    }

    #[test]
    fn softmax_is_stable_for_large_scores() {
        let probs = softmax(&[1000.0, 1000.0]);
        assert_eq!(probs, vec![0.5, 0.5]);
    }
}
