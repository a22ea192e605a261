use std::collections::BTreeSet;

use indexmap::IndexMap;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::errors::FormError;

/// One sequence position: attribute names with weights.
pub type AttributeItem = IndexMap<String, f64>;

/// SGD settings of [`LinearChainCrf`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CrfParams {
    /// L2 coefficient; the objective adds `c2 * |w|^2`.
    pub c2: f64,
    /// Passes over the sequences.
    pub epochs: usize,
    /// Initial learning rate, decayed as `lr / (1 + epoch)`.
    pub learning_rate: f64,
    /// Shuffle seed.
    pub seed: u64,
}

/// Linear-chain conditional random field with state and transition features.
#[derive(Clone, Debug, PartialEq, bitcode::Encode, bitcode::Decode)]
pub struct LinearChainCrf {
    labels: Vec<String>,
    attributes: Vec<String>,
    state: Vec<f64>,
    transitions: Vec<f64>,
}

type Encoded = Vec<Vec<(usize, f64)>>;

fn log_sum_exp(values: impl Iterator<Item = f64>) -> f64 {
    let values: Vec<f64> = values.collect();
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return max;
    }
    max + values.iter().map(|v| (v - max).exp()).sum::<f64>().ln()
}

impl LinearChainCrf {
    /// Fit on attribute sequences `xs` with label sequences `ys`.
    ///
    /// Labels are the sorted distinct training labels; attributes are the
    /// sorted distinct training attributes.
    pub fn fit(xs: &[Vec<AttributeItem>], ys: &[Vec<String>], params: &CrfParams) -> Result<Self, FormError> {
        if xs.len() != ys.len() {
            return Err(FormError::Configuration(format!(
                "{} sequences but {} label sequences",
                xs.len(),
                ys.len()
            )));
        }
        for (x, y) in xs.iter().zip(ys) {
            if x.len() != y.len() {
                return Err(FormError::Configuration(format!(
                    "sequence of {} items has {} labels",
                    x.len(),
                    y.len()
                )));
            }
        }
        let labels: Vec<String> = ys
            .iter()
            .flatten()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if labels.is_empty() {
            return Err(FormError::Configuration(
                "cannot fit a sequence model on zero labeled items".to_string(),
            ));
        }
        let attributes: Vec<String> = xs
            .iter()
            .flatten()
            .flat_map(|item| item.keys().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let n_labels = labels.len();
        let mut model = Self {
            state: vec![0.0; attributes.len() * n_labels],
            transitions: vec![0.0; n_labels * n_labels],
            labels,
            attributes,
        };

        let data: Vec<(Encoded, Vec<usize>)> = xs
            .iter()
            .zip(ys)
            .filter(|(x, _)| !x.is_empty())
            .map(|(x, y)| {
                let targets = y
                    .iter()
                    .filter_map(|label| model.labels.binary_search(label).ok())
                    .collect();
                (model.encode(x), targets)
            })
            .collect();
        if data.is_empty() {
            return Ok(model);
        }

        let decay = 2.0 * params.c2 / data.len() as f64;
        let mut order: Vec<usize> = (0..data.len()).collect();
        let mut rng = StdRng::seed_from_u64(params.seed);
        for epoch in 0..params.epochs {
            let eta = params.learning_rate / (1.0 + epoch as f64);
            order.shuffle(&mut rng);
            for &idx in &order {
                let (items, targets) = &data[idx];
                model.sgd_step(items, targets, eta, decay);
            }
        }
        Ok(model)
    }

    /// Known labels, sorted.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    fn encode(&self, items: &[AttributeItem]) -> Encoded {
        items
            .iter()
            .map(|item| {
                item.iter()
                    .filter_map(|(name, value)| {
                        self.attributes
                            .binary_search(name)
                            .ok()
                            .map(|idx| (idx, *value))
                    })
                    .collect()
            })
            .collect()
    }

    fn emissions(&self, items: &Encoded) -> Vec<Vec<f64>> {
        let n_labels = self.labels.len();
        items
            .iter()
            .map(|item| {
                let mut scores = vec![0.0; n_labels];
                for &(attr, value) in item {
                    let row = &self.state[attr * n_labels..(attr + 1) * n_labels];
                    for (score, weight) in scores.iter_mut().zip(row) {
                        *score += weight * value;
                    }
                }
                scores
            })
            .collect()
    }

    fn transition(&self, from: usize, to: usize) -> f64 {
        self.transitions[from * self.labels.len() + to]
    }

    fn forward_backward(&self, emissions: &[Vec<f64>]) -> (Vec<Vec<f64>>, Vec<Vec<f64>>, f64) {
        let n = emissions.len();
        let n_labels = self.labels.len();
        let mut alpha = vec![vec![0.0; n_labels]; n];
        let mut beta = vec![vec![0.0; n_labels]; n];
        alpha[0].clone_from(&emissions[0]);
        for t in 1..n {
            for y in 0..n_labels {
                alpha[t][y] = emissions[t][y]
                    + log_sum_exp((0..n_labels).map(|prev| alpha[t - 1][prev] + self.transition(prev, y)));
            }
        }
        for t in (0..n - 1).rev() {
            for y in 0..n_labels {
                beta[t][y] = log_sum_exp((0..n_labels).map(|next| {
                    self.transition(y, next) + emissions[t + 1][next] + beta[t + 1][next]
                }));
            }
        }
        let log_z = log_sum_exp(alpha[n - 1].iter().copied());
        (alpha, beta, log_z)
    }

    fn sgd_step(&mut self, items: &Encoded, targets: &[usize], eta: f64, decay: f64) {
        let n_labels = self.labels.len();
        let emissions = self.emissions(items);
        let (alpha, beta, log_z) = self.forward_backward(&emissions);

        let mut transition_grad = vec![0.0; n_labels * n_labels];
        for t in 0..items.len() {
            let marginals: Vec<f64> = (0..n_labels)
                .map(|y| (alpha[t][y] + beta[t][y] - log_z).exp())
                .collect();
            for &(attr, value) in &items[t] {
                for (y, marginal) in marginals.iter().enumerate() {
                    let observed = if targets[t] == y { 1.0 } else { 0.0 };
                    let w = &mut self.state[attr * n_labels + y];
                    *w -= eta * ((marginal - observed) * value + decay * *w);
                }
            }
            if t > 0 {
                for prev in 0..n_labels {
                    for y in 0..n_labels {
                        let pair = (alpha[t - 1][prev]
                            + self.transition(prev, y)
                            + emissions[t][y]
                            + beta[t][y]
                            - log_z)
                            .exp();
                        transition_grad[prev * n_labels + y] += pair;
                    }
                }
                transition_grad[targets[t - 1] * n_labels + targets[t]] -= 1.0;
            }
        }
        for (w, grad) in self.transitions.iter_mut().zip(transition_grad) {
            *w -= eta * (grad + decay * *w);
        }
    }

    fn check_input(&self, items: &[AttributeItem]) -> Option<Encoded> {
        if items.is_empty() {
            None
        } else {
            Some(self.encode(items))
        }
    }

    /// Most probable joint label sequence (Viterbi).
    pub fn predict(&self, items: &[AttributeItem]) -> Vec<String> {
        let Some(encoded) = self.check_input(items) else {
            return Vec::new();
        };
        let emissions = self.emissions(&encoded);
        let n = emissions.len();
        let n_labels = self.labels.len();
        let mut score = emissions[0].clone();
        let mut backpointers = vec![vec![0usize; n_labels]; n];
        for t in 1..n {
            let mut next = vec![f64::NEG_INFINITY; n_labels];
            for y in 0..n_labels {
                for prev in 0..n_labels {
                    let candidate = score[prev] + self.transition(prev, y);
                    if candidate > next[y] {
                        next[y] = candidate;
                        backpointers[t][y] = prev;
                    }
                }
                next[y] += emissions[t][y];
            }
            score = next;
        }
        let mut best = super::logistic::argmax(&score);
        let mut path = vec![best; n];
        for t in (1..n).rev() {
            best = backpointers[t][best];
            path[t - 1] = best;
        }
        path.into_iter().map(|y| self.labels[y].clone()).collect()
    }

    /// Per-position label marginals, each in label order and summing to one.
    pub fn marginals(&self, items: &[AttributeItem]) -> Vec<IndexMap<String, f64>> {
        let Some(encoded) = self.check_input(items) else {
            return Vec::new();
        };
        let emissions = self.emissions(&encoded);
        let (alpha, beta, log_z) = self.forward_backward(&emissions);
        (0..emissions.len())
            .map(|t| {
                self.labels
                    .iter()
                    .enumerate()
                    .map(|(y, label)| (label.clone(), (alpha[t][y] + beta[t][y] - log_z).exp()))
                    .collect()
            })
            .collect()
    }
}
