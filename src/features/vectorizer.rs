use std::collections::{BTreeMap, BTreeSet};

use crate::errors::FormError;
use crate::features::ChannelInput;
use crate::sparse::SparseVector;
use crate::text::{token_ngrams, tokenize_min_len};

/// How text is cut into terms.
#[derive(Clone, Copy, Debug, PartialEq, Eq, bitcode::Encode, bitcode::Decode)]
pub enum Analyzer {
    /// Word n-grams over tokens of two or more word characters.
    Word,
    /// Character n-grams inside word boundaries; each word is padded with
    /// one space on both sides.
    CharWb,
}

/// Settings of an n-gram text vectorizer.
#[derive(Clone, Debug, PartialEq, bitcode::Encode, bitcode::Decode)]
pub struct TextVectorizerConfig {
    /// Term unit.
    pub analyzer: Analyzer,
    /// Inclusive n-gram size range.
    pub ngram_range: (u32, u32),
    /// Minimum number of documents a term must occur in.
    pub min_df: u32,
    /// Clip term counts to 1.
    pub binary: bool,
    /// Apply smoothed idf weighting followed by L2 normalization.
    pub use_idf: bool,
    /// Words removed before building word n-grams.
    pub stop_words: Vec<String>,
}

impl TextVectorizerConfig {
    /// Word n-grams, binary counts, no idf.
    pub fn words(min_n: u32, max_n: u32, min_df: u32) -> Self {
        Self {
            analyzer: Analyzer::Word,
            ngram_range: (min_n, max_n),
            min_df,
            binary: true,
            use_idf: false,
            stop_words: Vec::new(),
        }
    }

    /// Character n-grams within word boundaries, binary tf-idf.
    pub fn char_wb(min_n: u32, max_n: u32, min_df: u32) -> Self {
        Self {
            analyzer: Analyzer::CharWb,
            ngram_range: (min_n, max_n),
            min_df,
            binary: true,
            use_idf: true,
            stop_words: Vec::new(),
        }
    }

    /// Toggle tf-idf weighting.
    pub fn with_idf(mut self, use_idf: bool) -> Self {
        self.use_idf = use_idf;
        self
    }

    /// Replace the stop word list.
    pub fn with_stop_words(mut self, words: &[&str]) -> Self {
        self.stop_words = words.iter().map(|w| w.to_string()).collect();
        self
    }

    /// Terms of one document, with repetitions.
    pub fn analyze(&self, text: &str) -> Vec<String> {
        let text = text.to_lowercase();
        let (min_n, max_n) = (self.ngram_range.0 as usize, self.ngram_range.1 as usize);
        match self.analyzer {
            Analyzer::Word => {
                let tokens: Vec<String> = tokenize_min_len(&text, 2)
                    .into_iter()
                    .filter(|token| !self.stop_words.iter().any(|stop| stop == token))
                    .collect();
                token_ngrams(&tokens, min_n, max_n)
            }
            Analyzer::CharWb => char_wb_ngrams(&text, min_n, max_n),
        }
    }
}

fn char_wb_ngrams(text: &str, min_n: usize, max_n: usize) -> Vec<String> {
    let mut out = Vec::new();
    for word in text.split_whitespace() {
        let padded: Vec<char> = std::iter::once(' ')
            .chain(word.chars())
            .chain(std::iter::once(' '))
            .collect();
        let len = padded.len();
        for n in min_n.max(1)..=max_n {
            let mut offset = 0;
            out.push(padded[offset..(offset + n).min(len)].iter().collect());
            while offset + n < len {
                offset += 1;
                out.push(padded[offset..offset + n].iter().collect());
            }
            // a word shorter than n is emitted once, whole
            if offset == 0 {
                break;
            }
        }
    }
    out
}

/// Vectorizer of one form channel.
#[derive(Clone, Debug, PartialEq)]
pub enum VectorizerConfig {
    /// One column per attribute of a [`crate::features::FeatureRecord`].
    Dict,
    /// N-gram terms of free text.
    Text(TextVectorizerConfig),
}

impl VectorizerConfig {
    /// Learn the vocabulary (and idf weights) from `inputs`.
    pub fn fit(&self, channel: &str, inputs: &[ChannelInput]) -> Result<FittedVectorizer, FormError> {
        match self {
            VectorizerConfig::Dict => {
                let mut vocabulary = BTreeSet::new();
                for input in inputs {
                    let ChannelInput::Record(record) = input else {
                        return Err(mismatch(channel, "a feature record"));
                    };
                    vocabulary.extend(record.attributes().into_keys());
                }
                Ok(FittedVectorizer::Dict {
                    vocabulary: vocabulary.into_iter().collect(),
                })
            }
            VectorizerConfig::Text(config) => {
                let mut document_frequency: BTreeMap<String, u32> = BTreeMap::new();
                for input in inputs {
                    let ChannelInput::Text(text) = input else {
                        return Err(mismatch(channel, "text"));
                    };
                    let terms: BTreeSet<String> = config.analyze(text).into_iter().collect();
                    for term in terms {
                        *document_frequency.entry(term).or_default() += 1;
                    }
                }
                let n_documents = inputs.len() as f64;
                let (vocabulary, idf): (Vec<String>, Vec<f64>) = document_frequency
                    .into_iter()
                    .filter(|(_, df)| *df >= config.min_df.max(1))
                    .map(|(term, df)| {
                        let idf = ((1.0 + n_documents) / (1.0 + f64::from(df))).ln() + 1.0;
                        (term, idf)
                    })
                    .unzip();
                Ok(FittedVectorizer::Text {
                    config: config.clone(),
                    vocabulary,
                    idf,
                })
            }
        }
    }
}

fn mismatch(channel: &str, expected: &str) -> FormError {
    FormError::Configuration(format!("channel '{channel}' expects {expected}"))
}

/// Vectorizer state learned from training data.
#[derive(Clone, Debug, PartialEq, bitcode::Encode, bitcode::Decode)]
pub enum FittedVectorizer {
    /// Sorted attribute vocabulary.
    Dict {
        /// Column names in column order.
        vocabulary: Vec<String>,
    },
    /// Sorted term vocabulary with per-term idf.
    Text {
        /// Settings the vocabulary was learned with.
        config: TextVectorizerConfig,
        /// Column names in column order.
        vocabulary: Vec<String>,
        /// Smoothed idf per column.
        idf: Vec<f64>,
    },
}

impl FittedVectorizer {
    /// Column names in column order.
    pub fn vocabulary(&self) -> &[String] {
        match self {
            FittedVectorizer::Dict { vocabulary } | FittedVectorizer::Text { vocabulary, .. } => {
                vocabulary
            }
        }
    }

    /// Number of columns.
    pub fn width(&self) -> u32 {
        self.vocabulary().len() as u32
    }

    fn column(&self, term: &str) -> Option<u32> {
        self.vocabulary()
            .binary_search_by(|probe| probe.as_str().cmp(term))
            .ok()
            .map(|pos| pos as u32)
    }

    /// Vectorize one input; unseen terms are ignored.
    pub fn transform(&self, channel: &str, input: &ChannelInput) -> Result<SparseVector, FormError> {
        match (self, input) {
            (FittedVectorizer::Dict { .. }, ChannelInput::Record(record)) => {
                let pairs = record
                    .attributes()
                    .into_iter()
                    .filter_map(|(name, value)| self.column(&name).map(|col| (col, value)))
                    .collect();
                Ok(SparseVector::from_pairs(pairs))
            }
            (FittedVectorizer::Text { config, idf, .. }, ChannelInput::Text(text)) => {
                let mut counts: BTreeMap<u32, f64> = BTreeMap::new();
                for term in config.analyze(text) {
                    if let Some(col) = self.column(&term) {
                        *counts.entry(col).or_default() += 1.0;
                    }
                }
                let pairs = counts
                    .into_iter()
                    .map(|(col, count)| {
                        let tf = if config.binary { 1.0 } else { count };
                        let weight = if config.use_idf { idf[col as usize] } else { 1.0 };
                        (col, tf * weight)
                    })
                    .collect();
                let vector = SparseVector::from_pairs(pairs);
                Ok(if config.use_idf {
                    vector.l2_normalized()
                } else {
                    vector
                })
            }
            (FittedVectorizer::Dict { .. }, _) => Err(mismatch(channel, "a feature record")),
            (FittedVectorizer::Text { .. }, _) => Err(mismatch(channel, "text")),
        }
    }
}
