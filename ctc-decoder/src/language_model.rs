//! Bigram character model consulted while growing beams.

use std::fs;
use std::path::Path;

use ndarray::{Array1, Array2};
use serde::Deserialize;

use crate::error::DecodeError;

/// Read-only character statistics over the non-blank alphabet.
///
/// Indices are alphabet positions, i.e. class indices with the blank slot
/// removed.
pub trait CharacterModel: Send + Sync {
    fn alphabet_size(&self) -> usize;

    /// `P(c)` for `c` starting a word.
    fn first_char_probability(&self, c: usize) -> f64;

    /// `P(c | prev)`.
    fn second_char_probability(&self, prev: usize, c: usize) -> f64;
}

#[derive(Debug, Clone)]
pub struct BigramTable {
    first: Array1<f64>,
    second: Array2<f64>,
}

#[derive(Deserialize)]
struct BigramFile {
    first_char_probs: Vec<f64>,
    second_char_probs: Vec<Vec<f64>>,
}

impl BigramTable {
    /// `second` is row-major with rows indexed by the previous character.
    pub fn new(first: Vec<f64>, second: Vec<f64>) -> Result<Self, DecodeError> {
        let n = first.len();
        let second = Array2::from_shape_vec((n, n), second)?;
        Ok(Self {
            first: Array1::from_vec(first),
            second,
        })
    }

    pub fn from_json_str(json: &str) -> Result<Self, DecodeError> {
        let file: BigramFile = serde_json::from_str(json)?;
        let n = file.first_char_probs.len();
        let mut flat = Vec::with_capacity(n * n);
        for row in &file.second_char_probs {
            if row.len() != n {
                return Err(DecodeError::AlphabetMismatch {
                    expected: n,
                    actual: row.len(),
                });
            }
            flat.extend_from_slice(row);
        }
        Self::new(file.first_char_probs, flat)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, DecodeError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)?;
        let table = Self::from_json_str(&json)?;
        log::info!(
            "Loaded bigram table with {} characters from {}",
            table.alphabet_size(),
            path.display()
        );
        Ok(table)
    }
}

impl CharacterModel for BigramTable {
    fn alphabet_size(&self) -> usize {
        self.first.len()
    }

    fn first_char_probability(&self, c: usize) -> f64 {
        self.first[c]
    }

    fn second_char_probability(&self, prev: usize, c: usize) -> f64 {
        self.second[[prev, c]]
    }
}

/// Turns model probabilities into additive log-space bonuses for the beam
/// recurrence.
#[derive(Clone, Copy)]
pub struct LanguageModelScorer<'a> {
    model: &'a dyn CharacterModel,
    weight: f32,
    min_probability: f32,
    blank: usize,
}

impl<'a> LanguageModelScorer<'a> {
    pub fn new(
        model: &'a dyn CharacterModel,
        weight: f32,
        min_probability: f32,
        blank: usize,
    ) -> Self {
        Self {
            model,
            weight,
            min_probability,
            blank,
        }
    }

    #[inline]
    fn alphabet_index(&self, label: usize) -> usize {
        if label < self.blank {
            label
        } else {
            label - 1
        }
    }

    /// Bonus for appending class `label` after a prefix ending in class
    /// `parent`. A `parent` equal to the blank index means the prefix is
    /// empty.
    pub fn bonus(&self, parent: usize, label: usize) -> f32 {
        if self.weight == 0.0 {
            return 0.0;
        }

        let c = self.alphabet_index(label);
        let p = if parent == self.blank {
            self.model.first_char_probability(c)
        } else {
            self.model
                .second_char_probability(self.alphabet_index(parent), c)
        };

        self.weight * (p as f32).max(self.min_probability).ln()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> BigramTable {
        BigramTable::new(vec![0.7, 0.3], vec![0.1, 0.9, 0.6, 0.4]).unwrap()
    }

    #[test]
    fn scorer_skips_blank_slot() {
        let t = table();
        // blank sits between the two characters
        let scorer = LanguageModelScorer::new(&t, 1.0, 1e-6, 1);
        assert!((scorer.bonus(1, 2) - 0.3f32.ln()).abs() < 1e-6);
        assert!((scorer.bonus(0, 2) - 0.9f32.ln()).abs() < 1e-6);
        assert!((scorer.bonus(2, 0) - 0.6f32.ln()).abs() < 1e-6);
    }

    #[test]
    fn scorer_floors_zero_probability() {
        let t = BigramTable::new(vec![0.0, 1.0], vec![0.0; 4]).unwrap();
        let scorer = LanguageModelScorer::new(&t, 0.25, 1e-6, 0);
        let bonus = scorer.bonus(0, 1);
        assert!(bonus.is_finite());
        assert!((bonus - 0.25 * 1e-6f32.ln()).abs() < 1e-4);
    }

    #[test]
    fn zero_weight_is_exactly_zero() {
        let t = BigramTable::new(vec![0.0, 1.0], vec![0.0; 4]).unwrap();
        let scorer = LanguageModelScorer::new(&t, 0.0, 1e-6, 0);
        assert_eq!(scorer.bonus(0, 1), 0.0);
        assert_eq!(scorer.bonus(1, 2), 0.0);
    }
}
