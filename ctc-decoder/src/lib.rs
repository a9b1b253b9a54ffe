//! Decoding of per-timestep class log-probabilities from a text-line
//! recognizer into label sequences, using CTC prefix beam search with
//! optional bigram character language model re-ranking.

pub mod adjustment;
pub mod decoder;
pub mod error;
pub mod language_model;
pub mod log_space;

pub use adjustment::{ClassShift, EmissionAdjustment};
pub use decoder::{CtcBeamDecoder, DecodedBatch, DecoderConfig, DecoderSession, Hypothesis};
pub use error::DecodeError;
pub use language_model::{BigramTable, CharacterModel, LanguageModelScorer};
