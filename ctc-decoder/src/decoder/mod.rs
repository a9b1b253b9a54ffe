//! CTC prefix beam search over `[batch, time, classes]` log-probabilities.

use std::sync::Arc;
use std::thread;
use std::time::Instant;

use ndarray::{Array3, ArrayView3, Axis};

use crate::adjustment::EmissionAdjustment;
use crate::error::DecodeError;
use crate::language_model::CharacterModel;

pub mod beam_list;
pub mod config;
pub(crate) mod search;
pub mod session;
pub mod state;
pub mod tree;

pub use beam_list::{BoundedBeam, Scored};
pub use config::DecoderConfig;
pub use session::{DecoderSession, SearchStats};
pub use state::{DecodedBatch, Hypothesis};
pub use tree::{BeamNode, BeamTree, NodeId};

use search::SearchParams;

pub struct CtcBeamDecoder {
    config: DecoderConfig,
    language_model: Option<Arc<dyn CharacterModel>>,
    adjustment: Option<EmissionAdjustment>,
}

impl CtcBeamDecoder {
    pub fn new(config: DecoderConfig) -> Result<Self, DecodeError> {
        config.validate()?;
        Ok(Self {
            config,
            language_model: None,
            adjustment: None,
        })
    }

    pub fn with_language_model(mut self, model: Arc<dyn CharacterModel>) -> Self {
        self.language_model = Some(model);
        self
    }

    pub fn with_adjustment(mut self, adjustment: EmissionAdjustment) -> Self {
        self.adjustment = (!adjustment.is_empty()).then_some(adjustment);
        self
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Decodes every batch item; `lengths[i]` is the number of valid
    /// timesteps of item `i`.
    pub fn decode(
        &self,
        emissions: ArrayView3<f32>,
        lengths: &[usize],
    ) -> Result<DecodedBatch, DecodeError> {
        let start = Instant::now();
        self.validate(emissions, lengths)?;

        let adjusted: Option<Array3<f32>> = match &self.adjustment {
            Some(adjustment) => Some(adjustment.apply(emissions)?),
            None => None,
        };
        let emissions = match &adjusted {
            Some(a) => a.view(),
            None => emissions.reborrow(),
        };

        let params = SearchParams::new(&self.config, self.language_model.as_deref());
        let workers = self.config.resolve_threads(lengths.len());
        let hypotheses = if workers <= 1 {
            self.decode_range(emissions, lengths, 0..lengths.len(), &params)?
        } else {
            self.decode_parallel(emissions, lengths, workers, &params)?
        };

        log::info!(
            "Decoded {} lines (beam width {}, {} worker(s)) in {:?}",
            hypotheses.len(),
            self.config.beam_width,
            workers,
            start.elapsed()
        );
        Ok(DecodedBatch { hypotheses })
    }

    /// Same as [`CtcBeamDecoder::decode`] for a flat row-major buffer.
    pub fn decode_flat(
        &self,
        data: &[f32],
        shape: (usize, usize, usize),
        lengths: &[usize],
    ) -> Result<DecodedBatch, DecodeError> {
        let emissions = ArrayView3::from_shape(shape, data)?;
        self.decode(emissions, lengths)
    }

    /// Best-path decoding: per-timestep arg-max, repeats merged, blanks
    /// dropped. Ignores the language model and beam width.
    pub fn decode_greedy(
        &self,
        emissions: ArrayView3<f32>,
        lengths: &[usize],
    ) -> Result<Vec<Vec<usize>>, DecodeError> {
        self.validate_shape(emissions, lengths)?;
        Ok(emissions
            .outer_iter()
            .zip(lengths)
            .map(|(item, &length)| {
                search::decode_item_greedy(item, length, self.config.blank_index)
            })
            .collect())
    }

    fn validate_shape(
        &self,
        emissions: ArrayView3<f32>,
        lengths: &[usize],
    ) -> Result<(), DecodeError> {
        search::validate_classes(emissions.len_of(Axis(2)), self.config.blank_index)?;
        let batch = emissions.len_of(Axis(0));
        if lengths.len() != batch {
            return Err(DecodeError::LengthsMismatch {
                expected: batch,
                actual: lengths.len(),
            });
        }
        for (item, (slice, &length)) in emissions.outer_iter().zip(lengths).enumerate() {
            search::validate_item(slice, length, item)?;
        }
        Ok(())
    }

    fn validate(&self, emissions: ArrayView3<f32>, lengths: &[usize]) -> Result<(), DecodeError> {
        self.validate_shape(emissions, lengths)?;

        let num_classes = emissions.len_of(Axis(2));
        if let Some(model) = &self.language_model {
            if model.alphabet_size() != num_classes - 1 {
                return Err(DecodeError::AlphabetMismatch {
                    expected: num_classes - 1,
                    actual: model.alphabet_size(),
                });
            }
        }
        if let Some(adjustment) = &self.adjustment {
            adjustment.validate(num_classes)?;
        }
        Ok(())
    }

    fn decode_range(
        &self,
        emissions: ArrayView3<f32>,
        lengths: &[usize],
        items: std::ops::Range<usize>,
        params: &SearchParams,
    ) -> Result<Vec<Hypothesis>, DecodeError> {
        let mut session = DecoderSession::new(self.config.beam_width)?;
        items
            .map(|i| session.run(emissions.index_axis(Axis(0), i), lengths[i], params))
            .collect()
    }

    /// Splits the batch into contiguous chunks, one scoped thread and one
    /// session per chunk, and reassembles results in batch order.
    fn decode_parallel(
        &self,
        emissions: ArrayView3<f32>,
        lengths: &[usize],
        workers: usize,
        params: &SearchParams,
    ) -> Result<Vec<Hypothesis>, DecodeError> {
        let batch = lengths.len();
        let chunk = batch.div_ceil(workers);

        let results: Vec<Result<Vec<Hypothesis>, DecodeError>> = thread::scope(|scope| {
            let handles: Vec<_> = (0..batch)
                .step_by(chunk)
                .map(|start| {
                    let end = (start + chunk).min(batch);
                    scope.spawn(move || self.decode_range(emissions, lengths, start..end, params))
                })
                .collect();

            handles
                .into_iter()
                .map(|handle| {
                    handle.join().unwrap_or_else(|_| {
                        log::error!("Decoder worker panicked");
                        Err(DecodeError::WorkerPanicked)
                    })
                })
                .collect()
        });

        let mut hypotheses = Vec::with_capacity(batch);
        for result in results {
            hypotheses.extend(result?);
        }
        Ok(hypotheses)
    }
}
