use ndarray::ArrayView2;

use crate::error::DecodeError;
use crate::language_model::CharacterModel;

use super::beam_list::BoundedBeam;
use super::config::DecoderConfig;
use super::search::{self, SearchParams};
use super::state::Hypothesis;
use super::tree::{BeamTree, NodeId};

/// Bookkeeping from the most recent item decoded by a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    pub timesteps: usize,
    pub peak_live_nodes: usize,
    /// Nodes still reachable from the root after the final beam was deleted.
    /// 1 when the delete cascade took the whole tree apart.
    pub left_after_teardown: usize,
    pub slots: usize,
}

impl SearchStats {
    pub(crate) fn reset(&mut self, timesteps: usize) {
        *self = Self {
            timesteps,
            peak_live_nodes: 1,
            ..Default::default()
        };
    }
}

/// Reusable search workspace: one prefix tree and one bounded beam, used for
/// one batch item at a time.
pub struct DecoderSession {
    pub(crate) tree: BeamTree,
    pub(crate) beam: BoundedBeam<NodeId>,
    pub(crate) branches: Vec<NodeId>,
    pub(crate) stats: SearchStats,
}

impl DecoderSession {
    pub fn new(beam_width: usize) -> Result<Self, DecodeError> {
        Ok(Self {
            tree: BeamTree::new(),
            beam: BoundedBeam::new(beam_width)?,
            branches: Vec::with_capacity(beam_width),
            stats: SearchStats::default(),
        })
    }

    pub fn beam_width(&self) -> usize {
        self.beam.capacity()
    }

    /// Decodes one `[time, classes]` slice using its first `length` rows.
    pub fn decode_item(
        &mut self,
        emissions: ArrayView2<f32>,
        length: usize,
        config: &DecoderConfig,
        language_model: Option<&dyn CharacterModel>,
    ) -> Result<Hypothesis, DecodeError> {
        config.validate()?;
        if config.beam_width != self.beam_width() {
            return Err(DecodeError::InvalidSetting(format!(
                "session was built for beam width {}, config asks for {}",
                self.beam_width(),
                config.beam_width
            )));
        }
        search::validate_classes(emissions.ncols(), config.blank_index)?;
        search::validate_item(emissions, length, 0)?;
        if let Some(model) = language_model {
            let expected = emissions.ncols() - 1;
            if model.alphabet_size() != expected {
                return Err(DecodeError::AlphabetMismatch {
                    expected,
                    actual: model.alphabet_size(),
                });
            }
        }

        let params = SearchParams::new(config, language_model);
        self.run(emissions, length, &params)
    }

    pub(crate) fn run(
        &mut self,
        emissions: ArrayView2<f32>,
        length: usize,
        params: &SearchParams,
    ) -> Result<Hypothesis, DecodeError> {
        let hypothesis = search::decode_item_beam(self, emissions, length, params)?;
        log::debug!(
            "Decoded {} timesteps into {} labels (log p = {:.3}); peak {} nodes, {} left after teardown",
            self.stats.timesteps,
            hypothesis.labels.len(),
            hypothesis.log_probability,
            self.stats.peak_live_nodes,
            self.stats.left_after_teardown
        );
        Ok(hypothesis)
    }

    pub fn last_stats(&self) -> SearchStats {
        self.stats
    }

    /// The prefix tree; empty between items.
    pub fn tree(&self) -> &BeamTree {
        &self.tree
    }
}
