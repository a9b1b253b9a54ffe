use ndarray::ArrayView2;

use crate::error::DecodeError;
use crate::language_model::{CharacterModel, LanguageModelScorer};
use crate::log_space::{log_add_exp, LOG_ZERO};

use super::config::DecoderConfig;
use super::session::DecoderSession;
use super::state::Hypothesis;

/// Per-call settings shared by every batch item.
#[derive(Clone, Copy)]
pub(crate) struct SearchParams<'a> {
    pub blank: usize,
    pub extension_floor: f32,
    pub scorer: Option<LanguageModelScorer<'a>>,
}

impl<'a> SearchParams<'a> {
    pub fn new(config: &DecoderConfig, language_model: Option<&'a dyn CharacterModel>) -> Self {
        Self {
            blank: config.blank_index,
            extension_floor: config.extension_floor.unwrap_or(LOG_ZERO),
            scorer: language_model.map(|model| {
                LanguageModelScorer::new(
                    model,
                    config.lm_weight,
                    config.lm_min_probability,
                    config.blank_index,
                )
            }),
        }
    }

    #[inline]
    fn bonus(&self, parent: usize, label: usize) -> f32 {
        self.scorer.map_or(0.0, |s| s.bonus(parent, label))
    }
}

pub(crate) fn validate_classes(num_classes: usize, blank: usize) -> Result<(), DecodeError> {
    if num_classes == 0 {
        return Err(DecodeError::EmptyClassAxis);
    }
    if blank >= num_classes {
        return Err(DecodeError::BlankIndexOutOfRange { blank, num_classes });
    }
    Ok(())
}

/// Checks the length and the valid rows of one `[time, classes]` slice
/// before any search work starts.
pub(crate) fn validate_item(
    emissions: ArrayView2<f32>,
    length: usize,
    item: usize,
) -> Result<(), DecodeError> {
    let max_time = emissions.nrows();
    if length > max_time {
        return Err(DecodeError::LengthOutOfRange {
            item,
            length,
            max_time,
        });
    }
    for (time, row) in emissions.outer_iter().take(length).enumerate() {
        if let Some(class) = row.iter().position(|v| v.is_nan() || *v == f32::INFINITY) {
            return Err(DecodeError::NonFiniteEmission { item, time, class });
        }
    }
    Ok(())
}

pub(crate) fn decode_item_beam(
    session: &mut DecoderSession,
    emissions: ArrayView2<f32>,
    length: usize,
    params: &SearchParams,
) -> Result<Hypothesis, DecodeError> {
    let DecoderSession {
        tree,
        beam,
        branches,
        stats,
    } = session;
    let num_classes = emissions.ncols();
    let blank = params.blank;

    tree.clear();
    beam.clear();
    let root = tree.add_root(blank);
    beam.push(tree[root].current.total, root);
    stats.reset(length);

    for t in 0..length {
        let row = emissions.row(t);

        beam.snapshot_into(branches);
        beam.clear();
        tree.collect(branches);

        for &b in branches.iter() {
            let node = &mut tree[b];
            node.previous = node.current;
        }

        // Paths that emit nothing new: repeat the last label or a blank.
        for &b in branches.iter() {
            let (label, parent) = (tree[b].label, tree[b].parent);
            if let Some(parent) = parent {
                let p = &tree[parent];
                if p.is_active() {
                    // Plabel(l=acc @ t) += Pblank(l=ac @ t-1)
                    // Plabel(l=abc @ t) += P(l=ab @ t-1)
                    let mut prev = if label == p.label {
                        p.previous.blank
                    } else {
                        p.previous.total
                    };
                    prev += params.bonus(p.label, label);
                    let node = &mut tree[b];
                    node.current.label = log_add_exp(node.current.label, prev);
                }
                tree[b].current.label += row[label];
            }

            let node = &mut tree[b];
            node.current.blank = node.previous.total + row[blank];
            node.current.combine();

            // At most `capacity` branches, so nothing is evicted here.
            let score = node.current.total;
            beam.push(score, b);
        }

        // Paths that append one new label.
        for &b in branches.iter() {
            let b_label = tree[b].label;
            let b_total = tree[b].previous.total;
            if b_total <= LOG_ZERO || (beam.is_full() && b_total <= beam.min()?.score) {
                continue;
            }

            for c in 0..num_classes {
                if c == blank {
                    continue;
                }
                let logit = row[c];
                if logit <= params.extension_floor {
                    continue;
                }

                // `b` is zeroed once evicted by one of its own children.
                let previous = tree[b].previous;
                if previous.total <= LOG_ZERO {
                    break;
                }

                let child = tree.get_child(b, c);
                if tree[child].is_active() {
                    continue;
                }

                // Plabel(l=abcc @ t) = Pblank(l=abc @ t-1) * P(c @ t)
                // Plabel(l=abcd @ t) = P(l=abc @ t-1) * P(d @ t)
                let mut prev = if b_label == c {
                    previous.blank
                } else {
                    previous.total
                };
                prev += params.bonus(b_label, c);

                let node = &mut tree[child];
                node.current.blank = LOG_ZERO;
                node.current.label = prev + logit;
                node.current.total = node.current.label;
                let total = node.current.total;

                if total > LOG_ZERO && (!beam.is_full() || total > beam.min()?.score) {
                    if let Some(evicted) = beam.push(total, child) {
                        tree.delete(evicted, false);
                    }
                } else {
                    tree.delete(child, false);
                }
            }
        }

        stats.peak_live_nodes = stats.peak_live_nodes.max(tree.live_count());
        log::trace!(
            "t={t}: {} hypotheses, {} live nodes",
            beam.len(),
            tree.live_count()
        );
    }

    let mut best = None;
    for entry in beam.entries() {
        if best.map_or(true, |(score, _)| entry.score > score) {
            best = Some((entry.score, entry.item));
        }
    }

    let hypothesis = match best.filter(|&(score, _)| score > LOG_ZERO) {
        Some((score, id)) => Hypothesis {
            labels: tree.label_sequence(id),
            log_probability: score,
        },
        None => {
            log::warn!("All hypotheses reached zero probability after {length} timesteps");
            Hypothesis {
                labels: Vec::new(),
                log_probability: LOG_ZERO,
            }
        }
    };

    beam.snapshot_into(branches);
    for &b in branches.iter() {
        tree.delete(b, false);
    }
    beam.clear();
    tree.collect(&[]);
    stats.left_after_teardown = tree.live_count();
    stats.slots = tree.slot_count();
    tree.clear();

    Ok(hypothesis)
}

/// Arg-max path with repeats merged and blanks dropped.
pub(crate) fn decode_item_greedy(
    emissions: ArrayView2<f32>,
    length: usize,
    blank: usize,
) -> Vec<usize> {
    let mut labels = Vec::with_capacity(length / 2);
    let mut last = None;

    for row in emissions.outer_iter().take(length) {
        let mut max = 0;
        for (k, &v) in row.iter().enumerate().skip(1) {
            if v > row[max] {
                max = k;
            }
        }
        if last != Some(max) && max != blank {
            labels.push(max);
        }
        last = Some(max);
    }

    labels
}
