use ndarray::Array2;

/// Best label sequence found for one batch item.
#[derive(Debug, Clone, PartialEq)]
pub struct Hypothesis {
    /// Class indices, blanks removed and repeats merged.
    pub labels: Vec<usize>,
    /// Natural-log probability the search assigned to `labels`.
    pub log_probability: f32,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DecodedBatch {
    pub hypotheses: Vec<Hypothesis>,
}

impl DecodedBatch {
    pub fn len(&self) -> usize {
        self.hypotheses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hypotheses.is_empty()
    }

    pub fn sequences(&self) -> Vec<Vec<usize>> {
        self.hypotheses.iter().map(|h| h.labels.clone()).collect()
    }

    pub fn lengths(&self) -> Vec<usize> {
        self.hypotheses.iter().map(|h| h.labels.len()).collect()
    }

    /// Packs all sequences into a `[batch, longest]` matrix filled with
    /// `pad` past each sequence's end.
    pub fn padded(&self, pad: usize) -> (Array2<usize>, Vec<usize>) {
        let lengths = self.lengths();
        let width = lengths.iter().copied().max().unwrap_or(0);
        let mut out = Array2::from_elem((self.hypotheses.len(), width), pad);
        for (mut row, h) in out.outer_iter_mut().zip(&self.hypotheses) {
            for (slot, &label) in row.iter_mut().zip(&h.labels) {
                *slot = label;
            }
        }
        (out, lengths)
    }
}

impl IntoIterator for DecodedBatch {
    type Item = Hypothesis;
    type IntoIter = std::vec::IntoIter<Hypothesis>;

    fn into_iter(self) -> Self::IntoIter {
        self.hypotheses.into_iter()
    }
}
