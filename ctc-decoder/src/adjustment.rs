//! Redistribution of emission mass between visually confusable classes.

use std::collections::HashMap;

use ndarray::{Array3, ArrayView3, Axis};
use serde::{Deserialize, Serialize};

use crate::error::DecodeError;
use crate::log_space::{log_add_exp, log_sub_exp, LOG_ZERO};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassShift {
    pub from: usize,
    pub to: usize,
    /// Share of `from`'s probability moved onto `to`, in `[0, 1]`.
    pub fraction: f32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmissionAdjustment {
    pub shifts: Vec<ClassShift>,
}

impl EmissionAdjustment {
    pub fn new(shifts: Vec<ClassShift>) -> Self {
        Self { shifts }
    }

    pub fn is_empty(&self) -> bool {
        self.shifts.is_empty()
    }

    /// Every class must exist, and the fractions moved out of any one class
    /// must add up to at most 1.
    pub fn validate(&self, num_classes: usize) -> Result<(), DecodeError> {
        let mut outgoing: HashMap<usize, f32> = HashMap::new();
        for shift in &self.shifts {
            for class in [shift.from, shift.to] {
                if class >= num_classes {
                    return Err(DecodeError::AdjustmentClassOutOfRange { class, num_classes });
                }
            }
            if !(0.0..=1.0).contains(&shift.fraction) {
                return Err(DecodeError::InvalidAdjustment(shift.fraction));
            }
            if shift.from != shift.to {
                *outgoing.entry(shift.from).or_default() += shift.fraction;
            }
        }
        match outgoing.into_values().find(|&total| total > 1.0 + 1e-6) {
            Some(total) => Err(DecodeError::InvalidAdjustment(total)),
            None => Ok(()),
        }
    }

    /// Returns an adjusted copy of `emissions` (`[batch, time, classes]`).
    /// Moved amounts are measured on the unadjusted row, so the order of the
    /// shifts does not matter.
    pub fn apply(&self, emissions: ArrayView3<f32>) -> Result<Array3<f32>, DecodeError> {
        self.validate(emissions.len_of(Axis(2)))?;

        let mut adjusted = emissions.to_owned();
        let mut moved = Vec::with_capacity(self.shifts.len());
        for mut item in adjusted.outer_iter_mut() {
            for mut row in item.outer_iter_mut() {
                moved.clear();
                moved.extend(self.shifts.iter().map(|s| {
                    if s.fraction == 0.0 {
                        LOG_ZERO
                    } else {
                        row[s.from] + s.fraction.ln()
                    }
                }));

                for (shift, &amount) in self.shifts.iter().zip(&moved) {
                    if amount == LOG_ZERO || shift.from == shift.to {
                        continue;
                    }
                    row[shift.from] = log_sub_exp(row[shift.from], amount);
                    row[shift.to] = log_add_exp(row[shift.to], amount);
                }
            }
        }

        Ok(adjusted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn row_tensor(probs: &[f32]) -> Array3<f32> {
        let logs: Vec<f32> = probs.iter().map(|p| p.ln()).collect();
        Array3::from_shape_vec((1, 1, probs.len()), logs).unwrap()
    }

    #[test]
    fn moves_requested_share() {
        let input = row_tensor(&[0.2, 0.6, 0.2]);
        let adj = EmissionAdjustment::new(vec![ClassShift {
            from: 1,
            to: 2,
            fraction: 0.5,
        }]);
        let out = adj.apply(input.view()).unwrap();
        assert!((out[[0, 0, 1]].exp() - 0.3).abs() < 1e-5);
        assert!((out[[0, 0, 2]].exp() - 0.5).abs() < 1e-5);
        assert!((out[[0, 0, 0]].exp() - 0.2).abs() < 1e-6);
    }

    #[test]
    fn preserves_row_mass() {
        let input = row_tensor(&[0.1, 0.4, 0.5]);
        let adj = EmissionAdjustment::new(vec![
            ClassShift {
                from: 2,
                to: 0,
                fraction: 0.2,
            },
            ClassShift {
                from: 1,
                to: 2,
                fraction: 0.25,
            },
        ]);
        let out = adj.apply(input.view()).unwrap();
        let sum: f32 = out.iter().map(|v| v.exp()).sum();
        assert!((sum - 1.0).abs() < 1e-5);
    }

    #[test]
    fn full_shift_empties_source() {
        let input = row_tensor(&[0.5, 0.5]);
        let adj = EmissionAdjustment::new(vec![ClassShift {
            from: 0,
            to: 1,
            fraction: 1.0,
        }]);
        let out = adj.apply(input.view()).unwrap();
        assert_eq!(out[[0, 0, 0]], LOG_ZERO);
        assert!((out[[0, 0, 1]].exp() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn rejects_bad_shifts() {
        let input = row_tensor(&[0.5, 0.5]);
        let out_of_range = EmissionAdjustment::new(vec![ClassShift {
            from: 0,
            to: 5,
            fraction: 0.1,
        }]);
        assert!(matches!(
            out_of_range.apply(input.view()),
            Err(DecodeError::AdjustmentClassOutOfRange { class: 5, .. })
        ));

        let too_much = EmissionAdjustment::new(vec![ClassShift {
            from: 0,
            to: 1,
            fraction: 1.5,
        }]);
        assert!(matches!(
            too_much.apply(input.view()),
            Err(DecodeError::InvalidAdjustment(_))
        ));
    }

    #[test]
    fn rejects_oversubscribed_source() {
        let input = row_tensor(&[0.2, 0.6, 0.2]);
        let split = |fraction| {
            EmissionAdjustment::new(vec![
                ClassShift {
                    from: 1,
                    to: 0,
                    fraction,
                },
                ClassShift {
                    from: 1,
                    to: 2,
                    fraction,
                },
            ])
        };

        assert!(matches!(
            split(0.7).apply(input.view()),
            Err(DecodeError::InvalidAdjustment(total)) if (total - 1.4).abs() < 1e-6
        ));

        let out = split(0.5).apply(input.view()).unwrap();
        let sum: f32 = out.iter().map(|v| v.exp()).sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert!(out[[0, 0, 1]].exp() < 1e-5);
    }
}
