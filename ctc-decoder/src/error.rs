use thiserror::Error;

/// Errors surfaced by the decoder. Every precondition is checked before the
/// first timestep runs, so a failed call never yields partial output.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Beam width must be at least 1, got {0}")]
    InvalidBeamWidth(usize),

    #[error("Blank index {blank} is outside the class axis of size {num_classes}")]
    BlankIndexOutOfRange { blank: usize, num_classes: usize },

    #[error("Emission tensor has an empty class axis")]
    EmptyClassAxis,

    #[error("Expected {expected} sequence lengths, got {actual}")]
    LengthsMismatch { expected: usize, actual: usize },

    #[error("Length {length} of batch item {item} exceeds the time axis ({max_time})")]
    LengthOutOfRange {
        item: usize,
        length: usize,
        max_time: usize,
    },

    #[error("Emission at item {item}, time {time}, class {class} is NaN or +inf")]
    NonFiniteEmission {
        item: usize,
        time: usize,
        class: usize,
    },

    #[error("Language model alphabet has {actual} characters, decoder expects {expected}")]
    AlphabetMismatch { expected: usize, actual: usize },

    #[error("Adjustment references class {class}, but there are only {num_classes}")]
    AdjustmentClassOutOfRange { class: usize, num_classes: usize },

    #[error("Adjustment fractions must lie in [0, 1] and move at most all of a class, got {0}")]
    InvalidAdjustment(f32),

    #[error("Invalid decoder setting: {0}")]
    InvalidSetting(String),

    #[error("Beam list is empty")]
    EmptyBeam,

    #[error("ndarray shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("A decoder worker thread panicked")]
    WorkerPanicked,
}

impl DecodeError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::InvalidBeamWidth(_) | Self::InvalidSetting(_) => {
                "The decoder settings are invalid. Check the beam width and language model weights."
            }
            Self::BlankIndexOutOfRange { .. }
            | Self::EmptyClassAxis
            | Self::LengthsMismatch { .. }
            | Self::LengthOutOfRange { .. }
            | Self::Shape(_) => "The recognizer output does not have the expected shape.",
            Self::NonFiniteEmission { .. } => {
                "The recognizer produced invalid probabilities for this line."
            }
            Self::AlphabetMismatch { .. } => {
                "The language model does not match the recognizer's character set."
            }
            Self::AdjustmentClassOutOfRange { .. } | Self::InvalidAdjustment(_) => {
                "The character confusion table is invalid."
            }
            Self::Io(_) | Self::Json(_) => "Could not read the language model file.",
            Self::EmptyBeam | Self::WorkerPanicked => {
                "The decoder hit an internal error. Please report this line."
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_variant_has_a_user_message() {
        let errors = [
            DecodeError::InvalidBeamWidth(0),
            DecodeError::BlankIndexOutOfRange {
                blank: 4,
                num_classes: 3,
            },
            DecodeError::EmptyClassAxis,
            DecodeError::LengthsMismatch {
                expected: 2,
                actual: 1,
            },
            DecodeError::NonFiniteEmission {
                item: 0,
                time: 0,
                class: 0,
            },
            DecodeError::AlphabetMismatch {
                expected: 2,
                actual: 3,
            },
            DecodeError::InvalidAdjustment(2.0),
            DecodeError::EmptyBeam,
            DecodeError::WorkerPanicked,
        ];
        for err in errors {
            assert!(!err.user_message().is_empty());
        }
    }

    #[test]
    fn display_includes_details() {
        let err = DecodeError::LengthOutOfRange {
            item: 1,
            length: 9,
            max_time: 4,
        };
        let display = err.to_string();
        assert!(display.contains('9'));
        assert!(display.contains("item 1"));
    }
}
