//! Probability arithmetic in natural-log space.

/// `ln(0)`, the additive identity of [`log_add_exp`].
pub const LOG_ZERO: f32 = f32::NEG_INFINITY;
/// `ln(1)`.
pub const LOG_ONE: f32 = 0.0;

/// `ln(exp(a) + exp(b))` without leaving log space.
#[inline]
pub fn log_add_exp(a: f32, b: f32) -> f32 {
    if a == LOG_ZERO {
        return b;
    }
    if b == LOG_ZERO {
        return a;
    }

    let (hi, lo) = if a > b { (a, b) } else { (b, a) };
    hi + (lo - hi).exp().ln_1p()
}

/// `ln(exp(a) - exp(b))`, clamped to [`LOG_ZERO`] when `b` would exceed `a`.
#[inline]
pub fn log_sub_exp(a: f32, b: f32) -> f32 {
    if a == LOG_ZERO || a < b {
        return LOG_ZERO;
    }
    if b == LOG_ZERO {
        return a;
    }

    a + (-(b - a).exp()).ln_1p()
}

/// Label/blank split of one hypothesis' probability mass at one timestep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogProbability {
    pub total: f32,
    pub blank: f32,
    pub label: f32,
}

impl Default for LogProbability {
    fn default() -> Self {
        Self {
            total: LOG_ZERO,
            blank: LOG_ZERO,
            label: LOG_ZERO,
        }
    }
}

impl LogProbability {
    /// Probability mass of the empty prefix before the first timestep.
    pub const fn certain_blank() -> Self {
        Self {
            total: LOG_ONE,
            blank: LOG_ONE,
            label: LOG_ZERO,
        }
    }

    #[inline]
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Recomputes `total` from the two components.
    #[inline]
    pub fn combine(&mut self) {
        self.total = log_add_exp(self.blank, self.label);
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.total == LOG_ZERO
    }
}
