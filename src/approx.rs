//! Approximate floating-point comparison for checks.
//!
//! Two values compare equal when
//! `|lhs - rhs| < epsilon * (scale + max(|lhs|, |rhs|))`.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Approx {
    value: f64,
    epsilon: f64,
    scale: f64,
}

impl Approx {
    pub const DEFAULT_EPSILON: f64 = f32::EPSILON as f64 * 100.0;

    pub fn new(value: f64) -> Self {
        Self {
            value,
            epsilon: Self::DEFAULT_EPSILON,
            scale: 1.0,
        }
    }

    pub fn epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    pub fn scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    pub fn matches(&self, other: f64) -> bool {
        let margin = self.epsilon * (self.scale + other.abs().max(self.value.abs()));
        (other - self.value).abs() < margin
    }
}

impl PartialEq<Approx> for f64 {
    fn eq(&self, other: &Approx) -> bool {
        other.matches(*self)
    }
}

impl PartialEq<f64> for Approx {
    fn eq(&self, other: &f64) -> bool {
        self.matches(*other)
    }
}

impl fmt::Display for Approx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Approx({} ± {:.2})",
            self.value,
            self.epsilon * (self.scale + self.value)
        )
    }
}
