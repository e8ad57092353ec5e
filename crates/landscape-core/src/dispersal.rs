use std::{error::Error, fmt};

use crate::constants::{DOMAIN_MAX, DOMAIN_MIN};
use crate::rng::RandomSource;

#[derive(Debug, Clone, PartialEq)]
pub enum DispersalError {
    /// Dispersal standard deviation must be finite and non-negative.
    InvalidSpread(f64),
    /// A parent coordinate was NaN or infinite.
    InvalidPosition { position: [f64; 2] },
}

impl fmt::Display for DispersalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispersalError::InvalidSpread(v) => {
                write!(f, "dispersal ({v}) must be finite and non-negative")
            }
            DispersalError::InvalidPosition { position } => write!(
                f,
                "parent position ({}, {}) is not finite",
                position[0], position[1]
            ),
        }
    }
}

impl Error for DispersalError {}

/// Gaussian offspring placement around the parental midpoint.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DispersalModel {
    std_dev: f64,
}

impl DispersalModel {
    pub fn new(std_dev: f64) -> Result<Self, DispersalError> {
        if !(std_dev.is_finite() && std_dev >= 0.0) {
            return Err(DispersalError::InvalidSpread(std_dev));
        }
        Ok(Self { std_dev })
    }

    pub fn std_dev(&self) -> f64 {
        self.std_dev
    }

    /// Midpoint of the parents plus an independent Gaussian offset on each
    /// axis, clamped into the unit square. Draws x before y.
    pub fn offspring_position<R: RandomSource + ?Sized>(
        &self,
        rng: &mut R,
        parent1: [f64; 2],
        parent2: [f64; 2],
    ) -> Result<[f64; 2], DispersalError> {
        for p in [parent1, parent2] {
            if !p.iter().all(|c| c.is_finite()) {
                return Err(DispersalError::InvalidPosition { position: p });
            }
        }
        let x = midpoint(parent1[0], parent2[0]) + rng.gaussian(self.std_dev);
        let y = midpoint(parent1[1], parent2[1]) + rng.gaussian(self.std_dev);
        Ok([clamp_to_domain(x), clamp_to_domain(y)])
    }
}

fn midpoint(a: f64, b: f64) -> f64 {
    (a + b) / 2.0
}

/// Clamp one coordinate into `[DOMAIN_MIN, DOMAIN_MAX]`.
pub fn clamp_to_domain(v: f64) -> f64 {
    if v < DOMAIN_MIN {
        DOMAIN_MIN
    } else if v > DOMAIN_MAX {
        DOMAIN_MAX
    } else {
        v
    }
}
