use std::{error::Error, fmt};

#[derive(Debug, Clone, PartialEq)]
pub enum SamplerError {
    /// A weight was negative, NaN or infinite.
    InvalidWeight { index: usize, value: f64 },
    /// The weights sum to a non-finite value.
    WeightOverflow,
    /// No weights were supplied.
    Empty,
}

impl fmt::Display for SamplerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SamplerError::InvalidWeight { index, value } => write!(
                f,
                "weight at index {index} is {value}; weights must be finite and non-negative"
            ),
            SamplerError::WeightOverflow => write!(f, "sum of weights is not finite"),
            SamplerError::Empty => write!(f, "cannot sample from an empty weight set"),
        }
    }
}

impl Error for SamplerError {}

/// Proportional sampler over a fixed weight vector.
///
/// Building is O(n) (prefix sums); each draw is one binary search, O(log n).
/// A draw `u` in `[0,1)` is scaled to `[0, total)` and the first index whose
/// cumulative weight strictly exceeds it wins; the last index with non-zero
/// weight absorbs rounding at the upper edge. When every weight is zero the
/// sampler falls back to a uniform choice over all indices.
#[derive(Clone, Debug)]
pub struct WeightedSampler {
    cumulative: Vec<f64>,
    total: f64,
}

impl WeightedSampler {
    /// A sampler with no weights; every draw returns `None` until rebuilt.
    pub fn empty() -> Self {
        Self {
            cumulative: Vec::new(),
            total: 0.0,
        }
    }

    pub fn new(weights: &[f64]) -> Result<Self, SamplerError> {
        let mut sampler = Self {
            cumulative: Vec::with_capacity(weights.len()),
            total: 0.0,
        };
        sampler.rebuild(weights.iter().copied())?;
        Ok(sampler)
    }

    /// Rebuild in place, reusing the prefix-sum allocation.
    ///
    /// On error the sampler is left empty.
    pub fn rebuild<I>(&mut self, weights: I) -> Result<(), SamplerError>
    where
        I: IntoIterator<Item = f64>,
    {
        self.cumulative.clear();
        self.total = 0.0;
        let mut running = 0.0f64;
        for (index, value) in weights.into_iter().enumerate() {
            if !(value.is_finite() && value >= 0.0) {
                self.cumulative.clear();
                return Err(SamplerError::InvalidWeight { index, value });
            }
            running += value;
            self.cumulative.push(running);
        }
        if self.cumulative.is_empty() {
            return Err(SamplerError::Empty);
        }
        if !running.is_finite() {
            self.cumulative.clear();
            return Err(SamplerError::WeightOverflow);
        }
        self.total = running;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.cumulative.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cumulative.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.total
    }

    /// True when all weights are zero and draws are uniform over indices.
    pub fn is_degenerate(&self) -> bool {
        !self.cumulative.is_empty() && self.total <= 0.0
    }

    /// Map a uniform draw in `[0,1)` to an index.
    ///
    /// Returns `None` only for an empty sampler.
    pub fn sample(&self, uniform: f64) -> Option<usize> {
        let n = self.cumulative.len();
        if n == 0 {
            return None;
        }
        let u = if uniform.is_finite() {
            uniform.clamp(0.0, 1.0)
        } else {
            0.0
        };
        if self.total <= 0.0 {
            return Some(((u * n as f64) as usize).min(n - 1));
        }
        let target = u * self.total;
        let idx = self.cumulative.partition_point(|&c| c <= target);
        if idx < n {
            return Some(idx);
        }
        // Rounding pushed the target onto the final cumulative value: take
        // the last index that actually carries weight.
        Some(self.last_weighted_index())
    }

    fn last_weighted_index(&self) -> usize {
        let n = self.cumulative.len();
        (1..n)
            .rev()
            .find(|&i| self.cumulative[i] > self.cumulative[i - 1])
            .unwrap_or(0)
    }
}
