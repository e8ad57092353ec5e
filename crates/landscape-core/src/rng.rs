use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha12Rng;

use crate::constants::{POISSON_CHUNK_MEAN, RNG_DERIVATION_PRIME};

/// Create a deterministic RNG from a seed.
pub fn create_rng(seed: u64) -> ChaCha12Rng {
    ChaCha12Rng::seed_from_u64(seed)
}

/// Derive a sub-RNG for a numbered stream, ensuring independent sequences
/// for e.g. initial placement and the generation loop.
pub fn derive_stream_rng(base_seed: u64, stream: u64) -> ChaCha12Rng {
    ChaCha12Rng::seed_from_u64(base_seed.wrapping_add(stream.wrapping_mul(RNG_DERIVATION_PRIME)))
}

/// Random draws consumed by the mating rule and the reference driver.
///
/// Every operation that needs randomness takes a `&mut impl RandomSource`;
/// there is no hidden global generator. Implemented for every [`rand::Rng`].
pub trait RandomSource {
    /// Uniform draw in `[0, 1)`.
    fn uniform(&mut self) -> f64;

    /// Gaussian draw with mean 0 and the given standard deviation.
    fn gaussian(&mut self, std_dev: f64) -> f64;

    /// Poisson-distributed count with the given mean.
    fn poisson(&mut self, mean: f64) -> u32;

    /// Uniform draw in `[low, high)`.
    fn uniform_range(&mut self, low: f64, high: f64) -> f64 {
        low + (high - low) * self.uniform()
    }
}

impl<R: Rng + ?Sized> RandomSource for R {
    fn uniform(&mut self) -> f64 {
        self.random::<f64>()
    }

    fn gaussian(&mut self, std_dev: f64) -> f64 {
        // Box-Muller; u1 is kept away from zero so ln stays finite.
        let u1 = self.random::<f64>().max(f64::EPSILON);
        let u2 = self.random::<f64>();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        z * std_dev
    }

    fn poisson(&mut self, mean: f64) -> u32 {
        if !(mean.is_finite() && mean > 0.0) {
            return 0;
        }
        let mut remaining = mean;
        let mut total = 0u32;
        while remaining > 0.0 {
            let chunk = remaining.min(POISSON_CHUNK_MEAN);
            remaining -= chunk;
            let limit = (-chunk).exp();
            let mut product = self.random::<f64>();
            while product > limit {
                total = total.saturating_add(1);
                product *= self.random::<f64>();
            }
        }
        total
    }
}
