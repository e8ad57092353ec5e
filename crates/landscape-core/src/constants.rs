/// Lower bound of each axis of the unit-square landscape.
pub const DOMAIN_MIN: f64 = 0.0;

/// Upper bound of each axis of the unit-square landscape.
pub const DOMAIN_MAX: f64 = 1.0;

/// Largest supported population size. Keeps per-generation buffers bounded.
pub const MAX_POPULATION_SIZE: usize = 1_000_000;

/// Prime multiplier used to derive independent RNG streams from a base seed.
pub const RNG_DERIVATION_PRIME: u64 = 7919;

/// Largest mean handled by a single Knuth product loop; larger means are
/// drawn as a sum of independent chunks so `exp(-mean)` never underflows.
pub const POISSON_CHUNK_MEAN: f64 = 30.0;
