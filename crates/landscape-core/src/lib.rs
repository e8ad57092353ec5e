pub mod config;
pub mod constants;
pub mod dispersal;
pub mod genetics;
pub mod mating;
pub mod metrics;
pub mod rng;
pub mod sampler;
pub mod simulation;
pub mod spatial;

pub use config::{ConfigError, InitialLayout, LandscapeConfig};
pub use dispersal::{DispersalError, DispersalModel};
pub use genetics::{Diploid, Gamete, Mutation, MutationModel};
pub use mating::{
    Inconsistency, MateChoice, MateKind, MatingError, MatingInitError, MatingRule,
    OffspringStrategy,
};
pub use metrics::{FixationRecord, GenerationMetrics, RunSummary};
pub use rng::RandomSource;
pub use sampler::{SamplerError, WeightedSampler};
pub use simulation::{Simulation, SimulationError};
pub use spatial::{Located, PositionRecord, SpatialIndex};
