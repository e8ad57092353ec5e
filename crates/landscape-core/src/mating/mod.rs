use crate::constants::{DOMAIN_MAX, DOMAIN_MIN, MAX_POPULATION_SIZE};
use crate::dispersal::{DispersalError, DispersalModel};
use crate::sampler::{SamplerError, WeightedSampler};
use crate::spatial::{PositionRecord, SpatialIndex};
use std::{error::Error, fmt};

mod phases;


/// How offspring positions reach next generation's parental index.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OffspringStrategy {
    /// Buffer offspring records and bulk-load the index once at the start of
    /// the next generation.
    #[default]
    BulkRebuild,
    /// Insert every offspring into a live index as it is placed.
    Incremental,
}

/// How the second parent came to be chosen.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MateKind {
    /// A different individual was drawn from the neighborhood.
    Outcross,
    /// Parent 1 was drawn from a neighborhood that had other candidates.
    ChanceSelf,
    /// Parent 1 was alone within the mating radius.
    ForcedSelf,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MateChoice {
    pub parent: usize,
    pub kind: MateKind,
    /// Individuals within the mating radius, parent 1 included.
    pub candidates: usize,
}

impl MateChoice {
    pub fn is_selfing(&self) -> bool {
        self.kind != MateKind::Outcross
    }
}

/// Ways the parental index can disagree with the population it indexes.
#[derive(Debug, Clone, PartialEq)]
pub enum Inconsistency {
    PopulationSize { expected: usize, actual: usize },
    UnknownIndividual { id: usize },
    DuplicateIndividual { id: usize },
    PositionMismatch { id: usize, indexed: [f64; 2], actual: [f64; 2] },
    /// A radius query around an individual did not return that individual.
    MissingFromNeighborhood { id: usize },
}

impl fmt::Display for Inconsistency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Inconsistency::PopulationSize { expected, actual } => write!(
                f,
                "population has {actual} individuals but the parental index holds {expected}"
            ),
            Inconsistency::UnknownIndividual { id } => {
                write!(f, "individual {id} is not in the parental index")
            }
            Inconsistency::DuplicateIndividual { id } => {
                write!(f, "individual {id} appears more than once")
            }
            Inconsistency::PositionMismatch {
                id,
                indexed,
                actual,
            } => write!(
                f,
                "individual {id} is at ({}, {}) but indexed at ({}, {})",
                actual[0], actual[1], indexed[0], indexed[1]
            ),
            Inconsistency::MissingFromNeighborhood { id } => {
                write!(f, "radius query around individual {id} did not return it")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MatingInitError {
    EmptyPopulation,
    PopulationTooLarge { max: usize, actual: usize },
    InvalidRadius(f64),
    InvalidDispersal(DispersalError),
    IdOutOfRange { id: usize, population_size: usize },
    DuplicateId { id: usize },
    InvalidPosition { id: usize, position: [f64; 2] },
}

impl fmt::Display for MatingInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatingInitError::EmptyPopulation => write!(f, "initial snapshot is empty"),
            MatingInitError::PopulationTooLarge { max, actual } => write!(
                f,
                "initial snapshot size ({actual}) exceeds supported maximum ({max})"
            ),
            MatingInitError::InvalidRadius(r) => {
                write!(f, "mating radius ({r}) must be finite and non-negative")
            }
            MatingInitError::InvalidDispersal(e) => write!(f, "{e}"),
            MatingInitError::IdOutOfRange {
                id,
                population_size,
            } => write!(
                f,
                "record id {id} is outside 0..{population_size}"
            ),
            MatingInitError::DuplicateId { id } => write!(f, "record id {id} appears twice"),
            MatingInitError::InvalidPosition { id, position } => write!(
                f,
                "record {id} at ({}, {}) lies outside the unit square",
                position[0], position[1]
            ),
        }
    }
}

impl From<DispersalError> for MatingInitError {
    fn from(err: DispersalError) -> Self {
        MatingInitError::InvalidDispersal(err)
    }
}

impl Error for MatingInitError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            MatingInitError::InvalidDispersal(e) => Some(e),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MatingError {
    /// The fitness function produced a negative or non-finite value.
    InvalidFitness { id: usize, value: f64 },
    /// A sampler could not be built from the fitness table.
    InvalidWeight(SamplerError),
    /// A parent position could not be used for dispersal.
    InvalidPosition(DispersalError),
    /// The parental index does not match the population; indicates a bug in
    /// the caller or in this crate and is never recovered from.
    ConsistencyViolation(Inconsistency),
    /// A parent was requested before `w` ran for this generation.
    FitnessNotRefreshed,
    /// `w` was called before every offspring of the previous generation was
    /// placed.
    GenerationIncomplete { expected: usize, placed: usize },
    /// More offspring were placed than the generation holds.
    GenerationOverflow { population_size: usize },
}

impl fmt::Display for MatingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatingError::InvalidFitness { id, value } => write!(
                f,
                "fitness of individual {id} is {value}; fitness must be finite and non-negative"
            ),
            MatingError::InvalidWeight(e) => write!(f, "invalid sampling weights: {e}"),
            MatingError::InvalidPosition(e) => write!(f, "invalid offspring placement: {e}"),
            MatingError::ConsistencyViolation(e) => write!(f, "consistency violation: {e}"),
            MatingError::FitnessNotRefreshed => {
                write!(f, "parents requested before fitness refresh")
            }
            MatingError::GenerationIncomplete { expected, placed } => write!(
                f,
                "generation incomplete: {placed} of {expected} offspring placed"
            ),
            MatingError::GenerationOverflow { population_size } => write!(
                f,
                "all {population_size} offspring of this generation were already placed"
            ),
        }
    }
}

impl From<SamplerError> for MatingError {
    fn from(err: SamplerError) -> Self {
        MatingError::InvalidWeight(err)
    }
}

impl From<DispersalError> for MatingError {
    fn from(err: DispersalError) -> Self {
        MatingError::InvalidPosition(err)
    }
}

impl From<Inconsistency> for MatingError {
    fn from(err: Inconsistency) -> Self {
        MatingError::ConsistencyViolation(err)
    }
}

impl Error for MatingError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            MatingError::InvalidWeight(e) => Some(e),
            MatingError::InvalidPosition(e) => Some(e),
            _ => None,
        }
    }
}

/// Wright-Fisher mating rule on the unit square.
///
/// Lifecycle per generation, driven by the simulation engine:
/// 1. [`MatingRule::w`] promotes last generation's offspring to the parental
///    index and refreshes the fitness table and global sampler.
/// 2. For each of the N offspring: [`MatingRule::pick1`],
///    [`MatingRule::pick2`], reproduction (owned by the engine), then
///    [`MatingRule::place_offspring`].
///
/// Parent picks only read state frozen by `w`; the offspring arena is the
/// only thing mutated between two `w` calls.
pub struct MatingRule {
    radius: f64,
    dispersal: DispersalModel,
    strategy: OffspringStrategy,
    parental: SpatialIndex,
    /// Position of every parental individual, indexed by id.
    parental_positions: Vec<[f64; 2]>,
    /// Offspring placed so far, in id order.
    offspring: Vec<PositionRecord>,
    /// Live offspring index, only filled under `OffspringStrategy::Incremental`.
    offspring_index: SpatialIndex,
    population_size: usize,
    fitnesses: Vec<f64>,
    global_sampler: WeightedSampler,
    fitness_ready: bool,
    mean_fitness: f64,
    generation: u64,
}

impl MatingRule {
    /// Build a rule from the founding population's positions.
    ///
    /// The snapshot must hold ids `0..N` exactly once, at finite positions
    /// inside the unit square. It is staged as "offspring" and becomes the
    /// parental index on the first call to [`MatingRule::w`].
    pub fn new(
        initial: Vec<PositionRecord>,
        radius: f64,
        dispersal: f64,
    ) -> Result<Self, MatingInitError> {
        Self::with_strategy(initial, radius, dispersal, OffspringStrategy::default())
    }

    pub fn with_strategy(
        mut initial: Vec<PositionRecord>,
        radius: f64,
        dispersal: f64,
        strategy: OffspringStrategy,
    ) -> Result<Self, MatingInitError> {
        if !(radius.is_finite() && radius >= 0.0) {
            return Err(MatingInitError::InvalidRadius(radius));
        }
        let dispersal = DispersalModel::new(dispersal)?;
        let n = initial.len();
        if n == 0 {
            return Err(MatingInitError::EmptyPopulation);
        }
        if n > MAX_POPULATION_SIZE {
            return Err(MatingInitError::PopulationTooLarge {
                max: MAX_POPULATION_SIZE,
                actual: n,
            });
        }
        let mut seen = vec![false; n];
        for record in &initial {
            if record.id >= n {
                return Err(MatingInitError::IdOutOfRange {
                    id: record.id,
                    population_size: n,
                });
            }
            if seen[record.id] {
                return Err(MatingInitError::DuplicateId { id: record.id });
            }
            seen[record.id] = true;
            let in_domain = record
                .position
                .iter()
                .all(|c| c.is_finite() && (DOMAIN_MIN..=DOMAIN_MAX).contains(c));
            if !in_domain {
                return Err(MatingInitError::InvalidPosition {
                    id: record.id,
                    position: record.position,
                });
            }
        }
        initial.sort_unstable_by_key(|record| record.id);

        let offspring_index = match strategy {
            OffspringStrategy::BulkRebuild => SpatialIndex::new(),
            OffspringStrategy::Incremental => SpatialIndex::from_records(initial.clone()),
        };

        Ok(Self {
            radius,
            dispersal,
            strategy,
            parental: SpatialIndex::new(),
            parental_positions: Vec::with_capacity(n),
            offspring: initial,
            offspring_index,
            population_size: n,
            fitnesses: Vec::with_capacity(n),
            global_sampler: WeightedSampler::empty(),
            fitness_ready: false,
            mean_fitness: 0.0,
            generation: 0,
        })
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn dispersal(&self) -> &DispersalModel {
        &self.dispersal
    }

    pub fn strategy(&self) -> OffspringStrategy {
        self.strategy
    }

    /// N, constant across generations.
    pub fn population_size(&self) -> usize {
        self.population_size
    }

    /// Number of completed fitness refreshes, i.e. the current generation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Mean fitness of the current parental population.
    pub fn mean_fitness(&self) -> f64 {
        self.mean_fitness
    }

    /// Fitness table of the current parental population, indexed by id.
    pub fn fitnesses(&self) -> &[f64] {
        if self.fitness_ready {
            &self.fitnesses[..self.population_size]
        } else {
            &[]
        }
    }

    pub fn parental_index(&self) -> &SpatialIndex {
        &self.parental
    }

    pub fn parental_position(&self, id: usize) -> Option<[f64; 2]> {
        self.parental_positions.get(id).copied()
    }

    /// Offspring placed so far this generation, in id order.
    pub fn offspring_records(&self) -> &[PositionRecord] {
        &self.offspring
    }

    pub fn offspring_placed(&self) -> usize {
        self.offspring.len()
    }

    /// True once all N offspring of the running generation are placed.
    pub fn is_generation_complete(&self) -> bool {
        self.fitness_ready && self.offspring.len() == self.population_size
    }

    fn require_refreshed(&self) -> Result<(), MatingError> {
        if self.fitness_ready {
            Ok(())
        } else {
            Err(MatingError::FitnessNotRefreshed)
        }
    }

    fn position_of(&self, id: usize) -> Result<[f64; 2], MatingError> {
        self.parental_positions
            .get(id)
            .copied()
            .ok_or(MatingError::ConsistencyViolation(
                Inconsistency::UnknownIndividual { id },
            ))
    }
}
