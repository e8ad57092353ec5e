//! Reference Wright-Fisher driver.
//!
//! Owns the diploid population and calls the mating rule hooks in the order
//! the rule expects: `w` once, then `pick1`, `choose_mate`, reproduction and
//! `place_offspring` for each of the N offspring.

use std::collections::{HashMap, HashSet};
use std::{error::Error, fmt};

use rand_chacha::ChaCha12Rng;
use tracing::{debug, info};

use crate::config::{ConfigError, InitialLayout, LandscapeConfig};
use crate::genetics::{recombine, spatial_fitness, Diploid, MutationModel};
use crate::mating::{MatingError, MatingInitError, MatingRule};
use crate::metrics::{
    collect_generation_metrics, FixationRecord, GenerationMetrics, MatingTally, RunSummary,
};
use crate::rng::{derive_stream_rng, RandomSource};
use crate::spatial::PositionRecord;

const PLACEMENT_STREAM: u64 = 0;
const SIMULATION_STREAM: u64 = 1;

#[derive(Debug, Clone, PartialEq)]
pub enum SimulationError {
    Config(ConfigError),
    Init(MatingInitError),
    Mating(MatingError),
    FounderCountMismatch { expected: usize, actual: usize },
}

impl fmt::Display for SimulationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimulationError::Config(e) => write!(f, "invalid configuration: {e}"),
            SimulationError::Init(e) => write!(f, "invalid founding population: {e}"),
            SimulationError::Mating(e) => write!(f, "mating failed: {e}"),
            SimulationError::FounderCountMismatch { expected, actual } => write!(
                f,
                "population_size is {expected} but {actual} founders were supplied"
            ),
        }
    }
}

impl Error for SimulationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SimulationError::Config(e) => Some(e),
            SimulationError::Init(e) => Some(e),
            SimulationError::Mating(e) => Some(e),
            SimulationError::FounderCountMismatch { .. } => None,
        }
    }
}

impl From<ConfigError> for SimulationError {
    fn from(err: ConfigError) -> Self {
        SimulationError::Config(err)
    }
}

impl From<MatingInitError> for SimulationError {
    fn from(err: MatingInitError) -> Self {
        SimulationError::Init(err)
    }
}

impl From<MatingError> for SimulationError {
    fn from(err: MatingError) -> Self {
        SimulationError::Mating(err)
    }
}

/// Founding positions for `config.population_size` individuals, ids in order.
pub fn founder_positions(config: &LandscapeConfig) -> Vec<PositionRecord> {
    let n = config.population_size;
    let mut rng = derive_stream_rng(config.seed, PLACEMENT_STREAM);
    (0..n)
        .map(|id| {
            let position = match config.initial_layout {
                InitialLayout::Uniform => [rng.uniform(), rng.uniform()],
                InitialLayout::SplitQuadrants if id < n / 2 => {
                    [rng.uniform_range(0.0, 0.5), rng.uniform_range(0.5, 1.0)]
                }
                InitialLayout::SplitQuadrants => {
                    [rng.uniform_range(0.5, 1.0), rng.uniform_range(0.0, 0.5)]
                }
            };
            PositionRecord::new(id, position)
        })
        .collect()
}

pub struct Simulation {
    config: LandscapeConfig,
    rule: MatingRule,
    /// Current generation, indexed by id.
    population: Vec<Diploid>,
    rng: ChaCha12Rng,
    model: MutationModel,
    crossover_rate: f64,
    /// Sites of all segregating mutations.
    occupied: HashSet<u64>,
    fixations: Vec<FixationRecord>,
    generation: usize,
    total_forced_self: usize,
    total_chance_self: usize,
}

impl Simulation {
    /// Validate `config` and scatter a mutation-free founding population
    /// according to its `initial_layout`.
    pub fn new(config: LandscapeConfig) -> Result<Self, SimulationError> {
        config.validate()?;
        let founders = founder_positions(&config)
            .into_iter()
            .map(Diploid::new)
            .collect();
        Self::with_founders(config, founders)
    }

    /// Start from caller-supplied founders. Ids must be `0..population_size`.
    pub fn with_founders(
        config: LandscapeConfig,
        mut founders: Vec<Diploid>,
    ) -> Result<Self, SimulationError> {
        config.validate()?;
        if founders.len() != config.population_size {
            return Err(SimulationError::FounderCountMismatch {
                expected: config.population_size,
                actual: founders.len(),
            });
        }
        let records = founders.iter().map(|d| d.record).collect();
        let rule = MatingRule::new(records, config.mating_radius, config.dispersal)?;
        founders.sort_unstable_by_key(|d| d.record.id);

        let model = MutationModel {
            neutral_rate: config.neutral_mutation_rate(),
            selected_rate: config.selected_mutation_rate,
            selection: config.selection_coefficient,
            dominance: config.dominance,
        };
        let mut simulation = Self {
            rng: derive_stream_rng(config.seed, SIMULATION_STREAM),
            crossover_rate: config.recombination_rate(),
            config,
            rule,
            population: founders,
            model,
            occupied: HashSet::new(),
            fixations: Vec::new(),
            generation: 0,
            total_forced_self: 0,
            total_chance_self: 0,
        };
        simulation.rebuild_registry();
        Ok(simulation)
    }

    pub fn config(&self) -> &LandscapeConfig {
        &self.config
    }

    pub fn rule(&self) -> &MatingRule {
        &self.rule
    }

    /// Current population, indexed by id.
    pub fn population(&self) -> &[Diploid] {
        &self.population
    }

    /// Completed generations.
    pub fn generation(&self) -> usize {
        self.generation
    }

    pub fn fixations(&self) -> &[FixationRecord] {
        &self.fixations
    }

    /// Seed used for derived streams such as output sampling.
    pub fn seed(&self) -> u64 {
        self.config.seed
    }

    /// Advance one generation and return its metrics.
    pub fn step(&mut self) -> Result<GenerationMetrics, SimulationError> {
        let n = self.config.population_size;
        let origin = self.generation;
        self.rule.w(&self.population, spatial_fitness)?;
        let mean_fitness = self.rule.mean_fitness();

        let mut tally = MatingTally::default();
        let mut offspring = Vec::with_capacity(n);
        for _ in 0..n {
            let p1 = self.rule.pick1(&mut self.rng)?;
            let choice = self.rule.choose_mate(&mut self.rng, p1)?;
            let p2 = choice.parent;

            let mut first = recombine(
                &mut self.rng,
                &self.population[p1].gametes,
                self.crossover_rate,
            );
            self.model
                .mutate(&mut self.rng, &mut first, origin, &mut self.occupied);
            let mut second = recombine(
                &mut self.rng,
                &self.population[p2].gametes,
                self.crossover_rate,
            );
            self.model
                .mutate(&mut self.rng, &mut second, origin, &mut self.occupied);

            let record = self.rule.place_offspring(&mut self.rng, p1, p2)?;
            let a = self.population[p1].record.position;
            let b = self.population[p2].record.position;
            let midpoint = [(a[0] + b[0]) / 2.0, (a[1] + b[1]) / 2.0];
            let displacement = ((record.position[0] - midpoint[0]).powi(2)
                + (record.position[1] - midpoint[1]).powi(2))
            .sqrt();
            tally.record(choice.kind, choice.candidates, displacement);

            offspring.push(Diploid {
                gametes: [first, second],
                record,
            });
        }

        self.population = offspring;
        self.generation += 1;
        let fixed = self.remove_fixations();
        self.rebuild_registry();
        self.total_forced_self += tally.forced_self;
        self.total_chance_self += tally.chance_self;

        let metrics = collect_generation_metrics(
            self.generation,
            mean_fitness,
            &tally,
            fixed,
            &self.population,
        );
        debug!(
            generation = self.generation,
            mean_fitness,
            forced_self = tally.forced_self,
            chance_self = tally.chance_self,
            fixations = fixed,
            "generation complete"
        );
        Ok(metrics)
    }

    /// Run the configured number of generations, sampling metrics every
    /// `sample_every` generations and after the last one.
    pub fn run(&mut self) -> Result<RunSummary, SimulationError> {
        self.run_generations(self.config.effective_generations())
    }

    pub fn run_generations(&mut self, generations: usize) -> Result<RunSummary, SimulationError> {
        let sample_every = self.config.sample_every;
        info!(
            seed = self.config.seed,
            population = self.config.population_size,
            generations,
            radius = self.config.mating_radius,
            dispersal = self.config.dispersal,
            "starting run"
        );
        let fixations_before = self.fixations.len();
        let forced_before = self.total_forced_self;
        let chance_before = self.total_chance_self;
        let mut samples = Vec::with_capacity(generations / sample_every + 1);
        for g in 1..=generations {
            let metrics = self.step()?;
            if g % sample_every == 0 || g == generations {
                samples.push(metrics);
            }
        }
        let fixations = self.fixations[fixations_before..].to_vec();
        info!(
            generations,
            fixations = fixations.len(),
            mean_fitness = self.rule.mean_fitness(),
            "run finished"
        );
        Ok(RunSummary {
            schema_version: 1,
            seed: self.config.seed,
            population_size: self.config.population_size,
            generations,
            sample_every,
            samples,
            fixations,
            total_forced_self: self.total_forced_self - forced_before,
            total_chance_self: self.total_chance_self - chance_before,
        })
    }

    /// Drop mutations carried by every gamete, recording them as fixed in
    /// the current generation. Returns how many were removed.
    fn remove_fixations(&mut self) -> usize {
        let copies = 2 * self.population.len();
        let mut counts: HashMap<u64, usize> = HashMap::new();
        for m in self
            .population
            .iter()
            .flat_map(|d| d.gametes.iter())
            .flat_map(|g| g.mutations())
        {
            *counts.entry(m.site_key()).or_default() += 1;
        }
        let fixed: HashSet<u64> = counts
            .into_iter()
            .filter(|&(_, c)| c == copies)
            .map(|(key, _)| key)
            .collect();
        if fixed.is_empty() {
            return 0;
        }

        if let Some(first) = self.population.first() {
            let mut records: Vec<FixationRecord> = first.gametes[0]
                .mutations()
                .iter()
                .filter(|m| fixed.contains(&m.site_key()))
                .map(|m| FixationRecord {
                    position: m.position,
                    selection: m.selection,
                    neutral: m.neutral,
                    origin: m.origin,
                    fixed_at: self.generation,
                })
                .collect();
            records.sort_by(|a, b| a.position.total_cmp(&b.position));
            self.fixations.extend(records);
        }
        for gamete in self.population.iter_mut().flat_map(|d| d.gametes.iter_mut()) {
            gamete.retain(|m| !fixed.contains(&m.site_key()));
        }
        fixed.len()
    }

    /// Forget sites of mutations that were lost or fixed.
    fn rebuild_registry(&mut self) {
        self.occupied.clear();
        self.occupied.extend(
            self.population
                .iter()
                .flat_map(|d| d.gametes.iter())
                .flat_map(|g| g.mutations())
                .map(|m| m.site_key()),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> LandscapeConfig {
        LandscapeConfig {
            seed: 7,
            population_size: 60,
            theta: 20.0,
            rho: 20.0,
            selection_coefficient: 0.05,
            dominance: 0.5,
            selected_mutation_rate: 0.05,
            mating_radius: 0.15,
            dispersal: 0.02,
            generations: 25,
            sample_every: 5,
            initial_layout: InitialLayout::SplitQuadrants,
        }
    }

    #[test]
    fn split_layout_avoids_lower_left_quadrant() {
        let config = small_config();
        let founders = founder_positions(&config);
        assert_eq!(founders.len(), 60);
        for record in &founders[..30] {
            assert!(record.position[0] < 0.5 && record.position[1] >= 0.5);
        }
        for record in &founders[30..] {
            assert!(record.position[0] >= 0.5 && record.position[1] < 0.5);
        }
    }

    #[test]
    fn uniform_layout_stays_in_domain() {
        let config = LandscapeConfig {
            initial_layout: InitialLayout::Uniform,
            ..small_config()
        };
        for (id, record) in founder_positions(&config).iter().enumerate() {
            assert_eq!(record.id, id);
            assert!(record.position.iter().all(|c| (0.0..1.0).contains(c)));
        }
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = LandscapeConfig {
            population_size: 0,
            ..small_config()
        };
        assert!(matches!(
            Simulation::new(config),
            Err(SimulationError::Config(ConfigError::InvalidPopulationSize))
        ));
    }

    #[test]
    fn founder_count_must_match_config() {
        let founders = founder_positions(&small_config())
            .into_iter()
            .take(10)
            .map(Diploid::new)
            .collect();
        assert_eq!(
            Simulation::with_founders(small_config(), founders).err(),
            Some(SimulationError::FounderCountMismatch {
                expected: 60,
                actual: 10
            })
        );
    }

    #[test]
    fn population_keeps_ids_and_size() {
        let mut sim = Simulation::new(small_config()).unwrap();
        for _ in 0..5 {
            sim.step().unwrap();
            assert_eq!(sim.population().len(), 60);
            for (id, d) in sim.population().iter().enumerate() {
                assert_eq!(d.record.id, id);
                assert!(d.record.position.iter().all(|c| (0.0..=1.0).contains(c)));
            }
        }
        assert_eq!(sim.generation(), 5);
        assert_eq!(sim.rule().generation(), 5);
    }

    #[test]
    fn no_fixed_mutation_survives_a_step() {
        let mut sim = Simulation::new(small_config()).unwrap();
        for _ in 0..25 {
            sim.step().unwrap();
            let copies = 2 * sim.population().len();
            let mut counts: HashMap<u64, usize> = HashMap::new();
            for m in sim
                .population()
                .iter()
                .flat_map(|d| d.gametes.iter())
                .flat_map(|g| g.mutations())
            {
                *counts.entry(m.site_key()).or_default() += 1;
            }
            assert!(counts.values().all(|&c| c < copies));
        }
        for record in sim.fixations() {
            assert!(record.fixed_at > record.origin);
        }
    }

    #[test]
    fn runs_are_reproducible() {
        let a = Simulation::new(small_config()).unwrap().run().unwrap();
        let b = Simulation::new(small_config()).unwrap().run().unwrap();
        assert_eq!(a.samples, b.samples);
        assert_eq!(a.fixations, b.fixations);
        assert_eq!(a.samples.len(), 5);
        assert_eq!(a.samples.last().map(|m| m.generation), Some(25));
    }

    #[test]
    fn zero_radius_forces_selfing_every_mating() {
        let config = LandscapeConfig {
            mating_radius: 0.0,
            ..small_config()
        };
        let mut sim = Simulation::new(config).unwrap();
        let metrics = sim.step().unwrap();
        assert_eq!(metrics.forced_self_count, 60);
        assert_eq!(metrics.outcross_count, 0);
        assert!((metrics.mean_candidates - 1.0).abs() < 1e-12);
    }

    #[test]
    fn final_sample_is_taken_off_cadence() {
        let config = LandscapeConfig {
            generations: 7,
            sample_every: 5,
            ..small_config()
        };
        let summary = Simulation::new(config).unwrap().run().unwrap();
        let gens: Vec<usize> = summary.samples.iter().map(|m| m.generation).collect();
        assert_eq!(gens, vec![5, 7]);
    }
}
