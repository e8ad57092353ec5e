use serde::{Deserialize, Serialize};

use crate::genetics::Diploid;
use crate::mating::MateKind;

#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct GenerationMetrics {
    pub generation: usize,
    pub population_size: usize,
    pub mean_fitness: f64,
    pub outcross_count: usize,
    pub chance_self_count: usize,
    pub forced_self_count: usize,
    /// Mean number of candidates (self included) seen by `pick2`.
    pub mean_candidates: f64,
    pub segregating_neutral: usize,
    pub segregating_selected: usize,
    /// Fixations removed at the end of this generation.
    pub fixations: usize,
    /// Mean distance between an offspring and its parents' midpoint.
    pub mean_dispersal_distance: f64,
    pub mean_x: f64,
    pub mean_y: f64,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct FixationRecord {
    pub position: f64,
    pub selection: f64,
    pub neutral: bool,
    pub origin: usize,
    /// Generation at which the mutation reached frequency one.
    pub fixed_at: usize,
}

fn default_schema_version() -> u32 {
    1
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunSummary {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub seed: u64,
    pub population_size: usize,
    pub generations: usize,
    pub sample_every: usize,
    pub samples: Vec<GenerationMetrics>,
    #[serde(default)]
    pub fixations: Vec<FixationRecord>,
    #[serde(default)]
    pub total_forced_self: usize,
    #[serde(default)]
    pub total_chance_self: usize,
}

/// Running tallies for one generation of matings.
#[derive(Clone, Debug, Default)]
pub(crate) struct MatingTally {
    pub outcross: usize,
    pub chance_self: usize,
    pub forced_self: usize,
    pub candidates: usize,
    pub displacement: f64,
}

impl MatingTally {
    pub fn record(&mut self, kind: MateKind, candidates: usize, displacement: f64) {
        match kind {
            MateKind::Outcross => self.outcross += 1,
            MateKind::ChanceSelf => self.chance_self += 1,
            MateKind::ForcedSelf => self.forced_self += 1,
        }
        self.candidates += candidates;
        self.displacement += displacement;
    }

    pub fn matings(&self) -> usize {
        self.outcross + self.chance_self + self.forced_self
    }
}

/// Count distinct segregating sites, split into (neutral, selected).
pub fn segregating_counts(population: &[Diploid]) -> (usize, usize) {
    let mut neutral = std::collections::HashSet::new();
    let mut selected = std::collections::HashSet::new();
    for m in population
        .iter()
        .flat_map(|d| d.gametes.iter())
        .flat_map(|g| g.mutations())
    {
        if m.neutral {
            neutral.insert(m.site_key());
        } else {
            selected.insert(m.site_key());
        }
    }
    (neutral.len(), selected.len())
}

pub(crate) fn collect_generation_metrics(
    generation: usize,
    mean_fitness: f64,
    tally: &MatingTally,
    fixations: usize,
    population: &[Diploid],
) -> GenerationMetrics {
    let n = population.len();
    let denom = n.max(1) as f64;
    let matings = tally.matings().max(1) as f64;
    let (segregating_neutral, segregating_selected) = segregating_counts(population);
    let (sum_x, sum_y) = population.iter().fold((0.0, 0.0), |(sx, sy), d| {
        (sx + d.record.position[0], sy + d.record.position[1])
    });
    GenerationMetrics {
        generation,
        population_size: n,
        mean_fitness,
        outcross_count: tally.outcross,
        chance_self_count: tally.chance_self,
        forced_self_count: tally.forced_self,
        mean_candidates: tally.candidates as f64 / matings,
        segregating_neutral,
        segregating_selected,
        fixations,
        mean_dispersal_distance: tally.displacement / matings,
        mean_x: sum_x / denom,
        mean_y: sum_y / denom,
    }
}
