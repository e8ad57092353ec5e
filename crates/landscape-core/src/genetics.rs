//! Minimal diploid payload used by the reference driver.
//!
//! Infinitely-many-sites mutations on a `[0,1)` chromosome, Poisson
//! crossovers, and multiplicative site-dependent fitness whose selection
//! coefficients flip sign in the lower-left quadrant of the landscape. The
//! mating rule never looks inside any of this; it only sees [`Located`].

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::rng::RandomSource;
use crate::spatial::{Located, PositionRecord};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Mutation {
    /// Site on the chromosome, unique among segregating mutations.
    pub position: f64,
    /// Selection coefficient `s`; zero for neutral mutations.
    pub selection: f64,
    /// Dominance `h`.
    pub dominance: f64,
    /// Generation the mutation arose in.
    pub origin: usize,
    pub neutral: bool,
}

impl Mutation {
    /// Key used for infinite-sites bookkeeping.
    pub fn site_key(&self) -> u64 {
        self.position.to_bits()
    }
}

/// One haploid genome: mutations sorted by position.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Gamete {
    mutations: Vec<Mutation>,
}

impl Gamete {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_mutations(mut mutations: Vec<Mutation>) -> Self {
        mutations.sort_by(|a, b| a.position.total_cmp(&b.position));
        Self { mutations }
    }

    pub fn mutations(&self) -> &[Mutation] {
        &self.mutations
    }

    pub fn selected(&self) -> impl Iterator<Item = &Mutation> {
        self.mutations.iter().filter(|m| !m.neutral)
    }

    fn insert(&mut self, mutation: Mutation) {
        let at = self
            .mutations
            .partition_point(|m| m.position < mutation.position);
        self.mutations.insert(at, mutation);
    }

    pub(crate) fn retain(&mut self, keep: impl FnMut(&Mutation) -> bool) {
        self.mutations.retain(keep);
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Diploid {
    pub gametes: [Gamete; 2],
    pub record: PositionRecord,
}

impl Diploid {
    pub fn new(record: PositionRecord) -> Self {
        Self {
            gametes: [Gamete::new(), Gamete::new()],
            record,
        }
    }
}

impl Located for Diploid {
    fn id(&self) -> usize {
        self.record.id
    }

    fn position(&self) -> [f64; 2] {
        self.record.position
    }
}

/// Per-gamete mutation rates and the effect of selected mutations.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MutationModel {
    pub neutral_rate: f64,
    pub selected_rate: f64,
    pub selection: f64,
    pub dominance: f64,
}

impl MutationModel {
    pub fn total_rate(&self) -> f64 {
        self.neutral_rate + self.selected_rate
    }

    /// Add Poisson-many new mutations to `gamete`, each at a site not used by
    /// any segregating mutation. New sites are recorded in `occupied`.
    pub fn mutate<R: RandomSource + ?Sized>(
        &self,
        rng: &mut R,
        gamete: &mut Gamete,
        generation: usize,
        occupied: &mut HashSet<u64>,
    ) {
        let total = self.total_rate();
        let count = rng.poisson(total);
        for _ in 0..count {
            let neutral = rng.uniform() * total < self.neutral_rate;
            let mut position = rng.uniform();
            while !occupied.insert(position.to_bits()) {
                position = rng.uniform();
            }
            let (selection, dominance) = if neutral {
                (0.0, 0.0)
            } else {
                (self.selection, self.dominance)
            };
            gamete.insert(Mutation {
                position,
                selection,
                dominance,
                origin: generation,
                neutral,
            });
        }
    }
}

/// Build an offspring gamete from a parent's two gametes.
///
/// The starting gamete is a coin flip; the number of crossovers is
/// Poisson(`crossover_rate`) with breakpoints uniform on `[0,1)`.
pub fn recombine<R: RandomSource + ?Sized>(
    rng: &mut R,
    parent: &[Gamete; 2],
    crossover_rate: f64,
) -> Gamete {
    let (first, second) = if rng.uniform() < 0.5 {
        (&parent[0], &parent[1])
    } else {
        (&parent[1], &parent[0])
    };
    let crossovers = rng.poisson(crossover_rate);
    if crossovers == 0 || first == second {
        // Still draw breakpoints so the RNG stream does not depend on
        // gamete contents.
        for _ in 0..crossovers {
            rng.uniform();
        }
        return first.clone();
    }
    let mut breakpoints: Vec<f64> = (0..crossovers).map(|_| rng.uniform()).collect();
    breakpoints.sort_by(f64::total_cmp);

    let segment = |position: f64| breakpoints.partition_point(|&b| b <= position);
    let mut mutations: Vec<Mutation> = first
        .mutations
        .iter()
        .filter(|m| segment(m.position) % 2 == 0)
        .chain(
            second
                .mutations
                .iter()
                .filter(|m| segment(m.position) % 2 == 1),
        )
        .copied()
        .collect();
    mutations.sort_by(|a, b| a.position.total_cmp(&b.position));
    Gamete { mutations }
}

/// Sign applied to selection coefficients at `position`: -1 in the
/// lower-left quadrant, +1 elsewhere.
pub fn geographic_factor(position: [f64; 2]) -> f64 {
    if position[0] <= 0.5 && position[1] <= 0.5 {
        -1.0
    } else {
        1.0
    }
}

/// Multiplicative fitness across selected sites: homozygotes `1 + 2sg`,
/// heterozygotes `1 + hsg`, with `g` from [`geographic_factor`]. Never
/// negative.
pub fn spatial_fitness(diploid: &Diploid) -> f64 {
    let g = geographic_factor(diploid.record.position);
    let mut a = diploid.gametes[0].selected().peekable();
    let mut b = diploid.gametes[1].selected().peekable();
    let mut w = 1.0f64;
    loop {
        match (a.peek(), b.peek()) {
            (Some(ma), Some(mb)) if ma.position == mb.position => {
                w *= 1.0 + g * 2.0 * ma.selection;
                a.next();
                b.next();
            }
            (Some(ma), Some(mb)) => {
                if ma.position < mb.position {
                    w *= 1.0 + g * ma.dominance * ma.selection;
                    a.next();
                } else {
                    w *= 1.0 + g * mb.dominance * mb.selection;
                    b.next();
                }
            }
            (Some(m), None) => {
                w *= 1.0 + g * m.dominance * m.selection;
                a.next();
            }
            (None, Some(m)) => {
                w *= 1.0 + g * m.dominance * m.selection;
                b.next();
            }
            (None, None) => break,
        }
    }
    w.max(0.0)
}
