use tracing::{debug, warn};

use crate::mating::{Inconsistency, MatingError, MatingRule, OffspringStrategy};
use crate::spatial::Located;

impl MatingRule {
    /// Start a generation: promote last generation's offspring to the
    /// parental index, evaluate `fitness` for every individual and build the
    /// global sampler.
    ///
    /// `population` must be exactly the individuals whose positions were
    /// placed last generation (or the founding snapshot on the first call);
    /// any disagreement is a [`MatingError::ConsistencyViolation`].
    pub fn w<I, F>(&mut self, population: &[I], mut fitness: F) -> Result<(), MatingError>
    where
        I: Located,
        F: FnMut(&I) -> f64,
    {
        self.promote_offspring()?;
        self.audit_population(population)?;

        let n = self.population_size;
        if self.fitnesses.len() < n {
            self.fitnesses.resize(n, 0.0);
        }
        let mut total = 0.0f64;
        for individual in population {
            let id = individual.id();
            let value = fitness(individual);
            if !(value.is_finite() && value >= 0.0) {
                return Err(MatingError::InvalidFitness { id, value });
            }
            self.fitnesses[id] = value;
            total += value;
        }
        self.mean_fitness = total / n as f64;

        self.global_sampler
            .rebuild(self.fitnesses[..n].iter().copied())?;
        if self.global_sampler.is_degenerate() {
            warn!(
                generation = self.generation + 1,
                "all fitnesses are zero; parent 1 is drawn uniformly"
            );
        }

        self.fitness_ready = true;
        self.generation += 1;
        debug!(
            generation = self.generation,
            population = n,
            mean_fitness = self.mean_fitness,
            "fitness refreshed"
        );
        Ok(())
    }

    /// Move the completed offspring arena into the parental index and reset
    /// the per-generation offspring counter.
    fn promote_offspring(&mut self) -> Result<(), MatingError> {
        if self.offspring.len() != self.population_size {
            return Err(MatingError::GenerationIncomplete {
                expected: self.population_size,
                placed: self.offspring.len(),
            });
        }
        self.fitness_ready = false;

        self.parental_positions.clear();
        self.parental_positions
            .extend(self.offspring.iter().map(|record| record.position));

        let arena = std::mem::replace(
            &mut self.offspring,
            Vec::with_capacity(self.population_size),
        );
        match self.strategy {
            OffspringStrategy::BulkRebuild => self.parental.rebuild(arena),
            OffspringStrategy::Incremental => {
                self.parental = std::mem::take(&mut self.offspring_index);
            }
        }
        Ok(())
    }

    /// Check that `population` is exactly the set of individuals held by the
    /// parental index, each at its indexed position.
    fn audit_population<I: Located>(&self, population: &[I]) -> Result<(), MatingError> {
        let n = self.population_size;
        if population.len() != n || self.parental.len() != n {
            return Err(Inconsistency::PopulationSize {
                expected: self.parental.len(),
                actual: population.len(),
            }
            .into());
        }
        let mut seen = vec![false; n];
        for individual in population {
            let id = individual.id();
            let indexed = self
                .parental_positions
                .get(id)
                .copied()
                .ok_or(Inconsistency::UnknownIndividual { id })?;
            if seen[id] {
                return Err(Inconsistency::DuplicateIndividual { id }.into());
            }
            seen[id] = true;
            let actual = individual.position();
            if indexed != actual {
                return Err(Inconsistency::PositionMismatch {
                    id,
                    indexed,
                    actual,
                }
                .into());
            }
        }
        Ok(())
    }
}
