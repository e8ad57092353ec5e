use tracing::trace;

use crate::mating::{MatingError, MatingRule, OffspringStrategy};
use crate::rng::RandomSource;
use crate::spatial::PositionRecord;

impl MatingRule {
    /// Place the next offspring of `parent1` x `parent2`.
    ///
    /// The offspring gets the next sequential id of this generation and a
    /// position at the parental midpoint plus clamped Gaussian dispersal.
    /// The returned record is what the engine must attach to its offspring;
    /// the same record becomes part of next generation's parental index.
    #[doc(alias = "update")]
    pub fn place_offspring<R: RandomSource + ?Sized>(
        &mut self,
        rng: &mut R,
        parent1: usize,
        parent2: usize,
    ) -> Result<PositionRecord, MatingError> {
        self.require_refreshed()?;
        if self.offspring.len() >= self.population_size {
            return Err(MatingError::GenerationOverflow {
                population_size: self.population_size,
            });
        }
        let p1 = self.position_of(parent1)?;
        let p2 = self.position_of(parent2)?;
        let position = self.dispersal.offspring_position(rng, p1, p2)?;

        let record = PositionRecord::new(self.offspring.len(), position);
        self.offspring.push(record);
        if self.strategy == OffspringStrategy::Incremental {
            self.offspring_index.insert(record);
        }
        trace!(
            offspring = record.id,
            parent1,
            parent2,
            x = position[0],
            y = position[1],
            "offspring placed"
        );
        Ok(record)
    }
}
