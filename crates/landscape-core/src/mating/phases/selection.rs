use tracing::{debug, trace};

use crate::mating::{Inconsistency, MateChoice, MateKind, MatingError, MatingRule};
use crate::rng::RandomSource;
use crate::sampler::WeightedSampler;

impl MatingRule {
    /// Draw parent 1 from the whole parental population, proportional to
    /// fitness. Consumes one uniform draw.
    pub fn pick1<R: RandomSource + ?Sized>(&self, rng: &mut R) -> Result<usize, MatingError> {
        self.require_refreshed()?;
        self.global_sampler
            .sample(rng.uniform())
            .ok_or(MatingError::FitnessNotRefreshed)
    }

    /// Draw parent 2 from the neighborhood of `parent1`. See
    /// [`MatingRule::choose_mate`].
    pub fn pick2<R: RandomSource + ?Sized>(
        &self,
        rng: &mut R,
        parent1: usize,
    ) -> Result<usize, MatingError> {
        self.choose_mate(rng, parent1).map(|choice| choice.parent)
    }

    /// Draw a mate for `parent1` among all individuals within the mating
    /// radius (Euclidean, inclusive), proportional to fitness.
    ///
    /// If parent 1 is alone in its neighborhood it mates with itself and no
    /// randomness is consumed. Otherwise parent 1 stays a candidate, so
    /// selfing can still happen by chance; one uniform draw is consumed.
    pub fn choose_mate<R: RandomSource + ?Sized>(
        &self,
        rng: &mut R,
        parent1: usize,
    ) -> Result<MateChoice, MatingError> {
        self.require_refreshed()?;
        let center = self.position_of(parent1)?;
        let candidates = self.parental.query_radius(center, self.radius);

        if !candidates.iter().any(|record| record.id == parent1) {
            return Err(Inconsistency::MissingFromNeighborhood { id: parent1 }.into());
        }
        if candidates.len() == 1 {
            trace!(parent1, "no other individual in range; forced selfing");
            return Ok(MateChoice {
                parent: parent1,
                kind: MateKind::ForcedSelf,
                candidates: 1,
            });
        }

        let local = WeightedSampler::new(
            &candidates
                .iter()
                .map(|record| self.fitnesses[record.id])
                .collect::<Vec<_>>(),
        )?;
        if local.is_degenerate() {
            debug!(
                parent1,
                candidates = candidates.len(),
                "neighborhood fitness sums to zero; mate drawn uniformly"
            );
        }
        // candidates is non-empty, so the local sampler always yields a slot
        let slot = local.sample(rng.uniform()).unwrap_or(0);
        let parent = candidates[slot].id;
        let kind = if parent == parent1 {
            MateKind::ChanceSelf
        } else {
            MateKind::Outcross
        };
        trace!(parent1, parent2 = parent, candidates = candidates.len(), "mate chosen");
        Ok(MateChoice {
            parent,
            kind,
            candidates: candidates.len(),
        })
    }
}
