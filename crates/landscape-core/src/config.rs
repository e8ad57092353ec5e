use serde::{Deserialize, Serialize};

/// How the founding population is scattered over the unit square.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InitialLayout {
    /// First half uniform in the upper-left quadrant, second half in the
    /// lower-right quadrant.
    #[default]
    SplitQuadrants,
    /// Uniform over the whole square.
    Uniform,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LandscapeConfig {
    /// Deterministic seed for reproducible runs.
    pub seed: u64,
    /// Number of diploids, constant across generations.
    pub population_size: usize,
    /// Scaled neutral mutation rate (4N * per-gamete rate).
    pub theta: f64,
    /// Scaled recombination rate (4N * per-gamete crossover rate).
    pub rho: f64,
    /// Selection coefficient of selected mutations.
    pub selection_coefficient: f64,
    /// Dominance of selected mutations; fitnesses are 1, 1+hs, 1+2s.
    pub dominance: f64,
    /// Per-gamete mutation rate to selected variants.
    pub selected_mutation_rate: f64,
    /// Euclidean radius searched for the second parent.
    pub mating_radius: f64,
    /// Standard deviation of per-axis offspring dispersal.
    pub dispersal: f64,
    /// Generations to simulate; 0 means 10 * population_size.
    pub generations: usize,
    /// Interval between recorded generation metrics.
    pub sample_every: usize,
    /// Placement of the founding population.
    pub initial_layout: InitialLayout,
}

impl Default for LandscapeConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            population_size: 1_000,
            theta: 10.0,
            rho: 10.0,
            selection_coefficient: 0.01,
            dominance: 1.0,
            selected_mutation_rate: 0.001,
            mating_radius: 0.1,
            dispersal: 0.01,
            generations: 0,
            sample_every: 100,
            initial_layout: InitialLayout::SplitQuadrants,
        }
    }
}

macro_rules! define_config_error {
    (
        $(
            $variant:ident $( { $($field:ident : $type:ty),* } )? => $fmt:literal $(, $arg:expr)*
        );* $(;)?
    ) => {
        #[derive(Debug, Clone, PartialEq)]
        pub enum ConfigError {
            $(
                $variant $( { $($field : $type),* } )?,
            )*
        }

        impl std::fmt::Display for ConfigError {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(
                        Self::$variant $( { $($field),* } )? => write!(f, $fmt $(, $arg)*),
                    )*
                }
            }
        }
    };
}

define_config_error! {
    InvalidPopulationSize => "population_size must be greater than 0";
    PopulationTooLarge { max: usize, actual: usize } => "population_size ({}) exceeds supported maximum ({})", actual, max;
    InvalidTheta => "theta must be finite and non-negative";
    InvalidRho => "rho must be finite and non-negative";
    InvalidSelectionCoefficient => "selection_coefficient must be finite";
    InvalidDominance => "dominance must be finite";
    InvalidSelectedMutationRate => "selected_mutation_rate must be finite and non-negative";
    InvalidMatingRadius => "mating_radius must be finite and non-negative";
    InvalidDispersal => "dispersal must be finite and non-negative";
    InvalidSampleEvery => "sample_every must be positive";
}

impl std::error::Error for ConfigError {}

impl LandscapeConfig {
    pub const MAX_POPULATION_SIZE: usize = crate::constants::MAX_POPULATION_SIZE;

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_population()?;
        self.validate_genetics()?;
        self.validate_landscape()?;
        self.validate_schedule()?;
        Ok(())
    }

    /// Generation count after resolving the `0 => 10N` default.
    pub fn effective_generations(&self) -> usize {
        if self.generations > 0 {
            self.generations
        } else {
            self.population_size.saturating_mul(10)
        }
    }

    /// Per-gamete neutral mutation rate, theta / 4N.
    pub fn neutral_mutation_rate(&self) -> f64 {
        self.theta / (4.0 * self.population_size as f64)
    }

    /// Per-gamete expected crossover count, rho / 4N.
    pub fn recombination_rate(&self) -> f64 {
        self.rho / (4.0 * self.population_size as f64)
    }

    fn validate_population(&self) -> Result<(), ConfigError> {
        if self.population_size == 0 {
            return Err(ConfigError::InvalidPopulationSize);
        }
        if self.population_size > Self::MAX_POPULATION_SIZE {
            return Err(ConfigError::PopulationTooLarge {
                max: Self::MAX_POPULATION_SIZE,
                actual: self.population_size,
            });
        }
        Ok(())
    }

    fn validate_genetics(&self) -> Result<(), ConfigError> {
        if !(self.theta.is_finite() && self.theta >= 0.0) {
            return Err(ConfigError::InvalidTheta);
        }
        if !(self.rho.is_finite() && self.rho >= 0.0) {
            return Err(ConfigError::InvalidRho);
        }
        if !self.selection_coefficient.is_finite() {
            return Err(ConfigError::InvalidSelectionCoefficient);
        }
        if !self.dominance.is_finite() {
            return Err(ConfigError::InvalidDominance);
        }
        if !(self.selected_mutation_rate.is_finite() && self.selected_mutation_rate >= 0.0) {
            return Err(ConfigError::InvalidSelectedMutationRate);
        }
        Ok(())
    }

    fn validate_landscape(&self) -> Result<(), ConfigError> {
        if !(self.mating_radius.is_finite() && self.mating_radius >= 0.0) {
            return Err(ConfigError::InvalidMatingRadius);
        }
        if !(self.dispersal.is_finite() && self.dispersal >= 0.0) {
            return Err(ConfigError::InvalidDispersal);
        }
        Ok(())
    }

    fn validate_schedule(&self) -> Result<(), ConfigError> {
        if self.sample_every == 0 {
            return Err(ConfigError::InvalidSampleEvery);
        }
        Ok(())
    }
}
