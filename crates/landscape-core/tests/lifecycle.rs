use landscape_core::rng::create_rng;
use landscape_core::simulation::founder_positions;
use landscape_core::{
    InitialLayout, LandscapeConfig, Located, MateKind, MatingError, MatingRule,
    OffspringStrategy, PositionRecord, Simulation,
};

fn config(n: usize) -> LandscapeConfig {
    LandscapeConfig {
        seed: 2024,
        population_size: n,
        mating_radius: 0.08,
        dispersal: 0.05,
        initial_layout: InitialLayout::Uniform,
        ..LandscapeConfig::default()
    }
}

/// Drive `generations` full generations with a position-dependent fitness and
/// return every generation's offspring records.
fn drive(
    rule: &mut MatingRule,
    founders: Vec<PositionRecord>,
    generations: usize,
    seed: u64,
) -> Result<Vec<Vec<PositionRecord>>, MatingError> {
    let mut rng = create_rng(seed);
    let mut population = founders;
    let mut history = Vec::new();
    for _ in 0..generations {
        rule.w(&population, |r: &PositionRecord| r.position()[0] + 0.1)?;
        for _ in 0..population.len() {
            let p1 = rule.pick1(&mut rng)?;
            let p2 = rule.pick2(&mut rng, p1)?;
            rule.place_offspring(&mut rng, p1, p2)?;
        }
        assert!(rule.is_generation_complete());
        population = rule.offspring_records().to_vec();
        history.push(population.clone());
    }
    Ok(history)
}

#[test]
fn every_generation_places_exactly_n_offspring_inside_the_square() {
    let cfg = config(300);
    let founders = founder_positions(&cfg);
    let mut rule = MatingRule::new(founders.clone(), cfg.mating_radius, cfg.dispersal).unwrap();
    let history = drive(&mut rule, founders, 8, 1).unwrap();
    for generation in &history {
        assert_eq!(generation.len(), 300);
        for (id, record) in generation.iter().enumerate() {
            assert_eq!(record.id, id);
            assert!(record
                .position
                .iter()
                .all(|c| (0.0..=1.0).contains(c)));
        }
    }
}

#[test]
fn bulk_and_incremental_strategies_agree() {
    let cfg = config(200);
    let founders = founder_positions(&cfg);
    let mut bulk = MatingRule::with_strategy(
        founders.clone(),
        cfg.mating_radius,
        cfg.dispersal,
        OffspringStrategy::BulkRebuild,
    )
    .unwrap();
    let mut incremental = MatingRule::with_strategy(
        founders.clone(),
        cfg.mating_radius,
        cfg.dispersal,
        OffspringStrategy::Incremental,
    )
    .unwrap();
    let a = drive(&mut bulk, founders.clone(), 5, 9).unwrap();
    let b = drive(&mut incremental, founders, 5, 9).unwrap();
    assert_eq!(a, b);
}

#[test]
fn mates_come_from_the_parents_neighborhood() {
    let cfg = config(250);
    let founders = founder_positions(&cfg);
    let mut rule = MatingRule::new(founders.clone(), cfg.mating_radius, cfg.dispersal).unwrap();
    rule.w(&founders, |_: &PositionRecord| 1.0).unwrap();
    let mut rng = create_rng(17);
    let r2 = cfg.mating_radius * cfg.mating_radius;
    for _ in 0..2_000 {
        let p1 = rule.pick1(&mut rng).unwrap();
        let choice = rule.choose_mate(&mut rng, p1).unwrap();
        let a = founders[p1];
        let b = founders[choice.parent];
        assert!(a.distance_squared(b.position) <= r2);
        match choice.kind {
            MateKind::ForcedSelf => assert_eq!(choice.candidates, 1),
            MateKind::ChanceSelf => assert_eq!(choice.parent, p1),
            MateKind::Outcross => assert_ne!(choice.parent, p1),
        }
    }
}

#[test]
fn skipping_offspring_is_reported_at_the_next_refresh() {
    let cfg = config(20);
    let founders = founder_positions(&cfg);
    let mut rule = MatingRule::new(founders.clone(), cfg.mating_radius, cfg.dispersal).unwrap();
    rule.w(&founders, |_: &PositionRecord| 1.0).unwrap();
    let mut rng = create_rng(3);
    for _ in 0..5 {
        let p1 = rule.pick1(&mut rng).unwrap();
        rule.place_offspring(&mut rng, p1, p1).unwrap();
    }
    assert_eq!(
        rule.w(&founders, |_: &PositionRecord| 1.0),
        Err(MatingError::GenerationIncomplete {
            expected: 20,
            placed: 5
        })
    );
}

#[test]
fn simulation_is_deterministic_per_seed() {
    let cfg = LandscapeConfig {
        population_size: 80,
        generations: 15,
        sample_every: 5,
        ..config(80)
    };
    let mut a = Simulation::new(cfg.clone()).unwrap();
    let mut b = Simulation::new(cfg.clone()).unwrap();
    let sa = a.run().unwrap();
    let sb = b.run().unwrap();
    assert_eq!(sa.samples, sb.samples);
    assert_eq!(a.population(), b.population());

    let mut c = Simulation::new(LandscapeConfig { seed: 1, ..cfg }).unwrap();
    c.run().unwrap();
    assert_ne!(a.population(), c.population());
}

#[test]
fn simulation_population_matches_rule_records() {
    let cfg = LandscapeConfig {
        generations: 4,
        ..config(60)
    };
    let mut sim = Simulation::new(cfg).unwrap();
    sim.run().unwrap();
    let records = sim.rule().offspring_records();
    assert_eq!(records.len(), sim.population().len());
    for (record, diploid) in records.iter().zip(sim.population()) {
        assert_eq!(record.id, diploid.id());
        assert_eq!(record.position, diploid.position());
    }
}

#[test]
fn config_round_trips_through_json() {
    let cfg = config(123);
    let json = serde_json::to_string(&cfg).unwrap();
    let back: LandscapeConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back.population_size, 123);
    assert_eq!(back.initial_layout, InitialLayout::Uniform);
    assert!(back.validate().is_ok());

    let partial: LandscapeConfig = serde_json::from_str(r#"{"population_size": 10}"#).unwrap();
    assert_eq!(partial.mating_radius, LandscapeConfig::default().mating_radius);
}
