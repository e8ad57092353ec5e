use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use landscape_core::rng::create_rng;
use landscape_core::simulation::founder_positions;
use landscape_core::{
    InitialLayout, LandscapeConfig, Located, MatingRule, OffspringStrategy, PositionRecord,
    Simulation,
};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

mod report;

const WARMUP_GENERATIONS: usize = 2;
const BENCHMARK_GENERATIONS: usize = 10;

#[derive(Parser)]
#[command(name = "landscape")]
#[command(about = "Spatial Wright-Fisher simulation with local mate choice")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace); RUST_LOG wins
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a simulation
    Run {
        /// Path to config file (JSON); defaults are used when omitted
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output directory for summary.json (optional)
        #[arg(long)]
        out: Option<PathBuf>,

        /// Override the configured number of generations
        #[arg(long)]
        generations: Option<usize>,

        /// Override the configured seed
        #[arg(long)]
        seed: Option<u64>,

        /// 0 = tidy table of selected mutations, k = ms-style sample of k
        /// diploids, N = whole population
        #[arg(long)]
        format: Option<usize>,
    },
    /// Time fitness refresh and mate selection for several population sizes
    Benchmark,
    /// Dump the default configuration to stdout
    DumpDefaultConfig,
}

fn init_tracing(verbose: u8) {
    let fallback = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(fallback));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_config(path: Option<&PathBuf>) -> Result<LandscapeConfig> {
    let Some(path) = path else {
        return Ok(LandscapeConfig::default());
    };
    let file = File::open(path).context("failed to open config file")?;
    let config: LandscapeConfig =
        serde_json::from_reader(BufReader::new(file)).context("failed to parse config")?;
    Ok(config)
}

struct BenchmarkTimings {
    refresh_us: f64,
    mating_us: f64,
}

fn time_generations(n: usize, strategy: OffspringStrategy) -> Result<BenchmarkTimings> {
    let config = LandscapeConfig {
        population_size: n,
        initial_layout: InitialLayout::Uniform,
        ..LandscapeConfig::default()
    };
    let mut population = founder_positions(&config);
    let mut rule = MatingRule::with_strategy(
        population.clone(),
        config.mating_radius,
        config.dispersal,
        strategy,
    )
    .context("failed to build mating rule")?;
    let mut rng = create_rng(config.seed);

    let mut refresh = 0u128;
    let mut mating = 0u128;
    for generation in 0..WARMUP_GENERATIONS + BENCHMARK_GENERATIONS {
        let start = Instant::now();
        // Fitness decays away from the centre so draws are not uniform.
        rule.w(&population, |r: &PositionRecord| {
            let [x, y] = r.position();
            1.0 - 0.5 * ((x - 0.5).abs() + (y - 0.5).abs())
        })?;
        let refreshed = Instant::now();
        for _ in 0..n {
            let p1 = rule.pick1(&mut rng)?;
            let p2 = rule.pick2(&mut rng, p1)?;
            rule.place_offspring(&mut rng, p1, p2)?;
        }
        let done = Instant::now();
        if generation >= WARMUP_GENERATIONS {
            refresh += (refreshed - start).as_micros();
            mating += (done - refreshed).as_micros();
        }
        population = rule.offspring_records().to_vec();
    }
    let generations = BENCHMARK_GENERATIONS as f64;
    Ok(BenchmarkTimings {
        refresh_us: refresh as f64 / generations,
        mating_us: mating as f64 / generations,
    })
}

fn run_benchmark() -> Result<()> {
    if cfg!(debug_assertions) {
        eprintln!("WARNING: running in debug mode. Results are not representative.");
        eprintln!("         Use: cargo run -p landscape-cli --release -- benchmark");
        eprintln!();
    }
    println!("=== Landscape mating benchmark ===");
    println!(
        "Warmup: {WARMUP_GENERATIONS} generations, Benchmark: {BENCHMARK_GENERATIONS} generations"
    );
    println!();

    let sizes = [1_000, 10_000, 50_000];
    let strategies = [OffspringStrategy::BulkRebuild, OffspringStrategy::Incremental];
    for strategy in strategies {
        println!("=== Strategy: {strategy:?} ===");
        for n in sizes {
            let timings = time_generations(n, strategy)?;
            let total = timings.refresh_us + timings.mating_us;
            println!("--- N = {n} ---");
            println!("  Avg generation: {total:.0} us");
            println!(
                "  Breakdown:      refresh={:.0} us, mating={:.0} us ({:.2} us/offspring)",
                timings.refresh_us,
                timings.mating_us,
                timings.mating_us / n as f64,
            );
        }
        println!();
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::DumpDefaultConfig => {
            let config = LandscapeConfig::default();
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Commands::Benchmark => run_benchmark()?,
        Commands::Run {
            config,
            out,
            generations,
            seed,
            format,
        } => {
            let mut sim_config = load_config(config.as_ref())?;
            if let Some(generations) = generations {
                sim_config.generations = generations;
            }
            if let Some(seed) = seed {
                sim_config.seed = seed;
            }
            sim_config.validate().context("config validation error")?;
            if let Some(format) = format {
                anyhow::ensure!(
                    format <= sim_config.population_size,
                    "output format {format} exceeds the population size ({})",
                    sim_config.population_size
                );
            }

            let mut sim =
                Simulation::new(sim_config).context("failed to initialize simulation")?;
            let summary = sim.run().context("simulation failed")?;

            if let Some(out_dir) = out {
                std::fs::create_dir_all(&out_dir).context("failed to create output directory")?;
                let summary_path = out_dir.join("summary.json");
                let file = File::create(summary_path).context("failed to create summary file")?;
                serde_json::to_writer_pretty(file, &summary).context("failed to write summary")?;
                info!(out = %out_dir.display(), "summary written");
            }
            if let Some(format) = format {
                let stdout = std::io::stdout();
                let mut writer = BufWriter::new(stdout.lock());
                report::write_report(&mut writer, sim.population(), format, sim.seed())?;
                writer.flush()?;
            } else {
                let last = summary.samples.last();
                println!(
                    "Run complete: {} generations, {} fixations, mean fitness {:.4}",
                    summary.generations,
                    summary.fixations.len(),
                    last.map(|m| m.mean_fitness).unwrap_or(1.0)
                );
            }
        }
    }
    Ok(())
}
