//! tasksets-simulate: simulate a population of agents and write one CSV each.
//!
//! Parameters come from the config defaults, or one vector per subject from a
//! posterior archive (`--posterior`).

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;

use tasksets::config::RunConfig;
use tasksets::env_config::{init_base_path, init_rayon_threads, init_tracing};
use tasksets::fit::FitParameters;
use tasksets::population::simulate_population;
use tasksets::posterior::{population_parameters, PosteriorArchive};

struct Args {
    config: Option<PathBuf>,
    n_agents: Option<usize>,
    seed: Option<u64>,
    output: Option<PathBuf>,
    posterior: Option<PathBuf>,
    all_q_columns: bool,
}

fn print_usage() {
    println!("Usage: tasksets-simulate [OPTIONS]");
    println!();
    println!("  --config PATH      Run configuration (JSON)");
    println!("  --agents N         Number of agents (with --posterior: at most N subjects)");
    println!("  --seed S           Base seed; agent i uses S + i");
    println!("  --output DIR       Output directory");
    println!("  --posterior PATH   Posterior archive with per-subject means");
    println!("  --all-q            Record every value table column");
}

fn parse_value<T: std::str::FromStr>(args: &[String], i: usize, flag: &str) -> T {
    args.get(i)
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| {
            eprintln!("Invalid {} value", flag);
            std::process::exit(1);
        })
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    let mut parsed = Args {
        config: None,
        n_agents: None,
        seed: None,
        output: None,
        posterior: None,
        all_q_columns: false,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                i += 1;
                parsed.config = Some(parse_value(&args, i, "--config"));
            }
            "--agents" => {
                i += 1;
                parsed.n_agents = Some(parse_value(&args, i, "--agents"));
            }
            "--seed" => {
                i += 1;
                parsed.seed = Some(parse_value(&args, i, "--seed"));
            }
            "--output" => {
                i += 1;
                parsed.output = Some(parse_value(&args, i, "--output"));
            }
            "--posterior" => {
                i += 1;
                parsed.posterior = Some(parse_value(&args, i, "--posterior"));
            }
            "--all-q" => {
                parsed.all_q_columns = true;
            }
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            other => {
                eprintln!("Unknown argument: {}", other);
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }
    parsed
}

fn main() -> anyhow::Result<()> {
    let args = parse_args();
    init_tracing();
    init_base_path()?;
    init_rayon_threads();

    let mut config = match &args.config {
        Some(path) => RunConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => RunConfig::default(),
    };
    if let Some(n) = args.n_agents {
        config.n_agents = n;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(out) = args.output {
        config.paths.simulation_data_path = out;
    }
    if let Some(p) = args.posterior {
        config.paths.posterior_path = Some(p);
    }

    let fitter = FitParameters::new(&config)?;
    let params = match &config.paths.posterior_path {
        Some(path) => {
            let archive = PosteriorArchive::load(path)
                .with_context(|| format!("loading posterior {}", path.display()))?;
            println!("Posterior: {} ({} samples)", archive.model_name, archive.n_samples);
            let max_n_subj = args.n_agents.unwrap_or(usize::MAX);
            population_parameters(&archive, &config.parameters.defaults, max_n_subj)?
        }
        None => vec![config.parameters.defaults.clone(); config.n_agents],
    };

    println!("=== tasksets-simulate ===");
    println!(
        "Data set: {}  Learning style: {}  Agents: {}  Seed: {}",
        config.data_set.as_str(),
        config.learning_style,
        params.len(),
        config.seed
    );

    let t0 = Instant::now();
    let paths = simulate_population(
        &fitter,
        &params,
        &config.paths.simulation_data_path,
        config.seed,
        args.all_q_columns,
    )?;
    println!(
        "Wrote {} files to {} in {:.1}s",
        paths.len(),
        config.paths.simulation_data_path.display(),
        t0.elapsed().as_secs_f64()
    );
    Ok(())
}
