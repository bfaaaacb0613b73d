//! tasksets-fit: fit every matching data file by maximum likelihood.
//!
//! For each file: basin hopping (after a grid search when plot data is
//! requested), then the recorded log is written back with `_rec` decision,
//! parameter and fit columns.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use rayon::prelude::*;
use tracing::{error, info};

use tasksets::config::RunConfig;
use tasksets::data::discover_data_files;
use tasksets::env_config::{init_base_path, init_rayon_threads, init_tracing};
use tasksets::fit::FitParameters;

fn print_usage() {
    println!("Usage: tasksets-fit [OPTIONS]");
    println!();
    println!("  --config PATH      Run configuration (JSON)");
    println!("  --data DIR         Directory with recorded behavior");
    println!("  --pattern GLOB     File name pattern, '*' wildcards (default from config)");
    println!("  --output DIR       Directory for fitted logs");
    println!("  --plot-data        Run the grid search and write minimizer paths");
    println!("  --verbose          Log every objective evaluation (RUST_LOG=debug)");
}

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let mut config_path: Option<PathBuf> = None;
    let mut data_dir: Option<PathBuf> = None;
    let mut pattern: Option<String> = None;
    let mut output: Option<PathBuf> = None;
    let mut plot_data = false;
    let mut verbose = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                i += 1;
                config_path = args.get(i).map(PathBuf::from);
            }
            "--data" => {
                i += 1;
                data_dir = args.get(i).map(PathBuf::from);
            }
            "--pattern" => {
                i += 1;
                pattern = args.get(i).cloned();
            }
            "--output" => {
                i += 1;
                output = args.get(i).map(PathBuf::from);
            }
            "--plot-data" => plot_data = true,
            "--verbose" => verbose = true,
            "--help" | "-h" => {
                print_usage();
                return Ok(());
            }
            other => {
                eprintln!("Unknown argument: {}", other);
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    init_tracing();
    init_base_path()?;
    init_rayon_threads();

    let mut config = match &config_path {
        Some(path) => RunConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => RunConfig::default(),
    };
    if let Some(d) = data_dir {
        config.paths.agent_data_path = d;
    }
    if let Some(p) = pattern {
        config.paths.file_name_pattern = p;
    }
    if let Some(o) = output {
        config.paths.fitted_data_path = o;
    }
    config.minimizer.save_plot_data |= plot_data;
    config.minimizer.verbose |= verbose;

    let fitter = FitParameters::new(&config)?;
    let files = discover_data_files(&config.paths.agent_data_path, &config.paths.file_name_pattern)?;

    println!("=== tasksets-fit ===");
    println!(
        "Data set: {}  Learning style: {}  Free: {:?}  Files: {}",
        config.data_set.as_str(),
        config.learning_style,
        fitter.space().fit_par_names(),
        files.len()
    );

    let heatmap_root = config
        .minimizer
        .save_plot_data
        .then(|| config.paths.heatmap_data_path.clone());
    let t0 = Instant::now();
    let results: Vec<_> = files
        .par_iter()
        .map(|path| {
            let res = fitter.fit_file(path, &config.paths.fitted_data_path, heatmap_root.as_deref());
            (path, res)
        })
        .collect();

    println!();
    println!("{:<40} {:>10}  parameters", "file", "NLL");
    println!("{}", "-".repeat(80));
    let mut n_failed = 0;
    for (path, res) in &results {
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("?");
        match res {
            Ok(fit) => {
                let values: Vec<String> = fitter
                    .space()
                    .fit_pars
                    .iter()
                    .map(|&p| format!("{}={:.3}", p, fit.params.get(p)))
                    .collect();
                println!("{:<40} {:>10.3}  {}", name, fit.nll, values.join(" "));
            }
            Err(e) => {
                n_failed += 1;
                error!("{}: {}", path.display(), e);
            }
        }
    }
    info!(
        "Fitted {}/{} files in {:.1}s",
        results.len() - n_failed,
        results.len(),
        t0.elapsed().as_secs_f64()
    );
    if n_failed > 0 {
        anyhow::bail!("{} of {} files failed", n_failed, results.len());
    }
    Ok(())
}
