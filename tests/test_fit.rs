//! End-to-end tests: simulate to CSV, read back, fit, and write annotated logs.
//!
//! Everything runs in temporary directories with short tasks so the whole
//! file stays fast.

use std::fs;
use std::path::Path;

use tempfile::tempdir;

use tasksets::agent::Agent;
use tasksets::config::RunConfig;
use tasksets::data::{discover_data_files, load_observations, parameters_from_log};
use tasksets::fit::FitParameters;
use tasksets::genrec::{generate_and_recover, write_genrec};
use tasksets::params::{ParamName, Parameters};
use tasksets::population::simulate_population;
use tasksets::record::TrialLog;
use tasksets::types::{DataSet, LearningStyle, TaskDims};

/// Twenty Aliens trials cycling through every context and alien.
fn write_sequence(path: &Path) {
    let mut text = String::from("context,sad_alien\n");
    for trial in 0..20 {
        text.push_str(&format!("{},{}\n", (trial / 4) % 3, trial % 4));
    }
    fs::write(path, text).unwrap();
}

fn flat_config(sequence: &Path) -> RunConfig {
    let mut cfg = RunConfig {
        data_set: DataSet::Aliens,
        learning_style: LearningStyle::Flat,
        ..RunConfig::default()
    };
    cfg.parameters.defaults = Parameters {
        alpha: 0.2,
        beta: 5.0,
        forget: 0.05,
        ..Parameters::default()
    };
    cfg.task.sequence_path = Some(sequence.to_path_buf());
    cfg.minimizer.nm_niter = 2;
    cfg.minimizer.nm_maxfev = 80;
    cfg
}

fn ps_config() -> RunConfig {
    let mut cfg = RunConfig {
        data_set: DataSet::Ps,
        learning_style: LearningStyle::Rl,
        ..RunConfig::default()
    };
    cfg.task.ps_n_trials = 30;
    cfg.minimizer.nm_niter = 2;
    cfg.minimizer.nm_maxfev = 60;
    cfg
}

fn last_f64(log: &TrialLog, column: &str) -> f64 {
    log.cell(column, log.n_rows() - 1).unwrap().parse().unwrap()
}

// ── Simulation ───────────────────────────────────────────────────────────

#[test]
fn flat_agent_on_recorded_sequence() {
    let dir = tempdir().unwrap();
    let seq = dir.path().join("sequence.csv");
    write_sequence(&seq);
    let fitter = FitParameters::new(&flat_config(&seq)).unwrap();

    let log = fitter.simulate_agent(&fitter.space().defaults, 11, false).unwrap();
    assert_eq!(log.n_rows(), 20);
    for row in 0..20 {
        let r: f64 = log.cell("reward", row).unwrap().parse().unwrap();
        assert!(r == 0.0 || r == 1.0, "reward {} in row {}", r, row);
        let context: usize = log.cell("context", row).unwrap().parse().unwrap();
        assert_eq!(context, (row / 4) % 3);
    }
    assert!(last_f64(&log, "LL") < 0.0);
    assert_eq!(last_f64(&log, "alpha"), 0.2);
    assert_eq!(last_f64(&log, "beta"), 5.0);
}

#[test]
fn simulation_is_reproducible_from_its_seed() {
    let fitter = FitParameters::new(&ps_config()).unwrap();
    let pars = Parameters::default();
    let a = fitter.simulate_agent(&pars, 3, false).unwrap();
    let b = fitter.simulate_agent(&pars, 3, false).unwrap();
    assert_eq!(a, b);
}

// ── Likelihood ───────────────────────────────────────────────────────────

#[test]
fn uniform_choice_has_known_likelihood() {
    let dir = tempdir().unwrap();
    let seq = dir.path().join("sequence.csv");
    write_sequence(&seq);
    let mut cfg = flat_config(&seq);
    cfg.parameters.defaults.epsilon = 1.0;
    let fitter = FitParameters::new(&cfg).unwrap();

    let log = fitter.simulate_agent(&fitter.space().defaults, 4, false).unwrap();
    let expected = -20.0 * 3f64.ln();
    assert!((last_f64(&log, "LL") - expected).abs() < 1e-9, "LL {}", last_f64(&log, "LL"));
    for row in 0..20 {
        let p: f64 = log.cell("p_action", row).unwrap().parse().unwrap();
        assert!((p - 1.0 / 3.0).abs() < 1e-12);
    }
}

#[test]
fn final_ll_is_sum_of_log_choice_probabilities() {
    let dir = tempdir().unwrap();
    let seq = dir.path().join("sequence.csv");
    write_sequence(&seq);
    let fitter = FitParameters::new(&flat_config(&seq)).unwrap();

    let log = fitter.simulate_agent(&fitter.space().defaults, 8, false).unwrap();
    let total: f64 = (0..log.n_rows())
        .map(|row| log.cell("p_action", row).unwrap().parse::<f64>().unwrap().ln())
        .sum();
    assert!((last_f64(&log, "LL") - total).abs() < 1e-9);
}

#[test]
fn mixed_hierarchical_replay_matches_simulation() {
    let dir = tempdir().unwrap();
    let seq = dir.path().join("sequence.csv");
    write_sequence(&seq);
    let mut cfg = flat_config(&seq);
    cfg.learning_style = LearningStyle::Hierarchical;
    cfg.mix_probs = true;
    let fitter = FitParameters::new(&cfg).unwrap();

    // One phase and the replay seed: the agent draws the same random stream
    // in both runs.
    let pars = fitter.space().defaults.clone();
    let log = fitter.simulate_agent(&pars, cfg.seed, false).unwrap();
    let path = dir.path().join("hier_0.csv");
    log.write_csv(&path).unwrap();
    let (_, obs) = load_observations(&path, DataSet::Aliens).unwrap();
    let nll = fitter.nll(&pars, &obs).unwrap();
    let sim_ll = last_f64(&log, "LL");
    assert!((sim_ll + nll).abs() < 1e-9, "sim {} replay {}", sim_ll, nll);
}

#[test]
fn nll_is_bit_identical_across_evaluations() {
    let dir = tempdir().unwrap();
    let seq = dir.path().join("sequence.csv");
    write_sequence(&seq);
    let fitter = FitParameters::new(&flat_config(&seq)).unwrap();

    let log = fitter.simulate_agent(&fitter.space().defaults, 5, false).unwrap();
    let path = dir.path().join("flat_0.csv");
    log.write_csv(&path).unwrap();
    let (_, obs) = load_observations(&path, DataSet::Aliens).unwrap();
    assert_eq!(obs.len(), 20);

    let unit = vec![0.3; fitter.space().n_fit_par()];
    let first = fitter.calculate_nll(&unit, &obs);
    for _ in 0..5 {
        assert_eq!(fitter.calculate_nll(&unit, &obs).to_bits(), first.to_bits());
    }
    let stats = fitter
        .calculate_fit(&fitter.space().assemble_unit(&unit), &obs)
        .unwrap();
    assert_eq!(stats.nll.to_bits(), first.to_bits());
}

// ── Files ────────────────────────────────────────────────────────────────

#[test]
fn run_config_round_trips_through_json() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("config.json");
    let mut cfg = ps_config();
    cfg.parameters.fit_pars = vec![ParamName::Alpha, ParamName::Beta];
    cfg.parameters.defaults.nalpha = 0.4;
    cfg.save(&path).unwrap();
    let loaded = RunConfig::load(&path).unwrap();
    assert_eq!(loaded, cfg);
}

#[test]
fn invalid_config_is_rejected_on_load() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.json");
    let mut cfg = ps_config();
    cfg.learning_style = LearningStyle::Hierarchical;
    cfg.save(&path).unwrap();
    assert!(RunConfig::load(&path).is_err());
}

#[test]
fn fit_file_writes_annotated_log_and_plot_data() {
    let dir = tempdir().unwrap();
    let mut cfg = ps_config();
    cfg.minimizer.save_plot_data = true;
    cfg.minimizer.brute_ns = 3;
    let fitter = FitParameters::new(&cfg).unwrap();

    let data_dir = dir.path().join("data");
    simulate_population(&fitter, &[Parameters::default()], &data_dir, 9, false).unwrap();
    let files = discover_data_files(&data_dir, "RL_*.csv").unwrap();
    assert_eq!(files.len(), 1);

    let out_dir = dir.path().join("fitted");
    let heatmaps = dir.path().join("heatmaps");
    let fit = fitter.fit_file(&files[0], &out_dir, Some(&heatmaps)).unwrap();
    assert!(fit.nll.is_finite());

    let annotated = TrialLog::read_csv(&out_dir.join("RL_0_fit.csv")).unwrap();
    assert_eq!(annotated.n_rows(), 30);
    assert!((last_f64(&annotated, "NLL_rec") - fit.nll).abs() < 1e-9);
    assert_eq!(
        annotated.cell("fit_pars_rec", 0),
        Some(fitter.space().fit_par_names().join(";").as_str())
    );

    let plot_dir = heatmaps.join("RL_0");
    for name in ["brute_results.csv", "hoppin_result.csv", "hoppin_paths.csv", "hoppin_minima.csv"] {
        assert!(plot_dir.join(name).exists(), "missing {}", name);
    }
    let brute = TrialLog::read_csv(&plot_dir.join("brute_results.csv")).unwrap();
    assert_eq!(brute.n_rows(), 3usize.pow(fitter.space().n_fit_par() as u32));
}

#[test]
fn fitted_parameters_reload_into_identical_agent() {
    let dir = tempdir().unwrap();
    let seq = dir.path().join("sequence.csv");
    write_sequence(&seq);
    let fitter = FitParameters::new(&flat_config(&seq)).unwrap();

    let data = dir.path().join("flat_0.csv");
    fitter
        .simulate_agent(&fitter.space().defaults, 21, false)
        .unwrap()
        .write_csv(&data)
        .unwrap();
    let out_dir = dir.path().join("fitted");
    let fit = fitter.fit_file(&data, &out_dir, None).unwrap();

    let fitted_path = out_dir.join("flat_0_fit.csv");
    let fitted = TrialLog::read_csv(&fitted_path).unwrap();
    let reloaded = parameters_from_log(
        &fitted,
        "_rec",
        &Parameters::default(),
        &fitted_path.display().to_string(),
    )
    .unwrap();
    for name in ParamName::ALL {
        assert!((reloaded.get(name) - fit.params.get(name)).abs() < 1e-12, "{}", name);
    }

    let build = |pars: Parameters| {
        Agent::new(fitter.agent_config(), pars, TaskDims::aliens()).unwrap()
    };
    match (build(fit.params.clone()), build(reloaded)) {
        (Agent::Alien(a), Agent::Alien(b)) => {
            assert_eq!(a.q_low(), b.q_low());
            assert_eq!(a.q_high(), b.q_high());
        }
        _ => panic!("expected Aliens agents"),
    }
}

#[test]
fn discover_reports_empty_directory() {
    let dir = tempdir().unwrap();
    assert!(discover_data_files(dir.path(), "*.csv").is_err());
}

// ── Generate and recover ─────────────────────────────────────────────────

#[test]
fn genrec_writes_one_row_per_agent() {
    let dir = tempdir().unwrap();
    let mut cfg = ps_config();
    cfg.learning_style = LearningStyle::Bayes;
    cfg.parameters.fit_pars = vec![ParamName::Beta, ParamName::PSwitch];
    let fitter = FitParameters::new(&cfg).unwrap();

    let rows = generate_and_recover(&fitter, 2, 100).unwrap();
    assert_eq!(rows.len(), 2);
    let path = dir.path().join("genrec.csv");
    write_genrec(&fitter, &rows, &path).unwrap();

    let log = TrialLog::read_csv(&path).unwrap();
    assert_eq!(log.n_rows(), 2);
    for col in ["agent", "NLL", "BIC", "AIC", "sim_beta", "rec_beta", "sim_p_switch", "rec_p_switch"] {
        assert!(log.has_column(col), "missing {}", col);
    }
}
