//! Rank card pairs by forecast trajectory
//!
//! Loads a model config, its scalers and a detections file, rolls the LSTM
//! forward for each card of every group and prints who leads the scored
//! half of the horizon.
//!
//! Usage: cargo run -p demos --bin rank_groups -- --config models/model.json --group Tc,Td

use anyhow::{Context, Result};
use cardcast_forecast::{
    build_predictor, evaluate_groups_concurrently, GroupReport, RankingGroup, RankingOutcome,
    RankingPipeline,
};
use cardcast_history::DetectionStore;
use cardcast_model::{validate_onnx_model, ModelConfig};
use clap::Parser;
use log::info;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Detections used when no file is given
const SAMPLE_DETECTIONS: &str = r#"{
    "Tc": [
        [552, 1130, 601, 1237, 0.6396484475],
        [554, 1131, 602, 1240, 0.6396484575],
        [555, 1132, 603, 1241, 0.6396484675],
        [556, 1133, 604, 1242, 0.6396484175]
    ],
    "Td": [
        [552, 1130, 651, 1257, 0.6396484475],
        [554, 1131, 662, 1260, 0.6396484575],
        [555, 1132, 663, 1271, 0.6396484675],
        [556, 1133, 674, 1282, 0.6396484175]
    ]
}"#;

#[derive(Parser)]
struct CliArgs {
    /// Model config JSON; defaults are used when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Detections JSON: {"label": [[x_min, y_min, x_max, y_max, conf], ...]}
    #[arg(long)]
    detections: Option<PathBuf>,

    /// Pair of labels to rank, e.g. "Tc,Td"; repeatable
    #[arg(long = "group", default_value = "Tc,Td")]
    groups: Vec<RankingGroup>,

    /// Evaluate groups on parallel tasks
    #[arg(long)]
    parallel: bool,

    /// Check the ONNX model's tensor names before running
    #[arg(long)]
    check_model: bool,
}

fn load_config(path: Option<&Path>) -> Result<ModelConfig> {
    match path {
        Some(path) => {
            let base = path.parent().unwrap_or_else(|| Path::new("."));
            Ok(ModelConfig::from_json_file(path)?.resolve_paths(base))
        }
        None => Ok(ModelConfig::default()),
    }
}

fn print_report(index: usize, report: &GroupReport) {
    let [first, second] = report.group.labels();
    println!("\n▶ Group {index}: {first} vs {second}");
    for run in &report.runs {
        println!("   {} ({} steps, {} skipped)", run.label, run.len(), run.skipped);
        for step in &run.steps {
            let c = step.center();
            println!("      #{:<2} cx={:>8.2} cy={:>8.2}", step.iteration, c.cx, c.cy);
        }
    }

    match &report.outcome {
        RankingOutcome::Ranked(standings) | RankingOutcome::Tie(standings) => {
            for c in &standings.comparisons {
                println!("   #{:<2} {first} {:.2} vs {second} {:.2}", c.iteration, c.cy_first, c.cy_second);
            }
            let tie = matches!(report.outcome, RankingOutcome::Tie(_));
            println!("✅ Ranking{}: {:?}", if tie { " (tie)" } else { "" }, standings.order);
        }
        RankingOutcome::NoResult { collected, expected } => {
            println!("❌ {collected} of {expected} forecast steps collected, no result for {first} / {second}");
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = CliArgs::parse();

    let config = load_config(args.config.as_deref())?;
    if args.check_model {
        validate_onnx_model(&config.model_path, &config.input_name, &config.output_name)?;
        info!("model {:?} exposes {} → {}", config.model_path, config.input_name, config.output_name);
    }
    let scalers = Arc::new(config.load_scalers()?);

    let store = match &args.detections {
        Some(path) => DetectionStore::from_json_file(path)
            .with_context(|| format!("Failed to load detections from {:?}", path))?,
        None => DetectionStore::from_json_str(SAMPLE_DETECTIONS)?,
    };
    info!("{} labels loaded, ranking {} groups", store.len(), args.groups.len());

    let predictor = build_predictor(&config).context("Failed to build predictor")?;
    let pipeline = RankingPipeline::new(&config, scalers)?;

    let reports = if args.parallel {
        evaluate_groups_concurrently(Arc::new(pipeline), args.groups.clone(), Arc::new(store), predictor).await
    } else {
        pipeline.evaluate_groups(&args.groups, &store, predictor.as_ref())
    };

    for (idx, (group, report)) in args.groups.iter().zip(&reports).enumerate() {
        match report {
            Ok(report) => print_report(idx + 1, report),
            Err(e) => println!("\n▶ Group {}: {} vs {}\n❌ no result: {e}", idx + 1, group.first, group.second),
        }
    }
    Ok(())
}
