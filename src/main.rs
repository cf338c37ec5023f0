use std::path::PathBuf;

use anyhow::{Context, Result};
use log::info;
use serde::Serialize;

use superstore_dash::data::views::DashboardViews;
use superstore_dash::{Config, DatasetCache, FilterSpec, Kpis, Pipeline, ResultCache};

/// JSON handed to the presentation layer.
#[derive(Serialize)]
struct Report<'a> {
    source: &'a PathBuf,
    checksum: &'a str,
    filter: &'a FilterSpec,
    rows: usize,
    kpis: &'a Kpis,
    views: &'a DashboardViews,
}

fn main() -> Result<()> {
    let config = Config::from_env();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(config.log_level.as_str()))
        .init();

    let path = config.resolve_data_path()?;
    let datasets = DatasetCache::new(config.load_options());
    let dataset = datasets
        .load(&path)
        .with_context(|| format!("loading {}", path.display()))?;

    // Optional filter file: a serialized FilterSpec. Without one, everything
    // is selected.
    let spec = match std::env::args().nth(1) {
        Some(filter_path) => {
            let text = std::fs::read_to_string(&filter_path)
                .with_context(|| format!("reading filter {filter_path}"))?;
            serde_json::from_str(&text).with_context(|| format!("parsing filter {filter_path}"))?
        }
        None => FilterSpec::full(&dataset.records),
    };

    let results = ResultCache::new(Pipeline::new(config.view_options()));
    let evaluation = results.evaluate(&dataset, &spec);
    info!(
        "{} of {} order lines selected",
        evaluation.filtered.len(),
        dataset.records.len()
    );

    let report = Report {
        source: &dataset.source,
        checksum: &dataset.checksum,
        filter: &spec,
        rows: evaluation.filtered.len(),
        kpis: &evaluation.kpis,
        views: &evaluation.views,
    };
    let stdout = std::io::stdout();
    serde_json::to_writer_pretty(stdout.lock(), &report).context("writing report")?;
    println!();
    Ok(())
}
