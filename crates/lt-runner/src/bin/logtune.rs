use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use lt_optimizer::{create_study, strategy_from_name, SearchSpace, TrialOrchestrator};
use lt_runner::{init_logging, ConfigResolver, FileTrialRunner, Settings};

fn main() -> anyhow::Result<()> {
    let settings_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("logtune.json"));

    let settings = Settings::load(&settings_path)
        .with_context(|| format!("loading settings from {}", settings_path.display()))?;
    init_logging(&settings.log_level, settings.log_file.as_deref())?;
    tracing::info!("Logtune starting with settings from {}", settings_path.display());
    tracing::debug!("{:#?}", settings);

    let (params, tags) = ConfigResolver::new(
        &settings.primary_config_path,
        Some(settings.override_file_path.clone()),
    )
    .resolve_required(&settings.params_key, &settings.log_tags_key)
    .context("resolving parameter and tag declarations")?;
    tracing::info!(
        "Optimizing {} parameter(s) against objectives {:?}",
        params.len(),
        settings.objectives
    );

    let ctx = settings.trial_context(params, &tags)?;
    let space = SearchSpace::from_params(&ctx.params);
    let strategy = strategy_from_name(&settings.strategy, space, &settings.strategy_options())?;
    let mut study = create_study(&ctx, strategy)?;

    let mut orchestrator = TrialOrchestrator::new(FileTrialRunner::from_settings(&settings));
    let outcome = orchestrator.run(&mut study, &ctx);

    for trial in study.best_trials() {
        tracing::info!(
            "Pareto trial {}: params {:?} values {:?}",
            trial.trial_number,
            trial.parameters,
            trial.values
        );
    }

    if let Some(report_path) = &settings.report_path {
        let report = serde_json::to_string_pretty(&study.summary())?;
        fs::write(report_path, report)
            .with_context(|| format!("writing report to {}", report_path.display()))?;
        tracing::info!("Wrote study report to {}", report_path.display());
    }

    let summary = outcome.context("study aborted")?;
    tracing::info!(
        "Logtune finished: {} trial(s) completed, {} failed",
        summary.trials_completed,
        summary.trials_failed
    );
    Ok(())
}
