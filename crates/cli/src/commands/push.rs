//! Weight and SLO push commands

use crate::output::{print_push_report, OutputFormat};
use anyhow::{bail, Context, Result};
use gateway_lib::actuator::PushReport;
use gateway_lib::{GatewayEnvironment, SloPlan, WeightPlan};
use serde::de::DeserializeOwned;
use std::path::Path;

fn read_plan<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read plan file {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse plan file {}", path.display()))
}

fn finish(what: &str, report: &PushReport, format: OutputFormat) -> Result<()> {
    print_push_report(what, report, format)?;
    if !report.failed.is_empty() {
        bail!("{} of {} {} pushes failed", report.failed.len(), report.attempted(), what);
    }
    Ok(())
}

/// Push per-source weights from a `class -> pod -> source -> weight` file
pub async fn push_weights(env: &mut GatewayEnvironment, file: &Path, format: OutputFormat) -> Result<()> {
    let plan: WeightPlan = read_plan(file)?;
    let report = env.push_weights_to_pods(&plan).await;
    finish("weights", &report, format)
}

/// Store and push an SLO plan from a `class -> pod -> [update]` file
pub async fn push_slos(env: &mut GatewayEnvironment, file: &Path, format: OutputFormat) -> Result<()> {
    let plan: SloPlan = read_plan(file)?;
    let report = env.set_timeliness_slo(plan).await?;
    finish("SLO", &report, format)
}
