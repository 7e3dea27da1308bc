//! Class rate-limit command

use crate::output::{print_error, print_info, print_json, print_success, print_table, OutputFormat};
use anyhow::{bail, Result};
use gateway_lib::actuator::{token_plan, RateLimitReport};
use gateway_lib::{ClassWeights, GatewayEnvironment};
use serde::Serialize;
use std::collections::BTreeMap;
use tabled::Tabled;

#[derive(Tabled)]
struct TokenRow {
    #[tabled(rename = "Class")]
    class: String,
    #[tabled(rename = "Weight")]
    weight: String,
    #[tabled(rename = "Tokens / min")]
    tokens: u64,
}

#[derive(Serialize)]
struct AppliedLimit {
    tokens: Option<u64>,
    error: Option<String>,
}

fn token_rows(weights: &ClassWeights, plan: &BTreeMap<String, u64>) -> Vec<TokenRow> {
    plan.iter()
        .map(|(class, tokens)| TokenRow {
            class: class.clone(),
            weight: format!("{:.3}", weights.get(class).unwrap_or(0.0)),
            tokens: *tokens,
        })
        .collect()
}

fn applied(report: &RateLimitReport) -> BTreeMap<&str, AppliedLimit> {
    report
        .iter()
        .map(|(class, outcome)| {
            let limit = match outcome {
                Ok(tokens) => AppliedLimit { tokens: Some(*tokens), error: None },
                Err(e) => AppliedLimit { tokens: None, error: Some(e.clone()) },
            };
            (class.as_str(), limit)
        })
        .collect()
}

/// Print the token plan for `weights` and, unless dry-running, apply it
pub async fn rate_limits(
    env: &mut GatewayEnvironment,
    weights: &str,
    dry_run: bool,
    format: OutputFormat,
) -> Result<()> {
    let weights = ClassWeights::parse(weights)?;
    let plan = token_plan(&weights, env.capacity().total_ingestion_rate)?;

    if dry_run {
        print_table(&token_rows(&weights, &plan), &plan, format)?;
        if let OutputFormat::Table = format {
            print_info("Dry run - no TrafficPolicy was patched");
        }
        return Ok(());
    }

    let report = env.apply_rate_limits(weights).await?;
    let failures = report.values().filter(|r| r.is_err()).count();

    match format {
        OutputFormat::Json => print_json(&applied(&report))?,
        OutputFormat::Table => {
            for (class, outcome) in &report {
                match outcome {
                    Ok(tokens) => print_success(&format!("{}: {} tokens per minute", class, tokens)),
                    Err(e) => print_error(&format!("{}: {}", class, e)),
                }
            }
        }
    }

    if failures > 0 {
        bail!("{} of {} TrafficPolicy patches failed", failures, report.len());
    }
    Ok(())
}
