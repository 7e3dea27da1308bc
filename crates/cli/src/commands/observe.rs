//! Observation and urgency scoring commands

use crate::output::{color_ratio, format_ratio, print_table, OutputFormat};
use anyhow::Result;
use gateway_lib::observation::{
    AVG_DROP_RATIO, AVG_QUEUE_RATIO, AVG_STALENESS_RATIO, AVG_STARVATION_FLAG, MAX_DROP_RATIO,
    MAX_QUEUE_RATIO, MAX_STALENESS_RATIO, MAX_STARVATION_FLAG,
};
use gateway_lib::{metric, ClassStats, ClassSummary, GatewayEnvironment, UrgencyTree};
use tabled::Tabled;

#[derive(Tabled)]
struct ClassRow {
    #[tabled(rename = "Class")]
    class: String,
    #[tabled(rename = "Queue (avg/max)")]
    queue: String,
    #[tabled(rename = "Drop (avg/max)")]
    drop: String,
    #[tabled(rename = "Stale (avg/max)")]
    staleness: String,
    #[tabled(rename = "Starving (avg/max)")]
    starvation: String,
    #[tabled(rename = "Demand")]
    demand: String,
    #[tabled(rename = "Rejected")]
    rejection: String,
}

#[derive(Tabled)]
struct UrgencyRow {
    #[tabled(rename = "Class")]
    class: String,
    #[tabled(rename = "Pod")]
    pod: String,
    #[tabled(rename = "Source")]
    source: String,
    #[tabled(rename = "Urgency")]
    urgency: String,
}

fn pair(stats: &ClassStats, avg: &str, max: &str) -> String {
    match (stats.get(avg), stats.get(max)) {
        (Some(a), Some(m)) => format!("{} / {}", color_ratio(*a), color_ratio(*m)),
        _ => "-".to_string(),
    }
}

fn optional(stats: &ClassStats, key: &str) -> String {
    stats
        .get(key)
        .map(|v| format!("{:.2}", v))
        .unwrap_or_else(|| "-".to_string())
}

fn class_rows(summary: &ClassSummary) -> Vec<ClassRow> {
    summary
        .iter()
        .map(|(class, stats)| ClassRow {
            class: class.clone(),
            queue: pair(stats, AVG_QUEUE_RATIO, MAX_QUEUE_RATIO),
            drop: pair(stats, AVG_DROP_RATIO, MAX_DROP_RATIO),
            staleness: pair(stats, AVG_STALENESS_RATIO, MAX_STALENESS_RATIO),
            starvation: pair(stats, AVG_STARVATION_FLAG, MAX_STARVATION_FLAG),
            demand: optional(stats, metric::DEMAND_RATE),
            rejection: optional(stats, metric::REJECTION_RATE),
        })
        .collect()
}

fn urgency_rows(urgency: &UrgencyTree) -> Vec<UrgencyRow> {
    urgency
        .iter()
        .flat_map(|(class, pods)| {
            pods.iter().flat_map(move |(pod, sources)| {
                sources.iter().map(move |(source, score)| UrgencyRow {
                    class: class.clone(),
                    pod: pod.clone(),
                    source: source.clone(),
                    urgency: format_ratio(*score),
                })
            })
        })
        .collect()
}

/// Run one observation cycle and print the class summary
pub async fn observe(env: &mut GatewayEnvironment, window: u32, format: OutputFormat) -> Result<()> {
    let summary = env.get_observations(window).await?;
    print_table(&class_rows(&summary), &summary, format)
}

/// Observe, then print the urgency of every source
pub async fn score(env: &mut GatewayEnvironment, window: u32, format: OutputFormat) -> Result<()> {
    env.get_observations(window).await?;
    let urgency = env.compute_source_weights()?;
    print_table(&urgency_rows(&urgency), &urgency, format)
}
