//! Class info command

use crate::output::{print_table, print_warning, OutputFormat};
use anyhow::Result;
use gateway_lib::{ClassInfo, GatewayEnvironment};
use std::collections::BTreeMap;
use tabled::Tabled;

#[derive(Tabled)]
struct ClassInfoRow {
    #[tabled(rename = "Class")]
    class: String,
    #[tabled(rename = "Sources")]
    num_sources: usize,
    #[tabled(rename = "Weights")]
    weights: String,
}

fn info_rows(info: &BTreeMap<String, ClassInfo>) -> Vec<ClassInfoRow> {
    info.iter()
        .map(|(class, info)| ClassInfoRow {
            class: class.clone(),
            num_sources: info.num_sources,
            weights: match &info.weights {
                Some(weights) => weights
                    .iter()
                    .map(|(source, w)| format!("{}={:.3}", source, w))
                    .collect::<Vec<_>>()
                    .join(", "),
                None => "unknown".to_string(),
            },
        })
        .collect()
}

/// Query one pod per class and print its weights and source count
pub async fn class_info(env: &mut GatewayEnvironment, format: OutputFormat) -> Result<()> {
    if env.pods().is_empty() && matches!(format, OutputFormat::Table) {
        print_warning("No pods configured; add a [pods] table to the settings file");
    }
    let info = env.fetch_class_info().await;
    print_table(&info_rows(&info), &info, format)
}
