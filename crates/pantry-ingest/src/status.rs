//! `pantry-ingest status`: one-shot summary of the checkpoint

use crate::error::Result;
use crate::monitor::RECENT_ERRORS_SHOWN;
use crate::progress::{format_eta, format_percent, format_rate};
use chrono::{DateTime, Utc};
use colored::Colorize;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Table};
use pantry_common::checkpoint::CheckpointStore;
use pantry_common::types::IngestionCheckpoint;

/// Print the checkpoint as raw JSON or as a summary table
pub fn run(store: &CheckpointStore, json: bool) -> Result<()> {
    let Some(checkpoint) = store.load()? else {
        println!("No active run (no checkpoint at {})", store.path().display());
        return Ok(());
    };

    if json {
        let raw = serde_json::to_string_pretty(&checkpoint).map_err(pantry_common::PantryError::from)?;
        println!("{}", raw);
        return Ok(());
    }

    println!("{}", "Ingestion Status:".cyan().bold());
    println!("{}", summary_table(&checkpoint, Utc::now()));

    let errors = checkpoint.recent_errors(RECENT_ERRORS_SHOWN);
    if !errors.is_empty() {
        println!();
        println!("{}", "Recent errors:".yellow().bold());
        for error in errors {
            println!("  {} {}", "•".yellow(), error);
        }
    }
    Ok(())
}

/// Key/value table of the checkpoint counters
pub fn summary_table(checkpoint: &IngestionCheckpoint, now: DateTime<Utc>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS);

    let partition = format!(
        "{} ({}/{})",
        checkpoint.current_data_type,
        checkpoint.current_data_type_index + 1,
        checkpoint.data_types.len()
    );
    let progress = format!(
        "{}/{} ({})",
        checkpoint.processed_items,
        checkpoint.total_items,
        format_percent(checkpoint.progress_ratio())
    );

    table.add_row(vec!["Run", &checkpoint.run_id.to_string()]);
    table.add_row(vec!["Status", checkpoint.status.as_str()]);
    table.add_row(vec!["Data type", &partition]);
    table.add_row(vec!["Last page", &checkpoint.current_page.to_string()]);
    table.add_row(vec!["Progress", &progress]);
    table.add_row(vec!["Inserted", &checkpoint.successful_inserts.to_string()]);
    table.add_row(vec!["Duplicates", &checkpoint.skipped_duplicates.to_string()]);
    table.add_row(vec!["Failed", &checkpoint.failed_records.to_string()]);
    table.add_row(vec!["Buffered", &checkpoint.batch_buffer.len().to_string()]);
    table.add_row(vec![
        "Throughput",
        &format_rate(checkpoint.throughput(checkpoint.last_update_time)),
    ]);
    table.add_row(vec!["ETA", &format_eta(checkpoint.estimated_completion, now)]);
    table.add_row(vec![
        "Started",
        &checkpoint.start_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    ]);
    table.add_row(vec![
        "Updated",
        &checkpoint.last_update_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    ]);

    for (data_type, hits) in &checkpoint.partition_totals {
        table.add_row(vec![format!("Hits: {}", data_type), hits.to_string()]);
    }
    table
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_table_contents() {
        let start = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let mut cp = IngestionCheckpoint::new(
            vec!["Foundation".to_string(), "Branded".to_string()],
            start,
        );
        cp.record_partition_total("Foundation", 10);
        cp.record_processed(5);
        cp.record_writes(4, 1, 0);
        cp.complete_page(3);

        let rendered = summary_table(&cp, start).to_string();
        assert!(rendered.contains("Foundation (1/2)"));
        assert!(rendered.contains("5/10 (50.0%)"));
        assert!(rendered.contains("Hits: Foundation"));
        assert!(rendered.contains("running"));
    }
}
