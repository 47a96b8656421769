use anyhow::Result;
use chrono::Utc;
use ruian_sync::{
    config::Config,
    store::{AddressStore, ImportRunLog},
};

use super::open_store;

pub fn show_status(config: Config, limit: usize, format: String) -> Result<()> {
    let store = open_store(&config)?;
    let logs: Vec<ImportRunLog> = store.logs()?.into_iter().take(limit).collect();
    let stats = store.stats()?;

    if format == "json" {
        let output = serde_json::json!({
            "data_dir": config.store.data_dir,
            "stats": stats,
            "runs": logs,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("\nAddress Store");
    println!("=============");
    println!("Data directory: {}", config.store.data_dir.display());
    println!("Towns:          {}", stats.towns);
    println!("Streets:        {}", stats.streets);
    println!("Numbers:        {}", stats.numbers);
    println!("Import runs:    {}", stats.runs);

    if logs.is_empty() {
        println!("\nNo import runs recorded. Start one with:");
        println!("  ruian-sync run");
        return Ok(());
    }
    for log in &logs {
        print_log(log);
    }
    Ok(())
}

/// Print one run log with its derived fields
pub fn print_log(log: &ImportRunLog) {
    let now = Utc::now();
    println!("\nRun {} [{}] {}", log.id, log.name, log.state);
    println!("  Started:   {}", log.start_date.format("%Y-%m-%d %H:%M:%S"));
    if let Some(end) = log.end_date {
        println!("  Ended:     {}", end.format("%Y-%m-%d %H:%M:%S"));
        println!("  Duration:  {:.2}h", log.duration_hours());
    }
    println!("  Progress:  {}", log.progress());
    let eta = log.eta(now);
    if !eta.is_empty() {
        println!("  ETA:       {}", eta);
    }
    println!("  Rows:      {}", log.rows);
    println!(
        "  Towns:     {} (+{} ~{})",
        log.towns.processed, log.towns.created, log.towns.updated
    );
    println!(
        "  Streets:   {} (+{} ~{})",
        log.streets.processed, log.streets.created, log.streets.updated
    );
    println!(
        "  Numbers:   {} (+{} ~{})",
        log.numbers.processed, log.numbers.created, log.numbers.updated
    );
    println!("  Warnings:  {}", log.warnings);
    if let Some(ref message) = log.error_message {
        println!("  Error:     {}", message);
    }
}
