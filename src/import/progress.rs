//! Progress tracking for import runs

use super::processor::FileStats;
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Snapshot of a run's progress
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStats {
    pub files_processed: u64,
    pub files_failed: u64,
    pub rows: u64,
    pub towns_created: u64,
    pub streets_created: u64,
    pub numbers_created: u64,
    pub updated: u64,
    pub warnings: u64,
    pub elapsed_seconds: f64,
    pub rows_per_second: f64,
}

impl RunStats {
    /// Calculate rows per second
    pub fn update_rate(&mut self) {
        if self.elapsed_seconds > 0.0 {
            self.rows_per_second = self.rows as f64 / self.elapsed_seconds;
        }
    }
}

/// Progress tracker over archive members
pub struct ImportProgress {
    /// Progress bar (None if running in quiet mode)
    progress_bar: Option<ProgressBar>,
    start_time: Instant,
    files_processed: AtomicU64,
    files_failed: AtomicU64,
    rows: AtomicU64,
    towns_created: AtomicU64,
    streets_created: AtomicU64,
    numbers_created: AtomicU64,
    updated: AtomicU64,
    warnings: AtomicU64,
}

impl ImportProgress {
    pub fn new(total_files: u64, quiet: bool) -> Self {
        let progress_bar = if !quiet {
            let pb = ProgressBar::new(total_files);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files ({percent}%) {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"),
            );
            Some(pb)
        } else {
            None
        };

        Self {
            progress_bar,
            start_time: Instant::now(),
            files_processed: AtomicU64::new(0),
            files_failed: AtomicU64::new(0),
            rows: AtomicU64::new(0),
            towns_created: AtomicU64::new(0),
            streets_created: AtomicU64::new(0),
            numbers_created: AtomicU64::new(0),
            updated: AtomicU64::new(0),
            warnings: AtomicU64::new(0),
        }
    }

    /// Show the member currently being read
    pub fn file_started(&self, name: &str) {
        if let Some(ref pb) = self.progress_bar {
            let display = if name.chars().count() > 30 {
                let truncated: String = name.chars().take(27).collect();
                format!("{}...", truncated)
            } else {
                name.to_string()
            };
            pb.set_message(display);
        }
    }

    /// Record a member whose rows were committed
    pub fn file_processed(&self, stats: &FileStats) {
        let done = self.files_processed.fetch_add(1, Ordering::Relaxed) + 1;
        self.rows.fetch_add(stats.rows, Ordering::Relaxed);
        self.towns_created.fetch_add(stats.towns.created, Ordering::Relaxed);
        self.streets_created.fetch_add(stats.streets.created, Ordering::Relaxed);
        self.numbers_created.fetch_add(stats.numbers.created, Ordering::Relaxed);
        self.updated.fetch_add(
            stats.towns.updated + stats.streets.updated + stats.numbers.updated,
            Ordering::Relaxed,
        );
        self.warnings.fetch_add(stats.warnings, Ordering::Relaxed);
        self.set_position(done);
    }

    /// Record a member that was rolled back
    pub fn file_failed(&self) {
        let done = self.files_processed.fetch_add(1, Ordering::Relaxed) + 1;
        self.files_failed.fetch_add(1, Ordering::Relaxed);
        self.warnings.fetch_add(1, Ordering::Relaxed);
        self.set_position(done);
    }

    fn set_position(&self, done: u64) {
        if let Some(ref pb) = self.progress_bar {
            pb.set_position(done);
            let elapsed = self.start_time.elapsed().as_secs_f64();
            let rows = self.rows.load(Ordering::Relaxed);
            let rate = if elapsed > 0.0 { rows as f64 / elapsed } else { 0.0 };
            pb.set_message(format!("{:.0} rows/s", rate));
        }
    }

    /// Get current statistics
    pub fn get_stats(&self) -> RunStats {
        let mut stats = RunStats {
            files_processed: self.files_processed.load(Ordering::Relaxed),
            files_failed: self.files_failed.load(Ordering::Relaxed),
            rows: self.rows.load(Ordering::Relaxed),
            towns_created: self.towns_created.load(Ordering::Relaxed),
            streets_created: self.streets_created.load(Ordering::Relaxed),
            numbers_created: self.numbers_created.load(Ordering::Relaxed),
            updated: self.updated.load(Ordering::Relaxed),
            warnings: self.warnings.load(Ordering::Relaxed),
            elapsed_seconds: self.start_time.elapsed().as_secs_f64(),
            rows_per_second: 0.0,
        };
        stats.update_rate();
        stats
    }

    /// Stop the bar after a failed run
    pub fn abandon(&self, message: &str) {
        if let Some(ref pb) = self.progress_bar {
            pb.abandon_with_message(message.to_string());
        }
    }

    /// Finish the progress bar
    pub fn finish(&self) {
        if let Some(ref pb) = self.progress_bar {
            let stats = self.get_stats();
            pb.finish_with_message(format!(
                "Done! {} rows, {} warnings, {:.0} rows/s",
                stats.rows, stats.warnings, stats.rows_per_second
            ));
        }
    }

    /// Print summary to console
    pub fn print_summary(&self) {
        let stats = self.get_stats();

        println!("\nImport Summary");
        println!("==============");
        println!("Files processed:  {}", stats.files_processed);
        println!("Files failed:     {}", stats.files_failed);
        println!("Rows:             {}", stats.rows);
        println!("Towns created:    {}", stats.towns_created);
        println!("Streets created:  {}", stats.streets_created);
        println!("Numbers created:  {}", stats.numbers_created);
        println!("Rows updated:     {}", stats.updated);
        println!("Warnings:         {}", stats.warnings);
        println!("Elapsed time:     {:.1}s", stats.elapsed_seconds);
        println!("Processing rate:  {:.1} rows/s", stats.rows_per_second);
    }
}
