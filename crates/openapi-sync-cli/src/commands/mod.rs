pub mod combine;
pub mod fetch;
pub mod sync;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use openapi_sync::{CombineReport, Combiner, PatchRule, SyncOutcome, SyncReport};

/// Build a combiner. `generated_at` comes from `SOURCE_DATE_EPOCH` and is
/// omitted when that is unset.
pub fn combiner(patches: Vec<PatchRule>) -> Result<Combiner> {
    let epoch = std::env::var("SOURCE_DATE_EPOCH").ok();
    let combiner = Combiner::new().with_patches(patches);
    Ok(match parse_source_date_epoch(epoch.as_deref())? {
        Some(ts) => combiner.with_generated_at(ts),
        None => combiner,
    })
}

fn parse_source_date_epoch(value: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    let Some(raw) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    let secs: i64 = raw
        .parse()
        .with_context(|| format!("SOURCE_DATE_EPOCH is not a number: {raw}"))?;
    let ts = DateTime::from_timestamp(secs, 0)
        .with_context(|| format!("SOURCE_DATE_EPOCH out of range: {raw}"))?;
    Ok(Some(ts))
}

/// Print one line per entry, then a summary.
pub fn print_report(report: &SyncReport) {
    for entry in &report.entries {
        let marker = match &entry.outcome {
            SyncOutcome::Updated => "updated  ",
            SyncOutcome::Unchanged => "unchanged",
            SyncOutcome::Failed(_) => "FAILED   ",
            SyncOutcome::Skipped => "skipped  ",
        };
        println!(
            "  {marker} {} -> {}",
            entry.schema.name(),
            entry.schema.dest().display()
        );
        if let SyncOutcome::Failed(reason) = &entry.outcome {
            println!("            {reason}");
        }
    }
    println!("Synced {} specs: {report}.", report.entries.len());
}

pub fn print_combine(report: &CombineReport) {
    if report.written {
        println!(
            "Combined {} specs into {}.",
            report.specs,
            report.output.display()
        );
    } else {
        println!("{} is up to date.", report.output.display());
    }
}

/// One line per failure, for error context.
pub fn describe_failures(report: &SyncReport) -> String {
    report
        .failures()
        .map(|(schema, reason)| format!("{} ({}): {reason}", schema.name(), schema.source()))
        .collect::<Vec<_>>()
        .join("\n")
}
