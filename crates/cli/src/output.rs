use crate::error::CliError;
use engine_runtime::ScanReport;
use model::{
    execution::{run::RunRecord, validation::ValidationResult},
    records::customer::Customer360Entity,
};
use serde::Serialize;
use serde_json::json;

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_scan_report(report: &ScanReport, as_json: bool) -> Result<(), CliError> {
    if as_json {
        return print_json(&json!({
            "arrivals": report.arrivals,
            "clean": report.clean,
            "quarantined": report.quarantined,
            "duplicates": report.duplicates,
            "ingestion_failures": report.ingestion_failures,
            "triggers": report.triggers,
            "runs": report.runs,
            "unrecorded": report.unrecorded,
        }));
    }

    println!(
        "Arrivals: {}  clean: {}  quarantined: {}  duplicates: {}  failed: {}",
        report.arrivals, report.clean, report.quarantined, report.duplicates, report.ingestion_failures
    );
    if report.unrecorded > 0 {
        println!("Batches left unrecorded: {}", report.unrecorded);
    }
    if report.runs.is_empty() {
        return Ok(());
    }
    println!();
    println!(
        "{:<30} {:<8} {:<8} {:>7} {:>7} {:>9}",
        "Batch", "Attempt", "Status", "Errors", "DQ", "Entities"
    );
    for run in &report.runs {
        let status = if run.duplicate {
            "SKIPPED".to_string()
        } else {
            run.status.as_str().to_string()
        };
        println!(
            "{:<30} {:<8} {:<8} {:>7} {:>7.3} {:>9}",
            run.batch_id.as_str(),
            run.attempt,
            status,
            run.error_count,
            run.dq_score,
            run.entities_written
        );
    }
    Ok(())
}

pub fn print_validation(result: &ValidationResult) -> Result<(), CliError> {
    print_json(result)
}

pub fn print_runs(runs: &[RunRecord], as_json: bool) -> Result<(), CliError> {
    if as_json {
        return print_json(runs);
    }
    if runs.is_empty() {
        println!("No runs in range");
        return Ok(());
    }
    println!(
        "{:<36} {:<30} {:<8} {:<8} {:>7} {:>7}  {}",
        "Record", "Batch", "Attempt", "Status", "Errors", "DQ", "Processed at"
    );
    for run in runs {
        println!(
            "{:<36} {:<30} {:<8} {:<8} {:>7} {:>7.3}  {}",
            run.record_id.as_str(),
            run.batch_id.as_str(),
            run.attempt,
            run.status.as_str(),
            run.error_count,
            run.dq_score,
            run.processed_at.to_rfc3339()
        );
    }
    Ok(())
}

pub fn print_customers(customers: &[Customer360Entity], as_json: bool) -> Result<(), CliError> {
    if as_json {
        return print_json(customers);
    }
    println!(
        "{:<12} {:<20} {:<16} {:>11} {:>9} {:>10} {:>8}",
        "Customer", "Name", "City", "Spend", "Orders", "Rating", "DQ"
    );
    for c in customers {
        let rating = c
            .avg_rating
            .map(|r| format!("{r:.2}"))
            .unwrap_or_else(|| "n/a".to_string());
        println!(
            "{:<12} {:<20} {:<16} {:>11.2} {:>9} {:>10} {:>8.3}",
            c.customer_id, c.name, c.city, c.total_spend, c.purchase_count, rating, c.dq_score
        );
    }
    Ok(())
}
