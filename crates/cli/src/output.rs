use crate::error::CliError;
use engine_config::settings::{CollectionSettings, TransitSettings};
use engine_runtime::execution::TransitReport;
use model::query::filter::SourceFilter;
use serde::Serialize;

/// Lag of one collection as printed by `transit lag`.
#[derive(Debug, Serialize)]
pub struct LagRow {
    pub collection: String,
    pub filter: SourceFilter,
    pub lag: u64,
}

#[derive(Serialize)]
struct SettingsView<'a> {
    dry_run: bool,
    run_loop: bool,
    progress_interval_secs: u64,
    cycle_delay_secs: u64,
    collections: Vec<CollectionView<'a>>,
}

#[derive(Serialize)]
struct CollectionView<'a> {
    name: &'a str,
    mode: &'static str,
    key_fields: &'a [String],
    upsert: bool,
    fetch_key_from_destination: bool,
    batch_size: usize,
    workers: usize,
    retry_workers: usize,
    channel_capacity: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    checkpoint_field: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    checkpoint_offset_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    forced_checkpoint: Option<String>,
}

impl<'a> From<&'a CollectionSettings> for CollectionView<'a> {
    fn from(c: &'a CollectionSettings) -> Self {
        let iterative = c.iterative.as_ref();
        Self {
            name: &c.name,
            mode: if c.is_iterative() { "iterative" } else { "full" },
            key_fields: &c.key_fields,
            upsert: c.upsert,
            fetch_key_from_destination: c.fetch_key_from_destination,
            batch_size: c.batch_size,
            workers: c.workers,
            retry_workers: c.retry_workers,
            channel_capacity: c.channel_capacity,
            checkpoint_field: iterative.map(|i| i.field.as_str()),
            checkpoint_offset_secs: iterative.map(|i| i.offset.as_secs()),
            forced_checkpoint: iterative
                .and_then(|i| i.force_checkpoint)
                .map(|dt| dt.to_string()),
        }
    }
}

/// Resolved settings as JSON. Connection strings are left out.
pub fn settings_json(settings: &TransitSettings) -> Result<String, CliError> {
    let view = SettingsView {
        dry_run: settings.dry_run,
        run_loop: settings.run_loop,
        progress_interval_secs: settings.progress_interval.as_secs(),
        cycle_delay_secs: settings.cycle_delay.as_secs(),
        collections: settings.collections.iter().map(CollectionView::from).collect(),
    };
    Ok(serde_json::to_string_pretty(&view)?)
}

pub async fn write_report(report: &TransitReport, path: String) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(report)?;
    tokio::fs::write(path, json).await?;
    Ok(())
}

pub fn print_report(report: &TransitReport) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

pub fn print_lag(rows: &[LagRow], as_json: bool) -> Result<(), CliError> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(rows)?);
        return Ok(());
    }

    println!("{:<32} {:>12}  {}", "Collection", "Lag", "Filter");
    println!("{}", "-".repeat(72));
    for row in rows {
        println!("{:<32} {:>12}  {}", row.collection, row.lag, row.filter);
    }
    Ok(())
}
