//! Load fund records from CSV or JSON snapshot files
//!
//! CSV files use the columns `date,balance,claims_received,claims_approved,
//! payout_to_date,notes,source_url`. JSON files may hold either a bare array of
//! records or the snapshot database layout `{ "snapshots": [...] }`.
//!
//! Loaded records come back newest first with duplicate dates removed, which is
//! the ordering the rest of the crate expects from its feed.

use csv::Reader;
use log::{debug, warn};
use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use super::FundRecord;
use crate::error::{ForecastError, Result};

#[derive(Deserialize)]
#[serde(untagged)]
enum SnapshotFile {
    Database { snapshots: Vec<FundRecord> },
    Bare(Vec<FundRecord>),
}

/// Load records from a file, choosing the format by extension
pub fn load_records<P: AsRef<Path>>(path: P) -> Result<Vec<FundRecord>> {
    let path = path.as_ref();
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("csv") => load_records_csv(path),
        Some(ext) if ext.eq_ignore_ascii_case("json") => load_records_json(path),
        _ => Err(ForecastError::InvalidRecord(format!(
            "unsupported records file {}",
            path.display()
        ))),
    }
}

/// Load records from a CSV file
pub fn load_records_csv<P: AsRef<Path>>(path: P) -> Result<Vec<FundRecord>> {
    let file = File::open(path)?;
    load_records_from_reader(file)
}

/// Load records from any CSV reader (e.g., string buffer, network stream)
pub fn load_records_from_reader<R: Read>(reader: R) -> Result<Vec<FundRecord>> {
    let mut csv_reader = Reader::from_reader(reader);
    let mut records = Vec::new();

    for result in csv_reader.deserialize() {
        let record: FundRecord = result?;
        check_record(&record)?;
        records.push(record);
    }

    Ok(normalize(records))
}

/// Load records from a JSON snapshot file
pub fn load_records_json<P: AsRef<Path>>(path: P) -> Result<Vec<FundRecord>> {
    let file = File::open(path)?;
    let parsed: SnapshotFile = serde_json::from_reader(file)?;
    let records = match parsed {
        SnapshotFile::Database { snapshots } => snapshots,
        SnapshotFile::Bare(records) => records,
    };

    for record in &records {
        check_record(record)?;
    }

    Ok(normalize(records))
}

fn check_record(record: &FundRecord) -> Result<()> {
    if !record.balance.is_finite() {
        return Err(ForecastError::InvalidRecord(format!(
            "{}: balance is not a finite number",
            record.date
        )));
    }
    Ok(())
}

/// Sort newest first and keep the first record seen for each date
fn normalize(mut records: Vec<FundRecord>) -> Vec<FundRecord> {
    let loaded = records.len();
    records.sort_by(|a, b| b.date.cmp(&a.date));
    records.dedup_by(|later, earlier| later.date == earlier.date);

    if records.len() < loaded {
        warn!("Dropped {} fund records with duplicate dates", loaded - records.len());
    }
    debug!("Loaded {} fund records", records.len());
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::io::Write;

    const CSV: &str = "\
date,balance,claims_received,claims_approved,payout_to_date,notes,source_url
2026-01-01,622,80,64,8,,
2026-03-01,600,100,80,12,quarterly report,https://example.org/q1
2026-02-01,612,90,72,10,,
2026-02-01,999,1,1,1,duplicate,
";

    #[test]
    fn test_load_csv_sorted_newest_first() {
        let records = load_records_from_reader(CSV.as_bytes()).unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].date, NaiveDate::from_ymd_opt(2026, 3, 1).unwrap());
        assert_eq!(records[0].notes.as_deref(), Some("quarterly report"));
        assert_eq!(records[1].balance, 612.0);
        assert_eq!(records[2].balance, 622.0);
        assert!(records[2].notes.is_none());
    }

    #[test]
    fn test_load_snapshot_database_json() {
        let path = std::env::temp_dir().join("fund_depletion_loader_test.json");
        let mut file = File::create(&path).unwrap();
        write!(
            file,
            r#"{{
                "meta": {{ "last_updated": "2026-03-01", "version": "1" }},
                "snapshots": [
                    {{ "date": "2026-02-01", "fund_balance_millions": 612, "claims_received": 90, "claims_approved": 72, "total_payout_millions": 10 }},
                    {{ "date": "2026-03-01", "fund_balance_millions": 600, "claims_received": 100, "claims_approved": 80, "total_payout_millions": 12 }}
                ]
            }}"#
        )
        .unwrap();

        let records = load_records(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].balance, 600.0);
        assert_eq!(records[1].payout_to_date, 10.0);
    }

    #[test]
    fn test_unknown_extension_rejected() {
        let err = load_records("records.xlsx").unwrap_err();
        assert!(matches!(err, ForecastError::InvalidRecord(_)));
    }
}
