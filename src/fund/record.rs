//! Fund record data structures matching the snapshot feed format

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};

/// One dated observation of the fund
///
/// Field aliases accept the snapshot feed's original column names
/// (`fund_balance_millions`, `total_payout_millions`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundRecord {
    /// Calendar day of the observation (unique key)
    #[serde(deserialize_with = "deserialize_day")]
    pub date: NaiveDate,

    /// Pool value on that day
    #[serde(alias = "fund_balance_millions")]
    pub balance: f64,

    #[serde(default, alias = "claims_received")]
    pub claims_received: f64,

    #[serde(default, alias = "claims_approved")]
    pub claims_approved: f64,

    /// Cumulative payouts since launch
    #[serde(default, alias = "payout_to_date", alias = "total_payout_millions")]
    pub payout_to_date: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    #[serde(default, alias = "source_url", skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
}

impl FundRecord {
    pub fn new(date: NaiveDate, balance: f64, claims_received: f64, claims_approved: f64) -> Self {
        Self {
            date,
            balance,
            claims_received,
            claims_approved,
            payout_to_date: 0.0,
            notes: None,
            source_url: None,
        }
    }

    /// Share of received claims that were approved, if any were received
    pub fn approval_ratio(&self) -> Option<f64> {
        if self.claims_received > 0.0 {
            Some(self.claims_approved / self.claims_received)
        } else {
            None
        }
    }
}

/// Accepts either a plain `YYYY-MM-DD` day or a full RFC 3339 timestamp
fn deserialize_day<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_day(&raw).map_err(serde::de::Error::custom)
}

pub(crate) fn parse_day(raw: &str) -> Result<NaiveDate, String> {
    let trimmed = raw.trim();
    if let Ok(day) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(day);
    }
    DateTime::parse_from_rfc3339(trimmed)
        .map(|ts| ts.date_naive())
        .map_err(|_| format!("unrecognised date '{}'", trimmed))
}

/// Read-only view over a record sequence
///
/// The feed delivers records newest first, but lookups go by date so an
/// unordered slice gives the same answers.
#[derive(Debug, Clone, Copy)]
pub struct FundHistory<'a> {
    records: &'a [FundRecord],
}

impl<'a> FundHistory<'a> {
    pub fn new(records: &'a [FundRecord]) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &'a [FundRecord] {
        self.records
    }

    /// Most recent observation
    pub fn newest(&self) -> Option<&'a FundRecord> {
        self.records.iter().max_by_key(|r| r.date)
    }

    /// Earliest observation
    pub fn oldest(&self) -> Option<&'a FundRecord> {
        self.records.iter().min_by_key(|r| r.date)
    }

    /// Days between the oldest and newest observations
    pub fn days_elapsed(&self) -> i64 {
        match (self.oldest(), self.newest()) {
            (Some(oldest), Some(newest)) => (newest.date - oldest.date).num_days(),
            _ => 0,
        }
    }

    /// Average balance drawn per day between the oldest and newest observations
    ///
    /// Negative when the fund grew. `None` with fewer than two records or when
    /// every record falls on the same day.
    pub fn daily_burn(&self) -> Option<f64> {
        if self.records.len() < 2 {
            return None;
        }
        let days = self.days_elapsed();
        if days <= 0 {
            return None;
        }
        let oldest = self.oldest()?;
        let newest = self.newest()?;
        Some((oldest.balance - newest.balance) / days as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_parse_snapshot_feed_names() {
        let json = r#"{
            "date": "2026-03-01T00:00:00Z",
            "fund_balance_millions": 612.5,
            "claims_received": 90,
            "claims_approved": 72,
            "claims_denied": 18,
            "total_payout_millions": 10,
            "source_url": "https://example.org/report"
        }"#;
        let record: FundRecord = serde_json::from_str(json).unwrap();

        assert_eq!(record.date, day("2026-03-01"));
        assert_eq!(record.balance, 612.5);
        assert_eq!(record.payout_to_date, 10.0);
        assert_eq!(record.approval_ratio(), Some(0.8));
        assert_eq!(record.source_url.as_deref(), Some("https://example.org/report"));
    }

    #[test]
    fn test_history_ignores_slice_order() {
        let records = vec![
            FundRecord::new(day("2026-01-01"), 600.0, 0.0, 0.0),
            FundRecord::new(day("2026-01-31"), 540.0, 0.0, 0.0),
            FundRecord::new(day("2026-01-11"), 580.0, 0.0, 0.0),
        ];
        let history = FundHistory::new(&records);

        assert_eq!(history.newest().unwrap().balance, 540.0);
        assert_eq!(history.oldest().unwrap().balance, 600.0);
        assert_eq!(history.days_elapsed(), 30);
        assert_eq!(history.daily_burn(), Some(2.0));
    }

    #[test]
    fn test_daily_burn_needs_elapsed_time() {
        let same_day = vec![
            FundRecord::new(day("2026-01-01"), 600.0, 0.0, 0.0),
            FundRecord::new(day("2026-01-01"), 590.0, 0.0, 0.0),
        ];
        assert_eq!(FundHistory::new(&same_day).daily_burn(), None);
        assert_eq!(FundHistory::new(&same_day[..1]).daily_burn(), None);
    }

    #[test]
    fn test_rejects_garbage_date() {
        assert!(parse_day("last tuesday").is_err());
    }
}
