//! Sales-report CSV contract
//!
//! The admin report endpoint returns
//! `reservation_id,event_id,rank,num,price,user_id,sold_at,canceled_at` with
//! RFC 3339 timestamps; an empty `canceled_at` means the reservation is
//! live. Consumed, never produced: the oracle reconciles the parsed records
//! against the shadow reservation registry.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::{BenchError, Result};
use crate::model::Rank;

pub const REPORT_HEADER: [&str; 8] = [
    "reservation_id",
    "event_id",
    "rank",
    "num",
    "price",
    "user_id",
    "sold_at",
    "canceled_at",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRecord {
    pub reservation_id: u64,
    pub event_id: u64,
    pub rank: Rank,
    pub num: u32,
    pub price: u64,
    pub user_id: u64,
    pub sold_at: DateTime<Utc>,
    pub canceled_at: Option<DateTime<Utc>>,
}

fn parse_timestamp(raw: &str, line: usize, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| {
            debug!(line, field, error = %e, "invalid report timestamp");
            BenchError::fatal("the sales report is malformed")
        })
}

fn parse_num<T: std::str::FromStr>(raw: &str, line: usize, field: &str) -> Result<T> {
    raw.parse().map_err(|_| {
        debug!(line, field, raw, "invalid report field");
        BenchError::fatal("the sales report is malformed")
    })
}

/// Parse and validate the whole report body into `{reservation id → record}`.
pub fn parse_sales_report(body: &[u8]) -> Result<HashMap<u64, ReportRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(body);

    let mut rows = reader.records();
    let header = rows
        .next()
        .transpose()
        .map_err(|_| BenchError::fatal("the sales report has no valid header"))?
        .ok_or_else(|| BenchError::fatal("the sales report has no valid header"))?;
    if header.len() != REPORT_HEADER.len()
        || header.iter().zip(REPORT_HEADER).any(|(got, want)| got != want)
    {
        return Err(BenchError::fatal("the sales report has no valid header"));
    }

    let mut records = HashMap::new();
    for (i, row) in rows.enumerate() {
        let line = i + 2;
        let row = row.map_err(|_| BenchError::fatal("the sales report is malformed"))?;
        if row.len() != REPORT_HEADER.len() {
            return Err(BenchError::fatal("the sales report is malformed"));
        }

        let rank: Rank = row[2].parse().map_err(|_| {
            debug!(line, rank = &row[2], "unknown rank in report");
            BenchError::fatal("the sales report is malformed")
        })?;
        let canceled_at = if row[7].is_empty() {
            None
        } else {
            Some(parse_timestamp(&row[7], line, "canceled_at")?)
        };

        let record = ReportRecord {
            reservation_id: parse_num(&row[0], line, "reservation_id")?,
            event_id: parse_num(&row[1], line, "event_id")?,
            rank,
            num: parse_num(&row[3], line, "num")?,
            price: parse_num(&row[4], line, "price")?,
            user_id: parse_num(&row[5], line, "user_id")?,
            sold_at: parse_timestamp(&row[6], line, "sold_at")?,
            canceled_at,
        };
        records.insert(record.reservation_id, record);
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOOD: &str = "\
reservation_id,event_id,rank,num,price,user_id,sold_at,canceled_at
1,1,S,36,8000,1002,2018-08-17T04:55:30Z,2018-08-17T04:58:31Z
2,1,S,37,8000,1002,2018-08-17T04:55:32Z,
3,1,B,149,4000,1003,2018-08-17T04:55:33Z,
";

    #[test]
    fn test_parse_good_report() {
        let records = parse_sales_report(GOOD.as_bytes()).unwrap();
        assert_eq!(records.len(), 3);

        let canceled = &records[&1];
        assert_eq!(canceled.rank, Rank::S);
        assert!(canceled.canceled_at.is_some());

        let live = &records[&2];
        assert!(live.canceled_at.is_none());
        assert_eq!(live.price, 8000);
        assert_eq!(records[&3].user_id, 1003);
    }

    #[test]
    fn test_bad_header_is_fatal() {
        let body = "id,event_id,rank,num,price,user_id,sold_at,canceled_at\n";
        let err = parse_sales_report(body.as_bytes()).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_bad_timestamp_is_fatal() {
        let body = "\
reservation_id,event_id,rank,num,price,user_id,sold_at,canceled_at
1,1,S,36,8000,1002,yesterday,
";
        assert!(parse_sales_report(body.as_bytes()).unwrap_err().is_fatal());
    }

    #[test]
    fn test_unknown_rank_is_fatal() {
        let body = "\
reservation_id,event_id,rank,num,price,user_id,sold_at,canceled_at
1,1,X,36,8000,1002,2018-08-17T04:55:30Z,
";
        assert!(parse_sales_report(body.as_bytes()).unwrap_err().is_fatal());
    }
}
