//! Serde mirrors of the target service's JSON payloads.
//!
//! Field names follow the wire format, not the shadow model; a payload that
//! fails to deserialize is a fatal response defect, so scenarios decode with
//! [`crate::error::BenchError::Fatal`] on error.

use std::collections::HashMap;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct UserPayload {
    pub id: u64,
    pub nickname: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FullUserPayload {
    pub id: u64,
    pub nickname: String,
    #[serde(default)]
    pub total_price: u64,
    pub recent_events: Option<Vec<FullEventPayload>>,
    pub recent_reservations: Option<Vec<FullReservationPayload>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdminPayload {
    pub id: u64,
    pub nickname: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SheetDetailPayload {
    pub num: u32,
    #[serde(default)]
    pub mine: bool,
    #[serde(default)]
    pub reserved: bool,
    #[serde(default)]
    pub reserved_at: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SheetPayload {
    #[serde(default)]
    pub price: u64,
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub remains: u32,
    #[serde(default)]
    pub detail: Vec<SheetDetailPayload>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventPayload {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub remains: u32,
    pub sheets: Option<HashMap<String, SheetPayload>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FullEventPayload {
    #[serde(flatten)]
    pub event: EventPayload,
    #[serde(default)]
    pub price: u64,
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub closed: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReservationPayload {
    #[serde(rename = "id")]
    pub reservation_id: u64,
    pub sheet_rank: String,
    #[serde(default)]
    pub sheet_num: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FullReservationPayload {
    #[serde(flatten)]
    pub reservation: ReservationPayload,
    pub event: Option<EventRefPayload>,
    #[serde(default)]
    pub price: u64,
    #[serde(default)]
    pub reserved_at: i64,
    #[serde(default)]
    pub canceled_at: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventRefPayload {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub closed: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorPayload {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_payload_decodes_listing_shape() {
        let raw = r#"{
            "id": 1, "title": "live", "total": 1000, "remains": 999,
            "sheets": {
                "S": {"price": 8000, "total": 50, "remains": 49},
                "A": {"price": 6000, "total": 150, "remains": 150}
            }
        }"#;
        let event: EventPayload = serde_json::from_str(raw).unwrap();
        assert_eq!(event.remains, 999);
        let sheets = event.sheets.unwrap();
        assert_eq!(sheets["S"].remains, 49);
        assert!(sheets["S"].detail.is_empty());
    }

    #[test]
    fn test_full_reservation_flattens() {
        let raw = r#"{
            "id": 12, "sheet_rank": "B", "sheet_num": 3,
            "event": {"id": 1, "title": "live", "public": true, "closed": false},
            "price": 4000, "reserved_at": 1534482930, "canceled_at": 0
        }"#;
        let r: FullReservationPayload = serde_json::from_str(raw).unwrap();
        assert_eq!(r.reservation.reservation_id, 12);
        assert_eq!(r.reservation.sheet_rank, "B");
        assert_eq!(r.event.unwrap().id, 1);
        assert_eq!(r.canceled_at, 0);
    }
}
