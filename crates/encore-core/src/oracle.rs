//! Consistency oracle
//!
//! Validation predicates applied to server responses. All of them are pure
//! functions of (payload, a copied shadow snapshot, a cutoff timestamp) so
//! that many concurrent scenario executions can validate without contending;
//! the only locks touched are O(1) reads of per-event counter blocks.
//!
//! The central tool is the race-tolerant bound check: a reported remaining
//! seat count is accepted when it falls inside
//!
//! ```text
//! total + cancelCompletedBeforeRequest - reserveRequestedAfterResponse
//!   <= remains <=
//! total + cancelRequestedAfterResponse - reserveCompletedBeforeResponse
//! ```
//!
//! `reserveRequestedAfterResponse` over-counts in-flight reservations (worst
//! case they all landed before the server answered), and
//! `reserveCompletedBeforeResponse` under-counts (those are guaranteed to
//! have landed). Anything outside the window is a defect of the server, not
//! a benchmarker flake.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use tracing::{debug, error, info, warn};

use crate::error::{BenchError, Result};
use crate::model::{
    AppUser, Event, EventSnapshot, Rank, Reservation, Seating,
};
use crate::report::ReportRecord;
use crate::wire::{EventPayload, FullUserPayload};

/// The race-tolerant window itself.
pub fn remains_in_window(
    total: u32,
    cancel_completed_before: u32,
    reserve_requested_after: u32,
    remains: u32,
    cancel_requested_after: u32,
    reserve_completed_before: u32,
) -> bool {
    let lower = total as i64 + cancel_completed_before as i64 - reserve_requested_after as i64;
    let upper = total as i64 + cancel_requested_after as i64 - reserve_completed_before as i64;
    lower <= remains as i64 && remains as i64 <= upper
}

#[allow(clippy::too_many_arguments)]
fn check_remains(
    event_id: u64,
    scope: &str,
    total: u32,
    cancel_completed_before: u32,
    reserve_requested_after: u32,
    remains: u32,
    cancel_requested_after: u32,
    reserve_completed_before: u32,
) -> Result<()> {
    debug!(
        event_id,
        scope,
        lower = total as i64 + cancel_completed_before as i64 - reserve_requested_after as i64,
        remains,
        upper = total as i64 + cancel_requested_after as i64 - reserve_completed_before as i64,
        "remains window"
    );
    if remains_in_window(
        total,
        cancel_completed_before,
        reserve_requested_after,
        remains,
        cancel_requested_after,
        reserve_completed_before,
    ) {
        Ok(())
    } else {
        Err(BenchError::fatal(format!(
            "event {event_id}: reported {scope} remains {remains} is outside the possible window"
        )))
    }
}

/// Listings must come back sorted by id ascending.
pub fn check_sorted_ascending(events: &[EventPayload]) -> Result<()> {
    if events.windows(2).all(|w| w[0].id <= w[1].id) {
        Ok(())
    } else {
        Err(BenchError::fatal("event listing is not sorted by id"))
    }
}

/// Validate a reported event listing against the shadow model.
///
/// `before` is a deep snapshot taken before the request (filtered to the
/// allowable-delay cutoff by the caller); `after` is the live registry read
/// after the response. Every snapshot event must appear with the right
/// title, totals and prices, and every remains figure must fall inside its
/// bound-check window.
pub fn check_event_list(
    seating: &Seating,
    before: &[EventSnapshot],
    reported: &[EventPayload],
    after: &[Arc<Event>],
) -> Result<()> {
    let reported_by_id: HashMap<u64, &EventPayload> =
        reported.iter().map(|e| (e.id, e)).collect();
    let after_by_id: HashMap<u64, &Arc<Event>> = after.iter().map(|e| (e.id, e)).collect();

    for event_before in before {
        let Some(payload) = reported_by_id.get(&event_before.id) else {
            debug!(event_id = event_before.id, "event missing from listing");
            return Err(BenchError::fatal(format!(
                "event {} is missing from the listing",
                event_before.id
            )));
        };
        if payload.title != event_before.title {
            return Err(BenchError::fatal(format!(
                "event {}: wrong title in listing",
                payload.id
            )));
        }
        let Some(sheets) = payload.sheets.as_ref() else {
            return Err(BenchError::fatal(format!(
                "event {}: sheet ranks are missing from the listing",
                payload.id
            )));
        };
        if payload.total != seating.total {
            return Err(BenchError::fatal(format!(
                "event {}: wrong total seat count",
                payload.id
            )));
        }
        for kind in &seating.kinds {
            let Some(sheet) = sheets.get(kind.rank.as_str()) else {
                return Err(BenchError::fatal(format!(
                    "event {}: rank {} is missing from the listing",
                    payload.id, kind.rank
                )));
            };
            if sheet.total != kind.total {
                return Err(BenchError::fatal(format!(
                    "event {}: wrong total for rank {}",
                    payload.id, kind.rank
                )));
            }
            if sheet.price != event_before.price + kind.price {
                return Err(BenchError::fatal(format!(
                    "event {}: wrong price for rank {}",
                    payload.id, kind.rank
                )));
            }
        }

        let Some(event_after) = after_by_id.get(&payload.id) else {
            // Events are never removed, so this cannot happen; skip rather
            // than crash on a harness race.
            debug!(event_id = payload.id, "event absent from live registry");
            continue;
        };
        let after_counters = *event_after.counters();

        check_remains(
            payload.id,
            "total",
            seating.total,
            event_before.counters.cancel_completed,
            after_counters.reserve_requested,
            payload.remains,
            after_counters.cancel_requested,
            event_before.counters.reserve_completed,
        )?;
        for kind in &seating.kinds {
            let sheet = &sheets[kind.rank.as_str()];
            check_remains(
                payload.id,
                kind.rank.as_str(),
                kind.total,
                event_before.counters.cancel_completed_by_rank.get(kind.rank),
                after_counters.reserve_requested_by_rank.get(kind.rank),
                sheet.remains,
                after_counters.cancel_requested_by_rank.get(kind.rank),
                event_before.counters.reserve_completed_by_rank.get(kind.rank),
            )?;
        }
    }

    Ok(())
}

/// Validate the detailed single-event payload: full seat maps per rank with
/// sequential numbering, and a seat map that agrees with the remains figure.
pub fn check_event_detail(
    seating: &Seating,
    event_id: u64,
    title: &str,
    payload: &EventPayload,
) -> Result<()> {
    if payload.id != event_id || payload.title != title {
        return Err(BenchError::fatal(format!(
            "could not retrieve the correct event {event_id}"
        )));
    }
    let Some(sheets) = payload.sheets.as_ref() else {
        return Err(BenchError::fatal(format!(
            "event {event_id}: sheet ranks are missing"
        )));
    };
    if sheets.len() != seating.kinds.len() {
        return Err(BenchError::fatal(format!(
            "could not retrieve the correct event {event_id}"
        )));
    }

    for (rank_label, sheet) in sheets {
        let rank: Rank = rank_label.parse().map_err(|_| {
            BenchError::fatal(format!("event {event_id}: unknown rank {rank_label:?}"))
        })?;
        let kind = seating.kind(rank);
        if sheet.detail.len() != kind.total as usize {
            return Err(BenchError::fatal(format!(
                "event {event_id}: seat details for rank {rank} are missing"
            )));
        }

        let mut reserved = 0u32;
        for (i, seat) in sheet.detail.iter().enumerate() {
            if seat.num != i as u32 + 1 {
                return Err(BenchError::fatal(format!(
                    "event {event_id}: seats of rank {rank} are out of order"
                )));
            }
            if seat.reserved {
                reserved += 1;
            }
        }
        if reserved != sheet.total.saturating_sub(sheet.remains) {
            return Err(BenchError::fatal(format!(
                "event {event_id}: seat map of rank {rank} contradicts its remains count"
            )));
        }
    }

    Ok(())
}

/// Validate the seat-detail flags of a reservation the benchmarker holds:
/// the seat must be reserved, owned by the user exactly when they are logged
/// in, and stamped no later than the shadow completion time.
pub fn check_reserved_seat_detail(
    payload: &EventPayload,
    reservation: &Reservation,
    user_online: bool,
) -> Result<()> {
    let event_id = payload.id;
    let seat = payload
        .sheets
        .as_ref()
        .and_then(|sheets| sheets.get(reservation.rank.as_str()))
        .and_then(|sheet| sheet.detail.get(reservation.num as usize - 1))
        .ok_or_else(|| {
            BenchError::fatal(format!(
                "event {event_id}: seat {}-{} is missing from the detail payload",
                reservation.rank, reservation.num
            ))
        })?;

    if !seat.reserved {
        return Err(BenchError::fatal(format!(
            "event {event_id}: seat {}-{} is not marked reserved",
            reservation.rank, reservation.num
        )));
    }
    if user_online != seat.mine {
        return Err(BenchError::fatal(format!(
            "event {event_id}: seat {}-{} has the wrong owner flag",
            reservation.rank, reservation.num
        )));
    }

    let completed_at = reservation.times().reserve_completed_at;
    let reported = Utc.timestamp_opt(seat.reserved_at, 0).single();
    let plausible = match (reported, completed_at) {
        (Some(reported), Some(completed)) => {
            seat.reserved_at == completed.timestamp() || reported < completed
        }
        _ => false,
    };
    if seat.reserved_at == 0 || !plausible {
        return Err(BenchError::fatal(format!(
            "event {event_id}: seat {}-{} has an implausible reservation time",
            reservation.rank, reservation.num
        )));
    }
    Ok(())
}

/// Validate a `GET /api/users/:id` payload: identity, total-price window,
/// bounded and duplicate-free recent lists, "as of" head checks, per-entry
/// agreement with the shadow reservations, and both recency orderings.
#[allow(clippy::too_many_arguments)]
pub fn check_user_profile(
    seating: &Seating,
    user: &AppUser,
    cutoff: DateTime<Utc>,
    events_before: &[EventSnapshot],
    events_after: &[Arc<Event>],
    reservations: &HashMap<u64, Arc<Reservation>>,
    payload: &FullUserPayload,
) -> Result<()> {
    if payload.id != user.id {
        warn!(expected = user.id, got = payload.id, "wrong user id");
        return Err(BenchError::fatal("could not retrieve the correct user"));
    }
    if payload.nickname != user.nickname {
        return Err(BenchError::fatal("could not retrieve the correct user"));
    }

    let Some(recent_reservations) = payload.recent_reservations.as_ref() else {
        return Err(BenchError::fatal("recent reservations are missing"));
    };
    if recent_reservations.len() > 5 {
        return Err(BenchError::fatal("too many recent reservations"));
    }
    let Some(recent_events) = payload.recent_events.as_ref() else {
        return Err(BenchError::fatal("recent events are missing"));
    };
    if recent_events.len() > 5 {
        return Err(BenchError::fatal("too many recent events"));
    }

    // The shadow totals bracket the server's figure: the floor counts only
    // confirmed activity, the ceiling counts requests that may still land.
    if !(user.status.negative_total_price <= payload.total_price
        && payload.total_price <= user.status.positive_total_price)
    {
        warn!(
            user_id = user.id,
            expected = %user.status.total_price_label(),
            got = payload.total_price,
            "total price outside window"
        );
        return Err(BenchError::fatal(format!(
            "total price of user {} is stale",
            user.id
        )));
    }

    let mut seen_reservations = HashSet::new();
    for r in recent_reservations {
        if !seen_reservations.insert(r.reservation.reservation_id) {
            return Err(BenchError::fatal(format!(
                "recent reservations of user {} contain duplicates",
                user.id
            )));
        }
    }
    let mut seen_events = HashSet::new();
    for e in recent_events {
        if !seen_events.insert(e.event.id) {
            return Err(BenchError::fatal(format!(
                "recent events of user {} contain duplicates",
                user.id
            )));
        }
    }

    let after_by_id: HashMap<u64, &Arc<Event>> =
        events_after.iter().map(|e| (e.id, e)).collect();

    // Head of the reservation list must be the last reservation known "as
    // of" the cutoff, or the last one that may have landed since.
    if let Some(head) = recent_reservations.first() {
        let id = user.status.last_reservation.get_before(cutoff);
        if id != 0 {
            let maybe_id = user.status.last_maybe_reservation.get_before(cutoff);
            let got = head.reservation.reservation_id;
            if got != id && got != maybe_id {
                info!(user_id = user.id, got, id, maybe_id, "head reservation mismatch");
                return Err(BenchError::fatal(format!(
                    "recent reservations of user {} are stale",
                    user.id
                )));
            }
        }
    }

    let mut known: Vec<&Arc<Reservation>> = Vec::new();
    for r in recent_reservations {
        let Some(event_ref) = r.event.as_ref() else {
            return Err(BenchError::fatal(format!(
                "recent reservation of user {} has no event",
                user.id
            )));
        };
        let Some(event) = after_by_id.get(&event_ref.id) else {
            return Err(BenchError::fatal(format!(
                "recent reservation of user {} references unknown event {}",
                user.id, event_ref.id
            )));
        };
        if event_ref.title != event.title
            || event_ref.closed != event.is_closed()
            || event_ref.public != event.is_public()
        {
            return Err(BenchError::fatal(format!(
                "recent reservation of user {} carries wrong event fields",
                user.id
            )));
        }

        let Some(reservation) = reservations.get(&r.reservation.reservation_id) else {
            // A reservation committed after our snapshot; benign.
            warn!(
                user_id = user.id,
                reservation_id = r.reservation.reservation_id,
                "skip unknown reservation id"
            );
            continue;
        };
        if event_ref.id != reservation.event_id {
            return Err(BenchError::fatal(format!(
                "reservation {} of user {} has the wrong event",
                reservation.id, user.id
            )));
        }
        if r.reservation.sheet_rank != reservation.rank.as_str() {
            return Err(BenchError::fatal(format!(
                "reservation {} of user {} has the wrong rank",
                reservation.id, user.id
            )));
        }
        if r.reservation.sheet_num != reservation.num {
            return Err(BenchError::fatal(format!(
                "reservation {} of user {} has the wrong seat number",
                reservation.id, user.id
            )));
        }
        if r.price != reservation.price {
            return Err(BenchError::fatal(format!(
                "reservation {} of user {} has the wrong price",
                reservation.id, user.id
            )));
        }

        if r.reserved_at == 0 {
            return Err(BenchError::fatal(format!(
                "reservation {} of user {} has no reservation time",
                reservation.id, user.id
            )));
        }
        let times = reservation.times();
        let Some(completed_at) = times.reserve_completed_at else {
            warn!(reservation_id = reservation.id, "reservation without completion time");
            return Ok(());
        };
        if completed_at.timestamp() < r.reserved_at {
            warn!(
                reservation_id = reservation.id,
                reported = r.reserved_at,
                completed = completed_at.timestamp(),
                "reported reservation time is in the shadow future"
            );
            return Err(BenchError::fatal(format!(
                "reservation {} of user {} has an implausible reservation time",
                reservation.id, user.id
            )));
        }

        if r.canceled_at == 0 {
            if reservation.canceled_before(cutoff) {
                warn!(reservation_id = reservation.id, "cancellation missing from payload");
                return Err(BenchError::fatal(format!(
                    "reservation {} of user {} has the wrong cancellation state",
                    reservation.id, user.id
                )));
            }
        } else {
            let Some(requested_at) = times.cancel_requested_at else {
                return Err(BenchError::fatal(format!(
                    "reservation {} of user {} was never canceled by the benchmarker",
                    reservation.id, user.id
                )));
            };
            let ok = match times.cancel_completed_at {
                None => requested_at.timestamp() <= r.canceled_at,
                Some(completed) => {
                    requested_at.timestamp() <= r.canceled_at
                        && r.canceled_at <= completed.timestamp()
                }
            };
            if !ok {
                return Err(BenchError::fatal(format!(
                    "reservation {} of user {} has an implausible cancellation time",
                    reservation.id, user.id
                )));
            }
        }

        known.push(reservation);
    }

    // The list is ordered newest first; compare a conservative "maybe" stamp
    // of the newer entry against the confirmed stamp of the older one.
    for pair in known.windows(2) {
        if let (Some(newer), Some(older)) =
            (pair[0].last_maybe_updated_at(), pair[1].last_updated_at())
        {
            if newer < older {
                return Err(BenchError::fatal(format!(
                    "recent reservations of user {} are out of order",
                    user.id
                )));
            }
        }
    }

    if let Some(head) = recent_events.first() {
        let id = user.status.last_reserved_event.get_before(cutoff);
        if id != 0 {
            let maybe_id = user.status.last_maybe_reserved_event.get_before(cutoff);
            if head.event.id != id && head.event.id != maybe_id {
                info!(user_id = user.id, got = head.event.id, id, maybe_id, "head event mismatch");
                return Err(BenchError::fatal(format!(
                    "recent events of user {} are stale",
                    user.id
                )));
            }
        }
    }

    // Validate the recent events as a miniature listing, restricted to the
    // ids the payload actually mentions.
    let mut listing = Vec::with_capacity(recent_events.len());
    for re in recent_events {
        let Some(event) = after_by_id.get(&re.event.id) else {
            return Err(BenchError::fatal(format!(
                "recent events of user {} reference unknown event {}",
                user.id, re.event.id
            )));
        };
        if re.closed != event.is_closed() || re.public != event.is_public() {
            return Err(BenchError::fatal(format!(
                "recent events of user {} carry wrong event flags",
                user.id
            )));
        }
        listing.push(re.event.clone());
    }
    let before_filtered: Vec<EventSnapshot> = events_before
        .iter()
        .filter(|e| seen_events.contains(&e.id))
        .cloned()
        .collect();
    let after_filtered: Vec<Arc<Event>> = events_after
        .iter()
        .filter(|e| seen_events.contains(&e.id))
        .cloned()
        .collect();
    check_event_list(seating, &before_filtered, &listing, &after_filtered).map_err(|e| {
        BenchError::fatal(format!("recent events of user {}: {e}", user.id))
    })?;

    // Recent events must follow the order induced by the reservations list.
    if recent_events.len() >= 2 {
        let mut order_by_event: HashMap<u64, usize> = HashMap::new();
        for (i, r) in recent_reservations.iter().enumerate().rev() {
            if let Some(event_ref) = r.event.as_ref() {
                order_by_event.insert(event_ref.id, i);
            }
        }
        let mut last_order = 0;
        for e in recent_events {
            let Some(&order) = order_by_event.get(&e.event.id) else {
                continue;
            };
            if last_order > order {
                warn!(user_id = user.id, "recent event order mismatch");
                return Err(BenchError::fatal(format!(
                    "recent events of user {} are out of order",
                    user.id
                )));
            }
            last_order = order;
        }
    }

    Ok(())
}

/// Reconcile a parsed sales report against the shadow reservations known
/// before the cutoff: every one of them must appear with matching fields,
/// and its cancellation column must agree with the shadow predicates ("maybe
/// canceled" discrepancies are logged, not failed).
pub fn check_report_records(
    seating: &Seating,
    records: &HashMap<u64, ReportRecord>,
    cutoff: DateTime<Utc>,
    before: &HashMap<u64, Reservation>,
    events_by_id: &HashMap<u64, Arc<Event>>,
) -> Result<()> {
    for (reservation_id, shadow) in before {
        let Some(record) = records.get(reservation_id) else {
            debug!(reservation_id, "reservation missing from report");
            return Err(BenchError::fatal(format!(
                "the report is missing reservation {reservation_id}"
            )));
        };

        let Some(event) = events_by_id.get(&record.event_id) else {
            return Err(BenchError::fatal(format!(
                "report row {reservation_id} references unknown event {}",
                record.event_id
            )));
        };
        let expected_price = event.price + seating.kind(record.rank).price;
        if record.price != expected_price {
            return Err(BenchError::fatal(format!(
                "report row {reservation_id} has the wrong seat price"
            )));
        }

        if shadow.event_id != record.event_id {
            return Err(BenchError::fatal(format!(
                "report row {reservation_id} has the wrong event id"
            )));
        }
        if shadow.user_id != record.user_id {
            return Err(BenchError::fatal(format!(
                "report row {reservation_id} has the wrong user id"
            )));
        }
        if shadow.rank != record.rank {
            return Err(BenchError::fatal(format!(
                "report row {reservation_id} has the wrong rank"
            )));
        }
        if shadow.num != record.num {
            return Err(BenchError::fatal(format!(
                "report row {reservation_id} has the wrong seat number"
            )));
        }

        if shadow.canceled_before(cutoff) {
            if record.canceled_at.is_none() {
                debug!(reservation_id, "confirmed cancellation missing from report");
                return Err(BenchError::fatal(format!(
                    "report row {reservation_id} is missing its cancellation time"
                )));
            }
        } else if shadow.maybe_canceled_before(cutoff) && record.canceled_at.is_none() {
            warn!(
                reservation_id,
                "cancellation not in report yet, tolerated as an in-flight race"
            );
        }
    }

    Ok(())
}

/// The record count itself obeys a window: everything completed before the
/// cutoff must be present, nothing beyond what was ever requested can be.
pub fn check_report_count(
    completed_before: usize,
    report_count: usize,
    requested_after: u32,
) -> Result<()> {
    debug!(completed_before, report_count, requested_after, "report count window");
    if completed_before <= report_count && report_count <= requested_after as usize {
        Ok(())
    } else {
        Err(BenchError::fatal("the report has the wrong number of rows"))
    }
}

/// A per-event report must not leak other events' rows.
pub fn check_report_event_scope(
    event_id: u64,
    records: &HashMap<u64, ReportRecord>,
) -> Result<()> {
    for record in records.values() {
        if record.event_id != event_id {
            debug!(
                reservation_id = record.reservation_id,
                got = record.event_id,
                want = event_id,
                "foreign event in per-event report"
            );
            return Err(BenchError::fatal("could not retrieve the correct report"));
        }
    }
    Ok(())
}

/// Mean absolute difference between consecutively issued seat numbers, per
/// rank, over the reservations that are not (possibly) canceled. A rank
/// with fewer than two samples is skipped.
pub fn seat_entropy_scores<'a, I>(reservations: I, now: DateTime<Utc>) -> HashMap<Rank, u64>
where
    I: IntoIterator<Item = &'a Reservation>,
{
    let mut by_rank: HashMap<Rank, Vec<(u64, u32)>> = HashMap::new();
    for r in reservations {
        if r.maybe_canceled_before(now) {
            continue;
        }
        by_rank.entry(r.rank).or_default().push((r.id, r.num));
    }

    let mut scores = HashMap::new();
    for (rank, mut seats) in by_rank {
        if seats.len() < 2 {
            continue;
        }
        seats.sort_by_key(|(id, _)| *id);
        let sum: u64 = seats
            .windows(2)
            .map(|w| (w[0].1 as i64 - w[1].1 as i64).unsigned_abs())
            .sum();
        scores.insert(rank, sum / seats.len() as u64);
    }
    scores
}

/// Sequential seat assignment yields a tiny mean difference; random
/// assignment within a rank yields roughly a third of the rank size. The
/// hard threshold catches structural defects, the soft ones only log.
pub fn check_seat_entropy(event_id: u64, scores: &HashMap<Rank, u64>) -> Result<()> {
    let mut ok = true;
    for (rank, score) in scores {
        match *score {
            0..=3 => {
                error!(event_id, %rank, score, "fatal seat-assignment entropy");
                ok = false;
            }
            4..=7 => warn!(event_id, %rank, score, "low seat-assignment entropy"),
            8..=15 => info!(event_id, %rank, score, "smallish seat-assignment entropy"),
            _ => debug!(event_id, %rank, score, "normal seat-assignment entropy"),
        }
    }
    if ok {
        Ok(())
    } else {
        Err(BenchError::fatal(format!(
            "seat assignment is not random for event {event_id}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SheetKind;
    use crate::wire::SheetPayload;

    fn seating() -> Seating {
        Seating::standard()
    }

    #[test]
    fn test_remains_window_example() {
        // total=10, cancelCompletedBefore=1, reserveRequestedAfter=3,
        // cancelRequestedAfter=1, reserveCompletedBefore=2
        // → lower = 8, upper = 9.
        assert!(remains_in_window(10, 1, 3, 8, 1, 2));
        assert!(remains_in_window(10, 1, 3, 9, 1, 2));
        assert!(!remains_in_window(10, 1, 3, 7, 1, 2));
        assert!(!remains_in_window(10, 1, 3, 10, 1, 2));
    }

    #[test]
    fn test_remains_window_survives_negative_lower_bound() {
        // More requested than seats exist: lower bound goes negative.
        assert!(remains_in_window(10, 0, 15, 0, 0, 10));
    }

    #[test]
    fn test_sorted_ascending() {
        let make = |id| EventPayload {
            id,
            title: String::new(),
            total: 0,
            remains: 0,
            sheets: None,
        };
        assert!(check_sorted_ascending(&[make(1), make(2), make(2)]).is_ok());
        assert!(check_sorted_ascending(&[make(2), make(1)]).is_err());
    }

    fn snapshot_of(event: &Event) -> EventSnapshot {
        event.snapshot()
    }

    fn listing_payload(event: &Event, seating: &Seating, remains: u32) -> EventPayload {
        let mut sheets = HashMap::new();
        for kind in &seating.kinds {
            sheets.insert(
                kind.rank.as_str().to_string(),
                SheetPayload {
                    price: event.price + kind.price,
                    total: kind.total,
                    remains: if kind.rank == Rank::S {
                        kind.total - (seating.total - remains)
                    } else {
                        kind.total
                    },
                    detail: Vec::new(),
                },
            );
        }
        EventPayload {
            id: event.id,
            title: event.title.clone(),
            total: seating.total,
            remains,
            sheets: Some(sheets),
        }
    }

    #[test]
    fn test_event_list_accepts_in_flight_race() {
        let seating = seating();
        let event = Arc::new(Event::new(1, "live".into(), 1000, true, false, None));

        let before = snapshot_of(&event);
        // Two reservations requested after the snapshot, still in flight.
        {
            let mut c = event.counters_mut();
            c.reserve_requested = 2;
            c.reserve_requested_by_rank.bump(Rank::S);
            c.reserve_requested_by_rank.bump(Rank::S);
        }

        // The server may or may not have landed them.
        for remains in [998, 999, 1000] {
            let payload = listing_payload(&event, &seating, remains);
            check_event_list(&seating, &[before.clone()], &[payload], &[event.clone()])
                .unwrap();
        }

        // Below the window: impossible even if both landed.
        let payload = listing_payload(&event, &seating, 997);
        let err = check_event_list(&seating, &[before.clone()], &[payload], &[event.clone()])
            .unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_event_list_rejects_wrong_price() {
        let seating = seating();
        let event = Arc::new(Event::new(1, "live".into(), 1000, true, false, None));
        let before = snapshot_of(&event);
        let mut payload = listing_payload(&event, &seating, 1000);
        payload.sheets.as_mut().unwrap().get_mut("A").unwrap().price = 1;
        let err =
            check_event_list(&seating, &[before], &[payload], &[event]).unwrap_err();
        assert!(err.to_string().contains("price"));
    }

    #[test]
    fn test_event_list_missing_event_is_fatal() {
        let seating = seating();
        let event = Arc::new(Event::new(1, "live".into(), 1000, true, false, None));
        let before = snapshot_of(&event);
        let err = check_event_list(&seating, &[before], &[], &[event]).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_event_detail_sequential_and_consistent() {
        let seating = Seating {
            kinds: vec![SheetKind { rank: Rank::S, total: 3, price: 100 }],
            total: 3,
        };
        let details: Vec<crate::wire::SheetDetailPayload> = (1..=3)
            .map(|num| crate::wire::SheetDetailPayload {
                num,
                mine: false,
                reserved: num == 2,
                reserved_at: 0,
            })
            .collect();
        let mut sheets = HashMap::new();
        sheets.insert(
            "S".to_string(),
            SheetPayload { price: 1100, total: 3, remains: 2, detail: details },
        );
        let payload = EventPayload {
            id: 1,
            title: "live".into(),
            total: 3,
            remains: 2,
            sheets: Some(sheets),
        };
        check_event_detail(&seating, 1, "live", &payload).unwrap();

        // remains says one seat taken, map says none: contradiction.
        let mut broken = payload.clone();
        broken.sheets.as_mut().unwrap().get_mut("S").unwrap().detail[1].reserved = false;
        assert!(check_event_detail(&seating, 1, "live", &broken).is_err());
    }

    #[test]
    fn test_report_reconciliation() {
        let seating = seating();
        let now = Utc::now();
        let cutoff = now - chrono::Duration::seconds(1);
        let event = Arc::new(Event::new(1, "live".into(), 1000, true, false, None));
        let events_by_id: HashMap<u64, Arc<Event>> =
            [(1u64, event.clone())].into_iter().collect();

        let mut shadow = Reservation::new(1, 7, Rank::S, 6000);
        shadow.id = 1;
        shadow.num = 36;
        shadow.times_mut().reserve_completed_at = Some(now - chrono::Duration::seconds(10));
        let mut before = HashMap::new();
        before.insert(1u64, shadow);

        let record = ReportRecord {
            reservation_id: 1,
            event_id: 1,
            rank: Rank::S,
            num: 36,
            price: 6000,
            user_id: 7,
            sold_at: now - chrono::Duration::seconds(10),
            canceled_at: None,
        };
        let mut records = HashMap::new();
        records.insert(1u64, record);

        check_report_records(&seating, &records, cutoff, &before, &events_by_id).unwrap();

        // A reservation completed well before the cutoff must appear.
        let err = check_report_records(&seating, &HashMap::new(), cutoff, &before, &events_by_id)
            .unwrap_err();
        assert!(err.is_fatal());

        // Confirmed cancellation older than the cutoff must be in the report.
        before.get_mut(&1).unwrap().times_mut().cancel_requested_at =
            Some(now - chrono::Duration::seconds(8));
        before.get_mut(&1).unwrap().times_mut().cancel_completed_at =
            Some(now - chrono::Duration::seconds(8));
        let err = check_report_records(&seating, &records, cutoff, &before, &events_by_id)
            .unwrap_err();
        assert!(err.is_fatal());

        // A cancel requested within the allowable-delay window is tolerated.
        {
            let r = before.get_mut(&1).unwrap();
            let mut times = r.times_mut();
            times.cancel_requested_at = Some(now - chrono::Duration::milliseconds(100));
            times.cancel_completed_at = None;
        }
        check_report_records(&seating, &records, cutoff, &before, &events_by_id).unwrap();
    }

    #[test]
    fn test_report_count_window() {
        assert!(check_report_count(5, 5, 7).is_ok());
        assert!(check_report_count(5, 7, 7).is_ok());
        assert!(check_report_count(5, 4, 7).is_err());
        assert!(check_report_count(5, 8, 7).is_err());
    }

    #[test]
    fn test_report_event_scope() {
        let record = ReportRecord {
            reservation_id: 1,
            event_id: 2,
            rank: Rank::C,
            num: 1,
            price: 1000,
            user_id: 1,
            sold_at: Utc::now(),
            canceled_at: None,
        };
        let mut records = HashMap::new();
        records.insert(1u64, record);
        assert!(check_report_event_scope(2, &records).is_ok());
        assert!(check_report_event_scope(3, &records).is_err());
    }

    fn reservation_with_num(id: u64, rank: Rank, num: u32) -> Reservation {
        let mut r = Reservation::new(1, 1, rank, 1000);
        r.id = id;
        r.num = num;
        r.times_mut().reserve_completed_at = Some(Utc::now() - chrono::Duration::seconds(5));
        r
    }

    #[test]
    fn test_entropy_flags_sequential_assignment() {
        let now = Utc::now();
        let sequential: Vec<Reservation> = (1..=50)
            .map(|i| reservation_with_num(i, Rank::S, i as u32))
            .collect();
        let scores = seat_entropy_scores(sequential.iter(), now);
        assert!(scores[&Rank::S] < 4);
        assert!(check_seat_entropy(1, &scores).is_err());

        // Spread-out assignment passes.
        let shuffled: Vec<Reservation> = (1..=50)
            .map(|i| reservation_with_num(i, Rank::S, ((i * 17) % 50) as u32 + 1))
            .collect();
        let scores = seat_entropy_scores(shuffled.iter(), now);
        assert!(scores[&Rank::S] >= 4);
        assert!(check_seat_entropy(1, &scores).is_ok());
    }

    #[test]
    fn test_entropy_ignores_canceled_and_small_samples() {
        let now = Utc::now();
        let mut rs: Vec<Reservation> = (1..=10)
            .map(|i| reservation_with_num(i, Rank::A, i as u32))
            .collect();
        for r in &mut rs {
            r.times_mut().cancel_requested_at = Some(now - chrono::Duration::seconds(1));
        }
        let scores = seat_entropy_scores(rs.iter(), now);
        assert!(scores.is_empty());
    }

    fn profile_fixture() -> (Seating, AppUser, Arc<Event>) {
        let seating = seating();
        let mut user = AppUser {
            id: 5,
            nickname: "nick".into(),
            login_name: "nick".into(),
            password: "p".into(),
            status: Default::default(),
        };
        user.status.positive_total_price = 6000;
        user.status.negative_total_price = 6000;
        let event = Arc::new(Event::new(1, "live".into(), 1000, true, false, None));
        (seating, user, event)
    }

    fn profile_payload(total_price: u64) -> FullUserPayload {
        FullUserPayload {
            id: 5,
            nickname: "nick".into(),
            total_price,
            recent_events: Some(vec![]),
            recent_reservations: Some(vec![]),
        }
    }

    #[test]
    fn test_user_profile_price_window() {
        let (seating, user, event) = profile_fixture();
        let cutoff = Utc::now();
        let reservations = HashMap::new();

        check_user_profile(
            &seating,
            &user,
            cutoff,
            &[],
            &[event.clone()],
            &reservations,
            &profile_payload(6000),
        )
        .unwrap();

        let err = check_user_profile(
            &seating,
            &user,
            cutoff,
            &[],
            &[event],
            &reservations,
            &profile_payload(9999),
        )
        .unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_user_profile_requires_recent_lists() {
        let (seating, user, event) = profile_fixture();
        let mut payload = profile_payload(6000);
        payload.recent_reservations = None;
        let err = check_user_profile(
            &seating,
            &user,
            Utc::now(),
            &[],
            &[event],
            &HashMap::new(),
            &payload,
        )
        .unwrap_err();
        assert!(err.is_fatal());
    }
}
