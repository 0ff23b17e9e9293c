//! Shadow-model entities
//!
//! Everything the benchmarker believes exists on the server: accounts,
//! events with their per-rank reservation counters, seat capacity tokens and
//! reservations. Entities are owned by the [`crate::store::Store`] and leased
//! out to scenarios; only events and reservations are shared, with their
//! mutable parts behind their own locks so that hot events do not serialize
//! against unrelated ones.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Seat ranks, best to cheapest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Rank {
    S,
    A,
    B,
    C,
}

pub const RANKS: [Rank; 4] = [Rank::S, Rank::A, Rank::B, Rank::C];

impl Rank {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::S => "S",
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
        }
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Rank {
    type Err = UnknownRank;

    fn from_str(s: &str) -> Result<Self, UnknownRank> {
        match s {
            "S" => Ok(Self::S),
            "A" => Ok(Self::A),
            "B" => Ok(Self::B),
            "C" => Ok(Self::C),
            _ => Err(UnknownRank(s.to_string())),
        }
    }
}

/// A rank label the shadow model has never heard of. In a server payload this
/// is a fatal response defect; inside the shadow model it is a harness bug.
#[derive(Debug, Clone)]
pub struct UnknownRank(pub String);

impl fmt::Display for UnknownRank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown seat rank {:?}", self.0)
    }
}

/// One counter per rank.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RankTally {
    pub s: u32,
    pub a: u32,
    pub b: u32,
    pub c: u32,
}

impl RankTally {
    pub fn get(&self, rank: Rank) -> u32 {
        match rank {
            Rank::S => self.s,
            Rank::A => self.a,
            Rank::B => self.b,
            Rank::C => self.c,
        }
    }

    pub fn bump(&mut self, rank: Rank) {
        let slot = match rank {
            Rank::S => &mut self.s,
            Rank::A => &mut self.a,
            Rank::B => &mut self.b,
            Rank::C => &mut self.c,
        };
        *slot += 1;
    }
}

/// An id remembered together with when it was written, answering
/// "what was the last known id as of time T" queries for recency checks.
#[derive(Clone, Copy, Debug, Default)]
pub struct StampedId {
    id: u64,
    updated_at: Option<DateTime<Utc>>,
}

impl StampedId {
    pub fn set(&mut self, id: u64) {
        self.set_at(id, Utc::now());
    }

    pub fn set_at(&mut self, id: u64, at: DateTime<Utc>) {
        self.id = id;
        self.updated_at = Some(at);
    }

    /// The id as known at `cutoff`, or 0 when unset or written later.
    pub fn get_before(&self, cutoff: DateTime<Utc>) -> u64 {
        match self.updated_at {
            Some(at) if at <= cutoff => self.id,
            _ => 0,
        }
    }
}

/// Mutable per-user bookkeeping. Only touched while the user is exclusively
/// checked out, so plain fields suffice.
#[derive(Clone, Debug, Default)]
pub struct UserStatus {
    pub online: bool,

    /// Pessimistic running total: bumped when a reservation is *requested*,
    /// reduced only when a cancellation *completes*. Upper bound of the
    /// server's figure.
    pub positive_total_price: u64,

    /// Guaranteed floor: bumped when a reservation *completes*, reduced as
    /// soon as a cancellation is *requested*. Lower bound of the server's
    /// figure.
    pub negative_total_price: u64,

    pub last_reserved_event: StampedId,
    pub last_maybe_reserved_event: StampedId,
    pub last_reservation: StampedId,
    pub last_maybe_reservation: StampedId,
}

impl UserStatus {
    /// Human-readable total for logs: a single number when settled, the
    /// `upper-lower` window while requests are in flight.
    pub fn total_price_label(&self) -> String {
        if self.positive_total_price == self.negative_total_price {
            self.negative_total_price.to_string()
        } else {
            format!("{}-{}", self.positive_total_price, self.negative_total_price)
        }
    }
}

#[derive(Clone, Debug)]
pub struct AppUser {
    pub id: u64,
    pub nickname: String,
    pub login_name: String,
    pub password: String,
    pub status: UserStatus,
}

#[derive(Clone, Debug)]
pub struct Administrator {
    pub id: u64,
    pub nickname: String,
    pub login_name: String,
    pub password: String,
    pub online: bool,
}

/// The four request/completion counter groups of one event, total and
/// per rank. `*_completed <= *_requested` holds after every operation.
#[derive(Clone, Copy, Debug, Default)]
pub struct EventCounters {
    pub reserve_requested: u32,
    pub reserve_completed: u32,
    pub cancel_requested: u32,
    pub cancel_completed: u32,
    pub reserve_requested_by_rank: RankTally,
    pub reserve_completed_by_rank: RankTally,
    pub cancel_requested_by_rank: RankTally,
    pub cancel_completed_by_rank: RankTally,
}

/// A ticketed event. Shared between scenarios; the counter block has its own
/// lock so concurrent traffic on different events never contends, and the
/// publish flags are atomics because the admin edit scenario flips them while
/// readers filter the event list.
#[derive(Debug)]
pub struct Event {
    pub id: u64,
    pub title: String,
    pub price: u64,
    /// `None` for fixture events that predate the run.
    pub created_at: Option<DateTime<Utc>>,
    public: AtomicBool,
    closed: AtomicBool,
    counters: RwLock<EventCounters>,
}

impl Event {
    pub fn new(
        id: u64,
        title: String,
        price: u64,
        public: bool,
        closed: bool,
        created_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id,
            title,
            price,
            created_at,
            public: AtomicBool::new(public),
            closed: AtomicBool::new(closed),
            counters: RwLock::new(EventCounters::default()),
        }
    }

    pub fn is_public(&self) -> bool {
        self.public.load(Ordering::Acquire)
    }

    pub fn set_public(&self, value: bool) {
        self.public.store(value, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn set_closed(&self, value: bool) {
        self.closed.store(value, Ordering::Release);
    }

    pub fn counters(&self) -> RwLockReadGuard<'_, EventCounters> {
        self.counters.read()
    }

    pub fn counters_mut(&self) -> RwLockWriteGuard<'_, EventCounters> {
        self.counters.write()
    }

    /// Optimistic sold-out prediction: true as soon as the *requested*
    /// reservations cover every seat, even though some of those requests may
    /// still be in flight.
    pub fn is_sold_out(&self, seat_total: u32) -> bool {
        let c = self.counters.read();
        c.reserve_requested as i64 - c.cancel_completed as i64 >= seat_total as i64
    }

    /// Fixture events (`created_at` unset) predate every cutoff.
    pub fn created_before(&self, cutoff: DateTime<Utc>) -> bool {
        self.created_at.map_or(true, |at| at < cutoff)
    }

    /// Deep copy for oracle input, so validation can read a consistent
    /// "before the request" view without holding any lock.
    pub fn snapshot(&self) -> EventSnapshot {
        EventSnapshot {
            id: self.id,
            title: self.title.clone(),
            price: self.price,
            public: self.is_public(),
            closed: self.is_closed(),
            created_at: self.created_at,
            counters: *self.counters.read(),
        }
    }
}

/// Point-in-time copy of an [`Event`].
#[derive(Clone, Debug)]
pub struct EventSnapshot {
    pub id: u64,
    pub title: String,
    pub price: u64,
    pub public: bool,
    pub closed: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub counters: EventCounters,
}

impl EventSnapshot {
    pub fn created_before(&self, cutoff: DateTime<Utc>) -> bool {
        self.created_at.map_or(true, |at| at < cutoff)
    }
}

/// A seat-rank definition: how many seats the rank has per event and the
/// surcharge on top of the event's base price.
#[derive(Clone, Copy, Debug)]
pub struct SheetKind {
    pub rank: Rank,
    pub total: u32,
    pub price: u64,
}

/// The immutable seat inventory shared by every event.
#[derive(Clone, Debug)]
pub struct Seating {
    pub kinds: Vec<SheetKind>,
    pub total: u32,
}

impl Seating {
    /// The fixed inventory of the target service.
    pub fn standard() -> Self {
        let kinds = vec![
            SheetKind { rank: Rank::S, total: 50, price: 5000 },
            SheetKind { rank: Rank::A, total: 150, price: 3000 },
            SheetKind { rank: Rank::B, total: 300, price: 1000 },
            SheetKind { rank: Rank::C, total: 500, price: 0 },
        ];
        let total = kinds.iter().map(|k| k.total).sum();
        Self { kinds, total }
    }

    pub fn kind(&self, rank: Rank) -> &SheetKind {
        self.kinds
            .iter()
            .find(|k| k.rank == rank)
            .expect("seating must define every rank")
    }
}

/// One physical seat.
#[derive(Clone, Debug)]
pub struct Sheet {
    pub id: u64,
    pub rank: Rank,
    pub num: u32,
    pub price: u64,
}

/// Seat number 0 means "not tied to a concrete seat"; the reserve API picks
/// the seat, the benchmarker only picks the rank.
pub const NO_SEAT: u32 = 0;

/// One unit of seat capacity within one event. Tokens move between the
/// store's pools (available, private, closed, reserved) but are never
/// duplicated or dropped.
#[derive(Clone, Debug)]
pub struct SeatToken {
    pub event_id: u64,
    pub rank: Rank,
    pub num: u32,
    pub price: u64,
}

/// Cancellation timestamps; `None` = has not happened.
#[derive(Clone, Copy, Debug, Default)]
pub struct ReservationTimes {
    pub reserve_completed_at: Option<DateTime<Utc>>,
    pub cancel_requested_at: Option<DateTime<Utc>>,
    pub cancel_completed_at: Option<DateTime<Utc>>,
}

/// A reservation as the shadow model knows it. Created as a placeholder when
/// a reserve scenario begins (id 0), given the server-assigned id on commit,
/// and never deleted — cancellation is a state transition.
#[derive(Debug)]
pub struct Reservation {
    pub id: u64,
    pub event_id: u64,
    pub user_id: u64,
    /// Only meaningful for fixture reservations; the reserve API does not
    /// return the physical sheet id.
    pub sheet_id: u64,
    pub rank: Rank,
    pub num: u32,
    pub price: u64,
    times: RwLock<ReservationTimes>,
    cancel_gate: AtomicBool,
}

impl Reservation {
    pub fn new(event_id: u64, user_id: u64, rank: Rank, price: u64) -> Self {
        Self {
            id: 0,
            event_id,
            user_id,
            sheet_id: 0,
            rank,
            num: NO_SEAT,
            price,
            times: RwLock::new(ReservationTimes::default()),
            cancel_gate: AtomicBool::new(false),
        }
    }

    pub fn times(&self) -> ReservationTimes {
        *self.times.read()
    }

    pub(crate) fn times_mut(&self) -> RwLockWriteGuard<'_, ReservationTimes> {
        self.times.write()
    }

    /// A cancel request was issued before `cutoff`; completion unknown.
    pub fn maybe_canceled_before(&self, cutoff: DateTime<Utc>) -> bool {
        self.times
            .read()
            .cancel_requested_at
            .map_or(false, |at| at < cutoff)
    }

    /// The cancellation is confirmed complete before `cutoff`.
    pub fn canceled_before(&self, cutoff: DateTime<Utc>) -> bool {
        let t = self.times.read();
        let requested = t.cancel_requested_at.map_or(false, |at| at < cutoff);
        requested && t.cancel_completed_at.map_or(false, |at| at < cutoff)
    }

    /// Time of the last *confirmed* state change.
    pub fn last_updated_at(&self) -> Option<DateTime<Utc>> {
        let t = self.times.read();
        t.cancel_completed_at.or(t.reserve_completed_at)
    }

    /// Time of the last state change, counting requests still in flight.
    pub fn last_maybe_updated_at(&self) -> Option<DateTime<Utc>> {
        let t = self.times.read();
        t.cancel_completed_at
            .or(t.cancel_requested_at)
            .or(t.reserve_completed_at)
    }

    /// Non-blocking claim of the exclusive right to cancel this reservation.
    /// Returns `None` when another scenario holds it; the caller must give up,
    /// not wait, or two cancels for the same seat could go out at once.
    pub fn try_begin_cancel(&self) -> Option<CancelGuard<'_>> {
        self.cancel_gate
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
            .then_some(CancelGuard { reservation: self })
    }
}

impl Clone for Reservation {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            event_id: self.event_id,
            user_id: self.user_id,
            sheet_id: self.sheet_id,
            rank: self.rank,
            num: self.num,
            price: self.price,
            times: RwLock::new(*self.times.read()),
            cancel_gate: AtomicBool::new(false),
        }
    }
}

/// Releases the cancel gate on every exit path.
#[derive(Debug)]
pub struct CancelGuard<'a> {
    reservation: &'a Reservation,
}

impl Drop for CancelGuard<'_> {
    fn drop(&mut self) {
        self.reservation.cancel_gate.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    #[test]
    fn test_rank_round_trip() {
        for rank in RANKS {
            assert_eq!(rank.as_str().parse::<Rank>().unwrap(), rank);
        }
        assert!("N".parse::<Rank>().is_err());
    }

    #[test]
    fn test_stamped_id_as_of() {
        let now = Utc::now();
        let mut stamped = StampedId::default();
        assert_eq!(stamped.get_before(now), 0);

        stamped.set_at(7, now - ChronoDuration::seconds(2));
        assert_eq!(stamped.get_before(now), 7);

        stamped.set_at(8, now + ChronoDuration::seconds(2));
        assert_eq!(stamped.get_before(now), 0);
    }

    #[test]
    fn test_sold_out_is_request_based() {
        let event = Event::new(1, "t".into(), 1000, true, false, None);
        {
            let mut c = event.counters_mut();
            c.reserve_requested = 10;
            c.cancel_completed = 0;
        }
        assert!(event.is_sold_out(10));
        assert!(!event.is_sold_out(11));

        // A completed cancel frees capacity even before the resale lands.
        event.counters_mut().cancel_completed = 1;
        assert!(!event.is_sold_out(10));
    }

    #[test]
    fn test_cancel_predicates() {
        let now = Utc::now();
        let r = Reservation::new(1, 2, Rank::A, 4000);
        assert!(!r.maybe_canceled_before(now));

        r.times_mut().cancel_requested_at = Some(now - ChronoDuration::seconds(1));
        assert!(r.maybe_canceled_before(now));
        assert!(!r.canceled_before(now));

        r.times_mut().cancel_completed_at = Some(now - ChronoDuration::milliseconds(500));
        assert!(r.canceled_before(now));
        // Not yet canceled as of a cutoff that predates the request.
        assert!(!r.canceled_before(now - ChronoDuration::seconds(2)));
    }

    #[test]
    fn test_cancel_gate_is_exclusive_and_released_on_drop() {
        let r = Reservation::new(1, 2, Rank::B, 2000);
        let guard = r.try_begin_cancel().expect("gate should be free");
        assert!(r.try_begin_cancel().is_none());
        drop(guard);
        assert!(r.try_begin_cancel().is_some());
    }

    #[test]
    fn test_total_price_label() {
        let mut status = UserStatus::default();
        status.positive_total_price = 5000;
        status.negative_total_price = 5000;
        assert_eq!(status.total_price_label(), "5000");

        status.positive_total_price = 8000;
        assert_eq!(status.total_price_label(), "8000-5000");
    }
}
