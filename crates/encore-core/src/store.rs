//! Shadow state store
//!
//! Owns every entity of the shadow model and hands them to scenarios as
//! exclusive, RAII-scoped leases: at most one scenario holds a given user,
//! administrator or seat token at a time, and dropping the lease returns the
//! resource on every exit path. A single coarse lock serializes pool
//! membership changes; per-event counter blocks have their own locks
//! (see [`crate::model::Event`]); the reservation registry and the two
//! transaction logs are guarded separately so begin/commit never contends
//! with pool traffic.
//!
//! Speculative bookkeeping is deliberately one-sided: request counters are
//! bumped before the HTTP call and *never* rolled back on failure or
//! timeout, so the oracle's windows stay conservative even when the server
//! applied a mutation we could not confirm.

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

use crate::dataset::Dataset;
use crate::error::{BenchError, Result};
use crate::model::{
    Administrator, AppUser, Event, EventSnapshot, Rank, Reservation, SeatToken, Seating, NO_SEAT,
};

/// Scenario-facing pools plus the event registry.
#[derive(Default)]
struct Pools {
    users: Vec<AppUser>,
    new_users: Vec<AppUser>,
    /// Sign-up users whose creation request failed or timed out. The server
    /// may or may not know the login name, so the account is neither usable
    /// nor retryable; it is parked here instead of destroyed.
    spent_users: Vec<AppUser>,
    admins: Vec<Administrator>,

    events: Vec<Arc<Event>>,

    // Seat capacity tokens. A token lives in exactly one of these four pools;
    // the total across them never changes.
    available_seats: Vec<SeatToken>,
    private_seats: Vec<SeatToken>,
    closed_seats: Vec<SeatToken>,
    reserved_seats: Vec<SeatToken>,
}

/// Reservation registry and the run-wide request/completion counts.
#[derive(Default)]
struct Book {
    reservations: HashMap<u64, Arc<Reservation>>,
    reserve_requested: u32,
    reserve_completed: u32,
    cancel_requested: u32,
    cancel_completed: u32,
}

/// One in-flight mutating request, alive between begin and commit. Entries
/// left behind by failed or timed-out requests are never removed; they only
/// exist to bound uncertainty and for post-mortem logs.
#[derive(Debug, Clone)]
pub struct TxnEntry {
    pub reservation_id: u64,
    pub event_id: u64,
    pub user_id: u64,
    pub rank: Rank,
}

#[derive(Default)]
struct TxnLog {
    next_id: u64,
    entries: HashMap<u64, TxnEntry>,
}

impl TxnLog {
    fn append(&mut self, entry: TxnEntry) -> u64 {
        self.next_id += 1;
        self.entries.insert(self.next_id, entry);
        self.next_id
    }
}

/// Seat-token pool sizes, for summaries and conservation checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeatPoolSizes {
    pub available: usize,
    pub private: usize,
    pub closed: usize,
    pub reserved: usize,
}

impl SeatPoolSizes {
    pub fn total(&self) -> usize {
        self.available + self.private + self.closed + self.reserved
    }
}

pub struct Store {
    seating: Seating,
    pools: Mutex<Pools>,
    book: Mutex<Book>,
    reserve_log: Mutex<TxnLog>,
    cancel_log: Mutex<TxnLog>,
    /// Non-blocking gate around "create a new event": losing the race means
    /// skipping this round, never queuing behind the winner.
    event_gate: AtomicBool,
}

impl Store {
    pub fn new(dataset: Dataset) -> Arc<Self> {
        let store = Self {
            seating: dataset.seating.clone(),
            pools: Mutex::new(Pools::default()),
            book: Mutex::new(Book::default()),
            reserve_log: Mutex::new(TxnLog::default()),
            cancel_log: Mutex::new(TxnLog::default()),
            event_gate: AtomicBool::new(false),
        };

        {
            let mut pools = store.pools.lock();
            pools.users = dataset.users;
            pools.new_users = dataset.new_users;
            pools.admins = dataset.administrators;

            for event in dataset.events.into_iter().chain(dataset.closed_events) {
                let event = Arc::new(event);
                store.materialize_seats(&mut pools, &event);
                pools.events.push(event);
            }
        }

        {
            let mut book = store.book.lock();
            for r in dataset.reservations {
                let times = r.times();
                if times.cancel_requested_at.is_some() {
                    book.cancel_requested += 1;
                }
                if times.cancel_completed_at.is_some() {
                    book.cancel_completed += 1;
                }
                book.reservations.insert(r.id, Arc::new(r));
            }
            book.reserve_requested = book.reservations.len() as u32;
            book.reserve_completed = book.reservations.len() as u32;
        }

        Arc::new(store)
    }

    pub fn seating(&self) -> &Seating {
        &self.seating
    }

    /// Seat tokens of a newly registered event go to the pool matching its
    /// flags; tokens of an already sold-out fixture event go straight to the
    /// reserved pool, carrying their seat numbers.
    fn materialize_seats(&self, pools: &mut Pools, event: &Arc<Event>) {
        if event.is_sold_out(self.seating.total) {
            for kind in &self.seating.kinds {
                for num in 1..=kind.total {
                    pools.reserved_seats.push(SeatToken {
                        event_id: event.id,
                        rank: kind.rank,
                        num,
                        price: event.price + kind.price,
                    });
                }
            }
            return;
        }

        let mut tokens: Vec<SeatToken> = self
            .seating
            .kinds
            .iter()
            .flat_map(|kind| {
                (0..kind.total).map(|_| SeatToken {
                    event_id: event.id,
                    rank: kind.rank,
                    num: NO_SEAT,
                    price: event.price + kind.price,
                })
            })
            .collect();

        // Prepend so checkouts (which pop from the back) drain older events
        // first.
        let pool = if event.is_closed() {
            &mut pools.closed_seats
        } else if !event.is_public() {
            &mut pools.private_seats
        } else {
            &mut pools.available_seats
        };
        tokens.append(pool);
        *pool = tokens;
    }

    // ------------------------------------------------------------------
    // Checkouts
    // ------------------------------------------------------------------

    pub fn checkout_random_user(self: &Arc<Self>) -> Option<UserLease> {
        let mut pools = self.pools.lock();
        if pools.users.is_empty() {
            debug!("user pool empty");
            return None;
        }
        let i = rand::thread_rng().gen_range(0..pools.users.len());
        let user = pools.users.swap_remove(i);
        debug!(id = user.id, login = %user.login_name, "checkout user");
        Some(UserLease { user: Some(user), store: Arc::clone(self) })
    }

    pub fn checkout_user_by_id(self: &Arc<Self>, user_id: u64) -> Option<UserLease> {
        let mut pools = self.pools.lock();
        let i = pools.users.iter().position(|u| u.id == user_id)?;
        let user = pools.users.swap_remove(i);
        debug!(id = user.id, login = %user.login_name, "checkout user by id");
        Some(UserLease { user: Some(user), store: Arc::clone(self) })
    }

    /// A not-yet-registered account from the sign-up pool. Call
    /// [`NewUserLease::activate`] once the server confirmed the account;
    /// dropping the lease without activating parks the account as spent.
    pub fn checkout_new_user(self: &Arc<Self>) -> Option<NewUserLease> {
        let mut pools = self.pools.lock();
        let user = pools.new_users.pop()?;
        debug!(login = %user.login_name, "checkout new user");
        Some(NewUserLease { user: Some(user), store: Arc::clone(self) })
    }

    pub fn checkout_random_admin(self: &Arc<Self>) -> Option<AdminLease> {
        let mut pools = self.pools.lock();
        if pools.admins.is_empty() {
            debug!("admin pool empty");
            return None;
        }
        let i = rand::thread_rng().gen_range(0..pools.admins.len());
        let admin = pools.admins.swap_remove(i);
        Some(AdminLease { admin: Some(admin), store: Arc::clone(self) })
    }

    /// Pop one unit of public seat capacity. `None` means every public seat
    /// is spoken for and the caller may fall back to creating a new event.
    pub fn checkout_seat(self: &Arc<Self>) -> Option<SeatLease> {
        let mut pools = self.pools.lock();
        let token = pools.available_seats.pop();
        if token.is_none() {
            debug!("available seat pool empty, a new event is needed");
        }
        token.map(|token| SeatLease {
            token: Some(token),
            withheld: false,
            store: Arc::clone(self),
        })
    }

    fn push_user(&self, user: AppUser) {
        debug!(id = user.id, login = %user.login_name, "release user");
        self.pools.lock().users.push(user);
    }

    fn push_admin(&self, admin: Administrator) {
        self.pools.lock().admins.push(admin);
    }

    fn push_spent_user(&self, user: AppUser) {
        debug!(login = %user.login_name, "park spent sign-up account");
        self.pools.lock().spent_users.push(user);
    }

    fn push_seat(&self, token: SeatToken, withheld: bool) {
        let mut pools = self.pools.lock();
        if withheld || token.num != NO_SEAT {
            pools.reserved_seats.push(token);
        } else {
            pools.available_seats.push(token);
        }
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    /// A new event with a random title and price; its id stays 0 until the
    /// server assigns one and [`Store::publish_event`] registers it.
    pub fn new_event_draft(&self) -> EventDraft {
        let mut rng = rand::thread_rng();
        EventDraft {
            title: crate::dataset::random_alphabet_string(32),
            public: true,
            closed: false,
            price: 1000 + rng.gen_range(0..10) * 1000,
        }
    }

    /// Non-blocking attempt to become the one task creating a new event.
    /// Losing the race is an accepted skip, not a failure; blocking here
    /// would stall load generation under contention.
    pub fn try_begin_event_creation(self: &Arc<Self>) -> Option<EventCreationGuard> {
        self.event_gate
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
            .then(|| EventCreationGuard { store: Arc::clone(self) })
    }

    /// Register a server-confirmed event and materialize its seat tokens.
    pub fn publish_event(
        &self,
        draft: EventDraft,
        id: u64,
        created_at: Option<DateTime<Utc>>,
    ) -> Arc<Event> {
        let event = Arc::new(Event::new(
            id,
            draft.title,
            draft.price,
            draft.public,
            draft.closed,
            created_at,
        ));
        debug!(id, title = %event.title, public = draft.public, closed = draft.closed, "publish event");

        let mut pools = self.pools.lock();
        self.materialize_seats(&mut pools, &event);
        pools.events.push(Arc::clone(&event));
        event
    }

    pub fn find_event(&self, id: u64) -> Option<Arc<Event>> {
        self.pools.lock().events.iter().find(|e| e.id == id).cloned()
    }

    /// Shallow copy of the event registry.
    pub fn events(&self) -> Vec<Arc<Event>> {
        self.pools.lock().events.clone()
    }

    /// Deep snapshot so callers can validate against a consistent view
    /// without holding any lock across an HTTP call.
    pub fn copied_events(&self) -> Vec<EventSnapshot> {
        self.pools.lock().events.iter().map(|e| e.snapshot()).collect()
    }

    pub fn random_public_event(&self) -> Option<Arc<Event>> {
        let events = self.events();
        let public: Vec<_> = events.into_iter().filter(|e| e.is_public()).collect();
        public.choose(&mut rand::thread_rng()).cloned()
    }

    pub fn random_public_sold_out_event(&self) -> Option<Arc<Event>> {
        let events = self.events();
        let candidates: Vec<_> = events
            .into_iter()
            .filter(|e| e.is_public() && e.is_sold_out(self.seating.total))
            .collect();
        candidates.choose(&mut rand::thread_rng()).cloned()
    }

    // ------------------------------------------------------------------
    // Reservations
    // ------------------------------------------------------------------

    pub fn find_reservation(&self, id: u64) -> Option<Arc<Reservation>> {
        self.book.lock().reservations.get(&id).cloned()
    }

    /// Shallow copy of the reservation registry.
    pub fn reservations(&self) -> HashMap<u64, Arc<Reservation>> {
        self.book.lock().reservations.clone()
    }

    /// Deep copy for oracle input. Linear in the registry size, which stays
    /// in the low tens of thousands even against a fast target.
    pub fn copied_reservations(&self) -> HashMap<u64, Reservation> {
        let book = self.book.lock();
        book.reservations
            .iter()
            .map(|(id, r)| (*id, Reservation::clone(r)))
            .collect()
    }

    pub fn copied_reservations_for_event(&self, event_id: u64) -> HashMap<u64, Reservation> {
        let book = self.book.lock();
        book.reservations
            .iter()
            .filter(|(_, r)| r.event_id == event_id)
            .map(|(id, r)| (*id, Reservation::clone(r)))
            .collect()
    }

    /// A random reservation of the event with no cancel attempt so far.
    pub fn random_active_reservation_for_event(&self, event_id: u64) -> Option<Arc<Reservation>> {
        let book = self.book.lock();
        let candidates: Vec<_> = book
            .reservations
            .values()
            .filter(|r| {
                let t = r.times();
                r.event_id == event_id
                    && t.cancel_requested_at.is_none()
                    && t.cancel_completed_at.is_none()
            })
            .cloned()
            .collect();
        candidates.choose(&mut rand::thread_rng()).cloned()
    }

    pub fn reserve_requested_count(&self) -> u32 {
        self.book.lock().reserve_requested
    }

    /// In-flight entries currently parked in the two transaction logs.
    pub fn in_flight(&self) -> (usize, usize) {
        (
            self.reserve_log.lock().entries.len(),
            self.cancel_log.lock().entries.len(),
        )
    }

    // ------------------------------------------------------------------
    // Transaction bookkeeping
    // ------------------------------------------------------------------

    /// Speculatively account for a reservation about to be requested: the
    /// per-event and per-rank `reserve_requested` counters, the user's
    /// pessimistic total, and a transaction-log entry.
    pub fn begin_reservation(&self, user: &mut AppUser, reservation: &Reservation) -> u64 {
        self.book.lock().reserve_requested += 1;

        let event = self
            .find_event(reservation.event_id)
            .expect("reservation must reference a known event");
        {
            let mut c = event.counters_mut();
            c.reserve_requested += 1;
            c.reserve_requested_by_rank.bump(reservation.rank);
        }

        user.status.positive_total_price += reservation.price;
        user.status.last_maybe_reserved_event.set(reservation.event_id);

        let log_id = self.reserve_log.lock().append(TxnEntry {
            reservation_id: reservation.id,
            event_id: reservation.event_id,
            user_id: reservation.user_id,
            rank: reservation.rank,
        });
        debug!(
            log_id,
            event_id = reservation.event_id,
            user_id = reservation.user_id,
            rank = %reservation.rank,
            "begin reservation"
        );
        log_id
    }

    /// Record a server-confirmed reservation. Fails fatally when the server
    /// assigned an id the shadow model already knows — that is a server bug,
    /// not a benchmarker race.
    pub fn commit_reservation(
        &self,
        log_id: u64,
        user: &mut AppUser,
        mut reservation: Reservation,
    ) -> Result<Arc<Reservation>> {
        reservation.times_mut().reserve_completed_at = Some(Utc::now());
        let reservation = Arc::new(reservation);

        {
            let mut book = self.book.lock();
            if book.reservations.contains_key(&reservation.id) {
                return Err(BenchError::fatal(format!(
                    "the server assigned duplicate reservation id {}",
                    reservation.id
                )));
            }
            book.reservations.insert(reservation.id, Arc::clone(&reservation));
            book.reserve_completed += 1;
            assert!(
                book.reservations.len() == book.reserve_completed as usize,
                "reservation registry diverged from the completion count"
            );
        }

        let event = self
            .find_event(reservation.event_id)
            .expect("reservation must reference a known event");
        {
            let mut c = event.counters_mut();
            c.reserve_completed += 1;
            c.reserve_completed_by_rank.bump(reservation.rank);
        }

        user.status.negative_total_price += reservation.price;
        user.status.last_reserved_event.set(reservation.event_id);
        user.status.last_reservation.set(reservation.id);

        self.reserve_log.lock().entries.remove(&log_id);
        debug!(
            log_id,
            id = reservation.id,
            event_id = reservation.event_id,
            rank = %reservation.rank,
            num = reservation.num,
            "commit reservation"
        );
        Ok(reservation)
    }

    /// Speculatively account for a cancellation about to be requested. The
    /// caller must hold the reservation's cancel gate.
    pub fn begin_cancellation(&self, user: &mut AppUser, reservation: &Arc<Reservation>) -> u64 {
        {
            let mut book = self.book.lock();
            reservation.times_mut().cancel_requested_at = Some(Utc::now());
            book.cancel_requested += 1;
        }

        let event = self
            .find_event(reservation.event_id)
            .expect("reservation must reference a known event");
        {
            let mut c = event.counters_mut();
            c.cancel_requested += 1;
            c.cancel_requested_by_rank.bump(reservation.rank);
        }

        user.status.negative_total_price =
            user.status.negative_total_price.saturating_sub(reservation.price);
        user.status.last_maybe_reserved_event.set(reservation.event_id);
        user.status.last_maybe_reservation.set(reservation.id);

        let log_id = self.cancel_log.lock().append(TxnEntry {
            reservation_id: reservation.id,
            event_id: reservation.event_id,
            user_id: reservation.user_id,
            rank: reservation.rank,
        });
        debug!(log_id, id = reservation.id, "begin cancellation");
        log_id
    }

    /// Record a server-confirmed cancellation.
    pub fn commit_cancellation(
        &self,
        log_id: u64,
        user: &mut AppUser,
        reservation: &Arc<Reservation>,
    ) {
        {
            let mut book = self.book.lock();
            reservation.times_mut().cancel_completed_at = Some(Utc::now());
            book.cancel_completed += 1;
        }

        let event = self
            .find_event(reservation.event_id)
            .expect("reservation must reference a known event");
        {
            let mut c = event.counters_mut();
            c.cancel_completed += 1;
            c.cancel_completed_by_rank.bump(reservation.rank);
        }

        user.status.positive_total_price =
            user.status.positive_total_price.saturating_sub(reservation.price);
        user.status.last_reserved_event.set(reservation.event_id);
        user.status.last_reservation.set(reservation.id);

        self.cancel_log.lock().entries.remove(&log_id);
        debug!(log_id, id = reservation.id, "commit cancellation");
    }

    pub fn seat_pool_sizes(&self) -> SeatPoolSizes {
        let pools = self.pools.lock();
        SeatPoolSizes {
            available: pools.available_seats.len(),
            private: pools.private_seats.len(),
            closed: pools.closed_seats.len(),
            reserved: pools.reserved_seats.len(),
        }
    }
}

/// Draft of an event whose server id is not known yet.
#[derive(Debug, Clone)]
pub struct EventDraft {
    pub title: String,
    pub public: bool,
    pub closed: bool,
    pub price: u64,
}

/// Held by the single task allowed to create a new event; clears the gate on
/// every exit path.
pub struct EventCreationGuard {
    store: Arc<Store>,
}

impl Drop for EventCreationGuard {
    fn drop(&mut self) {
        self.store.event_gate.store(false, Ordering::Release);
    }
}

/// Exclusive lease of a pooled user; returns it on drop.
pub struct UserLease {
    user: Option<AppUser>,
    store: Arc<Store>,
}

impl Deref for UserLease {
    type Target = AppUser;

    fn deref(&self) -> &AppUser {
        self.user.as_ref().expect("lease still holds the user")
    }
}

impl DerefMut for UserLease {
    fn deref_mut(&mut self) -> &mut AppUser {
        self.user.as_mut().expect("lease still holds the user")
    }
}

impl Drop for UserLease {
    fn drop(&mut self) {
        if let Some(user) = self.user.take() {
            self.store.push_user(user);
        }
    }
}

/// Lease of a sign-up account. [`NewUserLease::activate`] promotes it into
/// the active user pool once the server confirmed the account; dropping the
/// lease without activating parks it as spent.
pub struct NewUserLease {
    user: Option<AppUser>,
    store: Arc<Store>,
}

impl NewUserLease {
    pub fn activate(mut self) {
        if let Some(user) = self.user.take() {
            debug!(id = user.id, login = %user.login_name, "activate new user");
            self.store.push_user(user);
        }
    }
}

impl Deref for NewUserLease {
    type Target = AppUser;

    fn deref(&self) -> &AppUser {
        self.user.as_ref().expect("lease still holds the user")
    }
}

impl DerefMut for NewUserLease {
    fn deref_mut(&mut self) -> &mut AppUser {
        self.user.as_mut().expect("lease still holds the user")
    }
}

impl Drop for NewUserLease {
    fn drop(&mut self) {
        if let Some(user) = self.user.take() {
            self.store.push_spent_user(user);
        }
    }
}

/// Exclusive lease of an administrator; returns it on drop.
pub struct AdminLease {
    admin: Option<Administrator>,
    store: Arc<Store>,
}

impl Deref for AdminLease {
    type Target = Administrator;

    fn deref(&self) -> &Administrator {
        self.admin.as_ref().expect("lease still holds the admin")
    }
}

impl DerefMut for AdminLease {
    fn deref_mut(&mut self) -> &mut Administrator {
        self.admin.as_mut().expect("lease still holds the admin")
    }
}

impl Drop for AdminLease {
    fn drop(&mut self) {
        if let Some(admin) = self.admin.take() {
            self.store.push_admin(admin);
        }
    }
}

/// Lease of one unit of seat capacity. The drop destination encodes the
/// outcome: a token with a seat number goes to the reserved pool, a token
/// whose reserve attempt failed or timed out is withheld there too (the
/// server may have taken the seat), and an untouched or canceled token
/// returns to the available pool.
pub struct SeatLease {
    token: Option<SeatToken>,
    withheld: bool,
    store: Arc<Store>,
}

impl SeatLease {
    /// Mark the capacity as burned by a failed or ambiguous reserve attempt.
    pub fn withhold(&mut self) {
        self.withheld = true;
    }
}

impl Deref for SeatLease {
    type Target = SeatToken;

    fn deref(&self) -> &SeatToken {
        self.token.as_ref().expect("lease still holds the token")
    }
}

impl DerefMut for SeatLease {
    fn deref_mut(&mut self) -> &mut SeatToken {
        self.token.as_mut().expect("lease still holds the token")
    }
}

impl Drop for SeatLease {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            self.store.push_seat(token, self.withheld);
        }
    }
}

// ----------------------------------------------------------------------
// Snapshot filters used by scenarios to build oracle input
// ----------------------------------------------------------------------

/// Keep events created strictly before `cutoff`, dropping ones young enough
/// that the server may legitimately not list them yet.
pub fn filter_events_before(events: &[EventSnapshot], cutoff: DateTime<Utc>) -> Vec<EventSnapshot> {
    events.iter().filter(|e| e.created_before(cutoff)).cloned().collect()
}

pub fn filter_public_events(events: &[EventSnapshot]) -> Vec<EventSnapshot> {
    events
        .iter()
        .filter(|e| e.public)
        .inspect(|e| assert!(!e.closed, "a public event can never be closed"))
        .cloned()
        .collect()
}

/// Keep reservations whose completion predates `cutoff`; later ones may be
/// missing from server listings without that being a defect.
pub fn filter_reservations_before(
    reservations: &HashMap<u64, Reservation>,
    cutoff: DateTime<Utc>,
) -> HashMap<u64, Reservation> {
    reservations
        .iter()
        .filter(|(_, r)| r.times().reserve_completed_at.map_or(true, |at| at < cutoff))
        .map(|(id, r)| (*id, r.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SheetKind;
    use std::thread;

    fn tiny_seating() -> Seating {
        let kinds = vec![
            SheetKind { rank: Rank::S, total: 2, price: 100 },
            SheetKind { rank: Rank::A, total: 2, price: 50 },
        ];
        Seating { kinds, total: 4 }
    }

    fn tiny_dataset() -> Dataset {
        let seating = tiny_seating();
        let users = (1..=4)
            .map(|i| AppUser {
                id: i,
                nickname: format!("user{i}"),
                login_name: format!("user{i}"),
                password: format!("pass{i}"),
                status: Default::default(),
            })
            .collect();
        let admins = vec![Administrator {
            id: 1,
            nickname: "admin".into(),
            login_name: "admin".into(),
            password: "admin".into(),
            online: false,
        }];
        let events = vec![Event::new(1, "live".into(), 1000, true, false, None)];
        Dataset {
            users,
            new_users: vec![AppUser {
                id: 0,
                nickname: "fresh".into(),
                login_name: "fresh".into(),
                password: "fresh".into(),
                status: Default::default(),
            }],
            administrators: admins,
            events,
            closed_events: vec![],
            seating,
            sheets: vec![],
            reservations: vec![],
        }
    }

    #[test]
    fn test_checkout_is_exclusive_and_release_restores_pool() {
        let store = Store::new(tiny_dataset());

        let a = store.checkout_user_by_id(1).expect("user 1 free");
        assert!(store.checkout_user_by_id(1).is_none());
        assert_eq!(a.id, 1);
        drop(a);
        assert!(store.checkout_user_by_id(1).is_some());
    }

    #[test]
    fn test_seat_pool_conservation() {
        let store = Store::new(tiny_dataset());
        let before = store.seat_pool_sizes();
        assert_eq!(before.total(), 4);

        // Untouched lease returns to the available pool.
        let lease = store.checkout_seat().unwrap();
        assert_eq!(store.seat_pool_sizes().total(), 3);
        drop(lease);
        assert_eq!(store.seat_pool_sizes(), before);

        // A reserved token moves to the reserved pool; nothing is lost.
        let mut lease = store.checkout_seat().unwrap();
        lease.num = 1;
        drop(lease);
        let after = store.seat_pool_sizes();
        assert_eq!(after.total(), 4);
        assert_eq!(after.reserved, 1);

        // A failed attempt withholds the token instead of dropping it.
        let mut lease = store.checkout_seat().unwrap();
        lease.withhold();
        drop(lease);
        let after = store.seat_pool_sizes();
        assert_eq!(after.total(), 4);
        assert_eq!(after.reserved, 2);
    }

    #[test]
    fn test_publish_event_materializes_seats() {
        let store = Store::new(tiny_dataset());
        let draft = store.new_event_draft();
        let event = store.publish_event(draft, 2, Some(Utc::now()));

        assert_eq!(event.id, 2);
        assert_eq!(store.seat_pool_sizes().available, 8);
        assert!(store.find_event(2).is_some());

        // Older events drain first.
        let lease = store.checkout_seat().unwrap();
        assert_eq!(lease.event_id, 1);
    }

    #[test]
    fn test_private_event_seats_stay_out_of_the_public_pool() {
        let store = Store::new(tiny_dataset());
        let mut draft = store.new_event_draft();
        draft.public = false;
        store.publish_event(draft, 2, Some(Utc::now()));

        let sizes = store.seat_pool_sizes();
        assert_eq!(sizes.available, 4);
        assert_eq!(sizes.private, 4);
    }

    #[test]
    fn test_event_creation_gate_is_non_blocking() {
        let store = Store::new(tiny_dataset());
        let guard = store.try_begin_event_creation().expect("gate free");
        assert!(store.try_begin_event_creation().is_none());
        drop(guard);
        assert!(store.try_begin_event_creation().is_some());
    }

    #[test]
    fn test_reserve_commit_counts_and_duplicate_id() {
        let store = Store::new(tiny_dataset());
        let mut user = store.checkout_user_by_id(1).unwrap();

        let mut r = Reservation::new(1, user.id, Rank::S, 1100);
        let log_id = store.begin_reservation(&mut user, &r);
        assert_eq!(store.in_flight(), (1, 0));

        r.id = 10;
        r.num = 1;
        let committed = store.commit_reservation(log_id, &mut user, r).unwrap();
        assert_eq!(store.in_flight(), (0, 0));
        assert_eq!(user.status.positive_total_price, 1100);
        assert_eq!(user.status.negative_total_price, 1100);

        let event = store.find_event(1).unwrap();
        {
            let c = event.counters();
            assert_eq!(c.reserve_requested, 1);
            assert_eq!(c.reserve_completed, 1);
            assert_eq!(c.reserve_requested_by_rank.get(Rank::S), 1);
        }

        // Same server id again is a server bug.
        let mut dup = Reservation::new(1, user.id, Rank::A, 1050);
        let log_id = store.begin_reservation(&mut user, &dup);
        dup.id = 10;
        let err = store.commit_reservation(log_id, &mut user, dup).unwrap_err();
        assert!(err.is_fatal());

        // Cancel the committed one.
        let _gate = committed.try_begin_cancel().unwrap();
        let log_id = store.begin_cancellation(&mut user, &committed);
        store.commit_cancellation(log_id, &mut user, &committed);
        let c = event.counters();
        assert!(c.cancel_completed <= c.cancel_requested);
        assert!(c.reserve_completed <= c.reserve_requested);
        assert_eq!(user.status.positive_total_price, 1100 + 1050 - 1100);
    }

    #[test]
    fn test_concurrent_reserve_drains_pool_exactly() {
        let store = Store::new(tiny_dataset());

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    let mut user = store.checkout_user_by_id(i + 1).expect("own user");
                    let mut lease = store.checkout_seat().expect("seat available");
                    let mut r =
                        Reservation::new(lease.event_id, user.id, lease.rank, lease.price);
                    let log_id = store.begin_reservation(&mut user, &r);
                    r.id = 100 + i;
                    r.num = i as u32 + 1;
                    store.commit_reservation(log_id, &mut user, r).expect("commit");
                    lease.num = i as u32 + 1;
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let sizes = store.seat_pool_sizes();
        assert_eq!(sizes.available, 0);
        assert_eq!(sizes.reserved, 4);
        assert!(store.checkout_seat().is_none());

        let event = store.find_event(1).unwrap();
        let c = event.counters();
        assert_eq!(c.reserve_requested, 4);
        assert_eq!(c.reserve_completed, 4);
    }

    #[test]
    fn test_concurrent_cancel_gate_admits_exactly_one() {
        let store = Store::new(tiny_dataset());
        let mut user = store.checkout_user_by_id(1).unwrap();
        let mut r = Reservation::new(1, user.id, Rank::A, 1050);
        let log_id = store.begin_reservation(&mut user, &r);
        r.id = 1;
        let committed = store.commit_reservation(log_id, &mut user, r).unwrap();
        drop(user);

        let winners: Vec<_> = (0..2)
            .map(|_| {
                let r = Arc::clone(&committed);
                thread::spawn(move || r.try_begin_cancel().map(std::mem::forget).is_some())
            })
            .map(|h| h.join().unwrap())
            .collect();
        assert_eq!(winners.iter().filter(|w| **w).count(), 1);
    }

    #[test]
    fn test_new_user_lease_activation_vs_spend() {
        let store = Store::new(tiny_dataset());

        let mut lease = store.checkout_new_user().expect("one sign-up account");
        lease.id = 42;
        lease.activate();
        assert!(store.checkout_user_by_id(42).is_some());

        assert!(store.checkout_new_user().is_none());
    }

    #[test]
    fn test_filter_reservations_before() {
        let now = Utc::now();
        let mut map = HashMap::new();
        let old = Reservation::new(1, 1, Rank::S, 100);
        old.times_mut().reserve_completed_at = Some(now - chrono::Duration::seconds(10));
        let young = Reservation::new(1, 1, Rank::S, 100);
        young.times_mut().reserve_completed_at = Some(now + chrono::Duration::seconds(10));
        map.insert(1, old);
        map.insert(2, young);

        let filtered = filter_reservations_before(&map, now);
        assert!(filtered.contains_key(&1));
        assert!(!filtered.contains_key(&2));
    }
}
