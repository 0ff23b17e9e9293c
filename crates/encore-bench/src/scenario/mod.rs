//! Scenario functions
//!
//! One async function per traffic shape. Load scenarios generate weighted
//! background traffic with shallow assertions; check scenarios exercise one
//! behavior deeply against the consistency oracle. Every scenario checks
//! resources out of the shadow store, plays actions through the account's
//! session, and feeds confirmed outcomes back through begin/commit.
//!
//! An empty pool is a skip (`Ok(())`), never an error.

pub mod check;
pub mod load;

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use serde_json::json;
use tracing::debug;

use encore_client::{Action, Played, Session};
use encore_core::error::{BenchError, Result};
use encore_core::model::{Administrator, AppUser, Reservation, SeatToken, NO_SEAT};
use encore_core::store::{EventDraft, SeatLease};
use encore_core::wire::{AdminPayload, ErrorPayload, FullEventPayload, ReservationPayload, UserPayload};

use crate::static_files::STATIC_FILES;
use crate::world::World;

pub type ScenarioFuture = BoxFuture<'static, Result<()>>;
pub type ScenarioFn = fn(Arc<World>) -> ScenarioFuture;

#[derive(Clone, Copy)]
pub struct Scenario {
    pub name: &'static str,
    pub run: ScenarioFn,
}

/// Weighted background traffic.
pub fn load_scenarios() -> Vec<(u32, Scenario)> {
    vec![
        (1, Scenario { name: "load_create_user", run: |w| Box::pin(load::create_user(w)) }),
        (1, Scenario { name: "load_login", run: |w| Box::pin(load::login_churn(w)) }),
        (3, Scenario { name: "load_top_page", run: |w| Box::pin(load::top_page(w)) }),
        (1, Scenario { name: "load_admin_top_page", run: |w| Box::pin(load::admin_top_page(w)) }),
        (2, Scenario { name: "load_my_page", run: |w| Box::pin(load::my_page(w)) }),
        (2, Scenario { name: "load_reserve", run: |w| Box::pin(load::reserve(w)) }),
        (3, Scenario { name: "load_reserve_cancel", run: |w| Box::pin(load::reserve_cancel(w)) }),
        (2, Scenario { name: "load_sold_out_poll", run: |w| Box::pin(load::sold_out_poll(w)) }),
        (1, Scenario { name: "load_report", run: |w| Box::pin(load::report(w)) }),
        (1, Scenario { name: "load_event_report", run: |w| Box::pin(load::event_report(w)) }),
    ]
}

/// Validation rotation; also run once each during preflight.
pub fn check_scenarios() -> Vec<Scenario> {
    vec![
        Scenario { name: "check_static_files", run: |w| Box::pin(check::static_files(w)) },
        Scenario { name: "check_create_user", run: |w| Box::pin(check::create_user(w)) },
        Scenario { name: "check_login", run: |w| Box::pin(check::login(w)) },
        Scenario { name: "check_top_page", run: |w| Box::pin(check::top_page(w)) },
        Scenario { name: "check_admin_top_page", run: |w| Box::pin(check::admin_top_page(w)) },
        Scenario { name: "check_my_page", run: |w| Box::pin(check::my_page(w)) },
        Scenario { name: "check_reserve_sheet", run: |w| Box::pin(check::reserve_sheet(w)) },
        Scenario { name: "check_admin_login", run: |w| Box::pin(check::admin_login(w)) },
        Scenario { name: "check_create_event", run: |w| Box::pin(check::create_event(w)) },
        Scenario { name: "check_get_event", run: |w| Box::pin(check::get_event(w)) },
        Scenario { name: "check_cancel_resale", run: |w| Box::pin(check::cancel_resale(w)) },
        Scenario { name: "check_event_report", run: |w| Box::pin(check::event_report(w)) },
        Scenario { name: "check_seat_entropy", run: |w| Box::pin(check::seat_entropy(w)) },
    ]
}

/// Run once against the final shadow state, after the drain grace.
pub fn post_test_scenarios() -> Vec<Scenario> {
    vec![Scenario { name: "check_report", run: |w| Box::pin(check::report(w)) }]
}

// ----------------------------------------------------------------------
// Shared helpers
// ----------------------------------------------------------------------

pub(crate) fn check_user_payload(user: &AppUser, payload: &UserPayload) -> Result<()> {
    if payload.id != user.id || payload.nickname != user.nickname {
        tracing::warn!(
            expected_id = user.id,
            got_id = payload.id,
            "user payload mismatch"
        );
        return Err(BenchError::fatal("could not retrieve the correct user"));
    }
    Ok(())
}

pub(crate) fn check_admin_payload(admin: &Administrator, payload: &AdminPayload) -> Result<()> {
    if payload.id != admin.id || payload.nickname != admin.nickname {
        return Err(BenchError::fatal("could not retrieve the correct administrator"));
    }
    Ok(())
}

/// The error body must carry the exact application error code.
pub(crate) fn check_error_code(played: &Played, code: &str) -> Result<()> {
    let payload: ErrorPayload = played.json()?;
    if payload.error != code {
        return Err(BenchError::fatal(format!(
            "wrong error code: expected {code:?}, got {:?}",
            payload.error
        )));
    }
    Ok(())
}

pub(crate) async fn login_user(session: &Session, user: &mut AppUser) -> Result<()> {
    if user.status.online {
        return Ok(());
    }
    let action = Action::post("/api/actions/login", "a user can log in").json(json!({
        "login_name": user.login_name,
        "password": user.password,
    }));
    let played = session.play(&action).await?;
    check_user_payload(user, &played.json()?)?;
    user.status.online = true;
    Ok(())
}

pub(crate) async fn logout_user(session: &Session, user: &mut AppUser) -> Result<()> {
    if !user.status.online {
        return Ok(());
    }
    session
        .play(&Action::post("/api/actions/logout", "a user can log out").expect(204))
        .await?;
    user.status.online = false;
    Ok(())
}

pub(crate) async fn login_admin(
    session: &Session,
    admin: &mut Administrator,
    timeout: Option<Duration>,
) -> Result<()> {
    if admin.online {
        return Ok(());
    }
    let mut action = Action::post("/admin/api/actions/login", "an administrator can log in")
        .json(json!({
            "login_name": admin.login_name,
            "password": admin.password,
        }));
    if let Some(timeout) = timeout {
        action = action.timeout(timeout);
    }
    let played = session.play(&action).await?;
    check_admin_payload(admin, &played.json()?)?;
    admin.online = true;
    Ok(())
}

pub(crate) async fn logout_admin(session: &Session, admin: &mut Administrator) -> Result<()> {
    if !admin.online {
        return Ok(());
    }
    session
        .play(&Action::post("/admin/api/actions/logout", "an administrator can log out").expect(204))
        .await?;
    admin.online = false;
    Ok(())
}

/// Fire-and-forget fetches of every static asset through the session's
/// conditional cache, the way a browser would refill its cache in parallel.
pub(crate) fn spawn_asset_loads(world: &Arc<World>, session: &Arc<Session>) {
    debug!("load static assets");
    for file in STATIC_FILES {
        let session = Arc::clone(session);
        let world = Arc::clone(world);
        tokio::spawn(async move {
            let action = Action::get(file.path, "static assets are served").cached();
            match session.play(&action).await {
                Ok(played) if played.status == 304 => {
                    world.counters().inc(encore_core::counter::STATIC_304);
                }
                Ok(_) => world.counters().inc(encore_core::counter::STATIC_200),
                Err(e) => world.record_failure(&e),
            }
        });
    }
}

/// Reserve one seat of the token's rank. On success the shadow reservation
/// is committed and the token pinned to the assigned seat number. On
/// failure the speculative counters stay put; the oracle's windows depend
/// on the over-count.
pub(crate) async fn reserve_seat(
    world: &Arc<World>,
    session: &Session,
    user: &mut AppUser,
    seat: &mut SeatToken,
) -> Result<Arc<Reservation>> {
    let mut reservation = Reservation::new(seat.event_id, user.id, seat.rank, seat.price);
    let log_id = world.store.begin_reservation(user, &reservation);

    let action = Action::post(
        format!("/api/events/{}/actions/reserve", seat.event_id),
        "a seat can be reserved",
    )
    .expect(202)
    .json(json!({ "sheet_rank": seat.rank.as_str() }));
    let played = session.play(&action).await?;

    let payload: ReservationPayload = played.json()?;
    if payload.sheet_rank != seat.rank.as_str() {
        return Err(BenchError::fatal("could not retrieve the correct reservation"));
    }
    reservation.id = payload.reservation_id;
    reservation.num = payload.sheet_num;
    let committed = world.store.commit_reservation(log_id, user, reservation)?;
    seat.num = payload.sheet_num;

    debug!(
        user_id = user.id,
        total_price = %user.status.total_price_label(),
        event_id = seat.event_id,
        reservation_id = committed.id,
        rank = %committed.rank,
        num = committed.num,
        "reserved"
    );
    Ok(committed)
}

/// Cancel a held reservation. Returns `Ok(true)` when another scenario is
/// already canceling it, in which case nothing was mutated.
pub(crate) async fn cancel_seat(
    world: &Arc<World>,
    session: &Session,
    user: &mut AppUser,
    seat: &mut SeatToken,
    reservation: &Arc<Reservation>,
) -> Result<bool> {
    let Some(_gate) = reservation.try_begin_cancel() else {
        debug!(reservation_id = reservation.id, "already being canceled elsewhere");
        return Ok(true);
    };

    let log_id = world.store.begin_cancellation(user, reservation);
    let action = Action::delete(
        format!(
            "/api/events/{}/sheets/{}/{}/reservation",
            reservation.event_id, reservation.rank, reservation.num
        ),
        "a reservation can be canceled",
    )
    .expect(204);
    session.play(&action).await?;

    world.store.commit_cancellation(log_id, user, reservation);
    seat.num = NO_SEAT;
    Ok(false)
}

/// Create an event from a draft and return the server-assigned id.
pub(crate) async fn create_event_remote(session: &Session, draft: &EventDraft) -> Result<u64> {
    let action = Action::post("/admin/api/events", "an administrator can create an event")
        .json(json!({
            "title": draft.title,
            "public": draft.public,
            "price": draft.price,
        }));
    let played = session.play(&action).await?;
    let payload: FullEventPayload = played.json()?;
    if payload.event.title != draft.title
        || payload.price != draft.price
        || payload.public != draft.public
        || payload.closed != draft.closed
    {
        return Err(BenchError::fatal("could not retrieve the correct event"));
    }
    Ok(payload.event.id)
}

/// Pop a public seat token, or create a fresh event when the pool ran dry.
/// The creation gate is non-blocking: losing the race yields `None` and the
/// caller skips this iteration.
pub(crate) async fn pop_or_create_seat(world: &Arc<World>) -> Result<Option<SeatLease>> {
    if let Some(lease) = world.store.checkout_seat() {
        return Ok(Some(lease));
    }

    let Some(_gate) = world.store.try_begin_event_creation() else {
        debug!("another task is already creating an event");
        return Ok(None);
    };

    let Some(mut admin) = world.store.checkout_random_admin() else {
        return Ok(None);
    };
    let session = world.session_for_admin(&admin);
    login_admin(&session, &mut admin, None).await?;

    let draft = world.store.new_event_draft();
    let id = create_event_remote(&session, &draft).await?;
    world.store.publish_event(draft, id, Some(chrono::Utc::now()));

    Ok(world.store.checkout_seat())
}
