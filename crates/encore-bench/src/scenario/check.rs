//! Check scenarios
//!
//! Each one exercises a single behavior deeply and feeds the response
//! through the consistency oracle. They run sequentially (one check at a
//! time) so that resource-exclusive validations stay deterministic; any
//! fatal return aborts the whole run.

use std::collections::HashMap;
use std::sync::Arc;

use rand::Rng;
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use encore_client::Action;
use encore_core::dataset::random_alphabet_string;
use encore_core::error::{BenchError, Result};
use encore_core::model::{EventSnapshot, Reservation, SeatToken, NO_SEAT};
use encore_core::oracle;
use encore_core::params;
use encore_core::report::parse_sales_report;
use encore_core::store::{filter_events_before, filter_public_events, filter_reservations_before};
use encore_core::wire::{AdminPayload, EventPayload, FullEventPayload, FullUserPayload, UserPayload};

use super::{
    cancel_seat, check_admin_payload, check_error_code, check_user_payload, create_event_remote,
    login_admin, login_user, logout_admin, logout_user, pop_or_create_seat, reserve_seat,
};
use crate::page;
use crate::static_files::STATIC_FILES;
use crate::world::World;

/// Every static asset must come back byte-identical to the fixture build.
pub async fn static_files(world: Arc<World>) -> Result<()> {
    let Some(user) = world.store.checkout_random_user() else {
        return Ok(());
    };
    let session = world.session_for_user(&user);

    for file in STATIC_FILES {
        let played = session
            .play(&Action::get(file.path, "a static file is served"))
            .await?;
        let digest = hex::encode(Sha256::digest(&played.body));
        if digest != file.sha256 {
            return Err(BenchError::fatal(format!(
                "static file {} has the wrong contents",
                file.path
            )));
        }
    }
    Ok(())
}

/// Sign-up happy path plus the duplicate-login-name conflict.
pub async fn create_user(world: Arc<World>) -> Result<()> {
    let Some(mut lease) = world.store.checkout_new_user() else {
        return Ok(());
    };
    let session = world.session_for_user(&lease);
    session.reset();

    let signup_body = json!({
        "nickname": lease.nickname,
        "login_name": lease.login_name,
        "password": lease.password,
    });

    let action = Action::post("/api/users", "a new user can sign up")
        .expect(201)
        .json(signup_body.clone());
    let played = session.play(&action).await?;
    let payload: UserPayload = played.json()?;
    if payload.nickname != lease.nickname {
        return Err(BenchError::fatal("could not retrieve the created user"));
    }
    lease.id = payload.id;

    let action = Action::post("/api/actions/login", "a created user can log in").json(json!({
        "login_name": lease.login_name,
        "password": lease.password,
    }));
    let played = session.play(&action).await?;
    check_user_payload(&lease, &played.json()?)?;
    lease.status.online = true;

    let action = Action::post("/api/users", "signing up twice is rejected")
        .expect(409)
        .json(signup_body);
    let played = session.play(&action).await?;
    check_error_code(&played, "duplicated")?;

    lease.activate();
    Ok(())
}

/// Login/logout happy paths and every authentication failure mode.
pub async fn login(world: Arc<World>) -> Result<()> {
    let Some(mut user) = world.store.checkout_random_user() else {
        return Ok(());
    };
    let session = world.session_for_user(&user);
    session.reset();
    user.status.online = false;

    login_user(&session, &mut user).await?;
    logout_user(&session, &mut user).await?;

    let played = session
        .play(&Action::post("/api/actions/logout", "logging out twice is rejected").expect(401))
        .await?;
    check_error_code(&played, "login_required")?;

    let played = session
        .play(
            &Action::post("/api/actions/login", "an unknown user cannot log in")
                .expect(401)
                .json(json!({
                    "login_name": random_alphabet_string(32),
                    "password": user.password,
                })),
        )
        .await?;
    check_error_code(&played, "authentication_failed")?;

    let played = session
        .play(
            &Action::post("/api/actions/login", "a wrong password is rejected")
                .expect(401)
                .json(json!({
                    "login_name": user.login_name,
                    "password": random_alphabet_string(32),
                })),
        )
        .await?;
    check_error_code(&played, "authentication_failed")?;

    Ok(())
}

fn parse_embedded_events(html: &str, page_name: &str) -> Result<Vec<EventPayload>> {
    let Some(raw) = page::wrapper_attribute(html, "events") else {
        return Err(BenchError::fatal(format!(
            "the {page_name} is missing its embedded event payload"
        )));
    };
    serde_json::from_str(&raw).map_err(|e| {
        BenchError::fatal(format!("failed to decode the {page_name} event payload: {e}"))
    })
}

/// Full top-page validation: embedded event listing against the oracle and
/// the embedded login-user payload against the checked-out user.
pub async fn top_page(world: Arc<World>) -> Result<()> {
    let Some(mut user) = world.store.checkout_random_user() else {
        return Ok(());
    };
    let session = world.session_for_user(&user);

    let auth_choice = rand::thread_rng().gen_range(0..3);
    match auth_choice {
        0 => login_user(&session, &mut user).await?,
        1 => logout_user(&session, &mut user).await?,
        _ => {}
    }

    // Public events are assumed to stay public for the whole run.
    let cutoff = World::cutoff();
    let events_before =
        filter_events_before(&filter_public_events(&world.store.copied_events()), cutoff);

    let played = session
        .play(&Action::get("/", "the top page renders"))
        .await?;
    let html = played.text();

    let events = parse_embedded_events(&html, "top page")?;
    if events.is_empty() {
        warn!("top page listed no events");
        return Err(BenchError::fatal("wrong number of events on the top page"));
    }
    if events.len() < events_before.len() {
        warn!(got = events.len(), expected = events_before.len(), "top page dropped events");
        return Err(BenchError::fatal("wrong number of events on the top page"));
    }
    oracle::check_sorted_ascending(&events)
        .map_err(|_| BenchError::fatal("wrong event order on the top page"))?;

    let events_after: Vec<_> = world
        .store
        .events()
        .into_iter()
        .filter(|e| e.is_public())
        .collect();
    oracle::check_event_list(world.store.seating(), &events_before, &events, &events_after)
        .map_err(|e| BenchError::fatal(format!("top page event listing: {e}")))?;

    let Some(raw_user) = page::wrapper_attribute(&html, "login-user") else {
        return Err(BenchError::fatal("the top page is missing its login-user payload"));
    };
    if user.status.online {
        let payload: Option<UserPayload> = serde_json::from_str(&raw_user)
            .map_err(|e| BenchError::fatal(format!("failed to decode the login user: {e}")))?;
        let Some(payload) = payload else {
            return Err(BenchError::fatal("the login user is null"));
        };
        check_user_payload(&user, &payload)?;
    } else if raw_user != "null" {
        return Err(BenchError::fatal("a logged-out page carries a login user"));
    }

    Ok(())
}

/// Admin-page flavor of the top-page validation: all events, and the
/// embedded administrator payload.
pub async fn admin_top_page(world: Arc<World>) -> Result<()> {
    let Some(mut admin) = world.store.checkout_random_admin() else {
        return Ok(());
    };
    let session = world.session_for_admin(&admin);
    login_admin(&session, &mut admin, None).await?;

    let cutoff = World::cutoff();
    let events_before = filter_events_before(&world.store.copied_events(), cutoff);

    let played = session
        .play(&Action::get("/admin/", "the admin page renders"))
        .await?;
    let html = played.text();

    let events = parse_embedded_events(&html, "admin page")?;
    if events.is_empty() || events.len() < events_before.len() {
        warn!(got = events.len(), expected = events_before.len(), "admin page dropped events");
        return Err(BenchError::fatal("wrong number of events on the admin page"));
    }
    oracle::check_sorted_ascending(&events)
        .map_err(|_| BenchError::fatal("wrong event order on the admin page"))?;

    let events_after = world.store.events();
    oracle::check_event_list(world.store.seating(), &events_before, &events, &events_after)
        .map_err(|e| BenchError::fatal(format!("admin page event listing: {e}")))?;

    let Some(raw_admin) = page::wrapper_attribute(&html, "administrator") else {
        return Err(BenchError::fatal("the admin page is missing its administrator payload"));
    };
    let payload: Option<AdminPayload> = serde_json::from_str(&raw_admin)
        .map_err(|e| BenchError::fatal(format!("failed to decode the administrator: {e}")))?;
    let Some(payload) = payload else {
        return Err(BenchError::fatal("the administrator payload is null"));
    };
    check_admin_payload(&admin, &payload)?;

    Ok(())
}

/// Deep user-profile validation through the oracle.
pub async fn my_page(world: Arc<World>) -> Result<()> {
    let Some(mut user) = world.store.checkout_random_user() else {
        return Ok(());
    };
    let session = world.session_for_user(&user);
    login_user(&session, &mut user).await?;

    let cutoff = World::cutoff();
    let events_before = filter_events_before(&world.store.copied_events(), cutoff);

    let played = session
        .play(&Action::get(
            format!("/api/users/{}", user.id),
            "the user page renders",
        ))
        .await?;
    let payload: FullUserPayload = played.json()?;

    let events_after = world.store.events();
    let reservations = world.store.reservations();
    oracle::check_user_profile(
        world.store.seating(),
        &user,
        cutoff,
        &events_before,
        &events_after,
        &reservations,
        &payload,
    )
}

/// Reserve-and-cancel happy path plus the whole grid of invalid-target and
/// unauthenticated rejections.
pub async fn reserve_sheet(world: Arc<World>) -> Result<()> {
    let Some(mut user) = world.store.checkout_random_user() else {
        return Ok(());
    };
    let session = world.session_for_user(&user);
    login_user(&session, &mut user).await?;

    let Some(mut seat) = pop_or_create_seat(&world).await? else {
        return Ok(());
    };
    let event_id = seat.event_id;
    let rank = seat.rank;

    let reservation = match reserve_seat(&world, &session, &mut user, &mut seat).await {
        Ok(r) => r,
        Err(e) => {
            seat.withhold();
            return Err(e);
        }
    };
    cancel_seat(&world, &session, &mut user, &mut seat, &reservation).await?;

    let played = session
        .play(
            &Action::post(
                "/api/events/0/actions/reserve",
                "reserving in an unknown event is rejected",
            )
            .expect(404)
            .json(json!({ "sheet_rank": rank.as_str() })),
        )
        .await?;
    check_error_code(&played, "invalid_event")?;

    let played = session
        .play(
            &Action::post(
                format!("/api/events/{event_id}/actions/reserve"),
                "reserving an unknown rank is rejected",
            )
            .expect(400)
            .json(json!({ "sheet_rank": "N" })),
        )
        .await?;
    check_error_code(&played, "invalid_rank")?;

    let seating = world.store.seating();
    let first_kind = seating.kinds[0];
    let random_num = rand::thread_rng().gen_range(1..=first_kind.total);

    let played = session
        .play(
            &Action::delete(
                format!("/api/events/0/sheets/{rank}/{random_num}/reservation"),
                "canceling in an unknown event is rejected",
            )
            .expect(404),
        )
        .await?;
    check_error_code(&played, "invalid_event")?;

    let played = session
        .play(
            &Action::delete(
                format!("/api/events/{event_id}/sheets/D/{random_num}/reservation"),
                "canceling an unknown rank is rejected",
            )
            .expect(404),
        )
        .await?;
    check_error_code(&played, "invalid_rank")?;

    let unknown_num = 1 + first_kind.total + rand::thread_rng().gen_range(0..first_kind.total);
    let played = session
        .play(
            &Action::delete(
                format!(
                    "/api/events/{event_id}/sheets/{}/{unknown_num}/reservation",
                    first_kind.rank
                ),
                "canceling an unknown seat is rejected",
            )
            .expect(404),
        )
        .await?;
    check_error_code(&played, "invalid_sheet")?;

    let anonymous = world.fresh_session();
    let played = anonymous
        .play(
            &Action::post(
                format!("/api/events/{event_id}/actions/reserve"),
                "reserving while logged out is rejected",
            )
            .expect(401)
            .json(json!({ "sheet_rank": rank.as_str() })),
        )
        .await?;
    check_error_code(&played, "login_required")?;

    let played = anonymous
        .play(
            &Action::delete(
                format!("/api/events/{event_id}/sheets/{rank}/{random_num}/reservation"),
                "canceling while logged out is rejected",
            )
            .expect(401),
        )
        .await?;
    check_error_code(&played, "login_required")?;

    Ok(())
}

/// Administrator authentication paths, including a plain user knocking on
/// the admin door.
pub async fn admin_login(world: Arc<World>) -> Result<()> {
    let Some(mut admin) = world.store.checkout_random_admin() else {
        return Ok(());
    };
    let admin_session = world.session_for_admin(&admin);
    admin_session.reset();
    admin.online = false;

    let Some(user) = world.store.checkout_random_user() else {
        return Ok(());
    };
    let user_session = world.session_for_user(&user);

    let played = user_session
        .play(
            &Action::post(
                "/admin/api/actions/login",
                "a plain user cannot log in as administrator",
            )
            .expect(401)
            .json(json!({
                "login_name": user.login_name,
                "password": user.password,
            })),
        )
        .await?;
    check_error_code(&played, "authentication_failed")?;

    login_admin(&admin_session, &mut admin, None).await?;
    logout_admin(&admin_session, &mut admin).await?;

    let played = admin_session
        .play(
            &Action::post("/admin/api/actions/logout", "logging out twice is rejected")
                .expect(401),
        )
        .await?;
    check_error_code(&played, "admin_login_required")?;

    let played = admin_session
        .play(
            &Action::post("/admin/api/actions/login", "an unknown administrator cannot log in")
                .expect(401)
                .json(json!({
                    "login_name": random_alphabet_string(32),
                    "password": admin.password,
                })),
        )
        .await?;
    check_error_code(&played, "authentication_failed")?;

    let played = admin_session
        .play(
            &Action::post("/admin/api/actions/login", "a wrong admin password is rejected")
                .expect(401)
                .json(json!({
                    "login_name": admin.login_name,
                    "password": random_alphabet_string(32),
                })),
        )
        .await?;
    check_error_code(&played, "authentication_failed")?;

    Ok(())
}

fn check_full_event_payload(
    id: u64,
    title: &str,
    price: u64,
    public: bool,
    payload: &FullEventPayload,
) -> Result<()> {
    if payload.event.id != id
        || payload.event.title != title
        || payload.price != price
        || payload.public != public
    {
        return Err(BenchError::fatal("could not retrieve the correct event"));
    }
    Ok(())
}

/// Event lifecycle: created private, visible to its administrator only,
/// then published and visible to everyone.
pub async fn create_event(world: Arc<World>) -> Result<()> {
    let anonymous = world.fresh_session();

    let Some(mut admin) = world.store.checkout_random_admin() else {
        return Ok(());
    };
    let admin_session = world.session_for_admin(&admin);

    let Some(mut user) = world.store.checkout_random_user() else {
        return Ok(());
    };
    let user_session = world.session_for_user(&user);

    login_admin(&admin_session, &mut admin, None).await?;
    login_user(&user_session, &mut user).await?;

    let mut draft = world.store.new_event_draft();

    let played = user_session
        .play(
            &Action::post("/admin/api/events", "a plain user cannot create events")
                .expect(401)
                .json(json!({
                    "title": draft.title,
                    "public": draft.public,
                    "price": draft.price,
                })),
        )
        .await?;
    check_error_code(&played, "admin_login_required")?;

    // Created unpublished first.
    draft.public = false;
    let title = draft.title.clone();
    let price = draft.price;

    let id = create_event_remote(&admin_session, &draft).await?;
    let event = world.store.publish_event(draft, id, Some(chrono::Utc::now()));

    let played = anonymous
        .play(
            &Action::get(
                format!("/api/events/{id}"),
                "an unpublished event is hidden",
            )
            .expect(404),
        )
        .await?;
    check_error_code(&played, "not_found")?;

    let played = user_session
        .play(
            &Action::get(
                format!("/admin/api/events/{id}"),
                "a plain user cannot use the admin event api",
            )
            .expect(401),
        )
        .await?;
    check_error_code(&played, "admin_login_required")?;

    let played = admin_session
        .play(&Action::get(
            format!("/admin/api/events/{id}"),
            "an administrator sees the unpublished event",
        ))
        .await?;
    check_full_event_payload(id, &title, price, false, &played.json()?)?;

    let played = user_session
        .play(
            &Action::post(
                format!("/admin/api/events/{id}/actions/edit"),
                "a plain user cannot edit events",
            )
            .expect(401)
            .json(json!({ "public": false, "closed": false })),
        )
        .await?;
    check_error_code(&played, "admin_login_required")?;

    // Publish it.
    let played = admin_session
        .play(
            &Action::post(
                format!("/admin/api/events/{id}/actions/edit"),
                "an administrator can publish the event",
            )
            .json(json!({ "public": true, "closed": false })),
        )
        .await?;
    check_full_event_payload(id, &title, price, true, &played.json()?)?;
    event.set_public(true);

    let played = anonymous
        .play(&Action::get(
            format!("/api/events/{id}"),
            "a published event is visible",
        ))
        .await?;
    let payload: EventPayload = played.json()?;
    oracle::check_event_detail(world.store.seating(), id, &title, &payload)?;

    let played = admin_session
        .play(&Action::get(
            format!("/admin/api/events/{id}"),
            "an administrator sees the published event",
        ))
        .await?;
    check_full_event_payload(id, &title, price, true, &played.json()?)?;

    let missing = id + 1;
    let played = admin_session
        .play(
            &Action::get(
                format!("/admin/api/events/{missing}"),
                "an unknown event id is rejected on the admin api",
            )
            .expect(404),
        )
        .await?;
    check_error_code(&played, "not_found")?;

    let played = admin_session
        .play(
            &Action::get(
                format!("/api/events/{missing}"),
                "an unknown event id is rejected",
            )
            .expect(404),
        )
        .await?;
    check_error_code(&played, "not_found")?;

    let played = admin_session
        .play(
            &Action::post(
                format!("/admin/api/events/{missing}/actions/edit"),
                "editing an unknown event is rejected",
            )
            .expect(404)
            .json(json!({ "public": true, "closed": false })),
        )
        .await?;
    check_error_code(&played, "not_found")?;

    Ok(())
}

/// Deep single-event validation anchored on the user's own last reservation
/// when it is old enough to be settled.
pub async fn get_event(world: Arc<World>) -> Result<()> {
    let cutoff = World::cutoff();

    let Some(mut user) = world.store.checkout_random_user() else {
        return Ok(());
    };
    let session = world.session_for_user(&user);

    let mut reservation: Option<Arc<Reservation>> = None;
    let rid = user.status.last_reservation.get_before(cutoff);
    if rid != 0 {
        if let Some(r) = world.store.find_reservation(rid) {
            if !r.maybe_canceled_before(cutoff) {
                reservation = Some(r);
            }
        }
    }

    let before_event: Option<EventSnapshot> = match &reservation {
        None => world.store.random_public_event().map(|e| e.snapshot()),
        Some(r) => world
            .store
            .find_event(r.event_id)
            .map(|e| e.snapshot())
            .filter(|s| s.public),
    };
    let Some(before_event) = before_event else {
        return Ok(());
    };

    let auth_choice = rand::thread_rng().gen_range(0..3);
    match auth_choice {
        0 => login_user(&session, &mut user).await?,
        1 => logout_user(&session, &mut user).await?,
        _ => {}
    }

    let played = session
        .play(&Action::get(
            format!("/api/events/{}", before_event.id),
            "a public event can be retrieved",
        ))
        .await?;
    let payload: EventPayload = played.json()?;

    oracle::check_event_detail(
        world.store.seating(),
        before_event.id,
        &before_event.title,
        &payload,
    )?;

    let after: Vec<_> = world.store.find_event(before_event.id).into_iter().collect();
    oracle::check_event_list(
        world.store.seating(),
        std::slice::from_ref(&before_event),
        std::slice::from_ref(&payload),
        &after,
    )?;

    if let Some(r) = &reservation {
        oracle::check_reserved_seat_detail(&payload, r, user.status.online)?;
    }

    Ok(())
}

/// Cancel a seat of a sold-out event and immediately resell it with another
/// user. Runs exclusively against the sold-out poll so the sold-out state
/// stays observable.
pub async fn cancel_resale(world: Arc<World>) -> Result<()> {
    let _exclusive = world.soldout_gate.write().await;

    let Some(event) = world.store.random_public_sold_out_event() else {
        warn!("no public sold-out event to cancel from");
        return Ok(());
    };
    let Some(reservation) = world.store.random_active_reservation_for_event(event.id) else {
        warn!(event_id = event.id, "no live reservation to cancel");
        return Ok(());
    };

    let Some(mut cancel_user) = world.store.checkout_user_by_id(reservation.user_id) else {
        return Ok(());
    };
    let cancel_session = world.session_for_user(&cancel_user);
    login_user(&cancel_session, &mut cancel_user).await?;

    let Some(mut reserve_user) = world.store.checkout_random_user() else {
        return Ok(());
    };
    let reserve_session = world.session_for_user(&reserve_user);
    login_user(&reserve_session, &mut reserve_user).await?;

    // A synthetic capacity token: the reserved pool keeps its own token for
    // this seat, so this one never enters any pool.
    let rank = reservation.rank;
    let mut seat = SeatToken {
        event_id: event.id,
        rank,
        num: NO_SEAT,
        price: event.price + world.store.seating().kind(rank).price,
    };

    let already_locked = cancel_seat(
        &world,
        &cancel_session,
        &mut cancel_user,
        &mut seat,
        &reservation,
    )
    .await?;
    if already_locked {
        return Ok(());
    }

    reserve_seat(&world, &reserve_session, &mut reserve_user, &mut seat).await?;
    Ok(())
}

/// Forced periodically by the scheduler on top of random selection.
pub async fn event_report(world: Arc<World>) -> Result<()> {
    let Some(mut admin) = world.store.checkout_random_admin() else {
        return Ok(());
    };
    let session = world.session_for_admin(&admin);
    login_admin(&session, &mut admin, None).await?;

    // The target locks reservation rows while it cancels, not while it
    // reserves; public events are where that contention lives.
    let Some(event) = world.store.random_public_event() else {
        return Ok(());
    };

    let cutoff = World::cutoff();
    let before = filter_reservations_before(
        &world.store.copied_reservations_for_event(event.id),
        cutoff,
    );

    let played = session
        .play(&Action::get(
            format!("/admin/api/reports/events/{}/sales", event.id),
            "the event report reconciles",
        ))
        .await?;
    let requested_after = event.counters().reserve_requested;

    let records = parse_sales_report(&played.body)?;
    oracle::check_report_event_scope(event.id, &records)?;

    let events_by_id: HashMap<u64, _> =
        world.store.events().into_iter().map(|e| (e.id, e)).collect();
    oracle::check_report_records(world.store.seating(), &records, cutoff, &before, &events_by_id)?;
    oracle::check_report_count(before.len(), records.len(), requested_after)
}

/// The authoritative full-report reconciliation, run post-test.
pub async fn report(world: Arc<World>) -> Result<()> {
    let Some(mut admin) = world.store.checkout_random_admin() else {
        return Ok(());
    };
    let session = world.session_for_admin(&admin);
    login_admin(&session, &mut admin, Some(params::POST_TEST_LOGIN_TIMEOUT)).await?;

    let cutoff = World::cutoff();
    let before = filter_reservations_before(&world.store.copied_reservations(), cutoff);

    let played = session
        .play(
            &Action::get("/admin/api/reports/sales", "the sales report reconciles")
                .timeout(params::POST_TEST_REPORT_TIMEOUT),
        )
        .await?;
    let requested_after = world.store.reserve_requested_count();

    let records = parse_sales_report(&played.body)?;
    let events_by_id: HashMap<u64, _> =
        world.store.events().into_iter().map(|e| (e.id, e)).collect();
    oracle::check_report_records(world.store.seating(), &records, cutoff, &before, &events_by_id)?;
    oracle::check_report_count(before.len(), records.len(), requested_after)
}

/// Seat assignment within a rank must look random, not sequential.
pub async fn seat_entropy(world: Arc<World>) -> Result<()> {
    let mut seen = std::collections::HashSet::new();
    let mut candidate = None;

    // A mid-sized sample separates signal from noise; retry a few times for
    // one, then settle for whatever the last draw produced.
    for _ in 0..5 {
        let Some(event) = world.store.random_public_event() else {
            return Ok(());
        };
        if !seen.insert(event.id) {
            continue;
        }
        let source: Vec<Reservation> = world
            .store
            .copied_reservations_for_event(event.id)
            .into_values()
            .collect();
        let suitable = 10 < source.len() && source.len() < 600;
        candidate = Some((event, source));
        if suitable {
            break;
        }
    }

    let Some((event, source)) = candidate else {
        return Ok(());
    };
    let now = chrono::Utc::now();
    let scores = oracle::seat_entropy_scores(source.iter(), now);
    debug!(event_id = event.id, ?scores, "seat entropy");
    oracle::check_seat_entropy(event.id, &scores)
}
