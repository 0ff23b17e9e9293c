//! Load scenarios
//!
//! Background traffic with shallow assertions; the deep validation of the
//! same endpoints lives in [`super::check`].

use std::sync::Arc;

use serde_json::json;
use tracing::warn;

use encore_client::Action;
use encore_core::error::{BenchError, Result};
use encore_core::oracle;
use encore_core::params;
use encore_core::wire::{EventPayload, UserPayload};

use super::{
    login_admin, login_user, logout_user, pop_or_create_seat, reserve_seat, cancel_seat,
    spawn_asset_loads,
};
use crate::world::World;

/// Sign up a fresh account and log in with it.
pub async fn create_user(world: Arc<World>) -> Result<()> {
    let Some(mut lease) = world.store.checkout_new_user() else {
        return Ok(());
    };
    let session = world.session_for_user(&lease);
    session.reset();

    let action = Action::post("/api/users", "a new user can sign up")
        .expect(201)
        .json(json!({
            "nickname": lease.nickname,
            "login_name": lease.login_name,
            "password": lease.password,
        }));
    let played = session.play(&action).await?;
    let payload: UserPayload = played.json()?;
    if payload.nickname != lease.nickname {
        warn!(expected = %lease.nickname, got = %payload.nickname, "wrong nickname after sign up");
        return Err(BenchError::fatal("could not retrieve the created user"));
    }
    // The server assigns the id.
    lease.id = payload.id;

    let action = Action::post("/api/actions/login", "a created user can log in").json(json!({
        "login_name": lease.login_name,
        "password": lease.password,
    }));
    session.play(&action).await?;
    lease.status.online = true;

    lease.activate();
    Ok(())
}

/// Session churn: log the user out and back in.
pub async fn login_churn(world: Arc<World>) -> Result<()> {
    let Some(mut user) = world.store.checkout_random_user() else {
        return Ok(());
    };
    let session = world.session_for_user(&user);

    if user.status.online {
        logout_user(&session, &mut user).await?;
    }
    login_user(&session, &mut user).await
}

/// Users hammering reload on the top page while waiting for a new event.
pub async fn top_page(world: Arc<World>) -> Result<()> {
    let Some(user) = world.store.checkout_random_user() else {
        return Ok(());
    };
    let session = world.session_for_user(&user);
    spawn_asset_loads(&world, &session);

    session
        .play(&Action::get("/", "the top page renders"))
        .await?;
    Ok(())
}

pub async fn admin_top_page(world: Arc<World>) -> Result<()> {
    let Some(admin) = world.store.checkout_random_admin() else {
        return Ok(());
    };
    let session = world.session_for_admin(&admin);
    spawn_asset_loads(&world, &session);

    session
        .play(&Action::get("/admin/", "the admin page renders"))
        .await?;
    Ok(())
}

pub async fn my_page(world: Arc<World>) -> Result<()> {
    let Some(mut user) = world.store.checkout_random_user() else {
        return Ok(());
    };
    let session = world.session_for_user(&user);
    login_user(&session, &mut user).await?;

    session
        .play(&Action::get(
            format!("/api/users/{}", user.id),
            "the user page renders",
        ))
        .await?;
    Ok(())
}

pub async fn reserve(world: Arc<World>) -> Result<()> {
    let Some(mut user) = world.store.checkout_random_user() else {
        return Ok(());
    };
    let session = world.session_for_user(&user);
    login_user(&session, &mut user).await?;

    let Some(mut seat) = pop_or_create_seat(&world).await? else {
        return Ok(());
    };
    match reserve_seat(&world, &session, &mut user, &mut seat).await {
        Ok(_) => Ok(()),
        Err(e) => {
            seat.withhold();
            Err(e)
        }
    }
}

/// Seats are assigned randomly within a rank, so some users reserve and
/// cancel repeatedly fishing for a better seat.
pub async fn reserve_cancel(world: Arc<World>) -> Result<()> {
    let Some(mut user) = world.store.checkout_random_user() else {
        return Ok(());
    };
    let session = world.session_for_user(&user);
    login_user(&session, &mut user).await?;

    let Some(mut seat) = pop_or_create_seat(&world).await? else {
        return Ok(());
    };
    let reservation = match reserve_seat(&world, &session, &mut user, &mut seat).await {
        Ok(r) => r,
        Err(e) => {
            seat.withhold();
            return Err(e);
        }
    };

    cancel_seat(&world, &session, &mut user, &mut seat, &reservation).await?;
    Ok(())
}

/// Users hammering reload on a sold-out event, waiting for a cancellation.
/// Shares a gate with the cancel-and-resell validation, which must observe
/// the sold-out state exclusively.
pub async fn sold_out_poll(world: Arc<World>) -> Result<()> {
    let _shared = world.soldout_gate.read().await;

    let Some(event) = world.store.random_public_sold_out_event() else {
        warn!("no public sold-out event to poll");
        return Ok(());
    };
    let Some(mut user) = world.store.checkout_random_user() else {
        return Ok(());
    };
    let session = world.session_for_user(&user);
    login_user(&session, &mut user).await?;

    let played = session
        .play(&Action::get(
            format!("/api/events/{}", event.id),
            "a public event can be retrieved",
        ))
        .await?;
    let payload: EventPayload = played.json()?;
    oracle::check_event_detail(world.store.seating(), event.id, &event.title, &payload)
}

/// Keep the expensive full report warm; reconciliation happens post-test.
pub async fn report(world: Arc<World>) -> Result<()> {
    let Some(mut admin) = world.store.checkout_random_admin() else {
        return Ok(());
    };
    let session = world.session_for_admin(&admin);
    login_admin(&session, &mut admin, Some(params::POST_TEST_LOGIN_TIMEOUT)).await?;

    session
        .play(
            &Action::get("/admin/api/reports/sales", "the sales report renders")
                .timeout(params::POST_TEST_REPORT_TIMEOUT),
        )
        .await?;
    Ok(())
}

/// Touch a per-event report so the target keeps locking reservation rows.
pub async fn event_report(world: Arc<World>) -> Result<()> {
    let Some(mut admin) = world.store.checkout_random_admin() else {
        return Ok(());
    };
    let session = world.session_for_admin(&admin);
    login_admin(&session, &mut admin, None).await?;

    // Closed events see no reserve/cancel traffic; skip them.
    let Some(event) = world.store.random_public_event() else {
        return Ok(());
    };
    session
        .play(&Action::get(
            format!("/admin/api/reports/events/{}/sales", event.id),
            "the event report renders",
        ))
        .await?;
    Ok(())
}
