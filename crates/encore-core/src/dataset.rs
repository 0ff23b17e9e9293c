//! Fixture population
//!
//! Loads the flat-file fixtures (`user.tsv`, `admin.tsv`, `event.tsv`) and
//! derives the rest of the initial population deterministically: credentials
//! from login names, seat inventory from the fixed rank table, and a
//! reproducible pre-existing reservation history (seeded RNG) for every
//! sold-out fixture event. The generated population must match what the
//! target service loads on `/initialize`, down to the per-event counters.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use chrono::{DateTime, TimeZone, Utc};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::error::{BenchError, Result};
use crate::model::{Administrator, AppUser, Event, Reservation, Seating, Sheet, UserStatus};
use crate::params;

/// Seed of the fixture RNG; fixed so every run boots the same history.
const FIXTURE_SEED: u64 = 42;

/// Reservation history timestamps fall in this window (JST business hours of
/// the service's launch and snapshot days).
const HISTORY_MIN_UNIX: i64 = 1_314_406_800; // 2011-08-27 10:00 +09:00
const HISTORY_MAX_UNIX: i64 = 1_535_331_600; // 2018-08-27 10:00 +09:00

/// The initial population consumed by [`crate::store::Store::new`].
#[derive(Debug)]
pub struct Dataset {
    pub users: Vec<AppUser>,
    pub new_users: Vec<AppUser>,
    pub administrators: Vec<Administrator>,
    pub events: Vec<Event>,
    pub closed_events: Vec<Event>,
    pub seating: Seating,
    pub sheets: Vec<Sheet>,
    pub reservations: Vec<Reservation>,
}

fn reverse(s: &str) -> String {
    s.chars().rev().collect()
}

const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Random ASCII-letter string, for generated titles and bogus credentials.
pub fn random_alphabet_string(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

fn parse_bool(s: &str) -> Result<bool> {
    match s {
        "1" | "true" | "TRUE" | "True" => Ok(true),
        "0" | "false" | "FALSE" | "False" => Ok(false),
        other => Err(BenchError::Internal(format!("invalid boolean {other:?}"))),
    }
}

fn tsv_lines(path: &Path) -> Result<Vec<Vec<String>>> {
    let file = File::open(path)
        .map_err(|e| BenchError::Internal(format!("open {}: {e}", path.display())))?;
    let mut rows = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        rows.push(line.split('\t').map(str::to_string).collect());
    }
    Ok(rows)
}

/// Build the full initial population from the fixture directory.
pub fn load(dir: &Path) -> Result<Dataset> {
    debug!(dir = %dir.display(), "loading fixture dataset");

    let seating = Seating::standard();
    let sheets = build_sheets(&seating);

    let (users, new_users) = load_users(&dir.join("user.tsv"))?;
    let administrators = load_administrators(&dir.join("admin.tsv"))?;
    let mut events = load_events(&dir.join("event.tsv"), &seating)?;
    let mut closed_events = synth_closed_events(&seating, events.len() as u64 + 1);

    let mut dataset = Dataset {
        users,
        new_users,
        administrators,
        events: Vec::new(),
        closed_events: Vec::new(),
        seating,
        sheets,
        reservations: Vec::new(),
    };
    synth_reservations(&mut dataset, &mut events, &mut closed_events);
    dataset.events = events;
    dataset.closed_events = closed_events;

    debug!(
        users = dataset.users.len(),
        new_users = dataset.new_users.len(),
        admins = dataset.administrators.len(),
        events = dataset.events.len(),
        closed_events = dataset.closed_events.len(),
        reservations = dataset.reservations.len(),
        "fixture dataset ready"
    );
    Ok(dataset)
}

fn build_sheets(seating: &Seating) -> Vec<Sheet> {
    let mut sheets = Vec::with_capacity(seating.total as usize);
    let mut next_id = 1;
    for kind in &seating.kinds {
        for num in 1..=kind.total {
            sheets.push(Sheet {
                id: next_id,
                rank: kind.rank,
                num,
                price: kind.price,
            });
            next_id += 1;
        }
    }
    sheets
}

/// `user.tsv`: `nickname\temail`. The first [`params::INITIAL_NUM_USERS`]
/// rows exist on the server already (ids assigned); the rest feed the
/// sign-up pool with ids deferred to the server's response.
fn load_users(path: &Path) -> Result<(Vec<AppUser>, Vec<AppUser>)> {
    let mut users = Vec::new();
    let mut new_users = Vec::new();
    for (i, row) in tsv_lines(path)?.into_iter().enumerate() {
        let [nickname, addr] = row.as_slice() else {
            return Err(BenchError::Internal(format!("malformed user.tsv row {i}")));
        };
        let login_name = addr.split('@').next().unwrap_or(addr).to_string();
        let password = format!("{login_name}{}", reverse(&login_name));
        let user = AppUser {
            id: if i < params::INITIAL_NUM_USERS {
                i as u64 + 1
            } else {
                0
            },
            nickname: nickname.clone(),
            login_name,
            password,
            status: UserStatus::default(),
        };
        if i < params::INITIAL_NUM_USERS {
            users.push(user);
        } else {
            new_users.push(user);
        }
    }
    Ok((users, new_users))
}

/// `admin.tsv`: `nickname\temail`, plus the built-in `admin` account.
fn load_administrators(path: &Path) -> Result<Vec<Administrator>> {
    let mut admins = vec![Administrator {
        id: 1,
        nickname: "admin".into(),
        login_name: "admin".into(),
        password: "admin".into(),
        online: false,
    }];
    for (i, row) in tsv_lines(path)?.into_iter().enumerate() {
        let [nickname, addr] = row.as_slice() else {
            return Err(BenchError::Internal(format!("malformed admin.tsv row {i}")));
        };
        let login_name = addr.split('@').next().unwrap_or(addr).to_string();
        admins.push(Administrator {
            id: i as u64 + 2,
            nickname: nickname.clone(),
            password: format!("admin{login_name}{}", reverse(&login_name)),
            login_name,
            online: false,
        });
    }
    Ok(admins)
}

/// `event.tsv`: `title\tpublic\tclosed\tprice\tremains`. A fixture event is
/// either untouched (`remains == seat total`) or completely sold out
/// (`remains == 0`); anything in between cannot bootstrap the counters.
fn load_events(path: &Path, seating: &Seating) -> Result<Vec<Event>> {
    let mut events = Vec::new();
    for (i, row) in tsv_lines(path)?.into_iter().enumerate() {
        let [title, public, closed, price, remains] = row.as_slice() else {
            return Err(BenchError::Internal(format!("malformed event.tsv row {i}")));
        };
        let price: u64 = price
            .parse()
            .map_err(|_| BenchError::Internal(format!("invalid price in event.tsv row {i}")))?;
        let remains: u32 = remains
            .parse()
            .map_err(|_| BenchError::Internal(format!("invalid remains in event.tsv row {i}")))?;
        assert!(
            remains == 0 || remains == seating.total,
            "fixture event {title:?} must be untouched or sold out, got remains={remains}"
        );

        let event = Event::new(
            i as u64 + 1,
            title.clone(),
            price,
            parse_bool(public)?,
            parse_bool(closed)?,
            None,
        );
        if remains == 0 {
            saturate_reserve_counters(&event, seating);
        }
        events.push(event);
    }
    Ok(events)
}

/// Old events that already ran: sold out, private and closed.
fn synth_closed_events(seating: &Seating, first_id: u64) -> Vec<Event> {
    let count = params::INITIAL_NUM_CLOSED_EVENTS;
    let price_stride = count / 10 + 1;
    (0..count)
        .map(|i| {
            let id = first_id + i as u64;
            let event = Event::new(
                id,
                format!("Event{id:04}"),
                1000 + (i / price_stride) as u64 * 1000,
                false,
                true,
                None,
            );
            saturate_reserve_counters(&event, seating);
            event
        })
        .collect()
}

fn saturate_reserve_counters(event: &Event, seating: &Seating) {
    let mut c = event.counters_mut();
    c.reserve_requested = seating.total;
    c.reserve_completed = seating.total;
    for kind in &seating.kinds {
        for _ in 0..kind.total {
            c.reserve_requested_by_rank.bump(kind.rank);
            c.reserve_completed_by_rank.bump(kind.rank);
        }
    }
}

fn unix(ts: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(ts, 0).single().expect("valid timestamp")
}

/// Populate the reservation history of every sold-out event: one live
/// reservation per seat, preceded by a chain of reserve/cancel pairs walking
/// backwards in time. Cancel chains bump the event's aggregate counters so
/// the boot state reconciles to "remains = 0" exactly.
fn synth_reservations(dataset: &mut Dataset, events: &mut [Event], closed: &mut [Event]) {
    let mut rng = ChaCha8Rng::seed_from_u64(FIXTURE_SEED);
    let seat_total = dataset.seating.total;
    let mut reservations: Vec<Reservation> = Vec::new();

    for event in events.iter().chain(closed.iter()) {
        if !event.is_sold_out(seat_total) {
            continue;
        }
        for sheet in &dataset.sheets {
            let user_id = rng.gen_range(0..dataset.users.len()) as u64 + 1;
            let mut reserved_at = rng.gen_range(HISTORY_MIN_UNIX..HISTORY_MAX_UNIX);

            let mut r = Reservation::new(event.id, user_id, sheet.rank, event.price + sheet.price);
            r.sheet_id = sheet.id;
            r.num = sheet.num;
            r.times_mut().reserve_completed_at = Some(unix(reserved_at));
            reservations.push(r);

            // Walk backwards: each predecessor on this seat was reserved and
            // later canceled, shortly before the next reservation.
            let mut remaining = 30;
            let mut canceled_at = rng.gen_range(HISTORY_MIN_UNIX..reserved_at.max(HISTORY_MIN_UNIX + 1));
            while HISTORY_MIN_UNIX < canceled_at && canceled_at < reserved_at {
                if remaining == 0 {
                    break;
                }
                let span = (canceled_at - HISTORY_MIN_UNIX).min(86_400 * 3);
                if span <= 0 {
                    break;
                }
                reserved_at = canceled_at - rng.gen_range(0..span);

                let user_id = rng.gen_range(0..dataset.users.len()) as u64 + 1;
                let mut r =
                    Reservation::new(event.id, user_id, sheet.rank, event.price + sheet.price);
                r.sheet_id = sheet.id;
                r.num = sheet.num;
                {
                    let mut times = r.times_mut();
                    times.reserve_completed_at = Some(unix(reserved_at));
                    times.cancel_requested_at = Some(unix(canceled_at));
                    times.cancel_completed_at = Some(unix(canceled_at));
                }
                reservations.push(r);
                {
                    let mut c = event.counters_mut();
                    c.reserve_requested += 1;
                    c.reserve_completed += 1;
                    c.cancel_requested += 1;
                    c.cancel_completed += 1;
                }

                if reserved_at == HISTORY_MIN_UNIX {
                    break;
                }
                canceled_at = rng.gen_range(HISTORY_MIN_UNIX..reserved_at);
                remaining -= 1;
            }
        }
    }

    reservations.sort_by_key(|r| r.times().reserve_completed_at);

    for (i, r) in reservations.iter_mut().enumerate() {
        r.id = i as u64 + 1;
        let times = r.times();
        let reserved_at = times.reserve_completed_at.expect("stamped above");
        let canceled = times.cancel_completed_at.is_some();

        let user = &mut dataset.users[r.user_id as usize - 1];
        // The server's total_price sums only live reservations.
        if !canceled {
            user.status.positive_total_price += r.price;
            user.status.negative_total_price += r.price;
        }
        user.status.last_maybe_reserved_event.set_at(r.event_id, reserved_at);
        user.status.last_maybe_reservation.set_at(r.id, reserved_at);
        user.status.last_reserved_event.set_at(r.event_id, reserved_at);
        user.status.last_reservation.set_at(r.id, reserved_at);
    }

    dataset.reservations = reservations;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Rank;
    use std::io::Write;

    fn write_fixture(dir: &Path, name: &str, contents: &str) {
        let mut f = File::create(dir.join(name)).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
    }

    fn fixture_dir(tag: &str, users: usize) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "encore-dataset-{}-{tag}-{users}",
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        let user_rows: String = (0..users)
            .map(|i| format!("user{i}\tu{i}@example.com\n"))
            .collect();
        write_fixture(&dir, "user.tsv", &user_rows);
        write_fixture(&dir, "admin.tsv", "ops\tops@example.com\n");
        write_fixture(
            &dir,
            "event.tsv",
            "open live\t1\t0\t3000\t1000\nsold out live\t1\t0\t5000\t0\n",
        );
        dir
    }

    #[test]
    fn test_load_builds_population() {
        let dir = fixture_dir("population", 8);
        let dataset = load(&dir).unwrap();

        // Small fixture: everyone lands in the fixed pool.
        assert_eq!(dataset.users.len(), 8);
        assert!(dataset.new_users.is_empty());
        assert_eq!(dataset.users[0].id, 1);
        assert_eq!(dataset.users[0].password, "u0u0");

        // Built-in admin plus one from the fixture file.
        assert_eq!(dataset.administrators.len(), 2);
        assert_eq!(dataset.administrators[0].login_name, "admin");
        assert_eq!(dataset.administrators[1].password, "adminopsspo");

        assert_eq!(dataset.seating.total, 1000);
        assert_eq!(dataset.sheets.len(), 1000);
    }

    #[test]
    fn test_sold_out_event_bootstraps_counters_and_history() {
        let dir = fixture_dir("soldout", 10);
        let dataset = load(&dir).unwrap();

        let open = &dataset.events[0];
        let sold_out = &dataset.events[1];
        assert!(!open.is_sold_out(dataset.seating.total));
        assert!(sold_out.is_sold_out(dataset.seating.total));

        let c = sold_out.counters();
        assert!(c.reserve_requested >= dataset.seating.total);
        assert_eq!(c.reserve_requested, c.reserve_completed);
        assert_eq!(c.cancel_requested, c.cancel_completed);
        assert_eq!(
            c.reserve_requested_by_rank.get(Rank::S),
            dataset.seating.kind(Rank::S).total
        );

        // One live reservation per seat plus the cancel chains.
        assert!(dataset.reservations.len() >= dataset.seating.total as usize);
        let live = dataset
            .reservations
            .iter()
            .filter(|r| r.times().cancel_completed_at.is_none())
            .count();
        assert_eq!(live, dataset.seating.total as usize);

        // Ids are assigned in reserved-at order.
        let mut last = None;
        for r in &dataset.reservations {
            let at = r.times().reserve_completed_at;
            assert!(last <= at);
            last = at;
        }
    }

    #[test]
    fn test_generation_is_deterministic() {
        let dir = fixture_dir("deterministic", 12);
        let a = load(&dir).unwrap();
        let b = load(&dir).unwrap();
        assert_eq!(a.reservations.len(), b.reservations.len());
        for (x, y) in a.reservations.iter().zip(&b.reservations) {
            assert_eq!(x.user_id, y.user_id);
            assert_eq!(x.times().reserve_completed_at, y.times().reserve_completed_at);
        }
    }

    #[test]
    fn test_canceled_history_excluded_from_totals() {
        let dir = fixture_dir("totals", 10);
        let dataset = load(&dir).unwrap();
        let live_sum: u64 = dataset
            .reservations
            .iter()
            .filter(|r| r.times().cancel_completed_at.is_none())
            .map(|r| r.price)
            .sum();
        let user_sum: u64 = dataset
            .users
            .iter()
            .map(|u| u.status.negative_total_price)
            .sum();
        assert_eq!(live_sum, user_sum);
    }
}
