//! Benchmarker tuning knobs.
//!
//! Values mirror what the reference deployment of the target can sustain;
//! change them together with the fixture population, not in isolation.

use std::time::Duration;

/// Size of the fixed user pool; the rest of `user.tsv` feeds the sign-up pool.
pub const INITIAL_NUM_USERS: usize = 1000;

/// Synthetic sold-out, closed events generated in addition to `event.tsv`.
pub const INITIAL_NUM_CLOSED_EVENTS: usize = 0;

pub const GET_TIMEOUT: Duration = Duration::from_secs(10);
pub const POST_TIMEOUT: Duration = Duration::from_secs(3);
pub const INITIALIZE_TIMEOUT: Duration = Duration::from_secs(10);

/// Responses slower than this hold the load level flat for a while.
pub const SLOW_THRESHOLD: Duration = Duration::from_millis(1000);

/// The post-test report is allowed to be expensive.
pub const POST_TEST_LOGIN_TIMEOUT: Duration = Duration::from_secs(20);
pub const POST_TEST_REPORT_TIMEOUT: Duration = Duration::from_secs(60);

pub const INITIAL_LOAD_TASKS: usize = 5;
pub const LEVEL_UP_RATIO: f64 = 1.5;
pub const LEVEL_UP_INTERVAL: Duration = Duration::from_secs(1);

/// A fatal error or slow response within this window blocks the next level-up.
pub const LEVEL_UP_QUIET_WINDOW: Duration = Duration::from_secs(5);

/// Interval of the forced per-event sales-report validation.
pub const REPORT_TICK_INTERVAL: Duration = Duration::from_secs(5);

/// Grace subtracted from "now" before comparing shadow state to server state.
pub const ALLOWABLE_DELAY: Duration = Duration::from_secs(1);

/// Penalty sleep after a failed load iteration.
pub const WAIT_ON_ERROR: Duration = Duration::from_millis(500);

/// Penalty sleep after a tolerated (non-fatal) check failure.
pub const CHECK_PENALTY_WAIT: Duration = Duration::from_millis(500);

/// Upper bound of the random startup delay of newly spawned load tasks.
pub const SPAWN_STAGGER_MAX: Duration = Duration::from_millis(500);

/// Delay between the run deadline and reading final state, so that
/// near-deadline requests can land.
pub const DRAIN_GRACE: Duration = Duration::from_secs(1);
