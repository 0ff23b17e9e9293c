//! Load scheduler
//!
//! Drives a run through its phases: warm up the target (`/initialize`),
//! preflight every check scenario once, then generate ramping load while a
//! sequential check loop and forced report tickers validate continuously.
//! At the deadline the run drains, the error log freezes, and the post-test
//! reconciliation decides the final verdict.
//!
//! Two independent scheduling loops share the same resource pools: the
//! weighted load tasks, and the one-at-a-time check loop. They coordinate
//! only through the store's locks.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rand::seq::SliceRandom;
use rand::Rng;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use encore_core::counter;
use encore_core::params;

use crate::result::{compute_score, BenchResult};
use crate::scenario::{self, Scenario};
use crate::world::World;

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub duration: Duration,
    /// Stop after preflight; used to smoke-test a deployment.
    pub pretest_only: bool,
    /// Keep the load level flat for the whole run.
    pub no_level_up: bool,
}

/// Why the load level did or did not rise on a tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LevelDecision {
    Up,
    HeldByError(String),
    HeldBySlowPath(String),
}

pub(crate) fn level_decision(world: &World) -> LevelDecision {
    if let Some(err) = world.telemetry().recent_error(params::LEVEL_UP_QUIET_WINDOW) {
        LevelDecision::HeldByError(err)
    } else if let Some(path) = world.telemetry().recent_slow(params::LEVEL_UP_QUIET_WINDOW) {
        LevelDecision::HeldBySlowPath(path)
    } else {
        LevelDecision::Up
    }
}

pub struct Runner {
    world: Arc<World>,
    opts: RunOptions,
    load_log: Mutex<Vec<String>>,
}

impl Runner {
    pub fn new(world: Arc<World>, opts: RunOptions) -> Self {
        Self { world, opts, load_log: Mutex::new(Vec::new()) }
    }

    pub async fn run(&self) -> BenchResult {
        let mut result = BenchResult::started();

        info!("warming up the target");
        if let Err(e) = self.initialize_target().await {
            return result.failed(format!("the request to /initialize failed: {e}"), &self.world);
        }

        info!("preflight validation");
        if let Err(e) = self.preflight().await {
            return result.failed(
                format!("validation before the load phase failed: {e}"),
                &self.world,
            );
        }
        if self.opts.pretest_only {
            result.pass = true;
            result.message = "pretest passed".into();
            return result.finished(&self.world);
        }

        info!(duration = ?self.opts.duration, "load phase");
        let check_handle = tokio::spawn(check_loop(Arc::clone(&self.world)));
        let ticker_handle = tokio::spawn(report_ticker(Arc::clone(&self.world)));

        self.spawn_load_tasks(params::INITIAL_LOAD_TASKS);
        self.level_loop().await;

        // Drain: let near-deadline requests land, then stop collecting.
        tokio::time::sleep(params::DRAIN_GRACE).await;
        self.world.errors.freeze();
        check_handle.abort();
        ticker_handle.abort();
        result.logs = self.load_log();

        if let Some(message) = self.world.abort_message() {
            return result.failed(
                format!("validation during the load phase failed: {message}"),
                &self.world,
            );
        }

        info!("post-test validation");
        for scenario in scenario::post_test_scenarios() {
            if let Err(e) = (scenario.run)(Arc::clone(&self.world)).await {
                self.world.record_failure(&e);
                return result.failed(
                    format!("validation after the load phase failed: {e}"),
                    &self.world,
                );
            }
        }

        self.log_counter_summary();

        result.pass = true;
        result.score = compute_score(self.world.counters());
        result.message = "ok".into();
        result.finished(&self.world)
    }

    /// Ask the target to reset itself; outside the scored counters.
    async fn initialize_target(&self) -> Result<(), String> {
        let host = self
            .world
            .config
            .targets
            .first()
            .ok_or_else(|| "no target host".to_string())?;
        let client = reqwest::Client::builder()
            .timeout(params::INITIALIZE_TIMEOUT)
            .build()
            .map_err(|e| e.to_string())?;
        let response = client
            .get(format!("http://{host}/initialize"))
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if !response.status().is_success() {
            return Err(format!("unexpected status code {}", response.status().as_u16()));
        }
        Ok(())
    }

    /// Every check scenario once, sequentially. A fatal result here aborts
    /// before any load is generated.
    async fn preflight(&self) -> encore_core::Result<()> {
        for scenario in scenario::check_scenarios() {
            debug!(name = scenario.name, "preflight");
            if let Err(e) = (scenario.run)(Arc::clone(&self.world)).await {
                self.world.record_failure(&e);
                return Err(e);
            }
        }
        Ok(())
    }

    fn spawn_load_tasks(&self, n: usize) {
        let scenarios = Arc::new(scenario::load_scenarios());
        for _ in 0..n {
            let world = Arc::clone(&self.world);
            let scenarios = Arc::clone(&scenarios);
            let stagger_ms = rand::thread_rng()
                .gen_range(0..params::SPAWN_STAGGER_MAX.as_millis() as u64);
            let stagger = Duration::from_millis(stagger_ms);
            tokio::spawn(load_loop(world, scenarios, stagger));
        }
    }

    /// The ramping controller: one decision per interval until the deadline
    /// or a fatal abort.
    async fn level_loop(&self) {
        let mut current = params::INITIAL_LOAD_TASKS;
        let deadline = tokio::time::sleep_until(Instant::now() + self.opts.duration);
        tokio::pin!(deadline);
        let mut ticker = tokio::time::interval_at(
            Instant::now() + params::LEVEL_UP_INTERVAL,
            params::LEVEL_UP_INTERVAL,
        );
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.world.cancel.cancelled() => break,
                _ = &mut deadline => {
                    self.world.cancel.cancel();
                    break;
                }
                _ = ticker.tick() => {
                    if self.opts.no_level_up {
                        continue;
                    }
                    let now = chrono::Utc::now().format("%m/%d %H:%M:%S");
                    match level_decision(&self.world) {
                        LevelDecision::Up => {
                            let next = ((current as f64 * params::LEVEL_UP_RATIO) as usize)
                                .max(current + 1);
                            info!(from = current, to = next, "raising the load level");
                            self.spawn_load_tasks(next - current);
                            current = next;
                            self.world.counters().inc(counter::LOAD_LEVEL_UP);
                            self.load_log.lock().push(format!("{now} the load level rose"));
                        }
                        LevelDecision::HeldByError(err) => {
                            info!(%err, "load level held: recent error");
                            self.load_log.lock().push(format!(
                                "{now} the load level was held back by an error: {err}"
                            ));
                        }
                        LevelDecision::HeldBySlowPath(path) => {
                            info!(%path, "load level held: slow response");
                            self.load_log.lock().push(format!(
                                "{now} the load level was held back by a slow response: {path}"
                            ));
                        }
                    }
                }
            }
        }
    }

    pub(crate) fn load_log(&self) -> Vec<String> {
        self.load_log.lock().clone()
    }

    fn log_counter_summary(&self) {
        info!("----- request counts -----");
        for (key, count) in self.world.counters().snapshot() {
            info!("{key} {count}");
        }
        info!("--------------------------");
    }
}

/// One looping load task: pick a weighted scenario, run it, penalize errors
/// with a short sleep so a misbehaving target cannot inflate the score.
async fn load_loop(
    world: Arc<World>,
    scenarios: Arc<Vec<(u32, Scenario)>>,
    stagger: Duration,
) {
    tokio::time::sleep(stagger).await;

    // Expand weights once; selection is then a single index draw.
    let lookup: Vec<usize> = scenarios
        .iter()
        .enumerate()
        .flat_map(|(i, (weight, _))| std::iter::repeat(i).take(*weight as usize))
        .collect();

    loop {
        if world.cancel.is_cancelled() {
            return;
        }
        let pick = lookup[rand::thread_rng().gen_range(0..lookup.len())];
        let scenario = &scenarios[pick].1;
        match (scenario.run)(Arc::clone(&world)).await {
            Ok(()) => {}
            Err(e) => {
                debug!(name = scenario.name, %e, "load scenario failed");
                world.record_failure(&e);
                tokio::time::sleep(params::WAIT_ON_ERROR).await;
            }
        }
    }
}

/// The sequential validation loop: a fresh random permutation of every
/// check scenario per pass, never two at once. Non-fatal failures cost a
/// penalty sleep; fatal ones abort via [`World::record_failure`].
async fn check_loop(world: Arc<World>) {
    let checks = scenario::check_scenarios();
    loop {
        if world.cancel.is_cancelled() {
            return;
        }
        let mut order: Vec<usize> = (0..checks.len()).collect();
        order.shuffle(&mut rand::thread_rng());

        for i in order {
            if world.cancel.is_cancelled() {
                return;
            }
            let scenario = &checks[i];
            let started = std::time::Instant::now();
            let outcome = (scenario.run)(Arc::clone(&world)).await;
            debug!(name = scenario.name, elapsed = ?started.elapsed(), "check done");

            if let Err(e) = outcome {
                let fatal = e.is_fatal();
                warn!(name = scenario.name, %e, "check scenario failed");
                world.record_failure(&e);
                if fatal {
                    return;
                }
                tokio::time::sleep(params::CHECK_PENALTY_WAIT).await;
            }
        }
    }
}

/// Force the expensive per-event report validation on a fixed cadence
/// instead of leaving it to random selection.
async fn report_ticker(world: Arc<World>) {
    let mut ticker = tokio::time::interval_at(
        tokio::time::Instant::now() + params::REPORT_TICK_INTERVAL,
        params::REPORT_TICK_INTERVAL,
    );
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = world.cancel.cancelled() => return,
            _ = ticker.tick() => {
                if let Err(e) = scenario::check::event_report(Arc::clone(&world)).await {
                    world.record_failure(&e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use encore_core::dataset::Dataset;
    use encore_core::model::{Administrator, AppUser, Event, Rank, Seating, SheetKind};
    use encore_core::store::Store;

    fn test_world() -> Arc<World> {
        let seating = Seating {
            kinds: vec![SheetKind { rank: Rank::S, total: 1, price: 0 }],
            total: 1,
        };
        let dataset = Dataset {
            users: vec![AppUser {
                id: 1,
                nickname: "u".into(),
                login_name: "u".into(),
                password: "u".into(),
                status: Default::default(),
            }],
            new_users: vec![],
            administrators: vec![Administrator {
                id: 1,
                nickname: "a".into(),
                login_name: "a".into(),
                password: "a".into(),
                online: false,
            }],
            events: vec![Event::new(1, "live".into(), 1000, true, false, None)],
            closed_events: vec![],
            seating,
            sheets: vec![],
            reservations: vec![],
        };
        World::new(Store::new(dataset), vec!["localhost:8080".into()], false)
    }

    #[test]
    fn test_level_decision_gates() {
        let world = test_world();
        assert_eq!(level_decision(&world), LevelDecision::Up);

        world.telemetry().record_slow("/api/events/1");
        assert!(matches!(level_decision(&world), LevelDecision::HeldBySlowPath(_)));

        // A recent error outranks a slow path.
        world.telemetry().record_error("unexpected status");
        assert!(matches!(level_decision(&world), LevelDecision::HeldByError(_)));
    }

    #[test]
    fn test_fatal_failure_aborts_the_run() {
        let world = test_world();
        assert!(world.abort_message().is_none());
        assert!(!world.cancel.is_cancelled());

        world.record_failure(&encore_core::BenchError::fatal("remains out of range"));
        assert!(world.cancel.is_cancelled());
        assert_eq!(world.abort_message().unwrap(), "remains out of range");

        // Later fatals do not overwrite the first message.
        world.record_failure(&encore_core::BenchError::fatal("second"));
        assert_eq!(world.abort_message().unwrap(), "remains out of range");
    }
}
