//! Final run verdict and scoring

use chrono::{DateTime, Utc};
use serde::Serialize;

use encore_core::counter::{Counters, LOAD_LEVEL_UP, STATIC_304};

use crate::world::World;

/// The structured result handed to the reporting layer.
#[derive(Debug, Clone, Serialize)]
pub struct BenchResult {
    pub pass: bool,
    pub score: i64,
    pub load_level: i64,
    pub message: String,
    pub errors: Vec<String>,
    pub logs: Vec<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_addrs: Option<String>,
}

impl BenchResult {
    pub fn started() -> Self {
        let now = Utc::now();
        Self {
            pass: false,
            score: 0,
            load_level: 0,
            message: String::new(),
            errors: Vec::new(),
            logs: Vec::new(),
            start_time: now,
            end_time: now,
            job_id: None,
            ip_addrs: None,
        }
    }

    /// Stamp the end of the run and collect the error log.
    pub fn finished(mut self, world: &World) -> Self {
        self.end_time = Utc::now();
        self.errors = world.errors.entries();
        self.load_level = world.counters().get(LOAD_LEVEL_UP);
        self
    }

    pub fn failed(mut self, message: String, world: &World) -> Self {
        self.pass = false;
        self.score = 0;
        self.message = message;
        self.finished(world)
    }
}

/// The fixed weighted combination over the request counters. Mutating
/// traffic and the cache-busting pages weigh triple; conditional static
/// hits are nearly free for the target and score accordingly.
pub fn compute_score(counters: &Counters) -> i64 {
    let get = counters.sum_prefix("GET|");
    let post = counters.sum_prefix("POST|");
    let delete = counters.sum_prefix("DELETE|");
    let not_modified = counters.get(STATIC_304);

    // Top-page and single-event fetches.
    let top = counters.get("GET|/") + counters.sum_prefix("GET|/api/events/");
    let reserve = counters.sum_prefix("POST|/api/events/");
    let cancel = counters.sum_prefix("DELETE|/api/events/");

    (get - not_modified - top) + (post - reserve) + 3 * (top + reserve + cancel)
        + not_modified / 100
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_weights() {
        let counters = Counters::new();
        counters.add("GET|/", 10);
        counters.add("GET|/api/users/1", 5);
        counters.add("GET|/api/events/3", 7);
        counters.add("GET|/css/layout.css", 200);
        counters.add(STATIC_304, 150);
        counters.add("POST|/api/actions/login", 4);
        counters.add("POST|/api/events/3/actions/reserve", 6);
        counters.add("DELETE|/api/events/3/sheets/S/1/reservation", 2);

        let get = 10 + 5 + 7 + 200;
        let top = 10 + 7;
        let post = 4 + 6;
        let reserve = 6;
        let cancel = 2;
        let expected = (get - 150 - top) + (post - reserve) + 3 * (top + reserve + cancel) + 150 / 100;
        assert_eq!(compute_score(&counters), expected);
    }

    #[test]
    fn test_admin_event_traffic_is_not_reserve_traffic() {
        let counters = Counters::new();
        counters.add("POST|/admin/api/events/9/actions/edit", 3);
        counters.add("GET|/admin/api/events/9", 2);
        // Plain POST/GET weight, no triple bonus.
        assert_eq!(compute_score(&counters), 5);
    }
}
