//! Shared run state handed to every scenario
//!
//! Bundles the shadow store with the per-account HTTP sessions, the request
//! counters, failure telemetry and the run's cancellation token. Sessions
//! are keyed by login name and live for the whole run, so an account keeps
//! its cookies across checkouts exactly like one browser would.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::error;

use encore_client::{ClientConfig, ErrorLog, Session, Telemetry};
use encore_core::counter::Counters;
use encore_core::error::BenchError;
use encore_core::model::{Administrator, AppUser};
use encore_core::params;
use encore_core::store::Store;

pub struct World {
    pub store: Arc<Store>,
    pub config: ClientConfig,
    pub errors: Arc<ErrorLog>,
    /// Cancelled at the run deadline or on the first fatal error.
    pub cancel: CancellationToken,
    /// Readers: the sold-out poll scenario. Writer: the cancel-and-resell
    /// validation, which must observe the sold-out state exclusively.
    pub soldout_gate: tokio::sync::RwLock<()>,
    abort: Mutex<Option<String>>,
    sessions: Mutex<HashMap<String, Arc<Session>>>,
}

impl World {
    pub fn new(store: Arc<Store>, targets: Vec<String>, debug: bool) -> Arc<Self> {
        let config = ClientConfig {
            targets,
            counters: Arc::new(Counters::new()),
            telemetry: Arc::new(Telemetry::new()),
            debug,
        };
        Arc::new(Self {
            store,
            config,
            errors: Arc::new(ErrorLog::new()),
            cancel: CancellationToken::new(),
            soldout_gate: tokio::sync::RwLock::new(()),
            abort: Mutex::new(None),
            sessions: Mutex::new(HashMap::new()),
        })
    }

    pub fn counters(&self) -> &Arc<Counters> {
        &self.config.counters
    }

    pub fn telemetry(&self) -> &Arc<Telemetry> {
        &self.config.telemetry
    }

    pub fn session_for_user(&self, user: &AppUser) -> Arc<Session> {
        self.session(
            format!("user:{}", user.login_name),
            ("X-User-Login-Name", user.login_name.clone()),
        )
    }

    pub fn session_for_admin(&self, admin: &Administrator) -> Arc<Session> {
        self.session(
            format!("admin:{}", admin.login_name),
            ("X-Admin-Login-Name", admin.login_name.clone()),
        )
    }

    /// An anonymous session with no cookies, for logged-out assertions.
    pub fn fresh_session(&self) -> Session {
        Session::new(&self.config, None)
    }

    fn session(&self, key: String, debug_header: (&'static str, String)) -> Arc<Session> {
        Arc::clone(
            self.sessions
                .lock()
                .entry(key)
                .or_insert_with(|| Arc::new(Session::new(&self.config, Some(debug_header)))),
        )
    }

    /// Fold one scenario failure into the run: log it, stamp the level-up
    /// gate, and on a fatal finding stop the whole benchmark.
    pub fn record_failure(&self, err: &BenchError) {
        self.errors.record(err.to_string());
        self.config.telemetry.record_error(err.to_string());
        if err.is_fatal() {
            error!(%err, "fatal defect, aborting the run");
            let mut abort = self.abort.lock();
            if abort.is_none() {
                *abort = Some(err.to_string());
            }
            self.cancel.cancel();
        }
    }

    /// The first fatal message, when the run was aborted by one.
    pub fn abort_message(&self) -> Option<String> {
        self.abort.lock().clone()
    }

    /// The "as of" cutoff used by validation scenarios: strictly before the
    /// request, with the allowable delay subtracted.
    pub fn cutoff() -> DateTime<Utc> {
        Utc::now()
            - chrono::Duration::from_std(params::ALLOWABLE_DELAY)
                .expect("allowable delay fits chrono")
    }
}
