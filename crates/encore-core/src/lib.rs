//! # Encore Core
//!
//! The shadow-model core of the Encore benchmarker: a private, concurrency-safe
//! model of what the ticket-reservation service under test *should* contain,
//! plus the bookkeeping that lets response validation tolerate in-flight races.
//!
//! - [`store`] — pooled entities (users, administrators, seat capacity,
//!   reservations) checked out exclusively by scenarios via RAII leases, and
//!   the begin/commit transaction log around every mutating request.
//! - [`oracle`] — pure validation predicates: race-tolerant bound checks,
//!   listing/ordering checks, user-recency checks, report reconciliation and
//!   the seat-assignment entropy audit.
//! - [`dataset`] — the fixture population loaded at start-up.
//! - [`report`] — the sales-report CSV contract.
//!
//! The core performs no HTTP itself; scenarios drive it through leases and
//! feed server responses back into the oracle.

pub mod counter;
pub mod dataset;
pub mod error;
pub mod model;
pub mod oracle;
pub mod params;
pub mod report;
pub mod store;
pub mod wire;

pub use error::{BenchError, Result};
pub use store::Store;
