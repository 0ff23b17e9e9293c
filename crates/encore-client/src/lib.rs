//! # Encore Client
//!
//! The HTTP execution engine behind the benchmarker's scenarios. The core
//! consumes it through a narrow contract: describe one action ([`Action`]),
//! play it through a cookie-scoped [`Session`], and get back either the
//! response or a typed error (fatal / unexpected / timeout). Everything else
//! — cookie jars, conditional-request caching for static assets, slow-path
//! telemetry, the run-wide error log — stays behind that boundary.

pub mod action;
pub mod cache;
pub mod session;
pub mod telemetry;

pub use action::{Action, Method, Played};
pub use session::{ClientConfig, Session};
pub use telemetry::{ErrorLog, Telemetry};
