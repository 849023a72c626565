//! # headlens-core
//!
//! Read-side aggregation for a headscale control server.
//!
//! Given a [`HeadscaleApi`](headlens_api::HeadscaleApi) implementation this
//! crate builds the view models a dashboard needs:
//!
//! - **Machine views**: one card per machine with routes, exit-node state,
//!   relative timestamps and a status colour
//! - **Key tables**: each user's pre-auth keys with usability and expiry
//! - **Overview**: server-wide machine, user, route and key counters
//!
//! Detail passes fan out one task per entity over a bounded worker pool.
//! The output always has one [`Slot`] per input entity, in input order; a
//! failed entity degrades its own slot and nothing else.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use headlens_api::HttpClient;
//! use headlens_core::{Aggregator, AggregatorConfig, Slot};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let api = HttpClient::new("https://headscale.example.com", "hskey-abc")?;
//! let aggregator = Aggregator::new(Arc::new(api), AggregatorConfig::default());
//!
//! for slot in aggregator.machine_views().await? {
//!     match slot {
//!         Slot::Ready(view) => println!("{} exit={}", view.given_name, view.exit_node),
//!         Slot::Unavailable(failure) => println!("{}: data unavailable", failure.label),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod derive;
pub mod error;
pub mod orchestrator;
pub mod overview;
pub mod palette;
pub mod pool;
pub mod slot;
pub mod task;
pub mod time;
pub mod view;

pub use config::{AggregatorConfig, ConcurrencyPolicy, DEFAULT_MAX_WORKERS, DEFAULT_TASK_TIMEOUT};
pub use derive::{compute_key_row, compute_machine_view};
pub use error::{AggregateError, AggregateResult, DataError, EnrichError, FailureKind};
pub use orchestrator::Aggregator;
pub use overview::OverviewCounts;
pub use pool::WorkerPool;
pub use slot::{EntityFailure, Slot, UNAVAILABLE};
pub use time::{PassClock, resolve_expiry_display};
pub use view::{MachineView, PreAuthKeyRow, RouteView, TimeField, UserKeys};
