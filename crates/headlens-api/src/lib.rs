//! Typed access to the headscale control-server REST API.
//!
//! This crate is the read-only boundary between headlens and a headscale
//! server. It exposes explicit records for machines, routes, users and
//! pre-auth keys, the [`HeadscaleApi`] trait the aggregation core is
//! written against, an HTTP implementation, and an in-memory fake.
//!
//! # Example
//!
//! ```rust,no_run
//! use headlens_api::{HeadscaleApi, HttpClient};
//!
//! # async fn example() -> headlens_api::Result<()> {
//! let client = HttpClient::new("https://headscale.example.com", "hskey-abc")?;
//! let machines = client.get_machines().await?;
//! println!("{} machines registered", machines.len());
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod error;
pub mod fake;
pub mod types;

pub use client::{HeadscaleApi, HttpClient};
pub use error::{ApiError, Result};
pub use fake::FakeHeadscale;
pub use types::{Machine, PreAuthKey, Route, RouteMachine, User};
