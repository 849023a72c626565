//! In-memory headscale for tests.
//!
//! `FakeHeadscale` serves a fixed snapshot and can be told to delay or
//! fail (or panic inside) individual per-entity calls, which is how ordering, timeout and
//! failure isolation in the aggregation core are exercised.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::client::HeadscaleApi;
use crate::error::{ApiError, Result};
use crate::types::{Machine, PreAuthKey, Route, User};

/// A fake headscale server backed by in-memory records.
#[derive(Debug, Default)]
pub struct FakeHeadscale {
    machines: Vec<Machine>,
    routes: Vec<Route>,
    users: Vec<User>,
    keys: HashMap<String, Vec<PreAuthKey>>,
    route_delays: HashMap<u64, Duration>,
    key_delays: HashMap<String, Duration>,
    route_failures: HashMap<u64, ApiError>,
    key_failures: HashMap<String, ApiError>,
    route_panics: HashSet<u64>,
    listing_failure: Option<ApiError>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl FakeHeadscale {
    /// Creates an empty fake server.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a machine.
    #[must_use]
    pub fn with_machine(mut self, machine: Machine) -> Self {
        self.machines.push(machine);
        self
    }

    /// Adds a route. Per-machine lookups match on [`Route::machine_id`].
    #[must_use]
    pub fn with_route(mut self, route: Route) -> Self {
        self.routes.push(route);
        self
    }

    /// Adds a user.
    #[must_use]
    pub fn with_user(mut self, user: User) -> Self {
        self.users.push(user);
        self
    }

    /// Adds a pre-auth key, filed under `key.user`.
    #[must_use]
    pub fn with_key(mut self, key: PreAuthKey) -> Self {
        self.keys.entry(key.user.clone()).or_default().push(key);
        self
    }

    /// Delays route lookups for one machine.
    #[must_use]
    pub fn with_route_delay(mut self, machine_id: u64, delay: Duration) -> Self {
        self.route_delays.insert(machine_id, delay);
        self
    }

    /// Delays key lookups for one user.
    #[must_use]
    pub fn with_key_delay(mut self, user_name: impl Into<String>, delay: Duration) -> Self {
        self.key_delays.insert(user_name.into(), delay);
        self
    }

    /// Makes route lookups for one machine fail.
    #[must_use]
    pub fn fail_machine_routes(mut self, machine_id: u64, error: ApiError) -> Self {
        self.route_failures.insert(machine_id, error);
        self
    }

    /// Makes route lookups for one machine panic.
    #[must_use]
    pub fn panic_machine_routes(mut self, machine_id: u64) -> Self {
        self.route_panics.insert(machine_id);
        self
    }

    /// Makes key lookups for one user fail.
    #[must_use]
    pub fn fail_preauth_keys(mut self, user_name: impl Into<String>, error: ApiError) -> Self {
        self.key_failures.insert(user_name.into(), error);
        self
    }

    /// Makes every list call (`get_machines`, `get_routes`, `get_users`) fail.
    #[must_use]
    pub fn fail_listings(mut self, error: ApiError) -> Self {
        self.listing_failure = Some(error);
        self
    }

    /// Total number of API calls served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of calls that were in progress at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn enter(&self) -> InFlight<'_> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        InFlight {
            counter: &self.in_flight,
        }
    }

    fn listing<T: Clone>(&self, items: &[T]) -> Result<Vec<T>> {
        let _guard = self.enter();
        match &self.listing_failure {
            Some(err) => Err(err.clone()),
            None => Ok(items.to_vec()),
        }
    }
}

/// Decrements the in-flight counter when a call finishes or is dropped.
struct InFlight<'a> {
    counter: &'a AtomicUsize,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

impl HeadscaleApi for FakeHeadscale {
    async fn get_machines(&self) -> Result<Vec<Machine>> {
        self.listing(&self.machines)
    }

    async fn get_machine_routes(&self, machine_id: u64) -> Result<Vec<Route>> {
        let _guard = self.enter();
        if let Some(delay) = self.route_delays.get(&machine_id) {
            tokio::time::sleep(*delay).await;
        }
        assert!(
            !self.route_panics.contains(&machine_id),
            "route lookup for machine {machine_id} panicked"
        );
        if let Some(err) = self.route_failures.get(&machine_id) {
            return Err(err.clone());
        }
        Ok(self
            .routes
            .iter()
            .filter(|r| r.machine_id() == machine_id)
            .cloned()
            .collect())
    }

    async fn get_routes(&self) -> Result<Vec<Route>> {
        self.listing(&self.routes)
    }

    async fn get_users(&self) -> Result<Vec<User>> {
        self.listing(&self.users)
    }

    async fn get_preauth_keys(&self, user_name: &str) -> Result<Vec<PreAuthKey>> {
        let _guard = self.enter();
        if let Some(delay) = self.key_delays.get(user_name) {
            tokio::time::sleep(*delay).await;
        }
        if let Some(err) = self.key_failures.get(user_name) {
            return Err(err.clone());
        }
        Ok(self.keys.get(user_name).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RouteMachine;

    fn route(id: &str, machine_id: &str) -> Route {
        Route {
            id: id.into(),
            machine: Some(RouteMachine {
                id: machine_id.into(),
                name: String::new(),
            }),
            prefix: "10.0.0.0/8".into(),
            ..Route::default()
        }
    }

    #[tokio::test]
    async fn test_machine_routes_filtered_by_owner() {
        let fake = FakeHeadscale::new()
            .with_route(route("1", "1"))
            .with_route(route("2", "2"))
            .with_route(route("3", "1"));

        let routes = fake.get_machine_routes(1).await.unwrap();
        let ids: Vec<&str> = routes.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3"]);
        assert_eq!(fake.get_routes().await.unwrap().len(), 3);
        assert_eq!(fake.calls(), 2);
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let fake = FakeHeadscale::new()
            .fail_machine_routes(5, ApiError::status("/routes", 500, "boom"))
            .fail_preauth_keys("eve", ApiError::transport("/keys", "reset"));

        assert!(fake.get_machine_routes(5).await.is_err());
        assert!(fake.get_machine_routes(6).await.is_ok());
        assert!(fake.get_preauth_keys("eve").await.is_err());
        assert!(fake.get_preauth_keys("bob").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_listing_failure() {
        let fake = FakeHeadscale::new().fail_listings(ApiError::status("/m", 401, "no"));
        assert!(fake.get_machines().await.unwrap_err().is_auth_error());
        assert!(fake.get_users().await.is_err());
    }

    #[tokio::test]
    async fn test_keys_grouped_by_user() {
        let fake = FakeHeadscale::new()
            .with_key(PreAuthKey {
                id: "1".into(),
                user: "alice".into(),
                ..PreAuthKey::default()
            })
            .with_key(PreAuthKey {
                id: "2".into(),
                user: "bob".into(),
                ..PreAuthKey::default()
            });

        let keys = fake.get_preauth_keys("alice").await.unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].id, "1");
        assert_eq!(fake.peak_in_flight(), 1);
    }
}
