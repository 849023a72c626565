//! Server-wide counters for the overview page.

use headlens_api::{HeadscaleApi, PreAuthKey, Route};
use serde::Serialize;
use tracing::debug;

use crate::derive::{RouteSummary, evaluate_key};
use crate::error::{AggregateError, AggregateResult, DataError};
use crate::time::PassClock;

/// Totals shown on the overview page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OverviewCounts {
    /// Registered machines.
    pub machines: usize,
    /// Users.
    pub users: usize,
    /// Pre-auth keys that can still register a machine.
    pub usable_keys: usize,
    /// Routes attached to a machine.
    pub total_routes: usize,
    /// Attached routes that are advertised and enabled.
    pub enabled_routes: usize,
    /// Attached, advertised default routes.
    pub exit_routes: usize,
    /// Attached default routes that are advertised and enabled.
    pub enabled_exit_routes: usize,
}

/// Count everything from already fetched lists.
///
/// Fails on the first key whose expiration cannot be parsed.
pub fn summarize<'a>(
    machines: usize,
    users: usize,
    routes: &[Route],
    keys: impl IntoIterator<Item = &'a PreAuthKey>,
    clock: &PassClock,
) -> Result<OverviewCounts, (String, DataError)> {
    let summary = RouteSummary::from_routes(routes);

    let mut usable_keys = 0;
    for key in keys {
        let state = evaluate_key(key, clock).map_err(|e| (format!("pre-auth key {}", key.id), e))?;
        if state.usable {
            usable_keys += 1;
        }
    }

    Ok(OverviewCounts {
        machines,
        users,
        usable_keys,
        total_routes: summary.total,
        enabled_routes: summary.enabled,
        exit_routes: summary.exits,
        enabled_exit_routes: summary.enabled_exits,
    })
}

/// Fetch every list one after another and count.
///
/// Any failure aborts the whole overview.
pub async fn collect_overview<A: HeadscaleApi>(
    api: &A,
    clock: &PassClock,
) -> AggregateResult<OverviewCounts> {
    let machines = api
        .get_machines()
        .await
        .map_err(|e| AggregateError::api("machines", e))?;
    let routes = api
        .get_routes()
        .await
        .map_err(|e| AggregateError::api("routes", e))?;
    let users = api
        .get_users()
        .await
        .map_err(|e| AggregateError::api("users", e))?;

    let mut keys = Vec::new();
    for user in &users {
        let mut user_keys = api
            .get_preauth_keys(&user.name)
            .await
            .map_err(|e| AggregateError::api("pre-auth keys", e))?;
        keys.append(&mut user_keys);
    }
    debug!(
        machines = machines.len(),
        routes = routes.len(),
        users = users.len(),
        keys = keys.len(),
        "Fetched overview lists"
    );

    summarize(machines.len(), users.len(), &routes, &keys, clock)
        .map_err(|(entity, source)| AggregateError::data(entity, source))
}
