//! Derived-state calculator.
//!
//! Pure functions turning raw API records into view models. The route and
//! key predicates here are also used by the overview counters, so the
//! overview and the detail pages can never disagree.

use chrono::{DateTime, Utc};
use headlens_api::{Machine, PreAuthKey, Route};
use tracing::warn;

use crate::error::DataError;
use crate::palette;
use crate::time::{
    DurationMode, PassClock, NO_EXPIRATION, classify_color, format_duration, parse_expiry,
    parse_timestamp, resolve_expiry_display,
};
use crate::view::{MachineView, PreAuthKeyRow, RouteView, TimeField};

/// Default-route prefixes that make a machine an exit node.
pub const EXIT_ROUTE_PREFIXES: [&str; 2] = ["0.0.0.0/0", "::/0"];

/// Number of key characters that are safe to show.
pub const KEY_PREFIX_LEN: usize = 10;

/// Shown instead of a key prefix when a machine has no pre-auth key.
pub const NO_KEY: &str = "None";

/// Returns `true` for the IPv4 and IPv6 default routes.
#[must_use]
pub fn is_exit_prefix(prefix: &str) -> bool {
    EXIT_ROUTE_PREFIXES.contains(&prefix.trim())
}

/// Attached, advertised and enabled.
#[must_use]
pub fn is_enabled_route(route: &Route) -> bool {
    route.is_attached() && route.advertised && route.enabled
}

/// Attached and advertised default route, enabled or not.
#[must_use]
pub fn is_advertised_exit_route(route: &Route) -> bool {
    route.is_attached() && route.advertised && is_exit_prefix(&route.prefix)
}

/// Attached, advertised and enabled default route.
#[must_use]
pub fn is_enabled_exit_route(route: &Route) -> bool {
    is_advertised_exit_route(route) && route.enabled
}

/// Route counters. Unattached routes are never counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouteSummary {
    /// Attached routes.
    pub total: usize,
    /// Attached routes that are advertised and enabled.
    pub enabled: usize,
    /// Advertised default routes.
    pub exits: usize,
    /// Advertised and enabled default routes.
    pub enabled_exits: usize,
}

impl RouteSummary {
    /// Count a set of routes.
    pub fn from_routes<'a>(routes: impl IntoIterator<Item = &'a Route>) -> Self {
        routes
            .into_iter()
            .filter(|r| r.is_attached())
            .fold(Self::default(), |mut acc, route| {
                acc.total += 1;
                acc.enabled += usize::from(is_enabled_route(route));
                acc.exits += usize::from(is_advertised_exit_route(route));
                acc.enabled_exits += usize::from(is_enabled_exit_route(route));
                acc
            })
    }

    /// Whether at least one enabled default route is present.
    #[must_use]
    pub const fn has_exit_node(&self) -> bool {
        self.enabled_exits > 0
    }
}

/// The key usability rule.
///
/// A reusable key is usable until it expires; a single-use key is usable
/// until it expires or is used.
#[must_use]
pub const fn key_usable(reusable: bool, used: bool, expired: bool) -> bool {
    !expired && (reusable || !used)
}

/// Expiry and usability of one pre-auth key at the pass clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyState {
    /// Parsed expiration; `None` never expires.
    pub expiration: Option<DateTime<Utc>>,
    /// Whether the expiration has passed.
    pub expired: bool,
    /// Whether the key can still register a machine.
    pub usable: bool,
}

/// Evaluate a key against the pass clock.
pub fn evaluate_key(key: &PreAuthKey, clock: &PassClock) -> Result<KeyState, DataError> {
    let expiration = parse_expiry("expiration", key.expiration.as_deref())?;
    let expired = expiration.is_some_and(|ts| ts < clock.now());
    Ok(KeyState {
        expiration,
        expired,
        usable: key_usable(key.reusable, key.used, expired),
    })
}

/// First [`KEY_PREFIX_LEN`] characters of key material.
#[must_use]
pub fn key_prefix(key: &str) -> String {
    key.chars().take(KEY_PREFIX_LEN).collect()
}

/// Parse a decimal ID.
pub fn parse_id(field: &'static str, raw: &str) -> Result<u64, DataError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(DataError::missing(field));
    }
    raw.parse().map_err(|_| DataError::InvalidId {
        field,
        value: raw.to_string(),
    })
}

fn time_field(ts: DateTime<Utc>, clock: &PassClock) -> TimeField {
    TimeField {
        timestamp: clock.format_timestamp(ts),
        relative: format_duration(clock.since(ts), DurationMode::Elapsed),
    }
}

/// Build the view model of one machine from its record and routes.
pub fn compute_machine_view(
    machine: &Machine,
    routes: &[Route],
    clock: &PassClock,
) -> Result<MachineView, DataError> {
    let id = parse_id("id", &machine.id)?;
    if machine.name.trim().is_empty() {
        return Err(DataError::missing("name"));
    }
    let user = machine.user.as_ref().ok_or(DataError::missing("user"))?;
    let user_id = parse_id("user.id", &user.id)?;

    let last_seen = parse_timestamp("lastSeen", machine.last_seen.as_deref())?;
    let last_update = match machine
        .last_successful_update
        .as_deref()
        .filter(|s| !s.trim().is_empty())
    {
        Some(raw) => parse_timestamp("lastSuccessfulUpdate", Some(raw))?,
        None => clock.now(),
    };
    let created = parse_timestamp("createdAt", machine.created_at.as_deref())?;
    let expiry = parse_expiry("expiry", machine.expiry.as_deref())?;

    let attached: Vec<&Route> = routes.iter().filter(|r| r.is_attached()).collect();
    let summary = RouteSummary::from_routes(attached.iter().copied());
    let route_views = attached
        .iter()
        .map(|r| RouteView {
            id: r.id.clone(),
            prefix: r.prefix.clone(),
            advertised: r.advertised,
            enabled: r.enabled,
            exit: is_exit_prefix(&r.prefix),
        })
        .collect();

    // Only shown in the user badge tooltip; an unreadable value is dropped.
    let user_created = user.created_at.as_deref().and_then(|raw| {
        parse_timestamp("user.createdAt", Some(raw))
            .inspect_err(|err| {
                warn!(machine_id = id, raw, error = %err, "Ignoring user creation time");
            })
            .ok()
            .map(|ts| clock.format_timestamp(ts))
    });

    Ok(MachineView {
        id,
        hostname: machine.name.clone(),
        given_name: if machine.given_name.is_empty() {
            machine.name.clone()
        } else {
            machine.given_name.clone()
        },
        user_id,
        user_name: user.name.clone(),
        user_created,
        user_color: palette::badge_color(user_id),
        ip_addresses: machine.ip_addresses.clone(),
        tags: machine
            .forced_tags
            .iter()
            .map(|t| t.strip_prefix("tag:").unwrap_or(t).to_string())
            .collect(),
        routes: route_views,
        enabled_routes: summary.enabled,
        total_routes: summary.total,
        enabled_exit_routes: summary.enabled_exits,
        exit_node: summary.has_exit_node(),
        online: machine.online,
        last_seen: time_field(last_seen, clock),
        last_update: time_field(last_update, clock),
        created: time_field(created, clock),
        expiry: resolve_expiry_display(expiry, clock),
        status_color: classify_color(clock.since(last_seen)),
        preauth_key_prefix: machine
            .pre_auth_key
            .as_ref()
            .filter(|k| !k.key.is_empty())
            .map_or_else(|| NO_KEY.to_string(), |k| key_prefix(&k.key)),
    })
}

/// Build one row of a user's key table.
pub fn compute_key_row(key: &PreAuthKey, clock: &PassClock) -> Result<PreAuthKeyRow, DataError> {
    if key.id.trim().is_empty() {
        return Err(DataError::missing("id"));
    }
    let state = evaluate_key(key, clock)?;

    Ok(PreAuthKeyRow {
        id: key.id.clone(),
        user: key.user.clone(),
        key_prefix: key_prefix(&key.key),
        reusable: key.reusable,
        used: key.used,
        ephemeral: key.ephemeral,
        expired: state.expired,
        usable: state.usable,
        expiration: state.expiration.map_or_else(
            || NO_EXPIRATION.to_string(),
            |ts| clock.format_timestamp(ts),
        ),
        acl_tags: key.acl_tags.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone};
    use chrono_tz::Tz;
    use headlens_api::{RouteMachine, User};
    use proptest::prelude::*;
    use test_case::test_case;

    use crate::time::ColorClass;

    fn clock() -> PassClock {
        PassClock::at(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(), Tz::UTC)
    }

    fn rfc3339(clock: &PassClock, offset: TimeDelta) -> Option<String> {
        Some((clock.now() + offset).to_rfc3339())
    }

    fn machine(clock: &PassClock) -> Machine {
        Machine {
            id: "4".into(),
            name: "gateway".into(),
            given_name: "gateway-1".into(),
            user: Some(User {
                id: "2".into(),
                name: "alice".into(),
                created_at: Some("2023-01-01T00:00:00Z".into()),
            }),
            ip_addresses: vec!["100.64.0.4".into()],
            forced_tags: vec!["tag:router".into(), "tag:prod".into()],
            created_at: rfc3339(clock, -TimeDelta::days(30)),
            last_seen: rfc3339(clock, -TimeDelta::seconds(10)),
            last_successful_update: rfc3339(clock, -TimeDelta::minutes(2)),
            expiry: Some("0001-01-01T00:00:00Z".into()),
            pre_auth_key: Some(PreAuthKey {
                key: "abcdefghijklmnopqrstuvwxyz".into(),
                ..PreAuthKey::default()
            }),
            online: true,
            ..Machine::default()
        }
    }

    fn route(machine_id: &str, prefix: &str, advertised: bool, enabled: bool) -> Route {
        Route {
            id: format!("{machine_id}-{prefix}"),
            machine: Some(RouteMachine {
                id: machine_id.into(),
                name: "gateway".into(),
            }),
            prefix: prefix.into(),
            advertised,
            enabled,
            is_primary: false,
        }
    }

    fn key(reusable: bool, used: bool, expires_in: TimeDelta) -> PreAuthKey {
        PreAuthKey {
            id: "1".into(),
            user: "alice".into(),
            key: "0123456789abcdef".into(),
            reusable,
            used,
            expiration: rfc3339(&clock(), expires_in),
            ..PreAuthKey::default()
        }
    }

    #[test]
    fn test_exit_node_requires_enabled_default_route() {
        let clock = clock();
        let m = machine(&clock);

        let enabled = [route("4", "0.0.0.0/0", true, true)];
        let view = compute_machine_view(&m, &enabled, &clock).unwrap();
        assert!(view.exit_node);
        assert_eq!(view.enabled_exit_routes, 1);

        let disabled = [route("4", "0.0.0.0/0", true, false)];
        let view = compute_machine_view(&m, &disabled, &clock).unwrap();
        assert!(!view.exit_node);
        assert_eq!(view.enabled_routes, 0);
        assert_eq!(view.total_routes, 1);
    }

    #[test]
    fn test_exit_node_requires_advertised_route() {
        let clock = clock();
        let routes = [route("4", "::/0", false, true)];
        let view = compute_machine_view(&machine(&clock), &routes, &clock).unwrap();
        assert!(!view.exit_node);
    }

    #[test]
    fn test_unattached_routes_are_ignored() {
        let clock = clock();
        let routes = [
            route("0", "0.0.0.0/0", true, true),
            route("4", "10.0.0.0/8", true, true),
            route("4", "192.168.0.0/16", true, false),
        ];
        let view = compute_machine_view(&machine(&clock), &routes, &clock).unwrap();

        assert!(!view.exit_node);
        assert_eq!(view.total_routes, 2);
        assert_eq!(view.enabled_routes, 1);
        assert_eq!(view.routes.len(), 2);
        assert!(view.routes.iter().all(|r| !r.exit));
    }

    #[test]
    fn test_machine_view_fields() {
        let clock = clock();
        let view = compute_machine_view(&machine(&clock), &[], &clock).unwrap();

        assert_eq!(view.id, 4);
        assert_eq!(view.hostname, "gateway");
        assert_eq!(view.given_name, "gateway-1");
        assert_eq!(view.user_id, 2);
        assert_eq!(view.user_color, palette::badge_color(2));
        assert_eq!(view.tags, vec!["router".to_string(), "prod".to_string()]);
        assert_eq!(view.preauth_key_prefix, "abcdefghij");
        assert_eq!(view.status_color, ColorClass::Fresh);
        assert_eq!(view.last_seen.relative, "10 seconds ago");
        assert_eq!(view.last_update.relative, "2 minutes ago");
        assert_eq!(view.created.relative, "30 days ago");
        assert_eq!(view.expiry.text, NO_EXPIRATION);
        assert!(!view.expiry.expiring_soon);
        assert_eq!(
            view.user_created.as_deref(),
            Some("Sunday 01/01/2023, 00:00:00 UTC")
        );
    }

    #[test]
    fn test_unreadable_user_creation_time_is_dropped() {
        let clock = clock();
        let mut m = machine(&clock);
        if let Some(user) = m.user.as_mut() {
            user.created_at = Some("last tuesday".into());
        }

        let view = compute_machine_view(&m, &[], &clock).unwrap();
        assert_eq!(view.user_created, None);
        assert_eq!(view.user_name, m.user.unwrap().name);
    }

    #[test]
    fn test_missing_last_update_uses_now() {
        let clock = clock();
        let mut m = machine(&clock);
        m.last_successful_update = None;

        let view = compute_machine_view(&m, &[], &clock).unwrap();
        assert_eq!(view.last_update.relative, "just now");
        assert_eq!(view.last_update.timestamp, clock.format_timestamp(clock.now()));
    }

    #[test]
    fn test_expiring_soon_machine() {
        let clock = clock();
        let mut m = machine(&clock);
        m.expiry = rfc3339(&clock, TimeDelta::days(5) + TimeDelta::hours(1));

        let view = compute_machine_view(&m, &[], &clock).unwrap();
        assert!(view.expiry.expiring_soon);
        assert!(view.expiry.text.ends_with("(in 5 days)"));
    }

    #[test]
    fn test_no_preauth_key() {
        let clock = clock();
        let mut m = machine(&clock);
        m.pre_auth_key = None;

        let view = compute_machine_view(&m, &[], &clock).unwrap();
        assert_eq!(view.preauth_key_prefix, NO_KEY);
    }

    #[test]
    fn test_missing_required_fields() {
        let clock = clock();

        let mut m = machine(&clock);
        m.last_seen = None;
        assert_eq!(
            compute_machine_view(&m, &[], &clock),
            Err(DataError::missing("lastSeen"))
        );

        let mut m = machine(&clock);
        m.user = None;
        assert_eq!(
            compute_machine_view(&m, &[], &clock),
            Err(DataError::missing("user"))
        );

        let mut m = machine(&clock);
        m.id = "four".into();
        assert!(matches!(
            compute_machine_view(&m, &[], &clock),
            Err(DataError::InvalidId { field: "id", .. })
        ));

        let mut m = machine(&clock);
        m.created_at = Some("last tuesday".into());
        assert!(matches!(
            compute_machine_view(&m, &[], &clock),
            Err(DataError::InvalidTimestamp { field: "createdAt", .. })
        ));
    }

    #[test_case(true, false, TimeDelta::days(1), true ; "reusable and valid")]
    #[test_case(true, true, TimeDelta::days(1), true ; "reusable and used")]
    #[test_case(false, true, TimeDelta::days(1), false ; "single use already used")]
    #[test_case(false, false, TimeDelta::days(1), true ; "single use unused")]
    #[test_case(false, false, -TimeDelta::days(1), false ; "single use expired")]
    #[test_case(true, false, -TimeDelta::seconds(1), false ; "reusable expired")]
    fn test_key_usability(reusable: bool, used: bool, expires_in: TimeDelta, usable: bool) {
        let row = compute_key_row(&key(reusable, used, expires_in), &clock()).unwrap();
        assert_eq!(row.usable, usable);
        assert_eq!(row.expired, expires_in < TimeDelta::zero());
    }

    #[test]
    fn test_key_row_fields() {
        let clock = clock();
        let row = compute_key_row(&key(false, false, TimeDelta::days(2)), &clock).unwrap();
        assert_eq!(row.key_prefix, "0123456789");
        assert_eq!(row.expiration, "Friday 05/03/2024, 12:00:00 UTC");
    }

    #[test]
    fn test_key_without_expiration_never_expires() {
        let clock = clock();
        let mut k = key(false, false, TimeDelta::zero());
        k.expiration = Some("0001-01-01T00:00:00Z".into());

        let row = compute_key_row(&k, &clock).unwrap();
        assert!(!row.expired);
        assert!(row.usable);
        assert_eq!(row.expiration, NO_EXPIRATION);
    }

    #[test]
    fn test_key_with_bad_expiration_fails() {
        let mut k = key(true, false, TimeDelta::zero());
        k.expiration = Some("never".into());
        assert!(compute_key_row(&k, &clock()).is_err());
    }

    #[test]
    fn test_route_summary_counts() {
        let routes = [
            route("1", "0.0.0.0/0", true, true),
            route("1", "::/0", true, false),
            route("2", "10.1.0.0/16", true, true),
            route("2", "10.2.0.0/16", false, true),
            route("0", "::/0", true, true),
        ];
        let summary = RouteSummary::from_routes(&routes);
        assert_eq!(
            summary,
            RouteSummary {
                total: 4,
                enabled: 2,
                exits: 2,
                enabled_exits: 1,
            }
        );
    }

    #[test_case("abc", "abc" ; "short key")]
    #[test_case("0123456789", "0123456789" ; "exact length")]
    #[test_case("0123456789abcdef", "0123456789" ; "long key")]
    #[test_case("", "" ; "empty key")]
    fn test_key_prefix(input: &str, expected: &str) {
        assert_eq!(key_prefix(input), expected);
    }

    proptest! {
        #[test]
        fn prop_machine_view_is_idempotent(
            seen_secs in 0i64..5_000_000,
            expiry_days in -30i64..800,
            enabled in any::<bool>(),
            advertised in any::<bool>(),
        ) {
            let clock = clock();
            let mut m = machine(&clock);
            m.last_seen = rfc3339(&clock, -TimeDelta::seconds(seen_secs));
            m.expiry = rfc3339(&clock, TimeDelta::days(expiry_days));
            let routes = [route("4", "0.0.0.0/0", advertised, enabled)];

            let first = compute_machine_view(&m, &routes, &clock).unwrap();
            let second = compute_machine_view(&m, &routes, &clock).unwrap();
            prop_assert_eq!(&first, &second);
            prop_assert_eq!(first.exit_node, enabled && advertised);
        }

        #[test]
        fn prop_key_usability_matches_rule(
            reusable in any::<bool>(),
            used in any::<bool>(),
            offset_secs in -100_000i64..100_000,
        ) {
            let k = key(reusable, used, TimeDelta::seconds(offset_secs));
            let row = compute_key_row(&k, &clock()).unwrap();
            let expired = offset_secs < 0;
            let expected = (reusable && !expired) || (!reusable && !used && !expired);
            prop_assert_eq!(row.usable, expected);
        }
    }
}
