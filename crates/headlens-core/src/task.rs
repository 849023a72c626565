//! Per-entity enrichment tasks.
//!
//! A task performs the lookups one entity needs, then runs the
//! derived-state calculator. Tasks only read: the API handle and the pass
//! clock are shared, everything else is owned by the task.

use headlens_api::{HeadscaleApi, Machine, User};
use tracing::{debug, warn};

use crate::derive::{compute_key_row, compute_machine_view, parse_id};
use crate::error::{DataError, EnrichError};
use crate::palette;
use crate::slot::Slot;
use crate::time::PassClock;
use crate::view::{MachineView, UserKeys};

/// Label used in degraded slots and logs for a machine.
#[must_use]
pub fn machine_label(machine: &Machine) -> String {
    match (machine.given_name.is_empty(), machine.name.is_empty()) {
        (false, _) => machine.given_name.clone(),
        (true, false) => machine.name.clone(),
        (true, true) => format!("machine {}", machine.id),
    }
}

/// Label used in degraded slots and logs for a user.
#[must_use]
pub fn user_label(user: &User) -> String {
    if user.name.is_empty() {
        format!("user {}", user.id)
    } else {
        user.name.clone()
    }
}

/// Fetch a machine's routes and build its view model.
pub async fn enrich_machine<A: HeadscaleApi>(
    api: &A,
    machine: &Machine,
    clock: &PassClock,
) -> Result<MachineView, EnrichError> {
    let machine_id = parse_id("id", &machine.id)?;
    let routes = api.get_machine_routes(machine_id).await?;
    debug!(machine_id, routes = routes.len(), "Fetched machine routes");

    let view = compute_machine_view(machine, &routes, clock)?;
    debug!(machine_id, exit_node = view.exit_node, "Built machine view");
    Ok(view)
}

/// Fetch a user's pre-auth keys and build the key table.
///
/// A key that cannot be evaluated degrades its own row only.
pub async fn enrich_user<A: HeadscaleApi>(
    api: &A,
    user: &User,
    clock: &PassClock,
) -> Result<UserKeys, EnrichError> {
    let user_id = parse_id("id", &user.id)?;
    if user.name.trim().is_empty() {
        return Err(DataError::missing("name").into());
    }

    let keys = api.get_preauth_keys(&user.name).await?;
    debug!(user = %user.name, keys = keys.len(), "Fetched pre-auth keys");

    let rows = keys
        .iter()
        .enumerate()
        .map(|(index, key)| {
            let outcome = compute_key_row(key, clock).map_err(EnrichError::from);
            if let Err(err) = &outcome {
                warn!(
                    user = %user.name,
                    key_id = %key.id,
                    error = %err,
                    "Degraded pre-auth key row"
                );
            }
            Slot::from_outcome(index, format!("key {}", key.id), outcome)
        })
        .collect();

    Ok(UserKeys {
        user_id,
        name: user.name.clone(),
        color: palette::text_color(user_id),
        keys: rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use chrono_tz::Tz;
    use headlens_api::{ApiError, FakeHeadscale, PreAuthKey, Route, RouteMachine};

    fn clock() -> PassClock {
        PassClock::at(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(), Tz::UTC)
    }

    fn machine(id: &str) -> Machine {
        Machine {
            id: id.into(),
            name: format!("host-{id}"),
            user: Some(User {
                id: "1".into(),
                name: "alice".into(),
                created_at: None,
            }),
            created_at: Some("2024-04-01T00:00:00Z".into()),
            last_seen: Some("2024-05-01T11:00:00Z".into()),
            ..Machine::default()
        }
    }

    fn alice() -> User {
        User {
            id: "1".into(),
            name: "alice".into(),
            created_at: None,
        }
    }

    #[tokio::test]
    async fn test_enrich_machine_fetches_its_routes() {
        let api = FakeHeadscale::new()
            .with_route(Route {
                id: "1".into(),
                machine: Some(RouteMachine {
                    id: "3".into(),
                    name: "host-3".into(),
                }),
                prefix: "0.0.0.0/0".into(),
                advertised: true,
                enabled: true,
                is_primary: true,
            })
            .with_route(Route {
                id: "2".into(),
                machine: Some(RouteMachine {
                    id: "9".into(),
                    name: "other".into(),
                }),
                prefix: "::/0".into(),
                advertised: true,
                enabled: true,
                is_primary: true,
            });

        let view = enrich_machine(&api, &machine("3"), &clock()).await.unwrap();
        assert!(view.exit_node);
        assert_eq!(view.total_routes, 1);
        assert_eq!(api.calls(), 1);
    }

    #[tokio::test]
    async fn test_enrich_machine_api_failure() {
        let api = FakeHeadscale::new()
            .fail_machine_routes(3, ApiError::status("/api/v1/machine/3/routes", 500, "boom"));

        let err = enrich_machine(&api, &machine("3"), &clock()).await.unwrap_err();
        assert!(matches!(err, EnrichError::Api(_)));
    }

    #[tokio::test]
    async fn test_enrich_machine_bad_id_skips_lookup() {
        let api = FakeHeadscale::new();
        let err = enrich_machine(&api, &machine(""), &clock()).await.unwrap_err();

        assert_eq!(err, EnrichError::Data(DataError::missing("id")));
        assert_eq!(api.calls(), 0);
    }

    #[tokio::test]
    async fn test_enrich_user_degrades_bad_key_rows() {
        let api = FakeHeadscale::new()
            .with_key(PreAuthKey {
                id: "1".into(),
                user: "alice".into(),
                key: "aaaaaaaaaaaaaaaa".into(),
                reusable: true,
                expiration: Some("2024-06-01T00:00:00Z".into()),
                ..PreAuthKey::default()
            })
            .with_key(PreAuthKey {
                id: "2".into(),
                user: "alice".into(),
                key: "bbbbbbbbbbbbbbbb".into(),
                expiration: Some("not a date".into()),
                ..PreAuthKey::default()
            });

        let table = enrich_user(&api, &alice(), &clock()).await.unwrap();
        assert_eq!(table.name, "alice");
        assert_eq!(table.color, palette::text_color(1));
        assert_eq!(table.keys.len(), 2);
        assert!(table.keys[0].is_ready());
        let failure = table.keys[1].failure().expect("row 1 degraded");
        assert_eq!(failure.index, 1);
        assert_eq!(failure.label, "key 2");
        assert_eq!(table.usable_count(), 1);
    }

    #[tokio::test]
    async fn test_enrich_user_without_name() {
        let api = FakeHeadscale::new();
        let user = User {
            id: "5".into(),
            ..User::default()
        };
        let err = enrich_user(&api, &user, &clock()).await.unwrap_err();
        assert_eq!(err, EnrichError::Data(DataError::missing("name")));
    }

    #[test]
    fn test_labels() {
        let mut m = machine("3");
        assert_eq!(machine_label(&m), "host-3");
        m.given_name = "gw".into();
        assert_eq!(machine_label(&m), "gw");
        m.given_name.clear();
        m.name.clear();
        assert_eq!(machine_label(&m), "machine 3");

        assert_eq!(user_label(&alice()), "alice");
        assert_eq!(user_label(&User { id: "7".into(), ..User::default() }), "user 7");
    }
}
