//! Wire records returned by the headscale REST API.
//!
//! Fields are defaulted rather than required: a single machine with a
//! missing timestamp must not make the whole machine list undecodable.
//! Presence and format are checked per entity by the aggregation core.

use serde::{Deserialize, Serialize};

/// A headscale user (formerly "namespace").
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct User {
    /// User ID, a decimal string on the wire.
    pub id: String,
    /// User name.
    pub name: String,
    /// Creation timestamp (RFC 3339).
    pub created_at: Option<String>,
}

/// A pre-authentication key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PreAuthKey {
    /// Key ID.
    pub id: String,
    /// Name of the owning user.
    pub user: String,
    /// Full key material. Only a prefix is ever surfaced.
    pub key: String,
    /// Whether the key can register more than one machine.
    pub reusable: bool,
    /// Whether registered machines are ephemeral.
    pub ephemeral: bool,
    /// Whether the key has been used.
    pub used: bool,
    /// Expiration timestamp (RFC 3339).
    pub expiration: Option<String>,
    /// Creation timestamp (RFC 3339).
    pub created_at: Option<String>,
    /// ACL tags applied to machines registered with this key.
    pub acl_tags: Vec<String>,
}

/// The machine reference embedded in a route.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RouteMachine {
    /// Machine ID. `"0"` marks a route that is not attached to a machine.
    pub id: String,
    /// Machine hostname.
    pub name: String,
}

/// A subnet or exit route advertised by a machine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Route {
    /// Route ID.
    pub id: String,
    /// Owning machine.
    pub machine: Option<RouteMachine>,
    /// Network prefix in CIDR notation.
    pub prefix: String,
    /// Whether the machine advertises the route.
    pub advertised: bool,
    /// Whether an administrator enabled the route.
    pub enabled: bool,
    /// Whether this is the primary route for its prefix.
    pub is_primary: bool,
}

impl Route {
    /// ID of the owning machine, or 0 when the route is unattached.
    ///
    /// A missing machine reference or a non-numeric ID is treated as
    /// unattached.
    #[must_use]
    pub fn machine_id(&self) -> u64 {
        self.machine
            .as_ref()
            .and_then(|m| m.id.trim().parse().ok())
            .unwrap_or(0)
    }

    /// Returns `true` if the route belongs to a real machine.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.machine_id() != 0
    }
}

/// A machine (node) registered with headscale.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Machine {
    /// Machine ID.
    pub id: String,
    /// Hostname reported by the machine.
    pub name: String,
    /// Name assigned in the tailnet (used for MagicDNS).
    pub given_name: String,
    /// Owning user.
    pub user: Option<User>,
    /// Addresses assigned in the tailnet.
    pub ip_addresses: Vec<String>,
    /// Tags forced by an administrator, `tag:` prefixed.
    pub forced_tags: Vec<String>,
    /// Registration timestamp (RFC 3339).
    pub created_at: Option<String>,
    /// Last time the machine contacted the server.
    pub last_seen: Option<String>,
    /// Last successful map update; absent for machines never updated.
    pub last_successful_update: Option<String>,
    /// Node key expiry. `0001-01-01T00:00:00Z` means "never".
    pub expiry: Option<String>,
    /// Key the machine registered with, if any.
    pub pre_auth_key: Option<PreAuthKey>,
    /// Whether the machine is currently connected.
    pub online: bool,
    /// How the machine was registered (`REGISTER_METHOD_AUTH_KEY`, ...).
    pub register_method: String,
}

/// Envelope of `GET /api/v1/machine`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MachineList {
    /// Machines.
    pub machines: Vec<Machine>,
}

/// Envelope of the route endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RouteList {
    /// Routes.
    pub routes: Vec<Route>,
}

/// Envelope of `GET /api/v1/user`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserList {
    /// Users.
    pub users: Vec<User>,
}

/// Envelope of `GET /api/v1/preauthkey`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PreAuthKeyList {
    /// Pre-auth keys.
    pub pre_auth_keys: Vec<PreAuthKey>,
}
