//! Display-ready view models.
//!
//! View models are built once per aggregation pass and never mutated;
//! the presentation layer only reads them.

use serde::Serialize;

use crate::slot::Slot;
use crate::time::{ColorClass, ExpiryDisplay};

/// A timestamp rendered both absolutely and relative to the pass clock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeField {
    /// Absolute time in the display timezone.
    pub timestamp: String,
    /// Relative phrasing, e.g. "3 days ago".
    pub relative: String,
}

impl TimeField {
    /// Combined form: `"<timestamp> (<relative>)"`.
    #[must_use]
    pub fn display(&self) -> String {
        format!("{} ({})", self.timestamp, self.relative)
    }
}

/// One attached route of a machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteView {
    /// Route ID.
    pub id: String,
    /// Network prefix.
    pub prefix: String,
    /// Whether the machine advertises the route.
    pub advertised: bool,
    /// Whether the route is enabled.
    pub enabled: bool,
    /// Whether the prefix is a default route.
    pub exit: bool,
}

/// Everything the machines page shows for one machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MachineView {
    /// Machine ID.
    pub id: u64,
    /// Hostname reported by the machine.
    pub hostname: String,
    /// Name assigned in the tailnet.
    pub given_name: String,
    /// Owning user's ID.
    pub user_id: u64,
    /// Owning user's name.
    pub user_name: String,
    /// When the owning user was created, if known.
    pub user_created: Option<String>,
    /// Badge colour of the owning user.
    pub user_color: &'static str,
    /// Tailnet addresses.
    pub ip_addresses: Vec<String>,
    /// Forced tags without the `tag:` prefix.
    pub tags: Vec<String>,
    /// Attached routes, in API order.
    pub routes: Vec<RouteView>,
    /// Attached routes that are advertised and enabled.
    pub enabled_routes: usize,
    /// All attached routes.
    pub total_routes: usize,
    /// Attached default routes that are advertised and enabled.
    pub enabled_exit_routes: usize,
    /// Whether the machine is a usable exit node.
    pub exit_node: bool,
    /// Whether the machine is connected right now.
    pub online: bool,
    /// Last contact with the server.
    pub last_seen: TimeField,
    /// Last successful map update.
    pub last_update: TimeField,
    /// Registration time.
    pub created: TimeField,
    /// Node key expiry.
    pub expiry: ExpiryDisplay,
    /// Status badge class from last-seen age.
    pub status_color: ColorClass,
    /// First characters of the registering pre-auth key, or "None".
    pub preauth_key_prefix: String,
}

/// One row of a user's pre-auth key table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreAuthKeyRow {
    /// Key ID.
    pub id: String,
    /// Owning user name.
    pub user: String,
    /// First characters of the key.
    pub key_prefix: String,
    /// Whether the key can be used repeatedly.
    pub reusable: bool,
    /// Whether the key has been used.
    pub used: bool,
    /// Whether machines registered with it are ephemeral.
    pub ephemeral: bool,
    /// Whether the expiration has passed.
    pub expired: bool,
    /// Whether the key can still register a machine.
    pub usable: bool,
    /// Expiration in the display timezone, or "No expiration date".
    pub expiration: String,
    /// ACL tags applied by the key.
    pub acl_tags: Vec<String>,
}

/// A user together with their pre-auth key table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserKeys {
    /// User ID.
    pub user_id: u64,
    /// User name.
    pub name: String,
    /// Text colour of the user's status dot.
    pub color: &'static str,
    /// Key rows; a row that could not be computed is degraded in place.
    pub keys: Vec<Slot<PreAuthKeyRow>>,
}

impl UserKeys {
    /// Number of keys that are currently usable.
    #[must_use]
    pub fn usable_count(&self) -> usize {
        self.keys
            .iter()
            .filter_map(Slot::ready)
            .filter(|row| row.usable)
            .count()
    }
}
