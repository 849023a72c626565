//! Output formatting for CLI commands.
//!
//! Supports table (human-readable) and JSON output formats.

use std::io::Write;

use headlens_core::{
    EntityFailure, MachineView, OverviewCounts, PreAuthKeyRow, Slot, UNAVAILABLE, UserKeys,
};
use serde::Serialize;

use crate::cli::Format;
use crate::error::CliError;

/// Output formatter that handles both table and JSON output.
#[derive(Debug, Clone)]
pub struct OutputFormat {
    format: Format,
}

impl OutputFormat {
    /// Create a new output formatter.
    #[must_use]
    pub const fn new(format: Format) -> Self {
        Self { format }
    }

    /// Write a serializable value to the output.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write<W, T>(&self, writer: &mut W, value: &T) -> Result<(), CliError>
    where
        W: Write,
        T: Serialize + TableDisplay,
    {
        match self.format {
            Format::Json => {
                serde_json::to_writer_pretty(&mut *writer, value)
                    .map_err(|e| CliError::Format(format!("JSON serialization failed: {e}")))?;
                writeln!(writer)?;
            }
            Format::Table => {
                value.write_table(writer)?;
            }
        }
        Ok(())
    }

    /// Write a serializable value to a string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_string<T>(&self, value: &T) -> Result<String, CliError>
    where
        T: Serialize + TableDisplay,
    {
        let mut buf = Vec::new();
        self.write(&mut buf, value)?;
        String::from_utf8(buf).map_err(|e| CliError::Format(format!("UTF-8 error: {e}")))
    }
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::new(Format::Table)
    }
}

/// Trait for types that can be displayed as a table.
pub trait TableDisplay {
    /// Write the value as a human-readable table.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError>;
}

/// Machines page.
#[derive(Debug, Clone, Serialize)]
pub struct MachineList {
    /// One slot per machine, in server order.
    pub machines: Vec<Slot<MachineView>>,
}

impl TableDisplay for MachineList {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        if self.machines.is_empty() {
            writeln!(writer, "No machines registered")?;
            return Ok(());
        }

        writeln!(
            writer,
            "{:>4}  {:<20}  {:<12}  {:<15}  {:>6}  {:<4}  {:<7}  {:<20}  {:<12}",
            "ID", "NAME", "USER", "ADDRESS", "ROUTES", "EXIT", "STATUS", "LAST SEEN", "KEY"
        )?;
        writeln!(writer, "{}", "─".repeat(116))?;

        for slot in &self.machines {
            match slot {
                Slot::Ready(m) => writeln!(
                    writer,
                    "{:>4}  {:<20}  {:<12}  {:<15}  {:>6}  {:<4}  {:<7}  {:<20}  {:<12}",
                    m.id,
                    truncate(&m.given_name, 20),
                    truncate(&m.user_name, 12),
                    m.ip_addresses.first().map_or("-", String::as_str),
                    format!("{}/{}", m.enabled_routes, m.total_routes),
                    if m.exit_node { "yes" } else { "no" },
                    if m.online { "online" } else { "offline" },
                    truncate(&m.last_seen.relative, 20),
                    m.preauth_key_prefix,
                )?,
                Slot::Unavailable(failure) => write_unavailable(writer, failure)?,
            }
        }

        for m in self.machines.iter().filter_map(Slot::ready) {
            writeln!(writer)?;
            write_machine_detail(writer, m)?;
        }

        writeln!(writer)?;
        writeln!(writer, "Total: {} machine(s)", self.machines.len())?;
        Ok(())
    }
}

fn write_machine_detail<W: Write>(writer: &mut W, m: &MachineView) -> Result<(), CliError> {
    writeln!(writer, "{} ({})", m.given_name, m.hostname)?;
    writeln!(writer, "  Addresses:    {}", m.ip_addresses.join(", "))?;
    if !m.tags.is_empty() {
        writeln!(writer, "  Tags:         {}", m.tags.join(", "))?;
    }
    writeln!(writer, "  Last seen:    {}", m.last_seen.display())?;
    writeln!(writer, "  Last update:  {}", m.last_update.display())?;
    writeln!(writer, "  Created:      {}", m.created.display())?;
    let soon = if m.expiry.expiring_soon { " [expiring soon]" } else { "" };
    writeln!(writer, "  Expiry:       {}{soon}", m.expiry.text)?;
    for route in &m.routes {
        let state = match (route.advertised, route.enabled) {
            (true, true) => "enabled",
            (true, false) => "pending",
            (false, _) => "not advertised",
        };
        let exit = if route.exit { " (exit)" } else { "" };
        writeln!(writer, "  Route:        {}{exit} {state}", route.prefix)?;
    }
    Ok(())
}

/// Users page.
#[derive(Debug, Clone, Serialize)]
pub struct UserKeyList {
    /// One slot per user, in server order.
    pub users: Vec<Slot<UserKeys>>,
}

impl TableDisplay for UserKeyList {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        if self.users.is_empty() {
            writeln!(writer, "No users")?;
            return Ok(());
        }

        for (n, slot) in self.users.iter().enumerate() {
            if n > 0 {
                writeln!(writer)?;
            }
            match slot {
                Slot::Ready(user) => write_user(writer, user)?,
                Slot::Unavailable(failure) => write_unavailable(writer, failure)?,
            }
        }

        writeln!(writer)?;
        writeln!(writer, "Total: {} user(s)", self.users.len())?;
        Ok(())
    }
}

fn write_user<W: Write>(writer: &mut W, user: &UserKeys) -> Result<(), CliError> {
    writeln!(
        writer,
        "{} (id {}, {} usable key(s))",
        user.name,
        user.user_id,
        user.usable_count()
    )?;
    if user.keys.is_empty() {
        writeln!(writer, "  No pre-auth keys")?;
        return Ok(());
    }

    writeln!(
        writer,
        "  {:>4}  {:<12}  {:<8}  {:<5}  {:<9}  {:<6}  {:<40}  {}",
        "ID", "KEY", "REUSABLE", "USED", "EPHEMERAL", "USABLE", "EXPIRATION", "TAGS"
    )?;
    for slot in &user.keys {
        match slot {
            Slot::Ready(key) => write_key(writer, key)?,
            Slot::Unavailable(failure) => {
                write!(writer, "  ")?;
                write_unavailable(writer, failure)?;
            }
        }
    }
    Ok(())
}

fn write_key<W: Write>(writer: &mut W, key: &PreAuthKeyRow) -> Result<(), CliError> {
    writeln!(
        writer,
        "  {:>4}  {:<12}  {:<8}  {:<5}  {:<9}  {:<6}  {:<40}  {}",
        key.id,
        key.key_prefix,
        yes_no(key.reusable),
        yes_no(key.used),
        yes_no(key.ephemeral),
        yes_no(key.usable),
        truncate(&key.expiration, 40),
        key.acl_tags.join(","),
    )?;
    Ok(())
}

/// Overview page.
#[derive(Debug, Clone, Serialize)]
pub struct OverviewReport {
    /// Headscale server URL.
    pub server: String,
    /// Server-wide counters.
    pub counts: OverviewCounts,
}

impl TableDisplay for OverviewReport {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        let c = &self.counts;
        writeln!(writer, "Headscale Overview")?;
        writeln!(writer, "══════════════════════════════════")?;
        writeln!(writer, "Server:           {}", self.server)?;
        writeln!(writer)?;
        writeln!(writer, "Machines:         {}", c.machines)?;
        writeln!(writer, "Users:            {}", c.users)?;
        writeln!(writer, "Usable keys:      {}", c.usable_keys)?;
        writeln!(writer)?;
        writeln!(writer, "Routes")?;
        writeln!(writer, "  Enabled:        {}/{}", c.enabled_routes, c.total_routes)?;
        writeln!(writer, "  Exit routes:    {}/{}", c.enabled_exit_routes, c.exit_routes)?;
        Ok(())
    }
}

fn write_unavailable<W: Write>(writer: &mut W, failure: &EntityFailure) -> Result<(), CliError> {
    writeln!(
        writer,
        "{:>4}  {:<20}  {UNAVAILABLE} ({})",
        "-",
        truncate(&failure.label, 20),
        failure.message
    )?;
    Ok(())
}

const fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

/// Truncate a string to a maximum length, adding "..." if truncated.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let mut out: String = s.chars().take(max_len - 3).collect();
        out.push_str("...");
        out
    }
}
