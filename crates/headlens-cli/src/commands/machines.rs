//! Machines command implementation.

use std::io::Write;

use headlens_api::HeadscaleApi;
use headlens_core::Aggregator;
use tracing::info;

use crate::error::CliError;
use crate::output::{MachineList, OutputFormat};

/// Machines command executor.
pub struct MachinesCommand<'a, A> {
    aggregator: &'a Aggregator<A>,
}

impl<'a, A: HeadscaleApi + 'static> MachinesCommand<'a, A> {
    /// Create a new machines command.
    #[must_use]
    pub const fn new(aggregator: &'a Aggregator<A>) -> Self {
        Self { aggregator }
    }

    /// Execute the machines command.
    ///
    /// # Errors
    ///
    /// Returns an error if the machine list cannot be fetched, every
    /// machine fails, or output fails.
    pub async fn execute<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
    ) -> Result<(), CliError> {
        let machines = self.aggregator.machine_views().await?;
        let degraded = machines.iter().filter(|s| !s.is_ready()).count();
        info!(total = machines.len(), degraded, "Machine views ready");
        format.write(writer, &MachineList { machines })
    }
}
