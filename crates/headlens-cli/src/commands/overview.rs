//! Overview command implementation.

use std::io::Write;

use headlens_api::HeadscaleApi;
use headlens_core::Aggregator;

use crate::error::CliError;
use crate::output::{OutputFormat, OverviewReport};

/// Overview command executor.
pub struct OverviewCommand<'a, A> {
    aggregator: &'a Aggregator<A>,
    server: String,
}

impl<'a, A: HeadscaleApi + 'static> OverviewCommand<'a, A> {
    /// Create a new overview command.
    #[must_use]
    pub fn new(aggregator: &'a Aggregator<A>, server: impl Into<String>) -> Self {
        Self {
            aggregator,
            server: server.into(),
        }
    }

    /// Execute the overview command.
    ///
    /// # Errors
    ///
    /// Returns an error if any list cannot be fetched or output fails.
    pub async fn execute<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
    ) -> Result<(), CliError> {
        let counts = self.aggregator.overview().await?;
        let report = OverviewReport {
            server: self.server.clone(),
            counts,
        };
        format.write(writer, &report)
    }
}
