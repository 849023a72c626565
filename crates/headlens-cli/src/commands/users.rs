//! Users command implementation.

use std::io::Write;

use headlens_api::HeadscaleApi;
use headlens_core::Aggregator;
use tracing::info;

use crate::error::CliError;
use crate::output::{OutputFormat, UserKeyList};

/// Users command executor.
pub struct UsersCommand<'a, A> {
    aggregator: &'a Aggregator<A>,
}

impl<'a, A: HeadscaleApi + 'static> UsersCommand<'a, A> {
    /// Create a new users command.
    #[must_use]
    pub const fn new(aggregator: &'a Aggregator<A>) -> Self {
        Self { aggregator }
    }

    /// Execute the users command.
    ///
    /// # Errors
    ///
    /// Returns an error if the user list cannot be fetched, every user
    /// fails, or output fails.
    pub async fn execute<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
    ) -> Result<(), CliError> {
        let users = self.aggregator.user_keys().await?;
        info!(total = users.len(), "User key tables ready");
        format.write(writer, &UserKeyList { users })
    }
}
