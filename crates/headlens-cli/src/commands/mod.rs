//! Command implementations.

mod machines;
mod overview;
mod users;

pub use machines::MachinesCommand;
pub use overview::OverviewCommand;
pub use users::UsersCommand;
