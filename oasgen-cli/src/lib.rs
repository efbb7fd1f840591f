// Offline stand-in for a live API, used by the request-data command
pub mod collaborator;

// Re-export CLI types and functions for testing
pub mod cli;
pub use cli::{Cli, Commands, run_with_cli};
pub use collaborator::OfflineCollaborator;
