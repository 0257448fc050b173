//! Reading activity exports and the users directory.

pub mod directory;
pub mod loader;

pub use directory::AgentDirectory;
pub use loader::load_records;
