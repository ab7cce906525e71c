//! Shared runtime support for the RoleKeeper crates.

pub mod logging;

pub use logging::init_logging;
