pub mod audit;
pub mod bill_sessions;
pub mod config;
pub mod driver;
pub mod event_archive;
pub mod extract;
pub mod paths;
pub mod placement;
pub mod session_index;
pub mod util;
pub mod warn;
