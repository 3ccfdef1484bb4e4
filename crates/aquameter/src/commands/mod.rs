//! Command handlers, one module per top-level subcommand.

pub mod config_cmd;
pub mod sensors;
pub mod status;
pub mod util;
pub mod validate;
pub mod watch;
