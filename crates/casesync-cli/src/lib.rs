//! Command-line surface for the casesync bridge: clap arguments and the
//! translation of parsed arguments into one runtime configuration value.

pub mod cli_args;
pub mod cli_types;
pub mod runtime_config;

pub use cli_args::{Cli, CliCommand};
pub use cli_types::CliAiProvider;
pub use runtime_config::{
    build_invocation, default_credentials_path, CaseSyncCommand, CaseSyncInvocation,
};
