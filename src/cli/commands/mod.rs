pub mod config;
pub mod init;
pub mod log;
pub mod ride;
pub mod shift;
pub mod stats;
pub mod sweep;

use crate::cli::parser::Cli;
use crate::config::Config;
use crate::errors::{AppError, AppResult};

/// Driver for this invocation: `--driver`, else `default_driver`.
pub(crate) fn resolve_driver(cli: &Cli, cfg: &Config) -> AppResult<String> {
    cli.driver
        .clone()
        .or_else(|| cfg.default_driver.clone())
        .filter(|d| !d.trim().is_empty())
        .ok_or_else(|| {
            AppError::Config("No driver given: pass --driver or set default_driver".into())
        })
}
