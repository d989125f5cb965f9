use crate::cli::commands::resolve_driver;
use crate::cli::parser::{Cli, Commands};
use crate::config::Config;
use crate::core::clock::SystemClock;
use crate::core::sweeper::Sweeper;
use crate::db::initialize::open_database;
use crate::errors::AppResult;
use crate::ui::messages::{field, success, warning};

pub fn handle(cli: &Cli, cfg: &Config) -> AppResult<()> {
    let Commands::Sweep { mine } = &cli.command else {
        return Ok(());
    };

    let pool = open_database(cfg)?;
    let clock = SystemClock;
    let sweeper = Sweeper::new(&pool.conn, &clock, cfg);

    let report = if *mine {
        sweeper.sweep_driver(&resolve_driver(cli, cfg)?)?
    } else {
        sweeper.sweep()?
    };

    success("Reconciliation completed");
    field("expired rides", report.expired_rides);
    field("closed shifts", report.closed_shifts);
    field("purged shifts", report.purged_shifts);
    if report.failures > 0 {
        warning(format!("{} items could not be reconciled", report.failures));
    }

    Ok(())
}
