use crate::cli::commands::resolve_driver;
use crate::cli::parser::{Cli, Commands};
use crate::config::Config;
use crate::core::calculator::period::{PeriodReport, PeriodView, period_report};
use crate::db::initialize::open_database;
use crate::errors::{AppError, AppResult};
use crate::ui::messages::{field, header};
use crate::utils::formatting::cents2readable;
use crate::utils::table::Table;
use crate::utils::time::{format_duration_ms, parse_date};

pub fn handle(cli: &Cli, cfg: &Config) -> AppResult<()> {
    let Commands::Stats {
        from,
        to,
        view,
        json,
    } = &cli.command
    else {
        return Ok(());
    };

    let driver = resolve_driver(cli, cfg)?;
    let from = parse_date(from)?;
    let to = parse_date(to)?;
    let view = PeriodView::from_name(view)?;

    let pool = open_database(cfg)?;
    let report = period_report(&pool.conn, &driver, from, to, view)?;

    if *json {
        let out = serde_json::to_string_pretty(&report)
            .map_err(|e| AppError::Other(e.to_string()))?;
        println!("{out}");
        return Ok(());
    }

    print_report(&report);
    Ok(())
}

fn print_report(report: &PeriodReport) {
    header(format!("Driver stats {} .. {}", report.from, report.to));

    let mut table = Table::new(vec![
        "DATE", "DAY", "SHIFTS", "RIDES", "EARNED", "ON TRIP", "EMPTY",
    ]);
    for day in &report.days {
        table.add_row(vec![
            day.date.format("%Y-%m-%d").to_string(),
            day.label.clone(),
            day.shifts.len().to_string(),
            day.ride_count.to_string(),
            cents2readable(day.earnings_cents),
            format_duration_ms(day.with_passenger_ms),
            format_duration_ms(day.empty_ms),
        ]);
    }
    print!("{}", table.render());

    field("total earned", cents2readable(report.total_earnings_cents));
}
