use crate::cli::commands::resolve_driver;
use crate::cli::parser::{Cli, Commands, ShiftAction};
use crate::config::Config;
use crate::core::clock::{Clock, SystemClock};
use crate::core::pause_ledger::PauseLedger;
use crate::core::shift::ShiftLogic;
use crate::db::initialize::open_database;
use crate::errors::{AppError, AppResult};
use crate::models::shift::{Shift, ShiftEdit, ShiftSummary};
use crate::models::signal_type::SignalType;
use crate::ui::messages::{field, header, info, success};
use crate::utils::colors::{RESET, color_for_signal};
use crate::utils::formatting::{cents2readable, km2readable, optional};
use crate::utils::table::Table;
use crate::utils::time::{
    format_duration_ms, format_optional_timestamp, format_timestamp, parse_optional_duration,
    parse_optional_timestamp,
};

pub fn handle(cli: &Cli, cfg: &Config) -> AppResult<()> {
    let Commands::Shift { action } = &cli.command else {
        return Ok(());
    };

    let driver = resolve_driver(cli, cfg)?;
    let pool = open_database(cfg)?;
    let clock = SystemClock;
    let logic = ShiftLogic::new(&pool.conn, &clock, cfg);

    let at = |raw: &Option<String>| -> AppResult<i64> {
        Ok(parse_optional_timestamp(raw.as_ref())?.unwrap_or_else(|| clock.now_ms()))
    };

    match action {
        ShiftAction::Start { at: ts, planned } => {
            let planned = parse_optional_duration(planned.as_ref())?;
            let shift = logic.handle_start(&driver, at(ts)?, planned)?;
            success(format!(
                "Shift {} started at {} (planned {})",
                shift.id,
                format_timestamp(shift.start_time),
                format_duration_ms(shift.planned_duration_ms.unwrap_or(0))
            ));
        }
        ShiftAction::Pause { at: ts, planned } => {
            let planned = parse_optional_duration(planned.as_ref())?;
            let sig = logic.handle_pause(&driver, at(ts)?, planned)?;
            info(format!("Break started at {}", format_timestamp(sig.timestamp)));
        }
        ShiftAction::Continue { at: ts } => {
            let pause = logic.handle_continue(&driver, at(ts)?)?;
            success(format!(
                "Back to work after {}",
                format_duration_ms(pause.duration_ms)
            ));
        }
        ShiftAction::SkipPause { at: ts } => {
            let pause = logic.skip_pause(&driver, at(ts)?)?;
            info(format!(
                "Break skipped at {}",
                format_timestamp(pause.pause_start)
            ));
        }
        ShiftAction::Stop { at: ts } => {
            let summary = logic.handle_stop(&driver, at(ts)?)?;
            success(format!("Shift {} stopped", summary.shift_id));
            print_summary(&summary);
        }
        ShiftAction::Status { json } => {
            let status = logic.current_status(&driver)?;
            if *json {
                let out = serde_json::to_string_pretty(&status)
                    .map_err(|e| AppError::Other(e.to_string()))?;
                println!("{out}");
                return Ok(());
            }

            match status {
                None => info(format!("Driver {driver} is off shift")),
                Some(s) => {
                    let state = if s.is_paused {
                        SignalType::Pause
                    } else {
                        SignalType::Start
                    };
                    header(format!("Shift {}", s.shift_id));
                    field(
                        "state",
                        format!(
                            "{}{}{}",
                            color_for_signal(state),
                            if s.is_paused { "on break" } else { "working" },
                            RESET
                        ),
                    );
                    field("started", format_timestamp(s.shift_start_time));
                    field(
                        "elapsed",
                        format_duration_ms(clock.now_ms() - s.shift_start_time),
                    );
                    field(
                        "planned",
                        optional(s.planned_duration_ms.map(format_duration_ms)),
                    );
                    field("break since", format_optional_timestamp(s.pause_start_time));
                    let pause = PauseLedger::new(&pool.conn).pause_info(&driver, clock.now_ms())?;
                    field(
                        "break elapsed",
                        optional(pause.elapsed_pause_ms.map(format_duration_ms)),
                    );
                    field(
                        "last break end",
                        format_optional_timestamp(s.last_pause_end_time),
                    );
                }
            }
        }
        ShiftAction::List => {
            let shifts = logic.shifts_for_driver(&driver)?;
            print_shifts(&shifts);
        }
        ShiftAction::Edit { id, start, end } => {
            let edit = ShiftEdit {
                start_time: parse_optional_timestamp(start.as_ref())?,
                end_time: parse_optional_timestamp(end.as_ref())?,
            };
            let shift = logic.edit_shift(&driver, *id, &edit)?;
            success(format!("Shift {} updated", shift.id));
            print_summary(&shift.summary());
        }
        ShiftAction::Delete { id } => {
            logic.delete_shift(&driver, *id)?;
            success(format!("Shift {id} deleted"));
        }
        ShiftAction::Restore { id } => {
            logic.restore_shift(&driver, *id)?;
            success(format!("Shift {id} restored"));
        }
    }

    Ok(())
}

fn print_summary(s: &ShiftSummary) {
    field("total", format_duration_ms(s.total_duration_ms));
    field("work", format_duration_ms(s.work_time_ms));
    field(
        "breaks",
        format!(
            "{} ({}x, avg {})",
            format_duration_ms(s.break_time_ms),
            s.num_breaks,
            format_duration_ms(s.avg_break_ms)
        ),
    );
    field("rides", s.number_of_rides);
    field("earnings", cents2readable(s.total_earnings_cents));
    field("distance", km2readable(s.total_distance_km));
}

fn print_shifts(shifts: &[Shift]) {
    if shifts.is_empty() {
        info("No shifts recorded");
        return;
    }

    let mut table = Table::new(vec!["ID", "START", "END", "WORK", "BREAK", "RIDES", "EARNED"]);
    for s in shifts {
        table.add_row(vec![
            s.id.to_string(),
            format_timestamp(s.start_time),
            format_optional_timestamp(s.end_time),
            optional(s.work_time_ms.map(format_duration_ms)),
            optional(s.break_time_ms.map(format_duration_ms)),
            optional(s.number_of_rides),
            optional(s.total_earnings_cents.map(cents2readable)),
        ]);
    }
    print!("{}", table.render());
}
