use crate::cli::commands::resolve_driver;
use crate::cli::parser::{Cli, Commands, RideAction};
use crate::config::Config;
use crate::core::clock::SystemClock;
use crate::core::ride::RideLogic;
use crate::db::initialize::open_database;
use crate::db::queries::find_active_shift;
use crate::errors::{AppError, AppResult};
use crate::models::ride::{Coordinates, Ride, RideEdit};
use crate::ui::messages::{field, header, info, success, warning};
use crate::utils::colors::{CYAN, RESET};
use crate::utils::formatting::{cents2readable, km2readable, optional};
use crate::utils::table::Table;
use crate::utils::time::{
    format_duration_ms, format_optional_timestamp, format_timestamp, parse_optional_timestamp,
};

/// Parse `LAT,LNG`.
fn parse_point(raw: &str) -> AppResult<(f64, f64)> {
    let (lat, lng) = raw
        .split_once(',')
        .ok_or_else(|| AppError::Validation(format!("Expected LAT,LNG, got '{raw}'")))?;
    let parse = |v: &str| {
        v.trim()
            .parse::<f64>()
            .map_err(|_| AppError::Validation(format!("Invalid coordinate '{v}' in '{raw}'")))
    };
    Ok((parse(lat)?, parse(lng)?))
}

pub fn handle(cli: &Cli, cfg: &Config) -> AppResult<()> {
    let Commands::Ride { action } = &cli.command else {
        return Ok(());
    };

    let driver = resolve_driver(cli, cfg)?;
    let pool = open_database(cfg)?;
    let clock = SystemClock;
    let logic = RideLogic::new(&pool.conn, &clock, cfg);

    match action {
        RideAction::CanStart => {
            let eligibility = logic.can_start(&driver)?;
            match eligibility.reason {
                None => success("A ride can start now"),
                Some(reason) => warning(reason.message()),
            }
        }
        RideAction::Start {
            from,
            to,
            score,
            address,
            at,
        } => {
            let (start_lat, start_lng) = parse_point(from)?;
            let (dest_lat, dest_lng) = parse_point(to)?;
            let shift = find_active_shift(&pool.conn, &driver)?.ok_or_else(|| {
                AppError::NotFound(format!("No active shift for driver {driver}"))
            })?;

            let started = logic.start(
                &driver,
                shift.id,
                Coordinates::new(start_lat, start_lng, dest_lat, dest_lng),
                *score,
                parse_optional_timestamp(at.as_ref())?,
                address.as_deref(),
            )?;
            success(format!(
                "Ride {} started at {} (score {})",
                started.ride_id,
                format_timestamp(started.start_time),
                started.predicted_score
            ));
        }
        RideAction::End {
            id,
            fare,
            distance,
            at,
        } => {
            let m = logic.end(
                &driver,
                *id,
                *fare,
                *distance,
                parse_optional_timestamp(at.as_ref())?,
            )?;
            success(format!("Ride {} ended", m.ride_id));
            field("duration", format_duration_ms(m.total_time_ms));
            field("fare", cents2readable(m.earning_cents));
            field("distance", km2readable(m.distance_km));
            field("per minute", cents2readable(m.earning_per_min));
        }
        RideAction::Status { json } => {
            let status = logic.status(&driver)?;
            if *json {
                let out = serde_json::to_string_pretty(&status)
                    .map_err(|e| AppError::Other(e.to_string()))?;
                println!("{out}");
                return Ok(());
            }

            header(format!("Ride {}", status.ride_id));
            field("shift", status.shift_id);
            field(
                "from",
                format!("{:.5}, {:.5}", status.start_latitude, status.start_longitude),
            );
            field(
                "to",
                format!(
                    "{:.5}, {:.5}",
                    status.destination_latitude, status.destination_longitude
                ),
            );
            field("address", &status.address);
            field("started", format_timestamp(status.start_time));
            field(
                "elapsed",
                format!("{CYAN}{}{RESET}", format_duration_ms(status.elapsed_time_ms)),
            );
        }
        RideAction::List => {
            let rides = logic.rides_for_driver(&driver)?;
            print_rides(&rides);
        }
        RideAction::Edit { id, set } => {
            let edit = RideEdit::from_assignments(set)?;
            let ride = logic.edit(&driver, *id, &edit)?;
            success(format!("Ride {} updated", ride.id));
        }
        RideAction::Delete { id } => {
            logic.delete(&driver, *id)?;
            success(format!("Ride {id} deleted"));
        }
        RideAction::Restore { id } => {
            logic.restore(&driver, *id)?;
            success(format!("Ride {id} restored"));
        }
    }

    Ok(())
}

fn print_rides(rides: &[Ride]) {
    if rides.is_empty() {
        info("No rides recorded");
        return;
    }

    let mut table = Table::new(vec![
        "ID", "SHIFT", "START", "END", "SCORE", "FARE", "KM", "PER MIN", "ADDRESS",
    ]);
    for r in rides {
        table.add_row(vec![
            r.id.to_string(),
            r.shift_id.to_string(),
            format_timestamp(r.start_time),
            format_optional_timestamp(r.end_time),
            r.predicted_score.to_string(),
            optional(r.earning_cents.map(cents2readable)),
            optional(r.distance_km.map(|km| format!("{km:.1}"))),
            optional(r.earning_per_min.map(cents2readable)),
            r.address.clone(),
        ]);
    }
    print!("{}", table.render());
}
