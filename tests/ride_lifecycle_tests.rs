use shiftledger::config::Config;
use shiftledger::core::clock::FixedClock;
use shiftledger::core::ride::RideLogic;
use shiftledger::core::shift::ShiftLogic;
use shiftledger::db::pool::DbPool;
use shiftledger::db::queries;
use shiftledger::models::ride::{Coordinates, Ride, RideBlock, RideEdit};
use shiftledger::models::shift::Shift;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

mod common;
use common::{MINUTE, TestDb};

fn coords() -> Coordinates {
    Coordinates::new(45.46, 9.19, 45.48, 9.22)
}

#[test]
fn can_start_reports_each_blocking_reason() {
    let db = TestDb::new();
    let pool = db.pool();
    let cfg = db.config();
    let clock = FixedClock::at(0);
    let shifts = ShiftLogic::new(&pool.conn, &clock, &cfg);
    let rides = RideLogic::new(&pool.conn, &clock, &cfg);

    let e = rides.can_start("d1").unwrap();
    assert!(!e.allowed);
    assert_eq!(e.reason, Some(RideBlock::NoActiveShift));

    let shift = shifts.handle_start("d1", 0, None).unwrap();
    assert!(rides.can_start("d1").unwrap().allowed);

    shifts.handle_pause("d1", MINUTE, None).unwrap();
    assert_eq!(rides.can_start("d1").unwrap().reason, Some(RideBlock::ShiftPaused));
    let err = rides
        .start("d1", shift.id, coords(), 3, Some(2 * MINUTE), None)
        .unwrap_err();
    assert_eq!(err.kind(), "ValidationError");

    shifts.handle_continue("d1", 2 * MINUTE).unwrap();
    assert!(rides.can_start("d1").unwrap().allowed);
    assert!(!rides.has_active_ride("d1").unwrap());

    rides
        .start("d1", shift.id, coords(), 3, Some(3 * MINUTE), None)
        .unwrap();
    assert_eq!(rides.can_start("d1").unwrap().reason, Some(RideBlock::RideInProgress));
    assert!(rides.has_active_ride("d1").unwrap());
}

#[test]
fn start_validates_input_and_ownership() {
    let db = TestDb::new();
    let pool = db.pool();
    let cfg = db.config();
    let clock = FixedClock::at(0);
    let shifts = ShiftLogic::new(&pool.conn, &clock, &cfg);
    let rides = RideLogic::new(&pool.conn, &clock, &cfg);

    let mine = shifts.handle_start("d1", 0, None).unwrap();
    let theirs = shifts.handle_start("d2", 0, None).unwrap();

    let bad = Coordinates::new(95.0, 9.0, 45.0, 9.0);
    assert_eq!(
        rides.start("d1", mine.id, bad, 3, None, None).unwrap_err().kind(),
        "ValidationError"
    );
    assert_eq!(
        rides.start("d1", mine.id, coords(), 6, None, None).unwrap_err().kind(),
        "ValidationError"
    );
    assert_eq!(
        rides.start("d1", theirs.id, coords(), 3, None, None).unwrap_err().kind(),
        "NotAuthorized"
    );
    assert_eq!(
        rides.start("d1", 999, coords(), 3, None, None).unwrap_err().kind(),
        "NotFound"
    );

    shifts.handle_stop("d1", MINUTE).unwrap();
    assert_eq!(
        rides.start("d1", mine.id, coords(), 3, None, None).unwrap_err().kind(),
        "NotFound"
    );
}

#[test]
fn end_derives_earning_per_minute() {
    let db = TestDb::new();
    let pool = db.pool();
    let cfg = db.config();
    let clock = FixedClock::at(0);
    let shifts = ShiftLogic::new(&pool.conn, &clock, &cfg);
    let rides = RideLogic::new(&pool.conn, &clock, &cfg);

    let shift = shifts.handle_start("d1", 0, None).unwrap();
    clock.set(MINUTE);
    let started = rides.start("d1", shift.id, coords(), 4, None, None).unwrap();
    assert_eq!(started.start_time, MINUTE);

    let ride = queries::find_ride(&pool.conn, started.ride_id, false).unwrap().unwrap();
    assert_eq!(ride.address, "Address not provided");

    clock.set(4 * MINUTE);
    let status = rides.status("d1").unwrap();
    assert_eq!(status.elapsed_time_ms, 3 * MINUTE);

    let err = rides
        .end("d1", started.ride_id, 1_000, 2.0, Some(MINUTE))
        .unwrap_err();
    assert_eq!(err.kind(), "TemporalConstraintViolation");

    let metrics = rides
        .end("d1", started.ride_id, 1_000, 2.0, Some(7 * MINUTE))
        .unwrap();
    assert_eq!(metrics.total_time_ms, 6 * MINUTE);
    assert_eq!(metrics.earning_per_min, 167);

    let err = rides.end("d1", started.ride_id, 1_000, 2.0, None).unwrap_err();
    assert_eq!(err.kind(), "AlreadyEnded");
    assert_eq!(rides.end("d1", 999, 1_000, 2.0, None).unwrap_err().kind(), "NotFound");
    assert_eq!(rides.status("d1").unwrap_err().kind(), "NotFound");

    // The shift is still active: aggregates wait for stop.
    let shift = queries::find_shift(&pool.conn, shift.id, false).unwrap().unwrap();
    assert_eq!(shift.total_earnings_cents, None);
}

#[test]
fn concurrent_starts_on_one_shift_admit_exactly_one() {
    let db = TestDb::new();
    let cfg = db.config();

    let shift_id = {
        let pool = db.pool();
        let clock = FixedClock::at(0);
        ShiftLogic::new(&pool.conn, &clock, &cfg)
            .handle_start("d1", 0, None)
            .unwrap()
            .id
    };

    let barrier = Arc::new(Barrier::new(3));
    let handles: Vec<_> = (0..3)
        .map(|_| {
            let barrier = Arc::clone(&barrier);
            let path = db.path.clone();
            let cfg: Config = cfg.clone();
            thread::spawn(move || {
                let pool = DbPool::new(&path).unwrap();
                let clock = FixedClock::at(MINUTE);
                let rides = RideLogic::new(&pool.conn, &clock, &cfg);
                barrier.wait();
                rides
                    .start("d1", shift_id, coords(), 3, None, None)
                    .map(|r| r.ride_id)
                    .map_err(|e| (e.kind(), e.is_conflict()))
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let successes = results.iter().filter(|r| r.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|r| matches!(r, Err((_, true))))
        .count();
    assert_eq!(successes, 1, "{results:?}");
    assert_eq!(conflicts, 2, "{results:?}");

    let pool = db.pool();
    assert_eq!(queries::rides_for_shift(&pool.conn, shift_id, true).unwrap().len(), 1);
}

#[test]
fn storage_constraints_translate_to_conflicts() {
    let db = TestDb::new();
    let pool = db.pool();

    let shift_id = queries::insert_shift(&pool.conn, &Shift::new("d1", 0, None)).unwrap();
    let err = queries::insert_shift(&pool.conn, &Shift::new("d1", 10, None)).unwrap_err();
    assert_eq!(err.kind(), "ActiveShiftConflict");

    let ride = Ride::new(shift_id, "d1", coords(), "", 100, 3);
    queries::insert_ride(&pool.conn, &ride).unwrap();
    let err = queries::insert_ride(&pool.conn, &ride).unwrap_err();
    assert_eq!(err.kind(), "ActiveRideConflict");
}

#[test]
fn edits_recompute_earning_per_minute() {
    let db = TestDb::new();
    let pool = db.pool();
    let cfg = db.config();
    let clock = FixedClock::at(0);
    let shifts = ShiftLogic::new(&pool.conn, &clock, &cfg);
    let rides = RideLogic::new(&pool.conn, &clock, &cfg);

    let shift = shifts.handle_start("d1", 0, None).unwrap();
    let id = rides
        .start("d1", shift.id, coords(), 2, Some(0), Some("Piazza Duomo"))
        .unwrap()
        .ride_id;

    let edit = RideEdit::from_assignments(&["earning_cents=3000"]).unwrap();
    assert_eq!(rides.edit("d1", id, &edit).unwrap_err().kind(), "ActiveRideConflict");

    rides.end("d1", id, 1_500, 3.0, Some(10 * MINUTE)).unwrap();

    let ride = rides.edit("d1", id, &edit).unwrap();
    assert_eq!(ride.earning_per_min, Some(300));
    assert_eq!(ride.address, "Piazza Duomo");

    let later =
        RideEdit::from_assignments(&["end_time=1200000", "destination_latitude=45.5"]).unwrap();
    let ride = rides.edit("d1", id, &later).unwrap();
    assert_eq!(ride.earning_per_min, Some(150));
    assert_eq!(ride.destination_latitude, 45.5);

    for bad in [
        vec!["distance_km=0"],
        vec!["earning_cents=-5"],
        vec!["destination_longitude=200"],
    ] {
        let edit = RideEdit::from_assignments(&bad).unwrap();
        assert_eq!(rides.edit("d1", id, &edit).unwrap_err().kind(), "ValidationError");
    }

    let edit = RideEdit::from_assignments(&["end_time=0"]).unwrap();
    assert_eq!(
        rides.edit("d1", id, &edit).unwrap_err().kind(),
        "TemporalConstraintViolation"
    );
    assert_eq!(rides.edit("d2", id, &later).unwrap_err().kind(), "NotAuthorized");
}

#[test]
fn ride_changes_on_an_ended_shift_refresh_its_totals() {
    let db = TestDb::new();
    let pool = db.pool();
    let cfg = db.config();
    let clock = FixedClock::at(0);
    let shifts = ShiftLogic::new(&pool.conn, &clock, &cfg);
    let rides = RideLogic::new(&pool.conn, &clock, &cfg);

    let shift = shifts.handle_start("d1", 0, None).unwrap();
    let a = rides.start("d1", shift.id, coords(), 4, Some(0), None).unwrap().ride_id;
    rides.end("d1", a, 1_500, 3.0, Some(10 * MINUTE)).unwrap();
    let b = rides.start("d1", shift.id, coords(), 4, Some(20 * MINUTE), None).unwrap().ride_id;
    rides.end("d1", b, 500, 1.0, Some(30 * MINUTE)).unwrap();

    let summary = shifts.handle_stop("d1", 60 * MINUTE).unwrap();
    assert_eq!(summary.total_earnings_cents, 2_000);
    assert_eq!(summary.number_of_rides, 2);

    let stored = |id| queries::find_shift(&pool.conn, id, false).unwrap().unwrap();

    let err = rides.restore("d1", a).unwrap_err();
    assert_eq!(err.kind(), "ValidationError");

    rides.delete("d1", b).unwrap();
    assert_eq!(stored(shift.id).total_earnings_cents, Some(1_500));
    assert_eq!(stored(shift.id).number_of_rides, Some(1));
    assert_eq!(rides.rides_for_driver("d1").unwrap().len(), 1);
    // Pause data is untouched by ride-only recomputes.
    assert_eq!(stored(shift.id).work_time_ms, Some(60 * MINUTE));

    rides.restore("d1", b).unwrap();
    assert_eq!(stored(shift.id).total_earnings_cents, Some(2_000));

    let edit = RideEdit::from_assignments(&["earning_cents=2500"]).unwrap();
    rides.edit("d1", a, &edit).unwrap();
    assert_eq!(stored(shift.id).total_earnings_cents, Some(3_000));
}

#[test]
fn start_rechecks_the_shift_under_the_write_lock() {
    let db = TestDb::new();
    let cfg = db.config();

    let owner = db.pool();
    let shift_id = {
        let clock = FixedClock::at(0);
        ShiftLogic::new(&owner.conn, &clock, &cfg)
            .handle_start("d1", 0, None)
            .unwrap()
            .id
    };

    // Hold the write lock while the shift is closed.
    owner.conn.execute_batch("BEGIN IMMEDIATE").unwrap();
    owner
        .conn
        .execute(
            "UPDATE shifts SET end_time = ?1 WHERE id = ?2",
            rusqlite::params![10 * MINUTE, shift_id],
        )
        .unwrap();

    let path = db.path.clone();
    let worker_cfg = cfg.clone();
    let worker = thread::spawn(move || {
        let pool = DbPool::new(&path).unwrap();
        let clock = FixedClock::at(5 * MINUTE);
        RideLogic::new(&pool.conn, &clock, &worker_cfg)
            .start("d1", shift_id, coords(), 3, None, None)
            .map(|r| r.ride_id)
            .map_err(|e| e.kind())
    });

    thread::sleep(Duration::from_millis(200));
    owner.conn.execute_batch("COMMIT").unwrap();

    let result = worker.join().unwrap();
    assert_eq!(result, Err("NotFound"));
    assert!(queries::rides_for_shift(&owner.conn, shift_id, true).unwrap().is_empty());
}
