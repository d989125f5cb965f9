use shiftledger::core::clock::FixedClock;
use shiftledger::db::pool::DbPool;
use shiftledger::core::ride::RideLogic;
use shiftledger::core::shift::{ShiftLogic, SignalOutcome};
use shiftledger::db::queries;
use shiftledger::models::ride::Coordinates;
use shiftledger::models::shift::ShiftEdit;
use shiftledger::models::signal_type::SignalType;
use std::sync::{Arc, Barrier};
use std::thread;

mod common;
use common::{HOUR, MINUTE, TestDb};

fn coords() -> Coordinates {
    Coordinates::new(45.46, 9.19, 45.48, 9.22)
}

#[test]
fn pause_continue_stop_produces_expected_aggregates() {
    let db = TestDb::new();
    let pool = db.pool();
    let cfg = db.config();
    let clock = FixedClock::at(0);
    let logic = ShiftLogic::new(&pool.conn, &clock, &cfg);

    let shift = logic.handle_start("d1", 0, None).unwrap();
    logic.handle_pause("d1", 1_000, None).unwrap();
    let pause = logic.handle_continue("d1", 4_000).unwrap();

    assert_eq!(pause.pause_start, 1_000);
    assert_eq!(pause.pause_end, 4_000);
    assert_eq!(pause.duration_ms, 3_000);

    let summary = logic.handle_stop("d1", 10_000).unwrap();
    assert_eq!(summary.total_duration_ms, 10_000);
    assert_eq!(summary.break_time_ms, 3_000);
    assert_eq!(summary.work_time_ms, 7_000);
    assert_eq!(summary.num_breaks, 1);
    assert_eq!(summary.avg_break_ms, 3_000);
    assert_eq!(summary.number_of_rides, 0);

    assert!(queries::signals_for_shift(&pool.conn, shift.id).unwrap().is_empty());
    let stored = logic.shift_by_id("d1", shift.id).unwrap();
    assert_eq!(stored.end_time, Some(10_000));
    assert_eq!(stored.work_time_ms, Some(7_000));
    assert!(logic.current_status("d1").unwrap().is_none());
}

#[test]
fn skip_pause_records_zero_length_break() {
    let db = TestDb::new();
    let pool = db.pool();
    let cfg = db.config();
    let clock = FixedClock::at(0);
    let logic = ShiftLogic::new(&pool.conn, &clock, &cfg);

    let shift = logic.handle_start("d1", 0, None).unwrap();
    let pause = logic.skip_pause("d1", 5_000).unwrap();
    assert_eq!(pause.duration_ms, 0);
    assert_eq!(pause.pause_start, 5_000);

    let status = logic.current_status("d1").unwrap().unwrap();
    assert!(!status.is_paused);
    assert_eq!(status.last_pause_end_time, Some(5_000));
    assert!(logic.driver_is_available("d1").unwrap());

    // A real pause at the same instant is still accepted.
    logic.handle_pause("d1", 5_000, None).unwrap();
    logic.handle_continue("d1", 6_000).unwrap();

    let summary = logic.handle_stop("d1", 8_000).unwrap();
    assert_eq!(summary.num_breaks, 2);
    assert_eq!(summary.break_time_ms, 1_000);
    assert_eq!(queries::pauses_for_shift(&pool.conn, shift.id).unwrap().len(), 2);
}

#[test]
fn illegal_signals_are_rejected_with_the_candidate() {
    let db = TestDb::new();
    let pool = db.pool();
    let cfg = db.config();
    let clock = FixedClock::at(0);
    let logic = ShiftLogic::new(&pool.conn, &clock, &cfg);

    let err = logic.handle_pause("d1", 0, None).unwrap_err();
    assert_eq!(err.kind(), "InvalidTransition");
    assert_eq!(err.to_string(), "Invalid signal transition: pause");

    logic.handle_start("d1", 0, None).unwrap();

    let err = logic.handle_continue("d1", 100).unwrap_err();
    assert_eq!(err.to_string(), "Invalid signal transition: continue");

    let err = logic.handle_start("d1", 100, None).unwrap_err();
    assert_eq!(err.kind(), "ActiveShiftConflict");

    logic.handle_pause("d1", 200, None).unwrap();
    let err = logic.handle_pause("d1", 300, None).unwrap_err();
    assert_eq!(err.kind(), "InvalidTransition");

    // Failed signals leave no trace.
    let shift = queries::find_active_shift(&pool.conn, "d1").unwrap().unwrap();
    let kinds: Vec<SignalType> = queries::signals_for_shift(&pool.conn, shift.id)
        .unwrap()
        .into_iter()
        .map(|s| s.signal)
        .collect();
    assert_eq!(kinds, vec![SignalType::Start, SignalType::Pause]);
}

#[test]
fn signals_may_not_go_back_in_time() {
    let db = TestDb::new();
    let pool = db.pool();
    let cfg = db.config();
    let clock = FixedClock::at(0);
    let logic = ShiftLogic::new(&pool.conn, &clock, &cfg);

    logic.handle_start("d1", 10_000, None).unwrap();
    logic.handle_pause("d1", 20_000, None).unwrap();

    let err = logic.handle_continue("d1", 15_000).unwrap_err();
    assert_eq!(err.kind(), "TemporalConstraintViolation");

    let err = logic.handle_stop("d1", 5_000).unwrap_err();
    assert_eq!(err.kind(), "TemporalConstraintViolation");
    assert!(queries::pauses_for_shift(&pool.conn, 1).unwrap().is_empty());
}

#[test]
fn dispatch_by_signal_type() {
    let db = TestDb::new();
    let pool = db.pool();
    let cfg = db.config();
    let clock = FixedClock::at(0);
    let logic = ShiftLogic::new(&pool.conn, &clock, &cfg);

    let started = logic.handle_signal("d1", SignalType::Start, 0, None).unwrap();
    assert!(matches!(
        started,
        SignalOutcome::Started(ref s) if s.planned_duration_ms == Some(8 * HOUR)
    ));

    let paused = logic
        .handle_signal("d1", SignalType::Pause, MINUTE, Some(30 * MINUTE))
        .unwrap();
    assert!(matches!(
        paused,
        SignalOutcome::Paused(ref s) if s.planned_pause_duration_ms == Some(30 * MINUTE)
    ));

    let status = logic.current_status("d1").unwrap().unwrap();
    assert!(status.is_paused);
    assert_eq!(status.pause_start_time, Some(MINUTE));
    assert_eq!(status.planned_pause_duration_ms, Some(30 * MINUTE));
    assert!(!logic.driver_is_available("d1").unwrap());

    let cont = logic.handle_signal("d1", SignalType::Continue, 2 * MINUTE, None).unwrap();
    assert!(matches!(cont, SignalOutcome::Continued(ref p) if p.duration_ms == MINUTE));

    let stopped = logic.handle_signal("d1", SignalType::Stop, HOUR, None).unwrap();
    assert!(matches!(stopped, SignalOutcome::Stopped(ref s) if s.work_time_ms == HOUR - MINUTE));
}

#[test]
fn active_ride_freezes_the_shift() {
    let db = TestDb::new();
    let pool = db.pool();
    let cfg = db.config();
    let clock = FixedClock::at(0);
    let shifts = ShiftLogic::new(&pool.conn, &clock, &cfg);
    let rides = RideLogic::new(&pool.conn, &clock, &cfg);

    let shift = shifts.handle_start("d1", 0, None).unwrap();
    let ride = rides
        .start("d1", shift.id, coords(), 4, Some(MINUTE), None)
        .unwrap();

    for err in [
        shifts.handle_stop("d1", 2 * MINUTE).unwrap_err(),
        shifts.handle_pause("d1", 2 * MINUTE, None).unwrap_err(),
        shifts.skip_pause("d1", 2 * MINUTE).unwrap_err(),
        shifts.end_shift_by_id("d1", shift.id, 2 * MINUTE).unwrap_err(),
    ] {
        assert_eq!(err.kind(), "ActiveRideConflict");
    }

    rides
        .end("d1", ride.ride_id, 1_500, 3.5, Some(11 * MINUTE))
        .unwrap();
    let summary = shifts.handle_stop("d1", 20 * MINUTE).unwrap();
    assert_eq!(summary.number_of_rides, 1);
    assert_eq!(summary.total_earnings_cents, 1_500);
    assert!((summary.total_distance_km - 3.5).abs() < f64::EPSILON);
}

#[test]
fn end_shift_by_id_checks_owner_and_state() {
    let db = TestDb::new();
    let pool = db.pool();
    let cfg = db.config();
    let clock = FixedClock::at(0);
    let logic = ShiftLogic::new(&pool.conn, &clock, &cfg);

    let shift = logic.handle_start("d1", 0, None).unwrap();

    let err = logic.end_shift_by_id("d2", shift.id, HOUR).unwrap_err();
    assert_eq!(err.kind(), "NotAuthorized");

    let summary = logic.end_shift_by_id("d1", shift.id, HOUR).unwrap();
    assert_eq!(summary.total_duration_ms, HOUR);

    let err = logic.end_shift_by_id("d1", shift.id, 2 * HOUR).unwrap_err();
    assert_eq!(err.kind(), "AlreadyEnded");

    let err = logic.end_shift_by_id("d1", 999, HOUR).unwrap_err();
    assert_eq!(err.kind(), "NotFound");
}

#[test]
fn edit_keeps_rides_and_pauses_inside_the_window() {
    let db = TestDb::new();
    let pool = db.pool();
    let cfg = db.config();
    let clock = FixedClock::at(0);
    let shifts = ShiftLogic::new(&pool.conn, &clock, &cfg);
    let rides = RideLogic::new(&pool.conn, &clock, &cfg);

    let shift = shifts.handle_start("d1", 0, None).unwrap();
    shifts.handle_pause("d1", 10 * MINUTE, None).unwrap();
    shifts.handle_continue("d1", 20 * MINUTE).unwrap();
    let ride = rides
        .start("d1", shift.id, coords(), 3, Some(30 * MINUTE), None)
        .unwrap();
    rides
        .end("d1", ride.ride_id, 900, 2.0, Some(40 * MINUTE))
        .unwrap();

    let edit = ShiftEdit {
        start_time: None,
        end_time: Some(HOUR),
    };
    let err = shifts.edit_shift("d1", shift.id, &edit).unwrap_err();
    assert_eq!(err.kind(), "ActiveShiftConflict");

    shifts.handle_stop("d1", HOUR).unwrap();

    // Longer window: aggregates follow.
    let edited = shifts
        .edit_shift("d1", shift.id, &ShiftEdit { start_time: None, end_time: Some(2 * HOUR) })
        .unwrap();
    assert_eq!(edited.total_duration_ms, Some(2 * HOUR));
    assert_eq!(edited.work_time_ms, Some(2 * HOUR - 10 * MINUTE));
    assert_eq!(edited.total_earnings_cents, Some(900));

    // Cuts off the pause.
    let err = shifts
        .edit_shift("d1", shift.id, &ShiftEdit { start_time: Some(15 * MINUTE), end_time: None })
        .unwrap_err();
    assert_eq!(err.kind(), "TemporalConstraintViolation");

    // Cuts off the ride.
    let err = shifts
        .edit_shift("d1", shift.id, &ShiftEdit { start_time: None, end_time: Some(35 * MINUTE) })
        .unwrap_err();
    assert_eq!(err.kind(), "TemporalConstraintViolation");

    // Longer than a day.
    let err = shifts
        .edit_shift("d1", shift.id, &ShiftEdit { start_time: None, end_time: Some(25 * HOUR) })
        .unwrap_err();
    assert_eq!(err.kind(), "TemporalConstraintViolation");

    // Inverted.
    let err = shifts
        .edit_shift("d1", shift.id, &ShiftEdit { start_time: Some(3 * HOUR), end_time: None })
        .unwrap_err();
    assert_eq!(err.kind(), "TemporalConstraintViolation");

    let err = shifts
        .edit_shift("d2", shift.id, &ShiftEdit { start_time: None, end_time: Some(HOUR) })
        .unwrap_err();
    assert_eq!(err.kind(), "NotAuthorized");

    let err = shifts
        .edit_shift("d1", shift.id, &ShiftEdit::default())
        .unwrap_err();
    assert_eq!(err.kind(), "ValidationError");
}

#[test]
fn delete_and_restore_follow_the_soft_delete_contract() {
    let db = TestDb::new();
    let pool = db.pool();
    let cfg = db.config();
    let clock = FixedClock::at(HOUR);
    let shifts = ShiftLogic::new(&pool.conn, &clock, &cfg);
    let rides = RideLogic::new(&pool.conn, &clock, &cfg);

    let empty = shifts.handle_start("d1", 0, None).unwrap();
    let err = shifts.delete_shift("d1", empty.id).unwrap_err();
    assert_eq!(err.kind(), "ActiveShiftConflict");
    shifts.handle_stop("d1", 10 * MINUTE).unwrap();

    let err = shifts.restore_shift("d1", empty.id).unwrap_err();
    assert_eq!(err.kind(), "ValidationError");

    shifts.delete_shift("d1", empty.id).unwrap();
    assert!(shifts.shifts_for_driver("d1").unwrap().is_empty());
    assert_eq!(
        shifts.shift_by_id("d1", empty.id).unwrap_err().kind(),
        "NotFound"
    );

    let restored = shifts.restore_shift("d1", empty.id).unwrap();
    assert!(!restored.is_deleted());
    assert_eq!(shifts.shifts_for_driver("d1").unwrap().len(), 1);

    // A shift with rides, even deleted ones, stays.
    let busy = shifts.handle_start("d1", 20 * MINUTE, None).unwrap();
    let ride = rides
        .start("d1", busy.id, coords(), 5, Some(21 * MINUTE), None)
        .unwrap();
    rides
        .end("d1", ride.ride_id, 500, 1.0, Some(25 * MINUTE))
        .unwrap();
    shifts.handle_stop("d1", 30 * MINUTE).unwrap();
    rides.delete("d1", ride.ride_id).unwrap();

    let err = shifts.delete_shift("d1", busy.id).unwrap_err();
    assert_eq!(err.kind(), "ValidationError");
}

#[test]
fn concurrent_starts_for_one_driver_admit_exactly_one() {
    let db = TestDb::new();
    let cfg = db.config();

    let barrier = Arc::new(Barrier::new(3));
    let handles: Vec<_> = (0..3)
        .map(|i| {
            let barrier = Arc::clone(&barrier);
            let path = db.path.clone();
            let cfg = cfg.clone();
            thread::spawn(move || {
                let pool = DbPool::new(&path).unwrap();
                let clock = FixedClock::at(0);
                let logic = ShiftLogic::new(&pool.conn, &clock, &cfg);
                barrier.wait();
                logic
                    .handle_start("d1", i * MINUTE, None)
                    .map(|s| s.id)
                    .map_err(|e| (e.kind(), e.is_conflict()))
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let successes = results.iter().filter(|r| r.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|r| matches!(r, Err(("ActiveShiftConflict", true))))
        .count();
    assert_eq!(successes, 1, "{results:?}");
    assert_eq!(conflicts, 2, "{results:?}");

    let pool = db.pool();
    let active = queries::list_active_shifts(&pool.conn, Some("d1")).unwrap();
    assert_eq!(active.len(), 1);
}

#[test]
fn failed_stop_leaves_the_shift_untouched() {
    let db = TestDb::new();
    let pool = db.pool();
    let cfg = db.config();
    let clock = FixedClock::at(0);
    let logic = ShiftLogic::new(&pool.conn, &clock, &cfg);

    let shift = logic.handle_start("d1", 0, None).unwrap();
    logic.handle_pause("d1", MINUTE, None).unwrap();
    logic.handle_continue("d1", 2 * MINUTE).unwrap();

    // Make the aggregate write fail after the stop signal went in.
    pool.conn
        .execute_batch(
            "CREATE TRIGGER refuse_stats BEFORE UPDATE OF work_time_ms ON shifts
             BEGIN SELECT RAISE(ABORT, 'stats write refused'); END;",
        )
        .unwrap();

    let err = logic.handle_stop("d1", HOUR).unwrap_err();
    assert_eq!(err.kind(), "Database");

    let kinds: Vec<SignalType> = queries::signals_for_shift(&pool.conn, shift.id)
        .unwrap()
        .into_iter()
        .map(|s| s.signal)
        .collect();
    assert_eq!(
        kinds,
        vec![SignalType::Start, SignalType::Pause, SignalType::Continue]
    );
    let stored = queries::find_shift(&pool.conn, shift.id, false).unwrap().unwrap();
    assert_eq!(stored.end_time, None);
    assert_eq!(stored.work_time_ms, None);
    assert_eq!(queries::pauses_for_shift(&pool.conn, shift.id).unwrap().len(), 1);

    pool.conn.execute_batch("DROP TRIGGER refuse_stats;").unwrap();
    let summary = logic.handle_stop("d1", HOUR).unwrap();
    assert_eq!(summary.work_time_ms, HOUR - MINUTE);
    assert!(queries::signals_for_shift(&pool.conn, shift.id).unwrap().is_empty());
}
