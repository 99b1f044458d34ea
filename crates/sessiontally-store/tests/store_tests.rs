use std::fs;

use sessiontally_core::{reconcile, CarryOver, ConflictPolicy, Event, StrayEvent, Timestamp};
use sessiontally_store::{
    read_event_log, CarryOverError, CarryOverFile, MalformedLines, StrayReportWriter,
};
use tempfile::TempDir;

/// Helper: a temp directory holding two consecutive daily logs.
fn create_test_logs_dir() -> TempDir {
    let dir = TempDir::new().unwrap();

    // Day 1: u1 completes one session and reopens late, u2 has a stray close
    let day1 = "u1,100,open\nu2,110,close\nu1,160,close\n\nu1,900,open\n";
    fs::write(dir.path().join("day1.log"), day1).unwrap();

    // Day 2: u1 closes the session carried from day 1
    let day2 = "u3,1000,open\nu1,1000,close\nu3,1030,close\n";
    fs::write(dir.path().join("day2.log"), day2).unwrap();

    dir
}

// ============================================================
// Log reader tests
// ============================================================

#[test]
fn test_read_event_log_in_order() {
    let dir = create_test_logs_dir();

    let log = read_event_log(&dir.path().join("day1.log"), MalformedLines::Reject).unwrap();

    assert_eq!(log.skipped, 0);
    assert_eq!(
        log.events,
        vec![
            Event::open("u1", 100),
            Event::close("u2", 110),
            Event::close("u1", 160),
            Event::open("u1", 900),
        ]
    );
}

#[test]
fn test_read_event_log_rejects_malformed_line() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.log");
    fs::write(&path, "u1,100,open\nu1,soon,close\n").unwrap();

    let err = read_event_log(&path, MalformedLines::Reject).unwrap_err();

    assert!(format!("{:#}", err).contains("line 2"));
}

#[test]
fn test_read_event_log_skips_malformed_line() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.log");
    fs::write(&path, "u1,100,open\ngarbage\nu1,130,close\n").unwrap();

    let log = read_event_log(&path, MalformedLines::Skip).unwrap();

    assert_eq!(log.skipped, 1);
    assert_eq!(log.events.len(), 2);
}

#[test]
fn test_read_event_log_missing_file() {
    let dir = TempDir::new().unwrap();
    assert!(read_event_log(&dir.path().join("nope.log"), MalformedLines::Reject).is_err());
}

// ============================================================
// Carry-over file tests
// ============================================================

#[test]
fn test_carry_over_save_and_load() {
    let dir = TempDir::new().unwrap();
    let file = CarryOverFile::with_path(dir.path().join("state").join("incomplete.txt"));

    let mut carry = CarryOver::new();
    carry.insert("u2", Timestamp(40));
    carry.insert("u1", Timestamp(1_700_000_000));
    file.save(&carry).unwrap();

    let content = fs::read_to_string(file.path()).unwrap();
    assert_eq!(content, "u1,1700000000,open\nu2,40,open\n");
    assert_eq!(file.load().unwrap(), carry);
}

#[test]
fn test_carry_over_save_replaces_previous_set() {
    let dir = TempDir::new().unwrap();
    let file = CarryOverFile::with_path(dir.path().join("incomplete.txt"));

    let mut first = CarryOver::new();
    first.insert("u1", Timestamp(1));
    first.insert("u2", Timestamp(2));
    file.save(&first).unwrap();

    file.save(&CarryOver::new()).unwrap();

    assert!(file.load().unwrap().is_empty());
    // Only the target remains; the temp file was renamed over it
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[test]
fn test_carry_over_missing_file_is_error() {
    let dir = TempDir::new().unwrap();
    let file = CarryOverFile::with_path(dir.path().join("incomplete.txt"));

    assert!(matches!(file.load(), Err(CarryOverError::Missing(_))));
}

#[test]
fn test_carry_over_rejects_duplicate_user() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("incomplete.txt");
    fs::write(&path, "u1,10,open\nu1,20,open\n").unwrap();

    let err = CarryOverFile::with_path(path).load().unwrap_err();

    match err {
        CarryOverError::DuplicateUser { line, user_id } => {
            assert_eq!(line, 2);
            assert_eq!(user_id, "u1");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_carry_over_rejects_close_entry() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("incomplete.txt");
    fs::write(&path, "u1,10,close\n").unwrap();

    let err = CarryOverFile::with_path(path).load().unwrap_err();

    assert!(matches!(err, CarryOverError::NotAnOpen { line: 1, .. }));
}

#[test]
fn test_carry_over_rejects_malformed_entry() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("incomplete.txt");
    fs::write(&path, "u1,10,open\nu2,open\n").unwrap();

    let err = CarryOverFile::with_path(path).load().unwrap_err();

    assert!(matches!(err, CarryOverError::Malformed { line: 2, .. }));
}

#[test]
fn test_carry_over_refuses_unstorable_user_id() {
    let dir = TempDir::new().unwrap();
    let file = CarryOverFile::with_path(dir.path().join("incomplete.txt"));

    for user_id in ["a,b", "", " u1", "u1 ", "u\n1"] {
        let mut carry = CarryOver::new();
        carry.insert(user_id, Timestamp(1));

        assert!(
            matches!(file.save(&carry), Err(CarryOverError::UnstorableUserId(_))),
            "user id {:?}",
            user_id
        );
    }
    assert!(!file.exists());
}

#[test]
fn test_carry_over_lock_is_exclusive() {
    let dir = TempDir::new().unwrap();
    let file = CarryOverFile::with_path(dir.path().join("incomplete.txt"));

    let lock = file.lock().unwrap();
    assert_eq!(
        fs::read_to_string(lock.path()).unwrap().trim(),
        std::process::id().to_string()
    );
    assert!(matches!(file.lock(), Err(CarryOverError::Locked(_))));

    let lock_path = lock.path().to_path_buf();
    drop(lock);
    assert!(!lock_path.exists());
    assert!(file.lock().is_ok());
}

// ============================================================
// Two-day pipeline
// ============================================================

#[test]
fn test_two_day_pipeline_through_carry_over_file() {
    let dir = create_test_logs_dir();
    let carry_file = CarryOverFile::with_path(dir.path().join("incomplete.txt"));

    let day1 = read_event_log(&dir.path().join("day1.log"), MalformedLines::Reject).unwrap();
    let first = reconcile(CarryOver::new(), day1.events, ConflictPolicy::KeepLatestOpen).unwrap();
    carry_file.save(&first.carry_over).unwrap();

    assert_eq!(first.sessions.len(), 1);
    assert_eq!(first.strays, vec![StrayEvent::unmatched_close("u2", Timestamp(110))]);

    let day2 = read_event_log(&dir.path().join("day2.log"), MalformedLines::Reject).unwrap();
    let second = reconcile(carry_file.load().unwrap(), day2.events, ConflictPolicy::KeepLatestOpen)
        .unwrap();
    carry_file.save(&second.carry_over).unwrap();

    let durations: Vec<(String, i64)> = second
        .sessions
        .iter()
        .map(|s| (s.user_id.clone(), s.duration_secs))
        .collect();
    assert_eq!(durations, vec![("u1".to_string(), 100), ("u3".to_string(), 30)]);
    assert!(carry_file.load().unwrap().is_empty());
}

// ============================================================
// Stray report tests
// ============================================================

#[test]
fn test_stray_report_writes_json_lines() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("reports").join("strays.jsonl");

    let mut writer = StrayReportWriter::create(&path).unwrap();
    writer
        .write_all(&[
            StrayEvent::unmatched_close("u1", Timestamp(5)),
            StrayEvent::unmatched_close("u2", Timestamp(6)),
        ])
        .unwrap();
    assert_eq!(writer.finish().unwrap(), 2);

    let content = fs::read_to_string(&path).unwrap();
    let lines: Vec<StrayEvent> = content
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines[1], StrayEvent::unmatched_close("u2", Timestamp(6)));
}
