#![allow(dead_code)]
use assert_cmd::{Command, cargo_bin_cmd};
use shiftledger::config::Config;
use shiftledger::db::initialize::init_db;
use shiftledger::db::pool::DbPool;
use tempfile::TempDir;

pub const MINUTE: i64 = 60_000;
pub const HOUR: i64 = 60 * MINUTE;
pub const DAY: i64 = 24 * HOUR;

pub fn sl() -> Command {
    cargo_bin_cmd!("shiftledger")
}

/// A migrated database file living in its own temp directory.
pub struct TestDb {
    pub dir: TempDir,
    pub path: String,
}

impl TestDb {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("ledger.sqlite").to_string_lossy().to_string();

        let pool = DbPool::new(&path).expect("open db");
        init_db(&pool.conn).expect("init db");

        Self { dir, path }
    }

    /// A fresh connection on the shared file.
    pub fn pool(&self) -> DbPool {
        DbPool::new(&self.path).expect("open db")
    }

    pub fn config(&self) -> Config {
        Config {
            database: self.path.clone(),
            ..Config::default()
        }
    }
}

/// CLI invocation isolated from the real home directory.
pub fn sl_in(db: &TestDb, driver: &str) -> Command {
    let mut cmd = sl();
    cmd.env("HOME", db.dir.path())
        .args(["--db", &db.path, "--driver", driver]);
    cmd
}
