// Author: Jacques Murray

#![cfg(feature = "logging")]

use cdo_retry::{run, Context, Options};
use log::{Level, LevelFilter, Log, Metadata, Record};
use std::sync::Mutex;
use std::time::Duration;

// Records everything the crate logs, by level.
struct Capture {
    records: Mutex<Vec<(Level, String)>>,
}

impl Log for Capture {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.target().starts_with("cdo_retry")
    }

    fn log(&self, record: &Record<'_>) {
        if self.enabled(record.metadata()) {
            self.records
                .lock()
                .unwrap()
                .push((record.level(), record.args().to_string()));
        }
    }

    fn flush(&self) {}
}

static CAPTURE: Capture = Capture {
    records: Mutex::new(Vec::new()),
};

#[tokio::test]
async fn test_failed_attempts_warn_and_terminal_exit_errors() {
    log::set_logger(&CAPTURE).unwrap();
    log::set_max_level(LevelFilter::Trace);

    let opts = Options::default()
        .with_timeout(Duration::from_secs(10))
        .with_delay(Duration::from_millis(5))
        .with_retries(1);

    let result = run(
        &Context::new(),
        || async { Err::<bool, _>("connection reset") },
        &opts,
    )
    .await;
    assert!(result.unwrap_err().is_retries_exceeded());

    let records = CAPTURE.records.lock().unwrap();
    let warnings = records
        .iter()
        .filter(|(level, msg)| *level == Level::Warn && msg.contains("connection reset"))
        .count();
    assert_eq!(warnings, 2);
    assert!(records
        .iter()
        .any(|(level, msg)| *level == Level::Error && msg.contains("max retries reached")));
}
