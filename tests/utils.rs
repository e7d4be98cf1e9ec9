#![allow(dead_code)]

use log::LevelFilter;
use std::io::Write;
use std::sync::Once;

static LOGGER: Once = Once::new();

pub fn enable_logging() {
    LOGGER.call_once(logger_init)
}

fn logger_init() {
    env_logger::Builder::new()
        .format(|buf, record| {
            writeln!(
                buf,
                "{}:{} {} [{}] - {}",
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                chrono::Local::now().format("%Y-%m-%dT%H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .filter(None, LevelFilter::Warn)
        .init();
}

/// Asserts byte equality with a useful message about the first mismatch.
pub fn assert_same_bytes(expected: &[u8], actual: &[u8]) {
    for (ix, (e, a)) in expected.iter().zip(actual.iter()).enumerate() {
        assert_eq!(
            e, a,
            "mismatch at byte index {}, expected {:#04X}, got {:#04X}",
            ix, e, a
        );
    }
    assert_eq!(
        expected.len(),
        actual.len(),
        "expected {} bytes, got {} bytes",
        expected.len(),
        actual.len()
    );
}
