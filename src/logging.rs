//! Minimal timestamped stderr logging with a global verbosity flag.

use std::sync::atomic::{AtomicBool, Ordering};

static VERBOSE: AtomicBool = AtomicBool::new(false);

pub fn set_verbose(enabled: bool) {
    VERBOSE.store(enabled, Ordering::Relaxed);
}

/// Informational messages, printed only when verbose mode is on.
pub fn info(message: impl AsRef<str>) {
    if VERBOSE.load(Ordering::Relaxed) {
        eprintln!("{} INFO  {}", timestamp(), message.as_ref());
    }
}

pub fn warn(message: impl AsRef<str>) {
    eprintln!("{} WARN  {}", timestamp(), message.as_ref());
}

pub fn error(message: impl AsRef<str>) {
    eprintln!("{} ERROR {}", timestamp(), message.as_ref());
}

fn timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}
