//! Verbosity threshold for bridge messages
//!
//! The sink is whatever `tracing` subscriber the process installed; the
//! bridge only decides which messages reach it.

use std::fmt::Display;

pub const LOG_ERROR: i32 = 0;
pub const LOG_WARNING: i32 = 1;
pub const LOG_INFO: i32 = 2;
pub const LOG_TRIVIAL: i32 = 3;

#[derive(Debug, Clone, Copy, Default)]
pub struct Verbosity {
    threshold: i32,
}

impl Verbosity {
    pub fn new(threshold: i32) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> i32 {
        self.threshold
    }

    pub fn set_threshold(&mut self, threshold: i32) {
        self.threshold = threshold;
    }

    pub fn enabled(&self, level: i32) -> bool {
        level <= self.threshold
    }

    pub fn emit(&self, level: i32, message: impl Display) {
        if !self.enabled(level) {
            return;
        }
        match level {
            LOG_ERROR => tracing::error!("{message}"),
            LOG_WARNING => tracing::warn!("{message}"),
            _ => tracing::info!("{message}"),
        }
    }

    pub fn error(&self, message: impl Display) {
        self.emit(LOG_ERROR, message);
    }

    pub fn trivial(&self, message: impl Display) {
        self.emit(LOG_TRIVIAL, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_pass_the_default_threshold() {
        let verbosity = Verbosity::default();
        assert!(verbosity.enabled(LOG_ERROR));
        assert!(!verbosity.enabled(LOG_WARNING));
        assert!(!verbosity.enabled(LOG_TRIVIAL));
    }

    #[test]
    fn higher_threshold_admits_more() {
        let mut verbosity = Verbosity::default();
        verbosity.set_threshold(5);
        assert!(verbosity.enabled(LOG_TRIVIAL));
        verbosity.set_threshold(-1);
        assert!(!verbosity.enabled(LOG_ERROR));
    }
}
