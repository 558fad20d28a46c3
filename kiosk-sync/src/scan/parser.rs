//! Timing-based scan detection
//!
//! A scanner and a person typing arrive through the same key channel. The
//! only difference is speed: a scanner emits characters far faster than a
//! person can. The parser accumulates fast runs and emits them as tokens on
//! the terminator key; anything slower is dropped as typing.

use super::gate::ScanGate;
use crate::settings::{ReconcilingStore, SettingKey};

/// Which characters a scan token may contain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Charset {
    #[default]
    Digits,
    Alphanumeric,
}

impl Charset {
    pub fn accepts(&self, c: char) -> bool {
        match self {
            Self::Digits => c.is_ascii_digit(),
            Self::Alphanumeric => c.is_ascii_alphanumeric(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanConfig {
    /// Shortest buffer emitted as a token
    pub min_length: usize,
    /// Longest gap between characters of one scan
    pub max_interval_ms: u64,
    /// Window in which an identical token is suppressed
    pub debounce_ms: u64,
    pub charset: Charset,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            min_length: 14,
            max_interval_ms: 80,
            debounce_ms: 2_000,
            charset: Charset::Digits,
        }
    }
}

impl ScanConfig {
    /// Build from the station settings; out-of-range values use defaults
    pub fn from_settings(settings: &ReconcilingStore) -> Self {
        let defaults = Self::default();
        let positive = |key: SettingKey| {
            let n = settings.get_number(key);
            (n.is_finite() && n >= 1.0).then_some(n as u64)
        };

        Self {
            min_length: positive(SettingKey::ScanMinLength)
                .map_or(defaults.min_length, |n| n as usize),
            max_interval_ms: positive(SettingKey::ScanIntervalMs).unwrap_or(defaults.max_interval_ms),
            debounce_ms: settings
                .get_number(SettingKey::ScanDebounceMs)
                .max(0.0) as u64,
            charset: if settings.get_bool(SettingKey::ScanAlphanumeric) {
                Charset::Alphanumeric
            } else {
                Charset::Digits
            },
        }
    }
}

/// Scan stream parser.
///
/// Timestamps are supplied by the caller in milliseconds and must not go
/// backwards; a clock step backwards is treated as zero elapsed time.
#[derive(Debug)]
pub struct ScanParser {
    config: ScanConfig,
    gate: ScanGate,
    buffer: String,
    last_char_at: u64,
    last_emitted: Option<(String, u64)>,
}

impl ScanParser {
    pub fn new(config: ScanConfig, gate: ScanGate) -> Self {
        Self {
            config,
            gate,
            buffer: String::new(),
            last_char_at: 0,
            last_emitted: None,
        }
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Swap the thresholds, e.g. after a settings change. Pending input is dropped.
    pub fn set_config(&mut self, config: ScanConfig) {
        self.config = config;
        self.buffer.clear();
    }

    /// Feed one character event
    pub fn on_char(&mut self, c: char, at_ms: u64) {
        if !self.gate.is_enabled() {
            self.buffer.clear();
            return;
        }

        if !self.buffer.is_empty()
            && at_ms.saturating_sub(self.last_char_at) > self.config.max_interval_ms
        {
            tracing::trace!(discarded = self.buffer.len(), "Stale input, treating as typing");
            self.buffer.clear();
        }

        if self.config.charset.accepts(c) {
            self.buffer.push(c);
            self.last_char_at = at_ms;
        }
    }

    /// Feed the terminator key, returning a token if the buffer is one.
    ///
    /// The buffer is cleared whatever the outcome.
    pub fn on_terminator(&mut self, at_ms: u64) -> Option<String> {
        let buffer = std::mem::take(&mut self.buffer);
        if !self.gate.is_enabled() || buffer.chars().count() < self.config.min_length {
            return None;
        }

        if let Some((token, emitted_at)) = &self.last_emitted
            && *token == buffer
            && at_ms.saturating_sub(*emitted_at) < self.config.debounce_ms
        {
            tracing::debug!(token = %buffer, "Repeated scan within debounce window, ignored");
            return None;
        }

        self.last_emitted = Some((buffer.clone(), at_ms));
        Some(buffer)
    }

    /// Characters accumulated since the last terminator
    pub fn pending(&self) -> &str {
        &self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: &str = "01234567890123";

    /// Type `text` starting at `start`, one character every `step` ms.
    /// Returns the time of the last character.
    fn feed(parser: &mut ScanParser, text: &str, start: u64, step: u64) -> u64 {
        let mut at = start;
        for (i, c) in text.chars().enumerate() {
            at = start + i as u64 * step;
            parser.on_char(c, at);
        }
        at
    }

    fn parser() -> ScanParser {
        ScanParser::new(ScanConfig::default(), ScanGate::new())
    }

    #[test]
    fn test_fast_run_emits_once() {
        let mut p = parser();
        let end = feed(&mut p, TOKEN, 1_000, 10);

        assert_eq!(p.on_terminator(end + 5).as_deref(), Some(TOKEN));
        assert_eq!(p.on_terminator(end + 10), None);
    }

    #[test]
    fn test_single_slow_gap_drops_the_run() {
        let mut p = parser();
        let end = feed(&mut p, "0123456", 1_000, 10);
        let end = feed(&mut p, "7890123", end + 200, 10);

        assert_eq!(p.on_terminator(end + 5), None);
        assert_eq!(p.pending(), "");
    }

    #[test]
    fn test_short_buffer_discarded() {
        let mut p = parser();
        let end = feed(&mut p, "1234567", 0, 10);

        assert_eq!(p.on_terminator(end + 5), None);
    }

    #[test]
    fn test_repeat_within_window_suppressed() {
        let mut p = parser();

        let end = feed(&mut p, TOKEN, 0, 10);
        assert!(p.on_terminator(end).is_some());

        let end = feed(&mut p, TOKEN, 1_000, 10);
        assert_eq!(p.on_terminator(end), None);

        // 2100ms after the first emission; the suppressed repeat did not
        // extend the window
        let end = feed(&mut p, TOKEN, 2_100, 10);
        assert_eq!(end, 130 + 2_100);
        assert_eq!(p.on_terminator(end).as_deref(), Some(TOKEN));
    }

    #[test]
    fn test_different_token_not_debounced() {
        let mut p = parser();
        let end = feed(&mut p, TOKEN, 0, 10);
        assert!(p.on_terminator(end).is_some());

        let end = feed(&mut p, "99999999999999", end + 100, 10);
        assert_eq!(p.on_terminator(end).as_deref(), Some("99999999999999"));
    }

    #[test]
    fn test_charset_filter() {
        let mut p = parser();
        let end = feed(&mut p, "0123-4567-8901-23", 0, 5);
        assert_eq!(p.on_terminator(end).as_deref(), Some(TOKEN));

        let config = ScanConfig {
            charset: Charset::Alphanumeric,
            ..ScanConfig::default()
        };
        let mut p = ScanParser::new(config, ScanGate::new());
        let end = feed(&mut p, "PKG00001234ABC", 0, 5);
        assert_eq!(p.on_terminator(end).as_deref(), Some("PKG00001234ABC"));
    }

    #[test]
    fn test_suppressed_gate_ignores_input() {
        let gate = ScanGate::new();
        let mut p = ScanParser::new(ScanConfig::default(), gate.clone());

        let end = feed(&mut p, "0123456", 0, 10);
        let guard = gate.suppress();
        let end = feed(&mut p, "7890123", end + 10, 10);
        assert_eq!(p.on_terminator(end), None);

        drop(guard);
        let end = feed(&mut p, TOKEN, end + 500, 10);
        assert_eq!(p.on_terminator(end).as_deref(), Some(TOKEN));
    }

    #[tokio::test]
    async fn test_config_from_settings() {
        use crate::testing::{FakeRemote, memory_store};

        let settings = ReconcilingStore::new(memory_store(), FakeRemote::offline());
        assert_eq!(ScanConfig::from_settings(&settings), ScanConfig::default());

        settings.set(SettingKey::ScanMinLength, 8.0).await.unwrap();
        settings.set(SettingKey::ScanIntervalMs, 0.0).await.unwrap();
        settings.set(SettingKey::ScanAlphanumeric, true).await.unwrap();

        let config = ScanConfig::from_settings(&settings);
        assert_eq!(config.min_length, 8);
        assert_eq!(config.max_interval_ms, 80);
        assert_eq!(config.charset, Charset::Alphanumeric);
    }
}
