//! Terminal handling of the command line host: raw mode and raw mode compatible output.
use crossterm::terminal;
use std::io;
use std::io::{IsTerminal, Write};

/// Keeps the terminal in raw mode until dropped.
pub struct RawLock {
    enabled: bool,
}

impl RawLock {
    /// True while the terminal is actually in raw mode.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }
}

impl Drop for RawLock {
    fn drop(&mut self) {
        if !self.enabled {
            return;
        }
        // terminal stays in raw mode but no means to repair
        if let Err(e) = terminal::disable_raw_mode() {
            tracing::error!("Error resetting terminal {e}");
        }
    }
}

/// Set terminal to raw in best-effort mode, only log on failure, since it does not work
/// without a controlling terminal, e.g. with redirected input in tests.
/// With standard input not being a terminal the mode is left alone.
#[must_use]
pub fn set_terminal_raw() -> RawLock {
    if !io::stdin().is_terminal() {
        tracing::debug!("standard input is no terminal, keeping terminal mode");
        return RawLock { enabled: false };
    }
    match terminal::enable_raw_mode() {
        Ok(()) => RawLock { enabled: true },
        Err(e) => {
            tracing::warn!("Could not set terminal to raw mode: {e}");
            RawLock { enabled: false }
        }
    }
}

/// Output writer translating `\n` into `\r\n` if requested, since raw mode disables that
/// translation. Without translation bytes are passed through unchanged.
#[derive(Debug)]
pub struct TerminalOutput<W: Write> {
    inner: W,
    translate_newlines: bool,
}

impl<W: Write> TerminalOutput<W> {
    pub const fn new(inner: W, translate_newlines: bool) -> Self {
        Self {
            inner,
            translate_newlines,
        }
    }
    /// Follows the terminal mode, see [`RawLock::is_enabled`].
    pub const fn set_translate_newlines(&mut self, translate_newlines: bool) {
        self.translate_newlines = translate_newlines;
    }
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for TerminalOutput<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.translate_newlines {
            return self.inner.write(buf);
        }
        for (idx, part) in buf.split(|&b| b == b'\n').enumerate() {
            if idx > 0 {
                self.inner.write_all(b"\r\n")?;
            }
            self.inner.write_all(part)?;
        }
        Ok(buf.len())
    }
    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use googletest::prelude::*;

    #[gtest]
    fn test_newlines_translated() {
        let mut sut = TerminalOutput::new(Vec::new(), true);
        write!(sut, "a\nb\n\nc").unwrap();
        sut.flush().unwrap();
        expect_that!(sut.into_inner(), eq(&b"a\r\nb\r\n\r\nc".to_vec()));
    }
    #[gtest]
    fn test_without_newline_unchanged() {
        let mut sut = TerminalOutput::new(Vec::new(), true);
        sut.write_all(b"HALT").unwrap();
        expect_that!(sut.into_inner(), eq(&b"HALT".to_vec()));
    }
    #[gtest]
    fn test_newlines_kept_without_raw_mode() {
        let mut sut = TerminalOutput::new(Vec::new(), false);
        write!(sut, "Hi\nHALT\n").unwrap();
        expect_that!(sut.into_inner(), eq(&b"Hi\nHALT\n".to_vec()));
    }
    #[gtest]
    fn test_translation_follows_raw_mode_changes() {
        let mut sut = TerminalOutput::new(Vec::new(), false);
        sut.write_all(b"a\n").unwrap();
        sut.set_translate_newlines(true);
        sut.write_all(b"b\n").unwrap();
        expect_that!(sut.into_inner(), eq(&b"a\nb\r\n".to_vec()));
    }
    #[gtest]
    fn test_disabled_lock_reports_disabled() {
        let lock = RawLock { enabled: false };
        expect_that!(lock.is_enabled(), eq(false));
    }
}
