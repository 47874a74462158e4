use crossterm::event::{Event, KeyCode, KeyEvent, KeyModifiers, poll, read};
use std::collections::VecDeque;
use std::io;
use std::io::{BufReader, Read};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError, channel};
use std::thread;
use std::time::Duration;

/// How long a blocking read waits before checking for an interrupt again.
const INTERRUPT_CHECK_INTERVAL: Duration = Duration::from_millis(50);

/// Providing Keyboard Input independent of an implementation.
pub trait KeyboardInputProvider {
    /// Checks if input is available, does not block.
    fn check_input_available(&mut self) -> bool;
    /// Consumes the next input character, blocking until one is available.
    ///
    /// # Errors
    /// - `io::ErrorKind::Interrupted` if CTRL-C was pressed while waiting
    /// - `io::ErrorKind::UnexpectedEof` if the input is closed
    /// - any error of the underlying device
    fn get_input_character(&mut self) -> io::Result<u8>;
    /// True if CTRL-C was triggered
    fn is_interrupted(&self) -> bool;
    /// Looks for a pending CTRL-C without blocking and without losing program input.
    /// Called periodically by programs that never read the keyboard.
    fn poll_interrupt(&mut self) -> bool {
        self.is_interrupted()
    }
}

/// Keyboard backed by crossterm events of the controlling terminal.
///
/// Expects the terminal to be in raw mode, so CTRL-C arrives as a key event.
/// The interrupt flag can be shared with a signal handler.
#[derive(Debug, Default)]
pub struct TerminalInputProvider {
    pending: VecDeque<u8>,
    interrupted: Arc<AtomicBool>,
}
impl TerminalInputProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
    #[must_use]
    pub fn with_interrupt_flag(interrupted: Arc<AtomicBool>) -> Self {
        Self {
            pending: VecDeque::new(),
            interrupted,
        }
    }

    /// Translates a key press into the byte an LC-3 program expects.
    /// Records CTRL-C, everything not representable as one byte is dropped.
    fn handle_event(&self, event: &Event) -> Option<u8> {
        let key = event.as_key_press_event()?;
        if key.modifiers.contains(KeyModifiers::CONTROL)
            && matches!(key.code, KeyCode::Char('c' | 'C'))
        {
            self.interrupted.store(true, Ordering::SeqCst);
            return None;
        }
        key_to_byte(key)
    }

    /// Reads one event if there is one, without blocking.
    fn read_pending_event(&mut self) -> io::Result<bool> {
        if !poll(Duration::ZERO)? {
            return Ok(false);
        }
        if let Some(c) = self.handle_event(&read()?) {
            self.pending.push_back(c);
        }
        Ok(true)
    }
}

fn key_to_byte(key: KeyEvent) -> Option<u8> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        // CTRL-A is 0x01 up to CTRL-Z as 0x1A
        KeyCode::Char(c) if ctrl && c.is_ascii_alphabetic() => {
            u8::try_from(c.to_ascii_uppercase()).ok().map(|b| b & 0x1F)
        }
        KeyCode::Char(_) if ctrl => None,
        KeyCode::Char(c) if c.is_ascii() => u8::try_from(c).ok(),
        KeyCode::Enter => Some(b'\n'),
        KeyCode::Tab => Some(b'\t'),
        KeyCode::Backspace => Some(0x08),
        KeyCode::Esc => Some(0x1B),
        _ => None,
    }
}

impl KeyboardInputProvider for TerminalInputProvider {
    fn check_input_available(&mut self) -> bool {
        if self.pending.is_empty()
            && let Err(e) = self.read_pending_event()
        {
            tracing::warn!("polling keyboard failed: {e}");
        }
        !self.pending.is_empty()
    }
    fn get_input_character(&mut self) -> io::Result<u8> {
        loop {
            if let Some(c) = self.pending.pop_front() {
                return Ok(c);
            }
            if self.is_interrupted() {
                return Err(io::Error::from(io::ErrorKind::Interrupted));
            }
            if poll(INTERRUPT_CHECK_INTERVAL)?
                && let Some(c) = self.handle_event(&read()?)
            {
                self.pending.push_back(c);
            }
        }
    }
    fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }
    /// Drains all queued terminal events, characters are kept for the program.
    fn poll_interrupt(&mut self) -> bool {
        loop {
            match self.read_pending_event() {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => {
                    tracing::warn!("polling keyboard failed: {e}");
                    break;
                }
            }
        }
        self.is_interrupted()
    }
}

/// Keyboard reading bytes from a stream, e.g. piped standard input.
///
/// A background thread forwards the bytes through a channel, so availability can be checked
/// without blocking. Once the stream is exhausted no more input becomes available.
#[derive(Debug)]
pub struct StreamInputProvider {
    receiver: Receiver<u8>,
    pending: Option<u8>,
    interrupted: Arc<AtomicBool>,
}

impl StreamInputProvider {
    #[must_use]
    pub fn new(reader: impl Read + Send + 'static, interrupted: Arc<AtomicBool>) -> Self {
        let (sender, receiver) = channel();
        thread::spawn(move || {
            for byte in BufReader::new(reader).bytes() {
                match byte {
                    Ok(b) => {
                        if sender.send(b).is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        tracing::warn!("reading input stream failed: {e}");
                        return;
                    }
                }
            }
            tracing::debug!("input stream closed");
        });
        Self {
            receiver,
            pending: None,
            interrupted,
        }
    }
}

impl KeyboardInputProvider for StreamInputProvider {
    fn check_input_available(&mut self) -> bool {
        if self.pending.is_none() {
            self.pending = self.receiver.try_recv().ok();
        }
        self.pending.is_some()
    }
    fn get_input_character(&mut self) -> io::Result<u8> {
        if let Some(c) = self.pending.take() {
            return Ok(c);
        }
        loop {
            if self.is_interrupted() {
                return Err(io::Error::from(io::ErrorKind::Interrupted));
            }
            match self.receiver.recv_timeout(INTERRUPT_CHECK_INTERVAL) {
                Ok(c) => return Ok(c),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "End of input reached",
                    ));
                }
            }
        }
    }
    fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }
}
