//! Session management
//!
//! Couples a child transport with the terminal state it draws into.

use std::time::Duration;

use super::process::{Result, Transport};
use super::term::{Screen, TerminalState, VtParser};

/// A running child plus its emulated screen
pub struct Session<T: Transport> {
    /// Terminal state
    pub state: TerminalState,
    /// VT parser
    parser: VtParser,
    /// Child I/O
    transport: T,
    /// Incomplete UTF-8 sequence carried over from the previous chunk
    utf8_tail: Vec<u8>,
}

impl<T: Transport> Session<T> {
    /// Create a new session on a blank `cols` x `rows` screen
    pub fn new(transport: T, cols: u16, rows: u16) -> Self {
        Self {
            state: TerminalState::new(cols, rows),
            parser: VtParser::new(),
            transport,
            utf8_tail: Vec::new(),
        }
    }

    /// Check if the child's output stream is still open
    pub fn is_running(&self) -> bool {
        self.transport.is_running()
    }

    /// Write input to the child
    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        self.transport.write(data)
    }

    /// Wait up to `timeout` for one output chunk and apply it to the screen.
    ///
    /// Returns the decoded text of the chunk, or `None` when nothing arrived.
    pub fn poll_output(&mut self, timeout: Duration) -> Option<String> {
        let bytes = self.transport.read_timeout(timeout)?;
        Some(self.feed_bytes(&bytes))
    }

    /// Feed raw bytes into the terminal, returning the decoded text
    pub fn feed_bytes(&mut self, bytes: &[u8]) -> String {
        let text = self.decode(bytes);
        self.parser.advance(&text, &mut self.state);
        text
    }

    /// Lossy UTF-8 decode that holds back a sequence split at the chunk end
    fn decode(&mut self, bytes: &[u8]) -> String {
        let mut data = std::mem::take(&mut self.utf8_tail);
        data.extend_from_slice(bytes);

        let mut text = String::with_capacity(data.len());
        let mut rest = data.as_slice();
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    text.push_str(valid);
                    break;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    // Already validated by from_utf8
                    text.push_str(std::str::from_utf8(valid).unwrap_or_default());
                    match e.error_len() {
                        Some(len) => {
                            text.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        None => {
                            self.utf8_tail = after.to_vec();
                            break;
                        }
                    }
                }
            }
        }
        text
    }

    /// Current screen contents
    pub fn screen(&self) -> &Screen {
        &self.state.screen
    }

    /// Cursor position as (row, col)
    pub fn cursor_position(&self) -> (u16, u16) {
        self.state.cursor_position()
    }

    /// No escape sequence is half-way through being parsed
    pub fn is_idle(&self) -> bool {
        self.parser.is_idle()
    }

    /// Stop the child
    pub fn close(&mut self, grace: Duration) {
        self.transport.terminate(grace);
    }
}
