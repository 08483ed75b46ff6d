//! VT sequence parser
//!
//! Parses ANSI/VT escape sequences and updates terminal state. The parser is a
//! persistent state machine, so a sequence split across two output chunks is
//! completed by the second chunk instead of being misread.

use super::state::{Color, TerminalState};

/// Parser state machine
pub struct VtParser {
    state: ParserState,
    params: Vec<u16>,
    intermediates: Vec<char>,
    current_param: Option<u16>,
}

#[derive(Clone, Copy, Default, PartialEq)]
enum ParserState {
    #[default]
    Ground,
    Escape,
    EscapeIntermediate,
    CsiEntry,
    CsiParam,
    CsiIntermediate,
    OscString,
    EscapeInOsc,  // ESC received within OSC, waiting for backslash
}

impl Default for VtParser {
    fn default() -> Self {
        Self::new()
    }
}

impl VtParser {
    pub fn new() -> Self {
        Self {
            state: ParserState::Ground,
            params: Vec::with_capacity(16),
            intermediates: Vec::with_capacity(4),
            current_param: None,
        }
    }

    /// True when no sequence is partially collected
    pub fn is_idle(&self) -> bool {
        self.state == ParserState::Ground
    }

    /// Feed every character of a decoded chunk
    pub fn advance(&mut self, text: &str, state: &mut TerminalState) {
        for ch in text.chars() {
            self.feed(ch, state);
        }
    }

    /// Feed a single character to the parser
    pub fn feed(&mut self, ch: char, state: &mut TerminalState) {
        let in_osc = matches!(self.state, ParserState::OscString | ParserState::EscapeInOsc);

        // Handle C0 controls anywhere (except in OSC-related states)
        if (ch as u32) < 0x20 && !in_osc {
            match ch {
                '\x1b' => self.enter_escape(),
                '\x07' => {} // BEL - ignore
                '\x08' => state.backspace(),
                '\t' => state.horizontal_tab(),
                '\n' | '\x0b' | '\x0c' => state.linefeed(),
                '\r' => state.carriage_return(),
                _ => {}
            }
            return;
        }

        // DEL is padding wherever it shows up
        if ch == '\x7f' {
            return;
        }

        match self.state {
            ParserState::Ground => Self::ground(ch, state),
            ParserState::Escape => self.escape(ch, state),
            ParserState::EscapeIntermediate => self.escape_intermediate(ch),
            ParserState::CsiEntry => self.csi_entry(ch, state),
            ParserState::CsiParam => self.csi_param(ch, state),
            ParserState::CsiIntermediate => self.csi_intermediate(ch, state),
            ParserState::OscString => self.osc_string_state(ch),
            ParserState::EscapeInOsc => self.escape_in_osc(ch, state),
        }
    }

    /// Handle ESC received within OSC sequence
    fn escape_in_osc(&mut self, ch: char, state: &mut TerminalState) {
        if ch == '\\' {
            // ST (ESC \) - String Terminator
            self.state = ParserState::Ground;
        } else {
            // Not ST: the OSC is over and this char starts a new escape
            self.enter_escape();
            self.escape(ch, state);
        }
    }

    fn enter_escape(&mut self) {
        self.state = ParserState::Escape;
        self.params.clear();
        self.intermediates.clear();
        self.current_param = None;
    }

    fn ground(ch: char, state: &mut TerminalState) {
        // C1 controls are not printable
        if !('\u{80}'..='\u{9f}').contains(&ch) {
            state.put_char(ch);
        }
    }

    fn escape(&mut self, ch: char, state: &mut TerminalState) {
        self.state = ParserState::Ground;
        match ch {
            '[' => {
                self.state = ParserState::CsiEntry;
            }
            ']' => {
                self.state = ParserState::OscString;
            }
            // DECSC - Save cursor
            '7' => state.save_cursor(),
            // DECRC - Restore cursor
            '8' => state.restore_cursor(),
            // IND - Index
            'D' => state.index(),
            // NEL - Next line
            'E' => state.next_line(),
            // RI - Reverse index
            'M' => state.reverse_index(),
            // RIS - Full reset
            'c' => state.reset(),
            // Keypad application/numeric mode
            '=' | '>' => {}
            '\x20'..='\x2f' => {
                // Intermediate bytes (charset designation and friends)
                self.intermediates.push(ch);
                self.state = ParserState::EscapeIntermediate;
            }
            _ => {
                tracing::debug!("Unknown ESC sequence: ESC {:?}", ch);
            }
        }
    }

    fn escape_intermediate(&mut self, ch: char) {
        match ch {
            '\x20'..='\x2f' => {
                self.intermediates.push(ch);
            }
            _ => {
                // Final byte - charset selections are ignored
                self.state = ParserState::Ground;
            }
        }
    }

    fn csi_entry(&mut self, ch: char, state: &mut TerminalState) {
        match ch {
            '0'..='9' => {
                self.current_param = Some(ch as u16 - '0' as u16);
                self.state = ParserState::CsiParam;
            }
            ';' => {
                self.params.push(0);
                self.state = ParserState::CsiParam;
            }
            '?' | '>' | '!' | '=' => {
                self.intermediates.push(ch);
            }
            '\x20'..='\x2f' => {
                self.intermediates.push(ch);
                self.state = ParserState::CsiIntermediate;
            }
            '\x40'..='\x7e' => {
                // Final byte
                self.execute_csi(ch, state);
            }
            _ => {
                self.state = ParserState::Ground;
            }
        }
    }

    fn csi_param(&mut self, ch: char, state: &mut TerminalState) {
        match ch {
            '0'..='9' => {
                let digit = ch as u16 - '0' as u16;
                self.current_param = Some(
                    self.current_param.unwrap_or(0).saturating_mul(10).saturating_add(digit)
                );
            }
            ';' | ':' => {
                // Subparameters are flattened into the main list
                self.params.push(self.current_param.unwrap_or(0));
                self.current_param = None;
            }
            '\x20'..='\x2f' => {
                if let Some(p) = self.current_param.take() {
                    self.params.push(p);
                }
                self.intermediates.push(ch);
                self.state = ParserState::CsiIntermediate;
            }
            '\x40'..='\x7e' => {
                if let Some(p) = self.current_param.take() {
                    self.params.push(p);
                }
                self.execute_csi(ch, state);
            }
            _ => {
                self.state = ParserState::Ground;
            }
        }
    }

    fn csi_intermediate(&mut self, ch: char, state: &mut TerminalState) {
        match ch {
            '\x20'..='\x2f' => {
                self.intermediates.push(ch);
            }
            '\x40'..='\x7e' => {
                self.execute_csi(ch, state);
            }
            _ => {
                self.state = ParserState::Ground;
            }
        }
    }

    fn osc_string_state(&mut self, ch: char) {
        match ch {
            // BEL or C1 ST terminates OSC
            '\x07' | '\u{9c}' => {
                tracing::trace!("OSC string ignored");
                self.state = ParserState::Ground;
            }
            // Could be ST (ESC \)
            '\x1b' => {
                self.state = ParserState::EscapeInOsc;
            }
            _ => {}
        }
    }

    fn execute_csi(&mut self, final_char: char, state: &mut TerminalState) {
        self.state = ParserState::Ground;

        let is_private = self.intermediates.contains(&'?');
        let plain = self.intermediates.is_empty();
        let params = &self.params;
        // Count parameters: omitted or zero means one
        let count = || params.first().copied().unwrap_or(1).max(1);
        let mode = || params.first().copied().unwrap_or(0);

        match (plain, is_private, final_char) {
            // Cursor movement
            (true, _, 'A') => state.cursor_up(count()),
            (true, _, 'B') => state.cursor_down(count()),
            (true, _, 'C') => state.cursor_forward(count()),
            (true, _, 'D') => state.cursor_backward(count()),
            (true, _, 'E') => {
                // CNL - Cursor Next Line
                state.cursor_down(count());
                state.carriage_return();
            }
            (true, _, 'F') => {
                // CPL - Cursor Previous Line
                state.cursor_up(count());
                state.carriage_return();
            }
            // CHA - Cursor Character Absolute
            (true, _, 'G') => state.set_column(count()),
            (true, _, 'H') | (true, _, 'f') => {
                // CUP - Cursor Position
                let row = params.first().copied().unwrap_or(1);
                let col = params.get(1).copied().unwrap_or(1);
                state.set_position(row, col);
            }
            // VPA - Line Position Absolute
            (true, _, 'd') => state.set_row(count()),

            // Erase
            (true, _, 'J') => state.erase_in_display(mode()),
            (true, _, 'K') => state.erase_in_line(mode()),

            // Line operations
            (true, _, 'L') => state.insert_lines(count()),
            (true, _, 'M') => state.delete_lines(count()),

            // Character operations
            (true, _, '@') => state.insert_chars(count()),
            (true, _, 'P') => state.delete_chars(count()),
            (true, _, 'X') => state.erase_chars(count()),

            // Scroll
            (true, _, 'S') => state.scroll_up(count()),
            (true, _, 'T') => state.scroll_down(count()),

            // Scroll region
            (true, _, 'r') => {
                let top = params.first().copied().unwrap_or(1);
                let bottom = params.get(1).copied().filter(|&b| b > 0).unwrap_or(state.rows);
                state.set_scroll_region(top, bottom);
            }

            // SGR - Select Graphic Rendition
            (true, _, 'm') => Self::execute_sgr(params, state),

            // Save/restore cursor
            (true, _, 's') => state.save_cursor(),
            (true, _, 'u') => state.restore_cursor(),

            // Private modes (DEC)
            (false, true, 'h') | (false, true, 'l') => {
                for &p in params {
                    state.set_private_mode(p, final_char == 'h');
                }
            }

            // Standard modes
            (true, _, 'h') | (true, _, 'l') => {
                for &p in params {
                    state.set_mode(p, final_char == 'h');
                }
            }

            // Window manipulation - nothing to manipulate
            (true, _, 't') => {}

            _ => {
                // Unknown sequence
                tracing::debug!(
                    "Unknown CSI: intermediates={:?}, params={:?}, final={:?}",
                    self.intermediates,
                    params,
                    final_char
                );
            }
        }
    }

    fn execute_sgr(params: &[u16], state: &mut TerminalState) {
        if params.is_empty() {
            state.current_attrs.reset();
            return;
        }

        let attrs = &mut state.current_attrs;
        let mut iter = params.iter().copied();

        while let Some(param) = iter.next() {
            match param {
                0 => attrs.reset(),
                1 => attrs.bold = true,
                22 => attrs.bold = false,

                // Foreground colors (standard)
                30..=37 => {
                    attrs.fg = Color::from_index(param - 30).unwrap_or(attrs.fg);
                }
                38 => {
                    if let Some(color) = Self::extended_color(&mut iter) {
                        attrs.fg = color;
                    }
                }
                39 => attrs.fg = Color::Default,

                // Background colors (standard)
                40..=47 => {
                    attrs.bg = Color::from_index(param - 40).unwrap_or(attrs.bg);
                }
                48 => {
                    if let Some(color) = Self::extended_color(&mut iter) {
                        attrs.bg = color;
                    }
                }
                49 => attrs.bg = Color::Default,

                // Bright foreground
                90..=97 => {
                    attrs.fg = Color::from_index(param - 90 + 8).unwrap_or(attrs.fg);
                }
                // Bright background
                100..=107 => {
                    attrs.bg = Color::from_index(param - 100 + 8).unwrap_or(attrs.bg);
                }

                _ => {}
            }
        }
    }

    /// Consume the arguments of a 38/48 colour. Only the 16-colour part of
    /// the 256-colour palette is representable; anything else is dropped.
    fn extended_color(iter: &mut impl Iterator<Item = u16>) -> Option<Color> {
        match iter.next()? {
            5 => iter.next().and_then(Color::from_index),
            2 => {
                // RGB
                iter.next();
                iter.next();
                iter.next();
                None
            }
            _ => None,
        }
    }
}
