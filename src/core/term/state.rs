//! Terminal state management
//!
//! This module defines the terminal's screen grid, cursor state, and attributes.
//! Every mutation keeps the cursor inside the grid: out-of-range requests are
//! clamped, never rejected.

use std::fmt;

use bitflags::bitflags;
use unicode_width::UnicodeWidthChar;

/// Terminal state holding the screen and everything the interpreter threads
/// through it (cursor, current style, modes, scroll region).
pub struct TerminalState {
    pub cols: u16,
    pub rows: u16,
    pub screen: Screen,
    pub cursor: CursorState,
    pub current_attrs: CellAttrs,
    pub modes: TerminalModes,
    /// Scroll region (top, bottom) - 0-indexed, inclusive
    pub scroll_region: (u16, u16),
}

impl TerminalState {
    pub fn new(cols: u16, rows: u16) -> Self {
        let cols = cols.max(1);
        let rows = rows.max(1);
        Self {
            cols,
            rows,
            screen: Screen::new(cols, rows),
            cursor: CursorState::default(),
            current_attrs: CellAttrs::default(),
            modes: TerminalModes::default(),
            scroll_region: (0, rows - 1),
        }
    }

    /// Full reset (RIS): blank screen, home cursor, default style and modes
    pub fn reset(&mut self) {
        *self = Self::new(self.cols, self.rows);
    }

    /// Cursor position as (row, col), 0-indexed
    pub fn cursor_position(&self) -> (u16, u16) {
        (self.cursor.row, self.cursor.col)
    }

    /// Move the cursor, clamping to the grid
    fn move_to(&mut self, row: u16, col: u16) {
        self.cursor.row = row.min(self.rows - 1);
        self.cursor.col = col.min(self.cols - 1);
        self.cursor.wrap_pending = false;
    }

    /// Put a character at the current cursor position
    pub fn put_char(&mut self, ch: char) {
        // Cells hold a single glyph; zero-width marks have nowhere to go
        if ch.width().unwrap_or(0) == 0 {
            return;
        }

        if self.cursor.wrap_pending {
            self.cursor.col = 0;
            self.index();
        }

        let row = self.cursor.row as usize;
        let col = self.cursor.col as usize;
        self.screen.lines[row].cells[col] = Cell {
            glyph: ch,
            attrs: self.current_attrs,
        };

        if self.cursor.col + 1 < self.cols {
            self.cursor.col += 1;
        } else if self.modes.contains(TerminalModes::AUTO_WRAP) {
            // Deferred wrap: the cursor stays on the last column until the
            // next printable character arrives.
            self.cursor.wrap_pending = true;
        }
    }

    /// Carriage return - move cursor to column 0
    pub fn carriage_return(&mut self) {
        self.move_to(self.cursor.row, 0);
    }

    /// Line feed as received from the child (LF/VT/FF)
    pub fn linefeed(&mut self) {
        if self.modes.contains(TerminalModes::LINEFEED_NEWLINE) {
            self.cursor.col = 0;
        }
        self.index();
    }

    /// Index - cursor down, scroll the region if at its bottom edge
    pub fn index(&mut self) {
        self.cursor.wrap_pending = false;
        let (_, bottom) = self.scroll_region;
        if self.cursor.row == bottom {
            self.scroll_up(1);
        } else if self.cursor.row < self.rows - 1 {
            self.cursor.row += 1;
        }
    }

    /// Reverse index - cursor up, scroll the region down if at its top edge
    pub fn reverse_index(&mut self) {
        self.cursor.wrap_pending = false;
        let (top, _) = self.scroll_region;
        if self.cursor.row == top {
            self.scroll_down(1);
        } else if self.cursor.row > 0 {
            self.cursor.row -= 1;
        }
    }

    /// Next line (NEL)
    pub fn next_line(&mut self) {
        self.cursor.col = 0;
        self.index();
    }

    /// Backspace - move cursor left
    pub fn backspace(&mut self) {
        self.move_to(self.cursor.row, self.cursor.col.saturating_sub(1));
    }

    /// Horizontal tab (stops every 8 columns)
    pub fn horizontal_tab(&mut self) {
        let col = ((self.cursor.col / 8) + 1).saturating_mul(8);
        self.move_to(self.cursor.row, col);
    }

    /// Scroll the scroll region up by n lines
    pub fn scroll_up(&mut self, n: u16) {
        let (top, bottom) = self.scroll_region;
        let n = n.min(bottom - top + 1);
        for _ in 0..n {
            self.screen.lines.remove(top as usize);
            self.screen.lines.insert(bottom as usize, Row::new(self.cols));
        }
    }

    /// Scroll the scroll region down by n lines
    pub fn scroll_down(&mut self, n: u16) {
        let (top, bottom) = self.scroll_region;
        let n = n.min(bottom - top + 1);
        for _ in 0..n {
            self.screen.lines.remove(bottom as usize);
            self.screen.lines.insert(top as usize, Row::new(self.cols));
        }
    }

    /// Cursor up
    pub fn cursor_up(&mut self, n: u16) {
        self.move_to(self.cursor.row.saturating_sub(n), self.cursor.col);
    }

    /// Cursor down
    pub fn cursor_down(&mut self, n: u16) {
        self.move_to(self.cursor.row.saturating_add(n), self.cursor.col);
    }

    /// Cursor forward (right)
    pub fn cursor_forward(&mut self, n: u16) {
        self.move_to(self.cursor.row, self.cursor.col.saturating_add(n));
    }

    /// Cursor backward (left)
    pub fn cursor_backward(&mut self, n: u16) {
        self.move_to(self.cursor.row, self.cursor.col.saturating_sub(n));
    }

    /// Set cursor position (1-indexed parameters, 0 treated as 1)
    pub fn set_position(&mut self, row: u16, col: u16) {
        self.move_to(row.saturating_sub(1), col.saturating_sub(1));
    }

    /// Set cursor column (1-indexed)
    pub fn set_column(&mut self, col: u16) {
        self.move_to(self.cursor.row, col.saturating_sub(1));
    }

    /// Set cursor row (1-indexed)
    pub fn set_row(&mut self, row: u16) {
        self.move_to(row.saturating_sub(1), self.cursor.col);
    }

    /// Erase in display
    pub fn erase_in_display(&mut self, mode: u16) {
        let cursor_row = self.cursor.row as usize;
        match mode {
            0 => {
                // From cursor to end
                self.erase_in_line(0);
                for row in &mut self.screen.lines[cursor_row + 1..] {
                    row.clear();
                }
            }
            1 => {
                // From start to cursor
                for row in &mut self.screen.lines[..cursor_row] {
                    row.clear();
                }
                self.erase_in_line(1);
            }
            2 | 3 => {
                self.screen.clear();
                self.move_to(0, 0);
            }
            _ => {}
        }
    }

    /// Erase in line
    pub fn erase_in_line(&mut self, mode: u16) {
        let col = self.cursor.col as usize;
        let row = &mut self.screen.lines[self.cursor.row as usize];
        let range = match mode {
            0 => col..row.cells.len(),
            1 => 0..col + 1,
            2 => 0..row.cells.len(),
            _ => return,
        };
        for cell in &mut row.cells[range] {
            *cell = Cell::default();
        }
    }

    /// Insert blank lines at the cursor, pushing the rest of the region down
    pub fn insert_lines(&mut self, n: u16) {
        let (top, bottom) = self.scroll_region;
        let row = self.cursor.row;
        if row < top || row > bottom {
            return;
        }
        for _ in 0..n.min(bottom - row + 1) {
            self.screen.lines.remove(bottom as usize);
            self.screen.lines.insert(row as usize, Row::new(self.cols));
        }
        self.move_to(row, 0);
    }

    /// Delete lines at the cursor, pulling the rest of the region up
    pub fn delete_lines(&mut self, n: u16) {
        let (top, bottom) = self.scroll_region;
        let row = self.cursor.row;
        if row < top || row > bottom {
            return;
        }
        for _ in 0..n.min(bottom - row + 1) {
            self.screen.lines.remove(row as usize);
            self.screen.lines.insert(bottom as usize, Row::new(self.cols));
        }
        self.move_to(row, 0);
    }

    /// Insert blank characters at the cursor, shifting the line right
    pub fn insert_chars(&mut self, n: u16) {
        let col = self.cursor.col as usize;
        let cells = &mut self.screen.lines[self.cursor.row as usize].cells;
        for _ in 0..(n as usize).min(cells.len() - col) {
            cells.pop();
            cells.insert(col, Cell::default());
        }
    }

    /// Delete characters at the cursor, shifting the line left
    pub fn delete_chars(&mut self, n: u16) {
        let col = self.cursor.col as usize;
        let cells = &mut self.screen.lines[self.cursor.row as usize].cells;
        for _ in 0..(n as usize).min(cells.len() - col) {
            cells.remove(col);
            cells.push(Cell::default());
        }
    }

    /// Blank characters starting at the cursor without shifting
    pub fn erase_chars(&mut self, n: u16) {
        let col = self.cursor.col as usize;
        let cells = &mut self.screen.lines[self.cursor.row as usize].cells;
        let end = (col + n as usize).min(cells.len());
        for cell in &mut cells[col..end] {
            *cell = Cell::default();
        }
    }

    /// Set scroll region (1-indexed, inclusive) and home the cursor
    pub fn set_scroll_region(&mut self, top: u16, bottom: u16) {
        let top = top.saturating_sub(1).min(self.rows - 1);
        let bottom = bottom.saturating_sub(1).min(self.rows - 1);
        if top < bottom {
            self.scroll_region = (top, bottom);
        }
        self.move_to(0, 0);
    }

    /// Save cursor position and style
    pub fn save_cursor(&mut self) {
        self.cursor.saved = Some(SavedCursor {
            row: self.cursor.row,
            col: self.cursor.col,
            attrs: self.current_attrs,
        });
    }

    /// Restore cursor position and style
    pub fn restore_cursor(&mut self) {
        if let Some(saved) = self.cursor.saved {
            self.move_to(saved.row, saved.col);
            self.current_attrs = saved.attrs;
        }
    }

    /// Set private (DEC) mode
    pub fn set_private_mode(&mut self, mode: u16, enable: bool) {
        match mode {
            7 => self.modes.set(TerminalModes::AUTO_WRAP, enable),
            // Cursor visibility does not change the grid
            25 => {}
            // Single buffer: entering the alternate screen starts from a
            // blank grid, leaving it keeps whatever was drawn.
            47 | 1047 => {
                if enable {
                    self.erase_in_display(2);
                }
            }
            1048 => {
                if enable {
                    self.save_cursor();
                } else {
                    self.restore_cursor();
                }
            }
            1049 => {
                if enable {
                    self.save_cursor();
                    self.erase_in_display(2);
                } else {
                    self.restore_cursor();
                }
            }
            _ => {} // Ignore unknown modes
        }
    }

    /// Set standard (ANSI) mode
    pub fn set_mode(&mut self, mode: u16, enable: bool) {
        match mode {
            // Insert mode is tracked but printing always overwrites
            4 => self.modes.set(TerminalModes::INSERT, enable),
            20 => self.modes.set(TerminalModes::LINEFEED_NEWLINE, enable),
            _ => {}
        }
    }
}

/// The visible character grid
#[derive(Clone, PartialEq)]
pub struct Screen {
    pub rows: u16,
    pub cols: u16,
    pub lines: Vec<Row>,
}

impl Screen {
    pub fn new(cols: u16, rows: u16) -> Self {
        Self {
            rows,
            cols,
            lines: (0..rows).map(|_| Row::new(cols)).collect(),
        }
    }

    /// Reset every cell to blank
    pub fn clear(&mut self) {
        for row in &mut self.lines {
            row.clear();
        }
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&Cell> {
        self.lines.get(row).and_then(|r| r.cells.get(col))
    }

    /// Text of an inclusive sub-rectangle, one line per row. Bounds are
    /// clamped to the grid.
    pub fn region_text(&self, start_row: usize, start_col: usize, end_row: usize, end_col: usize) -> String {
        let end_row = end_row.min(self.rows as usize - 1);
        let end_col = end_col.min(self.cols as usize - 1);
        let mut text = String::new();
        for row in self.lines.iter().take(end_row + 1).skip(start_row) {
            if start_col <= end_col {
                text.extend(row.cells[start_col..=end_col].iter().map(|c| c.glyph));
            }
            text.push('\n');
        }
        text
    }

    /// First occurrence of a glyph, scanning rows top to bottom
    pub fn find_glyph(&self, glyph: char) -> Option<(u16, u16)> {
        self.lines.iter().enumerate().find_map(|(r, row)| {
            row.cells
                .iter()
                .position(|c| c.glyph == glyph)
                .map(|c| (r as u16, c as u16))
        })
    }
}

impl fmt::Display for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in &self.lines {
            for cell in &row.cells {
                write!(f, "{}", cell.glyph)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Screen({}x{})\n{}", self.cols, self.rows, self)
    }
}

/// A single row
#[derive(Clone, PartialEq)]
pub struct Row {
    pub cells: Vec<Cell>,
}

impl Row {
    pub fn new(cols: u16) -> Self {
        Self {
            cells: vec![Cell::default(); cols as usize],
        }
    }

    pub fn clear(&mut self) {
        for cell in &mut self.cells {
            *cell = Cell::default();
        }
    }
}

/// A single cell
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Cell {
    pub glyph: char,
    pub attrs: CellAttrs,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            glyph: ' ',
            attrs: CellAttrs::default(),
        }
    }
}

/// Cell attributes
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CellAttrs {
    pub fg: Color,
    pub bg: Color,
    pub bold: bool,
}

impl Default for CellAttrs {
    fn default() -> Self {
        Self {
            fg: Color::Default,
            bg: Color::Black,
            bold: false,
        }
    }
}

impl CellAttrs {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// The 16 ANSI colours plus the terminal default
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Color {
    #[default]
    Default,
    Black,
    Red,
    Green,
    Brown,
    Blue,
    Magenta,
    Cyan,
    LightGray,
    DarkGray,
    LightRed,
    LightGreen,
    Yellow,
    LightBlue,
    LightMagenta,
    LightCyan,
    White,
}

impl Color {
    const PALETTE: [Color; 16] = [
        Color::Black,
        Color::Red,
        Color::Green,
        Color::Brown,
        Color::Blue,
        Color::Magenta,
        Color::Cyan,
        Color::LightGray,
        Color::DarkGray,
        Color::LightRed,
        Color::LightGreen,
        Color::Yellow,
        Color::LightBlue,
        Color::LightMagenta,
        Color::LightCyan,
        Color::White,
    ];

    /// Palette index 0-15 (0-7 normal, 8-15 bright)
    pub fn from_index(n: u16) -> Option<Self> {
        Self::PALETTE.get(n as usize).copied()
    }

    /// Bright variant of a normal-intensity colour
    pub fn brighten(self) -> Self {
        match Self::PALETTE.iter().position(|&c| c == self) {
            Some(i) if i < 8 => Self::PALETTE[i + 8],
            _ => self,
        }
    }
}

bitflags! {
    /// Terminal modes
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct TerminalModes: u8 {
        const AUTO_WRAP        = 0b0001;
        const INSERT           = 0b0010;
        const LINEFEED_NEWLINE = 0b0100;
    }
}

impl Default for TerminalModes {
    fn default() -> Self {
        // The child writes through a pipe, so nothing translates its bare
        // LFs into CR LF for us.
        Self::AUTO_WRAP | Self::LINEFEED_NEWLINE
    }
}

/// Cursor state
#[derive(Clone, Debug, Default)]
pub struct CursorState {
    pub row: u16,
    pub col: u16,
    /// Last column was just written with auto-wrap on
    pub wrap_pending: bool,
    pub saved: Option<SavedCursor>,
}

/// Saved cursor state
#[derive(Clone, Copy, Debug)]
pub struct SavedCursor {
    pub row: u16,
    pub col: u16,
    pub attrs: CellAttrs,
}
