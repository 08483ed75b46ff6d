//! Map panel extraction

use std::fmt;

use crate::core::term::{Cell, Color, Screen};

pub const MAP_START_ROW: usize = 0;
pub const MAP_END_ROW: usize = 16;
pub const MAP_START_COL: usize = 0;
pub const MAP_END_COL: usize = 32;

/// Game palette: the 16 console colours, with no "default"
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum MapColor {
    #[default]
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

impl MapColor {
    /// Terminal colour with `Color::Default` resolved to `default`
    fn from_term(color: Color, default: MapColor) -> Self {
        match color {
            Color::Default => default,
            Color::Black => Self::Black,
            Color::Red => Self::Red,
            Color::Green => Self::Green,
            Color::Brown => Self::Brown,
            Color::Blue => Self::Blue,
            Color::Magenta => Self::Magenta,
            Color::Cyan => Self::Cyan,
            Color::LightGray => Self::LightGray,
            Color::DarkGray => Self::DarkGray,
            Color::LightRed => Self::LightRed,
            Color::LightGreen => Self::LightGreen,
            Color::Yellow => Self::Yellow,
            Color::LightBlue => Self::LightBlue,
            Color::LightMagenta => Self::LightMagenta,
            Color::LightCyan => Self::LightCyan,
            Color::White => Self::White,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MapCell {
    pub glyph: char,
    pub fg: MapColor,
    pub bg: MapColor,
}

impl Default for MapCell {
    fn default() -> Self {
        Self {
            glyph: ' ',
            fg: MapColor::LightGray,
            bg: MapColor::Black,
        }
    }
}

impl From<&Cell> for MapCell {
    fn from(cell: &Cell) -> Self {
        let mut fg = cell.attrs.fg;
        if fg == Color::Default {
            fg = Color::LightGray;
        }
        // Bold is how the console draws the bright half of the palette
        if cell.attrs.bold {
            fg = fg.brighten();
        }
        Self {
            glyph: cell.glyph,
            fg: MapColor::from_term(fg, MapColor::LightGray),
            bg: MapColor::from_term(cell.attrs.bg, MapColor::Black),
        }
    }
}

/// Row-major copy of the map panel
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Map {
    pub width: usize,
    pub height: usize,
    cells: Vec<MapCell>,
}

impl Map {
    /// Cell at column `x`, row `y` relative to the panel origin
    pub fn get(&self, x: usize, y: usize) -> Option<&MapCell> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.cells.get(y * self.width + x)
    }

    pub fn rows(&self) -> impl Iterator<Item = &[MapCell]> {
        self.cells.chunks(self.width.max(1))
    }

    /// Position of the first cell showing `glyph`, as (x, y)
    pub fn find(&self, glyph: char) -> Option<(usize, usize)> {
        let index = self.cells.iter().position(|c| c.glyph == glyph)?;
        Some((index % self.width, index / self.width))
    }
}

impl fmt::Display for Map {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.rows() {
            let line: String = row.iter().map(|c| c.glyph).collect();
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}

/// Copy the map panel out of `screen`
pub fn extract_map(screen: &Screen) -> Map {
    let width = MAP_END_COL - MAP_START_COL + 1;
    let height = MAP_END_ROW - MAP_START_ROW + 1;
    let mut cells = Vec::with_capacity(width * height);

    for row in MAP_START_ROW..=MAP_END_ROW {
        for col in MAP_START_COL..=MAP_END_COL {
            cells.push(screen.get(row, col).map(MapCell::from).unwrap_or_default());
        }
    }

    let map = Map { width, height, cells };
    if tracing::enabled!(tracing::Level::TRACE) {
        tracing::trace!("Map:\n{}", map);
    }
    map
}
