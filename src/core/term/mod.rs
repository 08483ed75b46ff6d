//! VT100 terminal model: screen grid plus the escape-sequence interpreter.

pub mod parser;
pub mod state;

pub use parser::VtParser;
pub use state::{Cell, CellAttrs, Color, Screen, TerminalModes, TerminalState};
