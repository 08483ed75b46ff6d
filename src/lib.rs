//! Drive a console roguelike through its terminal output.
//!
//! The game's raw VT100 output is replayed onto an emulated screen, the
//! status panel is read back into a [`game::GameState`], and each input is
//! held back until the previous redraw looks complete.

pub mod config;
pub mod core;
pub mod game;
pub mod keys;
