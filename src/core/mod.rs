//! Core terminal emulation components.
//!
//! This module contains the low-level plumbing between the game and the
//! rest of the crate:
//!
//! - **process**: child process spawning and the byte transport to it
//! - **term**: VT100 terminal state and ANSI escape sequence parser
//! - **session**: transport + terminal state, one per running game
//!
//! # Architecture
//!
//! ```text
//! Session
//! ├── Transport (pipe I/O with the game process)
//! └── TerminalState
//!     ├── Screen (cell grid + attributes)
//!     ├── Cursor (position + deferred wrap)
//!     └── Parser (ANSI escape sequences)
//! ```

pub mod process;
pub mod session;
pub mod term;
