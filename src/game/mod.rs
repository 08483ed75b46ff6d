//! Game-level view of the emulated screen.
//!
//! - **state**: `GameState` snapshot read from the status panel
//! - **extract**: status panel parsing
//! - **map**: map panel projection
//! - **prompt**: blocking prompts and redraw-complete markers
//! - **episode**: the turn synchronizer driving one game

pub mod episode;
pub mod extract;
pub mod map;
pub mod prompt;
pub mod state;

pub use episode::{Episode, EpisodeStats, Phase, Step};
pub use map::{Map, MapCell, MapColor};
pub use state::GameState;
