//! Game state snapshot

/// Everything read off the status panel after one redraw.
///
/// A fresh value is built for every frame; rewards are computed by diffing
/// two of them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GameState {
    /// The status panel was visible on the last frame
    pub on_main_screen: bool,
    /// Set the first time a non-zero maximum HP is seen
    pub started: bool,
    pub won: bool,
    pub died: bool,
    pub escaped_without_orb: bool,
    pub has_orb: bool,

    pub hp: i32,
    pub max_hp: i32,
    pub mp: i32,
    pub max_mp: i32,
    pub armour_class: i32,
    pub evasion: i32,
    pub shielding: i32,
    pub strength: i32,
    pub intelligence: i32,
    pub dexterity: i32,
    pub experience_level: i32,
    pub percent_to_next_level: i32,
    /// Length of the `=` bar after `Noise:`
    pub noise_level: i32,

    pub place: String,
    pub game_time: f64,
}

impl GameState {
    /// Death, win or escape ends the episode
    pub fn is_finished(&self) -> bool {
        self.won || self.died || self.escaped_without_orb
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_unstarted() {
        let state = GameState::default();
        assert!(!state.started);
        assert!(!state.is_finished());
        assert_eq!(state.place, "");
    }

    #[test]
    fn test_finished_outcomes() {
        for state in [
            GameState { won: true, ..Default::default() },
            GameState { died: true, ..Default::default() },
            GameState { escaped_without_orb: true, ..Default::default() },
        ] {
            assert!(state.is_finished());
        }
        let holding = GameState { has_orb: true, ..Default::default() };
        assert!(!holding.is_finished());
    }
}
