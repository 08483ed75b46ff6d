//! Status panel field extraction
//!
//! The status panel occupies the top right of the 80x24 layout. While it is
//! visible the game is on its main screen and every field can be read back
//! with a small regex.

use std::sync::LazyLock;

use regex::Regex;

use super::state::GameState;
use crate::core::term::Screen;

pub const STATS_START_ROW: usize = 0;
pub const STATS_END_ROW: usize = 8;
pub const STATS_START_COL: usize = 37;
pub const STATS_END_COL: usize = 79;

fn pattern(re: &str) -> Regex {
    Regex::new(re).unwrap_or_else(|e| panic!("invalid status pattern {re}: {e}"))
}

static ANCHOR: LazyLock<Regex> = LazyLock::new(|| pattern(r"(?s)Health:.+Magic:.+AC:.+Str:"));
static HEALTH: LazyLock<Regex> = LazyLock::new(|| pattern(r"Health: *(\d+)/(\d+)"));
static MAGIC: LazyLock<Regex> = LazyLock::new(|| pattern(r"Magic: *(\d+)/(\d+)"));
static EXPERIENCE: LazyLock<Regex> = LazyLock::new(|| pattern(r"XL: *(\d+) *Next: *(\d+)"));
static ARMOUR: LazyLock<Regex> = LazyLock::new(|| pattern(r"AC: *(\d+)"));
static EVASION: LazyLock<Regex> = LazyLock::new(|| pattern(r"EV: *(\d+)"));
static SHIELD: LazyLock<Regex> = LazyLock::new(|| pattern(r"SH: *(\d+)"));
static STRENGTH: LazyLock<Regex> = LazyLock::new(|| pattern(r"Str: *(\d+)"));
static INTELLIGENCE: LazyLock<Regex> = LazyLock::new(|| pattern(r"Int: *(\d+)"));
static DEXTERITY: LazyLock<Regex> = LazyLock::new(|| pattern(r"Dex: *(\d+)"));
static TIME: LazyLock<Regex> = LazyLock::new(|| pattern(r"Time: *([\d.]+)"));
static PLACE: LazyLock<Regex> = LazyLock::new(|| pattern(r"Place: *([A-Za-z0-9:]+)"));
static NOISE: LazyLock<Regex> = LazyLock::new(|| pattern(r"Noise: *(=*)"));

/// Raw text of the status panel, one line per row
pub fn stats_panel(screen: &Screen) -> String {
    screen.region_text(STATS_START_ROW, STATS_START_COL, STATS_END_ROW, STATS_END_COL)
}

/// Whether the status panel is currently drawn
pub fn is_on_main_screen(screen: &Screen) -> bool {
    ANCHOR.is_match(&stats_panel(screen))
}

/// Build a new snapshot from the screen, carrying forward anything the
/// screen does not show.
pub fn extract_state(screen: &Screen, previous: &GameState) -> GameState {
    let panel = stats_panel(screen);
    if !ANCHOR.is_match(&panel) {
        return GameState {
            on_main_screen: false,
            ..previous.clone()
        };
    }

    tracing::trace!("Status panel:\n{}", panel);
    parse_stats(&panel.replace('\n', ""), previous)
}

/// Parse flattened status panel text over `previous`
pub fn parse_stats(text: &str, previous: &GameState) -> GameState {
    let mut state = previous.clone();
    state.on_main_screen = true;

    if let Some((hp, max_hp)) = pair(&HEALTH, text) {
        state.hp = hp;
        state.max_hp = max_hp;
    }
    if let Some((mp, max_mp)) = pair(&MAGIC, text) {
        state.mp = mp;
        state.max_mp = max_mp;
    }
    if let Some((level, percent)) = pair(&EXPERIENCE, text) {
        state.experience_level = level;
        state.percent_to_next_level = percent;
    }

    let fields = [
        (&*ARMOUR, &mut state.armour_class),
        (&*EVASION, &mut state.evasion),
        (&*SHIELD, &mut state.shielding),
        (&*STRENGTH, &mut state.strength),
        (&*INTELLIGENCE, &mut state.intelligence),
        (&*DEXTERITY, &mut state.dexterity),
    ];
    for (re, field) in fields {
        if let Some(value) = single(re, text) {
            *field = value;
        }
    }

    if let Some(time) = capture(&TIME, text).and_then(|t| t.parse::<f64>().ok()) {
        state.game_time = time;
    }
    if let Some(place) = capture(&PLACE, text) {
        state.place = place.to_string();
    }

    // The bar shrinks to nothing when quiet, so absence means zero
    state.noise_level = capture(&NOISE, text).map_or(0, |bar| bar.len() as i32);

    if !state.started && state.max_hp != 0 {
        state.started = true;
    }

    state
}

fn capture<'t>(re: &Regex, text: &'t str) -> Option<&'t str> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .filter(|s| !s.is_empty())
}

fn single(re: &Regex, text: &str) -> Option<i32> {
    capture(re, text)?.parse().ok()
}

fn pair(re: &Regex, text: &str) -> Option<(i32, i32)> {
    let caps = re.captures(text)?;
    let first = caps.get(1)?.as_str().parse().ok()?;
    let second = caps.get(2)?.as_str().parse().ok()?;
    Some((first, second))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::term::{TerminalState, VtParser};

    const PANEL: &str = "Health: 23/30  Magic: 4/9  AC: 5  EV: 8  SH: 0  Str: 12  Int: 9  Dex: 14  XL: 3 Next: 42% Place: Dungeon:3 Time: 102.5";

    /// Draw `lines` into the status panel area of a fresh 80x24 terminal
    fn screen_with_panel(lines: &[&str]) -> TerminalState {
        let mut state = TerminalState::new(80, 24);
        let mut parser = VtParser::new();
        for (i, line) in lines.iter().enumerate() {
            let seq = format!("\x1b[{};{}H{}", i + 1, STATS_START_COL + 1, line);
            parser.advance(&seq, &mut state);
        }
        state
    }

    #[test]
    fn test_parse_full_panel() {
        let state = parse_stats(PANEL, &GameState::default());
        assert!(state.on_main_screen);
        assert!(state.started);
        assert_eq!((state.hp, state.max_hp), (23, 30));
        assert_eq!((state.mp, state.max_mp), (4, 9));
        assert_eq!(state.armour_class, 5);
        assert_eq!(state.evasion, 8);
        assert_eq!(state.shielding, 0);
        assert_eq!(state.strength, 12);
        assert_eq!(state.intelligence, 9);
        assert_eq!(state.dexterity, 14);
        assert_eq!(state.experience_level, 3);
        assert_eq!(state.percent_to_next_level, 42);
        assert_eq!(state.place, "Dungeon:3");
        assert_eq!(state.game_time, 102.5);
        assert_eq!(state.noise_level, 0);
    }

    #[test]
    fn test_noise_is_bar_length() {
        let text = format!("{PANEL} Noise: ====   ");
        assert_eq!(parse_stats(&text, &GameState::default()).noise_level, 4);

        let loud = GameState { noise_level: 7, ..Default::default() };
        assert_eq!(parse_stats(PANEL, &loud).noise_level, 0);
    }

    #[test]
    fn test_missing_fields_carry_forward() {
        let previous = GameState {
            place: "Lair:2".to_string(),
            game_time: 55.0,
            dexterity: 11,
            ..Default::default()
        };
        let state = parse_stats("Health: 10/20 Magic: 0/0 AC: 2 Str: 15", &previous);
        assert_eq!(state.hp, 10);
        assert_eq!(state.strength, 15);
        assert_eq!(state.place, "Lair:2");
        assert_eq!(state.game_time, 55.0);
        assert_eq!(state.dexterity, 11);
    }

    #[test]
    fn test_started_needs_max_hp() {
        let state = parse_stats("Health: 0/0 Magic: 0/0 AC: 0 Str: 0", &GameState::default());
        assert!(!state.started);

        // Once started it stays started
        let previous = GameState { started: true, ..Default::default() };
        let state = parse_stats("Health: 0/0 Magic: 0/0 AC: 0 Str: 0", &previous);
        assert!(state.started);
    }

    #[test]
    fn test_extract_from_screen() {
        let term = screen_with_panel(&[
            "Bot the Skirmisher",
            "Minotaur Berserker",
            "Health: 18/18 ========================",
            "Magic:  0/0",
            "AC:  2     Str: 21",
            "EV:  9     Int:  3",
            "SH:  0     Dex: 12",
            "XL:  1 Next:  0% Place: Dungeon:1",
            "Noise: ==       Time: 0.0 (0.0)",
        ]);
        assert!(is_on_main_screen(&term.screen));

        let state = extract_state(&term.screen, &GameState::default());
        assert!(state.started);
        assert_eq!((state.hp, state.max_hp), (18, 18));
        assert_eq!(state.strength, 21);
        assert_eq!(state.intelligence, 3);
        assert_eq!(state.dexterity, 12);
        assert_eq!(state.place, "Dungeon:1");
        assert_eq!(state.noise_level, 2);
        assert_eq!(state.game_time, 0.0);
    }

    #[test]
    fn test_off_main_screen_keeps_previous() {
        let term = screen_with_panel(&["Inventory: 3/52 slots"]);
        assert!(!is_on_main_screen(&term.screen));

        let previous = GameState {
            on_main_screen: true,
            hp: 9,
            ..Default::default()
        };
        let state = extract_state(&term.screen, &previous);
        assert!(!state.on_main_screen);
        assert!(!state.started);
        assert_eq!(state.hp, 9);
    }
}
