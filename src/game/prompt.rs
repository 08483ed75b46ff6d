//! Blocking prompts and redraw-complete markers
//!
//! The game never says when it is done drawing. These tables are the
//! heuristics used instead: prompts that would stall the game until answered,
//! and footers of full-screen views that are drawn last.

use std::sync::LazyLock;

use regex::Regex;

use crate::keys;

/// A prompt that must be answered before the game accepts further input
#[derive(Debug)]
pub struct Prompt {
    pub name: &'static str,
    /// Any of these substrings in an output chunk identifies the prompt
    pub markers: &'static [&'static str],
    pub reply: &'static [u8],
}

impl Prompt {
    fn matches(&self, chunk: &str) -> bool {
        self.markers.iter().any(|m| chunk.contains(m))
    }
}

/// Checked in order; the first match wins
pub const PROMPTS: &[Prompt] = &[
    Prompt {
        name: "more",
        markers: &["--more--"],
        reply: keys::SPACE,
    },
    // Long answers here can crash the game
    Prompt {
        name: "inscription",
        markers: &["Inscribe with what?", "Replace inscription with what?"],
        reply: keys::ESC,
    },
    Prompt {
        name: "empty drop",
        markers: &["Drop what? 0/52 slots"],
        reply: keys::ESC,
    },
    Prompt {
        name: "stat increase",
        markers: &["Increase (S)trength, (I)ntelligence, or (D)exterity?"],
        reply: b"s",
    },
    Prompt {
        name: "leave",
        markers: &[
            "Are you sure you want to leave the Dungeon?",
            "If you leave the dungeon now",
        ],
        reply: b"y",
    },
    Prompt {
        name: "confirm with yes",
        markers: &["Confirm with \"yes\""],
        reply: b"yes\r",
    },
    Prompt {
        name: "yes/no",
        markers: &["(y/n)", "(Y/n)", "(y/N)"],
        reply: b"n",
    },
];

/// First prompt found in `chunk`
pub fn detect(chunk: &str) -> Option<&'static Prompt> {
    PROMPTS.iter().find(|p| p.matches(chunk))
}

/// Footers of full-screen views, all drawn after the rest of the view
pub const READY_MARKERS: &[&str] = &[
    // abilities
    "to toggle between ability selection and description.",
    // religion
    "Powers|Wrath",
    // skills
    "costs|targets",
    // memorised spells
    "Describe|Hide|Show",
    // cast spell
    "to toggle spell view.",
    // monster description with spells
    "shown in red if you are in range.",
];

static CHARACTER_SHEET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"HPRegen .*MPRegen .*@: .*A: ")
        .unwrap_or_else(|e| panic!("invalid character sheet pattern: {e}"))
});

/// Whether text accumulated since the last input ends a known full-screen view
pub fn has_ready_marker(text: &str) -> bool {
    let flat = text.replace('\n', "");
    READY_MARKERS.iter().any(|m| flat.contains(m)) || CHARACTER_SHEET.is_match(&flat)
}
