//! Turn synchronization
//!
//! An [`Episode`] drives one game from launch to death, escape or
//! abandonment. Each `step` sends one action and then reads output until the
//! redraw looks complete. There is no acknowledgement from the game, so
//! "complete" is decided by a fallback ladder:
//!
//! 1. the output ends by parking the cursor on the avatar glyph,
//! 2. a known full-screen view footer has been drawn,
//! 3. no output arrived for the read timeout.
//!
//! Blocking prompts seen along the way are answered immediately so the game
//! never waits on input the caller does not know it owes.

use std::time::{Duration, Instant};

use super::extract;
use super::map::{self, Map};
use super::prompt;
use super::state::GameState;
use crate::config::{Config, TerminalConfig, TimingConfig};
use crate::core::process::Launcher;
use crate::core::session::Session;
use crate::core::term::Screen;
use crate::keys;

/// Drawn once the dungeon has been generated
pub const START_MARKER: &str = "Found a staircase leading out of the dungeon";
/// Starting weapon menu
pub const WEAPON_PROMPT: &str = "You have a choice of weapons";
pub const ESCAPED_MARKER: &str = "You have escaped";
pub const DEATH_MARKER: &str = "You die";
pub const ORB_MARKER: &str = "You pick up the Orb of Zot";

pub const START_REWARD: i64 = 1;
pub const ORB_REWARD: i64 = 10_000;
pub const ESCAPE_REWARD: i64 = 1_000_000;

/// Glyph the avatar is drawn with
const AVATAR: char = '@';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for the dungeon to appear
    AwaitingStart,
    Playing,
    /// Death, escape or abandonment
    Finished,
    /// Launch, start or write failure; only `reset` recovers
    Error,
}

/// Result of one `step`
#[derive(Debug, Clone)]
pub struct Step {
    pub state: GameState,
    pub reward: i64,
    pub done: bool,
}

/// Per-episode counters
#[derive(Debug, Clone, Default)]
pub struct EpisodeStats {
    /// 1-based episode number
    pub episode: u32,
    pub steps: u64,
    /// Frames that received any output
    pub frames: u64,
    pub score: i64,
    /// Slowest redraw seen for a short action
    pub max_read_time: Duration,
    /// Slowest redraw that ended in a recognised ready state
    pub max_ready_time: Duration,
}

/// Output read after one input
struct Frame {
    text: String,
}

pub struct Episode<L: Launcher> {
    launcher: L,
    terminal: TerminalConfig,
    timing: TimingConfig,
    weapon_key: Vec<u8>,

    session: Option<Session<L::Transport>>,
    phase: Phase,
    state: GameState,
    map: Map,
    stats: EpisodeStats,

    /// Avatar position, found once per episode
    avatar: Option<(u16, u16)>,
    /// Last frame ended in a recognised ready state
    ready: bool,
    last_sent: Vec<u8>,
    /// Sticky until the next reset
    error: bool,
    stuck_steps: u32,
}

impl<L: Launcher> Episode<L> {
    pub fn new(launcher: L, config: &Config) -> Self {
        Self {
            launcher,
            terminal: config.terminal.clone(),
            timing: config.timing.clone(),
            weapon_key: config.game.weapon_key.as_bytes().to_vec(),
            session: None,
            phase: Phase::AwaitingStart,
            state: GameState::default(),
            map: Map::default(),
            stats: EpisodeStats::default(),
            avatar: None,
            ready: false,
            last_sent: Vec::new(),
            error: false,
            stuck_steps: 0,
        }
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// Map panel as of the last main-screen frame
    pub fn map(&self) -> &Map {
        &self.map
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn stats(&self) -> &EpisodeStats {
        &self.stats
    }

    pub fn has_error(&self) -> bool {
        self.error
    }

    pub fn screen(&self) -> Option<&Screen> {
        self.session.as_ref().map(|s| s.screen())
    }

    /// Start a new game, closing any previous one.
    ///
    /// Returns the initial state and whether the episode is already over,
    /// which happens when the game could not be started.
    pub fn reset(&mut self) -> (GameState, bool) {
        tracing::info!("reset");
        self.close();

        self.stats = EpisodeStats {
            episode: self.stats.episode + 1,
            ..EpisodeStats::default()
        };
        self.phase = Phase::AwaitingStart;
        self.state = GameState::default();
        self.map = Map::default();
        self.avatar = None;
        self.ready = false;
        self.last_sent.clear();
        self.error = false;
        self.stuck_steps = 0;

        let (cols, rows) = (self.terminal.cols, self.terminal.rows);
        match self.launcher.launch(cols, rows) {
            Ok(transport) => self.session = Some(Session::new(transport, cols, rows)),
            Err(e) => {
                tracing::error!("Failed to start episode: {}", e);
                self.error = true;
                self.phase = Phase::Error;
                return (self.state.clone(), true);
            }
        }

        let mut started = false;
        let mut weapon_chosen = false;
        for _ in 0..self.timing.start_attempts {
            if let Some(frame) = self.read_frame() {
                let _ = self.process_frame(&frame);
            }
            if self.error {
                break;
            }

            // The start reward must latch here, not in the first step
            let screen = self.screen_text();
            if screen.contains(START_MARKER) && self.state.started {
                started = true;
                break;
            }
            if !weapon_chosen && screen.contains(WEAPON_PROMPT) {
                let key = self.weapon_key.clone();
                self.send(&key);
                weapon_chosen = true;
            }
        }

        if !started && !self.error {
            tracing::error!(
                "Failed to start episode. Screen dump:\n{}",
                self.screen_text()
            );
            self.error = true;
        }

        self.phase = if self.error {
            Phase::Error
        } else if self.state.is_finished() {
            Phase::Finished
        } else {
            Phase::Playing
        };
        tracing::info!("Episode {} started: {:?}", self.stats.episode, self.phase);

        let done = self.error || self.state.is_finished();
        (self.state.clone(), done)
    }

    /// Send one action and wait for the game to finish reacting to it
    pub fn step(&mut self, action: &[u8]) -> Step {
        if self.error || self.phase != Phase::Playing {
            return Step {
                state: self.state.clone(),
                reward: 0,
                done: true,
            };
        }

        self.stats.steps += 1;
        tracing::debug!("Step {} start: ready={}", self.stats.steps, self.ready);
        tracing::trace!("Screen:\n{}", self.screen_text());

        let prev_time = self.state.game_time;
        self.send(action);

        let mut reward = 0;
        if !self.error {
            if let Some(frame) = self.read_frame() {
                reward = self.process_frame(&frame);
            }
        }

        if self.state.game_time == prev_time {
            self.stuck_steps += 1;
        } else {
            self.stuck_steps = 0;
        }

        self.stats.score += reward;

        let mut done = self.error || self.state.is_finished();
        if !done && self.stuck_steps >= self.timing.stuck_step_limit {
            tracing::info!(
                "Stuck for {} steps. Giving up. Screen dump:\n{}",
                self.stuck_steps,
                self.screen_text()
            );
            done = true;
        }

        if self.stats.steps % 100 == 0 {
            tracing::info!("Step {}: Game Time={}", self.stats.steps, self.state.game_time);
        }

        if self.error {
            self.phase = Phase::Error;
        } else if done {
            self.phase = Phase::Finished;
        }

        Step {
            state: self.state.clone(),
            reward,
            done,
        }
    }

    /// Quit the game and stop the child
    pub fn close(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };

        if session.is_running() && !self.error {
            let quit = [
                keys::ESC,
                keys::ESC,
                keys::ESC,
                keys::CTRL_Q,
                b"yes".as_slice(),
                keys::ESC,
                keys::ESC,
                keys::ESC,
            ]
            .concat();
            tracing::debug!("Sending: {}", keys::printable(&quit));
            if let Err(e) = session.write(&quit) {
                tracing::debug!("Quit keys not delivered: {}", e);
            }
        }
        session.close(self.timing.quit_grace());
    }

    fn send(&mut self, data: &[u8]) {
        if self.error {
            return;
        }
        let Some(session) = self.session.as_mut() else {
            return;
        };

        tracing::debug!("Sending: {}", keys::printable(data));
        self.last_sent = data.to_vec();
        if let Err(e) = session.write(data) {
            tracing::error!("{}", e);
            tracing::error!("Input was not accepted. This is where I was:\n{}", session.screen());
            self.error = true;
        }
    }

    fn screen_text(&self) -> String {
        self.session
            .as_ref()
            .map(|s| s.screen().to_string())
            .unwrap_or_default()
    }

    /// Read output until the redraw looks complete or the timeout passes.
    ///
    /// Returns `None` when nothing arrived at all.
    fn read_frame(&mut self) -> Option<Frame> {
        let action = keys::printable(&self.last_sent);
        let long_running = self.state.on_main_screen
            && self.ready
            && self.timing.is_long_running(&self.last_sent);
        let timeout = if long_running {
            tracing::debug!(
                "Step {}: Starting long running action: {}",
                self.stats.steps,
                action
            );
            self.timing.long_running_timeout()
        } else {
            self.timing.read_timeout()
        };
        let poll = self.timing.poll_interval();
        let limit = self.timing.frame_limit();

        let mut text = String::new();
        let mut got_data = false;
        let mut ready = false;
        let mut read_time = Duration::ZERO;
        let mut ready_time = None;
        let mut polls = 0u32;
        let start = Instant::now();

        loop {
            polls += 1;
            let Some(session) = self.session.as_mut() else {
                break;
            };

            let Some(chunk) = session.poll_output(poll) else {
                let elapsed = start.elapsed();
                if elapsed >= timeout {
                    if long_running {
                        tracing::warn!(
                            "Step {}: Timeout on action '{}': {:.3} seconds. Screen dump:\n{}",
                            self.stats.steps,
                            action,
                            elapsed.as_secs_f64(),
                            session.screen()
                        );
                    } else if got_data {
                        tracing::debug!(
                            "Step {}: Not ready after {:.3} seconds, action '{}'",
                            self.stats.steps,
                            elapsed.as_secs_f64(),
                            action
                        );
                    }
                    break;
                }
                continue;
            };

            read_time = start.elapsed();
            tracing::trace!("Got {} bytes of data", chunk.len());
            text.push_str(&chunk);
            got_data = true;

            if let Some(p) = prompt::detect(&chunk) {
                if p.name == "more" {
                    tracing::info!("Detected --more-- prompt");
                } else {
                    tracing::debug!("Detected {} prompt", p.name);
                }
                self.send(p.reply);
            } else if self.is_ready(&text) {
                ready_time = Some(read_time);
                ready = true;
                break;
            }

            if read_time >= limit {
                tracing::warn!(
                    "Step {}: Output still arriving after {:.3} seconds, action '{}'",
                    self.stats.steps,
                    read_time.as_secs_f64(),
                    action
                );
                break;
            }
        }

        self.ready = ready;
        if !got_data {
            return None;
        }

        tracing::trace!("read_loop_count={}", polls);
        if self.stats.steps >= 1 && !long_running {
            if read_time > self.stats.max_read_time {
                self.stats.max_read_time = read_time;
                tracing::info!(
                    "Step {}: Max redraw time: {:.3} seconds, action={}",
                    self.stats.steps,
                    read_time.as_secs_f64(),
                    action
                );
            }
            if let Some(ready_time) = ready_time {
                if ready_time > self.stats.max_ready_time {
                    self.stats.max_ready_time = ready_time;
                    tracing::info!(
                        "Step {}: Max known ready time: {:.3} seconds, action={}",
                        self.stats.steps,
                        ready_time.as_secs_f64(),
                        action
                    );
                }
            }
        }
        self.stats.frames += 1;

        Some(Frame { text })
    }

    /// Readiness ladder over the text accumulated for this frame
    fn is_ready(&mut self, text: &str) -> bool {
        let Some(session) = self.session.as_ref() else {
            return false;
        };

        // The main screen leaves the cursor on the avatar once drawn
        if self.avatar.is_none() {
            self.avatar = session.screen().find_glyph(AVATAR);
            if let Some((row, col)) = self.avatar {
                tracing::info!("{} found at {},{}", AVATAR, row + 1, col + 1);
            }
        }
        // Passing over the avatar cell while printing does not count; the
        // redraw ends with an explicit move back onto it.
        if let Some((row, col)) = self.avatar {
            let park = format!("\x1b[{};{}H", row + 1, col + 1);
            if session.is_idle()
                && session.cursor_position() == (row, col)
                && text.trim_end_matches('\n').ends_with(&park)
            {
                return true;
            }
        }

        prompt::has_ready_marker(text)
    }

    /// Extract the new state and score it against the previous one
    fn process_frame(&mut self, frame: &Frame) -> i64 {
        let Some(session) = self.session.as_ref() else {
            return 0;
        };

        let current = extract::extract_state(session.screen(), &self.state);
        if current.on_main_screen {
            self.map = map::extract_map(session.screen());
        }

        let (current, reward) = score_transition(&self.state, current, &frame.text);
        if current.died && !self.state.died {
            tracing::info!("Step {}: Died", self.stats.steps);
        }
        if current.has_orb && !self.state.has_orb {
            tracing::info!("Step {}: Picked up the Orb", self.stats.steps);
        }
        if reward != 0 {
            tracing::debug!("Reward: {}", reward);
        }

        self.state = current;
        reward
    }
}

impl<L: Launcher> Drop for Episode<L> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Score the move from `previous` to `current` given the frame's output.
///
/// Also records outcomes the status panel cannot show: the orb pickup and
/// the end of the game.
pub fn score_transition(previous: &GameState, mut current: GameState, output: &str) -> (GameState, i64) {
    if !previous.started {
        let reward = if current.started { START_REWARD } else { 0 };
        return (current, reward);
    }

    let mut reward = 0;
    if output.contains(ESCAPED_MARKER) {
        if current.has_orb {
            current.won = true;
            reward = ESCAPE_REWARD;
        } else {
            current.escaped_without_orb = true;
            reward = -ESCAPE_REWARD;
        }
    } else if output.contains(DEATH_MARKER) {
        current.died = true;
    }

    if current.is_finished() {
        return (current, reward);
    }

    if !current.has_orb && output.contains(ORB_MARKER) {
        reward += ORB_REWARD;
        current.has_orb = true;
    }

    let levels = i64::from(current.experience_level - previous.experience_level);
    let percent = i64::from(current.percent_to_next_level - previous.percent_to_next_level);
    reward += levels * 100 + percent;

    (current, reward)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::process::{ProcessError, Result, Transport};
    use std::collections::VecDeque;
    use std::io;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    type Responder = fn(&[u8]) -> Vec<Vec<u8>>;

    /// Shared view of what the fake game saw
    #[derive(Clone, Default)]
    struct Log {
        writes: Arc<Mutex<Vec<Vec<u8>>>>,
        fail_writes: Arc<AtomicBool>,
        launches: Arc<AtomicU32>,
    }

    impl Log {
        fn writes(&self) -> Vec<Vec<u8>> {
            self.writes.lock().unwrap().clone()
        }
    }

    struct FakeTransport {
        pending: VecDeque<Vec<u8>>,
        respond: Responder,
        log: Log,
    }

    impl Transport for FakeTransport {
        fn write(&mut self, data: &[u8]) -> Result<()> {
            if self.log.fail_writes.load(Ordering::SeqCst) {
                return Err(ProcessError::Write(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "input overrun",
                )));
            }
            self.log.writes.lock().unwrap().push(data.to_vec());
            self.pending.extend((self.respond)(data));
            Ok(())
        }

        fn read_timeout(&mut self, _timeout: Duration) -> Option<Vec<u8>> {
            self.pending.pop_front()
        }

        fn is_running(&self) -> bool {
            true
        }
    }

    struct FakeLauncher {
        initial: Vec<Vec<u8>>,
        respond: Responder,
        log: Log,
        fail: bool,
    }

    impl Launcher for FakeLauncher {
        type Transport = FakeTransport;

        fn launch(&mut self, _cols: u16, _rows: u16) -> Result<FakeTransport> {
            self.log.launches.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ProcessError::NotRunning);
            }
            self.log.writes.lock().unwrap().clear();
            Ok(FakeTransport {
                pending: self.initial.iter().cloned().collect(),
                respond: self.respond,
                log: self.log.clone(),
            })
        }
    }

    fn test_config() -> Config {
        let mut config = Config::default();
        config.timing.poll_interval_ms = 1;
        config.timing.read_timeout_ms = 5;
        config.timing.long_running_timeout_ms = 20;
        config
    }

    fn episode(initial: Vec<Vec<u8>>, respond: Responder) -> (Episode<FakeLauncher>, Log) {
        let log = Log::default();
        let launcher = FakeLauncher {
            initial,
            respond,
            log: log.clone(),
            fail: false,
        };
        (Episode::new(launcher, &test_config()), log)
    }

    fn panel(xl: i32, percent: i32, time: &str) -> String {
        let lines = [
            "Bot the Basher".to_string(),
            "Minotaur Berserker".to_string(),
            "Health: 18/18".to_string(),
            "Magic:  0/0".to_string(),
            "AC:  2     Str: 21".to_string(),
            "EV:  9     Int:  3".to_string(),
            "SH:  0     Dex: 12".to_string(),
            format!("XL: {xl:2} Next: {percent:2}% Place: Dungeon:1"),
            format!("Noise:          Time: {time}"),
        ];
        lines
            .iter()
            .enumerate()
            .map(|(i, line)| format!("\x1b[{};38H{}", i + 1, line))
            .collect()
    }

    /// Full main screen redraw ending with the cursor on the avatar
    fn main_screen(xl: i32, percent: i32, time: &str, message: &str) -> Vec<u8> {
        format!(
            "\x1b[2J{}\x1b[18;1H{}\x1b[5;10H@\x1b[5;10H",
            panel(xl, percent, time),
            message
        )
        .into_bytes()
    }

    fn started(message: &str) -> Vec<Vec<u8>> {
        vec![main_screen(1, 0, "0.0", &format!("{START_MARKER}!{message}"))]
    }

    fn silent(_: &[u8]) -> Vec<Vec<u8>> {
        Vec::new()
    }

    #[test]
    fn test_reset_answers_weapon_prompt_once() {
        fn respond(data: &[u8]) -> Vec<Vec<u8>> {
            match data {
                b"c" => vec![main_screen(1, 0, "0.0", &format!("{START_MARKER}."))],
                _ => Vec::new(),
            }
        }
        let weapons = b"\x1b[2J\x1b[HYou have a choice of weapons.\n a - hand axe\n b - spear".to_vec();
        let (mut ep, log) = episode(vec![weapons], respond);

        let (state, done) = ep.reset();
        assert!(!done);
        assert!(state.started);
        assert!(state.on_main_screen);
        assert_eq!(ep.phase(), Phase::Playing);
        assert_eq!(log.writes(), vec![b"c".to_vec()]);
        assert_eq!(ep.stats().episode, 1);
        // The start reward never reaches the score
        assert_eq!(ep.stats().score, 0);
        assert_eq!(ep.map().get(9, 4).map(|c| c.glyph), Some('@'));
    }

    #[test]
    fn test_more_prompt_sends_one_space() {
        fn respond(data: &[u8]) -> Vec<Vec<u8>> {
            match data {
                b"x" => vec![b"\x1b[18;1HYou see a goblin.--more--".to_vec()],
                b" " => vec![main_screen(1, 0, "1.0", "")],
                _ => Vec::new(),
            }
        }
        let (mut ep, log) = episode(started(""), respond);
        assert!(!ep.reset().1);

        let step = ep.step(b"x");
        assert!(!step.done);
        assert_eq!(step.reward, 0);
        assert_eq!(log.writes(), vec![b"x".to_vec(), b" ".to_vec()]);
        assert_eq!(step.state.game_time, 1.0);
    }

    #[test]
    fn test_experience_reward() {
        fn respond(data: &[u8]) -> Vec<Vec<u8>> {
            match data {
                b"x" => vec![main_screen(4, 5, "11.0", "You feel more experienced!")],
                _ => Vec::new(),
            }
        }
        let initial = vec![main_screen(3, 90, "10.0", START_MARKER)];
        let (mut ep, _log) = episode(initial, respond);
        let (state, _) = ep.reset();
        assert_eq!(state.experience_level, 3);
        assert_eq!(state.percent_to_next_level, 90);

        let step = ep.step(b"x");
        assert_eq!(step.reward, 15);
        assert_eq!(step.state.experience_level, 4);
        assert_eq!(ep.stats().score, 15);
        assert_eq!(ep.stats().steps, 1);
        assert!(ep.stats().frames >= 2);
    }

    #[test]
    fn test_stuck_guard() {
        fn respond(_: &[u8]) -> Vec<Vec<u8>> {
            vec![main_screen(1, 0, "0.0", "You can't go that way.")]
        }
        let (mut ep, _log) = episode(started(""), respond);
        ep.reset();

        for i in 1..1000 {
            let step = ep.step(b"#");
            assert!(!step.done, "done early at step {i}");
        }
        let step = ep.step(b"#");
        assert!(step.done);
        assert!(!step.state.is_finished());
        assert_eq!(ep.phase(), Phase::Finished);
        assert!(ep.step(b"#").done);
    }

    #[test]
    fn test_write_failure_is_sticky() {
        fn respond(_: &[u8]) -> Vec<Vec<u8>> {
            vec![main_screen(1, 0, "5.0", "")]
        }
        let (mut ep, log) = episode(started(""), respond);
        ep.reset();

        log.fail_writes.store(true, Ordering::SeqCst);
        let step = ep.step(b"x");
        assert!(step.done);
        assert_eq!(step.reward, 0);
        assert!(ep.has_error());
        assert_eq!(ep.phase(), Phase::Error);

        // Nothing more is sent even once the pipe would accept it again
        log.fail_writes.store(false, Ordering::SeqCst);
        let step = ep.step(b"x");
        assert!(step.done);
        assert_eq!(step.reward, 0);
        assert!(log.writes().is_empty());

        let (_, done) = ep.reset();
        assert!(!done);
        assert!(!ep.has_error());
        assert_eq!(log.launches.load(Ordering::SeqCst), 2);
        assert_eq!(ep.stats().episode, 2);
    }

    #[test]
    fn test_start_failure() {
        let (mut ep, _log) = episode(vec![b"\x1b[2JLoading...".to_vec()], silent);
        let (state, done) = ep.reset();
        assert!(done);
        assert!(!state.started);
        assert!(ep.has_error());
        assert_eq!(ep.phase(), Phase::Error);
        assert!(ep.step(b"x").done);
    }

    #[test]
    fn test_launch_failure() {
        let log = Log::default();
        let launcher = FakeLauncher {
            initial: Vec::new(),
            respond: silent,
            log: log.clone(),
            fail: true,
        };
        let mut ep = Episode::new(launcher, &test_config());
        let (_, done) = ep.reset();
        assert!(done);
        assert!(ep.has_error());
        assert!(ep.screen().is_none());
    }

    #[test]
    fn test_death_ends_episode() {
        fn respond(_: &[u8]) -> Vec<Vec<u8>> {
            vec![main_screen(1, 0, "3.0", "You die...")]
        }
        let (mut ep, _log) = episode(started(""), respond);
        ep.reset();

        let step = ep.step(b"x");
        assert!(step.done);
        assert!(step.state.died);
        assert_eq!(ep.phase(), Phase::Finished);

        let after = ep.step(b"x");
        assert!(after.done);
        assert_eq!(after.reward, 0);
    }

    #[test]
    fn test_ready_marker_ends_frame() {
        fn respond(data: &[u8]) -> Vec<Vec<u8>> {
            match data {
                b"a" => vec![
                    b"\x1b[2J\x1b[1;1H  Ability - do what?".to_vec(),
                    b"\x1b[24;1H[!] to toggle between ability selection and description.".to_vec(),
                    // Only arrives if the frame keeps reading past the footer
                    b"\x1b[2J".to_vec(),
                ],
                _ => Vec::new(),
            }
        }
        let (mut ep, _log) = episode(started(""), respond);
        ep.reset();

        ep.step(b"a");
        let screen = ep.screen().unwrap().to_string();
        assert!(screen.contains("Ability - do what?"));
        assert!(!ep.state().on_main_screen);
    }

    #[test]
    fn test_split_redraw_waits_for_cursor_park() {
        fn respond(data: &[u8]) -> Vec<Vec<u8>> {
            match data {
                // The first chunk stops with the cursor on the avatar cell
                b"x" => vec![
                    b"\x1b[5;1H.........".to_vec(),
                    main_screen(1, 0, "7.0", ""),
                ],
                _ => Vec::new(),
            }
        }
        let (mut ep, _log) = episode(started(""), respond);
        ep.reset();

        let step = ep.step(b"x");
        assert_eq!(step.state.game_time, 7.0);
        assert_eq!(ep.stats().frames, 2);
    }

    fn long_running_config() -> Config {
        let mut config = test_config();
        config.timing.long_running_timeout_ms = 200;
        config
    }

    /// Explore output that never parks the cursor back on the avatar
    fn exploring(data: &[u8]) -> Vec<Vec<u8>> {
        match data {
            b"o" | b"x" => vec![b"\x1b[18;1HYou start exploring.".to_vec()],
            _ => Vec::new(),
        }
    }

    #[test]
    fn test_long_running_action_after_ready_frame() {
        let log = Log::default();
        let launcher = FakeLauncher {
            initial: started(""),
            respond: exploring,
            log: log.clone(),
            fail: false,
        };
        let mut ep = Episode::new(launcher, &long_running_config());
        ep.reset();

        let start = Instant::now();
        let step = ep.step(b"o");
        assert!(start.elapsed() >= Duration::from_millis(200));
        assert!(!step.done);
        assert!(!ep.has_error());
        assert_eq!(ep.phase(), Phase::Playing);
        // Long-running redraws stay out of the max-time stats
        assert_eq!(ep.stats().max_read_time, Duration::ZERO);
    }

    #[test]
    fn test_long_running_action_needs_ready_frame() {
        let log = Log::default();
        let launcher = FakeLauncher {
            initial: started(""),
            respond: exploring,
            log: log.clone(),
            fail: false,
        };
        let mut ep = Episode::new(launcher, &long_running_config());
        ep.reset();

        // Leaves the frame unready
        assert!(!ep.step(b"x").done);

        let start = Instant::now();
        let step = ep.step(b"o");
        assert!(start.elapsed() < Duration::from_millis(200));
        assert!(!step.done);
        assert_eq!(log.writes(), vec![b"x".to_vec(), b"o".to_vec()]);
    }

    #[test]
    fn test_start_waits_for_status_panel() {
        fn respond(data: &[u8]) -> Vec<Vec<u8>> {
            match data {
                b"x" => vec![main_screen(1, 0, "1.0", "")],
                _ => Vec::new(),
            }
        }
        // The start message and avatar are drawn before the status panel
        let early = format!("\x1b[2J\x1b[18;1H{START_MARKER}.\x1b[5;10H@\x1b[5;10H").into_bytes();
        let mut initial = vec![early];
        initial.extend(started(""));
        let (mut ep, _log) = episode(initial, respond);

        let (state, done) = ep.reset();
        assert!(!done);
        assert!(state.started);

        let step = ep.step(b"x");
        assert_eq!(step.reward, 0);
        assert_eq!(ep.stats().score, 0);
    }

    #[test]
    fn test_score_start() {
        let previous = GameState::default();
        let current = GameState {
            started: true,
            ..Default::default()
        };
        assert_eq!(score_transition(&previous, current, "").1, START_REWARD);
        assert_eq!(score_transition(&previous, GameState::default(), "").1, 0);
    }

    #[test]
    fn test_score_experience() {
        let previous = GameState {
            started: true,
            experience_level: 3,
            percent_to_next_level: 90,
            ..Default::default()
        };
        let current = GameState {
            experience_level: 4,
            percent_to_next_level: 5,
            ..previous.clone()
        };
        assert_eq!(score_transition(&previous, current, "").1, 15);
    }

    #[test]
    fn test_score_orb_and_escape() {
        let playing = GameState {
            started: true,
            ..Default::default()
        };

        let (holding, reward) =
            score_transition(&playing, playing.clone(), "You pick up the Orb of Zot!");
        assert!(holding.has_orb);
        assert_eq!(reward, ORB_REWARD);

        // Only the first pickup pays
        let (_, reward) = score_transition(&holding, holding.clone(), "You pick up the Orb of Zot!");
        assert_eq!(reward, 0);

        let (won, reward) = score_transition(&holding, holding.clone(), "You have escaped!");
        assert!(won.won);
        assert!(won.is_finished());
        assert_eq!(reward, ESCAPE_REWARD);

        let (fled, reward) = score_transition(&playing, playing.clone(), "You have escaped!");
        assert!(fled.escaped_without_orb);
        assert!(!fled.won);
        assert_eq!(reward, -ESCAPE_REWARD);

        let (dead, reward) = score_transition(&playing, playing.clone(), "You die...");
        assert!(dead.died);
        assert_eq!(reward, 0);
    }
}
