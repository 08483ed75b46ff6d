//! crawlterm - drive the console roguelike through its terminal output
//!
//! Runs a number of episodes against the game binary, feeding it a fixed
//! cycle of keys and printing a summary line per episode. Everything the
//! engine sees and decides is logged to `~/.crawlterm/crawlterm.log`.
//!
//! # Quick Start
//!
//! ```text
//! crawlterm                      # One episode, explore and rest
//! crawlterm -e 10 -k "o5o5."     # Ten episodes with a custom key cycle
//! crawlterm -b /opt/crawl/bin/crawl -d /opt/crawl/bin
//! ```

use std::env;
use std::path::PathBuf;

use anyhow::Context;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crawlterm::config::Config;
use crawlterm::core::process::CrawlLauncher;
use crawlterm::game::{Episode, GameState, Phase};
use crawlterm::keys;

/// Command line options
struct Options {
    /// Config file overriding `~/.crawlterm/config.toml`
    config_path: Option<PathBuf>,
    binary: Option<PathBuf>,
    working_dir: Option<PathBuf>,
    episodes: u32,
    /// Step cap per episode
    max_steps: u64,
    /// Actions, one key each, sent in a loop
    keys: String,
    /// Print the final screen of each episode
    dump: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            config_path: None,
            binary: None,
            working_dir: None,
            episodes: 1,
            max_steps: 5000,
            keys: "o5".to_string(),
            dump: false,
        }
    }
}

/// Version string from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_version() {
    eprintln!("crawlterm {}", VERSION);
}

fn print_help() {
    eprintln!("crawlterm {} - drive the console roguelike through its terminal", VERSION);
    eprintln!();
    eprintln!("Usage: crawlterm [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -c, --config <PATH>   Config file (default: ~/.crawlterm/config.toml)");
    eprintln!("  -b, --binary <PATH>   Game executable");
    eprintln!("  -d, --dir <PATH>      Directory to run the game in");
    eprintln!("  -e, --episodes <N>    Episodes to play (default: 1)");
    eprintln!("  -s, --steps <N>       Step cap per episode (default: 5000)");
    eprintln!("  -k, --keys <KEYS>     Key cycle, one action per character (default: o5)");
    eprintln!("      --dump            Print the final screen of each episode");
    eprintln!("  -v, --version         Show version");
    eprintln!("  -h, --help            Show this help");
    eprintln!();
    eprintln!("Log file: ~/.crawlterm/crawlterm.log (RUST_LOG overrides the level)");
}

fn parse_args() -> Result<Options, String> {
    let args: Vec<String> = env::args().collect();
    let mut options = Options::default();
    let mut i = 1;

    fn value<'a>(args: &'a [String], i: usize, name: &str) -> Result<&'a str, String> {
        args.get(i)
            .map(String::as_str)
            .ok_or_else(|| format!("Missing {} argument", name))
    }

    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-v" | "--version" => {
                print_version();
                std::process::exit(0);
            }
            "-c" | "--config" => {
                i += 1;
                options.config_path = Some(PathBuf::from(value(&args, i, "config")?));
            }
            "-b" | "--binary" => {
                i += 1;
                options.binary = Some(PathBuf::from(value(&args, i, "binary")?));
            }
            "-d" | "--dir" => {
                i += 1;
                options.working_dir = Some(PathBuf::from(value(&args, i, "dir")?));
            }
            "-e" | "--episodes" => {
                i += 1;
                let raw = value(&args, i, "episodes")?;
                options.episodes = raw
                    .parse()
                    .map_err(|_| format!("Invalid episode count: {}", raw))?;
            }
            "-s" | "--steps" => {
                i += 1;
                let raw = value(&args, i, "steps")?;
                options.max_steps = raw
                    .parse()
                    .map_err(|_| format!("Invalid step count: {}", raw))?;
            }
            "-k" | "--keys" => {
                i += 1;
                let raw = value(&args, i, "keys")?;
                if raw.is_empty() {
                    return Err("Key cycle must not be empty".to_string());
                }
                options.keys = raw.to_string();
            }
            "--dump" => {
                options.dump = true;
            }
            arg => {
                return Err(format!("Unknown argument: {}. Use -h for help.", arg));
            }
        }
        i += 1;
    }

    Ok(options)
}

fn init_logging(config: &Config) {
    let log_path = config.log.path();

    // Create log directory if needed
    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    // Open log file (append mode)
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .ok();

    if let Some(file) = log_file {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&config.log.level));
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}

fn outcome(state: &GameState, phase: Phase) -> &'static str {
    if phase == Phase::Error {
        "error"
    } else if state.won {
        "won"
    } else if state.escaped_without_orb {
        "escaped"
    } else if state.died {
        "died"
    } else {
        "abandoned"
    }
}

fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let options = match parse_args() {
        Ok(o) => o,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            std::process::exit(1);
        }
    };

    let mut config = match &options.config_path {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => Config::load(),
    };
    // Command line overrides the config file
    if let Some(binary) = options.binary.clone() {
        config.game.binary = binary;
    }
    if let Some(dir) = options.working_dir.clone() {
        config.game.working_dir = Some(dir);
    }

    init_logging(&config);
    info!("crawlterm {} starting...", VERSION);

    let launcher = CrawlLauncher::new(config.game.clone());
    let mut episode = Episode::new(launcher, &config);
    let actions: Vec<u8> = options.keys.bytes().collect();

    for _ in 0..options.episodes {
        let (mut state, mut done) = episode.reset();
        if episode.has_error() {
            error!("Episode {} failed to start", episode.stats().episode);
        }

        let mut step = 0u64;
        while !done && step < options.max_steps {
            let action = [actions[(step as usize) % actions.len()]];
            let result = episode.step(&action);
            state = result.state;
            done = result.done;
            step += 1;
        }

        let stats = episode.stats();
        println!(
            "Episode {:>3}: {:<9} steps {:>6}  score {:>8}  XL {:>2}  {:<12} time {:>8.1}  max redraw {:.3}s",
            stats.episode,
            outcome(&state, episode.phase()),
            stats.steps,
            stats.score,
            state.experience_level,
            state.place,
            state.game_time,
            stats.max_read_time.as_secs_f64(),
        );
        if options.dump {
            if let Some(screen) = episode.screen() {
                println!("{}", screen);
            }
        }
        info!(
            "Episode {} over after {} steps ({} frames), action cycle {}",
            stats.episode,
            stats.steps,
            stats.frames,
            keys::printable(&actions)
        );
    }

    episode.close();
    info!("crawlterm exiting");
    Ok(())
}
