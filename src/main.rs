//! goban-record: an editable Go game-record tree with undo/redo.
//!
//! ## Usage
//!
//! - `goban-record` - Run a short demo game
//! - `goban-record console` - Start the line-oriented debug console
//! - `goban-record demo --moves 80 --seed 7` - Play a seeded random game

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use goban_record::board::Color;
use goban_record::console::{Console, vertex_name};
use goban_record::constants::{DEFAULT_BOARD_SIZE, DEFAULT_HISTORY_CAPACITY};
use goban_record::edit::UndoableEdit;
use goban_record::error::Error;
use goban_record::history::EditHistory;
use goban_record::model::{GameConfig, GameModel};
use goban_record::rules::RuleSet;

/// Go game-record editor with undo/redo history
#[derive(Parser)]
#[command(name = "goban-record")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Board size (square)
    #[arg(long, global = true, default_value_t = DEFAULT_BOARD_SIZE)]
    size: usize,

    /// Board width, overrides --size
    #[arg(long, global = true)]
    width: Option<usize>,

    /// Board height, overrides --size
    #[arg(long, global = true)]
    height: Option<usize>,

    /// Rule set: chinese, japanese, korean, aga or new-zealand
    #[arg(long, global = true, default_value = "chinese")]
    rules: RuleSet,

    /// Komi, overrides the rule set's default
    #[arg(long, global = true)]
    komi: Option<f32>,

    /// Maximum number of undo entries
    #[arg(long, global = true, default_value_t = DEFAULT_HISTORY_CAPACITY)]
    history: usize,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the debug console on stdin/stdout
    Console,
    /// Play a seeded random game through the edit history
    Demo {
        /// Number of moves to attempt
        #[arg(long, default_value_t = 60)]
        moves: usize,

        /// Random seed
        #[arg(long, default_value_t = 1)]
        seed: u64,
    },
}

impl Cli {
    fn game_config(&self) -> GameConfig {
        let mut rules = self.rules;
        if let Some(komi) = self.komi {
            rules = rules.with_komi(komi);
        }
        GameConfig::new()
            .with_dimensions(
                self.width.unwrap_or(self.size),
                self.height.unwrap_or(self.size),
            )
            .with_rules(rules)
    }
}

fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let config = cli.game_config();
    info!(
        width = config.width,
        height = config.height,
        rules = %config.rules.rules,
        komi = config.rules.komi,
        "starting"
    );

    match cli.command {
        Some(Commands::Console) => {
            let mut console =
                Console::new(config, cli.history).context("invalid game configuration")?;
            console.run().context("console I/O failed")?;
        }
        Some(Commands::Demo { moves, seed }) => run_demo(config, cli.history, moves, seed)?,
        None => run_demo(config, cli.history, 30, 1)?,
    }
    Ok(())
}

fn run_demo(config: GameConfig, capacity: usize, moves: usize, seed: u64) -> Result<()> {
    let mut model = GameModel::new(config).context("invalid game configuration")?;
    let mut history = EditHistory::with_capacity(capacity);
    let mut rng = fastrand::Rng::with_seed(seed);

    println!(
        "goban-record demo ({}x{}, {} rules, komi {})\n",
        model.width(),
        model.height(),
        config.rules.rules,
        config.rules.komi
    );

    for _ in 0..moves {
        let position = model.current_node()?.position();
        let mut candidates: Vec<_> = position
            .points()
            .filter(|&pt| position.get(pt).is_none())
            .collect();
        rng.shuffle(&mut candidates);

        let mut played = false;
        for (x, y) in candidates {
            match history.apply(&mut model, UndoableEdit::play(x, y)) {
                Ok(()) => {
                    played = true;
                    break;
                }
                Err(Error::IllegalMove(reason)) => {
                    debug!(x, y, %reason, "skipping illegal candidate");
                }
                Err(e) => return Err(e.into()),
            }
        }
        if !played {
            history.apply(&mut model, UndoableEdit::pass())?;
        }
    }

    let node = model.current_node()?;
    println!("After {} moves:", node.move_number());
    print_position(&model)?;

    let mut undone = 0;
    while undone < 5 && history.undo(&mut model)? {
        undone += 1;
    }
    println!("Undid {undone} moves, now at move {}", model.current_node()?.move_number());

    let mut redone = 0;
    while redone < 3 && history.redo(&mut model)? {
        redone += 1;
    }
    println!("Redid {redone} moves, now at move {}", model.current_node()?.move_number());
    if let Some(mv) = model.current_node()?.last_move() {
        let spot = match mv.point() {
            Some(pt) => vertex_name(pt, model.height()),
            None => "pass".to_string(),
        };
        println!("Last move: {} {spot}", mv.color());
    }
    print_position(&model)?;

    println!(
        "Tree nodes: {}, history entries: {}",
        model.tree().node_count(),
        history.len()
    );
    println!("Score: {}", model.score()?);
    Ok(())
}

fn print_position(model: &GameModel) -> Result<()> {
    let position = model.current_node()?.position();
    println!("{position}");
    println!(
        "Captures: black {} white {}\n",
        position.captures(Color::Black),
        position.captures(Color::White)
    );
    Ok(())
}
