//! Line-oriented debug console over the editing core.
//!
//! Requests and responses use GTP framing: an optional numeric id before the
//! command, `=` for success and `?` for failure, and a blank line after each
//! response. Vertices use GTP letters (skipping `I`) with rows counted from
//! the bottom of the board.
//!
//! ## Supported Commands
//!
//! - `name`, `version`, `protocol_version`, `list_commands`, `known_command <cmd>`, `quit`
//! - `boardsize <n>`, `clear_board`, `komi <value>`, `rules <name>` - start a fresh board
//! - `play [color] <vertex|pass>` - add a move below the current node
//! - `undo`, `redo`
//! - `back`, `forward`, `root`, `end`, `goto <id>`, `variations`, `node`
//! - `remove [id]` - remove a subtree (the current node by default)
//! - `comment <text>`
//! - `mark <shape> <vertex>...`, `unmark <vertex>...` - one undo step per command
//! - `showboard`, `captures`, `score`

use std::io::{self, BufRead, Write};

use tracing::debug;

use crate::board::{Color, Point};
use crate::edit::UndoableEdit;
use crate::error::Result;
use crate::history::EditHistory;
use crate::model::{GameConfig, GameModel};
use crate::rules::RuleSet;
use crate::tree::{Marker, NodeAction, NodeId};
use crate::validator::Move;

/// The list of known console commands.
const KNOWN_COMMANDS: &[&str] = &[
    "back",
    "boardsize",
    "captures",
    "clear_board",
    "comment",
    "end",
    "forward",
    "goto",
    "known_command",
    "komi",
    "list_commands",
    "mark",
    "name",
    "node",
    "play",
    "protocol_version",
    "quit",
    "redo",
    "remove",
    "root",
    "rules",
    "score",
    "showboard",
    "undo",
    "unmark",
    "variations",
    "version",
];

/// Console state: one game model and its edit history.
pub struct Console {
    config: GameConfig,
    history_capacity: usize,
    model: GameModel,
    history: EditHistory,
}

impl Console {
    pub fn new(config: GameConfig, history_capacity: usize) -> Result<Self> {
        Ok(Self {
            config,
            history_capacity,
            model: GameModel::new(config)?,
            history: EditHistory::with_capacity(history_capacity),
        })
    }

    pub fn model(&self) -> &GameModel {
        &self.model
    }

    pub fn history(&self) -> &EditHistory {
        &self.history
    }

    /// Run the command loop on stdin and stdout.
    pub fn run(&mut self) -> io::Result<()> {
        let stdin = io::stdin();
        self.run_with(stdin.lock(), io::stdout())
    }

    /// Run the command loop until `quit` or end of input.
    pub fn run_with(&mut self, input: impl BufRead, mut output: impl Write) -> io::Result<()> {
        for line in input.lines() {
            let line = line?;

            // Skip empty lines and comments
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (id, command_line) = Self::parse_id(line);
            let parts: Vec<&str> = command_line.split_whitespace().collect();
            let Some((command, args)) = parts.split_first() else {
                continue;
            };
            let command = command.to_lowercase();

            let (success, message) = self.execute(&command, args);
            let prefix = if success { '=' } else { '?' };
            let id_str = id.map(|i| i.to_string()).unwrap_or_default();

            writeln!(output, "{prefix}{id_str} {message}\n")?;
            output.flush()?;

            if command == "quit" {
                break;
            }
        }
        Ok(())
    }

    /// Parse an optional numeric command ID from the beginning of the line.
    fn parse_id(line: &str) -> (Option<u32>, &str) {
        let trimmed = line.trim();
        let end = trimmed
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(trimmed.len());
        if end > 0 {
            if let Ok(id) = trimmed[..end].parse::<u32>() {
                return (Some(id), trimmed[end..].trim());
            }
        }
        (None, trimmed)
    }

    /// Execute a command and return (success, response).
    pub fn execute(&mut self, command: &str, args: &[&str]) -> (bool, String) {
        debug!(command, ?args, "console command");
        match command {
            "name" => (true, env!("CARGO_PKG_NAME").to_string()),

            "version" => (true, env!("CARGO_PKG_VERSION").to_string()),

            "protocol_version" => (true, "2".to_string()),

            "list_commands" => (true, KNOWN_COMMANDS.join("\n")),

            "known_command" => match args.first() {
                Some(cmd) => {
                    let known = KNOWN_COMMANDS.contains(&cmd.to_lowercase().as_str());
                    (true, known.to_string())
                }
                None => (false, "missing argument".to_string()),
            },

            "quit" => (true, String::new()),

            "boardsize" => match args.first().map(|a| a.parse::<usize>()) {
                Some(Ok(size)) => self.reset(self.config.with_size(size)),
                Some(Err(_)) => (false, "invalid size".to_string()),
                None => (false, "missing argument".to_string()),
            },

            "clear_board" => self.reset(self.config),

            "komi" => match args.first().map(|a| a.parse::<f32>()) {
                Some(Ok(komi)) => self.reset(self.config.with_komi(komi)),
                Some(Err(_)) => (false, "invalid komi".to_string()),
                None => (false, "missing argument".to_string()),
            },

            "rules" => match args.first().map(|a| a.parse::<RuleSet>()) {
                Some(Ok(rules)) => self.reset(self.config.with_rules(rules)),
                Some(Err(e)) => (false, e.to_string()),
                None => (true, self.model.rules().rules.to_string()),
            },

            "play" => self.play(args),

            "undo" => match self.history.undo(&mut self.model) {
                Ok(true) => (true, String::new()),
                Ok(false) => (false, "nothing to undo".to_string()),
                Err(e) => (false, format!("cannot undo: {e}")),
            },

            "redo" => match self.history.redo(&mut self.model) {
                Ok(true) => (true, String::new()),
                Ok(false) => (false, "nothing to redo".to_string()),
                Err(e) => (false, format!("cannot redo: {e}")),
            },

            "back" => self.navigate(GameModel::step_back),
            "forward" => self.navigate(GameModel::step_forward),
            "root" => self.navigate(GameModel::go_to_root),
            "end" => self.navigate(GameModel::go_to_end),

            "goto" => match args.first().map(|a| a.parse::<usize>()) {
                Some(Ok(i)) => match self.model.set_current_node(NodeId::from_index(i)) {
                    Ok(()) => (true, self.model.current().to_string()),
                    Err(e) => (false, e.to_string()),
                },
                Some(Err(_)) => (false, "invalid node id".to_string()),
                None => (false, "missing argument".to_string()),
            },

            "variations" => {
                let lines: Vec<String> = self
                    .model
                    .variations()
                    .iter()
                    .map(|&id| format!("{id} {}", self.describe_action(id)))
                    .collect();
                (true, lines.join("\n"))
            }

            "node" => match self.model.current_node() {
                Ok(node) => (
                    true,
                    format!(
                        "id {} move {} to_play {} children {}\n{}",
                        node.id(),
                        node.move_number(),
                        node.to_play(),
                        node.children().len(),
                        node.comment()
                    ),
                ),
                Err(e) => (false, e.to_string()),
            },

            "remove" => {
                let target = match args.first().map(|a| a.parse::<usize>()) {
                    Some(Ok(i)) => NodeId::from_index(i),
                    Some(Err(_)) => return (false, "invalid node id".to_string()),
                    None => self.model.current(),
                };
                self.apply(UndoableEdit::remove(target))
            }

            "comment" => {
                let session = self.history.begin_session();
                let node = self.model.current();
                self.apply(UndoableEdit::comment(node, args.join(" "), session))
            }

            "mark" => {
                let Some((shape, vertices)) = args.split_first() else {
                    return (false, "missing arguments".to_string());
                };
                let Some(marker) = parse_marker(shape) else {
                    return (false, format!("unknown marker: {shape}"));
                };
                self.annotate(vertices, Some(marker))
            }

            "unmark" => self.annotate(args, None),

            "showboard" => match self.model.current_node() {
                Ok(node) => (true, format!("\n{}", node.position())),
                Err(e) => (false, e.to_string()),
            },

            "captures" => match self.model.current_node() {
                Ok(node) => {
                    let pos = node.position();
                    (
                        true,
                        format!(
                            "black {} white {}",
                            pos.captures(Color::Black),
                            pos.captures(Color::White)
                        ),
                    )
                }
                Err(e) => (false, e.to_string()),
            },

            "score" => match self.model.score() {
                Ok(score) => (true, score.to_string()),
                Err(e) => (false, e.to_string()),
            },

            _ => (false, format!("unknown command: {command}")),
        }
    }

    fn reset(&mut self, config: GameConfig) -> (bool, String) {
        match GameModel::new(config) {
            Ok(model) => {
                self.config = config;
                self.model = model;
                self.history = EditHistory::with_capacity(self.history_capacity);
                (true, String::new())
            }
            Err(e) => (false, e.to_string()),
        }
    }

    fn apply(&mut self, edit: UndoableEdit) -> (bool, String) {
        match self.history.apply(&mut self.model, edit) {
            Ok(()) => (true, String::new()),
            Err(e) => (false, e.to_string()),
        }
    }

    fn navigate(&mut self, step: fn(&mut GameModel) -> bool) -> (bool, String) {
        step(&mut self.model);
        (true, self.model.current().to_string())
    }

    fn play(&mut self, args: &[&str]) -> (bool, String) {
        let (color, vertex) = match args {
            [vertex] => (self.model.to_play(), *vertex),
            [color, vertex] => match parse_color(color) {
                Some(c) => (c, *vertex),
                None => return (false, format!("invalid color: {color}")),
            },
            [] => return (false, "missing arguments".to_string()),
            _ => return (false, "too many arguments".to_string()),
        };

        let mv = if vertex.eq_ignore_ascii_case("pass") {
            Move::Pass(color)
        } else {
            match parse_vertex(vertex, self.model.width(), self.model.height()) {
                Some(point) => Move::Play { point, color },
                None => return (false, format!("invalid vertex: {vertex}")),
            }
        };
        self.apply(UndoableEdit::play_move(mv))
    }

    /// Set or clear a marker on each vertex, all in one session.
    fn annotate(&mut self, vertices: &[&str], marker: Option<Marker>) -> (bool, String) {
        if vertices.is_empty() {
            return (false, "missing vertex".to_string());
        }
        let (width, height) = (self.model.width(), self.model.height());
        let mut points = Vec::with_capacity(vertices.len());
        for vertex in vertices {
            match parse_vertex(vertex, width, height) {
                Some(point) => points.push(point),
                None => return (false, format!("invalid vertex: {vertex}")),
            }
        }

        let session = self.history.begin_session();
        let node = self.model.current();
        for point in points {
            let edit = match &marker {
                Some(m) => UndoableEdit::add_marker(node, point, m.clone(), session),
                None => UndoableEdit::remove_marker(node, point, session),
            };
            if let (false, message) = self.apply(edit) {
                return (false, message);
            }
        }
        (true, String::new())
    }

    fn describe_action(&self, id: NodeId) -> String {
        let height = self.model.height();
        match self.model.node(id).ok().and_then(|n| n.action()) {
            Some(NodeAction::Move(Move::Play { point, color })) => {
                format!("{color} {}", vertex_name(*point, height))
            }
            Some(NodeAction::Move(Move::Pass(color))) => format!("{color} pass"),
            Some(NodeAction::Setup(stones)) => format!("setup {}", stones.len()),
            None => String::new(),
        }
    }
}

fn parse_color(s: &str) -> Option<Color> {
    match s.to_lowercase().as_str() {
        "b" | "black" => Some(Color::Black),
        "w" | "white" => Some(Color::White),
        _ => None,
    }
}

fn parse_marker(s: &str) -> Option<Marker> {
    if s.get(..6).is_some_and(|p| p.eq_ignore_ascii_case("label:")) {
        return Some(Marker::Label(s[6..].to_string()));
    }
    match s.to_lowercase().as_str() {
        "triangle" | "tr" => Some(Marker::Triangle),
        "square" | "sq" => Some(Marker::Square),
        "circle" | "cr" => Some(Marker::Circle),
        "cross" | "ma" | "x" => Some(Marker::Cross),
        _ => None,
    }
}

/// Parse a vertex such as `D4` into a point on a `width` x `height` board.
///
/// Columns use letters A-Z without `I`; rows count up from the bottom edge.
pub fn parse_vertex(s: &str, width: usize, height: usize) -> Option<Point> {
    let mut chars = s.chars();
    let col_char = chars.next()?.to_ascii_uppercase();
    if !col_char.is_ascii_uppercase() || col_char == 'I' {
        return None;
    }
    let mut col = (col_char as u8 - b'A') as usize;
    // Skip 'I' column (Go convention to avoid confusion with 'J')
    if col_char > 'I' {
        col -= 1;
    }
    let row: usize = chars.as_str().parse().ok()?;
    if col >= width || row == 0 || row > height {
        return None;
    }
    Some((col, height - row))
}

/// Convert a point to a vertex string (e.g. `D4`).
pub fn vertex_name((x, y): Point, height: usize) -> String {
    let mut c = (b'A' + x as u8) as char;
    if c >= 'I' {
        c = (c as u8 + 1) as char;
    }
    format!("{c}{}", height - y)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn console() -> Console {
        Console::new(GameConfig::new().with_size(9), 50).unwrap()
    }

    #[test]
    fn test_parse_id_with_id() {
        let (id, cmd) = Console::parse_id("123 name");
        assert_eq!(id, Some(123));
        assert_eq!(cmd, "name");
    }

    #[test]
    fn test_parse_id_without_id() {
        let (id, cmd) = Console::parse_id("name");
        assert_eq!(id, None);
        assert_eq!(cmd, "name");
    }

    #[test]
    fn test_vertex_roundtrip() {
        for x in 0..19 {
            for y in 0..19 {
                let name = vertex_name((x, y), 19);
                assert_eq!(parse_vertex(&name, 19, 19), Some((x, y)), "{name}");
            }
        }
        assert_eq!(parse_vertex("A1", 9, 9), Some((0, 8)));
        assert_eq!(parse_vertex("J9", 9, 9), Some((8, 0)));
        assert_eq!(parse_vertex("I5", 9, 9), None);
        assert_eq!(parse_vertex("K1", 9, 9), None);
        assert_eq!(parse_vertex("A10", 9, 9), None);
    }

    #[test]
    fn test_known_command() {
        let mut c = console();
        assert_eq!(c.execute("known_command", &["undo"]), (true, "true".to_string()));
        assert_eq!(
            c.execute("known_command", &["genmove"]),
            (true, "false".to_string())
        );
    }

    #[test]
    fn test_play_undo_redo() {
        let mut c = console();
        assert!(c.execute("play", &["D4"]).0);
        assert!(c.execute("play", &["white", "E5"]).0);
        assert_eq!(c.model().tree().node_count(), 3);
        assert!(c.execute("undo", &[]).0);
        assert_eq!(c.model().tree().node_count(), 2);
        assert!(c.execute("redo", &[]).0);
        assert_eq!(c.model().tree().node_count(), 3);
        assert!(!c.execute("redo", &[]).0);
    }

    #[test]
    fn test_illegal_play_reports_reason() {
        let mut c = console();
        c.execute("play", &["D4"]);
        let (ok, msg) = c.execute("play", &["D4"]);
        assert!(!ok);
        assert!(msg.contains("not empty"), "{msg}");
        assert_eq!(c.history().len(), 1);
    }

    #[test]
    fn test_mark_is_one_undo_step() {
        let mut c = console();
        assert!(c.execute("mark", &["triangle", "A1", "B1", "C1"]).0);
        assert_eq!(c.history().len(), 1);
        assert_eq!(c.model().current_node().unwrap().markers().len(), 3);
        c.execute("undo", &[]);
        assert!(c.model().current_node().unwrap().markers().is_empty());
    }

    #[test]
    fn test_mark_with_bad_vertex_changes_nothing() {
        let mut c = console();
        let (ok, msg) = c.execute("mark", &["triangle", "A1", "Z99"]);
        assert!(!ok);
        assert_eq!(msg, "invalid vertex: Z99");
        assert!(c.model().current_node().unwrap().markers().is_empty());
        assert!(c.history().is_empty());

        c.execute("mark", &["circle", "A1"]);
        assert!(!c.execute("unmark", &["A1", "I3"]).0);
        assert_eq!(c.model().current_node().unwrap().markers().len(), 1);
        assert_eq!(c.history().len(), 1);
    }

    #[test]
    fn test_label_keeps_case() {
        assert_eq!(parse_marker("LABEL:Ab"), Some(Marker::Label("Ab".to_string())));
    }

    #[test]
    fn test_boardsize_resets() {
        let mut c = console();
        c.execute("play", &["D4"]);
        assert!(c.execute("boardsize", &["13"]).0);
        assert_eq!(c.model().width(), 13);
        assert_eq!(c.model().tree().node_count(), 1);
        assert!(!c.execute("boardsize", &["40"]).0);
    }

    #[test]
    fn test_run_with_framing() {
        let mut c = console();
        let input = b"1 name\nplay D4\n# comment\n2 quit\nname\n";
        let mut out = Vec::new();
        c.run_with(&input[..], &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "=1 goban-record\n\n= \n\n=2 \n\n");
    }
}
