//! `quill`: headless batch front end for the editing engine.
//!
//! Opens one file, optionally searches and substitutes, optionally writes the
//! result back, and can print what the first window would show. Diagnostics
//! go to `quill.log` (filtered by `RUST_LOG`); results go to stdout.

use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::sync::Once;

use anyhow::{Context, Result, bail};
use clap::Parser;
use core_config::{Config, ConfigContext, load_from};
use core_model::{EditorModel, Rect, ScrollSettings};
use core_state::{BufferId, EditorState, SearchDirection, SubstituteFlags};
use core_text::Position;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;

const STATUS_ROWS: u16 = 1;
const LOG_FILE: &str = "quill.log";

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "quill", version, about = "Headless quill batch editor")]
struct Args {
    /// File to open. A missing file starts empty and is created on `--write`.
    pub path: Option<PathBuf>,
    /// Configuration file (overrides discovery of `quill.toml`).
    #[arg(long = "config")]
    pub config: Option<PathBuf>,
    /// Directory for `quill.log`.
    #[arg(long = "log-dir", default_value = ".")]
    pub log_dir: PathBuf,
    /// List every match of PATTERN as `line:col: text` (1-based).
    #[arg(long = "find", value_name = "PATTERN")]
    pub find: Option<String>,
    /// Substitute PATTERN (regular expression) with REPLACEMENT.
    #[arg(long = "replace", num_args = 2, value_names = ["PATTERN", "REPLACEMENT"])]
    pub replace: Option<Vec<String>>,
    /// Substitute flags, any of `g` and `i`.
    #[arg(long = "flags", default_value = "")]
    pub flags: String,
    /// Shorthand for the `g` flag.
    #[arg(long = "global")]
    pub global: bool,
    /// Shorthand for the `i` flag; also makes `--find` case-insensitive.
    #[arg(long = "ignore-case")]
    pub ignore_case: bool,
    /// Restrict substitution to lines START..=END (1-based).
    #[arg(long = "range", value_name = "START,END", value_parser = parse_range)]
    pub range: Option<RangeInclusive<usize>>,
    /// Write the buffer back (to `--output` when given).
    #[arg(long = "write")]
    pub write: bool,
    #[arg(long = "output", value_name = "PATH")]
    pub output: Option<PathBuf>,
    /// Print the rows visible in the window after moving to LINE (1-based).
    #[arg(long = "view", value_name = "LINE")]
    pub view: Option<usize>,
    /// Window size used by `--view`, as COLSxROWS.
    #[arg(long = "size", default_value = "80x24", value_parser = parse_size)]
    pub size: (u16, u16),
}

fn parse_range(s: &str) -> std::result::Result<RangeInclusive<usize>, String> {
    let (a, b) = s
        .split_once(',')
        .ok_or_else(|| format!("expected START,END, got `{s}`"))?;
    let start: usize = a.trim().parse().map_err(|e| format!("bad start: {e}"))?;
    let end: usize = b.trim().parse().map_err(|e| format!("bad end: {e}"))?;
    if start == 0 || end < start {
        return Err(format!("invalid range `{s}`"));
    }
    Ok(start - 1..=end - 1)
}

fn parse_size(s: &str) -> std::result::Result<(u16, u16), String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected COLSxROWS, got `{s}`"))?;
    let w: u16 = w.trim().parse().map_err(|e| format!("bad width: {e}"))?;
    let h: u16 = h.trim().parse().map_err(|e| format!("bad height: {e}"))?;
    Ok((w, h))
}

fn configure_logging(log_dir: &Path) -> Option<WorkerGuard> {
    let log_path = log_dir.join(LOG_FILE);
    if log_path.exists() {
        let _ = std::fs::remove_file(&log_path);
    }
    let file_appender = tracing_appender::rolling::never(log_dir, LOG_FILE);
    let (nb_writer, guard) = tracing_appender::non_blocking(file_appender);
    match tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_ansi(false)
        .with_writer(nb_writer)
        .try_init()
    {
        Ok(_) => Some(guard),
        // A global subscriber is already installed; dropping the guard stops the writer.
        Err(_) => None,
    }
}

fn install_panic_hook() {
    static HOOK: Once = Once::new();
    HOOK.call_once(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            tracing::error!(target: "runtime.panic", ?info, "panic");
            default_panic(info);
        }));
    });
}

struct Session {
    model: EditorModel,
    buffer: BufferId,
}

impl Session {
    fn open(args: &Args, config: &mut Config) -> Result<Self> {
        let (cols, rows) = args.size;
        config.apply_context(ConfigContext::new(cols, rows, STATUS_ROWS));
        let mut options = config.state_options();
        if args.ignore_case {
            options.search.ignore_case = true;
        }
        let mut state = EditorState::new(options);
        let buffer = match &args.path {
            Some(path) => state
                .open(path)
                .with_context(|| format!("opening {}", path.display()))?,
            None => state.new_buffer(),
        };
        let area = Rect::new(0, 0, cols, rows.saturating_sub(STATUS_ROWS));
        let model = EditorModel::new(state, buffer, area, ScrollSettings::from_config(config))?;
        Ok(Self { model, buffer })
    }

    fn find(&mut self, pattern: &str) -> Result<usize> {
        let state = self.model.state_mut();
        state
            .search(self.buffer, pattern, SearchDirection::Forward)
            .with_context(|| format!("searching for `{pattern}`"))?;
        let matches = state.search.matches();
        for m in matches {
            println!("{}:{}: {}", m.line + 1, m.start + 1, m.text);
        }
        Ok(matches.len())
    }

    fn substitute(
        &mut self,
        pattern: &str,
        replacement: &str,
        flags: SubstituteFlags,
        range: Option<RangeInclusive<usize>>,
    ) -> Result<usize> {
        let report = self
            .model
            .state_mut()
            .replace(self.buffer, pattern, replacement, flags, range)
            .with_context(|| format!("substituting `{pattern}`"))?;
        if report.confirm_requested {
            warn!(target: "runtime", "confirm_flag_ignored_in_batch_mode");
        }
        println!(
            "{} substitution(s) on {} line(s)",
            report.substitutions, report.lines
        );
        Ok(report.substitutions)
    }

    fn write(&mut self, output: Option<&Path>) -> Result<()> {
        let report = self
            .model
            .state_mut()
            .save(self.buffer, output)
            .context("writing buffer")?;
        println!(
            "\"{}\" {}L, {}B written",
            report.path.display(),
            report.lines,
            report.bytes
        );
        Ok(())
    }

    fn view(&mut self, line: usize) -> Result<()> {
        let buf = self.model.active_buffer_mut()?;
        buf.goto_line(line);
        let cursor: Position = buf.cursor();
        self.model.auto_scroll()?;
        let window = self.model.active_window().id;
        let range = self.model.visible_range(window)?;
        for (row, text) in range.zip(self.model.visible_lines(window)?) {
            let marker = if row == cursor.line { '>' } else { ' ' };
            println!("{marker}{:>5} {text}", row + 1);
        }
        Ok(())
    }
}

fn run(args: Args) -> Result<()> {
    let mut config = load_from(args.config.clone()).context("loading configuration")?;
    let mut session = Session::open(&args, &mut config)?;
    info!(
        target: "runtime.startup",
        path = args.path.as_ref().map(|p| p.display().to_string()).as_deref(),
        config = config.source.as_ref().map(|p| p.display().to_string()).as_deref(),
        effective_margin = config.effective_vertical_margin,
        "bootstrap_complete"
    );

    if let Some(pattern) = &args.find {
        let n = session.find(pattern)?;
        info!(target: "runtime", matches = n, "find_complete");
    }

    if let Some(parts) = &args.replace {
        let [pattern, replacement] = parts.as_slice() else {
            bail!("--replace takes PATTERN and REPLACEMENT");
        };
        let mut flags = SubstituteFlags::parse(&args.flags).context("parsing --flags")?;
        if args.global {
            flags |= SubstituteFlags::GLOBAL;
        }
        if args.ignore_case {
            flags |= SubstituteFlags::IGNORE_CASE;
        }
        session.substitute(pattern, replacement, flags, args.range.clone())?;
    }

    if args.write {
        session.write(args.output.as_deref())?;
    }

    if let Some(line) = args.view {
        session.view(line)?;
    }

    info!(target: "runtime", "shutdown");
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    let _log_guard = configure_logging(&args.log_dir);
    install_panic_hook();
    info!(target: "runtime", "startup");
    run(args)
}
