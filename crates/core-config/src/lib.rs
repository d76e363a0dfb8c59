//! Configuration loading and parsing.
//!
//! Reads `quill.toml` (working directory first, then the platform config
//! directory, or an explicit path supplied by the binary). Every section and
//! key is optional; unknown keys are ignored so files written for newer
//! versions still load. A file that fails to parse is reported with a `warn`
//! and replaced by defaults rather than aborting startup.
//!
//! The vertical scroll margin is stored raw and clamped against the text
//! height at application time (`Config::apply_context`), so a resize can
//! re-clamp without re-reading the file.

use anyhow::{Context, Result};
use core_state::{EditOptions, FileOptions, SearchOptions, StateOptions, UndoOptions};
use core_text::TextEncoding;
use serde::Deserialize;
use std::{fs, path::PathBuf};
use tracing::{debug, info, warn};

pub const CONFIG_FILE_NAME: &str = "quill.toml";

/// Screen geometry the effective settings depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigContext {
    pub viewport_columns: u16,
    pub viewport_rows: u16,
    /// Rows reserved below the text area (status / command line).
    pub status_rows: u16,
}

impl ConfigContext {
    pub fn new(viewport_columns: u16, viewport_rows: u16, status_rows: u16) -> Self {
        Self {
            viewport_columns,
            viewport_rows,
            status_rows,
        }
    }

    pub fn text_rows(&self) -> u16 {
        self.viewport_rows.saturating_sub(self.status_rows)
    }

    pub fn from_viewport_height(viewport_rows: u16) -> Self {
        Self::new(0, viewport_rows, 0)
    }
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct MarginConfig {
    #[serde(default)]
    pub vertical: u16,
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct ScrollConfig {
    #[serde(default)]
    pub margin: MarginConfig,
    /// Columns kept visible left/right of the cursor when scrolling sideways.
    #[serde(default)]
    pub horizontal_margin: u16,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct UndoConfig {
    #[serde(default = "UndoConfig::default_levels")]
    pub levels: usize,
    #[serde(default)]
    pub persist: bool,
    #[serde(default = "UndoConfig::default_persist_levels")]
    pub persist_levels: usize,
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl Default for UndoConfig {
    fn default() -> Self {
        Self {
            levels: Self::default_levels(),
            persist: false,
            persist_levels: Self::default_persist_levels(),
            dir: None,
        }
    }
}

impl UndoConfig {
    const fn default_levels() -> usize {
        core_state::UNDO_LEVELS_DEFAULT
    }
    const fn default_persist_levels() -> usize {
        core_state::PERSIST_LEVELS_DEFAULT
    }

    /// Explicit `dir`, else `<data_local_dir>/quill/undo`.
    pub fn resolved_dir(&self) -> Option<PathBuf> {
        self.dir
            .clone()
            .or_else(|| dirs::data_local_dir().map(|d| d.join("quill").join("undo")))
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct EditConfig {
    /// Indent unit; when absent it is derived from `expand_tab`/`tab_width`.
    #[serde(default)]
    pub indent: Option<String>,
    #[serde(default = "EditConfig::default_true")]
    pub auto_indent: bool,
    #[serde(default = "EditConfig::default_true")]
    pub expand_tab: bool,
    #[serde(default = "EditConfig::default_tab_width")]
    pub tab_width: usize,
}

impl Default for EditConfig {
    fn default() -> Self {
        Self {
            indent: None,
            auto_indent: true,
            expand_tab: true,
            tab_width: Self::default_tab_width(),
        }
    }
}

impl EditConfig {
    const fn default_true() -> bool {
        true
    }
    const fn default_tab_width() -> usize {
        4
    }

    pub fn indent_unit(&self) -> String {
        match &self.indent {
            Some(unit) if !unit.is_empty() => unit.clone(),
            _ if self.expand_tab => " ".repeat(self.tab_width.max(1)),
            _ => "\t".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct SearchConfig {
    #[serde(default = "SearchConfig::default_ignore_case")]
    pub ignore_case: bool,
    #[serde(default)]
    pub regex: bool,
    #[serde(default)]
    pub whole_word: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            ignore_case: Self::default_ignore_case(),
            regex: false,
            whole_word: false,
        }
    }
}

impl SearchConfig {
    const fn default_ignore_case() -> bool {
        true
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct FileConfig {
    #[serde(default = "FileConfig::default_backup")]
    pub backup: bool,
    #[serde(default = "FileConfig::default_encodings")]
    pub encodings: Vec<String>,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            backup: Self::default_backup(),
            encodings: Self::default_encodings(),
        }
    }
}

impl FileConfig {
    const fn default_backup() -> bool {
        true
    }
    fn default_encodings() -> Vec<String> {
        vec!["utf-8".to_string(), "latin-1".to_string()]
    }

    /// Known encodings in configured order; unknown labels are skipped with a
    /// warning, and an empty result falls back to the defaults.
    pub fn resolved_encodings(&self) -> Vec<TextEncoding> {
        let mut out = Vec::new();
        for label in &self.encodings {
            match TextEncoding::from_label(label) {
                Some(enc) if !out.contains(&enc) => out.push(enc),
                Some(_) => {}
                None => warn!(target: "config", label = %label, "unknown_encoding_ignored"),
            }
        }
        if out.is_empty() {
            out = FileOptions::default().encodings;
        }
        out
    }
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    #[serde(default)]
    pub scroll: ScrollConfig,
    #[serde(default)]
    pub undo: UndoConfig,
    #[serde(default)]
    pub edit: EditConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub file: FileConfig,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub raw: Option<String>,
    pub source: Option<PathBuf>,
    pub file: ConfigFile,
    pub effective_vertical_margin: u16,
}

/// Best-effort config path: `./quill.toml`, then `<config_dir>/quill/quill.toml`.
pub fn discover() -> PathBuf {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join("quill").join(CONFIG_FILE_NAME);
    }
    local
}

/// Parse configuration text. Errors carry the TOML diagnostic.
pub fn parse(content: &str) -> Result<ConfigFile> {
    toml::from_str::<ConfigFile>(content).context("invalid configuration")
}

pub fn load_from(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(discover);
    let content = match fs::read_to_string(&path) {
        Ok(c) => c,
        Err(e) => {
            debug!(target: "config", path = %path.display(), error = %e, "config_not_loaded");
            return Ok(Config::default());
        }
    };
    match parse(&content) {
        Ok(file) => {
            info!(target: "config", path = %path.display(), "config_loaded");
            Ok(Config {
                raw: Some(content),
                source: Some(path),
                file,
                effective_vertical_margin: 0,
            })
        }
        Err(e) => {
            warn!(target: "config", path = %path.display(), error = %format!("{e:#}"), "config_parse_failed_using_defaults");
            Ok(Config::default())
        }
    }
}

impl Config {
    /// Clamp the vertical margin to `(text_rows - 2) / 2`. Returns the
    /// effective value.
    pub fn apply_context(&mut self, ctx: ConfigContext) -> u16 {
        let raw = self.file.scroll.margin.vertical;
        let text_rows = ctx.text_rows();
        let (clamped, max) = if text_rows <= 3 {
            (0, 0)
        } else {
            let max = (text_rows.saturating_sub(2)) / 2;
            (raw.min(max), max)
        };

        if clamped != raw {
            info!(
                target: "config",
                raw,
                clamped,
                max,
                text_rows,
                viewport_rows = ctx.viewport_rows,
                status_rows = ctx.status_rows,
                "scroll_margin_vertical_clamped"
            );
        }
        self.effective_vertical_margin = clamped;
        clamped
    }

    pub fn apply_viewport_height(&mut self, viewport_height: u16) -> u16 {
        self.apply_context(ConfigContext::from_viewport_height(viewport_height))
    }

    /// Re-clamp after a geometry change; `Some(new)` when the value moved.
    pub fn recompute_with_context(&mut self, ctx: ConfigContext) -> Option<u16> {
        let prev = self.effective_vertical_margin;
        let current = self.apply_context(ctx);
        if current != prev { Some(current) } else { None }
    }

    pub fn horizontal_margin(&self) -> u16 {
        self.file.scroll.horizontal_margin
    }

    pub fn tab_width(&self) -> usize {
        self.file.edit.tab_width.max(1)
    }

    /// Options consumed by `core_state::EditorState`.
    pub fn state_options(&self) -> StateOptions {
        let f = &self.file;
        StateOptions {
            undo: UndoOptions {
                levels: f.undo.levels.max(1),
                persist: f.undo.persist,
                persist_levels: f.undo.persist_levels,
                dir: f.undo.resolved_dir(),
            },
            edit: EditOptions {
                indent: f.edit.indent_unit(),
                auto_indent: f.edit.auto_indent,
            },
            file: FileOptions {
                encodings: f.file.resolved_encodings(),
                backup: f.file.backup,
            },
            search: SearchOptions {
                ignore_case: f.search.ignore_case,
                regex: f.search.regex,
                whole_word: f.search.whole_word,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex, MutexGuard};
    use tracing::Level;
    use tracing::subscriber::with_default;
    use tracing_subscriber::fmt::MakeWriter;

    fn ctx_with_text_rows(rows: u16) -> ConfigContext {
        ConfigContext::new(80, rows, 0)
    }

    fn write_config(text: &str) -> tempfile::NamedTempFile {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), text).unwrap();
        tmp
    }

    #[derive(Clone)]
    struct BufferWriter {
        inner: Arc<Mutex<Vec<u8>>>,
    }

    impl BufferWriter {
        fn new() -> (Self, Arc<Mutex<Vec<u8>>>) {
            let buf = Arc::new(Mutex::new(Vec::new()));
            (Self { inner: buf.clone() }, buf)
        }
    }

    struct LockedWriter<'a> {
        guard: MutexGuard<'a, Vec<u8>>,
    }

    impl<'a> Write for LockedWriter<'a> {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.guard.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for BufferWriter {
        type Writer = LockedWriter<'a>;

        fn make_writer(&'a self) -> Self::Writer {
            LockedWriter {
                guard: self.inner.lock().expect("log buffer poisoned"),
            }
        }
    }

    fn capture<F: FnOnce()>(level: Level, f: F) -> String {
        let (writer, buffer) = BufferWriter::new();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_target(true)
            .with_ansi(false)
            .without_time()
            .with_writer(writer)
            .finish();
        with_default(subscriber, f);
        String::from_utf8(buffer.lock().unwrap().clone()).unwrap()
    }

    #[test]
    fn default_config_when_missing_file() {
        let cfg = load_from(Some(PathBuf::from("__nonexistent_hopefully__.toml"))).unwrap();
        assert_eq!(cfg.file, ConfigFile::default());
        assert!(cfg.source.is_none());
        let opts = cfg.state_options();
        assert_eq!(opts.undo.levels, 1000);
        assert!(!opts.undo.persist);
        assert_eq!(opts.undo.persist_levels, 100);
        assert_eq!(opts.edit.indent, "    ");
        assert!(opts.edit.auto_indent);
        assert!(opts.search.ignore_case);
        assert!(opts.file.backup);
        assert_eq!(
            opts.file.encodings,
            vec![TextEncoding::Utf8, TextEncoding::Latin1]
        );
    }

    #[test]
    fn parses_vertical_margin_value() {
        let tmp = write_config("[scroll.margin]\nvertical = 3\n");
        let mut cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert_eq!(cfg.file.scroll.margin.vertical, 3);
        cfg.apply_context(ctx_with_text_rows(40));
        assert_eq!(cfg.effective_vertical_margin, 3);
    }

    #[test]
    fn clamps_when_value_exceeds_half_minus_one() {
        let tmp = write_config("[scroll.margin]\nvertical = 50\n");
        let mut cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        // (20 - 2) / 2 = 9
        let eff = cfg.apply_context(ctx_with_text_rows(20));
        assert_eq!(eff, 9);
        assert_eq!(cfg.effective_vertical_margin, 9);
    }

    #[test]
    fn recompute_with_context_changes_when_height_shrinks() {
        let tmp = write_config("[scroll.margin]\nvertical = 10\n");
        let mut cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        cfg.apply_context(ctx_with_text_rows(50));
        assert_eq!(cfg.effective_vertical_margin, 10);
        let changed = cfg.recompute_with_context(ctx_with_text_rows(10));
        assert_eq!(changed, Some(4));
        assert_eq!(cfg.effective_vertical_margin, 4);
        let changed2 = cfg.recompute_with_context(ctx_with_text_rows(11));
        assert_eq!(changed2, None);
    }

    #[test]
    fn clamp_logging_uses_config_target() {
        let tmp = write_config("[scroll.margin]\nvertical = 8\n");
        let mut cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        let log_output = capture(Level::INFO, || {
            // 7 rows - 1 status row = 6 text rows -> max 2
            cfg.apply_context(ConfigContext::new(80, 7, 1));
        });
        assert!(log_output.contains("INFO config:"));
        assert!(log_output.contains("scroll_margin_vertical_clamped"));
        assert_eq!(cfg.effective_vertical_margin, 2);
    }

    #[test]
    fn parse_error_falls_back_to_defaults_with_warning() {
        let tmp = write_config("[undo\nlevels = 5\n");
        let mut result = None;
        let log_output = capture(Level::WARN, || {
            result = Some(load_from(Some(tmp.path().to_path_buf())).unwrap());
        });
        let cfg = result.unwrap();
        assert_eq!(cfg.file, ConfigFile::default());
        assert!(log_output.contains("WARN config:"));
        assert!(log_output.contains("config_parse_failed_using_defaults"));
    }

    #[test]
    fn parses_all_sections_and_ignores_unknown_keys() {
        let tmp = write_config(
            r#"
[scroll]
horizontal_margin = 5
[scroll.margin]
vertical = 2
[undo]
levels = 50
persist = true
persist_levels = 10
dir = "/tmp/quill-undo"
[edit]
expand_tab = false
tab_width = 8
auto_indent = false
[search]
ignore_case = false
regex = true
whole_word = true
[file]
backup = false
encodings = ["latin-1", "bogus", "utf-8"]
[future]
feature = 1
"#,
        );
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert_eq!(cfg.horizontal_margin(), 5);
        assert_eq!(cfg.tab_width(), 8);
        let opts = cfg.state_options();
        assert_eq!(opts.undo.levels, 50);
        assert!(opts.undo.persist);
        assert_eq!(opts.undo.persist_levels, 10);
        assert_eq!(opts.undo.dir, Some(PathBuf::from("/tmp/quill-undo")));
        assert_eq!(opts.edit.indent, "\t");
        assert!(!opts.edit.auto_indent);
        assert!(!opts.search.ignore_case);
        assert!(opts.search.regex);
        assert!(opts.search.whole_word);
        assert!(!opts.file.backup);
        assert_eq!(
            opts.file.encodings,
            vec![TextEncoding::Latin1, TextEncoding::Utf8]
        );
    }

    #[test]
    fn explicit_indent_wins_over_tab_settings() {
        let file = parse("[edit]\nindent = \"  \"\nexpand_tab = false\n").unwrap();
        assert_eq!(file.edit.indent_unit(), "  ");
    }

    #[test]
    fn default_undo_dir_lives_under_quill() {
        let undo = UndoConfig::default();
        if let Some(dir) = undo.resolved_dir() {
            assert!(dir.ends_with("quill/undo"));
        }
    }
}
