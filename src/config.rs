use color_eyre::eyre::eyre;
use color_eyre::Result;
use ratatui::style::Color;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;
use supports_color::Stream;

use crate::Mode;

/// Manages config directory and config file operations
#[derive(Clone)]
pub struct ConfigManager {
    pub(crate) config_dir: PathBuf,
}

impl ConfigManager {
    /// Create a ConfigManager with a custom config directory (primarily for testing)
    pub fn with_dir(config_dir: PathBuf) -> Self {
        Self { config_dir }
    }

    /// Create a new ConfigManager for the given app name
    pub fn new(app_name: &str) -> Result<Self> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| eyre!("Could not determine config directory"))?
            .join(app_name);

        Ok(Self { config_dir })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Get path to a specific config file or subdirectory
    pub fn config_path(&self, path: &str) -> PathBuf {
        self.config_dir.join(path)
    }

    pub fn ensure_config_dir(&self) -> Result<()> {
        if !self.config_dir.exists() {
            std::fs::create_dir_all(&self.config_dir)?;
        }
        Ok(())
    }

    /// Generate the default configuration as commented-out TOML.
    ///
    /// Every field is commented so the built-in defaults apply; users uncomment
    /// the lines they want to override.
    pub fn generate_default_config(&self) -> Result<String> {
        let toml_str = toml::to_string_pretty(&AppConfig::default())
            .map_err(|e| eyre!("Failed to serialize default config: {}", e))?;
        Ok(Self::comment_all_fields(&toml_str, &Self::collect_all_comments()))
    }

    fn collect_all_comments() -> HashMap<String, &'static str> {
        let sections: &[(&str, &[(&str, &str)])] = &[
            ("", APP_COMMENTS),
            ("workbench", WORKBENCH_COMMENTS),
            ("timeouts", TIMEOUTS_COMMENTS),
            ("display", DISPLAY_COMMENTS),
            ("engine", ENGINE_COMMENTS),
            ("performance", PERFORMANCE_COMMENTS),
            ("theme.colors", COLOR_COMMENTS),
            ("debug", DEBUG_COMMENTS),
        ];
        let mut comments = HashMap::new();
        for (section, fields) in sections {
            for (field, comment) in fields.iter() {
                let key = if section.is_empty() {
                    field.to_string()
                } else {
                    format!("{}.{}", section, field)
                };
                comments.insert(key, *comment);
            }
        }
        comments
    }

    fn comment_all_fields(toml: &str, comments: &HashMap<String, &'static str>) -> String {
        let mut result = String::new();
        result.push_str("# packbench configuration file\n");
        result
            .push_str("# This file uses TOML format. See https://toml.io/ for syntax reference.\n");
        result.push('\n');

        let mut current_section = String::new();
        let mut seen_fields: HashSet<String> = HashSet::new();

        for line in toml.lines() {
            if let Some(section) = Self::extract_section_name(line) {
                if let Some((_, header)) = SECTION_HEADERS.iter().find(|(s, _)| *s == section) {
                    result.push_str(header);
                    result.push('\n');
                }
                result.push_str("# ");
                result.push_str(line);
                result.push('\n');
                // Option fields are skipped by the serializer; list them so users can find them
                for (field, comment, example) in OPTIONAL_FIELDS {
                    if field.rsplit_once('.').map(|(s, _)| s) == Some(section.as_str())
                        && !seen_fields.contains(*field)
                    {
                        Self::push_comment(&mut result, comment);
                        let name = field.rsplit('.').next().unwrap_or(*field);
                        result.push_str(&format!("# {} = {}\n\n", name, example));
                        seen_fields.insert(field.to_string());
                    }
                }
                current_section = section;
                continue;
            }

            if let Some(field_path) = Self::extract_field_path(line, &current_section) {
                if let Some(comment) = comments.get(&field_path) {
                    Self::push_comment(&mut result, comment);
                }
                seen_fields.insert(field_path);
                result.push_str("# ");
            }
            result.push_str(line);
            result.push('\n');
        }

        result
    }

    fn push_comment(out: &mut String, comment: &str) {
        for comment_line in comment.lines() {
            out.push_str("# ");
            out.push_str(comment_line);
            out.push('\n');
        }
    }

    /// Extract section name from TOML line like "[display]" or "[theme.colors]"
    fn extract_section_name(line: &str) -> Option<String> {
        let trimmed = line.trim();
        if trimmed.starts_with('[') && trimmed.ends_with(']') {
            Some(trimmed[1..trimmed.len() - 1].to_string())
        } else {
            None
        }
    }

    fn extract_field_path(line: &str, current_section: &str) -> Option<String> {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('[') {
            return None;
        }
        let (field_name, _) = trimmed.split_once('=')?;
        let field_name = field_name.trim();
        if current_section.is_empty() {
            Some(field_name.to_string())
        } else {
            Some(format!("{}.{}", current_section, field_name))
        }
    }

    /// Write default configuration to config file
    pub fn write_default_config(&self, force: bool) -> Result<PathBuf> {
        let config_path = self.config_path("config.toml");

        if config_path.exists() && !force {
            return Err(eyre!(
                "Config file already exists at {}. Use --force to overwrite.",
                config_path.display()
            ));
        }

        self.ensure_config_dir()?;
        std::fs::write(&config_path, self.generate_default_config()?)?;

        Ok(config_path)
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Configuration format version (for future compatibility)
    pub version: String,
    pub workbench: WorkbenchConfig,
    pub timeouts: TimeoutsConfig,
    pub display: DisplayConfig,
    pub engine: EngineConfig,
    pub performance: PerformanceConfig,
    pub theme: ThemeConfig,
    pub debug: DebugConfig,
}

const APP_COMMENTS: &[(&str, &str)] = &[(
    "version",
    "Configuration format version (for future compatibility)",
)];

const SECTION_HEADERS: &[(&str, &str)] = &[
    (
        "workbench",
        "# ============================================================================\n# Workbench\n# ============================================================================",
    ),
    (
        "timeouts",
        "# ============================================================================\n# Timeouts (seconds)\n# ============================================================================",
    ),
    (
        "display",
        "# ============================================================================\n# Display Settings\n# ============================================================================",
    ),
    (
        "engine",
        "# ============================================================================\n# Query Engine\n# ============================================================================",
    ),
    (
        "performance",
        "# ============================================================================\n# Performance Settings\n# ============================================================================",
    ),
    (
        "theme",
        "# ============================================================================\n# Color Theme\n# ============================================================================",
    ),
    (
        "theme.colors",
        "# Color definitions\n# Supported formats:\n#   - Named colors: \"red\", \"blue\", \"bright_red\", \"dark_gray\", etc. (case-insensitive)\n#   - Hex colors: \"#ff0000\" or \"#FF0000\" (case-insensitive)\n#   - Indexed colors: \"indexed(0-255)\" for specific xterm 256-color palette entries\n# Colors automatically adapt to your terminal's capabilities",
    ),
    (
        "debug",
        "# ============================================================================\n# Debug Settings\n# ============================================================================",
    ),
];

// (field path, comment, example value)
const OPTIONAL_FIELDS: &[(&str, &str, &str)] = &[(
    "workbench.mode",
    "Workbench mode: \"explore\" (editable SQL, sidebar, palette) or \"showcase\" (featured cards)\nUnset = explore. The --mode flag takes precedence.",
    "\"explore\"",
)];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorkbenchConfig {
    /// "explore" or "showcase"; None falls back to explore.
    pub mode: Option<String>,
    /// http(s) origin or local directory that pack paths resolve against.
    pub base_url: String,
    pub manifest_url: String,
    /// Clicking a palette row also runs the query.
    pub run_on_click: bool,
}

pub const DEFAULT_MANIFEST_URL: &str = "/data/web_demo_pack_v1/demo_manifest.json";

const WORKBENCH_COMMENTS: &[(&str, &str)] = &[
    (
        "base_url",
        "Origin that pack paths (/data/<pack>/...) are resolved against\nEither an http(s):// URL or a local directory",
    ),
    (
        "manifest_url",
        "Pack manifest location: absolute URL, or a path resolved against base_url",
    ),
    (
        "run_on_click",
        "When true, clicking a query in the palette also runs it (sidebar clicks only load)",
    ),
];

impl Default for WorkbenchConfig {
    fn default() -> Self {
        Self {
            mode: None,
            base_url: "http://localhost:8080".to_string(),
            manifest_url: DEFAULT_MANIFEST_URL.to_string(),
            run_on_click: false,
        }
    }
}

impl WorkbenchConfig {
    pub fn merge(&mut self, other: Self) {
        let default = WorkbenchConfig::default();
        if other.mode.is_some() {
            self.mode = other.mode;
        }
        if other.base_url != default.base_url {
            self.base_url = other.base_url;
        }
        if other.manifest_url != default.manifest_url {
            self.manifest_url = other.manifest_url;
        }
        if other.run_on_click != default.run_on_click {
            self.run_on_click = other.run_on_click;
        }
    }

    /// Mode named in the config file, if it names a known one.
    pub fn configured_mode(&self) -> Option<Mode> {
        self.mode.as_deref().and_then(Mode::from_name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TimeoutsConfig {
    pub engine_boot_secs: u64,
    pub dataset_load_secs: u64,
    pub http_secs: u64,
}

const TIMEOUTS_COMMENTS: &[(&str, &str)] = &[
    (
        "engine_boot_secs",
        "Give up on engine startup after this many seconds",
    ),
    (
        "dataset_load_secs",
        "Give up on loading the dataset pack (manifest + all views) after this many seconds",
    ),
    (
        "http_secs",
        "Timeout for a single HTTP request (manifest or data file download)",
    ),
];

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            engine_boot_secs: 15,
            dataset_load_secs: 20,
            http_secs: 30,
        }
    }
}

impl TimeoutsConfig {
    pub fn merge(&mut self, other: Self) {
        let default = TimeoutsConfig::default();
        if other.engine_boot_secs != default.engine_boot_secs {
            self.engine_boot_secs = other.engine_boot_secs;
        }
        if other.dataset_load_secs != default.dataset_load_secs {
            self.dataset_load_secs = other.dataset_load_secs;
        }
        if other.http_secs != default.http_secs {
            self.http_secs = other.http_secs;
        }
    }

    pub fn engine_boot(&self) -> Duration {
        Duration::from_secs(self.engine_boot_secs)
    }

    pub fn dataset_load(&self) -> Duration {
        Duration::from_secs(self.dataset_load_secs)
    }

    pub fn http(&self) -> Duration {
        Duration::from_secs(self.http_secs)
    }
}

/// How query results are rendered in the output pane.
#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

impl OutputFormat {
    pub fn toggle(self) -> Self {
        match self {
            Self::Table => Self::Json,
            Self::Json => Self::Table,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DisplayConfig {
    pub max_rows: usize,
    pub output_format: OutputFormat,
}

const DISPLAY_COMMENTS: &[(&str, &str)] = &[
    (
        "max_rows",
        "Maximum number of result rows shown for a query (must be > 0)",
    ),
    (
        "output_format",
        "Initial output rendering: \"table\" or \"json\" (toggle at runtime with Ctrl+T or F2)",
    ),
];

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            max_rows: 100,
            output_format: OutputFormat::Table,
        }
    }
}

impl DisplayConfig {
    pub fn merge(&mut self, other: Self) {
        let default = DisplayConfig::default();
        if other.max_rows != default.max_rows {
            self.max_rows = other.max_rows;
        }
        if other.output_format != default.output_format {
            self.output_format = other.output_format;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Prefer the streaming execution bundle when it is compiled in.
    pub streaming: bool,
}

const ENGINE_COMMENTS: &[(&str, &str)] = &[(
    "streaming",
    "Use the Polars streaming engine for query collection when available (default: true)",
)];

impl Default for EngineConfig {
    fn default() -> Self {
        Self { streaming: true }
    }
}

impl EngineConfig {
    pub fn merge(&mut self, other: Self) {
        if other.streaming != EngineConfig::default().streaming {
            self.streaming = other.streaming;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PerformanceConfig {
    pub event_poll_interval_ms: u64,
}

const PERFORMANCE_COMMENTS: &[(&str, &str)] = &[(
    "event_poll_interval_ms",
    "Event polling interval in milliseconds\nLower values = more responsive but higher CPU usage",
)];

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            event_poll_interval_ms: 25,
        }
    }
}

impl PerformanceConfig {
    pub fn merge(&mut self, other: Self) {
        if other.event_poll_interval_ms != PerformanceConfig::default().event_poll_interval_ms {
            self.event_poll_interval_ms = other.event_poll_interval_ms;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct ThemeConfig {
    pub colors: ColorConfig,
}

impl ThemeConfig {
    pub fn merge(&mut self, other: Self) {
        self.colors.merge(other.colors);
    }
}

/// Color configuration for the application theme.
///
/// Colors can be named ("cyan"), hex ("#ff0000") or indexed ("indexed(236)").
/// `table_selected = "reversed"` is handled as a modifier when rendering.
///
/// - `keybind_hints` / `keybind_labels`: control bar keys and labels
/// - `throbber`: busy indicator while the engine or a query is working
/// - `success` / `error` / `warning`: status line
/// - `table_header` / `table_header_bg`: result table header
/// - `card_border` / `card_selected`: showcase cards
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ColorConfig {
    pub keybind_hints: String,
    pub keybind_labels: String,
    pub throbber: String,
    pub success: String,
    pub error: String,
    pub warning: String,
    pub dimmed: String,
    pub controls_bg: String,
    pub text_primary: String,
    pub text_secondary: String,
    pub text_inverse: String,
    pub table_header: String,
    pub table_header_bg: String,
    pub table_selected: String,
    pub sidebar_border: String,
    pub modal_border_active: String,
    pub modal_border_error: String,
    pub card_border: String,
    pub card_selected: String,
}

const COLOR_COMMENTS: &[(&str, &str)] = &[
    ("keybind_hints", "Keys shown in the control bar and overlays"),
    ("keybind_labels", "Action labels in the control bar"),
    ("throbber", "Busy indicator in the status line"),
    ("success", "Status line after a successful load or query"),
    ("error", "Status line after a failure"),
    ("warning", "Hints such as \"Dataset not loaded.\""),
    ("dimmed", "Inactive borders and placeholder text"),
    ("controls_bg", "Control bar background"),
    ("text_primary", "Primary text"),
    ("text_secondary", "Secondary text (descriptions, tags)"),
    ("text_inverse", "Text on highlighted rows"),
    ("table_header", "Result table header text"),
    ("table_header_bg", "Result table header background"),
    (
        "table_selected",
        "Highlighted palette and sidebar row (\"reversed\" inverts colors)",
    ),
    ("sidebar_border", "Query sidebar border"),
    ("modal_border_active", "Focused pane and palette border"),
    ("modal_border_error", "Border of the output pane after an error"),
    ("card_border", "Showcase card border"),
    ("card_selected", "Border of the selected showcase card"),
];

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            keybind_hints: "cyan".to_string(),
            keybind_labels: "indexed(252)".to_string(),
            throbber: "cyan".to_string(),
            success: "green".to_string(),
            error: "red".to_string(),
            warning: "yellow".to_string(),
            dimmed: "dark_gray".to_string(),
            controls_bg: "indexed(235)".to_string(),
            text_primary: "default".to_string(),
            text_secondary: "indexed(245)".to_string(),
            text_inverse: "black".to_string(),
            table_header: "white".to_string(),
            table_header_bg: "indexed(235)".to_string(),
            table_selected: "reversed".to_string(),
            sidebar_border: "indexed(240)".to_string(),
            modal_border_active: "yellow".to_string(),
            modal_border_error: "red".to_string(),
            card_border: "indexed(240)".to_string(),
            card_selected: "cyan".to_string(),
        }
    }
}

impl ColorConfig {
    /// All colors as `(name, value)` pairs, in declaration order.
    pub fn entries(&self) -> [(&'static str, &str); 19] {
        [
            ("keybind_hints", self.keybind_hints.as_str()),
            ("keybind_labels", self.keybind_labels.as_str()),
            ("throbber", self.throbber.as_str()),
            ("success", self.success.as_str()),
            ("error", self.error.as_str()),
            ("warning", self.warning.as_str()),
            ("dimmed", self.dimmed.as_str()),
            ("controls_bg", self.controls_bg.as_str()),
            ("text_primary", self.text_primary.as_str()),
            ("text_secondary", self.text_secondary.as_str()),
            ("text_inverse", self.text_inverse.as_str()),
            ("table_header", self.table_header.as_str()),
            ("table_header_bg", self.table_header_bg.as_str()),
            ("table_selected", self.table_selected.as_str()),
            ("sidebar_border", self.sidebar_border.as_str()),
            ("modal_border_active", self.modal_border_active.as_str()),
            ("modal_border_error", self.modal_border_error.as_str()),
            ("card_border", self.card_border.as_str()),
            ("card_selected", self.card_selected.as_str()),
        ]
    }

    fn validate(&self, parser: &ColorParser) -> Result<()> {
        for (name, value) in self.entries() {
            parser
                .parse(value)
                .map_err(|e| eyre!("Invalid color value for '{}': {}", name, e))?;
        }
        Ok(())
    }

    pub fn merge(&mut self, other: Self) {
        let default = ColorConfig::default();
        macro_rules! merge_color {
            ($($field:ident),* $(,)?) => {
                $(
                    if other.$field != default.$field {
                        self.$field = other.$field;
                    }
                )*
            };
        }
        merge_color!(
            keybind_hints,
            keybind_labels,
            throbber,
            success,
            error,
            warning,
            dimmed,
            controls_bg,
            text_primary,
            text_secondary,
            text_inverse,
            table_header,
            table_header_bg,
            table_selected,
            sidebar_border,
            modal_border_active,
            modal_border_error,
            card_border,
            card_selected,
        );
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    pub enabled: bool,
    pub show_timings: bool,
}

const DEBUG_COMMENTS: &[(&str, &str)] = &[
    ("enabled", "Show the debug row by default"),
    (
        "show_timings",
        "Include boot, load and query timings in the debug row",
    ),
];

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            show_timings: true,
        }
    }
}

impl DebugConfig {
    pub fn merge(&mut self, other: Self) {
        let default = DebugConfig::default();
        if other.enabled != default.enabled {
            self.enabled = other.enabled;
        }
        if other.show_timings != default.show_timings {
            self.show_timings = other.show_timings;
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: "0.1".to_string(),
            workbench: WorkbenchConfig::default(),
            timeouts: TimeoutsConfig::default(),
            display: DisplayConfig::default(),
            engine: EngineConfig::default(),
            performance: PerformanceConfig::default(),
            theme: ThemeConfig::default(),
            debug: DebugConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from all layers (default → user)
    pub fn load(app_name: &str) -> Result<Self> {
        let manager = ConfigManager::new(app_name)?;
        Self::load_from(&manager)
    }

    /// Load configuration using the given manager's directory.
    pub fn load_from(manager: &ConfigManager) -> Result<Self> {
        let config_path = manager.config_path("config.toml");
        let mut config = AppConfig::default();
        config.merge(Self::load_user_config(&config_path)?);

        config
            .validate()
            .map_err(|e| eyre!("Invalid configuration in {}: {}", config_path.display(), e))?;

        Ok(config)
    }

    fn load_user_config(config_path: &Path) -> Result<AppConfig> {
        if !config_path.exists() {
            return Ok(AppConfig::default());
        }

        let content = std::fs::read_to_string(config_path).map_err(|e| {
            eyre!(
                "Failed to read config file at {}: {}",
                config_path.display(),
                e
            )
        })?;

        toml::from_str(&content).map_err(|e| {
            eyre!(
                "Failed to parse config file at {}: {}",
                config_path.display(),
                e
            )
        })
    }

    /// Merge another config into this one (other takes precedence)
    pub fn merge(&mut self, other: AppConfig) {
        if other.version != AppConfig::default().version {
            self.version = other.version;
        }

        self.workbench.merge(other.workbench);
        self.timeouts.merge(other.timeouts);
        self.display.merge(other.display);
        self.engine.merge(other.engine);
        self.performance.merge(other.performance);
        self.theme.merge(other.theme);
        self.debug.merge(other.debug);
    }

    /// Apply command-line overrides (the last configuration layer).
    pub fn apply_args(&mut self, args: &crate::Args) {
        if let Some(mode) = args.mode {
            self.workbench.mode = Some(mode.as_str().to_string());
        }
        if let Some(base_url) = &args.base_url {
            self.workbench.base_url = base_url.clone();
        }
        if let Some(manifest_url) = &args.manifest_url {
            self.workbench.manifest_url = manifest_url.clone();
        }
        if args.run_on_click {
            self.workbench.run_on_click = true;
        }
        if let Some(secs) = args.engine_boot_timeout {
            self.timeouts.engine_boot_secs = secs;
        }
        if let Some(secs) = args.dataset_load_timeout {
            self.timeouts.dataset_load_secs = secs;
        }
        if let Some(n) = args.max_rows {
            self.display.max_rows = n;
        }
        if args.no_streaming {
            self.engine.streaming = false;
        }
        if args.debug {
            self.debug.enabled = true;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.version.starts_with("0.1") {
            return Err(eyre!(
                "Unsupported config version: {}. Expected 0.1.x",
                self.version
            ));
        }

        if let Some(mode) = &self.workbench.mode {
            if Mode::from_name(mode).is_none() {
                return Err(eyre!(
                    "workbench.mode must be \"explore\" or \"showcase\", got \"{}\"",
                    mode
                ));
            }
        }

        if self.workbench.base_url.trim().is_empty() {
            return Err(eyre!("workbench.base_url must not be empty"));
        }

        if self.workbench.manifest_url.trim().is_empty() {
            return Err(eyre!("workbench.manifest_url must not be empty"));
        }

        if self.timeouts.engine_boot_secs == 0
            || self.timeouts.dataset_load_secs == 0
            || self.timeouts.http_secs == 0
        {
            return Err(eyre!("timeouts must be greater than 0 seconds"));
        }

        if self.display.max_rows == 0 {
            return Err(eyre!("display.max_rows must be greater than 0"));
        }

        if self.performance.event_poll_interval_ms == 0 {
            return Err(eyre!("event_poll_interval_ms must be greater than 0"));
        }

        self.theme.colors.validate(&ColorParser::new())?;

        Ok(())
    }
}

/// Color parser with terminal capability detection
pub struct ColorParser {
    supports_true_color: bool,
    supports_256: bool,
    no_color: bool,
}

impl ColorParser {
    /// Create a new ColorParser with automatic terminal capability detection
    pub fn new() -> Self {
        let no_color = std::env::var("NO_COLOR").is_ok();
        let support = supports_color::on(Stream::Stdout);

        Self {
            supports_true_color: support.as_ref().map(|s| s.has_16m).unwrap_or(false),
            supports_256: support.as_ref().map(|s| s.has_256).unwrap_or(false),
            no_color,
        }
    }

    /// Parser with fixed capabilities, independent of the current terminal.
    pub fn with_capabilities(supports_true_color: bool, supports_256: bool) -> Self {
        Self {
            supports_true_color,
            supports_256,
            no_color: false,
        }
    }

    /// Parse a color string (hex, indexed or named) into a terminal color
    pub fn parse(&self, s: &str) -> Result<Color> {
        let trimmed = s.trim();
        let color = Self::parse_value(trimmed)?;
        if self.no_color {
            return Ok(Color::Reset);
        }
        Ok(match color {
            Color::Rgb(r, g, b) => self.convert_rgb_to_terminal_color(r, g, b),
            other => other,
        })
    }

    fn parse_value(trimmed: &str) -> Result<Color> {
        if trimmed.starts_with('#') {
            let (r, g, b) = parse_hex(trimmed)?;
            return Ok(Color::Rgb(r, g, b));
        }

        let lower = trimmed.to_lowercase();
        if let Some(num_str) = lower
            .strip_prefix("indexed(")
            .and_then(|rest| rest.strip_suffix(')'))
        {
            let num = num_str.trim().parse::<u8>().map_err(|_| {
                eyre!(
                    "Invalid indexed color: '{}'. Expected format: indexed(0-255)",
                    trimmed
                )
            })?;
            return Ok(Color::Indexed(num));
        }

        match lower.replace(' ', "_").as_str() {
            "black" => Ok(Color::Black),
            "red" => Ok(Color::Red),
            "green" => Ok(Color::Green),
            "yellow" => Ok(Color::Yellow),
            "blue" => Ok(Color::Blue),
            "magenta" => Ok(Color::Magenta),
            "cyan" => Ok(Color::Cyan),
            "white" => Ok(Color::White),
            "bright_black" => Ok(Color::Indexed(8)),
            "bright_red" => Ok(Color::Indexed(9)),
            "bright_green" => Ok(Color::Indexed(10)),
            "bright_yellow" => Ok(Color::Indexed(11)),
            "bright_blue" => Ok(Color::Indexed(12)),
            "bright_magenta" => Ok(Color::Indexed(13)),
            "bright_cyan" => Ok(Color::Indexed(14)),
            "bright_white" => Ok(Color::Indexed(15)),
            "gray" | "grey" | "dark_gray" | "dark_grey" => Ok(Color::Indexed(8)),
            "light_gray" | "light_grey" => Ok(Color::Indexed(7)),
            // modifiers are applied at render time
            "reset" | "default" | "none" | "reversed" => Ok(Color::Reset),
            _ => Err(eyre!(
                "Unknown color name: '{}'. Supported: basic ANSI colors (red, blue, etc.), \
                 bright variants (bright_red, etc.), indexed(0-255), or hex colors (#ff0000)",
                trimmed
            )),
        }
    }

    fn convert_rgb_to_terminal_color(&self, r: u8, g: u8, b: u8) -> Color {
        if self.supports_true_color {
            Color::Rgb(r, g, b)
        } else if self.supports_256 {
            Color::Indexed(rgb_to_256_color(r, g, b))
        } else {
            rgb_to_basic_ansi(r, g, b)
        }
    }
}

impl Default for ColorParser {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_hex(s: &str) -> Result<(u8, u8, u8)> {
    let digits = s
        .strip_prefix('#')
        .filter(|d| d.len() == 6 && d.is_ascii())
        .ok_or_else(|| {
            eyre!(
                "Invalid hex color format: '{}'. Expected format: #rrggbb",
                s
            )
        })?;
    let component = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&digits[range], 16).map_err(|_| eyre!("Invalid hex color: {}", s))
    };
    Ok((component(0..2)?, component(2..4)?, component(4..6)?))
}

/// Convert RGB to the nearest xterm 256-color palette index
pub fn rgb_to_256_color(r: u8, g: u8, b: u8) -> u8 {
    let max_diff = r.max(g).max(b) as i16 - r.min(g).min(b) as i16;
    if max_diff < 10 {
        let gray = (r as u16 + g as u16 + b as u16) / 3;
        if gray < 8 {
            return 16;
        } else if gray > 247 {
            return 231;
        }
        return 232 + ((gray - 8) * 24 / 240) as u8;
    }

    let r_idx = (r as u16 * 5 / 255) as u8;
    let g_idx = (g as u16 * 5 / 255) as u8;
    let b_idx = (b as u16 * 5 / 255) as u8;

    16 + 36 * r_idx + 6 * g_idx + b_idx
}

/// Convert RGB to the nearest of the 8 basic ANSI colors
pub fn rgb_to_basic_ansi(r: u8, g: u8, b: u8) -> Color {
    let max_diff = r.max(g).max(b) as i16 - r.min(g).min(b) as i16;
    if max_diff < 30 {
        let avg = (r as u16 + g as u16 + b as u16) / 3;
        return if avg < 64 { Color::Black } else { Color::White };
    }

    match (r > 128, g > 128, b > 128) {
        (false, false, false) => Color::Black,
        (true, false, false) => Color::Red,
        (false, true, false) => Color::Green,
        (true, true, false) => Color::Yellow,
        (false, false, true) => Color::Blue,
        (true, false, true) => Color::Magenta,
        (false, true, true) => Color::Cyan,
        (true, true, true) => Color::White,
    }
}

/// Theme containing parsed colors ready for use
#[derive(Debug, Clone)]
pub struct Theme {
    pub colors: HashMap<String, Color>,
}

impl Theme {
    /// Create a Theme from a ThemeConfig by parsing all color strings
    pub fn from_config(config: &ThemeConfig) -> Result<Self> {
        let parser = ColorParser::new();
        let mut colors = HashMap::new();
        for (name, value) in config.colors.entries() {
            colors.insert(name.to_string(), parser.parse(value)?);
        }
        Ok(Self { colors })
    }

    /// Get a color by name, returns Reset if not found
    pub fn get(&self, name: &str) -> Color {
        self.colors.get(name).copied().unwrap_or(Color::Reset)
    }

    pub fn get_optional(&self, name: &str) -> Option<Color> {
        self.colors.get(name).copied()
    }
}

impl Default for Theme {
    fn default() -> Self {
        let parser = ColorParser::with_capabilities(false, true);
        let colors = ColorConfig::default()
            .entries()
            .into_iter()
            .filter_map(|(name, value)| parser.parse(value).ok().map(|c| (name.to_string(), c)))
            .collect();
        Self { colors }
    }
}
