//! Shared CLI definitions for packbench.
//!
//! Used by the main application and by the build script (manpage) and
//! gen_docs binary (command-line-options markdown).

use clap::{CommandFactory, Parser, ValueEnum};
use std::fmt;

/// Presentation mode of the workbench.
///
/// The mode decides which catalog entries are offered and whether the SQL
/// buffer can be edited. It is always chosen explicitly; when neither the
/// command line nor the config names one, `explore` is used.
#[derive(Debug, Default, Clone, Copy, ValueEnum, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Full workbench: editable SQL, query sidebar and command palette
    #[default]
    Explore,
    /// Read-only showcase: featured demo cards that load and run on selection
    Showcase,
}

impl Mode {
    /// Parse a mode name as written in the config file ("explore" or "showcase").
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "explore" => Some(Self::Explore),
            "showcase" => Some(Self::Showcase),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Explore => "explore",
            Self::Showcase => "showcase",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Command-line arguments for packbench
#[derive(Clone, Parser, Debug, Default)]
#[command(
    name = "packbench",
    version,
    about = "Dataset pack query workbench in the terminal",
    long_about = include_str!("../long_about.txt")
)]
pub struct Args {
    /// Workbench mode (explore or showcase). Overrides config [workbench] mode; default: explore
    #[arg(long = "mode", value_enum)]
    pub mode: Option<Mode>,

    /// Origin that dataset paths are resolved against: an http(s):// URL or a local directory
    #[arg(long = "base-url", value_name = "URL")]
    pub base_url: Option<String>,

    /// Location of the pack manifest (absolute URL, or a path resolved against --base-url)
    #[arg(long = "manifest-url", value_name = "URL")]
    pub manifest_url: Option<String>,

    /// Run a query immediately when it is clicked in the palette
    #[arg(long = "run-on-click", action)]
    pub run_on_click: bool,

    /// Seconds to wait for the engine to boot (default: 15)
    #[arg(long = "engine-boot-timeout", value_name = "SECS")]
    pub engine_boot_timeout: Option<u64>,

    /// Seconds to wait for the dataset pack to load (default: 20)
    #[arg(long = "dataset-load-timeout", value_name = "SECS")]
    pub dataset_load_timeout: Option<u64>,

    /// Maximum number of result rows shown for a query (default: 100)
    #[arg(long = "max-rows", value_name = "N")]
    pub max_rows: Option<usize>,

    /// Disable the streaming execution bundle and collect queries in memory
    #[arg(long = "no-streaming", action)]
    pub no_streaming: bool,

    /// Load the dataset, run the catalog query with this id, print the result as JSON and exit
    #[arg(long = "run", value_name = "QUERY_ID")]
    pub run: Option<String>,

    /// Print the queries available in the selected mode and exit
    #[arg(long = "list-queries", action)]
    pub list_queries: bool,

    /// Load the dataset pack as soon as the workbench starts
    #[arg(long = "load", action)]
    pub load: bool,

    /// Enable debug mode to show operational information (also logs to the cache directory)
    #[arg(long = "debug", action)]
    pub debug: bool,

    /// Write structured logs to this file
    #[arg(long = "log-file", value_name = "PATH")]
    pub log_file: Option<std::path::PathBuf>,

    /// Clear all cached downloads and exit
    #[arg(long = "clear-cache", action)]
    pub clear_cache: bool,

    /// Generate default configuration file at ~/.config/packbench/config.toml
    #[arg(long = "generate-config", action)]
    pub generate_config: bool,

    /// Force overwrite existing config file when using --generate-config
    #[arg(long = "force", requires = "generate_config", action)]
    pub force: bool,
}

/// Escape `|` and newlines for use in markdown table cells.
fn escape_table_cell(s: &str) -> String {
    s.replace('|', "\\|").replace(['\n', '\r'], " ")
}

fn value_placeholder(arg: &clap::Arg) -> String {
    arg.get_value_names()
        .map(|names| {
            names
                .iter()
                .map(|n: &clap::builder::Str| format!("<{}>", n.as_ref() as &str))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .unwrap_or_default()
}

/// Render command-line options as markdown.
///
/// Used by the gen_docs binary; output is written to stdout and then
/// to `docs/reference/command-line-options.md` by the docs build process.
pub fn render_options_markdown() -> String {
    let mut cmd = Args::command();
    cmd.build();

    let mut out = String::from("# Command Line Options\n\n");

    out.push_str("## Usage\n\n```\n");
    out.push_str(&cmd.render_usage().to_string());
    out.push_str("\n```\n\n");

    out.push_str("## Options\n\n");
    out.push_str("| Option | Description |\n");
    out.push_str("|--------|-------------|\n");

    for arg in cmd.get_arguments() {
        let id = arg.get_id().as_ref().to_string();
        if id == "help" || id == "version" {
            continue;
        }

        let mut parts = Vec::new();
        if let Some(s) = arg.get_short() {
            parts.push(format!("-{s}"));
        }
        if let Some(l) = arg.get_long() {
            parts.push(format!("--{l}"));
        }
        let op = parts.join(", ");
        let placeholder = if arg.get_action().takes_values() {
            let names = value_placeholder(arg);
            if names.is_empty() && !arg.get_possible_values().is_empty() {
                let values: Vec<String> = arg
                    .get_possible_values()
                    .iter()
                    .map(|v| v.get_name().to_string())
                    .collect();
                format!("<{}>", values.join("|"))
            } else {
                names
            }
        } else {
            String::new()
        };
        let option_str = if placeholder.is_empty() {
            op
        } else {
            format!("{op} {placeholder}")
        };

        let help = arg
            .get_help()
            .map(|h| escape_table_cell(&h.to_string()))
            .unwrap_or_else(|| "-".to_string());

        out.push_str(&format!("| `{option_str}` | {help} |\n"));
    }

    out
}
