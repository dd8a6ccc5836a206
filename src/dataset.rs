//! Dataset pack loading: manifest, file registration and one view per table.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::engine::{DataProtocol, EngineHandle};
use crate::error::WorkbenchError;
use crate::error_display::user_message_from_report;
use crate::fetch::{FetchError, Fetcher};
use crate::source::{self, InputSource};

/// Directory in the pack → view name, in registration order.
pub const DEFAULT_VIEW_MAP: &[(&str, &str)] = &[
    ("releases_demo", "releases"),
    ("release_artists_demo", "release_artists"),
    ("release_label_xref_demo", "release_label_xref"),
    ("artist_name_map_demo", "artist_name_map"),
    ("artists_demo", "artists"),
    ("artist_aliases_demo", "artist_aliases"),
    ("artist_memberships_demo", "artist_memberships"),
];

/// Pack manifest. Only `pack_name` is required; `files` is informational.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Manifest {
    pub pack_name: String,
    #[serde(default)]
    pub files: BTreeMap<String, ManifestFile>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ManifestFile {
    #[serde(default)]
    pub path: String,
    pub rows: Option<u64>,
    pub bytes: Option<u64>,
}

impl Manifest {
    pub fn parse(text: &str, url: &str) -> Result<Self, WorkbenchError> {
        let manifest: Manifest =
            serde_json::from_str(text).map_err(|e| WorkbenchError::ManifestParse {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        let name = manifest.pack_name.trim();
        if name.is_empty() || name.contains('/') || name.contains('\\') || name == ".." {
            return Err(WorkbenchError::ManifestParse {
                url: url.to_string(),
                message: format!("invalid pack_name {:?}", manifest.pack_name),
            });
        }
        Ok(manifest)
    }

    /// Sum of the row counts the manifest declares, when it declares any.
    pub fn declared_rows(&self) -> Option<u64> {
        let mut total = None;
        for file in self.files.values() {
            if let Some(rows) = file.rows {
                total = Some(total.unwrap_or(0) + rows);
            }
        }
        total
    }
}

/// Name the engine knows a table's file by.
pub fn virtual_file_name(dir: &str) -> String {
    format!("{}.parquet", dir)
}

pub fn view_statement(view: &str, virtual_name: &str) -> String {
    format!(
        "CREATE OR REPLACE VIEW {} AS SELECT * FROM read_parquet('{}')",
        view, virtual_name
    )
}

/// Fetch the manifest without caching.
pub fn fetch_manifest(
    fetcher: &dyn Fetcher,
    manifest_url: &str,
    base_url: &str,
) -> Result<Manifest, WorkbenchError> {
    let location = source::resolve(base_url, manifest_url).map_err(|e| {
        WorkbenchError::ManifestFetch {
            url: manifest_url.to_string(),
            status: None,
            message: e.to_string(),
        }
    })?;
    let url = location.display();
    debug!(url = %url, "fetching manifest");
    let text = fetcher.fetch_text(&location).map_err(|e| {
        warn!(url = %url, error = %e, "manifest fetch failed");
        WorkbenchError::ManifestFetch {
            url: url.clone(),
            status: e.status(),
            message: match &e {
                FetchError::Status { message, .. } => message.clone(),
                other => other.to_string(),
            },
        }
    })?;
    Manifest::parse(&text, &url)
}

/// Load the pack into the engine behind `handle`.
///
/// Views are registered one at a time in `views` order. The first failure
/// stops the load; views registered before it are left in place.
pub fn load_pack(
    handle: &EngineHandle,
    fetcher: &dyn Fetcher,
    manifest_url: &str,
    base_url: &str,
    views: &[(&str, &str)],
) -> Result<Manifest, WorkbenchError> {
    let start = Instant::now();
    let manifest = fetch_manifest(fetcher, manifest_url, base_url)?;
    info!(
        pack = %manifest.pack_name,
        files = manifest.files.len(),
        "manifest loaded"
    );

    for (dir, view) in views {
        let location = source::table_location(base_url, &manifest.pack_name, dir).map_err(
            |e| WorkbenchError::ViewRegistration {
                view: view.to_string(),
                message: e.to_string(),
            },
        )?;
        let protocol = match location {
            InputSource::Http(_) => DataProtocol::Http,
            InputSource::Local(_) => DataProtocol::Local,
        };
        let url = location.display();
        let virtual_name = virtual_file_name(dir);
        let registration_error = |e: color_eyre::Report| {
            let message = user_message_from_report(&e);
            warn!(view = %view, url = %url, error = %message, "view registration failed");
            WorkbenchError::ViewRegistration {
                view: view.to_string(),
                message,
            }
        };

        handle
            .engine
            .register_remote_file(&virtual_name, &url, protocol, true)
            .map_err(registration_error)?;
        handle
            .connection
            .query(&view_statement(view, &virtual_name))
            .map_err(registration_error)?;
        debug!(view = %view, url = %url, "view registered");
    }

    info!(
        pack = %manifest.pack_name,
        views = views.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "dataset pack loaded"
    );
    Ok(manifest)
}
