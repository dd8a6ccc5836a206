//! Location handling for pack resources: local directories vs HTTP/HTTPS origins.

use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum InputSource {
    Local(PathBuf),
    Http(String),
}

impl InputSource {
    /// Display form used in logs and error messages.
    pub fn display(&self) -> String {
        match self {
            Self::Local(p) => p.display().to_string(),
            Self::Http(u) => u.clone(),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("invalid URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("URL {0} cannot hold a path")]
    NotHierarchical(String),
}

/// Classifies the location as local or HTTP/HTTPS using string parsing only (no filesystem calls).
pub fn input_source(location: &str) -> InputSource {
    if let Some(after_scheme) = location.find("://") {
        let prefix = location[..after_scheme].to_lowercase();
        if prefix == "http" || prefix == "https" {
            return InputSource::Http(location.to_string());
        }
        if prefix == "file" {
            return InputSource::Local(PathBuf::from(&location[after_scheme + 3..]));
        }
    }
    InputSource::Local(PathBuf::from(location))
}

fn parse_url(url: &str) -> Result<Url, SourceError> {
    Url::parse(url).map_err(|source| SourceError::InvalidUrl {
        url: url.to_string(),
        source,
    })
}

/// Resolve `path` against `base`.
///
/// Absolute HTTP URLs are returned normalized. Against an HTTP base, `path`
/// is joined with standard URL reference rules: a leading `/` is
/// origin-relative, anything else replaces the last segment of the base.
/// Against a local directory both forms are relative to that directory, so a
/// pack mirrored on disk uses the same layout as the server.
pub fn resolve(base: &str, path: &str) -> Result<InputSource, SourceError> {
    if let InputSource::Http(url) = input_source(path) {
        return Ok(InputSource::Http(parse_url(&url)?.to_string()));
    }
    match input_source(base) {
        InputSource::Http(base_url) => {
            let joined = parse_url(&base_url)?
                .join(path)
                .map_err(|source| SourceError::InvalidUrl {
                    url: path.to_string(),
                    source,
                })?;
            Ok(InputSource::Http(joined.to_string()))
        }
        InputSource::Local(dir) => {
            let relative = Path::new(path.trim_start_matches('/'));
            Ok(InputSource::Local(dir.join(relative)))
        }
    }
}

/// Location of a pack table's columnar file: `/data/<pack>/<dir>/data.parquet`.
///
/// Over HTTP the pack and directory names are percent-encoded as path segments.
pub fn table_location(base: &str, pack_name: &str, dir: &str) -> Result<InputSource, SourceError> {
    match input_source(base) {
        InputSource::Http(base_url) => {
            let mut url = parse_url(&base_url)?;
            url.set_query(None);
            url.set_fragment(None);
            url.path_segments_mut()
                .map_err(|()| SourceError::NotHierarchical(base_url.clone()))?
                .clear()
                .extend(["data", pack_name, dir, "data.parquet"]);
            Ok(InputSource::Http(url.to_string()))
        }
        InputSource::Local(root) => Ok(InputSource::Local(
            root.join("data").join(pack_name).join(dir).join("data.parquet"),
        )),
    }
}
