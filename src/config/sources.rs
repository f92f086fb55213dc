// src/config/sources.rs
use std::fs;
use std::path::{Path, PathBuf};

use super::ConfigError;
use crate::registry::FeedSource;

const ENV_PATH: &str = "SLDB_SOURCES_PATH";
const ENV_LIST: &str = "SLDB_TIPLOCS";

/// Load sources from an explicit path. Supports TOML or JSON formats.
pub fn load_sources_from(path: &Path) -> Result<Vec<FeedSource>, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_sources(&content, ext.as_str()).map_err(|reason| ConfigError::Parse {
        path: path.display().to_string(),
        reason,
    })
}

/// Load sources using env vars + fallbacks:
/// 1) $SLDB_SOURCES_PATH
/// 2) $SLDB_TIPLOCS (comma separated)
/// 3) config/sources.toml
/// 4) config/sources.json
pub fn load_sources_default(
    lookup: &dyn Fn(&str) -> Option<String>,
) -> Result<Vec<FeedSource>, ConfigError> {
    if let Some(p) = lookup(ENV_PATH).filter(|p| !p.trim().is_empty()) {
        let pb = PathBuf::from(p.trim());
        if !pb.exists() {
            return Err(ConfigError::Invalid {
                var: ENV_PATH,
                value: p,
                reason: "path does not exist".into(),
            });
        }
        return load_sources_from(&pb);
    }
    if let Some(list) = lookup(ENV_LIST) {
        let sources = parse_list(&list);
        if !sources.is_empty() {
            return Ok(sources);
        }
    }
    let toml_p = PathBuf::from("config/sources.toml");
    if toml_p.exists() {
        return load_sources_from(&toml_p);
    }
    let json_p = PathBuf::from("config/sources.json");
    if json_p.exists() {
        return load_sources_from(&json_p);
    }
    Ok(Vec::new())
}

fn parse_sources(s: &str, hint_ext: &str) -> Result<Vec<FeedSource>, String> {
    // Try TOML first if hinted or content looks like toml.
    let try_toml = hint_ext == "toml" || s.contains("[[sources]]");
    if try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    let json_err = match parse_json(s) {
        Ok(v) => return Ok(v),
        Err(e) => e,
    };
    if !try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    Err(format!("unsupported sources format ({json_err})"))
}

fn parse_toml(s: &str) -> Result<Vec<FeedSource>, toml::de::Error> {
    #[derive(serde::Deserialize)]
    struct TomlSources {
        sources: Vec<FeedSource>,
    }
    let v: TomlSources = toml::from_str(s)?;
    Ok(clean_list(v.sources))
}

fn parse_json(s: &str) -> Result<Vec<FeedSource>, serde_json::Error> {
    let v: Vec<FeedSource> = serde_json::from_str(s)?;
    Ok(clean_list(v))
}

fn parse_list(s: &str) -> Vec<FeedSource> {
    clean_list(s.split(',').map(FeedSource::new).collect())
}

/// Trim and drop blanks. Duplicates are left for the registry to reject.
fn clean_list(items: Vec<FeedSource>) -> Vec<FeedSource> {
    items
        .into_iter()
        .map(FeedSource::normalized)
        .filter(|s| !s.tiploc().is_empty())
        .collect()
}
