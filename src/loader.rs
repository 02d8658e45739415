//! Source Loading
//!
//! Discovers endpoint declarations and definition modules on disk. Loading
//! only reads and parses JSON; validation happens in [`crate::compiler`].
//!
//! Services and endpoints are enumerated in lexical order so that every
//! downstream artifact is reproducible across platforms.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use walkdir::WalkDir;

use crate::error::{CompileError, Result};

/// One endpoint declaration, as found on disk or supplied in memory
#[derive(Debug, Clone)]
pub struct EndpointSource {
    pub service_id: String,
    pub endpoint_id: String,
    pub path: Option<PathBuf>,
    pub declaration: Value,
}

impl EndpointSource {
    pub fn new(service_id: impl Into<String>, endpoint_id: impl Into<String>, declaration: Value) -> Self {
        Self {
            service_id: service_id.into(),
            endpoint_id: endpoint_id.into(),
            path: None,
            declaration,
        }
    }
}

/// One definition module: a JSON object whose keys are its exports
#[derive(Debug, Clone)]
pub struct DefinitionSource {
    /// File stem the module was loaded from
    pub name: String,
    pub path: Option<PathBuf>,
    pub exports: Value,
}

impl DefinitionSource {
    pub fn new(name: impl Into<String>, exports: Value) -> Self {
        Self {
            name: name.into(),
            path: None,
            exports,
        }
    }

    /// File name used in diagnostics
    pub fn file_name(&self) -> String {
        self.path
            .as_ref()
            .and_then(|p| p.file_name())
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("{}.json", self.name))
    }
}

/// Configuration for source discovery
#[derive(Debug, Clone)]
pub struct LoadConfig {
    /// Directory (under the source root) holding definition modules
    pub definitions_dir: String,
    /// Extension of declaration files
    pub extension: String,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            definitions_dir: "definitions".to_string(),
            extension: "json".to_string(),
        }
    }
}

/// Load every `<root>/<serviceId>/<endpointId>.json`
pub fn load_endpoint_sources(root: &Path, config: &LoadConfig) -> Result<Vec<EndpointSource>> {
    let mut sources = Vec::new();

    for service in sorted_entries(root)? {
        if !service.file_type().is_dir() {
            continue;
        }
        let service_id = service.file_name().to_string_lossy().into_owned();
        if service_id.contains('.') || service_id == config.definitions_dir {
            tracing::debug!(dir = %service_id, "skipping non-service directory");
            continue;
        }

        for endpoint in sorted_entries(service.path())? {
            let path = endpoint.path();
            if !endpoint.file_type().is_file() || !has_extension(path, &config.extension) {
                continue;
            }
            let endpoint_id = file_stem(path);
            let declaration = read_json(path).map_err(|e| CompileError::InvalidEndpoint {
                command_id: format!("{service_id}/{endpoint_id}"),
                reason: e.to_string(),
            })?;

            tracing::debug!(service = %service_id, endpoint = %endpoint_id, "loaded endpoint declaration");
            sources.push(EndpointSource {
                service_id: service_id.clone(),
                endpoint_id,
                path: Some(path.to_path_buf()),
                declaration,
            });
        }
    }

    Ok(sources)
}

/// Load every definition module in `dir`. A missing directory means no definitions.
pub fn load_definition_sources(dir: &Path, config: &LoadConfig) -> Result<Vec<DefinitionSource>> {
    if !dir.exists() {
        tracing::debug!(dir = %dir.display(), "no definitions directory");
        return Ok(Vec::new());
    }

    let mut sources = Vec::new();
    for entry in sorted_entries(dir)? {
        let path = entry.path();
        if !entry.file_type().is_file() || !has_extension(path, &config.extension) {
            continue;
        }
        let exports = read_json(path)?;
        sources.push(DefinitionSource {
            name: file_stem(path),
            path: Some(path.to_path_buf()),
            exports,
        });
    }
    Ok(sources)
}

fn sorted_entries(dir: &Path) -> Result<Vec<walkdir::DirEntry>> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .map(|entry| entry.map_err(CompileError::from))
        .collect()
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension().map(|e| e == extension).unwrap_or(false)
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn read_json(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
