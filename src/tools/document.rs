//! Document Creation Tool
//!
//! Information Hiding:
//! - Target path resolution and extension policy hidden
//! - Containment check against allowed roots hidden
//! - Write-then-rename strategy hidden from callers

use super::definition::ToolDefinition;
use super::{Parameters, Tool};
use crate::error::ToolError;
use crate::{optional_str, required_str};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::fs;

pub const TOOL_ID: &str = "create_document";

const DEFAULT_EXTENSION: &str = ".md";

/// Creates a text document under one of the permission-declared roots
pub struct CreateDocumentTool {
    definition: ToolDefinition,
}

impl CreateDocumentTool {
    pub fn new(definition: ToolDefinition) -> Self {
        Self { definition }
    }

    fn allowed_roots(&self) -> Vec<PathBuf> {
        self.definition
            .permissions
            .allowed_paths
            .iter()
            .map(|p| expand_home(p))
            .collect()
    }

    /// Resolve and check the target path; nothing is touched on disk
    fn resolve_target(
        &self,
        filename: &str,
        folder: Option<&str>,
        extension: Option<&str>,
    ) -> Result<PathBuf, ToolError> {
        let roots = self.allowed_roots();
        let base = roots.first().ok_or_else(|| {
            ToolError::PathNotAllowed(PathBuf::from(filename))
        })?;

        let mut target = base.clone();
        if let Some(folder) = folder {
            target.push(folder);
        }
        target.push(file_name_with_extension(filename, extension));
        let target = normalize_lexically(&target);

        if !is_within_roots(&target, &roots) {
            tracing::warn!("Rejected document path outside allowed roots: {}", target.display());
            return Err(ToolError::PathNotAllowed(target));
        }

        Ok(target)
    }
}

#[async_trait]
impl Tool for CreateDocumentTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(&self, params: &Parameters) -> Result<Value, ToolError> {
        let filename = required_str!(params, "filename").trim();
        let content = required_str!(params, "content");
        let folder = optional_str!(params, "folder");
        let extension = optional_str!(params, "extension");

        if filename.is_empty() {
            return Err(ToolError::InvalidParameters(
                "Parameter filename cannot be empty".to_string(),
            ));
        }

        let target = self.resolve_target(filename, folder, extension)?;

        let size = content.len() as u64;
        let max = self.definition.permissions.max_file_size;
        if size > max {
            return Err(ToolError::ContentTooLarge { size, max });
        }

        let parent = target
            .parent()
            .ok_or_else(|| ToolError::PathNotAllowed(target.clone()))?;
        fs::create_dir_all(parent)
            .await
            .map_err(|e| failed(format!("could not create directory: {}", e)))?;

        // a symlink may have appeared between resolution and creation
        if !is_within_roots(&target, &self.allowed_roots()) {
            return Err(ToolError::PathNotAllowed(target));
        }

        tracing::info!("Creating document: {}", target.display());
        write_atomically(&target, content.as_bytes()).await?;

        let name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(json!({
            "file_path": target.to_string_lossy(),
            "file_size": size,
            "created_at": Utc::now().to_rfc3339(),
            "message": format!("created {} at {}", name, target.display()),
        }))
    }
}

/// Explicit extension wins, then the filename's own suffix, then `.md`
fn file_name_with_extension(filename: &str, extension: Option<&str>) -> String {
    let path = Path::new(filename);
    match extension {
        Some(ext) => {
            let ext = if ext.starts_with('.') {
                ext.to_string()
            } else {
                format!(".{}", ext)
            };
            let stem = match path.extension() {
                Some(_) => filename
                    .rsplit_once('.')
                    .map(|(stem, _)| stem)
                    .unwrap_or(filename),
                None => filename,
            };
            format!("{}{}", stem, ext)
        }
        None if path.extension().is_some() => filename.to_string(),
        None => format!("{}{}", filename, DEFAULT_EXTENSION),
    }
}

fn expand_home(path: &str) -> PathBuf {
    let home = dirs::home_dir();
    match (path, home) {
        ("~", Some(home)) => home,
        (p, Some(home)) if p.starts_with("~/") => home.join(&p[2..]),
        (p, _) => PathBuf::from(p),
    }
}

/// Resolve `.` and `..` without touching the filesystem
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Canonicalize the deepest existing ancestor and re-append the rest
fn canonicalize_existing(path: &Path) -> std::io::Result<PathBuf> {
    let mut existing = path;
    let mut tail = Vec::new();
    loop {
        match existing.canonicalize() {
            Ok(mut resolved) => {
                for part in tail.iter().rev() {
                    resolved.push(part);
                }
                return Ok(resolved);
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                let (Some(name), Some(parent)) = (existing.file_name(), existing.parent()) else {
                    return Err(e);
                };
                tail.push(name.to_os_string());
                existing = parent;
            }
            Err(e) => return Err(e),
        }
    }
}

/// True when `target` is a strict descendant of one of the roots
fn is_within_roots(target: &Path, roots: &[PathBuf]) -> bool {
    let Ok(resolved) = canonicalize_existing(target) else {
        return false;
    };
    roots
        .iter()
        .filter_map(|root| root.canonicalize().ok())
        .any(|root| resolved != root && resolved.starts_with(&root))
}

/// Stage then rename on a blocking task.
///
/// The task runs to completion even if the caller is cancelled by the
/// dispatch deadline, so a staging file is always renamed or removed.
async fn write_atomically(target: &Path, bytes: &[u8]) -> Result<(), ToolError> {
    let target = target.to_path_buf();
    let bytes = bytes.to_vec();
    tokio::task::spawn_blocking(move || stage_and_rename(&target, &bytes))
        .await
        .map_err(|e| failed(format!("write task failed: {}", e)))?
}

fn stage_and_rename(target: &Path, bytes: &[u8]) -> Result<(), ToolError> {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let staging = target.with_file_name(format!(".{}.{}.tmp", name, uuid::Uuid::new_v4()));

    if let Err(e) = std::fs::write(&staging, bytes) {
        let _ = std::fs::remove_file(&staging);
        return Err(failed(format!("could not write file: {}", e)));
    }
    if let Err(e) = std::fs::rename(&staging, target) {
        let _ = std::fs::remove_file(&staging);
        return Err(failed(format!("could not move file into place: {}", e)));
    }
    Ok(())
}

fn failed(reason: String) -> ToolError {
    ToolError::ExecutionError(format!("Failed to create document: {}", reason))
}
