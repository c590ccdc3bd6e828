//! Persistence collaborator: writes documents and runners into the output
//! directory and reads them back for the downstream phases.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{BridgeError, Result};
use crate::feature::FeatureDocument;
use crate::runner::RunnerStub;

/// Turn a suite or scenario title into a safe file/module component.
pub fn sanitize_component(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut last_was_separator = true;
    for ch in title.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
            last_was_separator = false;
        } else if !last_was_separator {
            out.push('_');
            last_was_separator = true;
        }
    }
    let trimmed = out.trim_end_matches('_');
    if trimmed.is_empty() {
        "untitled".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Write one `.feature` file per synthesized document.
pub fn write_documents(out_dir: &Path, documents: &[FeatureDocument]) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(out_dir).map_err(|err| BridgeError::io(out_dir, err))?;
    let mut written = Vec::with_capacity(documents.len());
    for document in documents {
        let path = out_dir.join(&document.file_name);
        fs::write(&path, document.text.as_bytes())
            .map_err(|err| BridgeError::io(&path, err))?;
        tracing::debug!(path = %path.display(), "wrote feature document");
        written.push(path);
    }
    Ok(written)
}

/// Read persisted feature documents, sorted by file name.
///
/// Fails with an artifact error when the directory or the documents are
/// missing; the runner phase must not silently run against nothing.
pub fn read_documents(out_dir: &Path) -> Result<Vec<(String, String)>> {
    read_by_extension(out_dir, "feature")
}

/// Write one runner stub per document.
pub fn write_runners(out_dir: &Path, runners: &[RunnerStub]) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(out_dir).map_err(|err| BridgeError::io(out_dir, err))?;
    let mut written = Vec::with_capacity(runners.len());
    for runner in runners {
        let path = out_dir.join(&runner.file_name);
        fs::write(&path, runner.text.as_bytes()).map_err(|err| BridgeError::io(&path, err))?;
        tracing::debug!(path = %path.display(), "wrote runner stub");
        written.push(path);
    }
    Ok(written)
}

/// Read persisted runner stubs, sorted by file name.
pub fn read_runners(out_dir: &Path) -> Result<Vec<(String, String)>> {
    read_by_extension(out_dir, "rs")
}

fn read_by_extension(out_dir: &Path, extension: &str) -> Result<Vec<(String, String)>> {
    if !out_dir.is_dir() {
        return Err(BridgeError::ArtifactNotFound(format!(
            "output directory {} does not exist",
            out_dir.display()
        )));
    }
    let entries = fs::read_dir(out_dir).map_err(|err| BridgeError::io(out_dir, err))?;
    let mut paths: Vec<PathBuf> = entries
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == extension))
        .collect();
    paths.sort();
    if paths.is_empty() {
        return Err(BridgeError::ArtifactNotFound(format!(
            "no .{extension} files under {}",
            out_dir.display()
        )));
    }
    let mut loaded = Vec::with_capacity(paths.len());
    for path in paths {
        let text = fs::read_to_string(&path).map_err(|err| BridgeError::io(&path, err))?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        loaded.push((name, text));
    }
    Ok(loaded)
}
