//! `KEY=VALUE` override file rewriting.

use std::fs;
use std::io;
use std::path::Path;

use lt_types::{TrialError, TuneResult};

/// Split a `key=value` line at the first `=`. Lines without `=` yield `None`.
pub fn parse_line(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once('=')?;
    Some((key.trim(), value.trim()))
}

/// Upserts keys into the override file read by the trainer.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigPatcher;

impl ConfigPatcher {
    /// Overwrite existing keys in place, append new ones and rewrite the whole
    /// file. Creates the file (and its directory) when absent. Lines without
    /// `=` are dropped. The rewrite is not atomic.
    pub fn apply<P: AsRef<Path>>(path: P, changes: &[(String, String)]) -> TuneResult<()> {
        let path = path.as_ref();
        let patch_err = |e: io::Error| TrialError::Patch {
            path: path.display().to_string(),
            message: e.to_string(),
        };

        ensure_file(path).map_err(patch_err)?;
        let mut entries = Self::read_entries(path).map_err(patch_err)?;

        for (key, value) in changes {
            match entries.iter_mut().find(|(k, _)| k == key) {
                Some(entry) => entry.1 = value.clone(),
                None => entries.push((key.clone(), value.clone())),
            }
        }

        let mut content = String::new();
        for (key, value) in &entries {
            content.push_str(key);
            content.push('=');
            content.push_str(value);
            content.push('\n');
        }
        fs::write(path, content).map_err(patch_err)?;

        tracing::debug!("Patched {} key(s) in {}", changes.len(), path.display());
        Ok(())
    }

    /// Parsed `key=value` pairs in first-seen order. A repeated key keeps its
    /// first position and its last value.
    pub fn read_entries<P: AsRef<Path>>(path: P) -> io::Result<Vec<(String, String)>> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let mut entries: Vec<(String, String)> = Vec::new();
        let mut dropped = 0usize;

        for line in content.lines() {
            let Some((key, value)) = parse_line(line) else {
                if !line.trim().is_empty() {
                    dropped += 1;
                }
                continue;
            };
            match entries.iter_mut().find(|(k, _)| k == key) {
                Some(entry) => entry.1 = value.to_string(),
                None => entries.push((key.to_string(), value.to_string())),
            }
        }

        if dropped > 0 {
            tracing::debug!("Dropping {} line(s) without '=' from {}", dropped, path.display());
        }
        Ok(entries)
    }
}

fn ensure_file(path: &Path) -> io::Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            fs::create_dir_all(dir)?;
        }
    }
    if !path.exists() {
        fs::File::create(path)?;
    }
    Ok(())
}
