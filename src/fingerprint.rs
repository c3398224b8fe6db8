//! Content fingerprints used to key the result cache
//!
//! An agent is fingerprinted over every file in its directory, each one
//! streamed through SHA-256 and recorded with its relative path; a task
//! definition is fingerprinted over its canonical JSON form so that key
//! order never matters but every field does.

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::Path;

const READ_BLOCK: usize = 4096;

/// Directory entries that never affect behaviour: interpreter caches and dotfiles
fn is_ignored(name: &str) -> bool {
    name.starts_with('.') || name == "__pycache__"
}

/// Compute the SHA-256 hex digest of a file, reading it in fixed-size blocks
pub fn hash_file(path: &Path) -> Result<String> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open file for hashing: {}", path.display()))?;
    hash_reader(file).with_context(|| format!("Failed to read file: {}", path.display()))
}

/// Compute the SHA-256 hex digest of everything `reader` yields
pub fn hash_reader<R: Read>(mut reader: R) -> io::Result<String> {
    let mut hasher = Sha256::new();
    let mut block = [0u8; READ_BLOCK];

    loop {
        let read = match reader.read(&mut block) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&block[..read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Compute one digest over every file below `root`
///
/// Files are visited in sorted order and each contributes a
/// `<relative path>\0<file digest>\n` record, with `/` as the separator on
/// every platform. Renaming, adding or removing a file changes the digest
/// just like editing one does.
pub fn hash_tree(root: &Path) -> Result<String> {
    let mut files = Vec::new();
    collect_files(root, "", &mut files)?;
    files.sort();

    let mut hasher = Sha256::new();
    for relative in &files {
        let digest = hash_file(&root.join(relative))?;
        hasher.update(relative.as_bytes());
        hasher.update([0u8]);
        hasher.update(digest.as_bytes());
        hasher.update(b"\n");
    }

    Ok(hex::encode(hasher.finalize()))
}

fn collect_files(dir: &Path, prefix: &str, files: &mut Vec<String>) -> Result<()> {
    let entries =
        fs::read_dir(dir).with_context(|| format!("Failed to list directory: {}", dir.display()))?;

    for entry in entries {
        let entry = entry.with_context(|| format!("Failed to list directory: {}", dir.display()))?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            anyhow::bail!("Non UTF-8 file name in {}", dir.display());
        };
        if is_ignored(name) {
            continue;
        }

        let relative = if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", prefix, name)
        };
        // Follows symlinks so a linked script is hashed by content
        let path = entry.path();
        let metadata = fs::metadata(&path)
            .with_context(|| format!("Failed to stat {}", path.display()))?;
        if metadata.is_dir() {
            collect_files(&path, &relative, files)?;
        } else if metadata.is_file() {
            files.push(relative);
        }
    }

    Ok(())
}

/// Compute the digest of a serializable definition over its canonical JSON form
pub fn hash_definition<T: Serialize>(definition: &T) -> Result<String> {
    let value = serde_json::to_value(definition).context("Failed to serialize definition")?;
    let canonical = serde_json::to_string(&canonicalize(value))
        .context("Failed to encode canonical definition")?;

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Rebuild a JSON value with every object's keys in sorted order
pub fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));

            let mut sorted = Map::new();
            for (key, nested) in entries {
                sorted.insert(key, canonicalize(nested));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}
