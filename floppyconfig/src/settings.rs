//! Raw access to the settings file, one subtree at a time.
//!
//! The settings file holds three independent records: configuration,
//! tag mappings and runtime state. Each writer rewrites only the subtree it
//! owns. The file is re-read while holding both a process-wide mutex and an
//! exclusive lock on `<settings>.lock`, so the running service and a
//! `floppyfy tags` command never lose each other's updates. A device cache
//! update therefore never reverts a tag edit made in the meantime.
//!
//! Only the text of the top-level section being written is regenerated;
//! comments and layout elsewhere in the file are kept as the operator left
//! them.

use anyhow::{anyhow, bail, Context, Result};
use fs2::FileExt;
use serde_yaml::{Mapping, Value};
use std::{
    fs::{self, File, OpenOptions},
    path::{Path, PathBuf},
    sync::Mutex,
};
use tracing::debug;

use crate::DEFAULT_CONFIG;

static WRITE_LOCK: Mutex<()> = Mutex::new(());

/// Handle on the YAML settings file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsFile {
    path: PathBuf,
}

impl SettingsFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory holding the settings file, used to resolve relative paths.
    pub fn dir(&self) -> PathBuf {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Writes the embedded default settings. Refuses to overwrite an existing file.
    pub fn create_default(&self) -> Result<()> {
        if self.path.exists() {
            bail!("Settings file {} already exists", self.path.display());
        }
        fs::create_dir_all(self.dir())
            .with_context(|| format!("Cannot create directory {}", self.dir().display()))?;
        floppyutils::write_atomic(&self.path, DEFAULT_CONFIG.as_bytes())
            .with_context(|| format!("Cannot write settings file {}", self.path.display()))?;
        Ok(())
    }

    /// Reads and parses the whole document. An empty file is an empty mapping.
    pub fn read_document(&self) -> Result<Value> {
        let text = self.read_text()?;
        self.parse(&text)
    }

    fn read_text(&self) -> Result<String> {
        fs::read_to_string(&self.path)
            .with_context(|| format!("Cannot read settings file {}", self.path.display()))
    }

    fn parse(&self, text: &str) -> Result<Value> {
        let value: Value = serde_yaml::from_str(text)
            .with_context(|| format!("Invalid YAML in {}", self.path.display()))?;
        Ok(match value {
            Value::Null => Value::Mapping(Mapping::new()),
            other => other,
        })
    }

    /// Returns the subtree at `path`, or `None` if any key along it is missing.
    pub fn read_path(&self, path: &[&str]) -> Result<Option<Value>> {
        let document = self.read_document()?;
        Ok(lookup(&document, path).cloned())
    }

    /// Replaces the subtree at `path`, creating intermediate mappings.
    pub fn write_path(&self, path: &[&str], value: Value) -> Result<()> {
        self.update(path, |document| {
            set_path(document, path, value)?;
            Ok(true)
        })
    }

    /// Removes the subtree at `path`. Returns `false` if it did not exist.
    pub fn remove_path(&self, path: &[&str]) -> Result<bool> {
        let mut removed = false;
        self.update(path, |document| {
            removed = remove_at(document, path);
            Ok(removed)
        })?;
        Ok(removed)
    }

    fn update<F>(&self, path: &[&str], f: F) -> Result<()>
    where
        F: FnOnce(&mut Value) -> Result<bool>,
    {
        let _guard = WRITE_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let _file_lock = self.lock_exclusive()?;

        let text = self.read_text()?;
        let mut document = self.parse(&text)?;
        if !f(&mut document)? {
            return Ok(());
        }

        let spliced = path
            .first()
            .and_then(|section| splice_section(&text, section, &document));
        let yaml = match spliced {
            Some(yaml) => yaml,
            None => {
                debug!(settings=%self.path.display(), "Rewriting the whole settings file");
                serde_yaml::to_string(&document)?
            }
        };
        floppyutils::write_atomic(&self.path, yaml.as_bytes())
            .with_context(|| format!("Cannot write settings file {}", self.path.display()))?;
        debug!(settings=%self.path.display(), "Settings file updated");
        Ok(())
    }

    /// Sidecar locked by writers; the settings file itself is replaced by a
    /// rename and cannot carry the lock.
    fn lock_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(".lock");
        self.path.with_file_name(name)
    }

    /// Blocks until no other process is writing. Released when the file drops.
    fn lock_exclusive(&self) -> Result<File> {
        let lock_path = self.lock_path();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .with_context(|| format!("Cannot open lock file {}", lock_path.display()))?;
        FileExt::lock_exclusive(&file)
            .with_context(|| format!("Cannot lock {}", lock_path.display()))?;
        Ok(file)
    }
}

/// Replaces the text of the top-level block `section` in `text`.
///
/// Everything outside the block is kept byte for byte, including the
/// column-0 comments just above the next section. Returns `None` when the
/// result does not parse back to `document`; the caller then rewrites the
/// whole file.
fn splice_section(text: &str, section: &str, document: &Value) -> Option<String> {
    let rendered = match lookup(document, &[section]) {
        Some(value) => {
            let mut block = Mapping::new();
            block.insert(Value::String(section.to_string()), value.clone());
            serde_yaml::to_string(&Value::Mapping(block)).ok()?
        }
        None => String::new(),
    };

    let lines: Vec<&str> = text.split_inclusive('\n').collect();
    let start = lines
        .iter()
        .position(|line| top_level_key(line).as_deref() == Some(section));

    let mut spliced = String::with_capacity(text.len() + rendered.len());
    match start {
        Some(start) => {
            let next = lines[start + 1..]
                .iter()
                .position(|line| starts_block(line))
                .map_or(lines.len(), |offset| start + 1 + offset);
            let mut end = next;
            while end > start + 1 && is_trivia(lines[end - 1]) {
                end -= 1;
            }
            lines[..start].iter().for_each(|line| spliced.push_str(line));
            spliced.push_str(&rendered);
            lines[end..].iter().for_each(|line| spliced.push_str(line));
        }
        None => {
            spliced.push_str(text);
            if !text.is_empty() && !text.ends_with('\n') {
                spliced.push('\n');
            }
            spliced.push_str(&rendered);
        }
    }

    let reparsed = match serde_yaml::from_str::<Value>(&spliced).ok()? {
        Value::Null => Value::Mapping(Mapping::new()),
        other => other,
    };
    (reparsed == *document).then_some(spliced)
}

/// A line at column 0 that opens a new top-level node.
fn starts_block(line: &str) -> bool {
    match line.chars().next() {
        Some(c) => !c.is_whitespace() && c != '#' && c != '-',
        None => false,
    }
}

/// Blank lines and column-0 comments.
fn is_trivia(line: &str) -> bool {
    line.trim().is_empty() || line.starts_with('#')
}

fn top_level_key(line: &str) -> Option<String> {
    if !starts_block(line) {
        return None;
    }
    match serde_yaml::from_str::<Value>(line.trim_end()).ok()? {
        Value::Mapping(map) if map.len() == 1 => match map.keys().next()? {
            Value::String(key) => Some(key.clone()),
            _ => None,
        },
        _ => None,
    }
}

pub(crate) fn lookup<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut current = value;
    for key in path {
        match current {
            Value::Mapping(map) => current = map.get(&Value::String((*key).to_string()))?,
            _ => return None,
        }
    }
    Some(current)
}

pub(crate) fn set_path(data: &mut Value, path: &[&str], value: Value) -> Result<()> {
    if path.is_empty() {
        *data = value;
        return Ok(());
    }
    if data.is_null() {
        *data = Value::Mapping(Mapping::new());
    }
    match data {
        Value::Mapping(map) => {
            let key = Value::String(path[0].to_string());
            if path.len() == 1 {
                map.insert(key, value);
                Ok(())
            } else {
                let entry = map.entry(key).or_insert(Value::Mapping(Mapping::new()));
                set_path(entry, &path[1..], value)
            }
        }
        _ => Err(anyhow!("Settings node above {} is not a mapping", path.join("."))),
    }
}

fn remove_at(data: &mut Value, path: &[&str]) -> bool {
    match path {
        [] => false,
        [last] => match data {
            Value::Mapping(map) => map.remove(&Value::String((*last).to_string())).is_some(),
            _ => false,
        },
        [first, rest @ ..] => match data {
            Value::Mapping(map) => match map.get_mut(&Value::String((*first).to_string())) {
                Some(child) => remove_at(child, rest),
                None => false,
            },
            _ => false,
        },
    }
}
