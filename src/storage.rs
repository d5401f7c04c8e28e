//! File access used by job drivers and iterative programs: resolving input specs, reading job
//! output back as text, and writing seed records.
//!
//! Paths are strings because they may be glob patterns (`frontier0003/part*`). Relative paths are
//! taken relative to the storage root.

use std::collections::VecDeque;
use std::fs;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use crate::error::{DriverError, MrError, Result};
use crate::formats::lines::{format_record, LinesReader};
use crate::record_types::Record;

/// Restricts how many lines read() returns.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReadLimit {
    pub first: Option<usize>,
    pub last: Option<usize>,
}

impl ReadLimit {
    pub fn all() -> ReadLimit {
        ReadLimit::default()
    }

    pub fn first(n: usize) -> ReadLimit {
        ReadLimit {
            first: Some(n),
            last: None,
        }
    }

    pub fn last(n: usize) -> ReadLimit {
        ReadLimit {
            first: None,
            last: Some(n),
        }
    }
}

pub trait Storage: Send + Sync {
    /// Expands one path spec into the files it names, sorted by path. A directory stands for the
    /// files directly inside it, except hidden ones.
    fn resolve(&self, spec: &str) -> Result<Vec<PathBuf>>;

    fn exists(&self, path: &str) -> bool;

    /// Concatenates the lines of all files the specs resolve to, in order, applying `limit`
    /// (first, then last). Every returned line ends in a newline.
    fn read(&self, specs: &[&str], limit: ReadLimit) -> Result<String>;

    /// Replaces the file at `path` with `content`, creating parent directories.
    fn write_text(&self, path: &str, content: &str) -> Result<()>;

    /// Replaces the file at `path` with records in text record format.
    fn write_records(&self, path: &str, records: &[Record]) -> Result<()>;

    /// Removes a file or directory tree. Removing something that does not exist is not an
    /// error.
    fn remove(&self, path: &str) -> Result<()>;

    /// Filesystem location of a path spec.
    fn locate(&self, path: &str) -> PathBuf;

    /// Expands several specs; the result keeps spec order and drops duplicates.
    fn resolve_all(&self, specs: &[String]) -> Result<Vec<PathBuf>> {
        let mut out: Vec<PathBuf> = Vec::new();
        for s in specs {
            for p in self.resolve(s)? {
                if !out.contains(&p) {
                    out.push(p);
                }
            }
        }
        Ok(out)
    }
}

/// Storage on the local filesystem.
#[derive(Clone, Debug)]
pub struct LocalStorage {
    root: PathBuf,
}

fn is_hidden(p: &Path) -> bool {
    p.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.') || n.starts_with('_'))
        .unwrap_or(false)
}

fn files_in(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let p = entry?.path();
        if p.is_file() && !is_hidden(&p) {
            files.push(p);
        }
    }
    files.sort();
    Ok(files)
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> LocalStorage {
        LocalStorage { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Opens the resolved files as one stream of lines.
    pub fn open_lines(&self, files: &[PathBuf]) -> Result<LinesReader> {
        Ok(LinesReader::new_from_files(files)?)
    }

    fn create(&self, path: &str) -> Result<fs::File> {
        let p = self.locate(path);
        if let Some(parent) = p.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(fs::File::create(p)?)
    }
}

impl Storage for LocalStorage {
    fn resolve(&self, spec: &str) -> Result<Vec<PathBuf>> {
        let full = self.locate(spec);
        let pattern = full.to_string_lossy().into_owned();
        let matches = glob::glob(&pattern).map_err(|e| DriverError::InvalidPattern {
            pattern: spec.to_string(),
            reason: e.msg.to_string(),
        })?;

        let mut files = Vec::new();
        for m in matches {
            let p = m.map_err(|e| MrError::Io(e.into_error()))?;
            if p.is_dir() {
                files.extend(files_in(&p)?);
            } else if p.is_file() {
                files.push(p);
            }
        }
        files.sort();
        files.dedup();
        Ok(files)
    }

    fn exists(&self, path: &str) -> bool {
        self.locate(path).exists()
    }

    fn read(&self, specs: &[&str], limit: ReadLimit) -> Result<String> {
        let mut files = Vec::new();
        for s in specs {
            files.extend(self.resolve(s)?);
        }

        let first = limit.first.unwrap_or(usize::MAX);
        let mut kept = VecDeque::new();
        let mut seen = 0;
        'files: for f in files {
            for line in BufReader::new(fs::File::open(&f)?).lines() {
                if seen == first {
                    break 'files;
                }
                seen += 1;
                kept.push_back(line?);
                if let Some(last) = limit.last {
                    if kept.len() > last {
                        kept.pop_front();
                    }
                }
            }
        }

        let mut out = String::new();
        for l in kept {
            out.push_str(&l);
            out.push('\n');
        }
        Ok(out)
    }

    fn write_text(&self, path: &str, content: &str) -> Result<()> {
        let mut f = self.create(path)?;
        f.write_all(content.as_bytes())?;
        Ok(())
    }

    fn write_records(&self, path: &str, records: &[Record]) -> Result<()> {
        let mut text = String::new();
        for r in records {
            text.push_str(&format_record(r)?);
        }
        self.write_text(path, &text)
    }

    fn remove(&self, path: &str) -> Result<()> {
        let p = self.locate(path);
        let r = if p.is_dir() {
            fs::remove_dir_all(&p)
        } else {
            fs::remove_file(&p)
        };
        match r {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    fn locate(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }
}
