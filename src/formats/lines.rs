//! The text record format: one record per line, `key<TAB>value`, newline-terminated.
//!
//! This is the only format persisted between jobs. Reading a line splits it at the first tab;
//! a line without a tab is a record with an empty value. Text input to a map phase is read as
//! plain lines instead (see `PosRecordIterator`), so mappers see the whole line as the value.

use std::fs;
use std::io::{self, BufRead, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::formats::util::{RecordSink, SinkGenerator};
use crate::record_types::Record;

type LinesIterator = Box<dyn Iterator<Item = io::Result<String>> + Send>;

/// Reads lines from a sequence of files, in the order given. A file that does not end in a
/// newline still ends its last line.
pub struct LinesReader {
    src: LinesIterator,
    error: Option<io::Error>,
}

impl LinesReader {
    /// Returns a LinesReader reading from the given files. All files are opened up front so
    /// that a missing file is reported before any line is consumed.
    pub fn new_from_files<P: AsRef<Path>>(paths: &[P]) -> io::Result<LinesReader> {
        let mut files = Vec::with_capacity(paths.len());
        for p in paths {
            files.push(fs::File::open(p.as_ref())?);
        }
        let it = files
            .into_iter()
            .flat_map(|f| io::BufReader::new(f).lines());
        Ok(LinesReader {
            src: Box::new(it),
            error: None,
        })
    }

    /// The error that stopped iteration, if any.
    pub fn take_error(&mut self) -> Option<io::Error> {
        self.error.take()
    }
}

/// Iterate over the lines from a LinesReader. Iteration ends at the first read error, which
/// can be retrieved with take_error().
impl Iterator for LinesReader {
    type Item = String;
    fn next(&mut self) -> Option<Self::Item> {
        if self.error.is_some() {
            return None;
        }
        match self.src.next()? {
            Ok(s) => Some(s),
            Err(e) => {
                self.error = Some(e);
                None
            }
        }
    }
}

/// Splits a text line into a record at the first tab.
pub fn parse_record(line: &str) -> Record {
    match line.split_once('\t') {
        Some((k, v)) => Record::new(k, v),
        None => Record::new(line, ""),
    }
}

/// Parses a whole text blob into records; empty lines are skipped.
pub fn parse_records(text: &str) -> Vec<Record> {
    text.lines()
        .filter(|l| !l.is_empty())
        .map(parse_record)
        .collect()
}

fn check_field(what: &str, field: &str, forbidden: &[char]) -> io::Result<()> {
    if field.contains(forbidden) {
        Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("{} {:?} contains a tab or newline", what, field),
        ))
    } else {
        Ok(())
    }
}

/// Renders a record as one text line, including the newline. Keys and values must not contain
/// tabs or newlines.
pub fn format_record(r: &Record) -> io::Result<String> {
    check_field("key", &r.key, &['\t', '\n', '\r'])?;
    check_field("value", &r.value, &['\t', '\n', '\r'])?;
    Ok(format!("{}\t{}\n", r.key, r.value))
}

/// Writes records as text lines.
pub struct LinesWriter<W: Write> {
    file: W,
    records: u64,
}

impl LinesWriter<BufWriter<fs::File>> {
    pub fn new_to_file(path: &Path) -> io::Result<LinesWriter<BufWriter<fs::File>>> {
        let f = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Ok(LinesWriter::new_to_write(BufWriter::new(f)))
    }
}

impl<W: Write> LinesWriter<W> {
    pub fn new_to_write(w: W) -> LinesWriter<W> {
        LinesWriter { file: w, records: 0 }
    }

    pub fn records_written(&self) -> u64 {
        self.records
    }

    pub fn into_inner(self) -> W {
        self.file
    }
}

impl<W: Write> RecordSink for LinesWriter<W> {
    fn write_record(&mut self, r: &Record) -> io::Result<()> {
        let line = format_record(r)?;
        self.file.write_all(line.as_bytes())?;
        self.records += 1;
        Ok(())
    }

    fn finish(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// A SinkGenerator that creates text files inside one directory.
#[derive(Clone, Debug)]
pub struct LinesSinkGenerator {
    dir: PathBuf,
}

impl LinesSinkGenerator {
    /// Outputs are created as `dir/<name>`; the directory must exist.
    pub fn new_to_dir(dir: impl Into<PathBuf>) -> LinesSinkGenerator {
        LinesSinkGenerator { dir: dir.into() }
    }
}

impl SinkGenerator for LinesSinkGenerator {
    type Sink = LinesWriter<BufWriter<fs::File>>;

    fn new_output(&self, name: &str) -> io::Result<Self::Sink> {
        LinesWriter::new_to_file(&self.dir.join(name))
    }
}
