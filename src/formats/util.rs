//! Various iterators/adapters used for input/output formats.

use std::cell::RefCell;
use std::fmt;
use std::io;
use std::rc::Rc;
use std::str::FromStr;

use crate::formats::writelog::WriteLogReader;
use crate::record_types::Record;

/// Input/output format tag of a job. There is no binary container format; `Auto` is framed
/// exactly like `Text`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Format {
    Text,
    #[default]
    Auto,
}

impl FromStr for Format {
    type Err = String;
    fn from_str(s: &str) -> Result<Format, String> {
        match s {
            "text" => Ok(Format::Text),
            "auto" => Ok(Format::Auto),
            other => Err(format!("unknown format {:?} (expected text or auto)", other)),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::Text => f.write_str("text"),
            Format::Auto => f.write_str("auto"),
        }
    }
}

/// Transforms an iterator<string> into an iterator<Record>. It yields
/// records with the key being the position of the current record, starting with
/// 0. Used as input iterator in the mapping phase, from sources that only
/// yield values (no keys).
pub struct PosRecordIterator<I: Iterator<Item = String>> {
    i: I,
    counter: u64,
}

impl<I: Iterator<Item = String>> PosRecordIterator<I> {
    pub fn new(it: I) -> PosRecordIterator<I> {
        PosRecordIterator { i: it, counter: 0 }
    }
}

impl<I: Iterator<Item = String>> Iterator for PosRecordIterator<I> {
    type Item = Record;
    fn next(&mut self) -> Option<Record> {
        let val = self.i.next()?;
        let key = self.counter.to_string();
        self.counter += 1;
        Some(Record { key, value: val })
    }
}

/// Shared place for the first error hit by one of several readers that have been moved into a
/// merge tree. The reduce task checks it after every group.
pub type ErrorSlot = Rc<RefCell<Option<io::Error>>>;

pub fn new_error_slot() -> ErrorSlot {
    Rc::new(RefCell::new(None))
}

/// Yields the records of a spill run. Stops at the first error and parks it in the error slot.
pub struct RecordReadIterator<R: io::Read> {
    src: WriteLogReader<R>,
    errors: ErrorSlot,
    done: bool,
}

impl<R: io::Read> RecordReadIterator<R> {
    pub fn new(src: WriteLogReader<R>, errors: ErrorSlot) -> RecordReadIterator<R> {
        RecordReadIterator {
            src,
            errors,
            done: false,
        }
    }
}

impl<R: io::Read> Iterator for RecordReadIterator<R> {
    type Item = Record;
    fn next(&mut self) -> Option<Record> {
        if self.done {
            return None;
        }
        match self.src.read_record() {
            Ok(Some(r)) => Some(r),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                self.errors.borrow_mut().get_or_insert(e);
                None
            }
        }
    }
}

/// A type implementing SinkGenerator is used at the end of the reducer
/// phase to write the output. Given a name, new_output() should return a new object
/// that can be used to write the output of a reduce partition.
pub trait SinkGenerator: Send + Sync {
    type Sink: RecordSink;

    /// Return a new file handle for `name`.
    fn new_output(&self, name: &str) -> io::Result<Self::Sink>;
}

/// Something records can be written to, one after another.
pub trait RecordSink {
    fn write_record(&mut self, r: &Record) -> io::Result<()>;
    fn finish(&mut self) -> io::Result<()>;
}
