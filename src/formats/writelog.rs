//! Length-prefixed byte string streams, used for the sorted runs that map tasks spill to disk.
//!
//! # WriteLog
//!
//! A WriteLog is a sequence of byte strings, each prefixed by its length as a 4 byte big-endian
//! integer:
//!
//! ```text
//! llllbbbbbbllllbbllllbbbbbbbbb...
//! ```
//!
//! Where l is a length byte and b are bytes of a bytestring. A record is stored as two
//! consecutive entries, key first. Unlike the text record format, keys and values may contain
//! any byte, so intermediate data never needs escaping.

use std::fs;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::record_types::Record;

fn encode_u32(val: u32) -> [u8; 4] {
    val.to_be_bytes()
}

fn decode_u32(buf: [u8; 4]) -> u32 {
    u32::from_be_bytes(buf)
}

pub struct WriteLogWriter<W: Write> {
    dest: W,

    current_length: u64,
    records_written: u64,
}

impl<W: Write> WriteLogWriter<W> {
    /// Return a new WriteLog that writes to dest
    pub fn new(dest: W) -> WriteLogWriter<W> {
        WriteLogWriter {
            dest,
            current_length: 0,
            records_written: 0,
        }
    }

    /// Appends one length-prefixed entry.
    pub fn write_entry(&mut self, buf: &[u8]) -> io::Result<()> {
        let len = u32::try_from(buf.len()).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidInput, "entry larger than 4 GiB")
        })?;
        self.dest.write_all(&encode_u32(len))?;
        self.dest.write_all(buf)?;
        self.current_length += 4 + buf.len() as u64;
        Ok(())
    }

    /// Appends a record as two entries (key, value).
    pub fn write_record(&mut self, r: &Record) -> io::Result<()> {
        self.write_entry(r.key.as_bytes())?;
        self.write_entry(r.value.as_bytes())?;
        self.records_written += 1;
        Ok(())
    }

    /// Return how many (bytes,records) have been written.
    pub fn get_stats(&self) -> (u64, u64) {
        (self.current_length, self.records_written)
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.dest.flush()
    }

    pub fn into_inner(self) -> W {
        self.dest
    }
}

impl WriteLogWriter<BufWriter<fs::File>> {
    /// Opens a WriteLog file for writing, truncating it.
    pub fn new_to_file(path: &Path) -> io::Result<WriteLogWriter<BufWriter<fs::File>>> {
        let f = fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        Ok(WriteLogWriter::new(BufWriter::new(f)))
    }
}

/// A Reader for WriteLog files. (more information on WriteLog files is to
/// be found in the module description).
pub struct WriteLogReader<R: Read> {
    src: R,
    entries_read: u64,
    bytes_read: u64,
}

impl<R: Read> WriteLogReader<R> {
    pub fn new(src: R) -> WriteLogReader<R> {
        WriteLogReader {
            src,
            entries_read: 0,
            bytes_read: 0,
        }
    }

    pub fn get_stats(&self) -> (u64, u64) {
        (self.entries_read, self.bytes_read)
    }

    /// Reads the next entry. Returns Ok(None) at a clean end of the stream; a stream that ends
    /// inside an entry is an error.
    pub fn read_entry(&mut self) -> io::Result<Option<Vec<u8>>> {
        let mut lengthbuf = [0u8; 4];
        let mut filled = 0;
        while filled < 4 {
            match self.src.read(&mut lengthbuf[filled..]) {
                Ok(0) if filled == 0 => return Ok(None),
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "truncated length prefix",
                    ))
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }

        let length = decode_u32(lengthbuf) as usize;
        let mut buffer = vec![0u8; length];
        self.src.read_exact(&mut buffer)?;

        self.entries_read += 1;
        self.bytes_read += 4 + length as u64;
        Ok(Some(buffer))
    }

    /// Reads the next record (two entries).
    pub fn read_record(&mut self) -> io::Result<Option<Record>> {
        let key = match self.read_entry()? {
            None => return Ok(None),
            Some(k) => k,
        };
        let value = self.read_entry()?.ok_or_else(|| {
            io::Error::new(io::ErrorKind::UnexpectedEof, "record without value")
        })?;
        let to_string = |b: Vec<u8>| {
            String::from_utf8(b).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
        };
        Ok(Some(Record {
            key: to_string(key)?,
            value: to_string(value)?,
        }))
    }
}

impl WriteLogReader<BufReader<fs::File>> {
    pub fn new_from_file(path: &Path) -> io::Result<WriteLogReader<BufReader<fs::File>>> {
        let f = fs::OpenOptions::new().read(true).open(path)?;
        Ok(WriteLogReader::new(BufReader::new(f)))
    }
}
