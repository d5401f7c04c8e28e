use std::vec;

use crate::record_types::Record;

/// Holds inputs to one map task in memory.
/// Specialty: Holding large amounts in memory in a way that is both efficient to store and
/// efficient to iterate.
pub struct InputCache {
    chunks_iter: vec::IntoIter<Vec<Record>>,
    chunk_iter: vec::IntoIter<Record>,
    len: usize,
    bytes: usize,
}

impl InputCache {
    /// Takes records from `it` until either it is exhausted or `max_bytes` have been read. The
    /// iterator is borrowed, so the next call continues where this one stopped.
    pub fn from_iter<It: Iterator<Item = Record>>(
        chunk_length: usize,
        max_bytes: usize,
        it: &mut It,
    ) -> Self {
        let chunk_length = chunk_length.max(1);
        let mut chunklist = Vec::new();
        let mut chunk = Vec::with_capacity(chunk_length);

        let mut complete_length: usize = 0;
        let mut bytes_read: usize = 0;

        for v in it {
            complete_length += 1;
            bytes_read += v.size();

            chunk.push(v);

            if chunk.len() >= chunk_length {
                chunklist.push(std::mem::replace(
                    &mut chunk,
                    Vec::with_capacity(chunk_length),
                ));
            }
            if bytes_read >= max_bytes {
                break;
            }
        }

        if !chunk.is_empty() {
            chunklist.push(chunk);
        }

        let mut chunks_iter = chunklist.into_iter();
        let chunk_iter = chunks_iter.next().unwrap_or_default().into_iter();
        InputCache {
            chunks_iter,
            chunk_iter,
            len: complete_length,
            bytes: bytes_read,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn bytes(&self) -> usize {
        self.bytes
    }
}

impl Iterator for InputCache {
    type Item = Record;
    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(v) = self.chunk_iter.next() {
                return Some(v);
            }
            self.chunk_iter = self.chunks_iter.next()?.into_iter();
        }
    }
}
