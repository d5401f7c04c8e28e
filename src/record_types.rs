//! The record types flowing through a job: single (key,value) pairs, key groups handed to
//! reducers, and the emitters used by map() and reduce() to yield results.

use std::fmt;

/// A (key,value) pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    pub key: String,
    pub value: String,
}

impl Record {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Record {
        Record {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Approximate in-memory footprint, used for buffer accounting.
    pub fn size(&self) -> usize {
        self.key.len() + self.value.len()
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}", self.key, self.value)
    }
}

/// A (key,[value]) pair; the input to one reduce() invocation.
///
/// The values are a forward-only sequence read directly from the merged shuffle output. They
/// can be consumed once; a reducer that needs to look at them twice has to collect them first.
/// Values arrive in the order the shuffle received them, not sorted.
pub struct KeyGroup<'a> {
    key: String,
    values: &'a mut dyn Iterator<Item = String>,
}

impl<'a> KeyGroup<'a> {
    pub fn new(key: String, values: &'a mut dyn Iterator<Item = String>) -> KeyGroup<'a> {
        KeyGroup { key, values }
    }

    /// Retrieves the key of the group.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Splits the group into its key and the value sequence.
    pub fn into_parts(self) -> (String, &'a mut dyn Iterator<Item = String>) {
        (self.key, self.values)
    }
}

impl<'a> IntoIterator for KeyGroup<'a> {
    type Item = String;
    type IntoIter = &'a mut dyn Iterator<Item = String>;

    /// Allows iterating over all the values.
    fn into_iter(self) -> Self::IntoIter {
        self.values
    }
}

/// Emitter type used in the mapper phase; used to emit (key,value) pairs.
#[derive(Default)]
pub struct MEmitter {
    r: Vec<Record>,
}

impl MEmitter {
    pub fn new() -> MEmitter {
        MEmitter { r: Vec::new() }
    }

    pub fn emit<K: fmt::Display, V: fmt::Display>(&mut self, key: K, val: V) {
        self.r.push(Record {
            key: key.to_string(),
            value: val.to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.r.len()
    }

    pub fn is_empty(&self) -> bool {
        self.r.is_empty()
    }

    pub fn into_records(self) -> Vec<Record> {
        self.r
    }
}

/// Emitter used in the reducer phase. Records are written out in emission order.
#[derive(Default)]
pub struct REmitter {
    r: Vec<Record>,
}

impl REmitter {
    pub fn new() -> REmitter {
        REmitter { r: Vec::new() }
    }

    pub fn emit<K: fmt::Display, V: fmt::Display>(&mut self, key: K, val: V) {
        self.r.push(Record {
            key: key.to_string(),
            value: val.to_string(),
        })
    }

    pub fn drain(&mut self) -> std::vec::Drain<'_, Record> {
        self.r.drain(..)
    }

    pub fn into_records(self) -> Vec<Record> {
        self.r
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emitters_keep_order() {
        let mut e = MEmitter::new();
        e.emit("b", 1);
        e.emit(3, "x y");
        e.emit("a", 2.5);
        let recs = e.into_records();
        assert_eq!(
            recs,
            vec![
                Record::new("b", "1"),
                Record::new("3", "x y"),
                Record::new("a", "2.5")
            ]
        );

        let mut r = REmitter::new();
        r.emit(0, 1);
        r.emit("z", "");
        let out: Vec<Record> = r.drain().collect();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].to_string(), "0\t1");
        assert!(r.into_records().is_empty());
    }

    #[test]
    fn test_key_group_is_single_pass() {
        let mut vals = vec![String::from("1"), String::from("infos 2")].into_iter();
        let group = KeyGroup::new(String::from("k"), &mut vals);
        assert_eq!(group.key(), "k");
        let collected: Vec<String> = group.into_iter().collect();
        assert_eq!(collected, vec!["1", "infos 2"]);
        assert_eq!(vals.next(), None);
    }
}
