//! User parameters passed unchanged to every map() and reduce() invocation of a job.
//!
//! A parameter has a name and one or more string values. When a task crosses a process
//! boundary the set is flattened to `--name value` tokens and parsed back on the worker side.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::RecordError;

/// Marks a worker invocation as a map task; the value is the mapper's registered name.
pub const MAPPER_FLAG: &str = "pmapper";
/// Marks a worker invocation as a reduce task; the value is the reducer's registered name.
pub const REDUCER_FLAG: &str = "preducer";
/// Base name of the error trace sink.
pub const TRACE_PARAM: &str = "trace";

const RESERVED: [&str; 3] = [MAPPER_FLAG, REDUCER_FLAG, TRACE_PARAM];

/// Whether `name` is used internally by the engine and must not be set by user code.
pub fn is_reserved(name: &str) -> bool {
    RESERVED.contains(&name)
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParameterSet {
    params: BTreeMap<String, Vec<String>>,
}

impl ParameterSet {
    pub fn new() -> ParameterSet {
        ParameterSet::default()
    }

    /// Appends a value to parameter `name`.
    pub fn insert<V: fmt::Display>(&mut self, name: &str, value: V) {
        self.params
            .entry(name.to_string())
            .or_default()
            .push(value.to_string());
    }

    /// Builder form of insert().
    pub fn with<V: fmt::Display>(mut self, name: &str, value: V) -> ParameterSet {
        self.insert(name, value);
        self
    }

    /// Replaces all values of `name`.
    pub fn set_all<V: fmt::Display>(&mut self, name: &str, values: &[V]) {
        self.params.insert(
            name.to_string(),
            values.iter().map(|v| v.to_string()).collect(),
        );
    }

    pub fn remove(&mut self, name: &str) -> Option<Vec<String>> {
        self.params.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.params.contains_key(name)
    }

    /// First value of `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.params
            .get(name)
            .and_then(|vs| vs.first())
            .map(String::as_str)
    }

    pub fn get_all(&self, name: &str) -> &[String] {
        self.params.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Like get(), but a missing parameter is a record error.
    pub fn require(&self, name: &str) -> Result<&str, RecordError> {
        self.get(name)
            .ok_or_else(|| RecordError::new(format!("missing parameter {:?}", name)))
    }

    /// Parses the first value of `name`.
    pub fn parse<T: FromStr>(&self, name: &str) -> Result<T, RecordError>
    where
        T::Err: fmt::Display,
    {
        let raw = self.require(name)?;
        raw.parse::<T>()
            .map_err(|e| RecordError::new(format!("parameter {:?}={:?}: {}", name, raw, e)))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.params.keys().map(String::as_str)
    }

    /// Names present in this set that are reserved by the engine.
    pub fn reserved_names(&self) -> Vec<String> {
        self.names()
            .filter(|n| is_reserved(n))
            .map(String::from)
            .collect()
    }

    /// The first value starting with `--`. Such a value does not survive to_args()/from_args(),
    /// so jobs carrying one are rejected.
    pub fn flag_like_value(&self) -> Option<(&str, &str)> {
        self.params.iter().find_map(|(name, values)| {
            values
                .iter()
                .find(|v| v.starts_with("--"))
                .map(|v| (name.as_str(), v.as_str()))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Flattens the set to `--name value` tokens, one pair per value.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        for (name, values) in self.params.iter() {
            if values.is_empty() {
                args.push(format!("--{}", name));
            }
            for v in values {
                args.push(format!("--{}", name));
                args.push(v.clone());
            }
        }
        args
    }

    /// Parses `--name value` tokens. A flag directly followed by another flag (or by the end of
    /// the arguments) is recorded without a value. Tokens not belonging to a flag are ignored.
    pub fn from_args<S: AsRef<str>>(args: &[S]) -> ParameterSet {
        let mut set = ParameterSet::new();
        let mut i = 0;
        while i < args.len() {
            let tok = args[i].as_ref();
            if let Some(name) = tok.strip_prefix("--") {
                let entry = set.params.entry(name.to_string()).or_default();
                match args.get(i + 1).map(AsRef::as_ref) {
                    Some(next) if !next.starts_with("--") => {
                        entry.push(next.to_string());
                        i += 2;
                        continue;
                    }
                    _ => (),
                }
            }
            i += 1;
        }
        set
    }
}

impl fmt::Display for ParameterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let args = self.to_args();
        f.write_str(&args.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_roundtrip_with_multiple_values() {
        let mut p = ParameterSet::new()
            .with("graph", "g.txt")
            .with("damping", 0.85);
        p.set_all("files", &["a", "b"]);

        let args = p.to_args();
        assert_eq!(
            args,
            vec![
                "--damping", "0.85", "--files", "a", "--files", "b", "--graph", "g.txt"
            ]
        );
        assert_eq!(ParameterSet::from_args(&args), p);
        assert_eq!(p.get_all("files"), ["a", "b"]);
    }

    #[test]
    fn test_from_args_edge_cases() {
        let p = ParameterSet::from_args(&["prog", "--flag", "--offset", "-3", "stray", "--last"]);
        assert!(p.contains("flag"));
        assert_eq!(p.get("flag"), None);
        assert_eq!(p.get("offset"), Some("-3"));
        assert_eq!(p.parse::<i32>("offset"), Ok(-3));
        assert!(p.contains("last"));
        assert_eq!(p.names().count(), 3);
    }

    #[test]
    fn test_require_and_parse_errors() {
        let p = ParameterSet::new().with("n", "abc");
        assert!(p.require("missing").is_err());
        assert!(p.parse::<f64>("n").is_err());
    }

    #[test]
    fn test_reserved_names() {
        let p = ParameterSet::new().with("trace", "t").with("x", 1).with(MAPPER_FLAG, "m");
        assert_eq!(p.reserved_names(), vec!["pmapper", "trace"]);
        assert!(!is_reserved("x"));
    }

    #[test]
    fn test_flag_like_values_are_found() {
        let p = ParameterSet::new().with("offset", "-3").with("graph", "g.txt");
        assert_eq!(p.flag_like_value(), None);

        let p = p.with("mode", "--fast");
        assert_eq!(p.flag_like_value(), Some(("mode", "--fast")));
        // The round trip would turn the value into a flag of its own.
        assert_ne!(ParameterSet::from_args(&p.to_args()), p);
    }
}
