//! Pluggable map/reduce functions.
//!
//! The spec treats the user's map/reduce functions as an external
//! collaborator loaded by some mechanism outside the core's scope; without
//! dynamic loading, a worker picks one by name from this small built-in
//! registry at construction time instead, per the design notes.

use crate::mr::protocol::KeyValue;

/// `map(filename, contents) -> sequence of (key, value)`.
pub trait MapFn: Send + Sync {
    fn call(&self, filename: &str, contents: &str) -> Vec<KeyValue>;
}

/// `reduce(key, values) -> result string`.
pub trait ReduceFn: Send + Sync {
    fn call(&self, key: &str, values: &[String]) -> String;
}

/// Word count: classic MapReduce reference application. Emits `(word, "1")`
/// for every whitespace-separated token, and reduces by counting them.
pub mod wordcount {
    use super::{KeyValue, MapFn, ReduceFn};

    pub struct Map;

    impl MapFn for Map {
        fn call(&self, _filename: &str, contents: &str) -> Vec<KeyValue> {
            contents
                .split_whitespace()
                .map(|word| KeyValue::new(word, "1"))
                .collect()
        }
    }

    pub struct Reduce;

    impl ReduceFn for Reduce {
        fn call(&self, _key: &str, values: &[String]) -> String {
            values.len().to_string()
        }
    }
}

/// The name of a built-in application, as selected on the worker's CLI.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum App {
    Wordcount,
}

impl App {
    pub fn map_fn(self) -> Box<dyn MapFn> {
        match self {
            App::Wordcount => Box::new(wordcount::Map),
        }
    }

    pub fn reduce_fn(self) -> Box<dyn ReduceFn> {
        match self {
            App::Wordcount => Box::new(wordcount::Reduce),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wordcount_map_emits_one_per_token() {
        let kvs = wordcount::Map.call("a.txt", "cat dog cat");
        assert_eq!(kvs.len(), 3);
        assert!(kvs.iter().all(|kv| kv.value == "1"));
    }

    #[test]
    fn wordcount_reduce_counts_values() {
        let result = wordcount::Reduce.call("cat", &["1".into(), "1".into()]);
        assert_eq!(result, "2");
    }

    #[test]
    fn empty_contents_emit_nothing() {
        let kvs = wordcount::Map.call("empty.txt", "   \n  ");
        assert!(kvs.is_empty());
    }
}
