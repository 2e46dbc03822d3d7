//! Persisted node signatures and the dirtiness diff (spec §4.5.2, §6).
//!
//! A signature is an ordered mapping from argument name to a token: either the argument's
//! literal value, or the hash of an upstream node's resource. Comparing a freshly computed
//! signature against the one persisted from the last run is the engine's only dirtiness test —
//! there is no content hashing, per spec Non-goals.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::WorkflowError;
use crate::value::ArgumentValue;

/// An ordered name → token mapping captured for one node on one run.
pub type Signature = BTreeMap<String, ArgumentValue>;

/// Compares a freshly built signature against the one persisted from the previous run.
///
/// Returns `true` ("dirty") if the two disagree on keys present, on the kind of any shared key's
/// value, or on the value of any shared key. A key's type changing and its value changing are
/// both reported as "different" without distinguishing which; the specification leaves the exact
/// tie-breaking between these two kinds of mismatch unspecified; either is adequate.
#[must_use]
pub fn is_dirty(current: &Signature, persisted: &Signature) -> bool {
    if current.len() != persisted.len() {
        return true;
    }
    current.iter().any(|(key, value)| match persisted.get(key) {
        None => true,
        Some(previous) => value.kind() != previous.kind() || !value.values_equal(previous),
    })
}

/// Persisted signature and measurement storage, keyed by `(graph name, node name)`.
///
/// A malformed or missing blob is treated as "nothing persisted" rather than an error — the same
/// policy as a node that has never run.
pub trait SignatureStore: std::fmt::Debug {
    /// Reads the signature last persisted for `node` in `graph`, if any.
    ///
    /// # Errors
    /// Returns an error only for a failure of the underlying store itself, not for a missing or
    /// malformed entry (both read back as `Ok(None)`).
    fn get_signature(&self, graph: &str, node: &str) -> Result<Option<Signature>, WorkflowError>;

    /// Persists `signature` for `node` in `graph`, replacing any previous entry.
    ///
    /// # Errors
    /// Returns an error if the underlying store fails to write or encode the entry.
    fn put_signature(
        &self,
        graph: &str,
        node: &str,
        signature: &Signature,
    ) -> Result<(), WorkflowError>;

    /// Reads the last measurement saved for `node` in `graph`, if any.
    ///
    /// # Errors
    /// Returns an error only for a failure of the underlying store itself.
    fn get_measurement(
        &self,
        graph: &str,
        node: &str,
    ) -> Result<Option<ArgumentValue>, WorkflowError>;

    /// Persists a measurement for `node` in `graph`, replacing any previous entry. Saving a
    /// measurement is independent of whether the node evaluated or loaded this run.
    ///
    /// # Errors
    /// Returns an error if the underlying store fails to write or encode the entry.
    fn put_measurement(
        &self,
        graph: &str,
        node: &str,
        value: &ArgumentValue,
    ) -> Result<(), WorkflowError>;

    /// Removes both the signature and the measurement for `node` in `graph`, if present.
    ///
    /// # Errors
    /// Returns an error only for a failure of the underlying store itself.
    fn clear(&self, graph: &str, node: &str) -> Result<(), WorkflowError>;

    /// Removes only the measurement for `node` in `graph`, leaving any persisted signature
    /// untouched. Called at the start of every `evaluate` run (the start-of-run convention), so a
    /// measurement from a prior run never survives a run that did not call `save_measurement`
    /// again.
    ///
    /// # Errors
    /// Returns an error only for a failure of the underlying store itself.
    fn clear_measurement(&self, graph: &str, node: &str) -> Result<(), WorkflowError>;
}

fn signature_key(graph: &str, node: &str) -> String {
    format!("{graph}:{node}")
}

fn measurement_key(graph: &str, node: &str) -> String {
    format!("{graph}:{node}:__meas__")
}

/// A [`SignatureStore`] backed by an embedded `sled` database, opened once per working directory
/// (spec §6: `<work_dir>/.workflow.lmdb`, an on-disk name kept stable even though `sled` is the
/// internal backing engine).
#[derive(Debug, Clone)]
pub struct SledSignatureStore {
    db: sled::Db,
}

impl SledSignatureStore {
    /// Opens (creating if needed) the store rooted at `path`.
    ///
    /// # Errors
    /// Returns an error if `sled` cannot open the database at `path`.
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self, WorkflowError> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    fn read_entry<T: for<'de> Deserialize<'de>>(
        &self,
        key: &str,
    ) -> Result<Option<T>, WorkflowError> {
        match self.db.get(key.as_bytes())? {
            None => Ok(None),
            Some(bytes) => Ok(ciborium::from_reader(&bytes[..]).ok()),
        }
    }

    fn write_entry<T: Serialize>(&self, key: &str, value: &T) -> Result<(), WorkflowError> {
        let mut encoded = Vec::new();
        ciborium::into_writer(value, &mut encoded)
            .map_err(|err| WorkflowError::Codec(err.to_string()))?;
        self.db.insert(key.as_bytes(), encoded)?;
        self.db.flush()?;
        Ok(())
    }
}

impl SignatureStore for SledSignatureStore {
    fn get_signature(&self, graph: &str, node: &str) -> Result<Option<Signature>, WorkflowError> {
        self.read_entry(&signature_key(graph, node))
    }

    fn put_signature(
        &self,
        graph: &str,
        node: &str,
        signature: &Signature,
    ) -> Result<(), WorkflowError> {
        self.write_entry(&signature_key(graph, node), signature)
    }

    fn get_measurement(
        &self,
        graph: &str,
        node: &str,
    ) -> Result<Option<ArgumentValue>, WorkflowError> {
        self.read_entry(&measurement_key(graph, node))
    }

    fn put_measurement(
        &self,
        graph: &str,
        node: &str,
        value: &ArgumentValue,
    ) -> Result<(), WorkflowError> {
        self.write_entry(&measurement_key(graph, node), value)
    }

    fn clear(&self, graph: &str, node: &str) -> Result<(), WorkflowError> {
        self.db.remove(signature_key(graph, node).as_bytes())?;
        self.db.remove(measurement_key(graph, node).as_bytes())?;
        self.db.flush()?;
        Ok(())
    }

    fn clear_measurement(&self, graph: &str, node: &str) -> Result<(), WorkflowError> {
        self.db.remove(measurement_key(graph, node).as_bytes())?;
        self.db.flush()?;
        Ok(())
    }
}

/// An in-memory [`SignatureStore`], used by tests and by callers that want reentrancy within a
/// process without touching disk.
#[derive(Debug, Default)]
pub struct MemorySignatureStore {
    entries: std::cell::RefCell<BTreeMap<String, Vec<u8>>>,
}

impl MemorySignatureStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SignatureStore for MemorySignatureStore {
    fn get_signature(&self, graph: &str, node: &str) -> Result<Option<Signature>, WorkflowError> {
        let key = signature_key(graph, node);
        let entries = self.entries.borrow();
        Ok(entries
            .get(&key)
            .and_then(|bytes| ciborium::from_reader(&bytes[..]).ok()))
    }

    fn put_signature(
        &self,
        graph: &str,
        node: &str,
        signature: &Signature,
    ) -> Result<(), WorkflowError> {
        let mut encoded = Vec::new();
        ciborium::into_writer(signature, &mut encoded)
            .map_err(|err| WorkflowError::Codec(err.to_string()))?;
        self.entries
            .borrow_mut()
            .insert(signature_key(graph, node), encoded);
        Ok(())
    }

    fn get_measurement(
        &self,
        graph: &str,
        node: &str,
    ) -> Result<Option<ArgumentValue>, WorkflowError> {
        let key = measurement_key(graph, node);
        let entries = self.entries.borrow();
        Ok(entries
            .get(&key)
            .and_then(|bytes| ciborium::from_reader(&bytes[..]).ok()))
    }

    fn put_measurement(
        &self,
        graph: &str,
        node: &str,
        value: &ArgumentValue,
    ) -> Result<(), WorkflowError> {
        let mut encoded = Vec::new();
        ciborium::into_writer(value, &mut encoded)
            .map_err(|err| WorkflowError::Codec(err.to_string()))?;
        self.entries
            .borrow_mut()
            .insert(measurement_key(graph, node), encoded);
        Ok(())
    }

    fn clear(&self, graph: &str, node: &str) -> Result<(), WorkflowError> {
        let mut entries = self.entries.borrow_mut();
        entries.remove(&signature_key(graph, node));
        entries.remove(&measurement_key(graph, node));
        Ok(())
    }

    fn clear_measurement(&self, graph: &str, node: &str) -> Result<(), WorkflowError> {
        self.entries.borrow_mut().remove(&measurement_key(graph, node));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(pairs: &[(&str, ArgumentValue)]) -> Signature {
        pairs.iter().map(|(k, v)| ((*k).to_owned(), v.clone())).collect()
    }

    #[test]
    fn identical_signatures_are_not_dirty() {
        let a = sig(&[("x", ArgumentValue::Int(1))]);
        let b = sig(&[("x", ArgumentValue::Int(1))]);
        assert!(!is_dirty(&a, &b));
    }

    #[test]
    fn value_change_is_dirty() {
        let a = sig(&[("x", ArgumentValue::Int(1))]);
        let b = sig(&[("x", ArgumentValue::Int(2))]);
        assert!(is_dirty(&a, &b));
    }

    #[test]
    fn kind_change_is_dirty() {
        let a = sig(&[("x", ArgumentValue::Int(1))]);
        let b = sig(&[("x", ArgumentValue::Str("1".into()))]);
        assert!(is_dirty(&a, &b));
    }

    #[test]
    fn key_only_on_one_side_is_dirty() {
        let a = sig(&[("x", ArgumentValue::Int(1)), ("y", ArgumentValue::Int(2))]);
        let b = sig(&[("x", ArgumentValue::Int(1))]);
        assert!(is_dirty(&a, &b));
    }

    #[test]
    fn memory_store_round_trips_signature_and_measurement() {
        let store = MemorySignatureStore::new();
        let signature = sig(&[("x", ArgumentValue::Int(7))]);
        store.put_signature("g", "n", &signature).unwrap();
        assert_eq!(store.get_signature("g", "n").unwrap(), Some(signature));

        store
            .put_measurement("g", "n", &ArgumentValue::Float(0.5))
            .unwrap();
        assert_eq!(
            store.get_measurement("g", "n").unwrap(),
            Some(ArgumentValue::Float(0.5))
        );

        store.clear("g", "n").unwrap();
        assert_eq!(store.get_signature("g", "n").unwrap(), None);
        assert_eq!(store.get_measurement("g", "n").unwrap(), None);
    }

    #[test]
    fn clear_measurement_leaves_signature_in_place() {
        let store = MemorySignatureStore::new();
        let signature = sig(&[("x", ArgumentValue::Int(7))]);
        store.put_signature("g", "n", &signature).unwrap();
        store
            .put_measurement("g", "n", &ArgumentValue::Float(0.5))
            .unwrap();

        store.clear_measurement("g", "n").unwrap();

        assert_eq!(store.get_signature("g", "n").unwrap(), Some(signature));
        assert_eq!(store.get_measurement("g", "n").unwrap(), None);
    }

    #[test]
    fn sled_store_survives_malformed_entries() {
        let dir = tempfile::tempdir().unwrap();
        let store = SledSignatureStore::open(dir.path()).unwrap();
        store.db.insert(b"g:n".as_slice(), b"not cbor".as_slice()).unwrap();
        assert_eq!(store.get_signature("g", "n").unwrap(), None);
    }
}
