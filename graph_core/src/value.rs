//! The legal value model for node arguments and persisted signatures (spec §3, `ArgumentValue`).
//!
//! A small, closed set of runtime values, chosen so that every variant has a total equality
//! relation and a stable self-describing encoding. User types opt in via
//! [`ArgumentValue::custom`], which captures a CBOR-encoded snapshot rather than the live Rust
//! value — this is what lets a [`ArgumentValue`] persisted to the signature store in one process
//! be compared against a freshly constructed one in a later process without downcasting.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::resource::ResourceHash;

/// A value legal as a node argument or as a persisted signature entry.
///
/// Every variant compares by structural equality. Cross-variant comparisons are always unequal;
/// [`ArgumentValue::kind`] exposes the discriminant used for that check so the signature diff
/// (`crate::signature::diff`) can report a kind mismatch distinctly from a value mismatch.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum ArgumentValue {
    /// The unit value, used for resource-only or side-effect-only nodes.
    Unit,
    /// A boolean.
    Bool(bool),
    /// A signed integer.
    Int(i64),
    /// A floating-point number. Equality is IEEE `==`, so `NaN != NaN`.
    Float(f64),
    /// A UTF-8 string.
    Str(String),
    /// A named enum variant, kept distinct from [`ArgumentValue::Str`] so that a string and an
    /// enum sharing the same text still count as a kind mismatch.
    Enum(String),
    /// A homogeneous, order-sensitive list.
    List(Vec<ArgumentValue>),
    /// A homogeneous set, compared as a multiset (order-insensitive, per spec §3's resource
    /// `multi` equality rule).
    Set(Vec<ArgumentValue>),
    /// A mapping with string keys and argument-value range.
    Map(BTreeMap<String, ArgumentValue>),
    /// The stable name of a non-anonymous function.
    Function(String),
    /// A user-defined value that declared structural equality, captured as a type tag plus a
    /// self-describing encoded snapshot.
    Custom(CustomValue),
    /// The hash of an upstream resource, or `None` if the upstream had no resource. Only ever
    /// produced by the signature-building algorithm in [`crate::node`]; never constructed
    /// directly from user code.
    ResourceHash(Option<ResourceHash>),
}

/// Discriminant used for the "cross-kind mismatch" half of the signature diff.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ValueKind {
    /// See [`ArgumentValue::Unit`].
    Unit,
    /// See [`ArgumentValue::Bool`].
    Bool,
    /// See [`ArgumentValue::Int`].
    Int,
    /// See [`ArgumentValue::Float`].
    Float,
    /// See [`ArgumentValue::Str`].
    Str,
    /// See [`ArgumentValue::Enum`].
    Enum,
    /// See [`ArgumentValue::List`].
    List,
    /// See [`ArgumentValue::Set`].
    Set,
    /// See [`ArgumentValue::Map`].
    Map,
    /// See [`ArgumentValue::Function`].
    Function,
    /// See [`ArgumentValue::Custom`].
    Custom,
    /// See [`ArgumentValue::ResourceHash`].
    ResourceHash,
}

/// A user-defined value captured by structural snapshot.
///
/// Two [`CustomValue`]s are equal iff their type tag and encoded bytes are identical. Because the
/// encoding is canonical CBOR over a `#[derive(Serialize)]` value, this is sound for any type
/// whose `Serialize` impl does not depend on iteration order of a non-ordered collection (prefer
/// `BTreeMap`/`BTreeSet` over hash-based collections in types passed to [`ArgumentValue::custom`]).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CustomValue {
    type_name: String,
    encoded: Vec<u8>,
}

impl PartialEq for CustomValue {
    fn eq(&self, other: &Self) -> bool {
        self.type_name == other.type_name && self.encoded == other.encoded
    }
}

impl ArgumentValue {
    /// Captures `value` as a [`ArgumentValue::Custom`] snapshot.
    ///
    /// `type_name` should be a stable identifier for `T` (e.g. `std::any::type_name::<T>()` or a
    /// hand-chosen tag); it participates in equality, so changing it invalidates previously
    /// persisted signatures for nodes that used it.
    pub fn custom<T: Serialize>(
        type_name: impl Into<String>,
        value: &T,
    ) -> Result<Self, crate::error::WorkflowError> {
        let mut encoded = Vec::new();
        ciborium::into_writer(value, &mut encoded)
            .map_err(|err| crate::error::WorkflowError::Codec(err.to_string()))?;
        Ok(Self::Custom(CustomValue {
            type_name: type_name.into(),
            encoded,
        }))
    }

    /// Returns this value's [`ValueKind`] discriminant.
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Unit => ValueKind::Unit,
            Self::Bool(_) => ValueKind::Bool,
            Self::Int(_) => ValueKind::Int,
            Self::Float(_) => ValueKind::Float,
            Self::Str(_) => ValueKind::Str,
            Self::Enum(_) => ValueKind::Enum,
            Self::List(_) => ValueKind::List,
            Self::Set(_) => ValueKind::Set,
            Self::Map(_) => ValueKind::Map,
            Self::Function(_) => ValueKind::Function,
            Self::Custom(_) => ValueKind::Custom,
            Self::ResourceHash(_) => ValueKind::ResourceHash,
        }
    }

    /// Returns `true` if `self` and `other` have every element/entry structurally equal,
    /// regardless of kind-mismatch bookkeeping (used by the diff algorithm after kinds have
    /// already been confirmed to match, and directly by tests).
    #[must_use]
    pub fn values_equal(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Unit, Self::Unit) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Enum(a), Self::Enum(b)) => a == b,
            (Self::List(a), Self::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.values_equal(y))
            }
            (Self::Set(a), Self::Set(b)) => sets_equal(a, b),
            (Self::Map(a), Self::Map(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).is_some_and(|bv| v.values_equal(bv)))
            }
            (Self::Function(a), Self::Function(b)) => a == b,
            (Self::Custom(a), Self::Custom(b)) => a == b,
            (Self::ResourceHash(a), Self::ResourceHash(b)) => a == b,
            _ => false,
        }
    }
}

/// Multiset equality: every element of `a` has a distinct matching element in `b`, per spec §3's
/// `multi` resource equality rule.
fn sets_equal(a: &[ArgumentValue], b: &[ArgumentValue]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut used = vec![false; b.len()];
    'outer: for item in a {
        for (i, candidate) in b.iter().enumerate() {
            if !used[i] && item.values_equal(candidate) {
                used[i] = true;
                continue 'outer;
            }
        }
        return false;
    }
    true
}

impl PartialEq for ArgumentValue {
    fn eq(&self, other: &Self) -> bool {
        self.kind() == other.kind() && self.values_equal(other)
    }
}
