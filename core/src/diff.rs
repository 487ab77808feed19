//! Reversible collection diffs
//!
//! Collection-valued account attributes (the delegate vote list) mutate
//! through ordered diff lists. Applying a diff list and then its reversal to
//! the same base collection restores the original exactly, which is what
//! every undo path relies on.

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Direction of a single diff step.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum DiffOp {
    Add,
    Remove,
}

impl DiffOp {
    pub fn inverted(self) -> DiffOp {
        match self {
            DiffOp::Add => DiffOp::Remove,
            DiffOp::Remove => DiffOp::Add,
        }
    }

    fn sign(self) -> char {
        match self {
            DiffOp::Add => '+',
            DiffOp::Remove => '-',
        }
    }
}

/// One reversible mutation step against a collection.
///
/// Rendered on the wire in the sign-prefixed form the protocol has always
/// used, e.g. `+13987218999C` / `-13987218999C`.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub struct DiffEntry<T> {
    pub op: DiffOp,
    pub value: T,
}

impl<T> DiffEntry<T> {
    pub fn add(value: T) -> Self {
        DiffEntry { op: DiffOp::Add, value }
    }

    pub fn remove(value: T) -> Self {
        DiffEntry { op: DiffOp::Remove, value }
    }
}

impl<T: Clone> DiffEntry<T> {
    /// The entry that undoes this one.
    pub fn inverted(&self) -> DiffEntry<T> {
        DiffEntry {
            op: self.op.inverted(),
            value: self.value.clone(),
        }
    }
}

impl<T: fmt::Display> fmt::Display for DiffEntry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.op.sign(), self.value)
    }
}

impl<T: FromStr> FromStr for DiffEntry<T>
where
    T::Err: fmt::Display,
{
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let op = match s.chars().next() {
            Some('+') => DiffOp::Add,
            Some('-') => DiffOp::Remove,
            _ => return Err("diff entry must start with '+' or '-'".into()),
        };
        let value = s[1..].parse().map_err(|e| format!("{}", e))?;
        Ok(DiffEntry { op, value })
    }
}

impl<T: fmt::Display> Serialize for DiffEntry<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de, T: FromStr> Deserialize<'de> for DiffEntry<T>
where
    T::Err: fmt::Display,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}

/// Apply a diff list to a collection, in order.
///
/// `Add` appends the element; `Remove` deletes the first occurrence. Removing
/// an element that is not present is a no-op, so replaying confirmed history
/// over an already-mutated collection cannot fail.
pub fn apply<T: PartialEq + Clone>(collection: &mut Vec<T>, diff: &[DiffEntry<T>]) {
    for entry in diff {
        match entry.op {
            DiffOp::Add => collection.push(entry.value.clone()),
            DiffOp::Remove => {
                if let Some(pos) = collection.iter().position(|v| *v == entry.value) {
                    collection.remove(pos);
                }
            }
        }
    }
}

/// Invert every entry of a diff list, preserving order.
pub fn reverse<T: Clone>(diff: &[DiffEntry<T>]) -> Vec<DiffEntry<T>> {
    diff.iter().map(DiffEntry::inverted).collect()
}

/// Apply a diff list and return the entries that actually took effect.
///
/// A `Remove` of an absent element is dropped from the returned list, so
/// reversing the result always restores the collection exactly even when the
/// input diff was only partially applicable.
pub fn apply_effective<T: PartialEq + Clone>(
    collection: &mut Vec<T>,
    diff: &[DiffEntry<T>],
) -> Vec<DiffEntry<T>> {
    let mut effective = Vec::with_capacity(diff.len());
    for entry in diff {
        match entry.op {
            DiffOp::Add => {
                collection.push(entry.value.clone());
                effective.push(entry.clone());
            }
            DiffOp::Remove => {
                if let Some(pos) = collection.iter().position(|v| *v == entry.value) {
                    collection.remove(pos);
                    effective.push(entry.clone());
                }
            }
        }
    }
    effective
}
