//! Value store type definitions

use crate::osc::OscArg;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Value held for a key: numeric, boolean or text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoreValue {
    /// Numeric value (OSC ints and floats are both widened to f64)
    Float(f64),
    /// Boolean value (`T` / `F`)
    Bool(bool),
    /// Text value
    Text(String),
}

impl StoreValue {
    /// Value given to freshly created entries and to argument-less messages
    pub const ZERO: StoreValue = StoreValue::Float(0.0);

    /// Coerce the first OSC argument of a message into a storable value
    ///
    /// A message without arguments is a trigger and stores `0.0`.
    pub fn from_arg(arg: Option<&OscArg>) -> Self {
        match arg {
            None => StoreValue::ZERO,
            Some(OscArg::Int(i)) => StoreValue::Float(f64::from(*i)),
            Some(OscArg::Float(f)) => StoreValue::Float(f64::from(*f)),
            Some(OscArg::Bool(b)) => StoreValue::Bool(*b),
            Some(OscArg::String(s)) => StoreValue::Text(s.clone()),
        }
    }

    /// Numeric view used for keyframing (bools become 1.0 / 0.0)
    pub fn as_keyframe_value(&self) -> Option<f64> {
        match self {
            StoreValue::Float(f) => Some(*f),
            StoreValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            StoreValue::Text(_) => None,
        }
    }
}

impl fmt::Display for StoreValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreValue::Float(v) => write!(f, "{}", v),
            StoreValue::Bool(b) => write!(f, "{}", b),
            StoreValue::Text(s) => write!(f, "{:?}", s),
        }
    }
}

/// Registered address and its update policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressEntry {
    /// Normalized key (`osc_...`)
    pub key: String,
    /// Disabled entries keep their value but ignore new messages
    pub enabled: bool,
}

/// Result of applying one message to the store
#[derive(Debug, Clone, PartialEq)]
pub enum ApplyOutcome {
    /// New entry created and set
    Created { key: String },
    /// Existing entry overwritten
    Updated { key: String },
    /// Store left unchanged
    Ignored { key: String, reason: IgnoreReason },
}

impl ApplyOutcome {
    /// Whether the store was mutated
    pub fn is_mutation(&self) -> bool {
        !matches!(self, ApplyOutcome::Ignored { .. })
    }
}

/// Why a message did not change the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// No entry exists and auto-add is off
    UnknownAddress,
    /// Entry exists but is disabled
    Disabled,
}

/// Notification delivered to store listeners after each mutation
#[derive(Debug, Clone, PartialEq)]
pub struct StoreUpdate {
    pub key: String,
    pub value: StoreValue,
    /// True when the entry was created by this update
    pub created: bool,
}
