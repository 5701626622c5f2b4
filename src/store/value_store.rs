//! ValueStore - keyed OSC values with per-address policy

use super::types::{AddressEntry, ApplyOutcome, IgnoreReason, StoreUpdate, StoreValue};
use crate::address;
use crate::osc::OscArg;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info};

type Listener = Box<dyn FnMut(&StoreUpdate) + Send>;

#[derive(Debug, Clone)]
struct Slot {
    enabled: bool,
    value: StoreValue,
}

/// Current value per normalized OSC address
///
/// Every value is backed by an address entry; entries and values are
/// created and removed together.
#[derive(Default)]
pub struct ValueStore {
    slots: BTreeMap<String, Slot>,
    listeners: Vec<Listener>,
}

impl ValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply the first argument of an incoming message
    ///
    /// Unknown addresses are registered (enabled, `0.0`) when `auto_add` is
    /// set and ignored otherwise. Disabled entries are never overwritten.
    pub fn apply(&mut self, address: &str, arg: Option<&OscArg>, auto_add: bool) -> ApplyOutcome {
        let key = address::normalize_str(address);

        let created = match self.slots.get(&key) {
            Some(slot) if !slot.enabled => {
                return ApplyOutcome::Ignored {
                    key,
                    reason: IgnoreReason::Disabled,
                };
            }
            Some(_) => false,
            None if !auto_add => {
                return ApplyOutcome::Ignored {
                    key,
                    reason: IgnoreReason::UnknownAddress,
                };
            }
            None => {
                info!("New OSC address {} -> {}", address, key);
                true
            }
        };

        let value = StoreValue::from_arg(arg);
        self.slots.insert(
            key.clone(),
            Slot {
                enabled: true,
                value: value.clone(),
            },
        );

        let update = StoreUpdate {
            key: key.clone(),
            value,
            created,
        };
        for listener in self.listeners.iter_mut() {
            listener(&update);
        }

        if created {
            ApplyOutcome::Created { key }
        } else {
            ApplyOutcome::Updated { key }
        }
    }

    /// Register an address explicitly (enabled, value `0.0`)
    ///
    /// Returns the normalized key. An existing entry is left untouched.
    pub fn add_address(&mut self, address: &str) -> String {
        let key = address::normalize_str(address);
        self.slots.entry(key.clone()).or_insert_with(|| {
            debug!("Registered OSC address {} -> {}", address, key);
            Slot {
                enabled: true,
                value: StoreValue::ZERO,
            }
        });
        key
    }

    /// Remove an entry and its value
    pub fn remove_address(&mut self, key: &str) -> bool {
        self.slots.remove(key).is_some()
    }

    /// Toggle whether an entry accepts new values
    pub fn set_enabled(&mut self, key: &str, enabled: bool) -> bool {
        match self.slots.get_mut(key) {
            Some(slot) => {
                slot.enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// Current value for a key (disabled entries remain readable)
    pub fn get(&self, key: &str) -> Option<&StoreValue> {
        self.slots.get(key).map(|slot| &slot.value)
    }

    /// Address entry for a key
    pub fn entry(&self, key: &str) -> Option<AddressEntry> {
        self.slots.get(key).map(|slot| AddressEntry {
            key: key.to_string(),
            enabled: slot.enabled,
        })
    }

    /// All address entries, ordered by key
    pub fn entries(&self) -> Vec<AddressEntry> {
        self.slots
            .iter()
            .map(|(key, slot)| AddressEntry {
                key: key.clone(),
                enabled: slot.enabled,
            })
            .collect()
    }

    /// Iterate `(key, value)` pairs ordered by key
    pub fn iter(&self) -> impl Iterator<Item = (&str, &StoreValue)> {
        self.slots
            .iter()
            .map(|(key, slot)| (key.as_str(), &slot.value))
    }

    /// Iterate `(key, value)` pairs of enabled entries only
    pub fn iter_enabled(&self) -> impl Iterator<Item = (&str, &StoreValue)> {
        self.slots
            .iter()
            .filter(|(_, slot)| slot.enabled)
            .map(|(key, slot)| (key.as_str(), &slot.value))
    }

    /// Keys starting with `prefix`
    pub fn keys_with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.slots
            .range(prefix.to_string()..)
            .map(|(key, _)| key.as_str())
            .take_while(move |key| key.starts_with(prefix))
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Remove all entries
    pub fn clear(&mut self) {
        self.slots.clear();
    }

    /// Subscribe to value mutations made by `apply`
    pub fn subscribe<F>(&mut self, listener: F)
    where
        F: FnMut(&StoreUpdate) + Send + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    /// Replace all entries without notifying listeners
    pub(crate) fn restore_entries(&mut self, entries: impl IntoIterator<Item = (AddressEntry, StoreValue)>) {
        self.slots = entries
            .into_iter()
            .map(|(entry, value)| {
                (
                    entry.key,
                    Slot {
                        enabled: entry.enabled,
                        value,
                    },
                )
            })
            .collect();
    }
}

impl fmt::Debug for ValueStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueStore")
            .field("slots", &self.slots)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
