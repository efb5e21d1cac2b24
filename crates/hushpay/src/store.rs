//! channel storage
//!
//! the store owns the authoritative copy of every channel. writers read a
//! versioned value, compute the next state, and swap it in only if the
//! version is still the one they read.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::channel::Channel;
use crate::error::{Error, Result};
use crate::types::ChannelId;

/// a stored value and the version it was written at
#[derive(Clone, Debug)]
pub struct Versioned<T> {
    pub version: u64,
    pub value: T,
}

/// pluggable channel storage
///
/// implementors must provide:
/// - get: latest value and version, `None` if never stored
/// - put: unconditional write, used when a channel is (re)opened
/// - compare_and_swap: write only if the stored version is `expected`
pub trait ChannelStore: Send + Sync {
    fn get(&self, channel_id: &ChannelId) -> Result<Option<Versioned<Channel>>>;

    fn contains(&self, channel_id: &ChannelId) -> Result<bool> {
        Ok(self.get(channel_id)?.is_some())
    }

    /// returns the new version
    fn put(&self, channel: Channel) -> Result<u64>;

    /// returns the new version, [`Error::Conflict`] if `expected` is stale
    fn compare_and_swap(&self, expected: u64, channel: Channel) -> Result<u64>;
}

/// in-memory store
#[derive(Clone, Default)]
pub struct MemoryStore {
    channels: Arc<RwLock<HashMap<ChannelId, Versioned<Channel>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> Result<usize> {
        let channels = self.channels.read().map_err(|e| Error::Storage(e.to_string()))?;
        Ok(channels.len())
    }
}

impl ChannelStore for MemoryStore {
    fn get(&self, channel_id: &ChannelId) -> Result<Option<Versioned<Channel>>> {
        let channels = self.channels.read().map_err(|e| Error::Storage(e.to_string()))?;
        Ok(channels.get(channel_id).cloned())
    }

    fn contains(&self, channel_id: &ChannelId) -> Result<bool> {
        let channels = self.channels.read().map_err(|e| Error::Storage(e.to_string()))?;
        Ok(channels.contains_key(channel_id))
    }

    fn put(&self, channel: Channel) -> Result<u64> {
        let mut channels = self.channels.write().map_err(|e| Error::Storage(e.to_string()))?;
        // versions keep increasing across re-opens so an old reader never matches
        let version = channels.get(channel.id()).map_or(0, |v| v.version + 1);
        channels.insert(channel.id().clone(), Versioned { version, value: channel });
        Ok(version)
    }

    fn compare_and_swap(&self, expected: u64, channel: Channel) -> Result<u64> {
        let mut channels = self.channels.write().map_err(|e| Error::Storage(e.to_string()))?;
        let slot = channels
            .get_mut(channel.id())
            .ok_or_else(|| Error::NotFound(channel.id().to_string()))?;
        if slot.version != expected {
            return Err(Error::Conflict(channel.id().to_string()));
        }
        slot.version += 1;
        slot.value = channel;
        Ok(slot.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::{GroupParameters, ParameterSet, DEFAULT_GENERATOR_LABEL};
    use crate::types::{Participant, PerParticipant};
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn channel(rng: &mut ChaCha20Rng) -> Channel {
        let params = Arc::new(GroupParameters::new(
            ParameterSet::Modp768,
            DEFAULT_GENERATOR_LABEL.as_bytes(),
        ));
        let id = ChannelId::parse("stored").unwrap();
        Channel::open(params, PerParticipant::new(5, 5), Some(id), rng).unwrap()
    }

    #[test]
    fn test_put_get() {
        let mut rng = ChaCha20Rng::seed_from_u64(71);
        let store = MemoryStore::new();
        let id = ChannelId::parse("stored").unwrap();
        assert!(store.get(&id).unwrap().is_none());
        assert!(!store.contains(&id).unwrap());

        let version = store.put(channel(&mut rng)).unwrap();
        assert!(store.contains(&id).unwrap());
        let stored = store.get(&id).unwrap().unwrap();
        assert_eq!(stored.version, version);
        assert_eq!(stored.value.sequence(), 0);
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn test_compare_and_swap_rejects_stale_version() {
        let mut rng = ChaCha20Rng::seed_from_u64(72);
        let store = MemoryStore::new();
        let v0 = store.put(channel(&mut rng)).unwrap();
        let id = ChannelId::parse("stored").unwrap();

        let mut first = store.get(&id).unwrap().unwrap().value;
        let mut second = first.clone();
        first.apply_payment(Participant::Alice, 1, &mut rng).unwrap();
        second.apply_payment(Participant::Bob, 1, &mut rng).unwrap();

        let v1 = store.compare_and_swap(v0, first).unwrap();
        assert_eq!(v1, v0 + 1);
        assert!(matches!(store.compare_and_swap(v0, second), Err(Error::Conflict(_))));
        assert_eq!(store.get(&id).unwrap().unwrap().value.balances().alice, 4);
    }

    #[test]
    fn test_reopen_bumps_version() {
        let mut rng = ChaCha20Rng::seed_from_u64(73);
        let store = MemoryStore::new();
        let v0 = store.put(channel(&mut rng)).unwrap();
        let v1 = store.put(channel(&mut rng)).unwrap();
        assert!(v1 > v0);
        assert!(store.compare_and_swap(v0, channel(&mut rng)).is_err());
    }
}
