//! channel service
//!
//! entry point for the http layer. resolves channel ids, serializes
//! operations per channel, hands each operation its own rng and keeps the
//! ledger in step with the store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use tracing::{debug, info};

use crate::channel::Channel;
use crate::config::ChannelConfig;
use crate::error::{Error, Result, ValidationError};
use crate::group::GroupParameters;
use crate::ledger::{Ledger, LedgerRecord, SettlementRecord};
use crate::signing::StateSignature;
use crate::store::{ChannelStore, MemoryStore, Versioned};
use crate::types::{ChannelId, Participant, PerParticipant};
use crate::wire::{ChannelView, CloseRequest, CosignRequest, HistoryView, OpenRequest, UpdateRequest};

/// the service
pub struct ChannelService<S: ChannelStore = MemoryStore> {
    config: ChannelConfig,
    params: Arc<GroupParameters>,
    store: S,
    ledger: Ledger,
    /// one mutex per channel id, held for a whole operation
    locks: Mutex<HashMap<ChannelId, Arc<Mutex<()>>>>,
    /// seed generator, only locked long enough to derive a child
    rng: Mutex<ChaCha20Rng>,
    /// most recently opened channel
    active: RwLock<Option<ChannelId>>,
}

impl ChannelService<MemoryStore> {
    pub fn new(config: ChannelConfig) -> Self {
        Self::with_store(config, MemoryStore::new())
    }
}

impl<S: ChannelStore> ChannelService<S> {
    pub fn with_store(config: ChannelConfig, store: S) -> Self {
        let params = config.group_parameters();
        info!(parameter_set = params.parameter_set().name(), "channel service ready");
        Self {
            ledger: Ledger::new(params.clone()),
            params,
            config,
            store,
            locks: Mutex::new(HashMap::new()),
            rng: Mutex::new(ChaCha20Rng::from_entropy()),
            active: RwLock::new(None),
        }
    }

    /// reseed from a fixed value, for reproducible runs
    pub fn with_seed(self, seed: u64) -> Self {
        Self {
            rng: Mutex::new(ChaCha20Rng::seed_from_u64(seed)),
            ..self
        }
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    pub fn params(&self) -> &Arc<GroupParameters> {
        &self.params
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn child_rng(&self) -> Result<ChaCha20Rng> {
        let mut seed = self.rng.lock().map_err(|e| Error::Internal(e.to_string()))?;
        ChaCha20Rng::from_rng(&mut *seed).map_err(|e| Error::Internal(e.to_string()))
    }

    fn channel_lock(&self, channel_id: &ChannelId) -> Result<Arc<Mutex<()>>> {
        let mut locks = self.locks.lock().map_err(|e| Error::Internal(e.to_string()))?;
        Ok(locks.entry(channel_id.clone()).or_default().clone())
    }

    /// lock of a stored channel, unknown ids never get an entry
    fn existing_channel_lock(&self, channel_id: &ChannelId) -> Result<Arc<Mutex<()>>> {
        let mut locks = self.locks.lock().map_err(|e| Error::Internal(e.to_string()))?;
        if let Some(lock) = locks.get(channel_id) {
            return Ok(lock.clone());
        }
        if !self.store.contains(channel_id)? {
            return Err(Error::NotFound(channel_id.to_string()));
        }
        Ok(locks.entry(channel_id.clone()).or_default().clone())
    }

    /// explicit id, or the most recently opened channel
    fn resolve(&self, channel_id: Option<&str>) -> Result<ChannelId> {
        match channel_id {
            Some(id) => Ok(ChannelId::parse(id)?),
            None => {
                let active = self.active.read().map_err(|e| Error::Internal(e.to_string()))?;
                active.clone().ok_or(Error::NoActiveChannel)
            }
        }
    }

    fn load(&self, channel_id: &ChannelId) -> Result<Versioned<Channel>> {
        self.store
            .get(channel_id)?
            .ok_or_else(|| Error::NotFound(channel_id.to_string()))
    }

    /// run `op` on a working copy under the channel lock, then swap it in
    fn mutate<F>(&self, channel_id: &ChannelId, op: F) -> Result<Channel>
    where
        F: FnOnce(&mut Channel, &mut ChaCha20Rng) -> Result<()>,
    {
        let lock = self.existing_channel_lock(channel_id)?;
        let _guard = lock.lock().map_err(|e| Error::Internal(e.to_string()))?;

        let Versioned { version, value: previous } = self.load(channel_id)?;
        let mut channel = previous.clone();
        let mut rng = self.child_rng()?;
        op(&mut channel, &mut rng)?;

        let swapped = self.store.compare_and_swap(version, channel.clone())?;
        if let Err(e) = self.ledger.publish(LedgerRecord::from_channel(&channel)) {
            // the store must not run ahead of the ledger
            self.store.compare_and_swap(swapped, previous)?;
            debug!(channel_id = %channel_id, error = %e, "ledger refused update, rolled back");
            return Err(e);
        }
        Ok(channel)
    }

    /// open a channel, replacing any earlier channel with the same id
    pub fn open(&self, request: &OpenRequest) -> Result<ChannelView> {
        let mut rng = self.child_rng()?;
        let channel_id = match request.channel_id.as_deref() {
            Some(id) => ChannelId::parse(id)?,
            None => ChannelId::generate(&mut rng),
        };

        // rejected deposits fail here, before the id gets a lock
        let deposits = PerParticipant::new(request.deposit_alice, request.deposit_bob);
        let channel = Channel::open(self.params.clone(), deposits, Some(channel_id.clone()), &mut rng)?;

        let lock = self.channel_lock(&channel_id)?;
        let _guard = lock.lock().map_err(|e| Error::Internal(e.to_string()))?;

        self.store.put(channel.clone())?;
        self.ledger.register(LedgerRecord::from_channel(&channel))?;
        let mut active = self.active.write().map_err(|e| Error::Internal(e.to_string()))?;
        *active = Some(channel_id);

        Ok(ChannelView::from(&channel))
    }

    pub fn update(&self, request: &UpdateRequest) -> Result<ChannelView> {
        let channel_id = self.resolve(request.channel_id.as_deref())?;
        let channel = self.mutate(&channel_id, |channel, rng| {
            channel.apply_payment(request.payer, request.delta, rng)
        })?;
        Ok(ChannelView::from(&channel))
    }

    /// sign as one participant, or as both when none is named and the
    /// config allows it
    pub fn cosign(&self, request: &CosignRequest) -> Result<ChannelView> {
        let signature = request
            .signature
            .as_deref()
            .map(StateSignature::from_hex)
            .transpose()?;

        let signers: Vec<(Participant, Option<StateSignature>)> = match (request.participant, signature) {
            (Some(participant), signature) => vec![(participant, signature)],
            (None, Some(_)) => return Err(ValidationError::SignatureWithoutParticipant.into()),
            (None, None) if self.config.cosign_both_by_default => {
                Participant::ALL.into_iter().map(|p| (p, None)).collect()
            }
            (None, None) => return Err(ValidationError::MissingParticipant.into()),
        };

        let channel_id = self.resolve(request.channel_id.as_deref())?;
        let channel = self.mutate(&channel_id, |channel, _| {
            for (participant, signature) in signers {
                channel.collect_signature(participant, signature)?;
            }
            Ok(())
        })?;
        Ok(ChannelView::from(&channel))
    }

    /// cooperative close through the ledger
    ///
    /// a payload the ledger rejects comes back as `verified: false` and the
    /// channel stays signed
    pub fn close(&self, request: &CloseRequest) -> Result<SettlementRecord> {
        let channel_id = self.resolve(request.channel_id.as_deref())?;
        let lock = self.existing_channel_lock(&channel_id)?;
        let _guard = lock.lock().map_err(|e| Error::Internal(e.to_string()))?;

        let Versioned { version, value: mut channel } = self.load(&channel_id)?;
        let payload = channel.closing_payload()?;
        let settlement = self.ledger.cooperative_close(&payload)?;

        if settlement.verified {
            channel.mark_closed()?;
            self.store.compare_and_swap(version, channel)?;
        } else {
            debug!(channel_id = %channel_id, "close rejected by ledger");
        }
        Ok(settlement)
    }

    pub fn state(&self, channel_id: Option<&str>) -> Result<ChannelView> {
        let channel_id = self.resolve(channel_id)?;
        let channel = self.load(&channel_id)?.value;
        Ok(ChannelView::from(&channel))
    }

    pub fn history(&self, channel_id: Option<&str>) -> Result<HistoryView> {
        let channel_id = self.resolve(channel_id)?;
        let channel = self.load(&channel_id)?.value;
        Ok(HistoryView::from(&channel))
    }

    /// full internal state, secrets included
    ///
    /// for the simulation driver and tests, never expose over the wire
    pub fn channel(&self, channel_id: Option<&str>) -> Result<Channel> {
        let channel_id = self.resolve(channel_id)?;
        Ok(self.load(&channel_id)?.value)
    }
}

impl Default for ChannelService<MemoryStore> {
    fn default() -> Self {
        Self::new(ChannelConfig::default())
    }
}
