//! settlement verifier
//!
//! keeps its own copy of each channel's latest public state and checks
//! closing payloads against it. never sees balances or openings until a
//! payload discloses them, so it models an untrusted third party.
//!
//! a cooperative close passes four checks, in order:
//!
//! 1. payload sequence, commitments and proofs equal the recorded ones
//! 2. both signatures verify over the recorded state digest
//! 3. both disclosed openings open the recorded commitments
//! 4. both recorded proofs verify under their context
//!
//! the outcome is a single bool, which check failed is not reported.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::channel::Channel;
use crate::commitment::{verify_opening, Commitment, Opening};
use crate::error::{Error, Result};
use crate::group::GroupParameters;
use crate::proof::{verify_opening_proof, OpeningProof, ProofContext};
use crate::signing::{self, VerifyKey};
use crate::state::SignatureSet;
use crate::types::{ChannelId, Participant, PerParticipant};

/// the verifier's copy of a channel's public state
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub channel_id: ChannelId,
    pub sequence: u64,
    pub commitments: PerParticipant<Commitment>,
    pub proofs: PerParticipant<OpeningProof>,
    pub verify_keys: PerParticipant<VerifyKey>,
    #[serde(default)]
    pub closed: bool,
}

impl LedgerRecord {
    pub fn from_channel(channel: &Channel) -> Self {
        Self {
            channel_id: channel.id().clone(),
            sequence: channel.sequence(),
            commitments: channel.commitments().clone(),
            proofs: channel.proofs().clone(),
            verify_keys: *channel.verify_keys(),
            closed: false,
        }
    }
}

/// a balance and its blinding factor, disclosed only at close
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisclosedOpening {
    pub balance: u64,
    #[serde(flatten)]
    pub opening: Opening,
}

/// what a channel hands the verifier to settle
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosingPayload {
    pub channel_id: ChannelId,
    pub sequence: u64,
    pub commitments: PerParticipant<Commitment>,
    pub proofs: PerParticipant<OpeningProof>,
    pub signatures: SignatureSet,
    pub openings: PerParticipant<DisclosedOpening>,
}

/// outcome of a cooperative close
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementRecord {
    pub channel_id: ChannelId,
    pub sequence: u64,
    /// present only when verified
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settled_balances: Option<PerParticipant<u64>>,
    pub verified: bool,
}

/// check a closing payload against a ledger record
///
/// pure, touches nothing but its arguments
pub fn verify_settlement(
    params: &GroupParameters,
    record: &LedgerRecord,
    payload: &ClosingPayload,
) -> bool {
    // 1. anti-tamper
    if payload.channel_id != record.channel_id
        || payload.sequence != record.sequence
        || payload.commitments != record.commitments
        || payload.proofs != record.proofs
    {
        return false;
    }

    // 2. co-signatures
    let Some(signatures) = payload.signatures.complete() else {
        return false;
    };
    let digest = signing::state_digest(&record.channel_id, record.sequence, &record.commitments);
    let signed = Participant::ALL.into_iter().all(|participant| {
        signing::verify(&record.verify_keys[participant], &digest, &signatures[participant])
    });
    if !signed {
        return false;
    }

    // 3. openings
    let opened = Participant::ALL.into_iter().all(|participant| {
        let disclosed = &payload.openings[participant];
        verify_opening(
            params,
            &record.commitments[participant],
            &BigUint::from(disclosed.balance),
            &disclosed.opening,
        )
    });
    if !opened {
        return false;
    }

    // 4. recorded proofs
    Participant::ALL.into_iter().all(|participant| {
        let ctx = ProofContext::new(&record.channel_id, record.sequence, participant);
        verify_opening_proof(
            params,
            &record.commitments[participant],
            &record.proofs[participant],
            &ctx,
        )
    })
}

/// in-process settlement verifier
pub struct Ledger {
    params: Arc<GroupParameters>,
    records: RwLock<HashMap<ChannelId, LedgerRecord>>,
}

impl Ledger {
    pub fn new(params: Arc<GroupParameters>) -> Self {
        Self {
            params,
            records: RwLock::new(HashMap::new()),
        }
    }

    pub fn params(&self) -> &Arc<GroupParameters> {
        &self.params
    }

    /// record a freshly opened channel, replacing any earlier one with the same id
    pub fn register(&self, record: LedgerRecord) -> Result<()> {
        let mut records = self.records.write().map_err(|e| Error::Storage(e.to_string()))?;
        debug!(channel_id = %record.channel_id, "ledger record registered");
        records.insert(record.channel_id.clone(), record);
        Ok(())
    }

    /// record a later state of a registered channel
    ///
    /// refuses a lower sequence than the recorded one and any write to a
    /// closed record
    pub fn publish(&self, record: LedgerRecord) -> Result<()> {
        let mut records = self.records.write().map_err(|e| Error::Storage(e.to_string()))?;
        let current = records
            .get(&record.channel_id)
            .ok_or_else(|| Error::NotFound(record.channel_id.to_string()))?;

        if current.closed {
            return Err(Error::InvalidState {
                channel_id: record.channel_id.to_string(),
                actual: "closed",
                expected: "open",
            });
        }
        if record.sequence < current.sequence {
            return Err(Error::StaleState {
                channel_id: record.channel_id.to_string(),
                recorded: current.sequence,
                offered: record.sequence,
            });
        }

        debug!(channel_id = %record.channel_id, sequence = record.sequence, "ledger record published");
        records.insert(record.channel_id.clone(), record);
        Ok(())
    }

    pub fn record(&self, channel_id: &ChannelId) -> Result<Option<LedgerRecord>> {
        let records = self.records.read().map_err(|e| Error::Storage(e.to_string()))?;
        Ok(records.get(channel_id).cloned())
    }

    /// settle a channel from its closing payload
    ///
    /// a failed check is `verified: false`, not an error. unknown channels
    /// and already closed records are errors.
    pub fn cooperative_close(&self, payload: &ClosingPayload) -> Result<SettlementRecord> {
        let record = self
            .record(&payload.channel_id)?
            .ok_or_else(|| Error::NotFound(payload.channel_id.to_string()))?;
        if record.closed {
            return Err(Error::InvalidState {
                channel_id: record.channel_id.to_string(),
                actual: "closed",
                expected: "signed",
            });
        }

        if !verify_settlement(&self.params, &record, payload) {
            warn!(channel_id = %record.channel_id, sequence = record.sequence, "settlement rejected");
            return Ok(SettlementRecord {
                channel_id: record.channel_id,
                sequence: record.sequence,
                settled_balances: None,
                verified: false,
            });
        }

        let mut records = self.records.write().map_err(|e| Error::Storage(e.to_string()))?;
        match records.get_mut(&record.channel_id) {
            Some(current) if !current.closed && current.sequence == record.sequence => {
                current.closed = true;
            }
            _ => return Err(Error::Conflict(record.channel_id.to_string())),
        }

        info!(channel_id = %record.channel_id, sequence = record.sequence, "channel settled");
        Ok(SettlementRecord {
            channel_id: record.channel_id,
            sequence: record.sequence,
            settled_balances: Some(payload.openings.as_ref().map(|o| o.balance)),
            verified: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::{ParameterSet, DEFAULT_GENERATOR_LABEL};
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn params() -> Arc<GroupParameters> {
        Arc::new(GroupParameters::new(
            ParameterSet::Modp768,
            DEFAULT_GENERATOR_LABEL.as_bytes(),
        ))
    }

    /// channel at sequence 1, both signed, registered in a fresh ledger
    fn signed_channel(seed: u64) -> (Ledger, Channel) {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let params = params();
        let ledger = Ledger::new(params.clone());
        let mut channel = Channel::open(params, PerParticipant::new(100, 25), None, &mut rng).unwrap();
        ledger.register(LedgerRecord::from_channel(&channel)).unwrap();

        channel.apply_payment(Participant::Alice, 10, &mut rng).unwrap();
        channel.collect_signature(Participant::Alice, None).unwrap();
        channel.collect_signature(Participant::Bob, None).unwrap();
        ledger.publish(LedgerRecord::from_channel(&channel)).unwrap();
        (ledger, channel)
    }

    #[test]
    fn test_honest_close_settles() {
        let (ledger, channel) = signed_channel(61);
        let payload = channel.closing_payload().unwrap();

        let record = ledger.record(channel.id()).unwrap().unwrap();
        assert!(verify_settlement(ledger.params(), &record, &payload));

        let settlement = ledger.cooperative_close(&payload).unwrap();
        assert!(settlement.verified);
        assert_eq!(settlement.settled_balances, Some(PerParticipant::new(90, 35)));
        assert!(ledger.record(channel.id()).unwrap().unwrap().closed);

        // second close of the same record
        assert!(matches!(
            ledger.cooperative_close(&payload),
            Err(Error::InvalidState { .. })
        ));
    }

    #[test]
    fn test_each_check_can_fail() {
        let (ledger, channel) = signed_channel(62);
        let payload = channel.closing_payload().unwrap();
        let record = ledger.record(channel.id()).unwrap().unwrap();
        let params = ledger.params();

        let mut stale = payload.clone();
        stale.sequence = 0;
        assert!(!verify_settlement(params, &record, &stale));

        let mut swapped = payload.clone();
        swapped.commitments = PerParticipant::new(
            payload.commitments.bob.clone(),
            payload.commitments.alice.clone(),
        );
        assert!(!verify_settlement(params, &record, &swapped));

        let mut unsigned = payload.clone();
        unsigned.signatures.bob = None;
        assert!(!verify_settlement(params, &record, &unsigned));

        let mut crossed = payload.clone();
        crossed.signatures.bob = crossed.signatures.alice;
        assert!(!verify_settlement(params, &record, &crossed));

        let mut inflated = payload.clone();
        inflated.openings.alice.balance += 1;
        assert!(!verify_settlement(params, &record, &inflated));

        let mut reblinded = payload.clone();
        reblinded.openings.bob.opening = payload.openings.alice.opening.clone();
        assert!(!verify_settlement(params, &record, &reblinded));
    }

    #[test]
    fn test_bad_recorded_proof_fails() {
        let (ledger, channel) = signed_channel(63);
        let mut payload = channel.closing_payload().unwrap();
        let mut record = ledger.record(channel.id()).unwrap().unwrap();

        // proofs swapped consistently in both, so only step 4 can catch it
        let proofs = PerParticipant::new(record.proofs.bob.clone(), record.proofs.alice.clone());
        record.proofs = proofs.clone();
        payload.proofs = proofs;
        assert!(!verify_settlement(ledger.params(), &record, &payload));
    }

    #[test]
    fn test_rejected_close_leaves_record_open() {
        let (ledger, channel) = signed_channel(64);
        let mut payload = channel.closing_payload().unwrap();
        payload.openings.bob.balance = 0;

        let settlement = ledger.cooperative_close(&payload).unwrap();
        assert!(!settlement.verified);
        assert!(settlement.settled_balances.is_none());
        assert!(!ledger.record(channel.id()).unwrap().unwrap().closed);
    }

    #[test]
    fn test_publish_guards() {
        let (ledger, channel) = signed_channel(65);
        let mut old = LedgerRecord::from_channel(&channel);
        old.sequence = 0;
        assert!(matches!(
            ledger.publish(old),
            Err(Error::StaleState { recorded: 1, offered: 0, .. })
        ));

        let mut unknown = LedgerRecord::from_channel(&channel);
        unknown.channel_id = ChannelId::parse("nobody").unwrap();
        assert!(ledger.publish(unknown.clone()).unwrap_err().is_not_found());

        let payload = ClosingPayload {
            channel_id: unknown.channel_id.clone(),
            ..channel.closing_payload().unwrap()
        };
        assert!(ledger.cooperative_close(&payload).unwrap_err().is_not_found());
    }

    #[test]
    fn test_settlement_serializes_without_balances_when_rejected() {
        let record = SettlementRecord {
            channel_id: ChannelId::parse("c").unwrap(),
            sequence: 3,
            settled_balances: None,
            verified: false,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("settled_balances").is_none());
        assert_eq!(json["verified"], false);
    }
}
