//! two-party channel state machine
//!
//! holds both participants' balances, openings and signing keys. every
//! mutation builds the next state in locals and assigns at the end, so a
//! failed operation leaves the channel as it was.
//!
//! ## flow
//!
//! 1. `open`: commit both deposits at sequence 0
//! 2. `apply_payment`: move funds, recommit under fresh randomness, drop signatures
//! 3. `collect_signature`: each side signs the state digest
//! 4. `closing_payload`: disclose openings once both have signed

use core::fmt;
use std::sync::Arc;

use num_bigint::BigUint;
use rand_core::{CryptoRng, RngCore};
use tracing::{debug, info};

use crate::commitment::{commit, verify_opening, Commitment, Opening};
use crate::error::{Error, Result, ValidationError};
use crate::group::GroupParameters;
use crate::ledger::{ClosingPayload, DisclosedOpening};
use crate::proof::{prove_opening, verify_opening_proof, OpeningProof, ProofContext};
use crate::signing::{self, ParticipantKey, StateDigest, StateSignature, VerifyKey};
use crate::state::{ChannelHistory, ChannelStatus, SignatureSet, Snapshot};
use crate::types::{ChannelId, Participant, PerParticipant};

/// commitments, openings and proofs for one sequence
struct Committed {
    openings: PerParticipant<Opening>,
    commitments: PerParticipant<Commitment>,
    proofs: PerParticipant<OpeningProof>,
}

/// commit both balances under fresh randomness and prove each opening,
/// checking every proof before it leaves this function
fn commit_balances<R: RngCore + CryptoRng>(
    params: &GroupParameters,
    channel_id: &ChannelId,
    sequence: u64,
    balances: &PerParticipant<u64>,
    rng: &mut R,
) -> Result<Committed> {
    let per = PerParticipant::try_from_fn(|participant| -> Result<_> {
        let m = BigUint::from(balances[participant]);
        let (c, opening) = commit(params, &m, rng);
        let ctx = ProofContext::new(channel_id, sequence, participant);
        let proof = prove_opening(params, &c, &m, &opening, &ctx, rng);

        if !verify_opening(params, &c, &m, &opening) {
            return Err(Error::Internal(format!(
                "fresh commitment for {participant} does not open"
            )));
        }
        if !verify_opening_proof(params, &c, &proof, &ctx) {
            return Err(Error::Internal(format!(
                "fresh proof for {participant} failed self-check"
            )));
        }
        Ok((opening, c, proof))
    })?;

    let PerParticipant {
        alice: (alice_opening, alice_commitment, alice_proof),
        bob: (bob_opening, bob_commitment, bob_proof),
    } = per;

    Ok(Committed {
        openings: PerParticipant::new(alice_opening, bob_opening),
        commitments: PerParticipant::new(alice_commitment, bob_commitment),
        proofs: PerParticipant::new(alice_proof, bob_proof),
    })
}

/// authoritative state of one channel
#[derive(Clone)]
pub struct Channel {
    params: Arc<GroupParameters>,
    id: ChannelId,
    sequence: u64,
    status: ChannelStatus,
    balances: PerParticipant<u64>,
    openings: PerParticipant<Opening>,
    commitments: PerParticipant<Commitment>,
    proofs: PerParticipant<OpeningProof>,
    signatures: SignatureSet,
    keys: PerParticipant<ParticipantKey>,
    verify_keys: PerParticipant<VerifyKey>,
    history: ChannelHistory,
}

impl Channel {
    /// open a channel with both deposits committed at sequence 0
    ///
    /// a missing id is generated from `rng`
    pub fn open<R: RngCore + CryptoRng>(
        params: Arc<GroupParameters>,
        deposits: PerParticipant<i64>,
        channel_id: Option<ChannelId>,
        rng: &mut R,
    ) -> Result<Self> {
        let balances = PerParticipant::try_from_fn(|participant| {
            let amount = *deposits.get(participant);
            u64::try_from(amount)
                .map_err(|_| ValidationError::NegativeDeposit { participant, amount })
        })?;
        balances
            .alice
            .checked_add(balances.bob)
            .ok_or(ValidationError::BalanceOverflow)?;

        let id = match channel_id {
            Some(id) => id,
            None => ChannelId::generate(rng),
        };

        let keys = PerParticipant::from_fn(|participant| ParticipantKey::generate(participant, rng));
        let verify_keys = keys.as_ref().map(ParticipantKey::verify_key);

        let committed = commit_balances(&params, &id, 0, &balances, rng)?;

        info!(channel_id = %id, "channel opened");

        Ok(Self {
            params,
            id,
            sequence: 0,
            status: ChannelStatus::Open,
            balances,
            openings: committed.openings,
            commitments: committed.commitments,
            proofs: committed.proofs,
            signatures: SignatureSet::default(),
            keys,
            verify_keys,
            history: ChannelHistory::new(),
        })
    }

    fn require(&self, allowed: bool, expected: &'static str) -> Result<()> {
        if allowed {
            Ok(())
        } else {
            Err(Error::InvalidState {
                channel_id: self.id.to_string(),
                actual: self.status.as_str(),
                expected,
            })
        }
    }

    /// move `delta` from `payer` to the other side and advance the sequence
    pub fn apply_payment<R: RngCore + CryptoRng>(
        &mut self,
        payer: Participant,
        delta: i64,
        rng: &mut R,
    ) -> Result<()> {
        self.require(self.status.can_update(), "open, active or signed")?;

        let amount = match u64::try_from(delta) {
            Ok(amount) if amount > 0 => amount,
            _ => return Err(ValidationError::NonPositiveDelta(delta).into()),
        };

        let payee = payer.other();
        let mut balances = self.balances;
        let available = balances[payer];
        balances[payer] = available.checked_sub(amount).ok_or(
            ValidationError::InsufficientBalance {
                participant: payer,
                balance: available,
                requested: amount,
            },
        )?;
        balances[payee] = balances[payee]
            .checked_add(amount)
            .ok_or(ValidationError::BalanceOverflow)?;

        let sequence = self
            .sequence
            .checked_add(1)
            .ok_or_else(|| Error::Internal("sequence exhausted".into()))?;

        let committed = commit_balances(&self.params, &self.id, sequence, &balances, rng)?;

        // last fallible step, nothing is assigned before it succeeds
        let archived = self.snapshot();
        if !self.history.push(archived) {
            return Err(Error::Internal("history sequence out of order".into()));
        }

        self.sequence = sequence;
        self.status = ChannelStatus::Active;
        self.balances = balances;
        self.openings = committed.openings;
        self.commitments = committed.commitments;
        self.proofs = committed.proofs;
        self.signatures = SignatureSet::default();

        debug!(channel_id = %self.id, sequence, payer = %payer, "payment applied");
        Ok(())
    }

    /// record a signature over the current digest
    ///
    /// signs with the held key when `signature` is `None`, otherwise checks
    /// the supplied one against the participant's verify key
    pub fn collect_signature(
        &mut self,
        participant: Participant,
        signature: Option<StateSignature>,
    ) -> Result<()> {
        self.require(self.status.can_cosign(), "active or signed")?;

        let digest = self.digest();
        let signature = match signature {
            Some(sig) => {
                if !signing::verify(self.verify_keys.get(participant), &digest, &sig) {
                    return Err(Error::Verification);
                }
                sig
            }
            None => self.keys.get(participant).sign(&digest),
        };

        let mut signatures = self.signatures.clone();
        signatures.insert(participant, signature);
        self.status = if signatures.is_complete() {
            ChannelStatus::Signed
        } else {
            ChannelStatus::Active
        };
        self.signatures = signatures;

        debug!(
            channel_id = %self.id,
            sequence = self.sequence,
            participant = %participant,
            status = %self.status,
            "signature collected"
        );
        Ok(())
    }

    /// everything the settlement check needs, openings included
    pub fn closing_payload(&self) -> Result<ClosingPayload> {
        self.require(self.status.can_close(), "signed")?;

        let openings = PerParticipant::from_fn(|participant| DisclosedOpening {
            balance: self.balances[participant],
            opening: self.openings[participant].clone(),
        });

        Ok(ClosingPayload {
            channel_id: self.id.clone(),
            sequence: self.sequence,
            commitments: self.commitments.clone(),
            proofs: self.proofs.clone(),
            signatures: self.signatures.clone(),
            openings,
        })
    }

    /// terminal transition after a verified settlement
    pub fn mark_closed(&mut self) -> Result<()> {
        self.require(self.status.can_close(), "signed")?;
        self.status = ChannelStatus::Closed;
        info!(channel_id = %self.id, sequence = self.sequence, "channel closed");
        Ok(())
    }

    pub fn is_fully_signed(&self) -> bool {
        self.signatures.is_complete()
    }

    /// both signatures present and valid for the current digest
    pub fn verify_signatures(&self) -> bool {
        let digest = self.digest();
        Participant::ALL.into_iter().all(|participant| {
            match self.signatures.get(participant) {
                Some(sig) => signing::verify(self.verify_keys.get(participant), &digest, sig),
                None => false,
            }
        })
    }

    pub fn digest(&self) -> StateDigest {
        signing::state_digest(&self.id, self.sequence, &self.commitments)
    }

    /// public view of the current sequence
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            sequence: self.sequence,
            commitments: self.commitments.clone(),
            proofs: self.proofs.clone(),
            signatures: self.signatures.clone(),
        }
    }

    /// archived snapshots followed by the live one
    pub fn history(&self) -> Vec<Snapshot> {
        let mut entries = self.history.entries().to_vec();
        entries.push(self.snapshot());
        entries
    }

    pub fn id(&self) -> &ChannelId {
        &self.id
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn status(&self) -> ChannelStatus {
        self.status
    }

    pub fn params(&self) -> &Arc<GroupParameters> {
        &self.params
    }

    /// secret, never part of a public view
    pub fn balances(&self) -> PerParticipant<u64> {
        self.balances
    }

    pub fn commitments(&self) -> &PerParticipant<Commitment> {
        &self.commitments
    }

    pub fn proofs(&self) -> &PerParticipant<OpeningProof> {
        &self.proofs
    }

    pub fn signatures(&self) -> &SignatureSet {
        &self.signatures
    }

    pub fn verify_keys(&self) -> &PerParticipant<VerifyKey> {
        &self.verify_keys
    }

    /// signing capability of one side
    pub fn participant_key(&self, participant: Participant) -> &ParticipantKey {
        self.keys.get(participant)
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("id", &self.id)
            .field("sequence", &self.sequence)
            .field("status", &self.status)
            .field("signatures", &self.signatures.len())
            .finish_non_exhaustive()
    }
}
