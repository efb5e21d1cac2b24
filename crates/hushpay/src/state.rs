//! channel lifecycle and public snapshots

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::commitment::Commitment;
use crate::proof::OpeningProof;
use crate::signing::StateSignature;
use crate::types::{Participant, PerParticipant};

/// channel lifecycle
///
/// ```text
/// Open ──update──▶ Active ──cosign×2──▶ Signed ──close──▶ Closed
///                   ▲                     │
///                   └──────update─────────┘
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelStatus {
    /// sequence 0, nothing signed yet
    #[default]
    Open,
    /// updated at least once, at most one signature
    Active,
    /// both parties signed the current sequence
    Signed,
    /// settled, terminal
    Closed,
}

impl ChannelStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelStatus::Open => "open",
            ChannelStatus::Active => "active",
            ChannelStatus::Signed => "signed",
            ChannelStatus::Closed => "closed",
        }
    }

    pub fn can_update(&self) -> bool {
        matches!(self, ChannelStatus::Open | ChannelStatus::Active | ChannelStatus::Signed)
    }

    pub fn can_cosign(&self) -> bool {
        matches!(self, ChannelStatus::Active | ChannelStatus::Signed)
    }

    pub fn can_close(&self) -> bool {
        matches!(self, ChannelStatus::Signed)
    }
}

impl fmt::Display for ChannelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// signatures collected for one sequence, serialized as a partial map
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alice: Option<StateSignature>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bob: Option<StateSignature>,
}

impl SignatureSet {
    pub fn get(&self, participant: Participant) -> Option<&StateSignature> {
        match participant {
            Participant::Alice => self.alice.as_ref(),
            Participant::Bob => self.bob.as_ref(),
        }
    }

    /// record or overwrite a participant's signature
    pub fn insert(&mut self, participant: Participant, signature: StateSignature) {
        match participant {
            Participant::Alice => self.alice = Some(signature),
            Participant::Bob => self.bob = Some(signature),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.alice.is_some() && self.bob.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.alice.is_none() && self.bob.is_none()
    }

    pub fn len(&self) -> usize {
        usize::from(self.alice.is_some()) + usize::from(self.bob.is_some())
    }

    /// both signatures, once complete
    pub fn complete(&self) -> Option<PerParticipant<StateSignature>> {
        Some(PerParticipant::new(self.alice?, self.bob?))
    }
}

/// public fields of a channel at one sequence
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub sequence: u64,
    pub commitments: PerParticipant<Commitment>,
    pub proofs: PerParticipant<OpeningProof>,
    pub signatures: SignatureSet,
}

/// append-only list of superseded snapshots
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelHistory {
    entries: Vec<Snapshot>,
}

impl ChannelHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// archive a snapshot, sequences must strictly increase
    pub(crate) fn push(&mut self, snapshot: Snapshot) -> bool {
        if let Some(last) = self.entries.last() {
            if snapshot.sequence <= last.sequence {
                return false;
            }
        }
        self.entries.push(snapshot);
        true
    }

    pub fn entries(&self) -> &[Snapshot] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
