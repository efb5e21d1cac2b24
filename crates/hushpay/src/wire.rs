//! request and response shapes for the http layer
//!
//! views never carry balances or blinding factors. group elements and
//! scalars are lowercase hex, keys and signatures are hex, amounts are
//! plain integers.

use serde::{Deserialize, Serialize};

use crate::channel::Channel;
use crate::commitment::Commitment;
use crate::proof::OpeningProof;
use crate::signing::VerifyKey;
use crate::state::{ChannelStatus, SignatureSet, Snapshot};
use crate::types::{ChannelId, Participant, PerParticipant};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenRequest {
    pub deposit_alice: i64,
    pub deposit_bob: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateRequest {
    pub delta: i64,
    pub payer: Participant,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CosignRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant: Option<Participant>,
    /// hex ed25519 signature, the service signs itself when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
}

/// public state of a channel
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelView {
    pub channel_id: ChannelId,
    pub sequence: u64,
    pub status: ChannelStatus,
    pub commitments: PerParticipant<Commitment>,
    pub proofs: PerParticipant<OpeningProof>,
    pub signatures: SignatureSet,
    pub verify_keys: PerParticipant<VerifyKey>,
}

impl From<&Channel> for ChannelView {
    fn from(channel: &Channel) -> Self {
        Self {
            channel_id: channel.id().clone(),
            sequence: channel.sequence(),
            status: channel.status(),
            commitments: channel.commitments().clone(),
            proofs: channel.proofs().clone(),
            signatures: channel.signatures().clone(),
            verify_keys: *channel.verify_keys(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryView {
    pub channel_id: ChannelId,
    pub history: Vec<Snapshot>,
}

impl From<&Channel> for HistoryView {
    fn from(channel: &Channel) -> Self {
        Self {
            channel_id: channel.id().clone(),
            history: channel.history(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requests_parse_with_optional_fields() {
        let open: OpenRequest = serde_json::from_str(r#"{"deposit_alice":100,"deposit_bob":25}"#).unwrap();
        assert_eq!(open.channel_id, None);

        let update: UpdateRequest = serde_json::from_str(r#"{"delta":10,"payer":"alice"}"#).unwrap();
        assert_eq!(update.payer, Participant::Alice);

        let cosign: CosignRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(cosign, CosignRequest::default());

        assert!(serde_json::from_str::<UpdateRequest>(r#"{"delta":1,"payer":"carol"}"#).is_err());
    }
}
