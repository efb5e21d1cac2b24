//! ed25519 co-signatures over channel state
//!
//! both parties sign the same digest of `(channel_id, sequence, commitments)`.
//! proofs are not covered, they are recomputable from commitments and context.

use core::fmt;

use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use rand_core::{CryptoRng, RngCore};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::commitment::Commitment;
use crate::error::{Error, Result};
use crate::transcript::Transcript;
use crate::types::{ChannelId, Participant, PerParticipant};

const DIGEST_DOMAIN: &[u8] = b"hushpay/state-digest/v1";

/// the 32 bytes every co-signature covers
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StateDigest([u8; 32]);

impl StateDigest {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

/// digest of a channel state, shared by the signer and the settlement check
pub fn state_digest(
    channel_id: &ChannelId,
    sequence: u64,
    commitments: &PerParticipant<Commitment>,
) -> StateDigest {
    let mut transcript = Transcript::new(DIGEST_DOMAIN);
    transcript.append_message(b"channel_id", channel_id.as_str().as_bytes());
    transcript.append_u64(b"sequence", sequence);
    for (participant, commitment) in commitments.iter() {
        transcript.append_biguint(participant.as_str().as_bytes(), commitment.value());
    }
    StateDigest(transcript.finalize())
}

/// public half of a participant's key
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct VerifyKey(VerifyingKey);

impl VerifyKey {
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0.to_bytes())
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes: [u8; 32] = decode_fixed(s, "verify key")?;
        VerifyingKey::from_bytes(&bytes)
            .map(Self)
            .map_err(|_| Error::Encoding("verify key is not a valid curve point".into()))
    }
}

impl fmt::Debug for VerifyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VerifyKey({})", self.to_hex())
    }
}

/// a detached signature over a [`StateDigest`]
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct StateSignature(Signature);

impl StateSignature {
    pub fn to_bytes(&self) -> [u8; 64] {
        self.0.to_bytes()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0.to_bytes())
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes: [u8; 64] = decode_fixed(s, "signature")?;
        Ok(Self(Signature::from_bytes(&bytes)))
    }
}

impl fmt::Debug for StateSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.to_hex();
        write!(f, "StateSignature({}..)", &hex[..16])
    }
}

fn decode_fixed<const N: usize>(s: &str, what: &str) -> Result<[u8; N]> {
    let bytes = hex::decode(s).map_err(|e| Error::Encoding(format!("{what}: {e}")))?;
    bytes
        .try_into()
        .map_err(|b: Vec<u8>| Error::Encoding(format!("{what}: expected {N} bytes, got {}", b.len())))
}

/// signing capability of exactly one participant
///
/// the service holds both in simulation. a two-process deployment hands each
/// side only its own key.
#[derive(Clone)]
pub struct ParticipantKey {
    participant: Participant,
    signing_key: SigningKey,
}

impl ParticipantKey {
    pub fn generate<R: RngCore + CryptoRng>(participant: Participant, rng: &mut R) -> Self {
        Self {
            participant,
            signing_key: SigningKey::generate(rng),
        }
    }

    pub fn participant(&self) -> Participant {
        self.participant
    }

    pub fn verify_key(&self) -> VerifyKey {
        VerifyKey(self.signing_key.verifying_key())
    }

    pub fn sign(&self, digest: &StateDigest) -> StateSignature {
        StateSignature(self.signing_key.sign(digest.as_bytes()))
    }
}

impl fmt::Debug for ParticipantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParticipantKey")
            .field("participant", &self.participant)
            .field("verify_key", &self.verify_key())
            .finish_non_exhaustive()
    }
}

/// fresh keypair for one participant
pub fn keygen<R: RngCore + CryptoRng>(
    participant: Participant,
    rng: &mut R,
) -> (VerifyKey, ParticipantKey) {
    let key = ParticipantKey::generate(participant, rng);
    (key.verify_key(), key)
}

/// strict ed25519 verification, rejects malleable encodings
pub fn verify(key: &VerifyKey, digest: &StateDigest, signature: &StateSignature) -> bool {
    key.0.verify_strict(digest.as_bytes(), &signature.0).is_ok()
}

macro_rules! impl_hex_serde {
    ($ty:ty) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> core::result::Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                <$ty>::from_hex(&s).map_err(de::Error::custom)
            }
        }
    };
}

impl_hex_serde!(VerifyKey);
impl_hex_serde!(StateSignature);

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigUint;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn commitments(a: u32, b: u32) -> PerParticipant<Commitment> {
        PerParticipant::new(
            Commitment::from_value(BigUint::from(a)),
            Commitment::from_value(BigUint::from(b)),
        )
    }

    #[test]
    fn test_sign_verify() {
        let mut rng = ChaCha20Rng::seed_from_u64(31);
        let (vk, key) = keygen(Participant::Alice, &mut rng);
        let id = ChannelId::parse("chan").unwrap();
        let digest = state_digest(&id, 3, &commitments(5, 7));

        let sig = key.sign(&digest);
        assert!(verify(&vk, &digest, &sig));

        let (other_vk, _) = keygen(Participant::Bob, &mut rng);
        assert!(!verify(&other_vk, &digest, &sig));
    }

    #[test]
    fn test_signature_freshness() {
        let mut rng = ChaCha20Rng::seed_from_u64(32);
        let (vk, key) = keygen(Participant::Bob, &mut rng);
        let id = ChannelId::parse("chan").unwrap();
        let c = commitments(5, 7);

        let sig = key.sign(&state_digest(&id, 1, &c));
        assert!(!verify(&vk, &state_digest(&id, 2, &c), &sig));
    }

    #[test]
    fn test_digest_binds_every_field() {
        let id = ChannelId::parse("chan").unwrap();
        let other = ChannelId::parse("chan2").unwrap();
        let base = state_digest(&id, 1, &commitments(5, 7));

        assert_eq!(base, state_digest(&id, 1, &commitments(5, 7)));
        assert_ne!(base, state_digest(&other, 1, &commitments(5, 7)));
        assert_ne!(base, state_digest(&id, 1, &commitments(7, 5)));
        assert_ne!(base, state_digest(&id, 1, &commitments(5, 8)));
    }

    #[test]
    fn test_hex_encodings() {
        let mut rng = ChaCha20Rng::seed_from_u64(33);
        let (vk, key) = keygen(Participant::Alice, &mut rng);
        let sig = key.sign(&StateDigest([1u8; 32]));

        assert_eq!(vk.to_hex().len(), 64);
        assert_eq!(sig.to_hex().len(), 128);
        assert_eq!(VerifyKey::from_hex(&vk.to_hex()).unwrap(), vk);
        assert_eq!(StateSignature::from_hex(&sig.to_hex()).unwrap(), sig);

        assert!(VerifyKey::from_hex("abcd").is_err());
        assert!(StateSignature::from_hex("zz").is_err());

        let json = serde_json::to_string(&sig).unwrap();
        assert_eq!(json, format!("\"{}\"", sig.to_hex()));
    }

    #[test]
    fn test_key_debug_hides_secret() {
        let mut rng = ChaCha20Rng::seed_from_u64(34);
        let key = ParticipantKey::generate(Participant::Alice, &mut rng);
        let secret = hex::encode(key.signing_key.to_bytes());
        assert!(!format!("{key:?}").contains(&secret));
    }
}
