//! non-interactive proof of knowledge of a commitment opening
//!
//! schnorr protocol for the relation `C = g^m h^r`, made non-interactive
//! with fiat-shamir:
//!
//! ```text
//! prover:   w_m, w_r <- [1, q)
//!           t   = g^w_m · h^w_r
//!           c   = H(domain ‖ context ‖ C ‖ t) mod q
//!           s_m = w_m + c·m mod q
//!           s_r = w_r + c·r mod q
//!
//! verifier: g^s_m · h^s_r == t · C^c
//! ```
//!
//! the context binds the proof to `(channel_id, sequence, participant)`, so
//! a proof published for one state never verifies for another.

use num_bigint::BigUint;
use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::commitment::{Commitment, Opening};
use crate::group::GroupParameters;
use crate::transcript::Transcript;
use crate::types::{biguint_hex, ChannelId, Participant};

const PROOF_DOMAIN: &[u8] = b"hushpay/opening-proof/v1";

/// what a proof is bound to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProofContext<'a> {
    pub channel_id: &'a ChannelId,
    pub sequence: u64,
    pub participant: Participant,
}

impl<'a> ProofContext<'a> {
    pub fn new(channel_id: &'a ChannelId, sequence: u64, participant: Participant) -> Self {
        Self {
            channel_id,
            sequence,
            participant,
        }
    }

    /// deterministic encoding hashed into the challenge
    pub fn to_bytes(&self) -> Vec<u8> {
        let id = self.channel_id.as_str().as_bytes();
        let tag = self.participant.as_str().as_bytes();
        let mut buf = Vec::with_capacity(4 + id.len() + 8 + 4 + tag.len());
        buf.extend_from_slice(&(id.len() as u32).to_be_bytes());
        buf.extend_from_slice(id);
        buf.extend_from_slice(&self.sequence.to_be_bytes());
        buf.extend_from_slice(&(tag.len() as u32).to_be_bytes());
        buf.extend_from_slice(tag);
        buf
    }
}

/// proof `(t, s_m, s_r)`
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OpeningProof {
    #[serde(with = "biguint_hex")]
    pub t: BigUint,
    #[serde(with = "biguint_hex")]
    pub response_m: BigUint,
    #[serde(with = "biguint_hex")]
    pub response_r: BigUint,
}

fn compute_challenge(
    params: &GroupParameters,
    commitment: &Commitment,
    t: &BigUint,
    context: &ProofContext<'_>,
) -> BigUint {
    let mut transcript = Transcript::new(PROOF_DOMAIN);
    transcript.append_message(b"context", &context.to_bytes());
    transcript.append_message(b"commitment", &params.element_to_bytes(commitment.value()));
    transcript.append_message(b"t", &params.element_to_bytes(t));
    transcript.challenge_scalar(b"c", params.q())
}

/// prove knowledge of `(message, opening)` behind `commitment`
pub fn prove_opening<R: RngCore + CryptoRng>(
    params: &GroupParameters,
    commitment: &Commitment,
    message: &BigUint,
    opening: &Opening,
    context: &ProofContext<'_>,
    rng: &mut R,
) -> OpeningProof {
    let w_m = params.random_scalar(rng);
    let w_r = params.random_scalar(rng);
    let t = params.commit_exponents(&w_m, &w_r);

    let c = compute_challenge(params, commitment, &t, context);

    let m = params.reduce_scalar(message);
    let response_m = (w_m + &c * m) % params.q();
    let response_r = (w_r + &c * opening.randomness()) % params.q();

    OpeningProof {
        t,
        response_m,
        response_r,
    }
}

/// verify a proof for `commitment` under `context`
///
/// returns false on any mismatch, without saying which
pub fn verify_opening_proof(
    params: &GroupParameters,
    commitment: &Commitment,
    proof: &OpeningProof,
    context: &ProofContext<'_>,
) -> bool {
    let canonical = params.is_canonical_element(commitment.value())
        && params.is_canonical_element(&proof.t)
        && params.is_canonical_scalar(&proof.response_m)
        && params.is_canonical_scalar(&proof.response_r);
    if !canonical {
        return false;
    }

    let c = compute_challenge(params, commitment, &proof.t, context);
    let lhs = params.commit_exponents(&proof.response_m, &proof.response_r);
    let rhs = (&proof.t * commitment.value().modpow(&c, params.p())) % params.p();
    lhs == rhs
}
