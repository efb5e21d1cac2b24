//! prime-order subgroup of a safe-prime modp group
//!
//! `p` is a safe prime, `q = (p - 1) / 2` is the order of the subgroup of
//! quadratic residues. `g = 2` generates that subgroup for both shipped
//! moduli. `h` is derived as `g^(H(label) mod q)` so nobody knows
//! `log_g(h)`, which is what makes pedersen commitments binding.

use std::sync::{Arc, OnceLock};

use num_bigint::{BigUint, RandBigInt};
use num_traits::{One, Zero};
use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// default label hashed into the exponent of `h`
pub const DEFAULT_GENERATOR_LABEL: &str = "pedersen-h-generator";

/// RFC 3526 group 14, 2048-bit MODP
const MODP_2048_HEX: &str = concat!(
    "FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD1",
    "29024E088A67CC74020BBEA63B139B22514A08798E3404DD",
    "EF9519B3CD3A431B302B0A6DF25F14374FE1356D6D51C245",
    "E485B576625E7EC6F44C42E9A637ED6B0BFF5CB6F406B7ED",
    "EE386BFB5A899FA5AE9F24117C4B1FE649286651ECE45B3D",
    "C2007CB8A163BF0598DA48361C55D39A69163FA8FD24CF5F",
    "83655D23DCA3AD961C62F356208552BB9ED529077096966D",
    "670C354E4ABC9804F1746C08CA18217C32905E462E36CE3B",
    "E39E772C180E86039B2783A2EC07A28FB5C55DF06F4C52C9",
    "DE2BCBF6955817183995497CEA956AE515D2261898FA0510",
    "15728E5A8AACAA68FFFFFFFFFFFFFFFF",
);

/// RFC 2409 group 1, 768-bit MODP
const MODP_768_HEX: &str = concat!(
    "FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD1",
    "29024E088A67CC74020BBEA63B139B22514A08798E3404DD",
    "EF9519B3CD3A431B302B0A6DF25F14374FE1356D6D51C245",
    "E485B576625E7EC6F44C42E9A63A3620FFFFFFFFFFFFFFFF",
);

/// which safe prime backs the group
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterSet {
    /// 2048-bit modulus, production default
    #[default]
    Modp2048,
    /// 768-bit modulus, fast but weak; for tests and demos only
    Modp768,
}

impl ParameterSet {
    fn modulus_hex(&self) -> &'static str {
        match self {
            ParameterSet::Modp2048 => MODP_2048_HEX,
            ParameterSet::Modp768 => MODP_768_HEX,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ParameterSet::Modp2048 => "modp2048",
            ParameterSet::Modp768 => "modp768",
        }
    }
}

/// public parameters shared by commitments and proofs
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupParameters {
    set: ParameterSet,
    p: BigUint,
    q: BigUint,
    g: BigUint,
    h: BigUint,
}

impl GroupParameters {
    /// build parameters for a modulus and an `h` derivation label
    pub fn new(set: ParameterSet, generator_label: &[u8]) -> Self {
        let p = BigUint::parse_bytes(set.modulus_hex().as_bytes(), 16)
            .expect("modulus constant is valid hex");
        let q: BigUint = (&p - 1u32) / 2u32;
        let g = BigUint::from(2u32);
        let h = g.modpow(&hash_to_scalar(generator_label, &q), &p);
        Self { set, p, q, g, h }
    }

    /// the process-wide default group (2048-bit, default label)
    pub fn shared() -> Arc<GroupParameters> {
        static DEFAULT: OnceLock<Arc<GroupParameters>> = OnceLock::new();
        DEFAULT
            .get_or_init(|| {
                Arc::new(GroupParameters::new(
                    ParameterSet::Modp2048,
                    DEFAULT_GENERATOR_LABEL.as_bytes(),
                ))
            })
            .clone()
    }

    pub fn parameter_set(&self) -> ParameterSet {
        self.set
    }

    pub fn p(&self) -> &BigUint {
        &self.p
    }

    pub fn q(&self) -> &BigUint {
        &self.q
    }

    pub fn g(&self) -> &BigUint {
        &self.g
    }

    pub fn h(&self) -> &BigUint {
        &self.h
    }

    /// width of a group element in bytes
    pub fn element_len(&self) -> usize {
        ((self.p.bits() as usize) + 7) / 8
    }

    /// fixed-width big-endian encoding of a residue
    pub fn element_to_bytes(&self, x: &BigUint) -> Vec<u8> {
        let len = self.element_len();
        let raw = (x % &self.p).to_bytes_be();
        let mut out = vec![0u8; len];
        out[len - raw.len()..].copy_from_slice(&raw);
        out
    }

    /// `g^a * h^b mod p`
    pub fn commit_exponents(&self, a: &BigUint, b: &BigUint) -> BigUint {
        let ga = self.g.modpow(a, &self.p);
        let hb = self.h.modpow(b, &self.p);
        (ga * hb) % &self.p
    }

    /// canonical non-zero residue, i.e. in `[1, p)`
    pub fn is_canonical_element(&self, x: &BigUint) -> bool {
        !x.is_zero() && x < &self.p
    }

    /// member of the order-q subgroup
    ///
    /// costs a full exponentiation, so the hot path only checks
    /// [`GroupParameters::is_canonical_element`]
    pub fn is_subgroup_element(&self, x: &BigUint) -> bool {
        self.is_canonical_element(x) && x.modpow(&self.q, &self.p).is_one()
    }

    pub fn is_canonical_scalar(&self, s: &BigUint) -> bool {
        s < &self.q
    }

    pub fn reduce_scalar(&self, s: &BigUint) -> BigUint {
        s % &self.q
    }

    /// uniform scalar in `[1, q)`
    pub fn random_scalar<R: RngCore + CryptoRng>(&self, rng: &mut R) -> BigUint {
        let one = BigUint::one();
        rng.gen_biguint_range(&one, &self.q)
    }
}

/// derive a non-zero scalar below `q` from seed bytes
///
/// `sha256(seed || attempt_be32) mod q`, retried on zero
pub fn hash_to_scalar(seed: &[u8], q: &BigUint) -> BigUint {
    let mut attempt: u32 = 0;
    loop {
        let mut hasher = Sha256::new();
        hasher.update(seed);
        hasher.update(attempt.to_be_bytes());
        let scalar = BigUint::from_bytes_be(&hasher.finalize()) % q;
        if !scalar.is_zero() {
            return scalar;
        }
        attempt += 1;
    }
}

#[cfg(test)]
impl GroupParameters {
    /// same elements, scalars reduced by the wrong order
    pub(crate) fn with_wrong_order(mut self) -> Self {
        self.q = &self.q - 1u32;
        self
    }
}
