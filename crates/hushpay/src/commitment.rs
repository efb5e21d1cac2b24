//! pedersen commitments over the modp subgroup
//!
//! ```text
//! C = g^m · h^r mod p
//! ```
//!
//! perfectly hiding, computationally binding under discrete log. the scheme
//! is additively homomorphic:
//!
//! ```text
//! C₁ · C₂ = g^(m₁+m₂) · h^(r₁+r₂)
//! ```

use core::fmt;

use num_bigint::BigUint;
use num_traits::One;
use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::group::GroupParameters;
use crate::types::{biguint_hex, parse_hex_biguint};

/// a commitment `C`, public
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Commitment(#[serde(with = "biguint_hex")] BigUint);

impl Commitment {
    pub fn from_value(value: BigUint) -> Self {
        Self(value)
    }

    pub fn value(&self) -> &BigUint {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        self.0.to_str_radix(16)
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        parse_hex_biguint(s).map(Self)
    }

    /// homomorphic addition `C₁ · C₂ mod p`
    pub fn add(&self, other: &Commitment, params: &GroupParameters) -> Commitment {
        Commitment((&self.0 * &other.0) % params.p())
    }

    /// fold any number of commitments, the empty fold is the identity
    pub fn add_all<'a>(
        commitments: impl IntoIterator<Item = &'a Commitment>,
        params: &GroupParameters,
    ) -> Commitment {
        let acc = commitments
            .into_iter()
            .fold(BigUint::one(), |acc, c| (acc * &c.0) % params.p());
        Commitment(acc)
    }

    /// inverse element, a commitment to `-m` under `-r`
    pub fn negate(&self, params: &GroupParameters) -> Commitment {
        // p is prime, so x^(p-2) is the inverse
        let exponent = params.p() - 2u32;
        Commitment(self.0.modpow(&exponent, params.p()))
    }

    /// `self - other` in the exponent
    pub fn difference(&self, other: &Commitment, params: &GroupParameters) -> Commitment {
        self.add(&other.negate(params), params)
    }
}

impl fmt::Debug for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.to_hex();
        let head = &hex[..hex.len().min(16)];
        write!(f, "Commitment({head}..)")
    }
}

/// blinding factor `r` needed to open a commitment, secret
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Opening {
    #[serde(with = "biguint_hex")]
    randomness: BigUint,
}

impl Opening {
    pub fn new(randomness: BigUint) -> Self {
        Self { randomness }
    }

    pub fn randomness(&self) -> &BigUint {
        &self.randomness
    }

    /// opening of a homomorphic sum, `r₁ + r₂ mod q`
    pub fn add(&self, other: &Opening, params: &GroupParameters) -> Opening {
        Opening {
            randomness: (&self.randomness + &other.randomness) % params.q(),
        }
    }

    pub fn to_hex(&self) -> String {
        self.randomness.to_str_radix(16)
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        parse_hex_biguint(s).map(Self::new)
    }
}

impl fmt::Debug for Opening {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Opening(<redacted>)")
    }
}

/// commit to `message` under fresh randomness from `rng`
pub fn commit<R: RngCore + CryptoRng>(
    params: &GroupParameters,
    message: &BigUint,
    rng: &mut R,
) -> (Commitment, Opening) {
    let opening = Opening::new(params.random_scalar(rng));
    let commitment = commit_with(params, message, &opening);
    (commitment, opening)
}

/// commit to `message` under a given opening
pub fn commit_with(params: &GroupParameters, message: &BigUint, opening: &Opening) -> Commitment {
    let m = params.reduce_scalar(message);
    Commitment(params.commit_exponents(&m, &opening.randomness))
}

/// check that `commitment` opens to `message` under `opening`
pub fn verify_opening(
    params: &GroupParameters,
    commitment: &Commitment,
    message: &BigUint,
    opening: &Opening,
) -> bool {
    if !params.is_canonical_element(&commitment.0) {
        return false;
    }
    commit_with(params, message, opening) == *commitment
}

/// sum messages mod q, matching the exponent arithmetic of [`Commitment::add_all`]
pub fn add_messages<'a>(
    messages: impl IntoIterator<Item = &'a BigUint>,
    params: &GroupParameters,
) -> BigUint {
    messages
        .into_iter()
        .fold(BigUint::default(), |acc, m| (acc + m) % params.q())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::{ParameterSet, DEFAULT_GENERATOR_LABEL};
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn params() -> GroupParameters {
        GroupParameters::new(ParameterSet::Modp768, DEFAULT_GENERATOR_LABEL.as_bytes())
    }

    fn flip_bit(x: &BigUint, bit: u64) -> BigUint {
        let mut y = x.clone();
        y.set_bit(bit, !x.bit(bit));
        y
    }

    #[test]
    fn test_commit_verify_roundtrip() {
        let params = params();
        let mut rng = ChaCha20Rng::seed_from_u64(11);
        let m = BigUint::from(123u32);
        let (c, opening) = commit(&params, &m, &mut rng);

        assert!(verify_opening(&params, &c, &m, &opening));
        assert!(!verify_opening(&params, &c, &BigUint::from(124u32), &opening));
    }

    #[test]
    fn test_bit_flips_break_opening() {
        let params = params();
        let mut rng = ChaCha20Rng::seed_from_u64(12);
        let m = BigUint::from(77u32);
        let (c, opening) = commit(&params, &m, &mut rng);

        for bit in [0u64, 3, 31] {
            assert!(!verify_opening(&params, &c, &flip_bit(&m, bit), &opening));
            let r = Opening::new(flip_bit(opening.randomness(), bit));
            assert!(!verify_opening(&params, &c, &m, &r));
            let c2 = Commitment::from_value(flip_bit(c.value(), bit));
            assert!(!verify_opening(&params, &c2, &m, &opening));
        }
    }

    #[test]
    fn test_message_reduced_mod_q() {
        let params = params();
        let opening = Opening::new(BigUint::from(5u32));
        let m = BigUint::from(9u32);
        let wrapped = &m + params.q();
        assert_eq!(commit_with(&params, &m, &opening), commit_with(&params, &wrapped, &opening));
    }

    #[test]
    fn test_homomorphic_addition() {
        let params = params();
        let mut rng = ChaCha20Rng::seed_from_u64(13);
        let (m1, m2) = (BigUint::from(40u32), BigUint::from(60u32));
        let (c1, o1) = commit(&params, &m1, &mut rng);
        let (c2, o2) = commit(&params, &m2, &mut rng);

        let sum = c1.add(&c2, &params);
        let m_sum = add_messages([&m1, &m2], &params);
        let o_sum = o1.add(&o2, &params);

        assert_eq!(sum, commit_with(&params, &m_sum, &o_sum));
        assert_eq!(Commitment::add_all([&c1, &c2], &params), sum);
    }

    #[test]
    fn test_difference_cancels() {
        let params = params();
        let mut rng = ChaCha20Rng::seed_from_u64(14);
        let m = BigUint::from(5u32);
        let (c, _) = commit(&params, &m, &mut rng);

        let zero = c.difference(&c, &params);
        assert_eq!(zero.value(), &BigUint::one());
        assert_eq!(Commitment::add_all(Vec::<&Commitment>::new(), &params), zero);
    }

    #[test]
    fn test_non_canonical_commitment_rejected() {
        let params = params();
        let mut rng = ChaCha20Rng::seed_from_u64(15);
        let m = BigUint::from(1u32);
        let (c, opening) = commit(&params, &m, &mut rng);
        let shifted = Commitment::from_value(c.value() + params.p());
        assert!(!verify_opening(&params, &shifted, &m, &opening));
    }

    #[test]
    fn test_hex_roundtrip_and_redacted_debug() {
        let params = params();
        let mut rng = ChaCha20Rng::seed_from_u64(16);
        let (c, opening) = commit(&params, &BigUint::from(3u32), &mut rng);
        assert_eq!(Commitment::from_hex(&c.to_hex()).unwrap(), c);
        assert_eq!(Opening::from_hex(&opening.to_hex()).unwrap(), opening);
        assert!(!format!("{opening:?}").contains(&opening.to_hex()));
    }
}
