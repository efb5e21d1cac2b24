//! core types shared across the channel

use core::fmt;
use core::ops::{Index, IndexMut};
use core::str::FromStr;

use num_bigint::BigUint;
use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::error::{Error, ValidationError};

/// maximum channel id length in bytes
pub const MAX_CHANNEL_ID_LEN: usize = 128;

/// one side of a two-party channel
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Participant {
    Alice,
    Bob,
}

impl Participant {
    /// canonical order, used wherever both sides are hashed or iterated
    pub const ALL: [Participant; 2] = [Participant::Alice, Participant::Bob];

    pub fn other(&self) -> Participant {
        match self {
            Participant::Alice => Participant::Bob,
            Participant::Bob => Participant::Alice,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Participant::Alice => "alice",
            Participant::Bob => "bob",
        }
    }
}

impl fmt::Display for Participant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Participant {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "alice" => Ok(Participant::Alice),
            "bob" => Ok(Participant::Bob),
            other => Err(ValidationError::UnknownParticipant(other.to_string())),
        }
    }
}

/// one value per participant, serialized as `{"alice": .., "bob": ..}`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerParticipant<T> {
    pub alice: T,
    pub bob: T,
}

impl<T> PerParticipant<T> {
    pub fn new(alice: T, bob: T) -> Self {
        Self { alice, bob }
    }

    /// build both entries from a function of the participant
    pub fn from_fn(mut f: impl FnMut(Participant) -> T) -> Self {
        let alice = f(Participant::Alice);
        let bob = f(Participant::Bob);
        Self { alice, bob }
    }

    /// fallible variant of [`PerParticipant::from_fn`], alice is evaluated first
    pub fn try_from_fn<E>(mut f: impl FnMut(Participant) -> Result<T, E>) -> Result<Self, E> {
        let alice = f(Participant::Alice)?;
        let bob = f(Participant::Bob)?;
        Ok(Self { alice, bob })
    }

    pub fn get(&self, participant: Participant) -> &T {
        match participant {
            Participant::Alice => &self.alice,
            Participant::Bob => &self.bob,
        }
    }

    pub fn get_mut(&mut self, participant: Participant) -> &mut T {
        match participant {
            Participant::Alice => &mut self.alice,
            Participant::Bob => &mut self.bob,
        }
    }

    pub fn as_ref(&self) -> PerParticipant<&T> {
        PerParticipant {
            alice: &self.alice,
            bob: &self.bob,
        }
    }

    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> PerParticipant<U> {
        PerParticipant {
            alice: f(self.alice),
            bob: f(self.bob),
        }
    }

    /// iterate in canonical order
    pub fn iter(&self) -> impl Iterator<Item = (Participant, &T)> {
        Participant::ALL.into_iter().map(move |p| (p, self.get(p)))
    }
}

impl<T> Index<Participant> for PerParticipant<T> {
    type Output = T;

    fn index(&self, participant: Participant) -> &T {
        self.get(participant)
    }
}

impl<T> IndexMut<Participant> for PerParticipant<T> {
    fn index_mut(&mut self, participant: Participant) -> &mut T {
        self.get_mut(participant)
    }
}

/// validated channel identifier
///
/// non-empty, at most [`MAX_CHANNEL_ID_LEN`] bytes of `[A-Za-z0-9._:-]`
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChannelId(String);

impl ChannelId {
    pub fn parse(id: impl Into<String>) -> Result<Self, ValidationError> {
        let id = id.into();
        let well_formed = !id.is_empty()
            && id.len() <= MAX_CHANNEL_ID_LEN
            && id
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b':' | b'-'));
        if well_formed {
            Ok(Self(id))
        } else {
            Err(ValidationError::MalformedChannelId(id))
        }
    }

    /// random id in uuid v4 layout, drawn from the supplied rng
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut bytes = [0u8; 16];
        rng.fill_bytes(&mut bytes);
        let id = uuid::Builder::from_random_bytes(bytes).into_uuid();
        Self(id.hyphenated().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ChannelId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<ChannelId> for String {
    fn from(id: ChannelId) -> String {
        id.0
    }
}

/// parse a minimal lowercase hex string into an integer
///
/// every integer has exactly one accepted encoding, the one
/// `to_str_radix(16)` writes
pub fn parse_hex_biguint(s: &str) -> Result<BigUint, Error> {
    if s.is_empty() || !s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
        return Err(Error::Encoding(format!("not a lowercase hex integer: {s:?}")));
    }
    if s.len() > 1 && s.starts_with('0') {
        return Err(Error::Encoding(format!("hex integer has leading zeros: {s:?}")));
    }
    BigUint::parse_bytes(s.as_bytes(), 16)
        .ok_or_else(|| Error::Encoding(format!("not a hex integer: {s:?}")))
}

/// serde adapter writing integers as minimal lowercase hex strings
pub(crate) mod biguint_hex {
    use num_bigint::BigUint;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &BigUint, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_str_radix(16))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BigUint, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::parse_hex_biguint(&s).map_err(de::Error::custom)
    }
}
