//! # hushpay
//!
//! two-party micropayment channels whose balances stay hidden until the
//! cooperative close.
//!
//! every state carries a pedersen commitment to each balance, a schnorr
//! proof that the committer knows the opening, and ed25519 co-signatures
//! over a digest of the commitments. only the closing payload discloses
//! openings, and an independent ledger re-checks everything before it
//! settles.
//!
//! ## flow
//!
//! ```text
//!  open(100, 25)          seq 0   C_a = g^100 h^r₀   C_b = g^25 h^r₁
//!       │
//!  update(alice → bob, 10) seq 1   C_a = g^90 h^r₂    C_b = g^35 h^r₃
//!       │
//!  cosign(alice, bob)      sig_a, sig_b over H(id ‖ 1 ‖ C_a ‖ C_b)
//!       │
//!  close ──────────────▶ ledger: records match, sigs verify,
//!                                openings open, proofs verify
//!                                ⇒ settled {alice: 90, bob: 35}
//! ```
//!
//! ## usage
//!
//! ```rust,ignore
//! use hushpay::{ChannelConfig, ChannelService, Participant};
//! use hushpay::wire::{CloseRequest, CosignRequest, OpenRequest, UpdateRequest};
//!
//! let service = ChannelService::new(ChannelConfig::default());
//! service.open(&OpenRequest { deposit_alice: 100, deposit_bob: 25, channel_id: None })?;
//! service.update(&UpdateRequest { delta: 10, payer: Participant::Alice, channel_id: None })?;
//! service.cosign(&CosignRequest::default())?;
//! let settlement = service.close(&CloseRequest::default())?;
//! assert!(settlement.verified);
//! ```
//!
//! ## security notes
//!
//! - balances are only range-checked by u64 arithmetic, there are no range proofs
//! - big integer arithmetic is not constant time
//! - the service holds both parties' secrets; [`signing::ParticipantKey`] is
//!   the seam for splitting them

pub mod channel;
pub mod commitment;
pub mod config;
pub mod error;
pub mod group;
pub mod ledger;
pub mod proof;
pub mod service;
pub mod signing;
pub mod state;
pub mod store;
pub mod transcript;
pub mod types;
pub mod wire;

pub use channel::Channel;
pub use commitment::{commit, verify_opening, Commitment, Opening};
pub use config::ChannelConfig;
pub use error::{Error, ErrorKind, Result, ValidationError};
pub use group::{GroupParameters, ParameterSet};
pub use ledger::{verify_settlement, ClosingPayload, Ledger, LedgerRecord, SettlementRecord};
pub use proof::{prove_opening, verify_opening_proof, OpeningProof, ProofContext};
pub use service::ChannelService;
pub use state::{ChannelStatus, Snapshot};
pub use store::{ChannelStore, MemoryStore};
pub use types::{ChannelId, Participant, PerParticipant};
