//! GJKR distributed key generation for the random beacon.
//!
//! Implements the full 12-phase protocol that turns a freshly selected
//! candidate group into a BLS threshold signing group:
//!
//! 1. Members join the session and exchange per-peer ephemeral ECDH keys.
//! 2. Each member deals Pedersen-committed shares of two random polynomials,
//!    encrypted pairwise; invalid shares are accused, adjudicated from the
//!    revealed channel keys, and provably bad members disqualified.
//! 3. Surviving shares combine into per-member secret shares; public key
//!    share points are published, validated, and adjudicated the same way.
//! 4. Contributions of dropped members are reconstructed from revealed
//!    ephemeral keys so the group key stays consistent with the shares.
//! 5. The group public key is the sum of the constant-term points over the
//!    qualified set plus reconstructed contributions.
//!
//! Phase transitions are driven by a caller-supplied block ticker, so every
//! member sees the same number of blocks per phase. The
//! [`PhaseCoordinator`](coordinator::PhaseCoordinator) runs one session on
//! one cooperative task; concurrent sessions are independent tasks with
//! disjoint state.
//!
//! # Security
//!
//! - Tolerates up to `dishonest_threshold` misbehaving members
//! - A single bad peer is disqualified, never aborts the session
//! - The session fails only if fewer than T+1 members stay qualified

pub mod config;
pub mod coordinator;
pub mod error;
pub mod member;
pub mod messages;
pub mod result;
pub mod states;

pub use config::ProtocolConfig;
pub use coordinator::PhaseCoordinator;
pub use error::{DkgError, MisbehaviorKind};
pub use member::Member;
pub use messages::{MessagePayload, WireMessage};
pub use result::{DkgResult, SecretKeyShare};
pub use states::KeyGenerationState;
