//! Stake-weighted group selection for the random beacon.
//!
//! Implements the verifiable ticket lottery that picks the members of a
//! candidate signing group from the staker population:
//!
//! 1. Each staker derives one ticket per virtual staker from the fresh
//!    beacon entry: W = SHA-256(seed ‖ public_key ‖ index).
//! 2. Tickets are submitted and verified; the lowest `group_size` values
//!    win, and their positions become the DKG member indices.
//!
//! Stake weighting falls out of the virtual staker count: more stake means
//! more tickets and proportionally better odds of holding low values.

pub mod error;
pub mod selection;
pub mod ticket;

pub use error::TicketError;
pub use selection::{select_group, GroupMember};
pub use ticket::{Staker, StakerPublicKey, Ticket, TicketProof};
