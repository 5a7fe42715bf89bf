//! Error types for the ticket lottery.

use thiserror::Error;

/// Errors that can occur while computing, verifying, or selecting tickets.
#[derive(Debug, Error)]
pub enum TicketError {
    #[error("Virtual staker index {index} not in range [1, {max}]")]
    VirtualStakerIndexOutOfRange { index: u64, max: u64 },

    #[error("Ticket value does not match its proof")]
    ValueMismatch,

    #[error("Ticket submitted by an unknown staker")]
    UnknownStaker,

    #[error("Duplicate ticket submission for (staker, virtual staker index)")]
    DuplicateSubmission,

    #[error("No tickets submitted")]
    NoTicketsSubmitted,

    #[error("Not enough valid tickets: need {required}, got {got}")]
    InsufficientTickets { required: usize, got: usize },
}
