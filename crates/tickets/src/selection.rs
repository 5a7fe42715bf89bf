//! Group selection from submitted tickets.
//!
//! Orders verified submissions ascending and takes the first `group_size`;
//! the position in that order (1-based) is the winner's member index for the
//! DKG session that follows.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};

use beacon_types::MemberIndex;

use crate::error::TicketError;
use crate::ticket::{Staker, StakerPublicKey, Ticket};

/// One selected seat of the candidate group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupMember {
    /// Dense 1-based index assigned by ascending ticket order
    pub index: MemberIndex,
    /// The staker holding this seat
    pub staker_public_key: StakerPublicKey,
    /// The winning virtual staker
    pub virtual_staker_index: u64,
}

/// Select the candidate group from submitted tickets.
///
/// Every submission is verified against the seed and the staker registry;
/// duplicates of `(staker, virtual staker index)` and tickets from unknown
/// stakers are rejected outright. A staker may win multiple seats through
/// distinct virtual stakers.
pub fn select_group(
    seed: &[u8; 32],
    submissions: &[Ticket],
    registry: &[Staker],
    group_size: usize,
) -> Result<Vec<GroupMember>, TicketError> {
    if submissions.is_empty() {
        return Err(TicketError::NoTicketsSubmitted);
    }

    let stakes: BTreeMap<StakerPublicKey, u64> = registry
        .iter()
        .map(|s| (s.public_key, s.virtual_stakers))
        .collect();

    let mut seen: BTreeSet<(StakerPublicKey, u64)> = BTreeSet::new();
    let mut valid: Vec<&Ticket> = Vec::with_capacity(submissions.len());

    for ticket in submissions {
        let virtual_stakers = *stakes
            .get(&ticket.proof.public_key)
            .ok_or(TicketError::UnknownStaker)?;

        ticket.verify(seed, virtual_stakers)?;

        if !seen.insert((ticket.proof.public_key, ticket.proof.virtual_staker_index)) {
            warn!(
                virtual_staker_index = ticket.proof.virtual_staker_index,
                "Duplicate ticket submission"
            );
            return Err(TicketError::DuplicateSubmission);
        }

        valid.push(ticket);
    }

    if valid.len() < group_size {
        return Err(TicketError::InsufficientTickets {
            required: group_size,
            got: valid.len(),
        });
    }

    valid.sort();

    debug!(
        submissions = submissions.len(),
        group_size, "Selected candidate group"
    );

    Ok(valid
        .iter()
        .take(group_size)
        .enumerate()
        .map(|(position, ticket)| GroupMember {
            index: position as MemberIndex + 1,
            staker_public_key: ticket.proof.public_key,
            virtual_staker_index: ticket.proof.virtual_staker_index,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> Vec<Staker> {
        (1..=4u8).map(|b| Staker::new([b; 33], 5)).collect()
    }

    fn all_submissions(seed: &[u8; 32], registry: &[Staker]) -> Vec<Ticket> {
        registry.iter().flat_map(|s| s.all_tickets(seed)).collect()
    }

    #[test]
    fn test_selects_lowest_tickets_in_order() {
        let seed = [11u8; 32];
        let registry = registry();
        let submissions = all_submissions(&seed, &registry);

        let group = select_group(&seed, &submissions, &registry, 5).unwrap();

        assert_eq!(group.len(), 5);
        assert_eq!(
            group.iter().map(|m| m.index).collect::<Vec<_>>(),
            vec![1, 2, 3, 4, 5]
        );

        // The selected seats are the 5 lowest ticket values overall.
        let mut sorted = submissions.clone();
        sorted.sort();
        for (member, ticket) in group.iter().zip(sorted.iter()) {
            assert_eq!(member.staker_public_key, ticket.proof.public_key);
            assert_eq!(member.virtual_staker_index, ticket.proof.virtual_staker_index);
        }
    }

    #[test]
    fn test_selection_is_deterministic() {
        let seed = [12u8; 32];
        let registry = registry();

        let mut shuffled = all_submissions(&seed, &registry);
        let group1 = select_group(&seed, &shuffled, &registry, 3).unwrap();

        shuffled.reverse();
        let group2 = select_group(&seed, &shuffled, &registry, 3).unwrap();

        assert_eq!(group1, group2);
    }

    #[test]
    fn test_rejects_empty_submissions() {
        let seed = [0u8; 32];
        assert!(matches!(
            select_group(&seed, &[], &registry(), 3),
            Err(TicketError::NoTicketsSubmitted)
        ));
    }

    #[test]
    fn test_rejects_duplicate_submission() {
        let seed = [13u8; 32];
        let registry = registry();
        let mut submissions = all_submissions(&seed, &registry);
        submissions.push(submissions[0].clone());

        assert!(matches!(
            select_group(&seed, &submissions, &registry, 3),
            Err(TicketError::DuplicateSubmission)
        ));
    }

    #[test]
    fn test_rejects_unknown_staker() {
        let seed = [14u8; 32];
        let registry = registry();
        let outsider = Staker::new([9u8; 33], 2);
        let submissions = outsider.all_tickets(&seed);

        assert!(matches!(
            select_group(&seed, &submissions, &registry, 1),
            Err(TicketError::UnknownStaker)
        ));
    }

    #[test]
    fn test_rejects_forged_ticket() {
        let seed = [15u8; 32];
        let registry = registry();
        let mut submissions = all_submissions(&seed, &registry);
        submissions[0].value = [0u8; 32]; // grind attempt

        assert!(matches!(
            select_group(&seed, &submissions, &registry, 3),
            Err(TicketError::ValueMismatch)
        ));
    }

    #[test]
    fn test_rejects_too_few_tickets() {
        let seed = [16u8; 32];
        let registry = vec![Staker::new([1u8; 33], 2)];
        let submissions = registry[0].all_tickets(&seed);

        assert!(matches!(
            select_group(&seed, &submissions, &registry, 5),
            Err(TicketError::InsufficientTickets {
                required: 5,
                got: 2
            })
        ));
    }
}
