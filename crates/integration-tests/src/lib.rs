//! End-to-end integration tests for the beacon DKG engine.
//!
//! These tests exercise the full bootstrap lifecycle:
//! 1. Stake-weighted ticket selection of the candidate group
//! 2. The 12-phase key generation protocol over broadcast channels
//! 3. Threshold signing with the resulting shares
//!
//! Members run as real coordinator tasks wired through an in-process
//! broadcast hub and a shared block ticker.

use sha2::{Digest, Sha256};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;

use beacon_crypto::{combine_signature_shares, verify_signature, CryptoError};
use beacon_dkg::{DkgError, DkgResult, Member, PhaseCoordinator, ProtocolConfig};
use beacon_tickets::{select_group, Staker};
use beacon_types::{MemberIndex, SessionId};

/// Fan every member's outbound onto every member's inbound. The hub carries
/// raw bytes; sessions separate themselves by session id.
fn start_hub(member_count: usize) -> (Vec<mpsc::Sender<Vec<u8>>>, Vec<mpsc::Receiver<Vec<u8>>>) {
    let (fanout_tx, _) = broadcast::channel::<Vec<u8>>(4096);

    let mut outbounds = Vec::new();
    let mut inbounds = Vec::new();

    for _ in 0..member_count {
        let (out_tx, mut out_rx) = mpsc::channel::<Vec<u8>>(256);
        let fanout = fanout_tx.clone();
        tokio::spawn(async move {
            while let Some(bytes) = out_rx.recv().await {
                let _ = fanout.send(bytes);
            }
        });

        let (in_tx, in_rx) = mpsc::channel::<Vec<u8>>(4096);
        let mut fanout_rx = fanout_tx.subscribe();
        tokio::spawn(async move {
            while let Ok(bytes) = fanout_rx.recv().await {
                if in_tx.send(bytes).await.is_err() {
                    break;
                }
            }
        });

        outbounds.push(out_tx);
        inbounds.push(in_rx);
    }

    (outbounds, inbounds)
}

/// Drive the shared block ticker until dropped.
fn start_ticker(block_tx: watch::Sender<u64>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut height = 0u64;
        loop {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            height += 1;
            if block_tx.send(height).is_err() {
                break;
            }
        }
    })
}

fn session_from_seed(seed: &[u8; 32]) -> SessionId {
    let digest: [u8; 32] = Sha256::digest(seed).into();
    SessionId(digest)
}

/// Spawn coordinators for the given member indices of one session.
fn spawn_members(
    config: &ProtocolConfig,
    session: SessionId,
    indices: &[MemberIndex],
    blocks: watch::Receiver<u64>,
) -> Vec<JoinHandle<Result<DkgResult, DkgError>>> {
    let (outbounds, inbounds) = start_hub(indices.len());

    indices
        .iter()
        .zip(outbounds.into_iter().zip(inbounds))
        .map(|(index, (outbound, inbound))| {
            let member = Member::new(config.clone(), session, *index).expect("valid member");
            let coordinator = PhaseCoordinator::new(member, outbound, inbound, blocks.clone());
            tokio::spawn(coordinator.run())
        })
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_selection_to_signing_flow() {
    // ========================================
    // Phase 1: stake-weighted group selection
    // ========================================

    let seed = [0x5eu8; 32];
    let registry: Vec<Staker> = (1..=4u8).map(|b| Staker::new([b; 33], 3)).collect();
    let submissions: Vec<_> = registry
        .iter()
        .flat_map(|s| s.all_tickets(&seed))
        .collect();

    let group = select_group(&seed, &submissions, &registry, 5).expect("group selected");
    assert_eq!(group.len(), 5);
    let indices: Vec<MemberIndex> = group.iter().map(|m| m.index).collect();
    assert_eq!(indices, vec![1, 2, 3, 4, 5]);

    // ========================================
    // Phase 2: distributed key generation
    // ========================================

    let config = ProtocolConfig::new(5, 2, 1).unwrap();
    let session = session_from_seed(&seed);
    let (block_tx, block_rx) = watch::channel(0u64);

    let handles = spawn_members(&config, session, &indices, block_rx);
    let ticker = start_ticker(block_tx);

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap().expect("session finalizes"));
    }
    ticker.abort();

    for result in &results {
        assert_eq!(result.qualified, vec![1, 2, 3, 4, 5]);
        assert!(result.disqualified.is_empty());
        assert!(result.inactive.is_empty());
        assert_eq!(result.group_public_key, results[0].group_public_key);
    }

    // ========================================
    // Phase 3: threshold signing
    // ========================================

    let message = b"beacon entry 1";
    let shares: Vec<_> = results
        .iter()
        .take(3)
        .enumerate()
        .map(|(i, result)| {
            (
                i as u32 + 1,
                result.secret_share.sign(message).expect("share signs"),
            )
        })
        .collect();

    let signature = combine_signature_shares(&shares, 3).expect("combines");
    assert!(verify_signature(&results[0].group_public_key, message, &signature).is_ok());

    // A different subset recovers the identical signature value.
    let other_shares: Vec<_> = results
        .iter()
        .enumerate()
        .skip(2)
        .map(|(i, result)| {
            (
                i as u32 + 1,
                result.secret_share.sign(message).expect("share signs"),
            )
        })
        .collect();
    let other_signature = combine_signature_shares(&other_shares, 3).expect("combines");
    assert_eq!(signature, other_signature);

    // Too few shares cannot meet the threshold.
    assert!(matches!(
        combine_signature_shares(&shares[..2], 3),
        Err(CryptoError::InsufficientShares { .. })
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_member_absent_from_the_start() {
    // Member 3 never joins; the remaining four bootstrap without it.
    let config = ProtocolConfig::new(5, 2, 1).unwrap();
    let session = SessionId([0xabu8; 32]);
    let (block_tx, block_rx) = watch::channel(0u64);

    let handles = spawn_members(&config, session, &[1, 2, 4, 5], block_rx);
    let ticker = start_ticker(block_tx);

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap().expect("session finalizes"));
    }
    ticker.abort();

    for result in &results {
        assert_eq!(result.inactive, vec![3]);
        assert!(result.disqualified.is_empty());
        assert_eq!(result.qualified, vec![1, 2, 4, 5]);
        assert_eq!(result.group_public_key, results[0].group_public_key);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_exactly_quorum_succeeds() {
    // N=5, T=2: exactly T+1 = 3 participating members still finalize.
    let config = ProtocolConfig::new(5, 2, 1).unwrap();
    let session = SessionId([0x11u8; 32]);
    let (block_tx, block_rx) = watch::channel(0u64);

    let handles = spawn_members(&config, session, &[1, 2, 3], block_rx);
    let ticker = start_ticker(block_tx);

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap().expect("quorum finalizes"));
    }
    ticker.abort();

    for result in &results {
        assert_eq!(result.qualified, vec![1, 2, 3]);
        assert_eq!(result.inactive, vec![4, 5]);
    }

    // And the survivors can sign.
    let message = b"quorum entry";
    let shares: Vec<_> = results
        .iter()
        .enumerate()
        .map(|(i, r)| (i as u32 + 1, r.secret_share.sign(message).unwrap()))
        .collect();
    let signature = combine_signature_shares(&shares, 3).unwrap();
    assert!(verify_signature(&results[0].group_public_key, message, &signature).is_ok());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_below_quorum_aborts() {
    // N=5, T=2: only T = 2 participating members; every session aborts.
    let config = ProtocolConfig::new(5, 2, 1).unwrap();
    let session = SessionId([0x22u8; 32]);
    let (block_tx, block_rx) = watch::channel(0u64);

    let handles = spawn_members(&config, session, &[1, 2], block_rx);
    let ticker = start_ticker(block_tx);

    for handle in handles {
        let result = handle.await.unwrap();
        assert!(matches!(result, Err(DkgError::SessionAborted { .. })));
    }
    ticker.abort();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_sessions_share_a_channel() {
    // Two sessions run in parallel over one broadcast medium; members
    // separate the traffic by session id and produce distinct keys.
    let config = ProtocolConfig::new(3, 1, 0).unwrap();
    let session_a = session_from_seed(&[0xaau8; 32]);
    let session_b = session_from_seed(&[0xbbu8; 32]);
    let (block_tx, block_rx) = watch::channel(0u64);

    let (outbounds, inbounds) = start_hub(6);
    let mut handles = Vec::new();
    for (slot, (outbound, inbound)) in outbounds.into_iter().zip(inbounds).enumerate() {
        let (session, index) = if slot < 3 {
            (session_a, slot as u32 + 1)
        } else {
            (session_b, slot as u32 - 2)
        };
        let member = Member::new(config.clone(), session, index).expect("valid member");
        let coordinator = PhaseCoordinator::new(member, outbound, inbound, block_rx.clone());
        handles.push(tokio::spawn(coordinator.run()));
    }
    let ticker = start_ticker(block_tx);

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap().expect("both sessions finalize"));
    }
    ticker.abort();

    let key_a = &results[0].group_public_key;
    let key_b = &results[3].group_public_key;
    assert_ne!(key_a, key_b);

    for result in &results[..3] {
        assert_eq!(&result.group_public_key, key_a);
        assert_eq!(result.qualified, vec![1, 2, 3]);
    }
    for result in &results[3..] {
        assert_eq!(&result.group_public_key, key_b);
        assert_eq!(result.qualified, vec![1, 2, 3]);
    }
}
