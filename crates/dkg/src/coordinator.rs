//! Block-aligned phase coordination.
//!
//! One `PhaseCoordinator` drives one DKG session on one cooperative task:
//! it initiates each state, broadcasts whatever the state produces, routes
//! inbound messages through the acceptance predicate into the current state,
//! and advances when the state's block window has elapsed.
//!
//! Timing is block-driven, never wall-clock: a phase ends when the caller's
//! block ticker has advanced `active_blocks` past the phase entry point. If
//! the ticker stalls, the session stalls with it.
//!
//! Dropping the returned future cancels the session; the member state and
//! its secrets are zeroized on drop.

use rand::rngs::OsRng;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::error::DkgError;
use crate::member::Member;
use crate::messages::{MessagePayload, WireMessage};
use crate::result::DkgResult;
use crate::states::KeyGenerationState;

/// Drives a single member through one DKG session.
pub struct PhaseCoordinator {
    member: Member,
    outbound: mpsc::Sender<Vec<u8>>,
    inbound: mpsc::Receiver<Vec<u8>>,
    blocks: watch::Receiver<u64>,
}

impl PhaseCoordinator {
    /// Wire a member to its broadcast channel and block ticker.
    ///
    /// `inbound` must carry every message broadcast on the channel;
    /// `blocks` is the monotone block height. Phase windows are counted
    /// relative to the height observed at each phase entry, so all members
    /// of a session must start from the same observed height to stay
    /// aligned.
    pub fn new(
        member: Member,
        outbound: mpsc::Sender<Vec<u8>>,
        inbound: mpsc::Receiver<Vec<u8>>,
        blocks: watch::Receiver<u64>,
    ) -> Self {
        Self {
            member,
            outbound,
            inbound,
            blocks,
        }
    }

    /// Run the session to completion.
    pub async fn run(mut self) -> Result<DkgResult, DkgError> {
        let mut rng = OsRng;
        let mut state = KeyGenerationState::Initialization;

        info!(
            session = %self.member.session_id(),
            member = self.member.index(),
            "Starting key generation"
        );

        loop {
            debug!(member = self.member.index(), state = ?state, "Entering state");

            let payloads = state.initiate(&mut self.member, &mut rng)?;
            for payload in payloads {
                self.broadcast(payload).await?;
            }

            self.wait_out(state).await?;

            match state.next() {
                Some(next) => state = next,
                None => break,
            }
        }

        self.member.finalize()
    }

    /// Broadcast one payload, retrying once before giving up on the channel.
    async fn broadcast(&self, payload: MessagePayload) -> Result<(), DkgError> {
        let message = WireMessage::new(
            self.member.session_id(),
            self.member.index(),
            payload,
        );
        let bytes = message.encode()?;

        if self.outbound.send(bytes.clone()).await.is_ok() {
            return Ok(());
        }
        warn!(member = self.member.index(), "Broadcast failed, retrying");
        self.outbound
            .send(bytes)
            .await
            .map_err(|_| DkgError::ChannelFailure("broadcast channel closed".into()))
    }

    /// Consume inbound messages until the state's block window has elapsed.
    async fn wait_out(&mut self, state: KeyGenerationState) -> Result<(), DkgError> {
        let window = state.active_blocks(self.member.config());
        if window == 0 {
            return Ok(());
        }
        let target = *self.blocks.borrow() + window;

        while *self.blocks.borrow() < target {
            // Tick-first: a message broadcast from a later phase can only
            // exist after the tick that opened that phase, so observing the
            // tick before the message keeps phases aligned.
            tokio::select! {
                biased;
                changed = self.blocks.changed() => {
                    changed.map_err(|_| {
                        DkgError::ChannelFailure("block ticker closed".into())
                    })?;
                }
                received = self.inbound.recv() => {
                    let bytes = received.ok_or_else(|| {
                        DkgError::ChannelFailure("broadcast channel closed".into())
                    })?;
                    self.handle_inbound(state, &bytes);
                }
            }
        }

        Ok(())
    }

    /// Filter and route one inbound message into the current state.
    ///
    /// Anything that fails the filters is dropped without affecting the
    /// session: a bad message is fatal to itself, never to the protocol.
    fn handle_inbound(&mut self, state: KeyGenerationState, bytes: &[u8]) {
        let message = match WireMessage::decode(bytes) {
            Ok(Some(message)) => message,
            Ok(None) => {
                debug!("Dropping message with unknown phase tag");
                return;
            }
            Err(_) => {
                debug!("Dropping malformed message");
                return;
            }
        };

        if message.session_id != self.member.session_id() {
            debug!(session = %message.session_id, "Dropping message for another session");
            return;
        }
        if !state.accepts(message.payload.phase_tag()) {
            debug!(
                sender = message.sender,
                tag = message.payload.phase_tag(),
                "Dropping message outside its phase"
            );
            return;
        }
        if !self.member.is_sender_accepted(message.sender) {
            debug!(sender = message.sender, "Dropping message from unaccepted sender");
            return;
        }

        state.receive(&mut self.member, message.sender, message.payload);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast;

    use beacon_types::SessionId;

    use crate::config::ProtocolConfig;

    /// In-process broadcast hub: every member's outbound fans out to every
    /// member's inbound, sender included. The coordinator's own filter
    /// drops self-messages by sender index.
    fn start_hub(member_count: usize) -> (Vec<mpsc::Sender<Vec<u8>>>, Vec<mpsc::Receiver<Vec<u8>>>) {
        let (fanout_tx, _) = broadcast::channel::<Vec<u8>>(1024);

        let mut outbounds = Vec::new();
        let mut inbounds = Vec::new();

        for _ in 0..member_count {
            let (out_tx, mut out_rx) = mpsc::channel::<Vec<u8>>(64);
            let fanout = fanout_tx.clone();
            tokio::spawn(async move {
                while let Some(bytes) = out_rx.recv().await {
                    let _ = fanout.send(bytes);
                }
            });

            let (in_tx, in_rx) = mpsc::channel::<Vec<u8>>(1024);
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

    #[tokio::test]
    async fn test_full_session_over_channels() {
        let group_size = 3u32;
        let config = ProtocolConfig::new(group_size, 1, 0).unwrap();
        let session = SessionId([9u8; 32]);

        let (block_tx, block_rx) = watch::channel(0u64);
        let (outbounds, inbounds) = start_hub(group_size as usize);

        let mut handles = Vec::new();
        for (i, (outbound, inbound)) in outbounds.into_iter().zip(inbounds).enumerate() {
            let member =
                Member::new(config.clone(), session, i as u32 + 1).unwrap();
            let coordinator =
                PhaseCoordinator::new(member, outbound, inbound, block_rx.clone());
            handles.push(tokio::spawn(coordinator.run()));
        }

        // Tick blocks until every session resolves.
        let ticker = tokio::spawn(async move {
            let mut height = 0u64;
            loop {
                tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                height += 1;
                if block_tx.send(height).is_err() {
                    break;
                }
            }
        });

        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap().unwrap());
        }
        ticker.abort();

        let expected: Vec<u32> = (1..=group_size).collect();
        for result in &results {
            assert_eq!(result.qualified, expected);
            assert_eq!(result.group_public_key, results[0].group_public_key);
        }
    }

    #[tokio::test]
    async fn test_closed_block_ticker_fails_session() {
        let config = ProtocolConfig::new(3, 1, 0).unwrap();
        let session = SessionId([1u8; 32]);

        let (block_tx, block_rx) = watch::channel(0u64);
        let (out_tx, _out_rx) = mpsc::channel(8);
        let (_in_tx, in_rx) = mpsc::channel(8);

        let member = Member::new(config, session, 1).unwrap();
        let coordinator = PhaseCoordinator::new(member, out_tx, in_rx, block_rx);

        drop(block_tx);
        let result = coordinator.run().await;
        assert!(matches!(result, Err(DkgError::ChannelFailure(_))));
    }
}
