//! Group member state for the GJKR key generation protocol.
//!
//! One `Member` holds everything a single participant accumulates over a
//! session: pairwise ephemeral keys, the secret/blinding polynomial pair,
//! shares and commitments received from peers, accusation verdicts, and the
//! membership bookkeeping (disqualified and inactive sets).
//!
//! Per-peer state is kept in dense vectors indexed directly by member index
//! (1-based; slot 0 is unused). The disqualified and inactive sets are
//! monotone: once a member enters one of them it never leaves, and the two
//! sets stay disjoint.
//!
//! [GJKR 99]: Gennaro R., Jarecki S., Krawczyk H., Rabin T. (1999) Secure
//! Distributed Key Generation for Discrete-Log Based Cryptosystems.

use std::collections::{BTreeMap, BTreeSet};

use bls12_381::{G2Projective, Scalar};
use ff::Field;
use group::Curve;
use rand::{CryptoRng, RngCore};
use tracing::{debug, info, warn};

use beacon_crypto::bls::{compress_g2, decompress_g2, scalar_from_bytes};
use beacon_crypto::commitment::{
    commit_to_polynomials, public_key_share_points, verify_share, verify_share_against_points,
};
use beacon_crypto::ephemeral::{
    private_key_matches_public, EncryptedShares, EphemeralKeypair, EphemeralPrivateKeyBytes,
};
use beacon_crypto::polynomial::{interpolate_at, Polynomial};
use beacon_crypto::SymmetricKey;
use beacon_types::{G2Point, MemberIndex, SessionId};

use crate::config::ProtocolConfig;
use crate::error::{DkgError, MisbehaviorKind};
use crate::messages::{
    DisqualifiedEphemeralKeysPayload, EncryptedSharesEntry, EphemeralPublicKeysPayload,
    MemberCommitmentsPayload, PeerSharesPayload, PointsAccusationsPayload,
    PublicKeySharePointsPayload, SecretSharesAccusationsPayload,
};
use crate::result::{DkgResult, SecretKeyShare};

/// A single participant in one DKG session.
pub struct Member {
    config: ProtocolConfig,
    session_id: SessionId,
    index: MemberIndex,

    joined: Vec<bool>,
    disqualified: Vec<bool>,
    inactive: Vec<bool>,

    // Pairwise ephemeral key material. `ephemeral_keypairs[j]` is our keypair
    // generated for peer j; `peer_ephemeral_publics[i]` is the full broadcast
    // map of member i (our own included, for uniform adjudication).
    ephemeral_keypairs: Vec<Option<EphemeralKeypair>>,
    peer_ephemeral_publics: Vec<Option<BTreeMap<MemberIndex, [u8; 33]>>>,
    symmetric_keys: Vec<Option<SymmetricKey>>,

    // Our polynomial pair and the broadcast record of every member's
    // commitment and encrypted-shares messages.
    secret_polynomial: Option<Polynomial>,
    blinding_polynomial: Option<Polynomial>,
    peer_commitments: Vec<Option<Vec<G2Point>>>,
    peer_shares_broadcasts: Vec<Option<BTreeMap<MemberIndex, EncryptedSharesEntry>>>,

    // Decrypted and commitment-verified share pairs addressed to us.
    received_shares: Vec<Option<(Scalar, Scalar)>>,
    accused_by_self: Vec<bool>,
    share_accusations_received: Vec<Option<BTreeMap<MemberIndex, EphemeralPrivateKeyBytes>>>,

    group_secret_share: Option<Scalar>,
    // Snapshot of the qualified set at share combination; members removed
    // afterwards either get reconstructed or have their term backed out.
    share_contributors: Vec<bool>,

    peer_share_points: Vec<Option<Vec<G2Point>>>,
    points_accused_by_self: Vec<bool>,
    points_accusations_received: Vec<Option<BTreeSet<MemberIndex>>>,

    // reveal phase: sender -> (disqualified index -> revealed private key)
    revealed_keys: Vec<Option<BTreeMap<MemberIndex, EphemeralPrivateKeyBytes>>>,
    // g^{z_d} for every reconstructed disqualified member d
    reconstructed_points: BTreeMap<MemberIndex, G2Point>,

    group_public_key: Option<G2Point>,
}

impl Member {
    /// Create the member for one session.
    pub fn new(
        config: ProtocolConfig,
        session_id: SessionId,
        index: MemberIndex,
    ) -> Result<Self, DkgError> {
        config.validate()?;
        if index == 0 || index > config.group_size {
            return Err(DkgError::ConfigInvalid(format!(
                "member index {index} not in [1, {}]",
                config.group_size
            )));
        }

        let slots = config.group_size as usize + 1;
        Ok(Self {
            config,
            session_id,
            index,
            joined: vec![false; slots],
            disqualified: vec![false; slots],
            inactive: vec![false; slots],
            ephemeral_keypairs: (0..slots).map(|_| None).collect(),
            peer_ephemeral_publics: vec![None; slots],
            symmetric_keys: (0..slots).map(|_| None).collect(),
            secret_polynomial: None,
            blinding_polynomial: None,
            peer_commitments: vec![None; slots],
            peer_shares_broadcasts: vec![None; slots],
            received_shares: vec![None; slots],
            accused_by_self: vec![false; slots],
            share_accusations_received: vec![None; slots],
            group_secret_share: None,
            share_contributors: vec![false; slots],
            peer_share_points: vec![None; slots],
            points_accused_by_self: vec![false; slots],
            points_accusations_received: vec![None; slots],
            revealed_keys: vec![None; slots],
            reconstructed_points: BTreeMap::new(),
            group_public_key: None,
        })
    }

    pub fn index(&self) -> MemberIndex {
        self.index
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    fn group_size(&self) -> MemberIndex {
        self.config.group_size
    }

    fn threshold(&self) -> usize {
        self.config.honest_threshold as usize
    }

    fn in_range(&self, member: MemberIndex) -> bool {
        member >= 1 && member <= self.group_size()
    }

    fn other_members(&self) -> Vec<MemberIndex> {
        (1..=self.group_size()).filter(|m| *m != self.index).collect()
    }

    /// Whether a message from this sender should be routed into the session.
    pub fn is_sender_accepted(&self, sender: MemberIndex) -> bool {
        self.in_range(sender)
            && sender != self.index
            && !self.disqualified[sender as usize]
            && !self.inactive[sender as usize]
    }

    fn is_qualified(&self, member: MemberIndex) -> bool {
        !self.disqualified[member as usize] && !self.inactive[member as usize]
    }

    fn mark_disqualified(&mut self, member: MemberIndex, kind: MisbehaviorKind) {
        if !self.in_range(member) {
            return;
        }
        if member == self.index {
            warn!(member, "Refusing to disqualify self");
            return;
        }
        let slot = member as usize;
        if self.disqualified[slot] || self.inactive[slot] {
            return;
        }
        self.disqualified[slot] = true;
        info!(member, %kind, "Disqualified member");
    }

    fn mark_inactive(&mut self, member: MemberIndex) {
        if !self.in_range(member) || member == self.index {
            return;
        }
        let slot = member as usize;
        if self.disqualified[slot] || self.inactive[slot] {
            return;
        }
        self.inactive[slot] = true;
        info!(member, "Marked member inactive");
    }

    // ---- join ----

    pub(crate) fn mark_self_joined(&mut self) {
        self.joined[self.index as usize] = true;
    }

    pub(crate) fn record_join(&mut self, sender: MemberIndex) {
        if self.in_range(sender) {
            self.joined[sender as usize] = true;
        }
    }

    /// Members that never announced themselves cannot take part.
    pub(crate) fn mark_inactive_non_joiners(&mut self) {
        for m in self.other_members() {
            if !self.joined[m as usize] {
                self.mark_inactive(m);
            }
        }
    }

    // ---- ephemeral key generation ----

    /// Generate one ephemeral keypair per other member and build the
    /// announcement payload.
    pub(crate) fn generate_ephemeral_keypairs<R: RngCore + CryptoRng>(
        &mut self,
        rng: &mut R,
    ) -> EphemeralPublicKeysPayload {
        let mut keys = BTreeMap::new();
        for peer in self.other_members() {
            let keypair = EphemeralKeypair::generate(rng);
            keys.insert(peer, keypair.public_bytes());
            self.ephemeral_keypairs[peer as usize] = Some(keypair);
        }
        self.peer_ephemeral_publics[self.index as usize] = Some(keys.clone());
        EphemeralPublicKeysPayload { keys }
    }

    pub(crate) fn record_ephemeral_public_keys(
        &mut self,
        sender: MemberIndex,
        payload: EphemeralPublicKeysPayload,
    ) {
        let slot = &mut self.peer_ephemeral_publics[sender as usize];
        if slot.is_none() {
            debug!(sender, "Recorded ephemeral public keys");
            *slot = Some(payload.keys);
        }
    }

    // ---- symmetric key generation ----

    /// Mark members that did not announce ephemeral keys inactive, then
    /// derive the pairwise symmetric keys with everyone who did.
    pub(crate) fn derive_symmetric_keys(&mut self) {
        for peer in self.other_members() {
            if !self.is_qualified(peer) {
                continue;
            }
            let peer_public_for_us = self.peer_ephemeral_publics[peer as usize]
                .as_ref()
                .and_then(|keys| keys.get(&self.index))
                .copied();
            let Some(peer_public_for_us) = peer_public_for_us else {
                // No key addressed to us means no private channel with the
                // peer; treat as a failed broadcast.
                self.mark_inactive(peer);
                continue;
            };

            let derived = match self.ephemeral_keypairs[peer as usize].as_ref() {
                Some(own_keypair) => own_keypair.derive_symmetric_key(&peer_public_for_us),
                None => continue,
            };
            match derived {
                Ok(key) => self.symmetric_keys[peer as usize] = Some(key),
                Err(_) => self.mark_inactive(peer),
            }
        }
    }

    // ---- commitment ----

    /// Draw the polynomial pair, compute everyone's share, and build the
    /// encrypted-shares and commitments payloads.
    pub(crate) fn calculate_shares_and_commitments<R: RngCore + CryptoRng>(
        &mut self,
        rng: &mut R,
    ) -> Result<(PeerSharesPayload, MemberCommitmentsPayload), DkgError> {
        let secret = Polynomial::random(self.threshold(), rng);
        let blinding = Polynomial::random(self.threshold(), rng);
        let commitments = commit_to_polynomials(&secret, &blinding);

        let mut shares = BTreeMap::new();
        for peer in self.other_members() {
            let Some(key) = self.symmetric_keys[peer as usize].as_ref() else {
                continue;
            };
            let mut plaintext = [0u8; 64];
            plaintext[..32].copy_from_slice(&secret.evaluate_at(peer).to_bytes());
            plaintext[32..].copy_from_slice(&blinding.evaluate_at(peer).to_bytes());
            let encrypted = key.encrypt(&plaintext, rng)?;
            shares.insert(
                peer,
                EncryptedSharesEntry {
                    nonce: encrypted.nonce,
                    ciphertext: encrypted.ciphertext,
                },
            );
        }

        // Our own share of our own secret enters the combination directly.
        self.received_shares[self.index as usize] = Some((
            secret.evaluate_at(self.index),
            blinding.evaluate_at(self.index),
        ));
        self.peer_commitments[self.index as usize] = Some(commitments.clone());
        self.peer_shares_broadcasts[self.index as usize] = Some(shares.clone());
        self.secret_polynomial = Some(secret);
        self.blinding_polynomial = Some(blinding);

        Ok((
            PeerSharesPayload { shares },
            MemberCommitmentsPayload { commitments },
        ))
    }

    pub(crate) fn record_peer_shares(&mut self, sender: MemberIndex, payload: PeerSharesPayload) {
        let slot = &mut self.peer_shares_broadcasts[sender as usize];
        if slot.is_none() {
            debug!(sender, count = payload.shares.len(), "Recorded peer shares");
            *slot = Some(payload.shares);
        }
    }

    pub(crate) fn record_commitments(
        &mut self,
        sender: MemberIndex,
        payload: MemberCommitmentsPayload,
    ) {
        let slot = &mut self.peer_commitments[sender as usize];
        if slot.is_none() {
            debug!(sender, "Recorded commitments");
            *slot = Some(payload.commitments);
        }
    }

    // ---- commitments verification ----

    /// Mark members that skipped the commitment phase inactive, then decrypt
    /// and verify every share addressed to us, accusing the senders of
    /// shares that fail the commitment equation.
    ///
    /// An accusation reveals our ephemeral private key for the accused so
    /// the whole group can decrypt the disputed share and adjudicate.
    pub(crate) fn verify_shares_and_accuse(&mut self) -> SecretSharesAccusationsPayload {
        let mut accusations = BTreeMap::new();

        for peer in self.other_members() {
            if !self.is_qualified(peer) {
                continue;
            }
            // Presence only: a sender with an invalid share is complete but
            // accused, never missing.
            if self.peer_shares_broadcasts[peer as usize].is_none()
                || self.peer_commitments[peer as usize].is_none()
            {
                self.mark_inactive(peer);
                continue;
            }

            if self.verify_share_from(peer).is_none() {
                warn!(
                    peer,
                    kind = %MisbehaviorKind::InvalidShare,
                    "Accusing member"
                );
                self.accused_by_self[peer as usize] = true;
                if let Some(keypair) = self.ephemeral_keypairs[peer as usize].as_ref() {
                    accusations.insert(peer, keypair.reveal_private_bytes());
                }
            }
        }

        SecretSharesAccusationsPayload { accusations }
    }

    /// Decrypt and check the share a peer sent us. `None` means the peer is
    /// accusation-worthy; `Some(())` means the share was stored.
    fn verify_share_from(&mut self, peer: MemberIndex) -> Option<()> {
        let entry = self.peer_shares_broadcasts[peer as usize]
            .as_ref()?
            .get(&self.index)
            .cloned()?;
        let key = self.symmetric_keys[peer as usize].as_ref()?;

        let plaintext = key
            .decrypt(&EncryptedShares {
                nonce: entry.nonce,
                ciphertext: entry.ciphertext,
            })
            .ok()?;
        let (share, blinding) = decode_share_pair(&plaintext)?;

        let commitments = self.peer_commitments[peer as usize].as_ref()?;
        if commitments.len() != self.threshold() + 1 {
            return None;
        }
        if !verify_share(&share, &blinding, self.index, commitments) {
            return None;
        }

        self.received_shares[peer as usize] = Some((share, blinding));
        Some(())
    }

    pub(crate) fn record_share_accusations(
        &mut self,
        sender: MemberIndex,
        payload: SecretSharesAccusationsPayload,
    ) {
        let slot = &mut self.share_accusations_received[sender as usize];
        if slot.is_none() {
            *slot = Some(payload.accusations);
        }
    }

    // ---- shares justification ----

    /// Resolve all phase-5 accusations.
    ///
    /// A revealed accuser key lets everyone decrypt the disputed share. If
    /// the share verifies against the accused's commitments the accuser is
    /// disqualified for a false accusation; otherwise the accused is
    /// disqualified. Verdicts depend only on broadcast data, so every honest
    /// member reaches the same disqualified set.
    pub(crate) fn resolve_share_accusations(&mut self) {
        // Our own verdicts were computed locally during verification.
        for accused in self.other_members() {
            if self.accused_by_self[accused as usize] {
                self.mark_disqualified(accused, MisbehaviorKind::InvalidShare);
            }
        }

        let mut accusation_sets = Vec::new();
        for accuser in self.other_members() {
            if let Some(accusations) = self.share_accusations_received[accuser as usize].take() {
                accusation_sets.push((accuser, accusations));
            }
        }

        for (accuser, accusations) in accusation_sets {
            for (accused, revealed_key) in accusations {
                self.adjudicate_share_accusation(accuser, accused, &revealed_key);
            }
        }
    }

    fn adjudicate_share_accusation(
        &mut self,
        accuser: MemberIndex,
        accused: MemberIndex,
        revealed_key: &EphemeralPrivateKeyBytes,
    ) {
        if !self.in_range(accused) || accused == accuser {
            self.mark_disqualified(accuser, MisbehaviorKind::InvalidAccusation);
            return;
        }
        // An accusation against a member that never distributed shares
        // resolves through the inactive set instead.
        if self.inactive[accused as usize] {
            return;
        }

        // The revealed key must be the accuser's announced key for the
        // accused, otherwise the "evidence" is fabricated.
        let announced = self.peer_ephemeral_publics[accuser as usize]
            .as_ref()
            .and_then(|keys| keys.get(&accused))
            .copied();
        let Some(announced) = announced else {
            self.mark_disqualified(accuser, MisbehaviorKind::InvalidAccusation);
            return;
        };
        if !private_key_matches_public(revealed_key, &announced) {
            self.mark_disqualified(accuser, MisbehaviorKind::InvalidKeyReveal);
            return;
        }

        match self.disputed_share_is_valid(accuser, accused, revealed_key) {
            // The share was fine; the accusation was false.
            Some(true) => self.mark_disqualified(accuser, MisbehaviorKind::InvalidAccusation),
            Some(false) | None => self.mark_disqualified(accused, MisbehaviorKind::InvalidShare),
        }
    }

    /// Decrypt the share the accused sent the accuser and verify it.
    ///
    /// `None` means the share (or the channel it travelled on) was broken in
    /// a way attributable to the accused.
    fn disputed_share_is_valid(
        &self,
        accuser: MemberIndex,
        accused: MemberIndex,
        revealed_key: &EphemeralPrivateKeyBytes,
    ) -> Option<bool> {
        let keypair = EphemeralKeypair::from_private_bytes(revealed_key).ok()?;
        let accused_public_for_accuser = self.peer_ephemeral_publics[accused as usize]
            .as_ref()?
            .get(&accuser)?;
        let key = keypair
            .derive_symmetric_key(accused_public_for_accuser)
            .ok()?;

        let entry = self.peer_shares_broadcasts[accused as usize]
            .as_ref()?
            .get(&accuser)?;
        let plaintext = key
            .decrypt(&EncryptedShares {
                nonce: entry.nonce,
                ciphertext: entry.ciphertext.clone(),
            })
            .ok()?;
        let (share, blinding) = decode_share_pair(&plaintext)?;

        let commitments = self.peer_commitments[accused as usize].as_ref()?;
        if commitments.len() != self.threshold() + 1 {
            return Some(false);
        }
        Some(verify_share(&share, &blinding, accuser, commitments))
    }

    // ---- qualification ----

    /// Combine the verified shares of all qualified members into our share
    /// of the group secret: x_self = Σ s_{i,self}.
    pub(crate) fn combine_member_shares(&mut self) {
        let mut share = Scalar::ZERO;
        for i in 1..=self.group_size() {
            if !self.is_qualified(i) {
                continue;
            }
            match self.received_shares[i as usize].as_ref() {
                Some((s, _)) => {
                    share += s;
                    self.share_contributors[i as usize] = true;
                }
                None => {
                    warn!(member = i, "No verified share from qualified member");
                }
            }
        }
        self.group_secret_share = Some(share);
    }

    // ---- public key share points ----

    /// Publish A_k = g^{F_k} for our secret polynomial.
    pub(crate) fn calculate_public_key_share_points(
        &mut self,
    ) -> Result<PublicKeySharePointsPayload, DkgError> {
        let secret = self
            .secret_polynomial
            .as_ref()
            .ok_or(DkgError::PhaseOutOfOrder)?;
        let points = public_key_share_points(secret);
        self.peer_share_points[self.index as usize] = Some(points.clone());
        Ok(PublicKeySharePointsPayload { points })
    }

    pub(crate) fn record_share_points(
        &mut self,
        sender: MemberIndex,
        payload: PublicKeySharePointsPayload,
    ) {
        let slot = &mut self.peer_share_points[sender as usize];
        if slot.is_none() {
            debug!(sender, "Recorded public key share points");
            *slot = Some(payload.points);
        }
    }

    // ---- points validation ----

    /// Check every qualified member's points against the share they sent us:
    /// g^{s_{i,self}} = Π A_{i,k}^{self^k}.
    pub(crate) fn validate_share_points(&mut self) -> PointsAccusationsPayload {
        let mut accused = BTreeSet::new();

        for peer in self.other_members() {
            if !self.is_qualified(peer) {
                continue;
            }
            if self.peer_share_points[peer as usize].is_none() {
                self.mark_inactive(peer);
                continue;
            }
            if self.share_points_consistent(peer) == Some(false) {
                warn!(
                    peer,
                    kind = %MisbehaviorKind::InvalidPoints,
                    "Accusing member"
                );
                self.points_accused_by_self[peer as usize] = true;
                accused.insert(peer);
            }
        }

        PointsAccusationsPayload { accused }
    }

    /// Judge a member's points against our own verified share of them.
    /// `None` when we hold no share to judge with.
    fn share_points_consistent(&self, peer: MemberIndex) -> Option<bool> {
        let points = self.peer_share_points[peer as usize].as_ref()?;
        let (share, _) = self.received_shares[peer as usize].as_ref()?;
        Some(
            points.len() == self.threshold() + 1
                && verify_share_against_points(share, self.index, points),
        )
    }

    pub(crate) fn record_points_accusations(
        &mut self,
        sender: MemberIndex,
        payload: PointsAccusationsPayload,
    ) {
        let slot = &mut self.points_accusations_received[sender as usize];
        if slot.is_none() {
            *slot = Some(payload.accused);
        }
    }

    // ---- points justification ----

    /// Resolve phase-9 accusations.
    ///
    /// Every honest member holds a share on the accused's polynomial that
    /// was already verified against the Pedersen commitments, so checking
    /// the broadcast points against our own share yields the same verdict
    /// for all honest members.
    pub(crate) fn resolve_points_accusations(&mut self) {
        for accused in self.other_members() {
            if self.points_accused_by_self[accused as usize] {
                self.mark_disqualified(accused, MisbehaviorKind::InvalidPoints);
            }
        }

        let mut accusation_sets = Vec::new();
        for accuser in self.other_members() {
            if let Some(accused_set) = self.points_accusations_received[accuser as usize].take() {
                accusation_sets.push((accuser, accused_set));
            }
        }

        for (accuser, accused_set) in accusation_sets {
            for accused in accused_set {
                self.adjudicate_points_accusation(accuser, accused);
            }
        }
    }

    fn adjudicate_points_accusation(&mut self, accuser: MemberIndex, accused: MemberIndex) {
        if !self.in_range(accused) || accused == accuser {
            self.mark_disqualified(accuser, MisbehaviorKind::InvalidAccusation);
            return;
        }
        if self.inactive[accused as usize] {
            return;
        }
        if accused == self.index {
            // Our own points are consistent by construction.
            self.mark_disqualified(accuser, MisbehaviorKind::InvalidAccusation);
            return;
        }

        match self.share_points_consistent(accused) {
            Some(true) => self.mark_disqualified(accuser, MisbehaviorKind::InvalidAccusation),
            Some(false) => self.mark_disqualified(accused, MisbehaviorKind::InvalidPoints),
            // Without our own share there is nothing to judge against; the
            // accused is already on its way out of the qualified set.
            None => {}
        }
    }

    // ---- key reveal ----

    /// Reveal our ephemeral private keys for every member that distributed
    /// shares but has since been disqualified or gone inactive, so the group
    /// can reconstruct their contribution.
    pub(crate) fn reveal_disqualified_member_keys(&self) -> DisqualifiedEphemeralKeysPayload {
        let mut private_keys = BTreeMap::new();
        for member in 1..=self.group_size() {
            if self.is_qualified(member)
                || self.peer_shares_broadcasts[member as usize].is_none()
            {
                continue;
            }
            if let Some(keypair) = self.ephemeral_keypairs[member as usize].as_ref() {
                private_keys.insert(member, keypair.reveal_private_bytes());
            }
        }
        DisqualifiedEphemeralKeysPayload { private_keys }
    }

    pub(crate) fn record_revealed_keys(
        &mut self,
        sender: MemberIndex,
        payload: DisqualifiedEphemeralKeysPayload,
    ) {
        let slot = &mut self.revealed_keys[sender as usize];
        if slot.is_none() {
            debug!(
                sender,
                count = payload.private_keys.len(),
                "Recorded revealed keys"
            );
            *slot = Some(payload.private_keys);
        }
    }

    // ---- reconstruction ----

    /// Reconstruct the contribution of every share-distributing member that
    /// has dropped out of the qualified set, from the ephemeral keys
    /// revealed by peers.
    ///
    /// A recovered polynomial contributes g^{F_d(0)} to the group public
    /// key. If the member dropped out before share combination, F_d(self)
    /// is added to our secret share now; if it dropped out after, its term
    /// is already in. A contribution that cannot be recovered from at least
    /// T+1 valid shares is backed out entirely, on every honest member
    /// alike. The member itself stays excluded and cannot sign.
    pub(crate) fn reconstruct_disqualified_contributions(&mut self) {
        // Every qualified member was expected to broadcast a reveal message,
        // empty or not.
        for peer in self.other_members() {
            if self.is_qualified(peer) && self.revealed_keys[peer as usize].is_none() {
                self.mark_inactive(peer);
            }
        }

        let dropped_out: Vec<MemberIndex> = (1..=self.group_size())
            .filter(|m| {
                !self.is_qualified(*m) && self.peer_shares_broadcasts[*m as usize].is_some()
            })
            .collect();

        for d in dropped_out {
            match self.recover_polynomial_of(d) {
                Some((z_d, share_at_self)) => {
                    let point = compress_g2(&(G2Projective::generator() * z_d).to_affine());
                    self.reconstructed_points.insert(d, point);
                    if !self.share_contributors[d as usize] {
                        if let Some(share) = self.group_secret_share.as_mut() {
                            *share += share_at_self;
                        }
                    }
                    info!(member = d, "Reconstructed dropped member's contribution");
                }
                None => {
                    // Without a recoverable polynomial the contribution is
                    // dropped; back its term out of our share if it was
                    // combined in.
                    if self.share_contributors[d as usize] {
                        if let Some((s, _)) = self.received_shares[d as usize] {
                            if let Some(share) = self.group_secret_share.as_mut() {
                                *share -= s;
                            }
                        }
                        self.share_contributors[d as usize] = false;
                    }
                    warn!(
                        member = d,
                        "Not enough valid revealed shares to reconstruct; dropping contribution"
                    );
                }
            }
        }
    }

    /// Recover `(F_d(0), F_d(self))` for a disqualified member d from at
    /// least T+1 shares that verify against d's commitments.
    fn recover_polynomial_of(&self, d: MemberIndex) -> Option<(Scalar, Scalar)> {
        let shares_broadcast = self.peer_shares_broadcasts[d as usize].as_ref()?;
        let commitments = self.peer_commitments[d as usize].as_ref()?;

        let mut points: BTreeMap<MemberIndex, Scalar> = BTreeMap::new();

        // Our own verified share first.
        if let Some((share, _)) = self.received_shares[d as usize].as_ref() {
            points.insert(self.index, *share);
        }

        for revealer in 1..=self.group_size() {
            if revealer == self.index || revealer == d {
                continue;
            }
            let private_key = self.revealed_keys[revealer as usize]
                .as_ref()
                .and_then(|keys| keys.get(&d))
                .copied();
            let Some(private_key) = private_key else {
                continue;
            };

            // Fabricated keys cannot decrypt anything useful; validate
            // against the revealer's announcement and skip on mismatch.
            let announced = self.peer_ephemeral_publics[revealer as usize]
                .as_ref()
                .and_then(|keys| keys.get(&d))
                .copied();
            let Some(announced) = announced else {
                continue;
            };
            if !private_key_matches_public(&private_key, &announced) {
                continue;
            }

            if let Some(share) =
                self.decrypt_revealed_share(d, revealer, &private_key, shares_broadcast, commitments)
            {
                points.insert(revealer, share);
            }
        }

        if points.len() < self.threshold() + 1 {
            return None;
        }

        let points: Vec<(MemberIndex, Scalar)> = points.into_iter().collect();
        let z_d = interpolate_at(&points, 0).ok()?;
        let share_at_self = interpolate_at(&points, self.index).ok()?;
        Some((z_d, share_at_self))
    }

    fn decrypt_revealed_share(
        &self,
        d: MemberIndex,
        revealer: MemberIndex,
        private_key: &EphemeralPrivateKeyBytes,
        shares_broadcast: &BTreeMap<MemberIndex, EncryptedSharesEntry>,
        commitments: &[G2Point],
    ) -> Option<Scalar> {
        let keypair = EphemeralKeypair::from_private_bytes(private_key).ok()?;
        let d_public_for_revealer = self.peer_ephemeral_publics[d as usize]
            .as_ref()?
            .get(&revealer)?;
        let key = keypair.derive_symmetric_key(d_public_for_revealer).ok()?;

        let entry = shares_broadcast.get(&revealer)?;
        let plaintext = key
            .decrypt(&EncryptedShares {
                nonce: entry.nonce,
                ciphertext: entry.ciphertext.clone(),
            })
            .ok()?;
        let (share, blinding) = decode_share_pair(&plaintext)?;

        // Only shares that lie on d's committed polynomial may feed the
        // interpolation.
        if !verify_share(&share, &blinding, revealer, commitments) {
            return None;
        }
        Some(share)
    }

    // ---- combination ----

    /// Combine the group public key: Y = Σ A_{k,0} over qualified members
    /// plus g^{z_d} for every reconstructed disqualified member.
    pub(crate) fn combine_group_public_key(&mut self) -> Result<(), DkgError> {
        let mut combined = G2Projective::identity();

        for k in 1..=self.group_size() {
            if !self.is_qualified(k) {
                continue;
            }
            let points = self.peer_share_points[k as usize]
                .as_ref()
                .ok_or(DkgError::PhaseOutOfOrder)?;
            let first = points.first().ok_or(DkgError::PhaseOutOfOrder)?;
            combined += G2Projective::from(decompress_g2(&first.0)?);
        }

        for point in self.reconstructed_points.values() {
            combined += G2Projective::from(decompress_g2(&point.0)?);
        }

        self.group_public_key = Some(compress_g2(&combined.to_affine()));
        Ok(())
    }

    // ---- finalization ----

    /// Emit the session result, or `SessionAborted` when fewer than T+1
    /// members remain qualified.
    pub(crate) fn finalize(&mut self) -> Result<DkgResult, DkgError> {
        let qualified: Vec<MemberIndex> = (1..=self.group_size())
            .filter(|m| self.is_qualified(*m))
            .collect();

        if qualified.len() < self.config.quorum() {
            return Err(DkgError::SessionAborted {
                reason: "insufficient qualified members".into(),
            });
        }

        let group_public_key = self
            .group_public_key
            .clone()
            .ok_or(DkgError::PhaseOutOfOrder)?;
        let share = self.group_secret_share.ok_or(DkgError::PhaseOutOfOrder)?;

        let disqualified: Vec<MemberIndex> = (1..=self.group_size())
            .filter(|m| self.disqualified[*m as usize])
            .collect();
        let inactive: Vec<MemberIndex> = (1..=self.group_size())
            .filter(|m| self.inactive[*m as usize])
            .collect();

        info!(
            session = %self.session_id,
            member = self.index,
            qualified = qualified.len(),
            disqualified = disqualified.len(),
            inactive = inactive.len(),
            "Key generation finalized"
        );

        Ok(DkgResult {
            group_public_key,
            secret_share: SecretKeyShare::new(share),
            qualified,
            disqualified,
            inactive,
        })
    }
}

impl Drop for Member {
    fn drop(&mut self) {
        // Polynomials and symmetric keys zeroize themselves; the loose
        // scalars are ours to scrub.
        for slot in self.received_shares.iter_mut() {
            if let Some((s, t)) = slot.as_mut() {
                *s = Scalar::ZERO;
                *t = Scalar::ZERO;
            }
        }
        if let Some(share) = self.group_secret_share.as_mut() {
            *share = Scalar::ZERO;
        }
    }
}

/// Split a 64-byte plaintext into the (share, blinding share) scalar pair.
fn decode_share_pair(plaintext: &[u8]) -> Option<(Scalar, Scalar)> {
    if plaintext.len() != 64 {
        return None;
    }
    let mut share_bytes = [0u8; 32];
    let mut blinding_bytes = [0u8; 32];
    share_bytes.copy_from_slice(&plaintext[..32]);
    blinding_bytes.copy_from_slice(&plaintext[32..]);

    let share = scalar_from_bytes(&share_bytes).ok()?;
    let blinding = scalar_from_bytes(&blinding_bytes).ok()?;
    Some((share, blinding))
}
