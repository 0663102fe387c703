//! Session coordinator — the single owner of matchmaking and session state.
//!
//! Runs as one actor task. Inbound events, grace-period expiries and
//! operator commands arrive over channels and are applied one at a time,
//! so pool, registry, readiness and reconnection state never interleave.
//! Outbound notifications are non-blocking channel sends; backup writes,
//! backup reads and message moderation run on spawned tasks. A backup read
//! reports back as a [`Recovery`] and is applied like any other event.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use echo_core::profile::MATCH_THRESHOLD;
use echo_core::{
    now_millis, AttachmentRef, ConnectionId, CoordinatorError, EndReason, InboundEvent,
    MatchSummary, Message, OutboundEvent, Profile, SessionId, UserId,
};

use crate::analysis::TextAnalyzer;
use crate::backup::SessionBackup;
use crate::connection::{ConnectionTable, OutboundSender};
use crate::reconnect::{
    Expiry, PendingSnapshot, ReconnectAttempt, ReconnectionWindow, RECONNECT_GRACE,
};
use crate::session::{Participant, Session, SessionRegistry, Slot};
use crate::signaling::{ReadinessOutcome, SignalingArbiter};
use crate::waiting_pool::{WaitingEntry, WaitingPool};

const NO_MATCH_REASON: &str =
    "No compatible users online right now. You will be matched when someone compatible joins.";

const NO_HELD_SESSION: &str = "No session is waiting for this user";

/// Upper bound on a cold-start backup lookup.
pub const BACKUP_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Result of a backup lookup for a reconnect that found nothing in memory.
#[derive(Debug)]
pub struct Recovery {
    pub connection_id: ConnectionId,
    pub user_id: UserId,
    pub held: Option<(PendingSnapshot, Session)>,
}

/// Background analysis of relayed messages.
#[derive(Clone)]
pub struct Moderation {
    pub analyzer: Arc<dyn TextAnalyzer>,
    pub flag_threshold: f32,
}

/// Counters reported by the operator API and the periodic snapshot log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorStatus {
    pub connections: usize,
    pub waiting_anonymous: usize,
    pub waiting_profiled: usize,
    pub sessions: usize,
    pub pending_reconnects: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("session coordinator is not running")]
pub struct CoordinatorClosed;

enum RelayKind {
    Offer,
    Answer,
    Ice,
}

pub struct SessionCoordinator {
    registry: SessionRegistry,
    connections: ConnectionTable,
    anonymous: WaitingPool,
    profiled: WaitingPool,
    arbiter: SignalingArbiter,
    window: ReconnectionWindow,
    expiry_rx: mpsc::UnboundedReceiver<Expiry>,
    recovery_tx: mpsc::UnboundedSender<Recovery>,
    recovery_rx: mpsc::UnboundedReceiver<Recovery>,
    backup: SessionBackup,
    moderation: Option<Moderation>,
}

impl SessionCoordinator {
    pub fn new(registry: SessionRegistry, backup: SessionBackup) -> Self {
        let (expiry_tx, expiry_rx) = mpsc::unbounded_channel();
        let (recovery_tx, recovery_rx) = mpsc::unbounded_channel();
        Self {
            registry,
            connections: ConnectionTable::new(),
            anonymous: WaitingPool::new(),
            profiled: WaitingPool::new(),
            arbiter: SignalingArbiter::new(),
            window: ReconnectionWindow::new(expiry_tx),
            expiry_rx,
            recovery_tx,
            recovery_rx,
            backup,
            moderation: None,
        }
    }

    pub fn with_moderation(mut self, moderation: Moderation) -> Self {
        self.moderation = Some(moderation);
        self
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn status(&self) -> CoordinatorStatus {
        CoordinatorStatus {
            connections: self.connections.len(),
            waiting_anonymous: self.anonymous.len(),
            waiting_profiled: self.profiled.len(),
            sessions: self.registry.len(),
            pending_reconnects: self.window.len(),
        }
    }

    pub fn is_waiting(&self, connection_id: &ConnectionId) -> bool {
        self.anonymous.contains(connection_id) || self.profiled.contains(connection_id)
    }

    // ── Entry points ──────────────────────────────────────────────────────────

    /// Register a new transport and announce the new user count.
    pub fn connect(&mut self, connection_id: ConnectionId, sender: OutboundSender) {
        self.connections.insert(connection_id, sender);
        info!(connection = %connection_id, online = self.connections.len(), "connection opened");
        self.broadcast_user_count();
    }

    /// Apply one inbound event. Failures are reported to `connection_id`
    /// only.
    pub async fn handle(&mut self, connection_id: ConnectionId, event: InboundEvent) {
        let name = event.name();
        debug!(connection = %connection_id, event = name, "inbound event");

        let result = match event {
            InboundEvent::StartAnonymousMatch => self.start_anonymous(connection_id),
            InboundEvent::StartProfiledMatch { profile } => {
                self.start_profiled(connection_id, profile)
            }
            InboundEvent::SendMessage {
                session_id,
                body,
                attachment_ref,
            } => self.send_message(connection_id, session_id, body, attachment_ref),
            InboundEvent::Skip => self.leave(connection_id, EndReason::Skip),
            InboundEvent::End => self.leave(connection_id, EndReason::UserEnded),
            InboundEvent::Disconnect => {
                self.disconnect(connection_id);
                Ok(())
            }
            InboundEvent::Reconnect { user_id } => self.reconnect(connection_id, user_id),
            InboundEvent::RequestVideo => self.request_video(connection_id),
            InboundEvent::AcceptVideo => self.accept_video(connection_id),
            InboundEvent::RejectVideo => self.reject_video(connection_id),
            InboundEvent::SignalReady => {
                self.signal_ready(connection_id);
                Ok(())
            }
            InboundEvent::RelayOffer { payload } => {
                self.relay(connection_id, RelayKind::Offer, payload);
                Ok(())
            }
            InboundEvent::RelayAnswer { payload } => {
                self.relay(connection_id, RelayKind::Answer, payload);
                Ok(())
            }
            InboundEvent::RelayIce { payload } => {
                self.relay(connection_id, RelayKind::Ice, payload);
                Ok(())
            }
            InboundEvent::LeaveCall => self.leave_call(connection_id),
            InboundEvent::GetUserCount => {
                let count = self.connections.len();
                self.connections
                    .send(&connection_id, OutboundEvent::UserCount { count });
                Ok(())
            }
        };

        if let Err(e) = result {
            debug!(connection = %connection_id, event = name, error = %e, "event rejected");
            self.report(connection_id, e);
        }
    }

    /// Apply a fired grace-period timer.
    pub async fn handle_expiry(&mut self, expiry: Expiry) {
        let Some(pending) = self.window.expire(&expiry) else {
            debug!(user_id = %expiry.user_id, "stale expiry ignored");
            return;
        };
        self.backup.delete_pending(&pending.user_id);

        if !self.registry.contains(&pending.session_id) {
            debug!(session_id = %pending.session_id, "expiry for session that already ended");
            return;
        }
        info!(
            user_id = %pending.user_id,
            session_id = %pending.session_id,
            "reconnection window expired"
        );
        self.end_session(&pending.session_id, EndReason::DisconnectTimeout);
    }

    /// Wait for the next grace-period expiry and apply it. Returns false
    /// when no more expiries can arrive.
    pub async fn handle_next_expiry(&mut self) -> bool {
        match self.expiry_rx.recv().await {
            Some(expiry) => {
                self.handle_expiry(expiry).await;
                true
            }
            None => false,
        }
    }

    /// Apply a finished backup lookup. Memory may have moved on while the
    /// read was in flight, so everything is checked again here.
    pub fn handle_recovery(&mut self, recovery: Recovery) {
        let Recovery {
            connection_id,
            user_id,
            held,
        } = recovery;

        if !self.connections.is_live(&connection_id) {
            debug!(connection = %connection_id, user_id = %user_id, "recovery for closed connection dropped");
            return;
        }
        if self.registry.get_by_connection(&connection_id).is_some() {
            self.report(connection_id, CoordinatorError::AlreadyInSession);
            return;
        }
        if self.window.get(&user_id).is_some() {
            if let Err(e) = self.reconnect(connection_id, user_id) {
                self.report(connection_id, e);
            }
            return;
        }

        let recovered = held.and_then(|(pending, session)| self.install_recovered(&user_id, pending, session));
        match recovered {
            Some(session_id) => self.restore_into(connection_id, &user_id, &session_id),
            None => self.reconnect_failed(connection_id, NO_HELD_SESSION),
        }
    }

    /// Wait for the next backup lookup and apply it. Returns false when no
    /// more lookups can arrive.
    pub async fn handle_next_recovery(&mut self) -> bool {
        match self.recovery_rx.recv().await {
            Some(recovery) => {
                self.handle_recovery(recovery);
                true
            }
            None => false,
        }
    }

    /// Terminate a session, notify whoever is still connected and drop
    /// every piece of state tied to it. Idempotent.
    pub fn end_session(&mut self, session_id: &str, reason: EndReason) -> Option<Session> {
        let session = self.registry.terminate(session_id)?;

        self.arbiter.close(session_id);
        for pending in self.window.cancel_for_session(session_id) {
            self.backup.delete_pending(&pending.user_id);
        }
        self.backup.delete_session(session_id);

        let duration_ms = session.duration_ms();
        let ended = OutboundEvent::SessionEnded {
            reason,
            duration_ms,
            message_count: session.message_count,
        };
        for p in [&session.participant_a, &session.participant_b] {
            if p.connected {
                self.connections.send(&p.connection_id, ended.clone());
            }
        }

        info!(
            session_id,
            reason = %reason,
            duration_ms,
            messages = session.message_count,
            "session ended"
        );
        Some(session)
    }

    // ── Matchmaking ───────────────────────────────────────────────────────────

    fn begin_matchmaking(&mut self, connection_id: ConnectionId) -> Result<UserId, CoordinatorError> {
        if self.registry.get_by_connection(&connection_id).is_some() {
            return Err(CoordinatorError::AlreadyInSession);
        }
        let user_id = uuid::Uuid::new_v4().to_string();
        self.connections.set_user(&connection_id, &user_id);
        self.dequeue(&connection_id);
        Ok(user_id)
    }

    fn start_anonymous(&mut self, connection_id: ConnectionId) -> Result<(), CoordinatorError> {
        let user_id = self.begin_matchmaking(connection_id)?;

        let connections = &self.connections;
        let partner = self
            .anonymous
            .find_partner(&connection_id, |c| connections.is_live(c));

        match partner {
            Some(partner) => {
                self.backup.delete_waiting(&partner.connection_id);
                let me = Participant::new(connection_id, user_id, None);
                let them = Participant::new(partner.connection_id, partner.user_id, None);
                self.open_session(me, them, 0, Vec::new(), None);
            }
            None => {
                let entry = WaitingEntry {
                    connection_id,
                    user_id: user_id.clone(),
                    profile: None,
                };
                self.backup.save_waiting(&entry);
                self.anonymous.enqueue(entry);
                info!(connection = %connection_id, user_id = %user_id, "waiting for anonymous partner");
                self.connections
                    .send(&connection_id, OutboundEvent::Waiting { user_id });
            }
        }
        Ok(())
    }

    fn start_profiled(
        &mut self,
        connection_id: ConnectionId,
        profile: Profile,
    ) -> Result<(), CoordinatorError> {
        if let Some(reason) = profile.validation_error() {
            return Err(CoordinatorError::InvalidProfile(reason.to_string()));
        }
        let user_id = self.begin_matchmaking(connection_id)?;

        let connections = &self.connections;
        let best = self.profiled.find_best_match(
            &connection_id,
            &profile,
            MATCH_THRESHOLD,
            |c| connections.is_live(c),
        );

        match best {
            Some(best) => {
                self.backup.delete_waiting(&best.entry.connection_id);
                let theirs = best.entry.profile.clone().unwrap_or_default();
                let summary = MatchSummary::describe(&profile, &theirs, &best.score.common_interests);
                let me = Participant::new(connection_id, user_id, Some(profile));
                let them = Participant::new(best.entry.connection_id, best.entry.user_id, Some(theirs));
                self.open_session(
                    me,
                    them,
                    best.score.value,
                    best.score.common_interests,
                    (!summary.is_empty()).then_some(summary),
                );
            }
            None => {
                let entry = WaitingEntry {
                    connection_id,
                    user_id: user_id.clone(),
                    profile: Some(profile),
                };
                self.backup.save_waiting(&entry);
                self.profiled.enqueue(entry);
                info!(connection = %connection_id, user_id = %user_id, "no profiled match, waiting");
                self.connections.send(
                    &connection_id,
                    OutboundEvent::NoMatchAvailable {
                        user_id,
                        reason: NO_MATCH_REASON.to_string(),
                    },
                );
            }
        }
        Ok(())
    }

    fn open_session(
        &mut self,
        requester: Participant,
        partner: Participant,
        match_score: u8,
        common_interests: Vec<String>,
        match_summary: Option<MatchSummary>,
    ) {
        let is_profiled = requester.profile.is_some();
        let session = self
            .registry
            .create(requester, partner, match_score, common_interests, match_summary);
        self.backup.save_session(&session);

        for slot in [Slot::A, Slot::B] {
            let me = session.participant(slot);
            let other = session.participant(slot.other());
            self.connections.send(
                &me.connection_id,
                OutboundEvent::Matched {
                    session_id: session.session_id.clone(),
                    user_id: me.user_id.clone(),
                    partner_id: other.user_id.clone(),
                    match_score: session.match_score,
                    is_profiled,
                    match_summary: session.match_summary.clone(),
                },
            );
        }

        info!(
            session_id = %session.session_id,
            a = %session.participant_a.user_id,
            b = %session.participant_b.user_id,
            score = session.match_score,
            profiled = is_profiled,
            "session created"
        );
    }

    /// Remove a connection from both pools.
    fn dequeue(&mut self, connection_id: &ConnectionId) -> bool {
        let anon = self.anonymous.remove_by_connection(connection_id).is_some();
        let prof = self.profiled.remove_by_connection(connection_id).is_some();
        if anon || prof {
            self.backup.delete_waiting(connection_id);
        }
        anon || prof
    }

    // ── Messaging ─────────────────────────────────────────────────────────────

    fn active_session(&self, connection_id: &ConnectionId) -> Result<Session, CoordinatorError> {
        let session_id = self
            .registry
            .get_by_connection(connection_id)
            .ok_or(CoordinatorError::NoActiveSession)?;
        self.registry
            .get(&session_id)
            .ok_or(CoordinatorError::SessionNotFound(session_id))
    }

    fn send_message(
        &mut self,
        connection_id: ConnectionId,
        claimed: Option<SessionId>,
        body: String,
        attachment_ref: Option<AttachmentRef>,
    ) -> Result<(), CoordinatorError> {
        let session = self.active_session(&connection_id)?;
        if claimed.is_some_and(|id| id != session.session_id) {
            return Err(CoordinatorError::NotAParticipant(connection_id));
        }
        if body.trim().is_empty() && attachment_ref.is_none() {
            return Err(CoordinatorError::EmptyMessage);
        }

        let partner = session.partner_of(&connection_id)?.clone();
        let sender = session
            .slot_of(&connection_id)
            .map(|slot| session.participant(slot).user_id.clone())
            .ok_or(CoordinatorError::NotAParticipant(connection_id))?;

        let message = Message::new(&sender, body, attachment_ref);
        let count = self
            .registry
            .append_message(&session.session_id, message.clone())?;
        debug!(
            session_id = %session.session_id,
            sender = %sender,
            preview = %message.preview(),
            count,
            "message appended"
        );

        if let Some(updated) = self.registry.get(&session.session_id) {
            self.backup.save_messages(&updated.session_id, &updated.messages);
        }
        self.moderate(&session.session_id, &message);

        if partner.connected {
            self.connections
                .send(&partner.connection_id, OutboundEvent::MessageReceived(message));
        }
        Ok(())
    }

    fn moderate(&self, session_id: &str, message: &Message) {
        let Some(moderation) = self.moderation.clone() else {
            return;
        };
        if message.body.trim().is_empty() {
            return;
        }
        let text = message.body.clone();
        let message_id = message.message_id.clone();
        let session_id = session_id.to_string();
        tokio::spawn(async move {
            match moderation.analyzer.analyze(&text).await {
                Ok(analysis) if analysis.should_flag(moderation.flag_threshold) => {
                    warn!(
                        session_id = %session_id,
                        message_id = %message_id,
                        toxicity = analysis.toxicity,
                        "message flagged"
                    );
                }
                Ok(_) => {}
                Err(e) => warn!(message_id = %message_id, error = %e, "message analysis failed"),
            }
        });
    }

    /// Skip or end: terminate the session, or leave the pool if waiting.
    fn leave(&mut self, connection_id: ConnectionId, reason: EndReason) -> Result<(), CoordinatorError> {
        if let Some(session_id) = self.registry.get_by_connection(&connection_id) {
            self.end_session(&session_id, reason);
            return Ok(());
        }
        if self.dequeue(&connection_id) {
            info!(connection = %connection_id, "left waiting pool");
            return Ok(());
        }
        Err(CoordinatorError::NoActiveSession)
    }

    // ── Disconnect / reconnect ────────────────────────────────────────────────

    fn disconnect(&mut self, connection_id: ConnectionId) {
        self.connections.remove(&connection_id);
        self.dequeue(&connection_id);

        if let Some(session_id) = self.registry.get_by_connection(&connection_id) {
            self.hold_session(&session_id, connection_id);
        }

        info!(connection = %connection_id, online = self.connections.len(), "connection closed");
        self.broadcast_user_count();
    }

    /// Keep a session alive for a dropped participant and open its grace
    /// window.
    fn hold_session(&mut self, session_id: &str, connection_id: ConnectionId) {
        let Some(slot) = self
            .registry
            .get(session_id)
            .and_then(|s| s.slot_of(&connection_id))
        else {
            return;
        };
        let Some(session) = self.registry.mark_disconnected(session_id, slot) else {
            return;
        };

        let user_id = session.participant(slot).user_id.clone();
        let pending = self.window.mark_disconnected(&user_id, session_id);
        self.backup.save_pending(&pending.snapshot());
        self.backup.save_session(&session);

        let partner = session.participant(slot.other());
        if partner.connected {
            self.connections.send(
                &partner.connection_id,
                OutboundEvent::PartnerDisconnected {
                    grace_secs: RECONNECT_GRACE.as_secs(),
                },
            );
        }
        info!(session_id, user_id = %user_id, "participant disconnected, holding session");
    }

    fn reconnect(&mut self, connection_id: ConnectionId, user_id: UserId) -> Result<(), CoordinatorError> {
        if self.registry.get_by_connection(&connection_id).is_some() {
            return Err(CoordinatorError::AlreadyInSession);
        }

        match self.window.try_reconnect(&user_id) {
            ReconnectAttempt::Restored(pending) => {
                self.restore_into(connection_id, &user_id, &pending.session_id);
            }
            ReconnectAttempt::Expired(pending) => {
                info!(user_id = %user_id, session_id = %pending.session_id, "reconnect after grace period");
                self.backup.delete_pending(&user_id);
                self.end_session(&pending.session_id, EndReason::DisconnectTimeout);
                self.reconnect_failed(connection_id, "Reconnection window has expired");
            }
            ReconnectAttempt::Unknown => self.lookup_backup(connection_id, user_id),
        }
        Ok(())
    }

    /// Read the backup for a session held by a previous process. The read
    /// runs on its own task and comes back through `recovery_rx`.
    fn lookup_backup(&mut self, connection_id: ConnectionId, user_id: UserId) {
        if !self.backup.is_enabled() || self.registry.session_for_user(&user_id).is_some() {
            self.reconnect_failed(connection_id, NO_HELD_SESSION);
            return;
        }

        let backup = self.backup.clone();
        let tx = self.recovery_tx.clone();
        debug!(connection = %connection_id, user_id = %user_id, "reconnect waiting on backup lookup");
        tokio::spawn(async move {
            let held = match tokio::time::timeout(BACKUP_READ_TIMEOUT, backup.load_held_session(&user_id)).await {
                Ok(held) => held,
                Err(_) => {
                    warn!(user_id = %user_id, "backup lookup timed out");
                    None
                }
            };
            let _ = tx.send(Recovery {
                connection_id,
                user_id,
                held,
            });
        });
    }

    /// Re-install a session read back from the backup. The other
    /// participant gets a fresh grace window. Returns the recovered id.
    fn install_recovered(
        &mut self,
        user_id: &str,
        pending: PendingSnapshot,
        mut session: Session,
    ) -> Option<SessionId> {
        if !pending.within_grace(now_millis()) {
            debug!(user_id, "backup pending record outside grace period");
            return None;
        }
        if session.session_id != pending.session_id
            || self.registry.contains(&pending.session_id)
            || self.registry.session_for_user(user_id).is_some()
        {
            return None;
        }
        let slot = session.slot_of_user(user_id)?;

        session.participant_a.connected = false;
        session.participant_b.connected = false;
        let other = session.participant(slot.other()).user_id.clone();
        self.registry.restore(session);
        let other_pending = self.window.mark_disconnected(&other, &pending.session_id);
        self.backup.save_pending(&other_pending.snapshot());

        info!(user_id, session_id = %pending.session_id, "session recovered from backup");
        Some(pending.session_id)
    }

    fn restore_into(&mut self, connection_id: ConnectionId, user_id: &str, session_id: &str) {
        let Some(slot) = self
            .registry
            .get(session_id)
            .and_then(|s| s.slot_of_user(user_id))
        else {
            self.reconnect_failed(connection_id, "Session no longer exists");
            return;
        };

        self.dequeue(&connection_id);
        let Some(session) = self.registry.rebind(session_id, slot, connection_id) else {
            self.reconnect_failed(connection_id, "Session no longer exists");
            return;
        };
        self.connections.set_user(&connection_id, user_id);
        self.arbiter.reset(session_id);
        self.backup.delete_pending(user_id);
        self.backup.save_session(&session);

        let partner = session.participant(slot.other());
        self.connections.send(
            &connection_id,
            OutboundEvent::SessionRestored {
                session_id: session.session_id.clone(),
                user_id: user_id.to_string(),
                partner_id: partner.user_id.clone(),
                messages: session.messages.clone(),
                partner_connected: partner.connected,
            },
        );
        if partner.connected {
            self.connections
                .send(&partner.connection_id, OutboundEvent::PartnerRestored);
        }
        info!(session_id, user_id, connection = %connection_id, "session restored");
    }

    fn reconnect_failed(&self, connection_id: ConnectionId, reason: &str) {
        self.connections.send(
            &connection_id,
            OutboundEvent::ReconnectFailed {
                reason: reason.to_string(),
            },
        );
    }

    // ── Video calls ───────────────────────────────────────────────────────────

    fn request_video(&mut self, connection_id: ConnectionId) -> Result<(), CoordinatorError> {
        let session = self.active_session(&connection_id)?;
        let partner = session.partner_of(&connection_id)?;
        let requester_id = session
            .slot_of(&connection_id)
            .map(|slot| session.participant(slot).user_id.clone())
            .unwrap_or_default();
        if partner.connected {
            self.connections.send(
                &partner.connection_id,
                OutboundEvent::VideoCallRequest { requester_id },
            );
        }
        Ok(())
    }

    fn accept_video(&mut self, connection_id: ConnectionId) -> Result<(), CoordinatorError> {
        let session = self.active_session(&connection_id)?;
        let accepted = OutboundEvent::VideoCallAccepted {
            session_id: session.session_id.clone(),
        };
        for p in [&session.participant_a, &session.participant_b] {
            if p.connected {
                self.connections.send(&p.connection_id, accepted.clone());
            }
        }
        info!(session_id = %session.session_id, "video call accepted");
        Ok(())
    }

    fn reject_video(&mut self, connection_id: ConnectionId) -> Result<(), CoordinatorError> {
        let session = self.active_session(&connection_id)?;
        let requester = session.partner_of(&connection_id)?;
        if requester.connected {
            self.connections
                .send(&requester.connection_id, OutboundEvent::VideoCallRejected);
        }
        Ok(())
    }

    fn signal_ready(&mut self, connection_id: ConnectionId) {
        let Ok(session) = self.active_session(&connection_id) else {
            debug!(connection = %connection_id, "late signal-ready dropped");
            return;
        };
        let Some(slot) = session.slot_of(&connection_id) else {
            return;
        };

        match self.arbiter.signal_ready(&session.session_id, slot) {
            ReadinessOutcome::AssignRoles => {
                let session_id = session.session_id.clone();
                self.connections.send(
                    &session.participant_a.connection_id,
                    OutboundEvent::CreateOffer {
                        session_id: session_id.clone(),
                    },
                );
                self.connections.send(
                    &session.participant_b.connection_id,
                    OutboundEvent::AwaitOffer {
                        session_id: session_id.clone(),
                    },
                );
                info!(session_id = %session_id, offerer = %session.participant_a.user_id, "signaling roles assigned");
            }
            ReadinessOutcome::Waiting => {
                debug!(session_id = %session.session_id, ?slot, "waiting for partner readiness");
            }
            ReadinessOutcome::AlreadyAssigned => {}
        }
    }

    fn relay(&mut self, connection_id: ConnectionId, kind: RelayKind, payload: serde_json::Value) {
        let Ok(session) = self.active_session(&connection_id) else {
            debug!(connection = %connection_id, "late signaling payload dropped");
            return;
        };
        let (Some(slot), Ok(partner)) = (
            session.slot_of(&connection_id),
            session.partner_of(&connection_id),
        ) else {
            return;
        };
        if !partner.connected {
            debug!(session_id = %session.session_id, "signaling payload for disconnected partner dropped");
            return;
        }

        let sender_id = session.participant(slot).user_id.clone();
        let event = match kind {
            RelayKind::Offer => OutboundEvent::Offer { payload, sender_id },
            RelayKind::Answer => OutboundEvent::Answer { payload, sender_id },
            RelayKind::Ice => OutboundEvent::IceCandidate { payload, sender_id },
        };
        self.connections.send(&partner.connection_id, event);
    }

    fn leave_call(&mut self, connection_id: ConnectionId) -> Result<(), CoordinatorError> {
        let session = self.active_session(&connection_id)?;
        let partner = session.partner_of(&connection_id)?;
        if partner.connected {
            self.connections
                .send(&partner.connection_id, OutboundEvent::PartnerLeftCall);
        }
        self.end_session(&session.session_id, EndReason::UserLeftVideo);
        Ok(())
    }

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn broadcast_user_count(&self) {
        self.connections.broadcast(&OutboundEvent::UserCount {
            count: self.connections.len(),
        });
    }

    fn report(&self, connection_id: ConnectionId, error: CoordinatorError) {
        let event = if error.is_validation() {
            OutboundEvent::ValidationError {
                reason: error.to_string(),
            }
        } else {
            OutboundEvent::Error {
                code: error.code().to_string(),
                message: error.to_string(),
            }
        };
        self.connections.send(&connection_id, event);
    }

    // ── Actor ─────────────────────────────────────────────────────────────────

    /// Move the coordinator onto its own task.
    pub fn spawn(self, shutdown: broadcast::Receiver<()>) -> (CoordinatorHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(1024);
        let task = tokio::spawn(self.run(rx, shutdown));
        (CoordinatorHandle { tx }, task)
    }

    pub async fn run(mut self, mut commands: mpsc::Receiver<Command>, mut shutdown: broadcast::Receiver<()>) {
        info!("session coordinator started");
        loop {
            let next = tokio::select! {
                _ = shutdown.recv() => {
                    info!("session coordinator shutting down");
                    break;
                }
                cmd = commands.recv() => match cmd {
                    Some(cmd) => Next::Command(cmd),
                    None => break,
                },
                Some(expiry) = self.expiry_rx.recv() => Next::Expiry(expiry),
                Some(recovery) = self.recovery_rx.recv() => Next::Recovery(recovery),
            };

            match next {
                Next::Expiry(expiry) => self.handle_expiry(expiry).await,
                Next::Recovery(recovery) => self.handle_recovery(recovery),
                Next::Command(Command::Connect {
                    connection_id,
                    sender,
                }) => self.connect(connection_id, sender),
                Next::Command(Command::Event {
                    connection_id,
                    event,
                }) => self.handle(connection_id, event).await,
                Next::Command(Command::Status(reply)) => {
                    let _ = reply.send(self.status());
                }
                Next::Command(Command::EndSession { session_id, reply }) => {
                    let ended = self
                        .end_session(&session_id, EndReason::EndedByOperator)
                        .is_some();
                    let _ = reply.send(ended);
                }
            }
        }
    }
}

enum Next {
    Command(Command),
    Expiry(Expiry),
    Recovery(Recovery),
}

/// Messages accepted by the coordinator task.
pub enum Command {
    Connect {
        connection_id: ConnectionId,
        sender: OutboundSender,
    },
    Event {
        connection_id: ConnectionId,
        event: InboundEvent,
    },
    Status(oneshot::Sender<CoordinatorStatus>),
    EndSession {
        session_id: SessionId,
        reply: oneshot::Sender<bool>,
    },
}

/// Cloneable sender side of the coordinator task.
#[derive(Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::Sender<Command>,
}

impl CoordinatorHandle {
    pub async fn connect(
        &self,
        connection_id: ConnectionId,
        sender: OutboundSender,
    ) -> Result<(), CoordinatorClosed> {
        self.tx
            .send(Command::Connect {
                connection_id,
                sender,
            })
            .await
            .map_err(|_| CoordinatorClosed)
    }

    pub async fn dispatch(
        &self,
        connection_id: ConnectionId,
        event: InboundEvent,
    ) -> Result<(), CoordinatorClosed> {
        self.tx
            .send(Command::Event {
                connection_id,
                event,
            })
            .await
            .map_err(|_| CoordinatorClosed)
    }

    pub async fn status(&self) -> Result<CoordinatorStatus, CoordinatorClosed> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Status(reply))
            .await
            .map_err(|_| CoordinatorClosed)?;
        rx.await.map_err(|_| CoordinatorClosed)
    }

    /// Returns whether a session with that id was active.
    pub async fn end_session(&self, session_id: &str) -> Result<bool, CoordinatorClosed> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::EndSession {
                session_id: session_id.to_string(),
                reply,
            })
            .await
            .map_err(|_| CoordinatorClosed)?;
        rx.await.map_err(|_| CoordinatorClosed)
    }
}
