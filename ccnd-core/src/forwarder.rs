//! Single-threaded forwarder event loop (§4.8).
//!
//! One task owns the PIT, FIB, and content store outright; every other task
//! (face I/O, CLI, repository client) only ever reaches them by sending a
//! [`ForwarderCommand`] down an unbounded `tokio::sync::mpsc` channel, so no
//! `Arc`/`Mutex` guards the tables themselves. Only [`ccnd_common::metrics::ForwarderMetrics`]
//! is shared outside this task, via `Arc`, since its counters are already
//! lock-free atomics. The interest/content handling order — content store,
//! then PIT register-or-aggregate, then FIB fan-out excluding the arrival
//! face — follows `fidinda-reto::forwarder::Forwarder::handle_interest` /
//! `handle_data`.

use crate::fib::{Fib, FloodStrategy, ForwardingStrategy};
use crate::pit::{ArrivalOutcome, ExpiryAction, Pit, DEFAULT_PIT_CAPACITY};
use crate::scheduler::Scheduler;
use crate::store::{ContentStore, InsertOutcome, DEFAULT_BYTE_BUDGET};
use bytes::Bytes;
use ccnd_common::metrics::ForwarderMetrics;
use ccnd_common::name::Name;
use ccnd_common::packet::{
    self, ContentObject, ForwardingEntry, Interest, RegistrationAction, FIB_FLAG_ACTIVE,
    FIB_FLAG_CHILD_INHERIT,
};
use ccnd_common::types::{FaceId, TimerToken};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// How often the scheduler sweep checks for expired PIT entries.
pub const PIT_SWEEP_INTERVAL: Duration = Duration::from_millis(100);
/// How often stale content-store entries are purged.
pub const CS_PURGE_INTERVAL: Duration = Duration::from_secs(5);
/// Upper clamp on a registration entry's requested lifetime (§4.10).
pub const MAX_REGISTRATION_LIFETIME_SECONDS: u32 = 86_400;

/// The only way to reach forwarder state from outside its task.
pub enum ForwarderCommand {
    Inbound { face: FaceId, bytes: Bytes },
    FaceUp { face: FaceId, sender: mpsc::UnboundedSender<Bytes> },
    FaceDown { face: FaceId },
    RegisterPrefix { prefix: Name, face: FaceId },
    UnregisterPrefix { prefix: Name, face: FaceId },
}

pub struct Forwarder {
    pit: Pit,
    fib: Fib,
    store: ContentStore,
    faces: HashMap<FaceId, mpsc::UnboundedSender<Bytes>>,
    scheduler: Scheduler,
    pit_sweep_token: TimerToken,
    cs_purge_token: TimerToken,
    strategy: Box<dyn ForwardingStrategy>,
    metrics: Arc<ForwarderMetrics>,
    commands: mpsc::UnboundedReceiver<ForwarderCommand>,
}

impl Forwarder {
    pub fn new(metrics: Arc<ForwarderMetrics>) -> (Self, mpsc::UnboundedSender<ForwarderCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut scheduler = Scheduler::new();
        let pit_sweep_token = scheduler.arm(PIT_SWEEP_INTERVAL);
        let cs_purge_token = scheduler.arm(CS_PURGE_INTERVAL);
        let forwarder = Self {
            pit: Pit::new(DEFAULT_PIT_CAPACITY, 0),
            fib: Fib::new(),
            store: ContentStore::new(DEFAULT_BYTE_BUDGET),
            faces: HashMap::new(),
            scheduler,
            pit_sweep_token,
            cs_purge_token,
            strategy: Box::new(FloodStrategy),
            metrics,
            commands: rx,
        };
        (forwarder, tx)
    }

    pub fn with_strategy(mut self, strategy: Box<dyn ForwardingStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    /// Drives the event loop until every `ForwarderCommand` sender is
    /// dropped. This is the crate's one designated `.await` point for
    /// mutable table access. Housekeeping (PIT sweep, content-store purge)
    /// rides the same `Scheduler` every other deadline in the process uses,
    /// rather than a pair of timers private to this loop: each due token is
    /// handled and immediately re-armed for its next interval.
    pub async fn run(mut self) {
        loop {
            let sleep = self.scheduler.duration_until_next().unwrap_or(PIT_SWEEP_INTERVAL);
            tokio::select! {
                cmd = self.commands.recv() => {
                    match cmd {
                        Some(cmd) => self.handle_command(cmd),
                        None => break,
                    }
                }
                _ = tokio::time::sleep(sleep) => self.run_due_timers(),
            }
        }
    }

    fn run_due_timers(&mut self) {
        for token in self.scheduler.pop_due() {
            if token == self.pit_sweep_token {
                self.sweep_pit();
                self.pit_sweep_token = self.scheduler.arm(PIT_SWEEP_INTERVAL);
            } else if token == self.cs_purge_token {
                self.store.purge_stale(now_ms());
                self.cs_purge_token = self.scheduler.arm(CS_PURGE_INTERVAL);
            }
        }
    }

    fn handle_command(&mut self, cmd: ForwarderCommand) {
        match cmd {
            ForwarderCommand::Inbound { face, bytes } => self.handle_inbound(face, bytes),
            ForwarderCommand::FaceUp { face, sender } => {
                self.faces.insert(face, sender);
                self.metrics.faces_opened.increment();
            }
            ForwarderCommand::FaceDown { face } => {
                self.faces.remove(&face);
                self.pit.remove_face(face);
                self.fib.remove_face(face);
                self.metrics.faces_closed.increment();
            }
            ForwarderCommand::RegisterPrefix { prefix, face } => {
                self.fib.register(&prefix, face, FIB_FLAG_ACTIVE | FIB_FLAG_CHILD_INHERIT, None);
            }
            ForwarderCommand::UnregisterPrefix { prefix, face } => {
                self.fib.unregister(&prefix, face);
            }
        }
    }

    /// An Interest, a Content Object, and a registration entry are told
    /// apart by which top-level dtag parses cleanly — mirrors
    /// `parse_packet`'s dispatch in the grounding source, just over three
    /// typed parsers instead of one enum.
    fn handle_inbound(&mut self, face: FaceId, bytes: Bytes) {
        if let Ok((interest, _)) = packet::parse_interest(&bytes) {
            self.handle_interest(face, interest);
        } else if let Ok((co, _, _)) = packet::parse_content_object(&bytes) {
            self.handle_content(face, co, bytes);
        } else if let Ok((entry, _)) = packet::parse_forwarding_entry(&bytes) {
            self.handle_registration(face, entry);
        }
    }

    /// Applies a FIB registration entry (§4.10): updates or removes the
    /// named prefix's association with the arrival face, then replies with
    /// a signed Content Object echoing the effective entry, including the
    /// arrival face's id for a self-registration.
    fn handle_registration(&mut self, face: FaceId, entry: ForwardingEntry) {
        let lifetime_seconds = entry.lifetime_seconds.min(MAX_REGISTRATION_LIFETIME_SECONDS);
        match entry.action {
            RegistrationAction::Register | RegistrationAction::SelfRegister => {
                let expiry_ms = now_ms().saturating_add(u64::from(lifetime_seconds) * 1000);
                self.fib.register(&entry.prefix, face, entry.flags, Some(expiry_ms));
            }
            RegistrationAction::Unregister => {
                self.fib.unregister(&entry.prefix, face);
            }
        }
        self.metrics.registrations_applied.increment();

        let effective = ForwardingEntry {
            action: entry.action,
            prefix: entry.prefix.clone(),
            publisher_key_digest: entry.publisher_key_digest,
            face_id: Some(face.0),
            flags: entry.flags,
            lifetime_seconds,
        };
        let reply_name = entry.prefix.append(ccnd_common::name::Component::new("registration-ack"));
        let reply = ContentObject::new_signed(
            reply_name,
            ccnd_common::packet::SignedInfo::new(ccnd_common::packet::ContentType::Data),
            packet::encode_forwarding_entry(&effective),
        );
        self.send_to(face, packet::encode_content_object(&reply));
    }

    fn handle_interest(&mut self, face: FaceId, interest: Interest) {
        self.metrics.interests_received.increment();
        let now = now_ms();

        if let Some((_co, encoded)) = self.store.lookup(&interest, now) {
            let encoded = encoded.clone();
            self.metrics.cs_hits.increment();
            self.metrics.interests_satisfied.increment();
            self.send_to(face, encoded);
            return;
        }
        self.metrics.cs_misses.increment();

        match self.pit.on_interest_arrival(&interest, face, now) {
            ArrivalOutcome::LoopDetected => {
                self.metrics.interests_dropped_loop.increment();
            }
            ArrivalOutcome::Aggregated => {
                self.metrics.interests_aggregated.increment();
            }
            ArrivalOutcome::New => {
                self.metrics.pit_inserts.increment();
                let outgoing = self.strategy.select_outgoing(&interest.name, face, &self.fib, &[]);
                if outgoing.is_empty() {
                    self.metrics.fib_misses.increment();
                } else {
                    self.metrics.fib_hits.increment();
                    self.pit.record_outgoing(&interest, &outgoing);
                    let encoded = packet::encode_interest(&interest);
                    for out_face in outgoing {
                        self.metrics.interests_forwarded.increment();
                        self.send_to(out_face, encoded.clone());
                    }
                }
            }
        }
        self.metrics.pit_size.set(self.pit.len() as u64);
    }

    /// An arriving Content Object always lands in the content store —
    /// including one with no pending Interest at all, the way a local
    /// publish seeds the cache for a later arrival (§8 scenario 4) — and
    /// additionally satisfies whatever PIT entries it matches.
    fn handle_content(&mut self, face: FaceId, co: ContentObject, encoded: Bytes) {
        self.metrics.content_received.increment();
        let reply_faces = self.pit.satisfy(&co, Some(face));
        if reply_faces.is_empty() {
            self.metrics.content_unsolicited.increment();
        } else {
            for out_face in reply_faces {
                self.metrics.content_sent.increment();
                self.send_to(out_face, encoded.clone());
            }
            self.metrics.interests_satisfied.increment();
        }
        match self.store.insert(co, encoded) {
            InsertOutcome::Inserted(_) => self.metrics.cs_inserts.increment(),
            InsertOutcome::DuplicateDropped => {}
        }
        self.metrics.cs_size.set(self.store.len() as u64);
    }

    fn sweep_pit(&mut self) {
        let now = now_ms();
        self.fib.sweep_expired(now);
        for action in self.pit.sweep_expired(now) {
            match action {
                ExpiryAction::Retransmit { name, selectors } => {
                    let interest = Interest { name, selectors, nonce: None, lifetime_ms: None };
                    let encoded = packet::encode_interest(&interest);
                    for out_face in self.fib.hops_for_name(&interest.name) {
                        self.send_to(out_face, encoded.clone());
                    }
                }
                ExpiryAction::Deleted => {
                    self.metrics.interests_timed_out.increment();
                }
            }
        }
        self.metrics.pit_size.set(self.pit.len() as u64);
    }

    fn send_to(&mut self, face: FaceId, bytes: Bytes) {
        let drop_face = match self.faces.get(&face) {
            Some(sender) => sender.send(bytes).is_err(),
            None => {
                self.metrics.face_send_drops.increment();
                return;
            }
        };
        if drop_face {
            self.faces.remove(&face);
            self.metrics.face_send_drops.increment();
        }
    }
}

fn now_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use ccnd_common::packet::{ContentType, SignedInfo};

    fn spawn() -> (mpsc::UnboundedSender<ForwarderCommand>, tokio::task::JoinHandle<()>) {
        let (forwarder, tx) = Forwarder::new(Arc::new(ForwarderMetrics::new()));
        let handle = tokio::spawn(forwarder.run());
        (tx, handle)
    }

    async fn attach_face(tx: &mpsc::UnboundedSender<ForwarderCommand>, face: FaceId) -> mpsc::UnboundedReceiver<Bytes> {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        tx.send(ForwarderCommand::FaceUp { face, sender: out_tx }).unwrap();
        out_rx
    }

    #[tokio::test]
    async fn interest_forwards_to_registered_face_and_reply_routes_back() {
        let (tx, _handle) = spawn();
        let mut downstream = attach_face(&tx, FaceId(2)).await;
        let mut upstream = attach_face(&tx, FaceId(1)).await;

        tx.send(ForwarderCommand::RegisterPrefix { prefix: Name::from_uri("ccnx:/a"), face: FaceId(2) }).unwrap();

        let interest = Interest::new(Name::from_uri("ccnx:/a/b")).with_nonce(Bytes::from_static(b"n1"));
        tx.send(ForwarderCommand::Inbound { face: FaceId(1), bytes: packet::encode_interest(&interest) }).unwrap();

        let forwarded = downstream.recv().await.unwrap();
        let (decoded, _) = packet::parse_interest(&forwarded).unwrap();
        assert_eq!(decoded.name, interest.name);

        let co = ContentObject::new_signed(Name::from_uri("ccnx:/a/b"), SignedInfo::new(ContentType::Data), Bytes::from_static(b"x"));
        tx.send(ForwarderCommand::Inbound { face: FaceId(2), bytes: packet::encode_content_object(&co) }).unwrap();

        let reply = upstream.recv().await.unwrap();
        let (decoded_co, _, _) = packet::parse_content_object(&reply).unwrap();
        assert_eq!(decoded_co.name, co.name);
    }
}
