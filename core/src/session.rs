//! Session/connection layer: one bidirectional message channel to one peer.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use thiserror::Error;

use crate::prng::prng_next;
use crate::protocol::{self, Message, ProtocolError};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("channel is not open")]
    NotOpen,
    #[error("local peer identity is not ready yet")]
    NotReady,
    #[error("a connection already exists")]
    AlreadyConnected,
    #[error("role already assigned; a host cannot dial out")]
    RoleConflict,
    #[error("unknown peer id {0:?}")]
    UnknownPeer(String),
    #[error("transport failure: {0}")]
    Transport(String),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Lifecycle and data events raised by a session, in arrival order.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    /// The peer library is ready and our identity is known.
    Ready { local_id: String },
    /// A remote peer dialed us and the connection was accepted.
    Incoming { remote_id: String },
    /// The channel is usable.
    Open,
    Data(Message),
    Close,
    Error(String),
}

/// Transport consumed by the synchronization protocol.
///
/// `send` is best-effort: delivery and ordering are not guaranteed, and an
/// error only means the message was certainly not sent.
pub trait Session {
    /// Makes this peer discoverable and returns the id a remote must dial.
    fn host(&mut self) -> Result<String, SessionError>;
    fn connect(&mut self, remote_id: &str) -> Result<(), SessionError>;
    fn is_open(&self) -> bool;
    fn send(&mut self, msg: &Message) -> Result<(), SessionError>;
}

/// Builds the link a player can hand to their opponent.
pub fn share_link(base_url: &str, local_id: &str) -> String {
    let base = base_url.split('?').next().unwrap_or(base_url);
    format!("{base}?id={local_id}")
}

/// Extracts the `id` parameter from a URL query string (with or without `?`).
pub fn peer_id_from_query(query: &str) -> Option<String> {
    query
        .trim_start_matches('?')
        .split('&')
        .filter_map(|pair| pair.strip_prefix("id="))
        .find(|id| !id.is_empty())
        .map(str::to_string)
}

// ── In-memory loopback ──────────────────────────────────────

/// Fault injection for the loopback link. Probabilities are in [0, 1].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LinkConditions {
    pub loss: f64,
    pub duplicate: f64,
    pub seed: u32,
}

#[derive(Debug, Default)]
struct Link {
    ids: [String; 2],
    hosting: [bool; 2],
    inbox: [VecDeque<SessionEvent>; 2],
    open: bool,
    conditions: LinkConditions,
    rng_state: u32,
    sent: u64,
    dropped: u64,
    duplicated: u64,
}

impl Link {
    fn roll(&mut self, probability: f64) -> bool {
        if probability <= 0.0 {
            return false;
        }
        let (value, next) = prng_next(self.rng_state);
        self.rng_state = next;
        value < probability
    }
}

/// Traffic counters for one loopback link.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LinkStats {
    pub sent: u64,
    pub dropped: u64,
    pub duplicated: u64,
}

/// One endpoint of an in-memory link. Outbound messages go through the JSON
/// codec so the wire format is exercised end to end.
#[derive(Debug)]
pub struct LoopbackSession {
    link: Rc<RefCell<Link>>,
    side: usize,
}

impl LoopbackSession {
    pub fn pair(a_id: &str, b_id: &str) -> (LoopbackSession, LoopbackSession) {
        Self::pair_with(a_id, b_id, LinkConditions::default())
    }

    pub fn pair_with(
        a_id: &str,
        b_id: &str,
        conditions: LinkConditions,
    ) -> (LoopbackSession, LoopbackSession) {
        let mut link = Link {
            ids: [a_id.to_string(), b_id.to_string()],
            conditions,
            rng_state: conditions.seed,
            ..Link::default()
        };
        link.inbox[0].push_back(SessionEvent::Ready { local_id: a_id.to_string() });
        link.inbox[1].push_back(SessionEvent::Ready { local_id: b_id.to_string() });
        let link = Rc::new(RefCell::new(link));
        (
            LoopbackSession { link: Rc::clone(&link), side: 0 },
            LoopbackSession { link, side: 1 },
        )
    }

    fn other(&self) -> usize {
        1 - self.side
    }

    /// Next pending event for this endpoint.
    pub fn poll_event(&mut self) -> Option<SessionEvent> {
        self.link.borrow_mut().inbox[self.side].pop_front()
    }

    pub fn pending(&self) -> usize {
        self.link.borrow().inbox[self.side].len()
    }

    /// Tears the link down; both endpoints observe `Close`.
    pub fn close(&mut self) {
        let mut link = self.link.borrow_mut();
        if !link.open {
            return;
        }
        link.open = false;
        link.inbox[0].push_back(SessionEvent::Close);
        link.inbox[1].push_back(SessionEvent::Close);
    }

    pub fn set_conditions(&mut self, conditions: LinkConditions) {
        let mut link = self.link.borrow_mut();
        link.conditions = conditions;
        link.rng_state = conditions.seed;
    }

    pub fn stats(&self) -> LinkStats {
        let link = self.link.borrow();
        LinkStats {
            sent: link.sent,
            dropped: link.dropped,
            duplicated: link.duplicated,
        }
    }
}

impl Session for LoopbackSession {
    fn host(&mut self) -> Result<String, SessionError> {
        let mut link = self.link.borrow_mut();
        link.hosting[self.side] = true;
        Ok(link.ids[self.side].clone())
    }

    fn connect(&mut self, remote_id: &str) -> Result<(), SessionError> {
        let other = self.other();
        let mut link = self.link.borrow_mut();
        if link.open {
            return Err(SessionError::AlreadyConnected);
        }
        if link.ids[other] != remote_id || !link.hosting[other] {
            return Err(SessionError::UnknownPeer(remote_id.to_string()));
        }
        link.open = true;
        let local_id = link.ids[self.side].clone();
        link.inbox[other].push_back(SessionEvent::Incoming { remote_id: local_id });
        link.inbox[other].push_back(SessionEvent::Open);
        link.inbox[self.side].push_back(SessionEvent::Open);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.link.borrow().open
    }

    fn send(&mut self, msg: &Message) -> Result<(), SessionError> {
        let other = self.other();
        let mut link = self.link.borrow_mut();
        if !link.open {
            return Err(SessionError::NotOpen);
        }
        let wire = protocol::encode(msg)?;
        link.sent += 1;
        let loss = link.conditions.loss;
        if link.roll(loss) {
            link.dropped += 1;
            return Ok(());
        }
        let delivered = protocol::decode(&wire)?;
        let duplicate = link.conditions.duplicate;
        if link.roll(duplicate) {
            link.duplicated += 1;
            link.inbox[other].push_back(SessionEvent::Data(delivered.clone()));
        }
        link.inbox[other].push_back(SessionEvent::Data(delivered));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(s: &mut LoopbackSession) -> Vec<SessionEvent> {
        std::iter::from_fn(|| s.poll_event()).collect()
    }

    #[test]
    fn connect_raises_incoming_on_host() {
        let (mut h, mut c) = LoopbackSession::pair("h", "c");
        assert_eq!(h.host().unwrap(), "h");
        c.connect("h").unwrap();
        assert_eq!(
            drain(&mut h),
            vec![
                SessionEvent::Ready { local_id: "h".into() },
                SessionEvent::Incoming { remote_id: "c".into() },
                SessionEvent::Open,
            ]
        );
        assert_eq!(
            drain(&mut c),
            vec![SessionEvent::Ready { local_id: "c".into() }, SessionEvent::Open]
        );
    }

    #[test]
    fn connect_requires_a_hosting_peer() {
        let (_h, mut c) = LoopbackSession::pair("h", "c");
        assert!(matches!(c.connect("h"), Err(SessionError::UnknownPeer(_))));
        assert!(matches!(c.connect("nobody"), Err(SessionError::UnknownPeer(_))));
    }

    #[test]
    fn send_before_open_fails() {
        let (mut h, _c) = LoopbackSession::pair("h", "c");
        assert!(matches!(h.send(&Message::RematchRequest), Err(SessionError::NotOpen)));
    }

    #[test]
    fn messages_cross_the_codec() {
        let (mut h, mut c) = LoopbackSession::pair("h", "c");
        h.host().unwrap();
        c.connect("h").unwrap();
        drain(&mut h);
        c.send(&Message::CollectibleRemoved { timestamp: 42 }).unwrap();
        assert_eq!(
            h.poll_event(),
            Some(SessionEvent::Data(Message::CollectibleRemoved { timestamp: 42 }))
        );
    }

    #[test]
    fn close_notifies_both_sides() {
        let (mut h, mut c) = LoopbackSession::pair("h", "c");
        h.host().unwrap();
        c.connect("h").unwrap();
        drain(&mut h);
        drain(&mut c);
        c.close();
        assert!(!h.is_open());
        assert_eq!(drain(&mut h), vec![SessionEvent::Close]);
        assert_eq!(drain(&mut c), vec![SessionEvent::Close]);
    }

    #[test]
    fn full_loss_drops_everything() {
        let conditions = LinkConditions { loss: 1.0, duplicate: 0.0, seed: 1 };
        let (mut h, mut c) = LoopbackSession::pair_with("h", "c", conditions);
        h.host().unwrap();
        c.connect("h").unwrap();
        drain(&mut h);
        for _ in 0..10 {
            c.send(&Message::RematchRequest).unwrap();
        }
        assert_eq!(h.pending(), 0);
        assert_eq!(c.stats(), LinkStats { sent: 10, dropped: 10, duplicated: 0 });
    }

    #[test]
    fn certain_duplication_delivers_twice() {
        let conditions = LinkConditions { loss: 0.0, duplicate: 1.0, seed: 1 };
        let (mut h, mut c) = LoopbackSession::pair_with("h", "c", conditions);
        h.host().unwrap();
        c.connect("h").unwrap();
        drain(&mut h);
        c.send(&Message::RematchAccepted).unwrap();
        assert_eq!(drain(&mut h).len(), 2);
    }

    #[test]
    fn share_link_round_trip() {
        let link = share_link("https://example.com/game?id=old", "peer-123");
        assert_eq!(link, "https://example.com/game?id=peer-123");
        assert_eq!(peer_id_from_query("?lang=en&id=peer-123"), Some("peer-123".into()));
        assert_eq!(peer_id_from_query("id="), None);
        assert_eq!(peer_id_from_query(""), None);
    }
}
