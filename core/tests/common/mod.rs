#![allow(dead_code)]

use dropduel_core::*;

pub type Peer = Game<ArenaWorld, LoopbackSession>;

pub const START: Millis = 1_700_000_000_000;

/// Two peers on one loopback link, sharing a clock.
pub struct Duel {
    pub host: Peer,
    pub client: Peer,
    pub now: Millis,
}

impl Duel {
    pub fn new() -> Self {
        Self::with(GameConfig::default(), GameConfig::default(), LinkConditions::default())
    }

    pub fn with(host: GameConfig, client: GameConfig, conditions: LinkConditions) -> Self {
        let (h, c) = LoopbackSession::pair_with("host", "client", conditions);
        let world = |cfg: &GameConfig| ArenaWorld::new(cfg.arena_width, cfg.arena_height);
        let client = GameConfig { seed: client.seed ^ 0xabcd, ..client };
        Duel {
            host: Game::new(host.clone(), world(&host), h),
            client: Game::new(client.clone(), world(&client), c),
            now: START,
        }
    }

    /// Both peers ready, client dialed in, handshake run to quiescence.
    pub fn synchronized() -> Self {
        let mut duel = Self::new();
        duel.connect();
        duel
    }

    pub fn connect(&mut self) {
        self.host.pump(self.now);
        self.client.pump(self.now);
        self.client.connect("host").unwrap();
        self.settle();
    }

    /// Delivers messages back and forth until neither side has anything queued.
    pub fn settle(&mut self) {
        for _ in 0..64 {
            let handled = self.host.pump(self.now) + self.client.pump(self.now);
            if handled == 0 {
                return;
            }
        }
        panic!("peers never went quiet");
    }

    /// One frame on both peers: deliver, then tick.
    pub fn frame(&mut self, host: PlayerInput, client: PlayerInput) {
        self.now += 16;
        self.host.pump(self.now);
        self.client.pump(self.now);
        self.host.tick(host, self.now);
        self.client.tick(client, self.now);
    }

    pub fn idle(&mut self, frames: usize) {
        for _ in 0..frames {
            self.frame(NULL_INPUT, NULL_INPUT);
        }
    }
}

pub fn platforms(peer: &Peer) -> Vec<PlatformSpec> {
    peer.state().platforms.iter().map(|p| p.spec).collect()
}

pub fn collectible_ids(peer: &Peer) -> Vec<Millis> {
    let mut ids: Vec<_> = peer.state().collectibles.iter().map(|c| c.spec.timestamp).collect();
    ids.sort_unstable();
    ids
}

/// A collectible sitting exactly on the peer's own player.
pub fn on_player(peer: &Peer, color: Color, timestamp: Millis) -> Message {
    let at = peer.local_position().unwrap();
    Message::CollectibleCreated {
        collectible: CollectibleSpec {
            kind: CollectibleKind::Circle,
            color,
            x: at.x,
            y: at.y,
            timestamp,
        },
    }
}

pub fn deliver(peer: &mut Peer, msg: Message, now: Millis) {
    peer.handle_event(SessionEvent::Data(msg), now);
}

pub fn count_game_over(events: &[GameEvent]) -> usize {
    events.iter().filter(|e| matches!(e, GameEvent::GameOver { .. })).count()
}
