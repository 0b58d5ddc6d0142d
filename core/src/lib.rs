pub mod arena;
pub mod config;
pub mod constants;
pub mod controller;
pub mod events;
pub mod game;
pub mod physics;
pub mod prng;
pub mod protocol;
pub mod session;
pub mod state;
pub mod sync;
pub mod types;

pub use arena::ArenaWorld;
pub use config::{ConfigError, GameConfig};
pub use constants::*;
pub use events::GameEvent;
pub use game::{layout_from_seed, CollectibleView, Game, PlayerView, Snapshot};
pub use physics::{BodyRef, BodyState, CollisionCategory, CollisionStart, PhysicsAdapter, Shape};
pub use prng::*;
pub use protocol::{decode, encode, Message, PositionUpdate, ProtocolError};
pub use session::{
    peer_id_from_query, share_link, LinkConditions, LinkStats, LoopbackSession, Session,
    SessionError, SessionEvent,
};
pub use state::{GameSession, LayoutKey, LiveCollectible, LivePlatform, PlayerState, RemoteTarget};
pub use sync::{HandshakeStep, SyncPhase, SyncState};
pub use types::*;
