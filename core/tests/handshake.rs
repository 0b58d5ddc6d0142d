mod common;

use common::*;
use dropduel_core::*;

#[test]
fn handshake_converges() {
    let duel = Duel::synchronized();
    let (host, client) = (&duel.host, &duel.client);

    assert_eq!(host.phase(), SyncPhase::Synchronized);
    assert_eq!(client.phase(), SyncPhase::Synchronized);
    assert_eq!(host.state().role, Some(Role::Host));
    assert_eq!(client.state().role, Some(Role::Client));

    // Colors are assigned by the host and mirrored
    assert_eq!(host.state().local.color, Color::Coral);
    assert_eq!(host.state().remote.color, Color::Teal);
    assert_eq!(client.state().local.color, Color::Teal);
    assert_eq!(client.state().remote.color, Color::Coral);

    // Same layout, built verbatim from the host's seed
    assert_eq!(platforms(host), platforms(client));
    assert_eq!(platforms(client).len(), 3);
    let key = host.state().layout.unwrap();
    assert_eq!(client.state().layout, Some(key));
    assert_eq!(platforms(host), layout_from_seed(host.config(), key.seed));

    // Each side sees the other's player where the other put it
    assert_eq!(client.remote_position(), host.local_position());
    assert_eq!(client.local_position(), host.remote_position());

    assert!(host.state().local.is_ready && host.state().remote.is_ready);
    assert!(client.state().local.is_ready && client.state().remote.is_ready);
}

#[test]
fn handshake_survives_duplicated_delivery() {
    let conditions = LinkConditions { loss: 0.0, duplicate: 1.0, seed: 3 };
    let mut duel = Duel::with(GameConfig::default(), GameConfig::default(), conditions);
    duel.connect();

    assert_eq!(duel.host.phase(), SyncPhase::Synchronized);
    assert_eq!(duel.client.phase(), SyncPhase::Synchronized);
    assert_eq!(platforms(&duel.host), platforms(&duel.client));
    assert_eq!(duel.client.physics().count(CollisionCategory::Platform), 3);
    assert_eq!(duel.client.physics().count(CollisionCategory::Player), 2);
    assert!(duel.client.session().stats().duplicated > 0);
}

#[test]
fn repeated_layout_is_applied_once() {
    let mut duel = Duel::synchronized();
    let layout = Message::SetExactPlatforms {
        seed: 5,
        timestamp: 1_700_000_000_000,
        platforms: vec![PlatformSpec { x: 100.0, y: 200.0, width: 80.0 }],
    };
    let now = duel.now;
    deliver(&mut duel.client, layout.clone(), now);
    deliver(&mut duel.client, layout, now);

    assert_eq!(duel.client.state().platforms.len(), 1);
    assert_eq!(duel.client.physics().count(CollisionCategory::Platform), 1);
}

#[test]
fn platform_count_mismatch_is_resent_with_backoff() {
    let mut duel = Duel::synchronized();
    let t0 = duel.now;
    let seed = duel.host.state().layout.unwrap().seed;
    let mismatch = |timestamp| Message::PlatformsReady { seed, timestamp, count: 2 };
    let layout_ts = |duel: &Duel| duel.host.state().layout.unwrap().timestamp;

    // Backoff doubles: 100, 200, 400 ms
    let mut at = t0 + 10;
    for backoff in [100, 200, 400] {
        let ack = mismatch(layout_ts(&duel));
        deliver(&mut duel.host, ack, at);
        let before = layout_ts(&duel);
        duel.host.tick(NULL_INPUT, at + backoff - 10);
        assert_eq!(layout_ts(&duel), before, "resent before the backoff elapsed");
        duel.host.tick(NULL_INPUT, at + backoff + 10);
        assert_eq!(layout_ts(&duel), at + backoff + 10);
        at += backoff + 20;
    }

    // Limit reached: no further resend
    let ack = mismatch(layout_ts(&duel));
    deliver(&mut duel.host, ack, at);
    let before = layout_ts(&duel);
    duel.host.tick(NULL_INPUT, at + 2000);
    assert_eq!(layout_ts(&duel), before);

    // The resent layouts reach the client under fresh keys
    duel.now = at + 2000;
    duel.settle();
    assert_eq!(duel.client.state().layout, duel.host.state().layout);
    assert_eq!(platforms(&duel.host), platforms(&duel.client));
}

#[test]
fn stale_layout_ack_is_ignored() {
    let mut duel = Duel::synchronized();
    let current = duel.host.state().layout.unwrap();
    let stale = Message::PlatformsReady {
        seed: current.seed.wrapping_add(1),
        timestamp: current.timestamp,
        count: 0,
    };
    let now = duel.now;
    deliver(&mut duel.host, stale, now);
    duel.host.tick(NULL_INPUT, now + 1000);
    assert_eq!(duel.host.state().layout, Some(current));
}

#[test]
fn close_tears_down_remote_state_only() {
    let mut duel = Duel::synchronized();
    let now = duel.now;
    for (i, x) in [100.0, 200.0, 300.0].into_iter().enumerate() {
        let spec = CollectibleSpec {
            kind: CollectibleKind::Triangle,
            color: Color::Coral,
            x,
            y: 0.0,
            timestamp: 1000 + i as u64,
        };
        deliver(&mut duel.client, Message::CollectibleCreated { collectible: spec }, now);
    }
    assert_eq!(duel.client.state().collectibles.len(), 3);

    duel.host.session_mut().close();
    duel.settle();

    for peer in [&duel.host, &duel.client] {
        let s = peer.state();
        assert_eq!(peer.phase(), SyncPhase::Disconnected);
        assert!(!s.is_connected);
        assert!(s.collectibles.is_empty());
        assert!(s.remote.body.is_none());
        assert!(s.local.body.is_some());
        assert_eq!(s.platforms.len(), 3);
        assert_eq!(peer.physics().count(CollisionCategory::Collectible), 0);
        assert_eq!(peer.physics().count(CollisionCategory::Player), 1);
    }
}

#[test]
fn host_accepts_a_new_opponent_after_close() {
    let mut duel = Duel::synchronized();
    duel.host.session_mut().close();
    duel.settle();

    // Same link, dialed again
    duel.client.connect("host").unwrap();
    duel.settle();
    assert_eq!(duel.host.phase(), SyncPhase::Synchronized);
    assert_eq!(duel.client.phase(), SyncPhase::Synchronized);
    assert_eq!(platforms(&duel.host), platforms(&duel.client));
}

fn drop_everything() -> LinkConditions {
    LinkConditions { loss: 1.0, duplicate: 0.0, seed: 1 }
}

fn both_synchronized(duel: &Duel) -> bool {
    duel.host.phase() == SyncPhase::Synchronized && duel.client.phase() == SyncPhase::Synchronized
}

#[test]
fn lost_ready_echo_is_recovered() {
    let mut duel = Duel::new();
    let now = duel.now;
    duel.host.pump(now);
    duel.client.pump(now);
    duel.client.connect("host").unwrap();
    duel.host.pump(now);

    // Both the client's request and its echo vanish
    duel.client.session_mut().set_conditions(drop_everything());
    duel.client.pump(now);
    duel.client.session_mut().set_conditions(LinkConditions::default());
    duel.settle();
    assert_eq!(
        duel.host.phase(),
        SyncPhase::Handshaking(HandshakeStep::AwaitingReady { prepare_sent: true })
    );

    duel.idle(60);
    assert!(both_synchronized(&duel));
    assert!(duel.client.state().local.body.is_some());
    assert_eq!(duel.host.state().layout, duel.client.state().layout);
}

#[test]
fn lost_initial_state_is_resent_until_acknowledged() {
    let mut duel = Duel::new();
    let now = duel.now;
    duel.host.pump(now);
    duel.client.pump(now);
    duel.client.connect("host").unwrap();
    // Stop once the client's layout ack is queued for the host
    for _ in 0..16 {
        if duel.host.phase() == SyncPhase::Handshaking(HandshakeStep::AwaitingPlatformsAck) {
            break;
        }
        duel.host.pump(now);
        duel.client.pump(now);
    }
    assert_eq!(duel.host.phase(), SyncPhase::Handshaking(HandshakeStep::AwaitingPlatformsAck));

    duel.host.session_mut().set_conditions(drop_everything());
    duel.host.pump(now);
    duel.host.session_mut().set_conditions(LinkConditions::default());
    duel.settle();
    assert_eq!(duel.host.phase(), SyncPhase::Handshaking(HandshakeStep::AwaitingInitComplete));
    assert_eq!(duel.client.phase(), SyncPhase::Handshaking(HandshakeStep::AwaitingInitialState));
    assert!(duel.client.state().local.body.is_none());

    duel.idle(60);
    assert!(both_synchronized(&duel));
    assert!(duel.client.state().local.body.is_some());
    assert!(duel.host.state().remote.is_ready);
    assert_eq!(duel.client.state().local.color, Color::Teal);
}

#[test]
fn handshake_completes_over_a_lossy_link() {
    let conditions = LinkConditions { loss: 0.3, duplicate: 0.1, seed: 42 };
    let mut duel = Duel::with(GameConfig::default(), GameConfig::default(), conditions);
    duel.connect();
    for _ in 0..3000 {
        if both_synchronized(&duel) {
            break;
        }
        duel.frame(NULL_INPUT, NULL_INPUT);
    }
    assert!(both_synchronized(&duel), "host {:?}, client {:?}", duel.host.phase(), duel.client.phase());
    assert!(duel.client.state().local.body.is_some());
    assert!(duel.client.state().local.is_ready && duel.host.state().local.is_ready);
}
