//! Full client flow over the channel transport, driving a real simulation
//! through the native engine host.

use std::collections::HashMap;

use lockstep_client::{ChannelTransport, ClientConfig, InputSource, SnapshotSink, SyncClient};
use lockstep_core::{Engine, Frame, NativeEngine, PlayerId, Simulation};
use lockstep_shared::{Baseline, InputBatch, ServerMessage};

/// Players are squares that move by their input each frame.
struct Squares;

#[derive(Clone, Debug, Default, PartialEq)]
struct Board {
    tick: u32,
    squares: Vec<(u32, i32, i32)>,
}

impl Simulation for Squares {
    type World = Board;
    type Input = (i8, i8);

    fn decode_world(&self, bytes: &[u8]) -> Result<Board, String> {
        if bytes.len() < 4 {
            return Err("missing tick".to_string());
        }
        let (head, rest) = bytes.split_at(4);
        let tick = u32::from_le_bytes([head[0], head[1], head[2], head[3]]);
        if rest.len() % 12 != 0 {
            return Err(format!("trailing {} bytes", rest.len() % 12));
        }
        let squares = rest
            .chunks_exact(12)
            .map(|c| {
                let word = |i: usize| [c[i], c[i + 1], c[i + 2], c[i + 3]];
                (u32::from_le_bytes(word(0)), i32::from_le_bytes(word(4)), i32::from_le_bytes(word(8)))
            })
            .collect();
        Ok(Board { tick, squares })
    }

    fn encode_world(&self, world: &Board) -> Vec<u8> {
        let mut out = world.tick.to_le_bytes().to_vec();
        for (id, x, y) in &world.squares {
            out.extend_from_slice(&id.to_le_bytes());
            out.extend_from_slice(&x.to_le_bytes());
            out.extend_from_slice(&y.to_le_bytes());
        }
        out
    }

    fn decode_input(&self, bytes: &[u8]) -> Result<(i8, i8), String> {
        match bytes {
            [dx, dy] => Ok((i8::from_le_bytes([*dx]), i8::from_le_bytes([*dy]))),
            _ => Err(format!("input is 2 bytes, got {}", bytes.len())),
        }
    }

    fn encode_input(&self, input: &(i8, i8)) -> Vec<u8> {
        vec![input.0.to_le_bytes()[0], input.1.to_le_bytes()[0]]
    }

    fn tick(&self, world: &Board) -> Board {
        Board { tick: world.tick + 1, ..world.clone() }
    }

    fn add_player(&self, world: &Board, player: PlayerId) -> Board {
        let mut next = world.clone();
        next.squares.push((player.to_u32(), 10, 10));
        next
    }

    fn remove_player(&self, world: &Board, player: PlayerId) -> Board {
        let mut next = world.clone();
        next.squares.retain(|(id, _, _)| *id != player.to_u32());
        next
    }

    fn apply_input(&self, world: &Board, player: PlayerId, input: &(i8, i8)) -> Board {
        let mut next = world.clone();
        for square in next.squares.iter_mut().filter(|s| s.0 == player.to_u32()) {
            square.1 = square.1 * 2 + i32::from(input.0);
            square.2 = square.2 * 2 + i32::from(input.1);
        }
        next
    }
}

struct Steady;

impl InputSource for Steady {
    fn sample(&mut self, _frame: Frame, _local: PlayerId) -> Option<Vec<u8>> {
        Some(vec![1, 0])
    }
}

fn script() -> Vec<ServerMessage> {
    let empty_world = Squares.encode_world(&Board::default());
    let mut messages = vec![
        // Arrives before the baseline on purpose.
        InputBatch {
            frame: Frame::new(1),
            new_players: vec![PlayerId::new(1), PlayerId::new(2)],
            ..InputBatch::default()
        }
        .into(),
        Baseline {
            frame: Frame::new(0),
            local_player_id: PlayerId::new(2),
            world: empty_world,
        }
        .into(),
    ];
    for frame in 2..10u64 {
        let inputs = HashMap::from([
            (PlayerId::new(2), vec![1, 255]),
            (PlayerId::new(1), vec![255, 1]),
        ]);
        messages.push(
            InputBatch {
                frame: Frame::new(frame),
                inputs,
                ..InputBatch::default()
            }
            .into(),
        );
    }
    messages
}

fn run_client(messages: &[ServerMessage]) -> (Vec<u8>, Vec<u64>) {
    let (transport, authority) = ChannelTransport::pair();
    let engine = Engine::new(NativeEngine::new(Squares));
    let mut client = SyncClient::new(engine, transport, Steady, ClientConfig::default());

    authority.connect().unwrap();
    for message in messages {
        authority.send(message).unwrap();
    }
    let report = client.pump();
    assert!(report.errors.is_empty(), "{:?}", report.errors);

    let stepper = client.session().stepper().unwrap();
    let world = stepper.engine().encode_world(stepper.world()).unwrap();
    let sent = authority
        .received_inputs()
        .unwrap()
        .into_iter()
        .map(|out| out.frame.get())
        .collect();
    (world, sent)
}

#[test]
fn test_clients_converge_on_identical_worlds() {
    let messages = script();
    let (first, _) = run_client(&messages);
    let (second, _) = run_client(&messages);
    assert_eq!(first, second);

    let board = Squares.decode_world(&first).unwrap();
    assert_eq!(board.tick, 9);
    assert_eq!(board.squares.len(), 2);
}

#[test]
fn test_one_input_sent_per_applied_frame() {
    let (_, sent) = run_client(&script());
    assert_eq!(sent, (1..=10).collect::<Vec<u64>>());
}

#[test]
fn test_snapshots_reach_render_thread() {
    let (transport, authority) = ChannelTransport::pair();
    let mut client = SyncClient::new(
        Engine::new(NativeEngine::new(Squares)),
        transport,
        Steady,
        ClientConfig::default(),
    );
    let (mut sink, snapshots) = SnapshotSink::bounded(4);
    let renderer = std::thread::spawn(move || snapshots.iter().map(|s| s.world.len()).collect::<Vec<_>>());

    authority.connect().unwrap();
    for message in script() {
        authority.send(&message).unwrap();
        client.pump();
        client.render(&mut sink);
    }
    drop(sink);

    let drawn = renderer.join().unwrap();
    assert!(!drawn.is_empty());
    // Two squares of 12 bytes after a 4-byte tick header.
    assert_eq!(drawn.last(), Some(&28));
}

#[test]
fn test_disconnect_then_fresh_baseline() {
    let (transport, authority) = ChannelTransport::pair();
    let mut client = SyncClient::new(
        Engine::new(NativeEngine::new(Squares)),
        transport,
        Steady,
        ClientConfig::default(),
    );

    authority.connect().unwrap();
    for message in script() {
        authority.send(&message).unwrap();
    }
    client.pump();
    assert_eq!(client.session().frame(), Some(Frame::new(9)));

    authority.disconnect().unwrap();
    let report = client.pump();
    assert!(report.disconnected);
    assert!(!client.session().is_synced());

    authority.connect().unwrap();
    authority
        .send(
            &Baseline {
                frame: Frame::new(40),
                local_player_id: PlayerId::new(7),
                world: Squares.encode_world(&Board::default()),
            }
            .into(),
        )
        .unwrap();
    client.pump();
    assert_eq!(client.session().frame(), Some(Frame::new(40)));
    assert_eq!(client.session().local_player(), Some(PlayerId::new(7)));
}
