//! # Step Throughput Benchmark
//!
//! Measures one full batch (roster churn, tick, sorted inputs) through the
//! native engine host, and the sequencer's flush of a backlog.

#![allow(missing_docs)]

use std::collections::HashMap;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use lockstep_client::{DecodeFailurePolicy, MessageSequencer, ResyncPolicy, SyncStepper};
use lockstep_core::{Engine, Frame, NativeEngine, PlayerId, Simulation};
use lockstep_shared::{Baseline, InputBatch, ServerMessage};

/// Each player carries a running sum of its inputs.
struct Tally;

impl Simulation for Tally {
    type World = Vec<(u32, u64)>;
    type Input = u8;

    fn decode_world(&self, bytes: &[u8]) -> Result<Self::World, String> {
        if bytes.is_empty() {
            Ok(Vec::new())
        } else {
            Err("only empty worlds are supported".to_string())
        }
    }

    fn encode_world(&self, world: &Self::World) -> Vec<u8> {
        world.iter().flat_map(|(id, sum)| [id.to_le_bytes().to_vec(), sum.to_le_bytes().to_vec()].concat()).collect()
    }

    fn decode_input(&self, bytes: &[u8]) -> Result<u8, String> {
        bytes.first().copied().ok_or_else(|| "empty input".to_string())
    }

    fn encode_input(&self, input: &u8) -> Vec<u8> {
        vec![*input]
    }

    fn tick(&self, world: &Self::World) -> Self::World {
        world.clone()
    }

    fn add_player(&self, world: &Self::World, player: PlayerId) -> Self::World {
        let mut next = world.clone();
        next.push((player.to_u32(), 0));
        next
    }

    fn remove_player(&self, world: &Self::World, player: PlayerId) -> Self::World {
        world.iter().copied().filter(|(id, _)| *id != player.to_u32()).collect()
    }

    fn apply_input(&self, world: &Self::World, player: PlayerId, input: &u8) -> Self::World {
        world
            .iter()
            .map(|&(id, sum)| if id == player.to_u32() { (id, sum + u64::from(*input)) } else { (id, sum) })
            .collect()
    }
}

fn baseline() -> Baseline {
    Baseline {
        frame: Frame::new(0),
        local_player_id: PlayerId::new(0),
        world: Vec::new(),
    }
}

fn batch(frame: u64, players: u32) -> InputBatch {
    InputBatch {
        frame: Frame::new(frame),
        new_players: vec![PlayerId::new(players)],
        removed_players: vec![PlayerId::new(players)],
        inputs: (0..players).rev().map(|id| (PlayerId::new(id), vec![1])).collect::<HashMap<_, _>>(),
    }
}

fn bench_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("step");
    for players in [8u32, 64, 256] {
        let engine = Engine::new(NativeEngine::new(Tally));
        let mut stepper = SyncStepper::from_baseline(engine, &baseline(), DecodeFailurePolicy::AbortBatch)
            .unwrap();
        let join = InputBatch {
            frame: Frame::new(0),
            new_players: (0..players).map(PlayerId::new).collect(),
            ..InputBatch::default()
        };
        stepper.step(&join).unwrap();

        let mut frame = 0;
        group.bench_with_input(BenchmarkId::from_parameter(players), &players, |b, &players| {
            b.iter(|| {
                frame += 1;
                let report = stepper.step(&batch(frame, players)).unwrap();
                black_box(report.applied)
            });
        });
    }
    group.finish();
}

fn bench_flush_backlog(c: &mut Criterion) {
    let backlog: Vec<ServerMessage> = (1..=512).map(|frame| batch(frame, 4).into()).collect();

    c.bench_function("sequencer_flush_512", |b| {
        b.iter(|| {
            let mut sequencer = MessageSequencer::new(ResyncPolicy::Reject);
            for message in backlog.iter().cloned() {
                sequencer.on_server_message(message).unwrap();
            }
            let events = sequencer.on_server_message(baseline().into()).unwrap();
            black_box(events.len())
        });
    });
}

criterion_group!(benches, bench_step, bench_flush_backlog);
criterion_main!(benches);
