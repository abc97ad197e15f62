// Dispatcher hot paths: room creation, updates and state snapshots.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use gamehost_core::register_game;
use gamehost_core::typed::{Capabilities, DecodeError, EngineId, Game, PlayerIndex, RuleViolation};
use gamehost_core::{Dispatcher, EngineRegistry, GameCatalog, RoomSettings};
use rand_chacha::ChaCha20Rng;

const ROOM_COUNTS: &[usize] = &[10, 1_000, 10_000];

#[derive(Default)]
struct Tally;

impl Game for Tally {
    type Move = u32;
    type State = Vec<u32>;

    fn engine_id(&self) -> EngineId {
        EngineId {
            game_id: "tally".to_string(),
            build_id: "bench".to_string(),
        }
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            id: self.engine_id(),
            seats: 4,
        }
    }

    fn init(&mut self, _rng: &mut ChaCha20Rng) -> Self::State {
        vec![0; 4]
    }

    fn play(
        &mut self,
        state: &mut Self::State,
        player: PlayerIndex,
        mv: Self::Move,
        _rng: &mut ChaCha20Rng,
    ) -> Result<(), RuleViolation> {
        state[usize::from(player)] += mv;
        Ok(())
    }

    fn decode_move(buf: &[u8]) -> Result<Self::Move, DecodeError> {
        let bytes: [u8; 4] = buf.try_into().map_err(|_| DecodeError::InvalidLength {
            expected: 4,
            actual: buf.len(),
        })?;
        Ok(u32::from_le_bytes(bytes))
    }
}

fn dispatcher() -> Dispatcher {
    let mut catalog = GameCatalog::new();
    register_game!(catalog, Tally, "tally");
    let engines = EngineRegistry::load([("tally", "builtin:tally")], &catalog).unwrap();
    Dispatcher::new(
        Arc::new(engines),
        RoomSettings {
            max_players: 4,
            rng_seed: Some(7),
        },
    )
}

fn bench_init(c: &mut Criterion) {
    let mut group = c.benchmark_group("init");

    for &rooms in ROOM_COUNTS {
        group.bench_with_input(BenchmarkId::new("existing_room", rooms), &rooms, |b, &rooms| {
            let dispatcher = dispatcher();
            for i in 0..rooms {
                dispatcher.init("tally", &format!("room-{i}")).unwrap();
            }
            let mut i = 0;
            b.iter(|| {
                i = (i + 1) % rooms;
                black_box(dispatcher.init("tally", &format!("room-{i}")).unwrap());
            });
        });
    }

    group.bench_function("fresh_room", |b| {
        let dispatcher = dispatcher();
        let mut i = 0u64;
        b.iter(|| {
            i += 1;
            black_box(dispatcher.init("tally", &format!("fresh-{i}")).unwrap());
        });
    });

    group.finish();
}

fn bench_update(c: &mut Criterion) {
    let dispatcher = dispatcher();
    dispatcher.init("tally", "hot").unwrap();
    let payload = 3u32.to_le_bytes();

    c.bench_function("update", |b| {
        let mut player = 0i64;
        b.iter(|| {
            player = (player + 1) % 4;
            dispatcher.update("tally", "hot", player, black_box(&payload)).unwrap();
        });
    });

    c.bench_function("state", |b| {
        b.iter(|| black_box(dispatcher.state("tally", "hot").unwrap()));
    });
}

criterion_group!(benches, bench_init, bench_update);
criterion_main!(benches);
