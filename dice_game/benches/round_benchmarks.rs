use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use dice_game::{
    game::{BetType, DiceRoll, DiceRoller, RoundResolver, SeededRoller, Wager, resolve},
    net::messages::{ClientRequest, ServerMessage},
};
use std::{hint::black_box, sync::Arc};

/// Benchmark pure resolution over every face pair
fn bench_resolve_all_faces(c: &mut Criterion) {
    let rolls: Vec<DiceRoll> = (1..=6)
        .flat_map(|a| (1..=6).map(move |b| DiceRoll::new(a, b)))
        .collect();

    c.bench_function("resolve_all_faces", |b| {
        b.iter(|| {
            for roll in &rolls {
                let _ = black_box(resolve(BetType::Under, 50, *roll));
                let _ = black_box(resolve(BetType::Over, 50, *roll));
            }
        });
    });
}

/// Benchmark a full round including the shared PRNG
fn bench_play_round(c: &mut Criterion) {
    let resolver = RoundResolver::new(Arc::new(SeededRoller::from_seed(42)));

    c.bench_function("play_round", |b| {
        b.iter(|| black_box(resolver.play_round(BetType::Over, black_box(100))));
    });
}

/// Benchmark the roller alone
fn bench_roll(c: &mut Criterion) {
    let roller = SeededRoller::from_seed(7);

    c.bench_function("seeded_roll", |b| {
        b.iter(|| black_box(roller.roll()));
    });
}

/// Benchmark decoding a play request and encoding its result
fn bench_message_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("message_codec");

    for amount in [1i64, 250] {
        let frame = format!(
            r#"{{"type":"play","payload":{{"clientId":"bench","betAmount":{amount},"betType":"lt7"}}}}"#
        );
        group.bench_with_input(BenchmarkId::new("parse_play", amount), &frame, |b, frame| {
            b.iter(|| black_box(ClientRequest::parse(frame)));
        });

        let wager = Wager {
            client_id: "bench".to_string(),
            amount,
            bet_type: BetType::Under,
        };
        if let Ok(round) = resolve(BetType::Under, amount, DiceRoll::new(2, 3)) {
            let message = ServerMessage::play_result(&wager, &round);
            group.bench_with_input(
                BenchmarkId::new("encode_play_result", amount),
                &message,
                |b, message| {
                    b.iter(|| black_box(message.to_json()));
                },
            );
        }
    }

    group.finish();
}

criterion_group!(
    resolution,
    bench_resolve_all_faces,
    bench_play_round,
    bench_roll
);

criterion_group!(protocol, bench_message_codec);

criterion_main!(resolution, protocol);
