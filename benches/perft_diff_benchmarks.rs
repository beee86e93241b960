//! Benchmarks for the line buffer and report rendering.

use std::sync::Arc;
use std::thread;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use perft_diff::perft::PerftOutput;
use perft_diff::sync::{Drained, LineBuffer};
use perft_diff::PerftReport;

fn perft_lines(moves: usize, bump: usize) -> Vec<String> {
    let mut lines: Vec<String> = (0..moves)
        .map(|i| {
            let file = (b'a' + (i % 8) as u8) as char;
            format!("{file}{}{file}{}: {}", i / 8 + 1, i / 8 + 2, 400 + i * bump)
        })
        .collect();
    lines.push(format!("Nodes searched: {}", moves * 400));
    lines
}

fn bench_line_buffer(c: &mut Criterion) {
    let mut group = c.benchmark_group("line_buffer");

    group.bench_function("push_drain_1000", |b| {
        let buffer = LineBuffer::new();
        b.iter(|| {
            for i in 0..1000 {
                buffer.push(format!("e2e4: {i}"));
            }
            black_box(buffer.drain())
        })
    });

    group.bench_function("cross_thread_1000", |b| {
        b.iter(|| {
            let buffer = Arc::new(LineBuffer::new());
            let producer = Arc::clone(&buffer);
            let handle = thread::spawn(move || {
                for i in 0..1000 {
                    producer.push(format!("e2e4: {i}"));
                }
                producer.close();
            });
            let mut received = 0;
            while let Drained::Lines(lines) = buffer.wait_drain(None) {
                received += lines.len();
            }
            handle.join().unwrap();
            black_box(received)
        })
    });

    group.finish();
}

fn bench_report(c: &mut Criterion) {
    let mut group = c.benchmark_group("report");

    for moves in [20, 48, 218] {
        let reference = perft_lines(moves, 1);
        let candidate = perft_lines(moves, 2);
        group.bench_with_input(BenchmarkId::new("render", moves), &moves, |b, _| {
            b.iter(|| {
                let report = PerftReport::new(
                    "reference",
                    PerftOutput::from_lines(&reference),
                    "candidate",
                    PerftOutput::from_lines(&candidate),
                );
                black_box(report.render())
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_line_buffer, bench_report);
criterion_main!(benches);
