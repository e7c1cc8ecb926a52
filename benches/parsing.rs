//! Parsing benchmark suite.
//!
//! Benchmarks the hot text paths a load script exercises on every step:
//! - Socket.IO frame decode and encode
//! - Static asset extraction from pages of growing size
//! - JSON action decoding
//!
//! Run with: cargo bench --bench parsing
//! Results saved to: target/criterion/

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use duplex_e2e::Action;
use duplex_e2e::client::{DEFAULT_ASSET_EXTENSIONS, extract_asset_references};
use duplex_e2e::transport::socketio::{EnginePacket, SocketPacket};
use serde_json::{Value, json};

// ============================================================================
// Benchmark Parameters
// ============================================================================

const ASSET_COUNTS: &[usize] = &[10, 100, 1000];

const EVENT_FRAME: &str =
    r#"42/chat,["message",{"user":"alice","text":"hello there","tags":["a","b","c"],"n":42}]"#;

// ============================================================================
// Benchmark: Packets
// ============================================================================

fn bench_packets(c: &mut Criterion) {
    let mut group = c.benchmark_group("packets");

    group.bench_function("decode_event", |b| {
        b.iter(|| EnginePacket::decode(black_box(EVENT_FRAME)));
    });

    let packet = EnginePacket::Message(SocketPacket::event(
        "/chat",
        &[json!("message"), json!({ "user": "alice", "text": "hello there" })],
    ));
    group.bench_function("encode_event", |b| {
        b.iter(|| black_box(&packet).encode());
    });

    group.bench_function("decode_open", |b| {
        b.iter(|| {
            EnginePacket::decode(black_box(
                r#"0{"sid":"abc","upgrades":[],"pingInterval":25000,"pingTimeout":5000}"#,
            ))
        });
    });

    group.finish();
}

// ============================================================================
// Benchmark: Asset Extraction
// ============================================================================

fn bench_assets(c: &mut Criterion) {
    let mut group = c.benchmark_group("assets");

    for &count in ASSET_COUNTS {
        let page = generate_page(count);
        group.throughput(Throughput::Bytes(page.len() as u64));
        group.bench_with_input(BenchmarkId::new("extract", count), &page, |b, page| {
            b.iter(|| extract_asset_references(black_box(page), DEFAULT_ASSET_EXTENSIONS));
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: Actions
// ============================================================================

fn bench_actions(c: &mut Criterion) {
    let mut group = c.benchmark_group("actions");

    let post = json!({ "kind": "post", "path": "/login", "params": { "user": "alice", "pass": "x" } });
    let await_emit = json!({ "kind": "connect-and-await-emit", "namespace": "/chat", "event": "joined", "timeout": 500, "connectTimeout": 1000 });
    let bare = Value::from("/index");

    for (name, value) in [("post", &post), ("compound", &await_emit), ("bare", &bare)] {
        group.bench_with_input(BenchmarkId::new("from_value", name), value, |b, value| {
            b.iter(|| Action::from_value(black_box(value)));
        });
    }

    group.finish();
}

// ============================================================================
// Helpers
// ============================================================================

/// Builds a page with `count` asset tags, a third of them external.
fn generate_page(count: usize) -> String {
    let mut page = String::from("<html><head>");
    for i in 0..count {
        let tag = match i % 3 {
            0 => format!(r#"<script src="/js/bundle-{i}.js"></script>"#),
            1 => format!(r#"<link rel="stylesheet" href="css/theme-{i}.css?v={i}">"#),
            _ => format!(r#"<img src="https://cdn.example.com/img-{i}.png">"#),
        };
        page.push_str(&tag);
        page.push_str("<p>filler text between tags</p>\n");
    }
    page.push_str("</head></html>");
    page
}

// ============================================================================
// Criterion Setup
// ============================================================================

criterion_group!(benches, bench_packets, bench_assets, bench_actions);
criterion_main!(benches);
