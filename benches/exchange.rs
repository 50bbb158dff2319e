//! Request/response benchmarks
//!
//! Measures the per-request work done outside the network:
//! - Header normalization and request serialization
//! - Response parsing for each body framing
//! - Parsing a response that arrives in small fragments
//!
//! Run with: cargo bench --bench exchange

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::time::Duration;
use webcase::http::{Headers, HttpRequest, Method, ResponseParser};

fn length_response(size: usize) -> Vec<u8> {
    let mut wire = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\n\r\n",
        size
    )
    .into_bytes();
    wire.extend(std::iter::repeat(b'x').take(size));
    wire
}

fn chunked_response(chunks: usize, chunk_size: usize) -> Vec<u8> {
    let mut wire = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n".to_vec();
    for _ in 0..chunks {
        wire.extend(format!("{:x}\r\n", chunk_size).into_bytes());
        wire.extend(std::iter::repeat(b'x').take(chunk_size));
        wire.extend(b"\r\n");
    }
    wire.extend(b"0\r\n\r\n");
    wire
}

// ========== Request Benchmarks ==========

fn bench_normalize(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalize");

    group.bench_function("post_without_content_type", |b| {
        b.iter(|| {
            let mut headers: Headers = vec![("X-Trace", "abc")].into_iter().collect();
            headers.normalize(black_box(&Method::POST), black_box(Some(b"a=1&b=2")));
            black_box(headers);
        });
    });

    group.bench_function("get_untouched", |b| {
        b.iter(|| {
            let mut headers: Headers = vec![("Accept", "*/*")].into_iter().collect();
            headers.normalize(black_box(&Method::GET), None);
            black_box(headers);
        });
    });

    group.finish();
}

fn bench_request_wire(c: &mut Criterion) {
    let mut group = c.benchmark_group("request_wire");

    for size in [0usize, 1024, 64 * 1024] {
        let body = vec![b'a'; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("post", size), &body, |b, body| {
            b.iter(|| {
                let mut request = HttpRequest::builder()
                    .method(Method::POST)
                    .uri("/submit")
                    .header("Host", "127.0.0.1:8000")
                    .body(body.clone())
                    .build();
                request.normalize();
                black_box(request.to_wire());
            });
        });
    }

    group.finish();
}

// ========== Response Benchmarks ==========

fn bench_parse_response(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_response");

    for size in [0usize, 1024, 64 * 1024] {
        let wire = Bytes::from(length_response(size));
        group.throughput(Throughput::Bytes(wire.len() as u64));
        group.bench_with_input(BenchmarkId::new("content_length", size), &wire, |b, wire| {
            b.iter(|| {
                let mut parser = ResponseParser::new();
                black_box(parser.parse(black_box(wire)).unwrap());
            });
        });
    }

    for chunks in [1usize, 16, 256] {
        let wire = Bytes::from(chunked_response(chunks, 256));
        group.throughput(Throughput::Bytes(wire.len() as u64));
        group.bench_with_input(BenchmarkId::new("chunked", chunks), &wire, |b, wire| {
            b.iter(|| {
                let mut parser = ResponseParser::new();
                black_box(parser.parse(black_box(wire)).unwrap());
            });
        });
    }

    group.finish();
}

fn bench_parse_fragmented(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_fragmented");
    let wire = chunked_response(16, 256);

    for fragment in [16usize, 256, 4096] {
        group.bench_with_input(BenchmarkId::from_parameter(fragment), &fragment, |b, &fragment| {
            b.iter(|| {
                let mut parser = ResponseParser::new();
                let mut response = None;
                for piece in wire.chunks(fragment) {
                    response = parser.parse(piece).unwrap();
                }
                black_box(response);
            });
        });
    }

    group.finish();
}

// ========== Benchmark Groups ==========

criterion_group! {
    name = requests;
    config = Criterion::default()
        .measurement_time(Duration::from_secs(5));
    targets =
        bench_normalize,
        bench_request_wire
}

criterion_group! {
    name = responses;
    config = Criterion::default()
        .measurement_time(Duration::from_secs(5));
    targets =
        bench_parse_response,
        bench_parse_fragmented
}

criterion_main!(requests, responses);
