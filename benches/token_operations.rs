use chrono::Duration;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

use qmenu_rs::auth::{extract_bearer_token, AuthPayload, TokenService};

const SECRET: &str = "benchmark-secret-0123456789abcdef";

fn payload() -> AuthPayload {
    AuthPayload {
        id: "7a1c0f0e-4a59-4c4e-9f0d-1c2b3a4d5e6f".to_string(),
        name: "Casa Pepe".to_string(),
        route: "casa-pepe".to_string(),
    }
}

fn bench_token_operations(c: &mut Criterion) {
    let service = TokenService::new(SECRET, "qmenu-bench", Duration::hours(8))
        .expect("Failed to create token service");
    let payload = payload();
    let token = service.issue(&payload).expect("Failed to issue token");

    let mut group = c.benchmark_group("tokens");

    group.bench_function("issue", |b| {
        b.iter(|| service.issue(black_box(&payload)).unwrap())
    });

    group.bench_function("validate", |b| {
        b.iter(|| service.validate(black_box(&token)).unwrap())
    });

    let forged = format!("{}x", token);
    group.bench_function("reject_forged", |b| {
        b.iter(|| service.validate(black_box(&forged)).is_err())
    });

    let mut headers = axum::http::HeaderMap::new();
    headers.insert(
        axum::http::header::AUTHORIZATION,
        format!("Bearer {}", token).parse().unwrap(),
    );
    group.bench_function("extract_bearer", |b| {
        b.iter(|| extract_bearer_token(black_box(&headers)).is_some())
    });

    group.finish();
}

criterion_group!(benches, bench_token_operations);
criterion_main!(benches);
