// Wallet signature benchmarks for OracleNet.
//
// Covers personal-message hashing, signing, signer recovery, and the full
// nonce + verify round trip against an in-memory record store.

use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use oraclenet_protocol::challenge::MemoryChallengeStore;
use oraclenet_protocol::config::WALLET_NONCE_TTL;
use oraclenet_protocol::identity::{IdentityResolver, MemoryOracleStore, SessionTokens};
use oraclenet_protocol::wallet::{
    personal_message_hash, recover_signer, sign_personal_message, SignatureVerifier,
    WalletSignature,
};

const KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
const ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

fn key() -> Vec<u8> {
    hex::decode(KEY).unwrap()
}

fn bench_personal_hash(c: &mut Criterion) {
    let mut group = c.benchmark_group("wallet/personal_hash");
    for size in [64usize, 256, 4096] {
        let message = vec![b'a'; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &message, |b, message| {
            b.iter(|| personal_message_hash(message));
        });
    }
    group.finish();
}

fn bench_sign(c: &mut Criterion) {
    let key = key();
    c.bench_function("wallet/sign", |b| {
        b.iter(|| sign_personal_message(&key, "Sign in to OracleNet").unwrap());
    });
}

fn bench_recover(c: &mut Criterion) {
    let (_, signature) = sign_personal_message(&key(), "Sign in to OracleNet").unwrap();
    let signature = WalletSignature::parse(&signature).unwrap();

    c.bench_function("wallet/recover_signer", |b| {
        b.iter(|| recover_signer("Sign in to OracleNet", &signature).unwrap());
    });
}

fn bench_nonce_and_verify(c: &mut Criterion) {
    let key = key();
    c.bench_function("wallet/nonce_then_verify", |b| {
        let verifier = SignatureVerifier::new(
            Arc::new(MemoryChallengeStore::new(WALLET_NONCE_TTL)),
            Arc::new(IdentityResolver::new(Arc::new(MemoryOracleStore::new()))),
            Arc::new(SessionTokens::new()),
        );
        b.iter(|| {
            let grant = verifier.issue_nonce(ADDRESS).unwrap();
            let (_, signature) = sign_personal_message(&key, &grant.message).unwrap();
            verifier.verify(ADDRESS, &signature, None).unwrap()
        });
    });
}

criterion_group!(
    benches,
    bench_personal_hash,
    bench_sign,
    bench_recover,
    bench_nonce_and_verify
);
criterion_main!(benches);
