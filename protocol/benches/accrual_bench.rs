// Accrual ledger benchmarks.
//
// Covers the fixed-point core, balance reads on a populated ledger, and the
// realize-then-move path of transfers.

use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use rebase_protocol::bridge::BridgeMessage;
use rebase_protocol::config::LedgerConfig;
use rebase_protocol::math::{self, SCALE};
use rebase_protocol::{Address, ManualClock, RebaseLedger};

fn populated(holders: u32) -> (RebaseLedger, ManualClock) {
    let clock = ManualClock::new(0);
    let owner = Address::from_tag(1);
    let minter = Address::from_tag(2);
    let mut ledger =
        RebaseLedger::new(LedgerConfig::default(), owner, Arc::new(clock.clone())).unwrap();
    ledger.grant_mint_burn(&owner, &minter).unwrap();
    for i in 0..holders {
        let holder = Address::from_label(&format!("holder-{i}"));
        ledger
            .mint(&minter, &holder, 1_000 * SCALE, ledger.global_rate())
            .unwrap();
    }
    clock.advance(86_400);
    (ledger, clock)
}

fn bench_accrue(c: &mut Criterion) {
    c.bench_function("math/accrue", |b| {
        b.iter(|| math::accrue(1_000_000 * SCALE, 50_000_000_000, 31_536_000));
    });
}

fn bench_balance_of(c: &mut Criterion) {
    let mut group = c.benchmark_group("ledger/balance_of");
    for holders in [100u32, 10_000] {
        let (ledger, _clock) = populated(holders);
        let target = Address::from_label("holder-0");
        group.bench_with_input(BenchmarkId::from_parameter(holders), &holders, |b, _| {
            b.iter(|| ledger.balance_of(&target));
        });
    }
    group.finish();
}

fn bench_transfer(c: &mut Criterion) {
    let mut group = c.benchmark_group("ledger/transfer");
    group.throughput(Throughput::Elements(1));
    let (mut ledger, clock) = populated(1_000);
    let from = Address::from_label("holder-0");
    let to = Address::from_label("holder-1");
    group.bench_function("realize_and_move", |b| {
        b.iter(|| {
            clock.advance(1);
            ledger.transfer(&from, &to, 1).unwrap();
            ledger.take_events();
        });
    });
    group.finish();
}

fn bench_payload(c: &mut Criterion) {
    let msg = BridgeMessage::new(
        1,
        2,
        Address::from_tag(0x50),
        1,
        Address::from_tag(10),
        Address::from_tag(11),
        1_000 * SCALE,
        50_000_000_000,
    );
    let bytes = msg.encode().unwrap();
    c.bench_function("bridge/decode", |b| {
        b.iter(|| BridgeMessage::decode(&bytes));
    });
}

criterion_group!(
    benches,
    bench_accrue,
    bench_balance_of,
    bench_transfer,
    bench_payload
);
criterion_main!(benches);
