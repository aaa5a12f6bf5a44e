// Run with:  cargo bench --bench scan_row

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use hub75_receiver::layout::PanelLayout;
use hub75_receiver::registers::ScanTiming;
use hub75_receiver::row_buffer::{Bank, LaneBuffers, RowBuffer};
use hub75_receiver::scan::ScanDriver;
use std::hint::black_box;
use std::time::Duration;

const PORTS: usize = 8;
const BANK_WORDS: usize = 96;

fn configure_criterion() -> Criterion {
    Criterion::default()
        .sample_size(50)
        .measurement_time(Duration::from_secs(10))
        .warm_up_time(Duration::from_secs(3))
}

fn scan_row(c: &mut Criterion) {
    let layout = PanelLayout::standard();
    let timing = ScanTiming::default();
    let mut buffers: LaneBuffers<PORTS, BANK_WORDS> = [[RowBuffer::new(); 2]; PORTS];
    for (index, lane) in buffers.iter_mut().flatten().enumerate() {
        for offset in 0..BANK_WORDS {
            lane.write(Bank::Zero, offset, (index * BANK_WORDS + offset) as u32);
        }
    }

    let mut group = c.benchmark_group("scan_row");
    group.throughput(Throughput::Elements(1));

    group.bench_function("standard_layout_full_row", |b| {
        let mut driver = ScanDriver::<PORTS>::new(&layout).unwrap();
        b.iter(|| {
            driver.start(Bank::Zero);
            let mut ticks = 0u32;
            while driver.is_busy() {
                black_box(driver.tick(&timing, black_box(&buffers)));
                ticks += 1;
            }
            black_box(ticks)
        });
    });

    group.finish();
}

criterion_group!(name = benches; config = configure_criterion(); targets = scan_row);
criterion_main!(benches);
