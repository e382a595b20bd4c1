use chrono::Utc;
use criterion::{BatchSize, Criterion, Throughput, criterion_group, criterion_main};
use rask_analytics::codec::{BatchWriter, PayloadCodec};
use rask_analytics::domain::{EventKind, EventRecord};
use rask_analytics::storage::{QueueFile, RecordStore};
use std::io::Read;
use tempfile::TempDir;

fn sample_event(n: i64) -> EventRecord {
    EventRecord::builder(EventKind::Track)
        .user_id("user-42")
        .event("Order Completed")
        .property("order_id", format!("order-{n}"))
        .property("revenue", 42.5)
        .property("currency", "JPY")
        .build()
        .unwrap()
}

fn benchmark_encode(c: &mut Criterion) {
    let codec = PayloadCodec::default();
    let event = sample_event(1);
    let size = codec.encode(&event).unwrap().len();

    let mut group = c.benchmark_group("payload_codec");
    group.throughput(Throughput::Bytes(size as u64));
    group.bench_function("encode_track_event", |b| {
        b.iter(|| codec.encode(std::hint::black_box(&event)).unwrap());
    });
    group.finish();
}

fn benchmark_append(c: &mut Criterion) {
    let codec = PayloadCodec::default();
    let record = codec.encode(&sample_event(1)).unwrap();

    let mut group = c.benchmark_group("queue_file");
    group.throughput(Throughput::Elements(1));
    group.bench_function("append_synced", |b| {
        let temp_dir = TempDir::new().unwrap();
        let mut queue = QueueFile::open(temp_dir.path().join("bench")).unwrap();
        b.iter(|| queue.append(std::hint::black_box(&record)).unwrap());
    });
    group.finish();
}

fn benchmark_scan(c: &mut Criterion) {
    let codec = PayloadCodec::default();
    let temp_dir = TempDir::new().unwrap();
    let mut queue = QueueFile::open(temp_dir.path().join("bench")).unwrap();
    for n in 0..1_000 {
        queue.append(&codec.encode(&sample_event(n)).unwrap()).unwrap();
    }

    let mut group = c.benchmark_group("queue_file");
    group.throughput(Throughput::Elements(1_000));
    group.bench_function("scan_1000_records", |b| {
        b.iter(|| {
            let mut total = 0usize;
            queue
                .for_each(&mut |reader, len| {
                    let mut buf = Vec::with_capacity(len);
                    reader.read_to_end(&mut buf)?;
                    total += buf.len();
                    Ok(true)
                })
                .unwrap();
            total
        });
    });

    group.bench_function("build_batch_body", |b| {
        b.iter_batched(
            || Vec::with_capacity(512 * 1024),
            |body| {
                let mut writer = BatchWriter::begin(body).unwrap();
                queue
                    .for_each(&mut |reader, len| {
                        let payload = codec
                            .decode(reader, len)
                            .map_err(std::io::Error::other)?;
                        writer
                            .emit_payload(&payload)
                            .map_err(std::io::Error::other)?;
                        Ok(true)
                    })
                    .unwrap();
                writer.finish(Utc::now()).unwrap()
            },
            BatchSize::LargeInput,
        );
    });
    group.finish();
}

criterion_group!(benches, benchmark_encode, benchmark_append, benchmark_scan);
criterion_main!(benches);
