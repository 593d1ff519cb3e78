use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ringbus::{Bus, BusConfig, BusError, Config, FeedbackStatus, Message};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

const MSG_PER_PRODUCER: u64 = 200_000;
const PAYLOAD_SIZE: usize = 64;

fn payload() -> Vec<u8> {
    vec![0xABu8; PAYLOAD_SIZE]
}

fn shaped_bus(slot_bits: u8, segment_count: u32) -> Bus {
    Bus::new(BusConfig {
        size_mib: 1,
        segment_count,
        segment: Config::new(slot_bits, 0.8),
        offload_threshold: 1 << 20,
        try_offload: |_| false,
    })
}

fn bench_spsc(c: &mut Criterion) {
    let mut group = c.benchmark_group("spsc");
    group.throughput(Throughput::Elements(MSG_PER_PRODUCER));

    group.bench_function("single_producer_consumer", |b| {
        b.iter(|| {
            let bus = Arc::new(shaped_bus(12, 1)); // 4K slots
            let producer = bus.attach_producer().unwrap();
            let consumer = bus.attach_consumer();
            let body = payload();

            let bp = Arc::clone(&bus);
            let body_p = body.clone();
            let producer_handle = thread::spawn(move || {
                let mut sent = 0u64;
                while sent < MSG_PER_PRODUCER {
                    match bp.produce(Message::new(sent, producer, consumer, 0, b"", &body_p)) {
                        Ok(_) => sent += 1,
                        Err(BusError::Throttled | BusError::BufferFull) => std::hint::spin_loop(),
                        Err(e) => panic!("unexpected produce error: {e:?}"),
                    }
                }
            });

            let mut received = 0u64;
            while received < MSG_PER_PRODUCER {
                match bus.consume(consumer) {
                    Ok((view, ticket)) => {
                        black_box(&view.payload);
                        bus.feedback(ticket, FeedbackStatus::Ack, b"").unwrap();
                        received += 1;
                    }
                    Err(BusError::BufferEmpty) => std::hint::spin_loop(),
                    Err(e) => panic!("unexpected consume error: {e:?}"),
                }
            }

            producer_handle.join().unwrap();
        });
    });

    group.finish();
}

fn bench_mpmc(c: &mut Criterion) {
    let mut group = c.benchmark_group("mpmc");

    for &num_producers in &[2u32, 4, 8] {
        let total_msgs = MSG_PER_PRODUCER * u64::from(num_producers);
        group.throughput(Throughput::Elements(total_msgs));

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{num_producers}P_{num_producers}C")),
            &num_producers,
            |b, &n| {
                b.iter(|| {
                    let bus = Arc::new(shaped_bus(10, n.max(1))); // 1K slots/segment, one segment per producer
                    let producers: Vec<_> = (0..n).map(|_| bus.attach_producer().unwrap()).collect();
                    let consumers: Vec<_> = (0..n).map(|_| bus.attach_consumer()).collect();
                    let body = payload();

                    let mut producer_handles = vec![];
                    for (i, &producer) in producers.iter().enumerate() {
                        let bp = Arc::clone(&bus);
                        let body_p = body.clone();
                        let consumers = consumers.clone();
                        producer_handles.push(thread::spawn(move || {
                            let mut sent = 0u64;
                            while sent < MSG_PER_PRODUCER {
                                let consumer = consumers[(i as u64 + sent) as usize % consumers.len()];
                                match bp.produce(Message::new(sent, producer, consumer, 0, b"", &body_p)) {
                                    Ok(_) => sent += 1,
                                    Err(BusError::Throttled | BusError::BufferFull) => std::hint::spin_loop(),
                                    Err(e) => panic!("unexpected produce error: {e:?}"),
                                }
                            }
                        }));
                    }

                    let total = Arc::new(AtomicU64::new(0));
                    let target = total_msgs;
                    let mut consumer_handles = vec![];
                    for &consumer in &consumers {
                        let bc = Arc::clone(&bus);
                        let total = Arc::clone(&total);
                        consumer_handles.push(thread::spawn(move || {
                            while total.load(Ordering::Relaxed) < target {
                                match bc.consume(consumer) {
                                    Ok((view, ticket)) => {
                                        black_box(&view.payload);
                                        bc.feedback(ticket, FeedbackStatus::Ack, b"").unwrap();
                                        total.fetch_add(1, Ordering::Relaxed);
                                    }
                                    Err(BusError::BufferEmpty) => std::hint::spin_loop(),
                                    Err(e) => panic!("unexpected consume error: {e:?}"),
                                }
                            }
                        }));
                    }

                    for h in producer_handles {
                        h.join().unwrap();
                    }
                    for h in consumer_handles {
                        h.join().unwrap();
                    }
                });
            },
        );
    }

    group.finish();
}

fn bench_contention(c: &mut Criterion) {
    let mut group = c.benchmark_group("contention");
    let msgs = 20_000u64;

    for &num_producers in &[4u32, 8] {
        let total = msgs * u64::from(num_producers);
        group.throughput(Throughput::Elements(total));

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{num_producers}P_small_ring")),
            &num_producers,
            |b, &n| {
                b.iter(|| {
                    let bus = Arc::new(shaped_bus(6, n.max(1))); // 64 slots/segment
                    let producers: Vec<_> = (0..n).map(|_| bus.attach_producer().unwrap()).collect();
                    let consumer = bus.attach_consumer();
                    let body = payload();

                    let mut handles = vec![];
                    for &producer in &producers {
                        let bp = Arc::clone(&bus);
                        let body_p = body.clone();
                        handles.push(thread::spawn(move || {
                            let mut sent = 0u64;
                            while sent < msgs {
                                match bp.produce(Message::new(sent, producer, consumer, 0, b"", &body_p)) {
                                    Ok(_) => sent += 1,
                                    Err(BusError::Throttled | BusError::BufferFull) => std::hint::spin_loop(),
                                    Err(e) => panic!("unexpected produce error: {e:?}"),
                                }
                            }
                        }));
                    }

                    let counter = Arc::new(AtomicU64::new(0));
                    let bc = Arc::clone(&bus);
                    let cnt = Arc::clone(&counter);
                    let consumer_handle = thread::spawn(move || {
                        while cnt.load(Ordering::Relaxed) < total {
                            match bc.consume(consumer) {
                                Ok((view, ticket)) => {
                                    black_box(&view.payload);
                                    bc.feedback(ticket, FeedbackStatus::Ack, b"").unwrap();
                                    cnt.fetch_add(1, Ordering::Relaxed);
                                }
                                Err(BusError::BufferEmpty) => std::hint::spin_loop(),
                                Err(e) => panic!("unexpected consume error: {e:?}"),
                            }
                        }
                    });

                    for h in handles {
                        h.join().unwrap();
                    }
                    consumer_handle.join().unwrap();
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_spsc, bench_mpmc, bench_contention);
criterion_main!(benches);
