use ringbus::{Bus, BusConfig, BusError, FeedbackStatus, Message};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

fn main() {
    println!("ringbus Basic Example");
    println!("======================\n");

    let bus = Arc::new(Bus::new(BusConfig::new(4, 4).unwrap()));

    const N_PRODUCERS: u32 = 4;
    const ITEMS_PER_PRODUCER: u64 = 200_000;

    println!("Configuration:");
    println!("  Producers: {N_PRODUCERS}");
    println!("  Items per producer: {ITEMS_PER_PRODUCER}");
    println!("  Total items: {}\n", u64::from(N_PRODUCERS) * ITEMS_PER_PRODUCER);

    let consumer = bus.attach_consumer();
    let start = Instant::now();

    let mut handles = vec![];
    for id in 0..N_PRODUCERS {
        let bus = Arc::clone(&bus);
        let handle = thread::spawn(move || {
            let producer = bus.attach_producer().unwrap();
            for i in 0..ITEMS_PER_PRODUCER {
                loop {
                    match bus.produce(Message::new(i, producer, consumer, 0, b"", &i.to_le_bytes())) {
                        Ok(_) => break,
                        Err(BusError::Throttled | BusError::BufferFull) => thread::yield_now(),
                        Err(e) => panic!("producer {id} failed: {e}"),
                    }
                }
            }
            println!("Producer {id} finished");
        });
        handles.push(handle);
    }

    let bus_c = Arc::clone(&bus);
    let consumer_handle = thread::spawn(move || {
        let target = u64::from(N_PRODUCERS) * ITEMS_PER_PRODUCER;
        let mut total = 0u64;
        let mut sum = 0u64;
        while total < target {
            match bus_c.consume(consumer) {
                Ok((view, ticket)) => {
                    sum += u64::from_le_bytes(view.payload.try_into().unwrap());
                    bus_c.feedback(ticket, FeedbackStatus::Ack, b"").unwrap();
                    total += 1;
                }
                Err(BusError::BufferEmpty) => thread::yield_now(),
                Err(e) => panic!("consumer failed: {e}"),
            }
        }
        (total, sum)
    });

    for handle in handles {
        handle.join().unwrap();
    }
    let (total, sum) = consumer_handle.join().unwrap();
    let duration = start.elapsed();

    println!("\nResults:");
    println!("  Messages consumed: {total}");
    println!("  Checksum sum: {sum}");
    println!("  Duration: {duration:.2?}");
    println!("  Throughput: {:.2} million msgs/sec", total as f64 / duration.as_secs_f64() / 1_000_000.0);

    let stats = bus.stats();
    println!("\nBus stats: {stats:?}");
}
