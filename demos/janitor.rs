//! Demonstrates a crashed-consumer scenario: a consumer reads messages but
//! never writes feedback for some of them, leaving their slots stuck in
//! CONSUMING. A separate janitor thread reclaims them via `Bus::reap_stale`
//! (§4.11) so the producer's segment doesn't starve waiting on a consumer
//! that will never come back.

use ringbus::Config as SegmentConfig;
use ringbus::{Bus, BusConfig, BusError, FeedbackStatus, Message, SlotState, Ticket};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

fn main() {
    let bus = Arc::new(Bus::new(BusConfig {
        size_mib: 1,
        segment_count: 1,
        segment: SegmentConfig::new(4, 0.8), // 16 slots
        offload_threshold: 1 << 20,
        try_offload: |_| false,
    }));
    let producer = bus.attach_producer().unwrap();
    let consumer = bus.attach_consumer();

    let stuck: Arc<Mutex<Vec<Ticket>>> = Arc::new(Mutex::new(Vec::new()));
    const TOTAL: u64 = 64;

    let bp = Arc::clone(&bus);
    let producer_handle = thread::spawn(move || {
        for i in 0..TOTAL {
            loop {
                match bp.produce(Message::new(i, producer, consumer, 0, b"", b"payload")) {
                    Ok(_) => break,
                    Err(BusError::Throttled | BusError::BufferFull) => thread::yield_now(),
                    Err(e) => panic!("produce failed: {e}"),
                }
            }
        }
    });

    let bc = Arc::clone(&bus);
    let stuck_c = Arc::clone(&stuck);
    let consumer_handle = thread::spawn(move || {
        let mut acked = 0u64;
        for _ in 0..TOTAL {
            loop {
                match bc.consume(consumer) {
                    Ok((view, ticket)) => {
                        // Simulate a crash on every third message: never
                        // write feedback, leaving the slot stuck in CONSUMING.
                        if view.msg_id % 3 == 0 {
                            stuck_c.lock().unwrap().push(ticket);
                        } else {
                            bc.feedback(ticket, FeedbackStatus::Ack, b"").unwrap();
                            acked += 1;
                        }
                        break;
                    }
                    Err(BusError::BufferEmpty) => thread::yield_now(),
                    Err(e) => panic!("consume failed: {e}"),
                }
            }
        }
        acked
    });

    // Janitor: periodically sweeps the "stuck" list and reclaims any ticket
    // still sitting in CONSUMING, handing it a TIMEOUT feedback record.
    let bj = Arc::clone(&bus);
    let stuck_j = Arc::clone(&stuck);
    let janitor_handle = thread::spawn(move || {
        let mut reclaimed = 0u64;
        for _ in 0..20 {
            thread::sleep(Duration::from_millis(10));
            let mut pending = stuck_j.lock().unwrap();
            pending.retain(|&ticket| {
                if bj.slot_state(ticket) == Ok(SlotState::Consuming) {
                    bj.reap_stale(ticket).unwrap();
                    reclaimed += 1;
                    false
                } else {
                    true
                }
            });
            if pending.is_empty() {
                break;
            }
        }
        reclaimed
    });

    producer_handle.join().unwrap();
    let acked = consumer_handle.join().unwrap();
    let reclaimed = janitor_handle.join().unwrap();

    println!("acked directly: {acked}");
    println!("reclaimed by janitor: {reclaimed}");
    println!("left stuck: {}", stuck.lock().unwrap().len());
    println!("final stats: {:?}", bus.stats());
}
