//! Two dispatchers talking over an in-memory channel.
//!
//! Run with: `cargo run -p addoncomm --example loopback-chat`

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use addoncomm::channel::{Distribution, LoopbackChannel, ManualClock};
use addoncomm::dispatch::{
    handler, Destination, Dispatcher, Priority, SendRequest, TransportConfig,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let clock = ManualClock::new();
    let wire = LoopbackChannel::new();
    let config = TransportConfig::default();
    let mut alice = Dispatcher::new(wire.clone(), clock.clone(), config.clone())?;
    let mut bob = Dispatcher::new(LoopbackChannel::new(), clock.clone(), config)?;

    let inbox = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&inbox);
    bob.register_prefix(
        "CHAT",
        handler(move |msg| {
            let text = String::from_utf8_lossy(&msg.payload).into_owned();
            sink.borrow_mut().push(format!("[{}] {}: {text}", msg.distribution, msg.sender));
            Ok(())
        }),
    )?;

    alice.send("CHAT", "short hello", Destination::to(Distribution::Party))?;
    alice.send_with(
        SendRequest::new("CHAT", "x".repeat(1200), Destination::whisper("Bob"))
            .priority(Priority::Bulk)
            .on_delivered(|p| {
                println!(
                    "bulk progress: frame {}/{} ({}/{} bytes)",
                    p.frame_index + 1,
                    p.frame_count,
                    p.bytes_through,
                    p.total_bytes
                );
            }),
    )?;

    let mut tick = 0;
    while alice.queued_len() > 0 {
        let report = alice.tick();
        println!("tick {tick}: sent {} frames, {} queued", report.sent, report.remaining);
        for frame in wire.take_frames() {
            bob.handle_inbound(frame.into_inbound("Alice"));
        }
        clock.advance(Duration::from_millis(500));
        tick += 1;
    }

    for line in inbox.borrow().iter() {
        let shown: String = line.chars().take(60).collect();
        println!("{shown}");
    }
    println!("alice: {:?}", alice.stats());
    println!("bob:   {:?}", bob.stats());
    Ok(())
}
