use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use addoncomm_channel::{LoopbackChannel, ManualClock};
use addoncomm_dispatch::{
    handler, Destination, DispatchStats, Dispatcher, Priority, SendRequest, TransportConfig,
};
use serde::Serialize;
use tracing::{debug, info};

use crate::cmd::SimulateArgs;
use crate::exit::{
    dispatch_error, io_error, transmit_error, CliResult, FAILURE, SUCCESS, TIMEOUT,
};
use crate::output::{print_json, table, OutputFormat};

const SENDER_NAME: &str = "simulator";
const SCHEDULE_TABLE_ROWS: usize = 20;

#[derive(Serialize)]
struct TickRow {
    tick: u64,
    at_ms: u64,
    frames: usize,
    bytes: usize,
    queued: usize,
}

#[derive(Serialize)]
struct SimulateOutput {
    schema_id: &'static str,
    config: TransportConfig,
    destination: String,
    priority: Priority,
    messages: usize,
    message_size: usize,
    ticks: u64,
    elapsed_ms: u64,
    drained: bool,
    frames_transmitted: u64,
    frames_dropped: u64,
    messages_delivered: u64,
    messages_corrupt: u64,
    schedule: Vec<TickRow>,
    sender: DispatchStats,
    receiver: DispatchStats,
}

#[derive(Default)]
struct Inbox {
    delivered: u64,
    corrupt: u64,
}

pub fn run(args: SimulateArgs, format: OutputFormat) -> CliResult<i32> {
    let config = load_config(&args)?;
    let destination = Destination::parse(&args.distribution, args.target.as_deref())
        .map_err(|err| dispatch_error("destination", err))?;
    let tick = Duration::from_millis(args.tick_ms);

    let clock = ManualClock::new();
    let wire = LoopbackChannel::with_max_frame_size(config.max_frame_size);
    let mut sender = Dispatcher::new(wire.clone(), clock.clone(), config.clone())
        .map_err(|err| dispatch_error("sender", err))?;
    let mut receiver = Dispatcher::new(
        LoopbackChannel::with_max_frame_size(config.max_frame_size),
        clock.clone(),
        config.clone(),
    )
    .map_err(|err| dispatch_error("receiver", err))?;

    let inbox = Rc::new(RefCell::new(Inbox::default()));
    let sink = Rc::clone(&inbox);
    let expected_size = args.size;
    receiver
        .register_prefix(
            &args.prefix,
            handler(move |msg| {
                let mut inbox = sink.borrow_mut();
                if is_intact(&msg.payload, expected_size) {
                    inbox.delivered += 1;
                } else {
                    inbox.corrupt += 1;
                }
                Ok(())
            }),
        )
        .map_err(|err| dispatch_error("register", err))?;

    for index in 0..args.messages {
        let request = SendRequest::new(
            args.prefix.as_str(),
            message_payload(index, args.size),
            destination.clone(),
        )
        .priority(args.priority);
        sender
            .send_with(request)
            .map_err(|err| dispatch_error("send", err))?;
    }
    info!(
        messages = args.messages,
        frames = sender.queued_len(),
        "simulation queued"
    );

    let mut schedule = Vec::new();
    let mut ticks = 0u64;
    let mut transmitted = 0u64;
    let mut dropped = 0u64;
    while sender.queued_len() > 0 && ticks < args.max_ticks {
        let report = sender.tick();
        if let Some(err) = report.error {
            return Err(transmit_error("transmit", err));
        }

        for frame in wire.take_frames() {
            transmitted += 1;
            if args.drop_every.is_some_and(|n| transmitted % n == 0) {
                dropped += 1;
                debug!(frame = transmitted, "frame dropped");
                continue;
            }
            receiver.handle_inbound(frame.into_inbound(SENDER_NAME));
        }

        if report.sent > 0 {
            schedule.push(TickRow {
                tick: ticks,
                at_ms: ticks * args.tick_ms,
                frames: report.sent,
                bytes: report.bytes_sent,
                queued: report.remaining,
            });
        }
        receiver.tick();
        ticks += 1;
        clock.advance(tick);
    }

    let drained = sender.queued_len() == 0;
    let inbox = inbox.borrow();
    let output = SimulateOutput {
        schema_id: "https://schemas.3leaps.dev/addoncomm/cli/v1/simulate.schema.json",
        config,
        destination: destination.to_string(),
        priority: args.priority,
        messages: args.messages,
        message_size: args.size,
        ticks,
        elapsed_ms: ticks.saturating_sub(1) * args.tick_ms,
        drained,
        frames_transmitted: transmitted,
        frames_dropped: dropped,
        messages_delivered: inbox.delivered,
        messages_corrupt: inbox.corrupt,
        schedule,
        sender: sender.stats(),
        receiver: receiver.stats(),
    };
    print_output(&output, format);

    if !drained {
        eprintln!("error: queue not drained after {ticks} ticks");
        return Ok(TIMEOUT);
    }
    if output.messages_corrupt > 0 || (dropped == 0 && inbox.delivered != args.messages as u64) {
        return Ok(FAILURE);
    }
    Ok(SUCCESS)
}

fn load_config(args: &SimulateArgs) -> CliResult<TransportConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .map_err(|err| io_error(&format!("read {}", path.display()), err))?;
            TransportConfig::from_json(&text).map_err(|err| dispatch_error("config", err))?
        }
        None => TransportConfig::default(),
    };

    if let Some(rate) = args.rate {
        config.rate = rate;
    }
    if let Some(burst) = args.burst {
        config.burst_capacity = burst;
    }
    if let Some(max_frame_size) = args.max_frame_size {
        config.max_frame_size = max_frame_size;
    }
    config
        .validate()
        .map_err(|err| dispatch_error("config", err))?;
    Ok(config)
}

/// Every byte of message `index` is the same letter, so a payload spliced
/// from two messages is detectable.
fn message_payload(index: usize, size: usize) -> Vec<u8> {
    vec![b'a' + (index % 26) as u8; size]
}

fn is_intact(payload: &[u8], size: usize) -> bool {
    payload.len() == size && payload.windows(2).all(|pair| pair[0] == pair[1])
}

fn print_output(output: &SimulateOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(output),
        OutputFormat::Table => {
            let mut summary = table(&["FIELD", "VALUE"]);
            for (field, value) in summary_rows(output) {
                summary.add_row(vec![field.to_string(), value]);
            }
            println!("{summary}");

            let mut stats = table(&["STAT", "SENDER", "RECEIVER"]);
            for ((name, sent), (_, received)) in
                stat_rows(&output.sender).into_iter().zip(stat_rows(&output.receiver))
            {
                stats.add_row(vec![name.to_string(), sent.to_string(), received.to_string()]);
            }
            println!("{stats}");

            let mut schedule = table(&["TICK", "AT (ms)", "FRAMES", "BYTES", "QUEUED"]);
            for row in output.schedule.iter().take(SCHEDULE_TABLE_ROWS) {
                schedule.add_row(vec![
                    row.tick.to_string(),
                    row.at_ms.to_string(),
                    row.frames.to_string(),
                    row.bytes.to_string(),
                    row.queued.to_string(),
                ]);
            }
            println!("{schedule}");
            if output.schedule.len() > SCHEDULE_TABLE_ROWS {
                println!(
                    "({} more sending ticks; use --format json for the full schedule)",
                    output.schedule.len() - SCHEDULE_TABLE_ROWS
                );
            }
        }
        OutputFormat::Pretty => {
            for (field, value) in summary_rows(output) {
                println!("{field}: {value}");
            }
            for row in &output.schedule {
                println!(
                    "t={}ms frames={} bytes={} queued={}",
                    row.at_ms, row.frames, row.bytes, row.queued
                );
            }
        }
    }
}

fn summary_rows(output: &SimulateOutput) -> Vec<(&'static str, String)> {
    vec![
        ("destination", output.destination.clone()),
        ("priority", output.priority.to_string()),
        ("messages", output.messages.to_string()),
        ("message size", output.message_size.to_string()),
        ("ticks", output.ticks.to_string()),
        ("elapsed (ms)", output.elapsed_ms.to_string()),
        ("drained", output.drained.to_string()),
        ("frames transmitted", output.frames_transmitted.to_string()),
        ("frames dropped", output.frames_dropped.to_string()),
        ("messages delivered", output.messages_delivered.to_string()),
        ("messages corrupt", output.messages_corrupt.to_string()),
    ]
}

fn stat_rows(stats: &DispatchStats) -> [(&'static str, u64); 11] {
    [
        ("messages queued", stats.messages_queued),
        ("frames sent", stats.frames_sent),
        ("bytes sent", stats.bytes_sent),
        ("transmit failures", stats.transmit_failures),
        ("frames received", stats.frames_received),
        ("messages delivered", stats.messages_delivered),
        ("frames discarded", stats.frames_discarded),
        ("frames malformed", stats.frames_malformed),
        ("frames ignored", stats.frames_ignored),
        ("handler failures", stats.handler_failures),
        ("reassemblies evicted", stats.reassemblies_evicted),
    ]
}
