use addoncomm_frame::{Splitter, WireFrame};
use comfy_table::Cell;
use serde::Serialize;

use crate::cmd::SplitArgs;
use crate::exit::{frame_error, io_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{
    message_id_text, payload_preview, print_json, table, to_hex, OutputFormat,
};

const PREVIEW_CHARS: usize = 32;

#[derive(Serialize)]
struct FrameRow {
    index: usize,
    kind: &'static str,
    message_id: Option<String>,
    size: usize,
    chunk_size: usize,
    hex: String,
}

#[derive(Serialize)]
struct SplitOutput {
    schema_id: &'static str,
    max_frame_size: usize,
    payload_size: usize,
    frame_count: usize,
    frames: Vec<FrameRow>,
}

pub fn run(args: SplitArgs, format: OutputFormat) -> CliResult<i32> {
    let payload = match (args.data, args.file) {
        (Some(data), None) => data.into_bytes(),
        (None, Some(path)) => std::fs::read(&path)
            .map_err(|err| io_error(&format!("read {}", path.display()), err))?,
        _ => return Err(CliError::new(USAGE, "provide exactly one of --data or --file")),
    };

    let mut splitter = Splitter::with_first_id(args.max_frame_size, args.message_id)
        .map_err(|err| frame_error("split", err))?;
    let payload_size = payload.len();
    let frames = splitter.split(payload);

    match format {
        OutputFormat::Json => print_json(&SplitOutput {
            schema_id: "https://schemas.3leaps.dev/addoncomm/cli/v1/split.schema.json",
            max_frame_size: args.max_frame_size,
            payload_size,
            frame_count: frames.len(),
            frames: frames.iter().enumerate().map(frame_row).collect(),
        }),
        OutputFormat::Table => {
            let mut out = table(&["#", "KIND", "ID", "SIZE", "PREVIEW"]);
            for (index, frame) in frames.iter().enumerate() {
                out.add_row(vec![
                    Cell::new(index),
                    Cell::new(frame.kind().as_str()),
                    Cell::new(frame.message_id().map_or("-".to_string(), message_id_text)),
                    Cell::new(frame.encoded_len()),
                    Cell::new(payload_preview(frame.chunk(), PREVIEW_CHARS)),
                ]);
            }
            println!("{out}");
            println!(
                "{payload_size} bytes -> {} frame(s) at max {}",
                frames.len(),
                args.max_frame_size
            );
        }
        OutputFormat::Pretty => {
            for frame in &frames {
                println!("{}", to_hex(&frame.encode()));
            }
        }
    }

    Ok(SUCCESS)
}

fn frame_row((index, frame): (usize, &WireFrame)) -> FrameRow {
    FrameRow {
        index,
        kind: frame.kind().as_str(),
        message_id: frame.message_id().map(message_id_text),
        size: frame.encoded_len(),
        chunk_size: frame.chunk().len(),
        hex: to_hex(&frame.encode()),
    }
}
