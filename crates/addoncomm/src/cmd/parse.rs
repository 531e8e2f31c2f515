use addoncomm_frame::parse_frame;
use serde::Serialize;

use crate::cmd::ParseArgs;
use crate::exit::{frame_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{
    from_hex, message_id_text, payload_preview, print_json, table, OutputFormat,
};

#[derive(Serialize)]
struct ParseOutput {
    schema_id: &'static str,
    kind: &'static str,
    control_byte: u8,
    message_id: Option<String>,
    frame_size: usize,
    chunk_size: usize,
    chunk: String,
}

pub fn run(args: ParseArgs, format: OutputFormat) -> CliResult<i32> {
    let raw = from_hex(&args.hex)
        .map_err(|reason| CliError::new(DATA_INVALID, format!("decode hex: {reason}")))?;
    let frame_size = raw.len();
    let frame = parse_frame(raw.into()).map_err(|err| frame_error("parse frame", err))?;

    let output = ParseOutput {
        schema_id: "https://schemas.3leaps.dev/addoncomm/cli/v1/frame.schema.json",
        kind: frame.kind().as_str(),
        control_byte: frame.kind().control_byte(),
        message_id: frame.message_id().map(message_id_text),
        frame_size,
        chunk_size: frame.chunk().len(),
        chunk: payload_preview(frame.chunk(), 64),
    };

    match format {
        OutputFormat::Json => print_json(&output),
        OutputFormat::Table => {
            let mut out = table(&["FIELD", "VALUE"]);
            out.add_row(vec!["kind".to_string(), output.kind.to_string()]);
            out.add_row(vec![
                "control".to_string(),
                format!("0x{:02x}", output.control_byte),
            ]);
            out.add_row(vec![
                "message id".to_string(),
                output.message_id.clone().unwrap_or_else(|| "-".to_string()),
            ]);
            out.add_row(vec!["frame size".to_string(), output.frame_size.to_string()]);
            out.add_row(vec!["chunk size".to_string(), output.chunk_size.to_string()]);
            out.add_row(vec!["chunk".to_string(), output.chunk.clone()]);
            println!("{out}");
        }
        OutputFormat::Pretty => {
            println!(
                "kind={} id={} size={} chunk={}",
                output.kind,
                output.message_id.as_deref().unwrap_or("-"),
                output.frame_size,
                output.chunk
            );
        }
    }

    Ok(SUCCESS)
}
