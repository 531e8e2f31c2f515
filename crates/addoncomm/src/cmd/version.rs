use serde::Serialize;

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_json, OutputFormat};

#[derive(Serialize)]
struct VersionOutput {
    name: &'static str,
    version: &'static str,
    target: String,
    profile: &'static str,
    features: Vec<&'static str>,
}

pub fn run(args: VersionArgs, format: OutputFormat) -> CliResult<i32> {
    if !args.extended {
        println!("addoncomm {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    let output = VersionOutput {
        name: "addoncomm",
        version: env!("CARGO_PKG_VERSION"),
        target: target_triple(),
        profile: option_env!("ADDONCOMM_BUILD_PROFILE").unwrap_or("unknown"),
        features: active_features(),
    };

    match format {
        OutputFormat::Json => print_json(&output),
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("name: {}", output.name);
            println!("version: {}", output.version);
            println!("target: {}", output.target);
            println!("profile: {}", output.profile);
            println!("features: {}", output.features.join(", "));
        }
    }

    Ok(SUCCESS)
}

fn target_triple() -> String {
    if let Some(target) = option_env!("ADDONCOMM_BUILD_TARGET") {
        return target.to_string();
    }
    format!(
        "{}-unknown-{}",
        std::env::consts::ARCH,
        std::env::consts::OS
    )
}

fn active_features() -> Vec<&'static str> {
    let mut features = vec!["cli"];
    if cfg!(feature = "dispatch") {
        features.push("dispatch");
    }
    if cfg!(feature = "async") {
        features.push("async");
    }
    features
}
