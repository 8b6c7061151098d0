use anyhow::Result;

use crate::config::{ProfilesFile, RuntimeConfig};
use crate::pipeline::ICON_EDGE;

pub fn run_profiles_list(profiles: &ProfilesFile, cfg: &RuntimeConfig) -> Result<()> {
    let mut names = profiles.profiles.keys().cloned().collect::<Vec<String>>();
    if !names.iter().any(|name| name == "default") {
        names.push("default".to_string());
    }
    names.sort();

    println!("Configured profiles (active='{}'):", cfg.profile);
    for name in names {
        let marker = if name == cfg.profile { "*" } else { " " };
        let source = if profiles.profiles.contains_key(&name) {
            "configured"
        } else {
            "implicit"
        };
        println!("{marker} {name} ({source})");
    }

    Ok(())
}

pub fn run_profiles_show(cfg: &RuntimeConfig) -> Result<()> {
    println!("Active profile: {}", cfg.profile);
    println!("Config path: {}", cfg.config_path);
    println!("Chat model (stylist): {}", cfg.chat_model);
    println!("Image model: {}", cfg.image_model);
    println!("Image quality: {}", cfg.image_quality);
    println!("API base URL: {}", cfg.api_base_url);
    println!("Source size: {0}x{0}", cfg.source_edge);
    println!("Icon size: {ICON_EDGE}x{ICON_EDGE}");
    println!("Output directory: {}", cfg.output_dir.display());
    println!("File naming: {:?}", cfg.naming);
    println!("On error: {:?}", cfg.on_error);
    println!("Request timeout (secs): {}", cfg.request_timeout_secs);
    println!("Download timeout (secs): {}", cfg.download_timeout_secs);
    println!(
        "Request limit: {}",
        cfg.request_limit
            .map(|v| v.to_string())
            .unwrap_or_else(|| "<unlimited>".to_string())
    );
    println!("Telemetry enabled: {}", cfg.telemetry_enabled);
    println!("Telemetry path: {}", cfg.telemetry_path);
    Ok(())
}
