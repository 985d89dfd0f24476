//! Lists audio output devices.
//!
//! Usage: `list-devices [--json]`. The index or id printed here is what the
//! receiver's `audio.device` setting accepts.

use anyhow::Result;

use udp_pcm_receiver::audio::list_devices;

fn main() -> Result<()> {
    let json = std::env::args().skip(1).any(|arg| arg == "--json");
    let devices = list_devices();

    if json {
        println!("{}", serde_json::to_string_pretty(&devices)?);
        return Ok(());
    }

    println!("\n=== Available Output Devices ===");
    if devices.is_empty() {
        println!("  (none)");
    }
    for device in &devices {
        let default_marker = if device.is_default { " [DEFAULT]" } else { "" };
        println!("  Index {}: {}{}", device.index, device.name, default_marker);
        println!("    ID: {}", device.id);
        println!("    Sample rates: {:?}", device.sample_rates);
        println!("    Channels: {:?}", device.channels);
    }
    println!();

    Ok(())
}
