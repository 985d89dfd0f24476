//! Output device enumeration and lookup
//!
//! Device ids are opaque to the rest of the crate. Accepted forms:
//! `None` / `"default"` for the host default, a decimal index into
//! [`list_devices`], `"output:<name>"`, or a bare device name.

use cpal::traits::{DeviceTrait, HostTrait};
use serde::Serialize;

use crate::error::AudioError;

/// Output device description
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudioDeviceInfo {
    pub index: usize,
    pub id: String,
    pub name: String,
    pub is_default: bool,
    pub sample_rates: Vec<u32>,
    pub channels: Vec<u16>,
}

/// List all available output devices
pub fn list_devices() -> Vec<AudioDeviceInfo> {
    let host = cpal::default_host();
    let mut devices = Vec::new();

    let default_output_name = host
        .default_output_device()
        .and_then(|d| d.name().ok());

    let output_devices = match host.output_devices() {
        Ok(devices) => devices,
        Err(e) => {
            tracing::warn!("Failed to enumerate output devices: {}", e);
            return devices;
        }
    };

    for (index, device) in output_devices.enumerate() {
        let Ok(name) = device.name() else {
            continue;
        };
        let (sample_rates, channels) = get_device_capabilities(&device);

        devices.push(AudioDeviceInfo {
            index,
            id: format!("output:{}", name),
            is_default: default_output_name.as_ref() == Some(&name),
            name,
            sample_rates,
            channels,
        });
    }

    devices
}

/// Get device capabilities
fn get_device_capabilities(device: &cpal::Device) -> (Vec<u32>, Vec<u16>) {
    let mut sample_rates = Vec::new();
    let mut channels = Vec::new();

    if let Ok(configs) = device.supported_output_configs() {
        for config in configs {
            // Common sample rates
            for rate_val in [44100u32, 48000, 88200, 96000, 176400, 192000] {
                let rate = cpal::SampleRate(rate_val);
                if rate >= config.min_sample_rate()
                    && rate <= config.max_sample_rate()
                    && !sample_rates.contains(&rate_val)
                {
                    sample_rates.push(rate_val);
                }
            }

            let ch = config.channels();
            if !channels.contains(&ch) {
                channels.push(ch);
            }
        }
    }

    sample_rates.sort_unstable();
    channels.sort_unstable();

    (sample_rates, channels)
}

/// How a device id selects a device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceSelector<'a> {
    Default,
    Index(usize),
    Name(&'a str),
}

impl<'a> DeviceSelector<'a> {
    pub fn parse(id: Option<&'a str>) -> Self {
        let Some(id) = id.map(str::trim) else {
            return DeviceSelector::Default;
        };

        if id.is_empty() || id.eq_ignore_ascii_case("default") {
            DeviceSelector::Default
        } else if let Ok(index) = id.parse::<usize>() {
            DeviceSelector::Index(index)
        } else {
            DeviceSelector::Name(id.strip_prefix("output:").unwrap_or(id))
        }
    }
}

/// Resolve a device id to a cpal output device
pub fn get_output_device(id: Option<&str>) -> Result<cpal::Device, AudioError> {
    let host = cpal::default_host();

    let selector = DeviceSelector::parse(id);
    if selector == DeviceSelector::Default {
        return host
            .default_output_device()
            .ok_or_else(|| AudioError::DeviceNotFound("No default output device".to_string()));
    }

    let mut devices = host
        .output_devices()
        .map_err(|e| AudioError::DeviceNotFound(e.to_string()))?;

    let found = match selector {
        DeviceSelector::Index(index) => devices.nth(index),
        DeviceSelector::Name(name) => devices.find(|d| d.name().map(|n| n == name).unwrap_or(false)),
        DeviceSelector::Default => None,
    };

    found.ok_or_else(|| AudioError::DeviceNotFound(id.unwrap_or_default().to_string()))
}
