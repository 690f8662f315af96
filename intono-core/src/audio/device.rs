//! Audio input device enumeration.

use serde::{Deserialize, Serialize};

/// Metadata about an audio input device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    /// Device name reported by the OS; pass it back to `start_with_device`.
    pub name: String,
    pub is_default: bool,
    /// The device `start()` would pick.
    pub is_recommended: bool,
}

/// Build the device list: flag the default (or the first device when there
/// is no default) as recommended, and sort it first.
pub fn rank_devices(names: Vec<String>, default_name: Option<&str>) -> Vec<DeviceInfo> {
    let has_default = default_name.is_some_and(|d| names.iter().any(|n| n == d));
    let mut list: Vec<DeviceInfo> = names
        .into_iter()
        .enumerate()
        .map(|(idx, name)| {
            let is_default = default_name == Some(name.as_str());
            DeviceInfo {
                is_recommended: if has_default { is_default } else { idx == 0 },
                is_default,
                name,
            }
        })
        .collect();
    list.sort_by_key(|d| (!d.is_recommended, d.name.to_ascii_lowercase()));
    list
}

/// List all available audio input devices on the system.
///
/// Returns an empty `Vec` if enumeration fails and no default exists.
#[cfg(feature = "audio-cpal")]
pub fn list_input_devices() -> Vec<DeviceInfo> {
    use cpal::traits::{DeviceTrait, HostTrait};

    let host = cpal::default_host();
    let default_name = host.default_input_device().and_then(|d| d.name().ok());

    match host.input_devices() {
        Ok(devices) => {
            let names = devices
                .enumerate()
                .map(|(idx, device)| {
                    device
                        .name()
                        .unwrap_or_else(|_| format!("Input Device {}", idx + 1))
                })
                .collect();
            rank_devices(names, default_name.as_deref())
        }
        Err(e) => {
            tracing::warn!("failed to enumerate input devices: {e}");
            default_name
                .map(|name| rank_devices(vec![name.clone()], Some(name.as_str())))
                .unwrap_or_default()
        }
    }
}

#[cfg(not(feature = "audio-cpal"))]
pub fn list_input_devices() -> Vec<DeviceInfo> {
    vec![]
}
