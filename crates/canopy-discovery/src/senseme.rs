//! SenseME discovery protocol
//!
//! Haiku devices answer a broadcast `<ALL;DEVICE;ID;GET>` query on UDP port
//! 31415 with a reply such as `(Master Bedroom Light;DEVICE;ID;20:F8:5E:E2:4C:98;LIGHT,HAIKU)`.

use canopy_core::DeviceObservation;
use tracing::trace;

/// UDP port SenseME devices listen on
pub const SENSEME_PORT: u16 = 31415;

/// Broadcast query asking every device for its identity
pub const DISCOVERY_QUERY: &str = "<ALL;DEVICE;ID;GET>";

/// Parse a discovery reply into an observation
pub fn parse_reply(reply: &str) -> Option<DeviceObservation> {
    let body = reply
        .trim()
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))?;

    let parts: Vec<&str> = body.split(';').collect();
    if parts.len() < 5 || parts[1] != "DEVICE" || parts[2] != "ID" {
        trace!(reply = %reply, "Not a SenseME ID reply");
        return None;
    }

    let name = parts[0].trim();
    let id = parts[3].trim();
    let kind = parts[4].trim();
    if name.is_empty() || id.is_empty() {
        return None;
    }

    Some(DeviceObservation::new(id, name, kind))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reply() {
        let obs = parse_reply("(Master Bedroom Light;DEVICE;ID;20:F8:5E:E2:4C:98;LIGHT,HAIKU)").unwrap();
        assert_eq!(obs.display_name, "Master Bedroom Light");
        assert_eq!(obs.identifier, "20:F8:5E:E2:4C:98");
        assert_eq!(obs.kind, "LIGHT,HAIKU");
    }

    #[test]
    fn test_parse_reply_trims_whitespace() {
        let obs = parse_reply("  (Living Room Fan;DEVICE;ID;20:F8:5E:00:11:22;FAN,HAIKU)\r\n").unwrap();
        assert_eq!(obs.display_name, "Living Room Fan");
    }

    #[test]
    fn test_parse_reply_rejects_other_messages() {
        assert!(parse_reply("(Living Room Fan;FAN;PWR;ON)").is_none());
        assert!(parse_reply("<ALL;DEVICE;ID;GET>").is_none());
        assert!(parse_reply("(;DEVICE;ID;20:F8:5E:00:11:22;FAN)").is_none());
        assert!(parse_reply("garbage").is_none());
    }
}
