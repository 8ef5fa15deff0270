//! iperf3 command lines for users who want to test by hand.

use serde::Serialize;

use super::servers::{find_server, ServerDescriptor, DEFAULT_SERVER_ID};
use crate::config::Device;

/// Advertised when the device inventory is empty.
pub const PLACEHOLDER_SERVER_IP: &str = "your-server-ip";

const FALLBACK_HOST: &str = "iperf.he.net";
const FALLBACK_PORT: u16 = 5201;
const FALLBACK_NAME: &str = "Hurricane Electric";

/// Duration used in the suggested command lines.
const ADVICE_DURATION_SECS: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScenarioCommands {
    pub download: String,
    pub upload: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdviceCommands {
    pub to_your_server: ScenarioCommands,
    pub from_your_server: ScenarioCommands,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdviceInstructions {
    pub install: &'static str,
    pub usage: &'static str,
    pub note: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommandAdvice {
    pub server_ip: String,
    pub target_server: Option<&'static ServerDescriptor>,
    pub commands: AdviceCommands,
    pub instructions: AdviceInstructions,
}

fn scenario(host: &str, port: u16, description: String) -> ScenarioCommands {
    let base = format!("iperf3 -c {} -p {} -t {}", host, port, ADVICE_DURATION_SECS);
    ScenarioCommands {
        upload: format!("{} -R", base),
        download: base,
        description,
    }
}

/// Build command advice for the local server and a reference server.
///
/// `server_id` defaults to [`DEFAULT_SERVER_ID`]; an id that matches no
/// registry entry leaves `target_server` empty and falls back to Hurricane
/// Electric for the reference commands.
pub fn advise_commands(devices: &[Device], local_port: u16, server_id: Option<&str>) -> CommandAdvice {
    let server_ip = devices
        .first()
        .map(|d| d.address.clone())
        .unwrap_or_else(|| PLACEHOLDER_SERVER_IP.to_string());

    let target_server = find_server(server_id.unwrap_or(DEFAULT_SERVER_ID));
    let (target_host, target_port, target_name) = match target_server {
        Some(s) => (s.host, s.port, s.name),
        None => (FALLBACK_HOST, FALLBACK_PORT, FALLBACK_NAME),
    };

    let commands = AdviceCommands {
        to_your_server: scenario(
            &server_ip,
            local_port,
            format!("Test speed to your server ({})", server_ip),
        ),
        from_your_server: scenario(
            target_host,
            target_port,
            format!("Test speed from your location to {}", target_name),
        ),
    };

    CommandAdvice {
        server_ip,
        target_server,
        commands,
        instructions: AdviceInstructions {
            install: "Install iperf3: apt-get install iperf3 (Ubuntu/Debian) or yum install iperf3 (CentOS/RHEL)",
            usage: "Run the commands above to test your connection speed",
            note: "Download tests your download speed, upload tests your upload speed",
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn devices() -> Vec<Device> {
        vec![
            Device {
                name: "edge01".into(),
                address: "192.0.2.1".into(),
            },
            Device {
                name: "edge02".into(),
                address: "198.51.100.7".into(),
            },
        ]
    }

    #[test]
    fn test_first_device_is_advertised() {
        let advice = advise_commands(&devices(), 5201, Some("iperf_scaleway"));
        assert_eq!(advice.server_ip, "192.0.2.1");
        assert_eq!(
            advice.commands.to_your_server.download,
            "iperf3 -c 192.0.2.1 -p 5201 -t 10"
        );
        assert_eq!(
            advice.commands.to_your_server.upload,
            "iperf3 -c 192.0.2.1 -p 5201 -t 10 -R"
        );
        assert_eq!(
            advice.commands.to_your_server.description,
            "Test speed to your server (192.0.2.1)"
        );
    }

    #[test]
    fn test_reference_server_commands() {
        let advice = advise_commands(&devices(), 5201, Some("iperf_scaleway"));
        assert_eq!(advice.target_server.map(|s| s.id), Some("iperf_scaleway"));
        assert_eq!(
            advice.commands.from_your_server.download,
            "iperf3 -c iperf3.scaleway.com -p 5201 -t 10"
        );
        assert_eq!(
            advice.commands.from_your_server.description,
            "Test speed from your location to Scaleway (Paris)"
        );
    }

    #[test]
    fn test_empty_inventory_uses_placeholder() {
        let advice = advise_commands(&[], 5301, None);
        assert_eq!(advice.server_ip, PLACEHOLDER_SERVER_IP);
        assert_eq!(
            advice.commands.to_your_server.download,
            "iperf3 -c your-server-ip -p 5301 -t 10"
        );
        assert_eq!(advice.target_server.map(|s| s.id), Some(DEFAULT_SERVER_ID));
    }

    #[test]
    fn test_unknown_server_degrades_to_fallback() {
        let advice = advise_commands(&devices(), 5201, Some("does-not-exist"));
        assert!(advice.target_server.is_none());
        assert_eq!(
            advice.commands.from_your_server.upload,
            "iperf3 -c iperf.he.net -p 5201 -t 10 -R"
        );
        assert_eq!(
            advice.commands.from_your_server.description,
            "Test speed from your location to Hurricane Electric"
        );

        let json = serde_json::to_value(&advice).unwrap();
        assert!(json["target_server"].is_null());
        assert!(json["instructions"]["install"].as_str().unwrap().contains("apt-get"));
    }
}
