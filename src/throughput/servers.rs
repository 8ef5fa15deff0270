//! Catalog of public iperf3 reference servers.

use serde::Serialize;

/// A public, high-capacity iperf3 endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerDescriptor {
    pub id: &'static str,
    pub name: &'static str,
    pub host: &'static str,
    pub port: u16,
    pub location: &'static str,
    #[serde(rename = "bandwidth")]
    pub bandwidth_label: &'static str,
    pub provider: &'static str,
}

/// Reference server used when a caller names no server, or an unknown one.
pub const DEFAULT_SERVER_ID: &str = "iperf_he_fremont";

static SERVERS: [ServerDescriptor; 6] = [
    ServerDescriptor {
        id: "iperf_bouygues",
        name: "Bouygues Telecom (France)",
        host: "iperf.par2.as20766.net",
        port: 5201,
        location: "Paris, France",
        bandwidth_label: "100 Gbps",
        provider: "Bouygues Telecom",
    },
    ServerDescriptor {
        id: "iperf_he_fremont",
        name: "Hurricane Electric (Fremont)",
        host: "iperf.he.net",
        port: 5201,
        location: "Fremont, CA, USA",
        bandwidth_label: "100 Gbps",
        provider: "Hurricane Electric",
    },
    ServerDescriptor {
        id: "iperf_he_chicago",
        name: "Hurricane Electric (Chicago)",
        host: "iperf-chi.he.net",
        port: 5201,
        location: "Chicago, IL, USA",
        bandwidth_label: "100 Gbps",
        provider: "Hurricane Electric",
    },
    ServerDescriptor {
        id: "iperf_scaleway",
        name: "Scaleway (Paris)",
        host: "iperf3.scaleway.com",
        port: 5201,
        location: "Paris, France",
        bandwidth_label: "100 Gbps",
        provider: "Scaleway",
    },
    ServerDescriptor {
        id: "iperf_online_net",
        name: "Online.net (Paris)",
        host: "ping.online.net",
        port: 5201,
        location: "Paris, France",
        bandwidth_label: "100 Gbps",
        provider: "Online.net",
    },
    ServerDescriptor {
        id: "iperf_vultr_amsterdam",
        name: "Vultr (Amsterdam)",
        host: "ams-nl-ping.vultr.com",
        port: 5201,
        location: "Amsterdam, Netherlands",
        bandwidth_label: "100 Gbps",
        provider: "Vultr",
    },
];

/// All reference servers, in catalog order.
pub fn list_servers() -> &'static [ServerDescriptor] {
    &SERVERS
}

/// Look up a reference server by id.
pub fn find_server(id: &str) -> Option<&'static ServerDescriptor> {
    SERVERS.iter().find(|s| s.id == id)
}
