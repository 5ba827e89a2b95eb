// Host port selection for new k3d clusters. Each cluster publishes an API
// port plus HTTP and HTTPS on its load balancer; a second cluster on the same
// machine needs a different triple.

use std::collections::HashSet;
use std::net::TcpListener;

use crate::log_debug;

/// API, HTTP, HTTPS.
pub const DEFAULT_PORTS: [u16; 3] = [6550, 80, 443];
/// Tried when the default is taken.
pub const ALTERNATE_PORTS: [u16; 3] = [6551, 81, 444];
/// How far past the alternate port the scan goes.
const SCAN_WIDTH: u16 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClusterPorts {
    pub api: u16,
    pub http: u16,
    pub https: u16,
}

/// True when a TCP listener can bind the port on all interfaces right now.
pub fn is_port_bindable(port: u16) -> bool {
    TcpListener::bind(("0.0.0.0", port)).is_ok()
}

/// Picks the API/HTTP/HTTPS ports for a new cluster.
///
/// For each slot: the default, then the alternate, then the first port above
/// the alternate. A port qualifies when `is_free` says so and no existing
/// cluster publishes it (`used`).
pub fn find_available_ports<F>(used: &HashSet<u16>, is_free: F) -> Result<ClusterPorts, String>
where
    F: Fn(u16) -> bool,
{
    let usable = |port: u16, taken: &[u16]| !used.contains(&port) && !taken.contains(&port) && is_free(port);

    let mut chosen: Vec<u16> = Vec::with_capacity(DEFAULT_PORTS.len());
    for (index, (default, alternate)) in DEFAULT_PORTS.into_iter().zip(ALTERNATE_PORTS).enumerate() {
        let port = if usable(default, &chosen) {
            default
        } else if usable(alternate, &chosen) {
            alternate
        } else {
            let end = alternate.saturating_add(SCAN_WIDTH);
            (alternate + 1..end)
                .find(|&p| usable(p, &chosen))
                .ok_or_else(|| format!("could not find available port for index {}", index))?
        };
        log_debug!("[Ports] slot {} -> {}", index, port);
        chosen.push(port);
    }

    Ok(ClusterPorts {
        api: chosen[0],
        http: chosen[1],
        https: chosen[2],
    })
}
