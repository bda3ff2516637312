use get_if_addrs::get_if_addrs;
use std::collections::BTreeMap;
use std::net::UdpSocket;

/// Devine l'adresse IP locale de la machine.
///
/// A UDP socket is "connected" to a public address; no packet is sent, the
/// operating system only picks the interface it would route through. That
/// interface's address is the one a speaker on the same LAN can reach.
///
/// Returns `"127.0.0.1"` when anything fails.
///
/// # Examples
///
/// ```
/// let ip = floppyutils::guess_local_ip();
/// assert!(!ip.is_empty());
/// ```
pub fn guess_local_ip() -> String {
    match UdpSocket::bind("0.0.0.0:0") {
        Ok(socket) => {
            if socket.connect("8.8.8.8:80").is_ok() {
                if let Ok(local_addr) = socket.local_addr() {
                    return local_addr.ip().to_string();
                }
            }
            "127.0.0.1".to_string()
        }
        Err(_) => "127.0.0.1".to_string(),
    }
}

/// Liste toutes les adresses IPv4 non-loopback, groupées par interface.
///
/// The binary logs them at startup so the operator knows where the API
/// answers. Interfaces are sorted by name.
pub fn list_ipv4_addresses() -> BTreeMap<String, Vec<String>> {
    let mut result: BTreeMap<String, Vec<String>> = BTreeMap::new();

    if let Ok(interfaces) = get_if_addrs() {
        for iface in interfaces {
            let ip = iface.ip();
            if ip.is_loopback() || !ip.is_ipv4() {
                continue;
            }
            let addresses = result.entry(iface.name).or_default();
            let ip = ip.to_string();
            if !addresses.contains(&ip) {
                addresses.push(ip);
            }
        }
    }

    result
}
