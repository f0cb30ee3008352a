//! Minimal DHCP server for the setup access point.
//!
//! Every lease is short and every client gets the access point as router
//! and DNS server, which is all a captive portal needs.

use core::net::Ipv4Addr;

use heapless::Vec;

pub const SERVER_PORT: u16 = 67;
pub const CLIENT_PORT: u16 = 68;
/// Short leases keep portal clients re-asking once the access point goes away.
pub const LEASE_SECS: u32 = 60;
pub const MAX_LEASES: usize = 8;
/// Smallest BOOTP message some clients accept.
pub const MIN_REPLY_LEN: usize = 300;

const MAGIC_COOKIE: [u8; 4] = [99, 130, 83, 99];
const OPTIONS_OFFSET: usize = 240;
const NETMASK: [u8; 4] = [255, 255, 255, 0];

const OPT_PAD: u8 = 0;
const OPT_SUBNET_MASK: u8 = 1;
const OPT_ROUTER: u8 = 3;
const OPT_DNS: u8 = 6;
const OPT_REQUESTED_IP: u8 = 50;
const OPT_LEASE_TIME: u8 = 51;
const OPT_MESSAGE_TYPE: u8 = 53;
const OPT_SERVER_ID: u8 = 54;
const OPT_END: u8 = 255;

pub const DHCP_DISCOVER: u8 = 1;
pub const DHCP_OFFER: u8 = 2;
pub const DHCP_REQUEST: u8 = 3;
pub const DHCP_DECLINE: u8 = 4;
pub const DHCP_ACK: u8 = 5;
pub const DHCP_NAK: u8 = 6;
pub const DHCP_RELEASE: u8 = 7;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DhcpRequest {
    pub message_type: u8,
    pub transaction_id: [u8; 4],
    pub flags: [u8; 2],
    pub client_mac: [u8; 6],
    /// Option 50, or `ciaddr` for a renewing client.
    pub requested_ip: Option<Ipv4Addr>,
    pub server_id: Option<Ipv4Addr>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DhcpReply {
    Offer(Ipv4Addr),
    Ack(Ipv4Addr),
    Nak,
}

impl DhcpReply {
    pub fn message_type(self) -> u8 {
        match self {
            Self::Offer(_) => DHCP_OFFER,
            Self::Ack(_) => DHCP_ACK,
            Self::Nak => DHCP_NAK,
        }
    }

    fn address(self) -> Ipv4Addr {
        match self {
            Self::Offer(ip) | Self::Ack(ip) => ip,
            Self::Nak => Ipv4Addr::UNSPECIFIED,
        }
    }
}

/// Parses a BOOTREQUEST from an Ethernet-style client.
pub fn parse_request(frame: &[u8]) -> Option<DhcpRequest> {
    if frame.len() < OPTIONS_OFFSET || frame[0] != 1 || frame[1] != 1 || frame[2] != 6 {
        return None;
    }
    if frame[236..OPTIONS_OFFSET] != MAGIC_COOKIE {
        return None;
    }

    let mut message_type = None;
    let mut requested_ip = None;
    let mut server_id = None;

    let mut idx = OPTIONS_OFFSET;
    while idx < frame.len() {
        let code = frame[idx];
        idx += 1;
        match code {
            OPT_PAD => continue,
            OPT_END => break,
            _ => {}
        }

        let len = *frame.get(idx)? as usize;
        idx += 1;
        let data = frame.get(idx..idx + len)?;
        idx += len;

        match (code, data) {
            (OPT_MESSAGE_TYPE, [kind]) => message_type = Some(*kind),
            (OPT_REQUESTED_IP, [a, b, c, d]) => requested_ip = Some(Ipv4Addr::new(*a, *b, *c, *d)),
            (OPT_SERVER_ID, [a, b, c, d]) => server_id = Some(Ipv4Addr::new(*a, *b, *c, *d)),
            _ => {}
        }
    }

    let mut client_mac = [0u8; 6];
    client_mac.copy_from_slice(&frame[28..34]);
    let client_ip = Ipv4Addr::new(frame[12], frame[13], frame[14], frame[15]);

    Some(DhcpRequest {
        message_type: message_type?,
        transaction_id: [frame[4], frame[5], frame[6], frame[7]],
        flags: [frame[10], frame[11]],
        client_mac,
        requested_ip: requested_ip.or((!client_ip.is_unspecified()).then_some(client_ip)),
        server_id,
    })
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct Lease {
    mac: [u8; 6],
    ip: Ipv4Addr,
    expires_at_ms: u64,
}

/// Address pool of the access-point subnet.
#[derive(Debug)]
pub struct LeasePool {
    server_ip: Ipv4Addr,
    first: u32,
    size: u32,
    leases: Vec<Lease, MAX_LEASES>,
}

impl LeasePool {
    /// At most [`MAX_LEASES`] addresses starting at `pool_start`.
    pub fn new(server_ip: Ipv4Addr, pool_start: Ipv4Addr, pool_size: u8) -> Self {
        Self {
            server_ip,
            first: u32::from(pool_start),
            size: u32::from(pool_size).min(MAX_LEASES as u32),
            leases: Vec::new(),
        }
    }

    /// Decides the answer to `request`. `None` means stay silent: the
    /// message needs no answer, belongs to another server or the pool is
    /// exhausted.
    pub fn handle(&mut self, request: &DhcpRequest, now_ms: u64) -> Option<DhcpReply> {
        self.leases.retain(|lease| lease.expires_at_ms > now_ms);
        let mac = request.client_mac;
        let expires_at_ms = now_ms.saturating_add(u64::from(LEASE_SECS) * 1_000);

        match request.message_type {
            DHCP_DISCOVER => {
                let wanted = request.requested_ip.filter(|ip| self.available(*ip, mac));
                let ip = wanted.or_else(|| self.current(mac)).or_else(|| self.free_address(mac))?;
                self.bind(mac, ip, expires_at_ms).map(DhcpReply::Offer)
            }
            DHCP_REQUEST => {
                if request.server_id.is_some_and(|id| id != self.server_ip) {
                    // The client picked another server's offer.
                    self.release(mac);
                    return None;
                }
                match request.requested_ip {
                    Some(ip) if self.available(ip, mac) => {
                        self.bind(mac, ip, expires_at_ms).map(DhcpReply::Ack)
                    }
                    Some(_) => Some(DhcpReply::Nak),
                    None => {
                        let ip = self.current(mac).or_else(|| self.free_address(mac))?;
                        self.bind(mac, ip, expires_at_ms).map(DhcpReply::Ack)
                    }
                }
            }
            DHCP_DECLINE | DHCP_RELEASE => {
                self.release(mac);
                None
            }
            _ => None,
        }
    }

    pub fn lease_count(&self) -> usize {
        self.leases.len()
    }

    fn in_pool(&self, ip: Ipv4Addr) -> bool {
        let value = u32::from(ip);
        value >= self.first && value - self.first < self.size
    }

    fn available(&self, ip: Ipv4Addr, mac: [u8; 6]) -> bool {
        self.in_pool(ip)
            && self
                .leases
                .iter()
                .all(|lease| lease.mac == mac || lease.ip != ip)
    }

    fn current(&self, mac: [u8; 6]) -> Option<Ipv4Addr> {
        self.leases
            .iter()
            .find(|lease| lease.mac == mac)
            .map(|lease| lease.ip)
    }

    fn free_address(&self, mac: [u8; 6]) -> Option<Ipv4Addr> {
        (0..self.size)
            .map(|offset| Ipv4Addr::from(self.first + offset))
            .find(|ip| self.available(*ip, mac))
    }

    fn bind(&mut self, mac: [u8; 6], ip: Ipv4Addr, expires_at_ms: u64) -> Option<Ipv4Addr> {
        if let Some(lease) = self.leases.iter_mut().find(|lease| lease.mac == mac) {
            lease.ip = ip;
            lease.expires_at_ms = expires_at_ms;
            return Some(ip);
        }
        self.leases
            .push(Lease {
                mac,
                ip,
                expires_at_ms,
            })
            .ok()?;
        Some(ip)
    }

    fn release(&mut self, mac: [u8; 6]) {
        self.leases.retain(|lease| lease.mac != mac);
    }
}

/// Writes the BOOTREPLY for `reply` into `out` and returns its length.
/// `out` must hold at least 548 bytes.
pub fn build_reply(
    out: &mut [u8],
    request: &DhcpRequest,
    reply: DhcpReply,
    server_ip: Ipv4Addr,
) -> usize {
    out.fill(0);
    out[0] = 2; // BOOTREPLY
    out[1] = 1;
    out[2] = 6;
    out[4..8].copy_from_slice(&request.transaction_id);
    out[10..12].copy_from_slice(&request.flags);
    out[16..20].copy_from_slice(&reply.address().octets());
    if reply != DhcpReply::Nak {
        out[20..24].copy_from_slice(&server_ip.octets());
    }
    out[28..34].copy_from_slice(&request.client_mac);
    out[236..OPTIONS_OFFSET].copy_from_slice(&MAGIC_COOKIE);

    let server = server_ip.octets();
    let message_type = [reply.message_type()];
    let lease = LEASE_SECS.to_be_bytes();
    let options: [(u8, &[u8]); 6] = [
        (OPT_MESSAGE_TYPE, &message_type),
        (OPT_SERVER_ID, &server),
        (OPT_LEASE_TIME, &lease),
        (OPT_SUBNET_MASK, &NETMASK),
        (OPT_ROUTER, &server),
        (OPT_DNS, &server),
    ];
    // A NAK carries no lease parameters.
    let option_count = if reply == DhcpReply::Nak { 2 } else { options.len() };

    let mut idx = OPTIONS_OFFSET;
    for (code, payload) in &options[..option_count] {
        out[idx] = *code;
        out[idx + 1] = payload.len() as u8;
        out[idx + 2..idx + 2 + payload.len()].copy_from_slice(payload);
        idx += 2 + payload.len();
    }
    out[idx] = OPT_END;
    (idx + 1).max(MIN_REPLY_LEN)
}

#[cfg(test)]
mod tests;
