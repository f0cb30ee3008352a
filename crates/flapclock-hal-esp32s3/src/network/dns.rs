use embassy_net::{
    Ipv4Address, Stack,
    udp::{PacketMetadata, UdpSocket},
};
use embassy_time::Timer;
use flapclock_core::protocol::dns::{DNS_PORT, build_reply};
use log::{debug, info, warn};

/// Answers every A query on the access point with `answer_ip` so clients
/// treat the network as a captive portal.
pub async fn dns_server_loop(ap: Stack<'_>, answer_ip: Ipv4Address) -> ! {
    let mut rx_meta = [PacketMetadata::EMPTY; 4];
    let mut rx_buffer = [0u8; 512];
    let mut tx_meta = [PacketMetadata::EMPTY; 4];
    let mut tx_buffer = [0u8; 512];
    let mut socket = UdpSocket::new(
        ap,
        &mut rx_meta,
        &mut rx_buffer,
        &mut tx_meta,
        &mut tx_buffer,
    );

    if let Err(err) = socket.bind(DNS_PORT) {
        warn!("dns: bind failed err={:?}", err);
        loop {
            Timer::after_secs(1).await;
        }
    }
    info!("dns: answering with {}", answer_ip);

    let mut query = [0u8; 512];
    let mut reply = [0u8; 512];
    loop {
        let Ok((len, remote)) = socket.recv_from(&mut query).await else {
            continue;
        };

        let Some(reply_len) = build_reply(&query[..len], answer_ip, &mut reply) else {
            continue;
        };
        if let Err(err) = socket.send_to(&reply[..reply_len], remote).await {
            warn!("dns: send failed err={:?}", err);
        } else {
            debug!("dns: answered query from {}", remote.endpoint);
        }
    }
}
