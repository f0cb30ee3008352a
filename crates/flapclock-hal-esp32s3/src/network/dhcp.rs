use embassy_net::{
    Ipv4Address, Stack,
    udp::{PacketMetadata, UdpSocket},
};
use embassy_time::{Instant, Timer};
use flapclock_core::protocol::dhcp::{
    CLIENT_PORT, LeasePool, SERVER_PORT, build_reply, parse_request,
};
use log::{debug, info, warn};

/// Hands out addresses on the access-point subnet, advertising the access
/// point itself as router and DNS server.
pub async fn dhcp_server_loop(
    ap: Stack<'_>,
    server_ip: Ipv4Address,
    pool_start: Ipv4Address,
    pool_size: u8,
) -> ! {
    let mut rx_meta = [PacketMetadata::EMPTY; 4];
    let mut rx_buffer = [0u8; 768];
    let mut tx_meta = [PacketMetadata::EMPTY; 4];
    let mut tx_buffer = [0u8; 768];
    let mut socket = UdpSocket::new(
        ap,
        &mut rx_meta,
        &mut rx_buffer,
        &mut tx_meta,
        &mut tx_buffer,
    );

    if let Err(err) = socket.bind(SERVER_PORT) {
        warn!("dhcp: bind failed err={:?}", err);
        loop {
            Timer::after_secs(1).await;
        }
    }
    info!("dhcp: serving {} addresses from {}", pool_size, pool_start);

    let [a, b, c, _] = server_ip.octets();
    let broadcast = Ipv4Address::new(a, b, c, 255);
    let mut pool = LeasePool::new(server_ip, pool_start, pool_size);
    let mut frame = [0u8; 768];
    let mut reply = [0u8; 548];

    loop {
        let len = match socket.recv_from(&mut frame).await {
            Ok((len, _)) => len,
            Err(err) => {
                warn!("dhcp: recv failed err={:?}", err);
                continue;
            }
        };
        let Some(request) = parse_request(&frame[..len]) else {
            continue;
        };

        let Some(answer) = pool.handle(&request, Instant::now().as_millis()) else {
            debug!("dhcp: no answer for type {}", request.message_type);
            continue;
        };

        let reply_len = build_reply(&mut reply, &request, answer, server_ip);
        match socket
            .send_to(&reply[..reply_len], (broadcast, CLIENT_PORT))
            .await
        {
            Ok(()) => debug!("dhcp: sent {:?} leases={}", answer, pool.lease_count()),
            Err(err) => warn!("dhcp: send failed err={:?}", err),
        }
    }
}
