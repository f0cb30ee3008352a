use std::vec::Vec;

use super::*;

const SERVER: Ipv4Addr = Ipv4Addr::new(192, 168, 4, 1);
const POOL_START: Ipv4Addr = Ipv4Addr::new(192, 168, 4, 10);
const PHONE: [u8; 6] = [0x02, 0x11, 0x22, 0x33, 0x44, 0x55];
const LAPTOP: [u8; 6] = [0x02, 0xAA, 0xBB, 0xCC, 0xDD, 0xEE];

/// BOOTREQUEST with the message type option followed by raw `options`.
fn frame(message_type: u8, mac: [u8; 6], options: &[u8]) -> Vec<u8> {
    let mut frame = std::vec![0u8; OPTIONS_OFFSET];
    frame[0] = 1;
    frame[1] = 1;
    frame[2] = 6;
    frame[4..8].copy_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
    frame[10] = 0x80;
    frame[28..34].copy_from_slice(&mac);
    frame[236..240].copy_from_slice(&MAGIC_COOKIE);
    frame.extend_from_slice(&[OPT_MESSAGE_TYPE, 1, message_type]);
    frame.extend_from_slice(options);
    frame.push(OPT_END);
    frame
}

fn request(message_type: u8, mac: [u8; 6], requested: Option<Ipv4Addr>) -> DhcpRequest {
    DhcpRequest {
        message_type,
        transaction_id: [1, 2, 3, 4],
        flags: [0, 0],
        client_mac: mac,
        requested_ip: requested,
        server_id: None,
    }
}

fn pool() -> LeasePool {
    LeasePool::new(SERVER, POOL_START, 8)
}

fn ip(last: u8) -> Ipv4Addr {
    Ipv4Addr::new(192, 168, 4, last)
}

#[test]
fn parses_discover_with_requested_address() {
    let frame = frame(
        DHCP_DISCOVER,
        PHONE,
        &[
            OPT_PAD, //
            OPT_REQUESTED_IP, 4, 192, 168, 4, 12, //
            12, 5, b'p', b'h', b'o', b'n', b'e',
        ],
    );

    let parsed = parse_request(&frame).unwrap();

    assert_eq!(parsed.message_type, DHCP_DISCOVER);
    assert_eq!(parsed.transaction_id, [0xDE, 0xAD, 0xBE, 0xEF]);
    assert_eq!(parsed.flags, [0x80, 0]);
    assert_eq!(parsed.client_mac, PHONE);
    assert_eq!(parsed.requested_ip, Some(ip(12)));
    assert_eq!(parsed.server_id, None);
}

#[test]
fn renewing_client_address_stands_in_for_the_requested_one() {
    let mut frame = frame(DHCP_REQUEST, PHONE, &[OPT_SERVER_ID, 4, 192, 168, 4, 1]);
    frame[12..16].copy_from_slice(&[192, 168, 4, 11]);

    let parsed = parse_request(&frame).unwrap();

    assert_eq!(parsed.requested_ip, Some(ip(11)));
    assert_eq!(parsed.server_id, Some(SERVER));
}

#[test]
fn rejects_frames_that_are_not_client_requests() {
    let good = frame(DHCP_DISCOVER, PHONE, &[]);

    let mut reply = good.clone();
    reply[0] = 2;
    assert_eq!(parse_request(&reply), None);

    let mut no_cookie = good.clone();
    no_cookie[236] = 0;
    assert_eq!(parse_request(&no_cookie), None);

    assert_eq!(parse_request(&good[..200]), None);

    let mut untyped = good.clone();
    untyped.truncate(OPTIONS_OFFSET);
    untyped.push(OPT_END);
    assert_eq!(parse_request(&untyped), None);

    let mut overrun = frame(DHCP_DISCOVER, PHONE, &[]);
    overrun.truncate(overrun.len() - 1);
    overrun.extend_from_slice(&[OPT_REQUESTED_IP, 4, 192]);
    assert_eq!(parse_request(&overrun), None);
}

#[test]
fn discover_then_request_offers_and_acknowledges_the_first_free_address() {
    let mut pool = pool();

    let offer = pool.handle(&request(DHCP_DISCOVER, PHONE, None), 0);
    assert_eq!(offer, Some(DhcpReply::Offer(POOL_START)));

    let ack = pool.handle(&request(DHCP_REQUEST, PHONE, Some(POOL_START)), 10);
    assert_eq!(ack, Some(DhcpReply::Ack(POOL_START)));
    assert_eq!(pool.lease_count(), 1);

    let other = pool.handle(&request(DHCP_DISCOVER, LAPTOP, None), 20);
    assert_eq!(other, Some(DhcpReply::Offer(ip(11))));
}

#[test]
fn discover_honours_a_free_requested_address() {
    let mut pool = pool();

    let offer = pool.handle(&request(DHCP_DISCOVER, PHONE, Some(ip(14))), 0);

    assert_eq!(offer, Some(DhcpReply::Offer(ip(14))));
}

#[test]
fn request_outside_the_pool_is_refused() {
    let mut pool = pool();

    let reply = pool.handle(&request(DHCP_REQUEST, PHONE, Some(ip(200))), 0);

    assert_eq!(reply, Some(DhcpReply::Nak));
    assert_eq!(pool.lease_count(), 0);
}

#[test]
fn request_for_another_clients_address_is_refused() {
    let mut pool = pool();
    pool.handle(&request(DHCP_REQUEST, PHONE, Some(ip(10))), 0);

    let reply = pool.handle(&request(DHCP_REQUEST, LAPTOP, Some(ip(10))), 5);

    assert_eq!(reply, Some(DhcpReply::Nak));
    assert_eq!(pool.lease_count(), 1);
}

#[test]
fn request_without_an_address_gets_its_current_lease() {
    let mut pool = pool();
    pool.handle(&request(DHCP_REQUEST, PHONE, Some(ip(13))), 0);

    let reply = pool.handle(&request(DHCP_REQUEST, PHONE, None), 1_000);

    assert_eq!(reply, Some(DhcpReply::Ack(ip(13))));
    assert_eq!(pool.lease_count(), 1);
}

#[test]
fn request_for_another_server_drops_the_offer() {
    let mut pool = pool();
    pool.handle(&request(DHCP_DISCOVER, PHONE, None), 0);

    let reply = pool.handle(
        &DhcpRequest {
            server_id: Some(Ipv4Addr::new(10, 0, 0, 1)),
            ..request(DHCP_REQUEST, PHONE, Some(POOL_START))
        },
        10,
    );

    assert_eq!(reply, None);
    assert_eq!(pool.lease_count(), 0);
}

#[test]
fn release_and_decline_free_the_address() {
    let mut pool = pool();
    pool.handle(&request(DHCP_REQUEST, PHONE, Some(ip(10))), 0);
    pool.handle(&request(DHCP_REQUEST, LAPTOP, Some(ip(11))), 0);

    assert_eq!(pool.handle(&request(DHCP_RELEASE, PHONE, None), 1), None);
    assert_eq!(pool.handle(&request(DHCP_DECLINE, LAPTOP, None), 1), None);

    assert_eq!(pool.lease_count(), 0);
}

#[test]
fn exhausted_pool_stays_silent_until_a_lease_expires() {
    let mut pool = LeasePool::new(SERVER, POOL_START, 2);
    pool.handle(&request(DHCP_DISCOVER, PHONE, None), 0);
    pool.handle(&request(DHCP_DISCOVER, LAPTOP, None), 30_000);

    let third = [0x02, 0, 0, 0, 0, 0x03];
    assert_eq!(pool.handle(&request(DHCP_DISCOVER, third, None), 59_000), None);

    // The first lease ran out at 60 s.
    let reply = pool.handle(&request(DHCP_DISCOVER, third, None), 60_000);
    assert_eq!(reply, Some(DhcpReply::Offer(POOL_START)));
}

#[test]
fn pool_is_capped_at_the_lease_table() {
    let mut pool = LeasePool::new(SERVER, POOL_START, 200);
    for n in 0..MAX_LEASES as u8 {
        let mac = [0x02, 0, 0, 0, 0, n];
        assert!(pool.handle(&request(DHCP_DISCOVER, mac, None), 0).is_some());
    }

    let late = [0x02, 0, 0, 0, 1, 0];
    assert_eq!(pool.handle(&request(DHCP_DISCOVER, late, None), 0), None);
    assert_eq!(
        pool.handle(&request(DHCP_REQUEST, late, Some(ip(18))), 0),
        Some(DhcpReply::Nak)
    );
}

#[test]
fn ack_carries_the_lease_parameters() {
    let request = request(DHCP_REQUEST, PHONE, Some(POOL_START));
    let mut out = [0xFFu8; 548];

    let len = build_reply(&mut out, &request, DhcpReply::Ack(POOL_START), SERVER);

    assert_eq!(len, MIN_REPLY_LEN);
    assert_eq!(out[0], 2);
    assert_eq!(&out[4..8], &[1, 2, 3, 4]);
    assert_eq!(&out[16..20], &[192, 168, 4, 10]);
    assert_eq!(&out[20..24], &[192, 168, 4, 1]);
    assert_eq!(&out[28..34], &PHONE);
    assert_eq!(&out[236..240], &MAGIC_COOKIE);
    assert_eq!(
        &out[240..273],
        &[
            53, 1, 5, //
            54, 4, 192, 168, 4, 1, //
            51, 4, 0, 0, 0, 60, //
            1, 4, 255, 255, 255, 0, //
            3, 4, 192, 168, 4, 1, //
            6, 4, 192, 168, 4, 1,
        ][..]
    );
    assert_eq!(out[273], OPT_END);
    assert!(out[274..len].iter().all(|byte| *byte == 0));
}

#[test]
fn nak_offers_no_address() {
    let request = request(DHCP_REQUEST, PHONE, Some(ip(200)));
    let mut out = [0u8; 548];

    let len = build_reply(&mut out, &request, DhcpReply::Nak, SERVER);

    assert_eq!(len, MIN_REPLY_LEN);
    assert_eq!(&out[16..24], &[0; 8]);
    assert_eq!(&out[240..249], &[53, 1, 6, 54, 4, 192, 168, 4, 1]);
    assert_eq!(out[249], OPT_END);
}
