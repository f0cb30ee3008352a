//! Catch-all DNS responder packets.

use core::net::Ipv4Addr;

pub const DNS_PORT: u16 = 53;

const HEADER_LEN: usize = 12;
const ANSWER_LEN: usize = 16;
const ANSWER_TTL_SECS: u32 = 60;

/// Echoes the header and first question, then appends one A record pointing
/// at `answer_ip`. Additional records in the query (EDNS) are dropped.
///
/// Returns `None` for responses, malformed queries and when `out` is too
/// small.
pub fn build_reply(query: &[u8], answer_ip: Ipv4Addr, out: &mut [u8]) -> Option<usize> {
    if query.len() < HEADER_LEN || query[2] & 0x80 != 0 {
        return None;
    }
    let question_count = u16::from_be_bytes([query[4], query[5]]);
    if question_count == 0 {
        return None;
    }

    let mut pos = HEADER_LEN;
    loop {
        let label = *query.get(pos)? as usize;
        pos += 1;
        if label == 0 {
            break;
        }
        if label & 0xC0 != 0 {
            return None;
        }
        pos += label;
    }
    let question_end = pos + 4;
    if question_end > query.len() || question_end + ANSWER_LEN > out.len() {
        return None;
    }

    out[..question_end].copy_from_slice(&query[..question_end]);
    // QR=1 AA=1, keep opcode and RD; RA=0, RCODE=0.
    out[2] = 0x84 | (query[2] & 0x79);
    out[3] = 0x00;
    out[4..6].copy_from_slice(&1u16.to_be_bytes());
    out[6..8].copy_from_slice(&1u16.to_be_bytes());
    out[8..12].fill(0);

    let answer = &mut out[question_end..question_end + ANSWER_LEN];
    answer[0..2].copy_from_slice(&[0xC0, 0x0C]);
    answer[2..4].copy_from_slice(&1u16.to_be_bytes());
    answer[4..6].copy_from_slice(&1u16.to_be_bytes());
    answer[6..10].copy_from_slice(&ANSWER_TTL_SECS.to_be_bytes());
    answer[10..12].copy_from_slice(&4u16.to_be_bytes());
    answer[12..16].copy_from_slice(&answer_ip.octets());

    Some(question_end + ANSWER_LEN)
}

#[cfg(test)]
mod tests {
    use std::vec::Vec;

    use super::*;

    const PORTAL: Ipv4Addr = Ipv4Addr::new(192, 168, 4, 1);

    /// Standard query for `name` with type A, class IN.
    fn query(id: u16, name: &str, extra: &[u8]) -> Vec<u8> {
        let mut packet = Vec::new();
        packet.extend_from_slice(&id.to_be_bytes());
        packet.extend_from_slice(&[0x01, 0x00, 0, 1, 0, 0, 0, 0, 0, 0]);
        for label in name.split('.') {
            packet.push(label.len() as u8);
            packet.extend_from_slice(label.as_bytes());
        }
        packet.push(0);
        packet.extend_from_slice(&[0, 1, 0, 1]);
        packet.extend_from_slice(extra);
        packet
    }

    #[test]
    fn every_a_query_resolves_to_the_portal() {
        let query = query(0xBEEF, "connectivitycheck.gstatic.com", &[]);
        let mut out = [0u8; 512];

        let len = build_reply(&query, PORTAL, &mut out).unwrap();

        assert_eq!(len, query.len() + 16);
        assert_eq!(&out[0..2], &[0xBE, 0xEF]);
        assert_eq!(out[2], 0x85);
        assert_eq!(out[3], 0);
        assert_eq!(&out[4..8], &[0, 1, 0, 1]);
        assert_eq!(&out[12..query.len()], &query[12..]);
        let answer = &out[query.len()..len];
        assert_eq!(&answer[..12], &[0xC0, 0x0C, 0, 1, 0, 1, 0, 0, 0, 60, 0, 4]);
        assert_eq!(&answer[12..], &[192, 168, 4, 1]);
    }

    #[test]
    fn trailing_records_are_dropped() {
        let query = query(7, "example.com", &[0, 0, 41, 16, 0, 0, 0, 0, 0, 0, 0]);
        let mut out = [0u8; 512];

        let len = build_reply(&query, PORTAL, &mut out).unwrap();

        assert_eq!(len, query.len() - 11 + 16);
        assert_eq!(&out[10..12], &[0, 0]);
    }

    #[test]
    fn responses_and_empty_questions_are_ignored() {
        let mut out = [0u8; 512];

        let mut response = query(1, "example.com", &[]);
        response[2] |= 0x80;
        assert_eq!(build_reply(&response, PORTAL, &mut out), None);

        let mut no_question = query(1, "example.com", &[]);
        no_question[5] = 0;
        assert_eq!(build_reply(&no_question, PORTAL, &mut out), None);
    }

    #[test]
    fn malformed_queries_are_rejected() {
        let mut out = [0u8; 512];

        let mut compressed = query(1, "example.com", &[]);
        compressed[12] = 0xC0;
        assert_eq!(build_reply(&compressed, PORTAL, &mut out), None);

        let full = query(1, "example.com", &[]);
        assert_eq!(build_reply(&full[..full.len() - 2], PORTAL, &mut out), None);
        assert_eq!(build_reply(&full[..8], PORTAL, &mut out), None);
    }

    #[test]
    fn reply_must_fit_the_buffer() {
        let query = query(1, "example.com", &[]);
        let mut out = [0u8; 32];

        assert_eq!(build_reply(&query, PORTAL, &mut out), None);
    }
}
