//! SNTP (RFC 4330) client packets.

pub const NTP_PORT: u16 = 123;
pub const PACKET_LEN: usize = 48;

const NTP_TO_UNIX_SECS: i64 = 2_208_988_800;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NtpReplyError {
    ShortReply,
    /// Not a server reply, a kiss-o'-death or an unset clock.
    Unsynchronized,
}

pub fn client_request() -> [u8; PACKET_LEN] {
    let mut request = [0u8; PACKET_LEN];
    request[0] = 0x1B; // LI=0, VN=3, Mode=3 (client)
    request
}

/// Transmit timestamp of a server reply as Unix seconds.
pub fn parse_reply(reply: &[u8]) -> Result<i64, NtpReplyError> {
    if reply.len() < PACKET_LEN {
        return Err(NtpReplyError::ShortReply);
    }
    // Mode 4 (server); stratum 0 is a kiss-o'-death.
    if reply[0] & 0x07 != 4 || reply[1] == 0 {
        return Err(NtpReplyError::Unsynchronized);
    }

    let ntp_seconds = u32::from_be_bytes([reply[40], reply[41], reply[42], reply[43]]);
    if ntp_seconds == 0 {
        return Err(NtpReplyError::Unsynchronized);
    }
    // Values with the top bit clear belong to era 1 (from 2036).
    let era_offset = if ntp_seconds & 0x8000_0000 == 0 {
        1i64 << 32
    } else {
        0
    };
    Ok(i64::from(ntp_seconds) + era_offset - NTP_TO_UNIX_SECS)
}
