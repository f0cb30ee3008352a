//! Just enough HTTP/1.1 request handling for the setup portal.

pub const HTTP_PORT: u16 = 80;

const HEADER_END: &[u8] = b"\r\n\r\n";

/// Headers received and, for a body-carrying request, all of the body.
pub fn request_complete(request: &[u8]) -> bool {
    let Some(header_end) = find(request, HEADER_END) else {
        return false;
    };
    let headers = core::str::from_utf8(&request[..header_end]).unwrap_or("");
    let body_len = content_length(headers).unwrap_or(0);
    request.len() >= header_end + HEADER_END.len() + body_len
}

/// Value of the `Content-Length` header, matched case-insensitively.
pub fn content_length(headers: &str) -> Option<usize> {
    headers.lines().find_map(|line| {
        let (name, value) = line.split_once(':')?;
        if name.trim().eq_ignore_ascii_case("content-length") {
            value.trim().parse().ok()
        } else {
            None
        }
    })
}

pub fn method(request: &str) -> &str {
    request.split_whitespace().next().unwrap_or("")
}

/// Everything after the blank line; empty when there is none.
pub fn body(request: &str) -> &str {
    request.split_once("\r\n\r\n").map_or("", |(_, body)| body)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    const POST: &str = "POST / HTTP/1.1\r\n\
        Host: 192.168.4.1\r\n\
        content-LENGTH: 17\r\n\
        \r\n\
        ssid=cabin&pass=x";

    #[test]
    fn waits_for_the_end_of_the_headers() {
        assert!(!request_complete(b""));
        assert!(!request_complete(b"GET / HTTP/1.1\r\nHost: 192.168.4.1\r\n"));
        assert!(request_complete(b"GET / HTTP/1.1\r\nHost: 192.168.4.1\r\n\r\n"));
    }

    #[test]
    fn waits_for_the_whole_body() {
        let bytes = POST.as_bytes();

        assert!(!request_complete(&bytes[..bytes.len() - 5]));
        assert!(request_complete(bytes));
    }

    #[test]
    fn reads_content_length_in_any_case() {
        assert_eq!(content_length("Host: x\r\ncontent-LENGTH: 17"), Some(17));
        assert_eq!(content_length("Content-Length:  42 "), Some(42));
        assert_eq!(content_length("Host: x"), None);
        assert_eq!(content_length("Content-Length: lots"), None);
    }

    #[test]
    fn splits_method_and_body() {
        assert_eq!(method(POST), "POST");
        assert_eq!(body(POST), "ssid=cabin&pass=x");
        assert_eq!(method(""), "");
        assert_eq!(body("GET / HTTP/1.1\r\n"), "");
    }
}
