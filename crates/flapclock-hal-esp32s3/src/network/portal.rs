use core::fmt::Write as _;

use embassy_net::{Stack, tcp::TcpSocket};
use embassy_time::{Duration, Timer};
use embedded_io_async::Write as _;
use flapclock_core::{
    protocol::http::{HTTP_PORT, body, method, request_complete},
    provisioning::{FormError, ProvisioningDefaults, parse_submission, render_form},
};
use heapless::String;
use log::{info, warn};

use super::WifiLink;

const HTTP_TIMEOUT_SECS: u64 = 30;
const REQUEST_BYTES: usize = 1024;
const RESPONSE_BYTES: usize = 2048;

const SAVED_PAGE: &str = "HTTP/1.1 200 OK\r\n\
     Content-Type: text/html\r\n\
     Connection: close\r\n\
     \r\n\
     <!DOCTYPE html><html><head>\
     <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\
     <title>Splitflap setup</title></head><body>\
     <h1>Settings saved</h1>\
     <p>The clock is joining your network. You can close this page.</p>\
     </body></html>";

/// Captive-portal HTTP server on the access-point stack.
///
/// Any GET returns the setup form, so a phone's connectivity check lands on it.
/// A valid POST is queued for the clock loop.
pub async fn portal_http_loop(ap: Stack<'_>, link: &'static WifiLink) -> ! {
    let mut rx_buffer = [0u8; 1536];
    let mut tx_buffer = [0u8; RESPONSE_BYTES];
    let mut request = [0u8; REQUEST_BYTES];
    let mut response: String<RESPONSE_BYTES> = String::new();

    loop {
        let mut socket = TcpSocket::new(ap, &mut rx_buffer, &mut tx_buffer);
        socket.set_timeout(Some(Duration::from_secs(HTTP_TIMEOUT_SECS)));

        if let Err(err) = socket.accept(HTTP_PORT).await {
            warn!("portal: accept failed err={:?}", err);
            Timer::after_millis(500).await;
            continue;
        }

        let request_len = match read_request(&mut socket, &mut request).await {
            Ok(0) => {
                socket.close();
                continue;
            }
            Ok(len) => len,
            Err(err) => {
                warn!("portal: read failed err={:?}", err);
                socket.close();
                continue;
            }
        };

        response.clear();
        respond(link, &request[..request_len], &mut response);

        if let Err(err) = socket.write_all(response.as_bytes()).await {
            warn!("portal: write failed err={:?}", err);
        }
        if let Err(err) = socket.flush().await {
            warn!("portal: flush failed err={:?}", err);
        }
        socket.close();
        Timer::after_millis(100).await;
    }
}

async fn read_request(
    socket: &mut TcpSocket<'_>,
    buf: &mut [u8],
) -> Result<usize, embassy_net::tcp::Error> {
    let mut len = 0usize;
    loop {
        let read = socket.read(&mut buf[len..]).await?;
        if read == 0 {
            return Ok(len);
        }
        len += read;
        if len == buf.len() || request_complete(&buf[..len]) {
            return Ok(len);
        }
    }
}

fn respond<const N: usize>(link: &WifiLink, request: &[u8], out: &mut String<N>) {
    let text = core::str::from_utf8(request).unwrap_or("");
    let defaults = link.portal_defaults();

    if method(text) != "POST" {
        write_form(out, "200 OK", &defaults, None);
        return;
    }

    match parse_submission(body(text), &defaults.window) {
        Ok(submission) => {
            info!(
                "portal: form accepted ssid={}",
                submission.credentials.ssid.as_str()
            );
            if link.submissions.try_send(submission).is_err() {
                warn!("portal: previous submission still pending; dropped");
            }
            let _ = out.push_str(SAVED_PAGE);
        }
        Err(err) => {
            warn!("portal: form rejected: {}", err);
            write_form(out, "400 Bad Request", &defaults, Some(err));
        }
    }
}

fn write_form<const N: usize>(
    out: &mut String<N>,
    status: &str,
    defaults: &ProvisioningDefaults,
    error: Option<FormError>,
) {
    let written = write!(
        out,
        "HTTP/1.1 {}\r\nContent-Type: text/html\r\nConnection: close\r\n\r\n",
        status
    )
    .and_then(|()| render_form(out, defaults, error));
    if written.is_err() {
        warn!("portal: response truncated at {} bytes", out.len());
    }
}
