//! Setup-portal form codec.
//!
//! The portal collects WiFi credentials plus the three schedule fields
//! (`sleep_time`, `wake_time`, `date_display`). Transport lives in the board
//! crate; this module only turns a urlencoded body into validated settings
//! and renders the form.

use core::fmt::{self, Write};

use heapless::{String, Vec};

use crate::schedule::{ScheduleError, ScheduleWindow};
use crate::settings::{PASSWORD_MAX_BYTES, SSID_MAX_BYTES, WifiCredentials};

pub const PORTAL_SSID: &str = "Splitflap";
pub const PORTAL_PASSWORD: &str = "splitflap";

const FIELD_VALUE_BYTES: usize = 96;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FormError {
    MissingSsid,
    SsidTooLong,
    PasswordTooLong,
    InvalidNumber(&'static str),
    Schedule(ScheduleError),
    Malformed,
}

impl From<ScheduleError> for FormError {
    fn from(value: ScheduleError) -> Self {
        Self::Schedule(value)
    }
}

impl fmt::Display for FormError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSsid => f.write_str("network name is required"),
            Self::SsidTooLong => f.write_str("network name is too long"),
            Self::PasswordTooLong => f.write_str("password is too long"),
            Self::InvalidNumber(field) => write!(f, "{field} must be a number"),
            Self::Schedule(ScheduleError::SleepStartHour(h)) => {
                write!(f, "sleep hour {h} is not between 0 and 23")
            }
            Self::Schedule(ScheduleError::SleepEndHour(h)) => {
                write!(f, "wake hour {h} is not between 0 and 23")
            }
            Self::Schedule(ScheduleError::DateInterval(m)) => {
                write!(f, "date interval {m} is not between 0 and 59")
            }
            Self::Malformed => f.write_str("request could not be decoded"),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProvisioningSubmission {
    pub credentials: WifiCredentials,
    pub window: ScheduleWindow,
}

/// Values pre-filled into the form.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ProvisioningDefaults {
    pub ssid: String<SSID_MAX_BYTES>,
    pub window: ScheduleWindow,
}

/// Parses an `application/x-www-form-urlencoded` body.
///
/// Schedule fields left out fall back to `defaults`. Unknown keys are ignored.
pub fn parse_submission(
    body: &str,
    defaults: &ScheduleWindow,
) -> Result<ProvisioningSubmission, FormError> {
    let mut ssid: Option<String<SSID_MAX_BYTES>> = None;
    let mut password = String::<PASSWORD_MAX_BYTES>::new();
    let mut sleep_start = defaults.sleep_start_hour;
    let mut sleep_end = defaults.sleep_end_hour;
    let mut date_interval = defaults.date_display_interval_minutes;

    for pair in body.trim().split('&').filter(|pair| !pair.is_empty()) {
        let (key, raw) = pair.split_once('=').unwrap_or((pair, ""));
        let value = url_decode(raw)?;
        let value = value.as_str();

        match key {
            "ssid" => {
                let mut parsed = String::new();
                parsed.push_str(value).map_err(|_| FormError::SsidTooLong)?;
                ssid = Some(parsed);
            }
            "password" => {
                password.clear();
                password
                    .push_str(value)
                    .map_err(|_| FormError::PasswordTooLong)?;
            }
            "sleep_time" => sleep_start = parse_number(value, "sleep_time", sleep_start)?,
            "wake_time" => sleep_end = parse_number(value, "wake_time", sleep_end)?,
            "date_display" => date_interval = parse_number(value, "date_display", date_interval)?,
            _ => {}
        }
    }

    let ssid = ssid
        .filter(|ssid| !ssid.trim().is_empty())
        .ok_or(FormError::MissingSsid)?;
    let window = ScheduleWindow::validated(sleep_start, sleep_end, date_interval)?;

    Ok(ProvisioningSubmission {
        credentials: WifiCredentials { ssid, password },
        window,
    })
}

/// Writes the setup form as a bare HTML document.
pub fn render_form<W: Write>(
    out: &mut W,
    defaults: &ProvisioningDefaults,
    error: Option<FormError>,
) -> fmt::Result {
    out.write_str(
        "<!DOCTYPE html><html><head>\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\
         <title>Splitflap setup</title></head><body><h1>Splitflap setup</h1>",
    )?;
    if let Some(error) = error {
        write!(out, "<p><b>{error}</b></p>")?;
    }

    out.write_str("<form method=\"POST\" action=\"/\"><label>Network <input name=\"ssid\" value=\"")?;
    write_escaped(out, defaults.ssid.as_str())?;
    out.write_str(
        "\" required></label><br><label>Password \
         <input name=\"password\" type=\"password\"></label><br>",
    )?;
    write!(
        out,
        "<label>Sleep hour <input name=\"sleep_time\" value=\"{:02}\"></label><br>\
         <label>Wake hour <input name=\"wake_time\" value=\"{:02}\"></label><br>\
         <label>Date every N minutes (0 = off) \
         <input name=\"date_display\" value=\"{}\"></label><br>",
        defaults.window.sleep_start_hour,
        defaults.window.sleep_end_hour,
        defaults.window.date_display_interval_minutes,
    )?;
    out.write_str("<button type=\"submit\">Save</button></form></body></html>")
}

fn parse_number(value: &str, field: &'static str, fallback: u8) -> Result<u8, FormError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(fallback);
    }
    value.parse().map_err(|_| FormError::InvalidNumber(field))
}

fn url_decode(raw: &str) -> Result<String<FIELD_VALUE_BYTES>, FormError> {
    let mut bytes: Vec<u8, FIELD_VALUE_BYTES> = Vec::new();
    let mut input = raw.bytes();

    while let Some(byte) = input.next() {
        let decoded = match byte {
            b'+' => b' ',
            b'%' => {
                let hi = input.next().and_then(hex_nibble).ok_or(FormError::Malformed)?;
                let lo = input.next().and_then(hex_nibble).ok_or(FormError::Malformed)?;
                (hi << 4) | lo
            }
            other => other,
        };
        bytes.push(decoded).map_err(|_| FormError::Malformed)?;
    }

    let text = core::str::from_utf8(&bytes).map_err(|_| FormError::Malformed)?;
    let mut out = String::new();
    out.push_str(text).map_err(|_| FormError::Malformed)?;
    Ok(out)
}

fn hex_nibble(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

fn write_escaped<W: Write>(out: &mut W, value: &str) -> fmt::Result {
    for ch in value.chars() {
        match ch {
            '&' => out.write_str("&amp;")?,
            '<' => out.write_str("&lt;")?,
            '>' => out.write_str("&gt;")?,
            '"' => out.write_str("&quot;")?,
            '\'' => out.write_str("&#39;")?,
            _ => out.write_char(ch)?,
        }
    }
    Ok(())
}
