//! Packet formats the access point and station speak, kept free of any
//! socket so they can be checked on the host.

pub mod dhcp;
pub mod dns;
pub mod http;
pub mod ntp;
