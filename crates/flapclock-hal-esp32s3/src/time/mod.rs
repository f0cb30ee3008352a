pub mod sntp;
pub mod ticker;
