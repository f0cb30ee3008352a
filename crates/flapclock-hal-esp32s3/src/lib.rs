//! ESP32-S3 implementations of the clock's board traits.
#![no_std]

pub mod led;
pub mod network;
pub mod platform;
pub mod storage;
pub mod time;
