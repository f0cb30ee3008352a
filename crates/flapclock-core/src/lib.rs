//! Control logic for a split-flap wall clock.
//!
//! Everything here is hardware-agnostic: the board crate supplies pins, PWM
//! channels, the radio and flash through the traits in [`ports`], [`network`],
//! [`settings`] and [`time_sync`].
#![cfg_attr(not(test), no_std)]

pub mod app;
pub mod display;
pub mod input;
pub mod led;
pub mod network;
pub mod ports;
pub mod protocol;
pub mod provisioning;
pub mod recalibration;
pub mod schedule;
pub mod settings;
pub mod sleep;
pub mod time_sync;
pub mod timezone;
