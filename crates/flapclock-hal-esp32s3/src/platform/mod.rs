pub mod splitflap;
pub mod status;
