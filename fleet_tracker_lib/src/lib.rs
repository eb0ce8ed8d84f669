pub mod comms;
pub mod ping;
pub mod ping_sequence;
pub mod time_format;
