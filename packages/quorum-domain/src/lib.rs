pub mod band;
pub mod channel;
pub mod chunking;
pub mod request_state;
