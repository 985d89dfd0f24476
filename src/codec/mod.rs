//! Datagram framing
//!
//! Converts raw datagram payloads to sequenced audio frames and back.

pub mod frame;

pub use frame::{FrameCodec, SEQUENCE_HEADER_BYTES};
