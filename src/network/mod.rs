//! Network subsystem for UDP audio transport

pub mod receiver;
pub mod socket;

pub use receiver::{ReceiverLoop, ReceiverSnapshot, ReceiverStats};
pub use socket::bind_socket;
