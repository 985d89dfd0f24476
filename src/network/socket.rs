//! UDP socket setup

use socket2::{Domain, Protocol, Socket, Type};
use std::net::UdpSocket;

use crate::config::NetworkConfig;
use crate::error::NetworkError;

/// Create and bind the receive socket.
///
/// A zero `read_timeout_ms` leaves the socket fully blocking, in which case
/// shutdown waits for the next datagram.
pub fn bind_socket(config: &NetworkConfig) -> Result<UdpSocket, NetworkError> {
    let addr = config.socket_addr()?;
    let bind_err = |source| NetworkError::BindFailed { addr, source };

    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))
        .map_err(bind_err)?;

    if let Some(size) = config.recv_buffer_size {
        if let Err(e) = socket.set_recv_buffer_size(size) {
            tracing::warn!("Failed to set receive buffer to {} bytes: {}", size, e);
        }
    }

    socket.bind(&addr.into()).map_err(bind_err)?;

    let socket: UdpSocket = socket.into();
    if config.read_timeout_ms > 0 {
        socket
            .set_read_timeout(Some(config.read_timeout()))
            .map_err(bind_err)?;
    }

    tracing::debug!(
        "Bound UDP socket on {}",
        socket.local_addr().map(|a| a.to_string()).unwrap_or_else(|_| addr.to_string())
    );

    Ok(socket)
}
