//! One relayed connection: frames from the client are translated serverbound,
//! frames from the upstream are translated clientbound, each direction in
//! strict arrival order. The two directions share one [`Connection`] record
//! so state transitions seen on either side apply to both.

use crate::config::ProxyConfig;
use crate::framing::PacketFraming;
use conduit_common::{ConnectionState, Diagnostics, Direction, TranslateError};
use conduit_logger::{log, LogSeverity};
use conduit_protocol::{Connection, PacketBuffer, TranslationRegistry};
use futures::{SinkExt, StreamExt};
use std::sync::{Arc, Mutex};
use tokio::io;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio_util::codec::{FramedRead, FramedWrite};

pub async fn run_session(
    client: TcpStream,
    config: ProxyConfig,
    registry: Arc<TranslationRegistry>,
    diagnostics: Arc<dyn Diagnostics>,
    connection_id: u64,
) -> io::Result<()> {
    let upstream = TcpStream::connect(&config.upstream_addr).await?;

    let mut connection = Connection::new(connection_id);
    connection.environment = config.environment();
    let connection = Arc::new(Mutex::new(connection));

    let (client_read, client_write) = client.into_split();
    let (upstream_read, upstream_write) = upstream.into_split();

    let serverbound = relay(
        client_read,
        upstream_write,
        Direction::Serverbound,
        connection.clone(),
        registry.clone(),
        diagnostics.clone(),
    );
    let clientbound = relay(
        upstream_read,
        client_write,
        Direction::Clientbound,
        connection,
        registry,
        diagnostics,
    );

    // Either side closing ends the session.
    tokio::select! {
        result = serverbound => result,
        result = clientbound => result,
    }
}

async fn relay(
    read: OwnedReadHalf,
    write: OwnedWriteHalf,
    direction: Direction,
    connection: Arc<Mutex<Connection>>,
    registry: Arc<TranslationRegistry>,
    diagnostics: Arc<dyn Diagnostics>,
) -> io::Result<()> {
    let mut frames = FramedRead::new(read, PacketFraming);
    let mut sink = FramedWrite::new(write, PacketFraming);

    while let Some(frame) = frames.next().await {
        let frame = frame?;

        let translated = {
            let mut connection = connection.lock().unwrap();
            if connection.state == ConnectionState::Handshake {
                if direction == Direction::Serverbound {
                    handle_handshake(&frame, &mut connection)?;
                }
                Ok(frame)
            } else {
                registry.translate(&mut connection, direction, &frame, diagnostics.as_ref())
            }
        };

        match translated {
            Ok(bytes) => sink.send(bytes).await?,
            Err(TranslateError::IoError(err)) => return Err(err),
            Err(err) => {
                // A malformed packet is fatal only to itself; the frame layer
                // keeps the rest of the stream aligned.
                log(
                    format!("Dropping untranslatable packet: {}", err),
                    LogSeverity::Error,
                );
            }
        }
    }

    Ok(())
}

/// Connection bootstrapping: the first client packet names the state the
/// connection moves to. Forwarded unchanged; only the intent field matters
/// here.
fn handle_handshake(frame: &[u8], connection: &mut Connection) -> io::Result<()> {
    let mut buffer = PacketBuffer::from_bytes(frame.to_vec());
    let packet_id = buffer.read_varint()?;
    if packet_id != 0x00 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Expected handshake, got packet 0x{:02x}", packet_id),
        ));
    }

    buffer.read_varint()?; // Protocol version
    buffer.read_string()?; // Server address
    buffer.read_u16()?; // Server port

    let next_state = buffer.read_varint()?;
    let state = match next_state {
        1 => ConnectionState::Status,
        2 => ConnectionState::Login,
        other => {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Invalid handshake next state: {}", other),
            ))
        }
    };
    connection.set_state(state);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handshake_frame(next_state: i32) -> Vec<u8> {
        let mut buffer = PacketBuffer::new();
        buffer.write_varint(0x00);
        buffer.write_varint(764); // Protocol version
        buffer.write_string("localhost");
        buffer.write_u16(25565);
        buffer.write_varint(next_state);
        buffer.into_bytes()
    }

    #[test]
    fn test_handshake_moves_connection_to_status() {
        let mut connection = Connection::new(1);
        handle_handshake(&handshake_frame(1), &mut connection).unwrap();
        assert_eq!(connection.state, ConnectionState::Status);
    }

    #[test]
    fn test_handshake_moves_connection_to_login() {
        let mut connection = Connection::new(1);
        handle_handshake(&handshake_frame(2), &mut connection).unwrap();
        assert_eq!(connection.state, ConnectionState::Login);
    }

    #[test]
    fn test_invalid_next_state_is_rejected() {
        let mut connection = Connection::new(1);
        assert!(handle_handshake(&handshake_frame(3), &mut connection).is_err());
        assert_eq!(connection.state, ConnectionState::Handshake);
    }
}
