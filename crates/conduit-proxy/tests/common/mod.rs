use conduit_protocol::PacketBuffer;
use std::io;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Writes one varint-length-framed packet.
pub async fn send_frame(stream: &mut TcpStream, payload: &[u8]) -> io::Result<()> {
    let mut frame = PacketBuffer::new();
    frame.write_varint(payload.len() as i32);
    frame.write_bytes(payload);
    stream.write_all(frame.get_buffer()).await
}

/// Reads one varint-length-framed packet.
pub async fn read_frame(stream: &mut TcpStream) -> io::Result<Vec<u8>> {
    let mut length: i32 = 0;
    let mut shift = 0;
    loop {
        let byte = stream.read_u8().await?;
        length |= ((byte & 0x7F) as i32) << shift;
        shift += 7;
        if byte & 0x80 == 0 {
            break;
        }
        if shift >= 32 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Frame length VarInt too big",
            ));
        }
    }

    let mut payload = vec![0u8; length as usize];
    stream.read_exact(&mut payload).await?;
    Ok(payload)
}

pub fn handshake_packet(next_state: i32) -> Vec<u8> {
    let mut packet = PacketBuffer::new();
    packet.write_varint(0x00);
    packet.write_varint(764); // Protocol version
    packet.write_string("localhost");
    packet.write_u16(25565);
    packet.write_varint(next_state);
    packet.into_bytes()
}
