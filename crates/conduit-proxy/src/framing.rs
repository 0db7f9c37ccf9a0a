//! Length framing for the relay sockets: every packet on the wire is a
//! VarInt byte count followed by that many payload bytes. The translation
//! core only ever sees whole packets.

use bytes::{Buf, BytesMut};
use std::io;
use tokio_util::codec::{Decoder, Encoder};

pub struct PacketFraming;

impl Decoder for PacketFraming {
    type Item = Vec<u8>;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> io::Result<Option<Vec<u8>>> {
        // Decode the length prefix without consuming it until the whole
        // frame has arrived.
        let mut length: i32 = 0;
        let mut shift = 0;
        let mut prefix_len = 0;
        for (i, &byte) in src.iter().enumerate() {
            length |= ((byte & 0x7F) as i32) << shift;
            shift += 7;
            if byte & 0x80 == 0 {
                prefix_len = i + 1;
                break;
            }
            if shift >= 32 {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "Frame length VarInt too big",
                ));
            }
        }
        if prefix_len == 0 {
            return Ok(None); // Length prefix still incomplete
        }
        if length < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Negative frame length",
            ));
        }

        let length = length as usize;
        if src.len() < prefix_len + length {
            src.reserve(prefix_len + length - src.len());
            return Ok(None);
        }

        src.advance(prefix_len);
        Ok(Some(src.split_to(length).to_vec()))
    }
}

impl Encoder<Vec<u8>> for PacketFraming {
    type Error = io::Error;

    fn encode(&mut self, item: Vec<u8>, dst: &mut BytesMut) -> io::Result<()> {
        let mut length = item.len() as i32;
        while (length & !0x7F) != 0 {
            dst.extend_from_slice(&[((length & 0x7F) as u8) | 0x80]);
            length = ((length as u32) >> 7) as i32;
        }
        dst.extend_from_slice(&[(length & 0x7F) as u8]);
        dst.extend_from_slice(&item);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_roundtrip() {
        let mut framing = PacketFraming;
        let mut wire = BytesMut::new();

        framing.encode(vec![1, 2, 3], &mut wire).unwrap();
        framing.encode(vec![0xFF; 300], &mut wire).unwrap();

        assert_eq!(framing.decode(&mut wire).unwrap(), Some(vec![1, 2, 3]));
        assert_eq!(framing.decode(&mut wire).unwrap(), Some(vec![0xFF; 300]));
        assert_eq!(framing.decode(&mut wire).unwrap(), None);
    }

    #[test]
    fn test_partial_frame_waits_for_more_bytes() {
        let mut framing = PacketFraming;
        let mut wire = BytesMut::new();

        // Length says 5, only 2 payload bytes present.
        wire.extend_from_slice(&[5, 1, 2]);
        assert_eq!(framing.decode(&mut wire).unwrap(), None);

        wire.extend_from_slice(&[3, 4, 5]);
        assert_eq!(
            framing.decode(&mut wire).unwrap(),
            Some(vec![1, 2, 3, 4, 5])
        );
    }

    #[test]
    fn test_partial_length_prefix_waits() {
        let mut framing = PacketFraming;
        let mut wire = BytesMut::new();

        // Continuation bit set, second byte not yet arrived.
        wire.extend_from_slice(&[0x80]);
        assert_eq!(framing.decode(&mut wire).unwrap(), None);

        wire.extend_from_slice(&[0x02]); // Length 256
        wire.extend_from_slice(&vec![7u8; 256]);
        assert_eq!(framing.decode(&mut wire).unwrap(), Some(vec![7u8; 256]));
    }

    #[test]
    fn test_oversized_length_prefix_is_rejected() {
        let mut framing = PacketFraming;
        let mut wire = BytesMut::new();
        wire.extend_from_slice(&[0xFF; 6]);
        assert!(framing.decode(&mut wire).is_err());
    }

    #[test]
    fn test_empty_frame() {
        let mut framing = PacketFraming;
        let mut wire = BytesMut::new();
        framing.encode(Vec::new(), &mut wire).unwrap();
        assert_eq!(framing.decode(&mut wire).unwrap(), Some(Vec::new()));
    }
}
