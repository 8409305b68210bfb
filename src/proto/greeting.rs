use std::io::{self, Cursor, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use rand::Rng;

use crate::constants::{
    CapabilityFlag, CHARACTER_SET_UTF8, DEFAULT_SERVER_CAPABILITY, PROTOCOL_VERSION,
    SERVER_STATUS_AUTOCOMMIT,
};
use crate::errors::{ProtoError, ProtoResult};
use crate::proto::auth::ReadUntil;
use crate::proto::packets::WriteLenEncode;

/// The server side of the initial handshake.
#[derive(Debug, Default)]
pub struct Greeting {
    status_flag: u16,
    capability: u32,
    connection_id: u32,
    server_version: String,
    salt: Vec<u8>,
}

fn byte_rand(min: u8, max: u8) -> u8 {
    let mut rng = rand::thread_rng();
    rng.gen_range(min, max)
}

impl Greeting {
    pub fn new(connection_id: u32, server_version: &str) -> Self {
        // The scramble is never verified, but clients expect the bytes
        // to be there and printable-ish.
        let mut salt = vec![0; 20];
        for byte in salt.iter_mut() {
            *byte = byte_rand(1, 123);
        }
        Greeting {
            status_flag: SERVER_STATUS_AUTOCOMMIT,
            capability: DEFAULT_SERVER_CAPABILITY,
            connection_id,
            server_version: server_version.to_string(),
            salt,
        }
    }

    /// Initial Handshake Packet - protocol version 10
    /// See https://dev.mysql.com/doc/internals/en/connection-phase-packets.html#packet-Protocol::HandshakeV10
    pub fn write_handshake_v10(&self) -> io::Result<Vec<u8>> {
        let mut buf = vec![];
        // [u8] protocol version
        buf.write_u8(PROTOCOL_VERSION)?;
        // [string<NUL>] server version
        buf.write_null_string(self.server_version.as_str())?;
        // [u32] connection id
        buf.write_u32::<LittleEndian>(self.connection_id)?;
        // [string<8>] auth-plugin-data-part-1
        buf.write_all(&self.salt[..8])?;
        // [u8] filler
        buf.write_u8(0)?;
        // [u16] capability flags (lower 2 bytes)
        buf.write_u16::<LittleEndian>(self.capability as u16)?;
        // [u8] character set
        buf.write_u8(CHARACTER_SET_UTF8)?;
        // [u16] status flags
        buf.write_u16::<LittleEndian>(self.status_flag)?;
        // [u16] capability flags (upper 2 bytes)
        buf.write_u16::<LittleEndian>((self.capability >> 16) as u16)?;
        // [u8] filler
        buf.write_u8(0)?;
        // [0;10] reserved (all [00])
        buf.write_all(&[0; 10])?;
        // [string<12>] auth-plugin-data-part-2, NUL terminated
        if self.capability & CapabilityFlag::CapabilityClientSecureConnection as u32 != 0 {
            buf.write_all(&self.salt[8..])?;
            buf.write_u8(0)?;
        }
        Ok(buf)
    }

    /// Client-side decode of a handshake payload. The server never
    /// receives one of these; it keeps the writer honest in tests.
    pub fn parse_handshake_v10(&mut self, payload: &[u8]) -> ProtoResult<()> {
        let mut payload = Cursor::new(payload);
        match payload.read_u8() {
            Ok(PROTOCOL_VERSION) => {}
            _ => return Err(ProtoError::ReadProtocolVersionError),
        }
        let mut version = vec![];
        payload
            .real_read_until(0x00, &mut version)
            .map_err(|_| ProtoError::ReadServerVersionError)?;
        self.server_version =
            String::from_utf8(version).map_err(|_| ProtoError::ReadServerVersionError)?;
        self.connection_id = payload
            .read_u32::<LittleEndian>()
            .map_err(|_| ProtoError::ReadConnectionIdError)?;

        let mut salt1 = vec![0; 8];
        payload
            .read_exact(salt1.as_mut_slice())
            .map_err(|_| ProtoError::ReadSaltError)?;
        payload.read_u8().map_err(|_| ProtoError::ReadSaltError)?;

        let lower_capability = payload
            .read_u16::<LittleEndian>()
            .map_err(|_| ProtoError::ReadCapabilityFlagError)?;
        payload
            .read_u8()
            .map_err(|_| ProtoError::ReadCharsetError)?;
        self.status_flag = payload
            .read_u16::<LittleEndian>()
            .map_err(|_| ProtoError::ReadStatusFlagError)?;
        let upper_capability = payload
            .read_u16::<LittleEndian>()
            .map_err(|_| ProtoError::ReadCapabilityFlagError)?;
        self.capability = ((upper_capability as u32) << 16) | lower_capability as u32;

        let mut reserved = [0; 11];
        payload
            .read_exact(&mut reserved)
            .map_err(|_| ProtoError::ReadCapabilityFlagError)?;

        if self.capability & CapabilityFlag::CapabilityClientSecureConnection as u32 != 0 {
            let mut salt2 = vec![0; 12];
            payload
                .read_exact(salt2.as_mut_slice())
                .map_err(|_| ProtoError::ReadSaltError)?;
            self.salt = [salt1, salt2].concat();
        } else {
            self.salt = salt1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_greeting_round_trip() {
        let expected = Greeting::new(4, "4.1.25-SQLite");
        let mut actual = Greeting::default();
        let data = expected.write_handshake_v10().unwrap();
        actual.parse_handshake_v10(data.as_slice()).unwrap();

        assert_eq!(actual.server_version, expected.server_version);
        assert_eq!(actual.connection_id, expected.connection_id);
        assert_eq!(actual.capability, expected.capability);
        assert_eq!(actual.status_flag, expected.status_flag);
        assert_eq!(actual.salt, expected.salt);
    }

    #[test]
    fn test_handshake_layout() {
        let greeting = Greeting::new(7, "4.1.25-SQLite");
        let data = greeting.write_handshake_v10().unwrap();

        // protocol version, then the NUL-terminated version string
        assert_eq!(data[0], 10);
        assert_eq!(&data[1..14], b"4.1.25-SQLite");
        assert_eq!(data[14], 0);
        // connection id
        assert_eq!(&data[15..19], &7u32.to_le_bytes()[..]);
        // capability low bytes after salt + filler
        assert_eq!(&data[28..30], &(33311u16).to_le_bytes()[..]);
        // charset and status
        assert_eq!(data[30], 33);
        assert_eq!(&data[31..33], &(2u16).to_le_bytes()[..]);
        // secure-connection trailer: 12 salt bytes and a NUL
        assert_eq!(data.len(), 33 + 2 + 1 + 10 + 12 + 1);
        assert_eq!(*data.last().unwrap(), 0);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let mut greeting = Greeting::default();
        assert!(greeting.parse_handshake_v10(&[0x09]).is_err());
        assert!(greeting.parse_handshake_v10(&[]).is_err());
    }
}
