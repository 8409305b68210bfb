use std::fmt::{Display, Error, Formatter};
use std::io::{self, BufRead, Cursor, Read, Write};
use std::convert;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::constants::CapabilityFlag;
use crate::errors::{ProtoError, ProtoResult};
use crate::proto::packets::WriteLenEncode;

/// Connection Phase Packets
/// https://dev.mysql.com/doc/internals/en/connection-phase-packets.html#packet-Protocol::HandshakeResponse41
/// start      length           value
/// 0           4           capability flags
/// 4           4           max-packet size
/// 8           1           character set
/// 9           23          reserved (all [0])
/// 32          unknown     user name
/// unknown     unknown     (auth response length) auth response
/// unknown     unknown     database
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Auth {
    character_set: u8,
    max_packet_size: u32,
    capability_flags: u32,
    auth_response: Vec<u8>,
    database: String,
    user: String,
}

/// Read up to a delimiter, dropping the delimiter itself when present.
pub trait ReadUntil: io::BufRead {
    fn real_read_until(&mut self, byte: u8, buf: &mut Vec<u8>) -> io::Result<usize>;
}

impl<T: convert::AsRef<[u8]>> ReadUntil for Cursor<T> {
    fn real_read_until(&mut self, byte: u8, buf: &mut Vec<u8>) -> io::Result<usize> {
        let size = self.read_until(byte, buf)?;
        if buf.last() == Some(&byte) {
            buf.pop();
        }
        Ok(size)
    }
}

impl Auth {
    pub fn new() -> Self {
        Auth::default()
    }

    pub fn capabilities(&self) -> u32 {
        self.capability_flags
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn wants_database(&self) -> bool {
        self.capability_flags & CapabilityFlag::CapabilityClientConnectWithDB as u32 != 0
    }

    /// Parse a client HandshakeResponse41. The credentials are consumed
    /// and remembered for PROCESSLIST; they are never verified.
    pub fn parse_client_handshake_packet(&mut self, payload: &[u8]) -> ProtoResult<()> {
        let mut payload = Cursor::new(payload);
        // Parse client flag
        match payload.read_u32::<LittleEndian>() {
            Ok(client_flag) => {
                if client_flag & CapabilityFlag::CapabilityClientProtocol41 as u32 == 0 {
                    return Err(ProtoError::ProtocolNotSupport);
                }
                self.capability_flags = client_flag;
            }
            Err(_) => {
                return Err(ProtoError::ReadClientFlagError);
            }
        }
        // Parse max packet size
        self.max_packet_size = payload
            .read_u32::<LittleEndian>()
            .map_err(|_| ProtoError::ReadMaxPacketSizeError)?;
        // Parse charset
        self.character_set = payload
            .read_u8()
            .map_err(|_| ProtoError::ReadCharsetError)?;
        // Read 23 zeros
        let mut trailer = [0; 23];
        if payload
            .read(&mut trailer)
            .map_err(|_| ProtoError::ReadZeroError)?
            != trailer.len()
        {
            return Err(ProtoError::ReadZeroError);
        }
        // Parse user name
        let mut user = vec![];
        payload
            .real_read_until(0x00, &mut user)
            .map_err(|_| ProtoError::ReadUserError)?;
        self.user = String::from_utf8(user).map_err(|_| ProtoError::ReadUserError)?;
        // Parse auth response: 4.1 secure clients prefix it with a one
        // byte length, older ones terminate it with NUL
        if self.capability_flags & CapabilityFlag::CapabilityClientSecureConnection as u32 != 0 {
            let auth_resp_len = payload
                .read_u8()
                .map_err(|_| ProtoError::ReadAuthResponseLengthError)?
                as usize;
            let mut response = vec![0; auth_resp_len];
            payload
                .read_exact(response.as_mut_slice())
                .map_err(|_| ProtoError::ReadAuthResponseError)?;
            self.auth_response = response;
        } else {
            let mut response = vec![];
            payload
                .real_read_until(0x00, &mut response)
                .map_err(|_| ProtoError::ReadAuthResponseError)?;
            self.auth_response = response;
        }
        // Parse database name
        if self.wants_database() {
            let mut database = vec![];
            payload
                .real_read_until(0x00, &mut database)
                .map_err(|_| ProtoError::ReadDatabaseError)?;
            self.database =
                String::from_utf8(database).map_err(|_| ProtoError::ReadDatabaseError)?;
        }
        Ok(())
    }

    /// Build the client side of the exchange. The server never sends
    /// one; tests and the bundled probe client do.
    pub fn write_handshake_resp(
        capability_flag: u32,
        charset: u8,
        username: &str,
        auth_response: &[u8],
        database: &str,
    ) -> ProtoResult<Vec<u8>> {
        let mut capability_flag = capability_flag;
        if !database.is_empty() {
            capability_flag |= CapabilityFlag::CapabilityClientConnectWithDB as u32;
        } else {
            capability_flag &= !(CapabilityFlag::CapabilityClientConnectWithDB as u32);
        }
        let mut buf = vec![];
        buf.write_u32::<LittleEndian>(capability_flag)?;
        buf.write_u32::<LittleEndian>(0)?; // max packet size
        buf.write_u8(charset)?;
        buf.write_all(&[0; 23])?;
        buf.write_null_string(username)?;

        if capability_flag & CapabilityFlag::CapabilityClientSecureConnection as u32 != 0 {
            buf.write_u8(auth_response.len() as u8)?;
            buf.write_all(auth_response)?;
        } else {
            buf.write_all(auth_response)?;
            buf.write_u8(0)?;
        }
        if capability_flag & CapabilityFlag::CapabilityClientConnectWithDB as u32 != 0 {
            buf.write_all(database.as_bytes())?;
            buf.write_u8(0)?;
        }
        Ok(buf)
    }
}

impl Display for Auth {
    fn fmt(&self, f: &mut Formatter) -> Result<(), Error> {
        write!(
            f,
            "Auth: [user: {}, database: {}, auth_response: {:?}, capability_flags: {}, character_set: {}, max_packet_size: {}]",
            self.user,
            self.database,
            self.auth_response.as_slice(),
            self.capability_flags,
            self.character_set,
            self.max_packet_size,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::CapabilityFlag::{
        CapabilityClientConnectWithDB, CapabilityClientProtocol41,
        CapabilityClientSecureConnection,
    };

    #[test]
    fn test_auth() {
        // capabilities 0x0001a68d, max packet 16M, charset 33, user
        // "root", 20-byte scramble, database "abc"
        let data = &[
            0x8d, 0xa6, 0x01, 0x00, 0x00, 0x00, 0x00, 0x01, 0x21, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x72, 0x6f, 0x6f, 0x74, 0x00, 0x14, 0x0e, 0xb4, 0xdd, 0xb5,
            0x5b, 0x64, 0xf8, 0x54, 0x40, 0xfd, 0xf3, 0x45, 0xfa, 0x37, 0x12, 0x20, 0x20, 0xda,
            0x38, 0xaa, 0x61, 0x62, 0x63, 0x00,
        ];
        let mut auth = Auth::new();
        auth.parse_client_handshake_packet(data).unwrap();
        assert_eq!(auth.character_set, 33);
        assert_eq!(auth.max_packet_size, 16777216);
        assert_eq!(auth.database, "abc".to_string());
        assert_eq!(auth.user, "root".to_string());
        assert_eq!(
            auth.auth_response,
            vec![
                0x0e, 0xb4, 0xdd, 0xb5, 0x5b, 0x64, 0xf8, 0x54, 0x40, 0xfd, 0xf3, 0x45, 0xfa, 0x37,
                0x12, 0x20, 0x20, 0xda, 0x38, 0xaa
            ]
        );
    }

    #[test]
    fn test_error() {
        let data = &[0x8d, 0xa6, 0xff];
        let mut auth = Auth::new();
        match auth.parse_client_handshake_packet(data) {
            Err(ProtoError::ReadClientFlagError) => {}
            _ => {
                panic!("Unexpected result");
            }
        }
        // protocol 4.1 flag missing
        let data = &[0x0d, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00];
        let mut auth = Auth::new();
        match auth.parse_client_handshake_packet(data) {
            Err(ProtoError::ProtocolNotSupport) => {}
            _ => {
                panic!("Unexpected result");
            }
        }
        let data = &[0x8d, 0xa6, 0x01, 0x00, 0x00, 0x00, 0x00, 0x01];
        let mut auth = Auth::new();
        match auth.parse_client_handshake_packet(data) {
            Err(ProtoError::ReadCharsetError) => {}
            _ => {
                panic!("Unexpected result");
            }
        }
        let data = &[
            0x8d, 0xa6, 0x01, 0x00, 0x00, 0x00, 0x00, 0x01, 0x21, 0x00, 0x00, 0x00,
        ];
        let mut auth = Auth::new();
        match auth.parse_client_handshake_packet(data) {
            Err(ProtoError::ReadZeroError) => {}
            _ => {
                panic!("Unexpected result");
            }
        }
    }

    #[test]
    fn test_unpack() {
        let capability = CapabilityClientProtocol41 as u32
            | CapabilityClientSecureConnection as u32;

        let mut expected = Auth::new();
        expected.character_set = 0x21;
        expected.capability_flags =
            capability | CapabilityClientConnectWithDB as u32;
        expected.auth_response = vec![0xaa; 20];
        expected.database = "test_db".to_string();
        expected.user = "root".to_string();

        let data =
            Auth::write_handshake_resp(capability, 0x21, "root", &[0xaa; 20], "test_db").unwrap();
        let mut actual = Auth::new();
        actual.parse_client_handshake_packet(data.as_slice()).unwrap();
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_unpack_with_empty_db() {
        let capability = CapabilityClientProtocol41 as u32
            | CapabilityClientSecureConnection as u32;

        let data = Auth::write_handshake_resp(capability, 0x21, "root", &[0xaa; 20], "").unwrap();
        let mut actual = Auth::new();
        actual.parse_client_handshake_packet(data.as_slice()).unwrap();
        assert_eq!(actual.database, "");
        assert!(!actual.wants_database());
    }

    #[test]
    fn test_unpack_without_secure() {
        // old-style clients NUL-terminate the auth response instead of
        // length-prefixing it
        let capability = CapabilityClientProtocol41 as u32;

        let data = Auth::write_handshake_resp(capability, 0x21, "root", &[0x61; 8], "db").unwrap();
        let mut actual = Auth::new();
        actual.parse_client_handshake_packet(data.as_slice()).unwrap();
        assert_eq!(actual.user, "root");
        assert_eq!(actual.auth_response, vec![0x61; 8]);
        assert_eq!(actual.database, "db");
    }
}
