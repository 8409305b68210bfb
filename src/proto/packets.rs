use std::io::{self, Read, Write};
use std::net::TcpStream;

use byteorder::{LittleEndian, WriteBytesExt};

use dakv_logger::prelude::*;

use crate::constants::{
    CapabilityFlag, ServerError, StateError, CHARACTER_SET_BINARY, CHARACTER_SET_UTF8, EOF_PACKET,
    ERR_PACKET, MAX_PACKET_SIZE, NULL_VALUE, OK_PACKET,
};
use crate::errors::{ProtoError, ProtoResult};
use crate::sql_type::{ColumnMeta, FieldFlag, FieldType, SqlResult, Value};

/// Length-encoded wire primitives, written onto any byte sink.
pub trait WriteLenEncode: WriteBytesExt {
    fn write_len_encode(&mut self, value: u64) -> io::Result<()> {
        match value {
            value if value < 251 => {
                self.write_u8(value as u8)?;
            }
            value if value < (1 << 16) => {
                self.write_u8(0xfc)?;
                self.write_u16::<LittleEndian>(value as u16)?;
            }
            value if value < (1 << 24) => {
                self.write_u8(0xfd)?;
                self.write_u24::<LittleEndian>(value as u32)?;
            }
            _ => {
                self.write_u8(0xfe)?;
                self.write_u64::<LittleEndian>(value)?;
            }
        }
        Ok(())
    }

    fn write_len_string(&mut self, value: &[u8]) -> io::Result<()> {
        if value.is_empty() {
            return self.write_u8(0);
        }
        self.write_len_encode(value.len() as u64)?;
        self.write_all(value)
    }

    fn write_null_string(&mut self, value: &str) -> io::Result<()> {
        self.write_all(value.as_bytes())?;
        self.write_u8(0)
    }

    // A result-set cell: NULL is its reserved byte, everything else is
    // stringified into a length-encoded string.
    fn write_value(&mut self, value: &Value) -> io::Result<()> {
        match value {
            Value::Null => self.write_u8(NULL_VALUE),
            Value::Int(v) => self.write_len_string(v.to_string().as_bytes()),
            Value::Float(v) => self.write_len_string(v.to_string().as_bytes()),
            Value::Text(v) => self.write_len_string(v.as_bytes()),
            Value::Blob(v) => self.write_len_string(v),
        }
    }
}

impl<W: WriteBytesExt> WriteLenEncode for W {}

/// Decode a length-encoded integer. Returns the value and how many
/// bytes it occupied.
pub fn read_len_encode(data: &[u8]) -> ProtoResult<(u64, usize)> {
    let first = *data.first().ok_or(ProtoError::EmptyPacketError)?;
    let decoded = match first {
        v if v < 0xfb => (v as u64, 1),
        0xfc => {
            let mut v = [0; 2];
            v.copy_from_slice(data.get(1..3).ok_or(ProtoError::EmptyPacketError)?);
            (u16::from_le_bytes(v) as u64, 3)
        }
        0xfd => {
            let v = data.get(1..4).ok_or(ProtoError::EmptyPacketError)?;
            (
                (v[0] as u64) | (v[1] as u64) << 8 | (v[2] as u64) << 16,
                4,
            )
        }
        0xfe => {
            let mut v = [0; 8];
            v.copy_from_slice(data.get(1..9).ok_or(ProtoError::EmptyPacketError)?);
            (u64::from_le_bytes(v), 9)
        }
        // 0xfb and 0xff are not lengths
        _ => return Err(ProtoError::EmptyPacketError),
    };
    Ok(decoded)
}

/// Packet framing and response assembly over one client socket.
///
/// Outgoing packets are queued into a per-connection buffer and written
/// in one burst when a response is complete; `sequence_id` always holds
/// the number the next queued packet will be stamped with.
pub struct Packets {
    sequence_id: u8,
    client_capabilities: u32,
    stream: TcpStream,
    buffer: Vec<u8>,
}

impl Packets {
    pub fn new(stream: TcpStream) -> Self {
        Packets {
            sequence_id: 0,
            client_capabilities: 0,
            stream,
            buffer: vec![],
        }
    }

    /// Negotiated client flags, known once the handshake response has
    /// been parsed. OK and ERR layouts depend on PROTOCOL_41.
    pub fn set_capabilities(&mut self, capabilities: u32) {
        self.client_capabilities = capabilities;
    }

    fn protocol_41(&self) -> bool {
        self.client_capabilities & CapabilityFlag::CapabilityClientProtocol41 as u32 != 0
    }

    /// Read one inbound packet. The server's next response packet
    /// continues the client's sequence number.
    pub fn read_packet(&mut self) -> ProtoResult<Vec<u8>> {
        let mut header = [0; 4];
        self.stream.read_exact(&mut header)?;

        let length = (header[0] as usize) | (header[1] as usize) << 8 | (header[2] as usize) << 16;
        self.sequence_id = header[3].wrapping_add(1);

        return match length {
            0 => Err(ProtoError::EmptyPacketError),
            l if l >= MAX_PACKET_SIZE => Err(ProtoError::MultiPacketNotSupport),
            _ => {
                let mut data = vec![0; length];
                self.stream.read_exact(data.as_mut_slice())?;
                debug!("< ({}) {:?}", length, data.as_slice());
                Ok(data)
            }
        };
    }

    /// Queue one payload, splitting it when it exceeds the frame limit.
    pub fn write_packet(&mut self, payload: &[u8]) -> io::Result<()> {
        debug!("> [{}] ({})", self.sequence_id, payload.len());
        let mut rest = payload;
        loop {
            let take = rest.len().min(MAX_PACKET_SIZE);
            self.buffer.write_u24::<LittleEndian>(take as u32)?;
            self.buffer.write_u8(self.sequence_id)?;
            self.buffer.extend_from_slice(&rest[..take]);
            self.sequence_id = self.sequence_id.wrapping_add(1);
            rest = &rest[take..];
            if rest.is_empty() {
                // an exactly-full frame needs an empty trailer
                if take == MAX_PACKET_SIZE {
                    self.buffer.write_u24::<LittleEndian>(0)?;
                    self.buffer.write_u8(self.sequence_id)?;
                    self.sequence_id = self.sequence_id.wrapping_add(1);
                }
                return Ok(());
            }
        }
    }

    /// Push every queued packet onto the socket in one write.
    pub fn flush(&mut self) -> io::Result<()> {
        self.stream.write_all(self.buffer.as_slice())?;
        self.buffer.clear();
        Ok(())
    }

    pub fn write_ok_packet(&mut self, status: u16) -> io::Result<()> {
        let mut payload = vec![];
        payload.write_u8(OK_PACKET)?;
        // affected rows, last insert id: nothing is ever written
        payload.write_len_encode(0)?;
        payload.write_len_encode(0)?;
        if self.protocol_41() {
            payload.write_u16::<LittleEndian>(status)?;
            payload.write_u16::<LittleEndian>(0)?; // warnings
        }
        self.write_packet(payload.as_slice())?;
        self.flush()
    }

    pub fn write_eof_packet(&mut self, status: u16) -> io::Result<()> {
        let mut payload = vec![];
        payload.write_u8(EOF_PACKET)?;
        payload.write_u16::<LittleEndian>(0)?; // warnings
        payload.write_u16::<LittleEndian>(status)?;
        self.write_packet(payload.as_slice())
    }

    pub fn write_err_packet(
        &mut self,
        code: ServerError,
        state: StateError,
        message: &str,
    ) -> io::Result<()> {
        let mut payload = vec![];
        payload.write_u8(ERR_PACKET)?;
        payload.write_u16::<LittleEndian>(code as u16)?;
        if self.protocol_41() {
            let state: &'static str = state.into();
            payload.write_u8(b'#')?;
            payload.write_all(state.as_bytes())?;
        }
        payload.write_all(message.as_bytes())?;
        self.write_packet(payload.as_slice())?;
        self.flush()
    }

    /// Stream a full text result set: column count, definitions, EOF,
    /// rows, EOF, flushed as one burst.
    pub fn write_result_set(&mut self, result: &SqlResult, status: u16) -> io::Result<()> {
        let mut count = vec![];
        count.write_len_encode(result.columns.len() as u64)?;
        self.write_packet(count.as_slice())?;

        for column in &result.columns {
            let payload = column_definition(column)?;
            self.write_packet(payload.as_slice())?;
        }
        self.write_eof_packet(status)?;

        for row in &result.rows {
            let mut payload = vec![];
            for value in row {
                payload.write_value(value)?;
            }
            self.write_packet(payload.as_slice())?;
        }
        self.write_eof_packet(status)?;
        self.flush()
    }
}

/// Column definition in the 4.1 layout.
/// See https://dev.mysql.com/doc/internals/en/com-query-response.html#packet-Protocol::ColumnDefinition41
fn column_definition(column: &ColumnMeta) -> io::Result<Vec<u8>> {
    let mut length = column.length;
    let mut flags: u16 = 0;
    let collation = if column.field_type == FieldType::VarString {
        CHARACTER_SET_UTF8 as u16
    } else {
        CHARACTER_SET_BINARY
    };

    match column.field_type {
        // total length includes the fractional digits
        FieldType::Decimal | FieldType::Double => length += column.decimals as u32,
        // utf8 = char * 3
        FieldType::VarString => length *= 3,
        FieldType::Timestamp => flags = FieldFlag::Timestamp as u16,
        FieldType::Blob => flags = FieldFlag::Blob as u16 | FieldFlag::Binary as u16,
        _ => {}
    }

    let mut payload = vec![];
    payload.write_len_string(b"def")?; // catalog
    payload.write_u8(0)?; // schema
    payload.write_u8(0)?; // table
    payload.write_u8(0)?; // org_table
    payload.write_len_string(column.name.as_bytes())?; // name
    payload.write_u8(0)?; // org_name
    payload.write_u8(0x0c)?; // length of fixed-length fields
    payload.write_u16::<LittleEndian>(collation)?; // character set
    payload.write_u32::<LittleEndian>(length)?; // column length
    payload.write_u8(column.field_type as u8)?; // type
    payload.write_u16::<LittleEndian>(flags)?; // flags
    payload.write_u8(column.decimals)?; // decimals
    payload.write_u16::<LittleEndian>(0)?; // filler
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(value: u64) -> Vec<u8> {
        let mut buf = vec![];
        buf.write_len_encode(value).unwrap();
        buf
    }

    #[test]
    fn test_len_encode_widths() {
        assert_eq!(encode(0), vec![0x00]);
        assert_eq!(encode(250), vec![0xfa]);
        assert_eq!(encode(251), vec![0xfc, 0xfb, 0x00]);
        assert_eq!(encode(65535), vec![0xfc, 0xff, 0xff]);
        assert_eq!(encode(65536), vec![0xfd, 0x00, 0x00, 0x01]);
        assert_eq!(encode((1 << 24) - 1), vec![0xfd, 0xff, 0xff, 0xff]);
        assert_eq!(
            encode(1 << 24),
            vec![0xfe, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn test_len_encode_round_trip() {
        for value in &[
            0u64,
            1,
            250,
            251,
            65535,
            65536,
            (1 << 24) - 1,
            1 << 24,
            u64::max_value(),
        ] {
            let buf = encode(*value);
            let (decoded, used) = read_len_encode(buf.as_slice()).unwrap();
            assert_eq!(decoded, *value);
            assert_eq!(used, buf.len());
        }
    }

    #[test]
    fn test_null_is_not_a_length() {
        assert!(read_len_encode(&[0xfb]).is_err());
        assert!(read_len_encode(&[0xff]).is_err());
    }

    #[test]
    fn test_len_string() {
        let mut buf = vec![];
        buf.write_len_string(b"main").unwrap();
        assert_eq!(buf, vec![0x04, b'm', b'a', b'i', b'n']);

        let mut empty = vec![];
        empty.write_len_string(b"").unwrap();
        assert_eq!(empty, vec![0x00]);
    }

    #[test]
    fn test_write_value() {
        let mut null = vec![];
        null.write_value(&Value::Null).unwrap();
        assert_eq!(null, vec![NULL_VALUE]);

        let mut int = vec![];
        int.write_value(&Value::Int(-7)).unwrap();
        assert_eq!(int, vec![0x02, b'-', b'7']);

        let mut string = vec![];
        string.write_value(&Value::Text("main".to_string())).unwrap();
        assert_eq!(string, vec![0x04, b'm', b'a', b'i', b'n']);
    }

    #[test]
    fn test_column_definition_adjustments() {
        // varchar lengths are scaled for utf8
        let varchar = ColumnMeta {
            name: "name".to_string(),
            field_type: FieldType::VarString,
            length: 30,
            decimals: 0,
        };
        let payload = column_definition(&varchar).unwrap();
        // catalog(4) + 3 empties + name(5) + org_name(1) + marker(1) = 14
        let length_at = 14 + 2;
        assert_eq!(
            &payload[length_at..length_at + 4],
            &(90u32).to_le_bytes()[..]
        );
        // utf8 collation
        assert_eq!(&payload[14..16], &(33u16).to_le_bytes()[..]);

        // blob columns are binary and flagged
        let blob = ColumnMeta {
            name: "data".to_string(),
            field_type: FieldType::Blob,
            length: 16777215,
            decimals: 0,
        };
        let payload = column_definition(&blob).unwrap();
        assert_eq!(&payload[14..16], &(63u16).to_le_bytes()[..]);
        let flags_at = 14 + 2 + 4 + 1;
        assert_eq!(&payload[flags_at..flags_at + 2], &(144u16).to_le_bytes()[..]);
    }
}
