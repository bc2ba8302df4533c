use bytes::{BufMut, BytesMut};

/// Packet header bytes (first payload byte)
pub mod header {
    pub const OK: u8 = 0x00;
    pub const EOF: u8 = 0xFE;
    pub const NULL: u8 = 0xFB;
}

/// Server status flags
pub mod status {
    pub const SERVER_STATUS_AUTOCOMMIT: u16 = 0x0002;
}

/// Character sets
pub mod charset {
    pub const UTF8_GENERAL_CI: u16 = 0x21;
    pub const BINARY: u16 = 0x3f;
}

/// Column definition flags
pub mod column_flag {
    pub const NOT_NULL: u16 = 0x0001;
    pub const BINARY: u16 = 0x0080;
}

/// A protocol response packet.
///
/// Implementors write their payload only; the 4-byte frame header (length + sequence id)
/// is added by the client-facing codec.
pub trait Packet {
    fn sequence_id(&self) -> u8;

    fn write_payload(&self, buf: &mut BytesMut);

    fn to_payload(&self) -> BytesMut {
        let mut buf = BytesMut::new();
        self.write_payload(&mut buf);
        buf
    }
}

/// Length-encoded integer
pub fn put_lenenc_int(buf: &mut BytesMut, value: u64) {
    if value < 251 {
        buf.put_u8(value as u8);
    } else if value < 0x1_0000 {
        buf.put_u8(0xFC);
        buf.put_u16_le(value as u16);
    } else if value < 0x100_0000 {
        buf.put_u8(0xFD);
        buf.put_uint_le(value, 3);
    } else {
        buf.put_u8(0xFE);
        buf.put_u64_le(value);
    }
}

/// Length-encoded string
pub fn put_lenenc_bytes(buf: &mut BytesMut, data: &[u8]) {
    put_lenenc_int(buf, data.len() as u64);
    buf.put_slice(data);
}

/// Number of columns that follow in a result set header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldCountPacket {
    pub sequence_id: u8,
    pub column_count: u64,
}

impl Packet for FieldCountPacket {
    fn sequence_id(&self) -> u8 {
        self.sequence_id
    }

    fn write_payload(&self, buf: &mut BytesMut) {
        put_lenenc_int(buf, self.column_count);
    }
}

/// Column definition, protocol 4.1
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDefinition41Packet {
    pub sequence_id: u8,
    pub schema: String,
    pub table: String,
    pub org_table: String,
    pub name: String,
    pub org_name: String,
    pub character_set: u16,
    pub column_length: u32,
    pub column_type: u8,
    pub flags: u16,
    pub decimals: u8,
}

impl ColumnDefinition41Packet {
    const CATALOG: &'static str = "def";
    const FIXED_FIELDS_LENGTH: u64 = 0x0c;
}

impl Packet for ColumnDefinition41Packet {
    fn sequence_id(&self) -> u8 {
        self.sequence_id
    }

    fn write_payload(&self, buf: &mut BytesMut) {
        put_lenenc_bytes(buf, Self::CATALOG.as_bytes());
        put_lenenc_bytes(buf, self.schema.as_bytes());
        put_lenenc_bytes(buf, self.table.as_bytes());
        put_lenenc_bytes(buf, self.org_table.as_bytes());
        put_lenenc_bytes(buf, self.name.as_bytes());
        put_lenenc_bytes(buf, self.org_name.as_bytes());
        put_lenenc_int(buf, Self::FIXED_FIELDS_LENGTH);
        buf.put_u16_le(self.character_set);
        buf.put_u32_le(self.column_length);
        buf.put_u8(self.column_type);
        buf.put_u16_le(self.flags);
        buf.put_u8(self.decimals);
        buf.put_u16_le(0); // filler
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EofPacket {
    pub sequence_id: u8,
    pub warnings: u16,
    pub status_flags: u16,
}

impl EofPacket {
    #[must_use]
    pub const fn new(sequence_id: u8) -> Self {
        Self {
            sequence_id,
            warnings: 0,
            status_flags: status::SERVER_STATUS_AUTOCOMMIT,
        }
    }
}

impl Packet for EofPacket {
    fn sequence_id(&self) -> u8 {
        self.sequence_id
    }

    fn write_payload(&self, buf: &mut BytesMut) {
        buf.put_u8(header::EOF);
        buf.put_u16_le(self.warnings);
        buf.put_u16_le(self.status_flags);
    }
}

/// Generic acknowledgement.
///
/// `sequence_id` doubles as the "statements ok" count and is always 1 for this core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OkPacket {
    pub sequence_id: u8,
    pub affected_rows: u64,
    pub last_insert_id: u64,
    pub status_flags: u16,
    pub warnings: u16,
    pub info: String,
}

impl OkPacket {
    #[must_use]
    pub const fn new(sequence_id: u8, affected_rows: u64, last_insert_id: u64) -> Self {
        Self {
            sequence_id,
            affected_rows,
            last_insert_id,
            status_flags: status::SERVER_STATUS_AUTOCOMMIT,
            warnings: 0,
            info: String::new(),
        }
    }

    #[must_use]
    pub const fn statements_ok(&self) -> u8 {
        self.sequence_id
    }
}

impl Packet for OkPacket {
    fn sequence_id(&self) -> u8 {
        self.sequence_id
    }

    fn write_payload(&self, buf: &mut BytesMut) {
        buf.put_u8(header::OK);
        put_lenenc_int(buf, self.affected_rows);
        put_lenenc_int(buf, self.last_insert_id);
        buf.put_u16_le(self.status_flags);
        buf.put_u16_le(self.warnings);
        buf.put_slice(self.info.as_bytes());
    }
}

/// One row in text protocol, `None` is SQL NULL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextResultRowPacket {
    pub sequence_id: u8,
    pub values: Vec<Option<Vec<u8>>>,
}

impl Packet for TextResultRowPacket {
    fn sequence_id(&self) -> u8 {
        self.sequence_id
    }

    fn write_payload(&self, buf: &mut BytesMut) {
        for value in &self.values {
            match value {
                Some(data) => put_lenenc_bytes(buf, data),
                None => buf.put_u8(header::NULL),
            }
        }
    }
}
