//! Response packet builder
//!
//! Pure metadata-in/packets-out functions shared by every execution path.
use bytes::BytesMut;

use super::packet::{
    charset, column_flag, ColumnDefinition41Packet, EofPacket, FieldCountPacket, OkPacket, Packet,
};
use crate::core::{ColumnMetadata, ColumnType, ResultMetadata};

/// Sequence id of the first response packet
pub const FIRST_SEQUENCE_ID: u8 = 1;

/// Result set shape sent before any row data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderDescription {
    pub field_count: FieldCountPacket,
    pub columns: Vec<ColumnDefinition41Packet>,
    pub eof: EofPacket,
}

impl HeaderDescription {
    #[must_use]
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Sequence id the first row packet must carry
    #[must_use]
    pub const fn next_sequence_id(&self) -> u8 {
        self.eof.sequence_id.wrapping_add(1)
    }

    /// Header packets in send order
    #[must_use]
    pub fn packets(&self) -> Vec<&dyn Packet> {
        let mut packets: Vec<&dyn Packet> = Vec::with_capacity(self.columns.len() + 2);
        packets.push(&self.field_count);
        packets.extend(self.columns.iter().map(|c| c as &dyn Packet));
        packets.push(&self.eof);
        packets
    }

    /// Payloads of the header packets, paired with their sequence ids
    #[must_use]
    pub fn payloads(&self) -> Vec<(u8, BytesMut)> {
        self.packets()
            .into_iter()
            .map(|p| (p.sequence_id(), p.to_payload()))
            .collect()
    }
}

/// Builds the header description from backend result metadata, columns in backend order
#[must_use]
pub fn build_header(metadata: &ResultMetadata) -> HeaderDescription {
    let mut sequence_id = FIRST_SEQUENCE_ID;
    let field_count = FieldCountPacket {
        sequence_id,
        column_count: metadata.column_count() as u64,
    };

    let columns: Vec<ColumnDefinition41Packet> = metadata
        .columns
        .iter()
        .map(|column| {
            sequence_id = sequence_id.wrapping_add(1);
            column_definition(sequence_id, column)
        })
        .collect();

    HeaderDescription {
        field_count,
        columns,
        eof: EofPacket::new(sequence_id.wrapping_add(1)),
    }
}

/// Builds the generic acknowledgement; the statement count is always reported as 1
#[must_use]
pub const fn build_acknowledgement(affected_rows: u64, last_insert_id: u64) -> OkPacket {
    OkPacket::new(FIRST_SEQUENCE_ID, affected_rows, last_insert_id)
}

fn column_definition(sequence_id: u8, column: &ColumnMetadata) -> ColumnDefinition41Packet {
    let binary = is_binary(column.column_type);
    let mut flags = 0;
    if !column.nullable {
        flags |= column_flag::NOT_NULL;
    }
    if binary {
        flags |= column_flag::BINARY;
    }

    ColumnDefinition41Packet {
        sequence_id,
        schema: column.schema.clone(),
        table: column.table.clone(),
        org_table: column.table.clone(),
        name: column.label().to_string(),
        org_name: column.name.clone(),
        character_set: if binary { charset::BINARY } else { charset::UTF8_GENERAL_CI },
        column_length: column.column_length,
        column_type: column.column_type.mysql_type(),
        flags,
        decimals: column.decimals,
    }
}

const fn is_binary(column_type: ColumnType) -> bool {
    !matches!(
        column_type,
        ColumnType::Varchar | ColumnType::Char | ColumnType::Text | ColumnType::Json
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> ResultMetadata {
        let mut id =
            ColumnMetadata::new("order_id", ColumnType::BigInt).with_table("ds_0", "t_order_0");
        id.nullable = false;
        let mut status =
            ColumnMetadata::new("status", ColumnType::Varchar).with_table("ds_0", "t_order_0");
        status.label = Some("s".to_string());
        ResultMetadata::new(vec![id, status])
    }

    #[test]
    fn test_build_header_preserves_column_order() {
        let header = build_header(&metadata());

        assert_eq!(header.column_count(), 2);
        assert_eq!(header.field_count.column_count, 2);
        assert_eq!(header.columns[0].name, "order_id");
        assert_eq!(header.columns[1].name, "s");
        assert_eq!(header.columns[1].org_name, "status");
        assert_eq!(header.columns[1].org_table, "t_order_0");
    }

    #[test]
    fn test_build_header_sequence_ids() {
        let header = build_header(&metadata());
        let ids: Vec<u8> = header.packets().iter().map(|p| p.sequence_id()).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
        assert_eq!(header.next_sequence_id(), 5);
        assert_eq!(header.payloads().len(), 4);
    }

    #[test]
    fn test_build_header_column_flags() {
        let header = build_header(&metadata());
        assert_eq!(header.columns[0].flags, column_flag::NOT_NULL | column_flag::BINARY);
        assert_eq!(header.columns[0].character_set, charset::BINARY);
        assert_eq!(header.columns[1].flags, 0);
        assert_eq!(header.columns[1].character_set, charset::UTF8_GENERAL_CI);
    }

    #[test]
    fn test_build_header_empty_metadata() {
        let header = build_header(&ResultMetadata::default());
        assert_eq!(header.column_count(), 0);
        assert_eq!(header.eof.sequence_id, 2);
    }

    #[test]
    fn test_build_acknowledgement() {
        let ok = build_acknowledgement(5, 42);
        assert_eq!(ok.statements_ok(), 1);
        assert_eq!(ok.affected_rows, 5);
        assert_eq!(ok.last_insert_id, 42);
    }
}
