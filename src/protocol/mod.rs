// Protocol module - response packets produced by the execution core

pub mod packet;
pub mod builder;

pub use packet::{
    ColumnDefinition41Packet, EofPacket, FieldCountPacket, OkPacket, Packet, TextResultRowPacket,
};
pub use builder::{build_acknowledgement, build_header, HeaderDescription};
