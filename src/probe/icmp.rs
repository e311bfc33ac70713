use crate::error::{Error, Result};
use crate::probe::checksum::checksum;

/// ICMP header size (fixed)
pub const ICMP_HEADER_SIZE: usize = 8;
/// Default probe size in bytes (header + filler payload)
pub const DEFAULT_PACKET_SIZE: usize = 50;
/// Largest ICMP message that fits a 1500 byte MTU behind a 20 byte IPv4 header
pub const MAX_PACKET_SIZE: usize = 1472;

/// ICMP message type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IcmpType(pub u8);

impl IcmpType {
    pub const ECHO_REPLY: Self = Self(0);
    pub const ECHO_REQUEST: Self = Self(8);
    pub const TIME_EXCEEDED: Self = Self(11);
}

/// The 8-byte ICMP Echo header.
///
/// Layout (big-endian): type (1), code (1), checksum (2), identifier (2),
/// sequence (2). For Time Exceeded the last four bytes are unused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IcmpPacket {
    pub icmp_type: IcmpType,
    pub code: u8,
    pub checksum: u16,
    pub identifier: u16,
    pub sequence: u16,
}

impl IcmpPacket {
    /// Echo Request with a zero checksum
    pub fn echo_request(identifier: u16, sequence: u16) -> Self {
        Self {
            icmp_type: IcmpType::ECHO_REQUEST,
            code: 0,
            checksum: 0,
            identifier,
            sequence,
        }
    }

    /// Encode the header as it appears on the wire
    pub fn encode(&self) -> [u8; ICMP_HEADER_SIZE] {
        let mut buf = [0u8; ICMP_HEADER_SIZE];
        buf[0] = self.icmp_type.0;
        buf[1] = self.code;
        buf[2..4].copy_from_slice(&self.checksum.to_be_bytes());
        buf[4..6].copy_from_slice(&self.identifier.to_be_bytes());
        buf[6..8].copy_from_slice(&self.sequence.to_be_bytes());
        buf
    }

    /// Decode a header from the first 8 bytes of `data`.
    ///
    /// The checksum is extracted but not verified.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < ICMP_HEADER_SIZE {
            return Err(Error::MalformedPacket(data.len()));
        }
        Ok(Self {
            icmp_type: IcmpType(data[0]),
            code: data[1],
            checksum: u16::from_be_bytes([data[2], data[3]]),
            identifier: u16::from_be_bytes([data[4], data[5]]),
            sequence: u16::from_be_bytes([data[6], data[7]]),
        })
    }

    /// Return a copy with the checksum computed over this header followed by `payload`
    pub fn with_checksum(mut self, payload: &[u8]) -> Self {
        self.checksum = 0;
        let mut buf = Vec::with_capacity(ICMP_HEADER_SIZE + payload.len());
        buf.extend_from_slice(&self.encode());
        buf.extend_from_slice(payload);
        self.checksum = checksum(&buf);
        self
    }
}

/// Build a checksummed ICMP Echo Request of `packet_size` bytes.
///
/// Payload after the header is a repeating byte pattern. Sizes below the
/// header size are raised to it.
pub fn build_echo_request(identifier: u16, sequence: u16, packet_size: usize) -> Vec<u8> {
    let packet_size = packet_size.max(ICMP_HEADER_SIZE);
    let payload: Vec<u8> = (0..packet_size - ICMP_HEADER_SIZE)
        .map(|i| (i & 0xFF) as u8)
        .collect();

    let header = IcmpPacket::echo_request(identifier, sequence).with_checksum(&payload);

    let mut buffer = Vec::with_capacity(packet_size);
    buffer.extend_from_slice(&header.encode());
    buffer.extend_from_slice(&payload);
    buffer
}
