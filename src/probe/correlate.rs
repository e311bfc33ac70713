use pnet::packet::ip::IpNextHeaderProtocols;
use pnet::packet::ipv4::Ipv4Packet;
use std::net::Ipv4Addr;

use crate::probe::checksum::verify;
use crate::probe::icmp::{ICMP_HEADER_SIZE, IcmpPacket, IcmpType};

/// Smallest legal IPv4 header (IHL = 5)
const MIN_IPV4_HEADER: usize = 20;

/// What the probe in flight looks like on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expected {
    pub destination: Ipv4Addr,
    pub identifier: u16,
    pub sequence: u16,
}

/// Why a received datagram was not matched to the probe in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unrelated {
    /// Not an IPv4/ICMP datagram, or too short to hold one
    Malformed,
    /// ICMP checksum does not verify
    BadChecksum,
    /// Echo Reply for another probe (other process, or an earlier sequence)
    ForeignEcho { identifier: u16, sequence: u16 },
    /// Time Exceeded quoting a datagram we did not send
    ForeignQuote,
    /// Any other ICMP type/code (including our own looped-back requests)
    OtherType { icmp_type: u8, code: u8 },
}

/// Result of correlating one raw datagram with the probe in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Correlation {
    /// Echo Reply carrying our identifier and sequence, with the ICMP
    /// length and the TTL left in the reply's IP header
    EchoReply { len: usize, ttl: u8 },
    /// Time Exceeded generated by a router on the path
    TimeExceeded,
    /// Anything else; the caller keeps waiting
    Unrelated(Unrelated),
}

/// Correlate a datagram read from a raw IPv4 ICMP socket.
///
/// The datagram starts with the IPv4 header. Its length is taken from the
/// IHL field since options make it variable.
pub fn correlate(datagram: &[u8], expected: &Expected) -> Correlation {
    let Some((ttl, icmp_data)) = strip_ipv4_header(datagram) else {
        return Correlation::Unrelated(Unrelated::Malformed);
    };
    let Ok(header) = IcmpPacket::decode(icmp_data) else {
        return Correlation::Unrelated(Unrelated::Malformed);
    };
    if !verify(icmp_data) {
        return Correlation::Unrelated(Unrelated::BadChecksum);
    }

    match header.icmp_type {
        IcmpType::ECHO_REPLY => {
            if header.identifier == expected.identifier && header.sequence == expected.sequence {
                Correlation::EchoReply {
                    len: icmp_data.len(),
                    ttl,
                }
            } else {
                Correlation::Unrelated(Unrelated::ForeignEcho {
                    identifier: header.identifier,
                    sequence: header.sequence,
                })
            }
        }
        IcmpType::TIME_EXCEEDED => {
            // Original datagram starts after the 8 byte ICMP header
            if quote_matches(&icmp_data[ICMP_HEADER_SIZE..], expected) {
                Correlation::TimeExceeded
            } else {
                Correlation::Unrelated(Unrelated::ForeignQuote)
            }
        }
        other => Correlation::Unrelated(Unrelated::OtherType {
            icmp_type: other.0,
            code: header.code,
        }),
    }
}

/// Return the IP TTL and the ICMP message inside an IPv4 datagram
fn strip_ipv4_header(datagram: &[u8]) -> Option<(u8, &[u8])> {
    let ip_packet = Ipv4Packet::new(datagram)?;
    if ip_packet.get_version() != 4
        || ip_packet.get_next_level_protocol() != IpNextHeaderProtocols::Icmp
    {
        return None;
    }

    let ip_header_len = (ip_packet.get_header_length() as usize) * 4;
    if ip_header_len < MIN_IPV4_HEADER || datagram.len() < ip_header_len {
        return None;
    }
    Some((ip_packet.get_ttl(), &datagram[ip_header_len..]))
}

/// Check the datagram quoted in an ICMP error against the probe in flight.
///
/// Routers must quote the original IP header and at least 8 bytes of its
/// payload. When the quote is truncated beyond that we can't tell, and the
/// error is accepted.
fn quote_matches(quoted: &[u8], expected: &Expected) -> bool {
    let Some(ip_packet) = Ipv4Packet::new(quoted) else {
        return true;
    };
    if ip_packet.get_version() != 4 {
        return true;
    }
    if ip_packet.get_next_level_protocol() != IpNextHeaderProtocols::Icmp
        || ip_packet.get_destination() != expected.destination
    {
        return false;
    }

    let ip_header_len = (ip_packet.get_header_length() as usize) * 4;
    if ip_header_len < MIN_IPV4_HEADER || quoted.len() < ip_header_len + ICMP_HEADER_SIZE {
        return true;
    }
    match IcmpPacket::decode(&quoted[ip_header_len..]) {
        Ok(original) => {
            original.icmp_type == IcmpType::ECHO_REQUEST
                && original.identifier == expected.identifier
                && original.sequence == expected.sequence
        }
        Err(_) => true,
    }
}
