//! Quality-of-service and query-settings byte packing
//!
//! Both structures travel as a single packed byte on the wire:
//!
//! ```text
//! QoS byte                          Query settings byte
//! ┌───────┬─────┬─────┬────┬─────┐  ┌────────┬──────┬────────┬────────┐
//! │ 7   6 │  5  │  4  │ 3  │ 2-0 │  │ 7    6 │ 5  4 │ 3    2 │ 1    0 │
//! │ local │ rel │ exp │ cc │ prio│  │ unused │ rkey │ consol │ target │
//! └───────┴─────┴─────┴────┴─────┘  └────────┴──────┴────────┴────────┘
//! ```
//!
//! Every QoS bit pattern is valid, so unpacking never fails. The query
//! settings byte has two unused high bits that must be zero.

use crate::error::{ProtocolError, Result};

/// Message priority, from most to least urgent
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[repr(u8)]
pub enum Priority {
    Control = 0,
    RealTime = 1,
    InteractiveHigh = 2,
    InteractiveLow = 3,
    DataHigh = 4,
    #[default]
    Data = 5,
    DataLow = 6,
    Background = 7,
}

impl Priority {
    fn from_bits(bits: u8) -> Self {
        match bits & 0b111 {
            0 => Priority::Control,
            1 => Priority::RealTime,
            2 => Priority::InteractiveHigh,
            3 => Priority::InteractiveLow,
            4 => Priority::DataHigh,
            5 => Priority::Data,
            6 => Priority::DataLow,
            _ => Priority::Background,
        }
    }
}

/// What to do with a message when the network is saturated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum CongestionControl {
    /// Drop the message rather than stall the sender
    #[default]
    Drop = 0,
    /// Stall the sender until the message can be transmitted
    Block = 1,
}

/// Delivery guarantee requested for a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Reliability {
    BestEffort = 0,
    #[default]
    Reliable = 1,
}

/// Which subscribers a publication may reach
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Locality {
    #[default]
    Any = 0,
    SessionLocal = 1,
    Remote = 2,
    /// Not assigned a meaning; round-trips unchanged on the wire
    Reserved = 3,
}

impl Locality {
    fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0 => Locality::Any,
            1 => Locality::SessionLocal,
            2 => Locality::Remote,
            _ => Locality::Reserved,
        }
    }
}

/// Quality-of-service attached to outgoing data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Qos {
    pub priority: Priority,
    pub congestion_control: CongestionControl,
    pub express: bool,
    pub reliability: Reliability,
    pub locality: Locality,
}

impl Qos {
    /// Packs the QoS into its wire byte
    pub fn to_byte(self) -> u8 {
        self.priority as u8
            | (self.congestion_control as u8) << 3
            | (self.express as u8) << 4
            | (self.reliability as u8) << 5
            | (self.locality as u8) << 6
    }

    /// Unpacks a wire byte; every bit pattern maps to a valid QoS
    pub fn from_byte(byte: u8) -> Self {
        Qos {
            priority: Priority::from_bits(byte),
            congestion_control: if byte & (1 << 3) != 0 {
                CongestionControl::Block
            } else {
                CongestionControl::Drop
            },
            express: byte & (1 << 4) != 0,
            reliability: if byte & (1 << 5) != 0 {
                Reliability::Reliable
            } else {
                Reliability::BestEffort
            },
            locality: Locality::from_bits(byte >> 6),
        }
    }
}

/// Which queryables a query should be routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum QueryTarget {
    /// The broker picks the best complete match
    #[default]
    BestMatching = 0,
    All = 1,
    AllComplete = 2,
}

/// How concurrent replies for the same key are merged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ConsolidationMode {
    #[default]
    Auto = 0,
    None = 1,
    Monotonic = 2,
    Latest = 3,
}

impl ConsolidationMode {
    fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0 => ConsolidationMode::Auto,
            1 => ConsolidationMode::None,
            2 => ConsolidationMode::Monotonic,
            _ => ConsolidationMode::Latest,
        }
    }
}

/// Whether replies may carry keys outside the queried expression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ReplyKeyExprPolicy {
    /// Replies must intersect the queried key expression
    #[default]
    MatchingQuery = 0,
    Any = 1,
}

/// Settings carried by `Get`-family requests and querier declarations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QuerySettings {
    pub target: QueryTarget,
    pub consolidation: ConsolidationMode,
    pub reply_key_expr: ReplyKeyExprPolicy,
}

impl QuerySettings {
    /// Packs the settings into their wire byte
    pub fn to_byte(self) -> u8 {
        self.target as u8 | (self.consolidation as u8) << 2 | (self.reply_key_expr as u8) << 4
    }

    /// Unpacks a wire byte, rejecting reserved target values and
    /// non-zero unused bits
    pub fn from_byte(byte: u8) -> Result<Self> {
        if byte & 0b1100_0000 != 0 {
            return Err(ProtocolError::InvalidQuerySettings(byte));
        }
        let target = match byte & 0b11 {
            0 => QueryTarget::BestMatching,
            1 => QueryTarget::All,
            2 => QueryTarget::AllComplete,
            _ => return Err(ProtocolError::InvalidQuerySettings(byte)),
        };
        let reply_key_expr = match (byte >> 4) & 0b11 {
            0 => ReplyKeyExprPolicy::MatchingQuery,
            1 => ReplyKeyExprPolicy::Any,
            _ => return Err(ProtocolError::InvalidQuerySettings(byte)),
        };
        Ok(QuerySettings {
            target,
            consolidation: ConsolidationMode::from_bits(byte >> 2),
            reply_key_expr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRIORITIES: [Priority; 8] = [
        Priority::Control,
        Priority::RealTime,
        Priority::InteractiveHigh,
        Priority::InteractiveLow,
        Priority::DataHigh,
        Priority::Data,
        Priority::DataLow,
        Priority::Background,
    ];

    #[test]
    fn test_qos_roundtrip_exhaustive() {
        for priority in PRIORITIES {
            for congestion_control in [CongestionControl::Drop, CongestionControl::Block] {
                for express in [false, true] {
                    for reliability in [Reliability::BestEffort, Reliability::Reliable] {
                        for locality in [
                            Locality::Any,
                            Locality::SessionLocal,
                            Locality::Remote,
                            Locality::Reserved,
                        ] {
                            let qos = Qos {
                                priority,
                                congestion_control,
                                express,
                                reliability,
                                locality,
                            };
                            assert_eq!(Qos::from_byte(qos.to_byte()), qos);
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_qos_bit_offsets() {
        let qos = Qos {
            priority: Priority::Background,
            congestion_control: CongestionControl::Block,
            express: true,
            reliability: Reliability::Reliable,
            locality: Locality::Reserved,
        };
        assert_eq!(qos.to_byte(), 0b1111_1111);

        let qos = Qos {
            priority: Priority::DataHigh,
            congestion_control: CongestionControl::Drop,
            express: true,
            reliability: Reliability::BestEffort,
            locality: Locality::Remote,
        };
        assert_eq!(qos.to_byte(), 0b1001_0100);
    }

    #[test]
    fn test_qos_every_byte_roundtrips() {
        for byte in 0..=u8::MAX {
            assert_eq!(Qos::from_byte(byte).to_byte(), byte);
        }
    }

    #[test]
    fn test_qos_default_byte() {
        // Data priority, drop, no express, reliable, any locality
        assert_eq!(Qos::default().to_byte(), 0b0010_0101);
    }

    #[test]
    fn test_query_settings_roundtrip() {
        for target in [
            QueryTarget::BestMatching,
            QueryTarget::All,
            QueryTarget::AllComplete,
        ] {
            for consolidation in [
                ConsolidationMode::Auto,
                ConsolidationMode::None,
                ConsolidationMode::Monotonic,
                ConsolidationMode::Latest,
            ] {
                for reply_key_expr in [ReplyKeyExprPolicy::MatchingQuery, ReplyKeyExprPolicy::Any] {
                    let settings = QuerySettings {
                        target,
                        consolidation,
                        reply_key_expr,
                    };
                    assert_eq!(QuerySettings::from_byte(settings.to_byte()), Ok(settings));
                }
            }
        }
    }

    #[test]
    fn test_query_settings_bit_offsets() {
        let settings = QuerySettings {
            target: QueryTarget::AllComplete,
            consolidation: ConsolidationMode::Latest,
            reply_key_expr: ReplyKeyExprPolicy::Any,
        };
        assert_eq!(settings.to_byte(), 0b0001_1110);
    }

    #[test]
    fn test_query_settings_rejects_reserved_bits() {
        assert!(matches!(
            QuerySettings::from_byte(0b0100_0000),
            Err(ProtocolError::InvalidQuerySettings(_))
        ));
        assert!(matches!(
            QuerySettings::from_byte(0b1000_0000),
            Err(ProtocolError::InvalidQuerySettings(_))
        ));
        // target value 3 is unassigned
        assert!(matches!(
            QuerySettings::from_byte(0b0000_0011),
            Err(ProtocolError::InvalidQuerySettings(_))
        ));
        // reply-key-expr value 2 is unassigned
        assert!(matches!(
            QuerySettings::from_byte(0b0010_0000),
            Err(ProtocolError::InvalidQuerySettings(_))
        ));
    }
}
