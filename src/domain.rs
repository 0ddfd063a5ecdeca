//! Shared value types exchanged between services through SSOT artifacts.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Order side for positions and signal candidates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// One open position as recorded by the position recorder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionEntry {
    pub symbol: String,
    pub side: Side,
    pub quantity: Decimal,
}

/// Positions snapshot artifact payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionsSnapshot {
    pub timestamp: f64,
    pub positions: Vec<PositionEntry>,
    pub position_count: usize,
}

/// One signal candidate emitted by the signal service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalCandidate {
    pub trace_id: Uuid,
    pub symbol: String,
    pub side: Side,
    pub score: f64,
}

impl SignalCandidate {
    pub fn new(symbol: &str, side: Side, score: f64) -> Self {
        Self {
            trace_id: Uuid::new_v4(),
            symbol: symbol.to_uppercase(),
            side,
            score,
        }
    }
}

/// Data-bus snapshot artifact payload written by the feeder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabusSnapshot {
    pub timestamp: f64,
    pub symbols: Vec<String>,
    pub prices: BTreeMap<String, Decimal>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_side_display() {
        assert_eq!(Side::Buy.to_string(), "BUY");
        assert_eq!(Side::Sell.to_string(), "SELL");
    }

    #[test]
    fn test_candidate_uppercases_symbol() {
        let candidate = SignalCandidate::new("btcusdt", Side::Buy, 0.8);
        assert_eq!(candidate.symbol, "BTCUSDT");
    }

    #[test]
    fn test_position_entry_roundtrip() {
        let entry = PositionEntry {
            symbol: "ETHUSDT".to_string(),
            side: Side::Sell,
            quantity: dec!(0.25),
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["side"], "SELL");
        let back: PositionEntry = serde_json::from_value(json).unwrap();
        assert_eq!(back.symbol, "ETHUSDT");
    }
}
