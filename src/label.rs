//! Search labels and graph node identities.
//!
//! A [`NodeId`] is the short, human-readable identity of a graph node
//! (`s`, `a3`, `c3-50-150`, `d`, ...). It is what the label codec packs, so
//! it stays independent of the node's payload in the graph.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CodecError;

/// Role of a node in the charging graph. Letters match the node id text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeKind {
    Start,
    Approach,
    Return,
    Entry,
    ChargeLevel,
    Exit,
    Destination,
}

impl NodeKind {
    pub const ALL: [NodeKind; 7] = [
        NodeKind::Start,
        NodeKind::Approach,
        NodeKind::Return,
        NodeKind::Entry,
        NodeKind::ChargeLevel,
        NodeKind::Exit,
        NodeKind::Destination,
    ];

    pub fn letter(self) -> char {
        match self {
            NodeKind::Start => 's',
            NodeKind::Approach => 'a',
            NodeKind::Return => 'b',
            NodeKind::Entry => 'i',
            NodeKind::ChargeLevel => 'c',
            NodeKind::Exit => 'o',
            NodeKind::Destination => 'd',
        }
    }

    pub fn from_letter(letter: char) -> Option<Self> {
        NodeKind::ALL.into_iter().find(|kind| kind.letter() == letter)
    }
}

/// Identity of a graph node: `letter[number][-level-capacity]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    pub kind: NodeKind,
    pub number: Option<u16>,
    /// `(target percent, outlet capacity kW)` for charge-level nodes.
    pub suffix: Option<(u16, u16)>,
}

impl NodeId {
    pub const fn new(kind: NodeKind, number: Option<u16>, suffix: Option<(u16, u16)>) -> Self {
        Self {
            kind,
            number,
            suffix,
        }
    }

    pub const fn start() -> Self {
        Self::new(NodeKind::Start, None, None)
    }

    pub const fn destination() -> Self {
        Self::new(NodeKind::Destination, None, None)
    }

    pub const fn approach(station: u16) -> Self {
        Self::new(NodeKind::Approach, Some(station), None)
    }

    pub const fn entry(station: u16) -> Self {
        Self::new(NodeKind::Entry, Some(station), None)
    }

    pub const fn charge_level(station: u16, percent: u16, capacity_kw: u16) -> Self {
        Self::new(
            NodeKind::ChargeLevel,
            Some(station),
            Some((percent, capacity_kw)),
        )
    }

    pub const fn exit(station: u16) -> Self {
        Self::new(NodeKind::Exit, Some(station), None)
    }

    pub const fn ret(station: u16) -> Self {
        Self::new(NodeKind::Return, Some(station), None)
    }

    pub fn is_start(&self) -> bool {
        self.kind == NodeKind::Start
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind.letter())?;
        if let Some(number) = self.number {
            write!(f, "{}", number)?;
        }
        if let Some((level, capacity)) = self.suffix {
            write!(f, "-{}-{}", level, capacity)?;
        }
        Ok(())
    }
}

impl FromStr for NodeId {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CodecError::InvalidNodeId(s.to_string());
        let mut chars = s.chars();
        let kind = chars
            .next()
            .and_then(NodeKind::from_letter)
            .ok_or_else(invalid)?;
        let rest = chars.as_str();

        let (number_text, suffix_text) = match rest.split_once('-') {
            Some((number, suffix)) => (number, Some(suffix)),
            None => (rest, None),
        };

        let parse_digits = |text: &str| -> Result<u16, CodecError> {
            if text.is_empty() || text.len() > 3 || !text.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            text.parse().map_err(|_| invalid())
        };

        let number = if number_text.is_empty() {
            None
        } else {
            Some(parse_digits(number_text)?)
        };

        let suffix = match suffix_text {
            None => None,
            Some(text) => {
                let (level, capacity) = text.split_once('-').ok_or_else(invalid)?;
                Some((parse_digits(level)?, parse_digits(capacity)?))
            }
        };

        Ok(NodeId {
            kind,
            number,
            suffix,
        })
    }
}

impl Serialize for NodeId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Index of a label within one search run. The start label is 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LabelId(pub u32);

impl fmt::Display for LabelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One partial path explored by the search. Never mutated once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Label {
    /// s
    pub cumulative_duration: f64,
    /// m
    pub cumulative_distance: f64,
    /// kWh drawn from the battery; negative after charging more than driving.
    pub cumulative_power: f64,
    pub cumulative_financial_cost: f64,
    /// s
    pub charging_duration: f64,
    /// kWh
    pub charging_energy: f64,
    pub charging_stops: u32,
    pub node: NodeId,
    pub preceding_node: Option<NodeId>,
    /// The label this one was extended from. The start label points at
    /// itself.
    pub predecessor: LabelId,
    pub id: LabelId,
}

impl Label {
    /// The all-zero label at the start node.
    pub fn start(node: NodeId) -> Self {
        Self {
            cumulative_duration: 0.0,
            cumulative_distance: 0.0,
            cumulative_power: 0.0,
            cumulative_financial_cost: 0.0,
            charging_duration: 0.0,
            charging_energy: 0.0,
            charging_stops: 0,
            node,
            preceding_node: None,
            predecessor: LabelId(0),
            id: LabelId(0),
        }
    }

    /// Battery charge left, kWh.
    pub fn state_of_charge(&self, initial_soc_kwh: f64) -> f64 {
        initial_soc_kwh - self.cumulative_power
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_parse() {
        for text in ["s", "d", "a0", "b12", "i999", "o7", "c3-50-150", "c0-100-22"] {
            let id: NodeId = text.parse().unwrap();
            assert_eq!(id.to_string(), text);
        }
        assert_eq!("c3-50-150".parse::<NodeId>().unwrap(), NodeId::charge_level(3, 50, 150));
        assert_eq!("a0".parse::<NodeId>().unwrap().number, Some(0));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for text in ["", "x1", "a1000", "c3-50", "a-1", "c3-50-x", "s 1"] {
            assert!(text.parse::<NodeId>().is_err(), "{:?} should not parse", text);
        }
    }

    #[test]
    fn test_node_id_serializes_as_string() {
        let json = serde_json::to_string(&NodeId::exit(4)).unwrap();
        assert_eq!(json, "\"o4\"");
        let back: NodeId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, NodeId::exit(4));
    }

    #[test]
    fn test_state_of_charge() {
        let mut label = Label::start(NodeId::start());
        label.cumulative_power = 4.5;
        assert_eq!(label.state_of_charge(20.0), 15.5);
    }
}
