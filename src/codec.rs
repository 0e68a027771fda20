//! Fixed-width bit packing for search labels.
//!
//! Node id layout (34 bits, most significant first):
//!
//! ```text
//! tag:3 | has_number:1 | number:10 | has_suffix:1 | level:9 | capacity:10
//! ```
//!
//! Label layout (196 bits, zero padded to 25 bytes, big-endian):
//!
//! ```text
//! duration×10:22 | power×1000:22 (signed) | cost×100:20 |
//! predecessor:32 | id:32 | node:34 | preceding node:34
//! ```

use serde::{Deserialize, Serialize};

use crate::error::CodecError;
use crate::label::{Label, LabelId, NodeId, NodeKind};

const TAG_BITS: u32 = 3;
const NUMBER_BITS: u32 = 10;
const LEVEL_BITS: u32 = 9;
const CAPACITY_BITS: u32 = 10;
pub const NODE_ID_BITS: u32 = TAG_BITS + 1 + NUMBER_BITS + 1 + LEVEL_BITS + CAPACITY_BITS;

const MAX_NUMBER: u16 = 999;

const DURATION_BITS: u32 = 22;
const POWER_BITS: u32 = 22;
const COST_BITS: u32 = 20;
const INDEX_BITS: u32 = 32;

pub const LABEL_BITS: u32 =
    DURATION_BITS + POWER_BITS + COST_BITS + 2 * INDEX_BITS + 2 * NODE_ID_BITS;
pub const LABEL_BYTES: usize = LABEL_BITS.div_ceil(8) as usize;

fn tag(kind: NodeKind) -> u64 {
    match kind {
        NodeKind::Start => 0b000,
        NodeKind::Approach => 0b001,
        NodeKind::Return => 0b010,
        NodeKind::Entry => 0b011,
        NodeKind::ChargeLevel => 0b100,
        NodeKind::Exit => 0b101,
        NodeKind::Destination => 0b110,
    }
}

fn kind_from_tag(value: u64) -> Result<NodeKind, CodecError> {
    NodeKind::ALL
        .into_iter()
        .find(|kind| tag(*kind) == value)
        .ok_or(CodecError::UnknownTag(value as u8))
}

fn check_width(field: &'static str, value: u64, bits: u32) -> Result<u64, CodecError> {
    if value >> bits != 0 {
        return Err(CodecError::FieldOverflow {
            field,
            value: value as i64,
            bits,
        });
    }
    Ok(value)
}

/// Packs a node id into the low 34 bits of a `u64`. `s` packs to zero.
pub fn encode_node_id(id: &NodeId) -> Result<u64, CodecError> {
    let mut packed = tag(id.kind);

    packed <<= 1 + NUMBER_BITS;
    if let Some(number) = id.number {
        if number > MAX_NUMBER {
            return Err(CodecError::FieldOverflow {
                field: "node number",
                value: number.into(),
                bits: NUMBER_BITS,
            });
        }
        packed |= 1 << NUMBER_BITS | u64::from(number);
    }

    packed <<= 1 + LEVEL_BITS + CAPACITY_BITS;
    if let Some((level, capacity)) = id.suffix {
        let level = check_width("charge level", level.into(), LEVEL_BITS)?;
        let capacity = check_width("outlet capacity", capacity.into(), CAPACITY_BITS)?;
        packed |= 1 << (LEVEL_BITS + CAPACITY_BITS) | level << CAPACITY_BITS | capacity;
    }

    Ok(packed)
}

/// Inverse of [`encode_node_id`]. Bits above the low 34 are ignored.
pub fn decode_node_id(packed: u64) -> Result<NodeId, CodecError> {
    let field = |shift: u32, bits: u32| (packed >> shift) & ((1 << bits) - 1);

    let suffix_shift = LEVEL_BITS + CAPACITY_BITS;
    let number_shift = suffix_shift + 1;
    let tag_shift = number_shift + NUMBER_BITS + 1;

    let kind = kind_from_tag(field(tag_shift, TAG_BITS))?;
    let number = (field(number_shift + NUMBER_BITS, 1) == 1)
        .then(|| field(number_shift, NUMBER_BITS) as u16);
    let suffix = (field(suffix_shift, 1) == 1).then(|| {
        (
            field(CAPACITY_BITS, LEVEL_BITS) as u16,
            field(0, CAPACITY_BITS) as u16,
        )
    });

    Ok(NodeId {
        kind,
        number,
        suffix,
    })
}

/// The persisted subset of a [`Label`], as recovered from a buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackedLabel {
    pub cumulative_duration: f64,
    pub cumulative_power: f64,
    pub cumulative_financial_cost: f64,
    pub predecessor: LabelId,
    pub id: LabelId,
    pub node: NodeId,
    pub preceding_node: Option<NodeId>,
}

impl From<&Label> for PackedLabel {
    fn from(label: &Label) -> Self {
        Self {
            cumulative_duration: label.cumulative_duration,
            cumulative_power: label.cumulative_power,
            cumulative_financial_cost: label.cumulative_financial_cost,
            predecessor: label.predecessor,
            id: label.id,
            node: label.node,
            preceding_node: label.preceding_node,
        }
    }
}

/// Packs a label into [`LABEL_BYTES`] bytes.
///
/// Values are stored in fixed point: 0.1 s, 0.001 kWh and 0.01 currency
/// units. Anything that does not fit its field is rejected, never clamped.
pub fn encode_label(label: &Label) -> Result<Vec<u8>, CodecError> {
    let duration = fixed_point("cumulative duration", label.cumulative_duration, 10.0)?;
    let power = fixed_point("cumulative power", label.cumulative_power, 1000.0)?;
    let cost = fixed_point("cumulative financial cost", label.cumulative_financial_cost, 100.0)?;

    let duration = unsigned("cumulative duration", duration, DURATION_BITS)?;
    let power = signed("cumulative power", power, POWER_BITS)?;
    let cost = unsigned("cumulative financial cost", cost, COST_BITS)?;

    let node = encode_node_id(&label.node)?;
    let preceding = encode_node_id(&label.preceding_node.unwrap_or_else(NodeId::start))?;

    let mut writer = BitWriter::with_capacity(LABEL_BYTES);
    writer.write(duration, DURATION_BITS);
    writer.write(power, POWER_BITS);
    writer.write(cost, COST_BITS);
    writer.write(label.predecessor.0.into(), INDEX_BITS);
    writer.write(label.id.0.into(), INDEX_BITS);
    writer.write(node, NODE_ID_BITS);
    writer.write(preceding, NODE_ID_BITS);
    Ok(writer.finish())
}

/// Inverse of [`encode_label`]. A preceding node of `s` on a label that is
/// itself at `s` means "no preceding node".
pub fn decode_label(buffer: &[u8]) -> Result<PackedLabel, CodecError> {
    if buffer.len() != LABEL_BYTES {
        return Err(CodecError::BufferLength {
            expected: LABEL_BYTES,
            actual: buffer.len(),
        });
    }
    let mut reader = BitReader::new(buffer);
    let duration = reader.read(DURATION_BITS);
    let power = sign_extend(reader.read(POWER_BITS), POWER_BITS);
    let cost = reader.read(COST_BITS);
    let predecessor = LabelId(reader.read(INDEX_BITS) as u32);
    let id = LabelId(reader.read(INDEX_BITS) as u32);
    let node = decode_node_id(reader.read(NODE_ID_BITS))?;
    let preceding = decode_node_id(reader.read(NODE_ID_BITS))?;

    let preceding_node = if node.is_start() && preceding.is_start() {
        None
    } else {
        Some(preceding)
    };

    Ok(PackedLabel {
        cumulative_duration: duration as f64 / 10.0,
        cumulative_power: power as f64 / 1000.0,
        cumulative_financial_cost: cost as f64 / 100.0,
        predecessor,
        id,
        node,
        preceding_node,
    })
}

fn fixed_point(field: &'static str, value: f64, scale: f64) -> Result<i64, CodecError> {
    let scaled = (value * scale).round();
    if !scaled.is_finite() || scaled.abs() > i64::MAX as f64 / 2.0 {
        return Err(CodecError::FieldOverflow {
            field,
            value: i64::MAX,
            bits: 64,
        });
    }
    Ok(scaled as i64)
}

fn unsigned(field: &'static str, value: i64, bits: u32) -> Result<u64, CodecError> {
    if value < 0 || value >> bits != 0 {
        return Err(CodecError::FieldOverflow { field, value, bits });
    }
    Ok(value as u64)
}

fn signed(field: &'static str, value: i64, bits: u32) -> Result<u64, CodecError> {
    let limit = 1i64 << (bits - 1);
    if value < -limit || value >= limit {
        return Err(CodecError::FieldOverflow { field, value, bits });
    }
    Ok((value as u64) & ((1u64 << bits) - 1))
}

fn sign_extend(value: u64, bits: u32) -> i64 {
    let shift = 64 - bits;
    ((value << shift) as i64) >> shift
}

/// Appends big-endian bit fields to a byte buffer.
struct BitWriter {
    bytes: Vec<u8>,
    used: u32,
}

impl BitWriter {
    fn with_capacity(bytes: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(bytes),
            used: 0,
        }
    }

    fn write(&mut self, value: u64, bits: u32) {
        for shift in (0..bits).rev() {
            if self.used % 8 == 0 {
                self.bytes.push(0);
            }
            let bit = ((value >> shift) & 1) as u8;
            if let Some(last) = self.bytes.last_mut() {
                *last |= bit << (7 - self.used % 8);
            }
            self.used += 1;
        }
    }

    fn finish(self) -> Vec<u8> {
        self.bytes
    }
}

struct BitReader<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> BitReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, position: 0 }
    }

    /// Callers check the buffer length up front.
    fn read(&mut self, bits: u32) -> u64 {
        let mut value = 0u64;
        for _ in 0..bits {
            let byte = self.bytes.get(self.position / 8).copied().unwrap_or(0);
            let bit = (byte >> (7 - self.position % 8)) & 1;
            value = value << 1 | u64::from(bit);
            self.position += 1;
        }
        value
    }
}
