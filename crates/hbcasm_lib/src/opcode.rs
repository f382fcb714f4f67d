//! Per-version opcode tables.
//!
//! The tables are generated by `build.rs` from `defs/hbc<N>.def`; the opcode
//! value of an entry is its position in the definition file.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandType {
    Reg8,
    Reg32,
    UInt8,
    UInt16,
    UInt32,
    Addr8,
    Addr32,
    Imm32,
    Double,
}

impl OperandType {
    pub fn width(self) -> usize {
        match self {
            OperandType::Reg8 | OperandType::UInt8 | OperandType::Addr8 => 1,
            OperandType::UInt16 => 2,
            OperandType::Reg32
            | OperandType::UInt32
            | OperandType::Addr32
            | OperandType::Imm32 => 4,
            OperandType::Double => 8,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            OperandType::Reg8 => "Reg8",
            OperandType::Reg32 => "Reg32",
            OperandType::UInt8 => "UInt8",
            OperandType::UInt16 => "UInt16",
            OperandType::UInt32 => "UInt32",
            OperandType::Addr8 => "Addr8",
            OperandType::Addr32 => "Addr32",
            OperandType::Imm32 => "Imm32",
            OperandType::Double => "Double",
        }
    }
}

/// How an unsigned operand is interpreted beyond its width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandRole {
    Plain,
    /// Index into the string table.
    StringId,
    /// Offset of out-of-line data (switch tables), relative to the instruction start.
    DataOffset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperandSpec {
    pub ty: OperandType,
    pub role: OperandRole,
}

impl OperandSpec {
    pub fn describe(&self) -> &'static str {
        match self.role {
            OperandRole::Plain => self.ty.name(),
            OperandRole::StringId => "string id",
            OperandRole::DataOffset => "data offset",
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct OpcodeInfo {
    pub name: &'static str,
    pub operands: &'static [OperandSpec],
}

impl OpcodeInfo {
    /// Encoded size: the opcode byte plus every operand.
    pub fn byte_len(&self) -> usize {
        1 + self.operands.iter().map(|o| o.ty.width()).sum::<usize>()
    }
}

mod tables {
    use super::{OpcodeInfo, OperandRole, OperandSpec, OperandType};

    include!(concat!(env!("OUT_DIR"), "/opcode_tables.rs"));
}

#[derive(Debug, Clone, Copy)]
pub struct OpcodeTable {
    pub version: u32,
    opcodes: &'static [OpcodeInfo],
}

pub const V62: OpcodeTable = OpcodeTable { version: 62, opcodes: tables::OPCODES_V62 };
pub const V74: OpcodeTable = OpcodeTable { version: 74, opcodes: tables::OPCODES_V74 };

impl OpcodeTable {
    pub fn get(&self, opcode: u8) -> Option<&'static OpcodeInfo> {
        self.opcodes.get(opcode as usize)
    }

    pub fn lookup(&self, mnemonic: &str) -> Option<(u8, &'static OpcodeInfo)> {
        self.opcodes
            .iter()
            .position(|o| o.name == mnemonic)
            .map(|i| (i as u8, &self.opcodes[i]))
    }

    /// Mnemonic index for callers that resolve many names.
    pub fn mnemonics(&self) -> HashMap<&'static str, u8> {
        self.opcodes.iter().enumerate().map(|(i, o)| (o.name, i as u8)).collect()
    }

    pub fn len(&self) -> usize {
        self.opcodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.opcodes.is_empty()
    }
}
