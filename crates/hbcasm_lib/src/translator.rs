//! Instruction codec: bytecode <-> structured instructions.
//!
//! Jump displacements are relative to the start of the jumping instruction.
//! [`Decoder`] yields them as absolute byte offsets; [`disassemble`] turns the
//! ones that land on an instruction boundary into instruction indices, and
//! [`assemble`] converts them back to displacements.

use std::collections::HashMap;
use std::fmt;

use crate::error::{DecodeError, EncodeError};
use crate::io::{Reader, Writer, fits};
use crate::opcode::{OpcodeInfo, OpcodeTable, OperandRole, OperandSpec, OperandType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpTarget {
    /// Instruction index; the instruction count addresses the end of the stream.
    Index(usize),
    /// Byte offset from the start of the function.
    Offset(i64),
}

#[derive(Debug, Clone, Copy)]
pub enum Operand {
    Reg(u32),
    UInt(u32),
    Imm(i32),
    Double(f64),
    String(u32),
    /// Relative offset of out-of-line data.
    Data(u32),
    Target(JumpTarget),
}

impl PartialEq for Operand {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Operand::Reg(a), Operand::Reg(b)) => a == b,
            (Operand::UInt(a), Operand::UInt(b)) => a == b,
            (Operand::Imm(a), Operand::Imm(b)) => a == b,
            (Operand::Double(a), Operand::Double(b)) => a.to_bits() == b.to_bits(),
            (Operand::String(a), Operand::String(b)) => a == b,
            (Operand::Data(a), Operand::Data(b)) => a == b,
            (Operand::Target(a), Operand::Target(b)) => a == b,
            _ => false,
        }
    }
}

/// Shortest text for a double that parses back to the same bits.
pub fn format_double(v: f64) -> String {
    let text = format!("{v:?}");
    match text.parse::<f64>() {
        Ok(back) if back.to_bits() == v.to_bits() => text,
        _ => format!("f64:0x{:016x}", v.to_bits()),
    }
}

pub fn parse_double(text: &str) -> Option<f64> {
    match text.strip_prefix("f64:0x") {
        Some(bits) => u64::from_str_radix(bits, 16).ok().map(f64::from_bits),
        None => text.parse().ok(),
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Reg(r) => write!(f, "r{r}"),
            Operand::UInt(v) | Operand::Data(v) => write!(f, "{v}"),
            Operand::Imm(v) => write!(f, "{v}"),
            Operand::Double(v) => f.write_str(&format_double(*v)),
            Operand::String(id) => write!(f, "s{id}"),
            Operand::Target(JumpTarget::Index(i)) => write!(f, "L{i}"),
            Operand::Target(JumpTarget::Offset(o)) => write!(f, "@{o}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub opcode: u8,
    pub info: &'static OpcodeInfo,
    pub operands: Vec<Operand>,
}

impl Instruction {
    pub fn mnemonic(&self) -> &'static str {
        self.info.name
    }

    pub fn byte_len(&self) -> usize {
        self.info.byte_len()
    }

    pub fn targets(&self) -> impl Iterator<Item = JumpTarget> + '_ {
        self.operands.iter().filter_map(|o| match o {
            Operand::Target(t) => Some(*t),
            _ => None,
        })
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())?;
        for (i, op) in self.operands.iter().enumerate() {
            f.write_str(if i == 0 { "\t" } else { ", " })?;
            write!(f, "{op}")?;
        }
        Ok(())
    }
}

/// Lazy decoder over one function's bytecode. Decoding stops at the end of the
/// bytes or at the first switch table, whichever comes first.
#[derive(Debug, Clone)]
pub struct Decoder<'a> {
    bytes: &'a [u8],
    table: OpcodeTable,
    pos: usize,
    /// Start of the earliest out-of-line data seen so far.
    boundary: usize,
    failed: bool,
}

impl<'a> Decoder<'a> {
    pub fn new(bytes: &'a [u8], table: OpcodeTable) -> Self {
        Self { bytes, table, pos: 0, boundary: bytes.len(), failed: false }
    }

    /// Bytes after the last decoded instruction. Meaningful once the decoder is exhausted.
    pub fn trailer(&self) -> &'a [u8] {
        &self.bytes[self.pos.min(self.bytes.len())..]
    }

    fn decode_one(&mut self) -> Result<(usize, Instruction), DecodeError> {
        let offset = self.pos;
        let opcode = self.bytes[offset];
        let info = self.table.get(opcode).ok_or(DecodeError::UnknownOpcode { offset, opcode })?;
        let size = info.byte_len();
        let available = self.bytes.len() - offset;
        let truncated = || DecodeError::Truncated { offset, opcode, wanted: size, available };
        if available < size {
            return Err(truncated());
        }

        let mut r = Reader::at(self.bytes, offset + 1);
        let mut operands = Vec::with_capacity(info.operands.len());
        for spec in info.operands {
            let op = read_operand(&mut r, spec, offset).map_err(|_| truncated())?;
            if let Operand::Data(rel) = op {
                self.boundary = self.boundary.min(offset + rel as usize);
            }
            operands.push(op);
        }
        self.pos = r.pos();
        Ok((offset, Instruction { opcode, info, operands }))
    }
}

fn read_operand(r: &mut Reader<'_>, spec: &OperandSpec, insn: usize) -> Result<Operand, crate::io::Eof> {
    Ok(match (spec.ty, spec.role) {
        (OperandType::Reg8, _) => Operand::Reg(r.get_u8()? as u32),
        (OperandType::Reg32, _) => Operand::Reg(r.get_u32()?),
        (OperandType::Imm32, _) => Operand::Imm(r.get_i32()?),
        (OperandType::Double, _) => Operand::Double(r.get_f64()?),
        (OperandType::Addr8, _) => Operand::Target(JumpTarget::Offset(insn as i64 + r.get_i8()? as i64)),
        (OperandType::Addr32, _) => Operand::Target(JumpTarget::Offset(insn as i64 + r.get_i32()? as i64)),
        (ty, role) => {
            let v = r.get_uint(ty.width())? as u32;
            match role {
                OperandRole::Plain => Operand::UInt(v),
                OperandRole::StringId => Operand::String(v),
                OperandRole::DataOffset => Operand::Data(v),
            }
        }
    })
}

impl Iterator for Decoder<'_> {
    type Item = Result<(usize, Instruction), DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.pos >= self.boundary.min(self.bytes.len()) {
            return None;
        }
        let item = self.decode_one();
        self.failed = item.is_err();
        Some(item)
    }
}

pub fn decode(bytes: &[u8], table: OpcodeTable) -> Decoder<'_> {
    Decoder::new(bytes, table)
}

/// Instructions of one function plus the out-of-line data that follows them.
#[derive(Debug, Clone, PartialEq)]
pub struct Disassembly {
    pub instructions: Vec<Instruction>,
    pub trailer: Vec<u8>,
}

impl Disassembly {
    pub fn assemble(&self) -> Result<Vec<u8>, EncodeError> {
        assemble(&self.instructions, &self.trailer)
    }

    /// Instruction indices that some jump refers to, ascending.
    pub fn labels(&self) -> Vec<usize> {
        let mut labels: Vec<usize> = self
            .instructions
            .iter()
            .flat_map(|i| i.targets())
            .filter_map(|t| match t {
                JumpTarget::Index(i) => Some(i),
                JumpTarget::Offset(_) => None,
            })
            .collect();
        labels.sort_unstable();
        labels.dedup();
        labels
    }
}

pub fn disassemble(bytes: &[u8], table: OpcodeTable) -> Result<Disassembly, DecodeError> {
    let mut decoder = decode(bytes, table);
    let mut offsets = Vec::new();
    let mut instructions = Vec::new();
    for item in decoder.by_ref() {
        let (offset, insn) = item?;
        offsets.push(offset);
        instructions.push(insn);
    }
    let trailer = decoder.trailer();

    let mut index: HashMap<i64, usize> = offsets.iter().enumerate().map(|(i, &o)| (o as i64, i)).collect();
    index.insert((bytes.len() - trailer.len()) as i64, instructions.len());

    for insn in &mut instructions {
        for op in &mut insn.operands {
            if let Operand::Target(JumpTarget::Offset(o)) = op {
                if let Some(&i) = index.get(o) {
                    *op = Operand::Target(JumpTarget::Index(i));
                }
            }
        }
    }

    Ok(Disassembly { instructions, trailer: trailer.to_vec() })
}

fn check(mnemonic: &'static str, operand: usize, value: i64, ok: bool) -> Result<(), EncodeError> {
    if ok { Ok(()) } else { Err(EncodeError::OperandOverflow { mnemonic, operand, value }) }
}

pub fn assemble(instructions: &[Instruction], trailer: &[u8]) -> Result<Vec<u8>, EncodeError> {
    let mut offsets = Vec::with_capacity(instructions.len() + 1);
    let mut pos = 0usize;
    for insn in instructions {
        offsets.push(pos);
        pos += insn.byte_len();
    }
    offsets.push(pos);

    let mut w = Writer::with_capacity(pos + trailer.len());
    for (n, insn) in instructions.iter().enumerate() {
        let name = insn.mnemonic();
        let specs = insn.info.operands;
        if insn.operands.len() != specs.len() {
            let operand = insn.operands.len().min(specs.len());
            let expected = specs.get(operand).map(|s| s.describe()).unwrap_or("no further operands");
            return Err(EncodeError::OperandMismatch { mnemonic: name, operand, expected });
        }

        w.put_u8(insn.opcode);
        for (k, (spec, op)) in specs.iter().zip(&insn.operands).enumerate() {
            let width = spec.ty.width();
            match (spec.ty, spec.role, op) {
                (OperandType::Reg8 | OperandType::Reg32, _, Operand::Reg(v))
                | (OperandType::UInt8 | OperandType::UInt16 | OperandType::UInt32, OperandRole::Plain, Operand::UInt(v))
                | (OperandType::UInt8 | OperandType::UInt16 | OperandType::UInt32, OperandRole::StringId, Operand::String(v))
                | (OperandType::UInt8 | OperandType::UInt16 | OperandType::UInt32, OperandRole::DataOffset, Operand::Data(v)) => {
                    check(name, k, *v as i64, fits(*v as u64, (width * 8) as u8))?;
                    w.put_uint(width, *v as u64);
                }
                (OperandType::Imm32, _, Operand::Imm(v)) => w.put_i32(*v),
                (OperandType::Double, _, Operand::Double(v)) => w.put_f64(*v),
                (OperandType::Addr8 | OperandType::Addr32, _, Operand::Target(t)) => {
                    let here = offsets[n] as i64;
                    let disp = match *t {
                        JumpTarget::Index(i) => match offsets.get(i) {
                            Some(&o) => o as i64 - here,
                            None => {
                                return Err(EncodeError::UnresolvedReference { instruction: n, mnemonic: name, target: i });
                            }
                        },
                        JumpTarget::Offset(o) => o - here,
                    };
                    if spec.ty == OperandType::Addr8 {
                        check(name, k, disp, i8::try_from(disp).is_ok())?;
                        w.put_u8(disp as i8 as u8);
                    } else {
                        check(name, k, disp, i32::try_from(disp).is_ok())?;
                        w.put_i32(disp as i32);
                    }
                }
                _ => {
                    return Err(EncodeError::OperandMismatch { mnemonic: name, operand: k, expected: spec.describe() });
                }
            }
        }
    }
    w.put_bytes(trailer);
    Ok(w.into_inner())
}
