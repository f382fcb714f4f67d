use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("bad magic: 0x{found:016x}")]
    BadMagic { found: u64 },

    #[error("unsupported bytecode version: {0}")]
    UnsupportedVersion(u32),

    #[error("truncated input at offset {offset} (wanted {wanted} bytes, {available} available)")]
    Truncated { offset: usize, wanted: usize, available: usize },

    #[error("malformed {table}: {reason}")]
    MalformedTable { table: &'static str, reason: String },
}

impl ParseError {
    pub(crate) fn malformed(table: &'static str, reason: impl Into<String>) -> Self {
        ParseError::MalformedTable { table, reason: reason.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unknown opcode 0x{opcode:02x} at offset {offset}")]
    UnknownOpcode { offset: usize, opcode: u8 },

    #[error("truncated instruction 0x{opcode:02x} at offset {offset} (needs {wanted} bytes, {available} remaining)")]
    Truncated { offset: usize, opcode: u8, wanted: usize, available: usize },

    #[error("function {0} does not exist")]
    NoSuchFunction(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("operand {operand} of {mnemonic} (value {value}) does not fit its width")]
    OperandOverflow { mnemonic: &'static str, operand: usize, value: i64 },

    #[error("operand {operand} of {mnemonic}: expected {expected}")]
    OperandMismatch { mnemonic: &'static str, operand: usize, expected: &'static str },

    #[error("instruction {instruction} ({mnemonic}) refers to label {target}, past the end of the function")]
    UnresolvedReference { instruction: usize, mnemonic: &'static str, target: usize },

    #[error("value {value} does not fit field {field}")]
    FieldOverflow { field: &'static str, value: u64 },

    #[error("string {index} cannot be encoded: {reason}")]
    UnencodableString { index: usize, reason: String },

    #[error("function {0} does not exist")]
    NoSuchFunction(usize),

    #[error("string {0} does not exist")]
    NoSuchString(usize),
}

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("destination already exists: {0:?} (use force to overwrite)")]
    DestinationExists(PathBuf),

    #[error("{unit}:{line}: {reason}")]
    MalformedUnit { unit: String, line: usize, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    TomlRead(#[from] toml::de::Error),

    #[error(transparent)]
    TomlWrite(#[from] toml::ser::Error),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("function {function}: {source}")]
    Decode { function: usize, source: DecodeError },

    #[error(transparent)]
    Encode(#[from] EncodeError),
}

impl ProjectError {
    pub(crate) fn malformed(unit: &str, line: usize, reason: impl Into<String>) -> Self {
        ProjectError::MalformedUnit { unit: unit.to_string(), line, reason: reason.into() }
    }
}
