//! Version registry: one data-driven schema per supported bytecode version.

use crate::error::ParseError;
use crate::io::BitField;
use crate::opcode::{self, OpcodeTable};

pub const MAGIC: u64 = 0x1F19_03C1_03BC_1FC6;
pub const HEADER_SIZE: usize = 128;

/// Function header flag marking a small header that points at a large one.
pub const FLAG_OVERFLOWED: u8 = 1 << 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StringKind {
    String,
    Identifier,
    Predefined,
}

impl StringKind {
    pub fn tag(self) -> char {
        match self {
            StringKind::String => 's',
            StringKind::Identifier => 'i',
            StringKind::Predefined => 'p',
        }
    }

    pub fn from_tag(tag: char) -> Option<Self> {
        match tag {
            's' => Some(StringKind::String),
            'i' => Some(StringKind::Identifier),
            'p' => Some(StringKind::Predefined),
            _ => None,
        }
    }
}

/// File regions that follow the header, in file order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Functions,
    StringKinds,
    Identifiers,
    Strings,
    OverflowStrings,
    StringStorage,
    ArrayBuffer,
    ObjKeyBuffer,
    ObjValueBuffer,
    RegExps,
    RegExpStorage,
    CjsModules,
}

impl Section {
    pub const ORDER: [Section; 12] = [
        Section::Functions,
        Section::StringKinds,
        Section::Identifiers,
        Section::Strings,
        Section::OverflowStrings,
        Section::StringStorage,
        Section::ArrayBuffer,
        Section::ObjKeyBuffer,
        Section::ObjValueBuffer,
        Section::RegExps,
        Section::RegExpStorage,
        Section::CjsModules,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Section::Functions => "function headers",
            Section::StringKinds => "string kinds",
            Section::Identifiers => "identifier hashes",
            Section::Strings => "string table",
            Section::OverflowStrings => "overflow string table",
            Section::StringStorage => "string storage",
            Section::ArrayBuffer => "array buffer",
            Section::ObjKeyBuffer => "object key buffer",
            Section::ObjValueBuffer => "object value buffer",
            Section::RegExps => "regexp table",
            Section::RegExpStorage => "regexp storage",
            Section::CjsModules => "cjs module table",
        }
    }

    /// Bytes per counted unit; blobs are counted in bytes.
    pub fn entry_size(self) -> usize {
        match self {
            Section::Functions => 16,
            Section::StringKinds | Section::Identifiers | Section::Strings => 4,
            Section::OverflowStrings | Section::RegExps | Section::CjsModules => 8,
            Section::StringStorage
            | Section::ArrayBuffer
            | Section::ObjKeyBuffer
            | Section::ObjValueBuffer
            | Section::RegExpStorage => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    U8,
    U32,
    U64,
    Bytes(usize),
}

impl FieldKind {
    pub fn width(self) -> usize {
        match self {
            FieldKind::U8 => 1,
            FieldKind::U32 => 4,
            FieldKind::U64 => 8,
            FieldKind::Bytes(n) => n,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderRole {
    Magic,
    Version,
    FileLength,
    DebugInfoOffset,
    Count(Section),
    /// Kept verbatim.
    Opaque,
}

impl HeaderRole {
    /// Whether serialization recomputes the value from the module contents.
    pub fn is_derived(self) -> bool {
        matches!(self, HeaderRole::FileLength | HeaderRole::DebugInfoOffset | HeaderRole::Count(_))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct HeaderField {
    pub name: &'static str,
    pub kind: FieldKind,
    pub role: HeaderRole,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FuncField {
    Offset,
    ParamCount,
    BytecodeSize,
    FunctionName,
    InfoOffset,
    FrameSize,
    EnvironmentSize,
    HighestReadCacheIndex,
    HighestWriteCacheIndex,
    Flags,
}

impl FuncField {
    pub fn name(self) -> &'static str {
        match self {
            FuncField::Offset => "offset",
            FuncField::ParamCount => "paramCount",
            FuncField::BytecodeSize => "bytecodeSizeInBytes",
            FuncField::FunctionName => "functionName",
            FuncField::InfoOffset => "infoOffset",
            FuncField::FrameSize => "frameSize",
            FuncField::EnvironmentSize => "environmentSize",
            FuncField::HighestReadCacheIndex => "highestReadCacheIndex",
            FuncField::HighestWriteCacheIndex => "highestWriteCacheIndex",
            FuncField::Flags => "flags",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrField {
    IsUtf16,
    Offset,
    Length,
}

impl StrField {
    pub fn name(self) -> &'static str {
        match self {
            StrField::IsUtf16 => "string isUTF16",
            StrField::Offset => "string offset",
            StrField::Length => "string length",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindRunField {
    Count,
    Kind,
}

#[derive(Debug)]
pub struct VersionSchema {
    pub version: u32,
    pub header: &'static [HeaderField],
    pub small_function_header: &'static [BitField<FuncField>],
    pub large_function_header: &'static [BitField<FuncField>],
    pub small_string_entry: &'static [BitField<StrField>],
    pub string_kind_run: &'static [BitField<KindRunField>],
    /// Kind values of a run, indexed by the run's kind field.
    pub string_kinds: &'static [StringKind],
    pub alignment: usize,
    pub opcodes: OpcodeTable,
}

impl VersionSchema {
    pub fn header_field(&self, name: &str) -> Option<&'static HeaderField> {
        self.header.iter().find(|f| f.name == name)
    }

    /// Inline length value that redirects a string entry to the overflow table.
    pub fn string_length_sentinel(&self) -> u64 {
        self.small_string_entry
            .iter()
            .find(|f| f.field == StrField::Length)
            .map(|f| (1u64 << f.bits) - 1)
            .unwrap_or(u64::MAX)
    }

    pub fn string_field_bits(&self, field: StrField) -> u8 {
        self.small_string_entry.iter().find(|f| f.field == field).map(|f| f.bits).unwrap_or(0)
    }

    pub fn kind_index(&self, kind: StringKind) -> Option<u64> {
        self.string_kinds.iter().position(|k| *k == kind).map(|i| i as u64)
    }
}

macro_rules! bits {
    ($($field:ident : $bits:expr),* $(,)?) => {
        &[$(BitField { field: $field, bits: $bits }),*]
    };
}

use FuncField::*;
use KindRunField::{Count as RunCount, Kind as RunKind};
use StrField::{IsUtf16, Length as StrLength, Offset as StrOffset};

const SMALL_FUNCTION_HEADER: &[BitField<FuncField>] = bits![
    Offset: 25,
    ParamCount: 7,
    BytecodeSize: 15,
    FunctionName: 17,
    InfoOffset: 25,
    FrameSize: 7,
    EnvironmentSize: 8,
    HighestReadCacheIndex: 8,
    HighestWriteCacheIndex: 8,
    Flags: 8,
];

const LARGE_FUNCTION_HEADER: &[BitField<FuncField>] = bits![
    Offset: 32,
    ParamCount: 32,
    BytecodeSize: 32,
    FunctionName: 32,
    InfoOffset: 32,
    FrameSize: 32,
    EnvironmentSize: 32,
    HighestReadCacheIndex: 8,
    HighestWriteCacheIndex: 8,
    Flags: 8,
];

const SMALL_STRING_ENTRY: &[BitField<StrField>] = bits![IsUtf16: 1, StrOffset: 23, StrLength: 8];

const fn header_layout(segment_field: &'static str) -> [HeaderField; 21] {
    use FieldKind::*;
    use HeaderRole::*;
    [
        HeaderField { name: "magic", kind: U64, role: Magic },
        HeaderField { name: "version", kind: U32, role: Version },
        HeaderField { name: "sourceHash", kind: Bytes(20), role: Opaque },
        HeaderField { name: "fileLength", kind: U32, role: FileLength },
        HeaderField { name: "globalCodeIndex", kind: U32, role: Opaque },
        HeaderField { name: "functionCount", kind: U32, role: Count(Section::Functions) },
        HeaderField { name: "stringKindCount", kind: U32, role: Count(Section::StringKinds) },
        HeaderField { name: "identifierCount", kind: U32, role: Count(Section::Identifiers) },
        HeaderField { name: "stringCount", kind: U32, role: Count(Section::Strings) },
        HeaderField { name: "overflowStringCount", kind: U32, role: Count(Section::OverflowStrings) },
        HeaderField { name: "stringStorageSize", kind: U32, role: Count(Section::StringStorage) },
        HeaderField { name: "regExpCount", kind: U32, role: Count(Section::RegExps) },
        HeaderField { name: "regExpStorageSize", kind: U32, role: Count(Section::RegExpStorage) },
        HeaderField { name: "arrayBufferSize", kind: U32, role: Count(Section::ArrayBuffer) },
        HeaderField { name: "objKeyBufferSize", kind: U32, role: Count(Section::ObjKeyBuffer) },
        HeaderField { name: "objValueBufferSize", kind: U32, role: Count(Section::ObjValueBuffer) },
        HeaderField { name: segment_field, kind: U32, role: Opaque },
        HeaderField { name: "cjsModuleCount", kind: U32, role: Count(Section::CjsModules) },
        HeaderField { name: "debugInfoOffset", kind: U32, role: DebugInfoOffset },
        HeaderField { name: "option", kind: U8, role: Opaque },
        HeaderField { name: "padding", kind: Bytes(31), role: Opaque },
    ]
}

static HEADER_V62: [HeaderField; 21] = header_layout("cjsModuleOffset");
static HEADER_V74: [HeaderField; 21] = header_layout("segmentID");

pub static SCHEMA_V62: VersionSchema = VersionSchema {
    version: 62,
    header: &HEADER_V62,
    small_function_header: SMALL_FUNCTION_HEADER,
    large_function_header: LARGE_FUNCTION_HEADER,
    small_string_entry: SMALL_STRING_ENTRY,
    string_kind_run: bits![RunCount: 30, RunKind: 2],
    string_kinds: &[StringKind::String, StringKind::Identifier, StringKind::Predefined],
    alignment: 4,
    opcodes: opcode::V62,
};

pub static SCHEMA_V74: VersionSchema = VersionSchema {
    version: 74,
    header: &HEADER_V74,
    small_function_header: SMALL_FUNCTION_HEADER,
    large_function_header: LARGE_FUNCTION_HEADER,
    small_string_entry: SMALL_STRING_ENTRY,
    string_kind_run: bits![RunCount: 31, RunKind: 1],
    string_kinds: &[StringKind::String, StringKind::Identifier],
    alignment: 4,
    opcodes: opcode::V74,
};

static SCHEMAS: [&VersionSchema; 2] = [&SCHEMA_V62, &SCHEMA_V74];

pub fn resolve(version: u32) -> Result<&'static VersionSchema, ParseError> {
    SCHEMAS
        .iter()
        .copied()
        .find(|s| s.version == version)
        .ok_or(ParseError::UnsupportedVersion(version))
}

pub fn supported_versions() -> impl Iterator<Item = u32> {
    SCHEMAS.iter().map(|s| s.version)
}
