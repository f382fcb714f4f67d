//! In-memory object model of a bytecode container and its accessor surface.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::container;
use crate::error::{DecodeError, EncodeError};
use crate::io::{BitField, Record, align_up, fits, record_len};
use crate::translator::{self, Disassembly, Instruction};
use crate::version::{FLAG_OVERFLOWED, FieldKind, FuncField, HeaderRole, MAGIC, StringKind, VersionSchema};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderValue {
    Uint(u64),
    Bytes(Vec<u8>),
}

/// Header values in schema order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    fields: Vec<(&'static str, HeaderValue)>,
}

impl Header {
    pub fn new(fields: Vec<(&'static str, HeaderValue)>) -> Self {
        Self { fields }
    }

    pub fn get(&self, name: &str) -> Option<&HeaderValue> {
        self.fields.iter().find(|(n, _)| *n == name).map(|(_, v)| v)
    }

    pub fn uint(&self, name: &str) -> Option<u64> {
        match self.get(name)? {
            HeaderValue::Uint(v) => Some(*v),
            HeaderValue::Bytes(_) => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &HeaderValue)> + '_ {
        self.fields.iter().map(|(n, v)| (*n, v))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringEntry {
    pub kind: StringKind,
    pub is_utf16: bool,
    /// Byte offset into string storage.
    pub offset: u32,
    /// Length in code units.
    pub length: u32,
    /// Identifier hash; present for identifiers only.
    pub hash: Option<u32>,
    /// Stored through the overflow table.
    pub overflowed: bool,
}

impl StringEntry {
    pub fn byte_len(&self) -> usize {
        if self.is_utf16 { self.length as usize * 2 } else { self.length as usize }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StringSpan {
    pub is_utf16: bool,
    pub offset: u32,
    /// Length in bytes.
    pub length: u32,
}

/// A file offset that either points into the code region (kept relative so
/// it follows the region when tables before it change size) or is kept verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Location {
    Code(usize),
    Absolute(u64),
}

impl Location {
    pub fn classify(value: u64, code_start: usize, code_end: usize) -> Self {
        if value >= code_start as u64 && value <= code_end as u64 {
            Location::Code(value as usize - code_start)
        } else {
            Location::Absolute(value)
        }
    }

    pub fn resolve(self, code_start: usize) -> u64 {
        match self {
            Location::Code(rel) => (code_start + rel) as u64,
            Location::Absolute(v) => v,
        }
    }
}

/// Where a function's bytecode lives in the code region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub offset: usize,
    pub capacity: usize,
}

/// Out-of-line header of a function whose values do not fit the small layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LargeHeader {
    /// Position of the record in the code region.
    pub location: usize,
    /// Small-header values written alongside.
    pub shadow: Record<FuncField>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionEntry {
    /// String table id of the function name.
    pub name: u32,
    pub param_count: u32,
    pub frame_size: u32,
    pub environment_size: u32,
    pub highest_read_cache_index: u8,
    pub highest_write_cache_index: u8,
    pub flags: u8,
    pub info_offset: Location,
    pub bytecode: Vec<u8>,
    pub slot: Slot,
    pub large: Option<LargeHeader>,
}

impl FunctionEntry {
    /// Header values with the two file offsets resolved by the caller.
    pub fn record(&self, layout: &[BitField<FuncField>], offset: u64, info_offset: u64) -> Record<FuncField> {
        let mut r = Record::zeroed(layout);
        r.set(FuncField::Offset, offset);
        r.set(FuncField::ParamCount, self.param_count as u64);
        r.set(FuncField::BytecodeSize, self.bytecode.len() as u64);
        r.set(FuncField::FunctionName, self.name as u64);
        r.set(FuncField::InfoOffset, info_offset);
        r.set(FuncField::FrameSize, self.frame_size as u64);
        r.set(FuncField::EnvironmentSize, self.environment_size as u64);
        r.set(FuncField::HighestReadCacheIndex, self.highest_read_cache_index as u64);
        r.set(FuncField::HighestWriteCacheIndex, self.highest_write_cache_index as u64);
        r.set(FuncField::Flags, self.flags as u64);
        r
    }
}

pub fn decode_string(is_utf16: bool, bytes: &[u8]) -> String {
    if is_utf16 {
        let units = bytes.chunks_exact(2).map(|c| u16::from_le_bytes([c[0], c[1]]));
        char::decode_utf16(units).map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER)).collect()
    } else {
        bytes.iter().map(|&b| b as char).collect()
    }
}

/// Encodes `value` in the narrow form when every character fits one byte.
pub fn encode_string(value: &str, prefer_utf16: bool) -> (bool, Vec<u8>) {
    if !prefer_utf16 {
        let narrow: Option<Vec<u8>> = value.chars().map(|c| u8::try_from(u32::from(c)).ok()).collect();
        if let Some(bytes) = narrow {
            return (false, bytes);
        }
    }
    (true, value.encode_utf16().flat_map(|u| u.to_le_bytes()).collect())
}

#[derive(Debug, Clone, PartialEq)]
pub enum FunctionBody<'a> {
    Raw(&'a [u8]),
    Decoded(Disassembly),
}

/// Function header values as they are written to the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionHeaderView {
    pub offset: usize,
    pub param_count: u32,
    pub bytecode_size: usize,
    pub function_name: u32,
    pub info_offset: u64,
    pub frame_size: u32,
    pub environment_size: u32,
    pub highest_read_cache_index: u8,
    pub highest_write_cache_index: u8,
    pub flags: u8,
    pub overflowed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionView<'a> {
    pub name: String,
    pub param_count: u32,
    pub register_count: u32,
    pub symbol_count: u32,
    pub body: FunctionBody<'a>,
    pub header: FunctionHeaderView,
}

#[derive(Debug, Clone)]
pub struct Module {
    pub(crate) schema: &'static VersionSchema,
    pub header: Header,
    pub strings: Vec<StringEntry>,
    pub string_storage: Vec<u8>,
    pub functions: Vec<FunctionEntry>,
    pub array_buffer: Vec<u8>,
    pub obj_key_buffer: Vec<u8>,
    pub obj_value_buffer: Vec<u8>,
    pub regexps: Vec<(u32, u32)>,
    pub regexp_storage: Vec<u8>,
    pub cjs_modules: Vec<(u32, u32)>,
    /// Bytes between the last table and the debug info: bytecode, function info, large headers.
    pub code: Vec<u8>,
    /// Bytes from the debug-info offset to the end of the file; `None` when the offset is zero.
    pub debug_info: Option<Vec<u8>>,
    pub(crate) code_start: usize,
}

impl Module {
    /// An empty module; the header carries the magic and version, everything else zeroed.
    pub fn new(schema: &'static VersionSchema) -> Self {
        let fields = schema
            .header
            .iter()
            .map(|f| {
                let value = match (f.role, f.kind) {
                    (HeaderRole::Magic, _) => HeaderValue::Uint(MAGIC),
                    (HeaderRole::Version, _) => HeaderValue::Uint(schema.version as u64),
                    (_, FieldKind::Bytes(n)) => HeaderValue::Bytes(vec![0; n]),
                    _ => HeaderValue::Uint(0),
                };
                (f.name, value)
            })
            .collect();
        Self {
            schema,
            header: Header::new(fields),
            strings: Vec::new(),
            string_storage: Vec::new(),
            functions: Vec::new(),
            array_buffer: Vec::new(),
            obj_key_buffer: Vec::new(),
            obj_value_buffer: Vec::new(),
            regexps: Vec::new(),
            regexp_storage: Vec::new(),
            cjs_modules: Vec::new(),
            code: Vec::new(),
            debug_info: None,
            code_start: 0,
        }
        .relaid()
    }

    fn relaid(mut self) -> Self {
        self.relayout();
        self
    }

    pub fn version(&self) -> u32 {
        self.schema.version
    }

    pub fn schema(&self) -> &'static VersionSchema {
        self.schema
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// File offset of the code region, as of the last parse, mutator call or
    /// [`Module::relayout`]. Editing the public tables directly leaves it stale.
    pub fn code_start(&self) -> usize {
        self.code_start
    }

    /// Recomputes the table layout after the public tables were edited directly.
    pub fn relayout(&mut self) {
        self.code_start = container::code_start(self);
    }

    pub fn function_count(&self) -> usize {
        self.functions.len()
    }

    pub fn function(&self, index: usize) -> Option<&FunctionEntry> {
        self.functions.get(index)
    }

    pub fn functions(&self) -> &[FunctionEntry] {
        &self.functions
    }

    pub fn string_count(&self) -> usize {
        self.strings.len()
    }

    pub fn string(&self, index: usize) -> Option<&StringEntry> {
        self.strings.get(index)
    }

    pub fn string_bytes(&self, index: usize) -> Option<&[u8]> {
        let s = self.strings.get(index)?;
        let start = s.offset as usize;
        self.string_storage.get(start..start + s.byte_len())
    }

    pub fn string_value(&self, index: usize) -> Option<String> {
        let s = self.strings.get(index)?;
        Some(decode_string(s.is_utf16, self.string_bytes(index)?))
    }

    pub fn get_string(&self, index: usize) -> Option<(String, StringSpan)> {
        let s = self.strings.get(index)?;
        let span = StringSpan { is_utf16: s.is_utf16, offset: s.offset, length: s.byte_len() as u32 };
        Some((self.string_value(index)?, span))
    }

    pub fn function_name(&self, index: usize) -> String {
        self.functions
            .get(index)
            .and_then(|f| self.string_value(f.name as usize))
            .unwrap_or_default()
    }

    pub fn function_disassembly(&self, index: usize) -> Result<Disassembly, DecodeError> {
        let f = self.functions.get(index).ok_or(DecodeError::NoSuchFunction(index))?;
        translator::disassemble(&f.bytecode, self.schema.opcodes)
    }

    pub fn get_function(&self, index: usize, disassemble: bool) -> Result<FunctionView<'_>, DecodeError> {
        let f = self.functions.get(index).ok_or(DecodeError::NoSuchFunction(index))?;
        let body = if disassemble {
            FunctionBody::Decoded(self.function_disassembly(index)?)
        } else {
            FunctionBody::Raw(&f.bytecode)
        };
        let code_start = self.code_start();
        Ok(FunctionView {
            name: self.function_name(index),
            param_count: f.param_count,
            register_count: f.frame_size,
            symbol_count: f.environment_size,
            body,
            header: FunctionHeaderView {
                offset: code_start + f.slot.offset,
                param_count: f.param_count,
                bytecode_size: f.bytecode.len(),
                function_name: f.name,
                info_offset: f.info_offset.resolve(code_start),
                frame_size: f.frame_size,
                environment_size: f.environment_size,
                highest_read_cache_index: f.highest_read_cache_index,
                highest_write_cache_index: f.highest_write_cache_index,
                flags: f.flags,
                overflowed: f.large.is_some(),
            },
        })
    }

    /// Replaces a function's bytecode, moving it to the end of the code region
    /// if it grew or its slot is shared with another function.
    pub fn set_function_bytecode(&mut self, index: usize, bytecode: Vec<u8>) -> Result<(), EncodeError> {
        let alignment = self.schema.alignment;
        let slot = self.functions.get(index).ok_or(EncodeError::NoSuchFunction(index))?.slot;
        let fits_slot = bytecode.len() <= slot.capacity;
        let unchanged = self.code.get(slot.offset..slot.offset + bytecode.len()) == Some(bytecode.as_slice());
        let owned = fits_slot && ((unchanged && bytecode.len() == slot.capacity) || !self.shares_slot(index));

        if !fits_slot || (!owned && !unchanged) {
            let offset = align_up(self.code.len(), alignment);
            self.code.resize(offset + bytecode.len(), 0);
            self.code[offset..].copy_from_slice(&bytecode);
            self.functions[index].slot = Slot { offset, capacity: bytecode.len() };
        } else if owned {
            let end = slot.offset + slot.capacity;
            if self.code.len() < end {
                self.code.resize(end, 0);
            }
            self.code[slot.offset..slot.offset + bytecode.len()].copy_from_slice(&bytecode);
            self.code[slot.offset + bytecode.len()..end].fill(0);
        }
        self.functions[index].bytecode = bytecode;
        self.fit_header(index)
    }

    pub fn set_function_instructions(
        &mut self,
        index: usize,
        instructions: &[Instruction],
        trailer: &[u8],
    ) -> Result<(), EncodeError> {
        let bytecode = translator::assemble(instructions, trailer)?;
        self.set_function_bytecode(index, bytecode)
    }

    pub fn set_function_signature(
        &mut self,
        index: usize,
        param_count: u32,
        register_count: u32,
        symbol_count: u32,
    ) -> Result<(), EncodeError> {
        let f = self.functions.get_mut(index).ok_or(EncodeError::NoSuchFunction(index))?;
        f.param_count = param_count;
        f.frame_size = register_count;
        f.environment_size = symbol_count;
        self.fit_header(index)
    }

    fn shares_slot(&self, index: usize) -> bool {
        let s = self.functions[index].slot;
        let end = s.offset + s.capacity;
        self.functions.iter().enumerate().any(|(i, o)| {
            let oe = o.slot.offset + o.slot.capacity;
            i != index && o.slot.offset < end && s.offset < oe
        })
    }

    /// Promotes the function to a large header when a value no longer fits the small one.
    /// File offsets are checked at serialization, once the layout is known.
    fn fit_header(&mut self, index: usize) -> Result<(), EncodeError> {
        let schema = self.schema;
        let f = &self.functions[index];
        let values = f.record(schema.large_function_header, 0, 0);
        if let Err((field, value)) = values.encode(schema.large_function_header) {
            return Err(EncodeError::FieldOverflow { field: field.name(), value });
        }
        if f.large.is_some() {
            return Ok(());
        }
        let overflows = schema.small_function_header.iter().any(|b| {
            !matches!(b.field, FuncField::Offset | FuncField::InfoOffset) && !fits(values.get(b.field), b.bits)
        });
        if overflows {
            self.promote(index);
        }
        Ok(())
    }

    /// Moves the function's header out of line, to the end of the code region.
    pub(crate) fn promote(&mut self, index: usize) {
        let schema = self.schema;
        let f = &self.functions[index];
        let values = f.record(schema.large_function_header, 0, 0);
        let mut shadow = Record::zeroed(schema.small_function_header);
        for b in schema.small_function_header {
            let v = values.get(b.field);
            if fits(v, b.bits) {
                shadow.set(b.field, v);
            }
        }
        shadow.set(FuncField::Flags, (f.flags | FLAG_OVERFLOWED) as u64);

        let location = align_up(self.code.len(), schema.alignment);
        self.code.resize(location + record_len(schema.large_function_header), 0);
        log::debug!("function {index}: promoted to a large header at code+{location}");
        self.functions[index].large = Some(LargeHeader { location, shadow });
    }

    /// Re-encodes a string, in place when the size is unchanged and no other
    /// string shares its bytes, otherwise appended to string storage.
    pub fn set_string(&mut self, index: usize, value: &str) -> Result<(), EncodeError> {
        let entry = self.strings.get(index).ok_or(EncodeError::NoSuchString(index))?;
        let (is_utf16, bytes) = encode_string(value, entry.is_utf16);
        self.set_string_bytes(index, is_utf16, bytes)
    }

    pub fn set_string_bytes(&mut self, index: usize, is_utf16: bool, bytes: Vec<u8>) -> Result<(), EncodeError> {
        if index >= self.strings.len() {
            return Err(EncodeError::NoSuchString(index));
        }
        if is_utf16 && bytes.len() % 2 != 0 {
            return Err(EncodeError::UnencodableString { index, reason: "odd UTF-16 byte length".into() });
        }
        let length = if is_utf16 { bytes.len() / 2 } else { bytes.len() };
        let length = u32::try_from(length)
            .map_err(|_| EncodeError::UnencodableString { index, reason: "string too long".into() })?;

        let entry = &self.strings[index];
        if entry.is_utf16 == is_utf16 && self.string_bytes(index) == Some(bytes.as_slice()) {
            return Ok(());
        }

        let start = entry.offset as usize;
        let in_place = entry.byte_len() == bytes.len()
            && start + bytes.len() <= self.string_storage.len()
            && !self.shares_storage(index);
        if in_place {
            self.string_storage[start..start + bytes.len()].copy_from_slice(&bytes);
            let entry = &mut self.strings[index];
            entry.is_utf16 = is_utf16;
            entry.length = length;
            return Ok(());
        }

        let offset = u32::try_from(self.string_storage.len())
            .map_err(|_| EncodeError::UnencodableString { index, reason: "string storage exceeds 4 GiB".into() })?;
        self.string_storage.extend_from_slice(&bytes);
        let entry = &mut self.strings[index];
        entry.is_utf16 = is_utf16;
        entry.offset = offset;
        entry.length = length;
        entry.overflowed = false;
        self.relayout();
        Ok(())
    }

    fn shares_storage(&self, index: usize) -> bool {
        let s = &self.strings[index];
        let (start, end) = (s.offset as usize, s.offset as usize + s.byte_len());
        self.strings.iter().enumerate().any(|(i, o)| {
            let (os, oe) = (o.offset as usize, o.offset as usize + o.byte_len());
            i != index && os < end && start < oe
        })
    }

    /// Structural view of every modeled attribute, independent of binary placement.
    pub fn projection(&self) -> Value {
        let mut header = Map::new();
        for (field, (name, value)) in self.schema.header.iter().zip(self.header.iter()) {
            if field.role.is_derived() {
                continue;
            }
            let v = match value {
                HeaderValue::Uint(v) => json!(v),
                HeaderValue::Bytes(b) => json!(hex::encode(b)),
            };
            header.insert(name.to_string(), v);
        }

        let strings: Vec<Value> = (0..self.strings.len())
            .map(|i| {
                let s = &self.strings[i];
                json!({
                    "kind": s.kind.tag().to_string(),
                    "utf16": s.is_utf16,
                    "length": s.length,
                    "value": self.string_value(i),
                    "hash": s.hash,
                })
            })
            .collect();

        let functions: Vec<Value> = self
            .functions
            .iter()
            .enumerate()
            .map(|(i, f)| {
                let body = match self.function_disassembly(i) {
                    Ok(d) => json!({
                        "instructions": d.instructions.iter().map(|ins| ins.to_string()).collect::<Vec<_>>(),
                        "trailer": hex::encode(&d.trailer),
                    }),
                    Err(_) => json!({ "bytes": hex::encode(&f.bytecode) }),
                };
                json!({
                    "name": self.function_name(i),
                    "name_id": f.name,
                    "param_count": f.param_count,
                    "register_count": f.frame_size,
                    "symbol_count": f.environment_size,
                    "highest_read_cache_index": f.highest_read_cache_index,
                    "highest_write_cache_index": f.highest_write_cache_index,
                    "flags": f.flags,
                    "body": body,
                })
            })
            .collect();

        json!({
            "version": self.version(),
            "header": header,
            "strings": strings,
            "functions": functions,
            "tables": {
                "array_buffer": hex::encode(&self.array_buffer),
                "obj_key_buffer": hex::encode(&self.obj_key_buffer),
                "obj_value_buffer": hex::encode(&self.obj_value_buffer),
                "regexps": self.regexps,
                "regexp_storage": hex::encode(&self.regexp_storage),
                "cjs_modules": self.cjs_modules,
                "debug_info": self.debug_info.as_ref().map(hex::encode),
            },
        })
    }
}
