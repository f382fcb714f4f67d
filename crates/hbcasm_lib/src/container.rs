//! Container codec: bytes <-> [`Module`].
//!
//! File layout: a 128-byte header, then the tables in [`Section::ORDER`], each
//! zero-padded to the schema alignment, then the code region up to the debug
//! info offset (or the end of the file when it is zero), then the debug info.

use std::io::Write;
use std::path::Path;

use crate::error::{EncodeError, ParseError, ProjectError};
use crate::io::{Reader, Record, Writer, align_up, fits, record_len};
use crate::module::{FunctionEntry, Header, HeaderValue, LargeHeader, Location, Module, Slot, StringEntry};
use crate::version::{
    self, FLAG_OVERFLOWED, FieldKind, FuncField, HEADER_SIZE, HeaderField, HeaderRole, KindRunField, MAGIC, Section,
    StrField, StringKind, VersionSchema,
};

/// How a small string entry locates its bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StringRef {
    Inline { offset: u64, length: u64 },
    Overflow(usize),
}

impl StringRef {
    fn classify(record: &Record<StrField>, sentinel: u64) -> Self {
        if record.get(StrField::Length) == sentinel {
            StringRef::Overflow(record.get(StrField::Offset) as usize)
        } else {
            StringRef::Inline { offset: record.get(StrField::Offset), length: record.get(StrField::Length) }
        }
    }
}

fn read_header(r: &mut Reader<'_>, schema: &'static VersionSchema) -> Result<Header, ParseError> {
    let mut fields = Vec::with_capacity(schema.header.len());
    for f in schema.header {
        let value = match f.kind {
            FieldKind::Bytes(n) => HeaderValue::Bytes(r.get_bytes(n)?.to_vec()),
            kind => HeaderValue::Uint(r.get_uint(kind.width())?),
        };
        fields.push((f.name, value));
    }
    Ok(Header::new(fields))
}

fn role_value(schema: &VersionSchema, header: &Header, role: HeaderRole) -> u64 {
    schema
        .header
        .iter()
        .find(|f| f.role == role)
        .and_then(|f| header.uint(f.name))
        .unwrap_or(0)
}

fn end_region(r: &mut Reader<'_>, alignment: usize, section: Section) -> Result<(), ParseError> {
    let pad = r.skip_padding(alignment)?;
    if pad.iter().any(|&b| b != 0) {
        return Err(ParseError::malformed(section.name(), format!("non-zero alignment padding at {}", r.pos() - pad.len())));
    }
    Ok(())
}

fn read_pairs(r: &mut Reader<'_>, count: usize) -> Result<Vec<(u32, u32)>, ParseError> {
    (0..count)
        .map(|_| -> Result<(u32, u32), ParseError> { Ok((r.get_u32()?, r.get_u32()?)) })
        .collect()
}

fn read_kinds(
    r: &mut Reader<'_>,
    schema: &VersionSchema,
    runs: usize,
    string_count: usize,
) -> Result<Vec<StringKind>, ParseError> {
    let table = Section::StringKinds.name();
    let mut kinds = Vec::with_capacity(string_count.min(r.remaining()));
    let mut previous = None;
    for _ in 0..runs {
        let run = r.get_record(schema.string_kind_run)?;
        let count = run.get(KindRunField::Count) as usize;
        let k = run.get(KindRunField::Kind);
        let kind = *schema
            .string_kinds
            .get(k as usize)
            .ok_or_else(|| ParseError::malformed(table, format!("unknown kind {k}")))?;
        if count == 0 || previous == Some(kind) {
            return Err(ParseError::malformed(table, "runs are not canonical"));
        }
        if kinds.len() + count > string_count {
            return Err(ParseError::malformed(table, format!("runs cover more than {string_count} strings")));
        }
        kinds.resize(kinds.len() + count, kind);
        previous = Some(kind);
    }
    if kinds.len() != string_count {
        return Err(ParseError::malformed(table, format!("runs cover {} of {string_count} strings", kinds.len())));
    }
    Ok(kinds)
}

/// Checks that `[start, start + len)` lies inside `[lo, hi)`; reads past the
/// buffer are truncation, anything else is a malformed table.
fn check_span(
    table: &'static str,
    what: impl FnOnce() -> String,
    start: usize,
    len: usize,
    (lo, hi): (usize, usize),
    buffer_len: usize,
) -> Result<(), ParseError> {
    let end = start.saturating_add(len);
    if end > buffer_len {
        return Err(ParseError::Truncated { offset: start, wanted: len, available: buffer_len.saturating_sub(start) });
    }
    if start < lo || end > hi {
        return Err(ParseError::malformed(table, format!("{} [{start}, {end}) outside [{lo}, {hi})", what())));
    }
    Ok(())
}

pub fn parse(bytes: &[u8]) -> Result<Module, ParseError> {
    let mut r = Reader::new(bytes);
    let magic = r.get_u64()?;
    if magic != MAGIC {
        return Err(ParseError::BadMagic { found: magic });
    }
    let schema = version::resolve(r.get_u32()?)?;

    let mut r = Reader::new(bytes);
    let header = read_header(&mut r, schema)?;
    let count = |section: Section| role_value(schema, &header, HeaderRole::Count(section)) as usize;

    let file_length = role_value(schema, &header, HeaderRole::FileLength) as usize;
    if file_length > bytes.len() {
        return Err(ParseError::Truncated {
            offset: bytes.len(),
            wanted: file_length - bytes.len(),
            available: 0,
        });
    }
    if file_length < bytes.len() {
        return Err(ParseError::malformed(
            "header",
            format!("file length {file_length} but {} bytes present", bytes.len()),
        ));
    }

    let alignment = schema.alignment;
    let small_headers = (0..count(Section::Functions))
        .map(|_| r.get_record(schema.small_function_header))
        .collect::<Result<Vec<_>, _>>()?;
    end_region(&mut r, alignment, Section::Functions)?;

    let string_count = count(Section::Strings);
    let string_tables = string_count
        .saturating_mul(Section::Strings.entry_size())
        .saturating_add(count(Section::StringKinds).saturating_mul(Section::StringKinds.entry_size()));
    if string_tables > r.remaining() {
        return Err(ParseError::Truncated { offset: r.pos(), wanted: string_tables, available: r.remaining() });
    }
    let kinds = read_kinds(&mut r, schema, count(Section::StringKinds), string_count)?;
    end_region(&mut r, alignment, Section::StringKinds)?;

    let hashes = (0..count(Section::Identifiers)).map(|_| r.get_u32()).collect::<Result<Vec<_>, _>>()?;
    end_region(&mut r, alignment, Section::Identifiers)?;
    let identifiers = kinds.iter().filter(|k| **k == StringKind::Identifier).count();
    if hashes.len() != identifiers {
        return Err(ParseError::malformed(
            Section::Identifiers.name(),
            format!("{} hashes for {identifiers} identifiers", hashes.len()),
        ));
    }

    let small_strings = (0..string_count)
        .map(|_| r.get_record(schema.small_string_entry))
        .collect::<Result<Vec<_>, _>>()?;
    end_region(&mut r, alignment, Section::Strings)?;

    let overflow = read_pairs(&mut r, count(Section::OverflowStrings))?;
    end_region(&mut r, alignment, Section::OverflowStrings)?;

    let blob = |r: &mut Reader<'_>, section: Section| -> Result<Vec<u8>, ParseError> {
        let data = r.get_bytes(count(section))?.to_vec();
        end_region(r, alignment, section)?;
        Ok(data)
    };
    let string_storage = blob(&mut r, Section::StringStorage)?;
    let array_buffer = blob(&mut r, Section::ArrayBuffer)?;
    let obj_key_buffer = blob(&mut r, Section::ObjKeyBuffer)?;
    let obj_value_buffer = blob(&mut r, Section::ObjValueBuffer)?;

    let regexps = read_pairs(&mut r, count(Section::RegExps))?;
    end_region(&mut r, alignment, Section::RegExps)?;
    let regexp_storage = blob(&mut r, Section::RegExpStorage)?;
    let cjs_modules = read_pairs(&mut r, count(Section::CjsModules))?;
    end_region(&mut r, alignment, Section::CjsModules)?;

    let sentinel = schema.string_length_sentinel();
    let mut strings = Vec::with_capacity(string_count);
    let mut next_overflow = 0;
    let mut hashes = hashes.into_iter();
    for (i, (record, kind)) in small_strings.iter().zip(kinds).enumerate() {
        let (offset, length, overflowed) = match StringRef::classify(record, sentinel) {
            StringRef::Inline { offset, length } => (offset as u32, length as u32, false),
            StringRef::Overflow(index) => {
                if index != next_overflow || index >= overflow.len() {
                    return Err(ParseError::malformed(
                        Section::OverflowStrings.name(),
                        format!("string {i} refers to entry {index}, expected {next_overflow}"),
                    ));
                }
                next_overflow += 1;
                let (offset, length) = overflow[index];
                (offset, length, true)
            }
        };
        let entry = StringEntry {
            kind,
            is_utf16: record.get(StrField::IsUtf16) != 0,
            offset,
            length,
            hash: if kind == StringKind::Identifier { hashes.next() } else { None },
            overflowed,
        };
        let (start, len) = (entry.offset as usize, entry.byte_len());
        if start.saturating_add(len) > string_storage.len() {
            return Err(ParseError::malformed(
                Section::Strings.name(),
                format!("string {i} [{start}, {}) outside storage of {} bytes", start + len, string_storage.len()),
            ));
        }
        strings.push(entry);
    }
    if next_overflow != overflow.len() {
        return Err(ParseError::malformed(
            Section::OverflowStrings.name(),
            format!("{} of {} entries unreferenced", overflow.len() - next_overflow, overflow.len()),
        ));
    }

    let code_start = r.pos();
    let debug_offset = role_value(schema, &header, HeaderRole::DebugInfoOffset) as usize;
    let code_end = if debug_offset == 0 { bytes.len() } else { debug_offset };
    if code_end < code_start || code_end > bytes.len() {
        return Err(ParseError::malformed(
            "header",
            format!("debug info offset {debug_offset} outside [{code_start}, {}]", bytes.len()),
        ));
    }
    let region = (code_start, code_end);
    let large_len = record_len(schema.large_function_header);

    let mut functions = Vec::with_capacity(small_headers.len());
    for (i, small) in small_headers.into_iter().enumerate() {
        let flags = small.get(FuncField::Flags) as u8;
        let (values, large) = if flags & FLAG_OVERFLOWED != 0 {
            let location = ((small.get(FuncField::InfoOffset) << 16) | small.get(FuncField::Offset)) as usize;
            check_span(
                Section::Functions.name(),
                || format!("function {i} large header"),
                location,
                large_len,
                region,
                bytes.len(),
            )?;
            let values = Reader::at(bytes, location).get_record(schema.large_function_header)?;
            (values, Some(LargeHeader { location: location - code_start, shadow: small }))
        } else {
            (small, None)
        };

        let offset = values.get(FuncField::Offset) as usize;
        let size = values.get(FuncField::BytecodeSize) as usize;
        check_span(Section::Functions.name(), || format!("function {i} bytecode"), offset, size, region, bytes.len())?;

        functions.push(FunctionEntry {
            name: values.get(FuncField::FunctionName) as u32,
            param_count: values.get(FuncField::ParamCount) as u32,
            frame_size: values.get(FuncField::FrameSize) as u32,
            environment_size: values.get(FuncField::EnvironmentSize) as u32,
            highest_read_cache_index: values.get(FuncField::HighestReadCacheIndex) as u8,
            highest_write_cache_index: values.get(FuncField::HighestWriteCacheIndex) as u8,
            flags: values.get(FuncField::Flags) as u8,
            info_offset: Location::classify(values.get(FuncField::InfoOffset), code_start, code_end),
            bytecode: bytes[offset..offset + size].to_vec(),
            slot: Slot { offset: offset - code_start, capacity: size },
            large,
        });
    }

    log::debug!(
        "v{}: code region [{code_start:#x}, {code_end:#x}), debug info {} bytes",
        schema.version,
        bytes.len() - code_end
    );
    log::info!(
        "parsed v{} container: {} functions, {} strings, {} bytes",
        schema.version,
        functions.len(),
        strings.len(),
        bytes.len()
    );

    let mut module = Module::new(schema);
    module.header = header;
    module.strings = strings;
    module.string_storage = string_storage;
    module.functions = functions;
    module.array_buffer = array_buffer;
    module.obj_key_buffer = obj_key_buffer;
    module.obj_value_buffer = obj_value_buffer;
    module.regexps = regexps;
    module.regexp_storage = regexp_storage;
    module.cjs_modules = cjs_modules;
    module.code = bytes[code_start..code_end].to_vec();
    module.debug_info = (debug_offset != 0).then(|| bytes[code_end..].to_vec());
    module.code_start = code_start;
    Ok(module)
}

fn needs_overflow(schema: &VersionSchema, s: &StringEntry) -> bool {
    s.overflowed
        || s.length as u64 >= schema.string_length_sentinel()
        || !fits(s.offset as u64, schema.string_field_bits(StrField::Offset))
}

/// Maximal runs of equal kinds as `(first string index, kind, count)`.
fn kind_runs(strings: &[StringEntry]) -> Vec<(usize, StringKind, u64)> {
    let mut runs: Vec<(usize, StringKind, u64)> = Vec::new();
    for (i, s) in strings.iter().enumerate() {
        match runs.last_mut() {
            Some((_, kind, n)) if *kind == s.kind => *n += 1,
            _ => runs.push((i, s.kind, 1)),
        }
    }
    runs
}

/// Byte length of every table, in [`Section::ORDER`].
fn region_sizes(module: &Module) -> [usize; 12] {
    let schema = module.schema();
    let mut sizes = [0usize; 12];
    let mut set = |section: Section, units: usize| sizes[section.index()] = units * section.entry_size();
    set(Section::Functions, module.functions.len());
    set(Section::StringKinds, kind_runs(&module.strings).len());
    set(Section::Identifiers, module.strings.iter().filter(|s| s.kind == StringKind::Identifier).count());
    set(Section::Strings, module.strings.len());
    set(Section::OverflowStrings, module.strings.iter().filter(|s| needs_overflow(schema, s)).count());
    set(Section::StringStorage, module.string_storage.len());
    set(Section::ArrayBuffer, module.array_buffer.len());
    set(Section::ObjKeyBuffer, module.obj_key_buffer.len());
    set(Section::ObjValueBuffer, module.obj_value_buffer.len());
    set(Section::RegExps, module.regexps.len());
    set(Section::RegExpStorage, module.regexp_storage.len());
    set(Section::CjsModules, module.cjs_modules.len());
    sizes
}

pub(crate) fn code_start(module: &Module) -> usize {
    let alignment = module.schema().alignment;
    HEADER_SIZE + region_sizes(module).iter().map(|&n| align_up(n, alignment)).sum::<usize>()
}

fn field_overflow<F: Copy>(name: impl Fn(F) -> &'static str) -> impl Fn((F, u64)) -> EncodeError {
    move |(field, value)| EncodeError::FieldOverflow { field: name(field), value }
}

fn write_header_field(w: &mut Writer, field: &HeaderField, value: &HeaderValue) -> Result<(), EncodeError> {
    match (field.kind, value) {
        (FieldKind::Bytes(n), HeaderValue::Bytes(b)) if b.len() == n => w.put_bytes(b),
        (FieldKind::Bytes(_), HeaderValue::Bytes(b)) => {
            return Err(EncodeError::FieldOverflow { field: field.name, value: b.len() as u64 });
        }
        (FieldKind::Bytes(_), HeaderValue::Uint(v)) => {
            return Err(EncodeError::FieldOverflow { field: field.name, value: *v });
        }
        (kind, HeaderValue::Uint(v)) => {
            if !fits(*v, (kind.width() * 8) as u8) {
                return Err(EncodeError::FieldOverflow { field: field.name, value: *v });
            }
            w.put_uint(kind.width(), *v);
        }
        (_, HeaderValue::Bytes(b)) => {
            return Err(EncodeError::FieldOverflow { field: field.name, value: b.len() as u64 });
        }
    }
    Ok(())
}

fn encode_strings(module: &Module, regions: &mut [Vec<u8>; 12]) -> Result<(), EncodeError> {
    let schema = module.schema();
    let layout = schema.small_string_entry;
    let sentinel = schema.string_length_sentinel();
    let str_overflow = field_overflow(StrField::name);

    let mut w = Writer::default();
    for (first, kind, n) in kind_runs(&module.strings) {
        let index = schema.kind_index(kind).ok_or_else(|| EncodeError::UnencodableString {
            index: first,
            reason: format!("kind '{}' does not exist in version {}", kind.tag(), schema.version),
        })?;
        let mut run = Record::zeroed(schema.string_kind_run);
        run.set(KindRunField::Count, n);
        run.set(KindRunField::Kind, index);
        w.put_record(schema.string_kind_run, &run)
            .map_err(|(_, value)| EncodeError::FieldOverflow { field: "string kind run", value })?;
    }
    regions[Section::StringKinds.index()] = w.into_inner();

    let mut hashes = Writer::default();
    let mut small = Writer::default();
    let mut overflow = Writer::default();
    let mut overflow_count = 0u64;
    for (i, s) in module.strings.iter().enumerate() {
        if (s.offset as usize).saturating_add(s.byte_len()) > module.string_storage.len() {
            return Err(EncodeError::UnencodableString { index: i, reason: "outside string storage".into() });
        }
        if s.kind == StringKind::Identifier {
            hashes.put_u32(s.hash.unwrap_or(0));
        }
        let mut record = Record::zeroed(layout);
        record.set(StrField::IsUtf16, s.is_utf16 as u64);
        if needs_overflow(schema, s) {
            record.set(StrField::Offset, overflow_count);
            record.set(StrField::Length, sentinel);
            overflow.put_u32(s.offset);
            overflow.put_u32(s.length);
            overflow_count += 1;
        } else {
            record.set(StrField::Offset, s.offset as u64);
            record.set(StrField::Length, s.length as u64);
        }
        small.put_record(layout, &record).map_err(&str_overflow)?;
    }
    regions[Section::Identifiers.index()] = hashes.into_inner();
    regions[Section::Strings.index()] = small.into_inner();
    regions[Section::OverflowStrings.index()] = overflow.into_inner();
    Ok(())
}

fn put_pairs(pairs: &[(u32, u32)]) -> Vec<u8> {
    let mut w = Writer::with_capacity(pairs.len() * 8);
    for &(a, b) in pairs {
        w.put_u32(a);
        w.put_u32(b);
    }
    w.into_inner()
}

/// Writes the function headers and returns the code region with bytecode and
/// large headers laid over it.
fn encode_functions(module: &Module, code_start: usize, out: &mut Vec<u8>) -> Result<Vec<u8>, EncodeError> {
    let schema = module.schema();
    let small_layout = schema.small_function_header;
    let large_layout = schema.large_function_header;
    let func_overflow = field_overflow(FuncField::name);

    let mut code = module.code.clone();
    let mut w = Writer::with_capacity(module.functions.len() * Section::Functions.entry_size());
    for f in &module.functions {
        if f.bytecode.len() > f.slot.capacity {
            return Err(EncodeError::FieldOverflow {
                field: FuncField::BytecodeSize.name(),
                value: f.bytecode.len() as u64,
            });
        }
        let start = f.slot.offset;
        if code.len() < start + f.slot.capacity {
            code.resize(start + f.slot.capacity, 0);
        }
        code[start..start + f.bytecode.len()].copy_from_slice(&f.bytecode);

        let offset = (code_start + start) as u64;
        let info_offset = f.info_offset.resolve(code_start);
        match &f.large {
            None => {
                let record = f.record(small_layout, offset, info_offset);
                w.put_record(small_layout, &record).map_err(&func_overflow)?;
            }
            Some(large) => {
                let location = (code_start + large.location) as u64;
                let mut shadow = large.shadow.clone();
                if (shadow.get(FuncField::InfoOffset) << 16) | shadow.get(FuncField::Offset) != location {
                    shadow.set(FuncField::Offset, location & 0xffff);
                    shadow.set(FuncField::InfoOffset, location >> 16);
                }
                w.put_record(small_layout, &shadow).map_err(&func_overflow)?;

                let record = f.record(large_layout, offset, info_offset).encode(large_layout).map_err(&func_overflow)?;
                if code.len() < large.location + record.len() {
                    code.resize(large.location + record.len(), 0);
                }
                code[large.location..large.location + record.len()].copy_from_slice(&record);
            }
        }
    }
    *out = w.into_inner();
    Ok(code)
}

/// Functions with a small header whose file offsets do not fit it under this layout.
fn misplaced_small_headers(module: &Module, code_start: usize) -> Vec<usize> {
    let layout = module.schema().small_function_header;
    let bits = |field: FuncField| layout.iter().find(|b| b.field == field).map_or(0, |b| b.bits);
    let (offset_bits, info_bits) = (bits(FuncField::Offset), bits(FuncField::InfoOffset));
    module
        .functions
        .iter()
        .enumerate()
        .filter(|(_, f)| f.large.is_none())
        .filter(|(_, f)| {
            !fits((code_start + f.slot.offset) as u64, offset_bits)
                || !fits(f.info_offset.resolve(code_start), info_bits)
        })
        .map(|(i, _)| i)
        .collect()
}

pub fn serialize(module: &Module) -> Result<Vec<u8>, EncodeError> {
    let schema = module.schema();
    let alignment = schema.alignment;

    let mut regions: [Vec<u8>; 12] = Default::default();
    encode_strings(module, &mut regions)?;
    regions[Section::StringStorage.index()] = module.string_storage.clone();
    regions[Section::ArrayBuffer.index()] = module.array_buffer.clone();
    regions[Section::ObjKeyBuffer.index()] = module.obj_key_buffer.clone();
    regions[Section::ObjValueBuffer.index()] = module.obj_value_buffer.clone();
    regions[Section::RegExps.index()] = put_pairs(&module.regexps);
    regions[Section::RegExpStorage.index()] = module.regexp_storage.clone();
    regions[Section::CjsModules.index()] = put_pairs(&module.cjs_modules);

    let mut sizes = region_sizes(module);
    for section in Section::ORDER {
        if section != Section::Functions {
            sizes[section.index()] = regions[section.index()].len();
        }
    }
    let code_start = HEADER_SIZE + sizes.iter().map(|&n| align_up(n, alignment)).sum::<usize>();

    let promoted;
    let module = match misplaced_small_headers(module, code_start) {
        misplaced if misplaced.is_empty() => module,
        misplaced => {
            let mut copy = module.clone();
            for index in misplaced {
                log::debug!("function {index}: file offset outside the small header, promoting");
                copy.promote(index);
            }
            promoted = copy;
            &promoted
        }
    };

    let mut function_headers = Vec::new();
    let code = encode_functions(module, code_start, &mut function_headers)?;
    regions[Section::Functions.index()] = function_headers;

    let code_end = code_start + code.len();
    let file_length = code_end + module.debug_info.as_ref().map_or(0, Vec::len);
    let debug_offset = if module.debug_info.is_some() { code_end } else { 0 };
    log::debug!("v{}: laying out code region at {code_start:#x}, {} bytes", schema.version, code.len());

    let counts: Vec<u64> = Section::ORDER
        .iter()
        .map(|s| (regions[s.index()].len() / s.entry_size()) as u64)
        .collect();

    let mut w = Writer::with_capacity(file_length);
    for (field, (_, value)) in schema.header.iter().zip(module.header.iter()) {
        let derived = match field.role {
            HeaderRole::Count(section) => Some(counts[section.index()]),
            HeaderRole::FileLength => Some(file_length as u64),
            HeaderRole::DebugInfoOffset => Some(debug_offset as u64),
            HeaderRole::Magic | HeaderRole::Version | HeaderRole::Opaque => None,
        };
        match derived {
            Some(v) => write_header_field(&mut w, field, &HeaderValue::Uint(v))?,
            None => write_header_field(&mut w, field, value)?,
        }
    }
    w.pad_to(alignment);

    for section in Section::ORDER {
        w.put_bytes(&regions[section.index()]);
        w.pad_to(alignment);
    }
    w.put_bytes(&code);
    if let Some(debug) = &module.debug_info {
        w.put_bytes(debug);
    }

    let out = w.into_inner();
    log::info!("serialized v{} container: {} bytes", schema.version, out.len());
    Ok(out)
}

pub fn read_file(path: impl AsRef<Path>) -> Result<Module, ProjectError> {
    let bytes = std::fs::read(path.as_ref())?;
    Ok(parse(&bytes)?)
}

/// Serializes the module and replaces `path` atomically.
pub fn write_file(path: impl AsRef<Path>, module: &Module) -> Result<(), ProjectError> {
    let bytes = serialize(module)?;
    write_atomic(path.as_ref(), &bytes)?;
    Ok(())
}

pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
