//! HASM projects: the textual, editable form of a [`Module`].
//!
//! A project is a directory with four units:
//!
//! - `project.toml`: format version, bytecode version and the names of the other units.
//! - `metadata.json`: header fields, function placement and the opaque tables.
//! - `string.json`: one record per string-table entry.
//! - `instruction.hasm`: one block per function,
//!
//! ```text
//! Function<name>0(1 params, 3 registers, 0 symbols):
//!     LoadConstString	r0, s2 ; s2 = "hello"
//! L1:
//!     Ret	r0
//! EndFunction
//! ```
//!
//! Jump operands name labels (`L<n>`, numbered by instruction index at dump
//! time) or raw byte offsets (`@<n>`) when the target is not an instruction.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ProjectError;
use crate::io::Record;
use crate::module::{FunctionEntry, Header, HeaderValue, LargeHeader, Location, Module, Slot, StringEntry, encode_string};
use crate::opcode::{OpcodeTable, OperandRole, OperandSpec, OperandType};
use crate::translator::{Disassembly, Instruction, JumpTarget, Operand, assemble, parse_double};
use crate::version::{self, FieldKind, StringKind, VersionSchema};

pub const FORMAT: u32 = 1;
const MANIFEST: &str = "project.toml";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DumpOptions {
    /// Replace an existing destination.
    pub force: bool,
    /// Fail on functions that do not decode instead of keeping their raw bytes.
    pub strict: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct Manifest {
    format: u32,
    version: u32,
    metadata: String,
    strings: String,
    instructions: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct LargeMeta {
    location: usize,
    /// Small-header values in layout order.
    shadow: Vec<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionMeta {
    name: u32,
    highest_read_cache_index: u8,
    highest_write_cache_index: u8,
    flags: u8,
    info_offset: Location,
    slot: Slot,
    large: Option<LargeMeta>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Metadata {
    version: u32,
    header: Map<String, Value>,
    functions: Vec<FunctionMeta>,
    string_storage: String,
    array_buffer: String,
    obj_key_buffer: String,
    obj_value_buffer: String,
    regexps: Vec<(u32, u32)>,
    regexp_storage: String,
    cjs_modules: Vec<(u32, u32)>,
    code: String,
    debug_info: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StringRecord {
    id: usize,
    kind: char,
    utf16: bool,
    offset: u32,
    /// Length in code units.
    length: u32,
    /// Byte range in string storage, end exclusive.
    range: (usize, usize),
    overflow: bool,
    hash: Option<u32>,
    value: String,
    /// Raw bytes when `value` cannot represent them (unpaired UTF-16 surrogates).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    raw: Option<String>,
}

fn metadata(module: &Module) -> Metadata {
    let mut header = Map::new();
    for (name, value) in module.header.iter() {
        let v = match value {
            HeaderValue::Uint(v) => Value::from(*v),
            HeaderValue::Bytes(b) => Value::from(hex::encode(b)),
        };
        header.insert(name.to_string(), v);
    }
    let functions = module
        .functions
        .iter()
        .map(|f| FunctionMeta {
            name: f.name,
            highest_read_cache_index: f.highest_read_cache_index,
            highest_write_cache_index: f.highest_write_cache_index,
            flags: f.flags,
            info_offset: f.info_offset,
            slot: f.slot,
            large: f.large.as_ref().map(|l| LargeMeta {
                location: l.location,
                shadow: l.shadow.iter().map(|(_, v)| v).collect(),
            }),
        })
        .collect();
    Metadata {
        version: module.version(),
        header,
        functions,
        string_storage: hex::encode(&module.string_storage),
        array_buffer: hex::encode(&module.array_buffer),
        obj_key_buffer: hex::encode(&module.obj_key_buffer),
        obj_value_buffer: hex::encode(&module.obj_value_buffer),
        regexps: module.regexps.clone(),
        regexp_storage: hex::encode(&module.regexp_storage),
        cjs_modules: module.cjs_modules.clone(),
        code: hex::encode(&module.code),
        debug_info: module.debug_info.as_ref().map(hex::encode),
    }
}

fn string_records(module: &Module) -> Vec<StringRecord> {
    module
        .strings
        .iter()
        .enumerate()
        .map(|(id, s)| {
            let bytes = module.string_bytes(id).unwrap_or_default();
            let value = module.string_value(id).unwrap_or_default();
            let lossless = !s.is_utf16 || encode_string(&value, true).1 == bytes;
            StringRecord {
                id,
                kind: s.kind.tag(),
                utf16: s.is_utf16,
                offset: s.offset,
                length: s.length,
                range: (s.offset as usize, s.offset as usize + s.byte_len()),
                overflow: s.overflowed,
                hash: s.hash,
                value,
                raw: (!lossless).then(|| hex::encode(bytes)),
            }
        })
        .collect()
}

fn render_body(out: &mut String, module: &Module, d: &Disassembly) {
    let labels: HashSet<usize> = d.labels().into_iter().collect();
    for (n, insn) in d.instructions.iter().enumerate() {
        if labels.contains(&n) {
            out.push_str(&format!("L{n}:\n"));
        }
        out.push('\t');
        out.push_str(&insn.to_string());
        let comments: Vec<String> = insn
            .operands
            .iter()
            .filter_map(|op| match op {
                Operand::String(id) => module.string_value(*id as usize).map(|v| format!("s{id} = {v:?}")),
                _ => None,
            })
            .collect();
        if !comments.is_empty() {
            out.push_str(" ; ");
            out.push_str(&comments.join(", "));
        }
        out.push('\n');
    }
    if labels.contains(&d.instructions.len()) {
        out.push_str(&format!("L{}:\n", d.instructions.len()));
    }
    if !d.trailer.is_empty() {
        out.push_str(&format!("\t.trailer {}\n", hex::encode(&d.trailer)));
    }
}

fn render_functions(module: &Module, strict: bool) -> Result<String, ProjectError> {
    let mut out = String::new();
    for (i, f) in module.functions.iter().enumerate() {
        out.push_str(&format!(
            "Function<{}>{}({} params, {} registers, {} symbols):\n",
            module.function_name(i).escape_debug(),
            i,
            f.param_count,
            f.frame_size,
            f.environment_size
        ));
        match module.function_disassembly(i) {
            Ok(d) => render_body(&mut out, module, &d),
            Err(e) if !strict => {
                log::warn!("function {i}: {e}; keeping raw bytecode");
                out.push_str(&format!("\t.bytes {}\n", hex::encode(&f.bytecode)));
            }
            Err(source) => return Err(ProjectError::Decode { function: i, source }),
        }
        out.push_str("EndFunction\n\n");
    }
    Ok(out)
}

/// Writes `module` as a project at `destination`. The project is built in a
/// sibling temporary directory and renamed into place.
pub fn dump(module: &Module, destination: impl AsRef<Path>, options: &DumpOptions) -> Result<(), ProjectError> {
    let destination = destination.as_ref();
    if destination.exists() && !options.force {
        return Err(ProjectError::DestinationExists(destination.to_path_buf()));
    }

    let parent = match destination.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;
    let staging = tempfile::Builder::new().prefix(".hbcasm-").tempdir_in(parent)?;

    let manifest = Manifest {
        format: FORMAT,
        version: module.version(),
        metadata: "metadata.json".into(),
        strings: "string.json".into(),
        instructions: "instruction.hasm".into(),
    };
    fs::write(staging.path().join(MANIFEST), toml::to_string(&manifest)?)?;
    fs::write(staging.path().join(&manifest.metadata), serde_json::to_string_pretty(&metadata(module))?)?;
    fs::write(staging.path().join(&manifest.strings), serde_json::to_string_pretty(&string_records(module))?)?;
    fs::write(staging.path().join(&manifest.instructions), render_functions(module, options.strict)?)?;

    // The old project moves aside until the new one is in place.
    let backup = if destination.exists() {
        let aside = tempfile::Builder::new().prefix(".hbcasm-old-").tempdir_in(parent)?.keep();
        fs::remove_dir(&aside)?;
        fs::rename(destination, &aside)?;
        Some(aside)
    } else {
        None
    };
    let staged = staging.keep();
    if let Err(e) = fs::rename(&staged, destination) {
        let _ = fs::remove_dir_all(&staged);
        if let Some(aside) = &backup {
            let _ = fs::rename(aside, destination);
        }
        return Err(e.into());
    }
    if let Some(aside) = backup {
        if aside.is_dir() {
            fs::remove_dir_all(&aside)?;
        } else {
            fs::remove_file(&aside)?;
        }
    }

    log::info!(
        "dumped {} functions and {} strings to {}",
        module.function_count(),
        module.string_count(),
        destination.display()
    );
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
enum Item {
    Label(String),
    Instruction { mnemonic: String, operands: Vec<String> },
    Trailer(Vec<u8>),
    Bytes(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq)]
struct Unit {
    line: usize,
    index: usize,
    params: u32,
    registers: u32,
    symbols: u32,
    items: Vec<(usize, Item)>,
}

/// Parses `Function<name>N(P params, R registers, S symbols):` into `(N, P, R, S)`.
fn parse_signature(line: &str) -> Option<(usize, u32, u32, u32)> {
    let line = line.strip_prefix("Function<")?.strip_suffix("):")?;
    let open = line.rfind('(')?;
    let (head, counts) = (&line[..open], &line[open + 1..]);
    let index = head[head.rfind('>')? + 1..].parse().ok()?;

    let mut parts = counts.split(',').map(str::trim);
    let mut count = |suffix: &str| parts.next()?.strip_suffix(suffix)?.trim().parse::<u32>().ok();
    let params = count("params")?;
    let registers = count("registers")?;
    let symbols = count("symbols")?;
    if parts.next().is_some() {
        return None;
    }
    Some((index, params, registers, symbols))
}

fn parse_units(text: &str, unit: &str) -> Result<Vec<Unit>, ProjectError> {
    let hex_item = |rest: &str, line: usize| {
        hex::decode(rest.trim()).map_err(|e| ProjectError::malformed(unit, line, format!("bad hex: {e}")))
    };

    let mut units = Vec::new();
    let mut current: Option<Unit> = None;
    for (n, raw) in text.lines().enumerate() {
        let line_no = n + 1;
        let trimmed = raw.trim();
        if trimmed.starts_with("Function<") {
            if current.is_some() {
                return Err(ProjectError::malformed(unit, line_no, "Function inside another function"));
            }
            let (index, params, registers, symbols) = parse_signature(trimmed)
                .ok_or_else(|| ProjectError::malformed(unit, line_no, "malformed function header"))?;
            current = Some(Unit { line: line_no, index, params, registers, symbols, items: Vec::new() });
            continue;
        }

        let line = trimmed.split_once(';').map_or(trimmed, |(code, _)| code).trim();
        if line.is_empty() {
            continue;
        }
        if line == "EndFunction" {
            let done = current
                .take()
                .ok_or_else(|| ProjectError::malformed(unit, line_no, "EndFunction without Function"))?;
            units.push(done);
            continue;
        }

        let f = current
            .as_mut()
            .ok_or_else(|| ProjectError::malformed(unit, line_no, "statement outside a function"))?;
        let item = if let Some(label) = line.strip_suffix(':') {
            Item::Label(label.trim().to_string())
        } else if let Some(rest) = line.strip_prefix(".trailer") {
            Item::Trailer(hex_item(rest, line_no)?)
        } else if let Some(rest) = line.strip_prefix(".bytes") {
            Item::Bytes(hex_item(rest, line_no)?)
        } else {
            let (mnemonic, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
            let operands = if rest.trim().is_empty() {
                Vec::new()
            } else {
                rest.split(',').map(|o| o.trim().to_string()).collect()
            };
            Item::Instruction { mnemonic: mnemonic.to_string(), operands }
        };
        f.items.push((line_no, item));
    }
    if let Some(open) = current {
        return Err(ProjectError::malformed(unit, open.line, "missing EndFunction"));
    }
    Ok(units)
}

fn parse_operand(spec: &OperandSpec, text: &str, labels: &HashMap<&str, usize>) -> Result<Operand, String> {
    let number = |t: &str| t.parse::<u32>().map_err(|_| format!("expected {}, found {text:?}", spec.describe()));
    match (spec.ty, spec.role) {
        (OperandType::Reg8 | OperandType::Reg32, _) => match text.strip_prefix('r') {
            Some(r) => number(r).map(Operand::Reg),
            None => Err(format!("expected a register, found {text:?}")),
        },
        (OperandType::Addr8 | OperandType::Addr32, _) => match text.strip_prefix('@') {
            Some(o) => o
                .parse::<i64>()
                .map(|o| Operand::Target(JumpTarget::Offset(o)))
                .map_err(|_| format!("bad byte offset {text:?}")),
            None => labels
                .get(text)
                .map(|&i| Operand::Target(JumpTarget::Index(i)))
                .ok_or_else(|| format!("undefined label {text:?}")),
        },
        (OperandType::Imm32, _) => text.parse::<i32>().map(Operand::Imm).map_err(|_| format!("bad Imm32 {text:?}")),
        (OperandType::Double, _) => parse_double(text).map(Operand::Double).ok_or_else(|| format!("bad double {text:?}")),
        (_, OperandRole::StringId) => match text.strip_prefix('s') {
            Some(id) => number(id).map(Operand::String),
            None => Err(format!("expected a string id, found {text:?}")),
        },
        (_, OperandRole::DataOffset) => number(text).map(Operand::Data),
        (_, OperandRole::Plain) => number(text).map(Operand::UInt),
    }
}

/// Bytecode of one parsed function.
fn unit_bytecode(
    u: &Unit,
    table: OpcodeTable,
    mnemonics: &HashMap<&'static str, u8>,
    unit: &str,
) -> Result<Vec<u8>, ProjectError> {
    let mut labels: HashMap<&str, usize> = HashMap::new();
    let mut count = 0;
    let mut raw = None;
    let mut trailer = Vec::new();
    for (line, item) in &u.items {
        match item {
            Item::Label(name) => {
                if labels.insert(name.as_str(), count).is_some() {
                    return Err(ProjectError::malformed(unit, *line, format!("duplicate label {name}")));
                }
            }
            Item::Instruction { .. } => count += 1,
            Item::Trailer(bytes) => trailer = bytes.clone(),
            Item::Bytes(bytes) => raw = Some(bytes.clone()),
        }
    }
    if let Some(bytes) = raw {
        if count > 0 {
            return Err(ProjectError::malformed(unit, u.line, ".bytes cannot be mixed with instructions"));
        }
        return Ok(bytes);
    }

    let mut instructions = Vec::with_capacity(count);
    for (line, item) in &u.items {
        let Item::Instruction { mnemonic, operands } = item else {
            continue;
        };
        let info = mnemonics
            .get(mnemonic.as_str())
            .and_then(|&op| table.get(op).map(|info| (op, info)));
        let Some((opcode, info)) = info else {
            return Err(ProjectError::malformed(unit, *line, format!("unknown mnemonic {mnemonic}")));
        };
        if operands.len() != info.operands.len() {
            return Err(ProjectError::malformed(
                unit,
                *line,
                format!("{mnemonic} takes {} operands, found {}", info.operands.len(), operands.len()),
            ));
        }
        let operands = info
            .operands
            .iter()
            .zip(operands)
            .map(|(spec, text)| parse_operand(spec, text, &labels))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|reason| ProjectError::malformed(unit, *line, reason))?;
        instructions.push(Instruction { opcode, info, operands });
    }
    Ok(assemble(&instructions, &trailer)?)
}

fn read_header(schema: &VersionSchema, json: &Map<String, Value>, unit: &str) -> Result<Header, ProjectError> {
    let mut fields = Vec::with_capacity(schema.header.len());
    for f in schema.header {
        let value = json
            .get(f.name)
            .ok_or_else(|| ProjectError::malformed(unit, 0, format!("header field {} missing", f.name)))?;
        let value = match (f.kind, value) {
            (FieldKind::Bytes(_), Value::String(h)) => HeaderValue::Bytes(unhex(h, unit, f.name)?),
            (FieldKind::U8 | FieldKind::U32 | FieldKind::U64, Value::Number(n)) => match n.as_u64() {
                Some(v) => HeaderValue::Uint(v),
                None => return Err(ProjectError::malformed(unit, 0, format!("header field {} is not a u64", f.name))),
            },
            _ => return Err(ProjectError::malformed(unit, 0, format!("header field {} has the wrong type", f.name))),
        };
        fields.push((f.name, value));
    }
    Ok(Header::new(fields))
}

fn unhex(text: &str, unit: &str, what: &str) -> Result<Vec<u8>, ProjectError> {
    hex::decode(text).map_err(|e| ProjectError::malformed(unit, 0, format!("{what}: {e}")))
}

/// Rebuilds a module from a project directory.
pub fn load(source: impl AsRef<Path>) -> Result<Module, ProjectError> {
    let source = source.as_ref();
    let manifest: Manifest = toml::from_str(&fs::read_to_string(source.join(MANIFEST))?)?;
    if manifest.format != FORMAT {
        return Err(ProjectError::malformed(MANIFEST, 0, format!("unsupported project format {}", manifest.format)));
    }
    let schema = version::resolve(manifest.version)?;

    let meta_unit = manifest.metadata.as_str();
    let meta: Metadata = serde_json::from_str(&fs::read_to_string(source.join(meta_unit))?)?;
    if meta.version != manifest.version {
        return Err(ProjectError::malformed(
            meta_unit,
            0,
            format!("version {} does not match project version {}", meta.version, manifest.version),
        ));
    }
    let records: Vec<StringRecord> = serde_json::from_str(&fs::read_to_string(source.join(&manifest.strings))?)?;
    let text = fs::read_to_string(source.join(&manifest.instructions))?;

    let mut module = Module::new(schema);
    module.header = read_header(schema, &meta.header, meta_unit)?;
    module.string_storage = unhex(&meta.string_storage, meta_unit, "string_storage")?;
    module.array_buffer = unhex(&meta.array_buffer, meta_unit, "array_buffer")?;
    module.obj_key_buffer = unhex(&meta.obj_key_buffer, meta_unit, "obj_key_buffer")?;
    module.obj_value_buffer = unhex(&meta.obj_value_buffer, meta_unit, "obj_value_buffer")?;
    module.regexps = meta.regexps;
    module.regexp_storage = unhex(&meta.regexp_storage, meta_unit, "regexp_storage")?;
    module.cjs_modules = meta.cjs_modules;
    module.code = unhex(&meta.code, meta_unit, "code")?;
    module.debug_info = meta.debug_info.as_deref().map(|h| unhex(h, meta_unit, "debug_info")).transpose()?;

    let strings_unit = manifest.strings.as_str();
    for (i, rec) in records.iter().enumerate() {
        let kind = StringKind::from_tag(rec.kind)
            .filter(|k| schema.kind_index(*k).is_some())
            .ok_or_else(|| ProjectError::malformed(strings_unit, i + 1, format!("unknown string kind {:?}", rec.kind)))?;
        if rec.id != i {
            return Err(ProjectError::malformed(strings_unit, i + 1, format!("string {} listed at position {i}", rec.id)));
        }
        module.strings.push(StringEntry {
            kind,
            is_utf16: rec.utf16,
            offset: rec.offset,
            length: rec.length,
            hash: rec.hash,
            overflowed: rec.overflow,
        });
    }
    for (i, rec) in records.iter().enumerate() {
        let (utf16, bytes) = match &rec.raw {
            Some(h) => (rec.utf16, unhex(h, strings_unit, "raw")?),
            None => encode_string(&rec.value, rec.utf16),
        };
        module.set_string_bytes(i, utf16, bytes)?;
    }

    let code_unit = manifest.instructions.as_str();
    let units = parse_units(&text, code_unit)?;
    if units.len() != meta.functions.len() {
        return Err(ProjectError::malformed(
            code_unit,
            0,
            format!("{} functions, metadata lists {}", units.len(), meta.functions.len()),
        ));
    }
    let small_layout = schema.small_function_header;
    for (i, (fm, u)) in meta.functions.into_iter().zip(&units).enumerate() {
        if u.index != i {
            return Err(ProjectError::malformed(code_unit, u.line, format!("expected function {i}, found {}", u.index)));
        }
        let large = match fm.large {
            Some(l) if l.shadow.len() == small_layout.len() => {
                let mut shadow = Record::zeroed(small_layout);
                for (b, v) in small_layout.iter().zip(l.shadow) {
                    shadow.set(b.field, v);
                }
                Some(LargeHeader { location: l.location, shadow })
            }
            Some(_) => {
                return Err(ProjectError::malformed(meta_unit, 0, format!("function {i}: bad large header shadow")));
            }
            None => None,
        };
        module.functions.push(FunctionEntry {
            name: fm.name,
            param_count: u.params,
            frame_size: u.registers,
            environment_size: u.symbols,
            highest_read_cache_index: fm.highest_read_cache_index,
            highest_write_cache_index: fm.highest_write_cache_index,
            flags: fm.flags,
            info_offset: fm.info_offset,
            bytecode: Vec::new(),
            slot: fm.slot,
            large,
        });
    }

    let mnemonics = schema.opcodes.mnemonics();
    for (i, u) in units.iter().enumerate() {
        let bytecode = unit_bytecode(u, schema.opcodes, &mnemonics, code_unit)?;
        module.set_function_bytecode(i, bytecode)?;
    }
    module.relayout();

    log::info!(
        "loaded {} functions and {} strings from {}",
        module.function_count(),
        module.string_count(),
        source.display()
    );
    Ok(module)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcode::V74;

    #[test]
    fn signature_with_odd_name() {
        assert_eq!(parse_signature("Function<a(b)>c>12(3 params, 4 registers, 5 symbols):"), Some((12, 3, 4, 5)));
        assert_eq!(parse_signature("Function<>0(0 params, 1 registers, 0 symbols):"), Some((0, 0, 1, 0)));
        assert_eq!(parse_signature("Function<f>0(0 params, 1 registers):"), None);
    }

    #[test]
    fn operands_follow_their_spec() {
        let labels = HashMap::from([("L3", 3usize)]);
        let (_, jmp) = V74.lookup("JmpTrue").unwrap();
        assert_eq!(
            parse_operand(&jmp.operands[0], "L3", &labels),
            Ok(Operand::Target(JumpTarget::Index(3)))
        );
        assert_eq!(
            parse_operand(&jmp.operands[0], "@-7", &labels),
            Ok(Operand::Target(JumpTarget::Offset(-7)))
        );
        assert!(parse_operand(&jmp.operands[0], "L4", &labels).is_err());
        assert_eq!(parse_operand(&jmp.operands[1], "r9", &labels), Ok(Operand::Reg(9)));

        let (_, get) = V74.lookup("GetById").unwrap();
        assert_eq!(parse_operand(&get.operands[3], "s42", &labels), Ok(Operand::String(42)));
        assert!(parse_operand(&get.operands[3], "42", &labels).is_err());
    }

    #[test]
    fn comments_and_labels_are_parsed() {
        let text = "Function<f>0(1 params, 2 registers, 0 symbols):\n\
                    L0:\n\
                    \tLoadConstString\tr0, s1 ; s1 = \"a;b\"\n\
                    \tJmp\tL0\n\
                    EndFunction\n";
        let units = parse_units(text, "instruction.hasm").unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].items[0].1, Item::Label("L0".into()));
        assert_eq!(
            units[0].items[1].1,
            Item::Instruction { mnemonic: "LoadConstString".into(), operands: vec!["r0".into(), "s1".into()] }
        );

        let bytes = unit_bytecode(&units[0], V74, &V74.mnemonics(), "instruction.hasm").unwrap();
        let jmp = V74.lookup("Jmp").unwrap().0;
        assert_eq!(bytes[4..], [jmp, (-4i8) as u8]);
    }

    #[test]
    fn unterminated_function_is_reported() {
        let err = parse_units("Function<f>0(0 params, 0 registers, 0 symbols):\n\tRet\tr0\n", "u").unwrap_err();
        assert!(matches!(err, ProjectError::MalformedUnit { line: 1, .. }));
    }
}
