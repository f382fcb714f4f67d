//! Byte-level builder for synthetic containers, written against the file
//! format directly so the library's own encoder is not used to make fixtures.

#![allow(dead_code)]

use hbcasm_lib::opcode::{OpcodeTable, V62, V74};

pub const MAGIC: u64 = 0x1F19_03C1_03BC_1FC6;
pub const HEADER_SIZE: usize = 128;
pub const LARGE_HEADER_SIZE: usize = 31;

pub fn table(version: u32) -> OpcodeTable {
    match version {
        62 => V62,
        _ => V74,
    }
}

/// Encodes one instruction by mnemonic; operands are given as raw
/// little-endian values, one per operand, truncated to the operand width.
pub fn op(version: u32, mnemonic: &str, operands: &[i64]) -> Vec<u8> {
    let (opcode, info) = table(version).lookup(mnemonic).unwrap_or_else(|| panic!("no opcode {mnemonic}"));
    assert_eq!(info.operands.len(), operands.len(), "{mnemonic} operand count");
    let mut out = vec![opcode];
    for (spec, &v) in info.operands.iter().zip(operands) {
        let width = spec.ty.width();
        if width == 8 {
            out.extend_from_slice(&f64::from_bits(v as u64).to_le_bytes());
        } else {
            out.extend_from_slice(&v.to_le_bytes()[..width]);
        }
    }
    out
}

pub fn concat(parts: &[Vec<u8>]) -> Vec<u8> {
    parts.concat()
}

#[derive(Debug, Clone)]
pub struct Func {
    pub name: u32,
    pub params: u32,
    pub registers: u32,
    pub symbols: u32,
    pub read_cache: u8,
    pub write_cache: u8,
    pub flags: u8,
    pub code: Vec<u8>,
    /// Stored through an out-of-line large header.
    pub large: bool,
    /// Bytes of function info written after the bytecode; the header points at them.
    pub info: Option<Vec<u8>>,
}

impl Func {
    pub fn new(name: u32, params: u32, registers: u32, code: Vec<u8>) -> Self {
        Self {
            name,
            params,
            registers,
            symbols: 0,
            read_cache: 0,
            write_cache: 0,
            flags: 0,
            code,
            large: false,
            info: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    String,
    Identifier,
    Predefined,
}

#[derive(Debug, Clone)]
pub struct Str {
    pub kind: Kind,
    pub utf16: bool,
    pub bytes: Vec<u8>,
    pub hash: u32,
}

impl Str {
    pub fn ascii(kind: Kind, text: &str) -> Self {
        Self { kind, utf16: false, bytes: text.as_bytes().to_vec(), hash: 0 }
    }

    pub fn utf16(kind: Kind, text: &str) -> Self {
        let bytes = text.encode_utf16().flat_map(|u| u.to_le_bytes()).collect();
        Self { kind, utf16: true, bytes, hash: 0 }
    }

    pub fn units(&self) -> u32 {
        if self.utf16 { self.bytes.len() as u32 / 2 } else { self.bytes.len() as u32 }
    }
}

#[derive(Debug, Clone)]
pub struct Layout {
    pub code_start: usize,
    pub code_end: usize,
    /// Absolute bytecode offset of each function.
    pub function_offsets: Vec<usize>,
    /// Absolute string storage offset.
    pub storage_start: usize,
}

#[derive(Debug, Clone)]
pub struct Builder {
    pub version: u32,
    pub source_hash: [u8; 20],
    pub global_code_index: u32,
    pub segment: u32,
    pub option: u8,
    pub padding: [u8; 31],
    pub functions: Vec<Func>,
    pub strings: Vec<Str>,
    pub array_buffer: Vec<u8>,
    pub obj_key_buffer: Vec<u8>,
    pub obj_value_buffer: Vec<u8>,
    pub regexps: Vec<(u32, u32)>,
    pub regexp_storage: Vec<u8>,
    pub cjs_modules: Vec<(u32, u32)>,
    pub debug_info: Option<Vec<u8>>,
}

fn pad(out: &mut Vec<u8>) {
    while out.len() % 4 != 0 {
        out.push(0);
    }
}

fn padded(n: usize) -> usize {
    n.div_ceil(4) * 4
}

fn put_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn small_function_header(
    offset: u32,
    params: u32,
    size: u32,
    name: u32,
    info: u32,
    frame: u32,
    env: u32,
    read: u8,
    write: u8,
    flags: u8,
) -> [u8; 16] {
    let fields: [(u128, u32); 10] = [
        (offset as u128, 25),
        (params as u128, 7),
        (size as u128, 15),
        (name as u128, 17),
        (info as u128, 25),
        (frame as u128, 7),
        (env as u128, 8),
        (read as u128, 8),
        (write as u128, 8),
        (flags as u128, 8),
    ];
    let mut packed = 0u128;
    let mut shift = 0;
    for (v, bits) in fields {
        assert!(v < 1 << bits, "value {v} does not fit {bits} bits");
        packed |= v << shift;
        shift += bits;
    }
    packed.to_le_bytes()
}

impl Builder {
    pub fn new(version: u32) -> Self {
        Self {
            version,
            source_hash: [0xab; 20],
            global_code_index: 0,
            segment: 0,
            option: 0,
            padding: [0; 31],
            functions: Vec::new(),
            strings: Vec::new(),
            array_buffer: Vec::new(),
            obj_key_buffer: Vec::new(),
            obj_value_buffer: Vec::new(),
            regexps: Vec::new(),
            regexp_storage: Vec::new(),
            cjs_modules: Vec::new(),
            debug_info: None,
        }
    }

    fn kind_index(&self, kind: Kind) -> u32 {
        match (self.version, kind) {
            (_, Kind::String) => 0,
            (_, Kind::Identifier) => 1,
            (62, Kind::Predefined) => 2,
            _ => panic!("predefined strings only exist in version 62"),
        }
    }

    fn kind_runs(&self) -> Vec<u32> {
        let kind_bits = if self.version == 62 { 30 } else { 31 };
        let mut runs: Vec<(Kind, u32)> = Vec::new();
        for s in &self.strings {
            match runs.last_mut() {
                Some((k, n)) if *k == s.kind => *n += 1,
                _ => runs.push((s.kind, 1)),
            }
        }
        runs.into_iter().map(|(k, n)| n | (self.kind_index(k) << kind_bits)).collect()
    }

    pub fn build(&self) -> Vec<u8> {
        self.build_with_layout().0
    }

    pub fn build_with_layout(&self) -> (Vec<u8>, Layout) {
        // String table.
        let mut storage = Vec::new();
        let mut small_strings = Vec::new();
        let mut overflow = Vec::new();
        let mut hashes = Vec::new();
        for s in &self.strings {
            let offset = storage.len() as u32;
            storage.extend_from_slice(&s.bytes);
            let units = s.units();
            let utf16 = s.utf16 as u32;
            if units >= 255 || offset >= 1 << 23 {
                put_u32(&mut small_strings, utf16 | ((overflow.len() as u32 / 8) << 1) | (255 << 24));
                put_u32(&mut overflow, offset);
                put_u32(&mut overflow, units);
            } else {
                put_u32(&mut small_strings, utf16 | (offset << 1) | (units << 24));
            }
            if s.kind == Kind::Identifier {
                put_u32(&mut hashes, s.hash);
            }
        }
        let runs = self.kind_runs();

        let pairs = |list: &[(u32, u32)]| {
            let mut out = Vec::new();
            for &(a, b) in list {
                put_u32(&mut out, a);
                put_u32(&mut out, b);
            }
            out
        };
        let regexps = pairs(&self.regexps);
        let cjs = pairs(&self.cjs_modules);

        let sizes = [
            self.functions.len() * 16,
            runs.len() * 4,
            hashes.len(),
            small_strings.len(),
            overflow.len(),
            storage.len(),
            self.array_buffer.len(),
            self.obj_key_buffer.len(),
            self.obj_value_buffer.len(),
            regexps.len(),
            self.regexp_storage.len(),
            cjs.len(),
        ];
        let storage_start = HEADER_SIZE + sizes[..5].iter().map(|&n| padded(n)).sum::<usize>();
        let code_start = HEADER_SIZE + sizes.iter().map(|&n| padded(n)).sum::<usize>();

        // Code region: bytecode, then function info, then large headers.
        let mut code = Vec::new();
        let mut offsets = Vec::new();
        for f in &self.functions {
            while code.len() % 4 != 0 {
                code.push(0);
            }
            offsets.push(code_start + code.len());
            code.extend_from_slice(&f.code);
        }
        let mut infos = Vec::new();
        for f in &self.functions {
            match &f.info {
                Some(info) => {
                    while code.len() % 4 != 0 {
                        code.push(0);
                    }
                    infos.push((code_start + code.len()) as u32);
                    code.extend_from_slice(info);
                }
                None => infos.push(0),
            }
        }
        let mut headers = Vec::new();
        for (i, f) in self.functions.iter().enumerate() {
            let offset = offsets[i] as u32;
            if f.large {
                while code.len() % 4 != 0 {
                    code.push(0);
                }
                let location = (code_start + code.len()) as u32;
                for v in [offset, f.params, f.code.len() as u32, f.name, infos[i], f.registers, f.symbols] {
                    put_u32(&mut code, v);
                }
                code.extend_from_slice(&[f.read_cache, f.write_cache, f.flags]);
                headers.extend_from_slice(&small_function_header(
                    location & 0xffff,
                    0,
                    0,
                    0,
                    location >> 16,
                    0,
                    0,
                    0,
                    0,
                    f.flags | 0x20,
                ));
            } else {
                headers.extend_from_slice(&small_function_header(
                    offset,
                    f.params,
                    f.code.len() as u32,
                    f.name,
                    infos[i],
                    f.registers,
                    f.symbols,
                    f.read_cache,
                    f.write_cache,
                    f.flags,
                ));
            }
        }
        let code_end = code_start + code.len();
        let file_length = code_end + self.debug_info.as_ref().map_or(0, Vec::len);
        let debug_offset = if self.debug_info.is_some() { code_end } else { 0 };

        let mut out = Vec::with_capacity(file_length);
        out.extend_from_slice(&MAGIC.to_le_bytes());
        put_u32(&mut out, self.version);
        out.extend_from_slice(&self.source_hash);
        for v in [
            file_length as u32,
            self.global_code_index,
            self.functions.len() as u32,
            runs.len() as u32,
            (hashes.len() / 4) as u32,
            self.strings.len() as u32,
            (overflow.len() / 8) as u32,
            storage.len() as u32,
            self.regexps.len() as u32,
            self.regexp_storage.len() as u32,
            self.array_buffer.len() as u32,
            self.obj_key_buffer.len() as u32,
            self.obj_value_buffer.len() as u32,
            self.segment,
            self.cjs_modules.len() as u32,
            debug_offset as u32,
        ] {
            put_u32(&mut out, v);
        }
        out.push(self.option);
        out.extend_from_slice(&self.padding);
        assert_eq!(out.len(), HEADER_SIZE);

        let run_bytes: Vec<u8> = runs.iter().flat_map(|r| r.to_le_bytes()).collect();
        for region in [
            &headers,
            &run_bytes,
            &hashes,
            &small_strings,
            &overflow,
            &storage,
            &self.array_buffer,
            &self.obj_key_buffer,
            &self.obj_value_buffer,
            &regexps,
            &self.regexp_storage,
            &cjs,
        ] {
            out.extend_from_slice(region);
            pad(&mut out);
        }
        assert_eq!(out.len(), code_start);
        out.extend_from_slice(&code);
        if let Some(debug) = &self.debug_info {
            out.extend_from_slice(debug);
        }
        assert_eq!(out.len(), file_length);

        let layout = Layout { code_start, code_end, function_offsets: offsets, storage_start };
        (out, layout)
    }
}

/// A module with a global function, a loop, a switch with a jump table,
/// identifiers, a UTF-16 string, every opaque table and debug info.
pub fn sample(version: u32) -> Builder {
    let v = version;
    let mut b = Builder::new(version);
    b.source_hash = *b"0123456789abcdefghij";
    b.global_code_index = 2;
    b.segment = 0x0102_0304;
    b.option = 1;
    b.padding = std::array::from_fn(|i| i as u8 + 1);

    b.strings = vec![
        Str::ascii(Kind::String, "global"),
        Str::ascii(Kind::String, "hello"),
        Str::utf16(Kind::String, "\u{4f60}\u{597d}"),
        Str { hash: 0x1234_5678, ..Str::ascii(Kind::Identifier, "print") },
        Str { hash: 0x0bad_cafe, ..Str::ascii(Kind::Identifier, "loop") },
        Str::ascii(Kind::String, ""),
    ];

    let global = concat(&[
        op(v, "LoadConstString", &[0, 1]),
        op(v, "GetById", &[1, 0, 1, 3]),
        op(v, "LoadConstDouble", &[2, 1.5f64.to_bits() as i64]),
        op(v, "Ret", &[0]),
    ]);

    // 0: LoadParam, 3: LoadConstUInt8, 6: JmpTrue (to 11), 9: Jmp (to 6), 11: Ret
    let looping = concat(&[
        op(v, "LoadParam", &[0, 1]),
        op(v, "LoadConstUInt8", &[1, 0]),
        op(v, "JmpTrue", &[5, 0]),
        op(v, "Jmp", &[-3]),
        op(v, "Ret", &[1]),
    ]);

    // SwitchImm at 0 (18 bytes), Ret at 18 and 20, jump table at 22.
    let mut switch = concat(&[
        op(v, "SwitchImm", &[0, 22, 18, 0, 1]),
        op(v, "Ret", &[0]),
        op(v, "Ret", &[1]),
    ]);
    switch.extend_from_slice(&18i32.to_le_bytes());
    switch.extend_from_slice(&20i32.to_le_bytes());

    b.functions = vec![
        Func { info: Some(vec![1, 2, 3, 4, 5, 6, 7, 8]), ..Func::new(0, 1, 3, global) },
        Func { symbols: 2, read_cache: 3, write_cache: 1, flags: 0x04, ..Func::new(4, 2, 2, looping) },
        Func::new(5, 1, 2, switch),
    ];
    b.array_buffer = vec![0x10, 0x20, 0x30];
    b.obj_key_buffer = vec![1, 2, 3, 4, 5];
    b.obj_value_buffer = vec![9; 6];
    b.regexps = vec![(0, 4)];
    b.regexp_storage = vec![0xde, 0xad, 0xbe, 0xef];
    b.cjs_modules = vec![(3, 0)];
    b.debug_info = Some(vec![0xd0, 0xd1, 0xd2, 0xd3, 0xd4, 0xd5, 0xd6]);
    b
}
