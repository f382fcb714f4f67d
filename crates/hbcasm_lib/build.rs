use std::env;
use std::fs;
use std::path::{Path, PathBuf};

fn take_until_paren_close(s: &str) -> Option<&str> {
    let s = s.trim();
    let j = s.find(')')?;
    Some(s[..j].trim())
}

fn operand_type(name: &str, path: &Path) -> &'static str {
    match name {
        "Reg8" => "Reg8",
        "Reg32" => "Reg32",
        "UInt8" => "UInt8",
        "UInt16" => "UInt16",
        "UInt32" => "UInt32",
        "Addr8" => "Addr8",
        "Addr32" => "Addr32",
        "Imm32" => "Imm32",
        "Double" => "Double",
        other => panic!("{}: unknown operand type {other}", path.display()),
    }
}

fn operand_role(suffix: &str, path: &Path) -> &'static str {
    match suffix {
        "" => "Plain",
        "S" => "StringId",
        "T" => "DataOffset",
        other => panic!("{}: unknown operand suffix :{other}", path.display()),
    }
}

fn def_version(path: &Path) -> Option<u32> {
    path.file_stem()?.to_str()?.strip_prefix("hbc")?.parse().ok()
}

fn main() {
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let defs_dir = manifest_dir.join("defs");

    println!("cargo:rerun-if-changed={}", defs_dir.display());

    let mut def_files: Vec<(u32, PathBuf)> = fs::read_dir(&defs_dir)
        .expect("read defs directory")
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|x| x == "def"))
        .map(|p| {
            let version = def_version(&p).expect("definition files are named hbc<version>.def");
            (version, p)
        })
        .collect();
    def_files.sort();

    let mut out = String::new();

    for (version, path) in &def_files {
        println!("cargo:rerun-if-changed={}", path.display());
        let src = fs::read_to_string(path).expect("read opcode definitions");

        let mut ops: Vec<(String, Vec<(&'static str, &'static str)>)> = Vec::new();
        for line in src.lines() {
            let l = line.trim();
            let rest = match l.strip_prefix("DEFINE_OPCODE(") {
                Some(v) => v,
                None => continue,
            };
            let inner = match take_until_paren_close(rest) {
                Some(v) => v,
                None => continue,
            };
            let mut parts = inner.split(',').map(|p| p.trim()).filter(|p| !p.is_empty());
            let name = match parts.next() {
                Some(v) => v.to_string(),
                None => continue,
            };
            let operands = parts
                .map(|p| {
                    let (ty, suffix) = p.split_once(':').unwrap_or((p, ""));
                    (operand_type(ty.trim(), path), operand_role(suffix.trim(), path))
                })
                .collect();
            if ops.iter().any(|(n, _)| *n == name) {
                panic!("{}: duplicate opcode {name}", path.display());
            }
            ops.push((name, operands));
        }

        assert!(ops.len() <= 256, "{}: more than 256 opcodes", path.display());

        out.push_str(&format!("pub const OPCODES_V{version}: &[OpcodeInfo] = &[\n"));
        for (name, operands) in &ops {
            let specs: Vec<String> = operands
                .iter()
                .map(|(ty, role)| {
                    format!("OperandSpec {{ ty: OperandType::{ty}, role: OperandRole::{role} }}")
                })
                .collect();
            out.push_str(&format!(
                "    OpcodeInfo {{ name: \"{}\", operands: &[{}] }},\n",
                name,
                specs.join(", ")
            ));
        }
        out.push_str("];\n\n");
    }

    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let out_path = out_dir.join("opcode_tables.rs");
    fs::write(out_path, out).expect("write generated opcode tables");
}
