pub mod container;
pub mod error;
pub mod hasm;
pub mod io;
pub mod module;
pub mod opcode;
pub mod translator;
pub mod version;

pub use container::{parse, read_file, serialize, write_file};
pub use error::{DecodeError, EncodeError, ParseError, ProjectError};
pub use hasm::{DumpOptions, dump, load};
pub use module::{FunctionBody, FunctionEntry, FunctionView, Module, StringEntry, StringSpan};
pub use translator::{Disassembly, Instruction, JumpTarget, Operand, assemble, disassemble};
pub use version::{StringKind, VersionSchema, resolve, supported_versions};
