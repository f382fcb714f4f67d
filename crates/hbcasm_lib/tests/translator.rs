mod common;

use common::{concat, op, sample};
use hbcasm_lib::opcode::{V62, V74};
use hbcasm_lib::{DecodeError, EncodeError, Instruction, JumpTarget, Operand, assemble, disassemble, parse};

#[test]
fn every_sample_function_reassembles_to_its_bytes() {
    for version in [62, 74] {
        let module = parse(&sample(version).build()).unwrap();
        for f in module.functions() {
            let d = disassemble(&f.bytecode, module.schema().opcodes).unwrap();
            assert_eq!(d.assemble().unwrap(), f.bytecode, "v{version}");
        }
    }
}

#[test]
fn switch_tables_become_the_trailer() {
    let module = parse(&sample(74).build()).unwrap();
    let d = module.function_disassembly(2).unwrap();
    assert_eq!(d.instructions.len(), 3);
    assert_eq!(d.instructions[0].mnemonic(), "SwitchImm");
    assert_eq!(d.instructions[0].operands[1], Operand::Data(22));
    assert_eq!(d.instructions[0].operands[2], Operand::Target(JumpTarget::Index(1)));
    assert_eq!(d.trailer, [18, 0, 0, 0, 20, 0, 0, 0]);
}

#[test]
fn every_opcode_decodes_at_its_length() {
    for table in [V62, V74] {
        for opcode in 0..table.len() as u8 {
            let info = table.get(opcode).unwrap();
            let mut bytes = vec![opcode];
            bytes.resize(info.byte_len(), 0);
            // A zero data offset ends decoding at the instruction itself.
            let d = disassemble(&bytes, table).unwrap();
            assert_eq!(d.instructions.len(), 1, "{}", info.name);
            assert_eq!(d.instructions[0].byte_len(), bytes.len());
            assert_eq!(d.assemble().unwrap(), bytes, "{}", info.name);
        }
    }
}

#[test]
fn jumps_outside_instruction_boundaries_stay_numeric() {
    let v = 74;
    // Jmp +1 lands inside its own operand.
    let bytes = concat(&[op(v, "Jmp", &[1]), op(v, "Ret", &[0])]);
    let d = disassemble(&bytes, V74).unwrap();
    assert_eq!(d.instructions[0].operands[0], Operand::Target(JumpTarget::Offset(1)));
    assert_eq!(d.instructions[0].to_string(), "Jmp\t@1");
    assert_eq!(d.assemble().unwrap(), bytes);
}

#[test]
fn jump_to_the_end_uses_the_instruction_count() {
    let v = 74;
    let bytes = concat(&[op(v, "Jmp", &[2])]);
    let d = disassemble(&bytes, V74).unwrap();
    assert_eq!(d.instructions[0].operands[0], Operand::Target(JumpTarget::Index(1)));
    assert_eq!(d.labels(), [1]);
}

#[test]
fn unknown_opcodes_fail() {
    let err = disassemble(&[V74.len() as u8], V74).unwrap_err();
    assert_eq!(err, DecodeError::UnknownOpcode { offset: 0, opcode: V74.len() as u8 });
}

#[test]
fn truncated_instructions_fail() {
    let v = 74;
    let mut bytes = op(v, "Ret", &[0]);
    bytes.extend_from_slice(&op(v, "LoadConstInt", &[0, 5])[..3]);
    let (opcode, _) = V74.lookup("LoadConstInt").unwrap();
    assert_eq!(
        disassemble(&bytes, V74).unwrap_err(),
        DecodeError::Truncated { offset: 2, opcode, wanted: 6, available: 3 }
    );
}

fn insn(name: &str, operands: Vec<Operand>) -> Instruction {
    let (opcode, info) = V74.lookup(name).unwrap();
    Instruction { opcode, info, operands }
}

#[test]
fn operands_that_do_not_fit_are_rejected() {
    let err = assemble(&[insn("LoadConstUInt8", vec![Operand::Reg(256), Operand::UInt(0)])], &[]).unwrap_err();
    assert!(matches!(err, EncodeError::OperandOverflow { operand: 0, value: 256, .. }));

    let far: Vec<Instruction> = std::iter::once(insn("Jmp", vec![Operand::Target(JumpTarget::Index(100))]))
        .chain((0..100).map(|_| insn("Ret", vec![Operand::Reg(0)])))
        .collect();
    let err = assemble(&far, &[]).unwrap_err();
    assert!(matches!(err, EncodeError::OperandOverflow { mnemonic: "Jmp", value: 200, .. }));
}

#[test]
fn operand_kinds_must_match() {
    let err = assemble(&[insn("Ret", vec![Operand::UInt(0)])], &[]).unwrap_err();
    assert_eq!(err, EncodeError::OperandMismatch { mnemonic: "Ret", operand: 0, expected: "Reg8" });

    let err = assemble(&[insn("Ret", vec![])], &[]).unwrap_err();
    assert!(matches!(err, EncodeError::OperandMismatch { mnemonic: "Ret", operand: 0, .. }));
}

#[test]
fn labels_past_the_end_are_unresolved() {
    let err = assemble(&[insn("Jmp", vec![Operand::Target(JumpTarget::Index(5))])], &[]).unwrap_err();
    assert_eq!(err, EncodeError::UnresolvedReference { instruction: 0, mnemonic: "Jmp", target: 5 });
}

#[test]
fn edited_code_assembles_with_new_displacements() {
    let v = 74;
    let bytes = concat(&[op(v, "JmpTrue", &[5, 0]), op(v, "Ret", &[0]), op(v, "Ret", &[1])]);
    let mut d = disassemble(&bytes, V74).unwrap();
    assert_eq!(d.instructions[0].operands[0], Operand::Target(JumpTarget::Index(2)));

    d.instructions.insert(1, insn("LoadConstUInt8", vec![Operand::Reg(0), Operand::UInt(9)]));
    d.instructions[0].operands[0] = Operand::Target(JumpTarget::Index(3));
    let out = d.assemble().unwrap();
    let (jmp_true, _) = V74.lookup("JmpTrue").unwrap();
    assert_eq!(out[..3], [jmp_true, 8, 0]);
}
