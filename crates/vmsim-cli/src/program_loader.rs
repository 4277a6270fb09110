//! Program-file parsing for `vmsim run`.
//!
//! The instruction loader is explicitly out of scope for `vmsim-core`
//! (`vmsim_core::program`'s doc comment); the original loader that reads
//! `input/proc/*` files was not part of the retrieved source, so this is
//! a minimal line-oriented encoding of `vmsim_core::program::Instruction`:
//! one instruction per line, opcode name first, then up to six
//! whitespace-separated integer arguments. Blank lines and `#` comments
//! are skipped, matching the config grammar's convention (§10).

use std::path::Path;

use vmsim_core::program::{Instruction, Opcode};

#[derive(Debug, thiserror::Error)]
pub enum ProgramError {
    #[error("cannot read program file {path}: {reason}")]
    Unreadable { path: String, reason: String },

    #[error("line {line}: unknown opcode {opcode:?}")]
    UnknownOpcode { line: usize, opcode: String },

    #[error("line {line}: argument {arg:?} is not an integer")]
    BadArgument { line: usize, arg: String },
}

pub fn load(path: &Path) -> Result<Vec<Instruction>, ProgramError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| ProgramError::Unreadable { path: path.display().to_string(), reason: e.to_string() })?;
    parse(&text)
}

fn parse(text: &str) -> Result<Vec<Instruction>, ProgramError> {
    let mut program = Vec::new();
    for (idx, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line_no = idx + 1;
        let mut fields = line.split_whitespace();
        let opcode_name = fields.next().expect("non-empty line has at least one field");
        let opcode = match opcode_name.to_ascii_uppercase().as_str() {
            "CALC" => Opcode::Calc,
            "ALLOC" => Opcode::Alloc,
            "FREE" => Opcode::Free,
            "READ" => Opcode::Read,
            "WRITE" => Opcode::Write,
            "SYSCALL" => Opcode::Syscall,
            other => return Err(ProgramError::UnknownOpcode { line: line_no, opcode: other.to_string() }),
        };

        let mut args = [0i64; 6];
        for (slot, arg) in args.iter_mut().zip(fields) {
            *slot = arg.parse().map_err(|_| ProgramError::BadArgument { line: line_no, arg: arg.to_string() })?;
        }
        program.push(Instruction::new(opcode, args));
    }
    Ok(program)
}
