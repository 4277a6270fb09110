//! Instruction format and the external-interpreter seam.
//!
//! §1 lists "the instruction loader and the instruction interpreter (`run`)
//! executing program opcodes" as out of scope; `Pcb::step`-style APIs still
//! need a concrete instruction type, so these six opcodes (`CALC`, `ALLOC`,
//! `FREE`, `READ`, `WRITE`, `SYSCALL`) are carried here as plain data,
//! following `original_source/include/common.h`'s `inst_t` shape. Actually
//! executing a stream of them end to end belongs to whatever embeds this
//! crate, via `InstructionInterpreter`; `ReferenceCpu` is a minimal
//! in-crate implementation that exists only so this crate's own tests can
//! drive scenarios without a second crate.

use crate::error::VmResult;
use crate::kernel::Kernel;
use crate::pcb::Pcb;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Opcode {
    Calc,
    Alloc,
    Free,
    Read,
    Write,
    Syscall,
}

/// One program instruction: an opcode plus up to six arguments, mirroring
/// `inst_t`'s `opcode` + `a1..a6` fields.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Instruction {
    pub opcode: Opcode,
    pub args: [i64; 6],
}

impl Instruction {
    pub fn new(opcode: Opcode, args: [i64; 6]) -> Self {
        Self { opcode, args }
    }
}

/// The seam between this crate's memory/scheduling core and an external
/// instruction interpreter. An embedder implements `step` to execute one
/// instruction of `pcb`'s program against `kernel` (dispatching `Alloc`/
/// `Free`/`Read`/`Write`/`Syscall` into `crate::region`/`crate::syscall` as
/// appropriate) and report whether the program has more instructions left.
pub trait InstructionInterpreter: Send + Sync {
    /// Execute the instruction at `pcb`'s current program counter. Returns
    /// `Ok(true)` if the process has more instructions after this one,
    /// `Ok(false)` if this was its last.
    fn step(&self, kernel: &Kernel, pcb: &Arc<Pcb>) -> VmResult<bool>;

    /// Bind a freshly-loaded process's instruction stream to its pid,
    /// called once by the loader (§4.8) before the process is admitted to
    /// the scheduler. Interpreters that resolve instructions another way
    /// (e.g. from a file already keyed by pid) may leave this a no-op.
    fn load_program(&self, _pid: crate::tlb::Pid, _program: Vec<Instruction>) {}
}

/// A minimal, in-crate `InstructionInterpreter` used only by this crate's
/// own integration tests. It executes a fixed program (`Vec<Instruction>`)
/// stored alongside each test process and dispatches through
/// `crate::region`/`crate::syscall` exactly as a real embedder would.
pub struct ReferenceCpu {
    programs: std::sync::Mutex<std::collections::HashMap<u32, Vec<Instruction>>>,
}

impl Default for ReferenceCpu {
    fn default() -> Self {
        Self::new()
    }
}

impl ReferenceCpu {
    pub fn new() -> Self {
        Self { programs: std::sync::Mutex::new(std::collections::HashMap::new()) }
    }
}

impl InstructionInterpreter for ReferenceCpu {
    fn load_program(&self, pid: crate::tlb::Pid, program: Vec<Instruction>) {
        self.programs.lock().unwrap().insert(pid, program);
    }

    fn step(&self, kernel: &Kernel, pcb: &Arc<Pcb>) -> VmResult<bool> {
        let pc = pcb.pc();
        let inst = {
            let programs = self.programs.lock().unwrap();
            let program = programs.get(&pcb.pid).expect("process registered with ReferenceCpu::load");
            program.get(pc).cloned()
        };
        let Some(inst) = inst else {
            return Ok(false);
        };

        match inst.opcode {
            Opcode::Calc => {}
            Opcode::Alloc => {
                let vmaid = inst.args[0] as usize;
                let rgid = inst.args[1] as usize;
                let size = inst.args[2] as usize;
                crate::region::alloc(kernel, pcb, vmaid, rgid, size)?;
            }
            Opcode::Free => {
                let vmaid = inst.args[0] as usize;
                let rgid = inst.args[1] as usize;
                crate::region::free(kernel, pcb, vmaid, rgid)?;
            }
            Opcode::Read => {
                let rgid = inst.args[0] as usize;
                let offset = inst.args[1] as usize;
                crate::region::read(kernel, pcb, rgid, offset)?;
            }
            Opcode::Write => {
                let rgid = inst.args[0] as usize;
                let offset = inst.args[1] as usize;
                let byte = inst.args[2] as u8;
                crate::region::write(kernel, pcb, rgid, offset, byte)?;
            }
            Opcode::Syscall => {}
        }

        pcb.advance_pc();
        let programs = self.programs.lock().unwrap();
        let remaining = pcb.pc() < programs.get(&pcb.pid).map(Vec::len).unwrap_or(0);
        Ok(remaining)
    }
}
