//! Single-step x86 decoding used by the version scan.
//!
//! Only the pieces the scan needs are surfaced: mnemonic, operand list and
//! encoded length. Running out of bytes at an instruction boundary is the
//! normal end of a scan (`Ok(None)`); anything else that stops decoding is a
//! [`Error::Decode`].

use iced_x86::{Decoder, DecoderError, DecoderOptions, Instruction, Mnemonic, OpKind, Register};

use crate::error::{Error, Result};

/// Base register class of a memory operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemBase {
    /// `rip`/`eip` relative.
    Ip,
    /// `rsp`/`esp` relative.
    Sp,
    Other(Register),
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemOperand {
    pub base: MemBase,
    pub index: Option<Register>,
    /// Encoded displacement. Instruction-pointer relative operands are not
    /// resolved here.
    pub displacement: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    Register(Register),
    Memory(MemOperand),
    Immediate(u64),
    Other,
}

/// One decoded instruction.
#[derive(Debug, Clone)]
pub struct Decoded {
    /// Offset of the first byte in the scanned buffer.
    pub offset: usize,
    pub len: usize,
    pub mnemonic: Mnemonic,
    pub operands: Vec<Operand>,
}

impl Decoded {
    pub fn is_lea(&self) -> bool {
        self.mnemonic == Mnemonic::Lea
    }

    /// Offset just past this instruction.
    pub fn end(&self) -> usize {
        self.offset + self.len
    }
}

/// Longest legal x86 instruction.
const MAX_INSTRUCTION_LEN: usize = 15;

/// Linear decoder over a code buffer.
pub struct Scanner<'a> {
    decoder: Decoder<'a>,
    code: &'a [u8],
    bitness: u32,
}

impl<'a> Scanner<'a> {
    /// Creates a scanner for 32- or 64-bit code.
    pub fn new(bitness: u32, code: &'a [u8]) -> Result<Self> {
        if bitness != 32 && bitness != 64 {
            return Err(Error::UnsupportedArchitecture(format!(
                "{bitness}-bit x86"
            )));
        }
        let decoder = Decoder::try_new(bitness, code, DecoderOptions::NONE)
            .map_err(|e| Error::UnsupportedArchitecture(e.to_string()))?;
        Ok(Self {
            decoder,
            code,
            bitness,
        })
    }

    /// Current offset in the buffer.
    pub fn offset(&self) -> usize {
        self.decoder.position()
    }

    /// Decodes the next instruction, or returns `None` once the buffer is used up.
    pub fn next_instruction(&mut self) -> Result<Option<Decoded>> {
        if !self.decoder.can_decode() {
            return Ok(None);
        }

        let offset = self.decoder.position();
        let instr = self.decoder.decode();
        if instr.is_invalid() {
            let reason = match self.decoder.last_error() {
                DecoderError::NoMoreBytes if self.decodes_when_padded(offset) => {
                    "truncated instruction"
                }
                _ => "invalid opcode",
            };
            return Err(Error::Decode {
                offset,
                reason: reason.to_string(),
            });
        }

        Ok(Some(Decoded {
            offset,
            len: instr.len(),
            mnemonic: instr.mnemonic(),
            operands: self.operands(&instr),
        }))
    }

    /// iced reports `NoMoreBytes` for anything within 15 bytes of the end,
    /// including opcodes that are invalid regardless of what follows. Decode
    /// the tail again with `nop` padding: only a truncated instruction
    /// becomes valid.
    fn decodes_when_padded(&self, offset: usize) -> bool {
        let tail = self.code.get(offset..).unwrap_or_default();
        let mut padded = [0x90u8; MAX_INSTRUCTION_LEN];
        let n = tail.len().min(MAX_INSTRUCTION_LEN);
        padded[..n].copy_from_slice(&tail[..n]);

        match Decoder::try_new(self.bitness, &padded, DecoderOptions::NONE) {
            Ok(mut decoder) => !decoder.decode().is_invalid(),
            Err(_) => false,
        }
    }

    fn operands(&self, instr: &Instruction) -> Vec<Operand> {
        (0..instr.op_count())
            .map(|i| match instr.op_kind(i) {
                OpKind::Register => Operand::Register(instr.op_register(i)),
                OpKind::Memory => Operand::Memory(self.memory_operand(instr)),
                OpKind::Immediate8
                | OpKind::Immediate8_2nd
                | OpKind::Immediate16
                | OpKind::Immediate32
                | OpKind::Immediate64
                | OpKind::Immediate8to16
                | OpKind::Immediate8to32
                | OpKind::Immediate8to64
                | OpKind::Immediate32to64 => Operand::Immediate(instr.immediate(i)),
                _ => Operand::Other,
            })
            .collect()
    }

    fn memory_operand(&self, instr: &Instruction) -> MemOperand {
        let base = match instr.memory_base() {
            Register::RIP | Register::EIP => MemBase::Ip,
            Register::RSP | Register::ESP | Register::SP => MemBase::Sp,
            Register::None => MemBase::None,
            other => MemBase::Other(other),
        };
        let index = match instr.memory_index() {
            Register::None => None,
            reg => Some(reg),
        };
        // iced folds ip-relative displacements into an absolute target.
        let displacement = match (base, self.bitness) {
            (MemBase::Ip, _) => instr.memory_displacement64().wrapping_sub(instr.next_ip()) as i64,
            (_, 64) => instr.memory_displacement64() as i64,
            _ => i64::from(instr.memory_displacement32() as i32),
        };
        MemOperand {
            base,
            index,
            displacement,
        }
    }
}
