//! Spend constraints: the predicate an `Output` attaches to itself, and the
//! evaluator an `Input`'s satisfier is checked against.
//!
//! The predicate is opaque to the rest of the engine: it is modeled as a
//! tagged variant rather than a general scripting host, with an evaluator
//! that treats any failure (script error or panic) as an unsatisfied input.

use serde::{Deserialize, Serialize};
use std::fmt;

const MAX_STACK_SIZE: usize = 1000;
const MAX_SCRIPT_SIZE: usize = 10_000;
const MAX_OPS: usize = 1000;

/// A spend predicate attached to an `Output`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Constraint {
    /// Always spendable, regardless of satisfier.
    AlwaysSpendable,
    /// A stack-based script evaluated against the satisfier bytes.
    Script(Vec<u8>),
}

impl Constraint {
    /// Evaluates this constraint against a witness `satisfier`.
    ///
    /// Any script error, or a panic inside the VM, is treated as an
    /// unsatisfied input rather than propagated — per the engine's rule
    /// that predicate failure is indistinguishable from predicate `false`.
    #[must_use]
    pub fn is_satisfied(&self, satisfier: &[u8]) -> bool {
        match self {
            Self::AlwaysSpendable => true,
            Self::Script(locking_script) => {
                let locking_script = locking_script.clone();
                let satisfier = satisfier.to_vec();
                std::panic::catch_unwind(move || evaluate(&satisfier, &locking_script))
                    .unwrap_or(false)
            }
        }
    }
}

fn evaluate(satisfier: &[u8], locking_script: &[u8]) -> bool {
    let mut vm = ScriptVm::new();
    if !satisfier.is_empty() {
        match vm.execute(satisfier) {
            Ok(true) => {}
            _ => return false,
        }
    }
    if locking_script.is_empty() {
        return true;
    }
    matches!(vm.execute(locking_script), Ok(true))
}

/// Opcodes for the non-Turing-complete stack machine backing `Constraint::Script`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum OpCode {
    Dup = 0x01,
    Drop = 0x02,
    Swap = 0x03,
    PushData = 0x10,
    PushNum = 0x11,
    Add = 0x20,
    Sub = 0x21,
    Equal = 0x30,
    EqualVerify = 0x31,
    LessThan = 0x32,
    GreaterThan = 0x33,
    Hash256 = 0x40,
    Verify = 0x53,
    Return = 0x54,
    Nop = 0xFF,
}

impl TryFrom<u8> for OpCode {
    type Error = ScriptError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(Self::Dup),
            0x02 => Ok(Self::Drop),
            0x03 => Ok(Self::Swap),
            0x10 => Ok(Self::PushData),
            0x11 => Ok(Self::PushNum),
            0x20 => Ok(Self::Add),
            0x21 => Ok(Self::Sub),
            0x30 => Ok(Self::Equal),
            0x31 => Ok(Self::EqualVerify),
            0x32 => Ok(Self::LessThan),
            0x33 => Ok(Self::GreaterThan),
            0x40 => Ok(Self::Hash256),
            0x53 => Ok(Self::Verify),
            0x54 => Ok(Self::Return),
            0xFF => Ok(Self::Nop),
            other => Err(ScriptError(format!("unknown opcode: 0x{other:02x}"))),
        }
    }
}

#[derive(Debug, Clone)]
struct ScriptError(String);

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum StackItem {
    Data(Vec<u8>),
    Number(i64),
    Boolean(bool),
}

impl StackItem {
    fn as_bytes(&self) -> Vec<u8> {
        match self {
            Self::Data(data) => data.clone(),
            Self::Number(n) => n.to_le_bytes().to_vec(),
            Self::Boolean(b) => vec![u8::from(*b)],
        }
    }

    fn as_number(&self) -> Result<i64, ScriptError> {
        match self {
            Self::Number(n) => Ok(*n),
            Self::Boolean(b) => Ok(i64::from(*b)),
            Self::Data(data) if data.len() <= 8 => {
                let mut bytes = [0u8; 8];
                bytes[..data.len()].copy_from_slice(data);
                Ok(i64::from_le_bytes(bytes))
            }
            Self::Data(_) => Err(ScriptError("cannot convert data to number".into())),
        }
    }

    fn as_bool(&self) -> bool {
        match self {
            Self::Boolean(b) => *b,
            Self::Number(n) => *n != 0,
            Self::Data(data) => data.iter().any(|&b| b != 0),
        }
    }
}

struct ScriptVm {
    stack: Vec<StackItem>,
    op_count: usize,
}

impl ScriptVm {
    fn new() -> Self {
        Self {
            stack: Vec::new(),
            op_count: 0,
        }
    }

    fn execute(&mut self, script: &[u8]) -> Result<bool, ScriptError> {
        if script.len() > MAX_SCRIPT_SIZE {
            return Err(ScriptError("script too large".into()));
        }

        let mut pc = 0;
        while pc < script.len() {
            if self.op_count > MAX_OPS {
                return Err(ScriptError("too many operations".into()));
            }
            let opcode = OpCode::try_from(script[pc])?;
            pc += 1;
            self.op_count += 1;

            match opcode {
                OpCode::Dup => self.op_dup()?,
                OpCode::Drop => {
                    self.pop()?;
                }
                OpCode::Swap => self.op_swap()?,
                OpCode::PushData => {
                    let (data, new_pc) = read_push_data(script, pc)?;
                    pc = new_pc;
                    self.stack.push(StackItem::Data(data));
                }
                OpCode::PushNum => {
                    let (num, new_pc) = read_number(script, pc)?;
                    pc = new_pc;
                    self.stack.push(StackItem::Number(num));
                }
                OpCode::Add => self.op_arith(|a, b| a.wrapping_add(b))?,
                OpCode::Sub => self.op_arith(|a, b| a.wrapping_sub(b))?,
                OpCode::Equal => self.op_equal()?,
                OpCode::EqualVerify => {
                    self.op_equal()?;
                    self.op_verify()?;
                }
                OpCode::LessThan => self.op_compare(|a, b| a < b)?,
                OpCode::GreaterThan => self.op_compare(|a, b| a > b)?,
                OpCode::Hash256 => self.op_hash256()?,
                OpCode::Verify => self.op_verify()?,
                OpCode::Return => return Ok(false),
                OpCode::Nop => {}
            }

            if self.stack.len() > MAX_STACK_SIZE {
                return Err(ScriptError("stack overflow".into()));
            }
        }

        Ok(self.stack.last().is_some_and(StackItem::as_bool))
    }

    fn pop(&mut self) -> Result<StackItem, ScriptError> {
        self.stack.pop().ok_or_else(|| ScriptError("stack underflow".into()))
    }

    fn op_dup(&mut self) -> Result<(), ScriptError> {
        let top = self.stack.last().cloned().ok_or_else(|| ScriptError("stack underflow".into()))?;
        self.stack.push(top);
        Ok(())
    }

    fn op_swap(&mut self) -> Result<(), ScriptError> {
        let len = self.stack.len();
        if len < 2 {
            return Err(ScriptError("stack underflow".into()));
        }
        self.stack.swap(len - 1, len - 2);
        Ok(())
    }

    fn op_arith(&mut self, f: impl Fn(i64, i64) -> i64) -> Result<(), ScriptError> {
        let b = self.pop()?.as_number()?;
        let a = self.pop()?.as_number()?;
        self.stack.push(StackItem::Number(f(a, b)));
        Ok(())
    }

    fn op_compare(&mut self, f: impl Fn(i64, i64) -> bool) -> Result<(), ScriptError> {
        let b = self.pop()?.as_number()?;
        let a = self.pop()?.as_number()?;
        self.stack.push(StackItem::Boolean(f(a, b)));
        Ok(())
    }

    fn op_equal(&mut self) -> Result<(), ScriptError> {
        let b = self.pop()?;
        let a = self.pop()?;
        self.stack.push(StackItem::Boolean(a.as_bytes() == b.as_bytes()));
        Ok(())
    }

    fn op_hash256(&mut self) -> Result<(), ScriptError> {
        let data = self.pop()?;
        let hash = ledger_shared::Hash256::sha256(&data.as_bytes());
        self.stack.push(StackItem::Data(hash.as_bytes().to_vec()));
        Ok(())
    }

    fn op_verify(&mut self) -> Result<(), ScriptError> {
        let top = self.pop()?;
        if top.as_bool() {
            Ok(())
        } else {
            Err(ScriptError("OP_VERIFY failed".into()))
        }
    }
}

fn read_push_data(script: &[u8], pc: usize) -> Result<(Vec<u8>, usize), ScriptError> {
    if pc >= script.len() {
        return Err(ScriptError("unexpected end of script in PUSHDATA".into()));
    }
    let len = script[pc] as usize;
    let start = pc + 1;
    let end = start + len;
    if end > script.len() {
        return Err(ScriptError("invalid PUSHDATA length".into()));
    }
    Ok((script[start..end].to_vec(), end))
}

fn read_number(script: &[u8], pc: usize) -> Result<(i64, usize), ScriptError> {
    if pc + 8 > script.len() {
        return Err(ScriptError("unexpected end of script in PUSHNUM".into()));
    }
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&script[pc..pc + 8]);
    Ok((i64::from_le_bytes(bytes), pc + 8))
}

/// A script builder, used by tests and callers constructing `Constraint::Script` values.
#[derive(Debug, Default)]
pub struct ScriptBuilder {
    script: Vec<u8>,
}

impl ScriptBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn push_opcode(mut self, opcode: u8) -> Self {
        self.script.push(opcode);
        self
    }

    #[must_use]
    pub fn push_data(mut self, data: &[u8]) -> Self {
        self.script.push(OpCode::PushData as u8);
        #[allow(clippy::cast_possible_truncation)]
        self.script.push(data.len() as u8);
        self.script.extend_from_slice(data);
        self
    }

    #[must_use]
    pub fn push_number(mut self, num: i64) -> Self {
        self.script.push(OpCode::PushNum as u8);
        self.script.extend_from_slice(&num.to_le_bytes());
        self
    }

    #[must_use]
    pub fn build(self) -> Vec<u8> {
        self.script
    }
}

/// Unused re-export point kept for callers that only need opcode constants.
pub mod opcodes {
    pub const DUP: u8 = super::OpCode::Dup as u8;
    pub const DROP: u8 = super::OpCode::Drop as u8;
    pub const SWAP: u8 = super::OpCode::Swap as u8;
    pub const ADD: u8 = super::OpCode::Add as u8;
    pub const SUB: u8 = super::OpCode::Sub as u8;
    pub const EQUAL: u8 = super::OpCode::Equal as u8;
    pub const EQUAL_VERIFY: u8 = super::OpCode::EqualVerify as u8;
    pub const LESS_THAN: u8 = super::OpCode::LessThan as u8;
    pub const GREATER_THAN: u8 = super::OpCode::GreaterThan as u8;
    pub const HASH256: u8 = super::OpCode::Hash256 as u8;
    pub const VERIFY: u8 = super::OpCode::Verify as u8;
    pub const RETURN: u8 = super::OpCode::Return as u8;
    pub const NOP: u8 = super::OpCode::Nop as u8;
}
