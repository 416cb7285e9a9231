//! Errors surfaced by the codec, the command envelope and transports.

use thiserror::Error;

use super::command::State;
use super::sense::Sense;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum Error {
    /// A buffer ended before a structure (or one of its fields) did.
    #[error("buffer too short for {what}: need {need} bytes, have {have}")]
    Truncated {
        what: &'static str,
        need: usize,
        have: usize,
    },
    /// A length or count field holds a value the structure does not allow.
    #[error("{field} is {value}, expected {expected}")]
    InvalidLength {
        field: &'static str,
        value: u64,
        expected: &'static str,
    },
    /// A caller supplied parameter is inconsistent with the rest of the command.
    #[error("invalid {field}: {reason}")]
    InvalidParameter { field: &'static str, reason: String },
    /// A type code that is not defined (or not known to this crate).
    #[error("unsupported {what} {code:#x}")]
    Unsupported { what: &'static str, code: u64 },
    /// A type code that the standard defines but that has no encoder/decoder here.
    #[error("{what} {code:#x} is defined but not implemented")]
    NotImplemented { what: &'static str, code: u64 },
    /// A name or description that does not resolve to a code.
    #[error("{what} {name:?} does not name a known code")]
    UnknownName { what: &'static str, name: String },
    #[error("a blocksize is required for this transfer")]
    MissingBlocksize,
    /// Opcodes 0x60..0x80 and 0xc0.. have no fixed CDB length.
    #[error("opcode {0:#04x} does not belong to a CDB size class")]
    OpcodeClass(u8),
    #[error("{name} is not part of the {set} opcode set")]
    UnknownOpcode {
        name: &'static str,
        set: &'static str,
    },
    #[error("{opcode} has no service action {name}")]
    UnknownServiceAction {
        opcode: &'static str,
        name: &'static str,
    },
    #[error("value {value:#x} does not fit field {field} (mask {mask:#x})")]
    ValueOutOfRange {
        field: &'static str,
        value: u64,
        mask: u64,
    },
    #[error("{layout} has no field named {field:?}")]
    UnknownField {
        layout: &'static str,
        field: &'static str,
    },
    #[error("field {field} holds {expected}")]
    FieldKind {
        field: &'static str,
        expected: &'static str,
    },
    /// A lifecycle step was called out of order.
    #[error("command is {actual:?}, expected {expected:?}")]
    InvalidState { actual: State, expected: State },
    /// The device returned CHECK CONDITION.
    #[error("check condition: {0}")]
    CheckCondition(Sense),
    /// The transport failed without sense data.
    #[error("transport failure: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl Error {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Error::InvalidParameter {
            field,
            reason: reason.into(),
        }
    }

    pub(crate) fn truncated(what: &'static str, need: usize, have: usize) -> Self {
        Error::Truncated { what, need, have }
    }
}
