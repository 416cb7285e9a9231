//! Sense data returned alongside a CHECK CONDITION status.
//!
//! See SPC-4 4.5, "Sense data".

use std::fmt;

/// Size of the sense buffer handed to transports.
pub const SENSE_SIZE: usize = 32;

pub const SENSE_FORMAT_CURRENT_FIXED: u8 = 0x70;
pub const SENSE_FORMAT_DEFERRED_FIXED: u8 = 0x71;
pub const SENSE_FORMAT_CURRENT_DESCRIPTOR: u8 = 0x72;
pub const SENSE_FORMAT_DEFERRED_DESCRIPTOR: u8 = 0x73;

pub const NO_SENSE: u8 = 0x00;
pub const NOT_READY: u8 = 0x02;
pub const MEDIUM_ERROR: u8 = 0x03;
pub const ILLEGAL_REQUEST: u8 = 0x05;
pub const UNIT_ATTENTION: u8 = 0x06;

/// Decoded sense data, in either fixed or descriptor format.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sense {
    /// `RESPONSE CODE`, 0x70..=0x73 for the formats understood here.
    pub response_code: u8,
    pub key: u8,
    /// Additional Sense Code.
    pub asc: u8,
    /// Additional Sense Code Qualifier.
    pub ascq: u8,
    /// Fixed format only.
    pub filemark: bool,
    /// Fixed format only.
    pub eom: bool,
    /// Fixed format only.
    pub ili: bool,
    /// `INFORMATION`, fixed format only.
    pub information: u32,
    /// `COMMAND-SPECIFIC INFORMATION`, fixed format only.
    pub command_specific_information: u32,
    /// `FIELD REPLACEABLE UNIT CODE`, fixed format only.
    pub field_replaceable_unit_code: u8,
    pub raw: Vec<u8>,
}

impl Sense {
    /// Parses a sense buffer.
    ///
    /// Unknown response codes still produce a value (with zeroed key/asc/ascq),
    /// since the raw bytes are what a caller needs in that case.
    pub fn parse(buf: &[u8]) -> Sense {
        let byte = |i: usize| buf.get(i).copied().unwrap_or(0);
        let be32 = |i: usize| u32::from_be_bytes([byte(i), byte(i + 1), byte(i + 2), byte(i + 3)]);
        let response_code = byte(0) & 0x7f;
        let mut sense = Sense {
            response_code,
            key: 0,
            asc: 0,
            ascq: 0,
            filemark: false,
            eom: false,
            ili: false,
            information: 0,
            command_specific_information: 0,
            field_replaceable_unit_code: 0,
            raw: buf.to_vec(),
        };
        match response_code {
            SENSE_FORMAT_CURRENT_FIXED | SENSE_FORMAT_DEFERRED_FIXED => {
                sense.filemark = byte(2) & 0x80 != 0;
                sense.eom = byte(2) & 0x40 != 0;
                sense.ili = byte(2) & 0x20 != 0;
                sense.key = byte(2) & 0x0f;
                sense.information = be32(3);
                sense.command_specific_information = be32(8);
                sense.asc = byte(12);
                sense.ascq = byte(13);
                sense.field_replaceable_unit_code = byte(14);
            }
            SENSE_FORMAT_CURRENT_DESCRIPTOR | SENSE_FORMAT_DEFERRED_DESCRIPTOR => {
                sense.key = byte(1) & 0x0f;
                sense.asc = byte(2);
                sense.ascq = byte(3);
            }
            _ => {}
        }
        sense
    }

    /// `ASC << 8 | ASCQ`
    pub fn ascq_code(&self) -> u16 {
        u16::from(self.asc) << 8 | u16::from(self.ascq)
    }

    pub fn key_name(&self) -> &'static str {
        match self.key {
            0x00 => "No Sense",
            0x01 => "Recovered Error",
            0x02 => "Not Ready",
            0x03 => "Medium Error",
            0x04 => "Hardware Error",
            0x05 => "Illegal Request",
            0x06 => "Unit Attention",
            0x07 => "Data Protect",
            0x08 => "Blank Check",
            0x09 => "Vendor Specific",
            0x0a => "Copy Aborted",
            0x0b => "Aborted Command",
            0x0d => "Volume Overflow",
            0x0e => "Miscompare",
            0x0f => "Completed",
            _ => "Reserved",
        }
    }

    pub fn ascq_name(&self) -> Option<&'static str> {
        Some(match self.ascq_code() {
            0x0400 => "Logical Unit Not Ready, Cause Not Reportable",
            0x2000 => "Invalid Command Operation Code",
            0x2100 => "Logical Block Address Out Of Range",
            0x2400 => "Invalid Field In CDB",
            0x2401 => "CDB Decryption Error",
            0x2404 => "Security Audit Value Frozen",
            0x2405 => "Security Working Key Frozen",
            0x2406 => "Nonce Not Unique",
            0x2407 => "Nonce Timestamp Out Of Range",
            0x2408 => "Invalid XCDB",
            0x2600 => "Invalid Field In Parameter List",
            0x2800 => "Not Ready To Ready Change, Medium May Have Changed",
            0x2900 => "Power On, Reset, Or Bus Device Reset Occurred",
            0x3a00 => "Medium Not Present",
            _ => return None,
        })
    }
}

impl fmt::Display for Sense {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:#04x}) ASC+Q:", self.key_name(), self.key)?;
        match self.ascq_name() {
            Some(name) => write!(f, "{name}({:#06x})", self.ascq_code()),
            None => write!(f, "{:#06x}", self.ascq_code()),
        }
    }
}
