//! READ CAPACITY (10), READ CAPACITY (16) and GET LBA STATUS.

use super::{Command, encode_cdb, length_at, slice};
use crate::scsi::error::{Error, Result};
use crate::scsi::field::{Layout, Record, bits};
use crate::scsi::opcode::Opcode;

/// "The READ CAPACITY (10) command requests that the device server transfer
/// 8 bytes of parameter data describing the capacity and medium format of
/// the direct access block device to the Data-In Buffer."
///
/// SBC-4 5.20. Decodes to `returned_lba` and `block_length`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReadCapacity10 {
    pub alloc_len: usize,
}

impl Default for ReadCapacity10 {
    fn default() -> Self {
        Self { alloc_len: 8 }
    }
}

impl ReadCapacity10 {
    pub const CDB: Layout = Layout::new("ReadCapacity10", 10, &[("opcode", bits(0xff, 0))]);

    pub const DATA_IN: Layout = Layout::new(
        "ReadCapacity10 data",
        8,
        &[
            ("returned_lba", bits(0xffffffff, 0)),
            ("block_length", bits(0xffffffff, 4)),
        ],
    );

    pub fn marshall_datain(data: &Record) -> Result<Vec<u8>> {
        Self::DATA_IN.encode(data)
    }
}

impl Command for ReadCapacity10 {
    const OPCODE: &'static str = "READ_CAPACITY_10";
    type Output = Record;

    fn cdb(&self, opcode: &Opcode) -> Result<Vec<u8>> {
        encode_cdb(&Self::CDB, opcode, &Record::new())
    }

    fn data_in_len(&self) -> Result<usize> {
        Ok(self.alloc_len)
    }

    fn unmarshall(&self, data_in: &[u8]) -> Result<Record> {
        Self::DATA_IN.decode(data_in)
    }
}

/// Values of `p_type`.
pub mod p_type {
    pub const TYPE_1_PROTECTION: u8 = 0x00;
    pub const TYPE_2_PROTECTION: u8 = 0x01;
    pub const TYPE_3_PROTECTION: u8 = 0x02;
}

/// READ CAPACITY (16), SBC-4 5.21
///
/// A service action of SERVICE ACTION IN (16).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReadCapacity16 {
    pub alloc_len: u32,
}

impl Default for ReadCapacity16 {
    fn default() -> Self {
        Self { alloc_len: 32 }
    }
}

impl ReadCapacity16 {
    pub const CDB: Layout = Layout::new(
        "ReadCapacity16",
        16,
        &[
            ("opcode", bits(0xff, 0)),
            ("service_action", bits(0x1f, 1)),
            ("alloc_len", bits(0xffffffff, 10)),
        ],
    );

    pub const DATA_IN: Layout = Layout::new(
        "ReadCapacity16 data",
        32,
        &[
            ("returned_lba", bits(0xffffffffffffffff, 0)),
            ("block_length", bits(0xffffffff, 8)),
            ("p_type", bits(0x0e, 12)),
            ("prot_en", bits(0x01, 12)),
            ("p_i_exponent", bits(0xf0, 13)),
            ("lbppbe", bits(0x0f, 13)),
            ("lbpme", bits(0x80, 14)),
            ("lbprz", bits(0x40, 14)),
            ("lowest_aligned_lba", bits(0x3fff, 14)),
        ],
    );

    pub fn marshall_datain(data: &Record) -> Result<Vec<u8>> {
        Self::DATA_IN.encode(data)
    }
}

impl Command for ReadCapacity16 {
    const OPCODE: &'static str = "SERVICE_ACTION_IN_16";
    type Output = Record;

    fn cdb(&self, opcode: &Opcode) -> Result<Vec<u8>> {
        let record = Record::new()
            .with("service_action", opcode.service_action("READ_CAPACITY_16")?)
            .with("alloc_len", self.alloc_len);
        encode_cdb(&Self::CDB, opcode, &record)
    }

    fn data_in_len(&self) -> Result<usize> {
        Ok(self.alloc_len as usize)
    }

    fn unmarshall(&self, data_in: &[u8]) -> Result<Record> {
        Self::DATA_IN.decode_padded(data_in)
    }
}

/// Values of `p_status` in an LBA status descriptor.
pub mod p_status {
    pub const MAPPED: u8 = 0x00;
    pub const DEALLOCATED: u8 = 0x01;
    pub const ANCHORED: u8 = 0x02;
}

/// GET LBA STATUS, SBC-4 5.7
///
/// Reports the provisioning status of extents starting at `lba`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GetLbaStatus {
    pub lba: u64,
    pub alloc_len: u32,
}

impl GetLbaStatus {
    pub const CDB: Layout = Layout::new(
        "GetLbaStatus",
        16,
        &[
            ("opcode", bits(0xff, 0)),
            ("service_action", bits(0x1f, 1)),
            ("lba", bits(0xffffffffffffffff, 2)),
            ("alloc_len", bits(0xffffffff, 10)),
        ],
    );

    /// One LBA status descriptor.
    pub const DESCRIPTOR: Layout = Layout::new(
        "LBA status descriptor",
        16,
        &[
            ("lba", bits(0xffffffffffffffff, 0)),
            ("num_blocks", bits(0xffffffff, 8)),
            ("p_status", bits(0x0f, 12)),
        ],
    );

    pub fn new(lba: u64) -> Self {
        Self {
            lba,
            alloc_len: 16384,
        }
    }

    /// The parameter data for `status`, as a device would return it.
    pub fn marshall_datain(status: &LbaStatus) -> Result<Vec<u8>> {
        let mut buf = vec![0; 8];
        for lba in &status.lbas {
            buf.extend(Self::DESCRIPTOR.encode(lba)?);
        }
        let len = (buf.len() - 4) as u32;
        buf[..4].copy_from_slice(&len.to_be_bytes());
        Ok(buf)
    }
}

/// Decoded GET LBA STATUS parameter data.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LbaStatus {
    pub lbas: Vec<Record>,
}

impl Command for GetLbaStatus {
    const OPCODE: &'static str = "SERVICE_ACTION_IN_16";
    type Output = LbaStatus;

    fn cdb(&self, opcode: &Opcode) -> Result<Vec<u8>> {
        let record = Record::new()
            .with("service_action", opcode.service_action("GET_LBA_STATUS")?)
            .with("lba", self.lba)
            .with("alloc_len", self.alloc_len);
        encode_cdb(&Self::CDB, opcode, &record)
    }

    fn data_in_len(&self) -> Result<usize> {
        Ok(self.alloc_len as usize)
    }

    fn unmarshall(&self, data_in: &[u8]) -> Result<LbaStatus> {
        // PARAMETER DATA LENGTH counts everything after itself, including
        // the four reserved bytes before the first descriptor.
        let len = length_at(data_in, 0, 4, "GET LBA STATUS header")?;
        if len < 4 || (len - 4) % 16 != 0 {
            return Err(Error::InvalidLength {
                field: "parameter_data_length",
                value: len as u64,
                expected: "4 plus a multiple of 16",
            });
        }
        let list = slice(data_in, 8, len - 4, "LBA status descriptors")?;
        let lbas = list
            .chunks_exact(16)
            .map(|d| Self::DESCRIPTOR.decode(d))
            .collect::<Result<_>>()?;
        Ok(LbaStatus { lbas })
    }
}
