//! Small commands shared by most device types: TEST UNIT READY, REQUEST
//! SENSE, PREVENT ALLOW MEDIUM REMOVAL, SYNCHRONIZE CACHE and REPORT LUNS.

use super::{Command, encode_cdb, length_at};
use crate::scsi::error::Result;
use crate::scsi::field::{Layout, Record, bits};
use crate::scsi::opcode::Opcode;
use crate::scsi::sense::{SENSE_SIZE, Sense};

/// TEST UNIT READY, SPC-4 6.47
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TestUnitReady;

impl TestUnitReady {
    pub const CDB: Layout = Layout::new("TestUnitReady", 6, &[("opcode", bits(0xff, 0))]);
}

impl Command for TestUnitReady {
    const OPCODE: &'static str = "TEST_UNIT_READY";
    type Output = ();

    fn cdb(&self, opcode: &Opcode) -> Result<Vec<u8>> {
        encode_cdb(&Self::CDB, opcode, &Record::new())
    }

    fn unmarshall(&self, _data_in: &[u8]) -> Result<()> {
        Ok(())
    }
}

/// REQUEST SENSE, SPC-4 6.39
///
/// Transports without autosense use this to fetch the sense data of a
/// command that failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RequestSense {
    /// Ask for descriptor format sense data.
    pub desc: bool,
    pub alloc_len: u8,
}

impl Default for RequestSense {
    fn default() -> Self {
        Self {
            desc: false,
            alloc_len: SENSE_SIZE as u8,
        }
    }
}

impl RequestSense {
    pub const CDB: Layout = Layout::new(
        "RequestSense",
        6,
        &[
            ("opcode", bits(0xff, 0)),
            ("desc", bits(0x01, 1)),
            ("alloc_len", bits(0xff, 4)),
        ],
    );
}

impl Command for RequestSense {
    const OPCODE: &'static str = "REQUEST_SENSE";
    type Output = Sense;

    fn cdb(&self, opcode: &Opcode) -> Result<Vec<u8>> {
        let record = Record::new()
            .with("desc", self.desc)
            .with("alloc_len", self.alloc_len);
        encode_cdb(&Self::CDB, opcode, &record)
    }

    fn data_in_len(&self) -> Result<usize> {
        Ok(usize::from(self.alloc_len))
    }

    fn unmarshall(&self, data_in: &[u8]) -> Result<Sense> {
        Ok(Sense::parse(data_in))
    }
}

/// Values of the PREVENT field.
pub mod prevent {
    pub const ALLOW: u8 = 0x00;
    pub const PREVENT: u8 = 0x01;
    pub const PERSISTENT_ALLOW: u8 = 0x02;
    pub const PERSISTENT_PREVENT: u8 = 0x03;
}

/// PREVENT ALLOW MEDIUM REMOVAL, SBC-4 5.13
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PreventAllowMediumRemoval {
    pub prevent: u8,
}

impl PreventAllowMediumRemoval {
    pub const CDB: Layout = Layout::new(
        "PreventAllowMediumRemoval",
        6,
        &[("opcode", bits(0xff, 0)), ("prevent", bits(0x03, 4))],
    );
}

impl Command for PreventAllowMediumRemoval {
    const OPCODE: &'static str = "PREVENT_ALLOW_MEDIUM_REMOVAL";
    type Output = ();

    fn cdb(&self, opcode: &Opcode) -> Result<Vec<u8>> {
        encode_cdb(&Self::CDB, opcode, &Record::new().with("prevent", self.prevent))
    }

    fn unmarshall(&self, _data_in: &[u8]) -> Result<()> {
        Ok(())
    }
}

/// SYNCHRONIZE CACHE (10), SBC-4 5.26
///
/// `numblks` of zero flushes everything from `lba` to the end of the medium.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SynchronizeCache10 {
    pub lba: u32,
    pub numblks: u16,
    pub immed: bool,
    pub group: u8,
}

impl SynchronizeCache10 {
    pub const CDB: Layout = Layout::new(
        "SynchronizeCache10",
        10,
        &[
            ("opcode", bits(0xff, 0)),
            ("immed", bits(0x02, 1)),
            ("lba", bits(0xffffffff, 2)),
            ("group", bits(0x1f, 6)),
            ("numblks", bits(0xffff, 7)),
        ],
    );
}

impl Command for SynchronizeCache10 {
    const OPCODE: &'static str = "SYNCHRONIZE_CACHE_10";
    type Output = ();

    fn cdb(&self, opcode: &Opcode) -> Result<Vec<u8>> {
        let record = Record::new()
            .with("immed", self.immed)
            .with("lba", self.lba)
            .with("group", self.group)
            .with("numblks", self.numblks);
        encode_cdb(&Self::CDB, opcode, &record)
    }

    fn unmarshall(&self, _data_in: &[u8]) -> Result<()> {
        Ok(())
    }
}

/// SYNCHRONIZE CACHE (16), SBC-4 5.27
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SynchronizeCache16 {
    pub lba: u64,
    pub numblks: u32,
    pub immed: bool,
    pub group: u8,
}

impl SynchronizeCache16 {
    pub const CDB: Layout = Layout::new(
        "SynchronizeCache16",
        16,
        &[
            ("opcode", bits(0xff, 0)),
            ("immed", bits(0x02, 1)),
            ("lba", bits(0xffffffffffffffff, 2)),
            ("numblks", bits(0xffffffff, 10)),
            ("group", bits(0x1f, 14)),
        ],
    );
}

impl Command for SynchronizeCache16 {
    const OPCODE: &'static str = "SYNCHRONIZE_CACHE_16";
    type Output = ();

    fn cdb(&self, opcode: &Opcode) -> Result<Vec<u8>> {
        let record = Record::new()
            .with("immed", self.immed)
            .with("lba", self.lba)
            .with("numblks", self.numblks)
            .with("group", self.group);
        encode_cdb(&Self::CDB, opcode, &record)
    }

    fn unmarshall(&self, _data_in: &[u8]) -> Result<()> {
        Ok(())
    }
}

/// SYNCHRONIZE CACHE as MMC-6 6.41 defines it: the whole cache, no range.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SynchronizeCache;

impl SynchronizeCache {
    pub const CDB: Layout = Layout::new("SynchronizeCache", 10, &[("opcode", bits(0xff, 0))]);
}

impl Command for SynchronizeCache {
    const OPCODE: &'static str = "SYNCHRONIZE_CACHE";
    type Output = ();

    fn cdb(&self, opcode: &Opcode) -> Result<Vec<u8>> {
        encode_cdb(&Self::CDB, opcode, &Record::new())
    }

    fn unmarshall(&self, _data_in: &[u8]) -> Result<()> {
        Ok(())
    }
}

/// Values of SELECT REPORT.
pub mod select_report {
    pub const LOGICAL_UNITS: u8 = 0x00;
    pub const WELL_KNOWN_LOGICAL_UNITS: u8 = 0x01;
    pub const ALL_LOGICAL_UNITS: u8 = 0x02;
}

/// REPORT LUNS, SPC-4 6.33
///
/// Decodes to the 8-byte LUNs as big-endian integers. A LUN list longer
/// than the allocation length is cut to the LUNs that fit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReportLuns {
    pub select_report: u8,
    pub alloc_len: u32,
}

impl Default for ReportLuns {
    fn default() -> Self {
        Self {
            select_report: select_report::LOGICAL_UNITS,
            alloc_len: 96,
        }
    }
}

impl ReportLuns {
    pub const CDB: Layout = Layout::new(
        "ReportLuns",
        12,
        &[
            ("opcode", bits(0xff, 0)),
            ("select_report", bits(0xff, 2)),
            ("alloc_len", bits(0xffffffff, 6)),
        ],
    );

    pub fn unmarshall_datain(data: &[u8]) -> Result<Vec<u64>> {
        let len = length_at(data, 0, 4, "REPORT LUNS header")?;
        let end = data.len().min(8 + len);
        Ok(data
            .get(8..end)
            .unwrap_or_default()
            .chunks_exact(8)
            .map(|lun| u64::from_be_bytes([lun[0], lun[1], lun[2], lun[3], lun[4], lun[5], lun[6], lun[7]]))
            .collect())
    }

    pub fn marshall_datain(luns: &[u64]) -> Vec<u8> {
        let mut buf = vec![0; 8];
        buf[..4].copy_from_slice(&((luns.len() * 8) as u32).to_be_bytes());
        for lun in luns {
            buf.extend(lun.to_be_bytes());
        }
        buf
    }
}

impl Command for ReportLuns {
    const OPCODE: &'static str = "REPORT_LUNS";
    type Output = Vec<u64>;

    fn cdb(&self, opcode: &Opcode) -> Result<Vec<u8>> {
        let record = Record::new()
            .with("select_report", self.select_report)
            .with("alloc_len", self.alloc_len);
        encode_cdb(&Self::CDB, opcode, &record)
    }

    fn data_in_len(&self) -> Result<usize> {
        Ok(self.alloc_len as usize)
    }

    fn unmarshall(&self, data_in: &[u8]) -> Result<Vec<u64>> {
        Self::unmarshall_datain(data_in)
    }
}
