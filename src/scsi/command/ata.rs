//! ATA PASS-THROUGH (12) and (16), SAT-4 12.2.2 and 12.2.3.
//!
//! The ATA registers travel inside the CDB, with the LBA scattered over the
//! CDB in the order the ATA task file lays it out rather than as a big-endian
//! integer. How much data moves, and in which unit, is spread over
//! `t_length`, `byte_block` and `t_type`.

use super::{Command, encode_cdb, transfer_len};
use crate::scsi::error::{Error, Result};
use crate::scsi::field::{Layout, Record, bits};
use crate::scsi::opcode::Opcode;

/// Values of the `PROTOCOL` field (SAT-4 table 156).
pub mod protocol {
    pub const ATA_HARDWARE_RESET: u8 = 0x00;
    pub const SOFTWARE_RESET: u8 = 0x01;
    pub const NON_DATA: u8 = 0x03;
    pub const PIO_DATA_IN: u8 = 0x04;
    pub const PIO_DATA_OUT: u8 = 0x05;
    pub const DMA: u8 = 0x06;
    pub const EXECUTE_DEVICE_DIAGNOSTIC: u8 = 0x08;
    pub const NON_DATA_RESET: u8 = 0x09;
    pub const UDMA_DATA_IN: u8 = 0x0a;
    pub const UDMA_DATA_OUT: u8 = 0x0b;
    pub const NCQ: u8 = 0x0c;
    pub const RETURN_RESPONSE_INFORMATION: u8 = 0x0f;
}

/// Values of the `T_LENGTH` field: where the transfer length is found.
pub mod t_length {
    pub const NO_DATA: u8 = 0;
    pub const FEATURES: u8 = 1;
    pub const COUNT: u8 = 2;
    pub const TPSIU: u8 = 3;
}

/// `T_DIR`: 0 moves data to the ATA device, 1 from it.
pub const T_DIR_OUT: u8 = 0;
pub const T_DIR_IN: u8 = 1;

/// The ATA registers and transfer controls shared by both CDB sizes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AtaPassThrough {
    pub protocol: u8,
    pub t_length: u8,
    pub byte_block: bool,
    pub t_dir: u8,
    pub t_type: bool,
    pub ck_cond: bool,
    pub off_line: u8,
    pub features: u16,
    pub count: u16,
    pub lba: u64,
    pub device: u8,
    pub command: u8,
    pub control: u8,
    /// Only used by the 16 byte form, where it marks a 48-bit command.
    pub extend: bool,
    /// ATA logical sector size, needed when `byte_block` and `t_type` are set.
    pub blocksize: u32,
    /// Transfer length when `t_length` is [`t_length::TPSIU`].
    pub extra_tl: Option<u32>,
    /// Data to send when `t_dir` is out; empty means zeroes.
    pub data: Vec<u8>,
}

impl AtaPassThrough {
    pub fn new(protocol: u8, command: u8) -> Self {
        Self {
            protocol,
            command,
            extend: true,
            ..Default::default()
        }
    }

    /// Transfer length in units of [`AtaPassThrough::unit`].
    fn blocks(&self) -> u64 {
        match self.t_length {
            t_length::FEATURES => u64::from(self.features),
            t_length::COUNT => u64::from(self.count),
            t_length::TPSIU => self.extra_tl.map(u64::from).unwrap_or(0),
            _ => 0,
        }
    }

    /// Size of one transfer unit.
    ///
    /// | byte_block | t_type | unit                  |
    /// |------------|--------|-----------------------|
    /// | 0          | -      | 1 byte                |
    /// | 1          | 0      | 512 bytes             |
    /// | 1          | 1      | the ATA sector size   |
    ///
    /// and nothing moves when `t_length` is zero.
    fn unit(&self) -> Result<u32> {
        if self.t_length == t_length::NO_DATA {
            return Ok(0);
        }
        match (self.byte_block, self.t_type) {
            (false, _) => Ok(1),
            (true, false) => Ok(512),
            (true, true) if self.blocksize == 0 => Err(Error::MissingBlocksize),
            (true, true) => Ok(self.blocksize),
        }
    }

    fn transfer(&self) -> Result<usize> {
        let unit = self.unit()?;
        if unit == 0 {
            return Ok(0);
        }
        transfer_len(unit, self.blocks())
    }

    fn record(&self) -> Record {
        Record::new()
            .with("protocol", self.protocol)
            .with("t_length", self.t_length)
            .with("byte_block", self.byte_block)
            .with("t_dir", self.t_dir)
            .with("t_type", self.t_type)
            .with("ck_cond", self.ck_cond)
            .with("off_line", self.off_line)
            .with("features", self.features)
            .with("count", self.count)
            .with("device", self.device)
            .with("command", self.command)
            .with("control", self.control)
    }

    fn data_out(&self) -> Result<Vec<u8>> {
        if self.t_dir != T_DIR_OUT {
            return Ok(Vec::new());
        }
        let len = self.transfer()?;
        if self.data.is_empty() {
            return Ok(vec![0; len]);
        }
        if self.data.len() != len {
            return Err(Error::invalid(
                "data",
                format!("{} bytes supplied, the transfer is {len} bytes", self.data.len()),
            ));
        }
        Ok(self.data.clone())
    }

    fn data_in_len(&self) -> Result<usize> {
        if self.t_dir == T_DIR_OUT {
            return Ok(0);
        }
        self.transfer()
    }
}

/// LBA(7:0) to byte 5, LBA(15:8) to byte 6, LBA(23:16) to byte 7.
pub fn ata_lba_12(lba: u64) -> u64 {
    ((lba & 0xff) << 16) | (((lba >> 8) & 0xff) << 8) | ((lba >> 16) & 0xff)
}

/// Bytes 7 through 12 carry LBA(31:24), LBA(7:0), LBA(39:32), LBA(15:8),
/// LBA(47:40) and LBA(23:16).
pub fn ata_lba_16(lba: u64) -> u64 {
    ((lba & 0xff) << 32)
        | (((lba >> 8) & 0xff) << 16)
        | ((lba >> 16) & 0xff)
        | (((lba >> 24) & 0xff) << 40)
        | (((lba >> 32) & 0xff) << 24)
        | (((lba >> 40) & 0xff) << 8)
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AtaPassThrough12(pub AtaPassThrough);

impl AtaPassThrough12 {
    pub const CDB: Layout = Layout::new(
        "AtaPassThrough12",
        12,
        &[
            ("opcode", bits(0xff, 0)),
            ("protocol", bits(0x1e, 1)),
            ("t_length", bits(0x03, 2)),
            ("byte_block", bits(0x04, 2)),
            ("t_dir", bits(0x08, 2)),
            ("t_type", bits(0x10, 2)),
            ("ck_cond", bits(0x20, 2)),
            ("off_line", bits(0xc0, 2)),
            ("features", bits(0xff, 3)),
            ("count", bits(0xff, 4)),
            ("lba", bits(0xffffff, 5)),
            ("device", bits(0xff, 8)),
            ("command", bits(0xff, 9)),
            ("control", bits(0xff, 11)),
        ],
    );
}

impl Command for AtaPassThrough12 {
    const OPCODE: &'static str = "ATA_PASS_THROUGH_12";
    type Output = ();

    fn cdb(&self, opcode: &Opcode) -> Result<Vec<u8>> {
        let ata = &self.0;
        if ata.features > 0xff || ata.count > 0xff {
            return Err(Error::invalid("features/count", "the 12 byte form carries 8 bits each"));
        }
        if ata.lba > 0xff_ffff {
            return Err(Error::invalid("lba", format!("{:#x} needs the 16 byte form", ata.lba)));
        }
        let record = ata.record().with("lba", ata_lba_12(ata.lba));
        encode_cdb(&Self::CDB, opcode, &record)
    }

    fn data_out(&self) -> Result<Vec<u8>> {
        self.0.data_out()
    }

    fn data_in_len(&self) -> Result<usize> {
        self.0.data_in_len()
    }

    fn unmarshall(&self, _data_in: &[u8]) -> Result<()> {
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AtaPassThrough16(pub AtaPassThrough);

impl AtaPassThrough16 {
    pub const CDB: Layout = Layout::new(
        "AtaPassThrough16",
        16,
        &[
            ("opcode", bits(0xff, 0)),
            ("extend", bits(0x01, 1)),
            ("protocol", bits(0x1e, 1)),
            ("t_length", bits(0x03, 2)),
            ("byte_block", bits(0x04, 2)),
            ("t_dir", bits(0x08, 2)),
            ("t_type", bits(0x10, 2)),
            ("ck_cond", bits(0x20, 2)),
            ("off_line", bits(0xc0, 2)),
            ("features", bits(0xffff, 3)),
            ("count", bits(0xffff, 5)),
            ("lba", bits(0xffffffffffff, 7)),
            ("device", bits(0xff, 13)),
            ("command", bits(0xff, 14)),
            ("control", bits(0xff, 15)),
        ],
    );
}

impl Command for AtaPassThrough16 {
    const OPCODE: &'static str = "ATA_PASS_THROUGH_16";
    type Output = ();

    fn cdb(&self, opcode: &Opcode) -> Result<Vec<u8>> {
        let ata = &self.0;
        if ata.lba > 0xffff_ffff_ffff {
            return Err(Error::invalid("lba", format!("{:#x} is wider than 48 bits", ata.lba)));
        }
        let record = ata
            .record()
            .with("extend", ata.extend)
            .with("lba", ata_lba_16(ata.lba));
        encode_cdb(&Self::CDB, opcode, &record)
    }

    fn data_out(&self) -> Result<Vec<u8>> {
        self.0.data_out()
    }

    fn data_in_len(&self) -> Result<usize> {
        self.0.data_in_len()
    }

    fn unmarshall(&self, _data_in: &[u8]) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scsi::opcode::SBC;

    #[test]
    fn lba_permutation_12() {
        assert_eq!(ata_lba_12(0x1122334455), 0x554433);
        let ata = AtaPassThrough {
            lba: 0x334455,
            ..AtaPassThrough::new(protocol::PIO_DATA_IN, 0xec)
        };
        let cdb = AtaPassThrough12(ata)
            .cdb(SBC.get("ATA_PASS_THROUGH_12").unwrap())
            .unwrap();
        // low byte first
        assert_eq!(cdb[5..8], [0x55, 0x44, 0x33]);
        assert_eq!(cdb[9], 0xec);
    }

    #[test]
    fn lba_permutation_16() {
        assert_eq!(ata_lba_16(0x1122334455), 0x225511440033);
        let ata = AtaPassThrough {
            lba: 0x1122334455,
            ..AtaPassThrough::new(protocol::DMA, 0x25)
        };
        let cdb = AtaPassThrough16(ata)
            .cdb(SBC.get("ATA_PASS_THROUGH_16").unwrap())
            .unwrap();
        assert_eq!(cdb[0], 0x85);
        assert_eq!(cdb[1], 0x0d);
        assert_eq!(cdb[7..13], [0x22, 0x55, 0x11, 0x44, 0x00, 0x33]);
        let record = AtaPassThrough16::CDB.decode(&cdb).unwrap();
        assert_eq!(record.int("lba"), 0x225511440033);
        assert_eq!(record.int("extend"), 1);
    }

    #[test]
    fn twelve_byte_limits() {
        let ata = AtaPassThrough {
            lba: 0x1122334455,
            ..AtaPassThrough::new(protocol::NON_DATA, 0xe7)
        };
        assert!(matches!(
            AtaPassThrough12(ata).cdb(SBC.get("ATA_PASS_THROUGH_12").unwrap()),
            Err(Error::InvalidParameter { field: "lba", .. })
        ));
    }

    #[test]
    fn identify_device_flags() {
        // IDENTIFY DEVICE: PIO data-in, one 512 byte block counted in COUNT
        let ata = AtaPassThrough {
            t_length: t_length::COUNT,
            byte_block: true,
            t_dir: T_DIR_IN,
            count: 1,
            ..AtaPassThrough::new(protocol::PIO_DATA_IN, 0xec)
        };
        let cmd = AtaPassThrough12(ata);
        let cdb = cmd.cdb(SBC.get("ATA_PASS_THROUGH_12").unwrap()).unwrap();
        assert_eq!(cdb[..5], [0xa1, 0x08, 0x0e, 0x00, 0x01]);
        assert_eq!(cmd.data_in_len().unwrap(), 512);
        assert!(cmd.data_out().unwrap().is_empty());
    }

    #[test]
    fn transfer_unit_table() {
        let base = AtaPassThrough {
            t_length: t_length::FEATURES,
            features: 4,
            t_dir: T_DIR_IN,
            ..AtaPassThrough::new(protocol::PIO_DATA_IN, 0x2f)
        };
        // byte_block clear: bytes
        assert_eq!(base.data_in_len().unwrap(), 4);
        // byte_block set, t_type clear: 512 byte blocks
        let fixed = AtaPassThrough {
            byte_block: true,
            ..base.clone()
        };
        assert_eq!(fixed.data_in_len().unwrap(), 2048);
        // byte_block and t_type: logical sectors, needs a blocksize
        let sectors = AtaPassThrough {
            byte_block: true,
            t_type: true,
            ..base.clone()
        };
        assert!(matches!(sectors.data_in_len(), Err(Error::MissingBlocksize)));
        let sectors = AtaPassThrough {
            blocksize: 4096,
            ..sectors
        };
        assert_eq!(sectors.data_in_len().unwrap(), 16384);
        // t_length zero: nothing moves whatever the counts say
        let none = AtaPassThrough {
            t_length: t_length::NO_DATA,
            byte_block: true,
            ..base.clone()
        };
        assert_eq!(none.data_in_len().unwrap(), 0);
        // TPSIU uses the caller's length
        let tpsiu = AtaPassThrough {
            t_length: t_length::TPSIU,
            extra_tl: Some(3),
            t_dir: T_DIR_OUT,
            ..base
        };
        assert_eq!(tpsiu.data_out().unwrap().len(), 3);
        assert_eq!(tpsiu.data_in_len().unwrap(), 0);
    }
}
