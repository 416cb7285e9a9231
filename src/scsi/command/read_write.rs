//! READ, WRITE and WRITE SAME in their 10, 12 and 16 byte forms.
//!
//! Defined in SBC-4 5.15 through 5.53. All of them address the medium in
//! logical blocks, so building one needs the device's blocksize whenever any
//! data moves.

use super::{Command, encode_cdb, transfer_len};
use crate::scsi::error::{Error, Result};
use crate::scsi::field::{Layout, Record, bits};
use crate::scsi::opcode::Opcode;

macro_rules! read_command {
    (
        $(#[$doc:meta])*
        $name:ident, $opcode:literal, lba: $lba:ty, tl: $tl:ty, size: $size:literal,
        lba_at: $lba_mask:literal @ $lba_off:literal,
        tl_at: $tl_mask:literal @ $tl_off:literal,
        group_at: $group_off:literal
    ) => {
        $(#[$doc])*
        #[derive(Clone, Debug, Default, PartialEq, Eq)]
        pub struct $name {
            pub blocksize: u32,
            pub lba: $lba,
            /// Transfer length, in blocks.
            pub tl: $tl,
            pub rdprotect: u8,
            pub dpo: bool,
            pub fua: bool,
            pub rarc: bool,
            pub group: u8,
        }

        impl $name {
            pub const CDB: Layout = Layout::new(
                stringify!($name),
                $size,
                &[
                    ("opcode", bits(0xff, 0)),
                    ("rdprotect", bits(0xe0, 1)),
                    ("dpo", bits(0x10, 1)),
                    ("fua", bits(0x08, 1)),
                    ("rarc", bits(0x04, 1)),
                    ("lba", bits($lba_mask, $lba_off)),
                    ("tl", bits($tl_mask, $tl_off)),
                    ("group", bits(0x1f, $group_off)),
                ],
            );

            pub fn new(blocksize: u32, lba: $lba, tl: $tl) -> Self {
                Self {
                    blocksize,
                    lba,
                    tl,
                    ..Default::default()
                }
            }
        }

        impl Command for $name {
            const OPCODE: &'static str = $opcode;
            type Output = ();

            fn cdb(&self, opcode: &Opcode) -> Result<Vec<u8>> {
                let record = Record::new()
                    .with("rdprotect", self.rdprotect)
                    .with("dpo", self.dpo)
                    .with("fua", self.fua)
                    .with("rarc", self.rarc)
                    .with("lba", self.lba)
                    .with("tl", self.tl)
                    .with("group", self.group);
                encode_cdb(&Self::CDB, opcode, &record)
            }

            fn data_in_len(&self) -> Result<usize> {
                transfer_len(self.blocksize, u64::from(self.tl))
            }

            fn unmarshall(&self, _data_in: &[u8]) -> Result<()> {
                Ok(())
            }
        }
    };
}

read_command!(
    /// READ (10), SBC-4 5.16
    Read10, "READ_10", lba: u32, tl: u16, size: 10,
    lba_at: 0xffffffff @ 2, tl_at: 0xffff @ 7, group_at: 6
);
read_command!(
    /// READ (12), SBC-4 5.17
    Read12, "READ_12", lba: u32, tl: u32, size: 12,
    lba_at: 0xffffffff @ 2, tl_at: 0xffffffff @ 6, group_at: 10
);
read_command!(
    /// READ (16), SBC-4 5.18
    Read16, "READ_16", lba: u64, tl: u32, size: 16,
    lba_at: 0xffffffffffffffff @ 2, tl_at: 0xffffffff @ 10, group_at: 14
);

/// The data-out bytes of a write: caller supplied `data` must be exactly
/// `expected` bytes, an empty `data` becomes a zeroed buffer to fill through
/// [`Envelope::data_out_mut`](super::Envelope::data_out_mut).
fn write_buffer(data: &[u8], expected: usize) -> Result<Vec<u8>> {
    if data.is_empty() {
        return Ok(vec![0; expected]);
    }
    if data.len() != expected {
        return Err(Error::invalid(
            "data",
            format!("{} bytes supplied, the transfer is {expected} bytes", data.len()),
        ));
    }
    Ok(data.to_vec())
}

macro_rules! write_command {
    (
        $(#[$doc:meta])*
        $name:ident, $opcode:literal, lba: $lba:ty, tl: $tl:ty, size: $size:literal,
        lba_at: $lba_mask:literal @ $lba_off:literal,
        tl_at: $tl_mask:literal @ $tl_off:literal,
        group_at: $group_off:literal
    ) => {
        $(#[$doc])*
        #[derive(Clone, Debug, Default, PartialEq, Eq)]
        pub struct $name {
            pub blocksize: u32,
            pub lba: $lba,
            pub tl: $tl,
            pub wrprotect: u8,
            pub dpo: bool,
            pub fua: bool,
            pub group: u8,
            /// `blocksize * tl` bytes to write, or empty to write zeroes.
            pub data: Vec<u8>,
        }

        impl $name {
            pub const CDB: Layout = Layout::new(
                stringify!($name),
                $size,
                &[
                    ("opcode", bits(0xff, 0)),
                    ("wrprotect", bits(0xe0, 1)),
                    ("dpo", bits(0x10, 1)),
                    ("fua", bits(0x08, 1)),
                    ("lba", bits($lba_mask, $lba_off)),
                    ("tl", bits($tl_mask, $tl_off)),
                    ("group", bits(0x1f, $group_off)),
                ],
            );

            pub fn new(blocksize: u32, lba: $lba, tl: $tl) -> Self {
                Self {
                    blocksize,
                    lba,
                    tl,
                    ..Default::default()
                }
            }

            pub fn with_data(mut self, data: Vec<u8>) -> Self {
                self.data = data;
                self
            }
        }

        impl Command for $name {
            const OPCODE: &'static str = $opcode;
            type Output = ();

            fn cdb(&self, opcode: &Opcode) -> Result<Vec<u8>> {
                let record = Record::new()
                    .with("wrprotect", self.wrprotect)
                    .with("dpo", self.dpo)
                    .with("fua", self.fua)
                    .with("lba", self.lba)
                    .with("tl", self.tl)
                    .with("group", self.group);
                encode_cdb(&Self::CDB, opcode, &record)
            }

            fn data_out(&self) -> Result<Vec<u8>> {
                write_buffer(&self.data, transfer_len(self.blocksize, u64::from(self.tl))?)
            }

            fn unmarshall(&self, _data_in: &[u8]) -> Result<()> {
                Ok(())
            }
        }
    };
}

write_command!(
    /// WRITE (10), SBC-4 5.40
    Write10, "WRITE_10", lba: u32, tl: u16, size: 10,
    lba_at: 0xffffffff @ 2, tl_at: 0xffff @ 7, group_at: 6
);
write_command!(
    /// WRITE (12), SBC-4 5.41
    Write12, "WRITE_12", lba: u32, tl: u32, size: 12,
    lba_at: 0xffffffff @ 2, tl_at: 0xffffffff @ 6, group_at: 10
);
write_command!(
    /// WRITE (16), SBC-4 5.42
    Write16, "WRITE_16", lba: u64, tl: u32, size: 16,
    lba_at: 0xffffffffffffffff @ 2, tl_at: 0xffffffff @ 10, group_at: 14
);

/// "The WRITE SAME (10) command requests that the device server transfer a
/// single logical block from the Data-Out Buffer and for each LBA in the
/// specified range of LBAs write that logical block."
///
/// SBC-4 5.49
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WriteSame10 {
    pub blocksize: u32,
    pub lba: u32,
    /// Number of logical blocks to write; zero means up to the last LBA.
    pub nb: u16,
    pub wrprotect: u8,
    pub anchor: bool,
    pub unmap: bool,
    pub group: u8,
    /// The single block to repeat, or empty for a zeroed block.
    pub data: Vec<u8>,
}

impl WriteSame10 {
    pub const CDB: Layout = Layout::new(
        "WriteSame10",
        10,
        &[
            ("opcode", bits(0xff, 0)),
            ("wrprotect", bits(0xe0, 1)),
            ("anchor", bits(0x10, 1)),
            ("unmap", bits(0x08, 1)),
            ("lba", bits(0xffffffff, 2)),
            ("group", bits(0x1f, 6)),
            ("nb", bits(0xffff, 7)),
        ],
    );

    pub fn new(blocksize: u32, lba: u32, nb: u16) -> Self {
        Self {
            blocksize,
            lba,
            nb,
            ..Default::default()
        }
    }
}

impl Command for WriteSame10 {
    const OPCODE: &'static str = "WRITE_SAME_10";
    type Output = ();

    fn cdb(&self, opcode: &Opcode) -> Result<Vec<u8>> {
        let record = Record::new()
            .with("wrprotect", self.wrprotect)
            .with("anchor", self.anchor)
            .with("unmap", self.unmap)
            .with("lba", self.lba)
            .with("group", self.group)
            .with("nb", self.nb);
        encode_cdb(&Self::CDB, opcode, &record)
    }

    fn data_out(&self) -> Result<Vec<u8>> {
        write_buffer(&self.data, transfer_len(self.blocksize, 1)?)
    }

    fn unmarshall(&self, _data_in: &[u8]) -> Result<()> {
        Ok(())
    }
}

/// WRITE SAME (16), SBC-4 5.50
///
/// With `ndob` (no data-out buffer) set the device writes zeroed blocks and
/// nothing is transferred, so no blocksize is needed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WriteSame16 {
    pub blocksize: u32,
    pub lba: u64,
    pub nb: u32,
    pub wrprotect: u8,
    pub anchor: bool,
    pub unmap: bool,
    pub ndob: bool,
    pub group: u8,
    pub data: Vec<u8>,
}

impl WriteSame16 {
    pub const CDB: Layout = Layout::new(
        "WriteSame16",
        16,
        &[
            ("opcode", bits(0xff, 0)),
            ("wrprotect", bits(0xe0, 1)),
            ("anchor", bits(0x10, 1)),
            ("unmap", bits(0x08, 1)),
            ("ndob", bits(0x01, 1)),
            ("lba", bits(0xffffffffffffffff, 2)),
            ("nb", bits(0xffffffff, 10)),
            ("group", bits(0x1f, 14)),
        ],
    );

    pub fn new(blocksize: u32, lba: u64, nb: u32) -> Self {
        Self {
            blocksize,
            lba,
            nb,
            ..Default::default()
        }
    }
}

impl Command for WriteSame16 {
    const OPCODE: &'static str = "WRITE_SAME_16";
    type Output = ();

    fn cdb(&self, opcode: &Opcode) -> Result<Vec<u8>> {
        let record = Record::new()
            .with("wrprotect", self.wrprotect)
            .with("anchor", self.anchor)
            .with("unmap", self.unmap)
            .with("ndob", self.ndob)
            .with("lba", self.lba)
            .with("nb", self.nb)
            .with("group", self.group);
        encode_cdb(&Self::CDB, opcode, &record)
    }

    fn data_out(&self) -> Result<Vec<u8>> {
        if self.ndob {
            return Ok(Vec::new());
        }
        write_buffer(&self.data, transfer_len(self.blocksize, 1)?)
    }

    fn unmarshall(&self, _data_in: &[u8]) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scsi::command::Envelope;
    use crate::scsi::opcode::{SBC, SSC};

    #[test]
    fn read10_derived_lengths() {
        let read = Read10::new(512, 1024, 27);
        let cdb = read.cdb(SBC.get("READ_10").unwrap()).unwrap();
        assert_eq!(cdb[0], 0x28);
        assert_eq!(cdb[2..6], [0x00, 0x00, 0x04, 0x00]);
        assert_eq!(cdb[7..9], [0x00, 27]);
        assert_eq!(read.data_in_len().unwrap(), 13824);

        let record = Read10::CDB.decode(&cdb).unwrap();
        assert_eq!(record.int("lba"), 1024);
        assert_eq!(record.int("tl"), 27);
        assert_eq!(record.int("rdprotect"), 0);
    }

    #[test]
    fn read10_flags() {
        let read = Read10 {
            rdprotect: 2,
            dpo: true,
            fua: true,
            rarc: true,
            group: 0x19,
            ..Read10::new(512, 1024, 27)
        };
        let cdb = read.cdb(SBC.get("READ_10").unwrap()).unwrap();
        assert_eq!(cdb[1], 0x5c);
        assert_eq!(cdb[6], 0x19);
    }

    #[test]
    fn read12_and_read16_layouts() {
        let cdb = Read12::new(512, 1024, 27).cdb(SBC.get("READ_12").unwrap()).unwrap();
        assert_eq!(cdb.len(), 12);
        assert_eq!(cdb[0], 0xa8);
        assert_eq!(cdb[6..10], [0, 0, 0, 27]);

        let read = Read16 {
            group: 0x19,
            ..Read16::new(512, 0x1234567890, 27)
        };
        let cdb = read.cdb(SBC.get("READ_16").unwrap()).unwrap();
        assert_eq!(cdb.len(), 16);
        assert_eq!(cdb[2..10], [0, 0, 0, 0x12, 0x34, 0x56, 0x78, 0x90]);
        assert_eq!(cdb[10..14], [0, 0, 0, 27]);
        assert_eq!(cdb[14], 0x19);
        let record = Read16::CDB.decode(&cdb).unwrap();
        assert_eq!(record.int("lba"), 0x1234567890);
    }

    #[test]
    fn missing_blocksize() {
        assert!(matches!(
            Envelope::new(Read10::new(0, 0, 1)),
            Err(Error::MissingBlocksize)
        ));
        assert!(matches!(
            Envelope::new(Write16::new(0, 0, 1)),
            Err(Error::MissingBlocksize)
        ));
        assert!(Envelope::new(Read10::new(0, 0, 0)).is_ok());
    }

    #[test]
    fn tape_read_uses_stream_opcode() {
        let cdb = Read16::new(512, 0, 1).cdb(SSC.get("READ_16").unwrap()).unwrap();
        assert_eq!(cdb[0], 0x88);
    }

    #[test]
    fn write_data_out() {
        let write = Write10::new(512, 1024, 2);
        assert_eq!(write.data_out().unwrap(), vec![0; 1024]);
        let cdb = write.cdb(SBC.get("WRITE_10").unwrap()).unwrap();
        assert_eq!(cdb[0], 0x2a);
        assert_eq!(cdb[8], 2);

        let write = Write12::new(512, 0, 1).with_data(vec![0xa5; 512]);
        assert_eq!(write.data_out().unwrap(), vec![0xa5; 512]);

        let short = Write16::new(512, 0, 2).with_data(vec![0; 512]);
        assert!(matches!(
            short.data_out(),
            Err(Error::InvalidParameter { field: "data", .. })
        ));
    }

    #[test]
    fn write_same() {
        let ws = WriteSame10 {
            unmap: true,
            ..WriteSame10::new(4096, 100, 8)
        };
        let cdb = ws.cdb(SBC.get("WRITE_SAME_10").unwrap()).unwrap();
        assert_eq!(cdb[0], 0x41);
        assert_eq!(cdb[1], 0x08);
        assert_eq!(cdb[8], 8);
        assert_eq!(ws.data_out().unwrap().len(), 4096);

        let ws = WriteSame16 {
            ndob: true,
            anchor: true,
            ..WriteSame16::new(0, 1 << 40, 0x10000)
        };
        let cdb = ws.cdb(SBC.get("WRITE_SAME_16").unwrap()).unwrap();
        assert_eq!(cdb[1], 0x11);
        assert_eq!(cdb[2..10], [0, 0, 1, 0, 0, 0, 0, 0]);
        assert_eq!(cdb[10..14], [0, 1, 0, 0]);
        assert!(ws.data_out().unwrap().is_empty());

        let record = WriteSame16::CDB.decode(&cdb).unwrap();
        assert_eq!(record.int("ndob"), 1);
        assert_eq!(record.int("nb"), 0x10000);

        assert!(matches!(
            WriteSame16::new(0, 0, 1).data_out(),
            Err(Error::MissingBlocksize)
        ));
    }
}
