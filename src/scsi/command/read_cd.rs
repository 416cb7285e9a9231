//! READ CD, MMC-6 6.19
//!
//! Each returned sector is the concatenation of the parts selected by the
//! MAIN CHANNEL SELECTION, C2 ERROR INFORMATION and SUB-CHANNEL SELECTION
//! fields, in that order. Which parts exist depends on the expected sector
//! type, and the drive silently omits the ones a sector type does not have,
//! so decoding first narrows the selection to what the sector type can hold.

use std::collections::BTreeMap;

use super::{Command, encode_cdb, slice};
use crate::scsi::error::{Error, Result};
use crate::scsi::field::{Layout, Record, bits};
use crate::scsi::opcode::Opcode;

pub mod expected_sector_type {
    pub const ANY: u8 = 0x00;
    pub const CDDA: u8 = 0x01;
    pub const MODE_1: u8 = 0x02;
    pub const MODE_2_FORMLESS: u8 = 0x03;
    pub const MODE_2_FORM_1: u8 = 0x04;
    pub const MODE_2_FORM_2: u8 = 0x05;
}

/// Bits of the MAIN CHANNEL SELECTION field.
pub mod mcsb {
    pub const SYNC: u8 = 0x10;
    pub const HEADER_CODES: u8 = 0x0c;
    pub const HEADER: u8 = 0x04;
    pub const SUB_HEADER: u8 = 0x08;
    pub const ALL_HEADERS: u8 = 0x0c;
    pub const USER_DATA: u8 = 0x02;
    pub const EDC_ECC: u8 = 0x01;
}

/// Values of the SUB-CHANNEL SELECTION field.
pub mod scsb {
    pub const NONE: u8 = 0x00;
    pub const RAW: u8 = 0x01;
    pub const Q: u8 = 0x02;
    pub const RW: u8 = 0x04;
}

const SYNC_LEN: usize = 12;
const SUB_HEADER_LEN: usize = 8;

/// The four byte sector header.
pub const SECTOR_HEADER: Layout = Layout::new(
    "sector header",
    4,
    &[
        ("minute", bits(0xff, 0)),
        ("second", bits(0xff, 1)),
        ("frame", bits(0xff, 2)),
        ("mode", bits(0xff, 3)),
    ],
);

/// Formatted Q sub-channel, MMC-6 Table 358.
pub const Q_SUB_CHANNEL: Layout = Layout::new(
    "Q sub-channel",
    16,
    &[
        ("control", bits(0xf0, 0)),
        ("adr", bits(0x0f, 0)),
        ("track_number", bits(0xff, 1)),
        ("index_number", bits(0xff, 2)),
        ("min", bits(0xff, 3)),
        ("sec", bits(0xff, 4)),
        ("frame", bits(0xff, 5)),
        ("zero", bits(0xff, 6)),
        ("amin", bits(0xff, 7)),
        ("asec", bits(0xff, 8)),
        ("aframe", bits(0xff, 9)),
        ("crc", bits(0xffff, 10)),
        ("p", bits(0x80, 15)),
    ],
);

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubChannel {
    /// 96 bytes of raw P-W data.
    Raw(Vec<u8>),
    /// Decoded with [`Q_SUB_CHANNEL`].
    Q(Record),
    /// 96 bytes of de-interleaved R-W data.
    Rw(Vec<u8>),
}

/// One decoded sector. Parts that were not selected are `None`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Sector {
    pub sync: Option<Vec<u8>>,
    /// Decoded with [`SECTOR_HEADER`].
    pub header: Option<Record>,
    pub sub_header: Option<Vec<u8>>,
    pub user_data: Option<Vec<u8>>,
    pub edc_ecc: Option<Vec<u8>>,
    pub c2: Option<Vec<u8>>,
    pub sub_channel: Option<SubChannel>,
}

/// The byte counts of every part a sector will be returned with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SectorLayout {
    pub sync: usize,
    pub header: usize,
    pub sub_header: usize,
    pub user_data: usize,
    pub edc_ecc: usize,
    pub c2: usize,
    pub sub_channel: usize,
}

impl SectorLayout {
    pub fn size(&self) -> usize {
        self.sync + self.header + self.sub_header + self.user_data + self.edc_ecc + self.c2 + self.sub_channel
    }
}

/// The MAIN CHANNEL SELECTION bits a sector of type `est` can satisfy.
fn remap_mcsb(est: u8, selection: u8) -> Result<u8> {
    use expected_sector_type::*;
    Ok(match est {
        CDDA => selection & mcsb::USER_DATA,
        MODE_1 | MODE_2_FORMLESS => {
            let headers = match selection & mcsb::HEADER_CODES {
                mcsb::SUB_HEADER => 0,
                mcsb::ALL_HEADERS => mcsb::HEADER,
                codes => codes,
            };
            (selection & !mcsb::HEADER_CODES) | headers
        }
        MODE_2_FORM_1 | MODE_2_FORM_2 => selection,
        ANY => {
            return Err(Error::invalid(
                "est",
                "sectors of unknown type cannot be decoded, give an expected sector type",
            ));
        }
        code => {
            return Err(Error::Unsupported {
                what: "expected sector type",
                code: u64::from(code),
            });
        }
    })
}

/// The next `len` bytes of a sector, or `None` for a part that was not
/// selected.
fn take<'a>(raw: &'a [u8], offset: &mut usize, len: usize) -> Option<&'a [u8]> {
    if len == 0 {
        return None;
    }
    let bytes = &raw[*offset..*offset + len];
    *offset += len;
    Some(bytes)
}

/// READ CD, MMC-6 6.19
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReadCd {
    /// Signed on the wire: lead-in sectors have negative addresses.
    pub lba: u32,
    pub tl: u32,
    pub est: u8,
    pub dap: bool,
    pub mcsb: u8,
    pub c2ei: u8,
    pub scsb: u8,
}

impl ReadCd {
    pub const CDB: Layout = Layout::new(
        "ReadCd",
        12,
        &[
            ("opcode", bits(0xff, 0)),
            ("est", bits(0x1c, 1)),
            ("dap", bits(0x02, 1)),
            ("lba", bits(0xffffffff, 2)),
            ("tl", bits(0xffffff, 6)),
            ("mcsb", bits(0xf8, 9)),
            ("c2ei", bits(0x06, 9)),
            ("scsb", bits(0x07, 10)),
        ],
    );

    /// Longest sector a drive can return: 2352 bytes of main channel, 296
    /// of C2 and 96 of sub-channel, rounded up.
    pub const MAX_SECTOR_LEN: usize = 3072;

    /// User data only, the usual way of reading a data track.
    pub fn new(lba: u32, tl: u32, est: u8) -> Self {
        Self {
            lba,
            tl,
            est,
            dap: false,
            mcsb: mcsb::USER_DATA,
            c2ei: 0,
            scsb: scsb::NONE,
        }
    }

    /// Sizes of the parts each returned sector consists of.
    pub fn sector_layout(&self) -> Result<SectorLayout> {
        use expected_sector_type::*;
        let selected = remap_mcsb(self.est, self.mcsb)?;
        let mut layout = SectorLayout::default();
        if selected & mcsb::SYNC != 0 {
            layout.sync = SYNC_LEN;
        }
        if selected & mcsb::HEADER != 0 {
            layout.header = SECTOR_HEADER.size;
        }
        if selected & mcsb::SUB_HEADER != 0 {
            layout.sub_header = SUB_HEADER_LEN;
        }
        if selected & mcsb::USER_DATA != 0 {
            layout.user_data = match self.est {
                CDDA => 2352,
                MODE_2_FORMLESS => 2336,
                MODE_2_FORM_2 => 2324,
                _ => 2048,
            };
        }
        if selected & mcsb::EDC_ECC != 0 {
            layout.edc_ecc = match self.est {
                MODE_1 => 288,
                MODE_2_FORM_1 => 280,
                MODE_2_FORM_2 => 4,
                est => {
                    return Err(Error::invalid(
                        "mcsb",
                        format!("sector type {est} has no EDC/ECC field"),
                    ));
                }
            };
        }
        layout.c2 = match self.c2ei {
            0 => 0,
            1 => 294,
            2 => 296,
            code => {
                return Err(Error::Unsupported {
                    what: "C2 error information",
                    code: u64::from(code),
                });
            }
        };
        layout.sub_channel = match self.scsb {
            scsb::NONE => 0,
            scsb::RAW | scsb::RW => 96,
            scsb::Q => Q_SUB_CHANNEL.size,
            code => {
                return Err(Error::Unsupported {
                    what: "sub-channel selection",
                    code: u64::from(code),
                });
            }
        };
        Ok(layout)
    }

    /// Splits `data` into `tl` sectors, keyed by their address.
    pub fn unmarshall_datain(&self, data: &[u8]) -> Result<BTreeMap<u32, Sector>> {
        let layout = self.sector_layout()?;
        let size = layout.size();
        let mut sectors = BTreeMap::new();
        for i in 0..self.tl {
            let start = i as usize * size;
            let raw = slice(data, start, size, "READ CD sector")?;
            let mut offset = 0;
            let mut part = |len| take(raw, &mut offset, len);
            let sync = part(layout.sync).map(<[u8]>::to_vec);
            let header = part(layout.header).map(|h| SECTOR_HEADER.decode(h)).transpose()?;
            let sub_header = part(layout.sub_header).map(<[u8]>::to_vec);
            let user_data = part(layout.user_data).map(<[u8]>::to_vec);
            let edc_ecc = part(layout.edc_ecc).map(<[u8]>::to_vec);
            let c2 = part(layout.c2).map(<[u8]>::to_vec);
            let sub_channel = match part(layout.sub_channel) {
                None => None,
                Some(q) if self.scsb == scsb::Q => Some(SubChannel::Q(Q_SUB_CHANNEL.decode(q)?)),
                Some(rw) if self.scsb == scsb::RW => Some(SubChannel::Rw(rw.to_vec())),
                Some(raw) => Some(SubChannel::Raw(raw.to_vec())),
            };
            let sector = Sector {
                sync,
                header,
                sub_header,
                user_data,
                edc_ecc,
                c2,
                sub_channel,
            };
            // addresses wrap like the signed 32-bit LBA they are
            sectors.insert(self.lba.wrapping_add(i), sector);
        }
        Ok(sectors)
    }
}

impl Command for ReadCd {
    const OPCODE: &'static str = "READ_CD";
    type Output = BTreeMap<u32, Sector>;

    fn cdb(&self, opcode: &Opcode) -> Result<Vec<u8>> {
        let record = Record::new()
            .with("est", self.est)
            .with("dap", self.dap)
            .with("lba", self.lba)
            .with("tl", self.tl)
            .with("mcsb", self.mcsb)
            .with("c2ei", self.c2ei)
            .with("scsb", self.scsb);
        encode_cdb(&Self::CDB, opcode, &record)
    }

    fn data_in_len(&self) -> Result<usize> {
        Ok(self.tl as usize * Self::MAX_SECTOR_LEN)
    }

    fn unmarshall(&self, data_in: &[u8]) -> Result<Self::Output> {
        self.unmarshall_datain(data_in)
    }
}
