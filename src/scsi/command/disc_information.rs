//! READ DISC INFORMATION, MMC-6 6.22

use super::{Command, encode_cdb};
use crate::scsi::error::{Error, Result};
use crate::scsi::field::{Layout, Record, bits, bytes};
use crate::scsi::opcode::Opcode;

/// Values of DATA TYPE in the CDB and of `disc_information_data_type`.
pub mod data_type {
    pub const STANDARD_DISC_INFORMATION: u8 = 0x00;
    pub const TRACK_RESOURCES_INFORMATION: u8 = 0x01;
    pub const POW_RESOURCES_INFORMATION: u8 = 0x02;
}

/// Values of `disc_status`.
pub mod disc_status {
    pub const EMPTY: u8 = 0x00;
    pub const INCOMPLETE: u8 = 0x01;
    pub const FINALIZED: u8 = 0x02;
    pub const OTHERS: u8 = 0x03;
}

/// Counters split into a low byte and a high byte in the standard block,
/// merged into one value when decoded.
const SPLIT_FIELDS: &[(&str, &str, &str)] = &[
    ("number_of_sessions", "number_of_sessions_lsb", "number_of_sessions_msb"),
    (
        "first_track_number_in_last_session",
        "first_track_number_in_last_session_lsb",
        "first_track_number_in_last_session_msb",
    ),
    (
        "last_track_number_in_last_session",
        "last_track_number_in_last_session_lsb",
        "last_track_number_in_last_session_msb",
    ),
];

const STANDARD: Layout = Layout::new(
    "Standard disc information",
    34,
    &[
        ("disc_information_length", bits(0xffff, 0)),
        ("disc_information_data_type", bits(0xe0, 2)),
        ("erasable", bits(0x10, 2)),
        ("state_of_last_session", bits(0x0c, 2)),
        ("disc_status", bits(0x03, 2)),
        ("number_of_first_track_on_disc", bits(0xff, 3)),
        ("number_of_sessions_lsb", bits(0xff, 4)),
        ("first_track_number_in_last_session_lsb", bits(0xff, 5)),
        ("last_track_number_in_last_session_lsb", bits(0xff, 6)),
        ("did_v", bits(0x80, 7)),
        ("dbc_v", bits(0x40, 7)),
        ("uru", bits(0x20, 7)),
        ("dac_v", bits(0x10, 7)),
        ("legacy", bits(0x04, 7)),
        ("bg_format_status", bits(0x03, 7)),
        ("disc_type", bits(0xff, 8)),
        ("number_of_sessions_msb", bits(0xff, 9)),
        ("first_track_number_in_last_session_msb", bits(0xff, 10)),
        ("last_track_number_in_last_session_msb", bits(0xff, 11)),
        ("disc_identification", bits(0xffffffff, 12)),
        ("last_session_lead_in_start_address", bytes(16, 4)),
        ("last_possible_lead_out_start_address", bytes(20, 4)),
        ("disc_bar_code", bytes(24, 8)),
        ("disc_application_code", bits(0xff, 32)),
        ("number_of_opc_tables", bits(0xff, 33)),
    ],
);

const TRACK_RESOURCES: Layout = Layout::new(
    "Track resources information",
    12,
    &[
        ("disc_information_length", bits(0xffff, 0)),
        ("disc_information_data_type", bits(0xe0, 2)),
        ("maximum_possible_number_of_the_tracks", bits(0xffff, 4)),
        ("number_of_the_assigned_tracks", bits(0xffff, 6)),
        ("maximum_possible_number_of_appendable_tracks", bits(0xffff, 8)),
        ("current_number_of_appendable_tracks", bits(0xffff, 10)),
    ],
);

const POW_RESOURCES: Layout = Layout::new(
    "POW resources information",
    16,
    &[
        ("disc_information_length", bits(0xffff, 0)),
        ("disc_information_data_type", bits(0xe0, 2)),
        ("remaining_pow_replacements", bits(0xffffffff, 4)),
        ("remaining_pow_reallocation_map_entries", bits(0xffffffff, 8)),
        ("number_of_remaining_pow_updates", bits(0xffffffff, 12)),
    ],
);

/// Decoded disc information, one variant per data type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DiscInformation {
    Standard(Record),
    TrackResources(Record),
    PowResources(Record),
}

impl DiscInformation {
    pub fn data_type(&self) -> u8 {
        match self {
            DiscInformation::Standard(_) => data_type::STANDARD_DISC_INFORMATION,
            DiscInformation::TrackResources(_) => data_type::TRACK_RESOURCES_INFORMATION,
            DiscInformation::PowResources(_) => data_type::POW_RESOURCES_INFORMATION,
        }
    }

    pub fn fields(&self) -> &Record {
        match self {
            DiscInformation::Standard(r) | DiscInformation::TrackResources(r) | DiscInformation::PowResources(r) => r,
        }
    }
}

/// READ DISC INFORMATION
///
/// The device picks the block to return from `data_type`; decoding looks at
/// the type the device reports, not the one requested.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReadDiscInformation {
    pub data_type: u8,
    pub alloc_len: u16,
}

impl Default for ReadDiscInformation {
    fn default() -> Self {
        Self {
            data_type: data_type::STANDARD_DISC_INFORMATION,
            alloc_len: 4096,
        }
    }
}

impl ReadDiscInformation {
    pub const CDB: Layout = Layout::new(
        "ReadDiscInformation",
        10,
        &[
            ("opcode", bits(0xff, 0)),
            ("data_type", bits(0x07, 1)),
            ("alloc_len", bits(0xffff, 7)),
        ],
    );

    pub fn unmarshall_datain(data: &[u8]) -> Result<DiscInformation> {
        let kind = data
            .get(2)
            .map(|b| b >> 5)
            .ok_or_else(|| Error::truncated("disc information", 3, data.len()))?;
        match kind {
            data_type::STANDARD_DISC_INFORMATION => {
                let mut record = STANDARD.decode(data)?;
                for &(merged, lsb, msb) in SPLIT_FIELDS {
                    let lsb = record.remove(lsb).and_then(|v| v.as_int()).unwrap_or(0);
                    let msb = record.remove(msb).and_then(|v| v.as_int()).unwrap_or(0);
                    record.insert(merged, msb << 8 | lsb);
                }
                Ok(DiscInformation::Standard(record))
            }
            data_type::TRACK_RESOURCES_INFORMATION => Ok(DiscInformation::TrackResources(TRACK_RESOURCES.decode(data)?)),
            data_type::POW_RESOURCES_INFORMATION => Ok(DiscInformation::PowResources(POW_RESOURCES.decode(data)?)),
            code => Err(Error::Unsupported {
                what: "disc information data type",
                code: u64::from(code),
            }),
        }
    }

    /// Encodes `info` as a device would return it. The data type and the
    /// length field are filled in from the variant.
    pub fn marshall_datain(info: &DiscInformation) -> Result<Vec<u8>> {
        let mut record = info.fields().clone();
        let layout = match info {
            DiscInformation::Standard(_) => {
                for &(merged, lsb, msb) in SPLIT_FIELDS {
                    let value = record.remove(merged).and_then(|v| v.as_int()).unwrap_or(0);
                    if value > 0xffff {
                        return Err(Error::ValueOutOfRange {
                            field: merged,
                            value,
                            mask: 0xffff,
                        });
                    }
                    record.insert(lsb, value & 0xff);
                    record.insert(msb, value >> 8);
                }
                &STANDARD
            }
            DiscInformation::TrackResources(_) => &TRACK_RESOURCES,
            DiscInformation::PowResources(_) => &POW_RESOURCES,
        };
        record.insert("disc_information_data_type", info.data_type());
        record.insert("disc_information_length", layout.size - 2);
        layout.encode(&record)
    }
}

impl Command for ReadDiscInformation {
    const OPCODE: &'static str = "READ_DISC_INFORMATION";
    type Output = DiscInformation;

    fn cdb(&self, opcode: &Opcode) -> Result<Vec<u8>> {
        let record = Record::new()
            .with("data_type", self.data_type)
            .with("alloc_len", self.alloc_len);
        encode_cdb(&Self::CDB, opcode, &record)
    }

    fn data_in_len(&self) -> Result<usize> {
        Ok(usize::from(self.alloc_len))
    }

    fn unmarshall(&self, data_in: &[u8]) -> Result<DiscInformation> {
        Self::unmarshall_datain(data_in)
    }
}
