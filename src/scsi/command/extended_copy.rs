//! EXTENDED COPY, as defined by SPC-4 6.3 (LID1) and SPC-5 6.6 (LID4).
//!
//! The two revisions share the CDB and most of the descriptor formats but
//! differ in the parameter list header, in the names of their descriptor
//! type codes and in which codes exist at all, so one [`ExtendedCopy`] type
//! serves both and is parameterized by [`SpcVersion`].
//!
//! Type codes may be given either as raw values or by the name or
//! description the standard tables use, e.g. `"Copy from block device to
//! block device"` for segment descriptor type 0x02.
//!
//! Only the identification CSCD descriptor (0xE4) and the block/stream copy
//! segment descriptors are encoded. Other codes the standard defines are
//! rejected with [`Error::NotImplemented`].

use super::designator::{self, Designator};
use super::{Command, encode_cdb};
use crate::scsi::error::{Error, Result};
use crate::scsi::field::{Layout, Record, bits};
use crate::scsi::opcode::Opcode;

/// Which revision of the copy manager's parameter list to produce.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpcVersion {
    /// LID1 parameter list, service action EXTENDED COPY(LID1).
    Spc4,
    /// LID4 parameter list, service action EXTENDED COPY(LID4).
    Spc5,
}

impl SpcVersion {
    fn service_action(self) -> &'static str {
        match self {
            SpcVersion::Spc4 => "EXTENDED_COPY_LID1",
            SpcVersion::Spc5 => "EXTENDED_COPY",
        }
    }
}

/// A descriptor type code, either numeric or by name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Code {
    Value(u8),
    /// Matched against both the short name and the description.
    Name(String),
}

impl From<u8> for Code {
    fn from(value: u8) -> Self {
        Code::Value(value)
    }
}

impl From<&str> for Code {
    fn from(name: &str) -> Self {
        Code::Name(name.to_string())
    }
}

/// One row of a type code table.
#[derive(Debug)]
pub struct TypeCode {
    pub code: u8,
    pub name: &'static str,
    pub description: &'static str,
}

const fn t(code: u8, name: &'static str, description: &'static str) -> TypeCode {
    TypeCode {
        code,
        name,
        description,
    }
}

const fn cscd(code: u8, name: &'static str) -> TypeCode {
    t(code, name, name)
}

/// SPC-4 Table 107, target descriptor type codes.
pub const TARGET_DESCRIPTOR_TYPES_SPC4: &[TypeCode] = &[
    cscd(0xe0, "Fibre Channel N_Port_Name target descriptor"),
    cscd(0xe1, "Fibre Channel N_Port_ID target descriptor"),
    cscd(0xe2, "Fibre Channel N_Port_ID With N_Port_Name Checking target descriptor"),
    cscd(0xe3, "Parallel Interface T_L target descriptor"),
    cscd(0xe4, "Identification descriptor target descriptor"),
    cscd(0xe5, "IPv4 target descriptor"),
    cscd(0xe6, "Alias target descriptor"),
    cscd(0xe7, "RDMA target descriptor"),
    cscd(0xe8, "IEEE 1394 EUI-64 target descriptor"),
    cscd(0xe9, "SAS Serial SCSI Protocol target descriptor"),
    cscd(0xea, "IPv6 target descriptor"),
];

/// SPC-5 Table 123, CSCD descriptor type codes.
pub const CSCD_DESCRIPTOR_TYPES_SPC5: &[TypeCode] = &[
    cscd(0xe0, "Fibre Channel N_Port_Name CSCD descriptor"),
    cscd(0xe1, "Fibre Channel N_Port_ID CSCD descriptor"),
    cscd(0xe2, "Fibre Channel N_Port_ID With N_Port_Name Checking CSCD descriptor"),
    cscd(0xe4, "Identification Descriptor CSCD descriptor"),
    cscd(0xe5, "IPv4 CSCD descriptor"),
    cscd(0xe6, "Alias CSCD descriptor"),
    cscd(0xe7, "RDMA CSCD descriptor"),
    cscd(0xe8, "IEEE 1394 EUI-64 CSCD descriptor"),
    cscd(0xe9, "SAS Serial SCSI Protocol CSCD descriptor"),
    cscd(0xea, "IPv6 CSCD descriptor"),
    cscd(0xeb, "IP Copy Service CSCD descriptor"),
    cscd(0xec, "Multiple Device CSCD descriptor"),
    cscd(0xfe, "ROD CSCD descriptor"),
];

const DEVICE_TYPES: &[TypeCode] = &[
    t(0x00, "Block", "Direct access block device (e.g., magnetic disk)"),
    t(0x01, "Stream or Tape", "Sequential access device (e.g., magnetic tape)"),
    t(0x03, "Stream", "Processor device"),
    t(0x05, "Block", "CD/DVD device"),
    t(0x0e, "Block", "Simplified direct access device (e.g., magnetic disk)"),
];

const DEVICE_TYPES_SPC4: &[TypeCode] = &[
    t(0x04, "Block", "Write-once device (e.g., some optical disks)"),
    t(0x07, "Block", "Optical memory device (e.g., some optical disks)"),
];

const SEGMENT_TYPES: &[TypeCode] = &[
    t(0x00, "block -> stream", "Copy from block device to stream device"),
    t(0x01, "stream -> block", "Copy from stream device to block device"),
    t(0x02, "block -> block", "Copy from block device to block device"),
    t(0x03, "stream -> stream", "Copy from stream device to stream device"),
    t(0x04, "inline -> stream", "Copy inline data to stream device"),
    t(0x05, "embedded -> stream", "Copy embedded data to stream device"),
    t(0x06, "stream -> discard", "Read from stream device and discard"),
    t(0x08, "block<o> -> stream", "Copy block device with offset to stream device"),
    t(0x09, "stream -> block<o>", "Copy stream device to block device with offset"),
    t(
        0x0a,
        "block<o> -> block<o>",
        "Copy block device with offset to block device with offset",
    ),
    t(
        0x0b,
        "block -> stream&application client",
        "Copy from block device to stream device and hold a copy of processed data for the application client",
    ),
    t(
        0x0c,
        "stream -> block&application client",
        "Copy from stream device to block device and hold a copy of processed data for the application client",
    ),
    t(
        0x0d,
        "block -> block&application client",
        "Copy from block device to block device and hold a copy of processed data for the application client",
    ),
    t(
        0x0e,
        "stream -> stream&application client",
        "Copy from stream device to stream device and hold a copy of processed data for the application client",
    ),
    t(
        0x0f,
        "stream -> discard&application client",
        "Read from stream device and hold a copy of processed data for the application client",
    ),
    t(0x10, "filemark -> tape", "Write filemarks to sequential access device"),
    t(0x13, "<i>tape -> <i>tape", "Tape device image copy"),
    t(
        0x14,
        "Register persistent reservation key",
        "Register persistent reservation key",
    ),
    t(
        0x15,
        "Third party persistent reservations source I_T nexus",
        "Third party persistent reservations source I_T nexus",
    ),
];

const SEGMENT_TYPES_SPC4: &[TypeCode] = &[
    t(0x07, "Verify", "Verify block or stream device operation"),
    t(0x11, "space -> tape", "Space records or filemarks on sequential access device"),
    t(0x12, "locate -> tape", "Locate on sequential access device"),
];

const SEGMENT_TYPES_SPC5: &[TypeCode] = &[
    t(0x07, "Verify CSCD", "Verify CSCD"),
    t(0x16, "<i>block -> <i>block", "Block device image copy"),
    t(0x17, "positioning -> tape", "Positioning on sequential access device"),
    t(
        0x18,
        "<loi>tape -> <loi>tape",
        "Copy logical objects from tape device to tape device",
    ),
    t(
        0x19,
        "<loi>tape -> <loi>tape mirror",
        "Create a mirror of the data stream as the tape is written",
    ),
    t(0xbe, "ROD <- block ranges<n>", "Populate ROD from one or more block ranges"),
    t(0xbf, "ROD <- block range", "Populate ROD from one block range"),
];

fn cscd_types(version: SpcVersion) -> [&'static [TypeCode]; 2] {
    match version {
        SpcVersion::Spc4 => [TARGET_DESCRIPTOR_TYPES_SPC4, &[]],
        SpcVersion::Spc5 => [CSCD_DESCRIPTOR_TYPES_SPC5, &[]],
    }
}

fn device_types(version: SpcVersion) -> [&'static [TypeCode]; 2] {
    match version {
        SpcVersion::Spc4 => [DEVICE_TYPES, DEVICE_TYPES_SPC4],
        SpcVersion::Spc5 => [DEVICE_TYPES, &[]],
    }
}

fn segment_types(version: SpcVersion) -> [&'static [TypeCode]; 2] {
    match version {
        SpcVersion::Spc4 => [SEGMENT_TYPES, SEGMENT_TYPES_SPC4],
        SpcVersion::Spc5 => [SEGMENT_TYPES, SEGMENT_TYPES_SPC5],
    }
}

/// Resolves `code` against `tables`. Names match the first row whose name
/// or description is equal, so `"Block"` means peripheral device type 0.
fn resolve(what: &'static str, code: &Code, tables: [&[TypeCode]; 2]) -> Result<u8> {
    let mut rows = tables.into_iter().flatten();
    match code {
        Code::Value(value) => rows
            .find(|row| row.code == *value)
            .map(|row| row.code)
            .ok_or(Error::Unsupported {
                what,
                code: u64::from(*value),
            }),
        Code::Name(name) => rows
            .find(|row| row.name == name.as_str() || row.description == name.as_str())
            .map(|row| row.code)
            .ok_or_else(|| Error::UnknownName {
                what,
                name: name.clone(),
            }),
    }
}

const IDENTIFICATION: u8 = 0xe4;

/// Longest designator an identification descriptor has room for.
const MAX_DESIGNATOR_LEN: usize = 20;

const CSCD_HEADER: Layout = Layout::new(
    "CSCD descriptor",
    4,
    &[
        ("descriptor_type_code", bits(0xff, 0)),
        ("lu_id_type", bits(0xc0, 1)),
        ("peripheral_device_type", bits(0x1f, 1)),
        ("relative_initiator_port_identifier", bits(0xffff, 2)),
    ],
);

// Device type specific parameters, the last four bytes of a CSCD descriptor.

const BLOCK_PARAMETERS: Layout = Layout::new(
    "block device parameters",
    4,
    &[("pad", bits(0x04, 0)), ("disk_block_length", bits(0xffffff, 1))],
);

const SEQUENTIAL_PARAMETERS: Layout = Layout::new(
    "sequential access device parameters",
    4,
    &[
        ("pad", bits(0x04, 0)),
        ("fixed", bits(0x01, 0)),
        ("stream_block_length", bits(0xffffff, 1)),
    ],
);

const PROCESSOR_PARAMETERS: Layout = Layout::new("processor device parameters", 4, &[("pad", bits(0x04, 0))]);

/// Device type specific parameters of a CSCD descriptor. The variant must
/// match the class of the descriptor's peripheral device type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeviceParameters {
    Block { pad: bool, disk_block_length: u32 },
    Sequential { pad: bool, fixed: bool, stream_block_length: u32 },
    Processor { pad: bool },
}

impl DeviceParameters {
    fn encode(&self, device_type: u8, buf: &mut [u8]) -> Result<()> {
        let (layout, record) = match (self, device_type) {
            (
                DeviceParameters::Block {
                    pad,
                    disk_block_length,
                },
                0x00 | 0x04 | 0x05 | 0x07 | 0x0e,
            ) => (
                &BLOCK_PARAMETERS,
                Record::new()
                    .with("pad", *pad)
                    .with("disk_block_length", *disk_block_length),
            ),
            (
                DeviceParameters::Sequential {
                    pad,
                    fixed,
                    stream_block_length,
                },
                0x01,
            ) => (
                &SEQUENTIAL_PARAMETERS,
                Record::new()
                    .with("pad", *pad)
                    .with("fixed", *fixed)
                    .with("stream_block_length", *stream_block_length),
            ),
            (DeviceParameters::Processor { pad }, 0x03) => (&PROCESSOR_PARAMETERS, Record::new().with("pad", *pad)),
            (params, device_type) => {
                return Err(Error::invalid(
                    "device_type_specific_parameters",
                    format!("{params:?} do not apply to peripheral device type {device_type:#04x}"),
                ));
            }
        };
        layout.encode_into(&record, buf, true)
    }
}

/// The designation descriptor carried by an identification CSCD descriptor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identification {
    pub code_set: u8,
    pub association: u8,
    pub designator: Designator,
}

/// A CSCD descriptor (a target descriptor in SPC-4 terms): one copy source
/// or destination.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CscdDescriptor {
    pub descriptor_type_code: Code,
    pub peripheral_device_type: Code,
    pub relative_initiator_port_identifier: u16,
    /// Required by the identification descriptor.
    pub identification: Option<Identification>,
    /// Left zero when absent.
    pub device_parameters: Option<DeviceParameters>,
}

impl CscdDescriptor {
    /// An identification CSCD descriptor naming the logical unit by
    /// `designator`.
    pub fn identification(
        peripheral_device_type: impl Into<Code>,
        code_set: u8,
        association: u8,
        designator: Designator,
    ) -> Self {
        Self {
            descriptor_type_code: Code::Value(IDENTIFICATION),
            peripheral_device_type: peripheral_device_type.into(),
            relative_initiator_port_identifier: 0,
            identification: Some(Identification {
                code_set,
                association,
                designator,
            }),
            device_parameters: None,
        }
    }

    pub fn marshall(&self, version: SpcVersion) -> Result<Vec<u8>> {
        let code = resolve(
            "CSCD descriptor type",
            &self.descriptor_type_code,
            cscd_types(version),
        )?;
        let device_type = resolve(
            "peripheral device type",
            &self.peripheral_device_type,
            device_types(version),
        )?;
        if code != IDENTIFICATION {
            return Err(Error::NotImplemented {
                what: "CSCD descriptor type",
                code: u64::from(code),
            });
        }
        let mut buf = vec![0; 32];
        let header = Record::new()
            .with("descriptor_type_code", code)
            .with("peripheral_device_type", device_type)
            .with(
                "relative_initiator_port_identifier",
                self.relative_initiator_port_identifier,
            );
        CSCD_HEADER.encode_into(&header, &mut buf, false)?;

        let id = self.identification.as_ref().ok_or_else(|| {
            Error::invalid("identification", "an identification CSCD descriptor needs a designator")
        })?;
        let designator = id.designator.marshall()?;
        if designator.len() > MAX_DESIGNATOR_LEN {
            return Err(Error::InvalidLength {
                field: "designator_length",
                value: designator.len() as u64,
                expected: "at most 20 bytes in a CSCD descriptor",
            });
        }
        let id_header = Record::new()
            .with("code_set", id.code_set)
            .with("association", id.association)
            .with("designator_type", id.designator.designator_type())
            .with("designator_length", designator.len());
        designator::HEADER.encode_into(&id_header, &mut buf[4..8], true)?;
        buf[8..8 + designator.len()].copy_from_slice(&designator);

        if let Some(params) = &self.device_parameters {
            params.encode(device_type, &mut buf[28..])?;
        }
        Ok(buf)
    }
}

// SPC-4 6.3.7.3 and 6.3.7.4, block device to or from stream device.
const BLOCK_STREAM_SPC4: Layout = Layout::new(
    "block/stream segment descriptor",
    24,
    &[
        ("descriptor_type_code", bits(0xff, 0)),
        ("cat", bits(0x01, 1)),
        ("descriptor_length", bits(0xffff, 2)),
        ("source_target_descriptor_id", bits(0xffff, 4)),
        ("destination_target_descriptor_id", bits(0xffff, 6)),
        ("stream_device_transfer_length", bits(0xffffff, 9)),
        ("block_device_number_of_blocks", bits(0xffff, 14)),
        ("block_device_logical_block_address", bits(0xffffffffffffffff, 16)),
    ],
);

// SPC-4 6.3.7.5, block device to block device.
const BLOCK_BLOCK_SPC4: Layout = Layout::new(
    "block to block segment descriptor",
    28,
    &[
        ("descriptor_type_code", bits(0xff, 0)),
        ("cat", bits(0x01, 1)),
        ("dc", bits(0x02, 1)),
        ("descriptor_length", bits(0xffff, 2)),
        ("source_target_descriptor_id", bits(0xffff, 4)),
        ("destination_target_descriptor_id", bits(0xffff, 6)),
        ("block_device_number_of_blocks", bits(0xffff, 10)),
        ("source_block_device_logical_block_address", bits(0xffffffffffffffff, 12)),
        ("destination_block_device_logical_block_address", bits(0xffffffffffffffff, 20)),
    ],
);

const BLOCK_STREAM_SPC5: Layout = Layout::new(
    "block/stream segment descriptor",
    24,
    &[
        ("descriptor_type_code", bits(0xff, 0)),
        ("cat", bits(0x01, 1)),
        ("descriptor_length", bits(0xffff, 2)),
        ("source_cscd_descriptor_id", bits(0xffff, 4)),
        ("destination_cscd_descriptor_id", bits(0xffff, 6)),
        ("stream_device_transfer_length", bits(0xffffff, 9)),
        ("block_device_number_of_blocks", bits(0xffff, 14)),
        ("block_device_logical_block_address", bits(0xffffffffffffffff, 16)),
    ],
);

const BLOCK_BLOCK_SPC5: Layout = Layout::new(
    "block to block segment descriptor",
    28,
    &[
        ("descriptor_type_code", bits(0xff, 0)),
        ("cat", bits(0x01, 1)),
        ("dc", bits(0x02, 1)),
        ("fco", bits(0x04, 1)),
        ("descriptor_length", bits(0xffff, 2)),
        ("source_cscd_descriptor_id", bits(0xffff, 4)),
        ("destination_cscd_descriptor_id", bits(0xffff, 6)),
        ("block_device_number_of_blocks", bits(0xffff, 10)),
        ("source_block_device_logical_block_address", bits(0xffffffffffffffff, 12)),
        ("destination_block_device_logical_block_address", bits(0xffffffffffffffff, 20)),
    ],
);

/// A segment descriptor: one copy operation between two CSCD descriptors,
/// which are referenced by their index in the CSCD descriptor list.
///
/// `fields` is checked strictly against the descriptor's layout, whose
/// field names follow the revision (`source_target_descriptor_id` in SPC-4,
/// `source_cscd_descriptor_id` in SPC-5). The type code and descriptor
/// length are filled in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SegmentDescriptor {
    pub descriptor_type_code: Code,
    pub fields: Record,
}

impl SegmentDescriptor {
    pub fn new(descriptor_type_code: impl Into<Code>, fields: Record) -> Self {
        Self {
            descriptor_type_code: descriptor_type_code.into(),
            fields,
        }
    }

    pub fn marshall(&self, version: SpcVersion) -> Result<Vec<u8>> {
        let code = resolve(
            "segment descriptor type",
            &self.descriptor_type_code,
            segment_types(version),
        )?;
        let layout = match (code, version) {
            (0x00 | 0x01 | 0x0b | 0x0c, SpcVersion::Spc4) => &BLOCK_STREAM_SPC4,
            (0x00 | 0x01 | 0x0b | 0x0c, SpcVersion::Spc5) => &BLOCK_STREAM_SPC5,
            (0x02 | 0x0d, SpcVersion::Spc4) => &BLOCK_BLOCK_SPC4,
            (0x02 | 0x0d, SpcVersion::Spc5) => &BLOCK_BLOCK_SPC5,
            (code, _) => {
                return Err(Error::NotImplemented {
                    what: "segment descriptor type",
                    code: u64::from(code),
                });
            }
        };
        let record = self
            .fields
            .clone()
            .with("descriptor_type_code", code)
            .with("descriptor_length", layout.size - 4);
        layout.encode_strict(&record)
    }
}

/// EXTENDED COPY, SPC-4 6.3 / SPC-5 6.6
///
/// Fields that only exist in one revision are ignored by the other: `nrcr`
/// is SPC-4 only, `list_id_usage`, `g_sense` and `immed` are SPC-5 only.
/// `list_identifier` is one byte wide in SPC-4 and four in SPC-5.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtendedCopy {
    pub version: SpcVersion,
    pub list_identifier: u32,
    pub sequential_striped: bool,
    pub nrcr: bool,
    pub list_id_usage: u8,
    pub priority: u8,
    pub g_sense: bool,
    pub immed: bool,
    pub cscd_descriptors: Vec<CscdDescriptor>,
    pub segment_descriptors: Vec<SegmentDescriptor>,
    pub inline_data: Vec<u8>,
}

impl ExtendedCopy {
    pub const CDB: Layout = Layout::new(
        "ExtendedCopy",
        16,
        &[
            ("opcode", bits(0xff, 0)),
            ("service_action", bits(0x1f, 1)),
            ("parameter_list_length", bits(0xffffffff, 10)),
        ],
    );

    /// SPC-4 Table 102, the LID1 parameter list header.
    pub const HEADER_SPC4: Layout = Layout::new(
        "EXTENDED COPY(LID1) parameter list",
        16,
        &[
            ("list_identifier", bits(0xff, 0)),
            ("str", bits(0x20, 1)),
            ("nrcr", bits(0x10, 1)),
            ("priority", bits(0x07, 1)),
            ("target_descriptor_list_length", bits(0xffff, 2)),
            ("segment_descriptor_list_length", bits(0xffffffff, 8)),
            ("inline_data_length", bits(0xffffffff, 12)),
        ],
    );

    /// SPC-5 Table 115, the LID4 parameter list header, including its
    /// 32-byte header CSCD descriptor.
    pub const HEADER_SPC5: Layout = Layout::new(
        "EXTENDED COPY(LID4) parameter list",
        48,
        &[
            ("parameter_list_format", bits(0xff, 0)),
            ("str", bits(0x20, 1)),
            ("list_id_usage", bits(0x18, 1)),
            ("priority", bits(0x07, 1)),
            ("header_cscd_descriptor_list_length", bits(0xffff, 2)),
            ("g_sense", bits(0x02, 15)),
            ("immed", bits(0x01, 15)),
            ("header_cscd_descriptor_type_code", bits(0xff, 16)),
            ("list_identifier", bits(0xffffffff, 20)),
            ("cscd_descriptor_list_length", bits(0xffff, 42)),
            ("segment_descriptor_list_length", bits(0xffff, 44)),
            ("inline_data_length", bits(0xffff, 46)),
        ],
    );

    /// An empty parameter list for `version`.
    pub fn new(version: SpcVersion) -> Self {
        Self {
            version,
            list_identifier: 0,
            sequential_striped: false,
            nrcr: false,
            list_id_usage: 0,
            priority: 0,
            g_sense: false,
            immed: false,
            cscd_descriptors: Vec::new(),
            segment_descriptors: Vec::new(),
            inline_data: Vec::new(),
        }
    }

    pub fn marshall_dataout(&self) -> Result<Vec<u8>> {
        let mut cscds = Vec::new();
        for descriptor in &self.cscd_descriptors {
            cscds.extend(descriptor.marshall(self.version)?);
        }
        let mut segments = Vec::new();
        for descriptor in &self.segment_descriptors {
            segments.extend(descriptor.marshall(self.version)?);
        }

        let header = Record::new()
            .with("list_identifier", self.list_identifier)
            .with("str", self.sequential_striped)
            .with("priority", self.priority)
            .with("segment_descriptor_list_length", segments.len())
            .with("inline_data_length", self.inline_data.len());
        let mut buf = match self.version {
            SpcVersion::Spc4 => Self::HEADER_SPC4.encode_strict(
                &header
                    .with("nrcr", self.nrcr)
                    .with("target_descriptor_list_length", cscds.len()),
            )?,
            SpcVersion::Spc5 => Self::HEADER_SPC5.encode_strict(
                &header
                    .with("parameter_list_format", 1u8)
                    .with("list_id_usage", self.list_id_usage)
                    .with("g_sense", self.g_sense)
                    .with("immed", self.immed)
                    .with("header_cscd_descriptor_list_length", 0x20u8)
                    .with("header_cscd_descriptor_type_code", 0xffu8)
                    .with("cscd_descriptor_list_length", cscds.len()),
            )?,
        };
        buf.extend(cscds);
        buf.extend(segments);
        buf.extend_from_slice(&self.inline_data);
        Ok(buf)
    }
}

impl Command for ExtendedCopy {
    const OPCODE: &'static str = "EXTENDED_COPY";
    type Output = ();

    fn cdb(&self, opcode: &Opcode) -> Result<Vec<u8>> {
        let record = Record::new()
            .with("service_action", opcode.service_action(self.version.service_action())?)
            .with("parameter_list_length", self.marshall_dataout()?.len());
        encode_cdb(&Self::CDB, opcode, &record)
    }

    fn data_out(&self) -> Result<Vec<u8>> {
        self.marshall_dataout()
    }

    fn unmarshall(&self, _data_in: &[u8]) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scsi::command::designator::{Naa, code_set};
    use crate::scsi::opcode::SPC;

    const DEADBEEF: [u8; 4] = [0xde, 0xad, 0xbe, 0xef];

    fn expected(len: usize, bytes: &[(usize, u8)]) -> Vec<u8> {
        let mut buf = vec![0; len];
        for &(offset, value) in bytes {
            buf[offset] = value;
        }
        buf
    }

    fn cdb(xcopy: &ExtendedCopy) -> Vec<u8> {
        xcopy.cdb(SPC.get("EXTENDED_COPY").unwrap()).unwrap()
    }

    fn hex(buf: &[u8]) -> String {
        buf.iter().map(|b| format!("{b:02x}")).collect()
    }

    fn vendor_specific_cscd() -> CscdDescriptor {
        let mut cscd = CscdDescriptor::identification(0u8, 0, 0, Designator::VendorSpecific(DEADBEEF.to_vec()));
        cscd.relative_initiator_port_identifier = 42;
        cscd.device_parameters = Some(DeviceParameters::Block {
            pad: true,
            disk_block_length: 0,
        });
        cscd
    }

    fn naa_cscd() -> CscdDescriptor {
        let mut cscd = CscdDescriptor::identification(
            5u8,
            code_set::BINARY,
            0,
            Designator::Naa(Naa::IeeeRegisteredExtended {
                ieee_company_id: 0x589cfc,
                vendor_specific_identifier: 0xc44,
                vendor_specific_identifier_extension: 0xc482cc288fbc0d75,
            }),
        );
        cscd.device_parameters = Some(DeviceParameters::Block {
            pad: false,
            disk_block_length: 512,
        });
        cscd
    }

    const NAA_BYTES: [u8; 16] = [
        0x65, 0x89, 0xcf, 0xc0, 0x00, 0x00, 0x0c, 0x44, 0xc4, 0x82, 0xcc, 0x28, 0x8f, 0xbc, 0x0d, 0x75,
    ];

    #[test]
    fn spc4_empty_list() {
        let xcopy = ExtendedCopy::new(SpcVersion::Spc4);
        assert_eq!(hex(&cdb(&xcopy)), "83000000000000000000000000100000");
        assert_eq!(xcopy.data_out().unwrap(), vec![0; 16]);

        let decoded = ExtendedCopy::CDB.decode(&cdb(&xcopy)).unwrap();
        assert_eq!(decoded.int("opcode"), 0x83);
        assert_eq!(decoded.int("service_action"), 0);
        assert_eq!(decoded.int("parameter_list_length"), 16);
    }

    #[test]
    fn spc4_header_flags() {
        let mut xcopy = ExtendedCopy::new(SpcVersion::Spc4);
        xcopy.list_identifier = 0x50;
        assert_eq!(xcopy.marshall_dataout().unwrap(), expected(16, &[(0, 0x50)]));

        let mut xcopy = ExtendedCopy::new(SpcVersion::Spc4);
        xcopy.sequential_striped = true;
        assert_eq!(xcopy.marshall_dataout().unwrap()[1], 0x20);
        xcopy.sequential_striped = false;
        xcopy.nrcr = true;
        assert_eq!(xcopy.marshall_dataout().unwrap()[1], 0x10);
        xcopy.nrcr = false;
        xcopy.priority = 1;
        assert_eq!(xcopy.marshall_dataout().unwrap()[1], 0x01);

        xcopy.sequential_striped = true;
        xcopy.nrcr = true;
        xcopy.priority = 7;
        assert_eq!(xcopy.marshall_dataout().unwrap()[1], 0x37);
    }

    #[test]
    fn spc4_list_identifier_is_one_byte() {
        let mut xcopy = ExtendedCopy::new(SpcVersion::Spc4);
        xcopy.list_identifier = 0x100;
        assert!(matches!(
            xcopy.marshall_dataout(),
            Err(Error::ValueOutOfRange { field: "list_identifier", .. })
        ));
    }

    #[test]
    fn spc4_inline_data() {
        let mut xcopy = ExtendedCopy::new(SpcVersion::Spc4);
        xcopy.inline_data = DEADBEEF.to_vec();
        assert_eq!(
            xcopy.marshall_dataout().unwrap(),
            expected(20, &[(15, 4), (16, 0xde), (17, 0xad), (18, 0xbe), (19, 0xef)])
        );
        assert_eq!(cdb(&xcopy)[13], 20);
    }

    #[test]
    fn spc4_vendor_specific_identification() {
        let mut xcopy = ExtendedCopy::new(SpcVersion::Spc4);
        xcopy.cscd_descriptors.push(vendor_specific_cscd());
        assert_eq!(
            xcopy.marshall_dataout().unwrap(),
            expected(
                48,
                &[
                    (3, 0x20),
                    (16, 0xe4),
                    (19, 42),
                    (23, 4),
                    (24, 0xde),
                    (25, 0xad),
                    (26, 0xbe),
                    (27, 0xef),
                    (44, 4),
                ]
            )
        );
    }

    #[test]
    fn spc4_naa_identification() {
        let mut xcopy = ExtendedCopy::new(SpcVersion::Spc4);
        xcopy.list_identifier = 0xaa;
        xcopy.cscd_descriptors.push(naa_cscd());
        let data = xcopy.marshall_dataout().unwrap();
        assert_eq!(data.len(), 48);
        assert_eq!(data[..4], [0xaa, 0, 0, 0x20]);
        assert_eq!(data[16..24], [0xe4, 5, 0, 0, 1, 3, 0, 0x10]);
        assert_eq!(data[24..40], NAA_BYTES);
        assert_eq!(data[44..48], [0, 0, 2, 0]);
    }

    #[test]
    fn spc4_t10_vendor_id_on_tape() {
        let mut cscd = CscdDescriptor::identification(
            "Stream or Tape",
            code_set::ASCII,
            0,
            Designator::T10VendorId {
                t10_vendor_id: *b"TrueNAS ",
                vendor_specific_id: b"test123".to_vec(),
            },
        );
        cscd.device_parameters = Some(DeviceParameters::Sequential {
            pad: true,
            fixed: true,
            stream_block_length: 1024,
        });
        let mut xcopy = ExtendedCopy::new(SpcVersion::Spc4);
        xcopy.cscd_descriptors.push(cscd);
        let data = xcopy.marshall_dataout().unwrap();
        assert_eq!(data[16..24], [0xe4, 1, 0, 0, 2, 1, 0, 15]);
        assert_eq!(&data[24..39], b"TrueNAS test123");
        assert_eq!(data[44..48], [5, 0, 4, 0]);
    }

    #[test]
    fn spc4_block_to_block_segment() {
        let mut xcopy = ExtendedCopy::new(SpcVersion::Spc4);
        xcopy.list_identifier = 0x12;
        xcopy.segment_descriptors.push(SegmentDescriptor::new(
            "Copy from block device to block device",
            Record::new()
                .with("dc", true)
                .with("source_target_descriptor_id", 1u16)
                .with("destination_target_descriptor_id", 2u16)
                .with("block_device_number_of_blocks", 1024u16)
                .with("source_block_device_logical_block_address", 2048u64)
                .with("destination_block_device_logical_block_address", 4096u64),
        ));
        xcopy.inline_data = DEADBEEF.to_vec();
        assert_eq!(
            xcopy.marshall_dataout().unwrap(),
            expected(
                48,
                &[
                    (0, 0x12),
                    (11, 28),
                    (15, 4),
                    (16, 0x02),
                    (17, 0x02),
                    (19, 0x18),
                    (21, 1),
                    (23, 2),
                    (26, 4),
                    (34, 8),
                    (42, 0x10),
                    (44, 0xde),
                    (45, 0xad),
                    (46, 0xbe),
                    (47, 0xef),
                ]
            )
        );
    }

    #[test]
    fn spc4_block_to_stream_segment() {
        let mut xcopy = ExtendedCopy::new(SpcVersion::Spc4);
        xcopy.segment_descriptors.push(SegmentDescriptor::new(
            "block -> stream",
            Record::new()
                .with("cat", true)
                .with("destination_target_descriptor_id", 1u16)
                .with("stream_device_transfer_length", 0x10000u32)
                .with("block_device_number_of_blocks", 8u16)
                .with("block_device_logical_block_address", 0x1_0000_0000u64),
        ));
        let data = xcopy.marshall_dataout().unwrap();
        assert_eq!(data.len(), 16 + 24);
        let segment = &data[16..];
        assert_eq!(segment[..8], [0x00, 0x01, 0x00, 0x14, 0, 0, 0, 1]);
        assert_eq!(segment[9..12], [0x01, 0x00, 0x00]);
        assert_eq!(segment[14..16], [0, 8]);
        assert_eq!(segment[16..24], [0, 0, 0, 1, 0, 0, 0, 0]);
    }

    #[test]
    fn segment_fields_are_checked_strictly() {
        let mut xcopy = ExtendedCopy::new(SpcVersion::Spc4);
        // SPC-5 name for the source
        xcopy.segment_descriptors.push(SegmentDescriptor::new(
            0x02u8,
            Record::new().with("source_cscd_descriptor_id", 1u16),
        ));
        assert!(matches!(
            xcopy.marshall_dataout(),
            Err(Error::UnknownField {
                field: "source_cscd_descriptor_id",
                ..
            })
        ));
    }

    #[test]
    fn codes_by_name_and_by_value() {
        let lookup = |code: Code| resolve("segment descriptor type", &code, segment_types(SpcVersion::Spc4));
        assert_eq!(lookup("block -> block".into()).unwrap(), 0x02);
        assert_eq!(lookup(Code::from("Copy from block device to block device")).unwrap(), 0x02);
        assert_eq!(lookup(0x12u8.into()).unwrap(), 0x12);
        assert!(matches!(
            lookup("block -> nowhere".into()),
            Err(Error::UnknownName { .. })
        ));
        assert!(matches!(
            lookup(0x16u8.into()),
            Err(Error::Unsupported { code: 0x16, .. })
        ));

        let devices = |code: Code| resolve("peripheral device type", &code, device_types(SpcVersion::Spc5));
        assert_eq!(devices("Block".into()).unwrap(), 0x00);
        assert_eq!(devices("CD/DVD device".into()).unwrap(), 0x05);
        assert!(devices(0x04u8.into()).is_err());
    }

    #[test]
    fn defined_but_unimplemented_codes() {
        let mut xcopy = ExtendedCopy::new(SpcVersion::Spc5);
        xcopy.segment_descriptors.push(SegmentDescriptor::new("Verify CSCD", Record::new()));
        assert!(matches!(
            xcopy.marshall_dataout(),
            Err(Error::NotImplemented { code: 0x07, .. })
        ));

        let mut cscd = vendor_specific_cscd();
        cscd.descriptor_type_code = "IPv4 CSCD descriptor".into();
        let mut xcopy = ExtendedCopy::new(SpcVersion::Spc5);
        xcopy.cscd_descriptors.push(cscd);
        assert!(matches!(
            xcopy.marshall_dataout(),
            Err(Error::NotImplemented { code: 0xe5, .. })
        ));
    }

    #[test]
    fn revision_specific_cscd_names() {
        let mut cscd = vendor_specific_cscd();
        cscd.descriptor_type_code = "Identification Descriptor CSCD descriptor".into();
        assert!(cscd.marshall(SpcVersion::Spc5).is_ok());
        assert!(matches!(
            cscd.marshall(SpcVersion::Spc4),
            Err(Error::UnknownName { .. })
        ));
        cscd.descriptor_type_code = 0xe3u8.into();
        assert!(matches!(
            cscd.marshall(SpcVersion::Spc5),
            Err(Error::Unsupported { code: 0xe3, .. })
        ));
    }

    #[test]
    fn parameters_must_match_device_class() {
        let mut cscd = vendor_specific_cscd();
        cscd.device_parameters = Some(DeviceParameters::Processor { pad: true });
        assert!(matches!(
            cscd.marshall(SpcVersion::Spc4),
            Err(Error::InvalidParameter { .. })
        ));
        cscd.peripheral_device_type = "Processor device".into();
        assert_eq!(cscd.marshall(SpcVersion::Spc4).unwrap()[28], 0x04);
    }

    #[test]
    fn designator_too_long_for_descriptor() {
        let mut cscd = vendor_specific_cscd();
        cscd.identification = Some(Identification {
            code_set: 0,
            association: 0,
            designator: Designator::VendorSpecific(vec![0; 21]),
        });
        assert!(matches!(
            cscd.marshall(SpcVersion::Spc5),
            Err(Error::InvalidLength { field: "designator_length", value: 21, .. })
        ));
    }

    #[test]
    fn spc5_empty_list() {
        let xcopy = ExtendedCopy::new(SpcVersion::Spc5);
        assert_eq!(hex(&cdb(&xcopy)), "83010000000000000000000000300000");
        assert_eq!(
            xcopy.data_out().unwrap(),
            expected(48, &[(0, 1), (3, 0x20), (16, 0xff)])
        );
    }

    #[test]
    fn spc5_header_fields() {
        let mut xcopy = ExtendedCopy::new(SpcVersion::Spc5);
        xcopy.sequential_striped = true;
        xcopy.list_id_usage = 2;
        xcopy.priority = 5;
        assert_eq!(xcopy.marshall_dataout().unwrap()[1], 0x35);

        let mut xcopy = ExtendedCopy::new(SpcVersion::Spc5);
        xcopy.g_sense = true;
        xcopy.immed = true;
        xcopy.list_identifier = 257;
        let data = xcopy.marshall_dataout().unwrap();
        assert_eq!(data[15], 0x03);
        assert_eq!(data[20..24], [0, 0, 1, 1]);

        xcopy.list_id_usage = 4;
        assert!(matches!(
            xcopy.marshall_dataout(),
            Err(Error::ValueOutOfRange { field: "list_id_usage", .. })
        ));
    }

    #[test]
    fn spc5_identification_and_segment() {
        let mut xcopy = ExtendedCopy::new(SpcVersion::Spc5);
        let mut cscd = vendor_specific_cscd();
        cscd.descriptor_type_code = "Identification Descriptor CSCD descriptor".into();
        xcopy.cscd_descriptors.push(cscd);
        let data = xcopy.marshall_dataout().unwrap();
        assert_eq!(data.len(), 80);
        assert_eq!(data[43], 32);
        assert_eq!(data[48..52], [0xe4, 0, 0, 42]);
        assert_eq!(data[55], 4);
        assert_eq!(data[56..60], DEADBEEF);
        assert_eq!(data[76], 4);

        let mut xcopy = ExtendedCopy::new(SpcVersion::Spc5);
        xcopy.segment_descriptors.push(SegmentDescriptor::new(
            "Copy from block device to block device",
            Record::new()
                .with("dc", true)
                .with("source_cscd_descriptor_id", 1u16)
                .with("destination_cscd_descriptor_id", 2u16)
                .with("block_device_number_of_blocks", 1024u16)
                .with("source_block_device_logical_block_address", 2048u64)
                .with("destination_block_device_logical_block_address", 4096u64),
        ));
        xcopy.inline_data = DEADBEEF.to_vec();
        let data = xcopy.marshall_dataout().unwrap();
        assert_eq!(data.len(), 80);
        assert_eq!(cdb(&xcopy)[13], 80);
        assert_eq!(data[45], 28);
        assert_eq!(data[47], 4);
        let segment = &data[48..76];
        assert_eq!(segment[..8], [0x02, 0x02, 0, 0x18, 0, 1, 0, 2]);
        assert_eq!(segment[10], 0x04);
        assert_eq!(segment[18], 0x08);
        assert_eq!(segment[26], 0x10);
        assert_eq!(data[76..], DEADBEEF);
    }

    #[test]
    fn spc5_naa_identification() {
        let mut xcopy = ExtendedCopy::new(SpcVersion::Spc5);
        xcopy.cscd_descriptors.push(naa_cscd());
        let data = xcopy.marshall_dataout().unwrap();
        assert_eq!(data[48..56], [0xe4, 5, 0, 0, 1, 3, 0, 0x10]);
        assert_eq!(data[56..72], NAA_BYTES);
    }
}
