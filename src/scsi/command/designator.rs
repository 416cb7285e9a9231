//! Designation descriptors, as found in the DEVICE IDENTIFICATION VPD page
//! and in EXTENDED COPY identification CSCD descriptors.
//!
//! SPC-4 7.8.6. Each descriptor is a 4-byte header followed by a designator
//! whose shape is picked by `designator_type`, and for NAA and EUI-64 again
//! by the first nibble or by the designator length.

use crate::scsi::bitfield::{be_bytes, be_int};
use crate::scsi::error::{Error, Result};
use crate::scsi::field::{Layout, Record, bits};

pub mod protocol_identifier {
    pub const FIBRE_CHANNEL: u8 = 0x00;
    pub const SCSI_PARALLEL_INTERFACE: u8 = 0x01;
    pub const SERIAL_STORAGE_ARCHITECTURE: u8 = 0x02;
    pub const SERIAL_BUS_PROTOCOL: u8 = 0x03;
    pub const RDMA: u8 = 0x04;
    pub const ISCSI: u8 = 0x05;
    pub const SAS: u8 = 0x06;
    pub const AUTOMATION_DRIVE_INTERFACE: u8 = 0x07;
    pub const AT_ATTACHMENT_INTERFACE: u8 = 0x08;
    pub const USB_ATTACHED_SCSI: u8 = 0x09;
    pub const SCSI_OVER_PCI_EXPRESS: u8 = 0x0a;
    pub const NO_SPECIFIC_PROTOCOL: u8 = 0x0f;
}

pub mod code_set {
    pub const BINARY: u8 = 0x01;
    pub const ASCII: u8 = 0x02;
    pub const UTF8: u8 = 0x03;
}

pub mod association {
    pub const ASSOCIATED_WITH_LUN: u8 = 0x00;
    pub const ASSOCIATED_WITH_TARGET_PORT: u8 = 0x01;
    pub const ASSOCIATED_WITH_TARGET_DEVICE: u8 = 0x02;
}

pub mod designator_type {
    pub const VENDOR_SPECIFIC: u8 = 0x00;
    pub const T10_VENDOR_ID: u8 = 0x01;
    pub const EUI_64: u8 = 0x02;
    pub const NAA: u8 = 0x03;
    pub const RELATIVE_TARGET_PORT_IDENTIFIER: u8 = 0x04;
    pub const TARGET_PORTAL_GROUP: u8 = 0x05;
    pub const LOGICAL_UNIT_GROUP: u8 = 0x06;
    pub const MD5_LOGICAL_IDENTIFIER: u8 = 0x07;
    pub const SCSI_NAME_STRING: u8 = 0x08;
    pub const PCI_EXPRESS_ROUTING_ID: u8 = 0x09;
}

pub mod naa {
    pub const IEEE_EXTENDED: u8 = 0x02;
    pub const LOCALLY_ASSIGNED: u8 = 0x03;
    pub const IEEE_REGISTERED: u8 = 0x05;
    pub const IEEE_REGISTERED_EXTENDED: u8 = 0x06;
}

/// The 4-byte header in front of every designator.
pub const HEADER: Layout = Layout::new(
    "designation descriptor",
    4,
    &[
        ("protocol_identifier", bits(0xf0, 0)),
        ("code_set", bits(0x0f, 0)),
        ("piv", bits(0x80, 1)),
        ("association", bits(0x30, 1)),
        ("designator_type", bits(0x0f, 1)),
        ("designator_length", bits(0xff, 3)),
    ],
);

const NAA_IEEE_EXTENDED: Layout = Layout::new(
    "NAA IEEE extended",
    8,
    &[
        ("naa", bits(0xf0, 0)),
        ("vendor_specific_identifier_a", bits(0x0fff, 0)),
        ("ieee_company_id", bits(0xffffff, 2)),
        ("vendor_specific_identifier_b", bits(0xffffff, 5)),
    ],
);

const NAA_LOCALLY_ASSIGNED: Layout = Layout::new(
    "NAA locally assigned",
    8,
    &[
        ("naa", bits(0xf0, 0)),
        ("locally_administered_value", bits(0x0fffffffffffffff, 0)),
    ],
);

const NAA_IEEE_REGISTERED: Layout = Layout::new(
    "NAA IEEE registered",
    8,
    &[
        ("naa", bits(0xf0, 0)),
        ("ieee_company_id", bits(0x0ffffff0, 0)),
        ("vendor_specific_identifier", bits(0x0fffffffff, 3)),
    ],
);

const NAA_IEEE_REGISTERED_EXTENDED: Layout = Layout::new(
    "NAA IEEE registered extended",
    16,
    &[
        ("naa", bits(0xf0, 0)),
        ("ieee_company_id", bits(0x0ffffff0, 0)),
        ("vendor_specific_identifier", bits(0x0fffffffff, 3)),
        ("vendor_specific_identifier_extension", bits(0xffffffffffffffff, 8)),
    ],
);

/// A Network Address Authority designator, shaped by its `NAA` nibble.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Naa {
    IeeeExtended {
        vendor_specific_identifier_a: u16,
        ieee_company_id: u32,
        vendor_specific_identifier_b: u32,
    },
    LocallyAssigned {
        locally_administered_value: u64,
    },
    IeeeRegistered {
        ieee_company_id: u32,
        vendor_specific_identifier: u64,
    },
    IeeeRegisteredExtended {
        ieee_company_id: u32,
        vendor_specific_identifier: u64,
        vendor_specific_identifier_extension: u64,
    },
}

impl Naa {
    pub fn naa(&self) -> u8 {
        match self {
            Naa::IeeeExtended { .. } => naa::IEEE_EXTENDED,
            Naa::LocallyAssigned { .. } => naa::LOCALLY_ASSIGNED,
            Naa::IeeeRegistered { .. } => naa::IEEE_REGISTERED,
            Naa::IeeeRegisteredExtended { .. } => naa::IEEE_REGISTERED_EXTENDED,
        }
    }

    fn layout(naa: u8) -> Result<&'static Layout> {
        match naa {
            naa::IEEE_EXTENDED => Ok(&NAA_IEEE_EXTENDED),
            naa::LOCALLY_ASSIGNED => Ok(&NAA_LOCALLY_ASSIGNED),
            naa::IEEE_REGISTERED => Ok(&NAA_IEEE_REGISTERED),
            naa::IEEE_REGISTERED_EXTENDED => Ok(&NAA_IEEE_REGISTERED_EXTENDED),
            code => Err(Error::Unsupported {
                what: "NAA type",
                code: u64::from(code),
            }),
        }
    }

    pub fn unmarshall(data: &[u8]) -> Result<Naa> {
        let nibble = data
            .first()
            .map(|b| b >> 4)
            .ok_or_else(|| Error::truncated("NAA designator", 1, 0))?;
        let layout = Self::layout(nibble)?;
        if data.len() != layout.size {
            return Err(Error::InvalidLength {
                field: "designator_length",
                value: data.len() as u64,
                expected: "8, or 16 for IEEE registered extended",
            });
        }
        let r = layout.decode(data)?;
        Ok(match nibble {
            naa::IEEE_EXTENDED => Naa::IeeeExtended {
                vendor_specific_identifier_a: r.int("vendor_specific_identifier_a") as u16,
                ieee_company_id: r.int("ieee_company_id") as u32,
                vendor_specific_identifier_b: r.int("vendor_specific_identifier_b") as u32,
            },
            naa::LOCALLY_ASSIGNED => Naa::LocallyAssigned {
                locally_administered_value: r.int("locally_administered_value"),
            },
            naa::IEEE_REGISTERED => Naa::IeeeRegistered {
                ieee_company_id: r.int("ieee_company_id") as u32,
                vendor_specific_identifier: r.int("vendor_specific_identifier"),
            },
            _ => Naa::IeeeRegisteredExtended {
                ieee_company_id: r.int("ieee_company_id") as u32,
                vendor_specific_identifier: r.int("vendor_specific_identifier"),
                vendor_specific_identifier_extension: r.int("vendor_specific_identifier_extension"),
            },
        })
    }

    pub fn marshall(&self) -> Result<Vec<u8>> {
        let record = match *self {
            Naa::IeeeExtended {
                vendor_specific_identifier_a,
                ieee_company_id,
                vendor_specific_identifier_b,
            } => Record::new()
                .with("vendor_specific_identifier_a", vendor_specific_identifier_a)
                .with("ieee_company_id", ieee_company_id)
                .with("vendor_specific_identifier_b", vendor_specific_identifier_b),
            Naa::LocallyAssigned {
                locally_administered_value,
            } => Record::new().with("locally_administered_value", locally_administered_value),
            Naa::IeeeRegistered {
                ieee_company_id,
                vendor_specific_identifier,
            } => Record::new()
                .with("ieee_company_id", ieee_company_id)
                .with("vendor_specific_identifier", vendor_specific_identifier),
            Naa::IeeeRegisteredExtended {
                ieee_company_id,
                vendor_specific_identifier,
                vendor_specific_identifier_extension,
            } => Record::new()
                .with("ieee_company_id", ieee_company_id)
                .with("vendor_specific_identifier", vendor_specific_identifier)
                .with(
                    "vendor_specific_identifier_extension",
                    vendor_specific_identifier_extension,
                ),
        };
        Self::layout(self.naa())?.encode(&record.with("naa", self.naa()))
    }
}

/// An EUI-64 based designator; the three forms differ only in length.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Eui64 {
    /// 8 bytes.
    Eui64 {
        ieee_company_id: u32,
        vendor_specific_extension_id: [u8; 5],
    },
    /// 12 bytes.
    Eui64_12 {
        ieee_company_id: u32,
        vendor_specific_extension_id: [u8; 5],
        directory_id: [u8; 4],
    },
    /// 16 bytes.
    Eui64_16 {
        identifier_extension: [u8; 8],
        ieee_company_id: u32,
        vendor_specific_extension_id: [u8; 5],
    },
}

fn array<const N: usize>(data: &[u8]) -> [u8; N] {
    let mut out = [0; N];
    let n = data.len().min(N);
    out[..n].copy_from_slice(&data[..n]);
    out
}

impl Eui64 {
    pub fn unmarshall(data: &[u8]) -> Result<Eui64> {
        match data.len() {
            8 => Ok(Eui64::Eui64 {
                ieee_company_id: be_int(&data[..3]) as u32,
                vendor_specific_extension_id: array(&data[3..8]),
            }),
            12 => Ok(Eui64::Eui64_12 {
                ieee_company_id: be_int(&data[..3]) as u32,
                vendor_specific_extension_id: array(&data[3..8]),
                directory_id: array(&data[8..12]),
            }),
            16 => Ok(Eui64::Eui64_16 {
                identifier_extension: array(&data[..8]),
                ieee_company_id: be_int(&data[8..11]) as u32,
                vendor_specific_extension_id: array(&data[11..16]),
            }),
            n => Err(Error::InvalidLength {
                field: "designator_length",
                value: n as u64,
                expected: "8, 12 or 16 for EUI-64",
            }),
        }
    }

    pub fn marshall(&self) -> Vec<u8> {
        match self {
            Eui64::Eui64 {
                ieee_company_id,
                vendor_specific_extension_id,
            } => {
                let mut buf = be_bytes(u64::from(*ieee_company_id), 3);
                buf.extend_from_slice(vendor_specific_extension_id);
                buf
            }
            Eui64::Eui64_12 {
                ieee_company_id,
                vendor_specific_extension_id,
                directory_id,
            } => {
                let mut buf = be_bytes(u64::from(*ieee_company_id), 3);
                buf.extend_from_slice(vendor_specific_extension_id);
                buf.extend_from_slice(directory_id);
                buf
            }
            Eui64::Eui64_16 {
                identifier_extension,
                ieee_company_id,
                vendor_specific_extension_id,
            } => {
                let mut buf = identifier_extension.to_vec();
                buf.extend(be_bytes(u64::from(*ieee_company_id), 3));
                buf.extend_from_slice(vendor_specific_extension_id);
                buf
            }
        }
    }
}

/// The designator proper, keyed by `designator_type`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Designator {
    VendorSpecific(Vec<u8>),
    T10VendorId {
        /// Eight ASCII characters, space padded.
        t10_vendor_id: [u8; 8],
        vendor_specific_id: Vec<u8>,
    },
    Eui64(Eui64),
    Naa(Naa),
    RelativeTargetPort(u16),
    TargetPortalGroup(u16),
    LogicalUnitGroup(u16),
    Md5LogicalIdentifier([u8; 16]),
    ScsiNameString(Vec<u8>),
    PciExpressRoutingId(u16),
}

/// Reads the 16-bit value at byte 2 of a 4-byte positional designator.
fn positional(data: &[u8], offset: usize) -> Result<u16> {
    data.get(offset..offset + 2)
        .map(|b| u16::from_be_bytes([b[0], b[1]]))
        .ok_or_else(|| Error::truncated("designator", offset + 2, data.len()))
}

impl Designator {
    pub fn designator_type(&self) -> u8 {
        use designator_type::*;
        match self {
            Designator::VendorSpecific(_) => VENDOR_SPECIFIC,
            Designator::T10VendorId { .. } => T10_VENDOR_ID,
            Designator::Eui64(_) => EUI_64,
            Designator::Naa(_) => NAA,
            Designator::RelativeTargetPort(_) => RELATIVE_TARGET_PORT_IDENTIFIER,
            Designator::TargetPortalGroup(_) => TARGET_PORTAL_GROUP,
            Designator::LogicalUnitGroup(_) => LOGICAL_UNIT_GROUP,
            Designator::Md5LogicalIdentifier(_) => MD5_LOGICAL_IDENTIFIER,
            Designator::ScsiNameString(_) => SCSI_NAME_STRING,
            Designator::PciExpressRoutingId(_) => PCI_EXPRESS_ROUTING_ID,
        }
    }

    /// Decodes `data`, the `designator_length` bytes following the header.
    pub fn unmarshall(designator_type: u8, data: &[u8]) -> Result<Designator> {
        use designator_type::*;
        Ok(match designator_type {
            VENDOR_SPECIFIC => Designator::VendorSpecific(data.to_vec()),
            T10_VENDOR_ID => {
                if data.len() < 8 {
                    return Err(Error::truncated("T10 vendor ID designator", 8, data.len()));
                }
                Designator::T10VendorId {
                    t10_vendor_id: array(&data[..8]),
                    vendor_specific_id: data[8..].to_vec(),
                }
            }
            EUI_64 => Designator::Eui64(Eui64::unmarshall(data)?),
            NAA => Designator::Naa(Naa::unmarshall(data)?),
            RELATIVE_TARGET_PORT_IDENTIFIER => Designator::RelativeTargetPort(positional(data, 2)?),
            TARGET_PORTAL_GROUP => Designator::TargetPortalGroup(positional(data, 2)?),
            LOGICAL_UNIT_GROUP => Designator::LogicalUnitGroup(positional(data, 2)?),
            MD5_LOGICAL_IDENTIFIER => {
                if data.len() < 16 {
                    return Err(Error::truncated("MD5 logical identifier", 16, data.len()));
                }
                Designator::Md5LogicalIdentifier(array(data))
            }
            SCSI_NAME_STRING => Designator::ScsiNameString(data.to_vec()),
            PCI_EXPRESS_ROUTING_ID => Designator::PciExpressRoutingId(positional(data, 0)?),
            code => {
                return Err(Error::Unsupported {
                    what: "designator type",
                    code: u64::from(code),
                });
            }
        })
    }

    pub fn marshall(&self) -> Result<Vec<u8>> {
        let positional = |offset: usize, len: usize, value: u16| {
            let mut buf = vec![0; len];
            buf[offset..offset + 2].copy_from_slice(&value.to_be_bytes());
            buf
        };
        Ok(match self {
            Designator::VendorSpecific(data) | Designator::ScsiNameString(data) => data.clone(),
            Designator::T10VendorId {
                t10_vendor_id,
                vendor_specific_id,
            } => {
                let mut buf = t10_vendor_id.to_vec();
                buf.extend_from_slice(vendor_specific_id);
                buf
            }
            Designator::Eui64(eui) => eui.marshall(),
            Designator::Naa(naa) => naa.marshall()?,
            Designator::RelativeTargetPort(v)
            | Designator::TargetPortalGroup(v)
            | Designator::LogicalUnitGroup(v) => positional(2, 4, *v),
            Designator::Md5LogicalIdentifier(id) => id.to_vec(),
            Designator::PciExpressRoutingId(v) => positional(0, 8, *v),
        })
    }
}

/// One entry of the DEVICE IDENTIFICATION page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DesignationDescriptor {
    /// Only meaningful, and only reported, when `piv` is set and the
    /// association is a target port or target device.
    pub protocol_identifier: Option<u8>,
    pub code_set: u8,
    pub piv: bool,
    pub association: u8,
    pub designator: Designator,
}

impl DesignationDescriptor {
    /// Decodes the descriptor at the start of `data`, returning it and the
    /// number of bytes it occupies.
    pub fn unmarshall(data: &[u8]) -> Result<(DesignationDescriptor, usize)> {
        let header = HEADER.decode(data)?;
        let len = header.int("designator_length") as usize;
        let body = data
            .get(4..4 + len)
            .ok_or_else(|| Error::truncated("designator", 4 + len, data.len()))?;
        let piv = header.int("piv") != 0;
        let association = header.int("association") as u8;
        let reports_protocol = piv
            && matches!(
                association,
                association::ASSOCIATED_WITH_TARGET_PORT | association::ASSOCIATED_WITH_TARGET_DEVICE
            );
        let descriptor = DesignationDescriptor {
            protocol_identifier: reports_protocol.then(|| header.int("protocol_identifier") as u8),
            code_set: header.int("code_set") as u8,
            piv,
            association,
            designator: Designator::unmarshall(header.int("designator_type") as u8, body)?,
        };
        Ok((descriptor, 4 + len))
    }

    pub fn marshall(&self) -> Result<Vec<u8>> {
        let body = self.designator.marshall()?;
        let designator_length = u8::try_from(body.len()).map_err(|_| Error::InvalidLength {
            field: "designator_length",
            value: body.len() as u64,
            expected: "at most 255",
        })?;
        let header = Record::new()
            .with("protocol_identifier", self.protocol_identifier.unwrap_or(0))
            .with("code_set", self.code_set)
            .with("piv", self.piv)
            .with("association", self.association)
            .with("designator_type", self.designator.designator_type())
            .with("designator_length", designator_length);
        let mut buf = HEADER.encode(&header)?;
        buf.extend(body);
        Ok(buf)
    }
}
