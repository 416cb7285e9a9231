//! INQUIRY and the vital product data pages it can return.
//!
//! SPC-4 6.6 and 7.8. With `evpd` clear the device returns standard inquiry
//! data; with `evpd` set it returns the VPD page named by `page_code`, whose
//! layout is chosen by the page code echoed back in byte 1.

use super::designator::DesignationDescriptor;
use super::{Command, encode_cdb, length_at};
use crate::scsi::error::{Error, Result};
use crate::scsi::field::{Layout, Record, bits, bytes};
use crate::scsi::opcode::Opcode;

pub mod vpd {
    pub const SUPPORTED_VPD_PAGES: u8 = 0x00;
    pub const UNIT_SERIAL_NUMBER: u8 = 0x80;
    pub const DEVICE_IDENTIFICATION: u8 = 0x83;
    pub const SOFTWARE_INTERFACE_IDENTIFICATION: u8 = 0x84;
    pub const MANAGEMENT_NETWORK_ADDRESS: u8 = 0x85;
    pub const EXTENDED_INQUIRY_DATA: u8 = 0x86;
    pub const MODE_PAGE_POLICY: u8 = 0x87;
    pub const SCSI_PORTS: u8 = 0x88;
    pub const ATA_INFORMATION: u8 = 0x89;
    pub const POWER_CONDITION: u8 = 0x8a;
    pub const DEVICE_CONSTITUENTS: u8 = 0x8b;
    pub const CFA_PROFILE_INFORMATION: u8 = 0x8c;
    pub const POWER_CONSUMPTION: u8 = 0x8d;
    pub const THIRD_PARTY_COPY: u8 = 0x8f;
    pub const PROTOCOL_SPECIFIC_LOGICAL_UNIT_INFORMATION: u8 = 0x90;
    pub const PROTOCOL_SPECIFIC_PORT_INFORMATION: u8 = 0x91;
    pub const BLOCK_LIMITS: u8 = 0xb0;
    pub const BLOCK_DEVICE_CHARACTERISTICS: u8 = 0xb1;
    pub const LOGICAL_BLOCK_PROVISIONING: u8 = 0xb2;
    pub const REFERRALS: u8 = 0xb3;
    pub const SUPPORTED_BLOCK_LENGTHS_AND_PROTECTION_TYPES: u8 = 0xb4;
    pub const BLOCK_DEVICE_CHARACTERISTICS_EXTENSION: u8 = 0xb5;
}

/// `PERIPHERAL DEVICE TYPE` values.
pub mod device_type {
    pub const BLOCK_DEVICE: u8 = 0x00;
    pub const TAPE_DEVICE: u8 = 0x01;
    pub const PRINTER_DEVICE: u8 = 0x02;
    pub const PROCESSOR_DEVICE: u8 = 0x03;
    pub const WRITE_ONCE_DEVICE: u8 = 0x04;
    pub const MULTIMEDIA_DEVICE: u8 = 0x05;
    pub const SCANNER_DEVICE: u8 = 0x06;
    pub const OPTICAL_MEMORY_DEVICE: u8 = 0x07;
    pub const MEDIA_CHANGER_DEVICE: u8 = 0x08;
    pub const COMMUNICATIONS_DEVICE: u8 = 0x09;
    pub const STORAGE_ARRAY_CONTROLLER: u8 = 0x0c;
    pub const ENCLOSURE_SERVICE_DEVICE: u8 = 0x0d;
    pub const SIMPLIFIED_DIRECT_ACCESS_DEVICE: u8 = 0x0e;
    pub const OPTICAL_CARD_READER: u8 = 0x0f;
    pub const BRIDGE_CONTROLLER: u8 = 0x10;
    pub const OBJECT_STORAGE_DEVICE: u8 = 0x11;
    pub const AUTOMATION_DRIVE_DEVICE: u8 = 0x12;
    pub const SECURITY_MANAGER_DEVICE: u8 = 0x13;
    pub const WELL_KNOWN_LOGICAL_UNIT: u8 = 0x1e;
    pub const UNKNOWN_DEVICE: u8 = 0x1f;
}

pub mod provisioning_type {
    pub const NO_PROVISIONING_REPORTED: u8 = 0x00;
    pub const RESOURCE_PROVISIONED: u8 = 0x01;
    pub const THIN_PROVISIONED: u8 = 0x02;
}

/// "The INQUIRY command requests that information regarding the logical unit
/// and SCSI target device be sent to the application client."
///
/// SPC-4 6.6
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Inquiry {
    pub evpd: bool,
    pub page_code: u8,
    pub alloc_len: u16,
}

impl Default for Inquiry {
    fn default() -> Self {
        Self {
            evpd: false,
            page_code: 0,
            alloc_len: 96,
        }
    }
}

impl Inquiry {
    pub const CDB: Layout = Layout::new(
        "Inquiry",
        6,
        &[
            ("opcode", bits(0xff, 0)),
            ("evpd", bits(0x01, 1)),
            ("page_code", bits(0xff, 2)),
            ("alloc_len", bits(0xffff, 3)),
        ],
    );

    /// Standard inquiry data. Only the first 36 bytes are mandatory, shorter
    /// responses decode with the missing fields as zero.
    pub const STANDARD: Layout = Layout::new(
        "standard inquiry data",
        96,
        &[
            ("peripheral_qualifier", bits(0xe0, 0)),
            ("peripheral_device_type", bits(0x1f, 0)),
            ("rmb", bits(0x80, 1)),
            ("version", bits(0xff, 2)),
            ("normaca", bits(0x20, 3)),
            ("hisup", bits(0x10, 3)),
            ("response_data_format", bits(0x0f, 3)),
            ("additional_length", bits(0xff, 4)),
            ("sccs", bits(0x80, 5)),
            ("acc", bits(0x40, 5)),
            ("tpgs", bits(0x30, 5)),
            ("3pc", bits(0x08, 5)),
            ("protect", bits(0x01, 5)),
            ("encserv", bits(0x40, 6)),
            ("vs", bits(0x20, 6)),
            ("multip", bits(0x10, 6)),
            ("addr16", bits(0x01, 6)),
            ("wbus16", bits(0x20, 7)),
            ("sync", bits(0x10, 7)),
            ("cmdque", bits(0x02, 7)),
            ("vs2", bits(0x01, 7)),
            ("t10_vendor_identification", bytes(8, 8)),
            ("product_identification", bytes(16, 16)),
            ("product_revision_level", bytes(32, 4)),
            ("clocking", bits(0x0c, 56)),
            ("qas", bits(0x02, 56)),
            ("ius", bits(0x01, 56)),
        ],
    );

    /// The header shared by every VPD page.
    pub const VPD_HEADER: Layout = Layout::new(
        "VPD page header",
        4,
        &[
            ("peripheral_qualifier", bits(0xe0, 0)),
            ("peripheral_device_type", bits(0x1f, 0)),
            ("page_code", bits(0xff, 1)),
            ("page_length", bits(0xffff, 2)),
        ],
    );

    /// A standard INQUIRY.
    pub fn standard() -> Self {
        Self::default()
    }

    /// An INQUIRY for VPD page `page_code`.
    pub fn vpd(page_code: u8) -> Self {
        Self {
            evpd: true,
            page_code,
            alloc_len: 96,
        }
    }

    pub fn with_alloc_len(mut self, alloc_len: u16) -> Self {
        self.alloc_len = alloc_len;
        self
    }

    /// Decodes `data` as standard inquiry data or as a VPD page.
    pub fn unmarshall_datain(data: &[u8], evpd: bool) -> Result<InquiryData> {
        if !evpd {
            return Ok(InquiryData::Standard(Self::STANDARD.decode_padded(data)?));
        }
        Ok(InquiryData::Vpd(VpdData::unmarshall(data)?))
    }

    pub fn marshall_datain(data: &InquiryData) -> Result<Vec<u8>> {
        match data {
            InquiryData::Standard(record) => Self::STANDARD.encode(record),
            InquiryData::Vpd(vpd) => vpd.marshall(),
        }
    }
}

impl Command for Inquiry {
    const OPCODE: &'static str = "INQUIRY";
    type Output = InquiryData;

    fn cdb(&self, opcode: &Opcode) -> Result<Vec<u8>> {
        let record = Record::new()
            .with("evpd", self.evpd)
            .with("page_code", self.page_code)
            .with("alloc_len", self.alloc_len);
        encode_cdb(&Self::CDB, opcode, &record)
    }

    fn data_in_len(&self) -> Result<usize> {
        Ok(usize::from(self.alloc_len))
    }

    fn unmarshall(&self, data_in: &[u8]) -> Result<InquiryData> {
        Self::unmarshall_datain(data_in, self.evpd)
    }
}

/// Decoded INQUIRY data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InquiryData {
    Standard(Record),
    Vpd(VpdData),
}

impl InquiryData {
    pub fn peripheral_device_type(&self) -> u8 {
        match self {
            InquiryData::Standard(record) => record.int("peripheral_device_type") as u8,
            InquiryData::Vpd(vpd) => vpd.peripheral_device_type,
        }
    }
}

/// A VPD page and the peripheral bits every page starts with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VpdData {
    pub peripheral_qualifier: u8,
    pub peripheral_device_type: u8,
    pub page: VpdPage,
}

/// Fields of the BLOCK LIMITS page, SBC-4 6.6.4.
///
/// `ugavalid` shares byte 32 with the top bit of the alignment, so the
/// alignment is 31 bits wide.
pub const BLOCK_LIMITS: Layout = Layout::new(
    "BLOCK LIMITS",
    64,
    &[
        ("wsnz", bits(0x01, 4)),
        ("max_caw_len", bits(0xff, 5)),
        ("opt_xfer_len_gran", bits(0xffff, 6)),
        ("max_xfer_len", bits(0xffffffff, 8)),
        ("opt_xfer_len", bits(0xffffffff, 12)),
        ("max_pfetch_len", bits(0xffffffff, 16)),
        ("max_unmap_lba_count", bits(0xffffffff, 20)),
        ("max_unmap_bd_count", bits(0xffffffff, 24)),
        ("opt_unmap_gran", bits(0xffffffff, 28)),
        ("ugavalid", bits(0x80, 32)),
        ("unmap_gran_alignment", bits(0x7fffffff, 32)),
        ("max_ws_len", bits(0xffffffffffffffff, 36)),
    ],
);

/// Fields of the BLOCK DEVICE CHARACTERISTICS page, SBC-4 6.6.2.
pub const BLOCK_DEVICE_CHARACTERISTICS: Layout = Layout::new(
    "BLOCK DEVICE CHARACTERISTICS",
    64,
    &[
        ("medium_rotation_rate", bits(0xffff, 4)),
        ("product_type", bits(0xff, 6)),
        ("wabereq", bits(0xc0, 7)),
        ("wacereq", bits(0x30, 7)),
        ("nominal_form_factor", bits(0x0f, 7)),
        ("fuab", bits(0x02, 8)),
        ("vbuls", bits(0x01, 8)),
    ],
);

/// Fields of the LOGICAL BLOCK PROVISIONING page, SBC-4 6.6.6.
pub const LOGICAL_BLOCK_PROVISIONING: Layout = Layout::new(
    "LOGICAL BLOCK PROVISIONING",
    8,
    &[
        ("threshold_exponent", bits(0xff, 4)),
        ("lbpu", bits(0x80, 5)),
        ("lpbws", bits(0x40, 5)),
        ("lbpws10", bits(0x20, 5)),
        ("lbprz", bits(0x04, 5)),
        ("anc_sup", bits(0x02, 5)),
        ("dp", bits(0x01, 5)),
        ("provisioning_type", bits(0x07, 6)),
    ],
);

/// Fields of the REFERRALS page, SBC-4 6.6.7.
pub const REFERRALS: Layout = Layout::new(
    "REFERRALS",
    16,
    &[
        ("user_data_segment_size", bits(0xffffffff, 8)),
        ("user_data_segment_multiplier", bits(0xffffffff, 12)),
    ],
);

/// Fields of the EXTENDED INQUIRY DATA page, SPC-4 7.8.7.
pub const EXTENDED_INQUIRY_DATA: Layout = Layout::new(
    "EXTENDED INQUIRY DATA",
    64,
    &[
        ("activate_microcode", bits(0xc0, 4)),
        ("spt", bits(0x38, 4)),
        ("grd_chk", bits(0x04, 4)),
        ("app_chk", bits(0x02, 4)),
        ("ref_chk", bits(0x01, 4)),
        ("uask_sup", bits(0x20, 5)),
        ("group_sup", bits(0x10, 5)),
        ("prior_sup", bits(0x08, 5)),
        ("headsup", bits(0x04, 5)),
        ("ordsup", bits(0x02, 5)),
        ("simpsup", bits(0x01, 5)),
        ("wu_sup", bits(0x08, 6)),
        ("crd_sup", bits(0x04, 6)),
        ("nv_sup", bits(0x02, 6)),
        ("v_sup", bits(0x01, 6)),
        ("p_i_i_sup", bits(0x10, 7)),
        ("luiclr", bits(0x01, 7)),
        ("r_sup", bits(0x10, 8)),
        ("cbcs", bits(0x01, 8)),
        ("multi_it_nexus_microcode_download", bits(0x0f, 9)),
        ("extended_self_test_completion_minutes", bits(0xffff, 10)),
        ("poa_sup", bits(0x80, 12)),
        ("hra_sup", bits(0x40, 12)),
        ("vsa_sup", bits(0x20, 12)),
        ("maximum_supported_sense_data_length", bits(0xff, 13)),
    ],
);

/// Everything of the ATA INFORMATION page except the IDENTIFY data, SAT-4
/// 12.4.2.
pub const ATA_INFORMATION: Layout = Layout::new(
    "ATA INFORMATION",
    60,
    &[
        ("sat_vendor_identification", bytes(8, 8)),
        ("sat_product_identification", bytes(16, 16)),
        ("sat_product_revision_level", bytes(32, 4)),
        ("command_code", bits(0xff, 56)),
    ],
);

/// The 20-byte device signature at byte 36 of the ATA INFORMATION page: the
/// register device-to-host FIS the device sent after its last reset.
pub const ATA_SIGNATURE: Layout = Layout::new(
    "ATA device signature",
    20,
    &[
        ("transport_identifier", bits(0xff, 0)),
        ("interrupt", bits(0x40, 1)),
        ("pm_port", bits(0x0f, 1)),
        ("status", bits(0xff, 2)),
        ("error", bits(0xff, 3)),
        ("lba_low", bits(0xff, 4)),
        ("lba_mid", bits(0xff, 5)),
        ("lba_high", bits(0xff, 6)),
        ("device", bits(0xff, 7)),
        ("lba_low_exp", bits(0xff, 8)),
        ("lba_mid_exp", bits(0xff, 9)),
        ("lba_high_exp", bits(0xff, 10)),
        ("count", bits(0xff, 12)),
        ("count_exp", bits(0xff, 13)),
    ],
);

const ATA_SIGNATURE_OFFSET: usize = 36;
const ATA_IDENTIFY_OFFSET: usize = 60;
const ATA_IDENTIFY_LEN: usize = 512;

/// The ATA INFORMATION VPD page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AtaInformation {
    /// SAT vendor, product, revision and the IDENTIFY command code.
    pub info: Record,
    pub signature: Record,
    /// 512 bytes of IDENTIFY DEVICE (or IDENTIFY PACKET DEVICE) data.
    pub identify: Vec<u8>,
}

impl AtaInformation {
    /// ATA strings pack two characters per little-endian word, first
    /// character in the high byte. `words` is a range of word indexes.
    fn identify_string(&self, words: std::ops::Range<usize>) -> String {
        let raw = self
            .identify
            .get(words.start * 2..words.end * 2)
            .unwrap_or(&[]);
        let swapped: Vec<u8> = raw.chunks_exact(2).flat_map(|w| [w[1], w[0]]).collect();
        String::from_utf8_lossy(&swapped).trim().to_string()
    }

    /// IDENTIFY words 10 to 19.
    pub fn serial_number(&self) -> String {
        self.identify_string(10..20)
    }

    /// IDENTIFY words 23 to 26.
    pub fn firmware_revision(&self) -> String {
        self.identify_string(23..27)
    }

    /// IDENTIFY words 27 to 46.
    pub fn model_number(&self) -> String {
        self.identify_string(27..47)
    }

    fn unmarshall(page: &[u8]) -> Result<AtaInformation> {
        let info = ATA_INFORMATION.decode_padded(page)?;
        let signature = ATA_SIGNATURE.decode_padded(page.get(ATA_SIGNATURE_OFFSET..).unwrap_or(&[]))?;
        let identify = page
            .get(ATA_IDENTIFY_OFFSET..)
            .map(|d| d[..d.len().min(ATA_IDENTIFY_LEN)].to_vec())
            .unwrap_or_default();
        Ok(AtaInformation {
            info,
            signature,
            identify,
        })
    }

    fn marshall(&self, buf: &mut Vec<u8>) -> Result<()> {
        buf.resize(ATA_IDENTIFY_OFFSET + ATA_IDENTIFY_LEN, 0);
        ATA_INFORMATION.encode_into(&self.info, buf, false)?;
        ATA_SIGNATURE.encode_into(&self.signature, &mut buf[ATA_SIGNATURE_OFFSET..], false)?;
        let n = self.identify.len().min(ATA_IDENTIFY_LEN);
        buf[ATA_IDENTIFY_OFFSET..ATA_IDENTIFY_OFFSET + n].copy_from_slice(&self.identify[..n]);
        Ok(())
    }
}

/// The VPD pages this crate can decode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VpdPage {
    SupportedVpdPages(Vec<u8>),
    UnitSerialNumber(Vec<u8>),
    DeviceIdentification(Vec<DesignationDescriptor>),
    ExtendedInquiryData(Record),
    AtaInformation(AtaInformation),
    BlockLimits(Record),
    BlockDeviceCharacteristics(Record),
    LogicalBlockProvisioning(Record),
    Referrals(Record),
}

impl VpdPage {
    pub fn page_code(&self) -> u8 {
        match self {
            VpdPage::SupportedVpdPages(_) => vpd::SUPPORTED_VPD_PAGES,
            VpdPage::UnitSerialNumber(_) => vpd::UNIT_SERIAL_NUMBER,
            VpdPage::DeviceIdentification(_) => vpd::DEVICE_IDENTIFICATION,
            VpdPage::ExtendedInquiryData(_) => vpd::EXTENDED_INQUIRY_DATA,
            VpdPage::AtaInformation(_) => vpd::ATA_INFORMATION,
            VpdPage::BlockLimits(_) => vpd::BLOCK_LIMITS,
            VpdPage::BlockDeviceCharacteristics(_) => vpd::BLOCK_DEVICE_CHARACTERISTICS,
            VpdPage::LogicalBlockProvisioning(_) => vpd::LOGICAL_BLOCK_PROVISIONING,
            VpdPage::Referrals(_) => vpd::REFERRALS,
        }
    }
}

impl VpdData {
    pub fn unmarshall(data: &[u8]) -> Result<VpdData> {
        let header = Inquiry::VPD_HEADER.decode(data)?;
        // The page ends where PAGE LENGTH says, whatever the allocation was.
        let end = (4 + header.int("page_length") as usize).min(data.len());
        let page = &data[..end];
        let body = &page[4..];
        let page = match header.int("page_code") as u8 {
            vpd::SUPPORTED_VPD_PAGES => VpdPage::SupportedVpdPages(body.to_vec()),
            vpd::UNIT_SERIAL_NUMBER => VpdPage::UnitSerialNumber(body.to_vec()),
            vpd::DEVICE_IDENTIFICATION => {
                let mut descriptors = Vec::new();
                let mut rest = body;
                while !rest.is_empty() {
                    let (descriptor, used) = DesignationDescriptor::unmarshall(rest)?;
                    descriptors.push(descriptor);
                    rest = &rest[used..];
                }
                VpdPage::DeviceIdentification(descriptors)
            }
            vpd::EXTENDED_INQUIRY_DATA => {
                VpdPage::ExtendedInquiryData(EXTENDED_INQUIRY_DATA.decode_padded(page)?)
            }
            vpd::ATA_INFORMATION => VpdPage::AtaInformation(AtaInformation::unmarshall(page)?),
            vpd::BLOCK_LIMITS => VpdPage::BlockLimits(BLOCK_LIMITS.decode_padded(page)?),
            vpd::BLOCK_DEVICE_CHARACTERISTICS => {
                VpdPage::BlockDeviceCharacteristics(BLOCK_DEVICE_CHARACTERISTICS.decode_padded(page)?)
            }
            vpd::LOGICAL_BLOCK_PROVISIONING => {
                VpdPage::LogicalBlockProvisioning(LOGICAL_BLOCK_PROVISIONING.decode_padded(page)?)
            }
            vpd::REFERRALS => VpdPage::Referrals(REFERRALS.decode_padded(page)?),
            code => {
                return Err(Error::Unsupported {
                    what: "VPD page",
                    code: u64::from(code),
                });
            }
        };
        Ok(VpdData {
            peripheral_qualifier: header.int("peripheral_qualifier") as u8,
            peripheral_device_type: header.int("peripheral_device_type") as u8,
            page,
        })
    }

    pub fn marshall(&self) -> Result<Vec<u8>> {
        let mut buf = match &self.page {
            VpdPage::SupportedVpdPages(body) | VpdPage::UnitSerialNumber(body) => {
                let mut buf = vec![0; 4];
                buf.extend_from_slice(body);
                buf
            }
            VpdPage::DeviceIdentification(descriptors) => {
                let mut buf = vec![0; 4];
                for descriptor in descriptors {
                    buf.extend(descriptor.marshall()?);
                }
                buf
            }
            VpdPage::AtaInformation(info) => {
                let mut buf = Vec::new();
                info.marshall(&mut buf)?;
                buf
            }
            VpdPage::ExtendedInquiryData(r) => EXTENDED_INQUIRY_DATA.encode(r)?,
            VpdPage::BlockLimits(r) => BLOCK_LIMITS.encode(r)?,
            VpdPage::BlockDeviceCharacteristics(r) => BLOCK_DEVICE_CHARACTERISTICS.encode(r)?,
            VpdPage::LogicalBlockProvisioning(r) => LOGICAL_BLOCK_PROVISIONING.encode(r)?,
            VpdPage::Referrals(r) => REFERRALS.encode(r)?,
        };
        let page_length = u16::try_from(buf.len() - 4).map_err(|_| Error::InvalidLength {
            field: "page_length",
            value: (buf.len() - 4) as u64,
            expected: "at most 65535",
        })?;
        let header = Record::new()
            .with("peripheral_qualifier", self.peripheral_qualifier)
            .with("peripheral_device_type", self.peripheral_device_type)
            .with("page_code", self.page.page_code())
            .with("page_length", page_length);
        Inquiry::VPD_HEADER.encode_into(&header, &mut buf, false)?;
        Ok(buf)
    }
}

/// The length a VPD page claims for itself, header included. Useful to size
/// a second INQUIRY when the first allocation was too small.
pub fn vpd_page_len(data: &[u8]) -> Result<usize> {
    Ok(4 + length_at(data, 2, 2, "VPD page header")?)
}
