//! MODE SENSE and MODE SELECT, SPC-4 6.13 to 6.16.
//!
//! Mode parameter data is a header (4 bytes for the 6-byte commands, 8 for
//! the 10-byte ones), the block descriptors it announces, then mode pages.
//! Only the first mode page is decoded.

use super::{Command, encode_cdb};
use crate::scsi::error::{Error, Result};
use crate::scsi::field::{Layout, Record, bits};
use crate::scsi::opcode::Opcode;

/// Page control.
pub mod pc {
    pub const CURRENT: u8 = 0x00;
    pub const CHANGEABLE: u8 = 0x01;
    pub const DEFAULT: u8 = 0x02;
    pub const SAVED: u8 = 0x03;
}

pub mod page_code {
    pub const DISCONNECT_RECONNECT: u8 = 0x02;
    pub const CONTROL: u8 = 0x0a;
    pub const POWER_CONDITION: u8 = 0x1a;
    pub const ELEMENT_ADDRESS_ASSIGNMENT: u8 = 0x1d;
    pub const ALL_PAGES: u8 = 0x3f;
}

/// Which pair of commands, and so which header shape, the data belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Variant {
    Mode6,
    Mode10,
}

impl Variant {
    fn header(self) -> &'static Layout {
        match self {
            Variant::Mode6 => &HEADER_6,
            Variant::Mode10 => &HEADER_10,
        }
    }

    /// Bytes of the header not counted by MODE DATA LENGTH.
    fn length_width(self) -> usize {
        match self {
            Variant::Mode6 => 1,
            Variant::Mode10 => 2,
        }
    }
}

pub const HEADER_6: Layout = Layout::new(
    "mode parameter header(6)",
    4,
    &[
        ("mode_data_length", bits(0xff, 0)),
        ("medium_type", bits(0xff, 1)),
        ("device_specific_parameter", bits(0xff, 2)),
        ("block_descriptor_length", bits(0xff, 3)),
    ],
);

pub const HEADER_10: Layout = Layout::new(
    "mode parameter header(10)",
    8,
    &[
        ("mode_data_length", bits(0xffff, 0)),
        ("medium_type", bits(0xff, 2)),
        ("device_specific_parameter", bits(0xff, 3)),
        ("longlba", bits(0x01, 4)),
        ("block_descriptor_length", bits(0xffff, 6)),
    ],
);

/// Page_0 format page header.
const PAGE_0: Layout = Layout::new(
    "page_0 mode page header",
    2,
    &[
        ("ps", bits(0x80, 0)),
        ("spf", bits(0x40, 0)),
        ("page_code", bits(0x3f, 0)),
        ("page_length", bits(0xff, 1)),
    ],
);

/// Sub_page format page header.
const SUB_PAGE: Layout = Layout::new(
    "sub_page mode page header",
    4,
    &[
        ("ps", bits(0x80, 0)),
        ("spf", bits(0x40, 0)),
        ("page_code", bits(0x3f, 0)),
        ("sub_page_code", bits(0xff, 1)),
        ("page_length", bits(0xffff, 2)),
    ],
);

/// SMC-3 7.3.4. Offsets here, and in the page layouts below, count from
/// the first byte after the page header.
pub const ELEMENT_ADDRESS_ASSIGNMENT: Layout = Layout::new(
    "ELEMENT ADDRESS ASSIGNMENT",
    18,
    &[
        ("first_medium_transport_element_address", bits(0xffff, 0)),
        ("num_medium_transport_elements", bits(0xffff, 2)),
        ("first_storage_element_address", bits(0xffff, 4)),
        ("num_storage_elements", bits(0xffff, 6)),
        ("first_import_element_address", bits(0xffff, 8)),
        ("num_import_elements", bits(0xffff, 10)),
        ("first_data_transfer_element_address", bits(0xffff, 12)),
        ("num_data_transfer_elements", bits(0xffff, 14)),
    ],
);

/// SPC-4 7.5.8
pub const CONTROL: Layout = Layout::new(
    "CONTROL",
    10,
    &[
        ("tst", bits(0xe0, 0)),
        ("tmf_only", bits(0x10, 0)),
        ("dpicz", bits(0x08, 0)),
        ("d_sense", bits(0x04, 0)),
        ("gltsd", bits(0x02, 0)),
        ("rlec", bits(0x01, 0)),
        ("queue_algorithm_modifier", bits(0xf0, 1)),
        ("nuar", bits(0x08, 1)),
        ("qerr", bits(0x06, 1)),
        ("vs", bits(0x80, 2)),
        ("rac", bits(0x40, 2)),
        ("ua_intlck_ctrl", bits(0x30, 2)),
        ("swp", bits(0x08, 2)),
        ("ato", bits(0x80, 3)),
        ("tas", bits(0x40, 3)),
        ("atmpe", bits(0x20, 3)),
        ("rwwp", bits(0x10, 3)),
        ("autoload_mode", bits(0x07, 3)),
        ("busy_timeout_period", bits(0xffff, 6)),
        ("extended_self_test_completion_time", bits(0xffff, 8)),
    ],
);

/// SPC-4 7.5.9
pub const CONTROL_EXTENSION_1: Layout = Layout::new(
    "CONTROL EXTENSION",
    28,
    &[
        ("tcmos", bits(0x04, 0)),
        ("scsip", bits(0x02, 0)),
        ("ialuae", bits(0x01, 0)),
        ("initial_command_priority", bits(0x0f, 1)),
        ("maximum_sense_data_length", bits(0xff, 2)),
    ],
);

/// SPC-4 7.5.10
pub const DISCONNECT_RECONNECT: Layout = Layout::new(
    "DISCONNECT-RECONNECT",
    14,
    &[
        ("buffer_full_ratio", bits(0xff, 0)),
        ("buffer_empty_ratio", bits(0xff, 1)),
        ("bus_inactivity_limit", bits(0xffff, 2)),
        ("disconnect_time_limit", bits(0xffff, 4)),
        ("connect_time_limit", bits(0xffff, 6)),
        ("maximum_burst_size", bits(0xffff, 8)),
        ("emdp", bits(0x80, 10)),
        ("fair_arbitration", bits(0x70, 10)),
        ("dimm", bits(0x08, 10)),
        ("dtdc", bits(0x07, 10)),
        ("first_burst_size", bits(0xffff, 12)),
    ],
);

/// SPC-4 7.5.14
pub const POWER_CONDITION: Layout = Layout::new(
    "POWER CONDITION",
    38,
    &[
        ("pm_bg_precedence", bits(0xc0, 0)),
        ("standby_y", bits(0x01, 0)),
        ("idle_c", bits(0x08, 1)),
        ("idle_b", bits(0x04, 1)),
        ("idle_a", bits(0x02, 1)),
        ("standby_z", bits(0x01, 1)),
        ("idle_a_condition_timer", bits(0xffffffff, 2)),
        ("standby_z_condition_timer", bits(0xffffffff, 6)),
        ("idle_b_condition_timer", bits(0xffffffff, 10)),
        ("idle_c_condition_timer", bits(0xffffffff, 14)),
        ("standby_y_condition_timer", bits(0xffffffff, 18)),
        ("ccf_idle", bits(0xc0, 37)),
        ("ccf_standby", bits(0x30, 37)),
        ("ccf_stopped", bits(0x0c, 37)),
    ],
);

/// The parameters of a mode page, by page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModePageData {
    ElementAddressAssignment(Record),
    Control(Record),
    ControlExtension1(Record),
    DisconnectReconnect(Record),
    PowerCondition(Record),
    /// A page without a field table, kept as its raw parameter bytes.
    Other(Vec<u8>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModePage {
    /// Parameters saveable.
    pub ps: bool,
    pub page_code: u8,
    /// Set for pages in sub_page format.
    pub sub_page_code: Option<u8>,
    pub data: ModePageData,
}

impl ModePage {
    fn unmarshall(data: &[u8]) -> Result<ModePage> {
        let spf = data.first().is_some_and(|b| b & 0x40 != 0);
        let (header, header_len) = if spf {
            (SUB_PAGE.decode(data)?, SUB_PAGE.size)
        } else {
            (PAGE_0.decode(data)?, PAGE_0.size)
        };
        let page_code = header.int("page_code") as u8;
        let sub_page_code = spf.then(|| header.int("sub_page_code") as u8);
        // A device may cut the page short at the allocation length.
        let end = (header_len + header.int("page_length") as usize).min(data.len());
        let body = &data[header_len..end];
        let data = match (page_code, sub_page_code) {
            (page_code::ELEMENT_ADDRESS_ASSIGNMENT, None) => {
                ModePageData::ElementAddressAssignment(ELEMENT_ADDRESS_ASSIGNMENT.decode_padded(body)?)
            }
            (page_code::CONTROL, None) => ModePageData::Control(CONTROL.decode_padded(body)?),
            (page_code::CONTROL, Some(1)) => {
                ModePageData::ControlExtension1(CONTROL_EXTENSION_1.decode_padded(body)?)
            }
            (page_code::DISCONNECT_RECONNECT, None) => {
                ModePageData::DisconnectReconnect(DISCONNECT_RECONNECT.decode_padded(body)?)
            }
            (page_code::POWER_CONDITION, None) => {
                ModePageData::PowerCondition(POWER_CONDITION.decode_padded(body)?)
            }
            _ => ModePageData::Other(body.to_vec()),
        };
        Ok(ModePage {
            ps: header.int("ps") != 0,
            page_code,
            sub_page_code,
            data,
        })
    }

    fn marshall(&self) -> Result<Vec<u8>> {
        let body = match &self.data {
            ModePageData::ElementAddressAssignment(r) => ELEMENT_ADDRESS_ASSIGNMENT.encode(r)?,
            ModePageData::Control(r) => CONTROL.encode(r)?,
            ModePageData::ControlExtension1(r) => CONTROL_EXTENSION_1.encode(r)?,
            ModePageData::DisconnectReconnect(r) => DISCONNECT_RECONNECT.encode(r)?,
            ModePageData::PowerCondition(r) => POWER_CONDITION.encode(r)?,
            ModePageData::Other(raw) => raw.clone(),
        };
        let mut header = Record::new()
            .with("ps", self.ps)
            .with("page_code", self.page_code)
            .with("page_length", body.len());
        let mut buf = match self.sub_page_code {
            None => {
                if body.len() > 0xff {
                    return Err(Error::InvalidLength {
                        field: "page_length",
                        value: body.len() as u64,
                        expected: "at most 255 for a page_0 format page",
                    });
                }
                PAGE_0.encode(&header)?
            }
            Some(sub_page_code) => {
                header.insert("spf", true);
                header.insert("sub_page_code", sub_page_code);
                SUB_PAGE.encode(&header)?
            }
        };
        buf.extend(body);
        Ok(buf)
    }
}

/// Decoded mode parameter data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModeParameters {
    /// Mode parameter header fields.
    pub header: Record,
    pub block_descriptors: Vec<u8>,
    /// The first mode page, if the data held any.
    pub page: Option<ModePage>,
}

impl ModeParameters {
    pub fn unmarshall(data: &[u8], variant: Variant) -> Result<ModeParameters> {
        let layout = variant.header();
        let header = layout.decode(data)?;
        // Anything past MODE DATA LENGTH is allocation slack.
        let total = (header.int("mode_data_length") as usize + variant.length_width()).max(layout.size);
        let data = &data[..total.min(data.len())];
        let bdl = header.int("block_descriptor_length") as usize;
        let start = layout.size + bdl;
        let block_descriptors = data
            .get(layout.size..start)
            .ok_or_else(|| Error::truncated("block descriptors", start, data.len()))?
            .to_vec();
        let rest = &data[start..];
        let page = if rest.is_empty() {
            None
        } else {
            Some(ModePage::unmarshall(rest)?)
        };
        Ok(ModeParameters {
            header,
            block_descriptors,
            page,
        })
    }

    /// Lays out the parameter data with MODE DATA LENGTH and BLOCK
    /// DESCRIPTOR LENGTH computed from the contents.
    pub fn marshall(&self, variant: Variant) -> Result<Vec<u8>> {
        let layout = variant.header();
        let mut buf = vec![0; layout.size];
        buf.extend_from_slice(&self.block_descriptors);
        if let Some(page) = &self.page {
            buf.extend(page.marshall()?);
        }
        let mode_data_length = buf.len() - variant.length_width();
        let limit = match variant {
            Variant::Mode6 => 0xff,
            Variant::Mode10 => 0xffff,
        };
        if mode_data_length > limit || self.block_descriptors.len() > limit {
            return Err(Error::InvalidLength {
                field: "mode_data_length",
                value: mode_data_length as u64,
                expected: "within the header's length field",
            });
        }
        let mut header = self.header.clone();
        header.insert("mode_data_length", mode_data_length);
        header.insert("block_descriptor_length", self.block_descriptors.len());
        layout.encode_into(&header, &mut buf, false)?;
        Ok(buf)
    }

    /// Parameter list for MODE SELECT, where MODE DATA LENGTH is reserved.
    fn marshall_dataout(&self, variant: Variant) -> Result<Vec<u8>> {
        let mut buf = self.marshall(variant)?;
        buf[..variant.length_width()].fill(0);
        Ok(buf)
    }
}

/// MODE SENSE(6), SPC-4 6.13
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModeSense6 {
    pub page_code: u8,
    pub sub_page_code: u8,
    pub dbd: bool,
    pub pc: u8,
    pub alloc_len: u8,
}

impl ModeSense6 {
    pub const CDB: Layout = Layout::new(
        "ModeSense6",
        6,
        &[
            ("opcode", bits(0xff, 0)),
            ("dbd", bits(0x08, 1)),
            ("pc", bits(0xc0, 2)),
            ("page_code", bits(0x3f, 2)),
            ("sub_page_code", bits(0xff, 3)),
            ("alloc_len", bits(0xff, 4)),
        ],
    );

    pub fn new(page_code: u8) -> Self {
        Self {
            page_code,
            sub_page_code: 0,
            dbd: false,
            pc: pc::CURRENT,
            alloc_len: 96,
        }
    }

    pub fn unmarshall_datain(data: &[u8]) -> Result<ModeParameters> {
        ModeParameters::unmarshall(data, Variant::Mode6)
    }

    pub fn marshall_datain(data: &ModeParameters) -> Result<Vec<u8>> {
        data.marshall(Variant::Mode6)
    }
}

impl Command for ModeSense6 {
    const OPCODE: &'static str = "MODE_SENSE_6";
    type Output = ModeParameters;

    fn cdb(&self, opcode: &Opcode) -> Result<Vec<u8>> {
        let record = Record::new()
            .with("dbd", self.dbd)
            .with("pc", self.pc)
            .with("page_code", self.page_code)
            .with("sub_page_code", self.sub_page_code)
            .with("alloc_len", self.alloc_len);
        encode_cdb(&Self::CDB, opcode, &record)
    }

    fn data_in_len(&self) -> Result<usize> {
        Ok(usize::from(self.alloc_len))
    }

    fn unmarshall(&self, data_in: &[u8]) -> Result<ModeParameters> {
        Self::unmarshall_datain(data_in)
    }
}

/// MODE SENSE(10), SPC-4 6.14
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModeSense10 {
    pub page_code: u8,
    pub sub_page_code: u8,
    pub llbaa: bool,
    pub dbd: bool,
    pub pc: u8,
    pub alloc_len: u16,
}

impl ModeSense10 {
    pub const CDB: Layout = Layout::new(
        "ModeSense10",
        10,
        &[
            ("opcode", bits(0xff, 0)),
            ("llbaa", bits(0x10, 1)),
            ("dbd", bits(0x08, 1)),
            ("pc", bits(0xc0, 2)),
            ("page_code", bits(0x3f, 2)),
            ("sub_page_code", bits(0xff, 3)),
            ("alloc_len", bits(0xffff, 7)),
        ],
    );

    pub fn new(page_code: u8) -> Self {
        Self {
            page_code,
            sub_page_code: 0,
            llbaa: false,
            dbd: false,
            pc: pc::CURRENT,
            alloc_len: 96,
        }
    }

    pub fn unmarshall_datain(data: &[u8]) -> Result<ModeParameters> {
        ModeParameters::unmarshall(data, Variant::Mode10)
    }

    pub fn marshall_datain(data: &ModeParameters) -> Result<Vec<u8>> {
        data.marshall(Variant::Mode10)
    }
}

impl Command for ModeSense10 {
    const OPCODE: &'static str = "MODE_SENSE_10";
    type Output = ModeParameters;

    fn cdb(&self, opcode: &Opcode) -> Result<Vec<u8>> {
        let record = Record::new()
            .with("llbaa", self.llbaa)
            .with("dbd", self.dbd)
            .with("pc", self.pc)
            .with("page_code", self.page_code)
            .with("sub_page_code", self.sub_page_code)
            .with("alloc_len", self.alloc_len);
        encode_cdb(&Self::CDB, opcode, &record)
    }

    fn data_in_len(&self) -> Result<usize> {
        Ok(usize::from(self.alloc_len))
    }

    fn unmarshall(&self, data_in: &[u8]) -> Result<ModeParameters> {
        Self::unmarshall_datain(data_in)
    }
}

macro_rules! mode_select {
    ($name:ident, $opcode:literal, $size:literal, $variant:expr, $len_mask:literal, $len_offset:literal) => {
        /// Sends one mode page (and any block descriptors) to the device.
        #[derive(Clone, Debug, PartialEq, Eq)]
        pub struct $name {
            pub parameters: ModeParameters,
            /// Page format.
            pub pf: bool,
            /// Save pages.
            pub sp: bool,
        }

        impl $name {
            pub const CDB: Layout = Layout::new(
                stringify!($name),
                $size,
                &[
                    ("opcode", bits(0xff, 0)),
                    ("pf", bits(0x10, 1)),
                    ("sp", bits(0x01, 1)),
                    ("parameter_list_length", bits($len_mask, $len_offset)),
                ],
            );

            pub fn new(parameters: ModeParameters) -> Self {
                Self {
                    parameters,
                    pf: true,
                    sp: false,
                }
            }

            pub fn marshall_dataout(parameters: &ModeParameters) -> Result<Vec<u8>> {
                parameters.marshall_dataout($variant)
            }
        }

        impl Command for $name {
            const OPCODE: &'static str = $opcode;
            type Output = ();

            fn cdb(&self, opcode: &Opcode) -> Result<Vec<u8>> {
                let record = Record::new()
                    .with("pf", self.pf)
                    .with("sp", self.sp)
                    .with("parameter_list_length", self.data_out()?.len());
                encode_cdb(&Self::CDB, opcode, &record)
            }

            fn data_out(&self) -> Result<Vec<u8>> {
                Self::marshall_dataout(&self.parameters)
            }

            fn unmarshall(&self, _: &[u8]) -> Result<()> {
                Ok(())
            }
        }
    };
}

mode_select!(ModeSelect6, "MODE_SELECT_6", 6, Variant::Mode6, 0xff, 4);
mode_select!(ModeSelect10, "MODE_SELECT_10", 10, Variant::Mode10, 0xffff, 7);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scsi::opcode::{SMC, SPC};

    fn element_address_page() -> ModePage {
        ModePage {
            ps: true,
            page_code: page_code::ELEMENT_ADDRESS_ASSIGNMENT,
            sub_page_code: None,
            data: ModePageData::ElementAddressAssignment(
                Record::new()
                    .with("first_medium_transport_element_address", 1u16)
                    .with("num_medium_transport_elements", 1u16)
                    .with("first_storage_element_address", 0x400u16)
                    .with("num_storage_elements", 24u16)
                    .with("first_import_element_address", 0x10u16)
                    .with("num_import_elements", 1u16)
                    .with("first_data_transfer_element_address", 0x100u16)
                    .with("num_data_transfer_elements", 2u16),
            ),
        }
    }

    #[test]
    fn sense_6_cdb() {
        let mut cmd = ModeSense6::new(page_code::CONTROL);
        cmd.pc = pc::DEFAULT;
        cmd.dbd = true;
        cmd.sub_page_code = 1;
        let cdb = cmd.cdb(SPC.get("MODE_SENSE_6").unwrap()).unwrap();
        assert_eq!(cdb, [0x1a, 0x08, 0x8a, 0x01, 0x60, 0x00]);
    }

    #[test]
    fn sense_10_cdb() {
        let mut cmd = ModeSense10::new(page_code::ALL_PAGES);
        cmd.llbaa = true;
        cmd.alloc_len = 0x1000;
        let cdb = cmd.cdb(SPC.get("MODE_SENSE_10").unwrap()).unwrap();
        assert_eq!(cdb, [0x5a, 0x10, 0x3f, 0x00, 0, 0, 0, 0x10, 0x00, 0]);
        let record = ModeSense10::CDB.decode(&cdb).unwrap();
        assert_eq!(record.int("llbaa"), 1);
        assert_eq!(record.int("alloc_len"), 0x1000);
    }

    #[test]
    fn element_address_assignment_6() {
        let params = ModeParameters {
            header: Record::new()
                .with("medium_type", 0u8)
                .with("device_specific_parameter", 0u8),
            block_descriptors: Vec::new(),
            page: Some(element_address_page()),
        };
        let data = ModeSense6::marshall_datain(&params).unwrap();
        assert_eq!(data.len(), 4 + 2 + 18);
        assert_eq!(data[0], 23);
        assert_eq!(data[4..6], [0x9d, 18]);
        assert_eq!(data[10..12], [0x04, 0x00]);

        // allocation slack past MODE DATA LENGTH is ignored
        let mut padded = data.clone();
        padded.resize(96, 0);
        let decoded = ModeSense6::unmarshall_datain(&padded).unwrap();
        assert_eq!(decoded.page, params.page);
        assert_eq!(decoded.header.int("mode_data_length"), 23);
        assert_eq!(ModeSense6::marshall_datain(&decoded).unwrap(), data);
    }

    #[test]
    fn control_extension_10_with_block_descriptor() {
        let params = ModeParameters {
            header: Record::new()
                .with("medium_type", 0u8)
                .with("device_specific_parameter", 0x10u8)
                .with("longlba", 0u8),
            block_descriptors: vec![0, 0, 0, 0, 0, 0, 0x02, 0x00],
            page: Some(ModePage {
                ps: false,
                page_code: page_code::CONTROL,
                sub_page_code: Some(1),
                data: ModePageData::ControlExtension1(
                    Record::new()
                        .with("tcmos", 1u8)
                        .with("scsip", 0u8)
                        .with("ialuae", 1u8)
                        .with("initial_command_priority", 5u8)
                        .with("maximum_sense_data_length", 252u8),
                ),
            }),
        };
        let data = ModeSense10::marshall_datain(&params).unwrap();
        assert_eq!(data.len(), 8 + 8 + 4 + 28);
        assert_eq!(data[..2], [0, 46]);
        assert_eq!(data[6..8], [0, 8]);
        assert_eq!(data[16..20], [0x4a, 0x01, 0x00, 28]);
        assert_eq!(data[20..23], [0x05, 0x05, 252]);

        let decoded = ModeSense10::unmarshall_datain(&data).unwrap();
        assert_eq!(decoded.block_descriptors, params.block_descriptors);
        assert_eq!(decoded.page, params.page);
        assert_eq!(decoded.header.int("device_specific_parameter"), 0x10);
    }

    #[test]
    fn control_and_disconnect_reconnect() {
        let control = [
            0x0a, 0x0a, 0x04, 0x10, 0x00, 0x40, 0, 0, 0x01, 0x00, 0x00, 0x3c,
        ];
        let mut data = vec![3 + control.len() as u8, 0, 0, 0];
        data.extend(control);
        let decoded = ModeSense6::unmarshall_datain(&data).unwrap();
        let page = decoded.page.unwrap();
        let ModePageData::Control(r) = &page.data else {
            panic!("expected CONTROL, got {:?}", page.data);
        };
        assert_eq!(r.int("d_sense"), 1);
        assert_eq!(r.int("queue_algorithm_modifier"), 1);
        assert_eq!(r.int("tas"), 1);
        assert_eq!(r.int("busy_timeout_period"), 0x0100);
        assert_eq!(r.int("extended_self_test_completion_time"), 0x3c);

        let mut body = vec![0u8; 14];
        body[0] = 0x80;
        body[10] = 0xb5;
        let mut data = vec![0, 0, 0, 0, 0, 0, 0, 0, 0x02, 14];
        data.extend(&body);
        data[1] = (data.len() - 2) as u8;
        let decoded = ModeSense10::unmarshall_datain(&data).unwrap();
        let ModePageData::DisconnectReconnect(r) = decoded.page.unwrap().data else {
            panic!("expected DISCONNECT-RECONNECT");
        };
        assert_eq!(r.int("buffer_full_ratio"), 0x80);
        assert_eq!(r.int("emdp"), 1);
        assert_eq!(r.int("fair_arbitration"), 3);
        assert_eq!(r.int("dimm"), 0);
        assert_eq!(r.int("dtdc"), 5);
    }

    #[test]
    fn power_condition() {
        let mut body = vec![0u8; 38];
        body[0] = 0x41;
        body[1] = 0x0e;
        body[2..6].copy_from_slice(&20u32.to_be_bytes());
        body[18..22].copy_from_slice(&600u32.to_be_bytes());
        body[37] = 0x94;
        let mut data = vec![0, 0, 0, 0, 0x9a, 0x26];
        data.extend(&body);
        data[0] = (data.len() - 1) as u8;
        let decoded = ModeSense6::unmarshall_datain(&data).unwrap();
        let page = decoded.page.clone().unwrap();
        assert!(page.ps);
        let ModePageData::PowerCondition(r) = &page.data else {
            panic!("expected POWER CONDITION");
        };
        assert_eq!(r.int("pm_bg_precedence"), 1);
        assert_eq!(r.int("standby_y"), 1);
        assert_eq!(r.int("idle_c"), 1);
        assert_eq!(r.int("idle_a"), 1);
        assert_eq!(r.int("idle_a_condition_timer"), 20);
        assert_eq!(r.int("standby_y_condition_timer"), 600);
        assert_eq!(r.int("ccf_idle"), 2);
        assert_eq!(r.int("ccf_standby"), 1);
        assert_eq!(r.int("ccf_stopped"), 1);
        assert_eq!(ModeSense6::marshall_datain(&decoded).unwrap(), data);
    }

    #[test]
    fn unknown_page_kept_raw() {
        let data = [9, 0, 0, 0, 0x1c, 0x04, 1, 2, 3, 4];
        let decoded = ModeSense6::unmarshall_datain(&data).unwrap();
        let page = decoded.page.clone().unwrap();
        assert_eq!(page.data, ModePageData::Other(vec![1, 2, 3, 4]));
        assert_eq!(ModeSense6::marshall_datain(&decoded).unwrap(), data);
    }

    #[test]
    fn header_only() {
        let decoded = ModeSense6::unmarshall_datain(&[3, 0, 0x80, 0]).unwrap();
        assert_eq!(decoded.header.int("device_specific_parameter"), 0x80);
        assert!(decoded.page.is_none());
    }

    #[test]
    fn block_descriptors_past_the_end() {
        assert!(matches!(
            ModeSense6::unmarshall_datain(&[11, 0, 0, 8, 0, 0]),
            Err(Error::Truncated { what: "block descriptors", .. })
        ));
    }

    #[test]
    fn select() {
        let params = ModeParameters {
            header: Record::new(),
            block_descriptors: Vec::new(),
            page: Some(element_address_page()),
        };
        let cmd = ModeSelect6::new(params.clone());
        let cdb = cmd.cdb(SMC.get("MODE_SELECT_6").unwrap()).unwrap();
        assert_eq!(cdb, [0x15, 0x10, 0, 0, 24, 0]);
        let data_out = cmd.data_out().unwrap();
        assert_eq!(data_out[0], 0);
        assert_eq!(data_out[4], 0x9d);

        let mut cmd = ModeSelect10::new(params);
        cmd.sp = true;
        let cdb = cmd.cdb(SMC.get("MODE_SELECT_10").unwrap()).unwrap();
        assert_eq!(cdb, [0x55, 0x11, 0, 0, 0, 0, 0, 0, 28, 0]);
        assert_eq!(cmd.data_out().unwrap()[..2], [0, 0]);
        let record = ModeSelect10::CDB.decode(&cdb).unwrap();
        assert_eq!(record.int("parameter_list_length"), 28);
    }
}
