//! Operation code tables for each SCSI command set.
//!
//! The same opcode value can mean different things on different device types
//! (0x1b is START STOP UNIT on a disk and LOAD UNLOAD on a tape), so commands
//! resolve their opcode by name against the [`OpcodeSet`] of the device they
//! are issued to. The set is chosen once per device from the
//! `PERIPHERAL DEVICE TYPE` of a standard INQUIRY.

use super::error::{Error, Result};

/// A single operation code and the service actions it multiplexes.
#[derive(Debug, PartialEq, Eq)]
pub struct Opcode {
    pub name: &'static str,
    pub value: u8,
    pub service_actions: &'static [(&'static str, u8)],
}

impl Opcode {
    pub fn service_action(&self, name: &'static str) -> Result<u8> {
        self.service_actions
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, code)| *code)
            .ok_or(Error::UnknownServiceAction {
                opcode: self.name,
                name,
            })
    }
}

/// The opcodes understood by one device class.
#[derive(Debug, PartialEq, Eq)]
pub struct OpcodeSet {
    pub name: &'static str,
    pub opcodes: &'static [Opcode],
}

impl OpcodeSet {
    pub fn get(&self, name: &'static str) -> Result<&'static Opcode> {
        self.opcodes
            .iter()
            .find(|op| op.name == name)
            .ok_or(Error::UnknownOpcode {
                name,
                set: self.name,
            })
    }

    /// Picks the opcode set for a `PERIPHERAL DEVICE TYPE`.
    pub fn for_device_type(device_type: u8) -> &'static OpcodeSet {
        match device_type {
            0x00 | 0x04 | 0x07 | 0x0e => &SBC,
            0x01 | 0x02 | 0x09 => &SSC,
            0x05 => &MMC,
            0x08 => &SMC,
            _ => &SPC,
        }
    }
}

/// Length of the CDB for an opcode, by its group code (SPC-4 4.2.5.1).
pub fn cdb_size(opcode: u8) -> Result<usize> {
    match opcode {
        0x00..=0x1f => Ok(6),
        0x20..=0x5f => Ok(10),
        0x80..=0x9f => Ok(16),
        0xa0..=0xbf => Ok(12),
        _ => Err(Error::OpcodeClass(opcode)),
    }
}

/// A zeroed CDB of the right size with the opcode in byte 0.
pub fn init_cdb(opcode: u8) -> Result<Vec<u8>> {
    let mut cdb = vec![0; cdb_size(opcode)?];
    cdb[0] = opcode;
    Ok(cdb)
}

/// SAM status codes.
pub mod status {
    pub const GOOD: u8 = 0x00;
    pub const CHECK_CONDITION: u8 = 0x02;
    pub const CONDITIONS_MET: u8 = 0x04;
    pub const BUSY: u8 = 0x08;
    pub const RESERVATION_CONFLICT: u8 = 0x18;
    pub const TASK_SET_FULL: u8 = 0x28;
    pub const ACA_ACTIVE: u8 = 0x30;
    pub const TASK_ABORTED: u8 = 0x40;
}

const fn op(
    name: &'static str,
    value: u8,
    service_actions: &'static [(&'static str, u8)],
) -> Opcode {
    Opcode {
        name,
        value,
        service_actions,
    }
}

const NONE: &[(&str, u8)] = &[];

pub const SA_MAINTENANCE_IN: &[(&str, u8)] = &[
    ("REPORT_ASSIGNED_UNASSIGNED_P_EXTENT", 0x00),
    ("REPORT_COMPONENT_DEVICE", 0x01),
    ("REPORT_COMPONENT_DEVICE_ATTACHMENTS", 0x02),
    ("REPORT_PERIPHERAL_DEVICE", 0x03),
    ("REPORT_PERIPHERAL_DEVICE_ASSOCIATIONS", 0x04),
    ("REPORT_IDENTIFYING_INFORMATION", 0x05),
    ("REPORT_STATES", 0x06),
    ("REPORT_DEVICE_IDENTIFICATION", 0x07),
    ("REPORT_UNCONFIGURED_CAPACITY", 0x08),
    ("REPORT_SUPPORTED_CONFIGURATION_METHOD", 0x09),
    ("REPORT_TARGET_PORT_GROUPS", 0x0a),
    ("REPORT_ALIASES", 0x0b),
    ("REPORT_SUPPORTED_OPERATION_CODES", 0x0c),
    ("REPORT_SUPPORTED_TASK_MANAGEMENT_FUNCTIONS", 0x0d),
    ("REPORT_PRIORITY", 0x0e),
    ("REPORT_TIMESTAMP", 0x0f),
];

pub const SA_MAINTENANCE_OUT: &[(&str, u8)] = &[
    ("ADD_PERIPHERAL_DEVICE_COMPONENT_DEVICE", 0x00),
    ("ATTACH_TO_COMPONENT_DEVICE", 0x01),
    ("EXCHANGE_P_EXTENT", 0x02),
    ("EXCHANGE_PERIPHERAL_DEVICE_COMPONENT_DEVICE", 0x03),
    ("INSTRUCT_COMPONENT_DEVICE", 0x04),
    ("REMOVE_PERIPHERAL_DEVICE_COMPONENT_DEVICE", 0x05),
    ("SET_IDENTIFYING_INFORMATION", 0x06),
    ("BREAK_PERIPHERAL_DEVICE_COMPONENT_DEVICE", 0x07),
    ("SET_TARGET_PORT_GROUPS", 0x0a),
    ("CHANGE_ALIASES", 0x0b),
    ("SET_PRIORITY", 0x0e),
    ("SET_TIMESTAMP", 0x0f),
];

pub const SA_SERVICE_ACTION_IN_16: &[(&str, u8)] = &[
    ("READ_CAPACITY_16", 0x10),
    ("READ_LONG_16", 0x11),
    ("GET_LBA_STATUS", 0x12),
    ("REPORT_REFERRALS", 0x13),
];

pub const SA_SERVICE_ACTION_OUT_16: &[(&str, u8)] = &[("WRITE_LONG_16", 0x11)];

pub const SA_VARIABLE_LENGTH: &[(&str, u8)] = &[
    ("XDREAD_32", 0x03),
    ("XDWRITE_32", 0x04),
    ("XPWRITE_32", 0x06),
    ("XDWRITEREAD_32", 0x07),
    ("READ_32", 0x09),
    ("VERIFY_32", 0x0a),
    ("WRITE_32", 0x0b),
    ("WRITE_AND_VERIFY_32", 0x0c),
    ("WRITE_SAME_32", 0x0d),
    ("ORWRITE_32", 0x0e),
];

pub const SA_PERSISTENT_RESERVE_IN: &[(&str, u8)] = &[
    ("READ_KEYS", 0x00),
    ("READ_RESERVATION", 0x01),
    ("REPORT_CAPABILITIES", 0x02),
    ("READ_FULL_STATUS", 0x03),
];

pub const SA_PERSISTENT_RESERVE_OUT: &[(&str, u8)] = &[
    ("REGISTER", 0x00),
    ("RESERVE", 0x01),
    ("RELEASE", 0x02),
    ("CLEAR", 0x03),
    ("PREEMPT", 0x04),
    ("PREEMPT_AND_ABORT", 0x05),
    ("REGISTER_AND_IGNORE_EXISTING_KEY", 0x06),
    ("REGISTER_AND_MOVE", 0x07),
    ("REPLACE_LOST_REGISTRATION", 0x08),
];

pub const SA_EXTENDED_COPY: &[(&str, u8)] = &[("EXTENDED_COPY_LID1", 0x00), ("EXTENDED_COPY", 0x01)];

pub const SA_IMPORT_EXPORT: &[(&str, u8)] = &[
    ("OPEN_IMPORTEXPORT_ELEMENT", 0x00),
    ("CLOSE_IMPORTEXPORT_ELEMENT", 0x01),
];

pub const SA_READ_MEDIA_SERIAL_NUMBER: &[(&str, u8)] = &[("READ_MEDIA_SERIAL_NUMBER", 0x01)];

/// SCSI Primary Commands, used for device types without a more specific set.
pub static SPC: OpcodeSet = OpcodeSet {
    name: "spc",
    opcodes: &[
        op("TEST_UNIT_READY", 0x00, NONE),
        op("REQUEST_SENSE", 0x03, NONE),
        op("INQUIRY", 0x12, NONE),
        op("MODE_SELECT_6", 0x15, NONE),
        op("MODE_SENSE_6", 0x1a, NONE),
        op("RECEIVE_DIAGNOSTIC_RESULTS", 0x1c, NONE),
        op("SEND_DIAGNOSTIC", 0x1d, NONE),
        op("PREVENT_ALLOW_MEDIUM_REMOVAL", 0x1e, NONE),
        op("WRITE_BUFFER", 0x3b, NONE),
        op("READ_BUFFER_10", 0x3c, NONE),
        op("LOG_SELECT", 0x4c, NONE),
        op("LOG_SENSE", 0x4d, NONE),
        op("MODE_SELECT_10", 0x55, NONE),
        op("MODE_SENSE_10", 0x5a, NONE),
        op("PERSISTENT_RESERVE_IN", 0x5e, SA_PERSISTENT_RESERVE_IN),
        op("PERSISTENT_RESERVE_OUT", 0x5f, SA_PERSISTENT_RESERVE_OUT),
        op("EXTENDED_COPY", 0x83, SA_EXTENDED_COPY),
        op("RECEIVE_COPY_RESULTS", 0x84, NONE),
        op("ACCESS_CONTROL_IN", 0x86, NONE),
        op("ACCESS_CONTROL_OUT", 0x87, NONE),
        op("READ_ATTRIBUTE", 0x8c, NONE),
        op("WRITE_ATTRIBUTE", 0x8d, NONE),
        op("READ_BUFFER_16", 0x9b, NONE),
        op("REPORT_LUNS", 0xa0, NONE),
        op("MAINTENANCE_IN", 0xa3, SA_MAINTENANCE_IN),
        op("MAINTENANCE_OUT", 0xa4, SA_MAINTENANCE_OUT),
        op("READ_MEDIA_SERIAL_NUMBER", 0xab, SA_READ_MEDIA_SERIAL_NUMBER),
    ],
};

/// SCSI Block Commands: disks, write-once and optical memory devices.
pub static SBC: OpcodeSet = OpcodeSet {
    name: "sbc",
    opcodes: &[
        op("TEST_UNIT_READY", 0x00, NONE),
        op("REQUEST_SENSE", 0x03, NONE),
        op("FORMAT_UNIT", 0x04, NONE),
        op("REASSIGN_BLOCKS", 0x07, NONE),
        op("READ_6", 0x08, NONE),
        op("WRITE_6", 0x0a, NONE),
        op("INQUIRY", 0x12, NONE),
        op("MODE_SELECT_6", 0x15, NONE),
        op("MODE_SENSE_6", 0x1a, NONE),
        op("START_STOP_UNIT", 0x1b, NONE),
        op("RECEIVE_DIAGNOSTIC_RESULTS", 0x1c, NONE),
        op("SEND_DIAGNOSTIC", 0x1d, NONE),
        op("PREVENT_ALLOW_MEDIUM_REMOVAL", 0x1e, NONE),
        op("READ_CAPACITY_10", 0x25, NONE),
        op("READ_10", 0x28, NONE),
        op("WRITE_10", 0x2a, NONE),
        op("WRITE_AND_VERIFY_10", 0x2e, NONE),
        op("VERIFY_10", 0x2f, NONE),
        op("PRE_FETCH_10", 0x34, NONE),
        op("SYNCHRONIZE_CACHE_10", 0x35, NONE),
        op("READ_DEFECT_DATA_10", 0x37, NONE),
        op("WRITE_BUFFER", 0x3b, NONE),
        op("READ_BUFFER_10", 0x3c, NONE),
        op("READ_LONG_10", 0x3e, NONE),
        op("WRITE_LONG_10", 0x3f, NONE),
        op("WRITE_SAME_10", 0x41, NONE),
        op("UNMAP", 0x42, NONE),
        op("LOG_SELECT", 0x4c, NONE),
        op("LOG_SENSE", 0x4d, NONE),
        op("XDWRITE_10", 0x50, NONE),
        op("XPWRITE_10", 0x51, NONE),
        op("XDREAD_10", 0x52, NONE),
        op("XDWRITEREAD_10", 0x53, NONE),
        op("MODE_SELECT_10", 0x55, NONE),
        op("MODE_SENSE_10", 0x5a, NONE),
        op("PERSISTENT_RESERVE_IN", 0x5e, SA_PERSISTENT_RESERVE_IN),
        op("PERSISTENT_RESERVE_OUT", 0x5f, SA_PERSISTENT_RESERVE_OUT),
        op("VARIABLE_LENGTH", 0x7f, SA_VARIABLE_LENGTH),
        op("EXTENDED_COPY", 0x83, SA_EXTENDED_COPY),
        op("RECEIVE_COPY_RESULTS", 0x84, NONE),
        op("ATA_PASS_THROUGH_16", 0x85, NONE),
        op("ACCESS_CONTROL_IN", 0x86, NONE),
        op("ACCESS_CONTROL_OUT", 0x87, NONE),
        op("READ_16", 0x88, NONE),
        op("COMPARE_AND_WRITE", 0x89, NONE),
        op("WRITE_16", 0x8a, NONE),
        op("ORWRITE_16", 0x8b, NONE),
        op("READ_ATTRIBUTE", 0x8c, NONE),
        op("WRITE_ATTRIBUTE", 0x8d, NONE),
        op("WRITE_AND_VERIFY_16", 0x8e, NONE),
        op("VERIFY_16", 0x8f, NONE),
        op("PRE_FETCH_16", 0x90, NONE),
        op("SYNCHRONIZE_CACHE_16", 0x91, NONE),
        op("WRITE_SAME_16", 0x93, NONE),
        op("READ_BUFFER_16", 0x9b, NONE),
        op("SERVICE_ACTION_IN_16", 0x9e, SA_SERVICE_ACTION_IN_16),
        op("SERVICE_ACTION_OUT_16", 0x9f, SA_SERVICE_ACTION_OUT_16),
        op("REPORT_LUNS", 0xa0, NONE),
        op("ATA_PASS_THROUGH_12", 0xa1, NONE),
        op("SECURITY_PROTOCOL_IN", 0xa2, NONE),
        op("MAINTENANCE_IN", 0xa3, SA_MAINTENANCE_IN),
        op("MAINTENANCE_OUT", 0xa4, SA_MAINTENANCE_OUT),
        op("READ_12", 0xa8, NONE),
        op("WRITE_12", 0xaa, NONE),
        op("WRITE_AND_VERIFY_12", 0xae, NONE),
        op("VERIFY_12", 0xaf, NONE),
        op("SECURITY_PROTOCOL_OUT", 0xb5, NONE),
        op("READ_DEFECT_DATA_12", 0xb7, NONE),
        op("REDUNDANCY_GROUP_IN", 0xba, NONE),
        op("REDUNDANCY_GROUP_OUT", 0xbb, NONE),
        op("SPARE_IN", 0xbc, NONE),
        op("SPARE_OUT", 0xbd, NONE),
        op("VOLUME_SET_IN", 0xbe, NONE),
        op("VOLUME_SET_OUT", 0xbf, NONE),
    ],
};

/// SCSI Stream Commands: tapes, printers and communication devices.
pub static SSC: OpcodeSet = OpcodeSet {
    name: "ssc",
    opcodes: &[
        op("TEST_UNIT_READY", 0x00, NONE),
        op("REWIND", 0x01, NONE),
        op("REQUEST_SENSE", 0x03, NONE),
        op("FORMAT_MEDIUM", 0x04, NONE),
        op("READ_BLOCK_LIMITS", 0x05, NONE),
        op("READ_6", 0x08, NONE),
        op("WRITE_6", 0x0a, NONE),
        op("SET_CAPACITY", 0x0b, NONE),
        op("READ_REVERSE_6", 0x0f, NONE),
        op("WRITE_FILEMARKS_6", 0x10, NONE),
        op("SPACE_6", 0x11, NONE),
        op("INQUIRY", 0x12, NONE),
        op("VERIFY_6", 0x13, NONE),
        op("RECOVER_BUFFERED_DATA", 0x14, NONE),
        op("MODE_SELECT_6", 0x15, NONE),
        op("MODE_SENSE_6", 0x1a, NONE),
        op("LOAD_UNLOAD", 0x1b, NONE),
        op("RECEIVE_DIAGNOSTIC_RESULTS", 0x1c, NONE),
        op("SEND_DIAGNOSTIC", 0x1d, NONE),
        op("PREVENT_ALLOW_MEDIUM_REMOVAL", 0x1e, NONE),
        op("READ_POSITION", 0x34, NONE),
        op("WRITE_BUFFER", 0x3b, NONE),
        op("READ_BUFFER_10", 0x3c, NONE),
        op("REPORT_DENSITY_SUPPORT", 0x44, NONE),
        op("LOG_SELECT", 0x4c, NONE),
        op("LOG_SENSE", 0x4d, NONE),
        op("MODE_SELECT_10", 0x55, NONE),
        op("MODE_SENSE_10", 0x5a, NONE),
        op("PERSISTENT_RESERVE_IN", 0x5e, SA_PERSISTENT_RESERVE_IN),
        op("PERSISTENT_RESERVE_OUT", 0x5f, SA_PERSISTENT_RESERVE_OUT),
        op("WRITE_FILEMARKS_16", 0x80, NONE),
        op("READ_REVERSE_16", 0x81, NONE),
        op("EXTENDED_COPY", 0x83, SA_EXTENDED_COPY),
        op("RECEIVE_COPY_RESULTS", 0x84, NONE),
        op("ACCESS_CONTROL_IN", 0x86, NONE),
        op("ACCESS_CONTROL_OUT", 0x87, NONE),
        op("READ_16", 0x88, NONE),
        op("WRITE_16", 0x8a, NONE),
        op("READ_ATTRIBUTE", 0x8c, NONE),
        op("WRITE_ATTRIBUTE", 0x8d, NONE),
        op("VERIFY_16", 0x8f, NONE),
        op("SPACE_16", 0x91, NONE),
        op("LOCATE_16", 0x92, NONE),
        op("ERASE_16", 0x93, NONE),
        op("READ_BUFFER_16", 0x9b, NONE),
        op("REPORT_LUNS", 0xa0, NONE),
        op("MAINTENANCE_IN", 0xa3, SA_MAINTENANCE_IN),
        op("MAINTENANCE_OUT", 0xa4, SA_MAINTENANCE_OUT),
        op("MOVE_MEDIUM_ATTACHED", 0xa7, NONE),
        op("READ_ELEMENT_STATUS_ATTACHED", 0xb4, NONE),
    ],
};

/// SCSI Media Changer Commands.
pub static SMC: OpcodeSet = OpcodeSet {
    name: "smc",
    opcodes: &[
        op("TEST_UNIT_READY", 0x00, NONE),
        op("REQUEST_SENSE", 0x03, NONE),
        op("INITIALIZE_ELEMENT_STATUS", 0x07, NONE),
        op("INQUIRY", 0x12, NONE),
        op("MODE_SELECT_6", 0x15, NONE),
        op("RESERVE_6", 0x16, NONE),
        op("RELEASE_6", 0x17, NONE),
        op("MODE_SENSE_6", 0x1a, NONE),
        op("OPEN_CLOSE_IMPORT_EXPORT_ELEMENT", 0x1b, SA_IMPORT_EXPORT),
        op("RECEIVE_DIAGNOSTIC_RESULTS", 0x1c, NONE),
        op("SEND_DIAGNOSTIC", 0x1d, NONE),
        op("PREVENT_ALLOW_MEDIUM_REMOVAL", 0x1e, NONE),
        op("POSITION_TO_ELEMENT", 0x2b, NONE),
        op("INITIALIZE_ELEMENT_STATUS_WITH_RANGE", 0x37, NONE),
        op("WRITE_BUFFER", 0x3b, NONE),
        op("READ_BUFFER_10", 0x3c, NONE),
        op("REPORT_VOLUME_TYPES_SUPPORTED", 0x44, NONE),
        op("LOG_SELECT", 0x4c, NONE),
        op("LOG_SENSE", 0x4d, NONE),
        op("MODE_SELECT_10", 0x55, NONE),
        op("RESERVE_10", 0x56, NONE),
        op("RELEASE_10", 0x57, NONE),
        op("MODE_SENSE_10", 0x5a, NONE),
        op("PERSISTENT_RESERVE_IN", 0x5e, SA_PERSISTENT_RESERVE_IN),
        op("PERSISTENT_RESERVE_OUT", 0x5f, SA_PERSISTENT_RESERVE_OUT),
        op("ACCESS_CONTROL_IN", 0x86, NONE),
        op("ACCESS_CONTROL_OUT", 0x87, NONE),
        op("READ_ATTRIBUTE", 0x8c, NONE),
        op("WRITE_ATTRIBUTE", 0x8d, NONE),
        op("READ_BUFFER_16", 0x9b, NONE),
        op("REPORT_LUNS", 0xa0, NONE),
        op("MAINTENANCE_IN", 0xa3, SA_MAINTENANCE_IN),
        op("MAINTENANCE_OUT", 0xa4, SA_MAINTENANCE_OUT),
        op("MOVE_MEDIUM", 0xa5, NONE),
        op("EXCHANGE_MEDIUM", 0xa6, NONE),
        op("REQUEST_VOLUME_ELEMENT_ADDRESS", 0xb5, NONE),
        op("SEND_VOLUME_TAG", 0xb6, NONE),
        op("READ_ELEMENT_STATUS", 0xb8, NONE),
        op("REDUNDANCY_GROUP_IN", 0xba, NONE),
        op("REDUNDANCY_GROUP_OUT", 0xbb, NONE),
        op("SPARE_IN", 0xbc, NONE),
        op("SPARE_OUT", 0xbd, NONE),
        op("VOLUME_SET_IN", 0xbe, NONE),
        op("VOLUME_SET_OUT", 0xbf, NONE),
    ],
};

/// SCSI Multimedia Commands: CD and DVD devices.
pub static MMC: OpcodeSet = OpcodeSet {
    name: "mmc",
    opcodes: &[
        op("TEST_UNIT_READY", 0x00, NONE),
        op("REQUEST_SENSE", 0x03, NONE),
        op("FORMAT_UNIT", 0x04, NONE),
        op("INQUIRY", 0x12, NONE),
        op("START_STOP_UNIT", 0x1b, NONE),
        op("PREVENT_ALLOW_MEDIUM_REMOVAL", 0x1e, NONE),
        op("READ_FORMAT_CAPACITIES", 0x23, NONE),
        op("READ_CAPACITY", 0x25, NONE),
        op("READ_10", 0x28, NONE),
        op("WRITE_10", 0x2a, NONE),
        op("SEEK_10", 0x2b, NONE),
        op("WRITE_AND_VERIFY_10", 0x2e, NONE),
        op("VERIFY_10", 0x2f, NONE),
        op("SYNCHRONIZE_CACHE", 0x35, NONE),
        op("WRITE_BUFFER", 0x3b, NONE),
        op("READ_BUFFER_10", 0x3c, NONE),
        op("READ_TOC_PMA_ATIP", 0x43, NONE),
        op("GET_CONFIGURATION", 0x46, NONE),
        op("GET_EVENT_STATUS_NOTIFICATION", 0x4a, NONE),
        op("READ_DISC_INFORMATION", 0x51, NONE),
        op("READ_TRACK_INFORMATION", 0x52, NONE),
        op("RESERVE_TRACK", 0x53, NONE),
        op("SEND_OPC_INFORMATION", 0x54, NONE),
        op("MODE_SELECT_10", 0x55, NONE),
        op("REPAIR_TRACK", 0x58, NONE),
        op("MODE_SENSE_10", 0x5a, NONE),
        op("CLOSE_TRACK_SESSION", 0x5b, NONE),
        op("READ_BUFFER_CAPACITY", 0x5c, NONE),
        op("SEND_CUE_SHEET", 0x5d, NONE),
        op("READ_BUFFER_16", 0x9b, NONE),
        op("REPORT_LUNS", 0xa0, NONE),
        op("BLANK", 0xa1, NONE),
        op("SECURITY_PROTOCOL_IN", 0xa2, NONE),
        op("SEND_KEY", 0xa3, NONE),
        op("REPORT_KEY", 0xa4, NONE),
        op("LOAD_UNLOAD_MEDIUM", 0xa6, NONE),
        op("SET_READ_AHEAD", 0xa7, NONE),
        op("READ_12", 0xa8, NONE),
        op("WRITE_12", 0xaa, NONE),
        op("GET_PERFORMANCE", 0xac, NONE),
        op("READ_DISC_STRUCTURE", 0xad, NONE),
        op("SECURITY_PROTOCOL_OUT", 0xb5, NONE),
        op("SET_STREAMING", 0xb6, NONE),
        op("READ_CD_MSF", 0xb9, NONE),
        op("SET_CD_SPEED", 0xbb, NONE),
        op("MECHANISM_STATUS", 0xbd, NONE),
        op("READ_CD", 0xbe, NONE),
        op("SEND_DISC_STRUCTURE", 0xbf, NONE),
    ],
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cdb_size_by_group() {
        for opcode in 0u8..=0xff {
            let size = cdb_size(opcode);
            match opcode {
                0x00..0x20 => assert_eq!(size.unwrap(), 6),
                0x20..0x60 => assert_eq!(size.unwrap(), 10),
                0x80..0xa0 => assert_eq!(size.unwrap(), 16),
                0xa0..0xc0 => assert_eq!(size.unwrap(), 12),
                _ => assert!(matches!(size, Err(Error::OpcodeClass(op)) if op == opcode)),
            }
        }
    }

    #[test]
    fn init_cdb_places_opcode() {
        let cdb = init_cdb(0x28).unwrap();
        assert_eq!(cdb, [0x28, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn device_type_selection() {
        assert_eq!(OpcodeSet::for_device_type(0x00).name, "sbc");
        assert_eq!(OpcodeSet::for_device_type(0x01).name, "ssc");
        assert_eq!(OpcodeSet::for_device_type(0x03).name, "spc");
        assert_eq!(OpcodeSet::for_device_type(0x05).name, "mmc");
        assert_eq!(OpcodeSet::for_device_type(0x08).name, "smc");
        assert_eq!(OpcodeSet::for_device_type(0x1f).name, "spc");
    }

    #[test]
    fn corrected_values() {
        assert_eq!(SBC.get("WRITE_6").unwrap().value, 0x0a);
        assert_eq!(MMC.get("MODE_SENSE_10").unwrap().value, 0x5a);
        assert_eq!(SBC.get("PREVENT_ALLOW_MEDIUM_REMOVAL").unwrap().value, 0x1e);
    }

    #[test]
    fn lookups() {
        let sa_in = SBC.get("SERVICE_ACTION_IN_16").unwrap();
        assert_eq!(sa_in.value, 0x9e);
        assert_eq!(sa_in.service_action("GET_LBA_STATUS").unwrap(), 0x12);
        assert!(matches!(
            sa_in.service_action("READ_KEYS"),
            Err(Error::UnknownServiceAction { opcode: "SERVICE_ACTION_IN_16", .. })
        ));
        assert!(matches!(
            MMC.get("READ_ELEMENT_STATUS"),
            Err(Error::UnknownOpcode { set: "mmc", .. })
        ));
    }

    #[test]
    fn names_are_unique_within_a_set() {
        for set in [&SPC, &SBC, &SSC, &SMC, &MMC] {
            for (i, a) in set.opcodes.iter().enumerate() {
                assert!(
                    set.opcodes[i + 1..].iter().all(|b| b.name != a.name),
                    "{} appears twice in {}",
                    a.name,
                    set.name
                );
            }
        }
    }
}
