//! MAINTENANCE IN service actions: REPORT TARGET PORT GROUPS and REPORT
//! PRIORITY.

use super::transport_id::TransportId;
use super::{Command, encode_cdb, length_at, slice};
use crate::scsi::error::{Error, Result};
use crate::scsi::field::{Layout, Record, bits};
use crate::scsi::opcode::Opcode;

/// Values of `asymmetric_access_state`.
pub mod access_state {
    pub const ACTIVE_OPTIMIZED: u8 = 0x0;
    pub const ACTIVE_NON_OPTIMIZED: u8 = 0x1;
    pub const STANDBY: u8 = 0x2;
    pub const UNAVAILABLE: u8 = 0x3;
    pub const LOGICAL_BLOCK_DEPENDENT: u8 = 0x4;
    pub const OFFLINE: u8 = 0xe;
    pub const TRANSITIONING: u8 = 0xf;
}

/// A target port group and the relative ports in it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TargetPortGroup {
    /// [`ReportTargetPortGroups::DESCRIPTOR`] fields, less the port count.
    pub fields: Record,
    pub relative_target_port_ids: Vec<u16>,
}

/// Decoded REPORT TARGET PORT GROUPS parameter data.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TargetPortGroups {
    /// Present when the device returned the extended header.
    pub implicit_transition_time: Option<u8>,
    pub groups: Vec<TargetPortGroup>,
}

/// REPORT TARGET PORT GROUPS, SPC-4 6.36
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReportTargetPortGroups {
    /// Ask for the extended header with the implicit transition time.
    pub extended: bool,
    pub alloc_len: u32,
}

impl Default for ReportTargetPortGroups {
    fn default() -> Self {
        Self {
            extended: false,
            alloc_len: 16384,
        }
    }
}

const EXTENDED_FORMAT: u64 = 0x01;

impl ReportTargetPortGroups {
    pub const CDB: Layout = Layout::new(
        "ReportTargetPortGroups",
        12,
        &[
            ("opcode", bits(0xff, 0)),
            ("parameter_data_format", bits(0xe0, 1)),
            ("service_action", bits(0x1f, 1)),
            ("alloc_len", bits(0xffffffff, 6)),
        ],
    );

    const EXTENDED_HEADER: Layout = Layout::new(
        "REPORT TARGET PORT GROUPS extended header",
        8,
        &[
            ("return_data_length", bits(0xffffffff, 0)),
            ("format_type", bits(0x70, 4)),
            ("implicit_transition_time", bits(0xff, 5)),
        ],
    );

    pub const DESCRIPTOR: Layout = Layout::new(
        "Target port group descriptor",
        8,
        &[
            ("pref", bits(0x80, 0)),
            ("asymmetric_access_state", bits(0x0f, 0)),
            ("t_sup", bits(0x80, 1)),
            ("o_sup", bits(0x40, 1)),
            ("lbd_sup", bits(0x10, 1)),
            ("u_sup", bits(0x08, 1)),
            ("s_sup", bits(0x04, 1)),
            ("an_sup", bits(0x02, 1)),
            ("ao_sup", bits(0x01, 1)),
            ("target_port_group", bits(0xffff, 2)),
            ("status_code", bits(0xff, 5)),
            ("vendor_specific", bits(0xff, 6)),
            ("target_port_count", bits(0xff, 7)),
        ],
    );

    pub fn unmarshall_datain(data: &[u8]) -> Result<TargetPortGroups> {
        let len = length_at(data, 0, 4, "REPORT TARGET PORT GROUPS header")?;
        let data = &data[..data.len().min(4 + len)];

        let mut result = TargetPortGroups::default();
        let mut offset = 4;
        if let Some(header) = data.get(..8) {
            let header = Self::EXTENDED_HEADER.decode(header)?;
            if header.int("format_type") == EXTENDED_FORMAT {
                result.implicit_transition_time = Some(header.int("implicit_transition_time") as u8);
                offset = 8;
            }
        }

        while offset < data.len() {
            let mut fields = Self::DESCRIPTOR.decode(slice(data, offset, 8, "target port group descriptor")?)?;
            let count = fields.remove("target_port_count").and_then(|v| v.as_int()).unwrap_or(0) as usize;
            offset += 8;
            let ports = slice(data, offset, count * 4, "target port descriptors")?;
            let relative_target_port_ids = ports
                .chunks_exact(4)
                .map(|port| u16::from_be_bytes([port[2], port[3]]))
                .collect();
            offset += count * 4;
            result.groups.push(TargetPortGroup {
                fields,
                relative_target_port_ids,
            });
        }
        Ok(result)
    }

    pub fn marshall_datain(groups: &TargetPortGroups) -> Result<Vec<u8>> {
        let mut buf = match groups.implicit_transition_time {
            Some(time) => Self::EXTENDED_HEADER.encode(
                &Record::new()
                    .with("format_type", EXTENDED_FORMAT)
                    .with("implicit_transition_time", time),
            )?,
            None => vec![0; 4],
        };
        for group in &groups.groups {
            let count = group.relative_target_port_ids.len();
            if count > 0xff {
                return Err(Error::InvalidLength {
                    field: "target_port_count",
                    value: count as u64,
                    expected: "at most 255",
                });
            }
            let mut fields = group.fields.clone();
            fields.insert("target_port_count", count);
            buf.extend(Self::DESCRIPTOR.encode(&fields)?);
            for id in &group.relative_target_port_ids {
                buf.extend([0, 0]);
                buf.extend(id.to_be_bytes());
            }
        }
        let len = (buf.len() - 4) as u32;
        buf[..4].copy_from_slice(&len.to_be_bytes());
        Ok(buf)
    }
}

impl Command for ReportTargetPortGroups {
    const OPCODE: &'static str = "MAINTENANCE_IN";
    type Output = TargetPortGroups;

    fn cdb(&self, opcode: &Opcode) -> Result<Vec<u8>> {
        let record = Record::new()
            .with("service_action", opcode.service_action("REPORT_TARGET_PORT_GROUPS")?)
            .with("parameter_data_format", if self.extended { EXTENDED_FORMAT } else { 0 })
            .with("alloc_len", self.alloc_len);
        encode_cdb(&Self::CDB, opcode, &record)
    }

    fn data_in_len(&self) -> Result<usize> {
        Ok(self.alloc_len as usize)
    }

    fn unmarshall(&self, data_in: &[u8]) -> Result<TargetPortGroups> {
        Self::unmarshall_datain(data_in)
    }
}

/// Values of PRIORITY REPORTED.
pub mod priority_reported {
    /// Priorities assigned to every I_T nexus, including the defaults.
    pub const ALL: u8 = 0x00;
    /// Only the I_T nexus the command arrived on.
    pub const CURRENT: u8 = 0x01;
    /// Only I_T nexuses with a priority set by SET PRIORITY.
    pub const SET: u8 = 0x02;
}

/// One priority descriptor of REPORT PRIORITY.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PriorityDescriptor {
    pub current_priority: u8,
    pub relative_target_port_identifier: u16,
    /// The initiator the priority applies to, absent when the device
    /// reports a zero additional descriptor length.
    pub transport_id: Option<TransportId>,
}

/// REPORT PRIORITY, SPC-4 6.30
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReportPriority {
    pub priority_reported: u8,
    pub alloc_len: u32,
}

impl Default for ReportPriority {
    fn default() -> Self {
        Self {
            priority_reported: priority_reported::ALL,
            alloc_len: 16384,
        }
    }
}

impl ReportPriority {
    pub const CDB: Layout = Layout::new(
        "ReportPriority",
        12,
        &[
            ("opcode", bits(0xff, 0)),
            ("service_action", bits(0x1f, 1)),
            ("priority_reported", bits(0xc0, 2)),
            ("alloc_len", bits(0xffffffff, 6)),
        ],
    );

    const DESCRIPTOR: Layout = Layout::new(
        "Priority descriptor",
        8,
        &[
            ("current_priority", bits(0x0f, 0)),
            ("relative_target_port_identifier", bits(0xffff, 2)),
            ("additional_descriptor_length", bits(0xffff, 6)),
        ],
    );

    pub fn unmarshall_datain(data: &[u8]) -> Result<Vec<PriorityDescriptor>> {
        let len = length_at(data, 0, 4, "REPORT PRIORITY header")?;
        let list = slice(data, 4, len, "priority descriptors")?;
        let mut descriptors = Vec::new();
        let mut offset = 0;
        while offset < list.len() {
            let header = Self::DESCRIPTOR.decode(slice(list, offset, 8, "priority descriptor")?)?;
            let adlen = header.int("additional_descriptor_length") as usize;
            offset += 8;
            let transport_id = match adlen {
                0 => None,
                n => Some(TransportId::unmarshall(slice(list, offset, n, "priority descriptor TransportID")?)?.0),
            };
            offset += adlen;
            descriptors.push(PriorityDescriptor {
                current_priority: header.int("current_priority") as u8,
                relative_target_port_identifier: header.int("relative_target_port_identifier") as u16,
                transport_id,
            });
        }
        Ok(descriptors)
    }

    pub fn marshall_datain(descriptors: &[PriorityDescriptor]) -> Result<Vec<u8>> {
        let mut buf = vec![0; 4];
        for descriptor in descriptors {
            let id = match &descriptor.transport_id {
                Some(id) => id.marshall()?,
                None => Vec::new(),
            };
            let header = Record::new()
                .with("current_priority", descriptor.current_priority)
                .with("relative_target_port_identifier", descriptor.relative_target_port_identifier)
                .with("additional_descriptor_length", id.len());
            buf.extend(Self::DESCRIPTOR.encode_strict(&header)?);
            buf.extend(id);
        }
        let len = (buf.len() - 4) as u32;
        buf[..4].copy_from_slice(&len.to_be_bytes());
        Ok(buf)
    }
}

impl Command for ReportPriority {
    const OPCODE: &'static str = "MAINTENANCE_IN";
    type Output = Vec<PriorityDescriptor>;

    fn cdb(&self, opcode: &Opcode) -> Result<Vec<u8>> {
        let record = Record::new()
            .with("service_action", opcode.service_action("REPORT_PRIORITY")?)
            .with("priority_reported", self.priority_reported)
            .with("alloc_len", self.alloc_len);
        encode_cdb(&Self::CDB, opcode, &record)
    }

    fn data_in_len(&self) -> Result<usize> {
        Ok(self.alloc_len as usize)
    }

    fn unmarshall(&self, data_in: &[u8]) -> Result<Vec<PriorityDescriptor>> {
        Self::unmarshall_datain(data_in)
    }
}
