//! PERSISTENT RESERVE IN and OUT, SPC-4 6.15 and 6.16.
//!
//! The shape of PR IN parameter data depends on the service action the
//! command was issued with, never on the bytes that come back.

use super::transport_id::TransportId;
use super::{Command, encode_cdb, length_at, slice};
use crate::scsi::bitfield::{be_bytes, be_int};
use crate::scsi::error::{Error, Result};
use crate::scsi::field::{Layout, Record, bits};
use crate::scsi::opcode::Opcode;

pub mod pr_type {
    pub const WRITE_EXCLUSIVE: u8 = 0x01;
    pub const EXCLUSIVE_ACCESS: u8 = 0x03;
    pub const WRITE_EXCLUSIVE_REGISTRANTS_ONLY: u8 = 0x05;
    pub const EXCLUSIVE_ACCESS_REGISTRANTS_ONLY: u8 = 0x06;
    pub const WRITE_EXCLUSIVE_ALL_REGISTRANTS: u8 = 0x07;
    pub const EXCLUSIVE_ACCESS_ALL_REGISTRANTS: u8 = 0x08;
}

pub mod pr_scope {
    pub const LU_SCOPE: u8 = 0x00;
}

/// PERSISTENT RESERVE IN service actions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrInAction {
    ReadKeys,
    ReadReservation,
    ReportCapabilities,
    ReadFullStatus,
}

impl PrInAction {
    pub fn name(self) -> &'static str {
        match self {
            PrInAction::ReadKeys => "READ_KEYS",
            PrInAction::ReadReservation => "READ_RESERVATION",
            PrInAction::ReportCapabilities => "REPORT_CAPABILITIES",
            PrInAction::ReadFullStatus => "READ_FULL_STATUS",
        }
    }
}

/// PERSISTENT RESERVE IN, SPC-4 6.15
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PersistentReserveIn {
    pub action: PrInAction,
    pub alloc_len: u16,
}

/// READ RESERVATION parameter data when a reservation is held.
const RESERVATION: Layout = Layout::new(
    "READ RESERVATION data",
    24,
    &[
        ("reservation_key", bits(0xffffffffffffffff, 8)),
        ("scope", bits(0xf0, 21)),
        ("type", bits(0x0f, 21)),
    ],
);

const CAPABILITIES: Layout = Layout::new(
    "REPORT CAPABILITIES data",
    8,
    &[
        ("length", bits(0xffff, 0)),
        ("rlr_c", bits(0x80, 2)),
        ("crh", bits(0x10, 2)),
        ("sip_c", bits(0x08, 2)),
        ("atp_c", bits(0x04, 2)),
        ("ptpl_c", bits(0x01, 2)),
        ("tmv", bits(0x80, 3)),
        ("allow_commands", bits(0x70, 3)),
        ("ptpl_a", bits(0x01, 3)),
    ],
);

/// The PERSISTENT RESERVATION TYPE MASK, bytes 4..6 of the capabilities.
const PR_TYPE_MASK: Layout = Layout::new(
    "PERSISTENT RESERVATION TYPE MASK",
    8,
    &[
        ("wr_ex_ar", bits(0x80, 4)),
        ("ex_ac_ro", bits(0x40, 4)),
        ("wr_ex_ro", bits(0x20, 4)),
        ("ex_ac", bits(0x08, 4)),
        ("wr_ex", bits(0x02, 4)),
        ("ex_ac_ar", bits(0x01, 5)),
    ],
);

const FULL_STATUS: Layout = Layout::new(
    "full status descriptor",
    24,
    &[
        ("reservation_key", bits(0xffffffffffffffff, 0)),
        ("all_tg_pt", bits(0x02, 12)),
        ("r_holder", bits(0x01, 12)),
        ("scope", bits(0xf0, 13)),
        ("type", bits(0x0f, 13)),
        ("relative_target_port_id", bits(0xffff, 18)),
        ("additional_desc_length", bits(0xffffffff, 20)),
    ],
);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Reservation {
    pub reservation_key: u64,
    pub scope: u8,
    pub pr_type: u8,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Capabilities {
    /// `rlr_c`, `crh`, `sip_c`, `atp_c`, `ptpl_c`, `tmv`, `allow_commands`
    /// and `ptpl_a`.
    pub flags: Record,
    pub pr_type_mask: Record,
}

/// One registration as reported by READ FULL STATUS.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FullStatus {
    pub reservation_key: u64,
    pub all_tg_pt: bool,
    pub r_holder: bool,
    pub scope: u8,
    pub pr_type: u8,
    pub relative_target_port_id: u16,
    pub transport_id: Option<TransportId>,
}

/// Decoded PERSISTENT RESERVE IN parameter data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PrInData {
    ReadKeys {
        pr_generation: u32,
        reservation_keys: Vec<u64>,
    },
    ReadReservation {
        pr_generation: u32,
        reservation: Option<Reservation>,
    },
    /// `None` when the device reports a zero length.
    ReportCapabilities(Option<Capabilities>),
    ReadFullStatus {
        pr_generation: u32,
        full_status: Vec<FullStatus>,
    },
}

impl PersistentReserveIn {
    pub const CDB: Layout = Layout::new(
        "PersistentReserveIn",
        10,
        &[
            ("opcode", bits(0xff, 0)),
            ("service_action", bits(0x1f, 1)),
            ("alloc_len", bits(0xffff, 7)),
        ],
    );

    pub fn new(action: PrInAction) -> Self {
        Self {
            action,
            alloc_len: 1024,
        }
    }

    /// The PR generation and the bytes counted by ADDITIONAL LENGTH.
    fn header(data: &[u8]) -> Result<(u32, &[u8])> {
        let generation = length_at(data, 0, 4, "PR IN header")? as u32;
        let len = length_at(data, 4, 4, "PR IN header")?;
        Ok((generation, slice(data, 8, len, "PR IN parameter data")?))
    }

    pub fn unmarshall_datain(action: PrInAction, data: &[u8]) -> Result<PrInData> {
        match action {
            PrInAction::ReadKeys => {
                let (pr_generation, list) = Self::header(data)?;
                if list.len() % 8 != 0 {
                    return Err(Error::InvalidLength {
                        field: "additional_length",
                        value: list.len() as u64,
                        expected: "a multiple of 8",
                    });
                }
                let reservation_keys = list
                    .chunks_exact(8)
                    .map(be_int)
                    .collect();
                Ok(PrInData::ReadKeys {
                    pr_generation,
                    reservation_keys,
                })
            }
            PrInAction::ReadReservation => {
                let (pr_generation, body) = Self::header(data)?;
                let reservation = match body.len() {
                    0 => None,
                    16 => {
                        let r = RESERVATION.decode(data)?;
                        Some(Reservation {
                            reservation_key: r.int("reservation_key"),
                            scope: r.int("scope") as u8,
                            pr_type: r.int("type") as u8,
                        })
                    }
                    n => {
                        return Err(Error::InvalidLength {
                            field: "additional_length",
                            value: n as u64,
                            expected: "0 or 16 for READ RESERVATION",
                        });
                    }
                };
                Ok(PrInData::ReadReservation {
                    pr_generation,
                    reservation,
                })
            }
            PrInAction::ReportCapabilities => {
                let mut flags = CAPABILITIES.decode(data)?;
                match flags.int("length") {
                    0 => Ok(PrInData::ReportCapabilities(None)),
                    8 => {
                        flags.remove("length");
                        let pr_type_mask = PR_TYPE_MASK.decode(data)?;
                        Ok(PrInData::ReportCapabilities(Some(Capabilities { flags, pr_type_mask })))
                    }
                    n => Err(Error::InvalidLength {
                        field: "length",
                        value: n,
                        expected: "0 or 8 for REPORT CAPABILITIES",
                    }),
                }
            }
            PrInAction::ReadFullStatus => {
                let (pr_generation, mut rest) = Self::header(data)?;
                let mut full_status = Vec::new();
                while !rest.is_empty() {
                    let d = FULL_STATUS.decode(rest)?;
                    let len = d.int("additional_desc_length") as usize;
                    let id = slice(rest, FULL_STATUS.size, len, "full status descriptor")?;
                    let transport_id = if len == 0 {
                        None
                    } else {
                        Some(TransportId::unmarshall(id)?.0)
                    };
                    full_status.push(FullStatus {
                        reservation_key: d.int("reservation_key"),
                        all_tg_pt: d.int("all_tg_pt") != 0,
                        r_holder: d.int("r_holder") != 0,
                        scope: d.int("scope") as u8,
                        pr_type: d.int("type") as u8,
                        relative_target_port_id: d.int("relative_target_port_id") as u16,
                        transport_id,
                    });
                    rest = &rest[FULL_STATUS.size + len..];
                }
                Ok(PrInData::ReadFullStatus {
                    pr_generation,
                    full_status,
                })
            }
        }
    }

    pub fn marshall_datain(data: &PrInData) -> Result<Vec<u8>> {
        let with_header = |pr_generation: u32, body: Vec<u8>| {
            let mut buf = pr_generation.to_be_bytes().to_vec();
            buf.extend((body.len() as u32).to_be_bytes());
            buf.extend(body);
            buf
        };
        Ok(match data {
            PrInData::ReadKeys {
                pr_generation,
                reservation_keys,
            } => with_header(
                *pr_generation,
                reservation_keys.iter().flat_map(|k| k.to_be_bytes()).collect(),
            ),
            PrInData::ReadReservation {
                pr_generation,
                reservation,
            } => match reservation {
                None => with_header(*pr_generation, Vec::new()),
                Some(r) => {
                    let record = Record::new()
                        .with("reservation_key", r.reservation_key)
                        .with("scope", r.scope)
                        .with("type", r.pr_type);
                    let mut buf = RESERVATION.encode(&record)?;
                    buf[..4].copy_from_slice(&pr_generation.to_be_bytes());
                    buf[4..8].copy_from_slice(&16u32.to_be_bytes());
                    buf
                }
            },
            PrInData::ReportCapabilities(None) => vec![0; 8],
            PrInData::ReportCapabilities(Some(c)) => {
                let mut buf = CAPABILITIES.encode(&c.flags.clone().with("length", 8u16))?;
                PR_TYPE_MASK.encode_into(&c.pr_type_mask, &mut buf, false)?;
                buf
            }
            PrInData::ReadFullStatus {
                pr_generation,
                full_status,
            } => {
                let mut body = Vec::new();
                for status in full_status {
                    let id = match &status.transport_id {
                        Some(id) => id.marshall()?,
                        None => Vec::new(),
                    };
                    let record = Record::new()
                        .with("reservation_key", status.reservation_key)
                        .with("all_tg_pt", status.all_tg_pt)
                        .with("r_holder", status.r_holder)
                        .with("scope", status.scope)
                        .with("type", status.pr_type)
                        .with("relative_target_port_id", status.relative_target_port_id)
                        .with("additional_desc_length", id.len());
                    body.extend(FULL_STATUS.encode(&record)?);
                    body.extend(id);
                }
                with_header(*pr_generation, body)
            }
        })
    }
}

impl Command for PersistentReserveIn {
    const OPCODE: &'static str = "PERSISTENT_RESERVE_IN";
    type Output = PrInData;

    fn cdb(&self, opcode: &Opcode) -> Result<Vec<u8>> {
        let record = Record::new()
            .with("service_action", opcode.service_action(self.action.name())?)
            .with("alloc_len", self.alloc_len);
        encode_cdb(&Self::CDB, opcode, &record)
    }

    fn data_in_len(&self) -> Result<usize> {
        Ok(usize::from(self.alloc_len))
    }

    fn unmarshall(&self, data_in: &[u8]) -> Result<PrInData> {
        Self::unmarshall_datain(self.action, data_in)
    }
}

/// PERSISTENT RESERVE OUT service actions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrOutAction {
    Register,
    Reserve,
    Release,
    Clear,
    Preempt,
    PreemptAndAbort,
    RegisterAndIgnoreExistingKey,
    RegisterAndMove,
    ReplaceLostRegistration,
}

impl PrOutAction {
    pub fn name(self) -> &'static str {
        match self {
            PrOutAction::Register => "REGISTER",
            PrOutAction::Reserve => "RESERVE",
            PrOutAction::Release => "RELEASE",
            PrOutAction::Clear => "CLEAR",
            PrOutAction::Preempt => "PREEMPT",
            PrOutAction::PreemptAndAbort => "PREEMPT_AND_ABORT",
            PrOutAction::RegisterAndIgnoreExistingKey => "REGISTER_AND_IGNORE_EXISTING_KEY",
            PrOutAction::RegisterAndMove => "REGISTER_AND_MOVE",
            PrOutAction::ReplaceLostRegistration => "REPLACE_LOST_REGISTRATION",
        }
    }
}

/// PERSISTENT RESERVE OUT, SPC-4 6.16
///
/// Which fields matter depends on `action`: `unreg` and
/// `relative_target_port_id` only go out with REGISTER AND MOVE, and
/// `transport_ids` is either the single destination of REGISTER AND MOVE or
/// the list sent by REGISTER with `spec_i_pt` set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PersistentReserveOut {
    pub action: PrOutAction,
    pub scope: u8,
    pub pr_type: u8,
    pub reservation_key: u64,
    pub service_action_reservation_key: u64,
    pub spec_i_pt: bool,
    pub all_tg_pt: bool,
    pub aptpl: bool,
    pub unreg: bool,
    pub relative_target_port_id: u16,
    pub transport_ids: Vec<TransportId>,
}

impl PersistentReserveOut {
    pub const CDB: Layout = Layout::new(
        "PersistentReserveOut",
        10,
        &[
            ("opcode", bits(0xff, 0)),
            ("service_action", bits(0x1f, 1)),
            ("scope", bits(0xf0, 2)),
            ("pr_type", bits(0x0f, 2)),
            ("parameter_list_length", bits(0xffffffff, 5)),
        ],
    );

    /// SPC-4 6.16.3
    pub const BASIC: Layout = Layout::new(
        "basic PR OUT parameter list",
        24,
        &[
            ("reservation_key", bits(0xffffffffffffffff, 0)),
            ("service_action_reservation_key", bits(0xffffffffffffffff, 8)),
            ("spec_i_pt", bits(0x08, 20)),
            ("all_tg_pt", bits(0x04, 20)),
            ("aptpl", bits(0x01, 20)),
        ],
    );

    /// SPC-4 6.16.4
    pub const REGISTER_AND_MOVE: Layout = Layout::new(
        "REGISTER AND MOVE parameter list",
        24,
        &[
            ("reservation_key", bits(0xffffffffffffffff, 0)),
            ("service_action_reservation_key", bits(0xffffffffffffffff, 8)),
            ("unreg", bits(0x02, 17)),
            ("aptpl", bits(0x01, 17)),
            ("relative_target_port_id", bits(0xffff, 18)),
            ("transportid_length", bits(0xffffffff, 20)),
        ],
    );

    pub fn new(action: PrOutAction, reservation_key: u64) -> Self {
        Self {
            action,
            scope: pr_scope::LU_SCOPE,
            pr_type: 0,
            reservation_key,
            service_action_reservation_key: 0,
            spec_i_pt: false,
            all_tg_pt: false,
            aptpl: false,
            unreg: false,
            relative_target_port_id: 0,
            transport_ids: Vec::new(),
        }
    }

    /// The parameter list for this command.
    pub fn marshall_dataout(&self) -> Result<Vec<u8>> {
        let keys = Record::new()
            .with("reservation_key", self.reservation_key)
            .with("service_action_reservation_key", self.service_action_reservation_key)
            .with("aptpl", self.aptpl);

        if self.action == PrOutAction::RegisterAndMove {
            let id = match self.transport_ids.as_slice() {
                [] => Vec::new(),
                [id] => id.marshall()?,
                ids => {
                    return Err(Error::invalid(
                        "transport_ids",
                        format!("REGISTER AND MOVE takes one TransportID, got {}", ids.len()),
                    ));
                }
            };
            let record = keys
                .with("unreg", self.unreg)
                .with("relative_target_port_id", self.relative_target_port_id)
                .with("transportid_length", id.len());
            let mut buf = Self::REGISTER_AND_MOVE.encode(&record)?;
            buf.extend(id);
            return Ok(buf);
        }

        let record = keys
            .with("spec_i_pt", self.spec_i_pt)
            .with("all_tg_pt", self.all_tg_pt);
        let mut buf = Self::BASIC.encode(&record)?;
        if self.action == PrOutAction::Register && self.spec_i_pt {
            let mut ids = Vec::new();
            for id in &self.transport_ids {
                ids.extend(id.marshall()?);
            }
            buf.extend(be_bytes(ids.len() as u64, 4));
            buf.extend(ids);
        } else if !self.transport_ids.is_empty() {
            return Err(Error::invalid(
                "transport_ids",
                format!("{} with spec_i_pt clear sends no TransportIDs", self.action.name()),
            ));
        }
        Ok(buf)
    }
}

impl Command for PersistentReserveOut {
    const OPCODE: &'static str = "PERSISTENT_RESERVE_OUT";
    type Output = ();

    fn cdb(&self, opcode: &Opcode) -> Result<Vec<u8>> {
        let record = Record::new()
            .with("service_action", opcode.service_action(self.action.name())?)
            .with("scope", self.scope)
            .with("pr_type", self.pr_type)
            .with("parameter_list_length", self.marshall_dataout()?.len());
        encode_cdb(&Self::CDB, opcode, &record)
    }

    fn data_out(&self) -> Result<Vec<u8>> {
        self.marshall_dataout()
    }

    fn unmarshall(&self, _: &[u8]) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scsi::command::transport_id::protocol_id;
    use crate::scsi::opcode::SBC;

    fn iscsi(name: &str) -> TransportId {
        TransportId::Iscsi {
            iscsi_name: name.to_string(),
            initiator_session_id: None,
        }
    }

    #[test]
    fn pr_in_cdb() {
        let opcode = SBC.get("PERSISTENT_RESERVE_IN").unwrap();
        let cdb = PersistentReserveIn::new(PrInAction::ReadFullStatus)
            .cdb(opcode)
            .unwrap();
        assert_eq!(cdb, [0x5e, 0x03, 0, 0, 0, 0, 0, 0x04, 0x00, 0]);
    }

    #[test]
    fn read_keys() {
        let mut data = vec![0, 0, 0, 7, 0, 0, 0, 16];
        data.extend(0x1122334455667788u64.to_be_bytes());
        data.extend(0xaau64.to_be_bytes());
        data.resize(64, 0);
        let result = PersistentReserveIn::unmarshall_datain(PrInAction::ReadKeys, &data).unwrap();
        assert_eq!(
            result,
            PrInData::ReadKeys {
                pr_generation: 7,
                reservation_keys: vec![0x1122334455667788, 0xaa],
            }
        );
        assert_eq!(PersistentReserveIn::marshall_datain(&result).unwrap(), data[..24]);
    }

    #[test]
    fn read_reservation() {
        let empty = [0, 0, 0, 3, 0, 0, 0, 0];
        assert_eq!(
            PersistentReserveIn::unmarshall_datain(PrInAction::ReadReservation, &empty).unwrap(),
            PrInData::ReadReservation {
                pr_generation: 3,
                reservation: None
            }
        );

        let held = PrInData::ReadReservation {
            pr_generation: 4,
            reservation: Some(Reservation {
                reservation_key: 0xdead,
                scope: pr_scope::LU_SCOPE,
                pr_type: pr_type::EXCLUSIVE_ACCESS_REGISTRANTS_ONLY,
            }),
        };
        let data = PersistentReserveIn::marshall_datain(&held).unwrap();
        assert_eq!(data.len(), 24);
        assert_eq!(data[21], 0x06);
        assert_eq!(
            PersistentReserveIn::unmarshall_datain(PrInAction::ReadReservation, &data).unwrap(),
            held
        );

        let mut bad = data.clone();
        bad[7] = 8;
        assert!(matches!(
            PersistentReserveIn::unmarshall_datain(PrInAction::ReadReservation, &bad),
            Err(Error::InvalidLength { value: 8, .. })
        ));
    }

    #[test]
    fn report_capabilities() {
        let data = [0x00, 0x08, 0x9d, 0x91, 0xea, 0x01, 0, 0];
        let result = PersistentReserveIn::unmarshall_datain(PrInAction::ReportCapabilities, &data).unwrap();
        let PrInData::ReportCapabilities(Some(caps)) = &result else {
            panic!("expected capabilities, got {result:?}");
        };
        assert!(!caps.flags.contains("length"));
        assert_eq!(caps.flags.int("rlr_c"), 1);
        assert_eq!(caps.flags.int("crh"), 1);
        assert_eq!(caps.flags.int("sip_c"), 1);
        assert_eq!(caps.flags.int("atp_c"), 1);
        assert_eq!(caps.flags.int("ptpl_c"), 1);
        assert_eq!(caps.flags.int("tmv"), 1);
        assert_eq!(caps.flags.int("allow_commands"), 1);
        assert_eq!(caps.flags.int("ptpl_a"), 1);
        assert_eq!(caps.pr_type_mask.int("wr_ex_ar"), 1);
        assert_eq!(caps.pr_type_mask.int("ex_ac_ro"), 1);
        assert_eq!(caps.pr_type_mask.int("wr_ex_ro"), 1);
        assert_eq!(caps.pr_type_mask.int("ex_ac"), 1);
        assert_eq!(caps.pr_type_mask.int("wr_ex"), 1);
        assert_eq!(caps.pr_type_mask.int("ex_ac_ar"), 1);
        assert_eq!(PersistentReserveIn::marshall_datain(&result).unwrap(), data);

        assert_eq!(
            PersistentReserveIn::unmarshall_datain(PrInAction::ReportCapabilities, &[0; 8]).unwrap(),
            PrInData::ReportCapabilities(None)
        );
        assert!(matches!(
            PersistentReserveIn::unmarshall_datain(PrInAction::ReportCapabilities, &[0, 6, 0, 0, 0, 0, 0, 0]),
            Err(Error::InvalidLength { field: "length", value: 6, .. })
        ));
    }

    #[test]
    fn read_full_status() {
        let status = PrInData::ReadFullStatus {
            pr_generation: 9,
            full_status: vec![
                FullStatus {
                    reservation_key: 0x1234,
                    all_tg_pt: false,
                    r_holder: true,
                    scope: pr_scope::LU_SCOPE,
                    pr_type: pr_type::WRITE_EXCLUSIVE,
                    relative_target_port_id: 1,
                    transport_id: Some(iscsi("iqn.1993-08.org.debian:01:abc")),
                },
                FullStatus {
                    reservation_key: 0x5678,
                    all_tg_pt: true,
                    r_holder: false,
                    scope: pr_scope::LU_SCOPE,
                    pr_type: 0,
                    relative_target_port_id: 2,
                    transport_id: Some(TransportId::Sas {
                        sas_address: [0x50, 0, 0, 0, 0, 0, 0, 1],
                    }),
                },
            ],
        };
        let mut data = PersistentReserveIn::marshall_datain(&status).unwrap();
        // descriptor, iSCSI id (29 chars + NUL -> 32), descriptor, SAS id
        assert_eq!(data.len(), 8 + 24 + 36 + 24 + 24);
        assert_eq!(data[8 + 20..8 + 24], [0, 0, 0, 36]);
        assert_eq!(data[8 + 24] & 0x0f, protocol_id::ISCSI);
        data.resize(1024, 0);
        assert_eq!(
            PersistentReserveIn::unmarshall_datain(PrInAction::ReadFullStatus, &data).unwrap(),
            status
        );
    }

    #[test]
    fn read_full_status_truncated() {
        let data = [0, 0, 0, 1, 0, 0, 0, 48, 0, 0];
        assert!(matches!(
            PersistentReserveIn::unmarshall_datain(PrInAction::ReadFullStatus, &data),
            Err(Error::Truncated { what: "PR IN parameter data", .. })
        ));
    }

    #[test]
    fn pr_out_basic() {
        let mut cmd = PersistentReserveOut::new(PrOutAction::Reserve, 0x0102030405060708);
        cmd.pr_type = pr_type::WRITE_EXCLUSIVE;
        cmd.aptpl = true;
        let opcode = SBC.get("PERSISTENT_RESERVE_OUT").unwrap();
        let cdb = cmd.cdb(opcode).unwrap();
        assert_eq!(cdb, [0x5f, 0x01, 0x01, 0, 0, 0, 0, 0, 24, 0]);
        let data = cmd.data_out().unwrap();
        assert_eq!(data.len(), 24);
        assert_eq!(data[..8], [1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(data[20], 0x01);

        cmd.transport_ids.push(iscsi("iqn.x"));
        assert!(matches!(cmd.data_out(), Err(Error::InvalidParameter { field: "transport_ids", .. })));
    }

    #[test]
    fn pr_out_register_spec_i_pt() {
        let mut cmd = PersistentReserveOut::new(PrOutAction::Register, 0);
        cmd.service_action_reservation_key = 0xabcd;
        cmd.spec_i_pt = true;
        cmd.transport_ids = vec![
            iscsi("iqn.a"),
            TransportId::FibreChannel {
                n_port_name: [0x21; 8],
            },
        ];
        let data = cmd.data_out().unwrap();
        assert_eq!(data[20], 0x08);
        assert_eq!(data[24..28], [0, 0, 0, 12 + 24]);
        assert_eq!(data.len(), 28 + 12 + 24);
        assert_eq!(TransportId::unmarshall(&data[28..]).unwrap(), (iscsi("iqn.a"), 12));
    }

    #[test]
    fn pr_out_register_and_move() {
        let mut cmd = PersistentReserveOut::new(PrOutAction::RegisterAndMove, 0x11);
        cmd.service_action_reservation_key = 0x22;
        cmd.unreg = true;
        cmd.relative_target_port_id = 0x0102;
        let data = cmd.data_out().unwrap();
        assert_eq!(data.len(), 24);
        assert_eq!(data[17..24], [0x02, 0x01, 0x02, 0, 0, 0, 0]);

        cmd.transport_ids.push(TransportId::Sas {
            sas_address: [0x50; 8],
        });
        let data = cmd.data_out().unwrap();
        assert_eq!(data.len(), 48);
        assert_eq!(data[20..24], [0, 0, 0, 24]);
        let cdb = cmd.cdb(SBC.get("PERSISTENT_RESERVE_OUT").unwrap()).unwrap();
        assert_eq!(cdb[1], 0x07);
        assert_eq!(cdb[5..9], [0, 0, 0, 48]);

        cmd.transport_ids.push(iscsi("iqn.b"));
        assert!(cmd.data_out().is_err());
    }
}
