//! TransportIDs, SPC-4 7.6.4.
//!
//! A TransportID names an initiator port in a protocol specific way. Every
//! form is 24 bytes except iSCSI, whose length is carried in bytes 2..4.

use super::length_at;
use crate::scsi::error::{Error, Result};
use crate::scsi::field::{Layout, Record, bits};

pub mod protocol_id {
    pub const FIBRE_CHANNEL: u8 = 0x00;
    pub const IEEE_1394: u8 = 0x03;
    pub const RDMA: u8 = 0x04;
    pub const ISCSI: u8 = 0x05;
    pub const SAS: u8 = 0x06;
    pub const SOP: u8 = 0x0a;
}

const HEADER: Layout = Layout::new(
    "TransportID",
    4,
    &[
        ("tpid_format", bits(0xc0, 0)),
        ("protocol_id", bits(0x0f, 0)),
        ("additional_length", bits(0xffff, 2)),
    ],
);

const FIXED_LEN: usize = 24;

/// Separates the iSCSI name from the initiator session id in format 01b.
const ISID_SEPARATOR: &str = ",i,0x";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportId {
    FibreChannel { n_port_name: [u8; 8] },
    Ieee1394 { eui64_name: [u8; 8] },
    Rdma { initiator_port_identifier: [u8; 16] },
    /// Format 00b carries only the name, format 01b the name and the
    /// initiator session id (as hex digits, without the `0x`).
    Iscsi {
        iscsi_name: String,
        initiator_session_id: Option<String>,
    },
    Sas { sas_address: [u8; 8] },
    Sop { routing_id: [u8; 8] },
}

fn array<const N: usize>(data: &[u8], offset: usize) -> Result<[u8; N]> {
    let mut out = [0; N];
    out.copy_from_slice(
        data.get(offset..offset + N)
            .ok_or_else(|| Error::truncated("TransportID", offset + N, data.len()))?,
    );
    Ok(out)
}

impl TransportId {
    pub fn protocol_id(&self) -> u8 {
        match self {
            TransportId::FibreChannel { .. } => protocol_id::FIBRE_CHANNEL,
            TransportId::Ieee1394 { .. } => protocol_id::IEEE_1394,
            TransportId::Rdma { .. } => protocol_id::RDMA,
            TransportId::Iscsi { .. } => protocol_id::ISCSI,
            TransportId::Sas { .. } => protocol_id::SAS,
            TransportId::Sop { .. } => protocol_id::SOP,
        }
    }

    pub fn tpid_format(&self) -> u8 {
        match self {
            TransportId::Iscsi {
                initiator_session_id: Some(_),
                ..
            } => 1,
            _ => 0,
        }
    }

    /// Decodes the TransportID at the start of `data`, returning it and the
    /// number of bytes it occupies.
    pub fn unmarshall(data: &[u8]) -> Result<(TransportId, usize)> {
        let header = HEADER.decode(data)?;
        let format = header.int("tpid_format") as u8;
        let id = match header.int("protocol_id") as u8 {
            protocol_id::FIBRE_CHANNEL => TransportId::FibreChannel {
                n_port_name: array(data, 8)?,
            },
            protocol_id::IEEE_1394 => TransportId::Ieee1394 {
                eui64_name: array(data, 8)?,
            },
            protocol_id::RDMA => TransportId::Rdma {
                initiator_port_identifier: array(data, 8)?,
            },
            protocol_id::SAS => TransportId::Sas {
                sas_address: array(data, 4)?,
            },
            protocol_id::SOP => TransportId::Sop {
                routing_id: array(data, 4)?,
            },
            protocol_id::ISCSI => {
                let len = length_at(data, 2, 2, "iSCSI TransportID")?;
                let raw = data
                    .get(4..4 + len)
                    .ok_or_else(|| Error::truncated("iSCSI TransportID", 4 + len, data.len()))?;
                let text = std::str::from_utf8(raw)
                    .map_err(|e| Error::invalid("iscsi_name", e.to_string()))?
                    .trim_end_matches('\0');
                let id = match format {
                    0 => TransportId::Iscsi {
                        iscsi_name: text.to_string(),
                        initiator_session_id: None,
                    },
                    1 => {
                        let (name, isid) = text.split_once(ISID_SEPARATOR).ok_or_else(|| {
                            Error::invalid("iscsi_name", format!("{text:?} has no initiator session id"))
                        })?;
                        TransportId::Iscsi {
                            iscsi_name: name.to_string(),
                            initiator_session_id: Some(isid.to_string()),
                        }
                    }
                    format => {
                        return Err(Error::Unsupported {
                            what: "iSCSI TPID FORMAT",
                            code: u64::from(format),
                        });
                    }
                };
                return Ok((id, 4 + len));
            }
            code => {
                return Err(Error::Unsupported {
                    what: "TransportID protocol",
                    code: u64::from(code),
                });
            }
        };
        if data.len() < FIXED_LEN {
            return Err(Error::truncated("TransportID", FIXED_LEN, data.len()));
        }
        Ok((id, FIXED_LEN))
    }

    pub fn marshall(&self) -> Result<Vec<u8>> {
        let mut header = Record::new()
            .with("tpid_format", self.tpid_format())
            .with("protocol_id", self.protocol_id());
        let mut buf = vec![0; FIXED_LEN];
        match self {
            TransportId::FibreChannel { n_port_name: id } | TransportId::Ieee1394 { eui64_name: id } => {
                buf[8..16].copy_from_slice(id)
            }
            TransportId::Rdma {
                initiator_port_identifier,
            } => buf[8..24].copy_from_slice(initiator_port_identifier),
            TransportId::Sas { sas_address: id } | TransportId::Sop { routing_id: id } => {
                buf[4..12].copy_from_slice(id)
            }
            TransportId::Iscsi {
                iscsi_name,
                initiator_session_id,
            } => {
                let mut text = iscsi_name.clone();
                if let Some(isid) = initiator_session_id {
                    text.push_str(ISID_SEPARATOR);
                    text.push_str(isid);
                }
                // Null terminated, padded to a multiple of four.
                let len = (text.len() + 1).next_multiple_of(4);
                let additional_length = u16::try_from(len).map_err(|_| Error::InvalidLength {
                    field: "additional_length",
                    value: len as u64,
                    expected: "at most 65535",
                })?;
                header.insert("additional_length", additional_length);
                buf = vec![0; 4 + len];
                buf[4..4 + text.len()].copy_from_slice(text.as_bytes());
            }
        }
        HEADER.encode_into(&header, &mut buf, false)?;
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_forms() {
        let ids = [
            TransportId::FibreChannel {
                n_port_name: [1, 2, 3, 4, 5, 6, 7, 8],
            },
            TransportId::Ieee1394 {
                eui64_name: [8, 7, 6, 5, 4, 3, 2, 1],
            },
            TransportId::Rdma {
                initiator_port_identifier: [0xaa; 16],
            },
            TransportId::Sas {
                sas_address: [0x50, 0, 0x0c, 0x29, 0x11, 0x22, 0x33, 0x44],
            },
            TransportId::Sop {
                routing_id: [0, 0x10, 0, 0, 0, 0, 0, 0],
            },
        ];
        for id in ids {
            let data = id.marshall().unwrap();
            assert_eq!(data.len(), 24);
            assert_eq!(data[0], id.protocol_id());
            assert_eq!(TransportId::unmarshall(&data).unwrap(), (id, 24));
        }
    }

    #[test]
    fn sas_address_position() {
        let mut data = [0u8; 24];
        data[0] = protocol_id::SAS;
        data[4..12].copy_from_slice(&[0x50, 1, 2, 3, 4, 5, 6, 7]);
        let (id, _) = TransportId::unmarshall(&data).unwrap();
        assert_eq!(
            id,
            TransportId::Sas {
                sas_address: [0x50, 1, 2, 3, 4, 5, 6, 7]
            }
        );
    }

    #[test]
    fn iscsi_name_only() {
        let id = TransportId::Iscsi {
            iscsi_name: "iqn.2001-04.com.example".to_string(),
            initiator_session_id: None,
        };
        let data = id.marshall().unwrap();
        // 23 characters plus the terminator round up to 24
        assert_eq!(data.len(), 28);
        assert_eq!(data[..4], [0x05, 0x00, 0x00, 24]);
        assert_eq!(data[27], 0);
        assert_eq!(TransportId::unmarshall(&data).unwrap(), (id, 28));
    }

    #[test]
    fn iscsi_with_session_id() {
        let id = TransportId::Iscsi {
            iscsi_name: "iqn.2001-04.com.example".to_string(),
            initiator_session_id: Some("123456789abc".to_string()),
        };
        let data = id.marshall().unwrap();
        assert_eq!(data[0], 0x45);
        let text = b"iqn.2001-04.com.example,i,0x123456789abc";
        assert_eq!(data[4..4 + text.len()], text[..]);
        assert_eq!((data.len() - 4) % 4, 0);
        assert_eq!(TransportId::unmarshall(&data).unwrap().0, id);
    }

    #[test]
    fn iscsi_format_1_without_separator() {
        let mut data = vec![0x45, 0, 0, 8];
        data.extend(b"iqn.x\0\0\0");
        assert!(matches!(
            TransportId::unmarshall(&data),
            Err(Error::InvalidParameter { field: "iscsi_name", .. })
        ));
    }

    #[test]
    fn unknown_protocol() {
        let mut data = [0u8; 24];
        data[0] = 0x01;
        assert!(matches!(
            TransportId::unmarshall(&data),
            Err(Error::Unsupported { what: "TransportID protocol", code: 1 })
        ));
    }
}
