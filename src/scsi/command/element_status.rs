//! READ ELEMENT STATUS, SMC-3 6.11
//!
//! The data-in is an 8-byte header followed by one element status page per
//! element type. Every page holds descriptors of one fixed length, given by
//! its `element_descriptor_length`.

use super::{Command, encode_cdb, slice};
use crate::scsi::error::{Error, Result};
use crate::scsi::field::{Layout, Record, bits};
use crate::scsi::opcode::Opcode;

pub mod element_type {
    pub const ALL: u8 = 0x00;
    pub const MEDIUM_TRANSPORT: u8 = 0x01;
    pub const STORAGE: u8 = 0x02;
    pub const IMPORT_EXPORT: u8 = 0x03;
    pub const DATA_TRANSFER: u8 = 0x04;
}

const HEADER: Layout = Layout::new(
    "element status data",
    8,
    &[
        ("first_element_address", bits(0xffff, 0)),
        ("num_elements", bits(0xffff, 2)),
        ("byte_count", bits(0xffffff, 5)),
    ],
);

const PAGE_HEADER: Layout = Layout::new(
    "element status page",
    8,
    &[
        ("element_type", bits(0x0f, 0)),
        ("pvoltag", bits(0x80, 1)),
        ("avoltag", bits(0x40, 1)),
        ("element_descriptor_length", bits(0xffff, 2)),
        ("byte_count", bits(0xffffff, 5)),
    ],
);

/// The fields every element descriptor starts with, SMC-3 6.11.5.
pub const ELEMENT_DESCRIPTOR: Layout = Layout::new(
    "element descriptor",
    12,
    &[
        ("element_address", bits(0xffff, 0)),
        ("access", bits(0x08, 2)),
        ("except", bits(0x04, 2)),
        ("full", bits(0x01, 2)),
        ("additional_sense_code", bits(0xff, 4)),
        ("additional_sense_code_qualifier", bits(0xff, 5)),
        ("svalid", bits(0x80, 9)),
        ("invert", bits(0x40, 9)),
        ("ed", bits(0x08, 9)),
        ("medium_type", bits(0x07, 9)),
        ("source_storage_element_address", bits(0xffff, 10)),
    ],
);

const DEVICE_IDENTIFIER: Layout = Layout::new(
    "device identifier",
    4,
    &[
        ("code_set", bits(0x0f, 0)),
        ("identifier_type", bits(0x0f, 1)),
        ("identifier_length", bits(0xff, 3)),
    ],
);

const VOLUME_TAG_LEN: usize = 36;

/// Medium transport descriptors carry no device identifier.
fn has_device_identifier(element_type: u8) -> bool {
    matches!(
        element_type,
        element_type::STORAGE | element_type::IMPORT_EXPORT | element_type::DATA_TRANSFER
    )
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceIdentifier {
    pub code_set: u8,
    pub identifier_type: u8,
    pub identifier: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ElementDescriptor {
    /// Decoded with [`ELEMENT_DESCRIPTOR`].
    pub fields: Record,
    pub primary_volume_tag: Option<Vec<u8>>,
    pub alternate_volume_tag: Option<Vec<u8>>,
    pub device_identifier: Option<DeviceIdentifier>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ElementStatusPage {
    pub element_type: u8,
    pub pvoltag: bool,
    pub avoltag: bool,
    pub descriptors: Vec<ElementDescriptor>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ElementStatus {
    pub first_element_address: u16,
    pub num_elements: u16,
    pub pages: Vec<ElementStatusPage>,
}

impl ElementDescriptor {
    fn unmarshall(data: &[u8], page: &ElementStatusPage) -> Result<ElementDescriptor> {
        let fields = ELEMENT_DESCRIPTOR.decode(data)?;
        let mut rest = &data[ELEMENT_DESCRIPTOR.size..];
        let mut volume_tag = |present: bool| -> Result<Option<Vec<u8>>> {
            if !present {
                return Ok(None);
            }
            let tag = slice(rest, 0, VOLUME_TAG_LEN, "volume tag")?.to_vec();
            rest = &rest[VOLUME_TAG_LEN..];
            Ok(Some(tag))
        };
        let primary_volume_tag = volume_tag(page.pvoltag)?;
        let alternate_volume_tag = volume_tag(page.avoltag)?;

        let device_identifier = if has_device_identifier(page.element_type) && rest.len() >= DEVICE_IDENTIFIER.size {
            let header = DEVICE_IDENTIFIER.decode(rest)?;
            let len = header.int("identifier_length") as usize;
            Some(DeviceIdentifier {
                code_set: header.int("code_set") as u8,
                identifier_type: header.int("identifier_type") as u8,
                identifier: slice(rest, DEVICE_IDENTIFIER.size, len, "device identifier")?.to_vec(),
            })
        } else {
            None
        };
        Ok(ElementDescriptor {
            fields,
            primary_volume_tag,
            alternate_volume_tag,
            device_identifier,
        })
    }

    /// Fails for values that would decode differently: a volume tag that
    /// does not match the page flags, or a missing device identifier on a
    /// page whose descriptors carry one.
    fn marshall(&self, page: &ElementStatusPage, len: usize) -> Result<Vec<u8>> {
        let mut buf = ELEMENT_DESCRIPTOR.encode(&self.fields)?;
        for (field, present, tag) in [
            ("primary_volume_tag", page.pvoltag, &self.primary_volume_tag),
            ("alternate_volume_tag", page.avoltag, &self.alternate_volume_tag),
        ] {
            match (present, tag) {
                (true, Some(tag)) if tag.len() == VOLUME_TAG_LEN => buf.extend_from_slice(tag),
                (true, Some(tag)) => {
                    return Err(Error::InvalidLength {
                        field,
                        value: tag.len() as u64,
                        expected: "36 bytes",
                    });
                }
                (true, None) => {
                    return Err(Error::invalid(field, "the page flags a volume tag but the descriptor has none"));
                }
                (false, Some(_)) => {
                    return Err(Error::invalid(field, "the page does not flag this volume tag"));
                }
                (false, None) => {}
            }
        }
        match &self.device_identifier {
            Some(_) if !has_device_identifier(page.element_type) => {
                return Err(Error::invalid(
                    "device_identifier",
                    format!("element type {:#x} has no device identifier", page.element_type),
                ));
            }
            Some(id) => {
                let header = Record::new()
                    .with("code_set", id.code_set)
                    .with("identifier_type", id.identifier_type)
                    .with("identifier_length", id.identifier.len());
                buf.extend(DEVICE_IDENTIFIER.encode_strict(&header)?);
                buf.extend_from_slice(&id.identifier);
            }
            // zero padding in its place would decode as an empty identifier
            None if len >= buf.len() + DEVICE_IDENTIFIER.size && has_device_identifier(page.element_type) => {
                return Err(Error::invalid(
                    "device_identifier",
                    "other descriptors on the page carry one, so this descriptor needs one too",
                ));
            }
            None => {}
        }
        buf.resize(len, 0);
        Ok(buf)
    }

    /// Bytes this descriptor needs inside `page`.
    fn encoded_len(&self, page: &ElementStatusPage) -> usize {
        let tags = VOLUME_TAG_LEN * (usize::from(page.pvoltag) + usize::from(page.avoltag));
        let id = self
            .device_identifier
            .as_ref()
            .map_or(0, |id| DEVICE_IDENTIFIER.size + id.identifier.len());
        ELEMENT_DESCRIPTOR.size + tags + id
    }
}

impl ElementStatusPage {
    fn unmarshall(data: &[u8]) -> Result<ElementStatusPage> {
        let header = PAGE_HEADER.decode(data)?;
        let mut page = ElementStatusPage {
            element_type: header.int("element_type") as u8,
            pvoltag: header.int("pvoltag") != 0,
            avoltag: header.int("avoltag") != 0,
            descriptors: Vec::new(),
        };
        let len = header.int("element_descriptor_length") as usize;
        let mut rest = &data[PAGE_HEADER.size..];
        if len == 0 && !rest.is_empty() {
            return Err(Error::InvalidLength {
                field: "element_descriptor_length",
                value: 0,
                expected: "non-zero when the page has descriptors",
            });
        }
        // A trailing partial descriptor means the allocation length cut the
        // report short.
        while rest.len() >= len && !rest.is_empty() {
            let descriptor = ElementDescriptor::unmarshall(&rest[..len], &page)?;
            page.descriptors.push(descriptor);
            rest = &rest[len..];
        }
        Ok(page)
    }

    fn marshall(&self) -> Result<Vec<u8>> {
        let len = self.descriptors.iter().map(|d| d.encoded_len(self)).max().unwrap_or(0);
        let mut body = Vec::with_capacity(len * self.descriptors.len());
        for descriptor in &self.descriptors {
            body.extend(descriptor.marshall(self, len)?);
        }
        let header = Record::new()
            .with("element_type", self.element_type)
            .with("pvoltag", self.pvoltag)
            .with("avoltag", self.avoltag)
            .with("element_descriptor_length", len)
            .with("byte_count", body.len());
        let mut buf = PAGE_HEADER.encode_strict(&header)?;
        buf.extend(body);
        Ok(buf)
    }
}

/// READ ELEMENT STATUS, SMC-3 6.11
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReadElementStatus {
    pub element_type: u8,
    pub voltag: bool,
    pub starting_element_address: u16,
    pub num_elements: u16,
    pub curdata: bool,
    pub dvcid: bool,
    pub alloc_len: u32,
}

impl ReadElementStatus {
    pub const CDB: Layout = Layout::new(
        "ReadElementStatus",
        12,
        &[
            ("opcode", bits(0xff, 0)),
            ("voltag", bits(0x10, 1)),
            ("element_type", bits(0x07, 1)),
            ("starting_element_address", bits(0xffff, 2)),
            ("num_elements", bits(0xffff, 4)),
            ("curdata", bits(0x02, 6)),
            ("dvcid", bits(0x01, 6)),
            ("alloc_len", bits(0xffffff, 7)),
        ],
    );

    /// Status of all element types, without volume tags.
    pub fn new(starting_element_address: u16, num_elements: u16) -> Self {
        Self {
            element_type: element_type::ALL,
            voltag: false,
            starting_element_address,
            num_elements,
            curdata: true,
            dvcid: false,
            alloc_len: 16384,
        }
    }

    /// Decodes the report. A device reports the byte count of the whole
    /// report even when the allocation length was smaller, so only the pages
    /// and descriptors that were actually returned are decoded.
    pub fn unmarshall_datain(data: &[u8]) -> Result<ElementStatus> {
        let header = HEADER.decode(data)?;
        let end = (HEADER.size + header.int("byte_count") as usize).min(data.len());
        let mut rest = &data[HEADER.size..end];
        let mut pages = Vec::new();
        while rest.len() >= PAGE_HEADER.size {
            let page_len = PAGE_HEADER.size + PAGE_HEADER.decode(rest)?.int("byte_count") as usize;
            let page_len = page_len.min(rest.len());
            pages.push(ElementStatusPage::unmarshall(&rest[..page_len])?);
            rest = &rest[page_len..];
        }
        Ok(ElementStatus {
            first_element_address: header.int("first_element_address") as u16,
            num_elements: header.int("num_elements") as u16,
            pages,
        })
    }

    pub fn marshall_datain(status: &ElementStatus) -> Result<Vec<u8>> {
        let mut body = Vec::new();
        for page in &status.pages {
            body.extend(page.marshall()?);
        }
        let header = Record::new()
            .with("first_element_address", status.first_element_address)
            .with("num_elements", status.num_elements)
            .with("byte_count", body.len());
        let mut buf = HEADER.encode_strict(&header)?;
        buf.extend(body);
        Ok(buf)
    }
}

impl Command for ReadElementStatus {
    const OPCODE: &'static str = "READ_ELEMENT_STATUS";
    type Output = ElementStatus;

    fn cdb(&self, opcode: &Opcode) -> Result<Vec<u8>> {
        let record = Record::new()
            .with("voltag", self.voltag)
            .with("element_type", self.element_type)
            .with("starting_element_address", self.starting_element_address)
            .with("num_elements", self.num_elements)
            .with("curdata", self.curdata)
            .with("dvcid", self.dvcid)
            .with("alloc_len", self.alloc_len);
        encode_cdb(&Self::CDB, opcode, &record)
    }

    fn data_in_len(&self) -> Result<usize> {
        Ok(self.alloc_len as usize)
    }

    fn unmarshall(&self, data_in: &[u8]) -> Result<ElementStatus> {
        Self::unmarshall_datain(data_in)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scsi::opcode::SMC;

    fn descriptor(address: u16, flags: u8, medium: u8, source: u16) -> Vec<u8> {
        let mut d = vec![0u8; 16];
        d[..2].copy_from_slice(&address.to_be_bytes());
        d[2] = flags;
        d[4] = 55;
        d[5] = 56;
        d[9] = medium;
        d[10..12].copy_from_slice(&source.to_be_bytes());
        d
    }

    fn page(element_type: u8, descriptors: &[Vec<u8>]) -> Vec<u8> {
        let mut p = vec![element_type, 0, 0, 16, 0, 0, 0, 0];
        p[7] = (16 * descriptors.len()) as u8;
        for d in descriptors {
            p.extend(d);
        }
        p
    }

    fn report() -> Vec<u8> {
        let mut data = vec![0, 12, 0, 3, 0, 0, 0, 0];
        data.extend(page(element_type::STORAGE, &[descriptor(12, 0x0d, 0xca, 27)]));
        data.extend(page(
            element_type::DATA_TRANSFER,
            &[descriptor(13, 0x0c, 0xcf, 28), descriptor(14, 0x08, 0x86, 29)],
        ));
        data[7] = (data.len() - 8) as u8;
        data
    }

    #[test]
    fn cdb() {
        let mut res = ReadElementStatus::new(300, 700);
        res.element_type = element_type::STORAGE;
        res.voltag = true;
        res.dvcid = true;
        let cdb = res.cdb(SMC.get("READ_ELEMENT_STATUS").unwrap()).unwrap();
        assert_eq!(cdb, [0xb8, 0x12, 0x01, 0x2c, 0x02, 0xbc, 0x03, 0x00, 0x40, 0x00, 0, 0]);
        let decoded = ReadElementStatus::CDB.decode(&cdb).unwrap();
        assert_eq!(decoded.int("starting_element_address"), 300);
        assert_eq!(decoded.int("alloc_len"), 16384);
        assert_eq!(res.data_in_len().unwrap(), 16384);
    }

    #[test]
    fn two_pages() {
        let status = ReadElementStatus::unmarshall_datain(&report()).unwrap();
        assert_eq!(status.first_element_address, 12);
        assert_eq!(status.num_elements, 3);
        assert_eq!(status.pages.len(), 2);

        let storage = &status.pages[0];
        assert_eq!(storage.element_type, element_type::STORAGE);
        assert!(!storage.pvoltag && !storage.avoltag);
        assert_eq!(storage.descriptors.len(), 1);
        let d = &storage.descriptors[0].fields;
        assert_eq!(d.int("element_address"), 12);
        assert_eq!((d.int("access"), d.int("except"), d.int("full")), (1, 1, 1));
        assert_eq!(d.int("additional_sense_code"), 55);
        assert_eq!(d.int("additional_sense_code_qualifier"), 56);
        assert_eq!((d.int("svalid"), d.int("invert"), d.int("ed")), (1, 1, 1));
        assert_eq!(d.int("medium_type"), 2);
        assert_eq!(d.int("source_storage_element_address"), 27);

        let drives = &status.pages[1];
        assert_eq!(drives.element_type, element_type::DATA_TRANSFER);
        assert_eq!(drives.descriptors.len(), 2);
        let d = &drives.descriptors[0].fields;
        assert_eq!((d.int("access"), d.int("except"), d.int("full")), (1, 1, 0));
        assert_eq!(d.int("medium_type"), 7);
        let d = &drives.descriptors[1].fields;
        assert_eq!(d.int("element_address"), 14);
        assert_eq!((d.int("svalid"), d.int("invert"), d.int("ed")), (1, 0, 0));
        assert_eq!(d.int("medium_type"), 6);
        assert_eq!(d.int("source_storage_element_address"), 29);
        assert_eq!(
            drives.descriptors[1].device_identifier,
            Some(DeviceIdentifier {
                code_set: 0,
                identifier_type: 0,
                identifier: Vec::new(),
            })
        );
    }

    #[test]
    fn encodes_to_the_same_bytes() {
        let data = report();
        let status = ReadElementStatus::unmarshall_datain(&data).unwrap();
        let encoded = ReadElementStatus::marshall_datain(&status).unwrap();
        assert_eq!(encoded, data);
        assert_eq!(ReadElementStatus::unmarshall_datain(&encoded).unwrap(), status);
    }

    #[test]
    fn volume_tags_and_identifiers() {
        let tag = |s: &[u8]| {
            let mut t = s.to_vec();
            t.resize(VOLUME_TAG_LEN, b' ');
            t
        };
        let status = ElementStatus {
            first_element_address: 0x100,
            num_elements: 2,
            pages: vec![
                ElementStatusPage {
                    element_type: element_type::MEDIUM_TRANSPORT,
                    pvoltag: false,
                    avoltag: false,
                    descriptors: vec![ElementDescriptor {
                        fields: Record::new().with("element_address", 0x100u16),
                        primary_volume_tag: None,
                        alternate_volume_tag: None,
                        device_identifier: None,
                    }],
                },
                ElementStatusPage {
                    element_type: element_type::DATA_TRANSFER,
                    pvoltag: true,
                    avoltag: true,
                    descriptors: vec![ElementDescriptor {
                        fields: Record::new().with("element_address", 0x200u16).with("full", true),
                        primary_volume_tag: Some(tag(b"A00001L8")),
                        alternate_volume_tag: Some(tag(b"B00001L8")),
                        device_identifier: Some(DeviceIdentifier {
                            code_set: 2,
                            identifier_type: 1,
                            identifier: b"IBM     ULT3580-TD8 1234".to_vec(),
                        }),
                    }],
                },
            ],
        };
        let data = ReadElementStatus::marshall_datain(&status).unwrap();
        // 8 + (8 + 12) + (8 + 12 + 36 + 36 + 4 + 24)
        assert_eq!(data.len(), 148);
        assert_eq!(data[5..8], [0, 0, 140]);
        assert_eq!(data[10..12], [0, 12]);
        let drive = &data[28..];
        assert_eq!(drive[1], 0xc0);
        assert_eq!(drive[2..4], [0, 112]);
        assert_eq!(&drive[20..28], b"A00001L8");
        assert_eq!(&drive[56..64], b"B00001L8");
        assert_eq!(drive[92..96], [2, 1, 0, 24]);

        let decoded = ReadElementStatus::unmarshall_datain(&data).unwrap();
        let drive = &decoded.pages[1].descriptors[0];
        assert_eq!(drive.fields.int("full"), 1);
        assert_eq!(drive.primary_volume_tag, Some(tag(b"A00001L8")));
        assert_eq!(drive.device_identifier, status.pages[1].descriptors[0].device_identifier);
        assert_eq!(ReadElementStatus::marshall_datain(&decoded).unwrap(), data);
    }

    #[test]
    fn report_cut_short_by_allocation_length() {
        let data = report();
        // second page keeps only its first descriptor
        let cut = &data[..data.len() - 16];
        let status = ReadElementStatus::unmarshall_datain(cut).unwrap();
        assert_eq!(status.pages.len(), 2);
        assert_eq!(status.pages[1].descriptors.len(), 1);
    }

    #[test]
    fn byte_count_bounds_the_pages() {
        let mut data = report();
        data[7] = 24;
        data.extend([0xff; 32]);
        let status = ReadElementStatus::unmarshall_datain(&data).unwrap();
        assert_eq!(status.pages.len(), 1);
    }

    fn element(address: u16, tag: Option<&str>, id: Option<&str>) -> ElementDescriptor {
        let fields = Record::new().with("element_address", address).with("full", tag.is_some());
        ElementDescriptor {
            fields: ELEMENT_DESCRIPTOR
                .decode(&ELEMENT_DESCRIPTOR.encode(&fields).unwrap())
                .unwrap(),
            primary_volume_tag: tag.map(|t| {
                let mut t = t.as_bytes().to_vec();
                t.resize(VOLUME_TAG_LEN, b' ');
                t
            }),
            alternate_volume_tag: None,
            device_identifier: id.map(|id| DeviceIdentifier {
                code_set: 2,
                identifier_type: 1,
                identifier: id.as_bytes().to_vec(),
            }),
        }
    }

    fn storage(descriptors: Vec<ElementDescriptor>) -> ElementStatusPage {
        ElementStatusPage {
            element_type: element_type::STORAGE,
            pvoltag: true,
            avoltag: false,
            descriptors,
        }
    }

    #[test]
    fn decodes_what_it_encodes() {
        let status = ElementStatus {
            first_element_address: 0x100,
            num_elements: 5,
            pages: vec![
                ElementStatusPage {
                    element_type: element_type::MEDIUM_TRANSPORT,
                    pvoltag: false,
                    avoltag: false,
                    descriptors: vec![element(0x100, None, None)],
                },
                storage(vec![
                    element(0x200, Some("A00001L8"), Some("SLOT0")),
                    element(0x201, Some(""), Some("SLOT0001")),
                ]),
                ElementStatusPage {
                    element_type: element_type::IMPORT_EXPORT,
                    pvoltag: false,
                    avoltag: false,
                    descriptors: vec![element(0x300, None, None), element(0x301, None, None)],
                },
            ],
        };
        let data = ReadElementStatus::marshall_datain(&status).unwrap();
        // import/export descriptors without identifiers stay at 12 bytes
        assert_eq!(data[data.len() - 32 + 2..data.len() - 32 + 4], [0, 12]);
        assert_eq!(ReadElementStatus::unmarshall_datain(&data).unwrap(), status);
    }

    #[test]
    fn rejects_descriptors_that_decode_differently() {
        let missing_tag = storage(vec![element(0x200, None, Some("SLOT0"))]);
        assert!(matches!(
            missing_tag.marshall(),
            Err(Error::InvalidParameter { field: "primary_volume_tag", .. })
        ));

        let mut short_tag = storage(vec![element(0x200, Some("A00001L8"), None)]);
        short_tag.descriptors[0].primary_volume_tag = Some(b"A00001L8".to_vec());
        assert!(matches!(
            short_tag.marshall(),
            Err(Error::InvalidLength { field: "primary_volume_tag", value: 8, .. })
        ));

        let mut unflagged = storage(vec![element(0x200, Some("A00001L8"), None)]);
        unflagged.pvoltag = false;
        assert!(matches!(
            unflagged.marshall(),
            Err(Error::InvalidParameter { field: "primary_volume_tag", .. })
        ));

        let mixed = storage(vec![
            element(0x200, Some("A00001L8"), Some("SLOT0")),
            element(0x201, Some("A00002L8"), None),
        ]);
        assert!(matches!(
            mixed.marshall(),
            Err(Error::InvalidParameter { field: "device_identifier", .. })
        ));
    }

    #[test]
    fn medium_transport_has_no_identifier() {
        let page = ElementStatusPage {
            element_type: element_type::MEDIUM_TRANSPORT,
            pvoltag: false,
            avoltag: false,
            descriptors: vec![ElementDescriptor {
                fields: Record::new(),
                primary_volume_tag: None,
                alternate_volume_tag: None,
                device_identifier: Some(DeviceIdentifier {
                    code_set: 1,
                    identifier_type: 0,
                    identifier: vec![1],
                }),
            }],
        };
        assert!(matches!(page.marshall(), Err(Error::InvalidParameter { .. })));
    }
}
