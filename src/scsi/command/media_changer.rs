//! Medium changer commands, SMC-3 6.
//!
//! All of these only carry a CDB: no data is transferred in either
//! direction.

use super::{Command, encode_cdb};
use crate::scsi::error::Result;
use crate::scsi::field::{Layout, Record, bits};
use crate::scsi::opcode::Opcode;

/// MOVE MEDIUM, SMC-3 6.5
///
/// Moves a unit of media from `source_address` to `destination_address`
/// using the medium transport element at `medium_transport_address`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MoveMedium {
    pub medium_transport_address: u16,
    pub source_address: u16,
    pub destination_address: u16,
    /// Rotate the medium before depositing it.
    pub invert: bool,
}

impl MoveMedium {
    pub const CDB: Layout = Layout::new(
        "MoveMedium",
        12,
        &[
            ("opcode", bits(0xff, 0)),
            ("medium_transport_address", bits(0xffff, 2)),
            ("source_address", bits(0xffff, 4)),
            ("destination_address", bits(0xffff, 6)),
            ("invert", bits(0x01, 10)),
        ],
    );

    pub fn new(medium_transport_address: u16, source_address: u16, destination_address: u16) -> Self {
        Self {
            medium_transport_address,
            source_address,
            destination_address,
            invert: false,
        }
    }
}

impl Command for MoveMedium {
    const OPCODE: &'static str = "MOVE_MEDIUM";
    type Output = ();

    fn cdb(&self, opcode: &Opcode) -> Result<Vec<u8>> {
        let record = Record::new()
            .with("medium_transport_address", self.medium_transport_address)
            .with("source_address", self.source_address)
            .with("destination_address", self.destination_address)
            .with("invert", self.invert);
        encode_cdb(&Self::CDB, opcode, &record)
    }

    fn unmarshall(&self, _data_in: &[u8]) -> Result<()> {
        Ok(())
    }
}

/// EXCHANGE MEDIUM, SMC-3 6.2
///
/// Moves the medium in `source_address` to `first_destination_address` and
/// the medium that was there on to `second_destination_address`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExchangeMedium {
    pub medium_transport_address: u16,
    pub source_address: u16,
    pub first_destination_address: u16,
    pub second_destination_address: u16,
    pub inv1: bool,
    pub inv2: bool,
}

impl ExchangeMedium {
    pub const CDB: Layout = Layout::new(
        "ExchangeMedium",
        12,
        &[
            ("opcode", bits(0xff, 0)),
            ("medium_transport_address", bits(0xffff, 2)),
            ("source_address", bits(0xffff, 4)),
            ("first_destination_address", bits(0xffff, 6)),
            ("second_destination_address", bits(0xffff, 8)),
            ("inv1", bits(0x02, 10)),
            ("inv2", bits(0x01, 10)),
        ],
    );

    pub fn new(
        medium_transport_address: u16,
        source_address: u16,
        first_destination_address: u16,
        second_destination_address: u16,
    ) -> Self {
        Self {
            medium_transport_address,
            source_address,
            first_destination_address,
            second_destination_address,
            inv1: false,
            inv2: false,
        }
    }
}

impl Command for ExchangeMedium {
    const OPCODE: &'static str = "EXCHANGE_MEDIUM";
    type Output = ();

    fn cdb(&self, opcode: &Opcode) -> Result<Vec<u8>> {
        let record = Record::new()
            .with("medium_transport_address", self.medium_transport_address)
            .with("source_address", self.source_address)
            .with("first_destination_address", self.first_destination_address)
            .with("second_destination_address", self.second_destination_address)
            .with("inv1", self.inv1)
            .with("inv2", self.inv2);
        encode_cdb(&Self::CDB, opcode, &record)
    }

    fn unmarshall(&self, _data_in: &[u8]) -> Result<()> {
        Ok(())
    }
}

/// POSITION TO ELEMENT, SMC-3 6.9
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PositionToElement {
    pub medium_transport_address: u16,
    pub destination_address: u16,
    pub invert: bool,
}

impl PositionToElement {
    pub const CDB: Layout = Layout::new(
        "PositionToElement",
        10,
        &[
            ("opcode", bits(0xff, 0)),
            ("medium_transport_address", bits(0xffff, 2)),
            ("destination_address", bits(0xffff, 4)),
            ("invert", bits(0x01, 8)),
        ],
    );
}

impl Command for PositionToElement {
    const OPCODE: &'static str = "POSITION_TO_ELEMENT";
    type Output = ();

    fn cdb(&self, opcode: &Opcode) -> Result<Vec<u8>> {
        let record = Record::new()
            .with("medium_transport_address", self.medium_transport_address)
            .with("destination_address", self.destination_address)
            .with("invert", self.invert);
        encode_cdb(&Self::CDB, opcode, &record)
    }

    fn unmarshall(&self, _data_in: &[u8]) -> Result<()> {
        Ok(())
    }
}

/// INITIALIZE ELEMENT STATUS, SMC-3 6.3
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InitializeElementStatus;

impl InitializeElementStatus {
    pub const CDB: Layout = Layout::new("InitializeElementStatus", 6, &[("opcode", bits(0xff, 0))]);
}

impl Command for InitializeElementStatus {
    const OPCODE: &'static str = "INITIALIZE_ELEMENT_STATUS";
    type Output = ();

    fn cdb(&self, opcode: &Opcode) -> Result<Vec<u8>> {
        encode_cdb(&Self::CDB, opcode, &Record::new())
    }

    fn unmarshall(&self, _data_in: &[u8]) -> Result<()> {
        Ok(())
    }
}

/// INITIALIZE ELEMENT STATUS WITH RANGE, SMC-3 6.4
///
/// Without `range` the whole library is checked and the addresses are
/// ignored by the device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InitializeElementStatusWithRange {
    pub starting_element_address: u16,
    pub number_of_elements: u16,
    pub range: bool,
    pub fast: bool,
}

impl InitializeElementStatusWithRange {
    pub const CDB: Layout = Layout::new(
        "InitializeElementStatusWithRange",
        10,
        &[
            ("opcode", bits(0xff, 0)),
            ("fast", bits(0x02, 1)),
            ("range", bits(0x01, 1)),
            ("starting_element_address", bits(0xffff, 2)),
            ("number_of_elements", bits(0xffff, 6)),
        ],
    );
}

impl Command for InitializeElementStatusWithRange {
    const OPCODE: &'static str = "INITIALIZE_ELEMENT_STATUS_WITH_RANGE";
    type Output = ();

    fn cdb(&self, opcode: &Opcode) -> Result<Vec<u8>> {
        let record = Record::new()
            .with("fast", self.fast)
            .with("range", self.range)
            .with("starting_element_address", self.starting_element_address)
            .with("number_of_elements", self.number_of_elements);
        encode_cdb(&Self::CDB, opcode, &record)
    }

    fn unmarshall(&self, _data_in: &[u8]) -> Result<()> {
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImportExportAction {
    Open,
    Close,
}

impl ImportExportAction {
    fn name(self) -> &'static str {
        match self {
            ImportExportAction::Open => "OPEN_IMPORTEXPORT_ELEMENT",
            ImportExportAction::Close => "CLOSE_IMPORTEXPORT_ELEMENT",
        }
    }
}

/// OPEN/CLOSE IMPORT/EXPORT ELEMENT, SMC-3 6.6
///
/// The service action goes in the ACTION CODE field of byte 4.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OpenCloseImportExportElement {
    pub element_address: u16,
    pub action: ImportExportAction,
}

impl OpenCloseImportExportElement {
    pub const CDB: Layout = Layout::new(
        "OpenCloseImportExportElement",
        6,
        &[
            ("opcode", bits(0xff, 0)),
            ("element_address", bits(0xffff, 2)),
            ("action_code", bits(0x1f, 4)),
        ],
    );
}

impl Command for OpenCloseImportExportElement {
    const OPCODE: &'static str = "OPEN_CLOSE_IMPORT_EXPORT_ELEMENT";
    type Output = ();

    fn cdb(&self, opcode: &Opcode) -> Result<Vec<u8>> {
        let record = Record::new()
            .with("element_address", self.element_address)
            .with("action_code", opcode.service_action(self.action.name())?);
        encode_cdb(&Self::CDB, opcode, &record)
    }

    fn unmarshall(&self, _data_in: &[u8]) -> Result<()> {
        Ok(())
    }
}
