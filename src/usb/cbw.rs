//! The command and status wrappers that carry a CDB over the bulk-only
//! transport.

use color_eyre::Result;
use color_eyre::eyre::ensure;

/// Signature that identifies a packet as a CBW.
///
/// This packet contains the below magic number (little endian).
///
/// See USB Mass Storage Class - Bulk Only Transport, section 5
pub const CBW_SIGNATURE: u32 = 0x43425355;
/// Signature that identifies a packet as a CSW.
///
/// The packet will start with the below magic number (little endian).
pub const CSW_SIGNATURE: u32 = 0x53425355;

/// A command block wrapper is *always* 31 bytes in size
pub const CBW_SIZE: usize = 31;
/// A command status wrapper is *always* 13 bytes in size
pub const CSW_SIZE: usize = 13;

/// The longest CDB a CBW can hold.
pub const MAX_CDB_SIZE: usize = 16;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Data-Out: from host to the device
    Out,
    /// Data-In: from the device to the host
    In,
}

impl Direction {
    /// `bmCBWFlags`: bit 7 set for Data-In. The device ignores it when the
    /// transfer length is zero.
    fn flags(self) -> u8 {
        match self {
            Direction::Out => 0x00,
            Direction::In => 0x80,
        }
    }
}

/// The CBW wraps an SCSI command.
///
/// Spec info can be found in the USB Mass Storage Class - Bulk Only Transport document,
/// section 5.1.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandBlockWrapper {
    /// `dCBWTag` - "A Command Block Tag sent by the host. The device shall echo
    /// the contents of this field back to the host in the [tag] field of the associated CSW.
    /// The [tag] positvely associates a CSW with the corrosponding CBW"
    ///
    /// See [`TagGenerator`] for tooling.
    pub tag: u32,
    /// `dCBWDataTransferLength` - "The number of bytes that the host expects
    /// to transfer on the Bulk-In or Bulk-Out endpoint (as indicated by the
    /// *Direction* bit) during the execution of this command."
    pub data_transfer_length: u32,
    pub direction: Direction,
    /// `bCBWLUN` - "The device Logical Unit Number (LUN) to which the command block
    /// is being sent."
    pub lun: u8,
    /// `CBWCB`, of which the first `bCBWCBLength` bytes are significant.
    command: [u8; MAX_CDB_SIZE],
    command_block_length: u8,
}

impl CommandBlockWrapper {
    /// Creates a new [`CommandBlockWrapper`] around `cdb`, which must be 1 to
    /// 16 bytes long.
    pub fn new(cdb: &[u8], data_transfer_length: u32, direction: Direction, tag: u32, lun: u8) -> Result<Self> {
        ensure!(
            (1..=MAX_CDB_SIZE).contains(&cdb.len()),
            "a CBW holds a 1 to {MAX_CDB_SIZE} byte command block, got {} bytes",
            cdb.len()
        );
        ensure!(lun <= 0x0f, "bCBWLUN is 4 bits wide, got LUN {lun}");
        let mut command = [0; MAX_CDB_SIZE];
        command[..cdb.len()].copy_from_slice(cdb);
        Ok(Self {
            tag,
            data_transfer_length,
            direction,
            lun,
            command,
            command_block_length: cdb.len() as u8,
        })
    }

    pub fn cdb(&self) -> &[u8] {
        &self.command[..usize::from(self.command_block_length)]
    }

    /// The wire form: exactly [`CBW_SIZE`] bytes, little endian.
    pub fn to_bytes(&self) -> [u8; CBW_SIZE] {
        let mut buf = [0u8; CBW_SIZE];
        buf[0..4].copy_from_slice(&CBW_SIGNATURE.to_le_bytes());
        buf[4..8].copy_from_slice(&self.tag.to_le_bytes());
        buf[8..12].copy_from_slice(&self.data_transfer_length.to_le_bytes());
        buf[12] = self.direction.flags();
        buf[13] = self.lun;
        buf[14] = self.command_block_length;
        buf[15..31].copy_from_slice(&self.command);
        buf
    }
}

/// `bCSWStatus`
///
/// | Value | Description                    |
/// | ----- | ------------------------------ |
/// | 0x00  | Command Passed ("good status") |
/// | 0x01  | Command Failed                 |
/// | 0x02  | Phase Error                    |
/// | _     | All other values are reserved  |
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CommandStatus {
    Passed = 0,
    Failed = 1,
    PhaseError = 2,
}

/// A packet containing the status/return value of a command block executed by the USB device.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CommandStatusWrapper {
    /// `dCSWTag` - "The device shall set this field to the value received in the *dCBWTag* of
    /// the associated CBW."
    pub tag: u32,
    /// `dCSWDataResidue` - the difference between the *dCBWDataTransferLength* and the
    /// amount of data the device actually processed (Data-Out) or sent (Data-In).
    pub data_residue: u32,
    pub status: CommandStatus,
}

impl CommandStatusWrapper {
    /// Parses a CSW, validating its length, signature and status.
    pub fn from_slice(buf: &[u8]) -> Result<CommandStatusWrapper> {
        ensure!(
            buf.len() == CSW_SIZE,
            "a CSW is exactly {CSW_SIZE} bytes, got {}",
            buf.len()
        );
        let le32 = |at: usize| u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]]);
        let signature = le32(0);
        ensure!(
            signature == CSW_SIGNATURE,
            "invalid magic number for command status wrapper, should be 0x53425355, is 0x{:X}",
            signature
        );
        let status = match buf[12] {
            0 => CommandStatus::Passed,
            1 => CommandStatus::Failed,
            2 => CommandStatus::PhaseError,
            other => color_eyre::eyre::bail!("the command status field is invalid, should be in 0..=2, was {other}"),
        };
        Ok(CommandStatusWrapper {
            tag: le32(4),
            data_residue: le32(8),
            status,
        })
    }
}

/// Used for generating unique-ish command block tags.
pub struct TagGenerator(u32);

impl Default for TagGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl TagGenerator {
    /// Initialize the tag generator.
    pub fn new() -> TagGenerator {
        // 123 was chosen as a distinct, human-readable pattern to differentiate it from the rest
        // of the packet
        Self(123)
    }

    /// Returns a unique-ish u32 that's different from the previously returned value.
    pub fn tag(&mut self) -> u32 {
        let output = self.0;
        self.0 = self.0.wrapping_add(1);
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cbw_layout() {
        let cdb = [0x28, 0, 0, 0, 0x04, 0, 0, 0, 0x01, 0];
        let cbw = CommandBlockWrapper::new(&cdb, 512, Direction::In, 123, 0).unwrap();
        let bytes = cbw.to_bytes();
        assert_eq!(bytes[..4], [0x55, 0x53, 0x42, 0x43]);
        assert_eq!(bytes[4..8], [123, 0, 0, 0]);
        assert_eq!(bytes[8..12], [0, 2, 0, 0]);
        assert_eq!(bytes[12], 0x80);
        assert_eq!(bytes[13], 0);
        assert_eq!(bytes[14], 10);
        assert_eq!(bytes[15..25], cdb);
        assert_eq!(bytes[25..], [0; 6]);
        assert_eq!(cbw.cdb(), cdb);
    }

    #[test]
    fn cbw_rejects_oversized_cdb() {
        assert!(CommandBlockWrapper::new(&[0; 17], 0, Direction::Out, 0, 0).is_err());
        assert!(CommandBlockWrapper::new(&[], 0, Direction::Out, 0, 0).is_err());
        assert!(CommandBlockWrapper::new(&[0; 6], 0, Direction::Out, 0, 16).is_err());
    }

    #[test]
    fn csw_parse() {
        let packet = [0x55, 0x53, 0x42, 0x53, 123, 0, 0, 0, 0x00, 0x02, 0, 0, 0x01];
        let csw = CommandStatusWrapper::from_slice(&packet).unwrap();
        assert_eq!(csw.tag, 123);
        assert_eq!(csw.data_residue, 512);
        assert_eq!(csw.status, CommandStatus::Failed);
    }

    #[test]
    fn catch_invalid_enum_repr() {
        // Captured from an actual USB device, with the last byte (command_status) modified to
        // an invalid value (0xaa)
        let input_packet = [0x55, 0x53, 0x42, 0x53, 0, 0, 0, 0, 0, 0, 0, 0, 0xaa];
        let r = CommandStatusWrapper::from_slice(&input_packet);
        let e = r.expect_err("should catch invalid command status");
        assert!(e.root_cause().to_string().contains("command status"));
    }

    #[test]
    fn catch_bad_signature() {
        let input_packet = [0x55, 0x53, 0x42, 0x43, 0, 0, 0, 0, 0, 0, 0, 0, 0];
        assert!(CommandStatusWrapper::from_slice(&input_packet).is_err());
        assert!(CommandStatusWrapper::from_slice(&input_packet[..12]).is_err());
    }

    #[test]
    fn tags_wrap() {
        let mut tags = TagGenerator::new();
        assert_eq!(tags.tag(), 123);
        assert_eq!(tags.tag(), 124);
        let mut tags = TagGenerator(u32::MAX);
        assert_eq!(tags.tag(), u32::MAX);
        assert_eq!(tags.tag(), 0);
    }
}
