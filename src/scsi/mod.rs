//! SCSI command construction and response decoding as described in:
//! - SCSI Primary Commands – 4 (SPC-4), for the commands every device type
//!   shares, sense data and the descriptor formats (designators, TransportIDs,
//!   EXTENDED COPY).
//! - SCSI Block Commands – 4 (SBC-4), for direct access block devices.
//! - SCSI Media Changer Commands – 3 (SMC-3) and Multi-Media Commands – 6
//!   (MMC-6), for tape libraries and optical drives.
//! - SCSI / ATA Translation – 3 (SAT-3), for ATA PASS-THROUGH and the ATA
//!   INFORMATION VPD page.
//!
//! Everything under [`command`] is a pure codec: it lays out CDBs and
//! parameter lists and decodes what comes back, without touching a device.
//! [`ScsiDevice`] ties a codec to a [`Transport`].

pub mod bitfield;
pub mod command;
pub mod error;
pub mod field;
pub mod opcode;
pub mod sense;
pub mod transport;

pub use error::{Error, Result};
pub use transport::Transport;

use tracing::{debug, info};

use command::capacity::ReadCapacity10;
use command::inquiry::{Inquiry, InquiryData};
use command::misc::TestUnitReady;
use command::read_write::{Read10, Write10};
use command::{Command, Envelope};
use opcode::OpcodeSet;

/// A logical unit reached through some [`Transport`].
///
/// Commands are defined in the [`command`] module and issued with
/// [`ScsiDevice::execute`], which walks a fresh [`Envelope`] through its
/// whole lifecycle.
pub struct ScsiDevice<T: Transport> {
    transport: T,
    opcodes: &'static OpcodeSet,
    inquiry: InquiryData,
    blocksize: u32,
}

impl<T: Transport> ScsiDevice<T> {
    /// Identifies the logical unit with a standard INQUIRY and picks the
    /// opcode set matching its peripheral device type.
    ///
    /// The blocksize starts out unknown, see [`ScsiDevice::set_blocksize`]
    /// and [`ScsiDevice::probe_blocksize`].
    #[tracing::instrument(skip_all)]
    pub async fn open(mut transport: T) -> Result<Self> {
        let mut envelope = Envelope::new(Inquiry::standard())?;
        envelope.build(&opcode::SPC)?;
        envelope.execute(&mut transport).await?;
        envelope.unmarshall()?;
        let inquiry = envelope
            .into_result()
            .ok_or(Error::InvalidState {
                actual: command::State::Executed,
                expected: command::State::Unmarshalled,
            })?;
        let opcodes = OpcodeSet::for_device_type(inquiry.peripheral_device_type());
        info!(
            device_type = inquiry.peripheral_device_type(),
            opcodes = opcodes.name,
            "opened device"
        );
        Ok(Self {
            transport,
            opcodes,
            inquiry,
            blocksize: 0,
        })
    }

    /// Runs `command` to completion and hands back its envelope, which holds
    /// the decoded result along with the raw buffers.
    pub async fn execute<C: Command>(&mut self, command: C) -> Result<Envelope<C>> {
        let mut envelope = Envelope::new(command)?;
        envelope.build(self.opcodes)?;
        envelope.execute(&mut self.transport).await?;
        envelope.unmarshall()?;
        Ok(envelope)
    }

    /// Like [`ScsiDevice::execute`], keeping only the decoded result.
    pub async fn run<C: Command>(&mut self, command: C) -> Result<C::Output> {
        let envelope = self.execute(command).await?;
        envelope.into_result().ok_or(Error::InvalidState {
            actual: command::State::Executed,
            expected: command::State::Unmarshalled,
        })
    }

    pub async fn test_unit_ready(&mut self) -> Result<()> {
        self.run(TestUnitReady).await
    }

    /// Asks READ CAPACITY (10) for the block length and remembers it.
    pub async fn probe_blocksize(&mut self) -> Result<u32> {
        let capacity = self.run(ReadCapacity10::default()).await?;
        let blocksize = capacity.int("block_length") as u32;
        debug!(blocksize, "probed blocksize");
        self.blocksize = blocksize;
        Ok(blocksize)
    }

    pub async fn read10(&mut self, lba: u32, tl: u16) -> Result<Vec<u8>> {
        self.require_blocksize()?;
        let envelope = self.execute(Read10::new(self.blocksize, lba, tl)).await?;
        Ok(envelope.data_in().to_vec())
    }

    /// Writes `data`, which must be a whole number of blocks.
    pub async fn write10(&mut self, lba: u32, data: &[u8]) -> Result<()> {
        let blocksize = self.require_blocksize()? as usize;
        if data.len() % blocksize != 0 {
            return Err(Error::invalid(
                "data",
                format!("{} bytes is not a multiple of the {blocksize}-byte blocksize", data.len()),
            ));
        }
        let tl = u16::try_from(data.len() / blocksize).map_err(|_| Error::InvalidLength {
            field: "tl",
            value: (data.len() / blocksize) as u64,
            expected: "at most 65535 blocks",
        })?;
        self.run(Write10::new(self.blocksize, lba, tl).with_data(data.to_vec()))
            .await
    }

    fn require_blocksize(&self) -> Result<u32> {
        match self.blocksize {
            0 => Err(Error::MissingBlocksize),
            blocksize => Ok(blocksize),
        }
    }

    pub fn set_blocksize(&mut self, blocksize: u32) {
        self.blocksize = blocksize;
    }

    /// The blocksize, or 0 when it is not known yet.
    pub fn blocksize(&self) -> u32 {
        self.blocksize
    }

    pub fn opcodes(&self) -> &'static OpcodeSet {
        self.opcodes
    }

    /// The standard INQUIRY data read when the device was opened.
    pub fn inquiry(&self) -> &InquiryData {
        &self.inquiry
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }
}
