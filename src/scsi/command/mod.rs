//! SCSI commands and the envelope that carries one through its lifecycle.
//!
//! Every command type implements [`Command`]: it knows the name of its
//! opcode, how to lay out its CDB, how much data it sends and expects back,
//! and how to decode the data-in buffer. Each also exposes its CDB field
//! table as a `CDB` constant, so a CDB captured off the wire can be decoded
//! with `Read10::CDB.decode(&cdb)`.
//!
//! An [`Envelope`] owns the buffers of one invocation and walks it through
//! `CONSTRUCTED -> CDB_BUILT -> EXECUTED -> UNMARSHALLED`:
//!
//! ```ignore
//! let mut envelope = Envelope::new(Read10::new(512, 1024, 27))?;
//! envelope.build(&opcode::SBC)?;
//! envelope.execute(&mut transport).await?;
//! envelope.unmarshall()?;
//! let data = envelope.data_in();
//! ```

pub mod ata;
pub mod capacity;
pub mod designator;
pub mod disc_information;
pub mod element_status;
pub mod extended_copy;
pub mod inquiry;
pub mod maintenance_in;
pub mod media_changer;
pub mod misc;
pub mod mode;
pub mod persistent_reserve;
pub mod read_cd;
pub mod read_write;
pub mod transport_id;

use tracing::{debug, warn};

use super::error::{Error, Result};
use super::field::{Layout, Record};
use super::opcode::{self, Opcode, OpcodeSet};
use super::sense::{SENSE_SIZE, Sense};
use super::transport::Transport;

/// A single SCSI command: its CDB, its data phases and its response decoder.
pub trait Command {
    /// Name of the opcode in the target device's [`OpcodeSet`].
    const OPCODE: &'static str;

    /// What [`Command::unmarshall`] decodes the data-in buffer into.
    type Output;

    /// Lays out the CDB for `opcode`.
    fn cdb(&self, opcode: &Opcode) -> Result<Vec<u8>>;

    /// The parameter list sent to the device, if any.
    fn data_out(&self) -> Result<Vec<u8>> {
        Ok(Vec::new())
    }

    /// Size of the buffer the device may fill.
    fn data_in_len(&self) -> Result<usize> {
        Ok(0)
    }

    fn unmarshall(&self, data_in: &[u8]) -> Result<Self::Output>;
}

/// Lifecycle state of an [`Envelope`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    Constructed,
    CdbBuilt,
    Executed,
    Unmarshalled,
}

/// The buffers and result of one command invocation.
///
/// The envelope exclusively owns its CDB, data-out, data-in and sense
/// buffers. It is not meant to be reused for a second command.
pub struct Envelope<C: Command> {
    command: C,
    state: State,
    cdb: Vec<u8>,
    data_out: Vec<u8>,
    data_in: Vec<u8>,
    sense: Vec<u8>,
    result: Option<C::Output>,
}

impl<C: Command> Envelope<C> {
    /// Allocates the data-out, data-in and sense buffers for `command`.
    pub fn new(command: C) -> Result<Self> {
        let data_out = command.data_out()?;
        let data_in = vec![0; command.data_in_len()?];
        Ok(Self {
            command,
            state: State::Constructed,
            cdb: Vec::new(),
            data_out,
            data_in,
            sense: vec![0; SENSE_SIZE],
            result: None,
        })
    }

    fn expect(&self, expected: State) -> Result<()> {
        if self.state != expected {
            return Err(Error::InvalidState {
                actual: self.state,
                expected,
            });
        }
        Ok(())
    }

    /// Resolves the opcode in `opcodes` and lays out the CDB.
    pub fn build(&mut self, opcodes: &OpcodeSet) -> Result<&[u8]> {
        self.expect(State::Constructed)?;
        let opcode = opcodes.get(C::OPCODE)?;
        self.cdb = self.command.cdb(opcode)?;
        debug!(command = C::OPCODE, set = opcodes.name, cdb = ?self.cdb, "built CDB");
        self.state = State::CdbBuilt;
        Ok(&self.cdb)
    }

    /// Hands the buffers to `transport`.
    ///
    /// On failure the envelope stays in [`State::CdbBuilt`] with no result,
    /// and the sense buffer holds whatever the device reported.
    #[tracing::instrument(skip_all, fields(command = C::OPCODE))]
    pub async fn execute<T: Transport>(&mut self, transport: &mut T) -> Result<()> {
        self.expect(State::CdbBuilt)?;
        self.result = None;
        self.data_in.fill(0);
        self.sense.fill(0);
        debug!(data_out = self.data_out.len(), data_in = self.data_in.len(), "executing");
        let outcome = transport
            .execute(&self.cdb, &self.data_out, &mut self.data_in, &mut self.sense)
            .await;
        if let Err(e) = outcome {
            if let Error::CheckCondition(sense) = &e {
                warn!(%sense, "check condition");
            }
            return Err(e);
        }
        self.state = State::Executed;
        Ok(())
    }

    /// Decodes the data-in buffer into the command's result.
    pub fn unmarshall(&mut self) -> Result<&C::Output> {
        self.expect(State::Executed)?;
        let output = self.command.unmarshall(&self.data_in)?;
        self.state = State::Unmarshalled;
        Ok(self.result.insert(output))
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn command(&self) -> &C {
        &self.command
    }

    pub fn cdb(&self) -> &[u8] {
        &self.cdb
    }

    pub fn data_out(&self) -> &[u8] {
        &self.data_out
    }

    /// Write data for commands whose data-out is supplied by the caller
    /// (WRITE, WRITE SAME). Only available before execution.
    pub fn data_out_mut(&mut self) -> Result<&mut [u8]> {
        if matches!(self.state, State::Executed | State::Unmarshalled) {
            return Err(Error::InvalidState {
                actual: self.state,
                expected: State::CdbBuilt,
            });
        }
        Ok(&mut self.data_out)
    }

    pub fn data_in(&self) -> &[u8] {
        &self.data_in
    }

    pub fn sense(&self) -> &[u8] {
        &self.sense
    }

    /// Sense data left by the last execute, if the device reported any.
    pub fn sense_data(&self) -> Option<Sense> {
        (self.sense[0] & 0x7f != 0).then(|| Sense::parse(&self.sense))
    }

    pub fn result(&self) -> Option<&C::Output> {
        self.result.as_ref()
    }

    pub fn into_result(self) -> Option<C::Output> {
        self.result
    }
}

/// Lays out a CDB from `record`, checking that `layout` has the size the
/// opcode's group code implies.
pub(crate) fn encode_cdb(layout: &Layout, opcode: &Opcode, record: &Record) -> Result<Vec<u8>> {
    let mut cdb = opcode::init_cdb(opcode.value)?;
    if cdb.len() != layout.size {
        return Err(Error::invalid(
            "opcode",
            format!(
                "{} ({:#04x}) takes a {}-byte CDB, {} is {} bytes",
                opcode.name,
                opcode.value,
                cdb.len(),
                layout.name,
                layout.size
            ),
        ));
    }
    layout.encode_into(record, &mut cdb, false)?;
    Ok(cdb)
}

/// `blocksize * blocks`, failing when a transfer needs a blocksize that is
/// not known.
pub(crate) fn transfer_len(blocksize: u32, blocks: u64) -> Result<usize> {
    if blocks == 0 {
        return Ok(0);
    }
    if blocksize == 0 {
        return Err(Error::MissingBlocksize);
    }
    u64::from(blocksize)
        .checked_mul(blocks)
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| Error::invalid("transfer length", format!("{blocks} blocks of {blocksize} bytes")))
}

/// Reads a big-endian length prefix of `width` bytes at `offset`.
pub(crate) fn length_at(buf: &[u8], offset: usize, width: usize, what: &'static str) -> Result<usize> {
    let run = buf
        .get(offset..offset + width)
        .ok_or_else(|| Error::truncated(what, offset + width, buf.len()))?;
    Ok(super::bitfield::be_int(run) as usize)
}

/// `buf[start..start + len]`, or a [`Error::Truncated`] naming `what`.
pub(crate) fn slice<'a>(buf: &'a [u8], start: usize, len: usize, what: &'static str) -> Result<&'a [u8]> {
    buf.get(start..start + len)
        .ok_or_else(|| Error::truncated(what, start + len, buf.len()))
}

#[cfg(test)]
mod tests {
    use super::misc::TestUnitReady;
    use super::read_write::Read10;
    use super::*;
    use crate::scsi::opcode::{SBC, SMC};
    use crate::scsi::transport::mock::{MockTransport, Reply, replying_with};

    #[tokio::test]
    async fn lifecycle() {
        let mut envelope = Envelope::new(Read10::new(512, 1024, 27)).unwrap();
        assert_eq!(envelope.state(), State::Constructed);
        assert_eq!(envelope.data_in().len(), 13824);
        assert_eq!(envelope.sense().len(), SENSE_SIZE);

        let cdb = envelope.build(&SBC).unwrap().to_vec();
        assert_eq!(cdb.len(), 10);
        assert_eq!(envelope.state(), State::CdbBuilt);

        let mut transport = replying_with(vec![0xaa; 13824]);
        envelope.execute(&mut transport).await.unwrap();
        assert_eq!(envelope.state(), State::Executed);
        assert_eq!(transport.issued, vec![cdb]);

        envelope.unmarshall().unwrap();
        assert_eq!(envelope.state(), State::Unmarshalled);
        assert!(envelope.data_in().iter().all(|b| *b == 0xaa));
    }

    #[tokio::test]
    async fn steps_out_of_order() {
        let mut envelope = Envelope::new(TestUnitReady).unwrap();
        assert!(matches!(
            envelope.unmarshall(),
            Err(Error::InvalidState {
                actual: State::Constructed,
                expected: State::Executed
            })
        ));
        let mut transport = replying_with(Vec::new());
        assert!(matches!(
            envelope.execute(&mut transport).await,
            Err(Error::InvalidState { .. })
        ));
        assert!(transport.issued.is_empty());

        envelope.build(&SBC).unwrap();
        assert!(matches!(envelope.build(&SBC), Err(Error::InvalidState { .. })));
    }

    #[tokio::test]
    async fn check_condition_keeps_sense_and_no_result() {
        let mut sense = vec![0u8; 18];
        sense[0] = 0x70;
        sense[2] = 0x02;
        sense[12] = 0x3a;
        let mut transport = MockTransport::new(|_: &[u8], _: &[u8], data_in: &mut [u8]| {
            data_in.fill(0x55);
            Reply::CheckCondition(sense.clone())
        });

        let mut envelope = Envelope::new(TestUnitReady).unwrap();
        envelope.build(&SBC).unwrap();
        let e = envelope.execute(&mut transport).await.expect_err("not ready");
        let Error::CheckCondition(reported) = e else {
            panic!("expected a check condition, got {e:?}");
        };
        assert_eq!(reported.ascq_code(), 0x3a00);
        assert_eq!(envelope.state(), State::CdbBuilt);
        assert!(envelope.result().is_none());
        assert_eq!(envelope.sense_data().map(|s| s.asc), Some(0x3a));
    }

    #[tokio::test]
    async fn transport_failure_then_retry() {
        let mut fail = true;
        let mut transport = MockTransport::new(move |_: &[u8], _: &[u8], _: &mut [u8]| {
            if std::mem::take(&mut fail) {
                Reply::Failure
            } else {
                Reply::Good
            }
        });
        let mut envelope = Envelope::new(TestUnitReady).unwrap();
        envelope.build(&SBC).unwrap();
        assert!(matches!(
            envelope.execute(&mut transport).await,
            Err(Error::Transport(_))
        ));
        envelope.execute(&mut transport).await.unwrap();
        envelope.unmarshall().unwrap();
        assert_eq!(transport.issued.len(), 2);
    }

    #[test]
    fn opcode_missing_from_set() {
        let mut envelope = Envelope::new(Read10::new(512, 0, 1)).unwrap();
        assert!(matches!(
            envelope.build(&SMC),
            Err(Error::UnknownOpcode { name: "READ_10", set: "smc" })
        ));
        assert_eq!(envelope.state(), State::Constructed);
    }

    #[test]
    fn transfer_lengths() {
        assert_eq!(transfer_len(512, 27).unwrap(), 13824);
        assert_eq!(transfer_len(0, 0).unwrap(), 0);
        assert!(matches!(transfer_len(0, 1), Err(Error::MissingBlocksize)));
    }
}
