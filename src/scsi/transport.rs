//! The seam between the command envelope and whatever carries CDBs to a
//! device.
//!
//! A transport receives a built CDB along with the data-out bytes, and fills
//! in the data-in and sense buffers. It reports a non-GOOD status as
//! [`Error::CheckCondition`](super::Error::CheckCondition) and any failure to
//! move the bytes as [`Error::Transport`](super::Error::Transport). Timeouts
//! and retries are its own business.

use super::error::Result;

#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Sends `cdb` to the device, writing `data_out` during the data-out phase
    /// and filling `data_in` and `sense` from the device's response.
    async fn execute(
        &mut self,
        cdb: &[u8],
        data_out: &[u8],
        data_in: &mut [u8],
        sense: &mut [u8],
    ) -> Result<()>;
}

#[cfg(test)]
pub(crate) mod mock {
    use super::Transport;
    use crate::scsi::error::{Error, Result};
    use crate::scsi::sense::Sense;

    /// How [`MockTransport`] answers one command.
    pub enum Reply {
        Good,
        /// CHECK CONDITION with these sense bytes.
        CheckCondition(Vec<u8>),
        /// A transport failure with no sense data.
        Failure,
    }

    /// Answers every command by calling a closure with the CDB, the data-out
    /// bytes and the data-in buffer to fill.
    pub struct MockTransport<F> {
        respond: F,
        /// Every CDB this transport has seen, in order.
        pub issued: Vec<Vec<u8>>,
        /// The data-out bytes of every command.
        pub written: Vec<Vec<u8>>,
    }

    impl<F> MockTransport<F>
    where
        F: FnMut(&[u8], &[u8], &mut [u8]) -> Reply,
    {
        pub fn new(respond: F) -> Self {
            Self {
                respond,
                issued: Vec::new(),
                written: Vec::new(),
            }
        }
    }

    /// A transport that returns fixed data-in bytes for every command.
    pub fn replying_with(data: Vec<u8>) -> MockTransport<impl FnMut(&[u8], &[u8], &mut [u8]) -> Reply> {
        MockTransport::new(move |_cdb: &[u8], _out: &[u8], data_in: &mut [u8]| {
            let n = data.len().min(data_in.len());
            data_in[..n].copy_from_slice(&data[..n]);
            Reply::Good
        })
    }

    impl<F> Transport for MockTransport<F>
    where
        F: FnMut(&[u8], &[u8], &mut [u8]) -> Reply,
    {
        async fn execute(
            &mut self,
            cdb: &[u8],
            data_out: &[u8],
            data_in: &mut [u8],
            sense: &mut [u8],
        ) -> Result<()> {
            self.issued.push(cdb.to_vec());
            self.written.push(data_out.to_vec());
            match (self.respond)(cdb, data_out, data_in) {
                Reply::Good => Ok(()),
                Reply::CheckCondition(bytes) => {
                    let n = bytes.len().min(sense.len());
                    sense[..n].copy_from_slice(&bytes[..n]);
                    Err(Error::CheckCondition(Sense::parse(&sense[..n])))
                }
                Reply::Failure => Err(Error::Transport("mock transport failure".into())),
            }
        }
    }
}
