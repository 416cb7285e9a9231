//! SCSI over USB mass storage devices, using the bulk-only transport (BOT).
//!
//! Flash drives use the mass storage class (0x08), the SCSI transparent
//! command set subclass (0x06) and the bulk-only transport protocol (0x50).
//! That means two bulk endpoints: one for sending data from the host to the
//! drive (OUT) and one for receiving data from the drive (IN). A couple of
//! class requests (get max LUN, bulk-only mass storage reset) go over the
//! control endpoint.
//!
//! The host sends a 31-byte command block wrapper (CBW), optionally sends or
//! receives data, then reads a 13-byte command status wrapper (CSW) with the
//! result. The CBW and CSW are simply wrappers around a SCSI CDB.
//!
//! <https://www.downtowndougbrown.com/2018/12/usb-mass-storage-with-embedded-devices-tips-and-quirks/>

pub mod cbw;

use std::time::Duration;

use color_eyre::Result;
use color_eyre::eyre::{WrapErr, ensure, eyre};
use nusb::descriptors::TransferType;
use nusb::io::{EndpointRead, EndpointWrite};
use nusb::transfer::{Bulk, ControlIn, ControlOut, ControlType, Direction as EndpointDirection, In, Out, Recipient};
use nusb::{DeviceInfo, Interface, list_devices};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::config::Config;
use crate::scsi::command::Command;
use crate::scsi::command::misc::RequestSense;
use crate::scsi::opcode;
use crate::scsi::sense::Sense;
use crate::scsi::{self, Transport};
use cbw::{CSW_SIZE, CommandBlockWrapper, CommandStatus, CommandStatusWrapper, Direction, TagGenerator};

/// https://www.usb.org/defined-class-codes
const MASS_STORAGE_USB_CLASS: u8 = 0x08;

/// Timeout for the class requests on the control endpoint.
const CONTROL_TIMEOUT: Duration = Duration::from_millis(500);

/// Returns a list of every USB storage device currently connected to the host machine
pub async fn enumerate_usb_storage_devices() -> Result<impl Iterator<Item = DeviceInfo>> {
    let all_usb_devices = list_devices().await?;

    // Each USB device typically exposes one or more *interfaces* as a
    // way to interact with specific functionality of the device.
    let usb_storage_devices = all_usb_devices.filter(|dev| {
        debug!("scanning usb device: {:#?}", dev);
        dev.class() == MASS_STORAGE_USB_CLASS
            || dev
                .interfaces()
                .any(|interface| interface.class() == MASS_STORAGE_USB_CLASS)
    });
    Ok(usb_storage_devices)
}

/// As described by the USB Mass Storage Class - Bulk Only Transport spec,
/// section 3.2.
///
/// LUN stands for Logical Unit Number, and it's a number
/// used as a unique identifier for a storage device or logical volume.
///
/// <https://en.wikipedia.org/wiki/Logical_unit_number>
const MAX_LUN_REQUEST: ControlIn = ControlIn {
    control_type: ControlType::Class,
    recipient: Recipient::Interface,
    request: 0xfe,
    value: 0,
    index: 0,
    length: 1,
};

/// Bulk-Only Mass Storage Reset, section 3.1. Readies the device for the
/// next CBW after a phase error.
const RESET_REQUEST: ControlOut = ControlOut {
    control_type: ControlType::Class,
    recipient: Recipient::Interface,
    request: 0xff,
    value: 0,
    index: 0,
    data: &[],
};

/// A mass storage device claimed for bulk-only transport.
///
/// Implements [`Transport`], so it can back a [`scsi::ScsiDevice`].
pub struct UsbDrive {
    interface: Interface,
    bulk_write: EndpointWrite<Bulk>,
    bulk_read: EndpointRead<Bulk>,
    tags: TagGenerator,
    timeout: Duration,
    lun: u8,
    max_lun: u8,
}

/// Opens the provided USB mass storage device.
///
/// This initialization sequence follows the order
/// described here: <https://www.downtowndougbrown.com/2018/12/usb-mass-storage-with-embedded-devices-tips-and-quirks/>,
///
/// where the author obtained it with a USB hardware signal analyzer and reverse engineering the implementations on macos, windows, and linux
#[tracing::instrument(skip(config))]
pub async fn open_usb_device(device_info: DeviceInfo, config: &Config) -> Result<UsbDrive> {
    // 1. Claim the USB device to read and write to it
    debug!("opening device");
    let device = device_info.open().await?;
    let interface = device.claim_interface(0).await?;

    // 2. Request the maximum LUN. Single-LUN devices may stall the request.
    let max_lun = match interface.control_in(MAX_LUN_REQUEST, CONTROL_TIMEOUT).await {
        Ok(data) => data.first().copied().unwrap_or(0),
        Err(e) => {
            debug!(%e, "GET MAX LUN failed, assuming a single LUN");
            0
        }
    };
    ensure!(max_lun <= 0x0f, "GET MAX LUN returned {max_lun}, the limit is 15");

    // 3. Locate the bulk endpoints of the interface
    let configuration = device
        .active_configuration()
        .wrap_err("reading the active configuration")?;
    let setting = configuration
        .interface_alt_settings()
        .find(|alt| alt.interface_number() == 0 && alt.alternate_setting() == 0)
        .ok_or_else(|| eyre!("the device has no interface 0"))?;
    let mut bulk_in = None;
    let mut bulk_out = None;
    for endpoint in setting.endpoints() {
        if endpoint.transfer_type() != TransferType::Bulk {
            continue;
        }
        match endpoint.direction() {
            EndpointDirection::In => bulk_in = bulk_in.or(Some(endpoint.address())),
            EndpointDirection::Out => bulk_out = bulk_out.or(Some(endpoint.address())),
        }
    }
    let (Some(bulk_in), Some(bulk_out)) = (bulk_in, bulk_out) else {
        return Err(eyre!("interface 0 needs a bulk IN and a bulk OUT endpoint"));
    };
    debug!(bulk_in, bulk_out, max_lun, "found bulk-only endpoints");

    let bulk_write = interface
        .endpoint::<Bulk, Out>(bulk_out)?
        .writer(config.buffer_size);
    let bulk_read = interface
        .endpoint::<Bulk, In>(bulk_in)?
        .reader(config.buffer_size);

    Ok(UsbDrive {
        interface,
        bulk_write,
        bulk_read,
        tags: TagGenerator::new(),
        timeout: config.timeout,
        lun: 0,
        max_lun,
    })
}

impl UsbDrive {
    /// The highest LUN the device reported.
    pub fn max_lun(&self) -> u8 {
        self.max_lun
    }

    /// Addresses later commands to `lun`.
    pub fn select_lun(&mut self, lun: u8) -> Result<()> {
        ensure!(lun <= self.max_lun, "LUN {lun} is past the device's maximum of {}", self.max_lun);
        self.lun = lun;
        Ok(())
    }

    /// Runs one CBW / data / CSW exchange.
    ///
    /// BOT moves data in one direction per command, so at most one of
    /// `data_out` and `data_in` may be non-empty.
    async fn submit_cbw(&mut self, cdb: &[u8], data_out: &[u8], data_in: &mut [u8]) -> Result<CommandStatusWrapper> {
        ensure!(
            data_out.is_empty() || data_in.is_empty(),
            "bulk-only transport cannot move data in both directions"
        );
        let (direction, len) = match data_out.is_empty() {
            true => (Direction::In, data_in.len()),
            false => (Direction::Out, data_out.len()),
        };
        let tag = self.tags.tag();
        let cbw = CommandBlockWrapper::new(cdb, u32::try_from(len)?, direction, tag, self.lun)?;
        self.write(&cbw.to_bytes()).await.wrap_err("sending the CBW")?;

        if !data_out.is_empty() {
            self.write(data_out).await.wrap_err("data-out phase")?;
        }
        if !data_in.is_empty() {
            let read = self.read_message(data_in).await.wrap_err("data-in phase")?;
            debug!(read, expected = data_in.len(), "data-in phase done");
        }

        let mut packet = [0u8; CSW_SIZE];
        timeout(self.timeout, self.bulk_read.read_exact(&mut packet))
            .await
            .wrap_err("timed out waiting for the CSW")??;
        let csw = CommandStatusWrapper::from_slice(&packet)?;
        ensure!(
            csw.tag == tag,
            "CSW tag {} does not match the CBW tag {tag}",
            csw.tag
        );
        if csw.data_residue != 0 {
            debug!(residue = csw.data_residue, "device transferred less than requested");
        }
        Ok(csw)
    }

    async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let writer = &mut self.bulk_write;
        timeout(self.timeout, async move {
            writer.write_all(bytes).await?;
            writer.flush().await
        })
        .await
        .wrap_err("timed out on the bulk OUT endpoint")??;
        Ok(())
    }

    /// Reads until `buf` is full or the device ends the transfer with a
    /// short packet, returning how many bytes arrived.
    async fn read_message(&mut self, buf: &mut [u8]) -> Result<usize> {
        let reader = &mut self.bulk_read;
        let filled = timeout(self.timeout, async move {
            let mut message = reader.until_short_packet();
            let mut filled = 0;
            while filled < buf.len() {
                match message.read(&mut buf[filled..]).await? {
                    0 => break,
                    n => filled += n,
                }
            }
            // the CSW starts a new message
            let ended = message.consume_end().is_ok();
            check_message_end(filled, buf.len(), ended)?;
            Ok::<_, std::io::Error>(filled)
        })
        .await
        .wrap_err("timed out on the bulk IN endpoint")??;
        Ok(filled)
    }

    /// Bulk-only mass storage reset.
    async fn reset(&mut self) -> Result<()> {
        self.interface
            .control_out(RESET_REQUEST, CONTROL_TIMEOUT)
            .await
            .wrap_err("bulk-only mass storage reset")?;
        Ok(())
    }
}

/// A data-in message that ends before filling its buffer must end on a
/// short packet. One that fills it exactly may not, since the device sends
/// no zero-length packet on a packet boundary.
fn check_message_end(filled: usize, expected: usize, ended: bool) -> std::io::Result<()> {
    match (ended, filled < expected) {
        (true, _) => Ok(()),
        (false, false) => {
            debug!(filled, "data-in filled the buffer without a short packet");
            Ok(())
        }
        (false, true) => Err(std::io::Error::other(format!(
            "data-in stopped after {filled} of {expected} bytes without a short packet"
        ))),
    }
}

fn transport_error(report: color_eyre::Report) -> scsi::Error {
    scsi::Error::Transport(report.into())
}

impl Transport for UsbDrive {
    #[tracing::instrument(skip_all, fields(cdb = ?cdb))]
    async fn execute(
        &mut self,
        cdb: &[u8],
        data_out: &[u8],
        data_in: &mut [u8],
        sense: &mut [u8],
    ) -> scsi::Result<()> {
        let csw = self
            .submit_cbw(cdb, data_out, data_in)
            .await
            .map_err(transport_error)?;
        match csw.status {
            CommandStatus::Passed => Ok(()),
            CommandStatus::Failed => {
                // BOT has no autosense: fetch it before the next command clears it
                let request = RequestSense {
                    alloc_len: sense.len().min(0xff) as u8,
                    ..RequestSense::default()
                };
                let request_cdb = request.cdb(opcode::SPC.get(RequestSense::OPCODE)?)?;
                let csw = self
                    .submit_cbw(&request_cdb, &[], sense)
                    .await
                    .map_err(transport_error)?;
                if csw.status != CommandStatus::Passed {
                    return Err(transport_error(eyre!(
                        "REQUEST SENSE failed with {:?} after a failed command",
                        csw.status
                    )));
                }
                Err(scsi::Error::CheckCondition(Sense::parse(sense)))
            }
            CommandStatus::PhaseError => {
                warn!("phase error, resetting the device");
                self.reset().await.map_err(transport_error)?;
                Err(transport_error(eyre!("phase error")))
            }
        }
    }
}
