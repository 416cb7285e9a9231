use color_eyre::Result;
use color_eyre::eyre::{WrapErr, eyre};
use scsiglass::config::Config;
use scsiglass::scsi::ScsiDevice;
use scsiglass::scsi::command::inquiry::InquiryData;
use scsiglass::usb::{enumerate_usb_storage_devices, open_usb_device};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let config = Config::from_env()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.log_filter).wrap_err("invalid log filter")?)
        .init();

    let devices: Vec<_> = enumerate_usb_storage_devices().await?.collect();
    info!(count = devices.len(), "found mass storage devices");
    let device_info = devices
        .into_iter()
        .nth(config.device_index)
        .ok_or_else(|| eyre!("no mass storage device at index {}", config.device_index))?;

    let drive = open_usb_device(device_info, &config).await?;
    let mut device = ScsiDevice::open(drive).await?;

    // Freshly attached devices usually report a unit attention first
    if let Err(e) = device.test_unit_ready().await {
        warn!(%e, "TEST UNIT READY failed, retrying once");
        device.test_unit_ready().await?;
    }
    info!("unit is ready");

    if let InquiryData::Standard(inquiry) = device.inquiry() {
        let text = |field: &str| String::from_utf8_lossy(inquiry.bytes(field)).trim().to_string();
        info!(
            vendor = text("t10_vendor_identification"),
            product = text("product_identification"),
            revision = text("product_revision_level"),
            device_type = inquiry.int("peripheral_device_type"),
            "standard inquiry"
        );
    }

    let blocksize = device.probe_blocksize().await?;
    info!(blocksize, "read capacity");
    Ok(())
}
