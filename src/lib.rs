//! Build SCSI commands and decode what devices send back.
//!
//! [`scsi`] holds the codec: field tables, opcode tables, one module per
//! command family, and the envelope that carries a command through a
//! [`scsi::Transport`]. [`usb`] provides a transport for USB mass storage
//! devices speaking the bulk-only protocol.

pub mod config;
pub mod scsi;
pub mod usb;
