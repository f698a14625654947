//! Digital setting circle encoder drivers
//!
//! Each supported encoder box speaks its own wire protocol over a serial
//! link. This crate hides those protocols behind the [`EncoderDriver`]
//! trait so the pointing engine only ever sees raw (alt, az) counts.
//!
//! - [`DaveEkEncoders`]: binary protocol, 16-bit little-endian counts
//! - [`GenericEncoders`]: ASCII protocol used by BBox / Intelliscope / NGCMax boxes
//! - [`SimulatorEncoders`]: no hardware, injectable counts for testing
//!
//! Drivers are created by name through the [`DriverRegistry`].

mod config;
mod daveek;
mod driver;
mod error;
mod generic;
pub mod mock_link;
mod registry;
mod simulator;
mod transport;

pub use config::{EncoderConfig, DEFAULT_SERIAL_SPEED};
pub use daveek::{decode_counts, DaveEkEncoders};
pub use driver::{EncoderDriver, EncoderReading};
pub use error::{EncoderError, EncoderResult};
pub use generic::{format_resolution_command, parse_counts_reply, GenericEncoders};
pub use registry::{DriverFactory, DriverRegistry};
pub use simulator::{SimulatorEncoders, SimulatorHandle, SIMULATOR_DEFAULT_COUNTS};
pub use transport::{ByteLink, SerialTransport, SERIAL_TIMEOUT, SETTLE_DELAY};
