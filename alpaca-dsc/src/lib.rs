//! Alpaca telescope device backed by digital setting circles.
//!
//! The device never moves the mount. It reads raw counts from an encoder box,
//! turns them into alt/az and RA/Dec relative to a single sync point, and
//! serves the result through the Alpaca Telescope REST interface.

pub mod alpaca_errors;
pub mod clock;
pub mod device;
pub mod dispatcher;
pub mod profile;
pub mod properties;
pub mod server;
pub mod sync_engine;
pub mod validation;

pub use alpaca_errors::AlpacaError;
pub use clock::{Clock, FixedClock, SystemClock};
pub use device::{DeviceError, EncoderStatus, TelescopeDevice};
pub use dispatcher::{dispatch, ActionResponse, Verb};
pub use profile::{EncodersProfile, Profile, ProfileError, ProfileStore, SiteProfile};
pub use server::{create_router, run_server, serve, AppState, ServerArgs};
pub use sync_engine::{SyncAnchor, SyncEngine, SyncError};
pub use validation::{Params, ValidationError};
