//! Loopback demo
//!
//! Runs the two sample apps against an in-process [`LoopbackHub`]: several
//! simulated devices, each with its own handler, callback thread and
//! presenter, tap connect and pick pictures the way a user would.
//!
//! - [`policy`]: what a tap on the connect button does (connect-only or toggle)
//! - [`presenter`]: the status lines a device's screen shows
//! - [`simulation`]: drives a whole call from a [`Config`](crate::configuration::Config)
//!
//! [`LoopbackHub`]: crate::platform::loopback::LoopbackHub

pub mod policy;
pub mod presenter;
pub mod simulation;

pub use policy::{ConnectPolicy, TapAction};
pub use presenter::{DevicePresenter, Selection, StatusLines};
pub use simulation::{run, DeviceReport, SimulationReport};
