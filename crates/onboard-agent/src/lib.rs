//! Onboarding agent library logic.
//!
//! Registers the device certificate with the controller, looks up the
//! device parameters, signs the attestation challenge and writes the network
//! configuration consumed by the other device agents. Status uploads reuse
//! the same authenticated transport.

pub mod agent;
pub mod config;
pub mod derive;
pub mod device_id;
pub mod endpoint;
pub mod error;
pub mod geo;
pub mod layout;
pub mod lookup;
pub mod nat;
pub mod register;
pub mod retry;
pub mod status;
pub mod tls;
pub mod transport;

pub use agent::{Agent, RunSummary};
pub use config::{load_config, Config};
pub use error::{AttemptError, FatalError};
pub use retry::{RetryExecutor, Sleeper, ThreadSleeper};
