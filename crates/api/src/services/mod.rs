//! Service-layer orchestration and external integrations.

pub mod delivery;
pub mod email;
pub mod intake;

pub use delivery::DeliveryExecutor;
pub use email::{build_transport, ConsoleMailTransport, HttpMailTransport};
pub use intake::{enforce_quota, IntakeOutcome, IntakeService};
