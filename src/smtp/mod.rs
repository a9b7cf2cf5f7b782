//! SMTP protocol implementation

pub mod accumulator;
pub mod commands;
pub mod error;
pub mod registry;
pub mod response;
pub mod server;
pub mod session;

pub use accumulator::MessageAccumulator;
pub use error::{SmtpError, SmtpLimits};
pub use registry::{SessionEntry, SessionRegistry};
pub use response::SmtpResponse;
pub use server::SmtpServer;
pub use session::{Envelope, SessionState, SmtpSession};
