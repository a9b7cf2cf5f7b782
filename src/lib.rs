//! # Mailspool
//!
//! Mailspool is an SMTP receiving endpoint: it accepts inbound messages,
//! spools each one durably to local storage, and can offload the stored
//! artifact to an S3 bucket in the background.
//!
//! ## Quick Start
//!
//! ```no_run
//! use mailspool::{Config, ShutdownCoordinator, SmtpServer, SpoolWriter};
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Arc::new(Config::default());
//!     let spool = Arc::new(SpoolWriter::new(&config.spool_dir));
//!     let server = Arc::new(SmtpServer::new(config.clone(), spool, None));
//!     let registry = server.registry();
//!
//!     let coordinator = ShutdownCoordinator::new(Duration::from_secs(5));
//!     let listener = TcpListener::bind(config.listen_addr()).await?;
//!     tokio::spawn(server.serve(listener, coordinator.watcher()));
//!
//!     // ... later, on SIGTERM:
//!     let outcome = coordinator.drain(&registry).await;
//!     std::process::exit(outcome.exit_code())
//! }
//! ```
//!
//! ## Supported SMTP commands
//!
//! - `HELO` / `EHLO` - Identify the sender
//! - `MAIL FROM` - Specify the sender's address
//! - `RCPT TO` - Specify the destination (multiple destinations are supported)
//! - `DATA` - Send the email body
//! - `RSET` - Reset the current transaction
//! - `NOOP` - Do nothing
//! - `QUIT` - Close connection
//!
//! ## Behavior
//!
//! - Each session accepts at most one message; the acknowledgment for the
//!   DATA phase is only sent once the message is flushed to disk.
//! - Artifacts are written to the spool directory as
//!   `email_<session>_<millis>.eml` and are never modified afterwards.
//! - S3 offload is best effort and fully decoupled from acceptance: an
//!   upload failure is logged and never surfaced to the sending client.
//! - On SIGINT/SIGTERM the listener stops accepting and live sessions get a
//!   bounded grace period to finish; the process exits 0 on a clean drain
//!   and 1 on a forced stop.
//!
//! ## Notes
//!
//! - SMTP authentication is not supported (`AUTH` answers 502).
//! - SSL/TLS connection is not supported.
//! - Mail relay is not supported.

mod config;
mod offload;
mod shutdown;
mod smtp;
mod spool;

pub use config::{Config, OffloadConfig};
pub use offload::{ObjectStore, OffloadDispatcher, S3Store};
pub use shutdown::{ShutdownCoordinator, ShutdownOutcome, wait_for_signal};
pub use smtp::{
    Envelope, MessageAccumulator, SessionEntry, SessionRegistry, SessionState, SmtpError,
    SmtpLimits, SmtpResponse, SmtpServer, SmtpSession,
};
pub use spool::{Artifact, SpoolWriter};
