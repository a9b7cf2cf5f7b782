//! SMTP server implementation

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::offload::OffloadDispatcher;
use crate::smtp::commands::SmtpCommandHandler;
use crate::smtp::error::{SmtpError, SmtpLimits};
use crate::smtp::registry::{SessionEntry, SessionRegistry};
use crate::smtp::response::SmtpResponse;
use crate::smtp::session::{SessionState, SmtpSession};
use crate::spool::SpoolWriter;

/// Main SMTP server: accepts connections, drives one session task per
/// connection, and commits accepted messages through the spool writer.
pub struct SmtpServer {
    config: Arc<Config>,
    registry: Arc<SessionRegistry>,
    spool: Arc<SpoolWriter>,
    offload: Option<Arc<OffloadDispatcher>>,
    next_session_id: AtomicU64,
}

impl SmtpServer {
    /// Create a new SMTP server
    pub fn new(
        config: Arc<Config>,
        spool: Arc<SpoolWriter>,
        offload: Option<Arc<OffloadDispatcher>>,
    ) -> Self {
        Self {
            config,
            registry: Arc::new(SessionRegistry::new()),
            spool,
            offload,
            next_session_id: AtomicU64::new(1),
        }
    }

    /// The registry tracking this server's live sessions
    pub fn registry(&self) -> Arc<SessionRegistry> {
        Arc::clone(&self.registry)
    }

    /// Accept connections until the shutdown flag flips.
    ///
    /// Each accepted connection runs as its own task; the accept loop itself
    /// never blocks on a session. Accept errors are logged and do not stop
    /// the listener.
    pub async fn serve(
        self: Arc<Self>,
        listener: TcpListener,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), SmtpError> {
        info!("SMTP server listening on {}", listener.local_addr()?);

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            let id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
                            self.registry
                                .register(id, SessionEntry {
                                    peer,
                                    connected_at: SystemTime::now(),
                                })
                                .await;
                            info!(session = id, peer = %peer, "connection established");

                            let server = Arc::clone(&self);
                            tokio::spawn(async move {
                                if let Err(e) = server.handle_client(stream, id).await {
                                    warn!(session = id, error = %e, "session ended with error");
                                }
                                server.registry.deregister(id).await;
                                info!(session = id, "connection closed");
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "error accepting connection");
                        }
                    }
                }
                _ = shutdown.changed() => {
                    info!("listener draining, no longer accepting connections");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Drive one client connection through the protocol.
    ///
    /// Each received command line is answered with exactly one reply; DATA
    /// body lines stream into the session's accumulator until the lone-dot
    /// terminator commits the message.
    async fn handle_client(&self, stream: TcpStream, id: u64) -> Result<(), SmtpError> {
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);
        let mut session = SmtpSession::new(id);
        let handler = SmtpCommandHandler::new(&self.config);

        // Send greeting
        self.send_response(&mut write_half, &SmtpResponse::greeting(&self.config.hostname))
            .await?;

        let mut line_buffer = Vec::new();
        loop {
            line_buffer.clear();

            match reader.read_until(b'\n', &mut line_buffer).await {
                Ok(0) => {
                    // Connection closed by the client
                    if session.state == SessionState::DataInProgress {
                        session.abort_data();
                        warn!(session = id, "connection closed mid-DATA, partial message discarded");
                    }
                    break;
                }
                Ok(_) => {
                    if session.state == SessionState::DataInProgress {
                        let line = trim_line_ending(&line_buffer);
                        if line == b"." {
                            // End of data: commit before acknowledging
                            match self.commit_message(&mut session).await {
                                Ok(response) => {
                                    self.send_response(&mut write_half, &response).await?;
                                }
                                Err(e) => {
                                    let response = SmtpResponse::error(
                                        e.to_response_code(),
                                        e.enhanced_code(),
                                        &e.to_response_message(),
                                    );
                                    self.send_response(&mut write_half, &response).await?;
                                    warn!(session = id, error = %e, "message rejected, terminating session");
                                    break;
                                }
                            }
                        } else {
                            session.accumulate(line)?;
                        }
                    } else {
                        // Handle potential UTF-8 issues gracefully
                        let line = String::from_utf8_lossy(&line_buffer);
                        let command = line.trim();
                        if command.is_empty() {
                            continue;
                        }

                        match handler.process_command(command, &mut session) {
                            Ok(response) => {
                                let closing = session.state == SessionState::Closed;
                                self.send_response(&mut write_half, &response).await?;
                                if closing {
                                    break; // QUIT command
                                }
                            }
                            Err(e) => {
                                let response = SmtpResponse::error(
                                    e.to_response_code(),
                                    e.enhanced_code(),
                                    &e.to_response_message(),
                                );
                                self.send_response(&mut write_half, &response).await?;
                            }
                        }
                    }
                }
                Err(e) => {
                    if session.state == SessionState::DataInProgress {
                        session.abort_data();
                        warn!(session = id, "stream error mid-DATA, partial message discarded");
                    }
                    return Err(e.into());
                }
            }
        }

        Ok(())
    }

    /// Finalize the accumulated payload, commit it durably, and queue the
    /// offload. The 250 acknowledgment is only produced after the commit is
    /// confirmed flushed.
    async fn commit_message(&self, session: &mut SmtpSession) -> Result<SmtpResponse, SmtpError> {
        let (envelope, payload) = session.finish_data()?;

        let artifact = self
            .spool
            .commit(session.id, &payload)
            .await
            .map_err(SmtpError::Storage)?;
        session.mark_complete();

        info!(
            session = session.id,
            from = %envelope.sender,
            recipients = envelope.recipients.len(),
            bytes = payload.len(),
            "email saved to file: {}", artifact.path.display()
        );

        if let Some(dispatcher) = &self.offload {
            dispatcher.dispatch(artifact);
        }

        Ok(SmtpResponse::message_accepted())
    }

    /// Send a response to the client
    async fn send_response(
        &self,
        stream: &mut OwnedWriteHalf,
        response: &SmtpResponse,
    ) -> Result<(), SmtpError> {
        let hide = self.config.hide_enhanced_status_codes;

        // Ensure single-line responses don't exceed maximum line length
        let formatted = response.format(hide);
        if response.multiline.is_none() && formatted.len() > SmtpLimits::REPLY_LINE_MAX_LENGTH {
            let truncated_response =
                SmtpResponse::new(&response.code, "Response too long (truncated)");
            stream
                .write_all(truncated_response.format(hide).as_bytes())
                .await?;
        } else {
            stream.write_all(formatted.as_bytes()).await?;
        }
        stream.flush().await?;
        Ok(())
    }
}

/// Strip a trailing CRLF or LF from a raw line
fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
