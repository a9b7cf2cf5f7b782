//! SMTP session state management

use std::time::SystemTime;

use crate::smtp::accumulator::MessageAccumulator;
use crate::smtp::error::{SmtpError, SmtpLimits};

/// Represents the current state of an SMTP session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Connection accepted - greeting sent, envelope empty
    Connected,
    /// MAIL FROM received - ready for RCPT commands
    MailFromSet,
    /// At least one RCPT TO received - ready for DATA or more RCPT commands
    RcptToSet,
    /// DATA command accepted - body lines streaming into the accumulator
    DataInProgress,
    /// Message committed to storage - only NOOP and QUIT remain valid
    DataComplete,
    /// QUIT received - connection about to close
    Closed,
}

/// Sender and recipients for one message within a session
#[derive(Debug, Clone)]
pub struct Envelope {
    /// Sender address from MAIL FROM
    pub sender: String,
    /// Recipient addresses from RCPT TO, in order of arrival
    pub recipients: Vec<String>,
}

/// Manages the state and data for a single SMTP session.
///
/// One session corresponds to one accepted connection, and accepts at most
/// one message: after a successful DATA phase the session stays in
/// [`SessionState::DataComplete`] until the client disconnects.
#[derive(Debug)]
pub struct SmtpSession {
    /// Session identifier, unique for the process lifetime
    pub id: u64,
    /// When the connection was accepted
    pub created_at: SystemTime,
    /// Current state of the session
    pub state: SessionState,
    /// Sender address from MAIL FROM command
    pub sender: Option<String>,
    /// List of recipients from RCPT TO commands
    pub recipients: Vec<String>,
    /// Client domain from HELO/EHLO command
    pub client_domain: Option<String>,
    /// Payload accumulation while in the DATA phase
    pub accumulator: Option<MessageAccumulator>,
}

impl SmtpSession {
    /// Create a new SMTP session for an accepted connection
    pub fn new(id: u64) -> Self {
        Self {
            id,
            created_at: SystemTime::now(),
            state: SessionState::Connected,
            sender: None,
            recipients: Vec::new(),
            client_domain: None,
            accumulator: None,
        }
    }

    /// Reset the envelope (RSET), keeping the client domain
    pub fn reset(&mut self) {
        self.state = SessionState::Connected;
        self.sender = None;
        self.recipients.clear();
        self.accumulator = None;
    }

    /// Set the client domain from HELO/EHLO and clear any open envelope
    pub fn set_client_domain(&mut self, domain: String) -> Result<(), SmtpError> {
        if domain.len() > SmtpLimits::DOMAIN_MAX_LENGTH {
            return Err(SmtpError::DomainTooLong {
                max: SmtpLimits::DOMAIN_MAX_LENGTH,
            });
        }

        self.client_domain = Some(domain);
        self.reset();
        Ok(())
    }

    /// Set the sender address
    pub fn set_sender(&mut self, sender: String) -> Result<(), SmtpError> {
        if sender.len() > SmtpLimits::PATH_MAX_LENGTH {
            return Err(SmtpError::PathTooLong {
                max: SmtpLimits::PATH_MAX_LENGTH,
            });
        }

        self.sender = Some(sender);
        self.recipients.clear();
        self.state = SessionState::MailFromSet;
        Ok(())
    }

    /// Append a recipient address
    pub fn add_recipient(&mut self, recipient: String) -> Result<(), SmtpError> {
        if recipient.len() > SmtpLimits::PATH_MAX_LENGTH {
            return Err(SmtpError::PathTooLong {
                max: SmtpLimits::PATH_MAX_LENGTH,
            });
        }

        if self.recipients.len() >= SmtpLimits::MAX_RECIPIENTS {
            return Err(SmtpError::TooManyRecipients {
                max: SmtpLimits::MAX_RECIPIENTS,
            });
        }

        self.recipients.push(recipient);
        self.state = SessionState::RcptToSet;
        Ok(())
    }

    /// Begin the DATA phase, creating a fresh accumulator
    pub fn begin_data(&mut self) -> Result<(), SmtpError> {
        if self.state != SessionState::RcptToSet {
            return Err(SmtpError::InvalidState(
                "DATA command requires RCPT first".to_string(),
            ));
        }

        self.accumulator = Some(MessageAccumulator::new());
        self.state = SessionState::DataInProgress;
        Ok(())
    }

    /// Append one body line to the in-progress accumulation
    pub fn accumulate(&mut self, line: &[u8]) -> Result<(), SmtpError> {
        match self.accumulator.as_mut() {
            Some(acc) => {
                acc.push_line(line);
                Ok(())
            }
            None => Err(SmtpError::InvalidState(
                "Not in data collection mode".to_string(),
            )),
        }
    }

    /// Finish the DATA phase, yielding the envelope and the finalized payload.
    ///
    /// The session stays in [`SessionState::DataInProgress`] until the caller
    /// confirms the durable commit with [`SmtpSession::mark_complete`].
    pub fn finish_data(&mut self) -> Result<(Envelope, Vec<u8>), SmtpError> {
        if self.state != SessionState::DataInProgress {
            return Err(SmtpError::InvalidState(
                "Not in data collection mode".to_string(),
            ));
        }

        let accumulator = self.accumulator.take().ok_or_else(|| {
            SmtpError::InvalidState("Not in data collection mode".to_string())
        })?;

        let sender = self
            .sender
            .take()
            .ok_or_else(|| SmtpError::InvalidState("No sender specified".to_string()))?;

        if self.recipients.is_empty() {
            return Err(SmtpError::InvalidState(
                "No recipients specified".to_string(),
            ));
        }

        let envelope = Envelope {
            sender,
            recipients: std::mem::take(&mut self.recipients),
        };

        Ok((envelope, accumulator.finalize()))
    }

    /// Discard an in-progress accumulation after a stream error
    pub fn abort_data(&mut self) {
        self.accumulator = None;
    }

    /// Record that the message was durably committed
    pub fn mark_complete(&mut self) {
        self.state = SessionState::DataComplete;
    }

    /// Record that the client has quit
    pub fn mark_closed(&mut self) {
        self.state = SessionState::Closed;
    }

    /// Check if the session is ready for a specific command
    pub fn can_execute_command(&self, command: &str) -> bool {
        use SessionState::*;

        match command.to_uppercase().as_str() {
            "HELO" | "EHLO" => matches!(self.state, Connected | MailFromSet | RcptToSet),
            "MAIL" => self.state == Connected,
            "RCPT" => matches!(self.state, MailFromSet | RcptToSet),
            "DATA" => self.state == RcptToSet,
            "RSET" => matches!(self.state, Connected | MailFromSet | RcptToSet),
            "NOOP" | "QUIT" => true,
            _ => false,
        }
    }

    /// Get the current recipient count
    pub fn recipient_count(&self) -> usize {
        self.recipients.len()
    }
}
