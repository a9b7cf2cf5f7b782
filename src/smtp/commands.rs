//! Implementation of SMTP commands

use crate::config::Config;
use crate::smtp::error::{SmtpError, SmtpLimits};
use crate::smtp::response::SmtpResponse;
use crate::smtp::session::{SessionState, SmtpSession};

/// Handles SMTP commands and returns appropriate responses.
///
/// Every processed command line yields exactly one reply (the `Ok` response
/// or the error the caller turns into a reply) - the transport loop depends
/// on this to never stall the client.
#[derive(Debug)]
pub struct SmtpCommandHandler<'a> {
    config: &'a Config,
}

impl<'a> SmtpCommandHandler<'a> {
    /// Create a new command handler
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Process a command line and return a response
    pub fn process_command(
        &self,
        command_line: &str,
        session: &mut SmtpSession,
    ) -> Result<SmtpResponse, SmtpError> {
        // Check command line length
        if command_line.len() > SmtpLimits::COMMAND_LINE_MAX_LENGTH {
            return Err(SmtpError::LineTooLong {
                max: SmtpLimits::COMMAND_LINE_MAX_LENGTH,
            });
        }

        let parts: Vec<&str> = command_line.split_whitespace().collect();
        if parts.is_empty() {
            return Err(SmtpError::InvalidCommand);
        }

        let cmd = parts[0].to_uppercase();

        match cmd.as_str() {
            "HELO" => self.handle_helo(parts, session, false),
            "EHLO" => self.handle_helo(parts, session, true),
            "MAIL" => self.handle_mail(parts, session),
            "RCPT" => self.handle_rcpt(parts, session),
            "DATA" => self.handle_data(parts, session),
            "RSET" => self.handle_rset(session),
            "NOOP" => self.handle_noop(),
            "QUIT" => self.handle_quit(session),
            // AUTH mechanisms are out of scope for this endpoint; the
            // insecure-auth policy still decides which refusal applies on
            // this unencrypted transport
            "AUTH" if !self.config.allow_insecure_auth => Err(SmtpError::EncryptionRequired),
            "AUTH" => Err(SmtpError::NotImplemented),
            _ => Err(SmtpError::InvalidCommand),
        }
    }

    /// Handle HELO/EHLO command
    fn handle_helo(
        &self,
        parts: Vec<&str>,
        session: &mut SmtpSession,
        extended: bool,
    ) -> Result<SmtpResponse, SmtpError> {
        if !session.can_execute_command("HELO") {
            return Err(SmtpError::InvalidState(
                "session already accepted a message".to_string(),
            ));
        }

        if parts.len() < 2 {
            return Err(SmtpError::InvalidSyntax(
                "HELO requires domain argument".to_string(),
            ));
        }

        let client_domain = parts[1].to_string();
        session.set_client_domain(client_domain.clone())?;

        if extended {
            Ok(SmtpResponse::ehlo(
                &self.config.hostname,
                &client_domain,
                !self.config.hide_enhanced_status_codes,
            ))
        } else {
            Ok(SmtpResponse::helo(&self.config.hostname, &client_domain))
        }
    }

    /// Handle MAIL command
    fn handle_mail(
        &self,
        parts: Vec<&str>,
        session: &mut SmtpSession,
    ) -> Result<SmtpResponse, SmtpError> {
        if !session.can_execute_command("MAIL") {
            let msg = match session.state {
                SessionState::DataComplete => "session already accepted a message",
                _ => "nested MAIL command",
            };
            return Err(SmtpError::InvalidState(msg.to_string()));
        }

        if !self.config.auth_optional {
            return Err(SmtpError::AuthRequired);
        }

        if parts.len() < 2 {
            return Err(SmtpError::InvalidSyntax(
                "MAIL requires FROM argument".to_string(),
            ));
        }

        let from_part = parts[1..].join(" ");
        if !from_part.to_uppercase().starts_with("FROM:") {
            return Err(SmtpError::InvalidSyntax(
                "MAIL command must be 'MAIL FROM:<address>'".to_string(),
            ));
        }

        let addr = Self::extract_path(from_part[5..].trim())?;
        self.validate_email_address(&addr)?;

        session.set_sender(addr)?;

        Ok(SmtpResponse::sender_ok())
    }

    /// Handle RCPT command
    fn handle_rcpt(
        &self,
        parts: Vec<&str>,
        session: &mut SmtpSession,
    ) -> Result<SmtpResponse, SmtpError> {
        if !session.can_execute_command("RCPT") {
            return Err(SmtpError::InvalidState(
                "RCPT command requires MAIL first".to_string(),
            ));
        }

        if parts.len() < 2 {
            return Err(SmtpError::InvalidSyntax(
                "RCPT requires TO argument".to_string(),
            ));
        }

        let to_part = parts[1..].join(" ");
        if !to_part.to_uppercase().starts_with("TO:") {
            return Err(SmtpError::InvalidSyntax(
                "RCPT command must be 'RCPT TO:<address>'".to_string(),
            ));
        }

        let addr = Self::extract_path(to_part[3..].trim())?;
        self.validate_email_address(&addr)?;

        session.add_recipient(addr)?;

        Ok(SmtpResponse::recipient_ok())
    }

    /// Handle DATA command
    fn handle_data(
        &self,
        parts: Vec<&str>,
        session: &mut SmtpSession,
    ) -> Result<SmtpResponse, SmtpError> {
        if !session.can_execute_command("DATA") {
            let msg = match session.state {
                SessionState::DataComplete => "session already accepted a message",
                _ => "DATA command requires RCPT first",
            };
            return Err(SmtpError::InvalidState(msg.to_string()));
        }

        if parts.len() > 1 {
            return Err(SmtpError::InvalidSyntax(
                "DATA command takes no arguments".to_string(),
            ));
        }

        let min = self.config.min_recipients;
        if session.recipient_count() < min {
            return Err(SmtpError::InvalidState(format!(
                "need at least {min} recipient(s) before DATA"
            )));
        }

        session.begin_data()?;

        Ok(SmtpResponse::data_start())
    }

    /// Handle RSET command
    fn handle_rset(&self, session: &mut SmtpSession) -> Result<SmtpResponse, SmtpError> {
        if !session.can_execute_command("RSET") {
            return Err(SmtpError::InvalidState(
                "session already accepted a message".to_string(),
            ));
        }

        session.reset();
        Ok(SmtpResponse::ok())
    }

    /// Handle NOOP command
    fn handle_noop(&self) -> Result<SmtpResponse, SmtpError> {
        Ok(SmtpResponse::ok())
    }

    /// Handle QUIT command
    fn handle_quit(&self, session: &mut SmtpSession) -> Result<SmtpResponse, SmtpError> {
        session.mark_closed();
        Ok(SmtpResponse::quit())
    }

    /// Extract the address from an angle-bracketed path.
    ///
    /// Anything after the closing bracket is an ESMTP parameter list
    /// (e.g. `SIZE=1024`), accepted and ignored.
    fn extract_path(raw: &str) -> Result<String, SmtpError> {
        if !raw.starts_with('<') {
            return Err(SmtpError::InvalidSyntax(
                "address must be enclosed in angle brackets".to_string(),
            ));
        }

        let end = raw.find('>').ok_or_else(|| {
            SmtpError::InvalidSyntax("address must be enclosed in angle brackets".to_string())
        })?;

        let addr = raw[1..end].to_string();
        if addr.is_empty() {
            return Err(SmtpError::InvalidSyntax(
                "address cannot be empty".to_string(),
            ));
        }

        Ok(addr)
    }

    /// Validate email address format and size limits
    fn validate_email_address(&self, addr: &str) -> Result<(), SmtpError> {
        // Check for @ symbol
        if let Some(at_pos) = addr.find('@') {
            let user_part = &addr[..at_pos];
            let domain_part = &addr[at_pos + 1..];

            // Check user part length
            if user_part.len() > SmtpLimits::USER_MAX_LENGTH {
                return Err(SmtpError::UserTooLong {
                    max: SmtpLimits::USER_MAX_LENGTH,
                });
            }

            // Check domain part length
            if domain_part.len() > SmtpLimits::DOMAIN_MAX_LENGTH {
                return Err(SmtpError::DomainTooLong {
                    max: SmtpLimits::DOMAIN_MAX_LENGTH,
                });
            }

            // Basic validation - must have user and domain parts
            if user_part.is_empty() || domain_part.is_empty() {
                return Err(SmtpError::InvalidSyntax(
                    "Invalid email address format".to_string(),
                ));
            }
        } else {
            return Err(SmtpError::InvalidSyntax(
                "Email address must contain @ symbol".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_config() -> Config {
        Config::default()
    }

    #[test]
    fn test_helo_command() {
        let config = create_config();
        let handler = SmtpCommandHandler::new(&config);
        let mut session = SmtpSession::new(1);

        let response = handler
            .process_command("HELO client.local", &mut session)
            .unwrap();

        assert_eq!(response.code, "250");
        assert_eq!(
            response.message,
            format!("{} Hello client.local", config.hostname)
        );
        assert_eq!(session.client_domain, Some("client.local".to_string()));
    }

    #[test]
    fn test_ehlo_capabilities() {
        let config = create_config();
        let handler = SmtpCommandHandler::new(&config);
        let mut session = SmtpSession::new(1);

        let response = handler
            .process_command("EHLO client.local", &mut session)
            .unwrap();

        let lines = response.multiline.unwrap();
        assert!(lines.contains(&"PIPELINING".to_string()));
        assert!(lines.contains(&"ENHANCEDSTATUSCODES".to_string()));
    }

    #[test]
    fn test_ehlo_enhanced_suppressed() {
        let config = Config {
            hide_enhanced_status_codes: true,
            ..Config::default()
        };
        let handler = SmtpCommandHandler::new(&config);
        let mut session = SmtpSession::new(1);

        let response = handler
            .process_command("EHLO client.local", &mut session)
            .unwrap();

        let lines = response.multiline.unwrap();
        assert!(!lines.contains(&"ENHANCEDSTATUSCODES".to_string()));
    }

    #[test]
    fn test_helo_missing_domain() {
        let config = create_config();
        let handler = SmtpCommandHandler::new(&config);
        let mut session = SmtpSession::new(1);

        let result = handler.process_command("HELO", &mut session);
        assert!(result.is_err());
    }

    #[test]
    fn test_mail_command_without_helo() {
        // MAIL is valid straight from the connected state
        let config = create_config();
        let handler = SmtpCommandHandler::new(&config);
        let mut session = SmtpSession::new(1);

        let response = handler
            .process_command("MAIL FROM:<sender@example.com>", &mut session)
            .unwrap();

        assert_eq!(response.code, "250");
        assert_eq!(session.sender, Some("sender@example.com".to_string()));
    }

    #[test]
    fn test_mail_with_esmtp_parameters() {
        let config = create_config();
        let handler = SmtpCommandHandler::new(&config);
        let mut session = SmtpSession::new(1);

        let response = handler
            .process_command("MAIL FROM:<sender@example.com> SIZE=1024", &mut session)
            .unwrap();

        assert_eq!(response.code, "250");
        assert_eq!(session.sender, Some("sender@example.com".to_string()));
    }

    #[test]
    fn test_nested_mail_rejected() {
        let config = create_config();
        let handler = SmtpCommandHandler::new(&config);
        let mut session = SmtpSession::new(1);

        handler
            .process_command("MAIL FROM:<sender@example.com>", &mut session)
            .unwrap();
        let result = handler.process_command("MAIL FROM:<other@example.com>", &mut session);
        assert!(matches!(result, Err(SmtpError::InvalidState(_))));
    }

    #[test]
    fn test_mail_requires_auth_when_not_optional() {
        let config = Config {
            auth_optional: false,
            ..Config::default()
        };
        let handler = SmtpCommandHandler::new(&config);
        let mut session = SmtpSession::new(1);

        let result = handler.process_command("MAIL FROM:<sender@example.com>", &mut session);
        assert!(matches!(result, Err(SmtpError::AuthRequired)));
    }

    #[test]
    fn test_mail_invalid_syntax() {
        let config = create_config();
        let handler = SmtpCommandHandler::new(&config);
        let mut session = SmtpSession::new(1);

        let result = handler.process_command("MAIL sender@example.com", &mut session);
        assert!(result.is_err());
    }

    #[test]
    fn test_rcpt_command() {
        let config = create_config();
        let handler = SmtpCommandHandler::new(&config);
        let mut session = SmtpSession::new(1);

        handler
            .process_command("MAIL FROM:<sender@example.com>", &mut session)
            .unwrap();

        let response = handler
            .process_command("RCPT TO:<recipient@example.com>", &mut session)
            .unwrap();

        assert_eq!(response.code, "250");
        assert_eq!(session.recipients, vec!["recipient@example.com".to_string()]);
    }

    #[test]
    fn test_rcpt_without_mail() {
        let config = create_config();
        let handler = SmtpCommandHandler::new(&config);
        let mut session = SmtpSession::new(1);

        let result = handler.process_command("RCPT TO:<recipient@example.com>", &mut session);
        assert!(result.is_err());
    }

    #[test]
    fn test_data_command() {
        let config = create_config();
        let handler = SmtpCommandHandler::new(&config);
        let mut session = SmtpSession::new(1);

        handler
            .process_command("MAIL FROM:<sender@example.com>", &mut session)
            .unwrap();
        handler
            .process_command("RCPT TO:<recipient@example.com>", &mut session)
            .unwrap();

        let response = handler.process_command("DATA", &mut session).unwrap();

        assert_eq!(response.code, "354");
        assert_eq!(session.state, SessionState::DataInProgress);
    }

    #[test]
    fn test_data_without_rcpt() {
        let config = create_config();
        let handler = SmtpCommandHandler::new(&config);
        let mut session = SmtpSession::new(1);

        handler
            .process_command("MAIL FROM:<sender@example.com>", &mut session)
            .unwrap();

        let result = handler.process_command("DATA", &mut session);
        assert!(matches!(result, Err(SmtpError::InvalidState(_))));
    }

    #[test]
    fn test_data_respects_min_recipients() {
        let config = Config {
            min_recipients: 2,
            ..Config::default()
        };
        let handler = SmtpCommandHandler::new(&config);
        let mut session = SmtpSession::new(1);

        handler
            .process_command("MAIL FROM:<sender@example.com>", &mut session)
            .unwrap();
        handler
            .process_command("RCPT TO:<one@example.com>", &mut session)
            .unwrap();

        let result = handler.process_command("DATA", &mut session);
        assert!(matches!(result, Err(SmtpError::InvalidState(_))));

        handler
            .process_command("RCPT TO:<two@example.com>", &mut session)
            .unwrap();
        let response = handler.process_command("DATA", &mut session).unwrap();
        assert_eq!(response.code, "354");
    }

    #[test]
    fn test_rset_command() {
        let config = create_config();
        let handler = SmtpCommandHandler::new(&config);
        let mut session = SmtpSession::new(1);

        handler
            .process_command("MAIL FROM:<sender@example.com>", &mut session)
            .unwrap();
        handler
            .process_command("RCPT TO:<recipient@example.com>", &mut session)
            .unwrap();

        let response = handler.process_command("RSET", &mut session).unwrap();

        assert_eq!(response.code, "250");
        assert!(session.sender.is_none());
        assert!(session.recipients.is_empty());
    }

    #[test]
    fn test_noop_command() {
        let config = create_config();
        let handler = SmtpCommandHandler::new(&config);
        let mut session = SmtpSession::new(1);

        let response = handler.process_command("NOOP", &mut session).unwrap();
        assert_eq!(response.code, "250");
    }

    #[test]
    fn test_quit_command() {
        let config = create_config();
        let handler = SmtpCommandHandler::new(&config);
        let mut session = SmtpSession::new(1);

        let response = handler.process_command("QUIT", &mut session).unwrap();
        assert_eq!(response.code, "221");
        assert_eq!(session.state, SessionState::Closed);
    }

    #[test]
    fn test_auth_not_implemented() {
        let config = create_config();
        let handler = SmtpCommandHandler::new(&config);
        let mut session = SmtpSession::new(1);

        let result = handler.process_command("AUTH PLAIN", &mut session);
        assert!(matches!(result, Err(SmtpError::NotImplemented)));
    }

    #[test]
    fn test_auth_refused_without_insecure_allowance() {
        let config = Config {
            allow_insecure_auth: false,
            ..Config::default()
        };
        let handler = SmtpCommandHandler::new(&config);
        let mut session = SmtpSession::new(1);

        let result = handler.process_command("AUTH PLAIN", &mut session);
        assert!(matches!(result, Err(SmtpError::EncryptionRequired)));
    }

    #[test]
    fn test_invalid_command() {
        let config = create_config();
        let handler = SmtpCommandHandler::new(&config);
        let mut session = SmtpSession::new(1);

        let result = handler.process_command("INVALID", &mut session);
        assert!(result.is_err());
    }

    #[test]
    fn test_command_line_too_long() {
        let config = create_config();
        let handler = SmtpCommandHandler::new(&config);
        let mut session = SmtpSession::new(1);

        let long_command = "HELO ".to_string() + &"a".repeat(SmtpLimits::COMMAND_LINE_MAX_LENGTH);
        let result = handler.process_command(&long_command, &mut session);
        assert!(matches!(result, Err(SmtpError::LineTooLong { .. })));
    }

    #[test]
    fn test_validate_email_address() {
        let config = create_config();
        let handler = SmtpCommandHandler::new(&config);

        // Valid addresses
        assert!(handler.validate_email_address("user@example.com").is_ok());
        assert!(handler.validate_email_address("test@test.local").is_ok());

        // Invalid addresses
        assert!(handler.validate_email_address("invalid").is_err());
        assert!(handler.validate_email_address("@example.com").is_err());
        assert!(handler.validate_email_address("user@").is_err());

        // Too long user part
        let long_user = "a".repeat(SmtpLimits::USER_MAX_LENGTH + 1) + "@example.com";
        assert!(matches!(
            handler.validate_email_address(&long_user),
            Err(SmtpError::UserTooLong { .. })
        ));

        // Too long domain part
        let long_domain = "user@".to_string() + &"a".repeat(SmtpLimits::DOMAIN_MAX_LENGTH + 1);
        assert!(matches!(
            handler.validate_email_address(&long_domain),
            Err(SmtpError::DomainTooLong { .. })
        ));
    }

    #[test]
    fn test_empty_email_addresses() {
        let config = create_config();
        let handler = SmtpCommandHandler::new(&config);
        let mut session = SmtpSession::new(1);

        // Empty FROM address
        let result = handler.process_command("MAIL FROM:<>", &mut session);
        assert!(result.is_err());

        // Empty TO address
        session
            .set_sender("sender@example.com".to_string())
            .unwrap();
        let result = handler.process_command("RCPT TO:<>", &mut session);
        assert!(result.is_err());
    }
}
