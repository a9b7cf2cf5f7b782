//! Error types for the SMTP endpoint

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SmtpError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid command")]
    InvalidCommand,

    #[error("Invalid state for command")]
    InvalidState(String),

    #[error("Invalid syntax")]
    InvalidSyntax(String),

    #[error("Command not implemented")]
    NotImplemented,

    #[error("Authentication required")]
    AuthRequired,

    #[error("Encryption required for authentication")]
    EncryptionRequired,

    #[error("Line too long (max {max} characters)")]
    LineTooLong { max: usize },

    #[error("Path too long (max {max} characters)")]
    PathTooLong { max: usize },

    #[error("Too many recipients (max {max})")]
    TooManyRecipients { max: usize },

    #[error("Domain name too long (max {max} characters)")]
    DomainTooLong { max: usize },

    #[error("User name too long (max {max} characters)")]
    UserTooLong { max: usize },

    #[error("Storage error: {0}")]
    Storage(std::io::Error),
}

/// SMTP size limits as defined in RFC 821
pub struct SmtpLimits;

impl SmtpLimits {
    /// Maximum length of a user name
    pub const USER_MAX_LENGTH: usize = 64;

    /// Maximum length of a domain name
    pub const DOMAIN_MAX_LENGTH: usize = 64;

    /// Maximum length of a path (reverse-path or forward-path)
    pub const PATH_MAX_LENGTH: usize = 256;

    /// Maximum length of a command line including CRLF
    pub const COMMAND_LINE_MAX_LENGTH: usize = 512;

    /// Maximum length of a reply line including CRLF
    pub const REPLY_LINE_MAX_LENGTH: usize = 512;

    /// Maximum number of recipients per message
    pub const MAX_RECIPIENTS: usize = 100;
}

/// Maps SMTP errors to appropriate response codes
impl SmtpError {
    pub fn to_response_code(&self) -> &'static str {
        match self {
            SmtpError::Io(_) => "421",
            SmtpError::InvalidCommand => "500",
            SmtpError::InvalidState(_) => "503",
            SmtpError::InvalidSyntax(_) => "501",
            SmtpError::NotImplemented => "502",
            SmtpError::AuthRequired => "530",
            SmtpError::EncryptionRequired => "538",
            SmtpError::LineTooLong { .. } => "500",
            SmtpError::PathTooLong { .. } => "501",
            SmtpError::TooManyRecipients { .. } => "552",
            SmtpError::DomainTooLong { .. } => "501",
            SmtpError::UserTooLong { .. } => "501",
            SmtpError::Storage(_) => "451",
        }
    }

    /// Enhanced status code (RFC 3463) attached to the reply line unless the
    /// server is configured to suppress them.
    pub fn enhanced_code(&self) -> Option<&'static str> {
        match self {
            SmtpError::Io(_) => Some("4.3.0"),
            SmtpError::InvalidCommand => Some("5.5.2"),
            SmtpError::InvalidState(_) => Some("5.5.1"),
            SmtpError::InvalidSyntax(_) => Some("5.5.4"),
            SmtpError::NotImplemented => Some("5.5.1"),
            SmtpError::AuthRequired => Some("5.7.0"),
            SmtpError::EncryptionRequired => Some("5.7.11"),
            SmtpError::LineTooLong { .. } => Some("5.5.2"),
            SmtpError::PathTooLong { .. } => Some("5.1.3"),
            SmtpError::TooManyRecipients { .. } => Some("5.5.3"),
            SmtpError::DomainTooLong { .. } => Some("5.1.3"),
            SmtpError::UserTooLong { .. } => Some("5.1.3"),
            SmtpError::Storage(_) => Some("4.3.0"),
        }
    }

    pub fn to_response_message(&self) -> String {
        match self {
            SmtpError::Io(_) => "Service not available".to_string(),
            SmtpError::InvalidCommand => "Syntax error, command unrecognized".to_string(),
            SmtpError::InvalidState(msg) => format!("Bad sequence of commands: {msg}"),
            SmtpError::InvalidSyntax(msg) => format!("Syntax error: {msg}"),
            SmtpError::NotImplemented => "Command not implemented".to_string(),
            SmtpError::AuthRequired => "Authentication required".to_string(),
            SmtpError::EncryptionRequired => {
                "Encryption required for requested authentication mechanism".to_string()
            }
            SmtpError::LineTooLong { max } => format!("Line too long (max {max} characters)"),
            SmtpError::PathTooLong { max } => format!("Path too long (max {max} characters)"),
            SmtpError::TooManyRecipients { max } => format!("Too many recipients (max {max})"),
            SmtpError::DomainTooLong { max } => {
                format!("Domain name too long (max {max} characters)")
            }
            SmtpError::UserTooLong { max } => {
                format!("User name too long (max {max} characters)")
            }
            SmtpError::Storage(_) => "Local error in processing, message not stored".to_string(),
        }
    }
}
