//! SMTP response handling

/// Represents an SMTP response that can be sent to a client
#[derive(Debug, Clone)]
pub struct SmtpResponse {
    /// The SMTP response code (e.g., "250", "354", "500")
    pub code: String,
    /// Enhanced status code (RFC 3463), e.g. "2.1.0"
    pub enhanced: Option<String>,
    /// The human-readable message
    pub message: String,
    /// Optional multiline messages for EHLO responses
    pub multiline: Option<Vec<String>>,
}

impl SmtpResponse {
    /// Create a new SMTP response without an enhanced status code
    pub fn new(code: &str, message: &str) -> Self {
        Self {
            code: code.to_string(),
            enhanced: None,
            message: message.to_string(),
            multiline: None,
        }
    }

    /// Create a new SMTP response carrying an enhanced status code
    pub fn with_enhanced(code: &str, enhanced: &str, message: &str) -> Self {
        Self {
            code: code.to_string(),
            enhanced: Some(enhanced.to_string()),
            message: message.to_string(),
            multiline: None,
        }
    }

    /// Create a new multiline SMTP response
    pub fn new_multiline(code: &str, message: &str, lines: Vec<String>) -> Self {
        Self {
            code: code.to_owned(),
            enhanced: None,
            message: message.to_owned(),
            multiline: Some(lines),
        }
    }

    /// Create a success response (250 OK)
    pub fn ok() -> Self {
        Self::with_enhanced("250", "2.0.0", "OK")
    }

    /// Create a MAIL FROM acknowledgement (250)
    pub fn sender_ok() -> Self {
        Self::with_enhanced("250", "2.1.0", "Sender OK")
    }

    /// Create a RCPT TO acknowledgement (250)
    pub fn recipient_ok() -> Self {
        Self::with_enhanced("250", "2.1.5", "Recipient OK")
    }

    /// Create an end-of-data acknowledgement (250) once the message is committed
    pub fn message_accepted() -> Self {
        Self::with_enhanced("250", "2.0.0", "OK: message accepted")
    }

    /// Create a greeting response (220)
    pub fn greeting(hostname: &str) -> Self {
        Self::new("220", &format!("{hostname} ESMTP mailspool ready"))
    }

    /// Create a HELO response (250)
    pub fn helo(hostname: &str, client_domain: &str) -> Self {
        Self::new("250", &format!("{hostname} Hello {client_domain}"))
    }

    /// Create an EHLO response (250) with capabilities
    pub fn ehlo(hostname: &str, client_domain: &str, advertise_enhanced: bool) -> Self {
        let mut capabilities = vec!["PIPELINING".to_owned(), "SIZE".to_owned()];
        if advertise_enhanced {
            capabilities.push("ENHANCEDSTATUSCODES".to_owned());
        }
        Self::new_multiline(
            "250",
            &format!("{hostname} Hello {client_domain}"),
            capabilities,
        )
    }

    /// Create a DATA intermediate response (354)
    pub fn data_start() -> Self {
        Self::new("354", "End data with <CR><LF>.<CR><LF>")
    }

    /// Create a QUIT response (221)
    pub fn quit() -> Self {
        Self::with_enhanced("221", "2.0.0", "Bye")
    }

    /// Create an error response from a code, optional enhanced code, and message
    pub fn error(code: &str, enhanced: Option<&str>, message: &str) -> Self {
        Self {
            code: code.to_string(),
            enhanced: enhanced.map(str::to_string),
            message: message.to_string(),
            multiline: None,
        }
    }

    /// Format the response for sending over the wire
    ///
    /// When `hide_enhanced` is set, enhanced status codes are stripped from
    /// the reply line.
    pub fn format(&self, hide_enhanced: bool) -> String {
        if let Some(ref lines) = self.multiline {
            let mut result = format!("{}-{}\r\n", self.code, self.message);
            for (i, line) in lines.iter().enumerate() {
                if i == lines.len() - 1 {
                    // Last line uses space instead of dash
                    result.push_str(&format!("{} {}\r\n", self.code, line));
                } else {
                    result.push_str(&format!("{}-{}\r\n", self.code, line));
                }
            }
            result
        } else {
            match &self.enhanced {
                Some(enhanced) if !hide_enhanced => {
                    format!("{} {} {}\r\n", self.code, enhanced, self.message)
                }
                _ => format!("{} {}\r\n", self.code, self.message),
            }
        }
    }

    /// Check if this is a success response (2xx)
    pub fn is_success(&self) -> bool {
        self.code.starts_with('2')
    }

    /// Check if this is an error response (4xx or 5xx)
    pub fn is_error(&self) -> bool {
        self.code.starts_with('4') || self.code.starts_with('5')
    }
}
