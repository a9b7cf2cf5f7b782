//! Process configuration, resolved once at startup

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};

/// Remote object-store target for artifact offload
#[derive(Debug, Clone)]
pub struct OffloadConfig {
    /// Target bucket name
    pub bucket: String,
    /// AWS region of the bucket
    pub region: String,
}

/// Immutable server configuration.
///
/// Resolved from the environment once at process start; there is no hot
/// reload.
#[derive(Debug, Clone)]
pub struct Config {
    /// Listen host
    pub host: String,
    /// Listen port
    pub port: u16,
    /// Hostname announced in the greeting and HELO/EHLO replies
    pub hostname: String,
    /// Permit AUTH on unencrypted connections (carried for the transport
    /// boundary; AUTH mechanisms themselves are not implemented)
    pub allow_insecure_auth: bool,
    /// Accept mail from unauthenticated clients; when false, MAIL is
    /// refused with 530
    pub auth_optional: bool,
    /// Strip RFC 3463 enhanced status codes from replies
    pub hide_enhanced_status_codes: bool,
    /// Recipients required before DATA is accepted (at least 1)
    pub min_recipients: usize,
    /// Directory where accepted messages are spooled
    pub spool_dir: PathBuf,
    /// How long draining sessions may run before a forced stop
    pub grace_period: Duration,
    /// Remote offload target, when enabled
    pub offload: Option<OffloadConfig>,
}

impl Config {
    /// Resolve the configuration from the environment.
    ///
    /// `upload_to_s3` mirrors the process argument gating the offload; when
    /// set, `S3_BUCKET` must name the target bucket.
    pub fn from_env(upload_to_s3: bool) -> Result<Self> {
        let host = env::var("SMTP_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("SMTP_PORT")
            .unwrap_or_else(|_| "25".to_string())
            .parse()
            .context("SMTP_PORT must be a valid port number")?;
        let hostname =
            env::var("SMTP_HOSTNAME").unwrap_or_else(|_| "mailspool.local".to_string());

        let allow_insecure_auth = env_flag("SMTP_ALLOW_INSECURE_AUTH", true)?;
        let auth_optional = env_flag("SMTP_AUTH_OPTIONAL", true)?;
        let hide_enhanced_status_codes = env_flag("SMTP_HIDE_ENHANCED_STATUS_CODES", false)?;

        let min_recipients: usize = env::var("SMTP_MIN_RECIPIENTS")
            .unwrap_or_else(|_| "1".to_string())
            .parse()
            .context("SMTP_MIN_RECIPIENTS must be a number")?;
        if min_recipients == 0 {
            bail!("SMTP_MIN_RECIPIENTS must be at least 1");
        }

        let spool_dir = PathBuf::from(env::var("SPOOL_DIR").unwrap_or_else(|_| "emails".to_string()));

        let grace_secs: u64 = env::var("SHUTDOWN_GRACE_SECS")
            .unwrap_or_else(|_| "5".to_string())
            .parse()
            .context("SHUTDOWN_GRACE_SECS must be a number of seconds")?;

        let offload = if upload_to_s3 {
            let bucket = env::var("S3_BUCKET")
                .context("S3 bucket not configured; set S3_BUCKET to enable upload")?;
            let region = env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_string());
            Some(OffloadConfig { bucket, region })
        } else {
            None
        };

        Ok(Self {
            host,
            port,
            hostname,
            allow_insecure_auth,
            auth_optional,
            hide_enhanced_status_codes,
            min_recipients,
            spool_dir,
            grace_period: Duration::from_secs(grace_secs),
            offload,
        })
    }

    /// The socket address to listen on
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 25,
            hostname: "mailspool.local".to_string(),
            allow_insecure_auth: true,
            auth_optional: true,
            hide_enhanced_status_codes: false,
            min_recipients: 1,
            spool_dir: PathBuf::from("emails"),
            grace_period: Duration::from_secs(5),
            offload: None,
        }
    }
}

fn env_flag(name: &str, default: bool) -> Result<bool> {
    match env::var(name) {
        Ok(value) => match value.to_lowercase().as_str() {
            "1" | "true" | "yes" => Ok(true),
            "0" | "false" | "no" => Ok(false),
            other => bail!("{name} must be a boolean, got {other:?}"),
        },
        Err(_) => Ok(default),
    }
}
