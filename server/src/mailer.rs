// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::MailConfig;

pub const SEND_ATTEMPTS: u32 = 3;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid address: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("could not build message: {0}")]
    Build(#[from] lettre::error::Error),
    #[error("SMTP delivery failed: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_verification_code(&self, to: &str, code: &str) -> Result<(), MailError>;
}

fn verification_body(code: &str) -> String {
    format!(
        "Your Schedule Planner verification code is: {}\n\n\
         The code is valid for 10 minutes. If you did not ask to reset your password, ignore this email.\n",
        code
    )
}

/// Delivers mail through an SMTP relay.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: String,
}

impl SmtpMailer {
    pub fn new(config: &MailConfig) -> Result<Self, MailError> {
        let builder = if !config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.server)
        } else if config.port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.server)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.server)?
        };

        let transport = builder
            .port(config.port)
            .credentials(Credentials::new(config.username.clone(), config.password.clone()))
            .timeout(Some(Duration::from_secs(10)))
            .build();

        Ok(Self {
            transport,
            sender: config.sender.clone(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_verification_code(&self, to: &str, code: &str) -> Result<(), MailError> {
        let message = Message::builder()
            .from(self.sender.parse()?)
            .to(to.parse()?)
            .subject("Schedule Planner password reset code")
            .header(ContentType::TEXT_PLAIN)
            .body(verification_body(code))?;

        self.transport.send(message).await?;
        info!("Verification code sent to {}", to);
        Ok(())
    }
}

/// Development mailer: writes the code to the log instead of sending it.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_verification_code(&self, to: &str, code: &str) -> Result<(), MailError> {
        info!("[dev mail] verification code for {}: {}", to, code);
        Ok(())
    }
}

/// Keeps sent codes in memory so tests can read them back.
#[derive(Default)]
pub struct MemoryMailer {
    sent: Mutex<Vec<(String, String)>>,
}

impl MemoryMailer {
    pub fn last_code_for(&self, to: &str) -> Option<String> {
        self.sent
            .lock()
            .iter()
            .rev()
            .find(|(recipient, _)| recipient == to)
            .map(|(_, code)| code.clone())
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send_verification_code(&self, to: &str, code: &str) -> Result<(), MailError> {
        self.sent.lock().push((to.to_string(), code.to_string()));
        Ok(())
    }
}

/// Picks SMTP when credentials are configured, the log mailer otherwise.
pub fn mailer_from_config(config: &MailConfig) -> Result<Arc<dyn Mailer>, MailError> {
    if config.has_credentials() {
        Ok(Arc::new(SmtpMailer::new(config)?))
    } else {
        warn!("No SMTP credentials configured, verification codes will only be logged");
        Ok(Arc::new(LogMailer))
    }
}

/// Sends a code with up to [`SEND_ATTEMPTS`] tries, backing off between them.
pub async fn send_with_retries(mailer: &dyn Mailer, to: &str, code: &str) -> Result<(), MailError> {
    let mut attempt = 1;
    loop {
        match mailer.send_verification_code(to, code).await {
            Ok(()) => return Ok(()),
            Err(e) if attempt < SEND_ATTEMPTS => {
                warn!("Mail attempt {}/{} to {} failed: {}", attempt, SEND_ATTEMPTS, to, e);
                tokio::time::sleep(Duration::from_secs(u64::from(attempt))).await;
                attempt += 1;
            }
            Err(e) => {
                error!("Giving up on mail to {} after {} attempts: {}", to, SEND_ATTEMPTS, e);
                return Err(e);
            }
        }
    }
}

/// Fire-and-forget delivery; the request answers before the mail is out.
pub fn dispatch_verification_code(mailer: Arc<dyn Mailer>, to: String, code: String) {
    tokio::spawn(async move {
        let _ = send_with_retries(mailer.as_ref(), &to, &code).await;
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyMailer {
        failures_left: AtomicU32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl Mailer for FlakyMailer {
        async fn send_verification_code(&self, _to: &str, _code: &str) -> Result<(), MailError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failures_left.load(Ordering::SeqCst) > 0 {
                self.failures_left.fetch_sub(1, Ordering::SeqCst);
                let bad: Result<lettre::Address, _> = "not an address".parse();
                return Err(MailError::Address(bad.unwrap_err()));
            }
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_success() {
        let mailer = FlakyMailer {
            failures_left: AtomicU32::new(2),
            calls: AtomicU32::new(0),
        };
        send_with_retries(&mailer, "a@b.co", "123456").await.unwrap();
        assert_eq!(mailer.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_three_attempts() {
        let mailer = FlakyMailer {
            failures_left: AtomicU32::new(5),
            calls: AtomicU32::new(0),
        };
        assert!(send_with_retries(&mailer, "a@b.co", "123456").await.is_err());
        assert_eq!(mailer.calls.load(Ordering::SeqCst), SEND_ATTEMPTS);
    }

    #[tokio::test]
    async fn test_memory_mailer_returns_latest_code() {
        let mailer = MemoryMailer::default();
        mailer.send_verification_code("a@b.co", "111111").await.unwrap();
        mailer.send_verification_code("a@b.co", "222222").await.unwrap();
        assert_eq!(mailer.last_code_for("a@b.co").as_deref(), Some("222222"));
        assert!(mailer.last_code_for("x@y.co").is_none());
    }
}
