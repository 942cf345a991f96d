use async_trait::async_trait;

use crate::config::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailKind {
    Verification,
    PasswordReset,
}

#[derive(Debug, Clone)]
pub struct Mail {
    pub kind: MailKind,
    pub to: String,
    pub username: String,
    pub token: String,
}

impl Mail {
    pub fn subject(&self) -> &'static str {
        match self.kind {
            MailKind::Verification => "Verify Your Email - Not Natty",
            MailKind::PasswordReset => "Reset Your Password - Not Natty",
        }
    }

    pub fn link(&self, frontend_url: &str) -> String {
        self.link_with(frontend_url, &self.token)
    }

    /// The link with its token blanked out, safe for shared logs.
    pub fn redacted_link(&self, frontend_url: &str) -> String {
        self.link_with(frontend_url, "[redacted]")
    }

    fn link_with(&self, frontend_url: &str, token: &str) -> String {
        let path = match self.kind {
            MailKind::Verification => "verify-email",
            MailKind::PasswordReset => "reset-password",
        };
        format!("{}/{path}?token={token}", frontend_url.trim_end_matches('/'))
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: Mail) -> anyhow::Result<()>;
}

/// Development transport: renders the mail and writes it to the log.
/// Tokens are redacted unless `MAIL_LOG_LINKS` is on.
pub struct LogMailer {
    from: String,
    frontend_url: String,
    log_links: bool,
}

impl LogMailer {
    pub fn new(config: &Config) -> Self {
        if config.mail_log_links {
            tracing::warn!("⚠️ MAIL_LOG_LINKS is on, account tokens will appear in the log");
        }
        Self {
            from: config.mail_from.clone(),
            frontend_url: config.frontend_url.clone(),
            log_links: config.mail_log_links,
        }
    }

    fn rendered_link(&self, mail: &Mail) -> String {
        if self.log_links {
            mail.link(&self.frontend_url)
        } else {
            mail.redacted_link(&self.frontend_url)
        }
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: Mail) -> anyhow::Result<()> {
        tracing::info!(
            from = %self.from,
            to = %mail.to,
            subject = mail.subject(),
            "📧 Hi {}, follow {} (link expires soon)",
            mail.username,
            self.rendered_link(&mail),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn links_point_at_the_frontend() {
        let mail = Mail {
            kind: MailKind::PasswordReset,
            to: "a@b.com".into(),
            username: "abc".into(),
            token: "tok".into(),
        };
        assert_eq!(mail.link("http://localhost:3000/"), "http://localhost:3000/reset-password?token=tok");
    }

    #[test]
    fn logged_links_hide_the_token_by_default() {
        let mail = Mail {
            kind: MailKind::Verification,
            to: "a@b.com".into(),
            username: "abc".into(),
            token: "secret-token".into(),
        };

        let quiet = LogMailer::new(&Config::default());
        let logged = quiet.rendered_link(&mail);
        assert!(!logged.contains("secret-token"));
        assert_eq!(logged, "http://localhost:3000/verify-email?token=[redacted]");

        let loud = LogMailer::new(&Config { mail_log_links: true, ..Config::default() });
        assert_eq!(loud.rendered_link(&mail), "http://localhost:3000/verify-email?token=secret-token");
    }
}
