use anyhow::Context;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use uuid::Uuid;

use crate::config::Config;
use crate::models::token::IssuedToken;

pub struct EmailService {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl EmailService {
    /// Returns None if SMTP is not fully configured.
    pub fn new(config: &Config) -> Option<Self> {
        let host = config.smtp_host.as_deref()?;
        let username = config.smtp_username.clone()?;
        let password = config.smtp_password.clone()?;
        let from_addr = config.smtp_from.as_deref()?;

        let port = config.smtp_port.unwrap_or(587);
        let creds = Credentials::new(username, password);

        let transport = if port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(host)
                .ok()?
                .credentials(creds)
                .build()
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                .ok()?
                .credentials(creds)
                .build()
        };

        let from: Mailbox = from_addr.parse().ok()?;

        Some(Self { transport, from })
    }

    fn new_message_id(&self) -> String {
        format!("<{}@{}>", Uuid::new_v4(), self.from.email.domain())
    }

    fn wrap_html(title: &str, content: &str) -> String {
        format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width,initial-scale=1">
  <title>{title}</title>
</head>
<body style="margin:0;padding:0;background-color:#f1f5f9;font-family:-apple-system,BlinkMacSystemFont,'Segoe UI',Roboto,Helvetica,Arial,sans-serif">
  <table role="presentation" width="100%" cellpadding="0" cellspacing="0" style="background-color:#f1f5f9;padding:40px 16px">
    <tr>
      <td align="center">
        <table role="presentation" width="100%" cellpadding="0" cellspacing="0" style="max-width:520px">
          <tr>
            <td style="background:#ffffff;border-radius:12px;padding:40px">
              {content}
            </td>
          </tr>
        </table>
      </td>
    </tr>
  </table>
</body>
</html>"#
        )
    }

    async fn send_email(
        &self,
        to: &str,
        subject: &str,
        text: &str,
        html: &str,
    ) -> anyhow::Result<()> {
        let to: Mailbox = to.parse().context("invalid recipient address")?;
        let email = Message::builder()
            .message_id(Some(self.new_message_id()))
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html.to_string()),
                    ),
            )?;
        self.transport.send(email).await?;
        Ok(())
    }

    pub async fn send_activation_token(
        &self,
        to: &str,
        token: &IssuedToken,
    ) -> anyhow::Result<()> {
        let text = format!(
            "Welcome!\n\nYour activation token is:\n\n{}\n\nIt is valid until {}.",
            token.plaintext, token.expiry
        );
        let html = Self::wrap_html(
            "Your activation token",
            &format!(
                r#"<p>Welcome!</p>
<p>Your activation token is:</p>
<p style="font-family:monospace;font-size:16px;background:#f1f5f9;padding:12px;border-radius:8px">{}</p>
<p style="color:#64748b;font-size:13px">It is valid until {}.</p>"#,
                token.plaintext, token.expiry
            ),
        );
        self.send_email(to, "Your activation token", &text, &html)
            .await
    }

    pub async fn send_password_reset_token(
        &self,
        to: &str,
        token: &IssuedToken,
    ) -> anyhow::Result<()> {
        let text = format!(
            "A password reset was requested for your account.\n\nYour reset token is:\n\n{}\n\nIt is valid until {}.\nIf you did not request this, you can ignore this message.",
            token.plaintext, token.expiry
        );
        let html = Self::wrap_html(
            "Password reset",
            &format!(
                r#"<p>A password reset was requested for your account.</p>
<p>Your reset token is:</p>
<p style="font-family:monospace;font-size:16px;background:#f1f5f9;padding:12px;border-radius:8px">{}</p>
<p style="color:#64748b;font-size:13px">It is valid until {}. If you did not request this, you can ignore this message.</p>"#,
                token.plaintext, token.expiry
            ),
        );
        self.send_email(to, "Password reset", &text, &html).await
    }
}
