use std::sync::Arc;

use tokio::sync::mpsc;

use crate::models::token::IssuedToken;
use crate::services::email::EmailService;

/// Notifications emitted when a mail-worthy token is issued. Carried over
/// an in-process queue; delivery is asynchronous and never affects the
/// operation that published the event.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenEvent {
    ActivationTokenCreated { email: String, token: IssuedToken },
    PasswordResetTokenCreated { email: String, token: IssuedToken },
}

impl TokenEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            TokenEvent::ActivationTokenCreated { .. } => "activation_token_created",
            TokenEvent::PasswordResetTokenCreated { .. } => "password_reset_token_created",
        }
    }
}

/// Publisher half of the event queue. `publish` never blocks and never
/// fails the caller; a closed queue is logged and the event dropped.
#[derive(Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<TokenEvent>,
}

impl EventSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TokenEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn publish(&self, event: TokenEvent) {
        let kind = event.kind();
        if self.tx.send(event).is_err() {
            tracing::warn!("event queue closed, dropping {} event", kind);
        }
    }
}

/// Drains the event queue into the mail service. Without SMTP configured
/// the events are logged and dropped.
pub fn spawn_mail_dispatcher(
    mut rx: mpsc::UnboundedReceiver<TokenEvent>,
    email: Option<Arc<EmailService>>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let Some(svc) = email.as_ref() else {
                tracing::debug!("SMTP not configured, dropping {} event", event.kind());
                continue;
            };
            let result = match &event {
                TokenEvent::ActivationTokenCreated { email, token } => {
                    svc.send_activation_token(email, token).await
                }
                TokenEvent::PasswordResetTokenCreated { email, token } => {
                    svc.send_password_reset_token(email, token).await
                }
            };
            if let Err(e) = result {
                tracing::error!("failed to send {} mail: {e:#}", event.kind());
            }
        }
    })
}
