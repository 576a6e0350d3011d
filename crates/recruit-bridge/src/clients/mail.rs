//! Mail service client.
//!
//! Sending is still request/reply: the mail service acknowledges once it has
//! accepted the message, so a failed send surfaces to the caller.

use crate::domain::error::{BridgeError, BridgeResult};
use crate::facade::RpcBridge;
use serde::{Deserialize, Serialize};

pub const SEND_MAIL: &str = "send_mail";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MailMessage {
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<String>,
}

#[derive(Deserialize)]
struct MailReceipt {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Clone)]
pub struct MailClient {
    bridge: RpcBridge,
    queue: String,
}

impl MailClient {
    pub fn new(bridge: RpcBridge, queue: &str) -> Self {
        Self {
            bridge,
            queue: queue.to_string(),
        }
    }

    /// Hand a message to the mail service. Returns its acknowledgement text.
    pub async fn send(&self, mail: &MailMessage) -> BridgeResult<String> {
        if mail.to.is_empty() {
            return Err(BridgeError::InvalidRequest {
                message_type: SEND_MAIL.to_string(),
                reason: "mail has no recipients".into(),
            });
        }
        let receipt: MailReceipt = self.bridge.call_typed(&self.queue, SEND_MAIL, mail).await?;
        Ok(receipt.message.unwrap_or_default())
    }
}
