// SPDX-FileCopyrightText: 2026 Blockshop Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! JSON text components for `tellraw` and `title`.

use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ChatComponent<'a> {
    pub text: &'a str,
    pub color: &'a str,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub bold: bool,
}

impl<'a> ChatComponent<'a> {
    pub fn new(text: &'a str, color: &'a str) -> Self {
        Self {
            text,
            color,
            bold: false,
        }
    }

    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    pub fn to_json(&self) -> String {
        // Serialising two strings and a bool cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

pub fn delivered_message(item_id: &str) -> String {
    ChatComponent::new(
        &format!("✅ Your purchase ({item_id}) has been delivered!"),
        "green",
    )
    .to_json()
}

pub fn delivery_failed_message(item_id: &str) -> String {
    ChatComponent::new(
        &format!("❌ Delivery failed for {item_id}. Contact support if this persists."),
        "red",
    )
    .to_json()
}
