// SPDX-FileCopyrightText: 2026 Blockshop Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shorthands for common server commands.
//!
//! Queued helpers use fixed priorities so moderation (`ban`, `kick`) and
//! rank changes overtake cosmetic chatter.

use blockshop_core::{BlockshopError, Command};

use crate::dispatcher::CommandDispatcher;
use crate::queue::CommandId;

pub const PRIORITY_BAN: i32 = 9;
pub const PRIORITY_KICK: i32 = 8;
pub const PRIORITY_SET_RANK: i32 = 10;
pub const PRIORITY_GIVE: i32 = 5;
pub const PRIORITY_GIVE_COINS: i32 = 5;
pub const PRIORITY_TITLE: i32 = 3;
pub const PRIORITY_MESSAGE: i32 = 2;
pub const PRIORITY_BROADCAST: i32 = 1;

impl CommandDispatcher {
    /// `give <player> <item> <quantity> [nbt]`
    pub fn give(&self, username: &str, item: &str, quantity: u32, nbt: Option<&str>) -> CommandId {
        let mut args = vec![username.to_string(), item.to_string(), quantity.to_string()];
        args.extend(nbt.map(str::to_string));
        self.enqueue_command(&Command::new("give", args), PRIORITY_GIVE, Some(username))
    }

    pub fn set_rank(&self, username: &str, rank: &str) -> CommandId {
        self.enqueue_command(
            &Command::new("lp", ["user", username, "parent", "set", rank]),
            PRIORITY_SET_RANK,
            Some(username),
        )
    }

    pub fn give_coins(&self, username: &str, amount: u64) -> CommandId {
        self.enqueue_command(
            &Command::new("eco", ["give".to_string(), username.to_string(), amount.to_string()]),
            PRIORITY_GIVE_COINS,
            Some(username),
        )
    }

    pub fn broadcast(&self, message: &str) -> CommandId {
        self.enqueue_command(&Command::new("broadcast", [message]), PRIORITY_BROADCAST, None)
    }

    /// Queues a title and, when given, a subtitle.
    pub fn send_title(&self, username: &str, title: &str, subtitle: Option<&str>) -> Vec<CommandId> {
        let mut ids = vec![self.enqueue_command(
            &Command::new("title", [username, "title", title]),
            PRIORITY_TITLE,
            Some(username),
        )];
        if let Some(subtitle) = subtitle {
            ids.push(self.enqueue_command(
                &Command::new("title", [username, "subtitle", subtitle]),
                PRIORITY_TITLE,
                Some(username),
            ));
        }
        ids
    }

    pub fn send_message(&self, username: &str, message: &str) -> CommandId {
        self.enqueue_command(
            &Command::new("tellraw", [username, message]),
            PRIORITY_MESSAGE,
            Some(username),
        )
    }

    pub fn kick(&self, username: &str, reason: Option<&str>) -> CommandId {
        self.enqueue_command(
            &Command::new("kick", [username, reason.unwrap_or("Kicked by admin")]),
            PRIORITY_KICK,
            Some(username),
        )
    }

    pub fn ban(&self, username: &str, reason: Option<&str>) -> CommandId {
        self.enqueue_command(
            &Command::new("ban", [username, reason.unwrap_or("Banned by admin")]),
            PRIORITY_BAN,
            Some(username),
        )
    }

    /// Runs `list` immediately.
    pub async fn online_players(&self) -> Result<String, BlockshopError> {
        self.execute_immediate(&Command::new("list", Vec::<String>::new()), None)
            .await
    }

    /// Runs `tps` immediately.
    pub async fn server_tps(&self) -> Result<String, BlockshopError> {
        self.execute_immediate(&Command::new("tps", Vec::<String>::new()), None)
            .await
    }
}
