// SPDX-FileCopyrightText: 2026 Blockshop Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Priority-ordered holding queue for asynchronously dispatched commands.

use std::collections::VecDeque;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier handed back when a command is queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandId(pub u64);

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cmd-{}", self.0)
    }
}

/// A rendered console line waiting for its tick.
#[derive(Debug, Clone)]
pub struct QueuedCommand {
    pub id: CommandId,
    pub line: String,
    pub priority: i32,
    pub player: Option<String>,
    pub queued_at: DateTime<Utc>,
}

/// Commands ordered by descending priority, arrival order within a priority.
#[derive(Debug, Default)]
pub struct CommandQueue {
    entries: VecDeque<QueuedCommand>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts ahead of the first entry with a strictly lower priority.
    pub fn push(&mut self, command: QueuedCommand) {
        let at = self
            .entries
            .iter()
            .position(|queued| queued.priority < command.priority)
            .unwrap_or(self.entries.len());
        self.entries.insert(at, command);
    }

    pub fn pop(&mut self) -> Option<QueuedCommand> {
        self.entries.pop_front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes and returns everything still waiting.
    pub fn drain(&mut self) -> Vec<QueuedCommand> {
        self.entries.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmd(id: u64, priority: i32) -> QueuedCommand {
        QueuedCommand {
            id: CommandId(id),
            line: format!("say {id}"),
            priority,
            player: None,
            queued_at: Utc::now(),
        }
    }

    #[test]
    fn higher_priority_goes_first_and_ties_keep_arrival_order() {
        let mut queue = CommandQueue::new();
        queue.push(cmd(1, 1));
        queue.push(cmd(2, 5));
        queue.push(cmd(3, 1));
        queue.push(cmd(4, 10));
        queue.push(cmd(5, 5));

        let order: Vec<u64> = std::iter::from_fn(|| queue.pop()).map(|c| c.id.0).collect();
        assert_eq!(order, vec![4, 2, 5, 1, 3]);
    }

    #[test]
    fn drain_empties_queue() {
        let mut queue = CommandQueue::new();
        queue.push(cmd(1, 0));
        queue.push(cmd(2, 0));
        assert_eq!(queue.drain().len(), 2);
        assert!(queue.is_empty());
    }

    #[test]
    fn command_id_display() {
        assert_eq!(CommandId(7).to_string(), "cmd-7");
    }
}
