// SPDX-FileCopyrightText: 2026 Blockshop Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ready-made command batches for the common item kinds.

use blockshop_core::Command;

use crate::chat::ChatComponent;

pub const RANK_PRIORITY: i32 = 10;
pub const KIT_PRIORITY: i32 = 7;
pub const COINS_PRIORITY: i32 = 5;

/// Spacing between consecutive `give` commands in a kit.
const KIT_ITEM_SPACING_SECS: f64 = 0.1;

/// An ordered command list with the queue priority it should run at.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryBatch {
    pub commands: Vec<Command>,
    pub priority: i32,
}

/// One item of a kit: `give {username} <item> <quantity>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KitItem {
    pub item: String,
    pub quantity: u32,
}

impl KitItem {
    pub fn new(item: impl Into<String>, quantity: u32) -> Self {
        Self {
            item: item.into(),
            quantity,
        }
    }
}

/// Set the LuckPerms parent group, then announce it with a broadcast and a title.
pub fn rank_upgrade(rank: &str) -> DeliveryBatch {
    let upper = rank.to_uppercase();
    let announced = format!("{upper}!");
    DeliveryBatch {
        commands: vec![
            Command::new("lp", ["user", "{username}", "parent", "set", rank]).with_retry(true),
            Command::new(
                "broadcast",
                ["{username}", "has", "been", "promoted", "to", announced.as_str()],
            )
            .with_delay(1.0),
            Command::new(
                "title",
                [
                    "{username}".to_string(),
                    "title".to_string(),
                    ChatComponent::new("RANK UP!", "gold").bold().to_json(),
                ],
            )
            .with_delay(2.0),
            Command::new(
                "title",
                [
                    "{username}".to_string(),
                    "subtitle".to_string(),
                    ChatComponent::new(&format!("Welcome to {upper}"), "yellow").to_json(),
                ],
            )
            .with_delay(3.0),
        ],
        priority: RANK_PRIORITY,
    }
}

/// Credit `amount` coins through the economy plugin and tell the player.
pub fn give_coins(amount: u64) -> DeliveryBatch {
    let message = format!("{amount} coins have been added to your account!");
    DeliveryBatch {
        commands: vec![
            Command::new("eco", ["give".to_string(), "{username}".to_string(), amount.to_string()])
                .with_retry(true),
            Command::new(
                "tellraw",
                [
                    "{username}".to_string(),
                    ChatComponent::new(&message, "green").to_json(),
                ],
            )
            .with_delay(1.0),
        ],
        priority: COINS_PRIORITY,
    }
}

/// Give each kit item a tenth of a second apart, then confirm.
pub fn deliver_kit(items: &[KitItem], kit_name: &str) -> DeliveryBatch {
    let mut commands: Vec<Command> = items
        .iter()
        .enumerate()
        .map(|(index, kit_item)| {
            Command::new(
                "give",
                [
                    "{username}".to_string(),
                    kit_item.item.clone(),
                    kit_item.quantity.to_string(),
                ],
            )
            .with_delay(index as f64 * KIT_ITEM_SPACING_SECS)
            .with_retry(true)
        })
        .collect();

    let message = format!("{kit_name} has been delivered! Check your inventory.");
    commands.push(
        Command::new(
            "tellraw",
            [
                "{username}".to_string(),
                ChatComponent::new(&message, "green").to_json(),
            ],
        )
        .with_delay(items.len() as f64 * KIT_ITEM_SPACING_SECS + 1.0),
    );

    DeliveryBatch {
        commands,
        priority: KIT_PRIORITY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(batch: &DeliveryBatch) -> Vec<String> {
        batch.commands.iter().map(Command::render).collect()
    }

    #[test]
    fn rank_upgrade_sets_group_then_announces() {
        let batch = rank_upgrade("vip");
        assert_eq!(batch.priority, 10);
        assert_eq!(
            lines(&batch),
            vec![
                "lp user {username} parent set vip",
                "broadcast {username} has been promoted to VIP!",
                r#"title {username} title {"text":"RANK UP!","color":"gold","bold":true}"#,
                r#"title {username} subtitle {"text":"Welcome to VIP","color":"yellow"}"#,
            ]
        );
        let delays: Vec<f64> = batch.commands.iter().map(Command::delay_seconds).collect();
        assert_eq!(delays, vec![0.0, 1.0, 2.0, 3.0]);
        assert!(batch.commands[0].retry_on_failure());
        assert!(!batch.commands[1].retry_on_failure());
    }

    #[test]
    fn give_coins_credits_then_tells() {
        let batch = give_coins(5000);
        assert_eq!(batch.priority, 5);
        assert_eq!(
            lines(&batch),
            vec![
                "eco give {username} 5000",
                r#"tellraw {username} {"text":"5000 coins have been added to your account!","color":"green"}"#,
            ]
        );
        assert_eq!(batch.commands[1].delay_seconds(), 1.0);
    }

    #[test]
    fn kit_items_are_spaced_and_confirmed() {
        let items = [
            KitItem::new("iron_sword", 1),
            KitItem::new("bread", 16),
            KitItem::new("torch", 32),
        ];
        let batch = deliver_kit(&items, "Starter Kit");
        assert_eq!(batch.priority, 7);
        assert_eq!(batch.commands.len(), 4);
        assert_eq!(batch.commands[1].render(), "give {username} bread 16");
        assert!(batch.commands[..3].iter().all(Command::retry_on_failure));
        let delays: Vec<f64> = batch.commands.iter().map(Command::delay_seconds).collect();
        assert!((delays[2] - 0.2).abs() < 1e-9);
        assert!((delays[3] - 1.3).abs() < 1e-9);
        assert!(batch.commands[3].render().contains("Starter Kit has been delivered!"));
    }
}
