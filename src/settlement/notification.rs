use serde::{Deserialize, Serialize};

/// Direct message for a tip receiver, delivered by the messaging layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub recipient_id: i64,
    pub tip_amount: String,
    pub balance: String,
    pub text: String,
}

impl Notification {
    pub fn tip_received(
        recipient_id: i64,
        sender_screen_name: &str,
        tip_amount: String,
        balance: String,
        symbol: &str,
    ) -> Self {
        let text = format!(
            "@{0} just sent you a {1} {2} tip! Reply to this DM with .balance to see your new balance.  \
             If you have not registered an account, send a reply with .register to get started, \
             or .help to see a list of commands!",
            sender_screen_name, tip_amount, symbol
        );

        Self {
            recipient_id,
            tip_amount,
            balance,
            text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tip_received_text() {
        let n = Notification::tip_received(42, "alice", "10".into(), "12.5".into(), "BANANO");

        assert_eq!(n.recipient_id, 42);
        assert_eq!(n.balance, "12.5");
        assert!(n.text.starts_with("@alice just sent you a 10 BANANO tip!"));
        assert!(n.text.contains(".register"));
    }
}
