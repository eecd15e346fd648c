//! Handler 5: Message Service
//!
//! No model involved: a plain durable handler built from the engine
//! primitives the agent loop also relies on.
//!
//!   uuid:0 → sleep:0 → "notification" → sleep:1 → "reminder"
//!
//! The notification gateway drops the first deliveries addressed to Alice;
//! each drop is a transient failure retried inside its step. Once a step is
//! recorded, replays neither resend it nor wait again.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use keel_codec::Typed;
use keel_config::RuntimeConfig;
use keel_contracts::{
    error::{KeelError, KeelResult},
    retry::RetryPolicy,
};
use keel_core::{run_typed, DurableContext};

use crate::scenarios::{demo_journal, print_journal, runtime_config};

pub const EXAMPLE_RECIPIENT: &str = "Alice";

const FOLLOW_UP_DELAY: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageReceipt {
    pub message: String,
}

impl Typed for MessageReceipt {
    fn type_name() -> String {
        "message_receipt".to_string()
    }

    fn json_schema() -> Value {
        json!({
            "type": "object",
            "required": ["message"],
            "properties": { "message": { "type": "string" } }
        })
    }
}

// ── Notification gateway (mock) ───────────────────────────────────────────────

/// Records every delivery. Drops the first `drops` deliveries per recipient
/// that was registered as unreliable.
#[derive(Default)]
pub struct MockNotifier {
    unreliable: Mutex<HashMap<String, u32>>,
    delivered: Mutex<Vec<String>>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unreliable_for(self, name: &str, drops: u32) -> Self {
        if let Ok(mut unreliable) = self.unreliable.lock() {
            unreliable.insert(name.to_string(), drops);
        }
        self
    }

    pub fn delivered(&self) -> Vec<String> {
        self.delivered.lock().map(|d| d.clone()).unwrap_or_default()
    }

    fn deliver(&self, kind: &str, message_id: &str, name: &str) -> KeelResult<String> {
        let dropped = match self.unreliable.lock() {
            Ok(mut unreliable) => match unreliable.get_mut(name) {
                Some(remaining) if *remaining > 0 => {
                    *remaining -= 1;
                    true
                }
                _ => false,
            },
            Err(_) => false,
        };
        if dropped {
            warn!(kind, message_id, name, "delivery dropped by gateway");
            return Err(KeelError::Transient {
                reason: format!("failed to send {kind} {message_id} to {name}"),
            });
        }

        let receipt = format!("{kind}:{message_id}:{name}");
        self.delivered
            .lock()
            .map_err(|e| KeelError::Terminal {
                reason: format!("delivery log poisoned: {e}"),
            })?
            .push(receipt.clone());
        info!(kind, message_id, name, "delivered");
        Ok(receipt)
    }
}

// ── Handler ───────────────────────────────────────────────────────────────────

pub struct MessageService {
    notifier: Arc<MockNotifier>,
    retry: RetryPolicy,
}

impl MessageService {
    /// Deliveries are retried under the configured default policy.
    pub fn from_config(config: &RuntimeConfig, notifier: Arc<MockNotifier>) -> Self {
        Self {
            notifier,
            retry: config.defaults.clone(),
        }
    }

    /// Say hi to `name`: a notification now and a reminder later.
    pub fn send_message(&self, ctx: &dyn DurableContext, name: &str) -> KeelResult<MessageReceipt> {
        if name.trim().is_empty() {
            return Err(KeelError::CallerError {
                reason: "a recipient name is required".to_string(),
            });
        }

        let message_id = ctx.unique_id()?;
        ctx.sleep(FOLLOW_UP_DELAY)?;
        let _: String = run_typed(ctx, "notification", &self.retry, |_| {
            self.notifier.deliver("notification", &message_id, name)
        })?;

        ctx.sleep(FOLLOW_UP_DELAY)?;
        let _: String = run_typed(ctx, "reminder", &self.retry, |_| {
            self.notifier.deliver("reminder", &message_id, name)
        })?;

        Ok(MessageReceipt {
            message: format!("You said hi to {name}!"),
        })
    }
}

/// Run Handler 5: Message Service.
pub fn run_scenario() -> KeelResult<()> {
    println!("=== Handler 5: Message Service ===");
    println!();

    let config = runtime_config()?;
    let notifier = Arc::new(MockNotifier::new().unreliable_for(EXAMPLE_RECIPIENT, 2));
    let service = MessageService::from_config(&config, Arc::clone(&notifier));
    let journal = demo_journal("message-run");

    println!("  Recipient: {EXAMPLE_RECIPIENT} (gateway drops the first 2 deliveries)");
    let receipt = service.send_message(&journal, EXAMPLE_RECIPIENT)?;
    println!("  Result:    {}", receipt.message);
    for delivery in notifier.delivered() {
        println!("  Delivered: {delivery}");
    }
    println!();
    print_journal(&journal);
    println!();
    println!("  Handler 5 complete.");
    println!();

    journal.finalize()
}
