/// Notification sink for spawn, state change and despawn events
use crate::domain::Incursion;
use reqwest::Client;
use tracing::{error, info};

/// Receives every state transition the manager detects. Called synchronously
/// from the poll task, so implementations must not block for long.
pub trait IncursionNotifier: Send + Sync {
    fn on_new_incursion(&self, incursion: &Incursion);
    fn on_incursion_update(&self, incursion: &Incursion);
    fn on_incursion_despawn(&self, incursion: &Incursion);
}

/// Human readable notification texts
#[derive(Debug, Clone, Default)]
pub struct MessageFormatter {
    home_region_ids: Vec<i64>,
}

impl MessageFormatter {
    pub fn new(home_region_ids: Vec<i64>) -> Self {
        Self { home_region_ids }
    }

    pub fn new_incursion(&self, incursion: &Incursion) -> String {
        if self.home_region_ids.contains(&incursion.region.id) {
            return format!(
                ":siren: New incursion detected in a home region! {} - {} jumps :siren:",
                incursion, incursion.distance
            );
        }

        format!(
            "New incursion detected in {} - {} jumps",
            incursion, incursion.distance
        )
    }

    pub fn update(&self, incursion: &Incursion) -> String {
        format!(
            "Incursion in {} changed state to {}",
            incursion, incursion.state
        )
    }

    pub fn despawn(&self, incursion: &Incursion) -> String {
        format!("Incursion in {} despawned", incursion)
    }
}

/// Writes notifications to the log only
pub struct LogNotifier {
    formatter: MessageFormatter,
}

impl LogNotifier {
    pub fn new(formatter: MessageFormatter) -> Self {
        Self { formatter }
    }
}

impl IncursionNotifier for LogNotifier {
    fn on_new_incursion(&self, incursion: &Incursion) {
        info!("{}", self.formatter.new_incursion(incursion));
    }

    fn on_incursion_update(&self, incursion: &Incursion) {
        info!("{}", self.formatter.update(incursion));
    }

    fn on_incursion_despawn(&self, incursion: &Incursion) {
        info!("{}", self.formatter.despawn(incursion));
    }
}

/// Posts notifications as `{"text": ...}` to a webhook. Delivery runs on its
/// own task; failures are logged and dropped.
pub struct WebhookNotifier {
    client: Client,
    url: String,
    formatter: MessageFormatter,
}

impl WebhookNotifier {
    pub fn new(client: Client, url: String, formatter: MessageFormatter) -> Self {
        Self {
            client,
            url,
            formatter,
        }
    }

    fn deliver(&self, text: String) {
        info!("Sending notification: {}", text);
        let request = self
            .client
            .post(&self.url)
            .json(&serde_json::json!({ "text": text }));

        tokio::spawn(async move {
            match request.send().await {
                Ok(resp) if !resp.status().is_success() => {
                    error!("Webhook rejected notification with status {}", resp.status())
                }
                Ok(_) => {}
                Err(e) => error!("Failed to deliver notification: {}", e),
            }
        });
    }
}

impl IncursionNotifier for WebhookNotifier {
    fn on_new_incursion(&self, incursion: &Incursion) {
        self.deliver(self.formatter.new_incursion(incursion));
    }

    fn on_incursion_update(&self, incursion: &Incursion) {
        self.deliver(self.formatter.update(incursion));
    }

    fn on_incursion_despawn(&self, incursion: &Incursion) {
        self.deliver(self.formatter.despawn(incursion));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{IncursionLayout, IncursionState, NamedItem};

    fn incursion(region_id: i64) -> Incursion {
        Incursion {
            layout: IncursionLayout {
                staging_system: NamedItem::named(1, "1DQ1-A"),
                hq_system: NamedItem::named(2, "T5ZI-S"),
                ..Default::default()
            },
            constellation: NamedItem::named(3, "O-EIMK"),
            region: NamedItem::named(region_id, "Delve"),
            sec_status: -0.38,
            distance: 4,
            state: IncursionState::Withdrawing,
            ..Default::default()
        }
    }

    #[test]
    fn test_home_region_gets_siren() {
        let formatter = MessageFormatter::new(vec![10000060]);
        assert_eq!(
            formatter.new_incursion(&incursion(10000060)),
            ":siren: New incursion detected in a home region! 1DQ1-A {-0.38} (HQ: T5ZI-S) (O-EIMK - Delve) - 4 jumps :siren:"
        );
        assert_eq!(
            formatter.new_incursion(&incursion(10000001)),
            "New incursion detected in 1DQ1-A {-0.38} (HQ: T5ZI-S) (O-EIMK - Delve) - 4 jumps"
        );
    }

    #[test]
    fn test_update_and_despawn_messages() {
        let formatter = MessageFormatter::default();
        let inc = incursion(1);
        assert_eq!(
            formatter.update(&inc),
            "Incursion in 1DQ1-A {-0.38} (HQ: T5ZI-S) (O-EIMK - Delve) changed state to withdrawing"
        );
        assert_eq!(
            formatter.despawn(&inc),
            "Incursion in 1DQ1-A {-0.38} (HQ: T5ZI-S) (O-EIMK - Delve) despawned"
        );
    }
}
