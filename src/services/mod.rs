/// Business logic services layer
pub mod enrichment;
pub mod layout;
pub mod manager;
pub mod notifier;
pub mod poller;
pub mod spawn_tracker;
pub mod supervisor;

pub use enrichment::IncursionFactory;
pub use manager::IncursionManager;
pub use notifier::{IncursionNotifier, LogNotifier, MessageFormatter, WebhookNotifier};
pub use supervisor::Supervisor;
