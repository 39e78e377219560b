/// Text commands: a registered name maps to `(query) -> reply`
use crate::services::IncursionManager;
use crate::utils::format_duration;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

pub const COMMAND_PREFIX: char = '!';
const DESPAWN_TIME_FORMAT: &str = "%a %d %b %H:%M EVE";

pub type CommandFn = Box<dyn Fn(&str) -> String + Send + Sync>;

struct Command {
    function: CommandFn,
    help: String,
}

pub struct CommandMap {
    commands: BTreeMap<String, Command>,
}

impl Default for CommandMap {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandMap {
    pub fn new() -> Self {
        Self {
            commands: BTreeMap::new(),
        }
    }

    pub fn add_command<F>(&mut self, name: &str, help: &str, function: F)
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.commands.insert(
            name.to_string(),
            Command {
                function: Box::new(function),
                help: help.to_string(),
            },
        );
    }

    pub fn help_text(&self) -> String {
        let mut text = String::from("Commands: \n");
        text.push_str(&format!("{}help  -  This help message\n", COMMAND_PREFIX));
        for (name, command) in &self.commands {
            text.push_str(&format!("{}{}  -  {}\n", COMMAND_PREFIX, name, command.help));
        }
        text
    }

    /// Reply to a chat line. None if it isn't a command or the command is unknown.
    pub fn dispatch(&self, message: &str) -> Option<String> {
        let body = message.trim().strip_prefix(COMMAND_PREFIX)?;
        let (name, query) = match body.split_once(char::is_whitespace) {
            Some((name, query)) => (name, query.trim()),
            None => (body, ""),
        };

        if name == "help" {
            return Some(self.help_text());
        }

        match self.commands.get(name) {
            Some(command) => {
                info!("Answering command {}", name);
                Some((command.function)(query))
            }
            None => {
                warn!("Unknown or unsupported command: {}", message);
                None
            }
        }
    }
}

/// The standard command set backed by the incursion manager
pub fn incursion_commands(
    manager: Arc<IncursionManager>,
    esi_up: Arc<AtomicBool>,
    started: DateTime<Utc>,
) -> CommandMap {
    let mut map = CommandMap::new();

    map.add_command("esi", "Prints the bot's ESI connection status", move |_| {
        let status = if esi_up.load(Ordering::SeqCst) {
            "GOOD"
        } else {
            "BAD"
        };
        format!("Connection to ESI is {}", status)
    });

    let list_manager = manager.clone();
    map.add_command("incursions", "Lists the current incursions", move |_| {
        list_incursions(&list_manager)
    });

    map.add_command(
        "nextspawn",
        "Estimates the next nullsec and lowsec spawn windows",
        move |_| manager.next_spawns(),
    );

    map.add_command("uptime", "Gets the current bot uptime", move |_| {
        format!(
            "Bot has been up for: {}",
            format_duration(Utc::now() - started)
        )
    });

    map
}

fn list_incursions(manager: &IncursionManager) -> String {
    let mut text = String::from("\n");

    for incursion in manager.get_incursions() {
        text.push_str(&format!(
            "{} - Influence: {:.2}% - Status: {} - {} jumps, Despawn: {} \n",
            incursion,
            incursion.influence * 100.0,
            incursion.state,
            incursion.distance,
            incursion.time_left_string(DESPAWN_TIME_FORMAT)
        ));
    }

    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Incursion, IncursionLayout, IncursionState, NamedItem, SecurityClass};
    use crate::services::testing::{FakeUniverse, RecordingNotifier};

    #[test]
    fn test_dispatch_passes_query() {
        let mut map = CommandMap::new();
        map.add_command("echo", "Echoes", |query| format!("<{}>", query));

        assert_eq!(map.dispatch("!echo  hello there ").as_deref(), Some("<hello there>"));
        assert_eq!(map.dispatch("!echo").as_deref(), Some("<>"));
        assert_eq!(map.dispatch("echo hi"), None);
        assert_eq!(map.dispatch("!missing"), None);
        assert_eq!(map.dispatch(""), None);
    }

    #[test]
    fn test_help_lists_commands() {
        let mut map = CommandMap::new();
        map.add_command("uptime", "Gets the current bot uptime", |_| String::new());

        let help = map.dispatch("!help").unwrap();
        assert!(help.starts_with("Commands: \n!help  -  This help message\n"));
        assert!(help.contains("!uptime  -  Gets the current bot uptime\n"));
    }

    #[tokio::test]
    async fn test_incursion_commands() {
        let universe = FakeUniverse::default();
        universe.connect(1, 2);
        universe.connect(2, 3);
        universe.connect(3, 4);
        for id in 1..=4 {
            universe.name(id, &format!("S{}", id));
        }
        let manager = Arc::new(IncursionManager::new(
            Arc::new(universe),
            Arc::new(RecordingNotifier::default()),
        ));
        manager
            .reconcile(vec![Incursion {
                layout: IncursionLayout::with_staging(NamedItem::named(1, "S1")),
                constellation: NamedItem::named(10, "Const"),
                region: NamedItem::named(20, "Region"),
                systems: vec![1, 2, 3, 4],
                influence: 0.5,
                state: IncursionState::Mobilizing,
                security: SecurityClass::Null,
                sec_status: -0.2,
                distance: 3,
                is_valid: true,
                ..Default::default()
            }])
            .await;

        let esi_up = Arc::new(AtomicBool::new(true));
        let map = incursion_commands(manager, esi_up.clone(), Utc::now());

        let listing = map.dispatch("!incursions").unwrap();
        assert!(listing.starts_with(
            "\nS1 {-0.20} (HQ: S4) (Const - Region) - Influence: 50.00% - Status: mobilizing - 3 jumps, Despawn: "
        ));
        assert!(listing.ends_with("EVE \n"));

        let spawns = map.dispatch("!nextspawn").unwrap();
        assert!(spawns.contains("Next nullsec spawn window: 3d"));
        assert!(spawns.contains("Next lowsec spawn window: Unknown"));

        assert_eq!(
            map.dispatch("!uptime").as_deref(),
            Some("Bot has been up for: 0h0m")
        );

        assert_eq!(
            map.dispatch("!esi").as_deref(),
            Some("Connection to ESI is GOOD")
        );
        esi_up.store(false, Ordering::SeqCst);
        assert_eq!(
            map.dispatch("!esi").as_deref(),
            Some("Connection to ESI is BAD")
        );
    }
}
