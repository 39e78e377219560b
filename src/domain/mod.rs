/// Domain models for the application
use crate::utils::ccp_round;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const MOBILIZING_LIFETIME_HOURS: i64 = 72;
pub const WITHDRAWING_LIFETIME_HOURS: i64 = 24;
pub const ESTABLISHED_MAX_LIFE_HOURS: i64 = 8 * 24 + 12;

/// Reference to a remote entity (system, constellation, region)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedItem {
    pub id: i64,
    pub name: String,
}

impl NamedItem {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            name: String::new(),
        }
    }

    pub fn named(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    /// Name for display, "Unknown" until resolved
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            "Unknown"
        } else {
            &self.name
        }
    }
}

/// Guessed roles of the systems in a spawn
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IncursionLayout {
    pub staging_system: NamedItem,
    pub hq_system: NamedItem,
    pub vanguard_systems: Vec<NamedItem>,
    pub assault_systems: Vec<NamedItem>,
}

impl IncursionLayout {
    pub fn with_staging(staging_system: NamedItem) -> Self {
        Self {
            staging_system,
            ..Default::default()
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.staging_system.name.is_empty()
            && !self.hq_system.name.is_empty()
            && !self.vanguard_systems.is_empty()
            && !self.assault_systems.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncursionState {
    Established,
    Mobilizing,
    Withdrawing,
    Respawning,
    #[default]
    Unknown,
}

impl IncursionState {
    /// Parse the state string reported by ESI. Respawning is never reported remotely.
    pub fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "established" => IncursionState::Established,
            "mobilizing" => IncursionState::Mobilizing,
            "withdrawing" => IncursionState::Withdrawing,
            _ => IncursionState::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IncursionState::Established => "established",
            IncursionState::Mobilizing => "mobilizing",
            IncursionState::Withdrawing => "withdrawing",
            IncursionState::Respawning => "respawning",
            IncursionState::Unknown => "unknown",
        }
    }
}

impl fmt::Display for IncursionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum SecurityClass {
    High,
    Low,
    #[default]
    Null,
}

impl SecurityClass {
    /// Classify a raw security status the way the game client displays it
    pub fn from_status(status: f64) -> Self {
        let rounded = ccp_round(status);

        if rounded >= 0.5 {
            SecurityClass::High
        } else if rounded >= 0.1 {
            SecurityClass::Low
        } else {
            SecurityClass::Null
        }
    }
}

/// A tracked incursion, keyed by its staging system
#[derive(Debug, Clone, Default, Serialize)]
pub struct Incursion {
    pub constellation: NamedItem,
    pub region: NamedItem,
    pub layout: IncursionLayout,
    pub sov_owner: Option<String>,
    pub influence: f64,
    pub state: IncursionState,
    pub security: SecurityClass,
    pub sec_status: f64,
    pub distance: i64,
    pub state_changed: Option<DateTime<Utc>>,
    pub systems: Vec<i64>,
    pub is_valid: bool,
}

impl Incursion {
    pub fn staging_id(&self) -> i64 {
        self.layout.staging_system.id
    }

    /// Same logical incursion: staging system IDs match
    pub fn same_spawn(&self, other: &Incursion) -> bool {
        self.staging_id() == other.staging_id()
    }

    /// Apply fresh influence and state. Returns true if the state changed.
    pub fn update(&mut self, influence: f64, state: IncursionState) -> bool {
        self.influence = influence;

        if self.state != state {
            self.state = state;
            self.state_changed = Some(Utc::now());
            return true;
        }

        false
    }

    /// Latest time the current state can last, None if it can't be known
    pub fn time_left_in_spawn(&self) -> Option<DateTime<Utc>> {
        let changed = self.state_changed?;
        let lifetime = match self.state {
            IncursionState::Established => Duration::hours(ESTABLISHED_MAX_LIFE_HOURS),
            IncursionState::Mobilizing => Duration::hours(MOBILIZING_LIFETIME_HOURS),
            IncursionState::Withdrawing => Duration::hours(WITHDRAWING_LIFETIME_HOURS),
            IncursionState::Respawning | IncursionState::Unknown => return None,
        };

        Some(changed + lifetime)
    }

    pub fn time_left_string(&self, time_format: &str) -> String {
        match self.time_left_in_spawn() {
            None => "Unknown".to_string(),
            Some(despawn) if self.state == IncursionState::Established => {
                format!("NLT {}", despawn.format(time_format))
            }
            Some(despawn) => despawn.format(time_format).to_string(),
        }
    }
}

impl fmt::Display for Incursion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ", self.layout.staging_system.display_name())?;
        if let Some(owner) = self.sov_owner.as_deref().filter(|o| !o.is_empty()) {
            write!(f, "[{}] ", owner)?;
        }
        write!(
            f,
            "{{{:.2}}} (HQ: {}) ({} - {})",
            self.sec_status,
            self.layout.hq_system.display_name(),
            self.constellation.display_name(),
            self.region.display_name()
        )
    }
}

/// Raw incursion record from `/incursions/`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncursionResponse {
    pub constellation_id: i64,
    #[serde(default)]
    pub infested_solar_systems: Vec<i64>,
    pub influence: f64,
    pub staging_solar_system_id: i64,
    pub state: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemData {
    pub system_id: i64,
    pub name: String,
    pub security_status: f64,
    #[serde(default)]
    pub stargates: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstellationData {
    pub constellation_id: i64,
    pub name: String,
    pub region_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NameResponse {
    pub category: String,
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StargateDestination {
    pub stargate_id: i64,
    pub system_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StargateData {
    pub stargate_id: i64,
    pub destination: StargateDestination,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SovereigntyEntry {
    pub system_id: i64,
    pub alliance_id: Option<i64>,
    pub corporation_id: Option<i64>,
    pub faction_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllianceData {
    pub name: String,
    pub ticker: String,
}

/// Health check response
#[derive(Serialize)]
pub struct Health {
    pub status: &'static str,
    pub now: DateTime<Utc>,
    pub uptime_seconds: i64,
}
