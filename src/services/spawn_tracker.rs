/// Respawn window prediction for one security band
use crate::domain::{Incursion, IncursionState};
use crate::utils::format_duration;
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

pub const RESPAWN_WINDOW_START_HOURS: i64 = 12;
pub const RESPAWN_WINDOW_END_HOURS: i64 = 36;
pub const UNKNOWN: &str = "Unknown";

/// Earliest time the slot held by `incursion` can spawn a new incursion
pub fn respawn_time(incursion: &Incursion) -> Option<DateTime<Utc>> {
    let changed = incursion.state_changed?;
    let window_start = Duration::hours(RESPAWN_WINDOW_START_HOURS);

    match incursion.state {
        IncursionState::Respawning => Some(changed + window_start),
        IncursionState::Established | IncursionState::Mobilizing | IncursionState::Withdrawing => {
            incursion.time_left_in_spawn().map(|end| end + window_start)
        }
        IncursionState::Unknown => {
            warn!("Unknown state for incursion in {}", incursion);
            None
        }
    }
}

#[derive(Debug, Default)]
pub struct SpawnTracker {
    current: Vec<Incursion>,
    respawning: Vec<Incursion>,
}

impl SpawnTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> &[Incursion] {
        &self.current
    }

    pub fn respawning(&self) -> &[Incursion] {
        &self.respawning
    }

    /// Track a new spawn. It takes over the respawn slot that has been open longest.
    pub fn spawn(&mut self, incursion: Incursion) {
        debug!("Tracking new incursion in {}", incursion);
        self.current.push(incursion);

        let oldest = self
            .respawning
            .iter()
            .enumerate()
            .min_by_key(|(_, inc)| inc.state_changed)
            .map(|(i, _)| i);
        if let Some(index) = oldest {
            let filled = self.respawning.remove(index);
            debug!("Respawn slot from {} filled", filled);
        }
    }

    pub fn update(&mut self, incursion: Incursion) {
        match self.current.iter_mut().find(|inc| inc.same_spawn(&incursion)) {
            Some(found) => {
                found.state = incursion.state;
                found.state_changed = incursion.state_changed;
                found.influence = incursion.influence;
                debug!("Updated tracked incursion in {}", found);
            }
            None => {
                debug!(
                    "Found an update for an incursion we weren't tracking in {}, adding to list",
                    incursion
                );
                self.current.push(incursion);
            }
        }
    }

    pub fn despawn(&mut self, mut incursion: Incursion) {
        if let Some(index) = self.current.iter().position(|inc| inc.same_spawn(&incursion)) {
            self.current.remove(index);
        }

        incursion.state = IncursionState::Respawning;
        incursion.state_changed = Some(Utc::now());
        debug!("Added respawning incursion from {}", incursion);
        self.respawning.push(incursion);
    }

    pub fn next_respawn(&self) -> String {
        self.next_respawn_at(Utc::now())
    }

    /// Human readable time until the next spawn window, as seen at `now`
    pub fn next_respawn_at(&self, now: DateTime<Utc>) -> String {
        let next = self
            .current
            .iter()
            .chain(self.respawning.iter())
            .filter_map(|inc| respawn_time(inc).map(|at| (inc, at)))
            .min_by_key(|(_, at)| *at);

        let Some((incursion, respawn_at)) = next else {
            return UNKNOWN.to_string();
        };

        info!(
            "Picked {} as next to respawn, respawn time {}",
            incursion, respawn_at
        );
        match incursion.state {
            IncursionState::Established => {
                format!("No more than {}", format_duration(respawn_at - now))
            }
            IncursionState::Respawning if now > respawn_at => {
                let window_end = incursion
                    .state_changed
                    .map(|changed| changed + Duration::hours(RESPAWN_WINDOW_END_HOURS))
                    .unwrap_or(respawn_at);
                format!(
                    "Currently in a spawn window for another {}",
                    format_duration(window_end - now)
                )
            }
            _ => format_duration(respawn_at - now),
        }
    }
}
