/// Reconciles each fresh incursion list against the tracked state
use crate::clients::EsiApi;
use crate::domain::{Incursion, IncursionLayout, SecurityClass};
use crate::services::layout;
use crate::services::notifier::IncursionNotifier;
use crate::services::spawn_tracker::SpawnTracker;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{error, info, warn};

#[derive(Debug, Default)]
struct Trackers {
    null: SpawnTracker,
    low: SpawnTracker,
}

impl Trackers {
    fn for_class(&mut self, security: SecurityClass) -> &mut SpawnTracker {
        match security {
            SecurityClass::Null => &mut self.null,
            SecurityClass::Low | SecurityClass::High => &mut self.low,
        }
    }
}

pub struct IncursionManager {
    api: Arc<dyn EsiApi>,
    notifier: Arc<dyn IncursionNotifier>,
    incursions: Mutex<Vec<Incursion>>,
    trackers: Mutex<Trackers>,
    /// Staging ids seen on the first fetch before they could be enriched
    startup_pending: Mutex<HashSet<i64>>,
    populated: AtomicBool,
}

impl IncursionManager {
    pub fn new(api: Arc<dyn EsiApi>, notifier: Arc<dyn IncursionNotifier>) -> Self {
        Self {
            api,
            notifier,
            incursions: Mutex::new(Vec::new()),
            trackers: Mutex::new(Trackers::default()),
            startup_pending: Mutex::new(HashSet::new()),
            populated: AtomicBool::new(false),
        }
    }

    fn lock_incursions(&self) -> MutexGuard<'_, Vec<Incursion>> {
        self.incursions.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_trackers(&self) -> MutexGuard<'_, Trackers> {
        self.trackers.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_pending(&self) -> MutexGuard<'_, HashSet<i64>> {
        self.startup_pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Snapshot of the currently tracked incursions
    pub fn get_incursions(&self) -> Vec<Incursion> {
        self.lock_incursions().clone()
    }

    pub fn next_spawns(&self) -> String {
        let trackers = self.lock_trackers();
        format!(
            "\nNext nullsec spawn window: {}\nNext lowsec spawn window: {}",
            trackers.null.next_respawn(),
            trackers.low.next_respawn()
        )
    }

    pub fn is_populated(&self) -> bool {
        self.populated.load(Ordering::SeqCst)
    }

    /// First fetch populates silently, every later one is reconciled
    pub async fn ingest(&self, fresh: Vec<Incursion>) {
        if self.is_populated() {
            self.reconcile(fresh).await;
        } else {
            self.populate(fresh).await;
        }
    }

    /// Seed the tracked set without sending notifications
    pub async fn populate(&self, initial: Vec<Incursion>) {
        let mut to_save = Vec::new();

        for mut incursion in initial {
            if incursion.security == SecurityClass::High {
                continue;
            }
            if !incursion.is_valid {
                warn!(
                    "Initial incursion staged in {} is invalid, adopting it once it resolves",
                    incursion.staging_id()
                );
                self.lock_pending().insert(incursion.staging_id());
                continue;
            }

            incursion.layout = self.classify_layout(&incursion).await;
            info!("Found initial incursion in {}", incursion);
            self.lock_trackers()
                .for_class(incursion.security)
                .spawn(incursion.clone());
            to_save.push(incursion);
        }

        *self.lock_incursions() = to_save;
        self.populated.store(true, Ordering::SeqCst);
    }

    pub async fn reconcile(&self, fresh: Vec<Incursion>) {
        info!("------Processing new set of incursions-----");
        // Anything tracked but absent here has despawned. Tracked entries are never highsec.
        let fresh_keys: HashSet<i64> = fresh
            .iter()
            .filter(|inc| inc.security != SecurityClass::High)
            .map(Incursion::staging_id)
            .collect();
        self.lock_pending().retain(|id| fresh_keys.contains(id));
        let previous = self.get_incursions();
        let mut working = previous.clone();
        let mut to_save = Vec::with_capacity(fresh.len());

        for mut incursion in fresh {
            if incursion.security == SecurityClass::High {
                continue;
            }

            match working.iter_mut().find(|e| e.same_spawn(&incursion)) {
                None => {
                    if !incursion.is_valid {
                        error!(
                            "Received an invalid incursion located in {}, discarding...",
                            incursion.staging_id()
                        );
                        continue;
                    }

                    // Live since before startup, so adopt it like the initial population
                    let adopted = self.lock_pending().remove(&incursion.staging_id());
                    if !adopted {
                        incursion.state_changed = Some(Utc::now());
                    }
                    incursion.layout = self.classify_layout(&incursion).await;
                    self.lock_trackers()
                        .for_class(incursion.security)
                        .spawn(incursion.clone());

                    if adopted {
                        info!("Adopted initial incursion in {}", incursion);
                    } else {
                        self.notifier.on_new_incursion(&incursion);
                    }
                    to_save.push(incursion);
                }
                Some(existing) => {
                    info!("Found existing incursion in {} to update", existing);

                    // Retry layouts that were cut short by ESI trouble
                    if !existing.layout.is_complete() {
                        existing.layout = self.classify_layout(existing).await;
                    }

                    if existing.update(incursion.influence, incursion.state) {
                        existing.state_changed = Some(Utc::now());
                        self.lock_trackers()
                            .for_class(existing.security)
                            .update(existing.clone());

                        self.notifier.on_incursion_update(existing);
                    }

                    to_save.push(existing.clone());
                }
            }
        }

        for existing in previous
            .iter()
            .filter(|e| !fresh_keys.contains(&e.staging_id()))
        {
            info!("Incursion in {} despawned", existing);
            self.lock_trackers()
                .for_class(existing.security)
                .despawn(existing.clone());

            self.notifier.on_incursion_despawn(existing);
        }

        *self.lock_incursions() = to_save;
    }

    async fn classify_layout(&self, incursion: &Incursion) -> IncursionLayout {
        match layout::classify(
            self.api.as_ref(),
            &incursion.layout.staging_system,
            &incursion.systems,
        )
        .await
        {
            Ok(layout) => layout,
            Err(abort) => {
                warn!("{}, keeping partial layout", abort);
                abort.partial
            }
        }
    }
}
