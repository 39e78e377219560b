/// Incursion poll loop, paced by the `Expires` header of the incursion list
use crate::clients::EsiApi;
use crate::errors::EsiResult;
use crate::services::{IncursionFactory, IncursionManager};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub struct Poller {
    api: Arc<dyn EsiApi>,
    factory: IncursionFactory,
    manager: Arc<IncursionManager>,
    esi_up: Arc<AtomicBool>,
    retry_delay: Duration,
    min_poll: Duration,
}

impl Poller {
    pub fn new(
        api: Arc<dyn EsiApi>,
        manager: Arc<IncursionManager>,
        home_system_id: i64,
        retry_delay: Duration,
        min_poll: Duration,
    ) -> Self {
        Self {
            factory: IncursionFactory::new(api.clone(), home_system_id),
            api,
            manager,
            esi_up: Arc::new(AtomicBool::new(false)),
            retry_delay,
            min_poll,
        }
    }

    /// ESI health as of the last cycle, shared with readers
    pub fn esi_status(&self) -> Arc<AtomicBool> {
        self.esi_up.clone()
    }

    pub async fn check_esi(&self) -> bool {
        let up = self.api.check_esi().await;
        if !up {
            warn!("ESI connection check failed");
        }
        self.esi_up.store(up, Ordering::SeqCst);
        up
    }

    /// One full cycle: fetch, enrich, hand to the manager.
    /// Returns when the fetched list goes stale.
    pub async fn poll_once(&self) -> EsiResult<Option<DateTime<Utc>>> {
        let (raw, next_poll) = self.api.get_incursions().await?;
        let incursions = self.factory.build_all(&raw).await;
        self.manager.ingest(incursions).await;
        Ok(next_poll)
    }

    /// Time to wait before the next cycle
    pub fn delay_until(&self, next_poll: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Duration {
        next_poll
            .and_then(|at| (at - now).to_std().ok())
            .map_or(self.min_poll, |wait| wait.max(self.min_poll))
    }

    pub async fn run(self: Arc<Self>) {
        info!("Starting incursion poll loop");
        loop {
            self.check_esi().await;
            let delay = match self.poll_once().await {
                Ok(next_poll) => self.delay_until(next_poll, Utc::now()),
                Err(e) => {
                    warn!(
                        "Error occurred getting incursions, sleeping {}s then reattempting: {}",
                        self.retry_delay.as_secs(),
                        e
                    );
                    self.retry_delay
                }
            };
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::IncursionResponse;
    use crate::services::testing::{Event, FakeUniverse, RecordingNotifier};

    fn poller(universe: Arc<FakeUniverse>) -> (Arc<RecordingNotifier>, Arc<IncursionManager>, Poller) {
        let notifier = Arc::new(RecordingNotifier::default());
        let manager = Arc::new(IncursionManager::new(universe.clone(), notifier.clone()));
        let poller = Poller::new(
            universe,
            manager.clone(),
            30004759,
            Duration::from_secs(60),
            Duration::from_secs(5),
        );
        (notifier, manager, poller)
    }

    fn staged_universe() -> Arc<FakeUniverse> {
        let universe = FakeUniverse::default();
        universe.system(1, "Amamake", -0.1);
        universe.system(9, "Jita", 0.9);
        universe.constellation(20, "Ani", 30);
        universe.name(30, "Heimatar");
        universe.route(30004759, 1, 7);
        universe.route(30004759, 9, 30);
        for (a, b) in [(1, 2), (2, 3), (3, 4)] {
            universe.connect(a, b);
        }
        for id in 2..=4 {
            universe.name(id, &format!("S{}", id));
        }
        Arc::new(universe)
    }

    fn record(staging: i64, systems: Vec<i64>, state: &str) -> IncursionResponse {
        IncursionResponse {
            constellation_id: 20,
            infested_solar_systems: systems,
            influence: 0.0,
            staging_solar_system_id: staging,
            state: state.to_string(),
        }
    }

    #[tokio::test]
    async fn test_poll_cycle_populates_then_reconciles() {
        let universe = staged_universe();
        let (notifier, manager, poller) = poller(universe.clone());
        let expires = Utc::now() + chrono::Duration::minutes(5);

        universe.set_incursions(vec![record(9, vec![9], "established")], Some(expires));
        assert_eq!(poller.poll_once().await.unwrap(), Some(expires));
        assert!(manager.get_incursions().is_empty());

        universe.set_incursions(
            vec![
                record(9, vec![9], "established"),
                record(1, vec![1, 2, 3, 4], "mobilizing"),
            ],
            Some(expires),
        );
        poller.poll_once().await.unwrap();

        assert_eq!(notifier.take(), vec![(Event::New, 1)]);
        let tracked = manager.get_incursions();
        assert_eq!(tracked.len(), 1);
        assert_eq!(tracked[0].layout.staging_system.name, "Amamake");
        assert_eq!(tracked[0].distance, 7);
        assert_eq!(tracked[0].layout.hq_system.id, 4);
    }

    #[tokio::test]
    async fn test_fetch_failure_surfaces_as_error() {
        let (notifier, manager, poller) = poller(Arc::new(FakeUniverse::default()));

        let err = poller.poll_once().await.unwrap_err();
        assert!(err.is_transient());
        assert!(!manager.is_populated());
        assert!(notifier.take().is_empty());
    }

    #[tokio::test]
    async fn test_esi_check_is_shared() {
        let universe = Arc::new(FakeUniverse::default());
        let (_, _, poller) = poller(universe.clone());
        let status = poller.esi_status();
        assert!(!status.load(Ordering::SeqCst));

        assert!(poller.check_esi().await);
        assert!(status.load(Ordering::SeqCst));

        universe.set_esi_down(true);
        assert!(!poller.check_esi().await);
        assert!(!status.load(Ordering::SeqCst));
    }

    #[test]
    fn test_delay_follows_expiry_with_floor() {
        let (_, _, poller) = poller(Arc::new(FakeUniverse::default()));
        let now = Utc::now();

        assert_eq!(
            poller.delay_until(Some(now + chrono::Duration::seconds(300)), now),
            Duration::from_secs(300)
        );
        assert_eq!(
            poller.delay_until(Some(now + chrono::Duration::seconds(1)), now),
            Duration::from_secs(5)
        );
        assert_eq!(
            poller.delay_until(Some(now - chrono::Duration::seconds(30)), now),
            Duration::from_secs(5)
        );
        assert_eq!(poller.delay_until(None, now), Duration::from_secs(5));
    }
}
