/// Turns raw ESI incursion records into enriched incursions
use crate::clients::EsiApi;
use crate::domain::{
    Incursion, IncursionLayout, IncursionResponse, IncursionState, NamedItem, SecurityClass,
};
use crate::errors::{EsiError, EsiResult};
use std::sync::Arc;
use tracing::{error, warn};

pub struct IncursionFactory {
    api: Arc<dyn EsiApi>,
    home_system_id: i64,
}

impl IncursionFactory {
    pub fn new(api: Arc<dyn EsiApi>, home_system_id: i64) -> Self {
        Self {
            api,
            home_system_id,
        }
    }

    /// Build an incursion from a raw record. Failed lookups never abort the
    /// cycle; the result is flagged invalid instead.
    pub async fn build(&self, raw: &IncursionResponse) -> Incursion {
        let mut incursion = Incursion {
            layout: IncursionLayout::with_staging(NamedItem::new(raw.staging_solar_system_id)),
            constellation: NamedItem::new(raw.constellation_id),
            influence: raw.influence,
            state: IncursionState::parse(&raw.state),
            systems: raw.infested_solar_systems.clone(),
            ..Default::default()
        };

        match self.enrich(&mut incursion).await {
            Ok(()) => incursion.is_valid = true,
            Err(e) => {
                error!(
                    "Failed to enrich incursion staged in {}: {}",
                    raw.staging_solar_system_id, e
                );
                incursion.is_valid = false;
            }
        }

        incursion
    }

    pub async fn build_all(&self, raw: &[IncursionResponse]) -> Vec<Incursion> {
        let mut incursions = Vec::with_capacity(raw.len());
        for record in raw {
            incursions.push(self.build(record).await);
        }
        incursions
    }

    async fn enrich(&self, incursion: &mut Incursion) -> EsiResult<()> {
        let staging_id = incursion.staging_id();

        let staging = self.api.get_system_info(staging_id).await?;
        incursion.layout.staging_system.name = staging.name;
        incursion.sec_status = staging.security_status;
        incursion.security = SecurityClass::from_status(staging.security_status);

        let constellation = self
            .api
            .get_constellation_info(incursion.constellation.id)
            .await?;
        incursion.constellation.name = constellation.name;
        incursion.region = NamedItem::new(constellation.region_id);

        let names = self.api.get_names(&[constellation.region_id]).await?;
        incursion.region.name = names
            .get(&constellation.region_id)
            .cloned()
            .ok_or_else(|| {
                EsiError::Enrichment(format!("no name for region {}", constellation.region_id))
            })?;

        let (distance, sov_owner) = tokio::join!(
            self.api.get_route_length(self.home_system_id, staging_id),
            self.api.get_sovereignty_owner(staging_id),
        );

        incursion.distance = distance?;
        incursion.sov_owner = match sov_owner {
            Ok(owner) => owner,
            Err(e) => {
                warn!("Couldn't get sov owner for {}: {}", staging_id, e);
                None
            }
        };

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::FakeUniverse;

    fn raw(staging: i64) -> IncursionResponse {
        IncursionResponse {
            constellation_id: 20000001,
            infested_solar_systems: vec![staging, 2, 3, 4],
            influence: 0.4,
            staging_solar_system_id: staging,
            state: "Mobilizing".into(),
        }
    }

    fn universe() -> Arc<FakeUniverse> {
        let universe = FakeUniverse::default();
        universe.system(1, "Amamake", 0.4);
        universe.constellation(20000001, "Ani", 10000030);
        universe.name(10000030, "Heimatar");
        universe.route(30004759, 1, 12);
        universe.sov(1, "CONDI");
        Arc::new(universe)
    }

    #[tokio::test]
    async fn test_build_enriches_everything() {
        let factory = IncursionFactory::new(universe(), 30004759);
        let inc = factory.build(&raw(1)).await;

        assert!(inc.is_valid);
        assert_eq!(inc.layout.staging_system, NamedItem::named(1, "Amamake"));
        assert_eq!(inc.constellation, NamedItem::named(20000001, "Ani"));
        assert_eq!(inc.region, NamedItem::named(10000030, "Heimatar"));
        assert_eq!(inc.security, SecurityClass::Low);
        assert_eq!(inc.state, IncursionState::Mobilizing);
        assert_eq!(inc.distance, 12);
        assert_eq!(inc.sov_owner.as_deref(), Some("CONDI"));
        assert_eq!(inc.systems, vec![1, 2, 3, 4]);
        assert!(inc.state_changed.is_none());
    }

    #[tokio::test]
    async fn test_build_marks_invalid_on_failed_lookup() {
        let factory = IncursionFactory::new(universe(), 30004759);
        // Unknown staging system
        let inc = factory.build(&raw(77)).await;

        assert!(!inc.is_valid);
        assert_eq!(inc.staging_id(), 77);
        assert_eq!(inc.influence, 0.4);
    }

    #[tokio::test]
    async fn test_missing_sov_is_not_fatal() {
        let universe = universe();
        universe.system(5, "Hek", 0.5);
        universe.route(30004759, 5, 20);
        let factory = IncursionFactory::new(universe, 30004759);

        let inc = factory.build(&raw(5)).await;
        assert!(inc.is_valid);
        assert_eq!(inc.security, SecurityClass::High);
        assert_eq!(inc.sov_owner, None);
    }
}
