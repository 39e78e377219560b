/// External API clients module
pub mod cache;

use crate::clients::cache::{
    parse_expires, CachedFetcher, RawResponse, RequestDescriptor, Transport,
};
use crate::domain::{
    AllianceData, ConstellationData, IncursionResponse, NameResponse, SovereigntyEntry,
    StargateData, SystemData,
};
use crate::errors::{EsiError, EsiResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{ETAG, EXPIRES, IF_NONE_MATCH};
use reqwest::{Client, StatusCode};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, error};

/// HTTP client wrapper with common configuration
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new(user_agent: &str, timeout_seconds: u64) -> EsiResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client })
    }

    pub fn get_client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl Transport for HttpClient {
    async fn send(
        &self,
        request: &RequestDescriptor,
        etag: Option<&str>,
    ) -> EsiResult<RawResponse> {
        let mut req = self
            .get_client()
            .request(request.method.clone(), &request.url);

        if let Some(etag) = etag.filter(|e| !e.is_empty()) {
            req = req.header(IF_NONE_MATCH, etag);
        }
        if let Some(body) = &request.body {
            req = req.json(body);
        }

        let resp = req.send().await?;
        let status = resp.status();
        let headers = resp.headers();
        let etag = headers
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let expires = headers
            .get(EXPIRES)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_expires);
        let body = resp.text().await?;

        Ok(RawResponse {
            status,
            etag,
            expires,
            body,
        })
    }
}

/// Everything the tracker needs from ESI
#[async_trait]
pub trait EsiApi: Send + Sync {
    /// Current incursions and the time the list goes stale
    async fn get_incursions(&self)
        -> EsiResult<(Vec<IncursionResponse>, Option<DateTime<Utc>>)>;

    async fn get_system_info(&self, system_id: i64) -> EsiResult<SystemData>;

    async fn get_constellation_info(&self, constellation_id: i64)
        -> EsiResult<ConstellationData>;

    /// Batch name resolution. Order of the result is meaningless.
    async fn get_names(&self, ids: &[i64]) -> EsiResult<HashMap<i64, String>>;

    /// Jumps between two systems
    async fn get_route_length(&self, from: i64, to: i64) -> EsiResult<i64>;

    /// Systems reachable by one stargate jump
    async fn get_stargate_connections(&self, system_id: i64) -> EsiResult<Vec<i64>>;

    /// Ticker of the alliance holding sovereignty, None if unclaimed
    async fn get_sovereignty_owner(&self, system_id: i64) -> EsiResult<Option<String>>;

    /// True if ESI answers its swagger document with 200
    async fn check_esi(&self) -> bool;
}

/// ESI client with one typed cache per endpoint
pub struct EsiClient {
    base_url: String,
    transport: Arc<dyn Transport>,
    incursions: CachedFetcher<(), Vec<IncursionResponse>>,
    systems: CachedFetcher<i64, SystemData>,
    constellations: CachedFetcher<i64, ConstellationData>,
    stargates: CachedFetcher<i64, StargateData>,
    routes: CachedFetcher<(i64, i64), Vec<i64>>,
    sovereignty: CachedFetcher<(), Vec<SovereigntyEntry>>,
    alliances: CachedFetcher<i64, AllianceData>,
    names: Mutex<HashMap<i64, String>>,
}

impl EsiClient {
    pub fn new(base_url: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        Self {
            base_url: base_url.into(),
            incursions: CachedFetcher::new(transport.clone()),
            systems: CachedFetcher::new(transport.clone()),
            constellations: CachedFetcher::new(transport.clone()),
            stargates: CachedFetcher::new(transport.clone()),
            routes: CachedFetcher::new(transport.clone()),
            sovereignty: CachedFetcher::new(transport.clone()),
            alliances: CachedFetcher::new(transport.clone()),
            transport,
            names: Mutex::new(HashMap::new()),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_stargate(&self, stargate_id: i64) -> EsiResult<StargateData> {
        let req = RequestDescriptor::get(self.url(&format!("/universe/stargates/{}/", stargate_id)));
        Ok(self.stargates.fetch(&req, stargate_id).await?.data)
    }

    async fn get_alliance(&self, alliance_id: i64) -> EsiResult<AllianceData> {
        let req = RequestDescriptor::get(self.url(&format!("/alliances/{}/", alliance_id)));
        Ok(self.alliances.fetch(&req, alliance_id).await?.data)
    }

    fn known_names(&self, ids: &[i64]) -> (HashMap<i64, String>, Vec<i64>) {
        let cached = self.names.lock().unwrap_or_else(|e| e.into_inner());
        let mut known = HashMap::new();
        let mut unknown = Vec::new();

        for id in ids {
            match cached.get(id) {
                Some(name) => {
                    known.insert(*id, name.clone());
                }
                None if !unknown.contains(id) => unknown.push(*id),
                None => {}
            }
        }

        (known, unknown)
    }
}

#[async_trait]
impl EsiApi for EsiClient {
    async fn get_incursions(
        &self,
    ) -> EsiResult<(Vec<IncursionResponse>, Option<DateTime<Utc>>)> {
        let req = RequestDescriptor::get(self.url("/incursions/"));
        let fetched = self.incursions.fetch(&req, ()).await.map_err(|e| {
            error!("Error occurred while getting incursions: {}", e);
            e
        })?;
        Ok((fetched.data, fetched.expires))
    }

    async fn get_system_info(&self, system_id: i64) -> EsiResult<SystemData> {
        let req = RequestDescriptor::get(self.url(&format!("/universe/systems/{}/", system_id)));
        Ok(self.systems.fetch(&req, system_id).await?.data)
    }

    async fn get_constellation_info(&self, constellation_id: i64) -> EsiResult<ConstellationData> {
        let req = RequestDescriptor::get(self.url(&format!(
            "/universe/constellations/{}/",
            constellation_id
        )));
        Ok(self.constellations.fetch(&req, constellation_id).await?.data)
    }

    async fn get_names(&self, ids: &[i64]) -> EsiResult<HashMap<i64, String>> {
        let (mut result, unknown) = self.known_names(ids);

        if unknown.is_empty() {
            return Ok(result);
        }

        let req = RequestDescriptor::post(self.url("/universe/names/"), serde_json::json!(unknown));
        let resp = self.transport.send(&req, None).await?;
        if resp.status != StatusCode::OK {
            return Err(EsiError::UnexpectedStatus {
                status: resp.status.as_u16(),
                body: resp.body,
            });
        }

        let resolved: Vec<NameResponse> = serde_json::from_str(&resp.body)?;
        let mut cached = self.names.lock().unwrap_or_else(|e| e.into_inner());
        for entry in resolved {
            debug!("Resolved {} {} to {}", entry.category, entry.id, entry.name);
            cached.insert(entry.id, entry.name.clone());
            result.insert(entry.id, entry.name);
        }

        Ok(result)
    }

    async fn get_route_length(&self, from: i64, to: i64) -> EsiResult<i64> {
        let req = RequestDescriptor::get(self.url(&format!("/route/{}/{}/", from, to)));
        let route = self.routes.fetch(&req, (from, to)).await?.data;
        // The route includes the origin system
        Ok((route.len() as i64 - 1).max(0))
    }

    async fn get_stargate_connections(&self, system_id: i64) -> EsiResult<Vec<i64>> {
        let system = self.get_system_info(system_id).await?;
        let mut destinations = Vec::with_capacity(system.stargates.len());

        for gate in system.stargates {
            let stargate = self.get_stargate(gate).await?;
            destinations.push(stargate.destination.system_id);
        }

        Ok(destinations)
    }

    async fn get_sovereignty_owner(&self, system_id: i64) -> EsiResult<Option<String>> {
        let req = RequestDescriptor::get(self.url("/sovereignty/map/"));
        let sov_map = self.sovereignty.fetch(&req, ()).await?.data;

        let alliance_id = sov_map
            .iter()
            .find(|entry| entry.system_id == system_id)
            .and_then(|entry| entry.alliance_id);

        match alliance_id {
            Some(id) => Ok(Some(self.get_alliance(id).await?.ticker)),
            None => Ok(None),
        }
    }

    async fn check_esi(&self) -> bool {
        let req = RequestDescriptor::get(self.url("/swagger.json"));
        match self.transport.send(&req, None).await {
            Ok(resp) => resp.status == StatusCode::OK,
            Err(e) => {
                error!("Error occurred querying ESI: {}", e);
                false
            }
        }
    }
}
