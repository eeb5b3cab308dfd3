//! Refresh orchestration
//!
//! Decides when a cache is stale, picks full or delta sync, drives the fetch and
//! merges the result. This is the only layer that turns an error into
//! "log and continue".

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::Duration,
};

use futures::future::join_all;
use maz_cache::{
    typed::{self, ManagementGroup, Subscription},
    Cache, DirectoryObject, DirectoryObjectList, Freshness, NormalizeReport, ObjectType,
    TenantContext, TtlStrategy,
};
use maz_http::{ApiCaller, ApiEndpoints, ApiRequest, RetryConfig};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::{
    error::Result,
    fetch::{CheckpointSink, DeltaFetcher, FetchOutcome, DEFAULT_CHECKPOINT_INTERVAL},
    probe::NetworkProbe,
};

/// Built-in subscription that never carries RBAC objects worth scanning
const LEGACY_SUBSCRIPTION: &str = "Access to Azure Active Directory";

/// Tunables for refresh and fetch
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub directory_ttl: Duration,
    pub resource_ttl: Duration,
    pub checkpoint_interval: usize,
    /// Per-page retry policy
    pub retry: RetryConfig,
    /// Pause before the single retry of a failed delta-link save
    pub link_retry_delay: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            directory_ttl: ObjectType::User.default_ttl(),
            resource_ttl: ObjectType::Subscription.default_ttl(),
            checkpoint_interval: DEFAULT_CHECKPOINT_INTERVAL,
            retry: RetryConfig::default(),
            link_retry_delay: Duration::from_secs(1),
        }
    }
}

impl SyncSettings {
    pub fn ttl_for(&self, kind: ObjectType) -> TtlStrategy {
        match kind.family() {
            maz_cache::ApiFamily::Graph => TtlStrategy::new(self.directory_ttl),
            maz_cache::ApiFamily::Arm => TtlStrategy::new(self.resource_ttl),
        }
    }
}

/// How the next refresh of a cache talks to Azure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncMode {
    /// List everything and replace the mirror
    Full,
    /// Follow a stored continuation token and merge the changes
    Delta(String),
}

/// Full sync for an empty cache, a type without delta support, or a missing
/// or expired link; delta sync otherwise
pub fn plan_sync(cache: &Cache) -> SyncMode {
    if cache.count() == 0 || !cache.kind().supports_delta() {
        return SyncMode::Full;
    }
    match cache.load_delta_link() {
        Some(link) => SyncMode::Delta(link),
        None => SyncMode::Full,
    }
}

/// What one refresh did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub kind: ObjectType,
    pub full: bool,
    pub pages: usize,
    pub fetched: usize,
    pub changes: NormalizeReport,
    /// Merge of a checkpoint left by an interrupted run
    pub resumed: Option<NormalizeReport>,
}

/// Owns the caches of one tenant and keeps them in step with Azure
pub struct SyncEngine {
    pub(crate) api: Arc<dyn ApiCaller>,
    pub(crate) probe: Arc<dyn NetworkProbe>,
    pub(crate) tenant: TenantContext,
    pub(crate) endpoints: ApiEndpoints,
    pub(crate) settings: SyncSettings,
    caches: Mutex<HashMap<ObjectType, Arc<Cache>>>,
}

impl SyncEngine {
    pub fn new(
        api: Arc<dyn ApiCaller>,
        probe: Arc<dyn NetworkProbe>,
        tenant: TenantContext,
        endpoints: ApiEndpoints,
    ) -> Self {
        Self {
            api,
            probe,
            tenant,
            endpoints,
            settings: SyncSettings::default(),
            caches: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_settings(mut self, settings: SyncSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn tenant(&self) -> &TenantContext {
        &self.tenant
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// The cache for `kind`, opened on first use
    pub fn cache(&self, kind: ObjectType) -> Result<Arc<Cache>> {
        let mut caches = self.caches.lock();
        if let Some(cache) = caches.get(&kind) {
            return Ok(Arc::clone(cache));
        }
        let cache = Arc::new(Cache::open(kind, &self.tenant)?);
        caches.insert(kind, Arc::clone(&cache));
        Ok(cache)
    }

    pub async fn is_online(&self) -> bool {
        self.probe.is_online().await
    }

    pub(crate) fn fetcher(&self) -> DeltaFetcher<'_> {
        DeltaFetcher::new(self.api.as_ref())
            .with_retry(self.settings.retry.clone())
            .with_checkpoint_interval(self.settings.checkpoint_interval)
    }

    pub(crate) fn graph_url(&self, path: &str) -> String {
        format!("{}{path}", self.endpoints.graph_url)
    }

    pub(crate) fn arm_url(&self, path: &str) -> String {
        format!("{}{path}", self.endpoints.arm_url)
    }

    /// First request of a sync of an unscoped type
    pub fn sync_request(&self, kind: ObjectType, mode: &SyncMode) -> ApiRequest {
        if let SyncMode::Delta(link) = mode {
            return ApiRequest::get(link.as_str()).with_header("Prefer", "return=minimal");
        }

        match kind.family() {
            maz_cache::ApiFamily::Graph => {
                let mut url = self.graph_url(kind.endpoint());
                if kind.supports_delta() {
                    url.push_str("/delta");
                }
                let mut request = ApiRequest::get(url);
                if let Some(select) = kind.select_fields() {
                    request = request.with_param("$select", select);
                }
                if kind.supports_delta() {
                    request = request.with_header("Prefer", "return=minimal");
                } else if kind.supports_top() {
                    request = request.with_param("$top", "999");
                }
                request
            }
            maz_cache::ApiFamily::Arm => ApiRequest::get(self.arm_url(kind.endpoint()))
                .with_param("api-version", kind.api_version().unwrap_or_default()),
        }
    }

    /// Bring the cache of `kind` up to date with Azure
    pub async fn refresh(&self, kind: ObjectType) -> Result<SyncReport> {
        if kind.is_scoped() {
            self.refresh_scoped(kind).await
        } else {
            self.refresh_unscoped(kind).await
        }
    }

    async fn refresh_unscoped(&self, kind: ObjectType) -> Result<SyncReport> {
        let cache = self.cache(kind)?;
        let resumed = cache.resume_checkpoint()?;

        let mode = plan_sync(&cache);
        let full = mode == SyncMode::Full;
        info!(kind = %kind, full, "refreshing cache from Azure");

        let sink: &dyn CheckpointSink = cache.as_ref();
        let outcome = self
            .fetcher()
            .fetch(self.sync_request(kind, &mode), Some(sink))
            .await?;

        let changes = if full {
            cache.rebuild(&outcome.entries)
        } else {
            cache.normalize(&outcome.entries)
        };
        cache.save()?;

        match &outcome.delta_link {
            Some(link) => self.store_delta_link(&cache, link).await?,
            None => cache.clear_delta_link()?,
        }
        cache.discard_checkpoint()?;

        let report = SyncReport {
            kind,
            full,
            pages: outcome.pages,
            fetched: outcome.entries.len(),
            changes,
            resumed,
        };
        info!(
            kind = %kind,
            pages = report.pages,
            upserted = changes.upserted,
            removed = changes.removed,
            total = cache.count(),
            "cache refreshed"
        );
        Ok(report)
    }

    async fn refresh_scoped(&self, kind: ObjectType) -> Result<SyncReport> {
        let cache = self.cache(kind)?;
        let scopes = self.resource_scopes().await?;
        info!(kind = %kind, scopes = scopes.len(), "refreshing cache across scopes");

        let outcome = self.fetch_across_scopes(kind, &scopes).await?;
        let changes = cache.rebuild(&outcome.entries);
        cache.save()?;

        info!(kind = %kind, total = cache.count(), "cache refreshed");
        Ok(SyncReport {
            kind,
            full: true,
            pages: outcome.pages,
            fetched: outcome.entries.len(),
            changes,
            resumed: None,
        })
    }

    /// One independent chain per scope, fetched concurrently, de-duplicated by
    /// identity. Any failed scope fails the whole listing so a partial result
    /// never replaces the mirror.
    pub(crate) async fn fetch_across_scopes(
        &self,
        kind: ObjectType,
        scopes: &[String],
    ) -> Result<FetchOutcome> {
        let fetcher = self.fetcher();
        let version = kind.api_version().unwrap_or_default();
        let chains = scopes.iter().map(|scope| {
            let request = ApiRequest::get(self.arm_url(&format!("{scope}{}", kind.endpoint())))
                .with_param("api-version", version);
            fetcher.fetch(request, None)
        });
        let results = join_all(chains).await;

        let mut seen = HashSet::new();
        let mut skipped = 0;
        let mut merged = FetchOutcome::default();
        for (scope, result) in scopes.iter().zip(results) {
            let outcome = result?;
            debug!(scope = %scope, count = outcome.entries.len(), "scope fetched");
            merged.pages += outcome.pages;
            for obj in outcome.entries {
                match obj.identity() {
                    Some(id) => {
                        if seen.insert(id) {
                            merged.entries.push(obj);
                        }
                    }
                    None => skipped += 1,
                }
            }
        }
        if skipped > 0 {
            warn!(kind = %kind, skipped, "skipping listed objects without an identity");
        }
        Ok(merged)
    }

    /// RBAC scopes: every management group, then every enabled subscription.
    /// Falls back to the tenant root when neither is known.
    pub async fn resource_scopes(&self) -> Result<Vec<String>> {
        let mut scopes = Vec::new();

        for obj in self.load_unscoped(ObjectType::ManagementGroup).await?.iter() {
            match typed::view::<ManagementGroup>(obj) {
                Ok(group) => scopes.push(group.id),
                Err(e) => debug!("skipping management group: {e}"),
            }
        }
        for obj in self.load_unscoped(ObjectType::Subscription).await?.iter() {
            match typed::view::<Subscription>(obj) {
                Ok(sub) if sub.is_enabled() && sub.display_name != LEGACY_SUBSCRIPTION => {
                    scopes.push(sub.scope())
                }
                Ok(_) => {}
                Err(e) => debug!("skipping subscription: {e}"),
            }
        }

        if scopes.is_empty() {
            scopes.push(String::new());
        }
        Ok(scopes)
    }

    /// Cached objects of an unscoped type, refreshed first when stale and online
    async fn load_unscoped(&self, kind: ObjectType) -> Result<DirectoryObjectList> {
        let cache = self.cache(kind)?;
        let freshness = Freshness {
            forced: false,
            count: cache.count(),
            age: cache.age(),
        };
        if freshness.needs_refresh(&self.settings.ttl_for(kind)) && self.is_online().await {
            if let Err(e) = self.refresh_unscoped(kind).await {
                if !e.is_transient() {
                    return Err(e);
                }
                warn!(kind = %kind, "using cached objects: {e}");
            }
        }
        Ok(cache.snapshot())
    }

    /// Objects of `kind` containing `filter`, refreshing the cache first when it
    /// is stale. A UUID filter is looked up directly in Azure first.
    pub async fn get_matching(
        &self,
        kind: ObjectType,
        filter: &str,
        force: bool,
    ) -> Result<DirectoryObjectList> {
        let online = self.is_online().await;

        if online && is_uuid(filter) {
            match self.get_by_id(kind, filter).await {
                Ok(Some(obj)) => return Ok(DirectoryObjectList::from(vec![obj])),
                Ok(None) => {}
                Err(e) if e.is_transient() => warn!(kind = %kind, "direct lookup failed: {e}"),
                Err(e) => return Err(e),
            }
        }

        let cache = self.cache(kind)?;
        if !online && cache.count() == 0 {
            debug!(kind = %kind, "offline with an empty cache");
            return Ok(DirectoryObjectList::new());
        }

        let freshness = Freshness {
            forced: force,
            count: cache.count(),
            age: cache.age(),
        };
        if online && freshness.needs_refresh(&self.settings.ttl_for(kind)) {
            match self.refresh(kind).await {
                Ok(_) => {}
                Err(e) if e.is_transient() => {
                    warn!(kind = %kind, "refresh failed, serving cached objects: {e}")
                }
                Err(e) => return Err(e),
            }
        }

        Ok(cache.matching(filter))
    }

    async fn store_delta_link(&self, cache: &Cache, link: &str) -> Result<()> {
        if let Err(first) = cache.save_delta_link(link) {
            warn!(kind = %cache.kind(), "saving delta link failed, retrying once: {first}");
            tokio::time::sleep(self.settings.link_retry_delay).await;
            cache.save_delta_link(link)?;
        }
        Ok(())
    }

    /// Trim `obj`, merge it into its cache and persist
    pub(crate) fn remember(&self, kind: ObjectType, obj: &DirectoryObject) -> Result<()> {
        let trimmed = obj.trim_for_cache(kind);
        if trimmed.identity().is_none() {
            warn!(kind = %kind, "not caching object without an identity");
            return Ok(());
        }
        let cache = self.cache(kind)?;
        cache.upsert(&trimmed)?;
        cache.save()?;
        Ok(())
    }
}

pub fn is_uuid(s: &str) -> bool {
    s.len() == 36 && uuid::Uuid::parse_str(s).is_ok()
}
