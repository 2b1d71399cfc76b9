//! STAC Item Search over HTTP.
//!
//! One client talks to one catalog. Searches follow `next` links until the
//! item budget is spent. Planetary Computer keeps its assets in private blob
//! storage, so their hrefs are signed with a per-collection SAS token that is
//! cached until shortly before it expires.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{CloudError, Result};
use crate::source::CatalogQuery;
use crate::stac_models::{StacItem, StacItemCollection, StacLink, StacSearchParams};

const PC_API: &str = "https://planetarycomputer.microsoft.com/api";
const EARTH_SEARCH_API: &str = "https://earth-search.aws.element84.com/v1";

/// Items requested per page
const PAGE_SIZE: usize = 100;

/// A STAC API endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StacCatalog {
    PlanetaryComputer,
    EarthSearch,
    /// Root URL of any other STAC API; a trailing `/search` is accepted
    Custom(String),
}

impl StacCatalog {
    /// `pc` / `planetary-computer`, `es` / `earth-search`; anything else
    /// is taken as the root URL of a STAC API.
    pub fn from_str_or_url(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "pc" | "planetary-computer" | "planetarycomputer" => Self::PlanetaryComputer,
            "es" | "earth-search" | "earthsearch" => Self::EarthSearch,
            _ => Self::Custom(s.trim().to_string()),
        }
    }

    /// URL of the `POST /search` endpoint
    pub fn search_url(&self) -> String {
        match self {
            Self::PlanetaryComputer => format!("{}/stac/v1/search", PC_API),
            Self::EarthSearch => format!("{}/search", EARTH_SEARCH_API),
            Self::Custom(root) => {
                let root = root.trim_end_matches('/');
                if root.ends_with("/search") {
                    root.to_string()
                } else {
                    format!("{}/search", root)
                }
            }
        }
    }

    /// Whether asset hrefs need a SAS token before download
    pub fn needs_signing(&self) -> bool {
        matches!(self, Self::PlanetaryComputer)
    }

    fn token_url(collection: &str) -> String {
        format!("{}/sas/v1/token/{}", PC_API, collection)
    }
}

/// Settings shared by searches and downloads.
#[derive(Debug, Clone)]
pub struct StacClientOptions {
    pub request_timeout: Duration,
    /// Retries on timeouts, connection failures and 5xx responses
    pub max_retries: u32,
    /// Upper bound on items returned by one search, across pages
    pub max_items: usize,
    /// Ignore `HTTP(S)_PROXY` from the environment
    pub no_proxy: bool,
}

impl Default for StacClientOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            max_retries: 3,
            max_items: 500,
            no_proxy: false,
        }
    }
}

/// Planetary Computer token response
#[derive(Debug, Clone, Deserialize)]
struct SasToken {
    token: String,
    #[serde(rename = "msft:expiry")]
    expiry: DateTime<Utc>,
}

impl SasToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expiry - now > chrono::Duration::minutes(1)
    }
}

/// The request behind a `next` link
#[derive(Debug, Clone, PartialEq)]
enum NextPage {
    Get(String),
    Post { url: String, body: serde_json::Value },
}

/// Resolve a `next` link against the search that produced it.
///
/// POST links carry their own body, or a partial one to merge over the
/// original parameters when `merge` is set.
fn next_page(link: &StacLink, params: &StacSearchParams) -> Result<NextPage> {
    let is_post = link
        .method
        .as_deref()
        .is_some_and(|m| m.eq_ignore_ascii_case("POST"));
    if !is_post {
        return Ok(NextPage::Get(link.href.clone()));
    }
    let body = match (&link.body, link.merge.unwrap_or(false)) {
        (Some(body), false) => body.clone(),
        (extra, _) => {
            let mut body = serde_json::to_value(params)?;
            if let (Some(obj), Some(extra)) =
                (body.as_object_mut(), extra.as_ref().and_then(|e| e.as_object()))
            {
                obj.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
            body
        }
    };
    Ok(NextPage::Post {
        url: link.href.clone(),
        body,
    })
}

/// Append a SAS query string to an asset href.
fn append_token(href: &str, token: &str) -> String {
    let token = token.trim_start_matches('?');
    if href.contains('?') {
        format!("{}&{}", href, token)
    } else {
        format!("{}?{}", href, token)
    }
}

/// Async client for one STAC API.
pub struct StacClient {
    catalog: StacCatalog,
    http: Client,
    options: StacClientOptions,
    tokens: Mutex<HashMap<String, SasToken>>,
}

impl StacClient {
    pub fn new(catalog: StacCatalog, options: StacClientOptions) -> Result<Self> {
        let mut builder = Client::builder().timeout(options.request_timeout);
        if options.no_proxy {
            builder = builder.no_proxy();
        }
        let http = builder
            .build()
            .map_err(|e| CloudError::Network(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            catalog,
            http,
            options,
            tokens: Mutex::new(HashMap::new()),
        })
    }

    pub fn catalog(&self) -> &StacCatalog {
        &self.catalog
    }

    /// Shared with asset downloads
    pub fn http(&self) -> &Client {
        &self.http
    }

    pub fn options(&self) -> &StacClientOptions {
        &self.options
    }

    /// First page of results for `params`
    pub async fn search(&self, params: &StacSearchParams) -> Result<StacItemCollection> {
        let url = self.catalog.search_url();
        self.send_json(|| self.http.post(&url).json(params)).await
    }

    /// Candidate items for `query`.
    ///
    /// Only the catalog-side part of the query is sent; the caller still
    /// applies [`CatalogQuery::local_filter`].
    pub async fn search_query(&self, query: &CatalogQuery) -> Result<Vec<StacItem>> {
        let mut params = query.to_search_params();
        if params.limit.is_none() {
            params = params.limit(PAGE_SIZE.min(self.options.max_items.max(1)) as u32);
        }
        let items = self.search_all(&params).await?;
        debug!(
            collection = %query.collection,
            items = items.len(),
            "STAC search complete"
        );
        Ok(items)
    }

    /// Follow pagination until `max_items` items or the last page.
    pub async fn search_all(&self, params: &StacSearchParams) -> Result<Vec<StacItem>> {
        let max = self.options.max_items;
        let mut items = Vec::new();
        let mut page = self.search(params).await?;

        loop {
            let next = page.next_link().cloned();
            items.append(&mut page.features);
            debug!(total = items.len(), "STAC page received");
            if items.len() >= max {
                break;
            }
            let Some(link) = next else {
                break;
            };
            page = match next_page(&link, params)? {
                NextPage::Get(url) => self.send_json(|| self.http.get(&url)).await?,
                NextPage::Post { url, body } => {
                    self.send_json(|| self.http.post(&url).json(&body)).await?
                }
            };
            if page.is_empty() {
                break;
            }
        }

        items.truncate(max);
        Ok(items)
    }

    /// Download URL of asset `key` of `item`, signed when the catalog
    /// requires it.
    pub async fn asset_href(&self, item: &StacItem, key: &str) -> Result<String> {
        let asset = item.asset(key).ok_or_else(|| CloudError::MissingAsset {
            item: item.id.clone(),
            key: key.to_string(),
        })?;
        if !self.catalog.needs_signing() {
            return Ok(asset.href.clone());
        }
        let collection = item.collection.as_deref().ok_or_else(|| {
            CloudError::Auth(format!("item '{}' names no collection to sign for", item.id))
        })?;
        let token = self.sas_token(collection).await?;
        Ok(append_token(&asset.href, &token))
    }

    async fn sas_token(&self, collection: &str) -> Result<String> {
        let poisoned = || CloudError::Auth("token cache lock poisoned".into());
        {
            let tokens = self.tokens.lock().map_err(|_| poisoned())?;
            if let Some(t) = tokens.get(collection)
                && t.is_fresh(Utc::now())
            {
                return Ok(t.token.clone());
            }
        }

        debug!(collection, "requesting SAS token");
        let url = StacCatalog::token_url(collection);
        let token: SasToken = self
            .send_json(|| self.http.get(&url))
            .await
            .map_err(|e| CloudError::Auth(format!("SAS token for {}: {}", collection, e)))?;
        let value = token.token.clone();
        self.tokens
            .lock()
            .map_err(|_| poisoned())?
            .insert(collection.to_string(), token);
        Ok(value)
    }

    /// Send a request built by `request`, retrying transient failures with
    /// exponential backoff, and decode the JSON body.
    async fn send_json<T, F>(&self, request: F) -> Result<T>
    where
        T: DeserializeOwned,
        F: Fn() -> RequestBuilder,
    {
        let mut last_err = None;

        for attempt in 0..=self.options.max_retries {
            if attempt > 0 {
                let delay = Duration::from_millis(500 * (1 << (attempt - 1)));
                if let Some(err) = &last_err {
                    warn!(attempt, ?delay, "retrying STAC request after: {err}");
                }
                tokio::time::sleep(delay).await;
            }

            match request().send().await {
                Ok(resp) if resp.status().is_success() => {
                    let body = resp.text().await?;
                    return serde_json::from_str(&body).map_err(|e| {
                        CloudError::Catalog(format!("unreadable STAC response: {e}"))
                    });
                }
                Ok(resp) => {
                    let status = resp.status();
                    let body = resp.text().await.unwrap_or_default();
                    last_err = Some(CloudError::Network(format!(
                        "HTTP {}: {}",
                        status,
                        body.chars().take(300).collect::<String>()
                    )));
                    if status.is_client_error() {
                        break;
                    }
                }
                Err(e) if e.is_timeout() || e.is_connect() => {
                    last_err = Some(CloudError::Http(e));
                }
                Err(e) => return Err(CloudError::Http(e)),
            }
        }

        Err(last_err.unwrap_or_else(|| CloudError::Network("STAC request failed".into())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn link(value: serde_json::Value) -> StacLink {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn catalog_urls() {
        assert_eq!(
            StacCatalog::PlanetaryComputer.search_url(),
            "https://planetarycomputer.microsoft.com/api/stac/v1/search"
        );
        assert_eq!(
            StacCatalog::EarthSearch.search_url(),
            "https://earth-search.aws.element84.com/v1/search"
        );
        for root in ["https://example.com/stac", "https://example.com/stac/", "https://example.com/stac/search"] {
            assert_eq!(
                StacCatalog::Custom(root.into()).search_url(),
                "https://example.com/stac/search"
            );
        }
        assert_eq!(
            StacCatalog::token_url("landsat-c2-l2"),
            "https://planetarycomputer.microsoft.com/api/sas/v1/token/landsat-c2-l2"
        );
    }

    #[test]
    fn catalog_shorthands_keep_url_case() {
        assert_eq!(StacCatalog::from_str_or_url("PC"), StacCatalog::PlanetaryComputer);
        assert_eq!(StacCatalog::from_str_or_url("earth_search"), StacCatalog::EarthSearch);
        assert_eq!(
            StacCatalog::from_str_or_url("https://Example.com/STAC"),
            StacCatalog::Custom("https://Example.com/STAC".into())
        );
        assert!(StacCatalog::PlanetaryComputer.needs_signing());
        assert!(!StacCatalog::Custom("https://x.com".into()).needs_signing());
    }

    #[test]
    fn next_page_from_links() {
        let params = StacSearchParams::new()
            .collections(&["sentinel-2-l2a"])
            .limit(10);

        let get = link(json!({"rel": "next", "href": "https://x/search?page=2"}));
        assert_eq!(
            next_page(&get, &params).unwrap(),
            NextPage::Get("https://x/search?page=2".into())
        );

        let merged = link(json!({
            "rel": "next", "href": "https://x/search", "method": "POST",
            "merge": true, "body": {"token": "abc"}
        }));
        let NextPage::Post { url, body } = next_page(&merged, &params).unwrap() else {
            panic!("expected a POST page");
        };
        assert_eq!(url, "https://x/search");
        assert_eq!(body["token"], "abc");
        assert_eq!(body["collections"], json!(["sentinel-2-l2a"]));
        assert_eq!(body["limit"], 10);

        let replaced = link(json!({
            "rel": "next", "href": "https://x/search", "method": "post",
            "body": {"token": "def"}
        }));
        let NextPage::Post { body, .. } = next_page(&replaced, &params).unwrap() else {
            panic!("expected a POST page");
        };
        assert_eq!(body, json!({"token": "def"}));
    }

    #[test]
    fn token_is_appended_to_query() {
        assert_eq!(
            append_token("https://acct.blob/c/B04.tif", "st=1&sig=x"),
            "https://acct.blob/c/B04.tif?st=1&sig=x"
        );
        assert_eq!(
            append_token("https://acct.blob/c/B04.tif?v=2", "?st=1&sig=x"),
            "https://acct.blob/c/B04.tif?v=2&st=1&sig=x"
        );
    }

    #[test]
    fn tokens_expire_early() {
        let token: SasToken = serde_json::from_value(json!({
            "msft:expiry": "2024-05-01T12:00:00Z",
            "token": "st=1&sig=x"
        }))
        .unwrap();
        assert!(token.is_fresh(Utc.with_ymd_and_hms(2024, 5, 1, 11, 0, 0).unwrap()));
        assert!(!token.is_fresh(Utc.with_ymd_and_hms(2024, 5, 1, 11, 59, 30).unwrap()));
    }

    #[tokio::test]
    async fn unsigned_catalogs_return_asset_hrefs() {
        let client = StacClient::new(StacCatalog::EarthSearch, StacClientOptions::default()).unwrap();
        let item: StacItem = serde_json::from_value(json!({
            "type": "Feature",
            "id": "S2A_1",
            "collection": "sentinel-2-l2a",
            "geometry": null,
            "properties": {"datetime": "2019-07-03T11:00:00Z"},
            "assets": {"red": {"href": "https://bucket/S2A_1/B04.tif"}},
            "links": []
        }))
        .unwrap();
        assert_eq!(
            client.asset_href(&item, "red").await.unwrap(),
            "https://bucket/S2A_1/B04.tif"
        );
        assert!(matches!(
            client.asset_href(&item, "B04").await,
            Err(CloudError::MissingAsset { .. })
        ));
    }
}
