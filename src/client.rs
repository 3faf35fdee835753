//! toorPIA HTTP client.
//!
//! Blocking reqwest client (no Tokio runtime required).
//! Covers session login, map export, checksum-deduplicated map import,
//! and the analysis request surface (fit_transform / addplot).

use std::path::Path;
use std::time::Duration;

use crate::auth::ApiCredentials;
use crate::checksum::compute_fingerprint;
use crate::error::Error;
use crate::snapshot::{read_snapshot, write_snapshot, MapSnapshot};

// ── Constants ───────────────────────────────────────────────────────

const SESSION_HEADER: &str = "session-key";
const USER_AGENT: &str = concat!("toorpia-client/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

// ── Public types ────────────────────────────────────────────────────

/// Identifies a map instance on the server.
#[derive(Debug, Clone)]
pub struct MapHandle {
    pub map_no: i64,
    pub share_url: Option<String>,
}

/// Optional parameters for [`ToorClient::fit_transform`].
///
/// Weight and type option strings are computed by the caller and passed
/// through opaquely.
#[derive(Debug, Clone, Default)]
pub struct FitTransformOptions {
    pub label: Option<String>,
    pub tag: Option<String>,
    pub description: Option<String>,
    /// Sent as `randomSeed` only when different from the server default (42)
    pub random_seed: Option<i64>,
    pub weight_option_str: Option<String>,
    pub type_option_str: Option<String>,
    pub identna_resolution: Option<f64>,
    pub identna_effective_radius: Option<f64>,
}

/// Optional parameters for [`ToorClient::addplot`].
#[derive(Debug, Clone, Default)]
pub struct AddPlotOptions {
    /// Target map; falls back to the client's current map
    pub map_no: Option<i64>,
    pub weight_option_str: Option<String>,
    pub type_option_str: Option<String>,
    pub detabn_max_window: Option<i64>,
    pub detabn_rate_threshold: Option<f64>,
    pub detabn_threshold: Option<f64>,
    pub detabn_print_score: Option<bool>,
}

/// Result of projecting additional records onto a map.
#[derive(Debug, Clone)]
pub struct AddPlotResult {
    pub xy_data: Vec<Vec<f64>>,
    pub add_plot_no: Option<i64>,
    pub abnormality_status: Option<String>,
    pub abnormality_score: Option<f64>,
    pub share_url: Option<String>,
}

// ── Client ──────────────────────────────────────────────────────────

/// toorPIA API client (blocking).
///
/// One instance per caller: the cached session key and the current-map
/// fields are mutated without synchronization, so sharing an instance
/// across threads needs external locking.
pub struct ToorClient {
    http: reqwest::blocking::Client,
    api_base: String,
    api_key: String,
    session_key: Option<String>,
    /// Map number recorded by the most recent fit_transform
    pub map_no: Option<i64>,
    /// Share URL from the most recent server response that carried one
    pub share_url: Option<String>,
    /// Add-plot number recorded by the most recent addplot
    pub current_addplot_no: Option<i64>,
}

impl ToorClient {
    /// Create a client from the environment and saved credentials.
    pub fn from_env() -> Result<Self, Error> {
        Ok(Self::new(ApiCredentials::resolve(None)?))
    }

    /// Create a client with explicit credentials.
    pub fn new(creds: ApiCredentials) -> Self {
        let http = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("failed to build HTTP client");

        Self {
            http,
            api_base: creds.api_base,
            api_key: creds.api_key,
            session_key: None,
            map_no: None,
            share_url: None,
            current_addplot_no: None,
        }
    }

    /// Create a client against an explicit base URL.
    pub fn with_base_url(api_key: impl Into<String>, api_base: impl Into<String>) -> Self {
        Self::new(ApiCredentials::new(api_key.into(), api_base.into()))
    }

    // ── Session guard ───────────────────────────────────────────────

    /// Exchange the API key for a session key and cache it.
    pub fn authenticate(&mut self) -> Result<(), Error> {
        let key = self.login()?;
        self.session_key = Some(key);
        Ok(())
    }

    /// Ensure a session key exists before a privileged call.
    ///
    /// Logs in once when no key is cached. A cached key is trusted for the
    /// process lifetime: a 401 from the server is surfaced to the caller,
    /// never answered with a silent re-login. Callers hitting repeated
    /// Unauthorized errors need a fresh client.
    fn ensure_session(&mut self) -> Result<String, Error> {
        if let Some(key) = &self.session_key {
            return Ok(key.clone());
        }
        let key = self.login()?;
        self.session_key = Some(key.clone());
        Ok(key)
    }

    fn login(&self) -> Result<String, Error> {
        let url = format!("{}/auth/login", self.api_base);
        let response = self
            .http
            .post(&url)
            .json(&serde_json::json!({ "apiKey": self.api_key }))
            .send()
            .map_err(|e| Error::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response.text().unwrap_or_default();
            return Err(Error::Authentication(format!(
                "login rejected ({}): {}",
                status,
                server_message(&body),
            )));
        }

        let json: serde_json::Value =
            response.json().map_err(|e| Error::Parse(e.to_string()))?;
        json["sessionKey"]
            .as_str()
            .map(String::from)
            .ok_or_else(|| Error::Parse("missing sessionKey in login response".into()))
    }

    // ── Map synchronization ─────────────────────────────────────────

    /// Download map `map_no` and materialize it under `export_dir`.
    ///
    /// Returns the raw file mapping as sent by the server. On a server
    /// error nothing is created or modified locally. Per-file write
    /// failures are logged and do not fail the export.
    pub fn export_map(&mut self, map_no: i64, export_dir: &Path) -> Result<MapSnapshot, Error> {
        let session = self.ensure_session()?;
        let url = format!("{}/maps/export/{}", self.api_base, map_no);
        let response = self.get(&url, &session)?;
        let json: serde_json::Value =
            response.json().map_err(|e| Error::Parse(e.to_string()))?;

        let mut snapshot = MapSnapshot::new();
        if let Some(map_data) = json["mapData"].as_object() {
            for (name, content) in map_data {
                if let Some(content) = content.as_str() {
                    snapshot.insert(name.clone(), content.to_string());
                }
            }
        }
        self.share_url = json["shareUrl"].as_str().map(String::from);

        let report = write_snapshot(export_dir, &snapshot)?;
        if !report.failed.is_empty() {
            log::warn!(
                "export of map {}: {} file(s) could not be written",
                map_no,
                report.failed.len(),
            );
        }

        Ok(snapshot)
    }

    /// Upload the map under `input_dir`, unless a byte-identical map
    /// already exists on the server.
    ///
    /// Returns the map number of the existing or newly created map.
    /// Importing identical content twice never creates two maps.
    pub fn import_map(&mut self, input_dir: &Path) -> Result<i64, Error> {
        let session = self.ensure_session()?;

        let fingerprint = compute_fingerprint(input_dir)?;
        if let Some(existing) = self.compare_checksum(&fingerprint)? {
            log::debug!(
                "content of {} already on server as map {}, skipping upload",
                input_dir.display(),
                existing.map_no,
            );
            return Ok(existing.map_no);
        }

        let map_data = read_snapshot(input_dir)?;
        let url = format!("{}/maps/import", self.api_base);
        let body = serde_json::json!({ "mapData": map_data });
        let response = self.post_json(&url, &session, &body)?;
        let json: serde_json::Value =
            response.json().map_err(|e| Error::Parse(e.to_string()))?;

        let map_no = json["mapNo"]
            .as_i64()
            .ok_or_else(|| Error::Parse("missing mapNo in import response".into()))?;
        self.share_url = json["shareUrl"].as_str().map(String::from);
        Ok(map_no)
    }

    /// Ask the server whether a map with this content fingerprint exists.
    ///
    /// Pure query: server state is never modified. Records the share URL
    /// when a match is reported.
    pub fn compare_checksum(&mut self, checksum: &str) -> Result<Option<MapHandle>, Error> {
        let session = self.ensure_session()?;
        let url = format!("{}/maps/compare-checksum", self.api_base);
        let body = serde_json::json!({ "checksum": checksum });
        let response = self.post_json(&url, &session, &body)?;
        let json: serde_json::Value =
            response.json().map_err(|e| Error::Parse(e.to_string()))?;

        match json["mapNo"].as_i64() {
            Some(map_no) => {
                let share_url = json["shareUrl"].as_str().map(String::from);
                self.share_url = share_url.clone();
                Ok(Some(MapHandle { map_no, share_url }))
            }
            None => Ok(None),
        }
    }

    // ── Analysis requests ───────────────────────────────────────────

    /// Build a new base map from tabular data.
    ///
    /// `data` is the table in split orientation (`columns` / `index` /
    /// `data`), passed through to the server untouched. Records the new
    /// map number as the client's current map.
    pub fn fit_transform(
        &mut self,
        data: &serde_json::Value,
        opts: &FitTransformOptions,
    ) -> Result<Vec<Vec<f64>>, Error> {
        let session = self.ensure_session()?;
        let mut body = as_object(data, "fit_transform")?;
        apply_fit_options(&mut body, opts);

        let url = format!("{}/data/fit_transform", self.api_base);
        let response = self.post_json(&url, &session, &body)?;
        let json: serde_json::Value =
            response.json().map_err(|e| Error::Parse(e.to_string()))?;

        let map_no = json["resdata"]["mapNo"]
            .as_i64()
            .ok_or_else(|| Error::Parse("missing mapNo in fit_transform response".into()))?;
        self.map_no = Some(map_no);
        self.share_url = json["shareUrl"].as_str().map(String::from);

        Ok(parse_xy(&json["resdata"]["baseXyData"]))
    }

    /// Project additional records onto an existing map.
    ///
    /// The target map is the explicit option when given, otherwise the
    /// client's current map.
    pub fn addplot(
        &mut self,
        data: &serde_json::Value,
        opts: &AddPlotOptions,
    ) -> Result<AddPlotResult, Error> {
        let session = self.ensure_session()?;
        let target_map = opts.map_no.or(self.map_no).ok_or_else(|| {
            Error::Validation(
                "no map number: pass AddPlotOptions.map_no or build a map with fit_transform first"
                    .into(),
            )
        })?;

        let mut body = as_object(data, "addplot")?;
        body["mapNo"] = serde_json::json!(target_map);
        body["weight_option_str"] = serde_json::json!(opts.weight_option_str);
        body["type_option_str"] = serde_json::json!(opts.type_option_str);
        if let Some(w) = opts.detabn_max_window {
            body["detabn_max_window"] = serde_json::json!(w);
        }
        if let Some(r) = opts.detabn_rate_threshold {
            body["detabn_rate_threshold"] = serde_json::json!(r);
        }
        if let Some(t) = opts.detabn_threshold {
            body["detabn_threshold"] = serde_json::json!(t);
        }
        if let Some(p) = opts.detabn_print_score {
            body["detabn_print_score"] = serde_json::json!(p);
        }

        let url = format!("{}/data/addplot", self.api_base);
        let response = self.post_json(&url, &session, &body)?;
        let json: serde_json::Value =
            response.json().map_err(|e| Error::Parse(e.to_string()))?;

        let result = AddPlotResult {
            xy_data: parse_xy(&json["resdata"]),
            add_plot_no: json["addPlotNo"].as_i64(),
            abnormality_status: json["abnormalityStatus"].as_str().map(String::from),
            abnormality_score: json["abnormalityScore"].as_f64(),
            share_url: json["shareUrl"].as_str().map(String::from),
        };
        self.current_addplot_no = result.add_plot_no;
        self.share_url = result.share_url.clone();
        Ok(result)
    }

    /// List the maps associated with the API key.
    pub fn list_maps(&mut self) -> Result<serde_json::Value, Error> {
        let session = self.ensure_session()?;
        let url = format!("{}/maps", self.api_base);
        let response = self.get(&url, &session)?;
        response.json().map_err(|e| Error::Parse(e.to_string()))
    }

    /// List all additional plots of a map.
    pub fn list_addplots(&mut self, map_no: i64) -> Result<serde_json::Value, Error> {
        let session = self.ensure_session()?;
        let url = format!("{}/maps/{}/addplots", self.api_base, map_no);
        let response = self.get(&url, &session)?;
        response.json().map_err(|e| Error::Parse(e.to_string()))
    }

    /// Fetch one additional plot of a map. Records its share URL.
    pub fn get_addplot(
        &mut self,
        map_no: i64,
        addplot_no: i64,
    ) -> Result<serde_json::Value, Error> {
        let session = self.ensure_session()?;
        let url = format!("{}/maps/{}/addplots/{}", self.api_base, map_no, addplot_no);
        let response = self.get(&url, &session)?;
        let json: serde_json::Value =
            response.json().map_err(|e| Error::Parse(e.to_string()))?;
        if let Some(share_url) = json["shareUrl"].as_str() {
            self.share_url = Some(share_url.to_string());
        }
        Ok(json)
    }

    // ── Internal helpers ────────────────────────────────────────────

    fn get(&self, url: &str, session_key: &str) -> Result<reqwest::blocking::Response, Error> {
        let response = self
            .http
            .get(url)
            .header(SESSION_HEADER, session_key)
            .send()
            .map_err(|e| Error::Network(e.to_string()))?;
        check_status(response)
    }

    fn post_json(
        &self,
        url: &str,
        session_key: &str,
        body: &serde_json::Value,
    ) -> Result<reqwest::blocking::Response, Error> {
        let response = self
            .http
            .post(url)
            .header(SESSION_HEADER, session_key)
            .json(body)
            .send()
            .map_err(|e| Error::Network(e.to_string()))?;
        check_status(response)
    }
}

// ── Free functions ──────────────────────────────────────────────────

fn check_status(
    response: reqwest::blocking::Response,
) -> Result<reqwest::blocking::Response, Error> {
    let status = response.status().as_u16();
    if response.status().is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    let msg = server_message(&body);
    match status {
        401 => Err(Error::Unauthorized(msg)),
        400 | 404 | 422 => Err(Error::Validation(msg)),
        _ => Err(Error::Http(status, msg)),
    }
}

/// Pull the server's `message` field out of an error body, falling back
/// to the raw text.
fn server_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["message"].as_str().map(String::from))
        .unwrap_or_else(|| body.to_string())
}

fn as_object(data: &serde_json::Value, operation: &str) -> Result<serde_json::Value, Error> {
    if !data.is_object() {
        return Err(Error::Validation(format!(
            "{} data must be a JSON object in split orientation",
            operation,
        )));
    }
    Ok(data.clone())
}

/// Decode a server coordinate array (`[[x, y], ...]`) into rows of f64.
fn parse_xy(value: &serde_json::Value) -> Vec<Vec<f64>> {
    value
        .as_array()
        .map(|rows| {
            rows.iter()
                .map(|row| {
                    row.as_array()
                        .map(|cells| cells.iter().filter_map(|c| c.as_f64()).collect())
                        .unwrap_or_default()
                })
                .collect()
        })
        .unwrap_or_default()
}

fn apply_fit_options(body: &mut serde_json::Value, opts: &FitTransformOptions) {
    if let Some(label) = &opts.label {
        body["label"] = serde_json::json!(label);
    }
    if let Some(tag) = &opts.tag {
        body["tag"] = serde_json::json!(tag);
    }
    if let Some(description) = &opts.description {
        body["description"] = serde_json::json!(description);
    }
    // 42 is the server default; only a deviation is worth sending
    if let Some(seed) = opts.random_seed {
        if seed != 42 {
            body["randomSeed"] = serde_json::json!(seed);
        }
    }
    body["weight_option_str"] = serde_json::json!(opts.weight_option_str);
    body["type_option_str"] = serde_json::json!(opts.type_option_str);

    let mut identna = serde_json::Map::new();
    if let Some(resolution) = opts.identna_resolution {
        identna.insert("resolution".into(), serde_json::json!(resolution));
    }
    if let Some(radius) = opts.identna_effective_radius {
        identna.insert("effectiveRadius".into(), serde_json::json!(radius));
    }
    if !identna.is_empty() {
        body["identnaParams"] = serde_json::Value::Object(identna);
    }
}

// ── Tests ───────────────────────────────────────────────────────────
