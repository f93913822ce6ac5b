use std::time::Duration;

use catalog::SourceRef;
use foundation::time::Year;
use serde_json::Value;
use tracing::debug;

use crate::BoxFuture;
use crate::error::ProviderError;
use crate::protocol::ProxyRequest;

/// ACS 5-year estimates are published for this range; other years are clamped.
pub const CENSUS_ACS_FIRST_YEAR: i32 = 2009;
pub const CENSUS_ACS_LAST_YEAR: i32 = 2022;

/// Minimum magnitude counted by regional earthquake sources.
pub const EARTHQUAKE_MIN_MAGNITUDE: &str = "4.5";

/// Census marks unavailable estimates with large negative sentinels.
const CENSUS_SENTINEL_CEILING: f64 = -555_555_555.0;

/// Regional statistics provider: resolves one source to a single value.
///
/// `Ok(None)` means the provider has no value (or is not configured).
pub trait RegionalStatsProvider: Send + Sync {
    fn fetch_value<'a>(
        &'a self,
        source: &'a SourceRef,
        year: Year,
    ) -> BoxFuture<'a, Result<Option<f64>, ProviderError>>;
}

/// Build the proxy call for a regional source.
pub fn regional_request(source: &SourceRef, year: Year) -> Result<ProxyRequest, ProviderError> {
    let Some((prefix, code)) = source.regional_route() else {
        return Err(ProviderError::UnsupportedSource(source.entity.clone()));
    };

    let req = match prefix {
        "census" => {
            let y = year.0.clamp(CENSUS_ACS_FIRST_YEAR, CENSUS_ACS_LAST_YEAR);
            let state = if code.is_empty() { "*" } else { code };
            ProxyRequest::new(format!("census/{y}/acs/acs5"))
                .param("get", format!("NAME,{}", source.variable))
                .param("for", format!("state:{state}"))
        }
        "earthquakes" => ProxyRequest::new("earthquakes/count")
            .param("format", "geojson")
            .param("starttime", format!("{}-01-01", year.0))
            .param("endtime", format!("{}-12-31", year.0))
            .param("minmagnitude", EARTHQUAKE_MIN_MAGNITUDE),
        "nps" => {
            let mut req = ProxyRequest::new("nps/parks").param("limit", "1");
            if !code.is_empty() {
                req = req.param("stateCode", code);
            }
            req
        }
        "drug" => ProxyRequest::new("drug/enforcement.json")
            .param(
                "search",
                format!("report_date:[{y}0101 TO {y}1231]", y = year.0),
            )
            .param("limit", "1"),
        other => {
            let endpoint = if code.is_empty() {
                other.to_string()
            } else {
                format!("{other}/{code}")
            };
            ProxyRequest::new(endpoint)
                .param("variable", source.variable.clone())
                .param("year", year.0.to_string())
        }
    };
    Ok(req)
}

/// Pull `variable` out of an upstream response.
///
/// Understands census-style tables (`[[header...], [row...]]`), dotted paths
/// into objects (`meta.results.total`), and the first element of a `data` or
/// `results` array. Numeric strings are accepted.
pub fn extract_value(body: &Value, variable: &str) -> Option<f64> {
    match body {
        Value::Array(rows) => table_value(rows, variable)
            .or_else(|| rows.first().and_then(|r| extract_value(r, variable))),
        Value::Object(_) => lookup_path(body, variable)
            .and_then(as_number)
            .or_else(|| {
                ["data", "results"].iter().find_map(|k| {
                    let first = body.get(*k)?.as_array()?.first()?;
                    lookup_path(first, variable).and_then(as_number)
                })
            }),
        _ => None,
    }
}

fn table_value(rows: &[Value], variable: &str) -> Option<f64> {
    let header = rows.first()?.as_array()?;
    let col = header.iter().position(|h| h.as_str() == Some(variable))?;
    let v = rows.get(1)?.as_array()?.get(col).and_then(as_number)?;
    (v > CENSUS_SENTINEL_CEILING).then_some(v)
}

fn lookup_path<'a>(v: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(v, |cur, seg| cur.get(seg))
}

fn as_number(v: &Value) -> Option<f64> {
    let n = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

/// Regional client that posts `{endpoint, params}` to the local proxy.
///
/// Without a proxy URL every source resolves to `None` and no request is made,
/// so development environments degrade to "no data".
pub struct ProxyRegionalClient {
    proxy_url: Option<String>,
    client: reqwest::Client,
}

impl ProxyRegionalClient {
    pub fn new(proxy_url: Option<String>, timeout: Duration) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ProviderError::Client)?;
        Ok(Self {
            proxy_url: proxy_url.filter(|u| !u.trim().is_empty()),
            client,
        })
    }

    pub fn is_configured(&self) -> bool {
        self.proxy_url.is_some()
    }

    async fn post(&self, url: &str, req: &ProxyRequest) -> Result<Value, ProviderError> {
        let resp = self
            .client
            .post(url)
            .json(req)
            .send()
            .await
            .map_err(|source| ProviderError::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ProviderError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        resp.json::<Value>()
            .await
            .map_err(|e| ProviderError::Malformed {
                url: url.to_string(),
                message: e.to_string(),
            })
    }
}

impl RegionalStatsProvider for ProxyRegionalClient {
    fn fetch_value<'a>(
        &'a self,
        source: &'a SourceRef,
        year: Year,
    ) -> BoxFuture<'a, Result<Option<f64>, ProviderError>> {
        Box::pin(async move {
            let Some(url) = self.proxy_url.as_deref() else {
                debug!(entity = %source.entity, "regional proxy not configured");
                return Ok(None);
            };
            let req = regional_request(source, year)?;
            let body = self.post(url, &req).await?;
            Ok(extract_value(&body, &source.variable))
        })
    }
}
