//! Routing table for `/api/proxy`.
//!
//! The table is built once from [`ApiKeys`]; each request is matched by
//! endpoint prefix and turned into a concrete upstream URL, query and headers.

use providers::ProxyRequest;

use crate::config::ApiKeys;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("{upstream} is not configured: set {env}")]
    MissingKey {
        upstream: &'static str,
        env: &'static str,
    },
    #[error("invalid endpoint `{0}`")]
    InvalidEndpoint(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStrategy {
    None,
    /// Key sent as a request header.
    Header {
        name: &'static str,
        env: &'static str,
        key: Option<String>,
    },
    /// Key sent as a query parameter. Optional keys are skipped when unset.
    Query {
        param: &'static str,
        env: &'static str,
        key: Option<String>,
        required: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upstream {
    pub name: &'static str,
    /// Routing key matched against the start of the endpoint.
    pub prefix: &'static str,
    pub base_url: String,
    pub auth: AuthStrategy,
    /// Drop `prefix` from the endpoint before appending it to `base_url`.
    pub strip_prefix: bool,
}

/// Fully resolved outbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub upstream: &'static str,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(&'static str, String)>,
}

/// Base URLs of the known upstreams.
#[derive(Debug, Clone)]
pub struct UpstreamBases {
    pub nps: String,
    pub fda: String,
    pub usgs: String,
    pub census: String,
    pub data_gov: String,
}

impl Default for UpstreamBases {
    fn default() -> Self {
        Self {
            nps: "https://developer.nps.gov/api/v1".to_string(),
            fda: "https://api.fda.gov".to_string(),
            usgs: "https://earthquake.usgs.gov/fdsnws/event/1".to_string(),
            census: "https://api.census.gov/data".to_string(),
            data_gov: "https://api.data.gov".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UpstreamTable {
    routes: Vec<Upstream>,
    fallback: Upstream,
}

impl UpstreamTable {
    pub fn new(keys: &ApiKeys, bases: &UpstreamBases) -> Self {
        let routes = vec![
            Upstream {
                name: "nps",
                prefix: "nps/",
                base_url: bases.nps.clone(),
                auth: AuthStrategy::Header {
                    name: "X-Api-Key",
                    env: "NPS_API_KEY",
                    key: keys.nps.clone(),
                },
                strip_prefix: true,
            },
            Upstream {
                name: "openfda",
                prefix: "drug/enforcement",
                base_url: bases.fda.clone(),
                auth: AuthStrategy::Query {
                    param: "api_key",
                    env: "FDA_API_KEY",
                    key: keys.fda.clone(),
                    required: true,
                },
                strip_prefix: false,
            },
            Upstream {
                name: "usgs",
                prefix: "earthquakes/",
                base_url: bases.usgs.clone(),
                auth: AuthStrategy::None,
                strip_prefix: true,
            },
            Upstream {
                name: "census",
                prefix: "census/",
                base_url: bases.census.clone(),
                auth: AuthStrategy::Query {
                    param: "key",
                    env: "CENSUS_API_KEY",
                    key: keys.census.clone(),
                    required: false,
                },
                strip_prefix: true,
            },
        ];
        let fallback = Upstream {
            name: "data.gov",
            prefix: "",
            base_url: bases.data_gov.clone(),
            auth: AuthStrategy::Header {
                name: "X-Api-Key",
                env: "DATA_GOV_API_KEY",
                key: keys.data_gov.clone(),
            },
            strip_prefix: false,
        };
        Self { routes, fallback }
    }

    pub fn resolve(&self, endpoint: &str) -> &Upstream {
        self.routes
            .iter()
            .find(|u| endpoint.starts_with(u.prefix))
            .unwrap_or(&self.fallback)
    }

    pub fn dispatch(&self, req: &ProxyRequest) -> Result<Outbound, DispatchError> {
        let endpoint = req.endpoint.trim_start_matches('/');
        if endpoint.is_empty()
            || endpoint.contains("://")
            || endpoint.split('/').any(|seg| seg == "..")
        {
            return Err(DispatchError::InvalidEndpoint(req.endpoint.clone()));
        }

        let upstream = self.resolve(endpoint);
        let path = if upstream.strip_prefix {
            &endpoint[upstream.prefix.len()..]
        } else {
            endpoint
        };
        let url = format!("{}/{}", upstream.base_url.trim_end_matches('/'), path);

        let mut query: Vec<(String, String)> = req
            .params
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let mut headers = Vec::new();

        match &upstream.auth {
            AuthStrategy::None => {}
            AuthStrategy::Header { name, env, key } => {
                let key = key.clone().ok_or(DispatchError::MissingKey {
                    upstream: upstream.name,
                    env: *env,
                })?;
                headers.push((*name, key));
            }
            AuthStrategy::Query {
                param,
                env,
                key,
                required,
            } => match key {
                Some(k) => query.push((param.to_string(), k.clone())),
                None if *required => {
                    return Err(DispatchError::MissingKey {
                        upstream: upstream.name,
                        env: *env,
                    });
                }
                None => {}
            },
        }

        Ok(Outbound {
            upstream: upstream.name,
            url,
            query,
            headers,
        })
    }
}
