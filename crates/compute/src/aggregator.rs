use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use catalog::{Catalog, SourceKind, SourceRef};
use foundation::ids::LayerId;
use foundation::time::Year;
use providers::{ProviderError, RegionalStatsProvider, SeriesProvider};
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::analysis::{Statistics, TemporalAnalysis};

pub const DEFAULT_SOURCE_TIMEOUT: Duration = Duration::from_secs(8);

/// One resolved source of one layer for one fetch cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerDataPoint {
    pub id: String,
    pub entity: String,
    pub variable: String,
    pub name: String,
    pub current_value: Option<f64>,
    pub normalized_value: f64,
}

pub type LayerDataMap = BTreeMap<LayerId, Vec<LayerDataPoint>>;

/// Result of one `fetch_all_data` call.
///
/// `error` is set when the call stopped early; `data` then holds the layers
/// completed before the failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregationOutcome {
    pub data: LayerDataMap,
    pub error: Option<String>,
}

pub struct Aggregator {
    catalog: Arc<Catalog>,
    series: Arc<dyn SeriesProvider>,
    regional: Arc<dyn RegionalStatsProvider>,
    source_timeout: Duration,
}

impl Aggregator {
    pub fn new(
        catalog: Arc<Catalog>,
        series: Arc<dyn SeriesProvider>,
        regional: Arc<dyn RegionalStatsProvider>,
    ) -> Self {
        Self {
            catalog,
            series,
            regional,
            source_timeout: DEFAULT_SOURCE_TIMEOUT,
        }
    }

    pub fn with_source_timeout(mut self, timeout: Duration) -> Self {
        self.source_timeout = timeout;
        self
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Fetch and normalize every source of every active layer.
    ///
    /// Layers and sources are processed strictly one after another in input
    /// order. Unknown layers are skipped. Layers without a single resolved
    /// value are left out of the map.
    pub async fn fetch_all_data(&self, active: &[LayerId], year: Year) -> AggregationOutcome {
        let mut data = LayerDataMap::new();

        let error = match self.collect(active, year, &mut data).await {
            Ok(()) => None,
            Err(e) => {
                error!(%year, error = %e, "layer aggregation failed");
                Some(e.to_string())
            }
        };

        debug!(%year, layers = data.len(), "layer aggregation finished");
        AggregationOutcome { data, error }
    }

    async fn collect(
        &self,
        active: &[LayerId],
        year: Year,
        out: &mut LayerDataMap,
    ) -> Result<(), ProviderError> {
        for id in active {
            let Some(config) = self.catalog.layer(id) else {
                warn!(layer = %id, "no source configuration for layer, skipping");
                continue;
            };

            let mut values = Vec::with_capacity(config.sources.len());
            for source in &config.sources {
                values.push(self.resolve(source, year).await?);
            }

            if values.iter().all(Option::is_none) {
                debug!(layer = %id, "no source resolved a value");
                continue;
            }

            let normalized = Statistics::normalize_all(&values);
            let points = config
                .sources
                .iter()
                .zip(values)
                .zip(normalized)
                .map(|((s, current_value), normalized_value)| LayerDataPoint {
                    id: s.key(),
                    entity: s.entity.clone(),
                    variable: s.variable.clone(),
                    name: s.display_name.clone(),
                    current_value,
                    normalized_value,
                })
                .collect();
            out.insert(id.clone(), points);
        }
        Ok(())
    }

    /// Value of one source nearest `year`.
    ///
    /// Fetch failures and timeouts degrade to `None`. Only an undecodable
    /// series response is returned as an error.
    async fn resolve(&self, source: &SourceRef, year: Year) -> Result<Option<f64>, ProviderError> {
        match source.kind() {
            SourceKind::Regional => {
                let fetch = self.regional.fetch_value(source, year);
                match tokio::time::timeout(self.source_timeout, fetch).await {
                    Ok(Ok(value)) => Ok(value),
                    Ok(Err(e)) => {
                        warn!(entity = %source.entity, variable = %source.variable, error = %e, "regional source failed");
                        Ok(None)
                    }
                    Err(_) => {
                        warn!(entity = %source.entity, variable = %source.variable, "regional source timed out");
                        Ok(None)
                    }
                }
            }
            SourceKind::Series => {
                let fetch = self.series.fetch_series(&source.entity, &source.variable);
                match tokio::time::timeout(self.source_timeout, fetch).await {
                    Ok(Ok(series)) => Ok(TemporalAnalysis::nearest(&series.observations, year, |o| {
                        Year::parse_date_prefix(&o.date)
                    })
                    .map(|o| o.value)),
                    Ok(Err(e)) => Err(e),
                    Err(_) => {
                        warn!(entity = %source.entity, variable = %source.variable, "series source timed out");
                        Ok(None)
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use catalog::{Catalog, LayerConfig, SourceRef};
    use foundation::ids::LayerId;
    use foundation::time::Year;
    use providers::{
        BoxFuture, ProviderError, RegionalStatsProvider, SeriesObservation, SeriesProvider,
        SeriesResponse,
    };

    use super::Aggregator;

    #[derive(Default)]
    struct FakeSeries {
        series: HashMap<String, Vec<(i32, f64)>>,
        malformed: Option<String>,
        hang: bool,
        calls: AtomicUsize,
    }

    impl FakeSeries {
        fn with(mut self, entity: &str, points: &[(i32, f64)]) -> Self {
            self.series.insert(entity.to_string(), points.to_vec());
            self
        }
    }

    impl SeriesProvider for FakeSeries {
        fn fetch_series<'a>(
            &'a self,
            entity: &'a str,
            _variable: &'a str,
        ) -> BoxFuture<'a, Result<SeriesResponse, ProviderError>> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                if self.hang {
                    std::future::pending::<()>().await;
                }
                if self.malformed.as_deref() == Some(entity) {
                    return Err(ProviderError::Malformed {
                        url: entity.to_string(),
                        message: "expected value".to_string(),
                    });
                }
                let observations = self
                    .series
                    .get(entity)
                    .map(|pts| {
                        pts.iter()
                            .map(|(y, v)| SeriesObservation {
                                date: y.to_string(),
                                value: *v,
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                Ok(SeriesResponse {
                    observations,
                    facet: None,
                })
            })
        }
    }

    #[derive(Default)]
    struct FakeRegional {
        values: HashMap<String, f64>,
        failing: Vec<String>,
        calls: AtomicUsize,
    }

    impl RegionalStatsProvider for FakeRegional {
        fn fetch_value<'a>(
            &'a self,
            source: &'a SourceRef,
            _year: Year,
        ) -> BoxFuture<'a, Result<Option<f64>, ProviderError>> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                if self.failing.contains(&source.entity) {
                    return Err(ProviderError::Status {
                        url: source.entity.clone(),
                        status: 502,
                    });
                }
                Ok(self.values.get(&source.entity).copied())
            })
        }
    }

    fn layer(id: &str, entities: &[&str]) -> LayerConfig {
        LayerConfig {
            id: LayerId::from(id),
            name: id.to_string(),
            sources: entities
                .iter()
                .map(|e| SourceRef::new(*e, "v", *e))
                .collect(),
        }
    }

    fn catalog() -> Arc<Catalog> {
        Arc::new(
            Catalog::new()
                .with_layer(layer("disease", &["country/A", "country/B", "country/C"]))
                .with_layer(layer("housing", &["region/census/06", "region/census/48"]))
                .with_layer(layer("economy", &["country/A", "country/D"])),
        )
    }

    fn ids(v: &[&str]) -> Vec<LayerId> {
        v.iter().map(|s| LayerId::from(*s)).collect()
    }

    fn scenario() -> (Arc<FakeSeries>, Arc<FakeRegional>) {
        let series = FakeSeries::default()
            .with("country/A", &[(2019, 90.0), (2020, 100.0)])
            .with("country/B", &[(2018, 200.0)]);
        let regional = FakeRegional {
            values: HashMap::from([
                ("region/census/06".to_string(), 50.0),
                ("region/census/48".to_string(), 50.0),
            ]),
            ..Default::default()
        };
        (Arc::new(series), Arc::new(regional))
    }

    fn normalized(points: &[super::LayerDataPoint]) -> Vec<f64> {
        points.iter().map(|p| p.normalized_value).collect()
    }

    #[tokio::test]
    async fn empty_input_makes_no_calls() {
        let (series, regional) = scenario();
        let agg = Aggregator::new(catalog(), series.clone(), regional.clone());
        let out = agg.fetch_all_data(&[], Year(2020)).await;
        assert!(out.data.is_empty());
        assert!(out.error.is_none());
        assert_eq!(series.calls.load(Ordering::SeqCst), 0);
        assert_eq!(regional.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn disease_and_housing_scenario() {
        let (series, regional) = scenario();
        let agg = Aggregator::new(catalog(), series, regional);
        let out = agg
            .fetch_all_data(&ids(&["disease", "housing"]), Year(2020))
            .await;
        assert!(out.error.is_none());

        let disease = &out.data[&LayerId::from("disease")];
        let values: Vec<Option<f64>> = disease.iter().map(|p| p.current_value).collect();
        assert_eq!(values, vec![Some(100.0), Some(200.0), None]);
        assert_eq!(normalized(disease), vec![0.0, 1.0, 0.0]);
        assert_eq!(disease[0].id, "country/A:v");

        let housing = &out.data[&LayerId::from("housing")];
        assert_eq!(normalized(housing), vec![0.5, 0.5]);
    }

    #[tokio::test]
    async fn unknown_layer_is_skipped() {
        let (series, regional) = scenario();
        let agg = Aggregator::new(catalog(), series, regional);
        let out = agg
            .fetch_all_data(&ids(&["migration", "housing"]), Year(2020))
            .await;
        assert!(out.error.is_none());
        assert_eq!(out.data.len(), 1);
        assert!(out.data.contains_key(&LayerId::from("housing")));
    }

    #[tokio::test]
    async fn layer_without_values_is_omitted() {
        let series = Arc::new(FakeSeries::default());
        let regional = Arc::new(FakeRegional::default());
        let agg = Aggregator::new(catalog(), series, regional);
        let out = agg.fetch_all_data(&ids(&["disease"]), Year(2020)).await;
        assert!(out.data.is_empty());
        assert!(out.error.is_none());
    }

    #[tokio::test]
    async fn regional_failure_degrades_to_none() {
        let regional = Arc::new(FakeRegional {
            values: HashMap::from([("region/census/48".to_string(), 10.0)]),
            failing: vec!["region/census/06".to_string()],
            ..Default::default()
        });
        let agg = Aggregator::new(catalog(), Arc::new(FakeSeries::default()), regional);
        let out = agg.fetch_all_data(&ids(&["housing"]), Year(2020)).await;
        assert!(out.error.is_none());
        let housing = &out.data[&LayerId::from("housing")];
        assert_eq!(housing[0].current_value, None);
        assert_eq!(housing[0].normalized_value, 0.0);
        assert_eq!(housing[1].normalized_value, 0.5);
    }

    #[tokio::test]
    async fn malformed_series_keeps_partial_data() {
        let mut series = FakeSeries::default()
            .with("country/A", &[(2020, 1.0)])
            .with("country/B", &[(2020, 2.0)]);
        series.malformed = Some("country/D".to_string());
        let series = Arc::new(series);
        let (_, regional) = scenario();
        let agg = Aggregator::new(catalog(), series.clone(), regional);

        let out = agg
            .fetch_all_data(&ids(&["disease", "economy", "housing"]), Year(2020))
            .await;
        let err = out.error.expect("aggregation error");
        assert!(err.contains("malformed"), "{err}");
        assert_eq!(out.data.len(), 1);
        assert!(out.data.contains_key(&LayerId::from("disease")));
        // disease: 3 sources, economy: stopped at its second source.
        assert_eq!(series.calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_source_times_out_to_none() {
        let series = Arc::new(FakeSeries {
            hang: true,
            ..Default::default()
        });
        let (_, regional) = scenario();
        let agg = Aggregator::new(catalog(), series, regional)
            .with_source_timeout(Duration::from_millis(100));
        let out = agg
            .fetch_all_data(&ids(&["disease", "housing"]), Year(2020))
            .await;
        assert!(out.error.is_none());
        assert!(!out.data.contains_key(&LayerId::from("disease")));
        assert!(out.data.contains_key(&LayerId::from("housing")));
    }

    #[tokio::test]
    async fn outcome_serializes_camel_case() {
        let (series, regional) = scenario();
        let agg = Aggregator::new(catalog(), series, regional);
        let out = agg.fetch_all_data(&ids(&["housing"]), Year(2020)).await;
        let json = serde_json::to_value(&out).unwrap();
        assert_eq!(json["data"]["housing"][0]["normalizedValue"], 0.5);
        assert_eq!(json["data"]["housing"][0]["currentValue"], 50.0);
        assert!(json["error"].is_null());
    }
}
