//! 복합 업스트림 provider.
//!
//! 여러 provider를 순서대로 시도하여 앞선 provider가 채우지 못한 심볼만
//! 다음 provider에 요청합니다. 선호 provider가 지정되면 가장 먼저 시도합니다.

use async_trait::async_trait;
use quote_core::{CoreError, CoreResult, FetchFailure, FetchRequest, FetchResponse, UpstreamFetcher};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// provider 이름.
pub const COMPOSITE_PROVIDER: &str = "composite";

/// 복합 업스트림 provider.
#[derive(Default)]
pub struct CompositeFetcher {
    providers: Vec<Arc<dyn UpstreamFetcher>>,
}

impl CompositeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider 추가.
    pub fn add_provider(&mut self, provider: Arc<dyn UpstreamFetcher>) {
        self.providers.push(provider);
    }

    /// Provider를 추가한 복합 provider를 반환합니다.
    pub fn with_provider(mut self, provider: Arc<dyn UpstreamFetcher>) -> Self {
        self.add_provider(provider);
        self
    }

    /// 등록된 provider 이름 목록.
    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// 선호 provider를 앞에 둔 시도 순서.
    fn ordered(&self, preference: Option<&str>) -> Vec<&Arc<dyn UpstreamFetcher>> {
        let mut ordered: Vec<_> = self.providers.iter().collect();
        if let Some(pref) = preference {
            if let Some(pos) = ordered
                .iter()
                .position(|p| p.name().eq_ignore_ascii_case(pref))
            {
                let preferred = ordered.remove(pos);
                ordered.insert(0, preferred);
            }
        }
        ordered
    }
}

#[async_trait]
impl UpstreamFetcher for CompositeFetcher {
    async fn fetch(&self, request: &FetchRequest) -> CoreResult<FetchResponse> {
        if self.providers.is_empty() {
            return Err(CoreError::Upstream("등록된 provider 없음".to_string()));
        }

        let mut response = FetchResponse::empty(request.symbols.len(), COMPOSITE_PROVIDER);
        let mut reasons: HashMap<usize, String> = HashMap::new();
        let mut used: Vec<&str> = Vec::new();
        let mut errors: Vec<String> = Vec::new();
        let mut any_ok = false;

        for provider in self.ordered(request.provider_preference.as_deref()) {
            let missing: Vec<usize> = (0..request.symbols.len())
                .filter(|&i| response.data[i].is_none())
                .collect();
            if missing.is_empty() {
                break;
            }

            let sub_request = FetchRequest {
                symbols: missing.iter().map(|&i| request.symbols[i].clone()).collect(),
                capability: request.capability.clone(),
                provider_preference: None,
                options: request.options.clone(),
            };

            match provider.fetch(&sub_request).await {
                Ok(sub) => {
                    any_ok = true;
                    let mut filled = 0;
                    for (pos, &index) in missing.iter().enumerate() {
                        match sub.get(pos) {
                            Some(value) => {
                                response.data[index] = Some(value.clone());
                                reasons.remove(&index);
                                filled += 1;
                            }
                            None => {
                                let reason = sub
                                    .failure_reason(&request.symbols[index])
                                    .unwrap_or("데이터 없음");
                                reasons.insert(index, format!("{}: {}", provider.name(), reason));
                            }
                        }
                    }
                    if filled > 0 {
                        used.push(provider.name());
                    }
                    debug!(provider = provider.name(), requested = missing.len(), filled, "Provider 조회 완료");
                }
                Err(e) => {
                    warn!(provider = provider.name(), error = %e, "Provider 조회 실패");
                    for &index in &missing {
                        reasons.insert(index, format!("{}: {}", provider.name(), e));
                    }
                    errors.push(format!("{}: {}", provider.name(), e));
                }
            }
        }

        if !any_ok {
            return Err(CoreError::Upstream(errors.join("; ")));
        }

        let mut failed: Vec<_> = reasons.into_iter().collect();
        failed.sort_by_key(|(index, _)| *index);
        response.failures = failed
            .into_iter()
            .map(|(index, reason)| FetchFailure {
                symbol: request.symbols[index].clone(),
                reason,
            })
            .collect();

        if !used.is_empty() {
            response.provider_used = used.join("+");
        }

        info!(
            provider_used = %response.provider_used,
            filled = response.filled(),
            failed = response.failures.len(),
            "복합 조회 완료"
        );

        Ok(response)
    }

    fn name(&self) -> &str {
        COMPOSITE_PROVIDER
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StaticFetcher {
        name: &'static str,
        known: HashSet<&'static str>,
        fail: bool,
        calls: AtomicUsize,
    }

    impl StaticFetcher {
        fn new(name: &'static str, known: &[&'static str]) -> Self {
            Self {
                name,
                known: known.iter().copied().collect(),
                fail: false,
                calls: AtomicUsize::new(0),
            }
        }

        fn failing(name: &'static str) -> Self {
            Self {
                fail: true,
                ..Self::new(name, &[])
            }
        }
    }

    #[async_trait]
    impl UpstreamFetcher for StaticFetcher {
        async fn fetch(&self, request: &FetchRequest) -> CoreResult<FetchResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(CoreError::Upstream("503".to_string()));
            }
            let mut response = FetchResponse::empty(request.symbols.len(), self.name);
            for (i, symbol) in request.symbols.iter().enumerate() {
                if self.known.contains(symbol.as_str()) {
                    response.data[i] = Some(json!({"symbol": symbol, "provider": self.name}));
                } else {
                    response.failures.push(FetchFailure {
                        symbol: symbol.clone(),
                        reason: "unknown symbol".to_string(),
                    });
                }
            }
            Ok(response)
        }

        fn name(&self) -> &str {
            self.name
        }
    }

    fn request(symbols: &[&str]) -> FetchRequest {
        FetchRequest::new(symbols.iter().map(|s| s.to_string()).collect(), "stock-quote")
    }

    fn provider_of(value: Option<&Value>) -> Option<&str> {
        value.and_then(|v| v["provider"].as_str())
    }

    #[tokio::test]
    async fn test_fills_gaps_from_next_provider() {
        let composite = CompositeFetcher::new()
            .with_provider(Arc::new(StaticFetcher::new("a", &["AAPL"])))
            .with_provider(Arc::new(StaticFetcher::new("b", &["AAPL", "MSFT"])));

        let response = composite.fetch(&request(&["AAPL", "MSFT", "XXXX"])).await.unwrap();

        assert_eq!(provider_of(response.get(0)), Some("a"));
        assert_eq!(provider_of(response.get(1)), Some("b"));
        assert!(response.get(2).is_none());
        assert_eq!(response.provider_used, "a+b");
        assert_eq!(response.failures.len(), 1);
        assert!(response.failure_reason("XXXX").unwrap().starts_with("b:"));
    }

    #[tokio::test]
    async fn test_preferred_provider_first() {
        let a = Arc::new(StaticFetcher::new("a", &["AAPL"]));
        let b = Arc::new(StaticFetcher::new("b", &["AAPL"]));
        let composite = CompositeFetcher::new()
            .with_provider(a.clone())
            .with_provider(b.clone());

        let response = composite
            .fetch(&request(&["AAPL"]).with_provider(Some("B".to_string())))
            .await
            .unwrap();

        assert_eq!(provider_of(response.get(0)), Some("b"));
        assert_eq!(a.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failing_provider_is_skipped() {
        let composite = CompositeFetcher::new()
            .with_provider(Arc::new(StaticFetcher::failing("down")))
            .with_provider(Arc::new(StaticFetcher::new("b", &["AAPL"])));

        let response = composite.fetch(&request(&["AAPL"])).await.unwrap();
        assert_eq!(response.filled(), 1);
        assert_eq!(response.provider_used, "b");
    }

    #[tokio::test]
    async fn test_all_providers_failing_is_error() {
        let composite = CompositeFetcher::new()
            .with_provider(Arc::new(StaticFetcher::failing("x")))
            .with_provider(Arc::new(StaticFetcher::failing("y")));

        let err = composite.fetch(&request(&["AAPL"])).await.unwrap_err();
        assert!(matches!(err, CoreError::Upstream(_)));
        assert!(CompositeFetcher::new().fetch(&request(&["AAPL"])).await.is_err());
    }
}
