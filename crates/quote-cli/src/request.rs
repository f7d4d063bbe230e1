//! 명령행 인자에서 조회 요청 생성.

use clap::Args;
use quote_core::{Market, QueryRequest};

/// 조회 인자.
#[derive(Debug, Clone, Args)]
pub struct QueryArgs {
    /// 조회할 심볼 (쉼표로 구분, 예: "AAPL,700.HK,600519")
    #[arg(long, value_delimiter = ',', required = true)]
    pub symbols: Vec<String>,

    /// 조회 유형 (get-stock-quote, get-stock-basic-info, get-index-quote)
    #[arg(long, default_value = "get-stock-quote")]
    pub query_type: String,

    /// 선호 provider
    #[arg(long)]
    pub provider: Option<String>,

    /// 모든 심볼에 적용할 시장 (US, HK, SZ, SH)
    #[arg(long)]
    pub market: Option<Market>,

    /// 캐시를 사용하지 않음
    #[arg(long)]
    pub no_cache: bool,

    /// 캐시 최대 허용 나이 (초)
    #[arg(long)]
    pub max_age: Option<u64>,

    #[arg(long)]
    pub page: Option<usize>,

    #[arg(long)]
    pub limit: Option<usize>,
}

impl QueryArgs {
    /// 조회 요청으로 변환합니다.
    pub fn to_request(&self) -> QueryRequest {
        let symbols = self.symbols.iter().map(|s| Some(s.clone())).collect();
        let mut request = QueryRequest::from_raw(symbols, self.query_type.as_str());

        request.provider = self.provider.clone();
        request.market = self.market;
        request.options.use_cache = !self.no_cache;
        request.options.max_age_seconds = self.max_age;
        request.page = self.page;
        request.limit = self.limit;
        request
    }
}
