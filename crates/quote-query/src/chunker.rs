//! 시장별 분할과 크기 제한 청크.

use quote_core::{classify, Market};
use std::collections::BTreeMap;

/// 심볼을 시장별로 나눕니다.
///
/// 시장 힌트가 있으면 분류 대신 모든 심볼을 해당 시장에 넣습니다.
/// 각 시장 안에서 입력 순서를 유지합니다.
pub fn shard_by_market(symbols: &[String], hint: Option<Market>) -> BTreeMap<Market, Vec<String>> {
    let mut shards: BTreeMap<Market, Vec<String>> = BTreeMap::new();
    for symbol in symbols {
        let market = hint.unwrap_or_else(|| classify(symbol));
        shards.entry(market).or_default().push(symbol.clone());
    }
    shards
}

/// 목록을 최대 `max_size` 크기의 청크로 나눕니다.
///
/// `ceil(n / max_size)`개의 청크를 만들며 순서를 유지합니다. `max_size`가 0이면 1로 취급합니다.
pub fn chunk<T: Clone>(items: &[T], max_size: usize) -> Vec<Vec<T>> {
    items.chunks(max_size.max(1)).map(<[T]>::to_vec).collect()
}
