//! 워커별 카운터 샤드와 병합 스냅샷
//!
//! 각 워커는 자신만의 [`CounterShard`]를 소유하며 그 워커만 값을 증가시킵니다.
//! 읽기 경로는 샤드를 하나씩 짧게 잠가 [`Snapshot`]에 더하므로
//! 워커가 병합 때문에 기다리는 시간은 샤드 하나를 복사하는 시간으로 제한됩니다.

use std::collections::BTreeMap;
use std::collections::HashMap;

/// 레이블 값 → 발생 횟수
///
/// 카운트는 포화 연산으로 증가하며 감소하지 않습니다.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelValueCounts {
    counts: HashMap<String, u64>,
}

impl LabelValueCounts {
    /// 값의 카운트를 1 증가시킵니다. 처음 보는 값은 0에서 시작합니다.
    pub fn increment(&mut self, value: &str) {
        match self.counts.get_mut(value) {
            Some(count) => *count = count.saturating_add(1),
            None => {
                self.counts.insert(value.to_owned(), 1);
            }
        }
    }

    /// 값의 현재 카운트 (없으면 0)
    pub fn get(&self, value: &str) -> u64 {
        self.counts.get(value).copied().unwrap_or(0)
    }

    /// 서로 다른 값의 수
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// 관측된 값이 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// (값, 카운트) 반복자
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counts.iter().map(|(value, count)| (value.as_str(), *count))
    }
}

/// 워커 하나가 소유하는 카운터 샤드
///
/// 레이블 이름 → [`LabelValueCounts`]. 생성 시 설정된 모든 레이블이
/// 빈 카운트로 미리 들어가 있어 관측이 없어도 레이블이 존재합니다.
#[derive(Debug, Clone, Default)]
pub struct CounterShard {
    labels: HashMap<String, LabelValueCounts>,
}

impl CounterShard {
    /// 주어진 레이블 이름으로 미리 채운 샤드를 생성합니다.
    pub fn new<I, S>(label_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels = label_names
            .into_iter()
            .map(|name| (name.into(), LabelValueCounts::default()))
            .collect();
        Self { labels }
    }

    /// 레이블 값의 카운트를 1 증가시킵니다.
    ///
    /// 설정되지 않은 레이블은 무시하고 `false`를 반환합니다.
    pub fn increment(&mut self, label: &str, value: &str) -> bool {
        match self.labels.get_mut(label) {
            Some(counts) => {
                counts.increment(value);
                true
            }
            None => false,
        }
    }

    /// 레이블 값의 현재 카운트
    pub fn get(&self, label: &str, value: &str) -> u64 {
        self.labels.get(label).map_or(0, |counts| counts.get(value))
    }

    /// 추적 중인 레이블 이름 반복자
    pub fn label_names(&self) -> impl Iterator<Item = &str> {
        self.labels.keys().map(String::as_str)
    }
}

/// 한 파이프라인의 모든 샤드를 합친 불변 스냅샷
///
/// [`SnapshotBuilder`]로만 만들어지며 생성 후에는 변경되지 않습니다.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    labels: BTreeMap<String, BTreeMap<String, u64>>,
}

impl Snapshot {
    /// (레이블, 값)의 카운트 (없으면 0)
    pub fn get(&self, label: &str, value: &str) -> u64 {
        self.labels
            .get(label)
            .and_then(|values| values.get(value))
            .copied()
            .unwrap_or(0)
    }

    /// 레이블 이름 반복자 (정렬됨)
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.labels.keys().map(String::as_str)
    }

    /// 레이블의 (값, 카운트) 목록 (값 기준 정렬)
    pub fn values(&self, label: &str) -> Option<&BTreeMap<String, u64>> {
        self.labels.get(label)
    }

    /// 레이블의 모든 값 카운트 합
    pub fn total(&self, label: &str) -> u64 {
        self.labels.get(label).map_or(0, |values| {
            values.values().fold(0u64, |acc, n| acc.saturating_add(*n))
        })
    }

    /// (레이블, 값, 카운트) 반복자
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, u64)> {
        self.labels.iter().flat_map(|(label, values)| {
            values
                .iter()
                .map(move |(value, count)| (label.as_str(), value.as_str(), *count))
        })
    }

    /// 추적 중인 레이블이 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// 샤드를 하나씩 더해 [`Snapshot`]을 만드는 빌더
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    labels: BTreeMap<String, BTreeMap<String, u64>>,
}

impl SnapshotBuilder {
    /// 빈 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 샤드의 현재 값을 더합니다.
    pub fn add_shard(&mut self, shard: &CounterShard) {
        for (label, counts) in &shard.labels {
            let merged = self.labels.entry(label.clone()).or_default();
            for (value, count) in counts.iter() {
                let slot = merged.entry(value.to_owned()).or_insert(0);
                *slot = slot.saturating_add(count);
            }
        }
    }

    /// 스냅샷을 완성합니다.
    pub fn build(self) -> Snapshot {
        Snapshot {
            labels: self.labels,
        }
    }
}
