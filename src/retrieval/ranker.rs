//! Deduplicator / Ranker
//!
//! 같은 청크 ID가 여러 검색 경로에서 나오면 최고 점수 하나만 남기고,
//! 점수 내림차순으로 정렬한 뒤 상한까지 자릅니다.

use std::cmp::Ordering;
use std::collections::HashMap;

use super::scorer::ScoredChunk;

/// 중복 제거 + 정렬 + 상한
///
/// - 동점 중복은 먼저 나온 쪽 유지
/// - 동점 정렬은 청크 ID 오름차순 (전순서)
/// - `cap == 0`이면 빈 결과
pub fn rank(scored: Vec<ScoredChunk>, cap: usize) -> Vec<ScoredChunk> {
    if cap == 0 {
        return Vec::new();
    }

    let mut best: Vec<ScoredChunk> = Vec::with_capacity(scored.len());
    let mut positions: HashMap<String, usize> = HashMap::new();

    for candidate in scored {
        match positions.get(&candidate.chunk.id) {
            Some(&pos) => {
                if candidate.score > best[pos].score {
                    best[pos] = candidate;
                }
            }
            None => {
                positions.insert(candidate.chunk.id.clone(), best.len());
                best.push(candidate);
            }
        }
    }

    best.sort_by(compare_desc);
    best.truncate(cap);
    best
}

/// 점수 내림차순, 동점이면 ID 오름차순
fn compare_desc(a: &ScoredChunk, b: &ScoredChunk) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.chunk.id.cmp(&b.chunk.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::Chunk;
    use crate::retrieval::scorer::ScoreBreakdown;
    use proptest::prelude::*;

    fn scored(id: &str, score: f32) -> ScoredChunk {
        ScoredChunk {
            chunk: Chunk::new(id, "doc", format!("content of {id}")),
            score,
            breakdown: ScoreBreakdown::default(),
        }
    }

    fn ids(ranked: &[ScoredChunk]) -> Vec<&str> {
        ranked.iter().map(|s| s.chunk.id.as_str()).collect()
    }

    #[test]
    fn test_duplicate_keeps_max_score() {
        let ranked = rank(vec![scored("a", 0.3), scored("a", 0.7)], 10);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].score, 0.7);

        let ranked = rank(vec![scored("a", 0.7), scored("a", 0.3)], 10);
        assert_eq!(ranked[0].score, 0.7);
    }

    #[test]
    fn test_sorted_non_increasing() {
        let ranked = rank(
            vec![
                scored("a", 0.1),
                scored("b", 0.9),
                scored("c", 0.5),
                scored("b", 0.2),
                scored("d", 0.5),
            ],
            10,
        );
        assert_eq!(ids(&ranked), vec!["b", "c", "d", "a"]);
        assert!(ranked.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn test_no_duplicate_ids_in_output() {
        let input: Vec<ScoredChunk> = (0..20)
            .map(|i| scored(&format!("c{}", i % 5), i as f32 / 20.0))
            .collect();
        let ranked = rank(input, 100);
        assert_eq!(ranked.len(), 5);

        let mut seen: Vec<&str> = ids(&ranked);
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 5);
        // c4는 i=19에서 최대 0.95
        assert_eq!(ranked[0].chunk.id, "c4");
        assert!((ranked[0].score - 0.95).abs() < 1e-6);
    }

    #[test]
    fn test_cap() {
        let input = vec![scored("a", 0.1), scored("b", 0.2), scored("c", 0.3)];
        assert!(rank(input.clone(), 0).is_empty());
        assert_eq!(ids(&rank(input.clone(), 2)), vec!["c", "b"]);
        assert_eq!(rank(input, 99).len(), 3);
    }

    #[test]
    fn test_equal_duplicate_keeps_first_seen() {
        let mut first = scored("a", 0.5);
        first.chunk.content = "first".to_string();
        let mut second = scored("a", 0.5);
        second.chunk.content = "second".to_string();

        let ranked = rank(vec![first, second], 10);
        assert_eq!(ranked[0].chunk.content, "first");
    }

    fn scored_inputs() -> impl Strategy<Value = Vec<(String, f32)>> {
        prop::collection::vec(("[a-f]", 0.0f32..=1.0), 0..40)
    }

    proptest! {
        #[test]
        fn prop_output_is_deduplicated_with_max_scores(
            input in scored_inputs(),
            cap in 0usize..10,
        ) {
            let ranked = rank(
                input.iter().map(|(id, score)| scored(id, *score)).collect(),
                cap,
            );

            let mut distinct: Vec<&str> = input.iter().map(|(id, _)| id.as_str()).collect();
            distinct.sort();
            distinct.dedup();
            prop_assert_eq!(ranked.len(), cap.min(distinct.len()));

            let mut out_ids = ids(&ranked);
            out_ids.sort();
            out_ids.dedup();
            prop_assert_eq!(out_ids.len(), ranked.len());

            for entry in &ranked {
                let best = input
                    .iter()
                    .filter(|(id, _)| *id == entry.chunk.id)
                    .map(|(_, score)| *score)
                    .fold(f32::MIN, f32::max);
                prop_assert_eq!(entry.score, best);
            }
        }

        #[test]
        fn prop_output_is_non_increasing(input in scored_inputs(), cap in 0usize..50) {
            let ranked = rank(
                input.iter().map(|(id, score)| scored(id, *score)).collect(),
                cap,
            );
            prop_assert!(ranked.windows(2).all(|w| w[0].score >= w[1].score));
        }
    }
}
