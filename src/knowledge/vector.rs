//! 벡터 유틸리티
//!
//! 질문 임베딩과 청크 임베딩의 코사인 유사도를 계산합니다.
//! 차원이 다르면 짧은 쪽을 0으로 채워 맞춥니다.

/// 코사인 유사도 계산
///
/// 길이가 다르면 짧은 벡터를 오른쪽으로 0 패딩한 것과 같습니다.
/// 어느 한쪽의 크기가 0이거나 성분에 NaN/무한대가 있으면 0.0을 반환합니다.
/// 누적은 f64로 해서 큰 성분에서도 제곱합이 넘치지 않습니다.
///
/// # Returns
/// 코사인 유사도 (-1.0 ~ 1.0)
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    // 패딩된 0은 내적에 기여하지 않음
    let dot_product: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(&x, &y)| f64::from(x) * f64::from(y))
        .sum();
    let norm_a = norm(a);
    let norm_b = norm(b);

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    let similarity = dot_product / (norm_a * norm_b);
    if !similarity.is_finite() {
        return 0.0;
    }

    similarity.clamp(-1.0, 1.0) as f32
}

fn norm(v: &[f32]) -> f64 {
    v.iter()
        .map(|&x| f64::from(x) * f64::from(x))
        .sum::<f64>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity_same() {
        let a = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 0.0001);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let c = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &c).abs() < 0.0001);
    }

    #[test]
    fn test_cosine_similarity_opposite() {
        let a = vec![1.0, 0.0];
        let d = vec![-1.0, 0.0];
        assert!((cosine_similarity(&a, &d) + 1.0).abs() < 0.0001);
    }

    #[test]
    fn test_cosine_similarity_pads_shorter_vector() {
        // [1, 1] vs [1, 1, 0] 과 같음
        let a = vec![1.0, 1.0];
        let b = vec![1.0, 1.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.0001);

        // [1, 0] vs [0, 0, 1] -> 직교
        let c = vec![1.0, 0.0];
        let d = vec![0.0, 0.0, 1.0];
        assert!(cosine_similarity(&c, &d).abs() < 0.0001);
    }

    #[test]
    fn test_cosine_similarity_zero_magnitude() {
        let a = vec![0.0, 0.0];
        let b = vec![1.0, 2.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
        assert_eq!(cosine_similarity(&[], &b), 0.0);
    }

    #[test]
    fn test_cosine_similarity_large_components_stay_finite() {
        let a = vec![1e20_f32, 1e20];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 0.0001);

        let b = vec![f32::MAX, -f32::MAX];
        let sim = cosine_similarity(&a, &b);
        assert!(sim.is_finite());
        assert!(sim.abs() < 0.0001);
    }

    #[test]
    fn test_cosine_similarity_non_finite_input_is_zero() {
        let a = vec![f32::NAN, 1.0];
        let b = vec![1.0, 1.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);

        let c = vec![f32::INFINITY, 0.0];
        assert_eq!(cosine_similarity(&c, &b), 0.0);
    }
}
