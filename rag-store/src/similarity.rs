use crate::config::DistanceKind;

/// Similarity between two equal-length vectors, higher = closer.
///
/// Cosine of a zero vector is 0.
pub fn score(kind: DistanceKind, a: &[f32], b: &[f32]) -> f32 {
    match kind {
        DistanceKind::Cosine => cosine(a, b),
        DistanceKind::Dot => dot(a, b),
        DistanceKind::Euclid => euclid_to_score(euclid(a, b)),
    }
}

/// Qdrant reports euclidean results as raw distances; convert them so every
/// metric ranks the same way.
pub fn from_backend(kind: DistanceKind, raw: f32) -> f32 {
    match kind {
        DistanceKind::Euclid => euclid_to_score(raw),
        _ => raw,
    }
}

fn euclid_to_score(d: f32) -> f32 {
    1.0 / (1.0 + d)
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let na = dot(a, a).sqrt();
    let nb = dot(b, b).sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot(a, b) / (na * nb)
    }
}

fn euclid(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}
