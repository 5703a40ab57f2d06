/// Identity fraction of two aligned sequences: the count of positions where
/// both rows carry the same character, divided by the first row's length.
///
/// Shared gap columns count as matches, mirroring how naive identity is
/// scored on aligner output. An empty first row scores 0.
pub fn score_identity(a: &str, b: &str) -> f64 {
    let length = a.chars().count();
    if length == 0 {
        return 0.0;
    }
    let matches = a
        .chars()
        .zip(b.chars())
        .filter(|(left, right)| left == right)
        .count();
    matches as f64 / length as f64
}
