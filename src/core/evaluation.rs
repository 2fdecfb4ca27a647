// src/core/evaluation.rs - Reconstruction quality scoring
//
// For test environments where the true execution was recorded (e.g. a fully
// instrumented staging run), these functions score a reconstruction against
// the ground truth. Precision is the share of reconstructed nodes that are
// right; recall is the share of real executions the reconstruction covered.

/// Align a reconstructed node sequence to the real one by walking the real
/// sequence in order: a reconstructed node is placed at the first real slot
/// it matches, later slots it missed stay empty.
pub fn match_reconstruction<'a>(
    real: &'a [String],
    reconstructed: &[String],
) -> Vec<Option<&'a str>> {
    let mut matched = Vec::with_capacity(real.len());
    let mut r_index = 0;

    for node in real {
        if r_index < reconstructed.len() && *node == reconstructed[r_index] {
            matched.push(Some(node.as_str()));
            r_index += 1;
        } else {
            matched.push(None);
        }
    }

    matched
}

fn true_positives(real: &[String], matched: &[Option<&str>]) -> usize {
    real.iter()
        .zip(matched.iter())
        .filter(|(node, m)| m.map(|m| m == node.as_str()).unwrap_or(false))
        .count()
}

/// precision = TP / number of reconstructed nodes. Empty inputs score 0.0.
pub fn evaluate_precision(real: &[String], reconstructed: &[String]) -> f64 {
    if reconstructed.is_empty() {
        return 0.0;
    }
    let matched = match_reconstruction(real, reconstructed);
    true_positives(real, &matched) as f64 / reconstructed.len() as f64
}

/// recall = TP / number of real executions. Empty inputs score 0.0.
pub fn evaluate_recall(real: &[String], reconstructed: &[String]) -> f64 {
    if real.is_empty() {
        return 0.0;
    }
    let matched = match_reconstruction(real, reconstructed);
    true_positives(real, &matched) as f64 / real.len() as f64
}
