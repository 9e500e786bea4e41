//! Maximal marginal relevance re-ranking.

use crate::distance::DistanceStrategy;

/// Select up to `k` candidate indices balancing relevance to `query` against
/// redundancy with the candidates already selected.
///
/// Each round picks the candidate maximizing
/// `lambda_mult * sim(candidate, query) - (1 - lambda_mult) * max(sim(candidate, selected))`,
/// where `sim` is [`DistanceStrategy::similarity`]. The first pick is always
/// the candidate closest to the query. Ties go to the candidate that comes
/// first in `candidates`.
///
/// `lambda_mult = 1.0` yields plain top-k by relevance; `lambda_mult = 0.0`
/// ignores relevance after the first pick.
pub fn maximal_marginal_relevance(
    query: &[f32],
    candidates: &[&[f32]],
    strategy: DistanceStrategy,
    lambda_mult: f64,
    k: usize,
) -> Vec<usize> {
    let limit = k.min(candidates.len());
    if limit == 0 {
        return Vec::new();
    }

    let relevance: Vec<f64> = candidates.iter().map(|c| strategy.similarity(c, query)).collect();

    let mut first = 0;
    for (i, score) in relevance.iter().enumerate().skip(1) {
        if *score > relevance[first] {
            first = i;
        }
    }

    let mut selected = Vec::with_capacity(limit);
    let mut is_selected = vec![false; candidates.len()];
    // highest similarity of each candidate to any selected one
    let mut redundancy = vec![f64::NEG_INFINITY; candidates.len()];

    let mut pick = first;
    loop {
        selected.push(pick);
        is_selected[pick] = true;
        if selected.len() == limit {
            break;
        }
        for (i, candidate) in candidates.iter().enumerate() {
            if !is_selected[i] {
                let sim = strategy.similarity(candidate, candidates[pick]);
                if sim > redundancy[i] {
                    redundancy[i] = sim;
                }
            }
        }

        let mut best: Option<(usize, f64)> = None;
        for i in 0..candidates.len() {
            if is_selected[i] {
                continue;
            }
            let score = lambda_mult * relevance[i] - (1.0 - lambda_mult) * redundancy[i];
            match best {
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((i, score)),
            }
        }
        match best {
            Some((i, _)) => pick = i,
            None => break,
        }
    }
    selected
}
