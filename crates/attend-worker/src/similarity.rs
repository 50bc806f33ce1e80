//! Ratcliff/Obershelp string similarity.
//!
//! `ratio = 2 * M / T` where `M` counts characters in the matching blocks
//! found by repeatedly taking the longest common substring and recursing on
//! both sides of it, and `T` is the combined length of both strings.

/// Similarity of `a` and `b` in `[0, 1]`. Two empty strings score 1.
pub fn ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matched(&a, &b, 0, a.len(), 0, b.len()) as f64 / total as f64
}

fn matched(a: &[char], b: &[char], alo: usize, ahi: usize, blo: usize, bhi: usize) -> usize {
    let (i, j, k) = longest_match(a, b, alo, ahi, blo, bhi);
    if k == 0 {
        return 0;
    }
    k + matched(a, b, alo, i, blo, j) + matched(a, b, i + k, ahi, j + k, bhi)
}

/// Longest common run in `a[alo..ahi]` and `b[blo..bhi]` as `(i, j, len)`.
///
/// Ties go to the run starting earliest in `a`, then earliest in `b`.
fn longest_match(
    a: &[char],
    b: &[char],
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let mut best = (alo, blo, 0);
    if alo >= ahi || blo >= bhi {
        return best;
    }
    let width = bhi - blo + 1;
    let mut prev = vec![0usize; width];
    for i in alo..ahi {
        let mut cur = vec![0usize; width];
        for j in blo..bhi {
            if a[i] == b[j] {
                let k = prev[j - blo] + 1;
                cur[j - blo + 1] = k;
                if k > best.2 {
                    best = (i + 1 - k, j + 1 - k, k);
                }
            }
        }
        prev = cur;
    }
    best
}
