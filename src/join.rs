// 🔗 Inner join with loss accounting
//
// Keys present on only one side are dropped, but the number dropped on each
// side is always reported so callers can tell when data vanished.

use serde::Serialize;
use std::collections::HashMap;
use std::hash::Hash;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JoinOutcome<T> {
    pub matched: Vec<T>,
    pub unmatched_left: usize,
    pub unmatched_right: usize,
}

impl<T> JoinOutcome<T> {
    pub fn is_lossless(&self) -> bool {
        self.unmatched_left == 0 && self.unmatched_right == 0
    }
}

/// Join `left` and `right` on the keys produced by `left_key` / `right_key`.
///
/// Output follows the order of `left`. When `right` repeats a key, the last
/// occurrence wins and the earlier ones count as unmatched.
pub fn inner_join<L, R, K, T>(
    left: Vec<L>,
    right: Vec<R>,
    left_key: impl Fn(&L) -> K,
    right_key: impl Fn(&R) -> K,
    combine: impl Fn(L, R) -> T,
) -> JoinOutcome<T>
where
    K: Eq + Hash,
    R: Clone,
{
    let right_len = right.len();
    let mut index: HashMap<K, (R, bool)> = HashMap::with_capacity(right_len);
    for row in right {
        index.insert(right_key(&row), (row, false));
    }

    let mut matched = Vec::with_capacity(left.len().min(index.len()));
    let mut unmatched_left = 0;

    for row in left {
        match index.get_mut(&left_key(&row)) {
            Some((other, used)) => {
                *used = true;
                matched.push(combine(row, other.clone()));
            }
            None => unmatched_left += 1,
        }
    }

    // A right row matched by several left rows still counts once
    let used_right = index.values().filter(|(_, used)| *used).count();

    JoinOutcome {
        matched,
        unmatched_left,
        unmatched_right: right_len - used_right,
    }
}
