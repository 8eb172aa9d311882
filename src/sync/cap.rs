use rand::seq::SliceRandom;

/// A cap only binds when it is smaller than what the payload offered.
pub fn is_binding(cap: Option<usize>, count: usize) -> bool {
    matches!(cap, Some(limit) if limit < count)
}

/// Keep a uniform random subset of `cap` items, without replacement.
pub fn apply_cap<T>(mut items: Vec<T>, cap: Option<usize>) -> Vec<T> {
    if let Some(limit) = cap.filter(|&l| is_binding(Some(l), items.len())) {
        items.shuffle(&mut rand::thread_rng());
        items.truncate(limit);
    }
    items
}
