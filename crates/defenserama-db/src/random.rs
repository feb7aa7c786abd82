use rand::Rng;

/// Uniformly pick one item. `None` when `items` is empty.
pub fn pick_random<T, R: Rng + ?Sized>(mut items: Vec<T>, rng: &mut R) -> Option<T> {
    if items.is_empty() {
        return None;
    }
    let idx = rng.random_range(0..items.len());
    Some(items.swap_remove(idx))
}
