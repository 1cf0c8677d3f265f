//! In-place reordering helpers for ordered sequences.
//!
//! Each helper locates the first element matching `pred` and moves it.
//! A missing element, or one already at the target edge, leaves the
//! sequence untouched.

/// Swap the matching element with its successor.
pub fn move_forward<T>(items: &mut [T], pred: impl Fn(&T) -> bool) {
    if let Some(idx) = items.iter().position(pred)
        && idx + 1 < items.len()
    {
        items.swap(idx, idx + 1);
    }
}

/// Swap the matching element with its predecessor.
pub fn move_backward<T>(items: &mut [T], pred: impl Fn(&T) -> bool) {
    if let Some(idx) = items.iter().position(pred)
        && idx > 0
    {
        items.swap(idx, idx - 1);
    }
}

/// Move the matching element to index 0, shifting the others back by one.
pub fn move_to_front<T>(items: &mut Vec<T>, pred: impl Fn(&T) -> bool) {
    if let Some(idx) = items.iter().position(pred)
        && idx > 0
    {
        let item = items.remove(idx);
        items.insert(0, item);
    }
}

/// Move the matching element to the last index.
pub fn move_to_back<T>(items: &mut Vec<T>, pred: impl Fn(&T) -> bool) {
    if let Some(idx) = items.iter().position(pred)
        && idx + 1 < items.len()
    {
        let item = items.remove(idx);
        items.push(item);
    }
}
