use std::sync::Arc;

/// Folds an ordered list of strategies into one: the `empty` sentinel for no
/// items, the item itself for exactly one, a composite otherwise.
pub fn optimal_composite<T: ?Sized>(
    mut items: Vec<Arc<T>>,
    empty: impl FnOnce() -> Arc<T>,
    many: impl FnOnce(Vec<Arc<T>>) -> Arc<T>,
) -> Arc<T> {
    match items.len() {
        0 => empty(),
        1 => items.swap_remove(0),
        _ => many(items),
    }
}

/// First `Some` produced by `f` over `items`, in order.
pub fn first_match<I, T, R>(items: I, mut f: impl FnMut(T) -> Option<R>) -> Option<R>
where
    I: IntoIterator<Item = T>,
{
    items.into_iter().find_map(|item| f(item))
}
