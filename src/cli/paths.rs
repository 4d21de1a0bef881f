// Dotted path helpers for the command-line walker

use indexmap::IndexMap;

use crate::codec::types::Encoded;

/// Applies `(dotted.path, value)` assignments in order to a nested map.
///
/// Later assignments win, including over whole subtrees: `a.b=1` followed by
/// `a=null` leaves `a` null, and `a=null` followed by `a.b=1` replaces the
/// null with `{b: 1}`.
pub fn unflatten<'a, I>(assignments: I) -> Encoded
where
    I: IntoIterator<Item = &'a (String, Encoded)>,
{
    let mut root = IndexMap::new();
    for (path, value) in assignments {
        set_path(&mut root, path, value.clone());
    }
    Encoded::Map(root)
}

/// Sets one dotted path, creating intermediate maps as needed.
pub fn set_path(root: &mut IndexMap<String, Encoded>, path: &str, value: Encoded) {
    let mut segments: Vec<&str> = path.split('.').collect();
    let last = segments.pop().unwrap_or_default();

    let mut current = root;
    for segment in segments {
        let slot = current.entry(segment.to_string()).or_insert(Encoded::Null);
        if !matches!(slot, Encoded::Map(_)) {
            *slot = Encoded::Map(IndexMap::new());
        }
        let Encoded::Map(entries) = slot else {
            return;
        };
        current = entries;
    }
    current.insert(last.to_string(), value);
}
