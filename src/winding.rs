//! `WindingMap`: an additive monoid from path identity to signed winding
//! number (§3).

use smallvec::SmallVec;

/// Identifies a source `RenderPath` by its index in the input slice passed to
/// CAG. Stable for the lifetime of one `rasterize()`/`PolygonalBoolean` call.
pub type PathId = u32;

/// A sparse finite map from `PathId` to a signed winding number. Backed by a
/// small sorted vector rather than a hash map: in practice a face's winding
/// map only has nonzero entries for the handful of paths whose bounds cover
/// it, so linear merge-on-insert beats hashing for the sizes CAG produces.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindingMap {
    entries: SmallVec<[(PathId, i32); 4]>,
}

impl WindingMap {
    pub fn empty() -> WindingMap {
        WindingMap::default()
    }

    pub fn get(&self, path: PathId) -> i32 {
        self.entries
            .iter()
            .find(|(p, _)| *p == path)
            .map(|(_, w)| *w)
            .unwrap_or(0)
    }

    /// Add `delta` to the winding number recorded for `path`, as happens when
    /// crossing an edge of that path during face tracing.
    pub fn add_delta(&mut self, path: PathId, delta: i32) {
        if delta == 0 {
            return;
        }
        if let Some(entry) = self.entries.iter_mut().find(|(p, _)| *p == path) {
            entry.1 += delta;
            if entry.1 == 0 {
                let idx = self
                    .entries
                    .iter()
                    .position(|(p, _)| *p == path)
                    .unwrap();
                self.entries.remove(idx);
            }
        } else {
            self.entries.push((path, delta));
        }
    }

    pub fn with_delta(&self, path: PathId, delta: i32) -> WindingMap {
        let mut next = self.clone();
        next.add_delta(path, delta);
        next
    }

    pub fn iter(&self) -> impl Iterator<Item = (PathId, i32)> + '_ {
        self.entries.iter().copied()
    }

    /// The monoid operation: sum winding numbers path-by-path.
    pub fn combine(&self, other: &WindingMap) -> WindingMap {
        let mut out = self.clone();
        for (path, w) in other.iter() {
            out.add_delta(path, w);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_is_identity_for_combine() {
        let m = WindingMap::empty().with_delta(0, 3);
        assert_eq!(m.combine(&WindingMap::empty()), m);
    }

    #[test]
    fn deltas_that_cancel_drop_the_entry() {
        let m = WindingMap::empty().with_delta(1, 2).with_delta(1, -2);
        assert_eq!(m.get(1), 0);
        assert_eq!(m.iter().count(), 0);
    }
}
