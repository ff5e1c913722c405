//! Nearest-match scan: breadth-first search outward from a cube in Chebyshev
//! shells.
//!
//! Shell 0 is the start cube; shell k+1 holds every unvisited in-bounds cube
//! adjacent to a cube of shell k. Cubes are tested in discovery order, and
//! neighbours are discovered in `Cube::neighbours` order, so the result is
//! deterministic for an unchanged world. It is the first match by shell, not
//! the Euclidean nearest.

use std::collections::{BTreeSet, VecDeque};

use contracts::Cube;

use crate::view::WorldQuery;

pub fn nearest_match<W, P>(world: &W, origin: Cube, mut predicate: P) -> Option<Cube>
where
    W: WorldQuery + ?Sized,
    P: FnMut(Cube) -> bool,
{
    if !world.in_bounds(origin) {
        return None;
    }

    let mut visited = BTreeSet::from([origin]);
    let mut frontier = VecDeque::from([origin]);

    while let Some(cube) = frontier.pop_front() {
        if predicate(cube) {
            return Some(cube);
        }
        for neighbour in cube.neighbours() {
            if world.in_bounds(neighbour) && visited.insert(neighbour) {
                frontier.push_back(neighbour);
            }
        }
    }

    None
}
