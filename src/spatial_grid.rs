use std::collections::HashMap;

use arrayvec::ArrayVec;

use crate::aabb::{cell_of, Aabb};
use crate::geometry::{Fp, Vec3f};
use crate::scene::Entity;

const CELL_NUDGE: Fp = 1e-4;

/// Uniform grid over finite entities. Planes and generic SDFs live in a
/// separate list that every lookup returns.
#[derive(Clone, Debug)]
pub struct SpatialGrid {
    cell_size: Fp,
    dilate: bool,
    cells: HashMap<u64, Vec<usize>>,
    always: Vec<usize>,
}

pub fn spatial_hash(x: i64, y: i64, z: i64) -> u64 {
    (x.wrapping_mul(73_856_093) ^ y.wrapping_mul(19_349_663) ^ z.wrapping_mul(83_492_791)) as u64
}

/// Entity indices worth evaluating at one point: the always-evaluated list
/// followed by the containing cell (or its 27-cell neighbourhood when dilated).
pub struct Candidates<'a> {
    always: &'a [usize],
    cells: ArrayVec<&'a [usize], 27>,
}

impl<'a> Candidates<'a> {
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.always
            .iter()
            .chain(self.cells.iter().flat_map(|cell| cell.iter()))
            .copied()
    }

    pub fn len(&self) -> usize {
        self.always.len() + self.cells.iter().map(|c| c.len()).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SpatialGrid {
    pub fn build(entities: &[Entity], cell_size: Fp, dilate: bool) -> SpatialGrid {
        let mut grid = SpatialGrid {
            cell_size,
            dilate,
            cells: HashMap::new(),
            always: vec![],
        };
        grid.rebuild(entities);
        grid
    }

    /// Recomputes the whole index. There is no incremental path; callers
    /// rebuild whenever any transform changes.
    pub fn rebuild(&mut self, entities: &[Entity]) {
        self.cells.clear();
        self.always.clear();
        let mut bounds = Aabb::default();
        for (index, entity) in entities.iter().enumerate() {
            match Aabb::for_geometry(&entity.geometry, &entity.transform) {
                None => self.always.push(index),
                Some(aabb) => {
                    for (x, y, z) in aabb.cells(self.cell_size) {
                        let list = self.cells.entry(spatial_hash(x, y, z)).or_default();
                        // indices arrive in ascending order, so a repeat (hash
                        // collision between two covered cells) is always last
                        if list.last() != Some(&index) {
                            list.push(index);
                        }
                    }
                    bounds = bounds.extend_aabb(&aabb);
                }
            }
        }
        log::debug!(
            "spatial grid rebuilt: {} cells, {} always-evaluated, finite bounds {:?}..{:?}",
            self.cells.len(),
            self.always.len(),
            bounds.min,
            bounds.max
        );
    }

    pub fn candidates(&self, point: &Vec3f) -> Candidates<'_> {
        let (x, y, z) = cell_of(point, self.cell_size);
        let mut cells = ArrayVec::new();
        if self.dilate {
            for dx in -1..=1 {
                for dy in -1..=1 {
                    for dz in -1..=1 {
                        if let Some(list) = self.cells.get(&spatial_hash(x + dx, y + dy, z + dz)) {
                            cells.push(list.as_slice());
                        }
                    }
                }
            }
        } else if let Some(list) = self.cells.get(&spatial_hash(x, y, z)) {
            cells.push(list.as_slice());
        }
        Candidates {
            always: &self.always,
            cells,
        }
    }

    /// Ray parameter at which a ray from `point` along `direction` leaves the
    /// cell containing `point`, nudged so the next sample lands past the face.
    pub fn exit_distance(&self, point: &Vec3f, direction: &Vec3f) -> Fp {
        let cell = cell_of(point, self.cell_size);
        let index = [cell.0, cell.1, cell.2];
        let mut exit = Fp::INFINITY;
        for axis in 0..3 {
            let d = direction[axis];
            if d > 0.0 {
                exit = exit.min(((index[axis] + 1) as Fp * self.cell_size - point[axis]) / d);
            } else if d < 0.0 {
                exit = exit.min((index[axis] as Fp * self.cell_size - point[axis]) / d);
            }
        }
        exit.max(0.0) + CELL_NUDGE
    }

    pub fn cell_size(&self) -> Fp {
        self.cell_size
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn always_evaluated(&self) -> &[usize] {
        &self.always
    }
}
