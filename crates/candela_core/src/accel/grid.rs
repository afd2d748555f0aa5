use std::sync::Arc;

use candela_math::{Aabb, Ray};

use super::AccelerationStructure;
use crate::isect::IntersectionState;
use crate::primitive::PrimitiveList;

const MAX_RESOLUTION: i32 = 128;

/// Uniform voxel grid traversed with a 3-D DDA.
///
/// The resolution is chosen so each voxel holds roughly one primitive,
/// clamped to 128 per axis. Primitives register in every overlapped cell;
/// traversal steps cell to cell and stops as soon as a confirmed hit lies
/// before the next cell boundary.
pub struct UniformGrid {
    nx: i32,
    ny: i32,
    nz: i32,
    primitives: Option<Arc<dyn PrimitiveList>>,
    bounds: Aabb,
    cells: Vec<Vec<u32>>,
    voxel_w: [f32; 3],
    inv_voxel_w: [f32; 3],
}

impl UniformGrid {
    pub fn new() -> Self {
        Self {
            nx: 0,
            ny: 0,
            nz: 0,
            primitives: None,
            bounds: Aabb::empty(),
            cells: Vec::new(),
            voxel_w: [0.0; 3],
            inv_voxel_w: [0.0; 3],
        }
    }

    fn cell_index(&self, x: f32, y: f32, z: f32) -> [i32; 3] {
        [
            (((x - self.bounds.x.min) * self.inv_voxel_w[0]) as i32).clamp(0, self.nx - 1),
            (((y - self.bounds.y.min) * self.inv_voxel_w[1]) as i32).clamp(0, self.ny - 1),
            (((z - self.bounds.z.min) * self.inv_voxel_w[2]) as i32).clamp(0, self.nz - 1),
        ]
    }
}

impl Default for UniformGrid {
    fn default() -> Self {
        Self::new()
    }
}

impl AccelerationStructure for UniformGrid {
    fn build(&mut self, primitives: Arc<dyn PrimitiveList>) {
        let n = primitives.num_primitives();
        self.bounds = primitives.world_bounds(None);
        self.bounds.enlarge_ulps();
        let w = self.bounds.extents();
        let s = ((w.x as f64 * w.y as f64 * w.z as f64) / n.max(1) as f64).cbrt();
        self.nx = ((w.x as f64 / s + 0.5) as i32).clamp(1, MAX_RESOLUTION);
        self.ny = ((w.y as f64 / s + 0.5) as i32).clamp(1, MAX_RESOLUTION);
        self.nz = ((w.z as f64 / s + 0.5) as i32).clamp(1, MAX_RESOLUTION);
        self.voxel_w = [w.x / self.nx as f32, w.y / self.ny as f32, w.z / self.nz as f32];
        self.inv_voxel_w = [
            1.0 / self.voxel_w[0],
            1.0 / self.voxel_w[1],
            1.0 / self.voxel_w[2],
        ];
        log::debug!("creating grid: {}x{}x{} ...", self.nx, self.ny, self.nz);
        let num_cells = (self.nx * self.ny * self.nz) as usize;
        let mut cells: Vec<Vec<u32>> = vec![Vec::new(); num_cells];
        let mut registrations = 0usize;
        for i in 0..n {
            let imin = self.cell_index(
                primitives.primitive_bound(i, 0),
                primitives.primitive_bound(i, 2),
                primitives.primitive_bound(i, 4),
            );
            let imax = self.cell_index(
                primitives.primitive_bound(i, 1),
                primitives.primitive_bound(i, 3),
                primitives.primitive_bound(i, 5),
            );
            for ix in imin[0]..=imax[0] {
                for iy in imin[1]..=imax[1] {
                    for iz in imin[2]..=imax[2] {
                        let idx = (ix + self.nx * iy + self.nx * self.ny * iz) as usize;
                        cells[idx].push(i as u32);
                        registrations += 1;
                    }
                }
            }
        }
        let used = cells.iter().filter(|c| !c.is_empty()).count();
        log::debug!("uniform grid statistics:");
        log::debug!("  * cells:           {num_cells} ({used} used)");
        log::debug!(
            "  * objects/cell:    {:.2}",
            registrations as f64 / num_cells as f64
        );
        log::debug!(
            "  * cells/object:    {:.2}",
            registrations as f64 / n.max(1) as f64
        );
        self.cells = cells;
        self.primitives = Some(primitives);
    }

    fn intersect(&self, r: &mut Ray, state: &mut IntersectionState) {
        let Some(primitives) = &self.primitives else {
            return;
        };
        if self.cells.is_empty() {
            return;
        }
        let Some((mut interval_min, interval_max)) = self.bounds.clip_ray(r) else {
            return;
        };
        // entry point inside the grid
        let org = r.point_at(interval_min).to_array();
        let dir = r.dir.to_array();
        let lo = self.bounds.min().to_array();
        let res = [self.nx, self.ny, self.nz];
        let mut index = [0i32; 3];
        let mut step = [0i32; 3];
        let mut stop = [0i32; 3];
        let mut delta = [0f32; 3];
        let mut t_next = [0f32; 3];
        for a in 0..3 {
            index[a] = (((org[a] - lo[a]) * self.inv_voxel_w[a]) as i32).clamp(0, res[a] - 1);
            if dir[a].abs() < 1e-6 {
                step[a] = 0;
                stop[a] = index[a];
                delta[a] = 0.0;
                t_next[a] = f32::INFINITY;
            } else if dir[a] > 0.0 {
                step[a] = 1;
                stop[a] = res[a];
                delta[a] = self.voxel_w[a] / dir[a];
                t_next[a] =
                    interval_min + ((index[a] + 1) as f32 * self.voxel_w[a] + lo[a] - org[a]) / dir[a];
            } else {
                step[a] = -1;
                stop[a] = -1;
                delta[a] = -self.voxel_w[a] / dir[a];
                t_next[a] = interval_min + (index[a] as f32 * self.voxel_w[a] + lo[a] - org[a]) / dir[a];
            }
        }
        let cell_step = [step[0], step[1] * self.nx, step[2] * self.ny * self.nx];
        let mut cell = index[0] + index[1] * self.nx + index[2] * self.ny * self.nx;
        // walk the grid
        loop {
            // the axis whose boundary comes up first
            let a = if t_next[0] < t_next[1] && t_next[0] < t_next[2] {
                0
            } else if t_next[1] < t_next[2] {
                1
            } else {
                2
            };
            let list = &self.cells[cell as usize];
            if !list.is_empty() {
                for &i in list {
                    primitives.intersect_primitive(r, i as usize, state);
                }
                if state.hit() && r.max() < t_next[a] && r.max() < interval_max {
                    return;
                }
            }
            interval_min = t_next[a];
            if interval_min > interval_max {
                return;
            }
            index[a] += step[a];
            if index[a] == stop[a] {
                return;
            }
            t_next[a] += delta[a];
            cell += cell_step[a];
        }
    }
}
