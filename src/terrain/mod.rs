//! DTM ground-normal map.
//!
//! The terrain comes as per-tile normal-vector maps (NVM files). The map
//! either assembles every tile into one raster, or streams a moving pad
//! of `pad_w x pad_h` tiles in boustrophedon order, reusing the two-tile
//! overlap between successive pads so downstream gradient and segment
//! detection see seamless neighbourhoods.

mod nvm;

pub use nvm::{read_nvm_header, write_nvm, NvmHeader, NVM_SUFFIX};

use crate::types::Pt3f;
use log::{info, warn};
use std::path::{Path, PathBuf};

/// Shading derived on the fly from the normal map.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Shading {
    /// Three-light Lambert hill shading.
    Hill,
    /// Slope shading: flat is bright, steep is dark.
    Slope,
    /// Exponentially contrasted slope shading.
    ExpSlope,
}

/// Default pad side, in tiles.
pub const DEFAULT_PAD_SIZE: usize = 3;

const LIGHT_ANGLE_INCREMENT: f32 = 0.03;
const SQRT2_2: f32 = std::f32::consts::FRAC_1_SQRT_2;
const SQRT3_2: f32 = 0.866_025_4;

/// Map of ground normal vectors assembled from NVM tiles.
pub struct TerrainMap {
    twidth: usize,
    theight: usize,
    cell_size: f32,
    x_min: f64,
    y_min: f64,
    iwidth: usize,
    iheight: usize,
    nmap: Vec<Pt3f>,
    shading: Shading,
    light_angle: f32,
    light_v1: Pt3f,
    light_v2: Pt3f,
    light_v3: Pt3f,
    slopiness: i32,
    input_files: Vec<PathBuf>,
    arr_files: Vec<Option<PathBuf>>,
    pad_size: usize,
    pad_w: usize,
    pad_h: usize,
    pad_ref: Option<usize>,
    ts_cot: usize,
    ts_rot: usize,
}

impl Default for TerrainMap {
    fn default() -> Self {
        Self::new()
    }
}

impl TerrainMap {
    pub fn new() -> Self {
        let mut tm = Self {
            twidth: 0,
            theight: 0,
            cell_size: 0.0,
            x_min: 0.0,
            y_min: 0.0,
            iwidth: 0,
            iheight: 0,
            nmap: Vec::new(),
            shading: Shading::Hill,
            light_angle: 0.0,
            light_v1: Pt3f::default(),
            light_v2: Pt3f::default(),
            light_v3: Pt3f::default(),
            slopiness: 1,
            input_files: Vec::new(),
            arr_files: Vec::new(),
            pad_size: DEFAULT_PAD_SIZE,
            pad_w: DEFAULT_PAD_SIZE,
            pad_h: DEFAULT_PAD_SIZE,
            pad_ref: None,
            ts_cot: 1,
            ts_rot: 1,
        };
        tm.set_light_angle(0.0);
        tm
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.iwidth
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.iheight
    }

    #[inline]
    pub fn tile_width(&self) -> usize {
        self.twidth
    }

    #[inline]
    pub fn tile_height(&self) -> usize {
        self.theight
    }

    #[inline]
    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    #[inline]
    pub fn shading_type(&self) -> Shading {
        self.shading
    }

    pub fn set_shading_type(&mut self, sh: Shading) {
        self.shading = sh;
    }

    #[inline]
    pub fn light_angle(&self) -> f32 {
        self.light_angle
    }

    /// Turns the lighting device by `val` increments.
    pub fn inc_light_angle(&mut self, val: i32) {
        self.set_light_angle(self.light_angle + LIGHT_ANGLE_INCREMENT * val as f32);
    }

    /// Sets the lighting device angle (radians) and rebuilds the three
    /// light directions.
    pub fn set_light_angle(&mut self, val: f32) {
        let two_pi = 2.0 * std::f32::consts::PI;
        let third = two_pi / 3.0;
        self.light_angle = val.rem_euclid(two_pi);
        let mut ang = self.light_angle;
        self.light_v1 = Pt3f::new(
            -(ang.cos() * SQRT2_2),
            -(ang.sin() * SQRT2_2),
            SQRT2_2,
        );
        ang += third;
        self.light_v2 = Pt3f::new(-(ang.cos() / 2.0), -(ang.sin() / 2.0), SQRT3_2);
        ang += third;
        self.light_v3 = Pt3f::new(-(ang.cos() / 2.0), -(ang.sin() / 2.0), SQRT3_2);
    }

    #[inline]
    pub fn slopiness_factor(&self) -> i32 {
        self.slopiness
    }

    pub fn set_slopiness_factor(&mut self, val: i32) {
        self.slopiness = val.max(1);
    }

    /// Declares a new NVM file to assemble; returns whether it exists.
    pub fn add_normal_map_file(&mut self, path: &Path) -> bool {
        if !path.is_file() {
            return false;
        }
        self.input_files.push(path.to_path_buf());
        true
    }

    /// Creates the map from the declared NVM files.
    ///
    /// With `padding` the normals stay on disk and only the tile
    /// arrangement is built for [`next_pad`](TerrainMap::next_pad);
    /// otherwise the whole raster is loaded, rows top-down.
    pub fn assemble_map(
        &mut self,
        cols: usize,
        rows: usize,
        xmin_mm: i64,
        ymin_mm: i64,
        padding: bool,
    ) -> Result<(), String> {
        self.ts_cot = cols;
        self.ts_rot = rows;
        self.x_min = xmin_mm as f64 * 0.001;
        self.y_min = ymin_mm as f64 * 0.001;
        self.twidth = 0;
        self.theight = 0;
        if padding {
            self.arr_files = vec![None; cols * rows];
        }
        let files = std::mem::take(&mut self.input_files);
        for path in &files {
            let hdr = read_nvm_header(path)?;
            if self.twidth == 0 {
                self.twidth = hdr.width;
                self.theight = hdr.height;
                self.cell_size = hdr.cell_size;
                self.iwidth = cols * self.twidth;
                self.iheight = rows * self.theight;
                if !padding {
                    self.nmap = vec![Pt3f::default(); self.iwidth * self.iheight];
                }
            } else if hdr.width != self.twidth
                || hdr.height != self.theight
                || hdr.cell_size != self.cell_size
            {
                self.input_files = files.clone();
                return Err(format!("{}: inconsistent tile layout", path.display()));
            }
            let wmap = self.twidth as f64 * self.cell_size as f64;
            let hmap = self.theight as f64 * self.cell_size as f64;
            let loci = ((hdr.xmin as f64 - self.x_min + wmap / 2.0) / wmap) as usize;
            let locj = ((hdr.ymin as f64 - self.y_min + hmap / 2.0) / hmap) as usize;
            if loci >= cols || locj >= rows {
                self.input_files = files.clone();
                return Err(format!("{}: outside the tile arrangement", path.display()));
            }
            if padding {
                self.arr_files[locj * cols + loci] = Some(path.clone());
            } else {
                let normals = nvm::read_nvm_normals(path, &hdr)?;
                // NVM rows are stored bottom-up in world space; the raster
                // is row 0 = north.
                let top = self.iheight - (locj + 1) * self.theight;
                for j in 0..self.theight {
                    let dst_row = top + self.theight - 1 - j;
                    let dst = dst_row * self.iwidth + loci * self.twidth;
                    let src = j * self.twidth;
                    self.nmap[dst..dst + self.twidth]
                        .copy_from_slice(&normals[src..src + self.twidth]);
                }
            }
        }
        self.input_files = files;
        info!(
            "terrain map {}x{} cells, tile {}x{}, cell {} m",
            self.iwidth, self.iheight, self.twidth, self.theight, self.cell_size
        );
        Ok(())
    }

    /// Shaded value at raster cell `(i, j)` (row 0 = north) with the
    /// current shading type.
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> i32 {
        self.get_shaded(i, j, self.shading)
    }

    /// Shaded value at raster cell `(i, j)` with an explicit shading type.
    pub fn get_shaded(&self, i: usize, j: usize, shading: Shading) -> i32 {
        let n = self.nmap[j * self.iwidth + i];
        match shading {
            Shading::Hill => {
                let v1 = self.light_v1.dot(n).max(0.0);
                let v2 = self.light_v2.dot(n).max(0.0);
                let v3 = self.light_v3.dot(n).max(0.0);
                ((v1 + (v2 + v3) / 2.0) * 100.0) as i32
            }
            Shading::Slope => 255 - ((n.x * n.x + n.y * n.y).sqrt() * 255.0) as i32,
            Shading::ExpSlope => {
                let mut alph = (1.0 - n.x as f64 * n.x as f64 - n.y as f64 * n.y as f64).max(0.0);
                let mut sl = self.slopiness;
                while sl > 1 {
                    alph *= alph;
                    sl -= 1;
                }
                (alph * 255.0) as i32
            }
        }
    }

    /// Assigned pad side (tiles).
    #[inline]
    pub fn pad_size(&self) -> usize {
        self.pad_size
    }

    #[inline]
    pub fn pad_width(&self) -> usize {
        self.pad_w
    }

    #[inline]
    pub fn pad_height(&self) -> usize {
        self.pad_h
    }

    /// Sets the pad side; only odd values are accepted.
    pub fn set_pad_size(&mut self, val: usize) {
        if val % 2 == 1 {
            self.pad_size = val;
            self.pad_w = val;
            self.pad_h = val;
        }
    }

    /// Clamps the pad to the tile set extent.
    pub fn adjust_pad_size(&mut self) {
        self.pad_w = self.pad_w.min(self.ts_cot);
        self.pad_h = self.pad_h.min(self.ts_rot);
    }

    /// Loads the next pad of slope-shaded tiles into `map` (row-major,
    /// row 0 = north, `pad_w*twidth` columns). Returns the pad reference
    /// (bottom-left tile index) or `None` when the walk is over.
    ///
    /// Successive pads overlap by two tile rows or columns; overlapping
    /// tiles are copied from the previous pad content instead of re-read.
    pub fn next_pad(&mut self, map: &mut [u8]) -> Option<usize> {
        let step_w = self.pad_w.saturating_sub(2).max(1);
        let step_h = self.pad_h.saturating_sub(2).max(1);
        let prev = self.pad_ref;
        let next = match prev {
            None => Some(0),
            Some(r) => {
                let col = r % self.ts_cot;
                let row = r / self.ts_cot;
                let leftward = (row / step_h) % 2 == 1;
                let at_edge = if leftward {
                    col == 0
                } else {
                    col + self.pad_w >= self.ts_cot
                };
                if at_edge {
                    if row + self.pad_h >= self.ts_rot {
                        None
                    } else {
                        Some(r + self.ts_cot * step_h)
                    }
                } else if leftward {
                    Some(r - step_w)
                } else {
                    Some(r + step_w)
                }
            }
        };
        let next = match next {
            Some(n) => n,
            None => {
                self.pad_ref = None;
                return None;
            }
        };
        self.render_pad(map, prev, next);
        self.pad_ref = Some(next);
        Some(next)
    }

    /// Fills `map` with the pad anchored at tile `next`, copying tiles
    /// shared with the pad anchored at `prev` from the current content.
    fn render_pad(&mut self, map: &mut [u8], prev: Option<usize>, next: usize) {
        let tw = self.twidth;
        let th = self.theight;
        let row_len = self.pad_w * tw;
        let mut fresh = vec![0u8; row_len * self.pad_h * th];
        let (ncol, nrow) = (next % self.ts_cot, next / self.ts_cot);
        for j in 0..self.pad_h {
            for i in 0..self.pad_w {
                let (ti, tj) = (ncol + i, nrow + j);
                if ti >= self.ts_cot || tj >= self.ts_rot {
                    continue;
                }
                let copied = prev.is_some_and(|p| {
                    let (pcol, prow) = (p % self.ts_cot, p / self.ts_cot);
                    if ti >= pcol
                        && ti < pcol + self.pad_w
                        && tj >= prow
                        && tj < prow + self.pad_h
                    {
                        copy_tile_block(
                            map,
                            &mut fresh,
                            row_len,
                            th,
                            self.pad_h,
                            (ti - pcol, tj - prow),
                            (i, j),
                            tw,
                        );
                        true
                    } else {
                        false
                    }
                });
                if !copied {
                    self.load_tile_block(&mut fresh, (i, j), tj * self.ts_cot + ti);
                }
            }
        }
        map.copy_from_slice(&fresh);
    }

    /// Loads one slope-shaded tile into its pad block; missing tiles
    /// stay zero.
    fn load_tile_block(&self, pad: &mut [u8], (pi, pj): (usize, usize), k: usize) {
        let path = match self.arr_files.get(k).and_then(|p| p.as_ref()) {
            Some(p) => p.clone(),
            None => return,
        };
        let hdr = match read_nvm_header(&path) {
            Ok(h) => h,
            Err(e) => {
                warn!("{e}");
                return;
            }
        };
        if hdr.width != self.twidth || hdr.height != self.theight || hdr.cell_size != self.cell_size
        {
            warn!("{}: inconsistent tile layout", path.display());
            return;
        }
        let normals = match nvm::read_nvm_normals(&path, &hdr) {
            Ok(n) => n,
            Err(e) => {
                warn!("{e}");
                return;
            }
        };
        let row_len = self.pad_w * self.twidth;
        let top = (self.pad_h - 1 - pj) * self.theight;
        for j in 0..self.theight {
            let dst_row = top + self.theight - 1 - j;
            let dst = dst_row * row_len + pi * self.twidth;
            for i in 0..self.twidth {
                let n = normals[j * self.twidth + i];
                let val = 255 - ((n.x * n.x + n.y * n.y).sqrt() * 255.0) as i32;
                pad[dst + i] = val.clamp(0, 255) as u8;
            }
        }
    }

    /// Writes the rectangle of tiles `[imin..imax) x [jmin..jmax)` (tile
    /// coordinates, rows from south) of the assembled map as one NVM file.
    pub fn save_sub_map(
        &self,
        path: &Path,
        imin: usize,
        jmin: usize,
        imax: usize,
        jmax: usize,
    ) -> Result<(), String> {
        let nw = (imax - imin) * self.twidth;
        let nh = (jmax - jmin) * self.theight;
        let xm = (self.x_min + (imin * self.twidth) as f64 * self.cell_size as f64) as f32;
        let ym = (self.y_min + (jmin * self.theight) as f64 * self.cell_size as f64) as f32;
        let mut rows = Vec::with_capacity(nw * nh);
        // Bottom-up row order on disk.
        let top = self.iheight - jmax * self.theight;
        for j in 0..nh {
            let src_row = top + nh - 1 - j;
            let src = src_row * self.iwidth + imin * self.twidth;
            rows.extend_from_slice(&self.nmap[src..src + nw]);
        }
        write_nvm(path, nw, nh, self.cell_size, xm, ym, &rows)
    }
}

/// Copies one tile block between two pad buffers of identical geometry.
#[allow(clippy::too_many_arguments)]
fn copy_tile_block(
    src_pad: &[u8],
    dst_pad: &mut [u8],
    row_len: usize,
    th: usize,
    pad_h: usize,
    (si, sj): (usize, usize),
    (di, dj): (usize, usize),
    tw: usize,
) {
    let src_top = (pad_h - 1 - sj) * th;
    let dst_top = (pad_h - 1 - dj) * th;
    for j in 0..th {
        let s = (src_top + j) * row_len + si * tw;
        let d = (dst_top + j) * row_len + di * tw;
        dst_pad[d..d + tw].copy_from_slice(&src_pad[s..s + tw]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slope_shading_is_bright_on_flat_ground() {
        let mut tm = TerrainMap::new();
        tm.iwidth = 1;
        tm.iheight = 1;
        tm.nmap = vec![Pt3f::new(0.0, 0.0, 1.0)];
        assert_eq!(tm.get_shaded(0, 0, Shading::Slope), 255);
        assert_eq!(tm.get_shaded(0, 0, Shading::ExpSlope), 255);
    }

    #[test]
    fn slope_shading_darkens_with_tilt() {
        let mut tm = TerrainMap::new();
        tm.iwidth = 1;
        tm.iheight = 1;
        let mut n = Pt3f::new(0.6, 0.0, 0.8);
        n.normalize();
        tm.nmap = vec![n];
        let flat = 255;
        assert!(tm.get_shaded(0, 0, Shading::Slope) < flat);
        assert!(tm.get_shaded(0, 0, Shading::ExpSlope) < flat);
    }

    #[test]
    fn pad_walk_is_boustrophedon() {
        let mut tm = TerrainMap::new();
        tm.ts_cot = 5;
        tm.ts_rot = 5;
        tm.twidth = 2;
        tm.theight = 2;
        tm.cell_size = 0.5;
        tm.arr_files = vec![None; 25];
        tm.adjust_pad_size();
        let mut map = vec![0u8; tm.pad_w * tm.twidth * tm.pad_h * tm.theight];
        let mut refs = Vec::new();
        while let Some(k) = tm.next_pad(&mut map) {
            refs.push(k);
        }
        // Right along the bottom band, up, then left along the next band.
        assert_eq!(refs, vec![0, 1, 2, 7, 6, 5, 10, 11, 12]);
    }
}
