use super::tile::PtTile;
use crate::types::Pt3f;
use log::{debug, warn};
use std::collections::HashMap;
use std::path::Path;

/// Spatial grid of point tiles with bounded residency.
///
/// Tiles are entered with [`add_tile`](PtTileSet::add_tile), then
/// [`create`](PtTileSet::create) arranges them on the grid. With a zero
/// buffer size all payloads are loaded up front; otherwise tiles become
/// resident on demand and the least-recently-used ones are evicted to
/// keep resident bytes under the budget.
pub struct PtTileSet {
    tiles: Vec<PtTile>,
    grid: Vec<Option<usize>>,
    cot: usize,
    rot: usize,
    xref: i64,
    yref: i64,
    buffer_size: usize,
    resident_bytes: usize,
    stamp: u64,
    stamps: HashMap<usize, u64>,
    cursor: usize,
}

impl PtTileSet {
    /// Creates an empty set; `buffer_size` is the resident byte budget
    /// (0 keeps every tile resident).
    pub fn new(buffer_size: usize) -> Self {
        Self {
            tiles: Vec::new(),
            grid: Vec::new(),
            cot: 0,
            rot: 0,
            xref: 0,
            yref: 0,
            buffer_size,
            resident_bytes: 0,
            stamp: 0,
            stamps: HashMap::new(),
            cursor: 0,
        }
    }

    /// Registers a tile file; the header is read at once, the payload only
    /// when `with_points` is set.
    pub fn add_tile(&mut self, path: &Path, with_points: bool) -> Result<(), String> {
        let mut tile = PtTile::load_header(path)?;
        if let Some(first) = self.tiles.first() {
            if tile.cell_cols() != first.cell_cols()
                || tile.cell_rows() != first.cell_rows()
                || tile.cell_size_mm() != first.cell_size_mm()
            {
                return Err(format!("{}: inconsistent tile layout", path.display()));
            }
        }
        if with_points {
            tile.load_points()?;
        }
        self.tiles.push(tile);
        Ok(())
    }

    /// Arranges registered tiles on the grid from their reference corners.
    pub fn create(&mut self) -> Result<(), String> {
        if self.tiles.is_empty() {
            return Err("Empty tile set".to_string());
        }
        self.xref = self.tiles.iter().map(|t| t.xref()).min().unwrap();
        self.yref = self.tiles.iter().map(|t| t.yref()).min().unwrap();
        let tw = self.tile_width_mm();
        let th = self.tile_height_mm();
        let mut imax = 0usize;
        let mut jmax = 0usize;
        let mut layout = Vec::with_capacity(self.tiles.len());
        for tile in &self.tiles {
            let dx = tile.xref() - self.xref;
            let dy = tile.yref() - self.yref;
            if dx % tw != 0 || dy % th != 0 {
                return Err("Tile set spatial aperiodicity".to_string());
            }
            let i = (dx / tw) as usize;
            let j = (dy / th) as usize;
            imax = imax.max(i);
            jmax = jmax.max(j);
            layout.push((i, j));
        }
        self.cot = imax + 1;
        self.rot = jmax + 1;
        self.grid = vec![None; self.cot * self.rot];
        for (n, (i, j)) in layout.into_iter().enumerate() {
            let k = j * self.cot + i;
            if self.grid[k].is_some() {
                return Err("Two tiles share one grid position".to_string());
            }
            self.grid[k] = Some(n);
        }
        self.resident_bytes = self
            .tiles
            .iter()
            .filter(|t| t.is_loaded())
            .map(|t| t.point_bytes())
            .sum();
        Ok(())
    }

    /// Loads every payload (unbuffered mode).
    pub fn load_points(&mut self) -> Result<(), String> {
        for tile in self.tiles.iter_mut() {
            if !tile.is_loaded() {
                tile.load_points()?;
            }
        }
        self.resident_bytes = self.tiles.iter().map(|t| t.point_bytes()).sum();
        Ok(())
    }

    /// Resets the buffered iteration state.
    pub fn create_buffers(&mut self) {
        self.cursor = 0;
        self.stamps.clear();
    }

    /// Advances the boustrophedon tile iteration, making the returned tile
    /// and as much of its 3x3 neighbourhood as the budget allows resident.
    /// Returns `None` past the last tile (and rewinds).
    pub fn next_tile(&mut self) -> Option<usize> {
        while self.cursor < self.cot * self.rot {
            let n = self.cursor;
            self.cursor += 1;
            let j = n / self.cot;
            let i = n % self.cot;
            let k = j * self.cot + if j % 2 != 0 { self.cot - 1 - i } else { i };
            if self.grid[k].is_none() {
                continue;
            }
            self.make_resident(k, true, k);
            let (ti, tj) = ((k % self.cot) as i32, (k / self.cot) as i32);
            for dj in -1..=1 {
                for di in -1..=1 {
                    if di == 0 && dj == 0 {
                        continue;
                    }
                    let (ni, nj) = (ti + di, tj + dj);
                    if ni < 0 || nj < 0 || ni >= self.cot as i32 || nj >= self.rot as i32 {
                        continue;
                    }
                    self.make_resident(nj as usize * self.cot + ni as usize, false, k);
                }
            }
            return Some(k);
        }
        self.cursor = 0;
        None
    }

    /// Whether the tile at grid index `k` is currently resident.
    pub fn is_loaded(&self, k: usize) -> bool {
        match self.grid.get(k) {
            Some(Some(n)) => self.tiles[*n].is_loaded(),
            _ => false,
        }
    }

    /// Whether a tile exists at grid index `k`.
    pub fn has_tile(&self, k: usize) -> bool {
        matches!(self.grid.get(k), Some(Some(_)))
    }

    /// Appends the points of the fine grid cell `(cx, cy)` (tile set
    /// coordinates, y up) as metric points relative to the set origin.
    /// Returns whether the containing tile is resident; out-of-grid cells
    /// report not resident.
    pub fn collect_points(&mut self, out: &mut Vec<Pt3f>, cx: i32, cy: i32) -> bool {
        let (ccols, crows) = match self.tiles.first() {
            Some(t) => (t.cell_cols(), t.cell_rows()),
            None => return false,
        };
        if cx < 0 || cy < 0 {
            return false;
        }
        let (ti, tj) = ((cx / ccols) as usize, (cy / crows) as usize);
        if ti >= self.cot || tj >= self.rot {
            return false;
        }
        let k = tj * self.cot + ti;
        let n = match self.grid[k] {
            Some(n) => n,
            None => return false,
        };
        if !self.tiles[n].is_loaded() {
            return false;
        }
        self.stamp += 1;
        self.stamps.insert(k, self.stamp);
        let tile = &self.tiles[n];
        let ox = (tile.xref() - self.xref) as f32 * 0.001;
        let oy = (tile.yref() - self.yref) as f32 * 0.001;
        for p in tile.cell_points(cx % ccols, cy % crows) {
            out.push(Pt3f::new(
                ox + p.x as f32 * 0.001,
                oy + p.y as f32 * 0.001,
                p.z as f32 * 0.001,
            ));
        }
        true
    }

    /// Loads a tile under the byte budget; `anchor` (the tile whose
    /// neighbourhood is being prepared) is never evicted to make room.
    fn make_resident(&mut self, k: usize, mandatory: bool, anchor: usize) {
        let n = match self.grid[k] {
            Some(n) => n,
            None => return,
        };
        self.stamp += 1;
        if self.tiles[n].is_loaded() {
            self.stamps.insert(k, self.stamp);
            return;
        }
        let need = self.tiles[n].point_bytes();
        if self.buffer_size != 0 {
            while self.resident_bytes + need > self.buffer_size {
                if !self.evict_one(k, anchor) {
                    break;
                }
            }
            if !mandatory && self.resident_bytes + need > self.buffer_size {
                return;
            }
        }
        match self.tiles[n].load_points() {
            Ok(()) => {
                self.resident_bytes += need;
                self.stamps.insert(k, self.stamp);
                debug!(
                    "tile {} resident ({} bytes, {} total)",
                    k, need, self.resident_bytes
                );
            }
            Err(e) => warn!("tile {k} load failed: {e}"),
        }
    }

    /// Evicts the least-recently-used resident tile other than `keep`
    /// and `anchor`. Returns whether a tile was released.
    fn evict_one(&mut self, keep: usize, anchor: usize) -> bool {
        let mut victim: Option<(usize, u64)> = None;
        for (k, slot) in self.grid.iter().enumerate() {
            if k == keep || k == anchor {
                continue;
            }
            if let Some(n) = slot {
                if self.tiles[*n].is_loaded() {
                    let st = self.stamps.get(&k).copied().unwrap_or(0);
                    if victim.map_or(true, |(_, vs)| st < vs) {
                        victim = Some((k, st));
                    }
                }
            }
        }
        match victim {
            Some((k, _)) => {
                let n = self.grid[k].unwrap();
                self.resident_bytes -= self.tiles[n].point_bytes();
                self.tiles[n].release_points();
                self.stamps.remove(&k);
                debug!("tile {k} evicted ({} bytes resident)", self.resident_bytes);
                true
            }
            None => false,
        }
    }

    /// Total point count over all tiles.
    pub fn size(&self) -> usize {
        self.tiles.iter().map(|t| t.count() as usize).sum()
    }

    /// Current resident payload bytes.
    pub fn resident_bytes(&self) -> usize {
        self.resident_bytes
    }

    #[inline]
    pub fn columns_of_tiles(&self) -> usize {
        self.cot
    }

    #[inline]
    pub fn rows_of_tiles(&self) -> usize {
        self.rot
    }

    /// Leftmost coordinate of the set (millimetres).
    #[inline]
    pub fn xref(&self) -> i64 {
        self.xref
    }

    /// Lower coordinate of the set (millimetres).
    #[inline]
    pub fn yref(&self) -> i64 {
        self.yref
    }

    /// Fine cells per tile along X.
    pub fn cells_per_tile(&self) -> i32 {
        self.tiles[0].cell_cols()
    }

    fn tile_width_mm(&self) -> i64 {
        let t = &self.tiles[0];
        (t.cell_cols() as f64 * t.cell_size_mm() as f64).round() as i64
    }

    fn tile_height_mm(&self) -> i64 {
        let t = &self.tiles[0];
        (t.cell_rows() as f64 * t.cell_size_mm() as f64).round() as i64
    }

    /// East-west spread of the set in metres.
    pub fn xm_spread(&self) -> f32 {
        (self.cot as i64 * self.tile_width_mm()) as f32 * 0.001
    }
}
