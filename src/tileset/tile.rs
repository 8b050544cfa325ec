use crate::types::Pt3i;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

/// Point tile file suffix.
pub const TIL_SUFFIX: &str = ".til";

/// Fine-grid subdivision of one DTM cell per axis.
pub const GRID_SUBDIVISION: i32 = 5;

/// One square tile of ground returns, packed per fine grid cell.
///
/// On disk (little-endian): `i32 cell_cols, i32 cell_rows, i64 xref_mm,
/// i64 yref_mm, f32 cell_size_mm, u32 count`, then `cell_cols*cell_rows+1`
/// cell start offsets and `count` points as three `i32` millimetre
/// coordinates relative to `(xref, yref, 0)`. Cells are row-major,
/// bottom row first.
pub struct PtTile {
    cell_cols: i32,
    cell_rows: i32,
    xref: i64,
    yref: i64,
    cell_size_mm: f32,
    count: u32,
    path: PathBuf,
    starts: Vec<u32>,
    points: Option<Vec<Pt3i>>,
}

impl PtTile {
    /// Builds an in-memory tile from per-cell point lists (row-major,
    /// bottom row first). Used by importers and test fixtures.
    pub fn from_cells(
        cell_cols: i32,
        cell_rows: i32,
        xref: i64,
        yref: i64,
        cell_size_mm: f32,
        cells: &[Vec<Pt3i>],
    ) -> Self {
        assert_eq!(cells.len(), (cell_cols * cell_rows) as usize);
        let mut starts = Vec::with_capacity(cells.len() + 1);
        let mut points = Vec::new();
        starts.push(0u32);
        for cell in cells {
            points.extend_from_slice(cell);
            starts.push(points.len() as u32);
        }
        Self {
            cell_cols,
            cell_rows,
            xref,
            yref,
            cell_size_mm,
            count: points.len() as u32,
            path: PathBuf::new(),
            starts,
            points: Some(points),
        }
    }

    /// Reads the tile header and cell index, leaving points on disk.
    pub fn load_header(path: &Path) -> Result<Self, String> {
        let file = File::open(path)
            .map_err(|e| format!("Failed to open {}: {e}", path.display()))?;
        let mut input = BufReader::new(file);
        let cell_cols = read_i32(&mut input, path)?;
        let cell_rows = read_i32(&mut input, path)?;
        if cell_cols <= 0 || cell_rows <= 0 {
            return Err(format!("{}: inconsistent header", path.display()));
        }
        let xref = read_i64(&mut input, path)?;
        let yref = read_i64(&mut input, path)?;
        let cell_size_mm = read_f32(&mut input, path)?;
        if !(cell_size_mm > 0.0) {
            return Err(format!("{}: inconsistent cell size", path.display()));
        }
        let count = read_u32(&mut input, path)?;
        let ncells = (cell_cols as usize) * (cell_rows as usize);
        let mut starts = vec![0u32; ncells + 1];
        for s in starts.iter_mut() {
            *s = read_u32(&mut input, path)?;
        }
        if starts[ncells] != count {
            return Err(format!("{}: inconsistent cell index", path.display()));
        }
        Ok(Self {
            cell_cols,
            cell_rows,
            xref,
            yref,
            cell_size_mm,
            count,
            path: path.to_path_buf(),
            starts,
            points: None,
        })
    }

    /// Loads the point payload into memory.
    pub fn load_points(&mut self) -> Result<(), String> {
        if self.points.is_some() {
            return Ok(());
        }
        let file = File::open(&self.path)
            .map_err(|e| format!("Failed to open {}: {e}", self.path.display()))?;
        let mut input = BufReader::new(file);
        // Skip header and cell index.
        let ncells = (self.cell_cols as usize) * (self.cell_rows as usize);
        let skip = 4 + 4 + 8 + 8 + 4 + 4 + 4 * (ncells + 1);
        std::io::copy(
            &mut input.by_ref().take(skip as u64),
            &mut std::io::sink(),
        )
        .map_err(|e| format!("Failed to read {}: {e}", self.path.display()))?;
        let mut pts = Vec::with_capacity(self.count as usize);
        for _ in 0..self.count {
            let x = read_i32(&mut input, &self.path)?;
            let y = read_i32(&mut input, &self.path)?;
            let z = read_i32(&mut input, &self.path)?;
            pts.push(Pt3i::new(x, y, z));
        }
        self.points = Some(pts);
        Ok(())
    }

    /// Drops the point payload, keeping header and cell index.
    pub fn release_points(&mut self) {
        self.points = None;
    }

    pub fn save(&self, path: &Path) -> Result<(), String> {
        let points = self
            .points
            .as_ref()
            .ok_or_else(|| format!("{}: no points to save", path.display()))?;
        let file = File::create(path)
            .map_err(|e| format!("Failed to create {}: {e}", path.display()))?;
        let mut out = BufWriter::new(file);
        let mut res: Result<(), std::io::Error> = (|| {
            out.write_all(&self.cell_cols.to_le_bytes())?;
            out.write_all(&self.cell_rows.to_le_bytes())?;
            out.write_all(&self.xref.to_le_bytes())?;
            out.write_all(&self.yref.to_le_bytes())?;
            out.write_all(&self.cell_size_mm.to_le_bytes())?;
            out.write_all(&self.count.to_le_bytes())?;
            for s in &self.starts {
                out.write_all(&s.to_le_bytes())?;
            }
            for p in points {
                out.write_all(&p.x.to_le_bytes())?;
                out.write_all(&p.y.to_le_bytes())?;
                out.write_all(&p.z.to_le_bytes())?;
            }
            Ok(())
        })();
        res = res.and_then(|_| out.flush());
        res.map_err(|e| format!("Failed to write {}: {e}", path.display()))
    }

    #[inline]
    pub fn is_loaded(&self) -> bool {
        self.points.is_some()
    }

    #[inline]
    pub fn cell_cols(&self) -> i32 {
        self.cell_cols
    }

    #[inline]
    pub fn cell_rows(&self) -> i32 {
        self.cell_rows
    }

    #[inline]
    pub fn xref(&self) -> i64 {
        self.xref
    }

    #[inline]
    pub fn yref(&self) -> i64 {
        self.yref
    }

    #[inline]
    pub fn cell_size_mm(&self) -> f32 {
        self.cell_size_mm
    }

    #[inline]
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Resident size of the point payload in bytes.
    #[inline]
    pub fn point_bytes(&self) -> usize {
        self.count as usize * std::mem::size_of::<Pt3i>()
    }

    /// Points of the local cell `(cx, cy)`, empty when the tile is not
    /// resident.
    pub fn cell_points(&self, cx: i32, cy: i32) -> &[Pt3i] {
        match &self.points {
            None => &[],
            Some(pts) => {
                let idx = (cy * self.cell_cols + cx) as usize;
                let s = self.starts[idx] as usize;
                let e = self.starts[idx + 1] as usize;
                &pts[s..e]
            }
        }
    }
}

fn read_i32(input: &mut impl Read, path: &Path) -> Result<i32, String> {
    let mut buf = [0u8; 4];
    input
        .read_exact(&mut buf)
        .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
    Ok(i32::from_le_bytes(buf))
}

fn read_u32(input: &mut impl Read, path: &Path) -> Result<u32, String> {
    let mut buf = [0u8; 4];
    input
        .read_exact(&mut buf)
        .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
    Ok(u32::from_le_bytes(buf))
}

fn read_i64(input: &mut impl Read, path: &Path) -> Result<i64, String> {
    let mut buf = [0u8; 8];
    input
        .read_exact(&mut buf)
        .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
    Ok(i64::from_le_bytes(buf))
}

fn read_f32(input: &mut impl Read, path: &Path) -> Result<f32, String> {
    let mut buf = [0u8; 4];
    input
        .read_exact(&mut buf)
        .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
    Ok(f32::from_le_bytes(buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tile_roundtrip_preserves_cells() {
        let dir = std::env::temp_dir().join("trackway_tile_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("t.til");
        let cells = vec![
            vec![Pt3i::new(10, 20, 30)],
            vec![],
            vec![Pt3i::new(1, 2, 3), Pt3i::new(4, 5, 6)],
            vec![],
        ];
        let tile = PtTile::from_cells(2, 2, 1000, 2000, 100.0, &cells);
        tile.save(&path).unwrap();

        let mut read = PtTile::load_header(&path).unwrap();
        assert_eq!(read.count(), 3);
        assert!(!read.is_loaded());
        assert!(read.cell_points(0, 0).is_empty());
        read.load_points().unwrap();
        assert_eq!(read.cell_points(0, 0), &[Pt3i::new(10, 20, 30)]);
        assert_eq!(
            read.cell_points(0, 1),
            &[Pt3i::new(1, 2, 3), Pt3i::new(4, 5, 6)]
        );
        std::fs::remove_file(&path).ok();
    }
}
