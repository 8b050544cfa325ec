//! Binary round-trip formats of the intermediate artefacts.
//!
//! Every map shares the same little-endian header: `i32 width,
//! i32 height, f32 cell_size`, followed by the payload.

use crate::gradient::VectorMap;
use crate::seeds::SeedMap;
use crate::segments::DigitalStraightSegment;
use crate::types::{Pt2i, Vr2i};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Common header of the intermediate maps.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MapHeader {
    pub width: i32,
    pub height: i32,
    pub cell_size: f32,
}

pub fn save_byte_map(path: &Path, hdr: MapHeader, data: &[u8]) -> Result<(), String> {
    let mut out = writer(path)?;
    let res: Result<(), std::io::Error> = (|| {
        write_header(&mut out, hdr)?;
        out.write_all(data)?;
        out.flush()
    })();
    res.map_err(|e| format!("Failed to write {}: {e}", path.display()))
}

pub fn load_byte_map(path: &Path) -> Result<(MapHeader, Vec<u8>), String> {
    let mut input = reader(path)?;
    let hdr = read_header(&mut input, path)?;
    let mut data = vec![0u8; (hdr.width * hdr.height) as usize];
    input
        .read_exact(&mut data)
        .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
    Ok((hdr, data))
}

pub fn save_vector_map(path: &Path, hdr: MapHeader, vmap: &VectorMap) -> Result<(), String> {
    let mut out = writer(path)?;
    let res: Result<(), std::io::Error> = (|| {
        write_header(&mut out, hdr)?;
        for v in vmap.vectors() {
            out.write_all(&v.x.to_le_bytes())?;
            out.write_all(&v.y.to_le_bytes())?;
        }
        out.flush()
    })();
    res.map_err(|e| format!("Failed to write {}: {e}", path.display()))
}

pub fn load_vector_map(path: &Path) -> Result<(MapHeader, VectorMap), String> {
    let mut input = reader(path)?;
    let hdr = read_header(&mut input, path)?;
    let n = (hdr.width * hdr.height) as usize;
    let mut vecs = Vec::with_capacity(n);
    for _ in 0..n {
        let x = read_i32(&mut input, path)?;
        let y = read_i32(&mut input, path)?;
        vecs.push(Vr2i::new(x, y));
    }
    Ok((
        hdr,
        VectorMap::from_vectors(hdr.width as usize, hdr.height as usize, vecs),
    ))
}

pub fn save_segments(
    path: &Path,
    hdr: MapHeader,
    dss: &[DigitalStraightSegment],
) -> Result<(), String> {
    let mut out = writer(path)?;
    let res: Result<(), std::io::Error> = (|| {
        write_header(&mut out, hdr)?;
        out.write_all(&(dss.len() as i32).to_le_bytes())?;
        for seg in dss {
            out.write_all(&seg.a().to_le_bytes())?;
            out.write_all(&seg.b().to_le_bytes())?;
            out.write_all(&seg.mu().to_le_bytes())?;
            out.write_all(&seg.nu().to_le_bytes())?;
            out.write_all(&seg.s0().to_le_bytes())?;
            out.write_all(&seg.s1().to_le_bytes())?;
        }
        out.flush()
    })();
    res.map_err(|e| format!("Failed to write {}: {e}", path.display()))
}

pub fn load_segments(path: &Path) -> Result<(MapHeader, Vec<DigitalStraightSegment>), String> {
    let mut input = reader(path)?;
    let hdr = read_header(&mut input, path)?;
    let nb = read_i32(&mut input, path)?;
    if nb < 0 {
        return Err(format!("{}: inconsistent header", path.display()));
    }
    let mut dss = Vec::with_capacity(nb as usize);
    for _ in 0..nb {
        let a = read_i32(&mut input, path)?;
        let b = read_i32(&mut input, path)?;
        let mu = read_i32(&mut input, path)?;
        let nu = read_i32(&mut input, path)?;
        let s0 = read_i32(&mut input, path)?;
        let s1 = read_i32(&mut input, path)?;
        dss.push(DigitalStraightSegment::new(a, b, mu, nu, s0, s1));
    }
    Ok((hdr, dss))
}

/// Saves the seed buckets: map header, tile grid size, stroke count,
/// then the strokes in boustrophedon tile order.
pub fn save_seeds(path: &Path, hdr: MapHeader, seeds: &SeedMap) -> Result<(), String> {
    let mut out = writer(path)?;
    let res: Result<(), std::io::Error> = (|| {
        write_header(&mut out, hdr)?;
        out.write_all(&(seeds.cols() as i32).to_le_bytes())?;
        out.write_all(&(seeds.rows() as i32).to_le_bytes())?;
        out.write_all(&(seeds.count() as i32).to_le_bytes())?;
        for k in seeds.boustrophedon() {
            for (p1, p2) in seeds.bucket(k) {
                out.write_all(&p1.x.to_le_bytes())?;
                out.write_all(&p1.y.to_le_bytes())?;
                out.write_all(&p2.x.to_le_bytes())?;
                out.write_all(&p2.y.to_le_bytes())?;
            }
        }
        out.flush()
    })();
    res.map_err(|e| format!("Failed to write {}: {e}", path.display()))
}

/// Loads seeds, re-bucketing each stroke by the tile of its midpoint.
pub fn load_seeds(path: &Path) -> Result<(MapHeader, SeedMap), String> {
    let mut input = reader(path)?;
    let hdr = read_header(&mut input, path)?;
    let cols = read_i32(&mut input, path)?;
    let rows = read_i32(&mut input, path)?;
    let nb = read_i32(&mut input, path)?;
    if cols <= 0 || rows <= 0 || nb < 0 {
        return Err(format!("{}: inconsistent header", path.display()));
    }
    let (cols, rows) = (cols as usize, rows as usize);
    let tw = (hdr.width as usize / cols).max(1);
    let th = (hdr.height as usize / rows).max(1);
    let mut seeds = SeedMap::new(cols, rows);
    for _ in 0..nb {
        let p1 = Pt2i::new(read_i32(&mut input, path)?, read_i32(&mut input, path)?);
        let p2 = Pt2i::new(read_i32(&mut input, path)?, read_i32(&mut input, path)?);
        let tx = (((p1.x + p2.x) / 2).max(0) as usize / tw).min(cols - 1);
        let ty = (((p1.y + p2.y) / 2).max(0) as usize / th).min(rows - 1);
        seeds.push(ty * cols + tx, (p1, p2));
    }
    Ok((hdr, seeds))
}

fn writer(path: &Path) -> Result<BufWriter<File>, String> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create {}: {e}", parent.display()))?;
        }
    }
    File::create(path)
        .map(BufWriter::new)
        .map_err(|e| format!("Failed to create {}: {e}", path.display()))
}

fn reader(path: &Path) -> Result<BufReader<File>, String> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|e| format!("{}: can't be opened ({e})", path.display()))
}

fn write_header(out: &mut impl Write, hdr: MapHeader) -> Result<(), std::io::Error> {
    out.write_all(&hdr.width.to_le_bytes())?;
    out.write_all(&hdr.height.to_le_bytes())?;
    out.write_all(&hdr.cell_size.to_le_bytes())
}

fn read_header(input: &mut impl Read, path: &Path) -> Result<MapHeader, String> {
    let width = read_i32(input, path)?;
    let height = read_i32(input, path)?;
    let mut buf = [0u8; 4];
    input
        .read_exact(&mut buf)
        .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
    let cell_size = f32::from_le_bytes(buf);
    if width <= 0 || height <= 0 || !(cell_size > 0.0) {
        return Err(format!("{}: inconsistent header", path.display()));
    }
    Ok(MapHeader {
        width,
        height,
        cell_size,
    })
}

fn read_i32(input: &mut impl Read, path: &Path) -> Result<i32, String> {
    let mut buf = [0u8; 4];
    input
        .read_exact(&mut buf)
        .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
    Ok(i32::from_le_bytes(buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join("trackway_files_test");
        std::fs::create_dir_all(&dir).unwrap();
        dir.join(name)
    }

    #[test]
    fn byte_map_roundtrip_is_bitwise() {
        let path = tmp("m.map");
        let hdr = MapHeader {
            width: 5,
            height: 3,
            cell_size: 0.5,
        };
        let data: Vec<u8> = (0..15).collect();
        save_byte_map(&path, hdr, &data).unwrap();
        let (h2, d2) = load_byte_map(&path).unwrap();
        assert_eq!(h2, hdr);
        assert_eq!(d2, data);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn segments_roundtrip() {
        let path = tmp("s.fbsd");
        let hdr = MapHeader {
            width: 100,
            height: 100,
            cell_size: 0.5,
        };
        let dss = vec![
            DigitalStraightSegment::new(1, 0, 7, 2, -30, -4),
            DigitalStraightSegment::new(2, -1, 10, 9, 5, 95),
        ];
        save_segments(&path, hdr, &dss).unwrap();
        let (h2, d2) = load_segments(&path).unwrap();
        assert_eq!(h2, hdr);
        assert_eq!(d2, dss);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn seeds_roundtrip_rebuckets_by_midpoint() {
        let path = tmp("z.pts");
        let hdr = MapHeader {
            width: 100,
            height: 100,
            cell_size: 0.5,
        };
        let mut seeds = SeedMap::new(2, 2);
        seeds.push(0, (Pt2i::new(10, 10), Pt2i::new(20, 10)));
        seeds.push(3, (Pt2i::new(80, 80), Pt2i::new(90, 80)));
        save_seeds(&path, hdr, &seeds).unwrap();
        let (h2, loaded) = load_seeds(&path).unwrap();
        assert_eq!(h2, hdr);
        assert_eq!(loaded.count(), 2);
        assert_eq!(loaded.bucket(0).len(), 1);
        assert_eq!(loaded.bucket(3).len(), 1);
        std::fs::remove_file(&path).ok();
    }
}
