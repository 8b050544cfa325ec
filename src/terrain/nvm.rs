//! Normal-vector map (NVM) tile files.
//!
//! Layout (little-endian): `i32 width, i32 height, f32 cell_size,
//! f32 xmin, f32 ymin`, then `width*height` normals as three `f32`,
//! rows stored bottom-up in world space.

use crate::types::Pt3f;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// NVM tile file suffix.
pub const NVM_SUFFIX: &str = ".nvm";

#[derive(Clone, Copy, Debug)]
pub struct NvmHeader {
    pub width: usize,
    pub height: usize,
    pub cell_size: f32,
    pub xmin: f32,
    pub ymin: f32,
}

pub fn read_nvm_header(path: &Path) -> Result<NvmHeader, String> {
    let file =
        File::open(path).map_err(|e| format!("Failed to open {}: {e}", path.display()))?;
    let mut input = BufReader::new(file);
    read_header(&mut input, path)
}

/// Reads the normal payload; `hdr` must come from the same file.
pub fn read_nvm_normals(path: &Path, hdr: &NvmHeader) -> Result<Vec<Pt3f>, String> {
    let file =
        File::open(path).map_err(|e| format!("Failed to open {}: {e}", path.display()))?;
    let mut input = BufReader::new(file);
    read_header(&mut input, path)?;
    let n = hdr.width * hdr.height;
    let mut buf = vec![0u8; n * 12];
    input
        .read_exact(&mut buf)
        .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
    let mut normals = Vec::with_capacity(n);
    for chunk in buf.chunks_exact(12) {
        normals.push(Pt3f::new(
            f32::from_le_bytes(chunk[0..4].try_into().unwrap()),
            f32::from_le_bytes(chunk[4..8].try_into().unwrap()),
            f32::from_le_bytes(chunk[8..12].try_into().unwrap()),
        ));
    }
    Ok(normals)
}

/// Writes one NVM tile; `normals` rows bottom-up in world space.
pub fn write_nvm(
    path: &Path,
    width: usize,
    height: usize,
    cell_size: f32,
    xmin: f32,
    ymin: f32,
    normals: &[Pt3f],
) -> Result<(), String> {
    if normals.len() != width * height {
        return Err(format!("{}: normal count mismatch", path.display()));
    }
    let file =
        File::create(path).map_err(|e| format!("Failed to create {}: {e}", path.display()))?;
    let mut out = BufWriter::new(file);
    let res: Result<(), std::io::Error> = (|| {
        out.write_all(&(width as i32).to_le_bytes())?;
        out.write_all(&(height as i32).to_le_bytes())?;
        out.write_all(&cell_size.to_le_bytes())?;
        out.write_all(&xmin.to_le_bytes())?;
        out.write_all(&ymin.to_le_bytes())?;
        for n in normals {
            out.write_all(&n.x.to_le_bytes())?;
            out.write_all(&n.y.to_le_bytes())?;
            out.write_all(&n.z.to_le_bytes())?;
        }
        out.flush()
    })();
    res.map_err(|e| format!("Failed to write {}: {e}", path.display()))
}

fn read_header(input: &mut impl Read, path: &Path) -> Result<NvmHeader, String> {
    let width = read_i32(input, path)?;
    let height = read_i32(input, path)?;
    let cell_size = read_f32(input, path)?;
    let xmin = read_f32(input, path)?;
    let ymin = read_f32(input, path)?;
    if width <= 0 || height <= 0 || !(cell_size > 0.0) {
        return Err(format!("{}: inconsistent header", path.display()));
    }
    Ok(NvmHeader {
        width: width as usize,
        height: height as usize,
        cell_size,
        xmin,
        ymin,
    })
}

fn read_i32(input: &mut impl Read, path: &Path) -> Result<i32, String> {
    let mut buf = [0u8; 4];
    input
        .read_exact(&mut buf)
        .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
    Ok(i32::from_le_bytes(buf))
}

fn read_f32(input: &mut impl Read, path: &Path) -> Result<f32, String> {
    let mut buf = [0u8; 4];
    input
        .read_exact(&mut buf)
        .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
    Ok(f32::from_le_bytes(buf))
}
