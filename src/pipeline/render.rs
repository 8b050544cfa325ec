//! PNG rendering of step outputs.

use crate::gradient::VectorMap;
use crate::roadmap::RoadMap;
use crate::seeds::SeedMap;
use crate::segments::BlurredSegment;
use crate::terrain::{Shading, TerrainMap};
use image::{GrayImage, Rgba, RgbaImage};
use rand::Rng;
use std::path::Path;

fn ensure_parent(path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create {}: {e}", parent.display()))?;
        }
    }
    Ok(())
}

/// Writes a byte raster as a grayscale PNG.
pub fn save_gray_png(path: &Path, width: usize, height: usize, data: &[u8]) -> Result<(), String> {
    ensure_parent(path)?;
    let img: GrayImage =
        GrayImage::from_raw(width as u32, height as u32, data.to_vec())
            .ok_or_else(|| format!("{}: raster size mismatch", path.display()))?;
    img.save(path)
        .map_err(|e| format!("Failed to save {}: {e}", path.display()))
}

/// Writes a shading of the terrain map.
pub fn save_shading_png(path: &Path, dtm: &TerrainMap, shading: Shading) -> Result<(), String> {
    let (w, h) = (dtm.width(), dtm.height());
    let mut data = vec![0u8; w * h];
    for j in 0..h {
        for i in 0..w {
            data[j * w + i] = dtm.get_shaded(i, j, shading).clamp(0, 255) as u8;
        }
    }
    save_gray_png(path, w, h, &data)
}

/// Writes the gradient magnitudes, normalised over the map.
pub fn save_sobel_png(path: &Path, gmap: &VectorMap) -> Result<(), String> {
    let (w, h) = (gmap.width(), gmap.height());
    let mut mags = vec![0.0f64; w * h];
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for j in 0..h {
        for i in 0..w {
            let m = gmap.magn(i, j);
            mags[j * w + i] = m;
            lo = lo.min(m);
            hi = hi.max(m);
        }
    }
    let norm = if hi > lo { 255.0 / (hi - lo) } else { 0.0 };
    let data: Vec<u8> = mags.iter().map(|m| ((m - lo) * norm) as u8).collect();
    save_gray_png(path, w, h, &data)
}

/// Draws the blurred segments, black on white (or one random colour
/// per segment over an optional DTM background).
pub fn save_fbsd_png(
    path: &Path,
    width: usize,
    height: usize,
    segments: &[BlurredSegment],
    false_color: bool,
    background: Option<&TerrainMap>,
) -> Result<(), String> {
    ensure_parent(path)?;
    let mut img = RgbaImage::from_pixel(width as u32, height as u32, Rgba([255, 255, 255, 255]));
    if let Some(dtm) = background {
        for j in 0..height.min(dtm.height()) {
            for i in 0..width.min(dtm.width()) {
                let v = dtm.get(i, j).clamp(0, 255) as u8;
                img.put_pixel(i as u32, j as u32, Rgba([v, v, v, 255]));
            }
        }
    }
    let mut rng = rand::thread_rng();
    for bs in segments {
        let color = if false_color {
            dark_color(&mut rng)
        } else {
            Rgba([0, 0, 0, 255])
        };
        for p in bs.pixels() {
            if p.x >= 0 && p.y >= 0 && (p.x as usize) < width && (p.y as usize) < height {
                img.put_pixel(p.x as u32, p.y as u32, color);
            }
        }
    }
    img.save(path)
        .map_err(|e| format!("Failed to save {}: {e}", path.display()))
}

/// Draws the seed strokes over white (or the shaded DTM).
pub fn save_seeds_png(
    path: &Path,
    width: usize,
    height: usize,
    seeds: &SeedMap,
    background: Option<&TerrainMap>,
) -> Result<(), String> {
    ensure_parent(path)?;
    let mut img = RgbaImage::from_pixel(width as u32, height as u32, Rgba([255, 255, 255, 255]));
    if let Some(dtm) = background {
        for j in 0..height.min(dtm.height()) {
            for i in 0..width.min(dtm.width()) {
                let v = dtm.get(i, j).clamp(0, 255) as u8;
                img.put_pixel(i as u32, j as u32, Rgba([v, v, v, 255]));
            }
        }
    }
    let black = Rgba([0, 0, 0, 255]);
    for k in 0..seeds.cols() * seeds.rows() {
        for (p1, p2) in seeds.bucket(k) {
            let mut line = Vec::new();
            p1.draw(&mut line, *p2);
            for p in line {
                if p.x >= 0 && p.y >= 0 && (p.x as usize) < width && (p.y as usize) < height {
                    // Seeds live in the y-up tile grid.
                    img.put_pixel(p.x as u32, (height - 1 - p.y as usize) as u32, black);
                }
            }
        }
    }
    img.save(path)
        .map_err(|e| format!("Failed to save {}: {e}", path.display()))
}

/// Writes the detection map: white roads on black (or inverted), a
/// random colour per road, optionally over the shaded DTM.
pub fn save_roads_png(
    path: &Path,
    map: &RoadMap,
    false_color: bool,
    inverted: bool,
    background: Option<&TerrainMap>,
) -> Result<(), String> {
    ensure_parent(path)?;
    let (w, h) = (map.width(), map.height());
    let mut img = RgbaImage::from_pixel(w as u32, h as u32, Rgba([0, 0, 0, 255]));
    if let Some(dtm) = background {
        for j in 0..h.min(dtm.height()) {
            for i in 0..w.min(dtm.width()) {
                let v = dtm.get(i, j).clamp(0, 255) as u8;
                img.put_pixel(i as u32, j as u32, Rgba([v, v, v, 255]));
            }
        }
    }
    let mut rng = rand::thread_rng();
    let palette: Vec<Rgba<u8>> = (0..=map.number_of_roads())
        .map(|i| {
            if i == 0 || !false_color {
                Rgba([255, 255, 255, 255])
            } else {
                dark_color(&mut rng)
            }
        })
        .collect();
    for j in 0..h {
        for i in 0..w {
            let id = map.map()[j * w + i];
            if inverted {
                if id == 0 {
                    img.put_pixel(i as u32, j as u32, Rgba([255, 255, 255, 255]));
                }
            } else if id != 0 {
                img.put_pixel(i as u32, j as u32, palette[id as usize]);
            }
        }
    }
    img.save(path)
        .map_err(|e| format!("Failed to save {}: {e}", path.display()))
}

/// A random colour dark enough to read on white.
fn dark_color(rng: &mut impl Rng) -> Rgba<u8> {
    loop {
        let r: u8 = rng.gen();
        let g: u8 = rng.gen();
        let b: u8 = rng.gen();
        if r as u16 + g as u16 + b as u16 <= 300 {
            return Rgba([r, g, b, 255]);
        }
    }
}
