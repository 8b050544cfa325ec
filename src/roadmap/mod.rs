//! Road detection map.
//!
//! A raster of road identifiers (0 = free) enforcing at most one road
//! per pixel: a new track is rasterised only when it barely overlaps
//! already accepted roads, and identifiers grow strictly.

use crate::types::Pt2i;
use log::debug;

/// Accepted pixels already owned by another road before a track is
/// vetoed.
const OVERLAP_MAX: usize = 3;

/// Occupancy and label map of the accepted roads.
pub struct RoadMap {
    width: usize,
    height: usize,
    map: Vec<u16>,
    nb_roads: u16,
}

impl RoadMap {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            map: vec![0u16; width * height],
            nb_roads: 0,
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Raster of road identifiers, row-major.
    #[inline]
    pub fn map(&self) -> &[u16] {
        &self.map
    }

    /// Count of roads accepted so far.
    #[inline]
    pub fn number_of_roads(&self) -> u16 {
        self.nb_roads
    }

    /// Whether the pixel already belongs to a road. Out-of-map pixels
    /// read as free.
    pub fn occupied(&self, p: Pt2i) -> bool {
        if p.x < 0 || p.y < 0 || p.x as usize >= self.width || p.y as usize >= self.height {
            return false;
        }
        self.map[p.y as usize * self.width + p.x as usize] != 0
    }

    /// Rasterises a track given as pixel runs under a fresh road id.
    /// Rejected (nothing written) when more than a few pixels would
    /// overwrite existing roads; returns whether the track was kept.
    pub fn add(&mut self, rows: &[Vec<Pt2i>]) -> bool {
        let mut overlap = 0usize;
        let mut stamped = 0usize;
        for row in rows {
            for p in row {
                if p.x < 0 || p.y < 0 || p.x as usize >= self.width || p.y as usize >= self.height
                {
                    continue;
                }
                stamped += 1;
                if self.map[p.y as usize * self.width + p.x as usize] != 0 {
                    overlap += 1;
                    if overlap > OVERLAP_MAX {
                        return false;
                    }
                }
            }
        }
        if stamped == 0 {
            return false;
        }
        let id = self.nb_roads + 1;
        for row in rows {
            for p in row {
                if p.x < 0 || p.y < 0 || p.x as usize >= self.width || p.y as usize >= self.height
                {
                    continue;
                }
                self.map[p.y as usize * self.width + p.x as usize] = id;
            }
        }
        self.nb_roads = id;
        debug!("road {id} rasterised over {stamped} pixels");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(y: i32, x0: i32, x1: i32) -> Vec<Pt2i> {
        (x0..=x1).map(|x| Pt2i::new(x, y)).collect()
    }

    #[test]
    fn ids_grow_and_pixels_are_owned() {
        let mut m = RoadMap::new(32, 32);
        assert!(m.add(&[row(4, 2, 12)]));
        assert!(m.add(&[row(20, 2, 12)]));
        assert_eq!(m.number_of_roads(), 2);
        assert!(m.occupied(Pt2i::new(5, 4)));
        assert!(!m.occupied(Pt2i::new(5, 5)));
        assert_eq!(m.map()[20 * 32 + 2], 2);
    }

    #[test]
    fn heavy_overlap_is_rejected_without_writes() {
        let mut m = RoadMap::new(32, 32);
        assert!(m.add(&[row(4, 2, 20)]));
        let before = m.map().to_vec();
        assert!(!m.add(&[row(4, 10, 16)]));
        assert_eq!(m.map(), &before[..]);
        assert_eq!(m.number_of_roads(), 1);
    }

    #[test]
    fn marginal_overlap_is_tolerated() {
        let mut m = RoadMap::new(32, 32);
        assert!(m.add(&[row(4, 2, 20)]));
        // Crossing track: touches the first road on 1-2 pixels only.
        let crossing: Vec<Vec<Pt2i>> = (0..10).map(|i| row(i, 8, 9)).collect();
        assert!(m.add(&crossing));
        assert_eq!(m.number_of_roads(), 2);
    }

    #[test]
    fn empty_tracks_are_not_numbered() {
        let mut m = RoadMap::new(16, 16);
        assert!(!m.add(&[]));
        assert_eq!(m.number_of_roads(), 0);
    }

    #[test]
    fn out_of_map_pixels_are_ignored() {
        let mut m = RoadMap::new(8, 8);
        assert!(m.add(&[vec![Pt2i::new(-3, 2), Pt2i::new(2, 2), Pt2i::new(50, 2)]]));
        assert!(m.occupied(Pt2i::new(2, 2)));
        assert!(!m.occupied(Pt2i::new(-3, 2)));
    }
}
