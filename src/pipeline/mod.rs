//! Pipeline orchestration: chains the processing steps over the tile
//! set, whole-map or pad by pad, and persists every intermediate
//! artefact under the results directory.

mod config;
mod export;
mod files;
mod render;

pub use config::{RunConfig, Step};
pub use files::MapHeader;

use crate::gradient::VectorMap;
use crate::roadmap::RoadMap;
use crate::seeds::{SeedGenerator, SeedMap};
use crate::segments::{BsDetector, DigitalStraightSegment};
use crate::terrain::{Shading, TerrainMap, NVM_SUFFIX};
use crate::tileset::{PtTileSet, GRID_SUBDIVISION, TIL_SUFFIX};
use crate::track::{CarriageTrack, TrackDetector};
use crate::types::Pt2i;
use log::{info, warn};

const NOMINAL_PLATEAU_LACK_TOLERANCE: i32 = 5;
const NOMINAL_PLATEAU_MAX_TILT: i32 = 10;
const NOMINAL_MAX_SHIFT_LENGTH: f32 = 0.5;
const NOMINAL_PLATEAU_MIN_LENGTH: f32 = 2.0;
const NOMINAL_PLATEAU_THICKNESS_TOLERANCE: f32 = 0.25;
const NOMINAL_SLOPE_TOLERANCE: f32 = 0.10;
const NOMINAL_SIDE_SHIFT_TOLERANCE: f32 = 0.5;

/// The processing pipeline state: loaded inputs, per-step buffers and
/// detection outputs.
pub struct Pipeline {
    cfg: RunConfig,
    dtm: Option<TerrainMap>,
    ptset: Option<PtTileSet>,
    shade_map: Option<Vec<u8>>,
    rorpo_map: Option<Vec<u8>>,
    gmap: Option<VectorMap>,
    bsdet: BsDetector,
    dss: Vec<DigitalStraightSegment>,
    seeds: Option<SeedMap>,
    sucseeds: Option<SeedMap>,
    detection_map: Option<RoadMap>,
    ctdet: Option<TrackDetector>,
    road_sections: Vec<CarriageTrack>,
    vm_width: usize,
    vm_height: usize,
    csize: f32,
    iratio: f32,
}

impl Pipeline {
    pub fn new(cfg: RunConfig) -> Self {
        let mut bsdet = BsDetector::new();
        // Road edges are detected on both polarities, without the
        // significance filter.
        if bsdet.is_single_edge_mode_on() {
            bsdet.switch_single_or_double_edge();
        }
        if bsdet.is_nfa_on() {
            bsdet.switch_nfa();
        }
        bsdet.set_assigned_thickness(cfg.max_bs_thickness);
        Self {
            cfg,
            dtm: None,
            ptset: None,
            shade_map: None,
            rorpo_map: None,
            gmap: None,
            bsdet,
            dss: Vec::new(),
            seeds: None,
            sucseeds: None,
            detection_map: None,
            ctdet: None,
            road_sections: Vec::new(),
            vm_width: 0,
            vm_height: 0,
            csize: 0.0,
            iratio: 1.0,
        }
    }

    /// Runs one pipeline step (or the full chain).
    pub fn run(&mut self, step: Step) -> Result<(), String> {
        match step {
            Step::Hill => {
                self.load_tile_set(true, false)?;
                let dtm = self
                    .dtm
                    .as_ref()
                    .ok_or_else(|| "No DTM loaded".to_string())?;
                render::save_shading_png(
                    &self.cfg.res_path(config::HILL_FILE, config::IM_SUFFIX),
                    dtm,
                    Shading::Hill,
                )
            }
            Step::SeedCheck => {
                let (hdr, seeds) =
                    files::load_seeds(&self.cfg.res_path(config::SEED_FILE, config::SEED_SUFFIX))?;
                self.adopt_seed_geometry(&hdr);
                for k in seeds.boustrophedon() {
                    info!("Seeds {} : {}", k, seeds.bucket(k).len());
                    for (p1, p2) in seeds.bucket(k) {
                        info!("  seed ({}, {}) ({}, {})", p1.x, p1.y, p2.x, p2.y);
                    }
                }
                self.seeds = Some(seeds);
                Ok(())
            }
            Step::All => {
                self.process_sawing()?;
                self.process_asd()?;
                self.save_asd_image()?;
                self.export_results()
            }
            Step::Sawing => {
                self.process_sawing()?;
                self.save_seed_file()?;
                if self.cfg.out_map {
                    info!("--map : only with --shade, --rorpo, --sobel, --fbsd or --seeds");
                }
                Ok(())
            }
            Step::Shade => {
                self.load_tile_set(true, false)?;
                self.process_shading()?;
                self.save_shade_map()?;
                if self.cfg.out_map {
                    let shading = self.shading_type();
                    let dtm = self
                        .dtm
                        .as_ref()
                        .ok_or_else(|| "No DTM loaded".to_string())?;
                    render::save_shading_png(
                        &self.cfg.res_path(config::SLOPE_FILE, config::IM_SUFFIX),
                        dtm,
                        shading,
                    )?;
                }
                self.dtm = None;
                Ok(())
            }
            Step::Rorpo => {
                self.load_shade_map()?;
                self.process_rorpo();
                self.save_rorpo_map()?;
                if self.cfg.out_map {
                    render::save_gray_png(
                        &self.cfg.res_path(config::RORPO_FILE, config::IM_SUFFIX),
                        self.vm_width,
                        self.vm_height,
                        self.rorpo_map
                            .as_ref()
                            .ok_or_else(|| "No tubular map".to_string())?,
                    )?;
                }
                self.shade_map = None;
                Ok(())
            }
            Step::Sobel => {
                if self.cfg.skip_rorpo {
                    self.load_shade_map()?;
                } else {
                    self.load_rorpo_map()?;
                }
                self.process_sobel()?;
                self.save_sobel_map()?;
                if self.cfg.out_map {
                    render::save_sobel_png(
                        &self.cfg.res_path(config::SOBEL_FILE, config::IM_SUFFIX),
                        self.gmap
                            .as_ref()
                            .ok_or_else(|| "No gradient map".to_string())?,
                    )?;
                }
                self.shade_map = None;
                self.rorpo_map = None;
                Ok(())
            }
            Step::Fbsd => {
                self.load_sobel_map()?;
                self.process_fbsd()?;
                self.save_fbsd_segments()?;
                if self.cfg.out_map {
                    self.ensure_background()?;
                    render::save_fbsd_png(
                        &self.cfg.res_path(config::FBSD_FILE, config::IM_SUFFIX),
                        self.vm_width,
                        self.vm_height,
                        self.bsdet.blurred_segments(),
                        self.cfg.false_color,
                        self.dtm.as_ref().filter(|_| self.cfg.back_dtm),
                    )?;
                }
                self.gmap = None;
                Ok(())
            }
            Step::Seeds => {
                self.load_tile_set(false, false)?;
                let (hdr, dss) =
                    files::load_segments(&self.cfg.res_path(config::FBSD_FILE, config::FBSD_SUFFIX))?;
                self.vm_width = hdr.width as usize;
                self.vm_height = hdr.height as usize;
                self.csize = hdr.cell_size;
                self.dss = dss;
                self.process_seeds(None, self.vm_height)?;
                self.save_seed_file()?;
                if self.cfg.out_map {
                    self.ensure_background()?;
                    render::save_seeds_png(
                        &self.cfg.res_path(config::SEED_FILE, config::IM_SUFFIX),
                        self.vm_width,
                        self.vm_height,
                        self.seeds
                            .as_ref()
                            .ok_or_else(|| "No seeds available".to_string())?,
                        self.dtm.as_ref().filter(|_| self.cfg.back_dtm),
                    )?;
                }
                Ok(())
            }
            Step::Asd => {
                let (hdr, seeds) =
                    files::load_seeds(&self.cfg.res_path(config::SEED_FILE, config::SEED_SUFFIX))?;
                self.adopt_seed_geometry(&hdr);
                self.seeds = Some(seeds);
                self.load_tile_set(false, false)?;
                self.process_asd()?;
                self.save_asd_image()?;
                self.export_results()
            }
        }
    }

    /// Sawing: shade, tubular pass, gradient, segments and seeds, over
    /// the whole map or pad by pad.
    fn process_sawing(&mut self) -> Result<(), String> {
        if self.cfg.pad_size == 0 {
            self.load_tile_set(true, false)?;
            self.process_shading()?;
            if !self.cfg.skip_rorpo {
                self.process_rorpo();
                self.shade_map = None;
            }
            self.process_sobel()?;
            self.shade_map = None;
            self.rorpo_map = None;
            self.process_fbsd()?;
            self.gmap = None;
            self.process_seeds(None, self.vm_height)?;
            self.dss.clear();
            self.bsdet.clear_all();
            return Ok(());
        }

        // Pad-by-pad processing.
        self.load_tile_set_padded()?;
        let dtm = self
            .dtm
            .as_mut()
            .ok_or_else(|| "No DTM loaded".to_string())?;
        dtm.adjust_pad_size();
        let (pad_w, pad_h) = (dtm.pad_width(), dtm.pad_height());
        let (tw, th) = (dtm.tile_width(), dtm.tile_height());
        let mut pad = vec![0u8; pad_w * tw * pad_h * th];
        loop {
            let k = match self.dtm.as_mut().and_then(|d| d.next_pad(&mut pad)) {
                Some(k) => k,
                None => break,
            };
            info!("  --> Pad {k}");
            self.gmap = Some(VectorMap::from_raster(pad_w * tw, pad_h * th, &pad));
            self.process_fbsd()?;
            self.gmap = None;
            self.process_seeds(Some(k), pad_h * th)?;
            self.dss.clear();
            self.bsdet.clear_all();
        }
        Ok(())
    }

    /// Automatic seed detection over the loaded seed buckets.
    fn process_asd(&mut self) -> Result<(), String> {
        info!("ASD ...");
        self.road_sections.clear();
        if self.ctdet.is_none() {
            let det = self.build_track_detector();
            self.ctdet = Some(det);
        }
        let ptset = self
            .ptset
            .as_mut()
            .ok_or_else(|| "No tile set loaded".to_string())?;
        if self.cfg.buffer_size == 0 {
            ptset.load_points()?;
        }
        let cot = ptset.columns_of_tiles();
        let rot = ptset.rows_of_tiles();
        let (xref, yref) = (ptset.xref(), ptset.yref());
        let seeds = self
            .seeds
            .as_ref()
            .ok_or_else(|| "No seeds available".to_string())?;
        self.sucseeds = Some(SeedMap::new(cot, rot));
        self.detection_map = Some(RoadMap::new(self.vm_width, self.vm_height));
        let det = self
            .ctdet
            .as_mut()
            .ok_or_else(|| "No track detector".to_string())?;
        det.set_points_grid(
            self.vm_width as i32,
            self.vm_height as i32,
            GRID_SUBDIVISION,
            self.csize,
        );
        let map = self
            .detection_map
            .as_mut()
            .ok_or_else(|| "No detection map".to_string())?;
        let sucseeds = self
            .sucseeds
            .as_mut()
            .ok_or_else(|| "No successful-seed buckets".to_string())?;
        let mut num = 0usize;
        let mut unused = 0usize;

        let mut handle_tile = |k: usize,
                               ptset: &mut PtTileSet,
                               det: &mut TrackDetector,
                               map: &mut RoadMap,
                               sucseeds: &mut SeedMap,
                               road_sections: &mut Vec<CarriageTrack>| {
            let bucket: Vec<(Pt2i, Pt2i)> = seeds.bucket(k).to_vec();
            info!("  --> Tile {} : {} seeds", k, bucket.len());
            for (p1, p2) in bucket {
                let center = Pt2i::new((p1.x + p2.x) / 2, (p1.y + p2.y) / 2);
                let mcenter = Pt2i::new(center.x, self.vm_height as i32 - 1 - center.y);
                if map.occupied(mcenter) {
                    unused += 1;
                    continue;
                }
                if let Some(ct) = det.detect(ptset, p1, p2) {
                    if ct.plateau(0).is_some() {
                        let pts = if self.cfg.connected {
                            ct.connected_points(
                                self.vm_width as i32,
                                self.vm_height as i32,
                                self.iratio,
                            )
                        } else {
                            ct.points(self.vm_width as i32, self.vm_height as i32, self.iratio)
                        };
                        if map.add(&pts) {
                            sucseeds.push(k, (p1, p2));
                            if self.cfg.export {
                                road_sections.push(ct);
                            }
                        }
                        num += 1;
                    }
                }
            }
            if det.outs() != 0 {
                warn!("  {} requests outside", det.outs());
            }
            det.reset_outs();
        };

        if self.cfg.buffer_size != 0 {
            ptset.create_buffers();
            while let Some(k) = ptset.next_tile() {
                handle_tile(k, ptset, det, map, sucseeds, &mut self.road_sections);
            }
        } else {
            for j in 0..rot {
                for i in 0..cot {
                    let k = j * cot + if j % 2 != 0 { cot - 1 - i } else { i };
                    handle_tile(k, ptset, det, map, sucseeds, &mut self.road_sections);
                }
            }
        }
        drop(handle_tile);

        if let Some(sucseeds) = self.sucseeds.as_ref() {
            export::save_successful_seeds(
                &self.cfg.res_path(config::SUCCESS_SEED_FILE, config::TEXT_SUFFIX),
                sucseeds,
                xref,
                yref,
                (self.csize * 1000.0) as f64,
            )?;
        }
        if let Some(det) = self.ctdet.as_ref() {
            export::save_detector_status(
                &self.cfg.res_path(config::DETECTOR_FILE, config::TEXT_SUFFIX),
                det,
            )?;
        }
        info!("ASD OK : {num} roads and {unused} unused seeds");
        Ok(())
    }

    fn build_track_detector(&self) -> TrackDetector {
        let mut det = TrackDetector::new();
        det.set_plateau_lack_tolerance(NOMINAL_PLATEAU_LACK_TOLERANCE);
        det.set_max_shift_length(NOMINAL_MAX_SHIFT_LENGTH);
        if det.is_initialization_on() {
            det.switch_initialization();
        }
        det.set_automatic(true);
        let model = det.model_mut();
        model.set_min_length(NOMINAL_PLATEAU_MIN_LENGTH);
        model.set_thickness_tolerance(NOMINAL_PLATEAU_THICKNESS_TOLERANCE);
        model.set_slope_tolerance(NOMINAL_SLOPE_TOLERANCE);
        model.set_side_shift_tolerance(NOMINAL_SIDE_SHIFT_TOLERANCE);
        model.set_bs_max_tilt(NOMINAL_PLATEAU_MAX_TILT);
        if let Some(t) = self.cfg.tail_min_size {
            model.set_tail_min_size(t);
        }
        det
    }

    fn shading_type(&self) -> Shading {
        if self.cfg.skip_rorpo {
            Shading::ExpSlope
        } else {
            Shading::Slope
        }
    }

    fn process_shading(&mut self) -> Result<(), String> {
        info!("Shading ...");
        let dtm = self
            .dtm
            .as_ref()
            .ok_or_else(|| "No DTM loaded".to_string())?;
        let shading = self.shading_type();
        let mut map = vec![0u8; self.vm_width * self.vm_height];
        for j in 0..self.vm_height {
            for i in 0..self.vm_width {
                map[j * self.vm_width + i] = dtm.get_shaded(i, j, shading).clamp(0, 255) as u8;
            }
        }
        self.shade_map = Some(map);
        info!("Shading OK");
        Ok(())
    }

    /// Tubular filter stage: the current build transfers the shading
    /// unchanged.
    fn process_rorpo(&mut self) {
        info!("Tubular pass: transfering shaded map");
        self.rorpo_map = self.shade_map.clone();
    }

    fn process_sobel(&mut self) -> Result<(), String> {
        info!("Sobel 5x5 ...");
        let src = if self.cfg.skip_rorpo {
            self.shade_map.as_ref()
        } else {
            self.rorpo_map.as_ref().or(self.shade_map.as_ref())
        };
        let src = src.ok_or_else(|| "No shading raster loaded".to_string())?;
        self.gmap = Some(VectorMap::from_raster(self.vm_width, self.vm_height, src));
        info!("Sobel 5x5 OK");
        Ok(())
    }

    fn process_fbsd(&mut self) -> Result<(), String> {
        info!("FBSD ...");
        let gmap = self
            .gmap
            .as_ref()
            .ok_or_else(|| "No gradient map loaded".to_string())?;
        self.bsdet.reset_max_detections();
        self.bsdet.detect_all(gmap);
        self.dss.clear();
        self.bsdet.copy_digital_segments(&mut self.dss);
        info!("FBSD OK : {} blurred segments", self.dss.len());
        Ok(())
    }

    fn process_seeds(&mut self, kref: Option<usize>, image_height: usize) -> Result<(), String> {
        info!("Seeds ...");
        let ptset = self
            .ptset
            .as_ref()
            .ok_or_else(|| "No tile set loaded".to_string())?;
        let (cot, rot) = (ptset.columns_of_tiles(), ptset.rows_of_tiles());
        if self.seeds.is_none() {
            self.seeds = Some(SeedMap::new(cot, rot));
        }
        let (tw, th) = match self.dtm.as_ref() {
            Some(dtm) => (dtm.tile_width(), dtm.tile_height()),
            None => (self.vm_width / cot, self.vm_height / rot),
        };
        let gen = SeedGenerator {
            min_bs_length: self.cfg.min_bs_length,
            seed_shift: self.cfg.seed_shift,
            seed_width: self.cfg.seed_width,
        };
        let exists: Vec<bool> = (0..cot * rot).map(|k| ptset.has_tile(k)).collect();
        let seeds = self
            .seeds
            .as_mut()
            .ok_or_else(|| "No seed buckets".to_string())?;
        let stats = gen.generate(
            &self.dss,
            seeds,
            tw,
            th,
            image_height,
            kref,
            |k| exists.get(k).copied().unwrap_or(false),
        );
        info!(
            "Seeds OK : {} seeds, {} rejected segments",
            stats.kept, stats.short_segments
        );
        Ok(())
    }

    /// Loads the tile list: NVM files into the terrain map when
    /// `dtm_on`, point tile headers (and payloads when `pts_on`).
    fn load_tile_set(&mut self, dtm_on: bool, pts_on: bool) -> Result<(), String> {
        let names = self.tile_names()?;
        if dtm_on && self.dtm.is_none() {
            self.dtm = Some(TerrainMap::new());
        }
        if self.ptset.is_none() {
            self.ptset = Some(PtTileSet::new(self.cfg.buffer_size));
        }
        let ptset = self.ptset.as_mut().unwrap();
        for name in &names {
            let til = self.cfg.til_dir.join(format!("{name}{TIL_SUFFIX}"));
            info!("Reading {}", til.display());
            ptset.add_tile(&til, pts_on)?;
            if dtm_on {
                let nvm = self.cfg.nvm_dir.join(format!("{name}{NVM_SUFFIX}"));
                info!("Reading {}", nvm.display());
                if !self.dtm.as_mut().unwrap().add_normal_map_file(&nvm) {
                    return Err(format!("{}: can't be opened", nvm.display()));
                }
            }
        }
        ptset.create()?;
        info!("{} points in the whole tile set", ptset.size());
        if dtm_on {
            let (cot, rot) = (ptset.columns_of_tiles(), ptset.rows_of_tiles());
            let (xref, yref) = (ptset.xref(), ptset.yref());
            let dtm = self.dtm.as_mut().unwrap();
            dtm.assemble_map(cot, rot, xref, yref, false)?;
            self.vm_width = dtm.width();
            self.vm_height = dtm.height();
            self.csize = dtm.cell_size();
        }
        if self.vm_width > 0 {
            self.iratio = self.vm_width as f32 / self.ptset.as_ref().unwrap().xm_spread();
        }
        Ok(())
    }

    /// Tile list loading for the pad-streamed sawing.
    fn load_tile_set_padded(&mut self) -> Result<(), String> {
        let names = self.tile_names()?;
        let mut dtm = TerrainMap::new();
        dtm.set_pad_size(self.cfg.pad_size);
        let mut ptset = PtTileSet::new(self.cfg.buffer_size);
        for name in &names {
            let nvm = self.cfg.nvm_dir.join(format!("{name}{NVM_SUFFIX}"));
            info!("Reading {}", nvm.display());
            if !dtm.add_normal_map_file(&nvm) {
                return Err(format!("{}: can't be opened", nvm.display()));
            }
            let til = self.cfg.til_dir.join(format!("{name}{TIL_SUFFIX}"));
            ptset.add_tile(&til, false)?;
        }
        ptset.create()?;
        dtm.assemble_map(
            ptset.columns_of_tiles(),
            ptset.rows_of_tiles(),
            ptset.xref(),
            ptset.yref(),
            true,
        )?;
        self.vm_width = dtm.tile_width() * ptset.columns_of_tiles();
        self.vm_height = dtm.tile_height() * ptset.rows_of_tiles();
        self.csize = dtm.cell_size();
        self.iratio = self.vm_width as f32 / ptset.xm_spread();
        self.seeds = Some(SeedMap::new(
            ptset.columns_of_tiles(),
            ptset.rows_of_tiles(),
        ));
        self.dtm = Some(dtm);
        self.ptset = Some(ptset);
        Ok(())
    }

    fn tile_names(&self) -> Result<Vec<String>, String> {
        let data = std::fs::read_to_string(&self.cfg.tiles)
            .map_err(|_| format!("No {} file found", self.cfg.tiles.display()))?;
        let names: Vec<String> = data
            .split_whitespace()
            .map(|s| s.to_string())
            .collect();
        if names.is_empty() {
            return Err(format!("{}: no tile names", self.cfg.tiles.display()));
        }
        Ok(names)
    }

    fn adopt_seed_geometry(&mut self, hdr: &MapHeader) {
        self.vm_width = hdr.width as usize;
        self.vm_height = hdr.height as usize;
        self.csize = hdr.cell_size;
    }

    /// Loads the shaded DTM when a background is requested for an
    /// output image.
    fn ensure_background(&mut self) -> Result<(), String> {
        if self.cfg.back_dtm && self.dtm.is_none() {
            self.load_tile_set(true, false)?;
        }
        Ok(())
    }

    fn header(&self) -> MapHeader {
        MapHeader {
            width: self.vm_width as i32,
            height: self.vm_height as i32,
            cell_size: self.csize,
        }
    }

    fn save_shade_map(&self) -> Result<(), String> {
        files::save_byte_map(
            &self.cfg.res_path(config::SLOPE_FILE, config::MAP_SUFFIX),
            self.header(),
            self.shade_map
                .as_ref()
                .ok_or_else(|| "No shading raster loaded".to_string())?,
        )
    }

    fn load_shade_map(&mut self) -> Result<(), String> {
        let (hdr, data) =
            files::load_byte_map(&self.cfg.res_path(config::SLOPE_FILE, config::MAP_SUFFIX))?;
        self.adopt_seed_geometry(&hdr);
        self.shade_map = Some(data);
        Ok(())
    }

    fn save_rorpo_map(&self) -> Result<(), String> {
        files::save_byte_map(
            &self.cfg.res_path(config::RORPO_FILE, config::MAP_SUFFIX),
            self.header(),
            self.rorpo_map
                .as_ref()
                .ok_or_else(|| "No tubular map".to_string())?,
        )
    }

    fn load_rorpo_map(&mut self) -> Result<(), String> {
        let (hdr, data) =
            files::load_byte_map(&self.cfg.res_path(config::RORPO_FILE, config::MAP_SUFFIX))?;
        self.adopt_seed_geometry(&hdr);
        self.rorpo_map = Some(data);
        Ok(())
    }

    fn save_sobel_map(&self) -> Result<(), String> {
        files::save_vector_map(
            &self.cfg.res_path(config::SOBEL_FILE, config::MAP_SUFFIX),
            self.header(),
            self.gmap
                .as_ref()
                .ok_or_else(|| "No gradient map loaded".to_string())?,
        )
    }

    fn load_sobel_map(&mut self) -> Result<(), String> {
        let (hdr, gmap) =
            files::load_vector_map(&self.cfg.res_path(config::SOBEL_FILE, config::MAP_SUFFIX))?;
        self.adopt_seed_geometry(&hdr);
        self.gmap = Some(gmap);
        Ok(())
    }

    fn save_fbsd_segments(&self) -> Result<(), String> {
        files::save_segments(
            &self.cfg.res_path(config::FBSD_FILE, config::FBSD_SUFFIX),
            self.header(),
            &self.dss,
        )
    }

    fn save_seed_file(&self) -> Result<(), String> {
        let seeds = self
            .seeds
            .as_ref()
            .ok_or_else(|| "No seeds to save".to_string())?;
        let path = self.cfg.res_path(config::SEED_FILE, config::SEED_SUFFIX);
        info!("Saving seeds in {}", path.display());
        if self.cfg.half_size_seeds {
            let halved = seeds.halved(self.vm_width, self.vm_height);
            let hdr = MapHeader {
                width: self.vm_width as i32 * 2,
                height: self.vm_height as i32 * 2,
                cell_size: self.csize / 2.0,
            };
            files::save_seeds(&path, hdr, &halved)
        } else {
            files::save_seeds(&path, self.header(), seeds)
        }
    }

    fn save_asd_image(&mut self) -> Result<(), String> {
        self.ensure_background()?;
        render::save_roads_png(
            &self.cfg.res_path(config::ROAD_FILE, config::IM_SUFFIX),
            self.detection_map
                .as_ref()
                .ok_or_else(|| "No detection map".to_string())?,
            self.cfg.false_color,
            self.cfg.color_inversion,
            self.dtm.as_ref().filter(|_| self.cfg.back_dtm),
        )
    }

    fn export_results(&self) -> Result<(), String> {
        if !self.cfg.export {
            return Ok(());
        }
        let ptset = self
            .ptset
            .as_ref()
            .ok_or_else(|| "No tile set loaded".to_string())?;
        let cell_mm = (self.csize * 1000.0) as f64;
        if self.cfg.export_bounds {
            export::export_roads(
                &self.cfg.res_path(config::ROAD_FILE, config::SHAPE_SUFFIX),
                &self.road_sections,
                ptset.xref(),
                ptset.yref(),
                cell_mm,
            )
        } else {
            export::export_road_centers(
                &self.cfg.res_path(config::LINE_FILE, config::SHAPE_SUFFIX),
                &self.road_sections,
                ptset.xref(),
                ptset.yref(),
                cell_mm,
            )
        }
    }
}

