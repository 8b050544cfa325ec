use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Pipeline step selected on the command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    /// Full automatic run: sawing then detection.
    All,
    /// Seed production only (shade to seeds, pad by pad).
    Sawing,
    Shade,
    Rorpo,
    Sobel,
    Fbsd,
    Seeds,
    Asd,
    /// Hill-shading image only.
    Hill,
    /// Dump the loaded seed buckets.
    SeedCheck,
}

/// Base names of the persisted artefacts, all under the results
/// directory.
pub const SLOPE_FILE: &str = "shade";
pub const RORPO_FILE: &str = "rorpo";
pub const SOBEL_FILE: &str = "sobel";
pub const FBSD_FILE: &str = "fbsd";
pub const SEED_FILE: &str = "seeds";
pub const SUCCESS_SEED_FILE: &str = "sucseeds";
pub const ROAD_FILE: &str = "roads";
pub const LINE_FILE: &str = "road_lines";
pub const DETECTOR_FILE: &str = "autodet";
pub const HILL_FILE: &str = "hill";

pub const MAP_SUFFIX: &str = ".map";
pub const FBSD_SUFFIX: &str = ".fbsd";
pub const SEED_SUFFIX: &str = ".pts";
pub const IM_SUFFIX: &str = ".png";
pub const TEXT_SUFFIX: &str = ".txt";
pub const SHAPE_SUFFIX: &str = ".shp";

/// Tool configuration: the optional `config.json` in the working
/// directory, overridden by command-line flags.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Directory of DTM normal-map tiles.
    pub nvm_dir: PathBuf,
    /// Directory of point tiles.
    pub til_dir: PathBuf,
    /// Text file listing the tile nick names, one per line.
    pub tiles: PathBuf,
    /// Results directory for every intermediate artefact.
    pub res_dir: PathBuf,
    /// Maximal blurred segment thickness (pixels).
    pub max_bs_thickness: f64,
    /// Minimal blurred segment length (pixels).
    pub min_bs_length: i32,
    /// Along-segment seed sampling step (pixels).
    pub seed_shift: i32,
    /// Seed stroke width (pixels).
    pub seed_width: i32,
    /// Pad side in tiles (odd); 0 processes the whole map at once.
    pub pad_size: usize,
    /// Point tile residency budget in bytes; 0 loads everything.
    pub buffer_size: usize,
    /// Tail pruning minimum; absent keeps the detector default.
    pub tail_min_size: Option<usize>,
    /// Skip the tubular filter step entirely.
    pub skip_rorpo: bool,
    /// Keep only plateaux connected to an accepted neighbour.
    pub connected: bool,
    /// Emit seeds at doubled resolution.
    pub half_size_seeds: bool,
    /// Dump a PNG of each produced step output.
    pub out_map: bool,
    /// Draw outputs over the shaded DTM.
    pub back_dtm: bool,
    /// One random colour per road.
    pub false_color: bool,
    /// Swap road and background polarity in output images.
    pub color_inversion: bool,
    /// Export shapefiles after detection.
    pub export: bool,
    /// Export road bounds instead of centerlines.
    pub export_bounds: bool,
    pub verbose: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            nvm_dir: PathBuf::from("nvm"),
            til_dir: PathBuf::from("til"),
            tiles: PathBuf::from("tiles.txt"),
            res_dir: PathBuf::from("steps"),
            max_bs_thickness: 7.0,
            min_bs_length: 80,
            seed_shift: 24,
            seed_width: 40,
            pad_size: 0,
            buffer_size: 0,
            tail_min_size: None,
            skip_rorpo: false,
            connected: false,
            half_size_seeds: false,
            out_map: false,
            back_dtm: false,
            false_color: false,
            color_inversion: false,
            export: false,
            export_bounds: false,
            verbose: false,
        }
    }
}

impl RunConfig {
    /// Loads `config.json` when present, else the defaults.
    pub fn load(dir: &Path) -> Result<Self, String> {
        let path = dir.join("config.json");
        if !path.is_file() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(&path)
            .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
        serde_json::from_str(&data)
            .map_err(|e| format!("Failed to parse {}: {e}", path.display()))
    }

    /// Path of a result artefact.
    pub fn res_path(&self, base: &str, suffix: &str) -> PathBuf {
        self.res_dir.join(format!("{base}{suffix}"))
    }
}
