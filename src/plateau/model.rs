use serde::Serialize;

/// Geometric model of an acceptable carriage-track plateau, shared by
/// every detection of one tracking run.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct PlateauModel {
    /// Minimal plateau length (m).
    pub min_length: f32,
    /// Maximal plateau length (m).
    pub max_length: f32,
    /// Nominal track width used to rank central candidates (m).
    pub start_length: f32,
    /// Height tolerance tau of the ground subset (m).
    pub thickness_tolerance: f32,
    /// Tolerated height drift per scan (m).
    pub slope_tolerance: f32,
    /// Minimal overlap with the reference window, as a fraction of the
    /// reference width.
    pub side_shift_tolerance: f32,
    /// Bounding-step scale; a step of `thickness_tolerance * tilt / 5`
    /// just outside an end marks it bounded.
    pub bs_max_tilt: i32,
    /// Lateral retry shift during tracking (m).
    pub plateau_search_distance: f32,
    /// Lateral probe step for central-plateau trials (m).
    pub first_plateau_search_distance: f32,
    /// Minimal accepted run length at the track tail; 0 disables tail
    /// pruning.
    pub tail_min_size: usize,
    /// Minimal samples in a height window.
    pub min_count: usize,
    /// Maximal sample gap inside a plateau run (m).
    pub max_gap: f32,
    /// Lateral distance probed beyond the run ends for bounds (m).
    pub bound_probe: f32,
    /// Step height closing the track in network mode (m).
    pub impassable_step: f32,
    /// Use the deviation prediction when updating the reference.
    pub deviation_prediction: bool,
    /// Use the slope prediction when updating the reference.
    pub slope_prediction: bool,
    /// Network building mode: full-plateau references, obstacle stops.
    pub net_build: bool,
}

impl Default for PlateauModel {
    fn default() -> Self {
        Self {
            min_length: 2.0,
            max_length: 6.0,
            start_length: 4.0,
            thickness_tolerance: 0.25,
            slope_tolerance: 0.10,
            side_shift_tolerance: 0.5,
            bs_max_tilt: 10,
            plateau_search_distance: 0.5,
            first_plateau_search_distance: 0.5,
            tail_min_size: 0,
            min_count: 3,
            max_gap: 1.0,
            bound_probe: 1.0,
            impassable_step: 1.0,
            deviation_prediction: false,
            slope_prediction: false,
            net_build: false,
        }
    }
}

impl PlateauModel {
    pub fn set_min_length(&mut self, val: f32) {
        if val > 0.0 {
            self.min_length = val;
        }
    }

    pub fn set_max_length(&mut self, val: f32) {
        if val > self.min_length {
            self.max_length = val;
        }
    }

    pub fn set_thickness_tolerance(&mut self, val: f32) {
        if val > 0.0 {
            self.thickness_tolerance = val;
        }
    }

    pub fn set_slope_tolerance(&mut self, val: f32) {
        if val > 0.0 {
            self.slope_tolerance = val;
        }
    }

    pub fn set_side_shift_tolerance(&mut self, val: f32) {
        if val > 0.0 {
            self.side_shift_tolerance = val;
        }
    }

    pub fn set_bs_max_tilt(&mut self, val: i32) {
        if val > 0 {
            self.bs_max_tilt = val;
        }
    }

    pub fn set_tail_min_size(&mut self, val: usize) {
        self.tail_min_size = val;
    }
}
