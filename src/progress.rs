/// Smooths jumpy backend percentages into an animated displayed value.
///
/// Driven by a fixed-period timer on the presentation side; each tick moves
/// the displayed value toward the last reported target and snaps once the
/// remaining gap fits in a single step. Purely cosmetic.
#[derive(Debug, Default)]
pub struct Smoother {
    target: f64,
    displayed: f64,
}

const SNAP_GAP: f64 = 0.01;
const MIN_STEP: f64 = 0.5;
const GAIN: f64 = 0.2;

impl Smoother {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the latest raw percentage from the active worker.
    pub fn set_target(&mut self, percent: f64) {
        self.target = percent.clamp(0.0, 100.0);
    }

    /// Starts over for a freshly dispatched item.
    pub fn reset(&mut self) {
        self.target = 0.0;
        self.displayed = 0.0;
    }

    pub fn displayed(&self) -> f64 {
        self.displayed
    }

    /// Advances the displayed value one animation step toward the target.
    /// Steps never overshoot, so repeated ticks converge monotonically.
    pub fn tick(&mut self) -> f64 {
        let gap = self.target - self.displayed;
        let step = (gap.abs() * GAIN).max(MIN_STEP);
        if gap.abs() < SNAP_GAP || step >= gap.abs() {
            self.displayed = self.target;
            return self.displayed;
        }
        self.displayed += if gap > 0.0 { step } else { -step };
        self.displayed = self.displayed.clamp(0.0, 100.0);
        self.displayed
    }
}
