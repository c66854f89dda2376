use std::time::Instant;

use crate::resource::Viewport;

/// Timing sample for one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameTime {
    pub frame: u64,
    /// Seconds since the first frame.
    pub elapsed: f32,
    /// Seconds since the previous frame; zero on the first frame.
    pub delta: f32,
}

/// Monotonic frame counter and wall-clock timer. The first tick starts the clock.
#[derive(Debug, Default)]
pub struct FrameClock {
    origin: Option<Instant>,
    last: Option<Instant>,
    next_frame: u64,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tick(&mut self, now: Instant) -> FrameTime {
        let origin = *self.origin.get_or_insert(now);
        let delta = self
            .last
            .map(|last| now.saturating_duration_since(last).as_secs_f32())
            .unwrap_or(0.0);
        self.last = Some(now);

        let frame = self.next_frame;
        self.next_frame += 1;
        FrameTime {
            frame,
            elapsed: now.saturating_duration_since(origin).as_secs_f32(),
            delta,
        }
    }

    /// Number of frames ticked so far.
    pub fn frames(&self) -> u64 {
        self.next_frame
    }
}

/// Values shared by every pass of a frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameUniforms {
    pub resolution: Viewport,
    pub frame: u64,
    pub time: f32,
    pub delta: f32,
    /// `xy` = cursor, `zw` = press anchor (zero when released). Normalised to
    /// the window with a bottom-left origin.
    pub pointer: [f32; 4],
}

/// Cursor tracking in window pixel coordinates (top-left origin).
#[derive(Clone, Copy, Debug, Default)]
pub struct PointerState {
    position: Option<[f64; 2]>,
    pressed_anchor: Option<[f64; 2]>,
    is_pressed: bool,
}

impl PointerState {
    pub fn moved(&mut self, x: f64, y: f64) {
        self.position = Some([x, y]);
        if self.is_pressed {
            self.pressed_anchor.get_or_insert([x, y]);
        }
    }

    pub fn pressed(&mut self) {
        self.is_pressed = true;
        if let Some(position) = self.position {
            self.pressed_anchor = Some(position);
        }
    }

    pub fn released(&mut self) {
        self.is_pressed = false;
        self.pressed_anchor = None;
    }

    pub fn normalized(&self, viewport: Viewport) -> [f32; 4] {
        let [width, height] = viewport.as_f32();
        let flip = |[x, y]: [f64; 2]| [x as f32 / width, 1.0 - y as f32 / height];

        let mut data = [0.0; 4];
        if let Some(position) = self.position {
            [data[0], data[1]] = flip(position);
        }
        if let Some(anchor) = self.pressed_anchor {
            [data[2], data[3]] = flip(anchor);
        }
        data
    }
}
