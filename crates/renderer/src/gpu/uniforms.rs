use bytemuck::{Pod, Zeroable};
use chrono::{Datelike, Local, Timelike};
use hotreload::FrameUniforms;
use preprocess::CHANNEL_COUNT;

/// CPU mirror of the `ShaderInputs` std140 block injected by the preprocessor.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub(crate) struct ShaderInputs {
    pub i_resolution: [f32; 3],
    pub i_time: f32,
    pub i_time_delta: f32,
    pub i_frame: i32,
    pub _padding0: [f32; 2],
    pub i_mouse: [f32; 4],
    pub i_date: [f32; 4],
    pub i_channel_resolution: [[f32; 4]; CHANNEL_COUNT],
}

impl ShaderInputs {
    /// Builds the block for one frame. `iMouse` is scaled back to pixels so
    /// shaders written against ShaderToy conventions keep working.
    pub fn from_frame(frame: &FrameUniforms, channel_resolution: [[f32; 4]; CHANNEL_COUNT]) -> Self {
        let [width, height] = frame.resolution.as_f32();
        let [x, y, anchor_x, anchor_y] = frame.pointer;
        Self {
            i_resolution: [width, height, 1.0],
            i_time: frame.time,
            i_time_delta: frame.delta,
            i_frame: frame.frame.min(i32::MAX as u64) as i32,
            _padding0: [0.0; 2],
            i_mouse: [x * width, y * height, anchor_x * width, anchor_y * height],
            i_date: current_date(),
            i_channel_resolution: channel_resolution,
        }
    }
}

fn current_date() -> [f32; 4] {
    let local_now = Local::now();
    let seconds_since_midnight = local_now.num_seconds_from_midnight() as f32
        + local_now.nanosecond() as f32 / 1_000_000_000.0;
    [
        local_now.year() as f32,
        local_now.month() as f32,
        local_now.day() as f32,
        seconds_since_midnight,
    ]
}
