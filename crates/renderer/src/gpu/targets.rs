use hotreload::{OffscreenTarget, Side, Viewport};

/// Storage format for shader channel output.
pub(crate) const FEEDBACK_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

/// Ping-pong pair of offscreen textures for one shader channel.
pub struct FeedbackTarget {
    sides: [(wgpu::Texture, wgpu::TextureView); 2],
    size: Viewport,
    label: String,
}

impl FeedbackTarget {
    pub(crate) fn new(device: &wgpu::Device, label: String, size: Viewport) -> Self {
        Self {
            sides: [
                create_side(device, &label, 0, size),
                create_side(device, &label, 1, size),
            ],
            size,
            label,
        }
    }

    /// Recreates both sides; new textures start zeroed.
    pub(crate) fn resize(&mut self, device: &wgpu::Device, size: Viewport) {
        self.sides = [
            create_side(device, &self.label, 0, size),
            create_side(device, &self.label, 1, size),
        ];
        self.size = size;
    }

    pub(crate) fn view(&self, side: Side) -> &wgpu::TextureView {
        &self.sides[side.index()].1
    }

    pub(crate) fn resolution(&self) -> [f32; 4] {
        let [width, height] = self.size.as_f32();
        [width, height, 1.0, 0.0]
    }
}

impl OffscreenTarget for FeedbackTarget {
    fn size(&self) -> Viewport {
        self.size
    }
}

fn create_side(
    device: &wgpu::Device,
    label: &str,
    index: usize,
    size: Viewport,
) -> (wgpu::Texture, wgpu::TextureView) {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(&format!("{label} side {index}")),
        size: wgpu::Extent3d {
            width: size.width,
            height: size.height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: FEEDBACK_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}
