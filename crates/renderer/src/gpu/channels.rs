use anyhow::{Context, Result};
use image::imageops::{flip_vertical_in_place, resize, FilterType};
use image::{GenericImageView, RgbaImage};
use wgpu::util::{DeviceExt, TextureDataOrder};

/// Image channel uploaded to the GPU.
pub struct ChannelTexture {
    pub _texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub resolution: [f32; 4],
}

pub(crate) fn create_sampler(device: &wgpu::Device) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("channel sampler"),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::FilterMode::Linear,
        ..Default::default()
    })
}

/// Bound to channel slots that have nothing registered.
pub(crate) fn create_placeholder_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
) -> ChannelTexture {
    upload_rgba(device, queue, "placeholder channel texture", 1, 1, 1, &[0, 0, 0, 255])
}

/// Decodes an image and uploads it flipped so `uv.y = 0` samples the bottom
/// row, with a full mip chain for the trilinear sampler.
pub(crate) fn load_texture_channel(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    label: &str,
    bytes: &[u8],
) -> Result<ChannelTexture> {
    let image = image::load_from_memory(bytes).context("failed to decode image")?;
    let (width, height) = image.dimensions();
    let max_dimension = device.limits().max_texture_dimension_2d;
    if width > max_dimension || height > max_dimension {
        anyhow::bail!(
            "image is {width}x{height}, GPU max texture dimension is {max_dimension}"
        );
    }
    let mut rgba = image.to_rgba8();
    flip_vertical_in_place(&mut rgba);
    let (levels, data) = mip_chain(rgba);
    Ok(upload_rgba(device, queue, label, width, height, levels, &data))
}

fn mip_level_count(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

/// Returns the level count and every level packed back to back, base first.
fn mip_chain(base: RgbaImage) -> (u32, Vec<u8>) {
    let (width, height) = base.dimensions();
    let levels = mip_level_count(width, height);
    let mut previous = base;
    let mut data = previous.as_raw().clone();
    for level in 1..levels {
        let level_width = (width >> level).max(1);
        let level_height = (height >> level).max(1);
        previous = resize(&previous, level_width, level_height, FilterType::Triangle);
        data.extend_from_slice(previous.as_raw());
    }
    (levels, data)
}

fn upload_rgba(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    label: &str,
    width: u32,
    height: u32,
    mip_level_count: u32,
    data: &[u8],
) -> ChannelTexture {
    let texture = device.create_texture_with_data(
        queue,
        &wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        },
        TextureDataOrder::LayerMajor,
        data,
    );
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

    ChannelTexture {
        _texture: texture,
        view,
        resolution: [width as f32, height as f32, 1.0, 0.0],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mip_levels_reach_one_pixel() {
        assert_eq!(mip_level_count(1, 1), 1);
        assert_eq!(mip_level_count(256, 256), 9);
        assert_eq!(mip_level_count(300, 20), 9);
    }

    #[test]
    fn mip_chain_packs_every_level() {
        let (levels, data) = mip_chain(RgbaImage::from_pixel(8, 2, image::Rgba([9, 9, 9, 255])));
        assert_eq!(levels, 4);
        // 8x2, 4x1, 2x1, 1x1
        assert_eq!(data.len(), (16 + 4 + 2 + 1) * 4);
        assert!(data.chunks(4).all(|pixel| pixel == [9, 9, 9, 255]));
    }
}
