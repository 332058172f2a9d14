use log::{debug, info};
use std::borrow::Cow;
use wgpu::PollType;

use crate::{
    enums::Filtering,
    renderer::{FrameBuffer, RenderError, Renderer},
    volume::Volume,
};

/// Device and queue the renderer submits to.
pub struct Gpu {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

/// Which adapter to open.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DeviceSelection {
    /// Let wgpu pick the highest performance adapter.
    #[default]
    HighPerformance,
    /// Index into the adapter enumeration order.
    Index(usize),
}

impl Gpu {
    pub async fn new(selection: DeviceSelection) -> Result<Self, RenderError> {
        let instance = wgpu::Instance::default();

        let adapter = match selection {
            DeviceSelection::Index(index) => {
                let mut adapters = instance.enumerate_adapters(wgpu::Backends::all());
                let available = adapters.len();
                if index >= available {
                    return Err(RenderError::InvalidDevice { index, available });
                }
                adapters.swap_remove(index)
            }
            DeviceSelection::HighPerformance => instance
                .request_adapter(&wgpu::RequestAdapterOptions {
                    power_preference: wgpu::PowerPreference::HighPerformance,
                    compatible_surface: None,
                    force_fallback_adapter: false,
                })
                .await
                .map_err(|e| RenderError::NoAdapter(e.to_string()))?,
        };

        let adapter_info = adapter.get_info();
        info!(
            "Using GPU adapter '{}' ({:?}, {:?})",
            adapter_info.name, adapter_info.device_type, adapter_info.backend
        );

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Volume Slice Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults()
                    .using_resolution(adapter.limits()),
                ..Default::default()
            })
            .await?;

        Ok(Self { device, queue })
    }
}

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct Params {
    output_width: u32,
    output_height: u32,
    cursor: f32,
    _padding: u32,
}

struct OutputBuffers {
    size: (u32, u32),
    storage: wgpu::Buffer,
    staging: wgpu::Buffer,
}

impl OutputBuffers {
    fn byte_len(size: (u32, u32)) -> u64 {
        size.0 as u64 * size.1 as u64 * std::mem::size_of::<u32>() as u64
    }
}

const WORKGROUP_SIZE: u32 = 8;

/// Frame size in device units, or `FrameTooLarge` if the output buffer or the
/// dispatch would exceed `limits`.
fn output_size(
    width: usize,
    height: usize,
    limits: &wgpu::Limits,
) -> Result<(u32, u32), RenderError> {
    let too_large = || RenderError::FrameTooLarge { width, height };
    let size = (
        u32::try_from(width).map_err(|_| too_large())?,
        u32::try_from(height).map_err(|_| too_large())?,
    );

    let max_bytes = u64::from(limits.max_storage_buffer_binding_size).min(limits.max_buffer_size);
    let groups = size.0.div_ceil(WORKGROUP_SIZE).max(size.1.div_ceil(WORKGROUP_SIZE));
    if OutputBuffers::byte_len(size) > max_bytes
        || groups > limits.max_compute_workgroups_per_dimension
    {
        return Err(too_large());
    }
    Ok(size)
}

/// Resamples slices of a volume held in a 3D texture with a compute kernel.
pub struct GpuRenderer {
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    volume_view: wgpu::TextureView,
    linear_sampler: wgpu::Sampler,
    nearest_sampler: wgpu::Sampler,
    params_buffer: wgpu::Buffer,
    output: Option<OutputBuffers>,
    filtering: Filtering,
}

impl GpuRenderer {
    pub fn new(volume: &Volume, gpu: Gpu, filtering: Filtering) -> Result<Self, RenderError> {
        let (depth, height, width) = volume.dim();
        let Gpu { device, queue } = gpu;

        let max_extent = device.limits().max_texture_dimension_3d as usize;
        if volume.is_empty() || depth.max(height).max(width) > max_extent {
            return Err(RenderError::VolumeTooLarge(volume.dim()));
        }
        let (depth, height, width) = (depth as u32, height as u32, width as u32);

        let texture_size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: depth,
        };

        let volume_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Volume 3D Texture"),
            size: texture_size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D3,
            format: wgpu::TextureFormat::R8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        // Upload volume data
        let voxels: Vec<u8> = volume.data().iter().copied().collect();
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &volume_texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &voxels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width),
                rows_per_image: Some(height),
            },
            texture_size,
        );

        let volume_view = volume_texture.create_view(&wgpu::TextureViewDescriptor::default());

        let sampler = |label, filter| {
            device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some(label),
                address_mode_u: wgpu::AddressMode::Repeat,
                address_mode_v: wgpu::AddressMode::Repeat,
                address_mode_w: wgpu::AddressMode::Repeat,
                mag_filter: filter,
                min_filter: filter,
                mipmap_filter: wgpu::FilterMode::Nearest,
                ..Default::default()
            })
        };
        let linear_sampler = sampler("Volume Linear Sampler", wgpu::FilterMode::Linear);
        let nearest_sampler = sampler("Volume Nearest Sampler", wgpu::FilterMode::Nearest);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Volume Slice Shader"),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(include_str!(
                "shaders/volume_slice.wgsl"
            ))),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Volume Slice Bind Group Layout"),
            entries: &[
                // 3D texture
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D3,
                        multisampled: false,
                    },
                    count: None,
                },
                // Sampler
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                // Output buffer
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: false },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                // Uniforms
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Volume Slice Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Volume Slice Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        let params_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Slice Params Buffer"),
            size: std::mem::size_of::<Params>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Ok(Self {
            device,
            queue,
            pipeline,
            bind_group_layout,
            volume_view,
            linear_sampler,
            nearest_sampler,
            params_buffer,
            output: None,
            filtering,
        })
    }

    fn output_buffers(&mut self, size: (u32, u32)) -> (wgpu::Buffer, wgpu::Buffer) {
        if let Some(buffers) = self.output.as_ref().filter(|buffers| buffers.size == size) {
            return (buffers.storage.clone(), buffers.staging.clone());
        }

        debug!("Allocating slice output buffers for {}x{}", size.0, size.1);
        let byte_len = OutputBuffers::byte_len(size);
        let storage = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Output Buffer"),
            size: byte_len,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Staging Buffer"),
            size: byte_len,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        self.output = Some(OutputBuffers {
            size,
            storage: storage.clone(),
            staging: staging.clone(),
        });
        (storage, staging)
    }
}

impl Renderer for GpuRenderer {
    fn render(&mut self, cursor: f32, output: &mut FrameBuffer) -> Result<(), RenderError> {
        output.check_size()?;
        if output.is_empty() {
            return Ok(());
        }
        let size = output_size(output.width, output.height, &self.device.limits())?;

        let params = Params {
            output_width: size.0,
            output_height: size.1,
            cursor,
            _padding: 0,
        };
        self.queue
            .write_buffer(&self.params_buffer, 0, bytemuck::bytes_of(&params));

        let byte_len = OutputBuffers::byte_len(size);
        let (storage, staging) = self.output_buffers(size);
        let sampler = match self.filtering {
            Filtering::Linear => &self.linear_sampler,
            Filtering::Nearest => &self.nearest_sampler,
        };

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Volume Slice Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&self.volume_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: storage.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: self.params_buffer.as_entire_binding(),
                },
            ],
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Volume Slice Encoder"),
            });
        {
            let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Volume Slice Pass"),
                timestamp_writes: None,
            });
            compute_pass.set_pipeline(&self.pipeline);
            compute_pass.set_bind_group(0, &bind_group, &[]);
            let dispatch_x = size.0.div_ceil(WORKGROUP_SIZE);
            let dispatch_y = size.1.div_ceil(WORKGROUP_SIZE);
            compute_pass.dispatch_workgroups(dispatch_x, dispatch_y, 1);
        }
        encoder.copy_buffer_to_buffer(&storage, 0, &staging, 0, byte_len);
        self.queue.submit(Some(encoder.finish()));

        let buffer_slice = staging.slice(..);
        let (sender, receiver) = futures::channel::oneshot::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.device.poll(PollType::Wait {
            submission_index: None,
            timeout: None,
        })?;
        futures::executor::block_on(receiver).map_err(|_| RenderError::MapCancelled)??;

        {
            let data = buffer_slice.get_mapped_range();
            output.pixels.copy_from_slice(bytemuck::cast_slice(&data));
        }
        staging.unmap();
        Ok(())
    }

    fn set_filtering(&mut self, filtering: Filtering) {
        self.filtering = filtering;
    }
}
