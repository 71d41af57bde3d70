//! Dot product backends for the batched cosine search.

use std::borrow::Cow;
use std::future::Future;
#[cfg(not(target_arch = "wasm32"))]
use std::sync::mpsc;

#[cfg(not(target_arch = "wasm32"))]
use bevy::prelude::*;
#[cfg(not(target_arch = "wasm32"))]
use bytemuck::{Pod, Zeroable};
#[cfg(not(target_arch = "wasm32"))]
use constants::knn::DOT_PRODUCT_WORKGROUP_SIZE;
#[cfg(not(target_arch = "wasm32"))]
use wgpu::util::DeviceExt;

use crate::engine::math::vector::dot;
use crate::error::KnnError;

/// Accelerated numeric backend for the block-vs-all dot products.
///
/// The full matrix is uploaded once. Each block call returns the products
/// of every uploaded row with rows `offset..offset + len`, row-major as an
/// `rows × len` matrix: entry `j * len + i` is `dot(row j, row offset + i)`.
pub trait DotProductBackend: Send {
    fn upload(
        &mut self,
        matrix: &[f32],
        rows: usize,
        dim: usize,
    ) -> impl Future<Output = Result<(), KnnError>> + Send;

    fn block_dot_products(
        &mut self,
        offset: usize,
        len: usize,
    ) -> impl Future<Output = Result<Vec<f32>, KnnError>> + Send;

    /// Frees the uploaded matrix. Safe to call when nothing is uploaded.
    fn release(&mut self);
}

/// Plain CPU implementation, used headless and as the reference in tests.
#[derive(Default, Debug, Clone)]
pub struct CpuDotProduct {
    matrix: Vec<f32>,
    rows: usize,
    dim: usize,
}

impl DotProductBackend for CpuDotProduct {
    fn upload(
        &mut self,
        matrix: &[f32],
        rows: usize,
        dim: usize,
    ) -> impl Future<Output = Result<(), KnnError>> + Send {
        let result = check_shape(matrix, rows, dim).map(|()| {
            self.matrix = matrix.to_vec();
            self.rows = rows;
            self.dim = dim;
        });
        async move { result }
    }

    fn block_dot_products(
        &mut self,
        offset: usize,
        len: usize,
    ) -> impl Future<Output = Result<Vec<f32>, KnnError>> + Send {
        let result = if self.rows == 0 {
            Err(KnnError::NotUploaded)
        } else {
            let dim = self.dim;
            let row = |index: usize| &self.matrix[index * dim..(index + 1) * dim];
            let mut out = Vec::with_capacity(self.rows * len);
            for j in 0..self.rows {
                for i in 0..len {
                    out.push(dot(row(j), row(offset + i)));
                }
            }
            Ok(out)
        };
        async move { result }
    }

    fn release(&mut self) {
        self.matrix = Vec::new();
        self.rows = 0;
        self.dim = 0;
    }
}

fn check_shape(matrix: &[f32], rows: usize, dim: usize) -> Result<(), KnnError> {
    if matrix.len() != rows * dim {
        return Err(KnnError::ShapeMismatch {
            expected: rows * dim,
            actual: matrix.len(),
        });
    }
    Ok(())
}

#[cfg(not(target_arch = "wasm32"))]
const DOT_PRODUCT_SHADER: &str = r#"
struct Params {
    rows: u32,
    dim: u32,
    offset: u32,
    block: u32,
    row_stride: u32,
    _pad0: u32,
    _pad1: u32,
    _pad2: u32,
};

@group(0) @binding(0) var<storage, read> matrix: array<f32>;
@group(0) @binding(1) var<storage, read_write> result: array<f32>;
@group(0) @binding(2) var<uniform> params: Params;

@compute @workgroup_size(64)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    let idx = gid.x + gid.y * params.row_stride;
    if (idx >= params.rows * params.block) {
        return;
    }
    let a = (idx / params.block) * params.dim;
    let b = (params.offset + idx % params.block) * params.dim;
    var acc = 0.0;
    for (var d = 0u; d < params.dim; d = d + 1u) {
        acc = acc + matrix[a + d] * matrix[b + d];
    }
    result[idx] = acc;
}
"#;

#[cfg(not(target_arch = "wasm32"))]
const MAX_WORKGROUPS_PER_DIMENSION: u32 = 65_535;

#[cfg(not(target_arch = "wasm32"))]
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct DotParams {
    rows: u32,
    dim: u32,
    offset: u32,
    block: u32,
    row_stride: u32,
    _padding: [u32; 3],
}

#[cfg(not(target_arch = "wasm32"))]
struct UploadedMatrix {
    buffer: wgpu::Buffer,
    rows: usize,
    dim: usize,
}

#[cfg(not(target_arch = "wasm32"))]
/// wgpu compute backend. Native only: readback blocks on `Device::poll`.
pub struct WgpuDotProduct {
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    matrix: Option<UploadedMatrix>,
}

#[cfg(not(target_arch = "wasm32"))]
impl WgpuDotProduct {
    /// Requests a headless device and compiles the dot product pipeline.
    pub async fn new() -> Result<Self, KnnError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(KnnError::AdapterUnavailable)?;

        let info = adapter.get_info();
        info!("KNN backend: {} ({:?})", info.name, info.backend);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("knn_device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: adapter.limits(),
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )
            .await
            .map_err(|e| KnnError::DeviceRequest(e.to_string()))?;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("knn_dot_product_shader"),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(DOT_PRODUCT_SHADER)),
        });

        let storage_entry = |binding: u32, read_only: bool| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("knn_bind_group_layout"),
            entries: &[
                storage_entry(0, true),
                storage_entry(1, false),
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
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
            label: Some("knn_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("knn_dot_product_pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        Ok(Self {
            device,
            queue,
            pipeline,
            bind_group_layout,
            matrix: None,
        })
    }

    fn storage_limit(&self) -> u64 {
        let limits = self.device.limits();
        u64::from(limits.max_storage_buffer_binding_size).min(limits.max_buffer_size)
    }

    async fn pop_errors(&self) -> Result<(), KnnError> {
        // Scopes are popped in reverse push order.
        if let Some(err) = self.device.pop_error_scope().await {
            return Err(KnnError::Device(err.to_string()));
        }
        if let Some(err) = self.device.pop_error_scope().await {
            return Err(KnnError::Device(err.to_string()));
        }
        Ok(())
    }

    fn push_errors(&self) {
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
    }

    fn dispatch_block(
        &self,
        uploaded: &UploadedMatrix,
        offset: usize,
        len: usize,
    ) -> Result<Vec<f32>, KnnError> {
        let total = uploaded.rows * len;
        let result_size = (total * std::mem::size_of::<f32>()) as u64;
        let limit = self.storage_limit();
        if result_size > limit {
            return Err(KnnError::TooLarge {
                bytes: result_size,
                limit,
            });
        }

        let workgroup_size = DOT_PRODUCT_WORKGROUP_SIZE;
        let groups = (total as u32).div_ceil(workgroup_size).max(1);
        let groups_x = groups.min(MAX_WORKGROUPS_PER_DIMENSION);
        let groups_y = groups.div_ceil(groups_x);

        let params = DotParams {
            rows: uploaded.rows as u32,
            dim: uploaded.dim as u32,
            offset: offset as u32,
            block: len as u32,
            row_stride: groups_x * workgroup_size,
            _padding: [0; 3],
        };
        let params_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("knn_params"),
                contents: bytemuck::bytes_of(&params),
                usage: wgpu::BufferUsages::UNIFORM,
            });
        let result_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("knn_block_result"),
            size: result_size,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let readback_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("knn_block_readback"),
            size: result_size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("knn_bind_group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uploaded.buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: result_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: params_buffer.as_entire_binding(),
                },
            ],
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("knn_block_encoder"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("knn_block_pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(groups_x, groups_y, 1);
        }
        encoder.copy_buffer_to_buffer(&result_buffer, 0, &readback_buffer, 0, result_size);
        self.queue.submit(Some(encoder.finish()));

        let slice = readback_buffer.slice(..);
        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |res| {
            let _ = tx.send(res);
        });
        let _ = self.device.poll(wgpu::Maintain::Wait);

        let mapped = rx
            .recv()
            .map_err(|e| KnnError::BufferMap(e.to_string()))?
            .map_err(|e| KnnError::BufferMap(e.to_string()));

        let dots = mapped.map(|()| {
            let data = slice.get_mapped_range();
            let values = bytemuck::cast_slice::<u8, f32>(&data).to_vec();
            drop(data);
            readback_buffer.unmap();
            values
        });

        params_buffer.destroy();
        result_buffer.destroy();
        readback_buffer.destroy();
        dots
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl DotProductBackend for WgpuDotProduct {
    fn upload(
        &mut self,
        matrix: &[f32],
        rows: usize,
        dim: usize,
    ) -> impl Future<Output = Result<(), KnnError>> + Send {
        async move {
            check_shape(matrix, rows, dim)?;
            let bytes = std::mem::size_of_val(matrix) as u64;
            let limit = self.storage_limit();
            if bytes > limit {
                return Err(KnnError::TooLarge { bytes, limit });
            }

            self.release();
            self.push_errors();
            let buffer = self
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("knn_matrix"),
                    contents: bytemuck::cast_slice(matrix),
                    usage: wgpu::BufferUsages::STORAGE,
                });
            self.pop_errors().await?;

            debug!("Uploaded {}x{} matrix for KNN ({} bytes)", rows, dim, bytes);
            self.matrix = Some(UploadedMatrix { buffer, rows, dim });
            Ok(())
        }
    }

    fn block_dot_products(
        &mut self,
        offset: usize,
        len: usize,
    ) -> impl Future<Output = Result<Vec<f32>, KnnError>> + Send {
        async move {
            let uploaded = self.matrix.as_ref().ok_or(KnnError::NotUploaded)?;
            self.push_errors();
            let dots = self.dispatch_block(uploaded, offset, len);
            self.pop_errors().await?;
            dots
        }
    }

    fn release(&mut self) {
        if let Some(uploaded) = self.matrix.take() {
            uploaded.buffer.destroy();
        }
    }
}
