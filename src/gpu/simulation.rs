//! Force simulation on a wgpu device
//!
//! Both kernel phases run as compute passes in a single submission. The pass
//! boundary between `node_force` and `integrate` is the barrier.

use std::sync::Arc;

use tracing::{debug, info};
use wgpu::util::DeviceExt;

use super::shaders::{WORKGROUP_SIZE, force_kernel_shader};
use super::types::{GpuNode, SimulationUniforms};
use crate::backend::{ForceBackend, GraphBuffers};
use crate::error::{LayoutError, LayoutResult};

/// Size of the stand-in buffer bound when an array is empty
const PLACEHOLDER_SIZE: u64 = 16;

/// Device buffers for one loaded graph
struct GraphResources {
    node_buffer: wgpu::Buffer,
    link_buffer: wgpu::Buffer,
    in_adjacency: wgpu::Buffer,
    in_offsets: wgpu::Buffer,
    out_adjacency: wgpu::Buffer,
    out_offsets: wgpu::Buffer,
    staging_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    node_count: u32,
    link_count: u32,
}

impl GraphResources {
    fn destroy(&self) {
        self.node_buffer.destroy();
        self.link_buffer.destroy();
        self.in_adjacency.destroy();
        self.in_offsets.destroy();
        self.out_adjacency.destroy();
        self.out_offsets.destroy();
        self.staging_buffer.destroy();
    }
}

/// GPU-accelerated force simulation
///
/// Holds the device, the two compute pipelines and, once a graph is loaded,
/// its buffers. Loading another graph releases the previous buffers.
pub struct GpuSimulation {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,

    node_force_pipeline: wgpu::ComputePipeline,
    integrate_pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,

    resources: Option<GraphResources>,
}

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

impl GpuSimulation {
    /// Acquire a device and build the compute pipelines
    pub fn new() -> LayoutResult<Self> {
        let (device, queue) = pollster::block_on(Self::create_device())?;
        Ok(Self::with_device(Arc::new(device), Arc::new(queue)))
    }

    /// Build the pipelines on an existing device and queue
    pub fn with_device(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>) -> Self {
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Force Kernel Shader"),
            source: wgpu::ShaderSource::Wgsl(force_kernel_shader().into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Force Kernel Bind Group Layout"),
            entries: &[
                storage_entry(0, false),
                storage_entry(1, true),
                storage_entry(2, true),
                storage_entry(3, true),
                storage_entry(4, true),
                wgpu::BindGroupLayoutEntry {
                    binding: 5,
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
            label: Some("Force Kernel Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let node_force_pipeline =
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some("Node Force Pipeline"),
                layout: Some(&pipeline_layout),
                module: &module,
                entry_point: Some("node_force"),
                compilation_options: Default::default(),
                cache: None,
            });

        let integrate_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Integrate Pipeline"),
            layout: Some(&pipeline_layout),
            module: &module,
            entry_point: Some("integrate"),
            compilation_options: Default::default(),
            cache: None,
        });

        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Simulation Uniform Buffer"),
            contents: bytemuck::bytes_of(&SimulationUniforms::default()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        Self {
            device,
            queue,
            node_force_pipeline,
            integrate_pipeline,
            bind_group_layout,
            uniform_buffer,
            resources: None,
        }
    }

    async fn create_device() -> LayoutResult<(wgpu::Device, wgpu::Queue)> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| LayoutError::DeviceResource("no suitable GPU adapter".to_string()))?;

        info!(adapter = %adapter.get_info().name, "using GPU adapter");

        adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Force Simulation Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: wgpu::MemoryHints::default(),
                },
                None,
            )
            .await
            .map_err(|e| LayoutError::DeviceResource(e.to_string()))
    }

    pub fn device(&self) -> &Arc<wgpu::Device> {
        &self.device
    }

    pub fn queue(&self) -> &Arc<wgpu::Queue> {
        &self.queue
    }

    /// The node storage buffer, if a graph is loaded
    pub fn node_buffer(&self) -> Option<&wgpu::Buffer> {
        self.resources.as_ref().map(|r| &r.node_buffer)
    }

    /// The link storage buffer, if a graph is loaded
    pub fn link_buffer(&self) -> Option<&wgpu::Buffer> {
        self.resources.as_ref().map(|r| &r.link_buffer)
    }

    fn storage_buffer(&self, label: &str, contents: &[u8], usage: wgpu::BufferUsages) -> wgpu::Buffer {
        let usage = usage | wgpu::BufferUsages::STORAGE;
        if contents.is_empty() {
            self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: PLACEHOLDER_SIZE,
                usage,
                mapped_at_creation: false,
            })
        } else {
            self.device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(label),
                    contents,
                    usage,
                })
        }
    }

    fn create_resources(&self, buffers: &GraphBuffers) -> GraphResources {
        let node_bytes: &[u8] = bytemuck::cast_slice(&buffers.nodes);
        let node_buffer = self.storage_buffer(
            "Node Buffer",
            node_bytes,
            wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::COPY_SRC,
        );
        let link_buffer = self.storage_buffer(
            "Link Buffer",
            bytemuck::cast_slice(&buffers.links),
            wgpu::BufferUsages::COPY_DST,
        );
        let in_adjacency = self.storage_buffer(
            "In Adjacency Buffer",
            bytemuck::cast_slice(&buffers.in_adjacency),
            wgpu::BufferUsages::empty(),
        );
        let in_offsets = self.storage_buffer(
            "In Offsets Buffer",
            bytemuck::cast_slice(&buffers.in_offsets),
            wgpu::BufferUsages::empty(),
        );
        let out_adjacency = self.storage_buffer(
            "Out Adjacency Buffer",
            bytemuck::cast_slice(&buffers.out_adjacency),
            wgpu::BufferUsages::empty(),
        );
        let out_offsets = self.storage_buffer(
            "Out Offsets Buffer",
            bytemuck::cast_slice(&buffers.out_offsets),
            wgpu::BufferUsages::empty(),
        );

        let staging_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Node Staging Buffer"),
            size: (node_bytes.len() as u64).max(PLACEHOLDER_SIZE),
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Force Kernel Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: node_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: in_adjacency.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: in_offsets.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: out_adjacency.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: out_offsets.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: self.uniform_buffer.as_entire_binding(),
                },
            ],
        });

        GraphResources {
            node_buffer,
            link_buffer,
            in_adjacency,
            in_offsets,
            out_adjacency,
            out_offsets,
            staging_buffer,
            bind_group,
            node_count: buffers.node_count() as u32,
            link_count: buffers.link_count() as u32,
        }
    }
}

impl ForceBackend for GpuSimulation {
    fn name(&self) -> &'static str {
        "gpu"
    }

    fn load(&mut self, buffers: GraphBuffers) -> LayoutResult<()> {
        debug!(
            nodes = buffers.node_count(),
            links = buffers.link_count(),
            "uploading graph to device"
        );

        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let resources = self.create_resources(&buffers);
        let validation = pollster::block_on(self.device.pop_error_scope());
        let out_of_memory = pollster::block_on(self.device.pop_error_scope());

        if let Some(error) = validation.or(out_of_memory) {
            resources.destroy();
            return Err(LayoutError::DeviceResource(error.to_string()));
        }

        if let Some(previous) = self.resources.replace(resources) {
            previous.destroy();
        }
        Ok(())
    }

    fn step(&mut self, uniforms: &SimulationUniforms) {
        let Some(resources) = self.resources.as_ref() else {
            return;
        };
        if resources.node_count == 0 {
            return;
        }

        self.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(uniforms));

        let workgroups = resources.node_count.div_ceil(WORKGROUP_SIZE);
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Force Simulation Encoder"),
            });

        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Node Force Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.node_force_pipeline);
            pass.set_bind_group(0, &resources.bind_group, &[]);
            pass.dispatch_workgroups(workgroups, 1, 1);
        }

        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Integration Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.integrate_pipeline);
            pass.set_bind_group(0, &resources.bind_group, &[]);
            pass.dispatch_workgroups(workgroups, 1, 1);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
    }

    fn read_nodes(&mut self) -> LayoutResult<Vec<GpuNode>> {
        let Some(resources) = self.resources.as_ref() else {
            return Ok(Vec::new());
        };
        if resources.node_count == 0 {
            return Ok(Vec::new());
        }

        let size = (resources.node_count as usize * std::mem::size_of::<GpuNode>()) as u64;

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Read Nodes Encoder"),
            });
        encoder.copy_buffer_to_buffer(
            &resources.node_buffer,
            0,
            &resources.staging_buffer,
            0,
            size,
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let buffer_slice = resources.staging_buffer.slice(..size);
        let (tx, rx) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = self.device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|e| LayoutError::DeviceResource(e.to_string()))?
            .map_err(|e| LayoutError::DeviceResource(e.to_string()))?;

        let data = buffer_slice.get_mapped_range();
        let nodes: Vec<GpuNode> = bytemuck::cast_slice(&data).to_vec();
        drop(data);
        resources.staging_buffer.unmap();

        Ok(nodes)
    }

    fn node_count(&self) -> usize {
        self.resources.as_ref().map_or(0, |r| r.node_count as usize)
    }

    fn link_count(&self) -> usize {
        self.resources.as_ref().map_or(0, |r| r.link_count as usize)
    }
}

impl Drop for GpuSimulation {
    fn drop(&mut self) {
        if let Some(resources) = self.resources.take() {
            resources.destroy();
        }
        self.uniform_buffer.destroy();
    }
}
