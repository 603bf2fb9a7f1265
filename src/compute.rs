//! Running kernels on a compute device.
use core::iter::once;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use wgpu::util::DeviceExt as _;
use wgpu::{Device, Queue};

use crate::backend::{check_staging, Backend};
use crate::buffer::BufferLayout;
use crate::config::Options;
use crate::error::{ContextError, DispatchError, TransformError};
use crate::kernel::{Kernel, KernelKey};
use crate::shaders::{self, WORKGROUP_SIZE};
use crate::util::block_on;
use crate::util::ping_future::Ping;

/// A device, its queue, and the compiled kernels.
///
/// Creating this is expensive, so it is meant to live as long as the process uses it. Each
/// dispatch creates its own allocations, which are dropped when the dispatch returns. Nothing
/// but compiled pipelines is kept between dispatches.
pub struct ComputeContext {
    gpu: Gpu,
    info: wgpu::AdapterInfo,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    pipelines: Mutex<HashMap<KernelKey, Arc<wgpu::ComputePipeline>>>,
    /// Serializes dispatches so that their error scopes stay apart.
    submission: Mutex<()>,
}

pub(crate) struct Gpu {
    pub(crate) device: Device,
    pub(crate) queue: Queue,
}

/// A device-visible buffer holding a packed grid.
pub(crate) struct Allocation {
    buffer: wgpu::Buffer,
    size: u64,
}

impl ComputeContext {
    /// Select an adapter according to the options and set up a device on it.
    pub fn new(options: &Options) -> Result<Self, ContextError> {
        let instance = wgpu::Instance::new(options.instance_descriptor());
        let adapter = block_on(instance.request_adapter(&options.adapter_options()), None)
            .ok_or_else(ContextError::no_adapter)?;
        Self::with_adapter(&adapter)
    }

    /// Set up a device on a specific adapter.
    pub fn with_adapter(adapter: &wgpu::Adapter) -> Result<Self, ContextError> {
        let info = adapter.get_info();
        let downlevel = adapter.get_downlevel_capabilities();

        if !downlevel.flags.contains(wgpu::DownlevelFlags::COMPUTE_SHADERS) {
            return Err(ContextError::no_compute_shaders(info.name));
        }

        log::debug!("Requesting device on {} ({:?})", info.name, info.backend);
        let descriptor = Self::device_descriptor(adapter);
        let (device, queue) = block_on(adapter.request_device(&descriptor, None), None)?;

        device.on_uncaptured_error(Box::new(|err: wgpu::Error| {
            log::error!("Uncaptured device error: {}", err);
        }));

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("pixel-bridge texels"),
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
            label: Some("pixel-bridge kernel"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        Ok(ComputeContext {
            gpu: Gpu { device, queue },
            info,
            bind_group_layout,
            pipeline_layout,
            pipelines: Mutex::default(),
            submission: Mutex::default(),
        })
    }

    /// Return a descriptor for a device that's capable of running the kernels.
    ///
    /// Buffer sizes are taken from the adapter, so that large images fit into one binding.
    pub fn device_descriptor(adapter: &wgpu::Adapter) -> wgpu::DeviceDescriptor<'static> {
        let supported = adapter.limits();

        wgpu::DeviceDescriptor {
            label: Some("pixel-bridge"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits {
                max_storage_buffer_binding_size: supported.max_storage_buffer_binding_size,
                max_buffer_size: supported.max_buffer_size,
                ..wgpu::Limits::downlevel_defaults()
            },
            memory_hints: wgpu::MemoryHints::MemoryUsage,
        }
    }

    pub fn adapter_info(&self) -> &wgpu::AdapterInfo {
        &self.info
    }

    /// Run the kernel over a packed grid, blocking until the result is back in `output`.
    pub fn dispatch(
        &self,
        kernel: &dyn Kernel,
        layout: &BufferLayout,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<(), TransformError> {
        check_staging(layout.byte_len(), input.len())?;
        check_staging(layout.byte_len(), output.len())?;

        let (groups_x, groups_y) = self.check_limits(layout)?;

        let _submission = lock(&self.submission);
        let pipeline = self.pipeline(kernel)?;
        let device = &self.gpu.device;
        let size = layout.u64_len();

        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let source = Allocation::storage(&self.gpu, "pixel-bridge input", size, true);
        let target = Allocation::storage(&self.gpu, "pixel-bridge output", size, false);
        let staging = Allocation::readback(&self.gpu, size);

        let grid: [u32; 4] = [layout.width(), layout.height(), 0, 0];
        let grid = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("pixel-bridge grid"),
            contents: bytemuck::cast_slice(&grid),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        source.upload(&self.gpu, input);

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(kernel.name()),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: source.buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: target.buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: grid.as_entire_binding(),
                },
            ],
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some(kernel.name()),
        });

        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(kernel.name()),
                timestamp_writes: None,
            });
            pass.set_pipeline(&pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(groups_x, groups_y, 1);
        }

        encoder.copy_buffer_to_buffer(&target.buffer, 0, &staging.buffer, 0, size);
        log::trace!(
            "Dispatching {} over {}x{} workgroups, {} bytes",
            kernel.name(),
            groups_x,
            groups_y,
            size,
        );
        self.gpu.queue.submit(once(encoder.finish()));

        let validation = block_on(device.pop_error_scope(), None);
        let out_of_memory = block_on(device.pop_error_scope(), None);

        if let Some(err) = validation.or(out_of_memory) {
            return Err(DispatchError::device(err).into());
        }

        staging.read_into(&self.gpu, output)?;
        Ok(())
    }

    fn check_limits(&self, layout: &BufferLayout) -> Result<(u32, u32), DispatchError> {
        let limits = self.gpu.device.limits();

        let bytes = layout.u64_len();
        let binding_limit =
            u64::from(limits.max_storage_buffer_binding_size).min(limits.max_buffer_size);

        if bytes > binding_limit {
            return Err(DispatchError::exceeds_limit(bytes, binding_limit));
        }

        let groups_x = layout.width().div_ceil(WORKGROUP_SIZE);
        let groups_y = layout.height().div_ceil(WORKGROUP_SIZE);
        let max = limits.max_compute_workgroups_per_dimension;

        for groups in [groups_x, groups_y] {
            if groups > max {
                return Err(DispatchError::grid_too_large(groups, max));
            }
        }

        Ok((groups_x, groups_y))
    }

    /// Get the pipeline of a kernel, compiling it on first use.
    fn pipeline(&self, kernel: &dyn Kernel) -> Result<Arc<wgpu::ComputePipeline>, ContextError> {
        let (key, source) = match (kernel.key(), kernel.spirv_source()) {
            (Some(key), Some(source)) => (key, source),
            _ => return Err(ContextError::kernel_unavailable(kernel.name())),
        };

        let mut pipelines = lock(&self.pipelines);
        if let Some(pipeline) = pipelines.get(&key) {
            return Ok(Arc::clone(pipeline));
        }

        log::debug!("Compiling kernel {}", kernel.name());
        let device = &self.gpu.device;
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(kernel.name()),
            source: wgpu::ShaderSource::SpirV(shaders::shader_include_to_spirv(&source)),
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(kernel.name()),
            layout: Some(&self.pipeline_layout),
            module: &module,
            entry_point: "main",
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            cache: None,
        });

        if let Some(err) = block_on(device.pop_error_scope(), None) {
            return Err(ContextError::kernel_rejected(err));
        }

        let pipeline = Arc::new(pipeline);
        pipelines.insert(key, Arc::clone(&pipeline));
        Ok(pipeline)
    }
}

impl Backend for ComputeContext {
    fn name(&self) -> &'static str {
        "device"
    }

    fn run(
        &self,
        kernel: &dyn Kernel,
        layout: &BufferLayout,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<(), TransformError> {
        self.dispatch(kernel, layout, input, output)
    }
}

impl Allocation {
    /// A storage buffer bound to a kernel. Inputs are written by the queue, outputs copied out.
    fn storage(gpu: &Gpu, label: &'static str, size: u64, input: bool) -> Self {
        let usage = if input {
            wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST
        } else {
            wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC
        };

        Self::new(gpu, label, size, usage)
    }

    /// A host-mappable buffer receiving a result.
    fn readback(gpu: &Gpu, size: u64) -> Self {
        let usage = wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST;
        Self::new(gpu, "pixel-bridge readback", size, usage)
    }

    fn new(gpu: &Gpu, label: &'static str, size: u64, usage: wgpu::BufferUsages) -> Self {
        log::trace!("Allocating {} of {} bytes", label, size);
        let buffer = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage,
            mapped_at_creation: false,
        });

        Allocation { buffer, size }
    }

    fn upload(&self, gpu: &Gpu, data: &[u8]) {
        debug_assert_eq!(data.len() as u64, self.size);
        gpu.queue.write_buffer(&self.buffer, 0, data);
    }

    /// Map the buffer and copy its contents out, waiting on the device as needed.
    fn read_into(&self, gpu: &Gpu, target: &mut [u8]) -> Result<(), DispatchError> {
        check_staging(self.size as usize, target.len())?;

        let slice = self.buffer.slice(..);
        let (ping, waker) = Ping::new();
        slice.map_async(wgpu::MapMode::Read, move |result| waker.complete(result));
        block_on(ping, Some(&gpu.device))?;

        {
            let data = slice.get_mapped_range();
            target.copy_from_slice(&data);
        }

        self.buffer.unmap();
        Ok(())
    }
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

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
