// SPDX-License-Identifier: CEPL-1.0
use std::ptr::NonNull;
use std::rc::Rc;

use anyhow::{ensure, Context, Result};
use ash::vk;
use bytemuck::Pod;
use prism_render::RenderError;

use crate::context::DeviceContext;
use crate::handle::Owned;

/// Index of the first memory type allowed by `type_filter` whose flags include `required`.
pub fn find_memory_type(
    props: &vk::PhysicalDeviceMemoryProperties,
    type_filter: u32,
    required: vk::MemoryPropertyFlags,
) -> Result<u32, RenderError> {
    (0..props.memory_type_count)
        .find(|&i| {
            type_filter & (1 << i) != 0
                && props.memory_types[i as usize]
                    .property_flags
                    .contains(required)
        })
        .ok_or(RenderError::NoSuitableMemoryType { type_filter })
}

unsafe fn allocate(
    ctx: &Rc<DeviceContext>,
    req: vk::MemoryRequirements,
    properties: vk::MemoryPropertyFlags,
) -> Result<Owned<vk::DeviceMemory>> {
    let memory_type_index =
        find_memory_type(&ctx.memory_properties, req.memory_type_bits, properties)?;
    let info = vk::MemoryAllocateInfo {
        s_type: vk::StructureType::MEMORY_ALLOCATE_INFO,
        allocation_size: req.size,
        memory_type_index,
        ..Default::default()
    };
    let memory = ctx
        .device
        .allocate_memory(&info, None)
        .context("allocate_memory")?;
    Ok(Owned::new(ctx, memory))
}

/// Refuses host writes that would run past the end of a `capacity`-byte buffer.
pub fn check_fits(capacity: vk::DeviceSize, len: usize) -> Result<()> {
    ensure!(
        len as vk::DeviceSize <= capacity,
        "write of {len} bytes exceeds {capacity}-byte buffer"
    );
    Ok(())
}

/// Buffer plus its dedicated allocation, bound at offset 0.
pub struct GpuBuffer {
    buffer: Owned<vk::Buffer>,
    memory: Owned<vk::DeviceMemory>,
    size: vk::DeviceSize,
    mapped: Option<NonNull<u8>>,
}

impl GpuBuffer {
    pub unsafe fn new(
        ctx: &Rc<DeviceContext>,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
    ) -> Result<Self> {
        let info = vk::BufferCreateInfo {
            s_type: vk::StructureType::BUFFER_CREATE_INFO,
            size,
            usage,
            sharing_mode: vk::SharingMode::EXCLUSIVE,
            ..Default::default()
        };
        let buffer = Owned::new(
            ctx,
            ctx.device.create_buffer(&info, None).context("create_buffer")?,
        );
        let req = ctx.device.get_buffer_memory_requirements(buffer.raw());
        let memory = allocate(ctx, req, properties)?;
        ctx.device
            .bind_buffer_memory(buffer.raw(), memory.raw(), 0)
            .context("bind_buffer_memory")?;
        Ok(Self {
            buffer,
            memory,
            size,
            mapped: None,
        })
    }

    pub fn raw(&self) -> vk::Buffer {
        self.buffer.raw()
    }

    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    /// Maps the whole buffer for its remaining lifetime. Host-visible memory only.
    pub unsafe fn map_persistent(&mut self) -> Result<()> {
        if self.mapped.is_none() {
            let ptr = self
                .memory
                .device()
                .map_memory(self.memory.raw(), 0, self.size, vk::MemoryMapFlags::empty())
                .context("map_memory")?;
            self.mapped = NonNull::new(ptr.cast::<u8>());
        }
        Ok(())
    }

    /// Copies `bytes` to the start of the buffer. Host-coherent memory only.
    pub unsafe fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        check_fits(self.size, bytes.len())?;
        match self.mapped {
            Some(ptr) => std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr.as_ptr(), bytes.len()),
            None => {
                let device = self.memory.device();
                let ptr = device
                    .map_memory(
                        self.memory.raw(),
                        0,
                        bytes.len() as vk::DeviceSize,
                        vk::MemoryMapFlags::empty(),
                    )
                    .context("map_memory")?;
                std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr.cast::<u8>(), bytes.len());
                device.unmap_memory(self.memory.raw());
            }
        }
        Ok(())
    }

    pub unsafe fn write_pod<T: Pod>(&mut self, value: &T) -> Result<()> {
        self.write_bytes(bytemuck::bytes_of(value))
    }
}

/// 2D image plus its dedicated allocation.
pub struct GpuImage {
    image: Owned<vk::Image>,
    _memory: Owned<vk::DeviceMemory>,
    pub format: vk::Format,
    pub mip_levels: u32,
}

pub struct ImageSpec {
    pub width: u32,
    pub height: u32,
    pub mip_levels: u32,
    pub samples: vk::SampleCountFlags,
    pub format: vk::Format,
    pub tiling: vk::ImageTiling,
    pub usage: vk::ImageUsageFlags,
    pub properties: vk::MemoryPropertyFlags,
}

impl GpuImage {
    pub unsafe fn new(ctx: &Rc<DeviceContext>, spec: &ImageSpec) -> Result<Self> {
        let info = vk::ImageCreateInfo {
            s_type: vk::StructureType::IMAGE_CREATE_INFO,
            image_type: vk::ImageType::TYPE_2D,
            format: spec.format,
            extent: vk::Extent3D {
                width: spec.width,
                height: spec.height,
                depth: 1,
            },
            mip_levels: spec.mip_levels,
            array_layers: 1,
            samples: spec.samples,
            tiling: spec.tiling,
            usage: spec.usage,
            sharing_mode: vk::SharingMode::EXCLUSIVE,
            initial_layout: vk::ImageLayout::UNDEFINED,
            ..Default::default()
        };
        let image = Owned::new(
            ctx,
            ctx.device.create_image(&info, None).context("create_image")?,
        );
        let req = ctx.device.get_image_memory_requirements(image.raw());
        let memory = allocate(ctx, req, spec.properties)?;
        ctx.device
            .bind_image_memory(image.raw(), memory.raw(), 0)
            .context("bind_image_memory")?;
        Ok(Self {
            image,
            _memory: memory,
            format: spec.format,
            mip_levels: spec.mip_levels,
        })
    }

    pub fn raw(&self) -> vk::Image {
        self.image.raw()
    }
}

pub unsafe fn create_image_view(
    ctx: &Rc<DeviceContext>,
    image: vk::Image,
    format: vk::Format,
    aspect_mask: vk::ImageAspectFlags,
    mip_levels: u32,
) -> Result<Owned<vk::ImageView>> {
    let info = vk::ImageViewCreateInfo {
        s_type: vk::StructureType::IMAGE_VIEW_CREATE_INFO,
        image,
        view_type: vk::ImageViewType::TYPE_2D,
        format,
        subresource_range: vk::ImageSubresourceRange {
            aspect_mask,
            base_mip_level: 0,
            level_count: mip_levels,
            base_array_layer: 0,
            layer_count: 1,
        },
        ..Default::default()
    };
    let view = ctx
        .device
        .create_image_view(&info, None)
        .context("create_image_view")?;
    Ok(Owned::new(ctx, view))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(flags: &[vk::MemoryPropertyFlags]) -> vk::PhysicalDeviceMemoryProperties {
        let mut props = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: flags.len() as u32,
            ..Default::default()
        };
        for (slot, &property_flags) in props.memory_types.iter_mut().zip(flags) {
            slot.property_flags = property_flags;
        }
        props
    }

    const HOST: vk::MemoryPropertyFlags = vk::MemoryPropertyFlags::from_raw(
        vk::MemoryPropertyFlags::HOST_VISIBLE.as_raw()
            | vk::MemoryPropertyFlags::HOST_COHERENT.as_raw(),
    );

    #[test]
    fn first_matching_type_wins() {
        let p = props(&[
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            HOST,
            HOST | vk::MemoryPropertyFlags::HOST_CACHED,
        ]);
        assert_eq!(find_memory_type(&p, 0b111, HOST), Ok(1));
        assert_eq!(
            find_memory_type(&p, 0b111, vk::MemoryPropertyFlags::DEVICE_LOCAL),
            Ok(0)
        );
    }

    #[test]
    fn filter_bits_exclude_types() {
        let p = props(&[HOST, HOST]);
        assert_eq!(find_memory_type(&p, 0b10, HOST), Ok(1));
    }

    #[test]
    fn superset_flags_satisfy_the_request() {
        let p = props(&[vk::MemoryPropertyFlags::DEVICE_LOCAL | HOST]);
        assert_eq!(
            find_memory_type(&p, 0b1, vk::MemoryPropertyFlags::HOST_VISIBLE),
            Ok(0)
        );
    }

    #[test]
    fn no_match_is_an_error() {
        let p = props(&[vk::MemoryPropertyFlags::DEVICE_LOCAL]);
        assert_eq!(
            find_memory_type(&p, 0b1, HOST),
            Err(RenderError::NoSuitableMemoryType { type_filter: 0b1 })
        );
    }

    #[test]
    fn oversized_writes_are_refused() {
        assert!(check_fits(192, 192).is_ok());
        assert!(check_fits(192, 0).is_ok());
        let err = check_fits(192, 193).unwrap_err();
        assert_eq!(err.to_string(), "write of 193 bytes exceeds 192-byte buffer");
    }

    #[test]
    fn types_past_the_count_are_ignored() {
        let mut p = props(&[vk::MemoryPropertyFlags::DEVICE_LOCAL]);
        p.memory_types[1].property_flags = HOST;
        assert!(find_memory_type(&p, 0b11, HOST).is_err());
    }
}
