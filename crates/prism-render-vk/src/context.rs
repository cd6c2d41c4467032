// SPDX-License-Identifier: CEPL-1.0
use std::ffi::{c_void, CStr};

use anyhow::{anyhow, Context, Result};
use ash::ext::debug_utils;
use ash::khr::{surface, swapchain};
use ash::{vk, Entry, Instance};
use prism_render::RenderError;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::{debug, error, info, trace, warn};

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";
const APP_NAME: &CStr = c"prism";

/// Queue family indices; graphics and present may differ.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueueFamilies {
    pub graphics: u32,
    pub present: u32,
}

impl QueueFamilies {
    pub fn is_shared(&self) -> bool {
        self.graphics == self.present
    }

    /// Distinct indices, graphics first.
    pub fn unique(&self) -> Vec<u32> {
        if self.is_shared() {
            vec![self.graphics]
        } else {
            vec![self.graphics, self.present]
        }
    }
}

/// First graphics-capable family and first family that can present.
/// Prefers a single family doing both when one exists.
pub fn find_queue_families(
    families: &[vk::QueueFamilyProperties],
    can_present: impl Fn(u32) -> bool,
) -> Option<QueueFamilies> {
    let mut graphics = None;
    let mut present = None;
    for (i, family) in families.iter().enumerate() {
        let i = i as u32;
        let gfx = family.queue_count > 0 && family.queue_flags.contains(vk::QueueFlags::GRAPHICS);
        let pres = can_present(i);
        if gfx && pres {
            return Some(QueueFamilies {
                graphics: i,
                present: i,
            });
        }
        if gfx && graphics.is_none() {
            graphics = Some(i);
        }
        if pres && present.is_none() {
            present = Some(i);
        }
    }
    Some(QueueFamilies {
        graphics: graphics?,
        present: present?,
    })
}

struct DebugMessenger {
    loader: debug_utils::Instance,
    messenger: vk::DebugUtilsMessengerEXT,
}

/// Instance-level objects. Owns their teardown, so a failure while picking or
/// creating the device still releases the surface, messenger and instance.
pub struct InstanceContext {
    entry: Entry,
    pub instance: Instance,
    debug: Option<DebugMessenger>,
    pub surface_loader: surface::Instance,
    /// Null until the window surface exists.
    pub surface: vk::SurfaceKHR,
}

// Surface, then messenger, then instance.
impl Drop for InstanceContext {
    fn drop(&mut self) {
        unsafe {
            if self.surface != vk::SurfaceKHR::null() {
                self.surface_loader.destroy_surface(self.surface, None);
            }
            if let Some(debug) = self.debug.take() {
                debug
                    .loader
                    .destroy_debug_utils_messenger(debug.messenger, None);
            }
            self.instance.destroy_instance(None);
        }
        info!("vk: instance destroyed");
    }
}

/// Instance, surface, adapter and logical device. Created first, destroyed last.
pub struct DeviceContext {
    pub base: InstanceContext,
    pub phys: vk::PhysicalDevice,
    pub device: ash::Device,
    pub families: QueueFamilies,
    pub graphics_queue: vk::Queue,
    pub present_queue: vk::Queue,
    pub swapchain_loader: swapchain::Device,
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    pub limits: vk::PhysicalDeviceLimits,
    pub anisotropy: bool,
    pub sample_shading: bool,
}

unsafe extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _types: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user: *mut c_void,
) -> vk::Bool32 {
    if data.is_null() || (*data).p_message.is_null() {
        return vk::FALSE;
    }
    let msg = CStr::from_ptr((*data).p_message).to_string_lossy();
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        error!("vk: {msg}");
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        warn!("vk: {msg}");
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        debug!("vk: {msg}");
    } else {
        trace!("vk: {msg}");
    }
    vk::FALSE
}

fn debug_messenger_info<'a>() -> vk::DebugUtilsMessengerCreateInfoEXT<'a> {
    vk::DebugUtilsMessengerCreateInfoEXT {
        s_type: vk::StructureType::DEBUG_UTILS_MESSENGER_CREATE_INFO_EXT,
        message_severity: vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
            | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
            | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
            | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        message_type: vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
            | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
            | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        pfn_user_callback: Some(debug_callback),
        ..Default::default()
    }
}

unsafe fn validation_layer_installed(entry: &Entry) -> Result<bool> {
    let layers = entry
        .enumerate_instance_layer_properties()
        .context("enumerate_instance_layer_properties")?;
    Ok(layers
        .iter()
        .any(|l| CStr::from_ptr(l.layer_name.as_ptr()) == VALIDATION_LAYER))
}

unsafe fn create_instance(
    entry: &Entry,
    display: raw_window_handle::RawDisplayHandle,
    validation: bool,
) -> Result<Instance> {
    if validation && !validation_layer_installed(entry)? {
        return Err(RenderError::ValidationUnavailable(
            VALIDATION_LAYER.to_string_lossy().into_owned(),
        )
        .into());
    }

    let app_info = vk::ApplicationInfo {
        s_type: vk::StructureType::APPLICATION_INFO,
        p_application_name: APP_NAME.as_ptr(),
        application_version: vk::make_api_version(0, 0, 1, 0),
        p_engine_name: APP_NAME.as_ptr(),
        engine_version: vk::make_api_version(0, 0, 1, 0),
        api_version: vk::API_VERSION_1_0,
        ..Default::default()
    };

    let mut extensions = ash_window::enumerate_required_extensions(display)
        .context("enumerate_required_extensions")?
        .to_vec();
    let mut layers = Vec::new();
    if validation {
        extensions.push(debug_utils::NAME.as_ptr());
        layers.push(VALIDATION_LAYER.as_ptr());
    }

    // Chained so instance creation and destruction are covered too.
    let mut messenger_info = debug_messenger_info();
    let create_info = vk::InstanceCreateInfo {
        s_type: vk::StructureType::INSTANCE_CREATE_INFO,
        p_next: if validation {
            (&mut messenger_info) as *mut _ as *const c_void
        } else {
            std::ptr::null()
        },
        p_application_info: &app_info,
        enabled_extension_count: extensions.len() as u32,
        pp_enabled_extension_names: extensions.as_ptr(),
        enabled_layer_count: layers.len() as u32,
        pp_enabled_layer_names: layers.as_ptr(),
        ..Default::default()
    };

    Ok(entry
        .create_instance(&create_info, None)
        .context("create_instance")?)
}

unsafe fn supports_swapchain_extension(instance: &Instance, phys: vk::PhysicalDevice) -> Result<bool> {
    let exts = instance
        .enumerate_device_extension_properties(phys)
        .context("enumerate_device_extension_properties")?;
    Ok(exts
        .iter()
        .any(|e| CStr::from_ptr(e.extension_name.as_ptr()) == swapchain::NAME))
}

/// Queue families if `phys` can drive this surface, `None` otherwise.
unsafe fn check_device(
    instance: &Instance,
    surface_loader: &surface::Instance,
    surface: vk::SurfaceKHR,
    phys: vk::PhysicalDevice,
) -> Result<Option<QueueFamilies>> {
    let props = instance.get_physical_device_queue_family_properties(phys);
    let families = find_queue_families(&props, |i| {
        surface_loader
            .get_physical_device_surface_support(phys, i, surface)
            .unwrap_or(false)
    });
    let Some(families) = families else {
        return Ok(None);
    };
    if !supports_swapchain_extension(instance, phys)? {
        return Ok(None);
    }
    let formats = surface_loader
        .get_physical_device_surface_formats(phys, surface)
        .context("get_physical_device_surface_formats")?;
    let modes = surface_loader
        .get_physical_device_surface_present_modes(phys, surface)
        .context("get_physical_device_surface_present_modes")?;
    if formats.is_empty() || modes.is_empty() {
        return Ok(None);
    }
    Ok(Some(families))
}

unsafe fn pick_physical_device(
    instance: &Instance,
    surface_loader: &surface::Instance,
    surface: vk::SurfaceKHR,
) -> Result<(vk::PhysicalDevice, QueueFamilies)> {
    let devices = instance
        .enumerate_physical_devices()
        .context("enumerate_physical_devices")?;
    for phys in devices {
        let props = instance.get_physical_device_properties(phys);
        let name = CStr::from_ptr(props.device_name.as_ptr()).to_string_lossy();
        match check_device(instance, surface_loader, surface, phys)? {
            Some(families) => {
                info!(
                    "vk: using {name} (graphics family {}, present family {})",
                    families.graphics, families.present
                );
                return Ok((phys, families));
            }
            None => debug!("vk: skipping {name}"),
        }
    }
    Err(RenderError::NoSuitableDevice.into())
}

impl DeviceContext {
    /// # Safety
    /// The window must outlive the returned context.
    pub unsafe fn new(
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
        validation: bool,
    ) -> Result<Self> {
        let dh = display
            .display_handle()
            .map_err(|e| anyhow!("{e}"))?
            .as_raw();
        let wh = window.window_handle().map_err(|e| anyhow!("{e}"))?.as_raw();

        let entry = Entry::linked();
        let instance = create_instance(&entry, dh, validation)?;
        info!("vk: instance created (validation {validation})");
        let surface_loader = surface::Instance::new(&entry, &instance);
        let mut base = InstanceContext {
            entry,
            instance,
            debug: None,
            surface_loader,
            surface: vk::SurfaceKHR::null(),
        };

        if validation {
            let loader = debug_utils::Instance::new(&base.entry, &base.instance);
            let messenger = loader
                .create_debug_utils_messenger(&debug_messenger_info(), None)
                .context("create_debug_utils_messenger")?;
            base.debug = Some(DebugMessenger { loader, messenger });
        }

        base.surface = ash_window::create_surface(&base.entry, &base.instance, dh, wh, None)
            .context("ash_window::create_surface")?;
        let (instance, surface_loader, surface) = (&base.instance, &base.surface_loader, base.surface);

        let (phys, families) = pick_physical_device(instance, surface_loader, surface)?;
        let supported = instance.get_physical_device_features(phys);
        let anisotropy = supported.sampler_anisotropy == vk::TRUE;
        let sample_shading = supported.sample_rate_shading == vk::TRUE;

        let priorities = [1.0_f32];
        let queue_infos: Vec<_> = families
            .unique()
            .into_iter()
            .map(|family| vk::DeviceQueueCreateInfo {
                s_type: vk::StructureType::DEVICE_QUEUE_CREATE_INFO,
                queue_family_index: family,
                queue_count: 1,
                p_queue_priorities: priorities.as_ptr(),
                ..Default::default()
            })
            .collect();
        let features = vk::PhysicalDeviceFeatures {
            sampler_anisotropy: supported.sampler_anisotropy,
            sample_rate_shading: supported.sample_rate_shading,
            ..Default::default()
        };
        let extensions = [swapchain::NAME.as_ptr()];
        let device_info = vk::DeviceCreateInfo {
            s_type: vk::StructureType::DEVICE_CREATE_INFO,
            queue_create_info_count: queue_infos.len() as u32,
            p_queue_create_infos: queue_infos.as_ptr(),
            enabled_extension_count: extensions.len() as u32,
            pp_enabled_extension_names: extensions.as_ptr(),
            p_enabled_features: &features,
            ..Default::default()
        };
        let device = instance
            .create_device(phys, &device_info, None)
            .context("create_device")?;
        info!("vk: logical device created (anisotropy {anisotropy}, sample shading {sample_shading})");

        let graphics_queue = device.get_device_queue(families.graphics, 0);
        let present_queue = device.get_device_queue(families.present, 0);
        let swapchain_loader = swapchain::Device::new(instance, &device);
        let memory_properties = instance.get_physical_device_memory_properties(phys);
        let limits = instance.get_physical_device_properties(phys).limits;

        Ok(Self {
            base,
            phys,
            device,
            families,
            graphics_queue,
            present_queue,
            swapchain_loader,
            memory_properties,
            limits,
            anisotropy,
            sample_shading,
        })
    }

    pub fn format_properties(&self, format: vk::Format) -> vk::FormatProperties {
        unsafe {
            self.base
                .instance
                .get_physical_device_format_properties(self.phys, format)
        }
    }

    pub fn wait_idle(&self) -> Result<()> {
        unsafe { self.device.device_wait_idle() }.context("device_wait_idle")
    }
}

// Device first; `base` then drops the surface, messenger and instance.
impl Drop for DeviceContext {
    fn drop(&mut self) {
        unsafe {
            self.device.device_wait_idle().ok();
            self.device.destroy_device(None);
        }
        info!("vk: logical device destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: 1,
            ..Default::default()
        }
    }

    #[test]
    fn single_family_doing_both_is_preferred() {
        let families = [
            family(vk::QueueFlags::GRAPHICS),
            family(vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE),
        ];
        let found = find_queue_families(&families, |i| i != 0).unwrap();
        assert_eq!(found, QueueFamilies { graphics: 2, present: 2 });
        assert!(found.is_shared());
        assert_eq!(found.unique(), vec![2]);
    }

    #[test]
    fn split_families_are_reported() {
        let families = [family(vk::QueueFlags::GRAPHICS), family(vk::QueueFlags::TRANSFER)];
        let found = find_queue_families(&families, |i| i == 1).unwrap();
        assert_eq!(found, QueueFamilies { graphics: 0, present: 1 });
        assert_eq!(found.unique(), vec![0, 1]);
    }

    #[test]
    fn no_present_support_means_unsuitable() {
        let families = [family(vk::QueueFlags::GRAPHICS)];
        assert_eq!(find_queue_families(&families, |_| false), None);
    }

    #[test]
    fn no_graphics_means_unsuitable() {
        let families = [family(vk::QueueFlags::COMPUTE)];
        assert_eq!(find_queue_families(&families, |_| true), None);
    }
}
