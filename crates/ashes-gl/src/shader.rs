//! Shader modules.
//!
//! A module holds a GLSL source blob plus the stage it targets. Compilation
//! is deferred to pipeline creation so errors surface with full program
//! context, matching how link failures are reported.

use std::sync::{Arc, Weak};

use tracing::debug;

use ashes_api::{Error, Result, ShaderStageFlags};

use crate::device::DeviceShared;
use crate::registry::{ObjectId, ObjectKind};

pub(crate) struct ShaderModuleShared {
    device: Weak<DeviceShared>,
    stage: ShaderStageFlags,
    source: String,
    id: ObjectId,
}

impl Drop for ShaderModuleShared {
    fn drop(&mut self) {
        if let Some(device) = self.device.upgrade() {
            device.registry.unregister(self.id, ObjectKind::ShaderModule);
        }
    }
}

/// GLSL source for a single pipeline stage.
#[derive(Clone)]
pub struct ShaderModule {
    shared: Arc<ShaderModuleShared>,
}

impl ShaderModule {
    pub(crate) fn new(
        device: &Arc<DeviceShared>,
        stage: ShaderStageFlags,
        source: &str,
    ) -> Result<Self> {
        if stage.bits().count_ones() != 1 {
            return Err(Error::Validation(format!(
                "shader module must target exactly one stage, got {:?}",
                stage
            )));
        }
        if source.trim().is_empty() {
            return Err(Error::Validation("shader module source is empty".into()));
        }
        if stage == ShaderStageFlags::COMPUTE && !device.backend.compute_shaders {
            return Err(Error::FeatureNotPresent("compute shaders"));
        }
        if stage
            .intersects(ShaderStageFlags::TESSELLATION_CONTROL | ShaderStageFlags::TESSELLATION_EVALUATION)
            && !device.features.tessellation_shader
        {
            return Err(Error::FeatureNotPresent("tessellation shaders"));
        }
        if stage == ShaderStageFlags::GEOMETRY && !device.features.geometry_shader {
            return Err(Error::FeatureNotPresent("geometry shaders"));
        }
        let id = device.registry.register(ObjectKind::ShaderModule);
        debug!("created shader module ({:?}, {} bytes)", stage, source.len());
        Ok(Self {
            shared: Arc::new(ShaderModuleShared {
                device: Arc::downgrade(device),
                stage,
                source: source.to_owned(),
                id,
            }),
        })
    }

    pub fn stage(&self) -> ShaderStageFlags {
        self.shared.stage
    }

    pub(crate) fn source(&self) -> &str {
        &self.shared.source
    }

    pub fn set_debug_name(&self, name: &str) {
        if let Some(device) = self.shared.device.upgrade() {
            device.registry.set_label(self.shared.id, name);
        }
    }
}
