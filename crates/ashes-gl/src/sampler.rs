//! Sampler objects.

use std::sync::{Arc, Weak};

use tracing::debug;

use ashes_api::{Error, Result, SamplerCreateInfo};

use crate::convert;
use crate::device::DeviceShared;
use crate::registry::{ObjectId, ObjectKind};

const TEXTURE_MAX_ANISOTROPY: u32 = 0x84FE;

pub(crate) struct SamplerShared {
    device: Weak<DeviceShared>,
    name: u32,
    id: ObjectId,
}

impl Drop for SamplerShared {
    fn drop(&mut self) {
        match self.device.upgrade() {
            Some(device) => {
                {
                    let mut lock = device.lock();
                    lock.forget_sampler(self.name);
                    lock.gl.delete_sampler(self.name);
                }
                device.registry.unregister(self.id, ObjectKind::Sampler);
                debug!("destroyed sampler {}", self.name);
            }
            None => debug!("sampler {} outlived its device, skipping GL teardown", self.name),
        }
    }
}

#[derive(Clone)]
pub struct Sampler {
    shared: Arc<SamplerShared>,
}

impl Sampler {
    pub(crate) fn new(device: &Arc<DeviceShared>, info: &SamplerCreateInfo) -> Result<Self> {
        if info.anisotropy_enable && !device.features.sampler_anisotropy {
            return Err(Error::FeatureNotPresent("sampler anisotropy"));
        }
        let name = {
            let lock = device.lock();
            let name = lock.gl.create_sampler();
            if name == 0 {
                return Err(Error::OutOfDeviceMemory("could not create sampler object".into()));
            }
            let mipmapped = info.max_lod > 0.0;
            lock.gl.sampler_parameter_i32(
                name,
                glow::TEXTURE_MIN_FILTER,
                convert::min_filter(info.min_filter, info.mipmap_mode, mipmapped),
            );
            lock.gl.sampler_parameter_i32(
                name,
                glow::TEXTURE_MAG_FILTER,
                convert::mag_filter(info.mag_filter),
            );
            lock.gl.sampler_parameter_i32(
                name,
                glow::TEXTURE_WRAP_S,
                convert::address_mode(info.address_mode_u),
            );
            lock.gl.sampler_parameter_i32(
                name,
                glow::TEXTURE_WRAP_T,
                convert::address_mode(info.address_mode_v),
            );
            lock.gl.sampler_parameter_i32(
                name,
                glow::TEXTURE_WRAP_R,
                convert::address_mode(info.address_mode_w),
            );
            lock.gl
                .sampler_parameter_f32(name, glow::TEXTURE_MIN_LOD, info.min_lod);
            lock.gl
                .sampler_parameter_f32(name, glow::TEXTURE_MAX_LOD, info.max_lod);
            if info.mip_lod_bias != 0.0 {
                lock.gl
                    .sampler_parameter_f32(name, glow::TEXTURE_LOD_BIAS, info.mip_lod_bias);
            }
            if info.compare_enable {
                lock.gl.sampler_parameter_i32(
                    name,
                    glow::TEXTURE_COMPARE_MODE,
                    glow::COMPARE_REF_TO_TEXTURE as i32,
                );
                lock.gl.sampler_parameter_i32(
                    name,
                    glow::TEXTURE_COMPARE_FUNC,
                    convert::compare_op(info.compare_op) as i32,
                );
            }
            lock.gl.sampler_parameter_f32_slice(
                name,
                glow::TEXTURE_BORDER_COLOR,
                &convert::border_color(info.border_color),
            );
            if info.anisotropy_enable {
                lock.gl
                    .sampler_parameter_f32(name, TEXTURE_MAX_ANISOTROPY, info.max_anisotropy.max(1.0));
            }
            name
        };
        debug!("created sampler: {}", name);
        Ok(Self {
            shared: Arc::new(SamplerShared {
                device: Arc::downgrade(device),
                name,
                id: device.registry.register(ObjectKind::Sampler),
            }),
        })
    }

    pub(crate) fn gl_name(&self) -> u32 {
        self.shared.name
    }
}
