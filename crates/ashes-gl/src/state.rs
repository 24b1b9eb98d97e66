//! Shadow copy of GL fixed-function state.
//!
//! Replay emits a GL call only when the requested value differs from the
//! shadow value, so redundant pipeline rebinds collapse to nothing. The cache
//! starts unknown after context creation and can be dropped back to unknown
//! with [`StateCache::invalidate_all`] when foreign code may have touched the
//! context.

use std::collections::HashMap;

use crate::context::ContextLock;

/// Texture units the cache shadows. Unit [`SCRATCH_UNIT`] is reserved for
/// transfer work so descriptor bindings never collide with it.
pub const MAX_CACHED_UNITS: usize = 32;
pub const SCRATCH_UNIT: u32 = 31;

/// One shadowed state value. `None` means unknown, and unknown never equals
/// anything, so the first touch after an invalidation always reaches GL.
#[derive(Debug, Clone, Default)]
pub struct Cached<T>(Option<T>);

impl<T: PartialEq> Cached<T> {
    pub fn is_invalid(&self, new: &T) -> bool {
        self.0.as_ref() != Some(new)
    }

    pub fn set(&mut self, new: T) {
        self.0 = Some(new);
    }

    pub fn invalidate(&mut self) {
        self.0 = None;
    }

    /// Drop the shadow value when the predicate matches it.
    pub fn invalidate_if(&mut self, pred: impl FnOnce(&T) -> bool) {
        if self.0.as_ref().is_some_and(pred) {
            self.0 = None;
        }
    }
}

#[derive(Default)]
pub struct StateCache {
    program: Cached<u32>,
    vertex_array: Cached<u32>,
    draw_framebuffer: Cached<u32>,
    read_framebuffer: Cached<u32>,
    active_unit: Cached<u32>,
    textures: Vec<Cached<(u32, u32)>>,
    samplers: Vec<Cached<u32>>,
    // ELEMENT_ARRAY_BUFFER is intentionally absent: that binding lives in the
    // vertex array object, not in global context state.
    buffers: HashMap<u32, u32>,
    indexed_buffers: HashMap<(u32, u32), (u32, i32, i32)>,
    caps: HashMap<u32, bool>,
    viewport: Cached<(i32, i32, i32, i32)>,
    scissor: Cached<(i32, i32, i32, i32)>,
    depth_func: Cached<u32>,
    depth_write: Cached<bool>,
    depth_range: Cached<(f32, f32)>,
    color_mask: Cached<(bool, bool, bool, bool)>,
    stencil_func: [Cached<(u32, i32, u32)>; 2],
    stencil_op: [Cached<(u32, u32, u32)>; 2],
    stencil_write_mask: [Cached<u32>; 2],
    blend_equation: Cached<(u32, u32)>,
    blend_func: Cached<(u32, u32, u32, u32)>,
    blend_color: Cached<[f32; 4]>,
    front_face: Cached<u32>,
    cull_face: Cached<u32>,
    polygon_mode: Cached<u32>,
    line_width: Cached<f32>,
    polygon_offset: Cached<(f32, f32)>,
    patch_vertices: Cached<i32>,
    unpack_alignment: Cached<i32>,
    pack_alignment: Cached<i32>,
}

impl StateCache {
    pub fn new() -> Self {
        Self {
            textures: vec![Cached::default(); MAX_CACHED_UNITS],
            samplers: vec![Cached::default(); MAX_CACHED_UNITS],
            ..Self::default()
        }
    }

    /// Forget everything. The next touch of each piece of state goes to GL.
    pub fn invalidate_all(&mut self) {
        *self = Self::new();
    }

    fn face_slot(face: u32) -> usize {
        if face == glow::BACK {
            1
        } else {
            0
        }
    }
}

// Cached setters. Each one emits the GL call only on a shadow miss and then
// records the new value.
impl<'a> ContextLock<'a> {
    pub fn set_program(&mut self, program: u32) {
        if self.state.program.is_invalid(&program) {
            self.gl.use_program(program);
            self.state.program.set(program);
        }
    }

    pub fn set_vertex_array(&mut self, vao: u32) {
        if self.state.vertex_array.is_invalid(&vao) {
            self.gl.bind_vertex_array(vao);
            self.state.vertex_array.set(vao);
        }
    }

    /// Bind `fb` for both drawing and reading.
    pub fn set_framebuffer(&mut self, fb: u32) {
        if self.state.draw_framebuffer.is_invalid(&fb)
            || self.state.read_framebuffer.is_invalid(&fb)
        {
            self.gl.bind_framebuffer(glow::FRAMEBUFFER, fb);
            self.state.draw_framebuffer.set(fb);
            self.state.read_framebuffer.set(fb);
        }
    }

    pub fn set_draw_framebuffer(&mut self, fb: u32) {
        if self.state.draw_framebuffer.is_invalid(&fb) {
            self.gl.bind_framebuffer(glow::DRAW_FRAMEBUFFER, fb);
            self.state.draw_framebuffer.set(fb);
        }
    }

    pub fn set_read_framebuffer(&mut self, fb: u32) {
        if self.state.read_framebuffer.is_invalid(&fb) {
            self.gl.bind_framebuffer(glow::READ_FRAMEBUFFER, fb);
            self.state.read_framebuffer.set(fb);
        }
    }

    pub fn set_active_unit(&mut self, unit: u32) {
        if self.state.active_unit.is_invalid(&unit) {
            self.gl.active_texture(unit);
            self.state.active_unit.set(unit);
        }
    }

    /// Select `unit` and bind `texture` to `target` on it.
    pub fn bind_texture_unit(&mut self, unit: u32, target: u32, texture: u32) {
        let value = (target, texture);
        let shadowed = (unit as usize) < self.state.textures.len();
        if !shadowed || self.state.textures[unit as usize].is_invalid(&value) {
            self.set_active_unit(unit);
            self.gl.bind_texture(target, texture);
            if shadowed {
                self.state.textures[unit as usize].set(value);
            }
        }
    }

    pub fn bind_sampler_unit(&mut self, unit: u32, sampler: u32) {
        let shadowed = (unit as usize) < self.state.samplers.len();
        if !shadowed || self.state.samplers[unit as usize].is_invalid(&sampler) {
            self.gl.bind_sampler(unit, sampler);
            if shadowed {
                self.state.samplers[unit as usize].set(sampler);
            }
        }
    }

    pub fn set_buffer(&mut self, target: u32, buffer: u32) {
        debug_assert_ne!(target, glow::ELEMENT_ARRAY_BUFFER);
        if self.state.buffers.get(&target) != Some(&buffer) {
            self.gl.bind_buffer(target, buffer);
            self.state.buffers.insert(target, buffer);
        }
    }

    pub fn set_buffer_range(&mut self, target: u32, index: u32, buffer: u32, offset: i32, size: i32) {
        let value = (buffer, offset, size);
        if self.state.indexed_buffers.get(&(target, index)) != Some(&value) {
            self.gl.bind_buffer_range(target, index, buffer, offset, size);
            self.state.indexed_buffers.insert((target, index), value);
            // An indexed bind also moves the generic binding point.
            self.state.buffers.insert(target, buffer);
        }
    }

    pub fn set_cap(&mut self, cap: u32, enabled: bool) {
        if self.state.caps.get(&cap) != Some(&enabled) {
            if enabled {
                self.gl.enable(cap);
            } else {
                self.gl.disable(cap);
            }
            self.state.caps.insert(cap, enabled);
        }
    }

    pub fn set_viewport(&mut self, x: i32, y: i32, width: i32, height: i32) {
        let value = (x, y, width, height);
        if self.state.viewport.is_invalid(&value) {
            self.gl.viewport(x, y, width, height);
            self.state.viewport.set(value);
        }
    }

    pub fn set_scissor_rect(&mut self, x: i32, y: i32, width: i32, height: i32) {
        let value = (x, y, width, height);
        if self.state.scissor.is_invalid(&value) {
            self.gl.scissor(x, y, width, height);
            self.state.scissor.set(value);
        }
    }

    pub fn set_depth_func(&mut self, func: u32) {
        if self.state.depth_func.is_invalid(&func) {
            self.gl.depth_func(func);
            self.state.depth_func.set(func);
        }
    }

    pub fn set_depth_write(&mut self, write: bool) {
        if self.state.depth_write.is_invalid(&write) {
            self.gl.depth_mask(write);
            self.state.depth_write.set(write);
        }
    }

    pub fn set_depth_range(&mut self, near: f32, far: f32) {
        let value = (near, far);
        if self.state.depth_range.is_invalid(&value) {
            self.gl.depth_range(near, far);
            self.state.depth_range.set(value);
        }
    }

    pub fn set_color_mask(&mut self, r: bool, g: bool, b: bool, a: bool) {
        let value = (r, g, b, a);
        if self.state.color_mask.is_invalid(&value) {
            self.gl.color_mask(r, g, b, a);
            self.state.color_mask.set(value);
        }
    }

    pub fn set_stencil_func(&mut self, face: u32, func: u32, reference: i32, mask: u32) {
        let slot = StateCache::face_slot(face);
        let value = (func, reference, mask);
        if self.state.stencil_func[slot].is_invalid(&value) {
            self.gl.stencil_func(face, func, reference, mask);
            self.state.stencil_func[slot].set(value);
        }
    }

    pub fn set_stencil_op(&mut self, face: u32, fail: u32, depth_fail: u32, pass: u32) {
        let slot = StateCache::face_slot(face);
        let value = (fail, depth_fail, pass);
        if self.state.stencil_op[slot].is_invalid(&value) {
            self.gl.stencil_op(face, fail, depth_fail, pass);
            self.state.stencil_op[slot].set(value);
        }
    }

    pub fn set_stencil_write_mask(&mut self, face: u32, mask: u32) {
        let slot = StateCache::face_slot(face);
        if self.state.stencil_write_mask[slot].is_invalid(&mask) {
            self.gl.stencil_write_mask(face, mask);
            self.state.stencil_write_mask[slot].set(mask);
        }
    }

    pub fn set_blend_equation(&mut self, rgb: u32, alpha: u32) {
        let value = (rgb, alpha);
        if self.state.blend_equation.is_invalid(&value) {
            self.gl.blend_equation(rgb, alpha);
            self.state.blend_equation.set(value);
        }
    }

    pub fn set_blend_func(&mut self, src_rgb: u32, dst_rgb: u32, src_alpha: u32, dst_alpha: u32) {
        let value = (src_rgb, dst_rgb, src_alpha, dst_alpha);
        if self.state.blend_func.is_invalid(&value) {
            self.gl.blend_func(src_rgb, dst_rgb, src_alpha, dst_alpha);
            self.state.blend_func.set(value);
        }
    }

    pub fn set_blend_color(&mut self, color: [f32; 4]) {
        if self.state.blend_color.is_invalid(&color) {
            self.gl.blend_color(color[0], color[1], color[2], color[3]);
            self.state.blend_color.set(color);
        }
    }

    pub fn set_front_face(&mut self, mode: u32) {
        if self.state.front_face.is_invalid(&mode) {
            self.gl.front_face(mode);
            self.state.front_face.set(mode);
        }
    }

    pub fn set_cull_face(&mut self, mode: u32) {
        if self.state.cull_face.is_invalid(&mode) {
            self.gl.cull_face(mode);
            self.state.cull_face.set(mode);
        }
    }

    pub fn set_polygon_mode(&mut self, mode: u32) {
        if self.state.polygon_mode.is_invalid(&mode) {
            self.gl.polygon_mode(mode);
            self.state.polygon_mode.set(mode);
        }
    }

    pub fn set_line_width(&mut self, width: f32) {
        if self.state.line_width.is_invalid(&width) {
            self.gl.line_width(width);
            self.state.line_width.set(width);
        }
    }

    pub fn set_polygon_offset(&mut self, factor: f32, units: f32) {
        let value = (factor, units);
        if self.state.polygon_offset.is_invalid(&value) {
            self.gl.polygon_offset(factor, units);
            self.state.polygon_offset.set(value);
        }
    }

    pub fn set_patch_vertices(&mut self, count: i32) {
        if self.state.patch_vertices.is_invalid(&count) {
            self.gl.patch_vertices(count);
            self.state.patch_vertices.set(count);
        }
    }

    pub fn set_unpack_alignment(&mut self, alignment: i32) {
        if self.state.unpack_alignment.is_invalid(&alignment) {
            self.gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, alignment);
            self.state.unpack_alignment.set(alignment);
        }
    }

    pub fn set_pack_alignment(&mut self, alignment: i32) {
        if self.state.pack_alignment.is_invalid(&alignment) {
            self.gl.pixel_store_i32(glow::PACK_ALIGNMENT, alignment);
            self.state.pack_alignment.set(alignment);
        }
    }

    /// Bind a vertex array without consulting the shadow value, then record
    /// it. Needed when the array itself was just rebuilt.
    pub fn force_vertex_array(&mut self, vao: u32) {
        self.gl.bind_vertex_array(vao);
        self.state.vertex_array.set(vao);
    }

    /// Invalidate the shadow copy of every binding and switch.
    pub fn invalidate_state(&mut self) {
        self.state.invalidate_all();
    }
}

// Deleting a GL object unbinds it from the live context, so the shadow
// entries naming it must go too. Called from resource drops.
impl<'a> ContextLock<'a> {
    pub fn forget_buffer(&mut self, name: u32) {
        self.state.buffers.retain(|_, bound| *bound != name);
        self.state.indexed_buffers.retain(|_, (bound, _, _)| *bound != name);
    }

    pub fn forget_texture(&mut self, name: u32) {
        for unit in &mut self.state.textures {
            unit.invalidate_if(|(_, bound)| *bound == name);
        }
    }

    pub fn forget_sampler(&mut self, name: u32) {
        for unit in &mut self.state.samplers {
            unit.invalidate_if(|bound| *bound == name);
        }
    }

    pub fn forget_framebuffer(&mut self, name: u32) {
        self.state.draw_framebuffer.invalidate_if(|fb| *fb == name);
        self.state.read_framebuffer.invalidate_if(|fb| *fb == name);
    }

    pub fn forget_program(&mut self, name: u32) {
        self.state.program.invalidate_if(|p| *p == name);
    }

    pub fn forget_vertex_array(&mut self, name: u32) {
        self.state.vertex_array.invalidate_if(|v| *v == name);
    }
}
