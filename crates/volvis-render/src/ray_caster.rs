//! CPU ray caster for the slicer, MIP, isosurface and compositing modes.

use std::time::Instant;

use glam::{Vec3, Vec4, Vec4Swizzles};
use rayon::prelude::*;
use volvis_core::{RenderConfig, RenderMode};
use volvis_volume::GradientVoxel;

use crate::block_table::BlockTable;
use crate::camera::{Camera, Ray};
use crate::image_output::RenderedImage;
use crate::source::VolumeSource;

/// Iterations used to refine an isosurface hit.
pub const BISECTION_ITERATIONS: u32 = 10;
/// Accumulated opacity at which compositing stops.
pub const EARLY_TERMINATION_ALPHA: f32 = 0.99;

/// Casts one ray per pixel through a [`VolumeSource`].
pub struct RayCaster<'a, S: VolumeSource> {
    source: &'a S,
    config: &'a RenderConfig,
    blocks: Option<&'a BlockTable>,
}

impl<'a, S: VolumeSource> RayCaster<'a, S> {
    #[must_use]
    pub fn new(source: &'a S, config: &'a RenderConfig) -> Self {
        Self {
            source,
            config,
            blocks: None,
        }
    }

    /// Enables skipping over inactive blocks when the configuration asks for it.
    #[must_use]
    pub fn with_blocks(mut self, blocks: &'a BlockTable) -> Self {
        if self.config.skipping.use_empty_space_skipping {
            self.blocks = Some(blocks);
        }
        self
    }

    /// Renders a `width` x `height` image. Rows are traced in parallel unless the
    /// configuration turns multithreading off.
    #[must_use]
    pub fn render(&self, camera: &Camera, width: u32, height: u32) -> RenderedImage {
        let start = Instant::now();
        let mut image = RenderedImage::new(width, height);
        let row_len = width.max(1) as usize;

        let trace_row = |(y, row): (usize, &mut [Vec4])| {
            #[allow(clippy::cast_possible_truncation)]
            let y = y as u32;
            for (x, pixel) in row.iter_mut().enumerate() {
                #[allow(clippy::cast_possible_truncation)]
                let ray = camera.ray_for_pixel(x as u32, y, width, height);
                *pixel = self.trace(&ray, camera);
            }
        };

        if self.config.multithreaded {
            image
                .pixels_mut()
                .par_chunks_mut(row_len)
                .enumerate()
                .for_each(trace_row);
        } else {
            image
                .pixels_mut()
                .chunks_mut(row_len)
                .enumerate()
                .for_each(trace_row);
        }

        log::debug!(
            "{} frame {}x{} traced in {:.2?}",
            self.config.render_mode.name(),
            width,
            height,
            start.elapsed()
        );
        image
    }

    /// Colour of a single ray; transparent black when it misses the volume.
    #[must_use]
    pub fn trace(&self, ray: &Ray, camera: &Camera) -> Vec4 {
        if self.config.render_mode == RenderMode::Slicer {
            return self.trace_slicer(ray, camera);
        }
        let Some((t_entry, t_exit)) = ray.intersect_box(Vec3::ZERO, self.source.dims().as_vec3())
        else {
            return Vec4::ZERO;
        };
        match self.config.render_mode {
            RenderMode::Mip => self.trace_mip(ray, t_entry, t_exit),
            RenderMode::Isosurface => self.trace_iso(ray, t_entry, t_exit),
            RenderMode::Composite => self.trace_composite(ray, t_entry, t_exit),
            RenderMode::Slicer => Vec4::ZERO,
        }
    }

    /// View-aligned slice through the volume centre.
    fn trace_slicer(&self, ray: &Ray, camera: &Camera) -> Vec4 {
        let dims = self.source.dims().as_vec3();
        let normal = camera.forward();
        let facing = ray.direction.dot(normal);
        if facing.abs() < 1e-6 {
            return Vec4::ZERO;
        }
        let t = (dims * 0.5 - ray.origin).dot(normal) / facing;
        let p = ray.at(t);
        if t < 0.0 || p.cmplt(Vec3::ZERO).any() || p.cmpge(dims).any() {
            return Vec4::ZERO;
        }
        let value = self.source.sample(p, self.config.interpolation);
        grey(value / self.max_value())
    }

    fn trace_mip(&self, ray: &Ray, t_entry: f32, t_exit: f32) -> Vec4 {
        let mut max = 0.0_f32;
        self.march(ray, t_entry, t_exit, |_, p| {
            max = max.max(self.source.sample(p, self.config.interpolation));
            true
        });
        grey(max / self.max_value())
    }

    fn trace_iso(&self, ray: &Ray, t_entry: f32, t_exit: f32) -> Vec4 {
        let iso = self.config.iso_value;
        let mode = self.config.interpolation;
        let mut previous: Option<f32> = None;
        let mut hit = None;
        self.march(ray, t_entry, t_exit, |t, p| {
            if self.source.sample(p, mode) >= iso {
                hit = Some(match previous {
                    Some(t_before) if self.config.bisection => self.bisect(ray, t_before, t),
                    _ => t,
                });
                return false;
            }
            previous = Some(t);
            true
        });

        let Some(t_hit) = hit else {
            return Vec4::ZERO;
        };
        let color = self.config.iso_color;
        let shaded = if self.config.volume_shading {
            let gradient = self.source.gradient(ray.at(t_hit), mode);
            self.phong(color, &gradient, -ray.direction)
        } else {
            color
        };
        shaded.extend(1.0)
    }

    /// Narrows an isosurface crossing between a sample below the iso value and one at or above it.
    fn bisect(&self, ray: &Ray, mut below: f32, mut above: f32) -> f32 {
        let iso = self.config.iso_value;
        for _ in 0..BISECTION_ITERATIONS {
            let mid = 0.5 * (below + above);
            if self.source.sample(ray.at(mid), self.config.interpolation) >= iso {
                above = mid;
            } else {
                below = mid;
            }
        }
        0.5 * (below + above)
    }

    fn trace_composite(&self, ray: &Ray, t_entry: f32, t_exit: f32) -> Vec4 {
        let tf = &self.config.transfer_function;
        let mode = self.config.interpolation;
        let step = self.config.step_size;
        let max_gradient = self.source.max_gradient_magnitude();
        let needs_gradient = self.config.volume_shading || self.config.opacity_modulation;

        let mut color = Vec3::ZERO;
        let mut alpha = 0.0_f32;
        self.march(ray, t_entry, t_exit, |_, p| {
            let entry = tf.sample(self.source.sample(p, mode));
            if entry.w <= 0.0 {
                return true;
            }
            // opacity is defined per unit step
            let mut sample_alpha = 1.0 - (1.0 - entry.w.min(1.0)).powf(step);
            let mut sample_color = entry.xyz();

            if needs_gradient {
                let gradient = self.source.gradient(p, mode);
                if self.config.opacity_modulation {
                    let normalized = if max_gradient > 0.0 {
                        gradient.magnitude / max_gradient
                    } else {
                        0.0
                    };
                    sample_alpha =
                        (sample_alpha * self.config.boundary.weight(normalized)).clamp(0.0, 1.0);
                }
                if self.config.volume_shading {
                    sample_color = self.phong(sample_color, &gradient, -ray.direction);
                }
            }

            color += (1.0 - alpha) * sample_alpha * sample_color;
            alpha += (1.0 - alpha) * sample_alpha;
            alpha < EARLY_TERMINATION_ALPHA
        });
        color.extend(alpha)
    }

    /// Phong shading with a headlight; the gradient is the surface normal, lit from both sides.
    fn phong(&self, color: Vec3, gradient: &GradientVoxel, view: Vec3) -> Vec3 {
        if gradient.magnitude <= 0.0 {
            return color;
        }
        let params = &self.config.shading;
        let normal = gradient.direction / gradient.magnitude;
        let n_dot_l = normal.dot(view);
        let diffuse = n_dot_l.abs();
        let reflected = 2.0 * n_dot_l * normal - view;
        let specular = reflected.dot(view).max(0.0).powf(params.shininess);
        let lit = params.ambient * color
            + params.diffuse * diffuse * color
            + Vec3::splat(params.specular * specular);
        lit.clamp(Vec3::ZERO, Vec3::ONE)
    }

    /// Visits sample positions `t_entry + k * step_size` up to `t_exit` until `visit` returns
    /// false. With skipping enabled, positions inside inactive blocks are not visited; the march
    /// resumes at the first grid position on or past the block's exit.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn march(
        &self,
        ray: &Ray,
        t_entry: f32,
        t_exit: f32,
        mut visit: impl FnMut(f32, Vec3) -> bool,
    ) {
        let step = self.config.step_size;
        let mut k = 0_u32;
        loop {
            let t = t_entry + k as f32 * step;
            if t > t_exit {
                break;
            }
            let p = ray.at(t);
            if let Some(skip_to) = self.skip_inactive_block(ray, p) {
                let resume = ((skip_to - t_entry) / step).ceil().max(0.0) as u32;
                k = resume.max(k + 1);
                continue;
            }
            if !visit(t, p) {
                break;
            }
            k += 1;
        }
    }

    /// Exit parameter of the inactive block containing `p`, if any.
    fn skip_inactive_block(&self, ray: &Ray, p: Vec3) -> Option<f32> {
        let blocks = self.blocks?;
        let index = blocks.block_at(p)?;
        if blocks.is_block_active(index) {
            return None;
        }
        let origin = blocks.blocks()[index].position;
        let size = Vec3::splat(blocks.block_size() as f32);
        ray.intersect_box(origin, origin + size).map(|(_, far)| far)
    }

    fn max_value(&self) -> f32 {
        let max = self.source.max_value();
        if max > 0.0 {
            max
        } else {
            1.0
        }
    }
}

fn grey(value: f32) -> Vec4 {
    let v = value.clamp(0.0, 1.0);
    Vec4::new(v, v, v, 1.0)
}
