//! Solar-system orrery.
//!
//! Instanced rendering demo: every planet, asteroid and star is one instance
//! in shared GPU buffers. Compute shaders place the bodies on their orbits
//! and frustum-cull them, compacting the survivors into a shared
//! model-matrix buffer; the scene then renders with four instanced draw
//! calls into a G-buffer and one composite pass onto the surface.
//!
//! Controls: WASD + Space/Shift to fly, right mouse drag to look,
//! Up/Down to change simulation speed, C to toggle culling, Escape to quit.

mod bodies;
mod mesh;

use std::path::Path;

use anyhow::{Context, Result};
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec4};
use rand::SeedableRng;

use glint_engine::camera::FlyCamera;
use glint_engine::core::{App, AppControl, FrameCtx};
use glint_engine::device::GpuInit;
use glint_engine::gfx::{
    begin_surface_pass, AttachmentFormat, Binding, ComputeDesc, FramebufferId, Gfx, ProgramDesc,
    RenderOptions, TexelFormat, TextureBuffer,
};
use glint_engine::input::Key;
use glint_engine::logging::{init_logging, LoggingConfig};
use glint_engine::window::{Runtime, RuntimeConfig};

use bodies::{NUM_ASTEROIDS, NUM_STARS};

const ELLIPTICAL_ORBITS: bool = false;

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct SceneUniforms {
    view_proj: Mat4,
    time: f32,
    enable_light: f32,
    _pad: [f32; 2],
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct CullUniforms {
    view_proj: Mat4,
    time: f32,
    culling: u32,
    out_base: u32,
    _pad: u32,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct CompositeUniforms {
    view_pos: Vec4,
    size: Vec2,
    enable_outline: f32,
    enable_toon: f32,
}

struct Scene {
    gfx: Gfx,
    fb: FramebufferId,
    models: TextureBuffer,
    num_orbits: u32,

    visible_planets: u32,
    visible_asteroids: u32,
    visible_stars: u32,
}

struct Orrery {
    scene: Option<Scene>,
    camera: FlyCamera,
    time: f32,
    speed: f32,
    culling: bool,
}

impl Default for Orrery {
    fn default() -> Self {
        Self {
            scene: None,
            camera: FlyCamera {
                position: glam::Vec3::new(0.0, 30.0, 80.0),
                pitch: -0.35,
                ..Default::default()
            },
            time: 0.0,
            speed: 1.0,
            culling: true,
        }
    }
}

impl Orrery {
    fn build_scene(&mut self, ctx: &mut FrameCtx<'_, '_>) -> Result<Scene> {
        let gctx = ctx.gfx_ctx();
        let shader_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("shaders");
        let mut gfx = Gfx::new(&gctx, ctx.gpu.surface_format(), shader_dir);

        // Geometry, packed into one shared store.
        gfx.create_mesh_store(&gctx, "main", &[3], 4096, 16384)?;
        let tri = wgpu::PrimitiveTopology::TriangleList;
        let (v, i) = mesh::uv_sphere(32, 16);
        gfx.append_geometry(&gctx, "main", "sphere_hi", &v, &i, tri)?;
        let (v, i) = mesh::uv_sphere(10, 5);
        gfx.append_geometry(&gctx, "main", "sphere_lo", &v, &i, tri)?;
        let (v, i) = mesh::cube();
        gfx.append_geometry(&gctx, "main", "cube", &v, &i, tri)?;
        gfx.append_geometry(
            &gctx,
            "main",
            "circle",
            &mesh::circle(100),
            &[],
            wgpu::PrimitiveTopology::LineStrip,
        )?;
        gfx.append_geometry(&gctx, "main", "fullscreen", &mesh::fullscreen_triangle(), &[], tri)?;

        // G-buffer: albedo, normal, world position + depth.
        let fb = gfx.create_framebuffer(
            &gctx,
            "scene",
            ctx.size(),
            wgpu::Color::TRANSPARENT,
            &[
                AttachmentFormat::Rgba32Float,
                AttachmentFormat::Rgba32Float,
                AttachmentFormat::Rgba32Float,
                AttachmentFormat::Depth24PlusStencil8,
            ],
        )?;

        // Instance data.
        let mut rng = rand::rngs::StdRng::from_entropy();
        let params =
            gfx.create_texture_buffer(&gctx, "bodies", &bodies::body_params(ELLIPTICAL_ORBITS, &mut rng))?;
        let colors = gfx.create_texture_buffer(&gctx, "colors", &bodies::body_colors())?;
        let stars = gfx.create_texture_buffer(&gctx, "stars", &bodies::star_transforms(&mut rng))?;

        let models = gfx.create_texture_buffer::<Mat4>(&gctx, "models", &[])?;
        gfx.resize_buffer(&gctx, models.buffer(), bodies::model_buffer_len())?;

        let orbits = bodies::orbit_matrices(ELLIPTICAL_ORBITS);
        let orbit_base = bodies::num_planets() + NUM_ASTEROIDS;
        gfx.write_texture_buffer(&gctx, models, u64::from(orbit_base), &orbits)?;

        // Render programs.
        let scene_uniforms = Binding::Uniforms { size: std::mem::size_of::<SceneUniforms>() as u64 };
        gfx.load_program(&gctx, ProgramDesc {
            name: "planets",
            mesh: "main",
            framebuffer: Some(fb),
            options: RenderOptions { blend: false, depth: true, cull: true },
            bindings: vec![
                scene_uniforms.clone(),
                Binding::TexBuffer { view: models, format: TexelFormat::Mat4 },
                Binding::TexBuffer { view: colors, format: TexelFormat::Rgba32Float },
            ],
        })?;
        gfx.load_program(&gctx, ProgramDesc {
            name: "orbits",
            mesh: "main",
            framebuffer: Some(fb),
            options: RenderOptions { blend: false, depth: true, cull: false },
            bindings: vec![
                scene_uniforms.clone(),
                Binding::TexBuffer { view: models, format: TexelFormat::Mat4 },
            ],
        })?;
        gfx.load_program(&gctx, ProgramDesc {
            name: "stars",
            mesh: "main",
            framebuffer: Some(fb),
            options: RenderOptions { blend: false, depth: true, cull: true },
            bindings: vec![
                scene_uniforms,
                Binding::TexBuffer { view: models, format: TexelFormat::Mat4 },
            ],
        })?;
        gfx.load_program(&gctx, ProgramDesc {
            name: "composite",
            mesh: "main",
            framebuffer: None,
            options: RenderOptions { blend: false, depth: false, cull: false },
            bindings: vec![
                Binding::Uniforms { size: std::mem::size_of::<CompositeUniforms>() as u64 },
                Binding::Attachment { framebuffer: fb, slot: 0 },
                Binding::Attachment { framebuffer: fb, slot: 1 },
                Binding::Attachment { framebuffer: fb, slot: 2 },
                Binding::DepthAttachment { framebuffer: fb },
            ],
        })?;

        // Compute programs: orbital placement + frustum culling.
        let cull_uniforms = Binding::Uniforms { size: std::mem::size_of::<CullUniforms>() as u64 };
        gfx.load_compute(&gctx, ComputeDesc {
            name: "cull_bodies",
            bindings: vec![
                cull_uniforms.clone(),
                Binding::TexBuffer { view: params, format: TexelFormat::Rgba32Float },
                Binding::RwBuffer(models.buffer()),
            ],
        })?;
        gfx.load_compute(&gctx, ComputeDesc {
            name: "cull_stars",
            bindings: vec![
                cull_uniforms,
                Binding::TexBuffer { view: stars, format: TexelFormat::Mat4 },
                Binding::RwBuffer(models.buffer()),
            ],
        })?;

        Ok(Scene {
            gfx,
            fb,
            models,
            num_orbits: orbits.len() as u32,
            visible_planets: 0,
            visible_asteroids: 0,
            visible_stars: 0,
        })
    }

    fn frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> Result<AppControl> {
        let dt = ctx.time.dt;

        if ctx.input.pressed(Key::Escape) {
            return Ok(AppControl::Exit);
        }
        if ctx.input.pressed(Key::C) {
            self.culling = !self.culling;
            log::info!("culling {}", if self.culling { "on" } else { "off" });
        }
        if ctx.input.held(Key::ArrowUp) {
            self.speed += dt;
        }
        if ctx.input.held(Key::ArrowDown) {
            self.speed = (self.speed - dt).max(0.0);
        }

        self.camera.update(ctx.input, dt);
        self.time += self.speed * dt;

        let (width, height) = ctx.size();
        let gctx = ctx.gfx_ctx();
        let scene = self.scene.as_mut().context("scene not initialized")?;
        let gfx = &mut scene.gfx;

        gfx.view = self.camera.view();
        gfx.proj = self.camera.proj(width as f32 / height.max(1) as f32);
        let view_proj = gfx.view_proj();

        gfx.begin_frame(&gctx);

        // Place + cull into the shared model buffer. The compacted counts
        // feed straight into the instanced draws below.
        let p = bodies::num_planets();
        let cull = CullUniforms {
            view_proj,
            time: self.time,
            culling: self.culling as u32,
            out_base: 0,
            _pad: 0,
        };
        gfx.compute("cull_bodies")?.set_uniforms(&gctx, &cull);
        scene.visible_planets = gfx.dispatch_count(&gctx, "cull_bodies", 0, p)?;
        scene.visible_asteroids = gfx.dispatch_count(&gctx, "cull_bodies", p, NUM_ASTEROIDS)?;

        let star_cull = CullUniforms {
            out_base: 2 * p + NUM_ASTEROIDS,
            ..cull
        };
        gfx.compute("cull_stars")?.set_uniforms(&gctx, &star_cull);
        scene.visible_stars = gfx.dispatch_count(&gctx, "cull_stars", 0, NUM_STARS)?;

        // Per-frame uniform blocks.
        let scene_u = SceneUniforms {
            view_proj,
            time: self.time,
            enable_light: 1.0,
            _pad: [0.0; 2],
        };
        gfx.set_uniforms(&gctx, "planets", &scene_u)?;
        gfx.set_uniforms(&gctx, "orbits", &scene_u)?;
        gfx.set_uniforms(&gctx, "stars", &scene_u)?;
        gfx.set_uniforms(&gctx, "composite", &CompositeUniforms {
            view_pos: self.camera.position.extend(1.0),
            size: Vec2::new(width as f32, height as f32),
            enable_outline: 1.0,
            enable_toon: 1.0,
        })?;

        let fb = scene.fb;
        let num_orbits = scene.num_orbits;
        let (planets, asteroids, stars) =
            (scene.visible_planets, scene.visible_asteroids, scene.visible_stars);

        let mut recorded = Ok(());
        let control = ctx.render(|gctx, frame| {
            recorded = (|| -> Result<()> {
                // G-buffer pass: planets, asteroids, orbit lines, stars.
                let mut pass = gfx.begin_framebuffer_pass(&mut frame.encoder, fb)?;
                gfx.bind_program(gctx, &mut pass, "planets")?;
                gfx.set_instance_base(0);
                gfx.draw(gctx, &mut pass, "sphere_hi", planets);
                gfx.set_instance_base(p);
                gfx.draw(gctx, &mut pass, "sphere_lo", asteroids);

                gfx.bind_program(gctx, &mut pass, "orbits")?;
                gfx.set_instance_base(p + NUM_ASTEROIDS);
                gfx.draw(gctx, &mut pass, "circle", num_orbits);

                gfx.bind_program(gctx, &mut pass, "stars")?;
                gfx.set_instance_base(2 * p + NUM_ASTEROIDS);
                gfx.draw(gctx, &mut pass, "cube", stars);
                drop(pass);

                // Composite the G-buffer onto the surface.
                let mut pass = begin_surface_pass(&mut frame.encoder, &frame.view, wgpu::Color::BLACK);
                gfx.bind_program(gctx, &mut pass, "composite")?;
                gfx.draw(gctx, &mut pass, "fullscreen", 1);
                Ok(())
            })();
        });
        recorded?;

        if ctx.time.frame_index % 300 == 0 {
            let stats = gfx.frame_stats();
            log::debug!(
                "frame {}: {} draws, {} instances ({planets} planets, {asteroids} asteroids, {stars} stars)",
                ctx.time.frame_index,
                stats.draw_calls,
                stats.instances,
            );
        }

        Ok(control)
    }
}

impl App for Orrery {
    fn on_init(&mut self, ctx: &mut FrameCtx<'_, '_>) -> Result<()> {
        let scene = self.build_scene(ctx)?;
        log::info!(
            "orrery ready: {} bodies, {} asteroids, {} stars",
            bodies::num_planets(),
            NUM_ASTEROIDS,
            NUM_STARS
        );
        self.scene = Some(scene);
        Ok(())
    }

    fn on_frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl {
        match self.frame(ctx) {
            Ok(control) => control,
            Err(e) => {
                log::error!("frame failed: {e:#}");
                AppControl::Exit
            }
        }
    }

    fn on_resize(&mut self, ctx: &mut FrameCtx<'_, '_>, size: (u32, u32)) {
        if size.0 == 0 || size.1 == 0 {
            return;
        }
        let gctx = ctx.gfx_ctx();
        if let Some(scene) = &mut self.scene {
            if let Err(e) = scene.gfx.resize_framebuffer(&gctx, scene.fb, size) {
                log::error!("framebuffer resize failed: {e}");
            }
        }
    }
}

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    Runtime::run(
        RuntimeConfig {
            title: "glint orrery".to_string(),
            initial_size: winit::dpi::LogicalSize::new(1280.0, 800.0),
        },
        GpuInit::default(),
        Orrery::default(),
    )
}
