//! Demo scene: renderer-style components and the systems that drive them.

use std::cell::RefCell;
use std::rc::Rc;

use engine_ecs::{
    Component, Entity, EntityBlueprint, Result, System, SystemContext, SystemDescriptor,
    SystemList, World,
};
use glam::{Mat4, Quat, Vec3};

/// Mesh handle reserved for particles.
pub const PARTICLE_MESH: u32 = 99;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Transform {
    #[must_use]
    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }

    /// Model matrix handed to the renderer.
    #[must_use]
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

impl Component for Transform {}

/// Linear velocity in units per second.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Velocity(pub Vec3);
impl Component for Velocity {}

/// Constant rotation about a unit axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spin {
    pub axis: Vec3,
    /// Radians per second.
    pub rate: f32,
}
impl Component for Spin {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshHandle(pub u32);
impl Component for MeshHandle {}

/// Color multiplier; untinted meshes draw white.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tint(pub Vec3);
impl Component for Tint {}

/// Seconds until the entity is despawned.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lifetime {
    pub remaining: f32,
}
impl Component for Lifetime {}

/// Tag for entities submitted to the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Visible;
impl Component for Visible {}

/// What the draw system submitted during one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameStats {
    pub tick: u64,
    pub draws: usize,
    pub tinted: usize,
    /// Largest distance of a drawn model from the origin.
    pub extent: f32,
    pub respawned: usize,
}

impl FrameStats {
    /// Starts a fresh record when `tick` is a new frame.
    pub fn begin(&mut self, tick: u64) {
        if self.tick != tick {
            *self = Self {
                tick,
                ..Self::default()
            };
        }
    }
}

pub type SharedStats = Rc<RefCell<FrameStats>>;

/// A static or moving mesh.
#[must_use]
pub fn prop(index: usize) -> EntityBlueprint {
    let mut blueprint = EntityBlueprint::new()
        .with(Transform::from_translation(Vec3::new(index as f32 * 2.0, 0.0, 0.0)))
        .with(MeshHandle((index % 3) as u32))
        .with(Visible);
    if index % 2 == 0 {
        blueprint.set(Velocity(Vec3::new(0.0, 0.0, 1.0)));
    }
    if index % 3 == 0 {
        blueprint.set(Spin {
            axis: Vec3::Y,
            rate: std::f32::consts::FRAC_PI_2,
        });
    }
    if index % 4 == 0 {
        blueprint.set(Tint(Vec3::new(1.0, 0.5, 0.25)));
    }
    blueprint
}

/// A short-lived mesh flying away from the origin.
#[must_use]
pub fn particle(seed: usize) -> EntityBlueprint {
    let angle = seed as f32 * 2.399;
    EntityBlueprint::new()
        .with(Transform::from_translation(Vec3::ZERO))
        .with(Velocity(Vec3::new(angle.cos(), 1.0, angle.sin())))
        .with(MeshHandle(PARTICLE_MESH))
        .with(Lifetime {
            remaining: 0.5 + (seed % 4) as f32 * 0.25,
        })
        .with(Visible)
}

/// Spawns `count` entities, every fifth one a particle.
pub fn populate(world: &mut World, count: usize) -> Result<Vec<Entity>> {
    (0..count)
        .map(|index| {
            let blueprint = if index % 5 == 4 { particle(index) } else { prop(index) };
            world.spawn(&blueprint)
        })
        .collect()
}

/// Registers the scene's systems in frame order.
pub fn systems(world: &mut World, stats: SharedStats) -> Result<SystemList> {
    let transform = world.register::<Transform>();
    let velocity = world.register::<Velocity>();
    let spin = world.register::<Spin>();
    let mesh = world.register::<MeshHandle>();
    let tint = world.register::<Tint>();
    let lifetime = world.register::<Lifetime>();
    let visible = world.register::<Visible>();

    let mut list = SystemList::new();

    list.add_system(System::new(
        SystemDescriptor::new("integrate")
            .require(transform)
            .require(velocity),
        |ctx: &mut SystemContext<'_>| {
            let Some(&Velocity(v)) = ctx.get::<Velocity>(1) else {
                return;
            };
            let dt = ctx.dt;
            if let Some(t) = ctx.get_mut::<Transform>(0) {
                t.translation += v * dt;
            }
        },
    ))?;

    list.add_system(System::new(
        SystemDescriptor::new("spin").require(transform).require(spin),
        |ctx: &mut SystemContext<'_>| {
            let Some(&Spin { axis, rate }) = ctx.get::<Spin>(1) else {
                return;
            };
            let step = Quat::from_axis_angle(axis, rate * ctx.dt);
            if let Some(t) = ctx.get_mut::<Transform>(0) {
                t.rotation = (step * t.rotation).normalize();
            }
        },
    ))?;

    let age_stats = stats.clone();
    list.add_system(System::new(
        SystemDescriptor::new("age").require(lifetime),
        move |ctx: &mut SystemContext<'_>| {
            let dt = ctx.dt;
            let Some(life) = ctx.get_mut::<Lifetime>(0) else {
                return;
            };
            life.remaining -= dt;
            if life.remaining > 0.0 {
                return;
            }
            let entity = ctx.entity();
            let seed = ctx.tick_id as usize;
            ctx.commands().despawn(entity);
            ctx.commands().spawn(particle(seed));
            let mut stats = age_stats.borrow_mut();
            stats.begin(ctx.tick_id);
            stats.respawned += 1;
        },
    ))?;

    list.add_system(System::new(
        SystemDescriptor::new("draw")
            .require(mesh)
            .require(transform)
            .optional(tint)
            .require(visible),
        move |ctx: &mut SystemContext<'_>| {
            let mut stats = stats.borrow_mut();
            stats.begin(ctx.tick_id);
            let Some(transform) = ctx.get::<Transform>(1) else {
                return;
            };
            let model = transform.matrix();
            stats.extent = stats.extent.max(model.w_axis.truncate().length());
            stats.draws += 1;
            if ctx.is_present(2) {
                stats.tinted += 1;
            }
        },
    ))?;

    Ok(list)
}
