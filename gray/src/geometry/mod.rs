//! Scene geometry: axis-aligned bounding boxes and viewable primitives.

mod aabb;
mod primitive;

pub use aabb::Aabb;
pub use primitive::{
    Cuboid, Cylinder, Face, HitPoint, Primitive, PrimitiveEnum, Sphere, Triangle,
};
