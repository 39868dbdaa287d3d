//! Geometry

// Define macros for property based testing.
#[cfg(test)]
#[macro_export]
macro_rules! prop_range {
    ($name: ident, $t: ty, $r: expr) => {
        prop_compose! {
            fn $name()(f in $r) -> $t {
                f
            }
        }
    };
}

#[cfg(test)]
#[macro_export]
macro_rules! prop_vector2 {
    ($name: ident, $t: ty, $xr: expr, $yr: expr) => {
        prop_compose! {
            fn $name()(x in $xr, y in $yr) -> Vector2<$t> {
                Vector2 { x, y }
            }
        }
    };
}

#[cfg(test)]
#[macro_export]
macro_rules! prop_vector3 {
    ($name: ident, $t: ty, $xr: expr, $yr: expr, $zr: expr) => {
        prop_compose! {
            fn $name()(x in $xr, y in $yr, z in $zr) -> Vector3<$t> {
                Vector3 { x, y, z }
            }
        }
    };
}

/// Generates a unit vector from two uniform numbers.
#[cfg(test)]
#[macro_export]
macro_rules! prop_unit_vector3 {
    ($name: ident) => {
        prop_compose! {
            fn $name()(u in 0.0..1.0f64, v in 0.0..1.0f64) -> Vector3f {
                let z = 1.0 - 2.0 * u;
                let r = (1.0 - z * z).max(0.0).sqrt();
                let phi = 2.0 * std::f64::consts::PI * v;
                Vector3f::new(r * phi.cos(), r * phi.sin(), z)
            }
        }
    };
}

mod bounds3;
mod common;
mod frame;
mod matrix4x4;
mod ray;
mod surface_geometry;
mod transform;
mod vector2;
mod vector3;

// Re-export
pub use bounds3::*;
pub use common::*;
pub use frame::*;
pub use matrix4x4::*;
pub use ray::*;
pub use surface_geometry::*;
pub use transform::*;
pub use vector2::*;
pub use vector3::*;
