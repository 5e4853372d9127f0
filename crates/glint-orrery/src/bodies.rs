//! Solar-system data and instance-buffer construction.
//!
//! The GPU-facing layout mirrors the draw order. One shared model-matrix
//! buffer holds four regions:
//!
//! ```text
//! [0 .. P)               planet models    (compute output)
//! [P .. P+A)             asteroid models  (compute output)
//! [P+A .. P+A+orbits)    orbit matrices   (written once from the CPU)
//! [2P+A .. 2P+A+S)       star models      (compute output)
//! ```
//!
//! where P = planet count, A = asteroid count, S = star count. Draw calls
//! reposition the instance base at the start of their region, so shaders
//! index one flat `array<mat4x4<f32>>` everywhere.

use glam::{Mat4, Vec3, Vec4};
use rand::Rng;

pub const NUM_ASTEROIDS: u32 = 1000;
/// Trailing asteroids become Saturn's ring.
pub const NUM_RING: u32 = 100;
pub const NUM_STARS: u32 = 10_000;

pub struct Body {
    pub name: &'static str,
    pub radius: f32,
    pub distance: f32,
    pub color: Vec3,
    /// Index into [`BODIES`] of the body this one orbits; None orbits the sun
    /// (or is the sun).
    pub parent: Option<usize>,
    pub eccentricity: f32,
}

const fn body(
    name: &'static str,
    radius: f32,
    distance: f32,
    color: Vec3,
    parent: Option<usize>,
    eccentricity: f32,
) -> Body {
    Body { name, radius, distance, color, parent, eccentricity }
}

pub const BODIES: &[Body] = &[
    body("Sun", 3.0, 0.0, Vec3::new(1.0, 0.9, 0.8), None, 0.0),
    body("Mercury", 0.5, 10.0, Vec3::new(0.5, 0.5, 0.5), None, 0.3),
    body("Venus", 0.8, 13.0, Vec3::new(1.0, 0.4, 0.0), None, 0.3),
    body("Earth", 1.0, 17.0, Vec3::new(0.2, 0.4, 1.0), None, 0.3),
    body("Moon", 0.2, 2.0, Vec3::new(0.6, 0.6, 0.6), Some(3), 0.0),
    body("Mars", 0.7, 20.0, Vec3::new(1.0, 0.0, 0.4), None, 0.3),
    body("Deimos", 0.15, 2.0, Vec3::new(0.2, 0.3, 0.4), Some(5), 0.0),
    body("Phobos", 0.1, 2.5, Vec3::new(0.4, 0.3, 0.2), Some(5), 0.0),
    body("Jupiter", 1.5, 40.0, Vec3::new(1.0, 0.6, 0.3), None, 0.3),
    body("Io", 0.15, 2.5, Vec3::new(1.0, 0.8, 0.7), Some(8), 0.0),
    body("Europa", 0.12, 3.0, Vec3::new(1.0, 0.5, 0.7), Some(8), 0.0),
    body("Ganymede", 0.3, 4.0, Vec3::new(0.8, 0.8, 0.9), Some(8), 0.0),
    body("Callisto", 0.2, 4.5, Vec3::new(0.8, 0.7, 1.0), Some(8), 0.0),
    body("Saturn", 1.3, 45.0, Vec3::new(1.0, 0.8, 0.5), None, 0.3),
    body("Uranus", 1.1, 55.0, Vec3::new(0.4, 0.9, 1.0), None, 0.3),
    body("Neptune", 1.0, 60.0, Vec3::new(0.3, 0.5, 1.0), None, 0.3),
    body("Pluto", 0.3, 70.0, Vec3::new(0.3, 0.3, 0.3), None, 0.3),
];

pub fn num_planets() -> u32 {
    BODIES.len() as u32
}

/// Total length of the shared model buffer, regions included.
pub fn model_buffer_len() -> u64 {
    u64::from(2 * num_planets() + NUM_ASTEROIDS + NUM_STARS)
}

/// Per-body parameter texels: (radius, distance, parent index, eccentricity),
/// planets first, then asteroids. Parent is -1 for sun-orbiting bodies.
pub fn body_params(elliptical: bool, rng: &mut impl Rng) -> Vec<Vec4> {
    let ecc = |e: f32| if elliptical { e } else { 0.0 };

    let mut params: Vec<Vec4> = BODIES
        .iter()
        .map(|b| {
            let parent = b.parent.map_or(-1.0, |p| p as f32);
            Vec4::new(b.radius, b.distance, parent, ecc(b.eccentricity))
        })
        .collect();

    // Main-belt asteroids between Mars and Jupiter.
    for _ in 0..NUM_ASTEROIDS - NUM_RING {
        params.push(Vec4::new(
            rng.gen_range(0.1..0.2),
            rng.gen_range(29.0..33.0),
            -1.0,
            ecc(rng.gen_range(0.08..0.12)),
        ));
    }
    // Saturn's ring.
    let saturn = BODIES.iter().position(|b| b.name == "Saturn").unwrap() as f32;
    for _ in 0..NUM_RING {
        params.push(Vec4::new(
            rng.gen_range(0.06..0.1),
            rng.gen_range(2.0..2.5),
            saturn,
            0.0,
        ));
    }

    params
}

/// Per-body colors, index-aligned with [`body_params`].
pub fn body_colors() -> Vec<Vec4> {
    let mut colors: Vec<Vec4> = BODIES.iter().map(|b| b.color.extend(0.0)).collect();

    for i in 0..NUM_ASTEROIDS - NUM_RING {
        let t = i as f32;
        colors.push(Vec4::new(t.cos().abs(), t.sin().abs(), 1.0, 0.0));
    }
    for i in 0..NUM_RING {
        colors.push(Vec4::new(1.0, 0.9, ((i as f32).sin() + 1.0) * 0.7, 0.0));
    }

    colors
}

/// Orbit-line matrices for sun-orbiting bodies: the unit XZ circle scaled to
/// the (possibly elliptical) orbit.
pub fn orbit_matrices(elliptical: bool) -> Vec<Mat4> {
    BODIES
        .iter()
        .filter(|b| b.parent.is_none() && b.distance > 0.0)
        .map(|b| {
            let e = if elliptical { b.eccentricity } else { 0.0 };
            Mat4::from_translation(Vec3::new(-e * b.distance, 0.0, 0.0))
                * Mat4::from_scale(Vec3::new((1.0 + e) * b.distance, 1.0, b.distance))
        })
        .collect()
}

/// Random star transforms on a far shell around the scene.
pub fn star_transforms(rng: &mut impl Rng) -> Vec<Mat4> {
    (0..NUM_STARS)
        .map(|_| {
            let theta = rng.gen_range(0.0..std::f32::consts::TAU);
            let phi = rng.gen_range(0.0..std::f32::consts::PI);
            let distance = rng.gen_range(4000.0..5000.0f32);
            let pos = Vec3::new(
                distance * phi.sin() * theta.cos(),
                distance * phi.sin() * theta.sin(),
                distance * phi.cos(),
            );
            Mat4::from_translation(pos)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn rng() -> rand::rngs::StdRng {
        rand::rngs::StdRng::seed_from_u64(7)
    }

    #[test]
    fn params_and_colors_are_index_aligned() {
        let params = body_params(false, &mut rng());
        let colors = body_colors();
        assert_eq!(params.len(), colors.len());
        assert_eq!(params.len() as u32, num_planets() + NUM_ASTEROIDS);
    }

    #[test]
    fn moons_reference_valid_parents() {
        for body in BODIES {
            if let Some(p) = body.parent {
                assert!(p < BODIES.len());
                assert!(BODIES[p].parent.is_none(), "moons of moons are not modeled");
            }
        }
    }

    #[test]
    fn circular_mode_zeroes_eccentricity() {
        let params = body_params(false, &mut rng());
        assert!(params.iter().all(|p| p.w == 0.0));
    }

    #[test]
    fn ring_asteroids_orbit_saturn() {
        let params = body_params(true, &mut rng());
        let saturn = BODIES.iter().position(|b| b.name == "Saturn").unwrap() as f32;
        let ring = &params[(num_planets() + NUM_ASTEROIDS - NUM_RING) as usize..];
        assert_eq!(ring.len(), NUM_RING as usize);
        assert!(ring.iter().all(|p| p.z == saturn));
    }

    #[test]
    fn orbit_lines_cover_every_root_body() {
        let orbits = orbit_matrices(false);
        let roots = BODIES
            .iter()
            .filter(|b| b.parent.is_none() && b.distance > 0.0)
            .count();
        assert_eq!(orbits.len(), roots);
    }

    #[test]
    fn model_regions_fit_the_shared_buffer() {
        let p = num_planets();
        let orbit_region_start = p + NUM_ASTEROIDS;
        let star_region_start = 2 * p + NUM_ASTEROIDS;
        assert!(orbit_region_start + orbit_matrices(false).len() as u32 <= star_region_start);
        assert_eq!(
            model_buffer_len(),
            u64::from(star_region_start + NUM_STARS)
        );
    }
}
