//! Ray / ground-plane intersection and flat-Earth coordinate conversion.

use nalgebra::Vector3;

/// Meters per degree of latitude; longitude is scaled by cos(lat).
const METERS_PER_DEGREE: f64 = 111_320.0;

/// A world ray steeper than this is treated as parallel to the ground.
const PARALLEL_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GroundIntersection {
    /// East/north offset from the camera to the ground hit, meters.
    Point { east_m: f64, north_m: f64 },
    /// Ray parallel to the plane or pointing away from it.
    Degenerate,
}

/// Intersect a unit world ray from the camera (at `camera_elevation_m`)
/// with the horizontal plane at `target_elevation_m`, solving
/// camera_z + t * ray_z = target_elevation for t >= 0.
pub fn ground_intersection(
    camera_elevation_m: f64,
    world_ray: &Vector3<f64>,
    target_elevation_m: f64,
) -> GroundIntersection {
    if world_ray.z.abs() < PARALLEL_EPSILON {
        return GroundIntersection::Degenerate;
    }

    let t = (target_elevation_m - camera_elevation_m) / world_ray.z;
    if t < 0.0 {
        return GroundIntersection::Degenerate;
    }

    GroundIntersection::Point {
        east_m: t * world_ray.x,
        north_m: t * world_ray.y,
    }
}

/// Convert a local east/north offset to latitude/longitude using the
/// flat-Earth approximation at the camera's latitude. Latitude clamps to
/// [-90, 90]; longitude wraps into (-180, 180].
pub fn offset_to_lat_lon(
    camera_lat: f64,
    camera_lon: f64,
    east_m: f64,
    north_m: f64,
) -> (f64, f64) {
    let lat = camera_lat + north_m / METERS_PER_DEGREE;
    let lon_scale = METERS_PER_DEGREE * camera_lat.to_radians().cos().abs().max(1e-9);
    let lon = camera_lon + east_m / lon_scale;

    (lat.clamp(-90.0, 90.0), wrap_longitude(lon))
}

fn wrap_longitude(lon: f64) -> f64 {
    let mut wrapped = (lon + 180.0) % 360.0;
    if wrapped <= 0.0 {
        wrapped += 360.0;
    }
    wrapped - 180.0
}
