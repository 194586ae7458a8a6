//! Photogrammetric geolocation engine.
//!
//! Pure and deterministic: (pixel, camera pose) -> (lat/lon, confidence,
//! uncertainty). Degenerate geometry never fails; it falls back to the
//! camera's own position and lets the confidence reflect that.

mod camera;
mod confidence;
mod ground;

pub use camera::{intrinsic_matrix, pixel_to_normalized, rotation_matrix};
pub use confidence::{blend_confidence, uncertainty_radius, UNCERTAINTY_FLOOR_M};
pub use ground::{offset_to_lat_lon, GroundIntersection};

use nalgebra::Vector3;

use crate::models::{CameraPose, ConfidenceFlag, GeolocationResult};

pub const METHOD_GROUND_PLANE: &str = "ground-plane-intersection";
pub const METHOD_CAMERA_FALLBACK: &str = "camera-position-fallback";

/// Geolocate a pixel against the ground plane at `target_elevation_m`.
pub fn geolocate(
    pixel_x: f64,
    pixel_y: f64,
    pose: &CameraPose,
    target_elevation_m: f64,
) -> GeolocationResult {
    let (nx, ny) = pixel_to_normalized(pixel_x, pixel_y, pose);

    let cam_ray = Vector3::new(nx, ny, 1.0).normalize();
    let rotation = rotation_matrix(pose.heading_deg, pose.pitch_deg, pose.roll_deg);
    // Rotation is orthogonal so transpose = inverse.
    let world_ray = (rotation.transpose() * cam_ray).normalize();

    let intersection =
        ground::ground_intersection(pose.elevation_m, &world_ray, target_elevation_m);

    let confidence = blend_confidence(world_ray.z, pose.elevation_m);
    let flag = ConfidenceFlag::from_confidence(confidence);

    match intersection {
        GroundIntersection::Point { east_m, north_m } => {
            let (latitude, longitude) =
                offset_to_lat_lon(pose.latitude, pose.longitude, east_m, north_m);
            GeolocationResult {
                latitude,
                longitude,
                confidence,
                flag,
                uncertainty_m: uncertainty_radius(pose.elevation_m, confidence),
                method: METHOD_GROUND_PLANE,
            }
        }
        GroundIntersection::Degenerate => GeolocationResult {
            latitude: pose.latitude,
            longitude: pose.longitude,
            confidence,
            flag,
            uncertainty_m: f64::INFINITY,
            method: METHOD_CAMERA_FALLBACK,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pose(elevation_m: f64, heading: f64, pitch: f64, roll: f64) -> CameraPose {
        CameraPose {
            latitude: 40.0,
            longitude: -74.0,
            elevation_m,
            heading_deg: heading,
            pitch_deg: pitch,
            roll_deg: roll,
            focal_length_px: 3000.0,
            sensor_width_mm: 13.2,
            sensor_height_mm: 8.8,
            image_width_px: 1920.0,
            image_height_px: 1440.0,
        }
    }

    #[test]
    fn nadir_view_lands_at_camera_footprint() {
        // Roll 180 with zero pitch flips the boresight straight down, so the
        // center pixel intersects the ground directly below the camera.
        let p = pose(100.0, 0.0, 0.0, 180.0);
        let result = geolocate(960.0, 720.0, &p, 0.0);
        assert_eq!(result.method, METHOD_GROUND_PLANE);
        assert!((result.latitude - 40.0).abs() < 1e-6);
        assert!((result.longitude - -74.0).abs() < 1e-6);
        assert!(result.confidence > 0.0 && result.confidence <= 1.0);
        assert!(result.uncertainty_m >= UNCERTAINTY_FLOOR_M);
        assert!(result.uncertainty_m.is_finite());
    }

    #[test]
    fn oblique_view_lands_ahead_of_camera() {
        let p = pose(100.0, 0.0, 30.0, 180.0);
        let result = geolocate(960.0, 720.0, &p, 0.0);
        assert_eq!(result.method, METHOD_GROUND_PLANE);
        // Tilting away from nadir moves the footprint off the camera point.
        let moved = (result.latitude - 40.0).abs() + (result.longitude - -74.0).abs();
        assert!(moved > 1e-5);
    }

    #[test]
    fn downward_pitch_center_pixel_stays_near_camera() {
        // Center pixel, camera at (40, -74, 100 m), heading 0, pitch -45.
        let p = pose(100.0, 0.0, -45.0, 0.0);
        let result = geolocate(960.0, 720.0, &p, 0.0);
        // Stays within tens of meters of the camera position.
        assert!((result.latitude - 40.0).abs() * 111_320.0 < 50.0);
        assert!((result.longitude - -74.0).abs() * 111_320.0 < 50.0);
        assert!(result.confidence > 0.0 && result.confidence <= 1.0);
        assert!(result.uncertainty_m > 5.0);
    }

    #[test]
    fn parallel_ray_falls_back_to_camera_position() {
        // Pitch 90 points the boresight at the horizon: ray_z ~ 0.
        let p = pose(100.0, 0.0, 90.0, 0.0);
        let result = geolocate(960.0, 720.0, &p, 0.0);
        assert_eq!(result.method, METHOD_CAMERA_FALLBACK);
        assert_eq!(result.latitude, 40.0);
        assert_eq!(result.longitude, -74.0);
        assert!(result.uncertainty_m.is_infinite());
    }

    #[test]
    fn upward_ray_falls_back_to_camera_position() {
        // Level camera above the target plane: t < 0, ground is behind.
        let p = pose(100.0, 0.0, 0.0, 0.0);
        let result = geolocate(960.0, 720.0, &p, 0.0);
        assert_eq!(result.method, METHOD_CAMERA_FALLBACK);
    }

    #[test]
    fn degenerate_confidence_not_above_nadir_confidence() {
        let nadir = geolocate(960.0, 720.0, &pose(100.0, 0.0, 0.0, 180.0), 0.0);
        let parallel = geolocate(960.0, 720.0, &pose(100.0, 0.0, 90.0, 0.0), 0.0);
        assert!(parallel.confidence <= nadir.confidence);
    }
}
