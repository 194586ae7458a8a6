//! Pinhole camera model: intrinsics, orientation, pixel rays.

use nalgebra::Matrix3;

use crate::models::CameraPose;

/// 3x3 pinhole intrinsic matrix K built from the focal length and the
/// image center.
pub fn intrinsic_matrix(pose: &CameraPose) -> Matrix3<f64> {
    let fx = pose.focal_length_px;
    let fy = pose.focal_length_px;
    let cx = pose.image_width_px / 2.0;
    let cy = pose.image_height_px / 2.0;

    Matrix3::new(
        fx, 0.0, cx, //
        0.0, fy, cy, //
        0.0, 0.0, 1.0,
    )
}

/// World-to-camera rotation composed as R = Rz(yaw) * Ry(pitch) * Rx(roll).
/// The result is orthogonal with determinant 1; angles are degrees.
pub fn rotation_matrix(heading_deg: f64, pitch_deg: f64, roll_deg: f64) -> Matrix3<f64> {
    let yaw = heading_deg.to_radians();
    let pitch = pitch_deg.to_radians();
    let roll = roll_deg.to_radians();

    let rz = Matrix3::new(
        yaw.cos(), -yaw.sin(), 0.0, //
        yaw.sin(), yaw.cos(), 0.0, //
        0.0, 0.0, 1.0,
    );
    let ry = Matrix3::new(
        pitch.cos(), 0.0, pitch.sin(), //
        0.0, 1.0, 0.0, //
        -pitch.sin(), 0.0, pitch.cos(),
    );
    let rx = Matrix3::new(
        1.0, 0.0, 0.0, //
        0.0, roll.cos(), -roll.sin(), //
        0.0, roll.sin(), roll.cos(),
    );

    rz * ry * rx
}

/// Map a pixel to normalized image coordinates relative to the optical
/// center: nx = (px - cx) / fx, ny = (py - cy) / fy.
pub fn pixel_to_normalized(pixel_x: f64, pixel_y: f64, pose: &CameraPose) -> (f64, f64) {
    let k = intrinsic_matrix(pose);
    let (fx, fy) = (k[(0, 0)], k[(1, 1)]);
    let (cx, cy) = (k[(0, 2)], k[(1, 2)]);

    ((pixel_x - cx) / fx, (pixel_y - cy) / fy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CameraPose;
    use nalgebra::Matrix3;

    fn pose() -> CameraPose {
        CameraPose {
            latitude: 0.0,
            longitude: 0.0,
            elevation_m: 50.0,
            heading_deg: 0.0,
            pitch_deg: 0.0,
            roll_deg: 0.0,
            focal_length_px: 3000.0,
            sensor_width_mm: 13.2,
            sensor_height_mm: 8.8,
            image_width_px: 1920.0,
            image_height_px: 1440.0,
        }
    }

    #[test]
    fn intrinsic_matrix_places_optical_center() {
        let k = intrinsic_matrix(&pose());
        assert_eq!(k[(0, 0)], 3000.0);
        assert_eq!(k[(1, 1)], 3000.0);
        assert_eq!(k[(0, 2)], 960.0);
        assert_eq!(k[(1, 2)], 720.0);
        assert_eq!(k[(2, 2)], 1.0);
    }

    #[test]
    fn center_pixel_normalizes_to_origin() {
        let (nx, ny) = pixel_to_normalized(960.0, 720.0, &pose());
        assert_eq!(nx, 0.0);
        assert_eq!(ny, 0.0);
    }

    #[test]
    fn rotation_is_orthogonal_with_unit_determinant() {
        let cases = [
            (0.0, 0.0, 0.0),
            (45.0, -30.0, 10.0),
            (359.0, 89.0, -179.0),
            (180.0, -89.0, 90.0),
            (123.4, 56.7, -12.3),
        ];
        for (h, p, r) in cases {
            let rot = rotation_matrix(h, p, r);
            let identity_error = (rot.transpose() * rot - Matrix3::identity()).norm();
            assert!(identity_error < 1e-5, "R'R != I for ({h}, {p}, {r})");
            assert!((rot.determinant() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn zero_angles_give_identity() {
        let rot = rotation_matrix(0.0, 0.0, 0.0);
        assert!((rot - Matrix3::identity()).norm() < 1e-12);
    }
}
