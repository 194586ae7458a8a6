//! Confidence and uncertainty formulas.

/// Uncertainty radius never reports below this, even for perfect geometry.
pub const UNCERTAINTY_FLOOR_M: f64 = 5.0;

/// Half-angle used for the base uncertainty cone, tan(30 deg).
const UNCERTAINTY_CONE_TAN: f64 = 0.5773502691896257;

const WEIGHT_VERTICALITY: f64 = 0.7;
const WEIGHT_HEIGHT: f64 = 0.3;

/// Weighted blend of ray verticality and height confidence, clamped to
/// [0, 1]. A near-vertical ray gives a tight ground fix; a very high
/// camera degrades it.
pub fn blend_confidence(world_ray_z: f64, elevation_m: f64) -> f64 {
    let verticality = world_ray_z.abs().min(1.0);
    let height_confidence = (1.0 - elevation_m / 200.0).max(0.2);

    (WEIGHT_VERTICALITY * verticality + WEIGHT_HEIGHT * height_confidence).clamp(0.0, 1.0)
}

/// Uncertainty radius in meters: a 30-degree cone from the camera height,
/// widened as confidence drops, floored at 5 m.
pub fn uncertainty_radius(elevation_m: f64, confidence: f64) -> f64 {
    let base = elevation_m * UNCERTAINTY_CONE_TAN;
    (base / confidence.max(0.1)).max(UNCERTAINTY_FLOOR_M)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertical_ray_low_camera_scores_high() {
        let c = blend_confidence(-1.0, 10.0);
        assert!(c > 0.9);
        assert!(c <= 1.0);
    }

    #[test]
    fn horizontal_ray_scores_low() {
        let c = blend_confidence(0.0, 10.0);
        assert!(c < 0.5);
    }

    #[test]
    fn height_confidence_floors_at_point_two() {
        // At 1000 m the height term saturates; only verticality remains.
        let c = blend_confidence(-1.0, 1000.0);
        assert!((c - (0.7 + 0.3 * 0.2)).abs() < 1e-12);
    }

    #[test]
    fn uncertainty_never_below_floor() {
        assert_eq!(uncertainty_radius(0.0, 1.0), UNCERTAINTY_FLOOR_M);
        assert_eq!(uncertainty_radius(1.0, 1.0), UNCERTAINTY_FLOOR_M);
    }

    #[test]
    fn uncertainty_grows_with_elevation_at_fixed_confidence() {
        let low = uncertainty_radius(50.0, 0.8);
        let mid = uncertainty_radius(100.0, 0.8);
        let high = uncertainty_radius(200.0, 0.8);
        assert!(low < mid && mid < high);
    }

    #[test]
    fn low_confidence_widens_radius() {
        assert!(uncertainty_radius(100.0, 0.2) > uncertainty_radius(100.0, 0.9));
        // Confidence below 0.1 is clamped so the radius stays finite.
        assert!(uncertainty_radius(100.0, 0.0).is_finite());
    }
}
