use nalgebra::{Point3, Vector3};
use std::f64::consts::{PI, TAU};

/// Wraps an angle in radians into the half-open interval (-π, π].
#[inline]
pub fn wrap_angle(angle: f64) -> f64 {
    if angle > -PI && angle <= PI {
        return angle;
    }
    let wrapped = angle.rem_euclid(TAU);
    if wrapped > PI { wrapped - TAU } else { wrapped }
}

/// Signed circular difference `a - b`, wrapped into (-π, π].
#[inline]
pub fn angular_difference(a: f64, b: f64) -> f64 {
    wrap_angle(a - b)
}

/// Torsion angle p0-p1-p2-p3 in radians, IUPAC sign convention.
pub fn dihedral_angle(
    p0: &Point3<f64>,
    p1: &Point3<f64>,
    p2: &Point3<f64>,
    p3: &Point3<f64>,
) -> f64 {
    let b0 = p0 - p1;
    let b1 = (p2 - p1).normalize();
    let b2 = p3 - p2;

    let v = b0 - b1 * b0.dot(&b1);
    let w = b2 - b1 * b2.dot(&b1);

    let x = v.dot(&w);
    let y = b1.cross(&v).dot(&w);
    y.atan2(x)
}

/// Angle a-b-c at vertex `b`, in radians.
pub fn bond_angle(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>) -> f64 {
    let ba = a - b;
    let bc = c - b;
    let cos = ba.dot(&bc) / (ba.norm() * bc.norm());
    cos.clamp(-1.0, 1.0).acos()
}

pub fn calculate_hn_position(
    n_pos: &Point3<f64>,
    ca_pos: &Point3<f64>,
    prev_c_pos: &Point3<f64>,
    bond_length: f64,
) -> Point3<f64> {
    let n_ca = (ca_pos - n_pos).normalize();
    let n_c_prev = (prev_c_pos - n_pos).normalize();

    let hn_dir = -(n_ca + n_c_prev).normalize();

    n_pos + hn_dir * bond_length
}

pub fn centroid(points: &[Point3<f64>]) -> Option<Point3<f64>> {
    if points.is_empty() {
        return None;
    }
    let sum = points
        .iter()
        .fold(Vector3::zeros(), |acc, p| acc + p.coords);
    Some(Point3::from(sum / points.len() as f64))
}

pub fn calculate_rmsd(coords1: &[Point3<f64>], coords2: &[Point3<f64>]) -> Option<f64> {
    if coords1.len() != coords2.len() || coords1.is_empty() {
        return None;
    }
    let n = coords1.len() as f64;
    let squared_dist_sum: f64 = coords1
        .iter()
        .zip(coords2.iter())
        .map(|(p1, p2)| (p1 - p2).norm_squared())
        .sum();
    Some((squared_dist_sum / n).sqrt())
}
