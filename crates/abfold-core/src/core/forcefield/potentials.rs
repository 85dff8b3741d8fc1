use std::f64::consts::FRAC_PI_2;

pub const COULOMB_CONSTANT: f64 = 332.0637; // In kcal·Å/(mol·e²)

/// Softened separation `sqrt(r² + δ²)`; stays positive at zero distance.
#[inline]
pub fn soft_core_distance(dist: f64, softening: f64) -> f64 {
    (dist * dist + softening * softening).sqrt()
}

/// Expects an already softened, strictly positive distance.
#[inline]
pub fn lennard_jones_12_6(dist: f64, r_min: f64, well_depth: f64) -> f64 {
    let rho = r_min / dist;
    let rho6 = rho.powi(6);
    let rho12 = rho6 * rho6;
    well_depth * (rho12 - 2.0 * rho6)
}

/// Coulomb energy with a distance-dependent dielectric `ε(r) = slope · r`.
#[inline]
pub fn coulomb_distance_dependent(dist: f64, q1: f64, q2: f64, slope: f64) -> f64 {
    COULOMB_CONSTANT * q1 * q2 / (slope * dist * dist)
}

#[inline]
pub fn harmonic(value: f64, equilibrium: f64, force_constant: f64) -> f64 {
    let delta = value - equilibrium;
    force_constant * delta * delta
}

/// CHARMM-style switching function: 1 below `r_on`, 0 beyond `r_off`, C¹-smooth between.
#[inline]
pub fn switching(dist: f64, r_on: f64, r_off: f64) -> f64 {
    if dist <= r_on {
        return 1.0;
    }
    if dist >= r_off {
        return 0.0;
    }
    let r2 = dist * dist;
    let on2 = r_on * r_on;
    let off2 = r_off * r_off;
    let num = (off2 - r2).powi(2) * (off2 + 2.0 * r2 - 3.0 * on2);
    num / (off2 - on2).powi(3)
}

/// 1 at `center`, falling as cos² to 0 at `center ± half_width`, 0 beyond.
#[inline]
pub fn cosine_squared_taper(value: f64, center: f64, half_width: f64) -> f64 {
    let x = (value - center) / half_width;
    if x.abs() >= 1.0 {
        return 0.0;
    }
    (FRAC_PI_2 * x).cos().powi(2)
}

/// Smooth step from 1 (well inside `midpoint`) to 0 (well outside).
#[inline]
pub fn logistic_switch(dist: f64, midpoint: f64, width: f64) -> f64 {
    1.0 / (1.0 + ((dist - midpoint) / width).exp())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-9;

    fn f64_approx_equal(a: f64, b: f64) -> bool {
        (a - b).abs() < TOLERANCE
    }

    #[test]
    fn soft_core_distance_is_positive_at_zero() {
        assert!(f64_approx_equal(soft_core_distance(0.0, 0.8), 0.8));
        assert!(f64_approx_equal(soft_core_distance(3.0, 4.0), 5.0));
    }

    #[test]
    fn lennard_jones_12_6_at_r_min_is_negative_well_depth() {
        assert!(f64_approx_equal(lennard_jones_12_6(3.5, 3.5, 0.2), -0.2));
    }

    #[test]
    fn lennard_jones_12_6_is_repulsive_inside_r_min() {
        assert!(lennard_jones_12_6(2.0, 3.5, 0.2) > 0.0);
        assert!(lennard_jones_12_6(1.0, 3.5, 0.2) > lennard_jones_12_6(2.0, 3.5, 0.2));
    }

    #[test]
    fn softened_lennard_jones_is_finite_at_zero_separation() {
        let e = lennard_jones_12_6(soft_core_distance(0.0, 0.8), 3.7, 0.15);
        assert!(e.is_finite());
        assert!(e > 0.0);
    }

    #[test]
    fn coulomb_distance_dependent_has_sign_of_charge_product() {
        assert!(coulomb_distance_dependent(3.0, 0.5, 0.5, 4.0) > 0.0);
        assert!(coulomb_distance_dependent(3.0, 0.5, -0.5, 4.0) < 0.0);
        let e = coulomb_distance_dependent(2.0, 1.0, 1.0, 1.0);
        assert!(f64_approx_equal(e, COULOMB_CONSTANT / 4.0));
    }

    #[test]
    fn harmonic_is_zero_at_equilibrium() {
        assert_eq!(harmonic(1.5, 1.5, 300.0), 0.0);
        assert!(f64_approx_equal(harmonic(1.6, 1.5, 100.0), 1.0));
    }

    #[test]
    fn switching_is_one_inside_and_zero_outside() {
        assert_eq!(switching(5.0, 7.5, 9.0), 1.0);
        assert_eq!(switching(9.5, 7.5, 9.0), 0.0);
        let mid = switching(8.25, 7.5, 9.0);
        assert!(mid > 0.0 && mid < 1.0);
        assert!(switching(8.0, 7.5, 9.0) > switching(8.5, 7.5, 9.0));
    }

    #[test]
    fn cosine_squared_taper_peaks_at_center() {
        assert!(f64_approx_equal(cosine_squared_taper(2.9, 2.9, 0.4), 1.0));
        assert!(f64_approx_equal(cosine_squared_taper(3.1, 2.9, 0.4), 0.5));
        assert_eq!(cosine_squared_taper(3.4, 2.9, 0.4), 0.0);
    }

    #[test]
    fn logistic_switch_is_one_half_at_midpoint() {
        assert!(f64_approx_equal(logistic_switch(10.0, 10.0, 1.0), 0.5));
        assert!(logistic_switch(4.0, 10.0, 1.0) > 0.99);
        assert!(logistic_switch(16.0, 10.0, 1.0) < 0.01);
    }
}
