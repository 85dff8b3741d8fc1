use super::params::{AtomParams, HBondParams, NonBondedParams};
use super::potentials;
use nalgebra::Point3;

pub struct EnergyCalculator;

impl EnergyCalculator {
    pub fn calculate_vdw(dist: f64, a: &AtomParams, b: &AtomParams, params: &NonBondedParams) -> f64 {
        let r_min_combined = (a.radius + b.radius) / 2.0;
        let well_depth_combined = (a.well_depth * b.well_depth).sqrt();
        let soft = potentials::soft_core_distance(dist, params.softening);
        potentials::lennard_jones_12_6(soft, r_min_combined, well_depth_combined)
            * potentials::switching(dist, params.switch_on, params.cutoff)
    }

    pub fn calculate_coulomb(dist: f64, a: &AtomParams, b: &AtomParams, params: &NonBondedParams) -> f64 {
        let soft = potentials::soft_core_distance(dist, params.softening);
        potentials::coulomb_distance_dependent(soft, a.charge, b.charge, params.dielectric_slope)
            * potentials::switching(dist, params.switch_on, params.cutoff)
    }

    /// Bonus (negative) for an N-H···O contact inside both the distance and the
    /// angle window; zero otherwise.
    pub fn calculate_hbond(
        donor: &Point3<f64>,
        hydrogen: &Point3<f64>,
        acceptor: &Point3<f64>,
        params: &HBondParams,
    ) -> f64 {
        let dist_da = (acceptor - donor).norm();
        let half_width = if dist_da < params.optimal_distance {
            params.optimal_distance - params.min_distance
        } else {
            params.max_distance - params.optimal_distance
        };
        let distance_factor =
            potentials::cosine_squared_taper(dist_da, params.optimal_distance, half_width);
        if distance_factor == 0.0 {
            return 0.0;
        }

        let v_ha = acceptor - hydrogen;
        let v_hd = donor - hydrogen;
        let angle_dha_deg = v_ha.angle(&v_hd).to_degrees();
        if angle_dha_deg < params.min_angle {
            return 0.0;
        }
        let angular_factor =
            potentials::cosine_squared_taper(angle_dha_deg, 180.0, 180.0 - params.min_angle);

        -params.well_depth * distance_factor * angular_factor
    }
}
