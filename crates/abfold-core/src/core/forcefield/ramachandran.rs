//! Backbone-conformational (Ramachandran) term: a smooth penalty over the (φ, ψ)
//! torus built from class-weighted Gaussian basins, region classification, and
//! projection of outliers back onto an allowed basin.

use super::params::{Basin, BasinKind, ClassParams, Forcefield};
use crate::core::models::residue::BackboneClass;
use crate::core::utils::geometry::{angular_difference, wrap_angle};

/// Floor of the log-penalty; keeps the penalty bounded where no basin contributes.
const SUPPORT_FLOOR: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegionClass {
    Favored,
    Allowed,
    Outlier,
}

/// Basin offsets of one (φ, ψ) pair, scaled by the class width.
struct BasinOffset<'a> {
    basin: &'a Basin,
    d_phi: f64,
    d_psi: f64,
    sigma_phi: f64,
    sigma_psi: f64,
}

impl BasinOffset<'_> {
    fn new<'b>(basin: &'b Basin, class: &ClassParams, phi: f64, psi: f64) -> BasinOffset<'b> {
        BasinOffset {
            basin,
            d_phi: angular_difference(phi, basin.phi.to_radians()),
            d_psi: angular_difference(psi, basin.psi.to_radians()),
            sigma_phi: basin.sigma_phi.to_radians() * class.width_scale,
            sigma_psi: basin.sigma_psi.to_radians() * class.width_scale,
        }
    }

    #[inline]
    fn scaled_distance(&self) -> f64 {
        ((self.d_phi / self.sigma_phi).powi(2) + (self.d_psi / self.sigma_psi).powi(2)).sqrt()
    }

    #[inline]
    fn gaussian(&self) -> f64 {
        (-0.5 * self.scaled_distance().powi(2)).exp()
    }
}

fn offsets<'a>(
    forcefield: &'a Forcefield,
    class: BackboneClass,
    phi: f64,
    psi: f64,
) -> impl Iterator<Item = (f64, BasinOffset<'a>)> + 'a {
    let params = forcefield.classes.get(class);
    forcefield.basins.iter().map(move |basin| {
        (
            params.weights.get(basin.kind),
            BasinOffset::new(basin, params, phi, psi),
        )
    })
}

/// Weighted basin support `S(φ, ψ)`.
pub fn basin_support(phi: f64, psi: f64, class: BackboneClass, forcefield: &Forcefield) -> f64 {
    offsets(forcefield, class, phi, psi)
        .map(|(weight, offset)| weight * offset.gaussian())
        .sum()
}

#[inline]
fn penalty_from_support(support: f64, cap: f64) -> f64 {
    let s = support.min(1.0);
    let norm = ((1.0 + SUPPORT_FLOOR) / SUPPORT_FLOOR).ln();
    cap * ((1.0 + SUPPORT_FLOOR) / (s + SUPPORT_FLOOR)).ln() / norm
}

/// Unweighted penalty in `[0, cap]`; zero where the support saturates.
pub fn backbone_penalty(phi: f64, psi: f64, class: BackboneClass, forcefield: &Forcefield) -> f64 {
    let cap = forcefield.classes.get(class).cap;
    penalty_from_support(basin_support(phi, psi, class, forcefield), cap)
}

/// Penalty together with its analytic partial derivatives `(P, ∂P/∂φ, ∂P/∂ψ)`.
pub fn backbone_penalty_with_gradient(
    phi: f64,
    psi: f64,
    class: BackboneClass,
    forcefield: &Forcefield,
) -> (f64, f64, f64) {
    let cap = forcefield.classes.get(class).cap;
    let mut support = 0.0;
    let mut d_support_phi = 0.0;
    let mut d_support_psi = 0.0;
    for (weight, offset) in offsets(forcefield, class, phi, psi) {
        let g = weight * offset.gaussian();
        support += g;
        d_support_phi -= g * offset.d_phi / offset.sigma_phi.powi(2);
        d_support_psi -= g * offset.d_psi / offset.sigma_psi.powi(2);
    }
    let penalty = penalty_from_support(support, cap);
    if support >= 1.0 {
        return (penalty, 0.0, 0.0);
    }
    let norm = ((1.0 + SUPPORT_FLOOR) / SUPPORT_FLOOR).ln();
    let d_penalty_d_support = -cap / ((support + SUPPORT_FLOOR) * norm);
    (
        penalty,
        d_penalty_d_support * d_support_phi,
        d_penalty_d_support * d_support_psi,
    )
}

/// Nearest basin the class treats as allowed, with its scaled distance.
fn nearest_allowed<'a>(
    phi: f64,
    psi: f64,
    class: BackboneClass,
    forcefield: &'a Forcefield,
) -> Option<BasinOffset<'a>> {
    let min_weight = forcefield.regions.min_basin_weight;
    offsets(forcefield, class, phi, psi)
        .filter(|(weight, _)| *weight >= min_weight)
        .map(|(_, offset)| offset)
        .min_by(|a, b| a.scaled_distance().total_cmp(&b.scaled_distance()))
}

pub fn classify_region(phi: f64, psi: f64, class: BackboneClass, forcefield: &Forcefield) -> RegionClass {
    let Some(nearest) = nearest_allowed(phi, psi, class, forcefield) else {
        return RegionClass::Outlier;
    };
    let distance = nearest.scaled_distance();
    if distance <= forcefield.regions.favored_radius {
        RegionClass::Favored
    } else if distance <= forcefield.regions.allowed_radius {
        RegionClass::Allowed
    } else {
        RegionClass::Outlier
    }
}

/// The basin whose allowed region `(φ, ψ)` is closest to, if the class allows any.
pub fn nearest_basin(phi: f64, psi: f64, class: BackboneClass, forcefield: &Forcefield) -> Option<BasinKind> {
    nearest_allowed(phi, psi, class, forcefield).map(|offset| offset.basin.kind)
}

/// Moves an outlier pair along the ray towards the nearest allowed basin centre
/// until it sits just inside the allowed boundary. Returns `None` when the pair is
/// already allowed or the class allows no basin.
pub fn project_to_allowed(
    phi: f64,
    psi: f64,
    class: BackboneClass,
    forcefield: &Forcefield,
) -> Option<(f64, f64)> {
    let nearest = nearest_allowed(phi, psi, class, forcefield)?;
    let distance = nearest.scaled_distance();
    let radius = forcefield.regions.allowed_radius;
    if distance <= radius {
        return None;
    }
    let shrink = radius * (1.0 - 1e-3) / distance;
    let phi = wrap_angle(nearest.basin.phi.to_radians() + nearest.d_phi * shrink);
    let psi = wrap_angle(nearest.basin.psi.to_radians() + nearest.d_psi * shrink);
    Some((phi, psi))
}
