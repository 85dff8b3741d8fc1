use super::energy::EnergyCalculator;
use super::params::{AtomParams, Forcefield};
use super::potentials;
use super::ramachandran;
use super::term::EnergyTerm;
use crate::core::models::conformation::{BackboneAtomKind, Conformation};
use crate::core::models::residue::ResidueType;
use crate::core::utils::geometry::{bond_angle, calculate_hn_position};
use kiddo::{KdTree, SquaredEuclidean};
use thiserror::Error;

/// Neighbours farther than this many switch widths past the solvation radius are ignored.
const SOLVATION_REACH_WIDTHS: f64 = 8.0;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScoringError {
    #[error("Cannot score an empty conformation")]
    EmptyConformation,
    #[error("Energy term '{term}' evaluated to a non-finite value")]
    NonFinite { term: &'static str },
}

/// Selects which energy terms a scoring pass evaluates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TermMask {
    pub bonded: bool,
    pub backbone: bool,
    pub non_bonded: bool,
    pub hbond: bool,
    pub solvation: bool,
}

impl TermMask {
    pub const ALL: TermMask = TermMask {
        bonded: true,
        backbone: true,
        non_bonded: true,
        hbond: true,
        solvation: true,
    };
    pub const NONE: TermMask = TermMask {
        bonded: false,
        backbone: false,
        non_bonded: false,
        hbond: false,
        solvation: false,
    };
    pub const BACKBONE_ONLY: TermMask = TermMask {
        backbone: true,
        ..TermMask::NONE
    };
    pub const SOLVATION_ONLY: TermMask = TermMask {
        solvation: true,
        ..TermMask::NONE
    };
}

impl Default for TermMask {
    fn default() -> Self {
        Self::ALL
    }
}

pub struct Scorer<'a> {
    forcefield: &'a Forcefield,
}

impl<'a> Scorer<'a> {
    pub fn new(forcefield: &'a Forcefield) -> Self {
        Self { forcefield }
    }

    pub fn score(&self, conformation: &Conformation) -> Result<EnergyTerm, ScoringError> {
        self.score_masked(conformation, TermMask::ALL)
    }

    pub fn score_masked(
        &self,
        conformation: &Conformation,
        mask: TermMask,
    ) -> Result<EnergyTerm, ScoringError> {
        if conformation.is_empty() {
            return Err(ScoringError::EmptyConformation);
        }
        let weights = &self.forcefield.weights;
        let mut energy = EnergyTerm::default();

        if mask.bonded {
            let (bond, angle) = self.bonded_terms(conformation);
            energy.bond = weights.bond * bond;
            energy.angle = weights.angle * angle;
        }
        if mask.backbone {
            energy.backbone = weights.backbone * self.backbone_term(conformation);
        }
        if mask.non_bonded {
            let (vdw, electrostatic) = self.non_bonded_terms(conformation);
            energy.vdw = weights.vdw * vdw;
            energy.electrostatic = weights.electrostatic * electrostatic;
        }
        if mask.hbond {
            energy.hbond = weights.hbond * self.hbond_term(conformation);
        }
        if mask.solvation {
            energy.solvation = weights.solvation * self.solvation_term(conformation);
        }

        match energy.first_non_finite() {
            Some(term) => Err(ScoringError::NonFinite { term }),
            None => Ok(energy),
        }
    }

    fn bonded_terms(&self, conformation: &Conformation) -> (f64, f64) {
        let g = &self.forcefield.geometry;
        let k_bond = self.forcefield.bonded.bond_force_constant;
        let k_angle = self.forcefield.bonded.angle_force_constant;
        let bb = conformation.backbone();

        let mut bond = 0.0;
        let mut angle = 0.0;
        for (i, r) in bb.iter().enumerate() {
            bond += potentials::harmonic((r.ca - r.n).norm(), g.n_ca_length, k_bond);
            bond += potentials::harmonic((r.c - r.ca).norm(), g.ca_c_length, k_bond);
            bond += potentials::harmonic((r.o - r.c).norm(), g.c_o_length, k_bond);
            angle += potentials::harmonic(
                bond_angle(&r.n, &r.ca, &r.c),
                g.n_ca_c_angle.to_radians(),
                k_angle,
            );
            angle += potentials::harmonic(
                bond_angle(&r.ca, &r.c, &r.o),
                g.ca_c_o_angle.to_radians(),
                k_angle,
            );
            if let Some(next) = bb.get(i + 1) {
                bond += potentials::harmonic((next.n - r.c).norm(), g.c_n_length, k_bond);
                angle += potentials::harmonic(
                    bond_angle(&r.ca, &r.c, &next.n),
                    g.ca_c_n_angle.to_radians(),
                    k_angle,
                );
                angle += potentials::harmonic(
                    bond_angle(&r.c, &next.n, &next.ca),
                    g.c_n_ca_angle.to_radians(),
                    k_angle,
                );
            }
        }
        (bond, angle)
    }

    fn backbone_term(&self, conformation: &Conformation) -> f64 {
        conformation
            .angles()
            .phi_psi_pairs()
            .filter_map(|(i, (phi, psi))| {
                conformation.sequence().get(i).map(|residue| {
                    ramachandran::backbone_penalty(
                        phi,
                        psi,
                        residue.backbone_class(),
                        self.forcefield,
                    )
                })
            })
            .sum()
    }

    fn atom_params(&self, kind: BackboneAtomKind) -> &AtomParams {
        let nb = &self.forcefield.non_bonded;
        match kind {
            BackboneAtomKind::N => &nb.n,
            BackboneAtomKind::CA => &nb.ca,
            BackboneAtomKind::C => &nb.c,
            BackboneAtomKind::O => &nb.o,
        }
    }

    fn non_bonded_terms(&self, conformation: &Conformation) -> (f64, f64) {
        let nb = &self.forcefield.non_bonded;
        let sites: Vec<(usize, BackboneAtomKind)> =
            conformation.atoms().map(|(i, kind, _)| (i, kind)).collect();
        let positions: Vec<[f64; 3]> = conformation
            .atoms()
            .map(|(_, _, p)| [p.x, p.y, p.z])
            .collect();
        let kdtree: KdTree<f64, 3> = (&positions).into();
        let cutoff_sq = nb.cutoff * nb.cutoff;

        let mut vdw = 0.0;
        let mut electrostatic = 0.0;
        for (i, &(residue_i, kind_i)) in sites.iter().enumerate() {
            let params_i = self.atom_params(kind_i);
            for neighbour in kdtree.within_unsorted::<SquaredEuclidean>(&positions[i], cutoff_sq) {
                let j = neighbour.item as usize;
                if j <= i {
                    continue;
                }
                let (residue_j, kind_j) = sites[j];
                if residue_i.abs_diff(residue_j) <= nb.exclusion_window {
                    continue;
                }
                let params_j = self.atom_params(kind_j);
                let dist = neighbour.distance.sqrt();
                vdw += EnergyCalculator::calculate_vdw(dist, params_i, params_j, nb);
                electrostatic += EnergyCalculator::calculate_coulomb(dist, params_i, params_j, nb);
            }
        }
        (vdw, electrostatic)
    }

    fn hbond_term(&self, conformation: &Conformation) -> f64 {
        let hb = &self.forcefield.hbond;
        let bb = conformation.backbone();
        let acceptors: Vec<[f64; 3]> = bb.iter().map(|r| [r.o.x, r.o.y, r.o.z]).collect();
        let kdtree: KdTree<f64, 3> = (&acceptors).into();
        let reach_sq = hb.max_distance * hb.max_distance;

        let mut energy = 0.0;
        for (i, residue) in conformation.sequence().iter().enumerate().skip(1) {
            if residue == ResidueType::Proline {
                continue;
            }
            let donor = &bb[i];
            let hydrogen = calculate_hn_position(
                &donor.n,
                &donor.ca,
                &bb[i - 1].c,
                self.forcefield.geometry.n_h_length,
            );
            let query = [donor.n.x, donor.n.y, donor.n.z];
            for neighbour in kdtree.within_unsorted::<SquaredEuclidean>(&query, reach_sq) {
                let j = neighbour.item as usize;
                if i.abs_diff(j) < hb.min_separation {
                    continue;
                }
                energy += EnergyCalculator::calculate_hbond(&donor.n, &hydrogen, &bb[j].o, hb);
            }
        }
        energy
    }

    fn solvation_term(&self, conformation: &Conformation) -> f64 {
        let sol = &self.forcefield.solvation;
        let cas = conformation.ca_positions();
        let points: Vec<[f64; 3]> = cas.iter().map(|p| [p.x, p.y, p.z]).collect();
        let kdtree: KdTree<f64, 3> = (&points).into();
        let reach = sol.neighbor_radius + SOLVATION_REACH_WIDTHS * sol.switch_width;

        let energy: f64 = conformation
            .sequence()
            .iter()
            .enumerate()
            .map(|(i, residue)| {
                let count: f64 = kdtree
                    .within_unsorted::<SquaredEuclidean>(&points[i], reach * reach)
                    .into_iter()
                    .filter(|neighbour| neighbour.item as usize != i)
                    .map(|neighbour| {
                        potentials::logistic_switch(
                            neighbour.distance.sqrt(),
                            sol.neighbor_radius,
                            sol.switch_width,
                        )
                    })
                    .sum();
                let exposure = 1.0 - (count / sol.max_neighbors).min(1.0);
                residue.hydrophobicity() * (exposure - sol.reference_exposure)
            })
            .sum();
        sol.coefficient * energy
    }
}
