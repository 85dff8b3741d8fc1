use crate::core::forcefield::params::BackboneGeometry;
use crate::core::models::conformation::{BackboneResidue, Conformation};
use crate::core::models::error::InputError;
use crate::core::models::sequence::Sequence;
use crate::core::models::torsion::DihedralSet;
use nalgebra::{Point3, UnitQuaternion, Vector3};
use std::f64::consts::PI;

/// Bond lengths in Å and supplementary bend angles in radians, precomputed once.
#[derive(Debug, Clone, Copy)]
struct BuildConstants {
    n_ca: f64,
    ca_c: f64,
    c_n: f64,
    c_o: f64,
    bend_c_n_ca: f64,
    bend_n_ca_c: f64,
    bend_ca_c_n: f64,
    bend_ca_c_o: f64,
}

impl From<&BackboneGeometry> for BuildConstants {
    fn from(g: &BackboneGeometry) -> Self {
        Self {
            n_ca: g.n_ca_length,
            ca_c: g.ca_c_length,
            c_n: g.c_n_length,
            c_o: g.c_o_length,
            bend_c_n_ca: PI - g.c_n_ca_angle.to_radians(),
            bend_n_ca_c: PI - g.n_ca_c_angle.to_radians(),
            bend_ca_c_n: PI - g.ca_c_n_angle.to_radians(),
            bend_ca_c_o: PI - g.ca_c_o_angle.to_radians(),
        }
    }
}

/// Local frame walking along the chain: +x is the current bond direction and the
/// previous bond lies in the local xy plane.
struct Turtle {
    orientation: UnitQuaternion<f64>,
    position: Point3<f64>,
}

impl Turtle {
    fn new() -> Self {
        Self {
            orientation: UnitQuaternion::identity(),
            position: Point3::origin(),
        }
    }

    #[inline]
    fn twist(&mut self, torsion: Option<f64>) {
        if let Some(angle) = torsion {
            self.orientation =
                self.orientation * UnitQuaternion::from_axis_angle(&Vector3::x_axis(), angle);
        }
    }

    #[inline]
    fn bend(&mut self, supplement: f64) {
        self.orientation =
            self.orientation * UnitQuaternion::from_axis_angle(&Vector3::z_axis(), supplement);
    }

    #[inline]
    fn advance(&mut self, length: f64) -> Point3<f64> {
        self.position += self.orientation * Vector3::new(length, 0.0, 0.0);
        self.position
    }

    /// Places an atom off the current frame without moving the walker.
    fn branch(&self, torsion: f64, supplement: f64, length: f64) -> Point3<f64> {
        let orientation = self.orientation
            * UnitQuaternion::from_axis_angle(&Vector3::x_axis(), torsion)
            * UnitQuaternion::from_axis_angle(&Vector3::z_axis(), supplement);
        self.position + orientation * Vector3::new(length, 0.0, 0.0)
    }
}

/// Turns a sequence and its dihedrals into backbone coordinates over fixed bond
/// geometry. Residue 0's N sits at the origin with the first bond along +x.
#[derive(Debug, Clone)]
pub struct ConformationBuilder {
    constants: BuildConstants,
}

impl ConformationBuilder {
    pub fn new(geometry: &BackboneGeometry) -> Self {
        Self {
            constants: BuildConstants::from(geometry),
        }
    }

    pub fn build(&self, sequence: &Sequence, angles: &DihedralSet) -> Result<Conformation, InputError> {
        sequence.ensure_non_empty()?;
        angles.validate(sequence.len())?;

        let k = &self.constants;
        let last = sequence.len() - 1;
        let mut turtle = Turtle::new();
        let mut backbone = Vec::with_capacity(sequence.len());

        for (i, torsions) in angles.iter().enumerate() {
            let n = turtle.position;

            turtle.twist(torsions.omega);
            turtle.bend(k.bend_c_n_ca);
            let ca = turtle.advance(k.n_ca);

            turtle.twist(torsions.phi);
            turtle.bend(k.bend_n_ca_c);
            let c = turtle.advance(k.ca_c);

            let o_torsion = torsions.psi.map_or(PI, |psi| psi + PI);
            let o = turtle.branch(o_torsion, k.bend_ca_c_o, k.c_o);

            backbone.push(BackboneResidue { n, ca, c, o });

            if i < last {
                turtle.twist(torsions.psi);
                turtle.bend(k.bend_ca_c_n);
                turtle.advance(k.c_n);
            }
            turtle.orientation.renormalize();
        }

        Ok(Conformation::new(sequence.clone(), angles.clone(), backbone))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::residue::ResidueType;
    use crate::core::models::torsion::{ResidueTorsions, TorsionKind};
    use crate::core::utils::geometry::{bond_angle, dihedral_angle, wrap_angle};

    const TOLERANCE: f64 = 1e-6;

    fn f64_approx_equal(a: f64, b: f64) -> bool {
        (a - b).abs() < TOLERANCE
    }

    fn builder() -> ConformationBuilder {
        ConformationBuilder::new(&BackboneGeometry::default())
    }

    fn poly_ala(len: usize) -> Sequence {
        Sequence::new(vec![ResidueType::Alanine; len])
    }

    fn varied_angles() -> DihedralSet {
        let pairs: Vec<(f64, f64)> = [
            (-57.0, -47.0),
            (-57.0, -47.0),
            (60.0, 130.0),
            (-120.0, 179.9),
            (-179.9, -179.9),
            (75.0, -60.0),
        ]
        .iter()
        .map(|&(phi, psi): &(f64, f64)| (phi.to_radians(), psi.to_radians()))
        .collect();
        let mut torsions = DihedralSet::from_phi_psi(&pairs).torsions().to_vec();
        torsions[2].omega = Some(175f64.to_radians());
        torsions[3].omega = Some((-170f64).to_radians());
        DihedralSet::new(torsions)
    }

    #[test]
    fn build_rejects_empty_sequence() {
        let result = builder().build(&Sequence::new(vec![]), &DihedralSet::default());
        assert_eq!(result.unwrap_err(), InputError::EmptySequence);
    }

    #[test]
    fn build_rejects_mismatched_lengths() {
        let result = builder().build(&poly_ala(3), &DihedralSet::extended(4));
        assert!(matches!(result, Err(InputError::LengthMismatch { .. })));
    }

    #[test]
    fn build_is_pure() {
        let seq = poly_ala(6);
        let angles = varied_angles();
        let a = builder().build(&seq, &angles).unwrap();
        let b = builder().build(&seq, &angles).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn single_residue_builds_without_any_torsion() {
        let seq = Sequence::new(vec![ResidueType::Glycine]);
        let angles = DihedralSet::new(vec![ResidueTorsions::default()]);
        let conf = builder().build(&seq, &angles).unwrap();
        assert_eq!(conf.len(), 1);
        assert!(conf.is_finite());
        assert_eq!(conf.backbone()[0].n, Point3::origin());
        assert!(f64_approx_equal(conf.backbone()[0].ca.x, 1.458));
    }

    #[test]
    fn terminal_undefined_angles_give_finite_coordinates() {
        let seq = poly_ala(2);
        let conf = builder().build(&seq, &DihedralSet::extended(2)).unwrap();
        assert!(conf.is_finite());
    }

    #[test]
    fn any_interior_angles_give_finite_coordinates() {
        let grid = [PI, wrap_angle(-PI), -PI + 1e-9, PI - 1e-9, -PI / 2.0, 0.0, 1.0];
        for len in [1, 2, 3, 7] {
            let seq = poly_ala(len);
            let last = len - 1;
            for &phi in &grid {
                for &psi in &grid {
                    for &omega in &grid {
                        let torsions = (0..len)
                            .map(|i| ResidueTorsions {
                                phi: (i > 0).then_some(phi),
                                psi: (i < last).then_some(psi),
                                omega: (i > 0).then_some(omega),
                            })
                            .collect();
                        let conf = builder().build(&seq, &DihedralSet::new(torsions)).unwrap();
                        assert_eq!(conf.len(), len);
                        assert!(conf.is_finite(), "len {len} phi {phi} psi {psi} omega {omega}");
                    }
                }
            }
        }
    }

    #[test]
    fn terminal_angles_are_rejected_rather_than_used() {
        let seq = poly_ala(3);
        let base = DihedralSet::extended(3).torsions().to_vec();
        for (residue, kind) in [(0, TorsionKind::Phi), (0, TorsionKind::Omega), (2, TorsionKind::Psi)] {
            let mut torsions = base.clone();
            torsions[residue].set(kind, Some(0.0));
            let result = builder().build(&seq, &DihedralSet::new(torsions));
            assert_eq!(
                result.unwrap_err(),
                InputError::UnexpectedTerminalAngle { residue, field: kind }
            );
        }
    }

    #[test]
    fn last_carbonyl_oxygen_is_placed_without_a_psi() {
        for len in [1, 4] {
            let conf = builder().build(&poly_ala(len), &DihedralSet::extended(len)).unwrap();
            let r = &conf.backbone()[len - 1];
            let n_ca_c_o = dihedral_angle(&r.n, &r.ca, &r.c, &r.o);
            assert!(f64_approx_equal(n_ca_c_o.abs(), PI), "len {len}");
        }
    }

    #[test]
    fn measured_dihedrals_equal_input() {
        let seq = poly_ala(6);
        let angles = varied_angles();
        let conf = builder().build(&seq, &angles).unwrap();
        let bb = conf.backbone();
        for i in 0..bb.len() {
            let t = angles.torsions()[i];
            if let Some(phi) = t.phi {
                let measured = dihedral_angle(&bb[i - 1].c, &bb[i].n, &bb[i].ca, &bb[i].c);
                assert!(f64_approx_equal(wrap_angle(measured - phi), 0.0), "phi {i}");
            }
            if let Some(psi) = t.psi {
                let measured = dihedral_angle(&bb[i].n, &bb[i].ca, &bb[i].c, &bb[i + 1].n);
                assert!(f64_approx_equal(wrap_angle(measured - psi), 0.0), "psi {i}");
            }
            if let Some(omega) = t.omega {
                let measured = dihedral_angle(&bb[i - 1].ca, &bb[i - 1].c, &bb[i].n, &bb[i].ca);
                assert!(f64_approx_equal(wrap_angle(measured - omega), 0.0), "omega {i}");
            }
        }
    }

    #[test]
    fn carbonyl_oxygen_is_trans_to_next_nitrogen() {
        let seq = poly_ala(6);
        let conf = builder().build(&seq, &varied_angles()).unwrap();
        let bb = conf.backbone();
        for i in 0..bb.len() - 1 {
            let n_ca_c_o = dihedral_angle(&bb[i].n, &bb[i].ca, &bb[i].c, &bb[i].o);
            let n_ca_c_n = dihedral_angle(&bb[i].n, &bb[i].ca, &bb[i].c, &bb[i + 1].n);
            assert!(f64_approx_equal(wrap_angle(n_ca_c_o - n_ca_c_n).abs(), PI));
        }
    }

    #[test]
    fn bond_lengths_and_angles_are_invariant_even_near_pi() {
        let geometry = BackboneGeometry::default();
        let seq = poly_ala(6);
        for angles in [varied_angles(), DihedralSet::uniform(6, PI, PI), DihedralSet::uniform(6, -PI + 1e-9, PI - 1e-9)] {
            let conf = builder().build(&seq, &angles).unwrap();
            let bb = conf.backbone();
            for (i, r) in bb.iter().enumerate() {
                assert!(f64_approx_equal((r.ca - r.n).norm(), geometry.n_ca_length));
                assert!(f64_approx_equal((r.c - r.ca).norm(), geometry.ca_c_length));
                assert!(f64_approx_equal((r.o - r.c).norm(), geometry.c_o_length));
                assert!(f64_approx_equal(bond_angle(&r.n, &r.ca, &r.c).to_degrees(), geometry.n_ca_c_angle));
                assert!(f64_approx_equal(bond_angle(&r.ca, &r.c, &r.o).to_degrees(), geometry.ca_c_o_angle));
                if i + 1 < bb.len() {
                    let next = &bb[i + 1];
                    assert!(f64_approx_equal((next.n - r.c).norm(), geometry.c_n_length));
                    assert!(f64_approx_equal(bond_angle(&r.ca, &r.c, &next.n).to_degrees(), geometry.ca_c_n_angle));
                    assert!(f64_approx_equal(bond_angle(&r.c, &next.n, &next.ca).to_degrees(), geometry.c_n_ca_angle));
                }
            }
        }
    }

    #[test]
    fn helix_rises_about_one_and_a_half_angstrom_per_residue() {
        let len = 12;
        let seq = poly_ala(len);
        let angles = DihedralSet::uniform(len, (-57f64).to_radians(), (-47f64).to_radians());
        let conf = builder().build(&seq, &angles).unwrap();
        let cas = conf.ca_positions();
        let span = (cas[len - 1] - cas[0]).norm();
        let per_residue = span / (len - 1) as f64;
        assert!(per_residue > 1.3 && per_residue < 1.7, "rise {per_residue}");
    }
}
