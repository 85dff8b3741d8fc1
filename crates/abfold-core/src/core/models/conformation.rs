use super::sequence::Sequence;
use super::torsion::DihedralSet;
use crate::core::utils::geometry::centroid;
use nalgebra::Point3;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackboneAtomKind {
    N,
    CA,
    C,
    O,
}

impl BackboneAtomKind {
    pub const ALL: [BackboneAtomKind; 4] = [
        BackboneAtomKind::N,
        BackboneAtomKind::CA,
        BackboneAtomKind::C,
        BackboneAtomKind::O,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BackboneAtomKind::N => "N",
            BackboneAtomKind::CA => "CA",
            BackboneAtomKind::C => "C",
            BackboneAtomKind::O => "O",
        }
    }
}

impl fmt::Display for BackboneAtomKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackboneResidue {
    pub n: Point3<f64>,
    pub ca: Point3<f64>,
    pub c: Point3<f64>,
    pub o: Point3<f64>,
}

impl BackboneResidue {
    #[inline]
    pub fn atom(&self, kind: BackboneAtomKind) -> &Point3<f64> {
        match kind {
            BackboneAtomKind::N => &self.n,
            BackboneAtomKind::CA => &self.ca,
            BackboneAtomKind::C => &self.c,
            BackboneAtomKind::O => &self.o,
        }
    }

    pub fn atoms(&self) -> [(BackboneAtomKind, Point3<f64>); 4] {
        [
            (BackboneAtomKind::N, self.n),
            (BackboneAtomKind::CA, self.ca),
            (BackboneAtomKind::C, self.c),
            (BackboneAtomKind::O, self.o),
        ]
    }

    pub fn is_finite(&self) -> bool {
        [self.n, self.ca, self.c, self.o]
            .iter()
            .all(|p| p.coords.iter().all(|v| v.is_finite()))
    }
}

/// Backbone coordinates derived from a sequence and its dihedrals. Never edited in
/// place; a new conformation is built whenever the angles change.
#[derive(Debug, Clone, PartialEq)]
pub struct Conformation {
    sequence: Sequence,
    angles: DihedralSet,
    backbone: Vec<BackboneResidue>,
}

impl Conformation {
    pub(crate) fn new(sequence: Sequence, angles: DihedralSet, backbone: Vec<BackboneResidue>) -> Self {
        debug_assert_eq!(sequence.len(), backbone.len());
        Self {
            sequence,
            angles,
            backbone,
        }
    }

    pub fn sequence(&self) -> &Sequence {
        &self.sequence
    }

    pub fn angles(&self) -> &DihedralSet {
        &self.angles
    }

    pub fn backbone(&self) -> &[BackboneResidue] {
        &self.backbone
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.backbone.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.backbone.is_empty()
    }

    /// Every backbone atom in chain order as (residue index, atom kind, position).
    pub fn atoms(&self) -> impl Iterator<Item = (usize, BackboneAtomKind, Point3<f64>)> + '_ {
        self.backbone.iter().enumerate().flat_map(|(i, residue)| {
            residue
                .atoms()
                .into_iter()
                .map(move |(kind, position)| (i, kind, position))
        })
    }

    pub fn ca_positions(&self) -> Vec<Point3<f64>> {
        self.backbone.iter().map(|r| r.ca).collect()
    }

    pub fn is_finite(&self) -> bool {
        self.backbone.iter().all(BackboneResidue::is_finite)
    }

    pub fn radius_of_gyration(&self) -> f64 {
        let cas = self.ca_positions();
        let Some(center) = centroid(&cas) else {
            return 0.0;
        };
        let sum: f64 = cas.iter().map(|p| (p - center).norm_squared()).sum();
        (sum / cas.len() as f64).sqrt()
    }
}
