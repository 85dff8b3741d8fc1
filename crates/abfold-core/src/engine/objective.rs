use super::error::EngineError;
use crate::core::builder::ConformationBuilder;
use crate::core::forcefield::gradient::{backbone_gradient, finite_difference};
use crate::core::forcefield::params::Forcefield;
use crate::core::forcefield::scoring::{Scorer, ScoringError, TermMask};
use crate::core::forcefield::term::EnergyTerm;
use crate::core::models::conformation::Conformation;
use crate::core::models::sequence::Sequence;
use crate::core::models::torsion::{AngleLayout, DihedralSet};
use crate::core::utils::geometry::wrap_angle;
use nalgebra::DVector;

/// A built conformation together with its weighted energy.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub conformation: Conformation,
    pub energy: EnergyTerm,
}

impl Evaluation {
    #[inline]
    pub fn total(&self) -> f64 {
        self.energy.total()
    }

    pub fn angles(&self) -> &DihedralSet {
        self.conformation.angles()
    }
}

fn scoring_failure(error: ScoringError) -> EngineError {
    match error {
        ScoringError::NonFinite { term } => EngineError::NumericalInstability {
            stage: "scoring",
            detail: format!("energy term '{term}' is not finite"),
        },
        other => other.into(),
    }
}

fn ensure_finite_gradient(stage: &'static str, gradient: &DVector<f64>) -> Result<(), EngineError> {
    match gradient.iter().position(|g| !g.is_finite()) {
        Some(index) => Err(EngineError::NumericalInstability {
            stage,
            detail: format!("gradient component {index} is not finite"),
        }),
        None => Ok(()),
    }
}

/// Energy as a function of the free dihedral angles of one chain. Every evaluation
/// rebuilds the backbone from angles; coordinates are never edited in place.
pub struct Objective<'a> {
    sequence: &'a Sequence,
    forcefield: &'a Forcefield,
    template: DihedralSet,
    layout: AngleLayout,
    epsilon: f64,
    builder: ConformationBuilder,
    scorer: Scorer<'a>,
}

impl<'a> Objective<'a> {
    /// `template` supplies the fixed (non-variable) angles and the variable layout.
    pub fn new(
        sequence: &'a Sequence,
        forcefield: &'a Forcefield,
        template: &DihedralSet,
        include_omega: bool,
        epsilon: f64,
    ) -> Result<Self, EngineError> {
        sequence.ensure_non_empty()?;
        template.validate(sequence.len())?;
        Ok(Self {
            sequence,
            forcefield,
            template: template.clone(),
            layout: AngleLayout::new(template, include_omega),
            epsilon,
            builder: ConformationBuilder::new(&forcefield.geometry),
            scorer: Scorer::new(forcefield),
        })
    }

    #[inline]
    pub fn layout(&self) -> &AngleLayout {
        &self.layout
    }

    #[inline]
    pub fn sequence(&self) -> &Sequence {
        self.sequence
    }

    #[inline]
    pub fn forcefield(&self) -> &Forcefield {
        self.forcefield
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.layout.len()
    }

    pub fn initial_point(&self) -> Result<DVector<f64>, EngineError> {
        Ok(self.layout.extract(&self.template)?)
    }

    /// Dihedral set for the variable vector `x`, every angle wrapped into (-π, π].
    pub fn angles(&self, x: &DVector<f64>) -> DihedralSet {
        self.layout.apply(&self.template, x)
    }

    pub fn wrap(x: &DVector<f64>) -> DVector<f64> {
        x.map(wrap_angle)
    }

    fn build(&self, x: &DVector<f64>) -> Result<Conformation, EngineError> {
        let conformation = self.builder.build(self.sequence, &self.angles(x))?;
        if !conformation.is_finite() {
            return Err(EngineError::NumericalInstability {
                stage: "coordinate builder",
                detail: "built coordinates are not finite".to_string(),
            });
        }
        Ok(conformation)
    }

    pub fn evaluate(&self, x: &DVector<f64>) -> Result<Evaluation, EngineError> {
        let conformation = self.build(x)?;
        let energy = self.scorer.score(&conformation).map_err(scoring_failure)?;
        Ok(Evaluation {
            conformation,
            energy,
        })
    }

    pub fn evaluate_masked(&self, x: &DVector<f64>, mask: TermMask) -> Result<EnergyTerm, EngineError> {
        let conformation = self.build(x)?;
        self.scorer
            .score_masked(&conformation, mask)
            .map_err(scoring_failure)
    }

    #[inline]
    pub fn energy(&self, x: &DVector<f64>) -> Result<f64, EngineError> {
        self.evaluate_masked(x, TermMask::ALL).map(|e| e.total())
    }

    /// Symmetric finite-difference gradient of the total energy.
    pub fn gradient(&self, x: &DVector<f64>) -> Result<DVector<f64>, EngineError> {
        self.masked_gradient(x, TermMask::ALL)
    }

    pub fn masked_gradient(&self, x: &DVector<f64>, mask: TermMask) -> Result<DVector<f64>, EngineError> {
        let gradient = finite_difference(x, self.epsilon, |v| {
            self.evaluate_masked(v, mask).map(|e| e.total())
        })?;
        ensure_finite_gradient("gradient", &gradient)?;
        Ok(gradient)
    }

    /// Analytic gradient of the weighted backbone-conformational term.
    pub fn backbone_gradient(&self, x: &DVector<f64>) -> DVector<f64> {
        backbone_gradient(self.sequence, &self.angles(x), &self.layout, self.forcefield)
    }
}
