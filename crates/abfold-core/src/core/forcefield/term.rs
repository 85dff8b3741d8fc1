use std::iter::Sum;
use std::ops::{Add, AddAssign};

/// Weighted energy components of one conformation, in kcal/mol.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EnergyTerm {
    pub bond: f64,
    pub angle: f64,
    pub backbone: f64,
    pub vdw: f64,
    pub electrostatic: f64,
    pub hbond: f64,
    pub solvation: f64,
}

impl EnergyTerm {
    #[inline]
    pub fn total(&self) -> f64 {
        self.bond
            + self.angle
            + self.backbone
            + self.vdw
            + self.electrostatic
            + self.hbond
            + self.solvation
    }

    pub fn components(&self) -> [(&'static str, f64); 7] {
        [
            ("bond", self.bond),
            ("angle", self.angle),
            ("backbone", self.backbone),
            ("vdw", self.vdw),
            ("electrostatic", self.electrostatic),
            ("hbond", self.hbond),
            ("solvation", self.solvation),
        ]
    }

    /// Name of the first non-finite component, if any.
    pub fn first_non_finite(&self) -> Option<&'static str> {
        self.components()
            .into_iter()
            .find(|(_, value)| !value.is_finite())
            .map(|(name, _)| name)
    }
}

impl Add for EnergyTerm {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            bond: self.bond + rhs.bond,
            angle: self.angle + rhs.angle,
            backbone: self.backbone + rhs.backbone,
            vdw: self.vdw + rhs.vdw,
            electrostatic: self.electrostatic + rhs.electrostatic,
            hbond: self.hbond + rhs.hbond,
            solvation: self.solvation + rhs.solvation,
        }
    }
}

impl AddAssign for EnergyTerm {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sum for EnergyTerm {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(base: f64) -> EnergyTerm {
        EnergyTerm {
            bond: base,
            angle: base + 1.0,
            backbone: base + 2.0,
            vdw: base + 3.0,
            electrostatic: base + 4.0,
            hbond: base + 5.0,
            solvation: base + 6.0,
        }
    }

    #[test]
    fn total_returns_sum_of_all_terms() {
        assert_eq!(sample(0.0).total(), 21.0);
    }

    #[test]
    fn add_sums_each_field_correctly() {
        let result = sample(1.0) + sample(2.0);
        assert_eq!(result.bond, 3.0);
        assert_eq!(result.solvation, 15.0);
    }

    #[test]
    fn add_assign_accumulates_each_field_correctly() {
        let mut a = sample(1.0);
        a += sample(1.0);
        assert_eq!(a, sample(1.0) + sample(1.0));
    }

    #[test]
    fn sum_folds_over_iterator() {
        let total: EnergyTerm = vec![sample(0.0), sample(0.0), sample(0.0)].into_iter().sum();
        assert_eq!(total.total(), 63.0);
    }

    #[test]
    fn default_initializes_all_fields_to_zero() {
        assert_eq!(EnergyTerm::default().total(), 0.0);
    }

    #[test]
    fn first_non_finite_names_the_offending_component() {
        let mut term = sample(0.0);
        assert_eq!(term.first_non_finite(), None);
        term.hbond = f64::NAN;
        assert_eq!(term.first_non_finite(), Some("hbond"));
    }
}
