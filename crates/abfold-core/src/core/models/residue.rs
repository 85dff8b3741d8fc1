use phf::{Map, phf_map};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResidueType {
    // --- Aliphatic, Nonpolar ---
    Alanine,
    Glycine,
    Isoleucine,
    Leucine,
    Proline,
    Valine,

    // --- Aromatic ---
    Phenylalanine,
    Tryptophan,
    Tyrosine,

    // --- Polar, Uncharged ---
    Asparagine,
    Cysteine,
    Glutamine,
    Serine,
    Threonine,
    Methionine,

    // --- Positively Charged (Basic) ---
    Arginine,
    Histidine,
    Lysine,

    // --- Negatively Charged (Acidic) ---
    AsparticAcid,
    GlutamicAcid,
}

/// Backbone behaviour class. Glycine and proline sample the Ramachandran plane
/// very differently from every other residue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackboneClass {
    General,
    Glycine,
    Proline,
}

/// Coarse physico-chemical grouping used for local sequence similarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChemicalClass {
    Aliphatic,
    Aromatic,
    Polar,
    Positive,
    Negative,
    Special,
}

static THREE_LETTER_CODES: Map<&'static str, ResidueType> = phf_map! {
    "ALA" => ResidueType::Alanine,
    "ARG" => ResidueType::Arginine,
    "ASN" => ResidueType::Asparagine,
    "ASP" => ResidueType::AsparticAcid,
    "CYS" => ResidueType::Cysteine, "CYX" => ResidueType::Cysteine,
    "GLN" => ResidueType::Glutamine,
    "GLU" => ResidueType::GlutamicAcid,
    "GLY" => ResidueType::Glycine,
    "HIS" => ResidueType::Histidine, "HSE" => ResidueType::Histidine,
    "HSD" => ResidueType::Histidine, "HSP" => ResidueType::Histidine,
    "HIE" => ResidueType::Histidine, "HID" => ResidueType::Histidine,
    "ILE" => ResidueType::Isoleucine,
    "LEU" => ResidueType::Leucine,
    "LYS" => ResidueType::Lysine,
    "MET" => ResidueType::Methionine, "MSE" => ResidueType::Methionine,
    "PHE" => ResidueType::Phenylalanine,
    "PRO" => ResidueType::Proline,
    "SER" => ResidueType::Serine,
    "THR" => ResidueType::Threonine,
    "TRP" => ResidueType::Tryptophan,
    "TYR" => ResidueType::Tyrosine,
    "VAL" => ResidueType::Valine,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Invalid residue code '{0}'")]
pub struct ParseResidueTypeError(pub String);

impl ResidueType {
    pub const ALL: [ResidueType; 20] = [
        ResidueType::Alanine,
        ResidueType::Arginine,
        ResidueType::Asparagine,
        ResidueType::AsparticAcid,
        ResidueType::Cysteine,
        ResidueType::Glutamine,
        ResidueType::GlutamicAcid,
        ResidueType::Glycine,
        ResidueType::Histidine,
        ResidueType::Isoleucine,
        ResidueType::Leucine,
        ResidueType::Lysine,
        ResidueType::Methionine,
        ResidueType::Phenylalanine,
        ResidueType::Proline,
        ResidueType::Serine,
        ResidueType::Threonine,
        ResidueType::Tryptophan,
        ResidueType::Tyrosine,
        ResidueType::Valine,
    ];

    pub fn from_one_letter(code: char) -> Option<Self> {
        let residue = match code.to_ascii_uppercase() {
            'A' => ResidueType::Alanine,
            'R' => ResidueType::Arginine,
            'N' => ResidueType::Asparagine,
            'D' => ResidueType::AsparticAcid,
            'C' => ResidueType::Cysteine,
            'Q' => ResidueType::Glutamine,
            'E' => ResidueType::GlutamicAcid,
            'G' => ResidueType::Glycine,
            'H' => ResidueType::Histidine,
            'I' => ResidueType::Isoleucine,
            'L' => ResidueType::Leucine,
            'K' => ResidueType::Lysine,
            'M' => ResidueType::Methionine,
            'F' => ResidueType::Phenylalanine,
            'P' => ResidueType::Proline,
            'S' => ResidueType::Serine,
            'T' => ResidueType::Threonine,
            'W' => ResidueType::Tryptophan,
            'Y' => ResidueType::Tyrosine,
            'V' => ResidueType::Valine,
            _ => return None,
        };
        Some(residue)
    }

    pub fn from_three_letter(code: &str) -> Option<Self> {
        THREE_LETTER_CODES
            .get(code.trim().to_ascii_uppercase().as_str())
            .copied()
    }

    pub fn one_letter(self) -> char {
        match self {
            ResidueType::Alanine => 'A',
            ResidueType::Arginine => 'R',
            ResidueType::Asparagine => 'N',
            ResidueType::AsparticAcid => 'D',
            ResidueType::Cysteine => 'C',
            ResidueType::Glutamine => 'Q',
            ResidueType::GlutamicAcid => 'E',
            ResidueType::Glycine => 'G',
            ResidueType::Histidine => 'H',
            ResidueType::Isoleucine => 'I',
            ResidueType::Leucine => 'L',
            ResidueType::Lysine => 'K',
            ResidueType::Methionine => 'M',
            ResidueType::Phenylalanine => 'F',
            ResidueType::Proline => 'P',
            ResidueType::Serine => 'S',
            ResidueType::Threonine => 'T',
            ResidueType::Tryptophan => 'W',
            ResidueType::Tyrosine => 'Y',
            ResidueType::Valine => 'V',
        }
    }

    pub fn three_letter(self) -> &'static str {
        match self {
            ResidueType::Alanine => "ALA",
            ResidueType::Arginine => "ARG",
            ResidueType::Asparagine => "ASN",
            ResidueType::AsparticAcid => "ASP",
            ResidueType::Cysteine => "CYS",
            ResidueType::Glutamine => "GLN",
            ResidueType::GlutamicAcid => "GLU",
            ResidueType::Glycine => "GLY",
            ResidueType::Histidine => "HIS",
            ResidueType::Isoleucine => "ILE",
            ResidueType::Leucine => "LEU",
            ResidueType::Lysine => "LYS",
            ResidueType::Methionine => "MET",
            ResidueType::Phenylalanine => "PHE",
            ResidueType::Proline => "PRO",
            ResidueType::Serine => "SER",
            ResidueType::Threonine => "THR",
            ResidueType::Tryptophan => "TRP",
            ResidueType::Tyrosine => "TYR",
            ResidueType::Valine => "VAL",
        }
    }

    /// Kyte-Doolittle hydropathy index.
    pub fn hydrophobicity(self) -> f64 {
        match self {
            ResidueType::Isoleucine => 4.5,
            ResidueType::Valine => 4.2,
            ResidueType::Leucine => 3.8,
            ResidueType::Phenylalanine => 2.8,
            ResidueType::Cysteine => 2.5,
            ResidueType::Methionine => 1.9,
            ResidueType::Alanine => 1.8,
            ResidueType::Glycine => -0.4,
            ResidueType::Threonine => -0.7,
            ResidueType::Serine => -0.8,
            ResidueType::Tryptophan => -0.9,
            ResidueType::Tyrosine => -1.3,
            ResidueType::Proline => -1.6,
            ResidueType::Histidine => -3.2,
            ResidueType::GlutamicAcid => -3.5,
            ResidueType::Glutamine => -3.5,
            ResidueType::AsparticAcid => -3.5,
            ResidueType::Asparagine => -3.5,
            ResidueType::Lysine => -3.9,
            ResidueType::Arginine => -4.5,
        }
    }

    pub fn backbone_class(self) -> BackboneClass {
        match self {
            ResidueType::Glycine => BackboneClass::Glycine,
            ResidueType::Proline => BackboneClass::Proline,
            _ => BackboneClass::General,
        }
    }

    pub fn chemical_class(self) -> ChemicalClass {
        match self {
            ResidueType::Alanine
            | ResidueType::Isoleucine
            | ResidueType::Leucine
            | ResidueType::Valine
            | ResidueType::Methionine => ChemicalClass::Aliphatic,
            ResidueType::Phenylalanine | ResidueType::Tryptophan | ResidueType::Tyrosine => {
                ChemicalClass::Aromatic
            }
            ResidueType::Asparagine
            | ResidueType::Cysteine
            | ResidueType::Glutamine
            | ResidueType::Serine
            | ResidueType::Threonine => ChemicalClass::Polar,
            ResidueType::Arginine | ResidueType::Histidine | ResidueType::Lysine => {
                ChemicalClass::Positive
            }
            ResidueType::AsparticAcid | ResidueType::GlutamicAcid => ChemicalClass::Negative,
            ResidueType::Glycine | ResidueType::Proline => ChemicalClass::Special,
        }
    }
}

impl FromStr for ResidueType {
    type Err = ParseResidueTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let mut chars = trimmed.chars();
        let parsed = match (chars.next(), chars.next()) {
            (Some(c), None) => Self::from_one_letter(c),
            _ => Self::from_three_letter(trimmed),
        };
        parsed.ok_or_else(|| ParseResidueTypeError(s.to_string()))
    }
}

impl fmt::Display for ResidueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.three_letter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn one_letter_codes_round_trip_for_every_residue() {
        for residue in ResidueType::ALL {
            assert_eq!(ResidueType::from_one_letter(residue.one_letter()), Some(residue));
        }
    }

    #[test]
    fn all_contains_twenty_distinct_residues() {
        let set: HashSet<_> = ResidueType::ALL.iter().collect();
        assert_eq!(set.len(), 20);
    }

    #[test]
    fn from_one_letter_is_case_insensitive() {
        assert_eq!(ResidueType::from_one_letter('g'), Some(ResidueType::Glycine));
        assert_eq!(ResidueType::from_one_letter('X'), None);
    }

    #[test]
    fn from_three_letter_accepts_aliases_and_lowercase() {
        assert_eq!(ResidueType::from_three_letter("hse"), Some(ResidueType::Histidine));
        assert_eq!(ResidueType::from_three_letter(" MSE "), Some(ResidueType::Methionine));
        assert_eq!(ResidueType::from_three_letter("XYZ"), None);
    }

    #[test]
    fn from_str_dispatches_on_token_length() {
        assert_eq!("P".parse::<ResidueType>(), Ok(ResidueType::Proline));
        assert_eq!("pro".parse::<ResidueType>(), Ok(ResidueType::Proline));
        assert_eq!(
            "PR".parse::<ResidueType>(),
            Err(ParseResidueTypeError("PR".to_string()))
        );
    }

    #[test]
    fn display_uses_three_letter_code() {
        assert_eq!(ResidueType::AsparticAcid.to_string(), "ASP");
    }

    #[test]
    fn backbone_class_singles_out_glycine_and_proline() {
        assert_eq!(ResidueType::Glycine.backbone_class(), BackboneClass::Glycine);
        assert_eq!(ResidueType::Proline.backbone_class(), BackboneClass::Proline);
        assert_eq!(ResidueType::Leucine.backbone_class(), BackboneClass::General);
    }

    #[test]
    fn hydrophobicity_orders_isoleucine_above_arginine() {
        assert!(ResidueType::Isoleucine.hydrophobicity() > ResidueType::Arginine.hydrophobicity());
    }
}
