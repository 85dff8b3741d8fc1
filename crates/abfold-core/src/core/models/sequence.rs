use super::error::InputError;
use super::residue::ResidueType;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// An immutable, cheaply clonable amino-acid sequence.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Sequence {
    residues: Arc<[ResidueType]>,
}

impl Sequence {
    pub fn new(residues: Vec<ResidueType>) -> Self {
        Self {
            residues: residues.into(),
        }
    }

    /// Parses one-letter codes. Whitespace is ignored; positions in errors count
    /// residues, not characters.
    pub fn parse(text: &str) -> Result<Self, InputError> {
        let mut residues = Vec::with_capacity(text.len());
        for (position, code) in text.chars().filter(|c| !c.is_whitespace()).enumerate() {
            let residue =
                ResidueType::from_one_letter(code).ok_or_else(|| InputError::UnknownResidue {
                    position,
                    token: code.to_string(),
                })?;
            residues.push(residue);
        }
        if residues.is_empty() {
            return Err(InputError::EmptySequence);
        }
        Ok(Self::new(residues))
    }

    pub fn from_three_letter<S: AsRef<str>>(tokens: &[S]) -> Result<Self, InputError> {
        if tokens.is_empty() {
            return Err(InputError::EmptySequence);
        }
        let residues = tokens
            .iter()
            .enumerate()
            .map(|(position, token)| {
                ResidueType::from_three_letter(token.as_ref()).ok_or_else(|| {
                    InputError::UnknownResidue {
                        position,
                        token: token.as_ref().to_string(),
                    }
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(residues))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.residues.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.residues.is_empty()
    }

    #[inline]
    pub fn residues(&self) -> &[ResidueType] {
        &self.residues
    }

    pub fn get(&self, index: usize) -> Option<ResidueType> {
        self.residues.get(index).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = ResidueType> + '_ {
        self.residues.iter().copied()
    }

    pub fn ensure_non_empty(&self) -> Result<(), InputError> {
        if self.is_empty() {
            Err(InputError::EmptySequence)
        } else {
            Ok(())
        }
    }
}

impl FromStr for Sequence {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for residue in self.iter() {
            write!(f, "{}", residue.one_letter())?;
        }
        Ok(())
    }
}
