use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Raw administrative fuel codes and the label they remap to.
const FUEL_CODES: &[(&str, &str)] = &[
    ("GO", "Gazole"),
    ("ES", "Essence"),
    ("EH", "Essence"),
    ("GH", "Gazole"),
    ("ES/GN", "Essence"),
    ("GN/ES", "Gaz Naturel Vehicule (GNV)"),
    ("ES/GP", "Essence"),
    ("GP/ES", "Gaz de Petrole Liquefié (GPL)"),
    ("EL", "Electrique"),
    ("GN", "Gaz Naturel Vehicule (GNV)"),
    ("EE", "Essence"),
    ("FE", "SuperEthanol-E85"),
    ("GL", "Gazole"),
];

/// The five canonical fuel categories, in label-encoding order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FuelCategory {
    Essence,
    GazNaturel,
    GazPetroleLiquefie,
    Gazole,
    SuperEthanol,
}

impl FuelCategory {
    pub const ALL: [FuelCategory; 5] = [
        FuelCategory::Essence,
        FuelCategory::GazNaturel,
        FuelCategory::GazPetroleLiquefie,
        FuelCategory::Gazole,
        FuelCategory::SuperEthanol,
    ];

    pub const COUNT: usize = 5;

    pub fn label(self) -> &'static str {
        match self {
            FuelCategory::Essence => "Essence",
            FuelCategory::GazNaturel => "Gaz Naturel Vehicule (GNV)",
            FuelCategory::GazPetroleLiquefie => "Gaz de Petrole Liquefié (GPL)",
            FuelCategory::Gazole => "Gazole",
            FuelCategory::SuperEthanol => "SuperEthanol-E85",
        }
    }

    /// Position in [`FuelCategory::ALL`]; also the label-encoded value.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Parse a canonical label, tolerating the accent variants found in the data.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim() {
            "Essence" => Some(FuelCategory::Essence),
            "Gaz Naturel Vehicule (GNV)" | "Gaz Naturel Véhicule (GNV)" => {
                Some(FuelCategory::GazNaturel)
            }
            "Gaz de Petrole Liquefié (GPL)" | "Gaz de Petrole Liquefie (GPL)" => {
                Some(FuelCategory::GazPetroleLiquefie)
            }
            "Gazole" => Some(FuelCategory::Gazole),
            "SuperEthanol-E85" => Some(FuelCategory::SuperEthanol),
            _ => None,
        }
    }

    pub fn one_hot(self) -> [f64; 5] {
        let mut indicator = [0.0; 5];
        indicator[self.index()] = 1.0;
        indicator
    }
}

impl fmt::Display for FuelCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for FuelCategory {
    type Err = String;

    /// Accepts canonical labels plus short command-line names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(category) = FuelCategory::from_label(s) {
            return Ok(category);
        }
        match s.trim().to_ascii_lowercase().as_str() {
            "essence" | "es" => Ok(FuelCategory::Essence),
            "gnv" | "gn" => Ok(FuelCategory::GazNaturel),
            "gpl" | "gp" => Ok(FuelCategory::GazPetroleLiquefie),
            "gazole" | "diesel" | "go" => Ok(FuelCategory::Gazole),
            "e85" | "superethanol" | "fe" => Ok(FuelCategory::SuperEthanol),
            other => Err(format!(
                "unknown fuel '{}', expected one of: essence, gnv, gpl, gazole, e85",
                other
            )),
        }
    }
}

/// Remap a raw fuel code to its label. Codes missing from the table pass through verbatim.
pub fn remap_fuel_code(raw: &str) -> String {
    let code = raw.trim();
    FUEL_CODES
        .iter()
        .find(|(from, _)| *from == code)
        .map(|(_, to)| (*to).to_string())
        .unwrap_or_else(|| raw.to_string())
}
