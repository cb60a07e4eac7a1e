//! Static lookup data: academy → region and academy → map coordinates.
//!
//! Built once at startup and shared read-only. The built-in tables can be
//! replaced from a JSON file of the form:
//! ```json
//! {
//!   "academy_to_region": { "Lyon": "Auvergne-Rhône-Alpes" },
//!   "academy_coords": { "Lyon": [45.7640, 4.8357] }
//! }
//! ```
//! Either key may be omitted to keep the built-in table.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Academies (and region self-names) to region names matching the GeoJSON.
static ACADEMY_TO_REGION: &[(&str, &str)] = &[
    ("Auvergne-Rhône-Alpes", "Auvergne-Rhône-Alpes"),
    ("Clermont-Ferrand", "Auvergne-Rhône-Alpes"),
    ("Grenoble", "Auvergne-Rhône-Alpes"),
    ("Lyon", "Auvergne-Rhône-Alpes"),
    ("Bourgogne-Franche-Comté", "Bourgogne-Franche-Comté"),
    ("Besançon", "Bourgogne-Franche-Comté"),
    ("Dijon", "Bourgogne-Franche-Comté"),
    ("Bretagne", "Bretagne"),
    ("Rennes", "Bretagne"),
    ("Centre-Val de Loire", "Centre-Val de Loire"),
    ("Orléans-Tours", "Centre-Val de Loire"),
    ("Corse", "Corse"),
    ("Grand Est", "Grand Est"),
    ("Nancy-Metz", "Grand Est"),
    ("Reims", "Grand Est"),
    ("Strasbourg", "Grand Est"),
    ("Hauts-de-France", "Hauts-de-France"),
    ("Amiens", "Hauts-de-France"),
    ("Lille", "Hauts-de-France"),
    ("Île-de-France", "Île-de-France"),
    ("Créteil", "Île-de-France"),
    ("Paris", "Île-de-France"),
    ("Versailles", "Île-de-France"),
    ("Normandie", "Normandie"),
    ("Nouvelle-Aquitaine", "Nouvelle-Aquitaine"),
    ("Bordeaux", "Nouvelle-Aquitaine"),
    ("Limoges", "Nouvelle-Aquitaine"),
    ("Poitiers", "Nouvelle-Aquitaine"),
    ("Occitanie", "Occitanie"),
    ("Montpellier", "Occitanie"),
    ("Toulouse", "Occitanie"),
    ("Pays de la Loire", "Pays de la Loire"),
    ("Nantes", "Pays de la Loire"),
    ("Provence-Alpes-Côte d'Azur", "Provence-Alpes-Côte d'Azur"),
    ("Aix-Marseille", "Provence-Alpes-Côte d'Azur"),
    ("Nice", "Provence-Alpes-Côte d'Azur"),
    // overseas
    ("Guadeloupe", "Guadeloupe"),
    ("Guyane", "Guyane"),
    ("Martinique", "Martinique"),
    ("Mayotte", "Mayotte"),
    ("Réunion", "La Réunion"),
    ("La Réunion", "La Réunion"),
];

/// Approximate coordinates of each academy seat, `(lat, lon)`.
static ACADEMY_COORDS: &[(&str, (f64, f64))] = &[
    ("Aix-Marseille", (43.2965, 5.3698)),
    ("Amiens", (49.8941, 2.2958)),
    ("Besançon", (47.2378, 6.0241)),
    ("Bordeaux", (44.8378, -0.5792)),
    ("Clermont-Ferrand", (45.7772, 3.0870)),
    ("Corse", (41.9192, 8.7386)),
    ("Créteil", (48.7904, 2.4556)),
    ("Dijon", (47.3220, 5.0415)),
    ("Grenoble", (45.1885, 5.7245)),
    ("Guadeloupe", (16.2410, -61.5330)),
    ("Guyane", (4.9224, -52.3135)),
    ("Lille", (50.6292, 3.0573)),
    ("Limoges", (45.8336, 1.2611)),
    ("Lyon", (45.7640, 4.8357)),
    ("Martinique", (14.6161, -61.0588)),
    ("Mayotte", (-12.7800, 45.2270)),
    ("Montpellier", (43.6108, 3.8767)),
    ("Nancy-Metz", (48.6921, 6.1844)),
    ("Nantes", (47.2184, -1.5536)),
    ("Nice", (43.7102, 7.2620)),
    ("Normandie", (49.1829, -0.3707)),
    ("Orléans-Tours", (47.9029, 1.9093)),
    ("Paris", (48.8566, 2.3522)),
    ("Poitiers", (46.5802, 0.3404)),
    ("Reims", (49.2583, 4.0317)),
    ("Rennes", (48.1173, -1.6778)),
    ("Réunion", (-20.8789, 55.4481)),
    ("Strasbourg", (48.5734, 7.7521)),
    ("Toulouse", (43.6047, 1.4442)),
    ("Versailles", (48.8049, 2.1204)),
];

/// Read-only lookups used by the region aggregate and the map endpoint.
#[derive(Debug, Clone)]
pub struct ReferenceTables {
    academy_to_region: HashMap<String, String>,
    academy_coords: HashMap<String, (f64, f64)>,
}

#[derive(Deserialize)]
struct ReferenceFile {
    academy_to_region: Option<HashMap<String, String>>,
    academy_coords: Option<HashMap<String, (f64, f64)>>,
}

impl Default for ReferenceTables {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ReferenceTables {
    /// The tables compiled into the binary.
    pub fn builtin() -> Self {
        Self {
            academy_to_region: ACADEMY_TO_REGION
                .iter()
                .map(|(a, r)| (a.to_string(), r.to_string()))
                .collect(),
            academy_coords: ACADEMY_COORDS
                .iter()
                .map(|(a, c)| (a.to_string(), *c))
                .collect(),
        }
    }

    /// Loads overrides from a JSON file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading reference tables {}", path.display()))?;
        Self::from_json(&content)
            .with_context(|| format!("parsing reference tables {}", path.display()))
    }

    fn from_json(content: &str) -> Result<Self> {
        let file: ReferenceFile = serde_json::from_str(content)?;
        let mut tables = Self::builtin();
        if let Some(map) = file.academy_to_region {
            tables.academy_to_region = map;
        }
        if let Some(coords) = file.academy_coords {
            tables.academy_coords = coords;
        }
        Ok(tables)
    }

    /// Built-in tables, or the file at `path` when given.
    pub fn load_or_builtin(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::builtin()),
        }
    }

    pub fn region_of(&self, academy: &str) -> Option<&str> {
        self.academy_to_region.get(academy).map(String::as_str)
    }

    pub fn coords_of(&self, academy: &str) -> Option<(f64, f64)> {
        self.academy_coords.get(academy).copied()
    }
}
