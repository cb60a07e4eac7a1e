//! Canonical column names of the cleaned survey table.

pub const YEAR: &str = "annee";
pub const FIELD: &str = "domaine";
pub const ACADEMY: &str = "academie";
pub const REGION: &str = "region";

pub const INSERTION_RATE: &str = "taux_dinsertion";
pub const EMPLOYMENT_RATE: &str = "taux_d_emploi";
pub const MEDIAN_SALARY: &str = "salaire_net_median_des_emplois_a_temps_plein";
pub const WOMEN_SHARE: &str = "femmes";
pub const SCHOLARSHIP_SHARE: &str = "de_diplomes_boursiers";
pub const RESPONSES: &str = "nombre_de_reponses";

/// Derived by the transform step.
pub const INSERTION_FLAG: &str = "insertion_ok";
