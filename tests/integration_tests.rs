use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use insertion_dashboard::pipeline;
use insertion_dashboard::reference::ReferenceTables;
use insertion_dashboard::snapshot::{
    BY_ACADEMIE_FILE, BY_DOMAINE_FILE, BY_REGION_FILE, BY_YEAR_FILE, read_json, read_parquet,
};
use insertion_dashboard::transform::RATE_COLS;

const FIXTURE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/sample.csv");

fn out_dir(name: &str) -> PathBuf {
    let dir = env::temp_dir().join(format!("insertion_dashboard_it_{name}"));
    let _ = fs::remove_dir_all(&dir);
    dir
}

#[test]
fn test_full_pipeline() {
    let dir = out_dir("full");
    let report = pipeline::run(Path::new(FIXTURE), &dir, &ReferenceTables::builtin())
        .expect("pipeline failed");

    // the "ns" insertion row is dropped
    assert_eq!(report.rows, 5);
    assert!(report.warnings.is_empty());

    let clean = read_parquet(&dir.join("clean.parquet")).unwrap();
    assert!(!clean.has_column("remarque"));
    assert!(!clean.has_column("numero_de_l_etablissement"));
    assert!(clean.has_column("taux_d_emploi"));
    assert!(clean.has_column("insertion_ok"));
    for name in RATE_COLS {
        if let Some(values) = clean.numbers(name) {
            assert!(
                values.iter().flatten().all(|v| (0.0..=1.0).contains(v)),
                "{name} out of range"
            );
        }
    }
    let rates = clean.numbers("taux_dinsertion").unwrap();
    assert!(rates.iter().flatten().any(|v| (v - 0.853).abs() < 1e-9));

    let by_year = read_json(&dir.join(BY_YEAR_FILE)).unwrap();
    assert_eq!(by_year[0]["annee"], 2020);
    assert_eq!(by_year[1]["annee"], 2021);
    // 2020: (0.5·10 + 0.8·30 + 0.95·20) / 60
    let y2020 = by_year[0]["taux_dinsertion_moy"].as_f64().unwrap();
    assert!((y2020 - 0.8).abs() < 1e-9);
    assert_eq!(by_year[0]["n"], 60.0);
    // cumulative weights 10, 40, 60 against half of 60
    assert_eq!(by_year[0]["salaire_median"], 2000.0);

    let by_domaine = read_json(&dir.join(BY_DOMAINE_FILE)).unwrap();
    assert_eq!(by_domaine[0]["domaine"], "Sciences, technologies et santé");

    let by_academie = read_json(&dir.join(BY_ACADEMIE_FILE)).unwrap();
    assert_eq!(by_academie.as_array().unwrap().len(), 4);

    let by_region = read_json(&dir.join(BY_REGION_FILE)).unwrap();
    let regions: Vec<&str> = by_region
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["region"].as_str().unwrap())
        .collect();
    assert_eq!(regions.len(), 2);
    assert!(regions.contains(&"Auvergne-Rhône-Alpes"));
    assert!(regions.contains(&"Île-de-France"));

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_rerun_overwrites_outputs() {
    let dir = out_dir("rerun");
    let refs = ReferenceTables::builtin();
    pipeline::run(Path::new(FIXTURE), &dir, &refs).unwrap();
    let first = read_json(&dir.join(BY_YEAR_FILE)).unwrap();
    pipeline::run(Path::new(FIXTURE), &dir, &refs).unwrap();
    let second = read_json(&dir.join(BY_YEAR_FILE)).unwrap();
    assert_eq!(first, second);
    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_missing_input_is_an_error() {
    let dir = out_dir("missing");
    let result = pipeline::run(Path::new("/no/such/survey.csv"), &dir, &ReferenceTables::builtin());
    assert!(result.is_err());
}
