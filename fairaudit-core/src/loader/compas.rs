//! ProPublica COMPAS two-year recidivism data.
//!
//! Rows are kept only when the screening happened within 30 days of arrest,
//! the recidivism flag is known, the charge is not an ordinary traffic
//! offense (`O`) and a score text exists. Rows with any missing kept value
//! are dropped too.
//!
//! `sex` and `race` are protected attributes, mapped to 1.0 for the
//! privileged class (`Female`, `Caucasian`) and 0.0 otherwise; both also stay
//! in the feature matrix. The label is `two_year_recid` and the favorable
//! outcome is 0 (did not reoffend).

use crate::dataset::{Dataset, ProtectedAttribute};
use crate::error::AuditError;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::debug;

pub const DEFAULT_FILE_NAME: &str = "compas-scores-two-years.csv";
pub const FAVORABLE_LABEL: f64 = 0.0;
pub const UNFAVORABLE_LABEL: f64 = 1.0;

const NUMERIC_FEATURES: [&str; 5] = [
    "age",
    "juv_fel_count",
    "juv_misd_count",
    "juv_other_count",
    "priors_count",
];
const CATEGORICAL_FEATURES: [&str; 3] = ["age_cat", "c_charge_degree", "c_charge_desc"];
const REQUIRED_COLUMNS: [&str; 14] = [
    "sex",
    "age",
    "age_cat",
    "race",
    "juv_fel_count",
    "juv_misd_count",
    "juv_other_count",
    "priors_count",
    "c_charge_degree",
    "c_charge_desc",
    "two_year_recid",
    "days_b_screening_arrest",
    "is_recid",
    "score_text",
];

/// One kept defendant record.
#[derive(Debug, Clone)]
struct Defendant {
    sex: String,
    race: String,
    numeric: [f64; 5],
    categorical: [String; 3],
    two_year_recid: f64,
}

fn parse_number(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("nan") {
        return None;
    }
    raw.parse().ok()
}

/// Applies the screening filters; `None` means the row is dropped.
fn parse_row(record: &csv::StringRecord, idx: &[usize; 14]) -> Option<Defendant> {
    let field = |i: usize| record.get(idx[i]).map(str::trim).unwrap_or("");

    let days = parse_number(field(11))?;
    if !(-30.0..=30.0).contains(&days) {
        return None;
    }
    if parse_number(field(12))? == -1.0 {
        return None;
    }
    let degree = field(8);
    if degree == "O" {
        return None;
    }
    let score_text = field(13);
    if score_text.is_empty() || score_text == "N/A" {
        return None;
    }

    let sex = field(0);
    let race = field(3);
    let age_cat = field(2);
    let desc = field(9);
    if sex.is_empty() || race.is_empty() || age_cat.is_empty() || degree.is_empty() || desc.is_empty() {
        return None;
    }

    let numeric = [
        parse_number(field(1))?,
        parse_number(field(4))?,
        parse_number(field(5))?,
        parse_number(field(6))?,
        parse_number(field(7))?,
    ];
    let two_year_recid = parse_number(field(10))?;

    Some(Defendant {
        sex: sex.to_string(),
        race: race.to_string(),
        numeric,
        categorical: [age_cat.to_string(), degree.to_string(), desc.to_string()],
        two_year_recid,
    })
}

pub fn load(path: &Path) -> Result<Dataset, AuditError> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let headers = reader.headers()?.clone();

    // The published file repeats some headers; the first occurrence wins.
    let mut idx = [0usize; 14];
    for (slot, name) in idx.iter_mut().zip(REQUIRED_COLUMNS) {
        *slot = headers.iter().position(|h| h == name).ok_or_else(|| {
            AuditError::dataset(format!("{}: missing COMPAS column '{name}'", path.display()))
        })?;
    }

    let mut defendants = Vec::new();
    let mut dropped = 0usize;
    for record in reader.records() {
        match parse_row(&record?, &idx) {
            Some(d) => defendants.push(d),
            None => dropped += 1,
        }
    }
    debug!(kept = defendants.len(), dropped, "Filtered COMPAS rows");
    if defendants.is_empty() {
        return Err(AuditError::dataset(format!(
            "{}: no COMPAS rows survived filtering",
            path.display()
        )));
    }

    build(&defendants).map_err(|e| AuditError::dataset(format!("{}: {e}", path.display())))
}

fn build(defendants: &[Defendant]) -> Result<Dataset, crate::error::FairnessError> {
    let vocabularies: Vec<Vec<&str>> = (0..CATEGORICAL_FEATURES.len())
        .map(|c| {
            defendants
                .iter()
                .map(|d| d.categorical[c].as_str())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect()
        })
        .collect();

    let mut feature_names = vec!["sex".to_string()];
    feature_names.push(NUMERIC_FEATURES[0].to_string());
    feature_names.push("race".to_string());
    feature_names.extend(NUMERIC_FEATURES[1..].iter().map(|s| s.to_string()));
    for (name, vocabulary) in CATEGORICAL_FEATURES.iter().zip(&vocabularies) {
        feature_names.extend(vocabulary.iter().map(|v| format!("{name}={v}")));
    }

    let mut features = Vec::with_capacity(defendants.len());
    let mut sex = Vec::with_capacity(defendants.len());
    let mut race = Vec::with_capacity(defendants.len());
    for d in defendants {
        let s = if d.sex == "Female" { 1.0 } else { 0.0 };
        let r = if d.race == "Caucasian" { 1.0 } else { 0.0 };
        let mut row = vec![s, d.numeric[0], r];
        row.extend_from_slice(&d.numeric[1..]);
        for (value, vocabulary) in d.categorical.iter().zip(&vocabularies) {
            row.extend(
                vocabulary
                    .iter()
                    .map(|v| if *v == value.as_str() { 1.0 } else { 0.0 }),
            );
        }
        features.push(row);
        sex.push(s);
        race.push(r);
    }

    Dataset::from_rows(
        feature_names,
        features,
        defendants.iter().map(|d| d.two_year_recid).collect(),
        vec![
            ProtectedAttribute::new("sex", sex),
            ProtectedAttribute::new("race", race),
        ],
        FAVORABLE_LABEL,
        UNFAVORABLE_LABEL,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    const HEADER: &str = "id,sex,age,age_cat,race,juv_fel_count,juv_misd_count,juv_other_count,\
                          priors_count,days_b_screening_arrest,c_charge_degree,c_charge_desc,\
                          is_recid,score_text,two_year_recid,priors_count";

    fn write(rows: &[&str]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{HEADER}").unwrap();
        for row in rows {
            writeln!(file, "{row}").unwrap();
        }
        file
    }

    #[test]
    fn test_filters_and_encodes() {
        let file = write(&[
            "1,Male,34,25 - 45,African-American,0,0,0,2,-1,F,Battery,1,Low,1,2",
            "2,Female,24,Less than 25,Caucasian,0,1,0,4,0,M,Petit Theft,0,Medium,0,4",
            // outside the screening window
            "3,Male,50,Greater than 45,Caucasian,0,0,0,1,45,F,Battery,0,Low,0,1",
            // unknown recidivism
            "4,Male,30,25 - 45,Hispanic,0,0,0,0,0,F,Battery,-1,Low,0,0",
            // ordinary traffic offense
            "5,Male,30,25 - 45,Hispanic,0,0,0,0,0,O,Speeding,0,Low,0,0",
            // no score
            "6,Male,30,25 - 45,Hispanic,0,0,0,0,0,F,Battery,0,N/A,0,0",
            // missing screening delta
            "7,Male,30,25 - 45,Hispanic,0,0,0,0,,F,Battery,0,Low,0,0",
        ]);
        let ds = load(file.path()).unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(
            ds.feature_names(),
            &[
                "sex",
                "age",
                "race",
                "juv_fel_count",
                "juv_misd_count",
                "juv_other_count",
                "priors_count",
                "age_cat=25 - 45",
                "age_cat=Less than 25",
                "c_charge_degree=F",
                "c_charge_degree=M",
                "c_charge_desc=Battery",
                "c_charge_desc=Petit Theft",
            ]
            .map(String::from)
        );
        assert_eq!(
            ds.features().row(1).to_vec(),
            vec![1.0, 24.0, 1.0, 0.0, 1.0, 0.0, 4.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0]
        );
        assert_eq!(ds.labels(), &[1.0, 0.0]);
        assert_eq!(ds.favorable_label(), 0.0);
        assert_eq!(ds.protected_attribute("race"), Some(&[0.0, 1.0][..]));
        assert_eq!(ds.protected_attribute("sex"), Some(&[0.0, 1.0][..]));
    }

    #[test]
    fn test_missing_column_is_reported() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "id,sex,age").unwrap();
        writeln!(file, "1,Male,30").unwrap();
        let err = load(file.path()).unwrap_err();
        assert!(err.to_string().contains("missing COMPAS column"));
    }

    #[test]
    fn test_id_column_is_optional() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{}", HEADER.trim_start_matches("id,")).unwrap();
        writeln!(file, "Male,34,25 - 45,African-American,0,0,0,2,-1,F,Battery,1,Low,1,2").unwrap();
        let ds = load(file.path()).unwrap();
        assert_eq!(ds.len(), 1);
        assert_eq!(ds.labels(), &[1.0]);
    }

    #[test]
    fn test_all_rows_filtered_is_an_error() {
        let file = write(&["1,Male,30,25 - 45,Hispanic,0,0,0,0,99,F,Battery,0,Low,0,0"]);
        assert!(load(file.path()).is_err());
    }
}
