//! Property tests for the composite preprocessor

use proptest::prelude::*;
use proptest::sample::subsequence;
use salescast_core::preprocessor::ColumnRoles;
use salescast_core::{
    col, engineer_features, CompositePreprocessor, LeakagePolicy, SalesRecord, Table,
};
use std::collections::BTreeSet;

const CATEGORICAL: [&str; 3] = [col::PLATFORM, col::GENRE, col::PUBLISHER];
const NUMERIC: [&str; 8] = [
    col::YEAR,
    col::NA_SALES,
    col::EU_SALES,
    col::JP_SALES,
    col::OTHER_SALES,
    col::TOTAL_KNOWN_SALES,
    col::PUBLISHER_AVG,
    col::PLATFORM_COUNT,
];

prop_compose! {
    fn arb_record()(
        platform in 0..4usize,
        genre in 0..3usize,
        publisher in 0..6usize,
        year in 1980..2020i32,
        na in 0.0..5.0f64,
        eu in 0.0..3.0f64,
        jp in 0.0..2.0f64,
        other in 0.0..1.0f64,
    ) -> SalesRecord {
        SalesRecord {
            name: "Game".into(),
            platform: format!("P{platform}"),
            genre: format!("G{genre}"),
            publisher: format!("Pub{publisher}"),
            year,
            na_sales: na,
            eu_sales: eu,
            jp_sales: jp,
            other_sales: other,
            global_sales: na + eu + jp + other + 0.01,
        }
    }
}

/// Roles: each categorical column goes to target encoding (0), one-hot (1)
/// or is dropped (2); at least one numeric column is kept.
fn arb_roles() -> impl Strategy<Value = ColumnRoles> {
    (
        proptest::collection::vec(0..3u8, 3),
        subsequence(NUMERIC.to_vec(), 1..=NUMERIC.len()),
    )
        .prop_map(|(assignment, numeric)| {
            let pick = |role: u8| {
                CATEGORICAL
                    .iter()
                    .zip(&assignment)
                    .filter(move |(_, r)| **r == role)
                    .map(|(name, _)| *name)
                    .collect::<Vec<_>>()
            };
            ColumnRoles::new(pick(0), pick(1), numeric).unwrap()
        })
}

fn augmented(records: &[SalesRecord]) -> (Table, Vec<f64>) {
    let table = Table::from_records(records);
    let rows: Vec<usize> = (0..table.n_rows()).collect();
    let (augmented, _) =
        engineer_features(&table, col::GLOBAL_SALES, &rows, LeakagePolicy::WholeTable).unwrap();
    let target = augmented.numeric(col::GLOBAL_SALES).unwrap().to_vec();
    (augmented, target)
}

proptest! {
    #[test]
    fn feature_names_match_output_width(
        records in proptest::collection::vec(arb_record(), 2..40),
        roles in arb_roles(),
    ) {
        let (table, target) = augmented(&records);
        let mut preprocessor = CompositePreprocessor::new(roles.clone());
        let matrix = preprocessor.fit_transform(&table, &target).unwrap();
        let names = preprocessor.feature_names().unwrap();

        let one_hot_width: usize = roles
            .one_hot()
            .iter()
            .map(|c| table.categorical(c).unwrap().iter().collect::<BTreeSet<_>>().len())
            .sum();
        let expected = roles.target_encoded().len() + one_hot_width + roles.numeric().len();

        prop_assert_eq!(names.len(), expected);
        for row in &matrix {
            prop_assert_eq!(row.len(), expected);
        }
    }

    #[test]
    fn transform_is_deterministic(
        records in proptest::collection::vec(arb_record(), 2..30),
        roles in arb_roles(),
    ) {
        let (table, target) = augmented(&records);
        let mut a = CompositePreprocessor::new(roles.clone());
        let mut b = CompositePreprocessor::new(roles);
        let first = a.fit_transform(&table, &target).unwrap();
        let second = b.fit_transform(&table, &target).unwrap();
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(first, a.transform(&table).unwrap());
    }

    #[test]
    fn scaled_columns_are_standardized(records in proptest::collection::vec(arb_record(), 5..40)) {
        let (table, target) = augmented(&records);
        let roles = ColumnRoles::new(Vec::<&str>::new(), Vec::new(), NUMERIC.to_vec()).unwrap();
        let mut preprocessor = CompositePreprocessor::new(roles);
        let matrix = preprocessor.fit_transform(&table, &target).unwrap();
        let n = matrix.len() as f64;

        for (idx, name) in NUMERIC.iter().enumerate() {
            let raw = table.numeric(name).unwrap();
            let raw_mean = raw.iter().sum::<f64>() / n;
            let raw_std = (raw.iter().map(|v| (v - raw_mean).powi(2)).sum::<f64>() / n).sqrt();

            let values: Vec<f64> = matrix.iter().map(|row| row[idx]).collect();
            let mean = values.iter().sum::<f64>() / n;
            prop_assert!(mean.abs() < 1e-6);
            if raw_std > 1e-6 {
                let std = (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();
                prop_assert!((std - 1.0).abs() < 1e-6, "{} std {}", name, std);
            }
        }
    }
}
