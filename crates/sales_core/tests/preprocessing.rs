//! Feature engineering and preprocessing on a synthetic sales table

use salescast_core::preprocessor::ColumnRoles;
use salescast_core::{
    col, engineer_features, CompositePreprocessor, LeakagePolicy, SalesError, SalesRecord, Table,
};

const PLATFORMS: [&str; 3] = ["Wii", "PS2", "DS"];
const GENRES: [&str; 2] = ["Sports", "Puzzle"];
const PUBLISHERS: [&str; 5] = ["Nintendo", "EA", "Activision", "Sony", "Ubisoft"];

fn synthetic_records(n: usize) -> Vec<SalesRecord> {
    (0..n)
        .map(|i| {
            let na = 0.05 + (i * 7 % 13) as f64 * 0.11;
            let eu = 0.02 + (i * 5 % 11) as f64 * 0.07;
            let jp = (i * 3 % 7) as f64 * 0.03;
            let other = 0.01 + (i % 4) as f64 * 0.02;
            SalesRecord {
                name: format!("Title {i}"),
                platform: PLATFORMS[i % 3].into(),
                genre: GENRES[i % 2].into(),
                publisher: PUBLISHERS[i % 5].into(),
                year: 1990 + (i % 25) as i32,
                na_sales: na,
                eu_sales: eu,
                jp_sales: jp,
                other_sales: other,
                global_sales: na + eu + jp + other + 0.01,
            }
        })
        .collect()
}

fn train_table() -> (Table, Vec<f64>) {
    let table = Table::from_records(&synthetic_records(100));
    let rows: Vec<usize> = (0..table.n_rows()).collect();
    let (augmented, _) =
        engineer_features(&table, col::GLOBAL_SALES, &rows, LeakagePolicy::TrainOnly).unwrap();
    let target = augmented.numeric(col::GLOBAL_SALES).unwrap().to_vec();
    (augmented, target)
}

#[test]
fn test_hundred_rows_produce_fourteen_columns() {
    let (table, target) = train_table();
    let mut preprocessor = CompositePreprocessor::new(ColumnRoles::sales_default());
    let matrix = preprocessor.fit_transform(&table, &target).unwrap();

    // 1 target-encoded + 3 platforms + 2 genres + 8 numeric
    assert_eq!(matrix.len(), 100);
    assert!(matrix.iter().all(|row| row.len() == 14));

    let names = preprocessor.feature_names().unwrap();
    assert_eq!(names.len(), 14);
    assert_eq!(names[0], "Publisher");
    assert!(names.contains(&"Platform_Wii".to_string()));
    assert!(names.contains(&"Genre_Puzzle".to_string()));
}

#[test]
fn test_standardized_numerics_have_unit_scale() {
    let (table, target) = train_table();
    let mut preprocessor = CompositePreprocessor::new(ColumnRoles::sales_default());
    let matrix = preprocessor.fit_transform(&table, &target).unwrap();

    for column in 6..14 {
        let values: Vec<f64> = matrix.iter().map(|row| row[column]).collect();
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
        assert!(mean.abs() < 1e-6, "column {column} mean {mean}");
        assert!((var.sqrt() - 1.0).abs() < 1e-6, "column {column} std {}", var.sqrt());
    }
}

#[test]
fn test_unseen_categories_at_inference() {
    let records = synthetic_records(100);
    let table = Table::from_records(&records);
    let rows: Vec<usize> = (0..table.n_rows()).collect();
    let (augmented, derived) =
        engineer_features(&table, col::GLOBAL_SALES, &rows, LeakagePolicy::TrainOnly).unwrap();
    let target = augmented.numeric(col::GLOBAL_SALES).unwrap().to_vec();
    let prior = target.iter().sum::<f64>() / target.len() as f64;

    let mut preprocessor = CompositePreprocessor::new(ColumnRoles::sales_default());
    preprocessor.fit(&augmented, &target).unwrap();

    let unseen = SalesRecord {
        platform: "Dreamcast".into(),
        genre: "Strategy".into(),
        publisher: "Sega".into(),
        ..records[0].clone()
    };
    let row = preprocessor.transform_record(&unseen, &derived).unwrap();
    assert_eq!(row.len(), 14);
    assert!((row[0] - prior).abs() < 1e-9);
    // Platform and genre blocks are all zero.
    assert!(row[1..6].iter().all(|&v| v == 0.0));
}

#[test]
fn test_transform_is_repeatable_and_requires_fit() {
    let (table, target) = train_table();
    let mut preprocessor = CompositePreprocessor::new(ColumnRoles::sales_default());
    assert!(matches!(
        preprocessor.transform(&table),
        Err(SalesError::NotFitted)
    ));

    preprocessor.fit(&table, &target).unwrap();
    let first = preprocessor.transform(&table).unwrap();
    let second = preprocessor.transform(&table).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_train_only_statistics_ignore_eval_rows() {
    let table = Table::from_records(&synthetic_records(20));
    let train_rows: Vec<usize> = (0..15).collect();
    let (_, train_only) =
        engineer_features(&table, col::GLOBAL_SALES, &train_rows, LeakagePolicy::TrainOnly)
            .unwrap();
    let (_, whole) =
        engineer_features(&table, col::GLOBAL_SALES, &train_rows, LeakagePolicy::WholeTable)
            .unwrap();
    assert_eq!(train_only.reference_rows, 15);
    assert_eq!(whole.reference_rows, 20);
}
