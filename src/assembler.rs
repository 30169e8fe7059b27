//! Feature vector assembly
//!
//! Projects a record onto an ordered column schema. Assembly never imputes:
//! unobserved values stay `None` and the caller decides what to do with them.

use crate::error::{BloomError, BloomResult};
use crate::features::record::FeatureLookup;

pub struct FeatureVectorAssembler;

impl FeatureVectorAssembler {
    /// Ordered values for `schema`.
    ///
    /// Fails with `SchemaMismatch` listing every column the record lacks.
    pub fn assemble<R: FeatureLookup + ?Sized>(
        record: &R,
        schema: &[String],
    ) -> BloomResult<Vec<Option<f64>>> {
        let mut vector = Vec::with_capacity(schema.len());
        let mut missing = Vec::new();

        for column in schema {
            match record.lookup(column) {
                Some(value) => vector.push(value),
                None => missing.push(column.clone()),
            }
        }

        if !missing.is_empty() {
            return Err(BloomError::SchemaMismatch { missing });
        }
        Ok(vector)
    }

    /// Unwrap an assembled vector, failing with `MissingValues` listing every
    /// null column.
    pub fn require_complete(vector: &[Option<f64>], schema: &[String]) -> BloomResult<Vec<f64>> {
        let nulls: Vec<String> = vector
            .iter()
            .zip(schema)
            .filter(|(v, _)| v.is_none())
            .map(|(_, c)| c.clone())
            .collect();

        if !nulls.is_empty() {
            return Err(BloomError::MissingValues { columns: nulls });
        }
        Ok(vector.iter().flatten().copied().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::record::test_support::complete_record;
    use crate::features::record::{default_schema, FeatureRow, FEATURE_COLUMNS};
    use chrono::NaiveDate;

    fn record_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, 9).unwrap()
    }

    #[test]
    fn test_assemble_follows_schema_order() {
        let record = complete_record(record_date());
        let vector = FeatureVectorAssembler::assemble(&record, &default_schema()).unwrap();
        assert_eq!(vector.len(), FEATURE_COLUMNS.len());
        assert_eq!(vector[0], Some(0.55));
        assert_eq!(vector[12], Some(2024.0));
        assert_eq!(vector[23], Some(20.0));
    }

    #[test]
    fn test_custom_schema_subset_and_order() {
        let record = complete_record(record_date());
        let schema = vec!["month".to_string(), "NDVI".to_string()];
        let vector = FeatureVectorAssembler::assemble(&record, &schema).unwrap();
        assert_eq!(vector, vec![Some(4.0), Some(0.55)]);
    }

    #[test]
    fn test_missing_columns_all_reported() {
        let mut row = complete_record(record_date()).to_row();
        row.remove("ET_estimate");
        row.remove("water_balance_90d");

        let err = FeatureVectorAssembler::assemble(&row, &default_schema()).unwrap_err();
        match err {
            BloomError::SchemaMismatch { missing } => {
                assert_eq!(missing, vec!["ET_estimate".to_string(), "water_balance_90d".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_extra_columns_ignored_and_nulls_pass_through() {
        let row = FeatureRow::new()
            .with("NDVI", None)
            .with("EVI", Some(0.3))
            .with("unused_extra", Some(9.0));
        let schema = vec!["NDVI".to_string(), "EVI".to_string()];
        let vector = FeatureVectorAssembler::assemble(&row, &schema).unwrap();
        assert_eq!(vector, vec![None, Some(0.3)]);
    }

    #[test]
    fn test_require_complete_names_nulls() {
        let schema = vec!["NDVI".to_string(), "EVI".to_string(), "LST_day".to_string()];
        let err = FeatureVectorAssembler::require_complete(&[None, Some(0.3), None], &schema).unwrap_err();
        match err {
            BloomError::MissingValues { columns } => {
                assert_eq!(columns, vec!["NDVI".to_string(), "LST_day".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }

        let dense = FeatureVectorAssembler::require_complete(&[Some(1.0), Some(2.0), Some(3.0)], &schema).unwrap();
        assert_eq!(dense, vec![1.0, 2.0, 3.0]);
    }
}
