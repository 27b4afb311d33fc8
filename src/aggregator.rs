use crate::models::{IntegratedTable, ParcelSlice};
use std::collections::HashMap;

/// Split the integrated table into one slice per parcel.
///
/// Slices come out in order of each parcel's first appearance; rows within a
/// slice keep their table order.
pub fn group_by_parcel(table: &IntegratedTable) -> Vec<ParcelSlice> {
    let mut index: HashMap<i64, usize> = HashMap::new();
    let mut slices: Vec<ParcelSlice> = Vec::new();

    for row in table {
        let slot = *index.entry(row.parcel_id).or_insert_with(|| {
            slices.push(ParcelSlice {
                parcel_id: row.parcel_id,
                rows: Vec::new(),
            });
            slices.len() - 1
        });
        slices[slot].rows.push(row.clone());
    }

    slices
}
