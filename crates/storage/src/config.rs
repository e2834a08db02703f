// Copyright (C) 2025 Ryan Daum <ryan.daum@gmail.com> This program is free
// software: you can redistribute it and/or modify it under the terms of the GNU
// General Public License as published by the Free Software Foundation, version
// 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

use crate::StorageError;
use serde::{Deserialize, Serialize};
use tilestore_common::Schema;

pub const DEFAULT_TUPLES_PER_TILE_GROUP: usize = 1000;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Slot capacity of every tile group a table creates.
    pub tuples_per_tile_group: usize,
    /// How a table's columns are split into tiles.
    pub layout: TileGroupLayout,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            tuples_per_tile_group: DEFAULT_TUPLES_PER_TILE_GROUP,
            layout: TileGroupLayout::Row,
        }
    }
}

/// Vertical partitioning of a table schema into tile schemas.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TileGroupLayout {
    /// Every column in one tile.
    #[default]
    Row,
    /// One tile per column.
    Column,
    /// Consecutive runs of columns, one tile per run. The widths must sum to the column count.
    Hybrid(Vec<usize>),
}

impl TileGroupLayout {
    /// Split `schema` into the ordered fragments this layout describes.
    pub fn fragments(&self, schema: &Schema) -> Result<Vec<Schema>, StorageError> {
        let column_count = schema.column_count();
        if column_count == 0 {
            return Err(StorageError::InvalidLayout(
                "schema has no columns".to_string(),
            ));
        }
        let widths = match self {
            TileGroupLayout::Row => vec![column_count],
            TileGroupLayout::Column => vec![1; column_count],
            TileGroupLayout::Hybrid(widths) => {
                if widths.contains(&0) {
                    return Err(StorageError::InvalidLayout(
                        "hybrid layout contains an empty tile".to_string(),
                    ));
                }
                let total: usize = widths.iter().sum();
                if total != column_count {
                    return Err(StorageError::InvalidLayout(format!(
                        "hybrid layout covers {total} columns, schema has {column_count}"
                    )));
                }
                widths.clone()
            }
        };

        let mut fragments = Vec::with_capacity(widths.len());
        let mut start = 0;
        for width in widths {
            let columns: Vec<usize> = (start..start + width).collect();
            fragments.push(schema.project(&columns)?);
            start += width;
        }
        Ok(fragments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tilestore_common::{Column, ValueType};

    fn schema(n: usize) -> Schema {
        Schema::new(
            (0..n)
                .map(|i| Column::new(&format!("c{i}"), ValueType::Integer))
                .collect(),
        )
    }

    #[test]
    fn test_row_and_column_layouts() {
        let s = schema(4);
        let row = TileGroupLayout::Row.fragments(&s).unwrap();
        assert_eq!(row, vec![s.clone()]);

        let col = TileGroupLayout::Column.fragments(&s).unwrap();
        assert_eq!(col.len(), 4);
        assert!(col.iter().all(|f| f.column_count() == 1));
        assert_eq!(Schema::concat(&col), s);
    }

    #[test]
    fn test_hybrid_layout() {
        let s = schema(9);
        let fragments = TileGroupLayout::Hybrid(vec![3, 2, 4]).fragments(&s).unwrap();
        let counts: Vec<_> = fragments.iter().map(|f| f.column_count()).collect();
        assert_eq!(counts, vec![3, 2, 4]);
        assert_eq!(fragments[1].column(0).unwrap().name, "c3");
        assert_eq!(Schema::concat(&fragments), s);
    }

    #[test]
    fn test_bad_hybrid_layouts() {
        let s = schema(5);
        assert!(matches!(
            TileGroupLayout::Hybrid(vec![3, 3]).fragments(&s),
            Err(StorageError::InvalidLayout(_))
        ));
        assert!(matches!(
            TileGroupLayout::Hybrid(vec![5, 0]).fragments(&s),
            Err(StorageError::InvalidLayout(_))
        ));
        assert!(matches!(
            TileGroupLayout::Row.fragments(&Schema::default()),
            Err(StorageError::InvalidLayout(_))
        ));
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: StorageConfig = serde_json::from_str(r#"{"layout": {"hybrid": [1, 2]}}"#).unwrap();
        assert_eq!(config.tuples_per_tile_group, DEFAULT_TUPLES_PER_TILE_GROUP);
        assert_eq!(config.layout, TileGroupLayout::Hybrid(vec![1, 2]));

        let config: StorageConfig = serde_json::from_str(r#"{"layout": "column"}"#).unwrap();
        assert_eq!(config.layout, TileGroupLayout::Column);
    }
}
