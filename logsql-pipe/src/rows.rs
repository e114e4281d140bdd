//! Row-oriented view of block results, used by the buffering pipes
//! (sort, uniq).

use logsql_block::{BlockResult, ResultColumn};

#[derive(Clone, Debug)]
pub(crate) struct Row {
    pub timestamp: i64,
    pub fields: Vec<(String, String)>,
}

impl Row {
    pub fn value(&self, name: &str) -> &str {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
            .unwrap_or("")
    }
}

pub(crate) fn rows_from_block(br: &BlockResult) -> Vec<Row> {
    (0..br.row_count())
        .map(|i| Row {
            timestamp: br.timestamps[i],
            fields: br
                .columns
                .iter()
                .map(|c| (c.name.clone(), c.values[i].clone()))
                .collect(),
        })
        .collect()
}

/// Rebuild a block from rows; columns appear in first-seen order and
/// absent fields read as empty strings.
pub(crate) fn block_from_rows(rows: &[Row]) -> BlockResult {
    let mut names: Vec<String> = Vec::new();
    for row in rows {
        for (name, _) in &row.fields {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
    }
    BlockResult {
        timestamps: rows.iter().map(|r| r.timestamp).collect(),
        columns: names
            .into_iter()
            .map(|name| ResultColumn {
                values: rows.iter().map(|r| r.value(&name).to_string()).collect(),
                name,
            })
            .collect(),
    }
}
