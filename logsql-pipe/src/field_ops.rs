//! Stateless column transforms: fields, copy, rename, delete. They
//! preserve row order and need no per-worker state.

use std::sync::Arc;

use logsql_block::{BlockResult, ResultColumn};
use logsql_result::Result;

use crate::PipeProcessor;

struct TransformProcessor<F> {
    transform: F,
    next: Arc<dyn PipeProcessor>,
}

impl<F: Fn(&BlockResult) -> BlockResult + Send + Sync> PipeProcessor for TransformProcessor<F> {
    fn write_block(&self, worker_id: usize, br: &BlockResult) -> Result<()> {
        self.next.write_block(worker_id, &(self.transform)(br))
    }

    fn flush(&self) -> Result<()> {
        self.next.flush()
    }
}

pub(crate) fn fields_processor(
    fields: Vec<String>,
    next: Arc<dyn PipeProcessor>,
) -> Arc<dyn PipeProcessor> {
    Arc::new(TransformProcessor {
        transform: move |br: &BlockResult| project_fields(&fields, br),
        next,
    })
}

fn project_fields(fields: &[String], br: &BlockResult) -> BlockResult {
    if fields.iter().any(|f| f == "*") {
        return br.clone();
    }
    let rows = br.row_count();
    let mut out = BlockResult {
        timestamps: br.timestamps.clone(),
        columns: Vec::with_capacity(fields.len()),
    };
    for name in fields {
        if out.column(name).is_some() {
            continue;
        }
        let values = match br.column(name) {
            Some(c) => c.values.clone(),
            None => vec![String::new(); rows],
        };
        out.columns.push(ResultColumn {
            name: name.clone(),
            values,
        });
    }
    out
}

pub(crate) fn copy_processor(
    pairs: Vec<(String, String)>,
    next: Arc<dyn PipeProcessor>,
) -> Arc<dyn PipeProcessor> {
    Arc::new(TransformProcessor {
        transform: move |br: &BlockResult| {
            let mut out = br.clone();
            for (src, dst) in &pairs {
                let values = column_values(&out, src);
                set_column(&mut out, dst, values);
            }
            out
        },
        next,
    })
}

pub(crate) fn rename_processor(
    pairs: Vec<(String, String)>,
    next: Arc<dyn PipeProcessor>,
) -> Arc<dyn PipeProcessor> {
    Arc::new(TransformProcessor {
        transform: move |br: &BlockResult| {
            let mut out = br.clone();
            for (src, dst) in &pairs {
                let values = column_values(&out, src);
                out.columns.retain(|c| c.name != *src);
                set_column(&mut out, dst, values);
            }
            out
        },
        next,
    })
}

pub(crate) fn delete_processor(
    fields: Vec<String>,
    next: Arc<dyn PipeProcessor>,
) -> Arc<dyn PipeProcessor> {
    Arc::new(TransformProcessor {
        transform: move |br: &BlockResult| {
            let mut out = br.clone();
            out.columns.retain(|c| !fields.contains(&c.name));
            out
        },
        next,
    })
}

fn column_values(br: &BlockResult, name: &str) -> Vec<String> {
    match br.column(name) {
        Some(c) => c.values.clone(),
        None => vec![String::new(); br.row_count()],
    }
}

/// Replace or append a column, overwriting any shadowed input column.
fn set_column(br: &mut BlockResult, name: &str, values: Vec<String>) {
    if let Some(c) = br.columns.iter_mut().find(|c| c.name == name) {
        c.values = values;
    } else {
        br.columns.push(ResultColumn {
            name: name.to_string(),
            values,
        });
    }
}
