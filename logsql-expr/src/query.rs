//! A parsed query: root filter plus the ordered pipe chain.

use std::fmt;

use crate::fields::FieldsSet;
use crate::filter::Filter;
use crate::pipe::Pipe;

#[derive(Clone, Debug)]
pub struct Query {
    pub filter: Filter,
    pub pipes: Vec<Pipe>,
}

impl Query {
    /// Compute the columns that must be materialized (`needed`) and, when
    /// `needed` is `*`, the columns that may be suppressed (`unneeded`).
    ///
    /// The walk starts from `needed = {*}` at the output and applies each
    /// pipe's rewrite right-to-left; the filter tree then contributes the
    /// columns it reads.
    pub fn needed_columns(&self) -> (Vec<String>, Vec<String>) {
        let mut needed = FieldsSet::new();
        needed.add("*");
        let mut unneeded = FieldsSet::new();
        for pipe in self.pipes.iter().rev() {
            pipe.update_needed_fields(&mut needed, &mut unneeded);
        }
        self.filter.update_needed_fields(&mut needed);
        (needed.get_all(), unneeded.get_all())
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.filter)?;
        for pipe in &self.pipes {
            write!(f, " | {pipe}")?;
        }
        Ok(())
    }
}
