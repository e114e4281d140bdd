//! Set of field names with `*` wildcard semantics.

use rustc_hash::FxHashSet;

/// A set of column names where `*` means "every column". Adding `*`
/// collapses the set; removing a name is a no-op while `*` is present.
#[derive(Clone, Debug, Default)]
pub struct FieldsSet(FxHashSet<String>);

impl FieldsSet {
    pub fn new() -> Self {
        FieldsSet::default()
    }

    pub fn reset(&mut self) {
        self.0.clear();
    }

    /// All names in sorted order (including a literal `*`).
    pub fn get_all(&self) -> Vec<String> {
        let mut all: Vec<String> = self.0.iter().cloned().collect();
        all.sort_unstable();
        all
    }

    /// Whether `field` is covered, either literally or via `*`.
    pub fn contains(&self, field: &str) -> bool {
        self.0.contains(field) || self.0.contains("*")
    }

    pub fn add(&mut self, field: &str) {
        if self.contains("*") {
            return;
        }
        if field == "*" {
            self.0.clear();
        }
        self.0.insert(field.to_string());
    }

    pub fn add_all<I: IntoIterator<Item = S>, S: AsRef<str>>(&mut self, fields: I) {
        for f in fields {
            self.add(f.as_ref());
        }
    }

    pub fn remove(&mut self, field: &str) {
        if field == "*" {
            self.0.clear();
            return;
        }
        if !self.0.contains("*") {
            self.0.remove(field);
        }
    }

    pub fn remove_all<I: IntoIterator<Item = S>, S: AsRef<str>>(&mut self, fields: I) {
        for f in fields {
            self.remove(f.as_ref());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn star_semantics() {
        let mut fs = FieldsSet::new();
        fs.add("a");
        fs.add("b");
        assert!(fs.contains("a"));
        assert!(!fs.contains("c"));
        fs.add("*");
        assert!(fs.contains("c"));
        assert_eq!(fs.get_all(), vec!["*"]);
        fs.add("d");
        assert_eq!(fs.get_all(), vec!["*"]);
        fs.remove("d");
        assert!(fs.contains("d"));
        fs.remove("*");
        assert!(!fs.contains("d"));
        assert!(fs.get_all().is_empty());
    }
}
