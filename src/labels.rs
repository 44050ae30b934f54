//! Class-label table.
//!
//! Models emit numeric class ids; the label table maps them to the names
//! shipped alongside the model (`label_list.txt`, one class per line).

use std::path::Path;

use anyhow::{Context, Result};

#[derive(Clone, Debug, Default)]
pub struct LabelTable {
    labels: Vec<String>,
}

impl LabelTable {
    pub fn new(labels: Vec<String>) -> Self {
        Self { labels }
    }

    /// Load a label file: one class name per line, blank lines skipped.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read label file {}", path.display()))?;
        let labels = raw
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect();
        Ok(Self { labels })
    }

    /// Name for a class id, `class_<id>` when the table has no entry.
    pub fn name(&self, class_id: i32) -> String {
        usize::try_from(class_id)
            .ok()
            .and_then(|idx| self.labels.get(idx))
            .cloned()
            .unwrap_or_else(|| format!("class_{}", class_id))
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn loads_labels_and_skips_blank_lines() {
        let mut file = tempfile::NamedTempFile::new().expect("temp label file");
        writeln!(file, "mouse\n\nother\n").expect("write labels");

        let table = LabelTable::load(file.path()).expect("load labels");
        assert_eq!(table.len(), 2);
        assert_eq!(table.name(0), "mouse");
        assert_eq!(table.name(1), "other");
    }

    #[test]
    fn unknown_ids_fall_back_to_numeric_name() {
        let table = LabelTable::new(vec!["mouse".into()]);
        assert_eq!(table.name(7), "class_7");
        assert_eq!(table.name(-1), "class_-1");
    }
}
