use crate::error::Error;
use crate::id::ClassId;
use indexmap::IndexMap;
use serde_derive::{Deserialize, Serialize};

pub const NOT_COUNTED: i64 = -1;

/// Display attributes of a class.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ClassEntry {
    pub id: ClassId,
    pub name: Option<String>,
    pub color: Option<String>,
    pub running_count: i64,
}

/// Input for [`ClassRegistry::add_class`].
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct NewClass {
    pub id: Option<ClassId>,
    pub name: Option<String>,
    pub color: Option<String>,
    pub running_count: Option<i64>,
}

impl NewClass {
    pub fn new(id: impl Into<ClassId>) -> Self {
        Self {
            id: Some(id.into()),
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }
}

/// `#rgb` or `#rrggbb`.
pub fn is_hex_color(color: &str) -> bool {
    match color.strip_prefix('#') {
        Some(hex) => (hex.len() == 3 || hex.len() == 6) && hex.chars().all(|c| c.is_ascii_hexdigit()),
        None => false,
    }
}

/// Per-class display attributes, iterated in insertion order.
#[derive(Debug, Clone, Default)]
pub struct ClassRegistry {
    entries: IndexMap<ClassId, ClassEntry>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overwrites an entry, returning its id. An id is chosen with
    /// [`first_available_class_id`](Self::first_available_class_id) when absent.
    pub fn add_class(&mut self, class: NewClass) -> ClassId {
        let id = class
            .id
            .unwrap_or_else(|| self.first_available_class_id());

        let color = match class.color {
            Some(c) if is_hex_color(&c) => Some(c),
            Some(c) => {
                tracing::warn!(class = %id, color = %c, "ignoring malformed class color");
                None
            }
            None => None,
        };

        let running_count = match class.running_count {
            Some(n) if n >= NOT_COUNTED => n,
            _ => NOT_COUNTED,
        };

        let entry = ClassEntry {
            id: id.clone(),
            name: class.name,
            color,
            running_count,
        };

        // an overwrite keeps the original position
        self.entries.insert(id.clone(), entry);

        id
    }

    pub(crate) fn remove(&mut self, id: &ClassId) -> Option<ClassEntry> {
        self.entries.shift_remove(id)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[inline]
    pub fn get(&self, id: &ClassId) -> Option<&ClassEntry> {
        self.entries.get(id)
    }

    #[inline]
    pub fn contains(&self, id: &ClassId) -> bool {
        self.entries.contains_key(id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &ClassId> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClassEntry> {
        self.entries.values()
    }

    fn entry_mut(&mut self, id: &ClassId) -> Result<&mut ClassEntry, Error> {
        self.entries
            .get_mut(id)
            .ok_or_else(|| Error::UnknownClass(id.clone()))
    }

    pub fn set_name(&mut self, id: &ClassId, name: impl Into<String>) -> Result<(), Error> {
        self.entry_mut(id)?.name = Some(name.into());
        Ok(())
    }

    pub fn set_color(&mut self, id: &ClassId, color: impl Into<String>) -> Result<(), Error> {
        let color = color.into();
        if !is_hex_color(&color) {
            return Err(Error::invalid("color", format!("`{}` is not a hex color", color)));
        }

        self.entry_mut(id)?.color = Some(color);
        Ok(())
    }

    pub fn running_count(&self, id: &ClassId) -> Result<i64, Error> {
        self.get(id)
            .map(|e| e.running_count)
            .ok_or_else(|| Error::UnknownClass(id.clone()))
    }

    pub fn set_running_count(&mut self, id: &ClassId, count: i64) -> Result<(), Error> {
        if count < 0 {
            return Err(Error::invalid("runningCount", format!("{} is negative", count)));
        }

        self.entry_mut(id)?.running_count = count;
        Ok(())
    }

    /// Counts one more occurrence. A class not yet counted starts at 0.
    pub fn increment_running_count(&mut self, id: &ClassId) -> Result<i64, Error> {
        let entry = self.entry_mut(id)?;
        entry.running_count += 1;

        Ok(entry.running_count)
    }

    pub fn reset_running_counts(&mut self) {
        for entry in self.entries.values_mut() {
            entry.running_count = NOT_COUNTED;
        }
    }

    pub fn first_available_class_id(&self) -> ClassId {
        ClassId::next_available(self.entries.keys())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn first_available_class_id() {
        let mut reg = ClassRegistry::new();
        assert_eq!(reg.first_available_class_id().as_str(), "0");

        reg.add_class(NewClass::new("0"));
        reg.add_class(NewClass::new("3"));
        assert_eq!(reg.first_available_class_id().as_str(), "4");
    }

    #[test]
    fn add_class_defaults_and_overwrites() {
        let mut reg = ClassRegistry::new();
        let id = reg.add_class(NewClass {
            running_count: Some(-7),
            ..NewClass::new("2").with_name("Fox").with_color("not-a-color")
        });

        let entry = reg.get(&id).unwrap();
        assert_eq!(entry.running_count, NOT_COUNTED);
        assert_eq!(entry.color, None);
        assert_eq!(entry.name.as_deref(), Some("Fox"));

        reg.add_class(NewClass::new("2").with_color("#a0B1c2"));
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.get(&id).unwrap().name, None);
        assert_eq!(reg.get(&id).unwrap().color.as_deref(), Some("#a0B1c2"));
    }

    #[test]
    fn add_class_without_id_picks_next() {
        let mut reg = ClassRegistry::new();
        reg.add_class(NewClass::new("5"));
        let id = reg.add_class(NewClass::default());
        assert_eq!(id.as_str(), "6");
    }

    #[test]
    fn setters_require_known_class() {
        let mut reg = ClassRegistry::new();
        let unknown = ClassId::from("9");
        assert_matches!(reg.set_name(&unknown, "x"), Err(Error::UnknownClass(_)));
        assert_matches!(reg.set_color(&unknown, "#fff"), Err(Error::UnknownClass(_)));

        let id = reg.add_class(NewClass::new("1"));
        assert!(reg.set_color(&id, "red").is_err());
        reg.set_color(&id, "#fff").unwrap();
        reg.set_name(&id, "Owl").unwrap();
        assert_eq!(reg.get(&id).unwrap().name.as_deref(), Some("Owl"));
    }

    #[test]
    fn running_counts() {
        let mut reg = ClassRegistry::new();
        let a = reg.add_class(NewClass::new("0"));
        let b = reg.add_class(NewClass::new("1"));

        assert_eq!(reg.increment_running_count(&a).unwrap(), 0);
        assert_eq!(reg.increment_running_count(&a).unwrap(), 1);
        assert!(reg.set_running_count(&b, -1).is_err());
        reg.set_running_count(&b, 10).unwrap();
        assert_eq!(reg.running_count(&b).unwrap(), 10);

        reg.reset_running_counts();
        assert_eq!(reg.running_count(&a).unwrap(), NOT_COUNTED);
        assert_eq!(reg.running_count(&b).unwrap(), NOT_COUNTED);
    }

    #[test]
    fn iteration_keeps_insertion_order() {
        let mut reg = ClassRegistry::new();
        for id in ["7", "1", "4"] {
            reg.add_class(NewClass::new(id));
        }
        reg.remove(&ClassId::from("1"));

        let ids: Vec<_> = reg.ids().map(ClassId::as_str).collect();
        assert_eq!(ids, vec!["7", "4"]);

        reg.add_class(NewClass::new("1"));
        reg.add_class(NewClass::new("7").with_name("Fox"));

        let ids: Vec<_> = reg.ids().map(ClassId::as_str).collect();
        assert_eq!(ids, vec!["7", "4", "1"]);
        assert_eq!(reg.iter().next().and_then(|e| e.name.as_deref()), Some("Fox"));
    }
}
