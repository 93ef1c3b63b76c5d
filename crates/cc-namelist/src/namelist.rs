//! In-memory namelist file: an ordered sequence of named groups.
//!
//! Group and parameter names are case-insensitive and stored lower-case. A
//! group name may occur several times in one file (one `gribout` group per
//! output stream); such groups are addressed by their 1-based position `n`
//! among the groups sharing the name.

use crate::value::Value;
use crate::{NamelistError, NamelistResult};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Group {
    name: String,
    params: Vec<(String, Value)>,
}

impl Group {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_ascii_lowercase(),
            params: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, param: &str) -> Option<&Value> {
        let key = param.to_ascii_lowercase();
        self.params.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, param: &str) -> Option<&mut Value> {
        let key = param.to_ascii_lowercase();
        self.params
            .iter_mut()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v)
    }

    pub fn contains(&self, param: &str) -> bool {
        self.get(param).is_some()
    }

    /// Set a parameter, keeping its position if it already exists.
    pub fn set(&mut self, param: &str, value: impl Into<Value>) {
        let value = value.into();
        match self.get_mut(param) {
            Some(slot) => *slot = value,
            None => self.params.push((param.to_ascii_lowercase(), value)),
        }
    }

    /// Builder form of [`Group::set`].
    pub fn with(mut self, param: &str, value: impl Into<Value>) -> Self {
        self.set(param, value);
        self
    }

    pub fn remove(&mut self, param: &str) -> Option<Value> {
        let key = param.to_ascii_lowercase();
        let idx = self.params.iter().position(|(k, _)| *k == key)?;
        Some(self.params.remove(idx).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Namelist {
    name: String,
    groups: Vec<Group>,
}

impl Namelist {
    /// `name` identifies the file (its path relative to the case directory)
    /// and is used in every error raised by accessors.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            groups: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn push_group(&mut self, group: Group) {
        self.groups.push(group);
    }

    pub fn with_group(mut self, group: Group) -> Self {
        self.push_group(group);
        self
    }

    pub fn all_groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn group(&self, block: &str) -> Option<&Group> {
        self.groups(block).next()
    }

    pub fn group_mut(&mut self, block: &str) -> Option<&mut Group> {
        self.groups_mut(block).next()
    }

    pub fn groups<'a>(&'a self, block: &str) -> impl Iterator<Item = &'a Group> + use<'a> {
        let key = block.to_ascii_lowercase();
        self.groups.iter().filter(move |g| g.name == key)
    }

    pub fn groups_mut<'a>(&'a mut self, block: &str) -> impl Iterator<Item = &'a mut Group> + use<'a> {
        let key = block.to_ascii_lowercase();
        self.groups.iter_mut().filter(move |g| g.name == key)
    }

    pub fn group_count(&self, block: &str) -> usize {
        self.groups(block).count()
    }

    pub fn has_group(&self, block: &str) -> bool {
        self.group(block).is_some()
    }

    /// Replace every group named `block` with `replacement`. The new groups
    /// take the position of the first removed one, or go last if there was
    /// none.
    pub fn set_groups(&mut self, block: &str, replacement: Vec<Group>) {
        let key = block.to_ascii_lowercase();
        let at = self
            .groups
            .iter()
            .position(|g| g.name == key)
            .unwrap_or(self.groups.len());
        self.groups.retain(|g| g.name != key);
        let at = at.min(self.groups.len());
        for (offset, mut group) in replacement.into_iter().enumerate() {
            group.name = key.clone();
            self.groups.insert(at + offset, group);
        }
    }

    /// Remove every group named `block`, returning how many were removed.
    pub fn remove_groups(&mut self, block: &str) -> usize {
        let key = block.to_ascii_lowercase();
        let before = self.groups.len();
        self.groups.retain(|g| g.name != key);
        before - self.groups.len()
    }

    fn missing_block(&self, block: &str) -> NamelistError {
        NamelistError::MissingBlock {
            file: self.name.clone(),
            block: block.to_string(),
        }
    }

    fn missing_field(&self, block: &str, param: &str) -> NamelistError {
        NamelistError::MissingField {
            file: self.name.clone(),
            block: block.to_string(),
            param: param.to_string(),
        }
    }

    fn wrong_kind(&self, block: &str, param: &str, expected: &'static str, found: &Value) -> NamelistError {
        NamelistError::WrongKind {
            file: self.name.clone(),
            block: block.to_string(),
            param: param.to_string(),
            expected,
            found: found.kind_name().to_string(),
        }
    }

    pub fn require_group(&self, block: &str) -> NamelistResult<&Group> {
        self.group(block).ok_or_else(|| self.missing_block(block))
    }

    pub fn require_group_mut(&mut self, block: &str) -> NamelistResult<&mut Group> {
        let err = self.missing_block(block);
        self.group_mut(block).ok_or(err)
    }

    /// The `n`-th (1-based) group named `block`.
    pub fn nth_group_mut(&mut self, block: &str, n: usize) -> NamelistResult<&mut Group> {
        let err = self.missing_block(&format!("{}({})", block, n));
        if n == 0 {
            return Err(err);
        }
        self.groups_mut(block).nth(n - 1).ok_or(err)
    }

    pub fn value(&self, block: &str, param: &str) -> NamelistResult<&Value> {
        self.require_group(block)?
            .get(param)
            .ok_or_else(|| self.missing_field(block, param))
    }

    pub fn int(&self, block: &str, param: &str) -> NamelistResult<i64> {
        let value = self.value(block, param)?;
        value
            .as_int()
            .ok_or_else(|| self.wrong_kind(block, param, "an integer", value))
    }

    pub fn float(&self, block: &str, param: &str) -> NamelistResult<f64> {
        let value = self.value(block, param)?;
        value
            .as_float()
            .ok_or_else(|| self.wrong_kind(block, param, "a number", value))
    }

    pub fn string(&self, block: &str, param: &str) -> NamelistResult<&str> {
        let value = self.value(block, param)?;
        value
            .as_str()
            .ok_or_else(|| self.wrong_kind(block, param, "a string", value))
    }

    pub fn set(&mut self, block: &str, param: &str, value: impl Into<Value>) -> NamelistResult<()> {
        self.require_group_mut(block)?.set(param, value);
        Ok(())
    }

    pub fn set_indexed(
        &mut self,
        block: &str,
        n: usize,
        param: &str,
        value: impl Into<Value>,
    ) -> NamelistResult<()> {
        self.nth_group_mut(block, n)?.set(param, value);
        Ok(())
    }

    pub fn remove(&mut self, block: &str, param: &str) -> NamelistResult<Value> {
        let err = self.missing_field(block, param);
        self.require_group_mut(block)?.remove(param).ok_or(err)
    }

    pub fn remove_indexed(&mut self, block: &str, n: usize, param: &str) -> NamelistResult<Value> {
        let err = self.missing_field(&format!("{}({})", block, n), param);
        self.nth_group_mut(block, n)?.remove(param).ok_or(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Namelist {
        Namelist::new("INPUT_IO")
            .with_group(Group::new("ioctl").with("ngribout", 2))
            .with_group(Group::new("gribout").with("ydir", "out1"))
            .with_group(Group::new("gribin").with("ydirini", "in"))
            .with_group(Group::new("GRIBOUT").with("ydir", "out2"))
    }

    #[test]
    fn repeated_groups_are_addressed_by_position() {
        let mut nml = sample();
        assert_eq!(nml.group_count("gribout"), 2);
        nml.set_indexed("gribout", 2, "ydir", "changed").unwrap();
        let dirs: Vec<&str> = nml
            .groups("gribout")
            .map(|g| g.get("ydir").unwrap().as_str().unwrap())
            .collect();
        assert_eq!(dirs, ["out1", "changed"]);
        assert!(nml.set_indexed("gribout", 3, "ydir", "x").is_err());
        assert!(nml.set_indexed("gribout", 0, "ydir", "x").is_err());
    }

    #[test]
    fn names_are_case_insensitive() {
        let mut nml = sample();
        nml.set("IOCTL", "NGRIBOUT", 5).unwrap();
        assert_eq!(nml.int("ioctl", "ngribout").unwrap(), 5);
        assert_eq!(nml.group("ioctl").unwrap().len(), 1);
    }

    #[test]
    fn accessor_errors_name_file_block_and_param() {
        let nml = sample();
        match nml.int("ioctl", "nstop") {
            Err(NamelistError::MissingField { file, block, param }) => {
                assert_eq!((file.as_str(), block.as_str(), param.as_str()), ("INPUT_IO", "ioctl", "nstop"));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            nml.int("runctl", "nstop"),
            Err(NamelistError::MissingBlock { .. })
        ));
        assert!(matches!(
            nml.string("ioctl", "ngribout"),
            Err(NamelistError::WrongKind { .. })
        ));
    }

    #[test]
    fn set_groups_replaces_in_place() {
        let mut nml = sample();
        nml.set_groups("gribout", vec![Group::new("x").with("ydir", "only")]);
        let names: Vec<&str> = nml.all_groups().iter().map(|g| g.name()).collect();
        assert_eq!(names, ["ioctl", "gribout", "gribin"]);
        assert_eq!(nml.remove_groups("gribout"), 1);
        assert!(!nml.has_group("gribout"));
    }

    #[test]
    fn remove_reports_missing_param() {
        let mut nml = sample();
        assert_eq!(nml.remove("ioctl", "ngribout").unwrap(), Value::Int(2));
        assert!(nml.remove("ioctl", "ngribout").is_err());
        assert!(nml.remove_indexed("gribout", 1, "ydir").is_ok());
    }
}
