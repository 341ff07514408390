// Copyright (c) 2025 Steven Rosenthal smr@dt3.org
// See LICENSE file in root directory for license terms.

// Reading and writing of INI-style configuration files, following the rules of
// Python's configparser in its default strict mode:
//
// * `[section]` headers; `key = value` or `key: value` entries split on the
//   first delimiter; keys are lowercased.
// * Full-line `#`/`;` comments. Comments are not preserved on rewrite.
// * A line indented deeper than its option's line continues the value. Blank
//   lines inside a multi-line value are kept; trailing ones are dropped.
// * A repeated section or a repeated key within a section is an error.
// * `[DEFAULT]` holds fallback values for every other section and is not
//   listed among the sections.
//
// Values are kept raw; `%(name)s` interpolation is not performed.

use std::collections::BTreeMap;
use std::fmt;

pub type ConfigMap = BTreeMap<String, BTreeMap<String, String>>;

pub const DEFAULT_SECTION: &str = "DEFAULT";

#[derive(Clone, Debug, PartialEq)]
pub struct IniParseError {
    pub line_number: usize,
    pub message: String,
}

impl fmt::Display for IniParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line_number, self.message)
    }
}

impl std::error::Error for IniParseError {}

#[derive(Clone, Debug, PartialEq)]
struct Section {
    name: String,
    entries: Vec<(String, String)>,
}

#[derive(Clone, Copy, Debug)]
enum Target {
    Defaults,
    Section(usize),
}

// An ordered INI document. Sections and keys keep their file order; new ones
// are appended.
#[derive(Clone, Debug, PartialEq)]
pub struct IniDocument {
    defaults: Section,
    sections: Vec<Section>,
}

impl Default for IniDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl IniDocument {
    pub fn new() -> Self {
        IniDocument{defaults: Section::new(DEFAULT_SECTION), sections: Vec::new()}
    }

    pub fn parse(text: &str) -> Result<Self, IniParseError> {
        let mut doc = IniDocument::new();
        let mut current: Option<Target> = None;
        // Entry of `current` that a continuation line would extend.
        let mut option: Option<usize> = None;
        let mut indent_level = 0;
        for (index, raw_line) in text.lines().enumerate() {
            let line_number = index + 1;
            let error = |message: String| IniParseError{line_number, message};
            let trimmed = raw_line.trim();
            if trimmed.starts_with('#') || trimmed.starts_with(';') {
                continue;
            }
            if trimmed.is_empty() {
                if let (Some(t), Some(e)) = (current, option) {
                    doc.section_mut(t).entries[e].1.push('\n');
                }
                continue;
            }
            let cur_indent = raw_line.len() - raw_line.trim_start().len();
            if let (Some(t), Some(e)) = (current, option) {
                if cur_indent > indent_level {
                    let value = &mut doc.section_mut(t).entries[e].1;
                    value.push('\n');
                    value.push_str(trimmed);
                    continue;
                }
            }
            indent_level = cur_indent;

            if trimmed.starts_with('[') {
                let name = match trimmed.rfind(']') {
                    Some(end) if end > 1 => &trimmed[1..end],
                    _ => {
                        return Err(error(
                            format!("malformed section header: {}", trimmed)));
                    }
                };
                if name == DEFAULT_SECTION {
                    current = Some(Target::Defaults);
                } else {
                    if doc.sections.iter().any(|s| s.name == name) {
                        return Err(error(format!("duplicate section [{}]", name)));
                    }
                    doc.sections.push(Section::new(name));
                    current = Some(Target::Section(doc.sections.len() - 1));
                }
                option = None;
                continue;
            }

            let target = match current {
                Some(t) => t,
                None => {
                    return Err(error("entry before any section header".to_string()));
                }
            };
            let (key, value) = match split_entry(trimmed) {
                Some(kv) => kv,
                None => {
                    return Err(error(format!("expected 'key = value': {}", trimmed)));
                }
            };
            let section = doc.section_mut(target);
            if section.position(&key).is_some() {
                return Err(error(
                    format!("duplicate key '{}' in [{}]", key, section.name)));
            }
            section.entries.push((key, value.to_string()));
            option = Some(section.entries.len() - 1);
        }

        // Blank lines at the end of a value are not part of it.
        for section in std::iter::once(&mut doc.defaults).chain(doc.sections.iter_mut()) {
            for (_, value) in section.entries.iter_mut() {
                let len = value.trim_end().len();
                value.truncate(len);
            }
        }
        Ok(doc)
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let defaults = Some(&self.defaults).filter(|d| !d.entries.is_empty());
        for section in defaults.into_iter().chain(self.sections.iter()) {
            out.push_str(&format!("[{}]\n", section.name));
            for (key, value) in &section.entries {
                out.push_str(&format!("{} = {}\n", key, value.replace('\n', "\n\t")));
            }
            out.push('\n');
        }
        out
    }

    // Looks up `key` in `section`, falling back to [DEFAULT]. None if the
    // section does not exist.
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        let own = if section == DEFAULT_SECTION {
            None
        } else {
            Some(self.sections.iter().find(|s| s.name == section)?)
        };
        own.and_then(|s| s.value(key))
            .or_else(|| self.defaults.value(key))
    }

    // Sets `key` in `section`, creating either as needed.
    pub fn set(&mut self, section: &str, key: &str, value: &str) {
        let target = if section == DEFAULT_SECTION {
            Target::Defaults
        } else {
            Target::Section(self.ensure_section(section))
        };
        self.section_mut(target).set(&key.to_lowercase(), value);
    }

    // Applies every entry of `updates`, leaving other sections and keys as
    // they were.
    pub fn merge(&mut self, updates: &ConfigMap) {
        for (section, values) in updates {
            if section != DEFAULT_SECTION {
                self.ensure_section(section);
            }
            for (key, value) in values {
                self.set(section, key, value);
            }
        }
    }

    // Every section except [DEFAULT], with the defaults filled in.
    pub fn to_map(&self) -> ConfigMap {
        self.sections.iter()
            .map(|s| {
                let mut values: BTreeMap<String, String> =
                    self.defaults.entries.iter().cloned().collect();
                values.extend(s.entries.iter().cloned());
                (s.name.clone(), values)
            })
            .collect()
    }

    pub fn section_names(&self) -> Vec<&str> {
        self.sections.iter().map(|s| s.name.as_str()).collect()
    }

    fn section_mut(&mut self, target: Target) -> &mut Section {
        match target {
            Target::Defaults => &mut self.defaults,
            Target::Section(s) => &mut self.sections[s],
        }
    }

    fn ensure_section(&mut self, name: &str) -> usize {
        match self.sections.iter().position(|s| s.name == name) {
            Some(pos) => pos,
            None => {
                self.sections.push(Section::new(name));
                self.sections.len() - 1
            }
        }
    }
}

impl Section {
    fn new(name: &str) -> Self {
        Section{name: name.to_string(), entries: Vec::new()}
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.entries.iter().position(|(k, _)| k == key)
    }

    fn value(&self, key: &str) -> Option<&str> {
        self.position(key).map(|pos| self.entries[pos].1.as_str())
    }

    fn set(&mut self, key: &str, value: &str) {
        match self.position(key) {
            Some(pos) => self.entries[pos].1 = value.to_string(),
            None => self.entries.push((key.to_string(), value.to_string())),
        }
    }
}

// Splits on the first '=' or ':', whichever comes first. The key is
// lowercased.
fn split_entry(line: &str) -> Option<(String, &str)> {
    let pos = line.find(&['=', ':'][..])?;
    let key = line[..pos].trim();
    if key.is_empty() {
        return None;
    }
    Some((key.to_lowercase(), line[pos + 1..].trim()))
}
