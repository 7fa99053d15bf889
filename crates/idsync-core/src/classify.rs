//! Business-group and rank-class classification.
//!
//! Both tables are versioned configuration data, not code: exactly one
//! active version per environment, constructed explicitly and passed into
//! the reconciler. Rank ranges are matched in declared order; the tables are
//! designed contiguous and non-overlapping, and the matcher never coalesces
//! overlaps, it takes the first structural match.

use serde::{Deserialize, Serialize};

/// A rank-class definition with its numeric level range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassDef {
    pub name: String,
    pub gid: i64,
    pub min: u32,
    pub max: u32,
    pub display: String,
}

impl ClassDef {
    pub fn contains(&self, level: u32) -> bool {
        level >= self.min && level <= self.max
    }
}

/// Ordered rank-class table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassTable {
    pub version: String,
    defs: Vec<ClassDef>,
}

impl ClassTable {
    pub fn new(version: impl Into<String>, defs: Vec<ClassDef>) -> Self {
        Self {
            version: version.into(),
            defs,
        }
    }

    /// The active production table.
    pub fn canonical() -> Self {
        let def = |name: &str, gid: i64, min: u32, max: u32, display: &str| ClassDef {
            name: name.into(),
            gid,
            min,
            max,
            display: display.into(),
        };
        Self::new(
            "2025-master",
            vec![
                def("adm-cls", 3001, 1, 2, "Administrator Class (1-2)"),
                def("dir-cls", 3003, 3, 4, "Director Class (3-4)"),
                def("mgr-cls", 3006, 5, 5, "Manager Class (5)"),
                def("mgs-cls", 3016, 6, 14, "Sub-Manager Class (6-14)"),
                def("stf-cls", 3020, 15, 19, "Staff Class (15-19)"),
                def("ent-cls", 3021, 20, 20, "Entry Class (20)"),
                def("tmp-cls", 3099, 21, 98, "Temporary Class (21-98)"),
                def("err-cls", 3099, 99, 9999, "Error Class (99)"),
            ],
        )
    }

    pub fn defs(&self) -> &[ClassDef] {
        &self.defs
    }

    pub fn find_by_name(&self, name: &str) -> Option<&ClassDef> {
        self.defs.iter().find(|d| d.name == name)
    }

    /// First definition whose range contains the level, in declared order.
    pub fn match_level(&self, level: u32) -> Option<&ClassDef> {
        self.defs.iter().find(|d| d.contains(level))
    }
}

/// Ordered business-group name to gidNumber table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessGroups {
    groups: Vec<(String, i64)>,
}

impl BusinessGroups {
    pub fn new(groups: Vec<(String, i64)>) -> Self {
        Self { groups }
    }

    /// The active production table. `users` doubles as the default group.
    pub fn canonical() -> Self {
        Self::new(vec![
            ("users".into(), 100),
            ("esmile-dev".into(), 2001),
            ("nicori-dev".into(), 2002),
            ("kindaka-dev".into(), 2003),
            ("boj-dev".into(), 2005),
            ("e_game-dev".into(), 2009),
            ("solt-dev".into(), 2010),
            ("social-dev".into(), 2012),
        ])
    }

    pub fn gid_for(&self, name: &str) -> Option<i64> {
        let key = name.trim().to_lowercase();
        self.groups.iter().find(|(n, _)| *n == key).map(|(_, g)| *g)
    }

    pub fn name_for(&self, gid: i64) -> Option<&str> {
        self.groups
            .iter()
            .find(|(_, g)| *g == gid)
            .map(|(n, _)| n.as_str())
    }

    /// Resolve a record's business group, falling back to `users`.
    pub fn resolve(&self, name: Option<&str>) -> (String, i64) {
        if let Some(raw) = name {
            let key = raw.trim().to_lowercase();
            if let Some(gid) = self.gid_for(&key) {
                return (key, gid);
            }
        }
        ("users".into(), 100)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.groups.iter().map(|(n, g)| (n.as_str(), *g))
    }
}

/// Outcome of rank-class classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub name: String,
    pub gid: i64,
    pub level: Option<u32>,
    /// Name matched but the parsed level fell outside the definition's
    /// range. Accepted anyway; flagged for observability.
    pub level_out_of_range: bool,
}

impl Classification {
    /// Display label, e.g. `"adm-cls 1"` or bare `"stf-cls"`.
    pub fn label(&self) -> String {
        match self.level {
            Some(level) => format!("{} {}", self.name, level),
            None => self.name.clone(),
        }
    }
}

/// Parse a free-form rank string into a name and optional level.
///
/// Accepts `"adm-cls 1"`, `"adm-cls-1"`, `"adm-cls1"`, and bare `"adm-cls"`.
pub fn parse_rank(raw: &str) -> Option<(String, Option<u32>)> {
    let normalized = normalize_rank(raw);
    if normalized.is_empty() {
        return None;
    }

    // "<name> <digits>", space-separated.
    if let Some((name, digits)) = normalized.split_once(' ') {
        if is_rank_name(name) && is_level_digits(digits) {
            return Some((name.to_string(), digits.parse().ok()));
        }
        // More than one space-separated token but not the recognized shape:
        // fall through and treat the whole string as a name.
        return Some((normalized, None));
    }

    // "<name><optional single hyphen><digits>", no interior space.
    let trailing = normalized
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .count()
        .min(4);
    if trailing > 0 && trailing < normalized.len() {
        let split = normalized.len() - trailing;
        let digits = &normalized[split..];
        let mut name = &normalized[..split];
        if let Some(stripped) = name.strip_suffix('-') {
            name = stripped;
        }
        if is_rank_name(name) {
            return Some((name.to_string(), digits.parse().ok()));
        }
    }

    Some((normalized, None))
}

fn normalize_rank(raw: &str) -> String {
    raw.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_rank_name(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_lowercase())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
}

fn is_level_digits(s: &str) -> bool {
    !s.is_empty() && s.len() <= 4 && s.chars().all(|c| c.is_ascii_digit())
}

/// The original convention: an unset (zero) level means the error class.
pub fn normalize_level(level_id: u32) -> u32 {
    if level_id == 0 {
        99
    } else {
        level_id
    }
}

/// Classify a record's rank class.
///
/// Precedence: explicit rank string, then a class-group name, then the
/// standalone numeric level id. Returns `None` when nothing matches.
pub fn classify(
    table: &ClassTable,
    rank: Option<&str>,
    level_id: Option<u32>,
    group_name: Option<&str>,
) -> Option<Classification> {
    if let Some((name, level)) = rank.and_then(parse_rank) {
        if let Some(def) = table.find_by_name(&name) {
            return Some(Classification {
                name: def.name.clone(),
                gid: def.gid,
                level,
                level_out_of_range: level.is_some_and(|l| !def.contains(l)),
            });
        }
    }

    if let Some(def) = group_name
        .map(|n| n.trim().to_lowercase())
        .and_then(|n| table.find_by_name(&n))
    {
        return Some(Classification {
            name: def.name.clone(),
            gid: def.gid,
            level: None,
            level_out_of_range: false,
        });
    }

    if let Some(level) = level_id.map(normalize_level) {
        if let Some(def) = table.match_level(level) {
            return Some(Classification {
                name: def.name.clone(),
                gid: def.gid,
                level: Some(level),
                level_out_of_range: false,
            });
        }
    }

    None
}
