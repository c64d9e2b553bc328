use std::collections::{HashMap, HashSet};

/// Column-name lookup that ignores ASCII case.
///
/// Spreadsheet headers arrive as `City`, `city`, or `CITY` depending on who
/// exported the sheet; lookups return the name as it is actually spelled.
/// A name present with exactly the queried spelling is returned before any
/// case variant.
#[derive(Debug, Clone)]
pub struct CaseInsensitiveSet {
    exact: HashSet<String>,
    map: HashMap<String, String>,
}

impl CaseInsensitiveSet {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut exact = HashSet::new();
        let mut map = HashMap::new();
        for name in names {
            let name = name.as_ref();
            let key = name.trim().to_ascii_uppercase();
            map.entry(key).or_insert_with(|| name.to_string());
            exact.insert(name.to_string());
        }
        Self { exact, map }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        if let Some(found) = self.exact.get(name) {
            return Some(found.as_str());
        }
        self.map
            .get(&name.trim().to_ascii_uppercase())
            .map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(&name.trim().to_ascii_uppercase())
    }

    /// Returns the actual spelling of the first candidate present.
    pub fn first_present<'a, I>(&self, candidates: I) -> Option<&str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        candidates.into_iter().find_map(|candidate| self.get(candidate))
    }
}
