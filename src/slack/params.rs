//! Form parameters for Slack API calls

/// Ordered string-to-string map sent as the form body of an API call.
///
/// Inserting a key that already exists replaces its value but keeps its
/// original position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(Vec<(String, String)>);

impl Params {
    /// Create an empty parameter map
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert or replace `key`, keeping its original position
    pub fn insert(&mut self, key: impl Into<String>, value: impl ToString) {
        let key = key.into();
        let value = value.to_string();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => *v = value,
            None => self.0.push((key, value)),
        }
    }

    /// Insert every pair of `other`, overriding keys already present
    pub fn merge(&mut self, other: &Params) {
        for (k, v) in &other.0 {
            self.insert(k.as_str(), v);
        }
    }

    /// Get the value of `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Borrow the fields as sent on the wire
    pub fn as_pairs(&self) -> &[(String, String)] {
        &self.0
    }
}

impl<K: Into<String>, V: ToString> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}

impl<K: Into<String>, V: ToString, const N: usize> From<[(K, V); N]> for Params {
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_replaces_in_place() {
        let mut params = Params::new().with("channel", "C1").with("text", "hi");
        params.insert("channel", "C2");

        let pairs: Vec<_> = params.iter().collect();
        assert_eq!(pairs, vec![("channel", "C2"), ("text", "hi")]);
    }

    #[test]
    fn test_merge_overrides_existing_keys() {
        let mut base = Params::from([("count", "100"), ("page", "1")]);
        base.merge(&Params::from([("page", "3"), ("user", "U1")]));

        assert_eq!(base.get("count"), Some("100"));
        assert_eq!(base.get("page"), Some("3"));
        assert_eq!(base.get("user"), Some("U1"));
        assert_eq!(base.len(), 3);
    }

    #[test]
    fn test_non_string_values() {
        let params = Params::new().with("count", 42).with("exclude_archived", 1);
        assert_eq!(params.get("count"), Some("42"));
        assert!(params.contains_key("exclude_archived"));
        assert!(!params.contains_key("token"));
    }
}
