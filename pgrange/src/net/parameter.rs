//! Startup parameters.

use std::ops::Deref;

/// Startup parameter, e.g. `application_name`.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub value: String,
}

impl Parameter {
    pub fn new(name: impl ToString, value: impl ToString) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
        }
    }
}

/// Parameters accumulated from the client's startup packet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parameters {
    params: Vec<Parameter>,
}

impl Parameters {
    pub fn new(params: Vec<Parameter>) -> Self {
        Self { params }
    }

    /// Get a parameter value by name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.value.as_str())
    }

    /// Parameters worth replaying to a freshly bound server
    /// connection. Identity parameters are connection-level and
    /// never replayed.
    pub fn replayable(&self) -> impl Iterator<Item = &Parameter> {
        self.params
            .iter()
            .filter(|p| !matches!(p.name.as_str(), "user" | "database" | "options"))
    }
}

impl Deref for Parameters {
    type Target = Vec<Parameter>;

    fn deref(&self) -> &Self::Target {
        &self.params
    }
}

impl From<Vec<Parameter>> for Parameters {
    fn from(params: Vec<Parameter>) -> Self {
        Self::new(params)
    }
}
