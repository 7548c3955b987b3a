//! Node naming and channel name resolution
//!
//! Understands the ROS command-line conventions the node is launched with:
//! `__name:=`, `__ns:=` and `from:=to` remappings.

use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeOptions {
    pub name: String,
    /// Namespace without leading or trailing slashes; empty for the root
    pub namespace: String,
    pub remappings: BTreeMap<String, String>,
}

impl NodeOptions {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            namespace: String::new(),
            remappings: BTreeMap::new(),
        }
    }

    pub fn with_namespace(mut self, namespace: &str) -> Self {
        self.namespace = namespace.trim_matches('/').to_string();
        self
    }

    pub fn remap(mut self, from: &str, to: &str) -> Self {
        self.remappings.insert(from.to_string(), to.to_string());
        self
    }

    /// Apply command-line arguments; the first element is the program name
    pub fn apply_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for arg in args.into_iter().skip(1) {
            let arg = arg.as_ref();
            match arg.split_once(":=") {
                Some(("__name", name)) if !name.is_empty() => self.name = name.to_string(),
                Some(("__ns", namespace)) => self = self.with_namespace(namespace),
                Some((from, _)) if from.starts_with("__") => {
                    debug!("Ignoring special argument {}", arg);
                }
                Some((from, to)) if !from.is_empty() && !to.is_empty() => {
                    self = self.remap(from, to);
                }
                _ => debug!("Ignoring argument {}", arg),
            }
        }
        self
    }

    /// Resolve a bridge name into a channel name
    pub fn resolve(&self, name: &str) -> String {
        let name = self
            .remappings
            .get(name)
            .map(String::as_str)
            .unwrap_or(name);

        if let Some(absolute) = name.strip_prefix('/') {
            return absolute.to_string();
        }
        if self.namespace.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", self.namespace, name)
        }
    }
}
