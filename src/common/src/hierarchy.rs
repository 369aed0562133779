//! Platform class model.
//!
//! Records carry a class tag and a list of mixins. Polymorphic queries and
//! filters are answered by walking the single-inheritance chain registered
//! here.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Reference to a class or mixin, e.g. `contact:class:Person`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassRef(String);

impl ClassRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClassRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClassRef {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Well-known classes of the platform model.
pub mod classes {
    pub const DOC: &str = "core:class:Doc";
    pub const ATTACHMENT: &str = "attachment:class:Attachment";
    pub const CONTACT: &str = "contact:class:Contact";
    pub const PERSON: &str = "contact:class:Person";
    pub const EMPLOYEE: &str = "contact:class:Employee";
    pub const ORGANIZATION: &str = "contact:class:Organization";
    pub const ISSUE: &str = "tracker:class:Issue";
    pub const CANDIDATE: &str = "recruit:mixin:Candidate";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassKind {
    Class,
    Mixin,
}

#[derive(Debug, Clone)]
struct ClassDef {
    kind: ClassKind,
    extends: Option<ClassRef>,
}

/// Registry of classes and mixins with their parents.
#[derive(Debug, Clone, Default)]
pub struct Hierarchy {
    classes: HashMap<ClassRef, ClassDef>,
}

impl Hierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    /// The model shipped with the platform.
    pub fn platform() -> Self {
        let mut h = Self::new();
        h.register(classes::DOC, ClassKind::Class, None);
        h.register(classes::ATTACHMENT, ClassKind::Class, Some(classes::DOC));
        h.register(classes::CONTACT, ClassKind::Class, Some(classes::DOC));
        h.register(classes::PERSON, ClassKind::Class, Some(classes::CONTACT));
        h.register(classes::EMPLOYEE, ClassKind::Class, Some(classes::PERSON));
        h.register(classes::ORGANIZATION, ClassKind::Class, Some(classes::CONTACT));
        h.register(classes::ISSUE, ClassKind::Class, Some(classes::DOC));
        h.register(classes::CANDIDATE, ClassKind::Mixin, Some(classes::PERSON));
        h
    }

    pub fn register(&mut self, class: &str, kind: ClassKind, extends: Option<&str>) {
        self.classes.insert(
            ClassRef::new(class),
            ClassDef {
                kind,
                extends: extends.map(ClassRef::new),
            },
        );
    }

    pub fn is_mixin(&self, class: &ClassRef) -> bool {
        self.classes
            .get(class)
            .is_some_and(|def| def.kind == ClassKind::Mixin)
    }

    /// Whether `class` is `ancestor` or inherits from it.
    ///
    /// Unregistered classes only derive from themselves.
    pub fn is_derived(&self, class: &ClassRef, ancestor: &ClassRef) -> bool {
        let mut current = Some(class);
        // a parent chain longer than the registry size means a cycle
        let mut steps = 0;
        while let Some(c) = current {
            if c == ancestor {
                return true;
            }
            steps += 1;
            if steps > self.classes.len() {
                return false;
            }
            current = self.classes.get(c).and_then(|def| def.extends.as_ref());
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_derived_is_reflexive_and_transitive() {
        let h = Hierarchy::platform();
        let employee = ClassRef::new(classes::EMPLOYEE);

        assert!(h.is_derived(&employee, &employee));
        assert!(h.is_derived(&employee, &ClassRef::new(classes::PERSON)));
        assert!(h.is_derived(&employee, &ClassRef::new(classes::CONTACT)));
        assert!(h.is_derived(&employee, &ClassRef::new(classes::DOC)));
    }

    #[test]
    fn test_siblings_are_not_derived() {
        let h = Hierarchy::platform();
        let person = ClassRef::new(classes::PERSON);

        assert!(!h.is_derived(&person, &ClassRef::new(classes::EMPLOYEE)));
        assert!(!h.is_derived(
            &ClassRef::new(classes::ORGANIZATION),
            &ClassRef::new(classes::PERSON)
        ));
    }

    #[test]
    fn test_unknown_class_derives_only_from_itself() {
        let h = Hierarchy::platform();
        let custom = ClassRef::new("custom:class:Thing");

        assert!(h.is_derived(&custom, &custom));
        assert!(!h.is_derived(&custom, &ClassRef::new(classes::DOC)));
    }

    #[test]
    fn test_cycle_terminates() {
        let mut h = Hierarchy::new();
        h.register("a", ClassKind::Class, Some("b"));
        h.register("b", ClassKind::Class, Some("a"));

        assert!(!h.is_derived(&ClassRef::new("a"), &ClassRef::new("c")));
    }

    #[test]
    fn test_candidate_is_mixin() {
        let h = Hierarchy::platform();
        assert!(h.is_mixin(&ClassRef::new(classes::CANDIDATE)));
        assert!(!h.is_mixin(&ClassRef::new(classes::PERSON)));
    }
}
