//! Construct tree
//!
//! Every resource in a stack is registered under a unique id. Registration
//! hands back a typed [`Ref`] that other resources hold instead of the resource
//! itself, so "the same identity" or "the same bucket" is plain equality on refs.
//!
//! Each construct path also yields a deterministic logical id used as the
//! resource key in the synthesized template.

use std::fmt;
use std::marker::PhantomData;

use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};

use crate::error::DefinitionError;

const PATH_SEPARATOR: char = '/';
const HASH_LEN: usize = 8;

/// Location of a construct inside its stack, e.g. `Stack/Pipeline/Role`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConstructPath {
    stack: String,
    components: Vec<String>,
}

impl ConstructPath {
    fn new(stack: &str, id: &str) -> Self {
        Self {
            stack: stack.to_string(),
            components: vec![id.to_string()],
        }
    }

    /// Path of a child construct owned by this one
    pub fn child(&self, id: &str) -> Self {
        let mut components = self.components.clone();
        components.push(id.to_string());
        Self {
            stack: self.stack.clone(),
            components,
        }
    }

    /// Id of the stack the construct belongs to
    pub fn stack(&self) -> &str {
        &self.stack
    }

    /// The construct's own id (last path component)
    pub fn id(&self) -> &str {
        self.components.last().map(String::as_str).unwrap_or_default()
    }

    /// Template key for this construct
    ///
    /// Alphanumeric characters of every component below the stack, followed
    /// by the first eight upper-case hex digits of the MD5 of the path.
    pub fn logical_id(&self) -> String {
        let readable: String = self
            .components
            .iter()
            .flat_map(|c| c.chars())
            .filter(char::is_ascii_alphanumeric)
            .collect();

        let digest = Md5::digest(self.components.join("/").as_bytes());
        let hash = hex::encode_upper(digest);

        format!("{}{}", readable, &hash[..HASH_LEN])
    }
}

impl fmt::Display for ConstructPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.stack)?;
        for component in &self.components {
            write!(f, "{}{}", PATH_SEPARATOR, component)?;
        }
        Ok(())
    }
}

/// Typed handle to a registered construct of kind `T`
pub struct Ref<T> {
    path: ConstructPath,
    _kind: PhantomData<fn() -> T>,
}

impl<T> Ref<T> {
    fn new(path: ConstructPath) -> Self {
        Self {
            path,
            _kind: PhantomData,
        }
    }

    pub fn path(&self) -> &ConstructPath {
        &self.path
    }

    pub fn logical_id(&self) -> String {
        self.path.logical_id()
    }

    /// Ref to a construct owned by this one (e.g. a bucket's policy)
    pub fn child<U>(&self, id: &str) -> Ref<U> {
        Ref::new(self.path.child(id))
    }
}

impl<T> Clone for Ref<T> {
    fn clone(&self) -> Self {
        Self::new(self.path.clone())
    }
}

impl<T> PartialEq for Ref<T> {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl<T> Eq for Ref<T> {}

impl<T> fmt::Debug for Ref<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ref({})", self.path)
    }
}

/// Root of a construct tree
#[derive(Debug, Clone)]
pub struct Stack {
    id: String,
    children: Vec<ConstructPath>,
}

impl Stack {
    /// Creates an empty stack
    pub fn new(id: impl Into<String>) -> Result<Self, DefinitionError> {
        let id = id.into();
        check_id(&id)?;
        Ok(Self {
            id,
            children: Vec::new(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Registered children in registration order
    pub fn children(&self) -> &[ConstructPath] {
        &self.children
    }

    /// Registers a direct child and returns a typed ref to it
    ///
    /// # Errors
    /// Returns an error if the id is empty, contains '/', or is already taken.
    pub fn register<T>(&mut self, id: &str) -> Result<Ref<T>, DefinitionError> {
        check_id(id)?;

        if self.children.iter().any(|child| child.id() == id) {
            return Err(DefinitionError::DuplicateConstruct {
                stack: self.id.clone(),
                id: id.to_string(),
            });
        }

        let path = ConstructPath::new(&self.id, id);
        tracing::debug!("Registered construct {}", path);
        self.children.push(path.clone());
        Ok(Ref::new(path))
    }
}

fn check_id(id: &str) -> Result<(), DefinitionError> {
    if id.trim().is_empty() || id.contains(PATH_SEPARATOR) {
        return Err(DefinitionError::InvalidConstructId(id.to_string()));
    }
    Ok(())
}
