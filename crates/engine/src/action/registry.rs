use std::collections::HashMap;

use thiserror::Error;

use super::property::{PropertyDescriptor, PropertyType};
use super::{Action, ActionInstance};

/// Key that carries the kind discriminator in definition payloads.
pub const KIND_KEY: &str = "kind";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("action kind id cannot be empty")]
    InvalidKindName,
    #[error("duplicate action kind registration: {kind}")]
    DuplicateKind { kind: String },
    #[error("action kind '{kind}' declares property '{property}' more than once")]
    DuplicateProperty { kind: String, property: String },
    #[error("action kind '{kind}' cannot declare reserved property '{property}'")]
    ReservedProperty { kind: String, property: String },
    #[error("unknown action kind '{kind}'")]
    UnknownActionKind { kind: String },
    #[error("unknown property '{property}' for action kind '{kind}'")]
    UnknownProperty { kind: String, property: String },
    #[error("invalid value '{value}' for property '{property}' of action kind '{kind}': expected {expected}")]
    InvalidPropertyValue {
        kind: String,
        property: String,
        value: String,
        expected: String,
    },
}

type FactoryFn<C> = dyn Fn() -> Box<dyn Action<C>>;

/// Factory plus declared property list for one action kind.
pub struct ActionKind<C> {
    id: String,
    factory: Box<FactoryFn<C>>,
    properties: Vec<PropertyDescriptor>,
}

impl<C> ActionKind<C> {
    pub fn new<F, A>(id: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> A + 'static,
        A: Action<C> + 'static,
    {
        Self {
            id: id.into(),
            factory: Box::new(move || Box::new(factory()) as Box<dyn Action<C>>),
            properties: Vec::new(),
        }
    }

    /// Prepends an inherited property set. Properties already declared keep
    /// their position.
    pub fn extends(mut self, base: &[PropertyDescriptor]) -> Self {
        let inherited = base
            .iter()
            .filter(|descriptor| self.descriptor(descriptor.name).is_none())
            .copied()
            .collect::<Vec<_>>();
        self.properties.splice(0..0, inherited);
        self
    }

    pub fn property(mut self, name: &'static str, ty: PropertyType) -> Self {
        self.properties.push(PropertyDescriptor::new(name, ty));
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn descriptors(&self) -> &[PropertyDescriptor] {
        &self.properties
    }

    pub fn descriptor(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.properties
            .iter()
            .find(|descriptor| descriptor.name == name)
    }

    fn validate(&self) -> Result<(), RegistryError> {
        if self.id.trim().is_empty() {
            return Err(RegistryError::InvalidKindName);
        }
        for (index, descriptor) in self.properties.iter().enumerate() {
            if descriptor.name == KIND_KEY {
                return Err(RegistryError::ReservedProperty {
                    kind: self.id.clone(),
                    property: descriptor.name.to_string(),
                });
            }
            if self.properties[..index]
                .iter()
                .any(|earlier| earlier.name == descriptor.name)
            {
                return Err(RegistryError::DuplicateProperty {
                    kind: self.id.clone(),
                    property: descriptor.name.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Maps kind ids to factories and property descriptors.
pub struct ActionRegistry<C> {
    kinds: Vec<ActionKind<C>>,
    lookup_by_id: HashMap<String, usize>,
}

impl<C> Default for ActionRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> ActionRegistry<C> {
    pub fn new() -> Self {
        Self {
            kinds: Vec::new(),
            lookup_by_id: HashMap::new(),
        }
    }

    pub fn register(&mut self, kind: ActionKind<C>) -> Result<(), RegistryError> {
        kind.validate()?;
        if self.lookup_by_id.contains_key(kind.id()) {
            return Err(RegistryError::DuplicateKind {
                kind: kind.id().to_string(),
            });
        }
        self.lookup_by_id
            .insert(kind.id().to_string(), self.kinds.len());
        self.kinds.push(kind);
        Ok(())
    }

    pub fn lookup(&self, kind: &str) -> Option<&ActionKind<C>> {
        let index = self.lookup_by_id.get(kind)?;
        self.kinds.get(*index)
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.lookup_by_id.contains_key(kind)
    }

    /// Registered kind ids in registration order.
    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.kinds.iter().map(ActionKind::id)
    }

    pub fn properties_of(&self, kind: &str) -> Result<&[PropertyDescriptor], RegistryError> {
        self.lookup_required(kind).map(ActionKind::descriptors)
    }

    /// Produces a default-configured instance of `kind`.
    pub fn create(&self, kind: &str) -> Result<ActionInstance<C>, RegistryError> {
        let action_kind = self.lookup_required(kind)?;
        Ok(ActionInstance::new(action_kind.id(), (action_kind.factory)()))
    }

    /// Coerces `raw` to the declared type of `name` and applies it.
    pub fn set_property(
        &self,
        instance: &mut ActionInstance<C>,
        name: &str,
        raw: &str,
    ) -> Result<(), RegistryError> {
        let action_kind = self.lookup_required(instance.kind())?;
        let descriptor = self.descriptor_required(instance.kind(), name)?;
        let invalid = |expected: String| RegistryError::InvalidPropertyValue {
            kind: action_kind.id().to_string(),
            property: name.to_string(),
            value: raw.to_string(),
            expected,
        };
        let value = descriptor.ty.coerce(raw).map_err(invalid)?;
        instance
            .action_mut()
            .set_property(name, value)
            .map_err(|error| invalid(error.to_string()))
    }

    /// Creates `kind` and applies each `(name, raw)` pair in order.
    pub fn build(
        &self,
        kind: &str,
        properties: &[(&str, &str)],
    ) -> Result<ActionInstance<C>, RegistryError> {
        let mut instance = self.create(kind)?;
        for (name, raw) in properties {
            self.set_property(&mut instance, name, raw)?;
        }
        Ok(instance)
    }

    pub(crate) fn descriptor_required(
        &self,
        kind: &str,
        name: &str,
    ) -> Result<&PropertyDescriptor, RegistryError> {
        self.lookup_required(kind)?
            .descriptor(name)
            .ok_or_else(|| RegistryError::UnknownProperty {
                kind: kind.to_string(),
                property: name.to_string(),
            })
    }

    fn lookup_required(&self, kind: &str) -> Result<&ActionKind<C>, RegistryError> {
        self.lookup(kind)
            .ok_or_else(|| RegistryError::UnknownActionKind {
                kind: kind.to_string(),
            })
    }
}
