//! Function registry: the catalog mapping tool names to implementations
//! and validated schemas.

use super::schema::ToolSchema;
use super::traits::ToolFunction;
use super::validator::{validate_schema, validate_signature};
use crate::error::RegistryError;
use crate::types::ToolArgs;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info, warn};

/// Module label used when a registration does not name its source.
pub const LOCAL_MODULE: &str = "local";

/// A registered tool. Never mutated after registration.
#[derive(Clone)]
pub struct ToolEntry {
    pub name: String,
    pub implementation: Arc<dyn ToolFunction>,
    pub schema: ToolSchema,
    pub description: String,
    pub module: String,
}

impl fmt::Debug for ToolEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolEntry")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("module", &self.module)
            .finish()
    }
}

/// Optional overrides for [`FunctionRegistry::register_with`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RegisterOptions<'a> {
    /// Catalog name; defaults to the implementation's own name.
    pub name: Option<&'a str>,
    /// Catalog description; defaults to the schema's description.
    pub description: Option<&'a str>,
    /// Source module label; defaults to [`LOCAL_MODULE`].
    pub module: Option<&'a str>,
}

#[derive(Default)]
struct Catalog {
    entries: HashMap<String, Arc<ToolEntry>>,
    order: Vec<String>,
}

/// Catalog of callable tools.
///
/// Reads and registrations may come from several threads; the catalog is
/// guarded by a reader-friendly lock and entries are handed out as `Arc`s so
/// no lock is held while a tool runs.
#[derive(Default)]
pub struct FunctionRegistry {
    catalog: RwLock<Catalog>,
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("registered", &self.list_names())
            .finish()
    }
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and register a tool. Returns the catalog name.
    ///
    /// On failure the catalog is left untouched.
    pub fn register(
        &self,
        implementation: Arc<dyn ToolFunction>,
        schema: &Value,
        name: Option<&str>,
    ) -> Result<String, RegistryError> {
        self.register_with(
            implementation,
            schema,
            RegisterOptions {
                name,
                ..Default::default()
            },
        )
    }

    /// Like [`register`](Self::register) with description and module overrides.
    ///
    /// Registering a name twice replaces the earlier entry (last write wins)
    /// while keeping its position in [`list_names`](Self::list_names).
    pub fn register_with(
        &self,
        implementation: Arc<dyn ToolFunction>,
        schema: &Value,
        options: RegisterOptions<'_>,
    ) -> Result<String, RegistryError> {
        let name = options
            .name
            .unwrap_or_else(|| implementation.name())
            .to_string();

        validate_signature(&name, &implementation.signature())?;
        let schema = validate_schema(schema, &name)?;

        let entry = ToolEntry {
            name: name.clone(),
            description: options
                .description
                .map(str::to_string)
                .unwrap_or_else(|| schema.description.clone()),
            module: options.module.unwrap_or(LOCAL_MODULE).to_string(),
            implementation,
            schema,
        };

        let mut catalog = self.catalog.write().unwrap_or_else(PoisonError::into_inner);
        if catalog.entries.insert(name.clone(), Arc::new(entry)).is_some() {
            warn!("Function '{}' registered again, replacing previous entry", name);
        } else {
            catalog.order.push(name.clone());
        }

        info!("Registered function: {}", name);
        Ok(name)
    }

    /// Full entry for a registered tool.
    pub fn get_entry(&self, name: &str) -> Result<Arc<ToolEntry>, RegistryError> {
        let catalog = self.catalog.read().unwrap_or_else(PoisonError::into_inner);
        catalog
            .entries
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound {
                name: name.to_string(),
            })
    }

    pub fn get_schema(&self, name: &str) -> Result<ToolSchema, RegistryError> {
        self.get_entry(name).map(|entry| entry.schema.clone())
    }

    /// Registered names in registration order.
    pub fn list_names(&self) -> Vec<String> {
        let catalog = self.catalog.read().unwrap_or_else(PoisonError::into_inner);
        catalog.order.clone()
    }

    /// Every schema in registration order.
    pub fn all_schemas(&self) -> Vec<ToolSchema> {
        let catalog = self.catalog.read().unwrap_or_else(PoisonError::into_inner);
        catalog
            .order
            .iter()
            .filter_map(|name| catalog.entries.get(name))
            .map(|entry| entry.schema.clone())
            .collect()
    }

    /// Schemas for `names`, plus the names that are not registered.
    pub fn schemas_for<S: AsRef<str>>(&self, names: &[S]) -> (Vec<ToolSchema>, Vec<String>) {
        let mut found = Vec::new();
        let mut missing = Vec::new();
        for name in names {
            match self.get_schema(name.as_ref()) {
                Ok(schema) => found.push(schema),
                Err(_) => missing.push(name.as_ref().to_string()),
            }
        }
        (found, missing)
    }

    pub fn contains(&self, name: &str) -> bool {
        let catalog = self.catalog.read().unwrap_or_else(PoisonError::into_inner);
        catalog.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        let catalog = self.catalog.read().unwrap_or_else(PoisonError::into_inner);
        catalog.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invoke a registered tool and return its output verbatim.
    ///
    /// Arguments are passed through unchecked; each tool parses its own.
    pub async fn execute(&self, name: &str, args: ToolArgs) -> Result<String, RegistryError> {
        let entry = self.get_entry(name)?;
        debug!("Executing function {} with {} argument(s)", name, args.len());

        entry
            .implementation
            .execute(args)
            .await
            .map_err(|source| RegistryError::Execution {
                name: name.to_string(),
                source,
            })
    }
}
