pub mod builtin;
pub mod discovery;
pub mod registry;
pub mod schema;
pub mod traits;
pub mod validator;

pub use discovery::{
    build_registry, builtin_sources, discover, DiscoveryReport, ToolExport, ToolSource,
};
pub use registry::{FunctionRegistry, RegisterOptions, ToolEntry};
pub use schema::{ObjectSchema, PropertyKind, PropertySchema, ToolSchema};
pub use traits::{FnTool, Signature, ToolFunction, ValueKind};
pub use validator::{validate_schema, validate_signature};
