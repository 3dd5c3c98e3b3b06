//! # yang-xml-codec Library
//!
//! Schema-driven XML encoding for YANG-modelled data: a streaming parser
//! from XML into a normalized data tree, a writer for the reverse direction,
//! per-type value codecs for every YANG built-in type, and a parallel
//! document engine used by the command-line tool.

pub mod cache;
pub mod cli;
pub mod codec;
pub mod config;
pub mod decimal;
pub mod error;
pub mod file_discovery;
pub mod node;
pub mod output;
pub mod qname;
pub mod schema;
pub mod schema_loader;
pub mod validator;
pub mod value;
pub mod xml;

pub use cache::{CodecCache, CodecCacheStats, CodecKey};
pub use cli::{Cli, OutputFormat, VerbosityLevel};
pub use codec::{Codec, CodecRegistry, ModulePrefixes, NamespaceContext, PrefixResolver};
pub use config::{Config, ConfigError, ConfigManager};
pub use decimal::Decimal64;
pub use error::{CodecError, InvalidValue, Result, SchemaLoadError};
pub use file_discovery::{DiscoveryError, FileDiscovery};
pub use node::{
    AnydataNode, AnydataPayload, AugmentationNode, ChoiceNode, ContainerNode, KeyPredicates,
    LeafNode, LeafSetEntryNode, LeafSetNode, ListNode, NormalizedNode, PathArgument,
};
pub use output::Output;
pub use qname::QName;
pub use schema::{DataSchemaNode, SchemaContext, TypeDefinition};
pub use schema_loader::SchemaLoader;
pub use validator::{
    FileValidationResult, ProgressCallback, ValidationConfig, ValidationEngine,
    ValidationProgress, ValidationResults, ValidationStatus,
};
pub use value::{InstanceIdentifier, UnionValue, Value};
pub use xml::{AnydataNormalizer, WriteOrdering, XmlParser, XmlReader, XmlTreeWriter};
