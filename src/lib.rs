pub mod config;
pub mod context;
pub mod data;
pub mod deprecation;
pub mod error;
pub mod evict;
pub mod generate;
pub mod host;
pub mod interface;
pub mod lazy;
pub mod merge;
pub mod priority;
pub mod probe;
pub mod provenance;
pub mod registry;
pub mod session;
pub mod symbols;
pub mod version;

pub use config::Config;
pub use context::{ContextEnv, Platform};
pub use data::{PublicNames, ReservedNames, StaticData};
pub use deprecation::DeprecationTable;
pub use error::{Error, ProbeError, Result, Unavailable};
pub use evict::evict_module;
pub use generate::{generate_public_names, render_table, PublicNamesTable};
pub use host::{HostRuntime, ManifestHost, Module, ModuleSpec, Value};
pub use interface::{DeductionMode, InterfaceDeducer};
pub use lazy::{wrap, Deferred};
pub use merge::{Aggregator, InsertStrategy, MergeOptions, Merged};
pub use priority::{fold_order, Priorities};
pub use probe::IsolatedProbe;
pub use provenance::{reverse, reverse_by_origin, OriginIndex, Provenance, ReverseOptions};
pub use registry::{ModuleEnumerator, ModuleRegistry, RegistryRules, StaticEnumerator};
pub use session::Session;
pub use symbols::{is_identifier, Binding, Namespace, SymbolTable};
pub use version::HostVersion;
