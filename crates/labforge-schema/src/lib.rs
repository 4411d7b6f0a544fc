//! Lab templates and the identifier types shared across labforge.
//!
//! This crate defines the schema layer: template resolution against a
//! templates directory with the bundled templates as fallback, raw YAML
//! loading (`TemplateDocument`), structural validation, `${name}`
//! interpolation, the typed template model (`LabTemplate`, `ServiceSpec`),
//! template listing and scaffolding, and the `LabId`/`Subnet` newtypes.

pub mod bundled;
pub mod interpolate;
pub mod resolve;
pub mod scaffold;
pub mod template;
pub mod types;

pub use bundled::{get_bundled, BundledTemplate, BUNDLED_TEMPLATES};
pub use interpolate::{interpolate_str, interpolate_value, scalar_to_string};
pub use resolve::{
    list_templates, resolve_template, TemplateSource, TemplateSummary, TEMPLATE_EXTENSIONS,
};
pub use scaffold::{scaffold_template, write_scaffold};
pub use template::{
    parse_template_file, parse_template_str, AccessEntry, Credentials, LabTemplate,
    NetworkSection, ResourceLimits, ServiceSpec, TemplateDocument, TemplateError, AUTO_SUBNET,
    DEFAULT_PLATFORM, VIRTUALIZED_PLATFORMS,
};
pub use types::{LabId, Subnet, SubnetParseError};
