//! # spark-view
//!
//! Incremental change-detection engine for flattened view trees.
//!
//! ## Architecture
//!
//! A template is described once as a flat, depth-first list of nodes
//! ([`ViewDefinition`]). Every view created from it owns parallel arrays indexed
//! by node and binding position instead of a tree of objects:
//!
//! ```text
//! ViewDefinition (shared)      ViewData (per instance)
//! nodes[i]     ──────────────▶ nodes[i]       element / text / provider / ...
//! bindings     ──────────────▶ old_values[j]  last value seen per binding
//! outputs      ──────────────▶ disposables[k] listeners to release on destroy
//! ```
//!
//! Passes walk the arrays, skipping whole subtrees whose aggregated flags say
//! there is nothing to do:
//! ```text
//! create_view_nodes → check_and_update_view → check_no_changes_view → destroy_view
//! ```
//!
//! Rendering is delegated to a [`Renderer`]; views without one run headless.
//!
//! ## Modules
//!
//! - [`types`] - Binding values, node/view flags, query ids
//! - [`definition`] - Node definitions and the flattening builder
//! - [`view`] - View instances and the create/check/destroy passes
//! - [`directive`] - Provider instances and lifecycle hooks
//! - [`renderer`] - Renderer capability
//! - [`config`] - Dev/prod mode

pub mod config;
pub mod definition;
pub mod directive;
pub mod error;
pub mod renderer;
pub mod types;
pub mod view;

mod nodes;

// Re-export commonly used items
pub use types::*;

pub use config::{enable_prod_mode, is_dev_mode, reset_config};

pub use definition::{
    BindingDef, BindingKind, NodeDef, NodeKind, QueryBindingKind, ViewDefinition,
    ViewDefinitionBuilder,
};

pub use directive::{Directive, Instance, SimpleChange, SimpleChanges, downcast_instance, instance_value};

pub use error::{DebugContext, DefinitionError, ViewError, ViewPathSegment};

pub use renderer::{ComponentRenderType, Disposer, Renderer, RendererFactory};

pub use view::{
    // Instances
    ViewData, NodeData, QueryList, RootData, Injector, StaticInjector,
    // Creation
    create_root_view, create_view, create_view_nodes, create_embedded_view,
    // Change detection
    NodeCheck, CheckType, check_and_update_view, check_no_changes_view, detect_changes,
    // Teardown
    destroy_view,
    // Embedded views and events
    attach_embedded_view, detach_embedded_view, move_embedded_view, dispatch_event,
    root_render_nodes, ViewAction,
};
