//! # Endpoint Module
//!
//! The endpoint descriptor model and the registry that assembles it.
//!
//! ## Overview
//!
//! Every routable operation is described by an [`EndpointMeta`]: verb, path
//! template (`:name` placeholders), the ordered parameter bindings, an
//! optional auth requirement, optional named view transforms, and the handler
//! adapter that invokes the controller method. Descriptors are declared by
//! controllers through the [`EndpointMeta`] builder and flattened into one
//! list by [`collect_endpoints`] at startup: explicit registration, no
//! reflection, no runtime re-registration.
//!
//! ## Declaring endpoints
//!
//! ```rust,ignore
//! impl Controller for CrewController {
//!     fn mount_path(&self) -> &str {
//!         "/v1/crew"
//!     }
//!
//!     fn endpoints(self: Arc<Self>) -> Vec<EndpointMeta> {
//!         let controller = Arc::clone(&self);
//!         vec![EndpointMeta::get("get_crew_member", "/:name")
//!             .path_param("name")
//!             .handler(move |args| controller.get_crew_member(args))]
//!     }
//! }
//! ```

mod meta;
mod registry;

pub use meta::{
    EndpointBuilder, EndpointMeta, HandlerFn, ParamMeta, ParamSource, ParamType, ViewFn,
};
pub use registry::{collect_endpoints, join_paths, Controller};
