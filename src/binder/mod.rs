//! Parameter binding for endpoint invocations.
//!
//! Handlers never touch the raw HTTP request. Before a controller method
//! runs, the binder walks the endpoint's declared parameter list and builds a
//! [`CallArgs`] value holding one entry per declaration, in declaration
//! order, each coerced to its declared type.
//!
//! # Binding sources
//!
//! | Source      | Produces                                   | When missing            |
//! |-------------|--------------------------------------------|-------------------------|
//! | `Path`      | decoded path segment as text               | binding error           |
//! | `Query`     | coerced text / integer / float / boolean / structured | `Absent`     |
//! | `Search`    | parsed [`SearchQuery`]                     | empty query             |
//! | `Body`      | buffered JSON body                         | `None`                  |
//! | `Request`   | shared request handle                      | always present          |
//! | `Reply`     | direct response handle                     | always present          |
//! | `Principal` | authenticated caller, if any               | `None`                  |
//! | `Context`   | per-request correlation context            | always present          |
//!
//! Coercion is strict: booleans accept exactly `true`/`false`, numbers must
//! parse completely, structured values must be valid JSON. A failed coercion
//! surfaces as a [`BindError`](crate::error::BindError) and the handler never
//! runs.
//!
//! # Search micro-language
//!
//! A `Search` binding interprets the reserved query keys `filter`, `sort`,
//! `offset` and `limit`:
//!
//! ```text
//! GET /pets?filter=name[regex]=/^rex/i&sort=age=DESC&offset=20&limit=10
//! ```
//!
//! See [`SearchQuery`] for the grammar.

mod core;
mod search;

pub use core::{bind, BoundParam, CallArgs};
pub use search::{FilterOp, SearchQuery, SearchRegex, SortDirection};
