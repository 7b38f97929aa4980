//! Selector parsing, Rabbitmap menus, and the Selector Resolver
//! collaborator interface, plus an in-memory reference implementation.

mod error;
mod memory;
mod rabbitmap;
mod resolver;
mod selector;

pub use error::ResolverError;
pub use memory::MemoryRegistry;
pub use rabbitmap::{Rabbitmap, RabbitmapEntry};
pub use resolver::{FetchedContent, SelectorResolver, Verb};
pub use selector::{ItemType, Selector, SelectorParseError};
