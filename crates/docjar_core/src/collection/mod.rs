//! Collection views: the flushing proxy and containers.

mod container;
mod proxy;

pub use container::{
    Container, ContainerBuilder, ContainerKind, Owner, DEFAULT_MAPPING_KEY, DEFAULT_PARENT_KEY,
    FOREIGN_OWNER_PREFIX,
};
pub use proxy::FlushingCollection;
