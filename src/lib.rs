pub mod aggregate;
pub mod columns;
pub mod error;
pub mod extract;
pub mod pipeline;
pub mod reference;
pub mod server;
pub mod snapshot;
pub mod table;
pub mod transform;
