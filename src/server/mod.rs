/// MCP tool definitions
pub mod tools;

pub use tools::ProductDocs;
