pub mod server;

pub use server::{PolicyGraphMcpServer, run_server};
