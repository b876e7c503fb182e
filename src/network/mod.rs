// Network module - TCP line protocol and result rendering

pub mod render;
pub mod server;

pub use render::render;
pub use server::{parse_prompt, prompt, Server};
