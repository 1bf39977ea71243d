pub mod engine;
mod locks;
