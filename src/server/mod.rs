pub mod loader;
pub mod master;
pub mod monitor;
pub mod shutdown;
pub mod stream_server;
pub mod subscription;
