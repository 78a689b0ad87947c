mod session;
mod shutdown;

pub use session::Session;
pub use shutdown::ShutdownGuard;
