pub mod dispatch;
pub mod watch;

pub use dispatch::dispatch;
pub use watch::FileWatcher;
