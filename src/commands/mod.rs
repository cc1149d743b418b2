mod plugins;
mod serve;
mod uninstall;
mod version;

pub use plugins::plugins_command;
pub use serve::{ServeArgs, serve_command};
pub use uninstall::uninstall_command;
pub use version::version_command;
