pub mod extensions;
pub mod motd;
pub mod plugins;
