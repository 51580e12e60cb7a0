mod global_manager;
mod lifecycle;
mod properties;
