mod containers;
mod images;
mod trust;

pub use containers::{ListContainers, PruneContainers};
pub use images::{ListImages, PruneImages};
pub use trust::{ListTrust, RevokeTrust};
