// Small platform helpers shared by the installers and the cluster manager.

// Operating system and architecture detection.
pub mod platform;
// Local TCP port probing for cluster port allocation.
pub mod ports;
