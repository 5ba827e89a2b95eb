// Data models shared between the managers, services and commands.
// Nothing here runs external commands; these are plain types plus the serde
// shapes of the JSON the external tools print.

// Chart install flags, app-of-apps configuration, ArgoCD applications.
pub mod chart;
// Cluster configuration, observed cluster state and k3d JSON.
pub mod cluster;
// Intercept / scaffold flags and Kubernetes service views.
pub mod dev;
