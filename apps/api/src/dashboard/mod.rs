// Owner PWA backend: view state, license activation, hot-lead alerts,
// and the dashboard controls.

pub mod alerts;
pub mod handlers;
pub mod knowledge;
pub mod license;
pub mod view;
