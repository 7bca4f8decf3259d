pub mod bluetooth;
pub mod logging;
pub mod radio;
pub mod store;
