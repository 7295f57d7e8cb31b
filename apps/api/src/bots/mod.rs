// Bot record persistence: the store seam, its Postgres backend, and typed updates.

#[cfg(test)]
pub mod memory;
pub mod postgres;
pub mod store;
pub mod updater;
