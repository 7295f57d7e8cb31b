// Instagram account linking through the platform OAuth redirect.

pub mod handlers;
