pub mod clock;
pub mod middleware;
