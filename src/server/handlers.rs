pub mod dev;
pub mod health;
pub mod qr;
pub mod scanner;
