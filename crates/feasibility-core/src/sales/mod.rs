pub mod absorption;
