pub mod consistency;
pub mod reference;
