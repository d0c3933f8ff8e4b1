pub mod actor;
pub mod cart;
pub mod dossier;
pub mod notification;
pub mod offer;
pub mod quote;
